//! Application layer - the session orchestrators.
//!
//! Coordinates domain policies and ports:
//! - `connection` - per-session reconnect, socket and state machine
//! - `session` - the registry of sessions

pub mod connection;
pub mod session;

pub use connection::{
    ConnectionHandler, ReconnectStrategy, SessionObserver, SocketError, SocketManager,
};
pub use session::{CreatedSession, SessionDiagnostics, SessionManager, SessionManagerOptions};
