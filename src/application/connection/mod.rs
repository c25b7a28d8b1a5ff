//! Connection orchestration for a single session.
//!
//! - `ReconnectStrategy` - disconnect classification and backoff timers
//! - `SocketManager` - transport handle, health probing, pairing dedup
//! - `ConnectionHandler` - per-session state machine
//! - `SessionObserver` - where a handler reports what happened

mod connection_handler;
mod observer;
mod reconnect_strategy;
mod socket_manager;

pub use connection_handler::ConnectionHandler;
pub use observer::SessionObserver;
pub use reconnect_strategy::{
    ReconnectDecision, ReconnectStrategy, RetryError, RetryFn, ScheduleOptions, ScheduleOutcome,
};
pub use socket_manager::{SocketError, SocketEvent, SocketManager, SocketState};
