//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, the connection status state machine
//! and error types that form the vocabulary of the gateway.

mod connection_status;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use connection_status::ConnectionStatus;
pub use errors::{ErrorCode, ValidationError};
pub use ids::{OwnerId, SessionName, MAX_SESSION_NAME_LENGTH};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
