//! Session domain module.
//!
//! The registered-session record, its settings, the notifications emitted as
//! it changes, and the typed errors of the registry boundary.

mod aggregate;
mod errors;
mod events;
mod settings;

pub use aggregate::{generate_token, tokens_match, Session, SessionSnapshot};
pub use errors::SessionError;
pub use events::{
    InboundMessage, PairingUpdate, SessionDeleted, SessionStateChanged, StateChange,
    WebhookEvent, WebhookEventKind,
};
pub use settings::SessionSettings;
