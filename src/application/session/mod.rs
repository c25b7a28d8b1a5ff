//! Session registry orchestration.

mod registry;
mod session_manager;
mod ws_tokens;

pub use session_manager::{
    CreatedSession, SessionDiagnostics, SessionManager, SessionManagerOptions,
    DEFAULT_MAX_SESSIONS,
};
pub use ws_tokens::{WsTokenStore, DEFAULT_WS_TOKEN_TTL};
