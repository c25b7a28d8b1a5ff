//! Connection domain - pure policies behind reconnect and health decisions.
//!
//! Nothing in here owns a timer or a transport handle; the application layer
//! feeds these functions the facts it observed and acts on the answers.

mod backoff;
mod disconnect;
mod health;
mod pairing;

pub use backoff::{
    ReconnectPolicy, DEFAULT_FACTOR, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY, DEFAULT_POST_PAIRING_WINDOW,
};
pub use disconnect::{
    classify, codes, is_fatal_code, reason_for_code, DisconnectCause, DisconnectKind,
    PairingWindow, FATAL_CODES, RESTART_CODES,
};
pub use health::{
    HealthFailure, HealthPolicy, HealthStatus, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_HEALTH_INTERVAL, DEFAULT_PROBE_TIMEOUT,
};
pub use pairing::{
    format_pairing_code, PairingPolicy, DEFAULT_PAIRING_DEDUP_WINDOW, PAIRING_CODE_SEPARATOR,
};
