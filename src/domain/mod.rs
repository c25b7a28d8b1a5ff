//! Domain layer containing connection policies and session types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (names, timestamps, status state machine, errors)
//! - `connection` - Disconnect classification, backoff, pairing and health policies
//! - `session` - Session record, settings, notifications and registry errors

pub mod connection;
pub mod foundation;
pub mod session;
