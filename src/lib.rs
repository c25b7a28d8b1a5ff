//! Session Gateway - connection lifecycle for long-lived messaging sessions
//!
//! Keeps a registry of named sessions, each bound to a persistent transport
//! connection, and drives them through pairing, health monitoring and
//! reconnection while reporting every state change outward.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
