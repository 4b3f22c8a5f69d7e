//! Shared wire types and constants for the broker IPC protocol.
//!
//! This crate has no network or persistence logic of its own; it exists so
//! that the broker library and any future client share one definition of
//! the request envelope, the response payload shapes, and the numeric
//! constants (size thresholds, TTLs, rate-limit window) that both sides
//! must agree on.

pub mod constants;
pub mod paths;
pub mod types;

pub use types::{Instance, Message, MessageBody, RawRequest};
