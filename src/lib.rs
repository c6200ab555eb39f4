//! PostRun email provider integration.
//!
//! Two halves: inbound webhook handling (HMAC-SHA256 signature verification
//! with a replay window, then fan-out into typed lifecycle events) and the
//! outbound side (assembling provider-shaped send payloads). The provider's
//! HTTP client itself lives behind the [`transport::PostRunClient`] trait.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod http_server;
pub mod transport;
pub mod verification;
