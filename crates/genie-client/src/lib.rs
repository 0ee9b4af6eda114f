//! # genie-client
//!
//! HTTP side of the Genie monitor.
//!
//! - [`ApiClient`]: session listing (implements
//!   [`SessionDirectory`](genie_core::sessions::SessionDirectory)), session
//!   event history, and the notification stream subscription
//! - [`sse`]: server-sent event framing and conversion of frames into
//!   [`Notification`](genie_core::events::Notification)s
//! - [`ClientError`]: transport and protocol failures

#![deny(unsafe_code)]

pub mod errors;
pub mod http;
pub mod sse;

pub use errors::ClientError;
pub use http::ApiClient;
