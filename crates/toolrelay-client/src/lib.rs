//! Client side of the toolrelay protocol.
//!
//! A [`Client`] holds one push-channel subscription. Calls are posted to the
//! request channel and their replies are matched back to the caller by
//! message id, in whatever order the server finishes them.

mod client;
mod error;
mod pending;

pub use client::{Client, ClientConfig, ConnectionState, PendingReply};
pub use error::ClientError;
pub use pending::{CallOutcome, PendingCalls};
