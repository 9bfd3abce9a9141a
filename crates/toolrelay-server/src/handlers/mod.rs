mod health;
mod mcp;

pub use health::health;
pub use mcp::{post_message, push_channel};
