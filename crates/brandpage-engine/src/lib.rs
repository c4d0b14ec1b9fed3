//! Network-facing half of brandpage: the chat-completion client, the
//! WebSocket relay that serves `generate` requests, and its client.

pub mod client;
pub mod config;
pub mod enhance;
pub mod generation;
pub mod relay;

pub use client::{enhance_content, ConnectOptions, RelayClient};
pub use config::{ChatCompletionConfig, ConfigError, ServerConfig};
pub use generation::{ChatCompletionClient, GenerationError, TextGenerator};
pub use relay::{router, RelayContext, RelayServer};
