pub mod config;
pub mod conversation;
pub mod error;
pub mod ids;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use config::Config;
pub use conversation::{Conversation, Turn, TurnState, TurnToken};
pub use error::TransportError;
pub use state::{Message, Sender};
pub use transport::{ChatClient, Transport, CONNECTION_FALLBACK, UNPROCESSABLE_REPLY};
