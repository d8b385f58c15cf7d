pub mod chat;
pub mod errors;
pub mod reply;
pub mod types;

pub use chat::{ChatMessage, ChatProvider, ChatRequest, ChatRole};
pub use errors::GenerationError;
pub use reply::{MessageMetadata, StructuredReply};
pub use types::{Currency, Jurisdiction, Role, SessionStatus};
