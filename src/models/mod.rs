pub mod conversation;
pub mod message;

pub use conversation::{Conversation, NEW_CHAT_TITLE};
pub use message::{Message, MessageKind, Role};
