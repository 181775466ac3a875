pub mod abuse;
pub mod backend;
pub mod chat;
pub mod conversation;
pub mod database;
pub mod image;
pub mod image_proxy;
pub mod llm_proxy;
pub mod proxy_error;
pub mod rate_limit;
pub mod session;
pub mod store;

pub use abuse::{AbuseReason, ContentClassifier, PatternClassifier, Verdict};
pub use backend::{BackendError, ChatBackend, GeneratedImage, ImageBackend};
pub use conversation::ConversationStore;
pub use database::SqliteStore;
pub use image_proxy::{EncodedImage, ImageProxy};
pub use llm_proxy::LlmProxy;
pub use proxy_error::ProxyError;
pub use rate_limit::{InMemoryRateLimitStore, RateLimitStore, RateLimiter};
pub use session::{ChatSession, ChatState, Rejection, SendOutcome, SessionConfig};
pub use store::{KeyValueStore, MemoryStore};
