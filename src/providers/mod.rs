pub mod gemini;
pub mod huggingface;
pub mod traits;
pub mod types;

pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;
pub use traits::{ChatProvider, ImageProvider};
pub use types::{ChatMessage, ChatRequest, ChatResponse, GenerationConfig, ImageRequest, ProviderError};
