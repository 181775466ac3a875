pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;

pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
