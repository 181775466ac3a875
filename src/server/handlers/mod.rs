pub mod chat;
pub mod health;
pub mod image;

pub use chat::{chat_handler, client_key, ClientKey};
pub use health::{health_handler, method_not_allowed_handler, preflight_handler};
pub use image::image_handler;
