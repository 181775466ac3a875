//! Persona text and the canned replies shown when a send is refused or fails.

/// First user turn of every upstream conversation.
pub const PERSONA_INSTRUCTION: &str = "You are Flirtina, a warm, playful and flirty chat companion. \
Keep replies short and affectionate, use the occasional emoji, stay kind and respectful, \
and never produce explicit or hateful content. Stay in character for the rest of this conversation.";

/// Model turn acknowledging the persona.
pub const PERSONA_ACKNOWLEDGEMENT: &str =
    "Got it, cutie! 💕 I'm Flirtina, and I'm all yours. What's on your mind?";

pub const COOLDOWN_NOTICE: &str =
    "Easy there, sweetheart! 😘 Give me a second to catch my breath before the next one. 💕";

pub const CHAT_ABUSE_NOTICE: &str =
    "Hmm, that message looks a little off, babe. 😅 Let's keep things sweet and respectful, okay? 💕";

pub const IMAGE_ABUSE_NOTICE: &str =
    "Hmm, that image prompt looks a little off, babe. 😅 Let's keep our art sweet and appropriate! 💕";

pub const CHAT_LIMIT_NOTICE: &str = "We've had such a lovely chat, darling! 😘 You've reached the \
15-message limit for this conversation.\n\nStart a new chat and we can pick things right back up. 💕";

pub const IMAGE_LIMIT_NOTICE: &str = "We've made so much together, darling! 😘 You've reached the \
15-message limit for this conversation.\n\nStart a new chat and we can keep creating. 💕";

pub const CHAT_ERROR_NOTICE: &str =
    "Sorry, something went wrong while I was thinking about that. Please try again.";

pub const IMAGE_FALLBACK_NOTICE: &str = "The image services are busy right now, so this is a \
placeholder picture for now. Try again in a little while for the real thing! 💕";

/// Assistant text shown when image generation fails.
pub fn image_error_notice(detail: Option<&str>) -> String {
    let detail = detail
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("Please try again with a different prompt!");
    format!("Sorry sweetie! 😔 I couldn't create your image. {} 💕", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_error_notice_includes_detail() {
        let notice = image_error_notice(Some("All models failed"));
        assert!(notice.contains("All models failed"));

        let notice = image_error_notice(Some("  "));
        assert!(notice.contains("different prompt"));
    }
}
