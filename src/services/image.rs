use crate::models::Message;
use crate::prompts;
use crate::services::session::{persist, ChatSession, SendKind, SendOutcome};

impl ChatSession {
    /// Generate an image for `prompt`. A placeholder message stands in for the
    /// image while the request is in flight.
    #[tracing::instrument(skip_all)]
    pub async fn send_image_prompt(&self, prompt: &str) -> SendOutcome {
        let admitted = match self.admit(prompt, SendKind::Image).await {
            Ok(admitted) => admitted,
            Err(outcome) => return outcome,
        };
        let conversation_id = admitted.conversation_id.clone();

        let placeholder = Message::image_placeholder(prompt);
        let placeholder_id = placeholder.id.clone();
        self.append(&conversation_id, placeholder).await;

        let result = self.image_backend.generate(prompt).await;

        let mut store = self.store.lock().await;
        store.remove_message(&conversation_id, &placeholder_id);

        let (messages, outcome) = match result {
            Ok(image) => {
                let mut messages = vec![Message::image(prompt, image.image_data, image.model)];
                if image.degraded {
                    messages.push(Message::assistant(prompts::IMAGE_FALLBACK_NOTICE));
                }
                (messages, SendOutcome::Delivered)
            }
            Err(e) => {
                tracing::error!("Image request failed: {}", e);
                let detail = e.to_string();
                (
                    vec![Message::assistant_error(prompts::image_error_notice(Some(&detail)))],
                    SendOutcome::Failed,
                )
            }
        };

        for message in messages {
            if let Err(e) = store.append_message(&conversation_id, message) {
                tracing::warn!("Dropping image result: {}", e);
                break;
            }
        }
        persist(&store).await;
        drop(store);

        self.finish(&admitted).await;
        outcome
    }
}
