use std::sync::PoisonError;

use tokio_util::sync::CancellationToken;

use crate::models::Message;
use crate::prompts;
use crate::services::session::{ChatSession, ChatState, SendKind, SendOutcome};

impl ChatSession {
    /// Send a chat message and wait for the reply, including the typing phase.
    #[tracing::instrument(skip_all)]
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let admitted = match self.admit(text, SendKind::Chat).await {
            Ok(admitted) => admitted,
            Err(outcome) => return outcome,
        };

        let outcome = match self.chat_backend.send(text, &admitted.history).await {
            Ok(reply) => {
                let token = CancellationToken::new();
                *self.typing.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

                self.append(&admitted.conversation_id, Message::assistant(reply))
                    .await;

                if self.set_state_for(admitted.generation, ChatState::Typing) {
                    tokio::select! {
                        _ = token.cancelled() => tracing::debug!("Typing skipped"),
                        _ = tokio::time::sleep(self.config.typing_delay) => {}
                    }
                }
                self.typing
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                SendOutcome::Delivered
            }
            Err(e) => {
                tracing::error!("Chat request failed: {}", e);
                self.append(
                    &admitted.conversation_id,
                    Message::assistant_error(prompts::CHAT_ERROR_NOTICE),
                )
                .await;
                SendOutcome::Failed
            }
        };

        self.finish(&admitted).await;
        outcome
    }

    /// End the typing phase early. Does nothing in any other state.
    pub fn skip_typing(&self) {
        if self.state() == ChatState::Typing {
            self.cancel_typing();
        }
    }
}
