//! Responders turn a classified message into a reply.
//!
//! They show progress through the channel but return the reply itself, so the
//! dispatcher owns delivery.

pub mod chat;
pub mod image;

pub use chat::ChatResponder;
pub use image::ImageResponder;

use crate::message::ChatAction;
use crate::traits::Channel;

pub(crate) const CHAT_ERROR_MESSAGE: &str = "⚠️ Помилка OpenAI. Спробуйте пізніше.";
pub(crate) const GENERATE_ERROR_MESSAGE: &str =
    "⚠️ Не вдалося згенерувати картинку після кількох спроб.";
pub(crate) const EDIT_ERROR_MESSAGE: &str = "⚠️ Помилка редагування фото після кількох спроб.";
pub(crate) const EDIT_USAGE_MESSAGE: &str =
    "⚠️ Щоб редагувати, відповідайте на фото та напишіть '/edit <опис>'";

/// Progress indicators are best effort.
async fn show_progress(channel: &dyn Channel, chat_id: i64, action: ChatAction) {
    if let Err(e) = channel.send_action(chat_id, action).await {
        tracing::debug!(chat_id, action = action.as_str(), error = %e, "Chat action failed");
    }
}
