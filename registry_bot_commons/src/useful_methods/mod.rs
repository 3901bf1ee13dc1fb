use std::future::Future;

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::{RequestLinkPreviewExt, RequestReplyExt},
    types::{ChatId, Message, MessageId, PhotoSize},
    Bot, RequestError,
};

pub trait MessageStuff {
    /// The largest of the thumbnail sizes Telegram generated for a photo
    /// message, if this is one.
    fn find_biggest_photo(&self) -> Option<&PhotoSize>;
}

impl MessageStuff for Message {
    fn find_biggest_photo(&self) -> Option<&PhotoSize> {
        if let Some(photo_sizes) = self.photo() {
            photo_sizes.iter().max_by_key(|x| x.width + x.height)
        } else {
            None
        }
    }
}

pub trait BotStuff {
    /// Send an HTML-formatted message with link previews off, optionally
    /// as a reply. Any user-provided text must be escaped by the caller.
    fn send_html_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> impl Future<Output = Result<Message, RequestError>> + Send;
}

impl BotStuff for Bot {
    async fn send_html_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message, RequestError> {
        let mut request = self
            .send_message(chat, text)
            .parse_mode(teloxide::types::ParseMode::Html)
            .disable_link_preview(true);

        if let Some(reply_to) = reply_to {
            request = request.reply_to(reply_to);
        }

        request.await
    }
}
