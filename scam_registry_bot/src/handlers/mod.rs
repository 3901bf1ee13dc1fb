use std::sync::Arc;

use registry_bot_commons::useful_methods::*;
use teloxide::{
    prelude::*,
    types::{CallbackQuery, Me, UserId},
    RequestError,
};

use crate::{
    actions,
    intake::{IntakeSessions, PhotoOutcome, Stage, TextOutcome},
    moderation::ModerationQueue,
    registry::Registry,
    types::ModerationAction,
    ADMIN_USER_ID,
};

pub mod commands;

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    registry: Arc<Registry>,
    sessions: Arc<IntakeSessions>,
    queue: Arc<ModerationQueue>,
) -> Result<(), RequestError> {
    let Some(sender) = &message.from else {
        // Channel posts and service messages can't drive reports.
        return Ok(());
    };
    if sender.id == me.id {
        return Ok(());
    }
    let sender_id = sender.id;

    if let Some(params) =
        commands::CommandParams::new(&bot, &me, &message, &registry, &sessions, &queue)
    {
        let text = params.message_text;
        match params.make_response() {
            Some(response) => return response.await,
            None => {
                // A command we don't know, or one meant for some other
                // bot. Don't feed it to a report conversation either.
                log::debug!("Ignoring unknown command: {}", text);
                return Ok(());
            }
        }
    }

    if !message.chat.is_private() {
        // Group chatter is none of our business.
        return Ok(());
    }

    handle_intake_message(&bot, &message, sender_id, &sessions).await
}

/// Feed a private non-command message to the sender's report
/// conversation, prompting for whatever the intake wants next.
async fn handle_intake_message(
    bot: &Bot,
    message: &Message,
    sender_id: UserId,
    sessions: &IntakeSessions,
) -> Result<(), RequestError> {
    if let Some(text) = message.text() {
        let response = match sessions.accept_text(sender_id, text) {
            TextOutcome::NoSession => concat!(
                "I didn't catch that. Use /send_report to report a scammer, ",
                "/search_scammer to check a name, or /list_scammers to see the registry."
            )
            .to_string(),
            TextOutcome::Advanced(Stage::Name) => {
                format!("Almost done. {}", Stage::Name.prompt())
            }
            TextOutcome::Advanced(Stage::Photos) => {
                format!("Excellent! {}", Stage::Photos.prompt())
            }
            TextOutcome::Advanced(stage) => format!("Thanks. {}", stage.prompt()),
            TextOutcome::Rejected(Stage::Photos) => format!(
                "I can't use text at this point.\n\n{}",
                Stage::Photos.prompt()
            ),
            TextOutcome::Rejected(stage) => {
                format!("I can't use an empty message here.\n\n{}", stage.prompt())
            }
        };

        bot.send_html_message(message.chat.id, &response, Some(message.id))
            .await?;
        return Ok(());
    }

    if let Some(photo) = message.find_biggest_photo() {
        let response = match sessions.accept_photo(sender_id, photo.file.id.clone()) {
            PhotoOutcome::NoSession => {
                // A stray photo with no conversation going. Not ours.
                return Ok(());
            }
            PhotoOutcome::Appended => concat!(
                "Photo received. Send more if you have them, ",
                "or use /finalize_photos to finish the report."
            )
            .to_string(),
            PhotoOutcome::WrongStage(stage) => format!(
                "I need <b>text</b> at this point, not a photo.\n\n{}",
                stage.prompt()
            ),
        };

        bot.send_html_message(message.chat.id, &response, Some(message.id))
            .await?;
        return Ok(());
    }

    // Stickers, voice messages, whatever else: if a report is going,
    // nudge the reporter back on track. Otherwise stay quiet.
    if let Some(stage) = sessions.stage_of(sender_id) {
        let response = match stage {
            Stage::Photos => format!("I can only take <b>photos</b> here.\n\n{}", stage.prompt()),
            _ => format!("I can only take <b>text</b> here.\n\n{}", stage.prompt()),
        };

        bot.send_html_message(message.chat.id, &response, Some(message.id))
            .await?;
    }

    Ok(())
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    registry: Arc<Registry>,
    queue: Arc<ModerationQueue>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        ($text:expr) => {
            bot.answer_callback_query(query.id).text($text).await?;
            return Ok(());
        };
        () => {
            bot.answer_callback_query(query.id).await?;
            return Ok(());
        };
    }

    let Some(query_data) = query.data.as_deref() else {
        goodbye!("No query data.");
    };

    if query.from.id != ADMIN_USER_ID {
        log::info!(
            "Unauthorized user pressing moderation buttons: {} (userid {})",
            query.from.full_name(),
            query.from.id
        );
        goodbye!("You don't have permission to perform this action.");
    }

    if query_data == ModerationAction::APPROVE_PLACEHOLDER {
        // The markup edit baking the real message id into the button
        // hasn't landed yet.
        goodbye!("This report is still being posted. Give it a second and try again.");
    }

    let action = match ModerationAction::from_str(query_data) {
        Ok(action) => action,
        Err(e) => {
            goodbye!(&format!("Invalid query data: {}", e));
        }
    };

    match action {
        ModerationAction::Approve(report_id) => {
            // The caption is only readable while telegram considers
            // the message accessible; without it the edit still gets
            // the status note.
            let caption = query
                .message
                .as_ref()
                .and_then(|message| message.regular_message())
                .and_then(|message| message.caption());

            let answer = actions::apply_approve(&bot, &registry, &queue, report_id, caption).await?;
            goodbye!(answer);
        }
        ModerationAction::Discard => {
            let Some(message) = query.message.as_ref().and_then(|m| m.regular_message()) else {
                // May happen if the message is too old.
                goodbye!("I can't see the message this button is on. Please delete it manually.");
            };

            let answer = actions::apply_discard(&bot, &queue, message.chat.id, message.id).await?;
            goodbye!(answer);
        }
    }
}
