use html_escape::encode_text;
use registry_bot_commons::teloxide_retry;
use teloxide::{
    payloads::{EditMessageCaptionSetters, EditMessageReplyMarkupSetters, SendPhotoSetters},
    prelude::Requester,
    sugar::request::RequestReplyExt,
    types::{
        ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, ParseMode, User,
    },
    ApiError, Bot, RequestError,
};

use crate::{
    moderation::ModerationQueue,
    registry::Registry,
    types::{FinishedReport, ModerationAction, PendingReport},
    ADMIN_USER_ID, REPORT_CHANNEL_ID,
};

/// The approve/discard button pair that goes under a report, with this
/// payload on the approve side.
fn report_buttons(approve_payload: String) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve".to_string(), approve_payload),
        InlineKeyboardButton::callback(
            "🗑 Discard".to_string(),
            ModerationAction::DISCARD_PAYLOAD.to_string(),
        ),
    ]])
}

fn submission_caption(reporter: &User, report: &FinishedReport) -> String {
    let username = match &reporter.username {
        Some(username) => format!("@{}", username),
        None => "not available".to_string(),
    };

    format!(
        concat!(
            "🚨 <b>NEW SCAM REPORT</b> 🚨\n\n",
            "<b>cam4 user:</b> {}\n",
            "<b>telegram user (reported):</b> {}\n",
            "<b>name (reported):</b> {}\n\n",
            "--- Reporter ---\n",
            "<b>telegram user:</b> {}\n",
            "<b>full name:</b> {}\n",
            "<b>user id:</b> {}"
        ),
        encode_text(&report.cam4_user),
        encode_text(&report.telegram_user),
        encode_text(&report.reported_name),
        encode_text(&username),
        encode_text(&reporter.full_name()),
        reporter.id,
    )
}

/// Post a finished report to the review channel and queue it for
/// moderation. Returns the id of the channel message carrying it.
///
/// The first photo carries the caption and the buttons. Telegram only
/// hands out the message id once the message is sent, so the approve
/// button is born with a placeholder payload and the markup is edited
/// right afterwards; the report is queued before that edit, so a press
/// can never find the queue entry missing while we're alive. Losing a
/// supplementary photo is logged and tolerated, since the report stays
/// actionable with whatever evidence made it through.
pub async fn post_submission(
    bot: &Bot,
    queue: &ModerationQueue,
    reporter: &User,
    report: FinishedReport,
) -> Result<MessageId, RequestError> {
    let caption = submission_caption(reporter, &report);
    let FinishedReport {
        cam4_user,
        telegram_user,
        reported_name,
        first_photo,
        extra_photos,
    } = report;

    let posted = teloxide_retry!(
        bot.send_photo(REPORT_CHANNEL_ID, InputFile::file_id(first_photo.clone()))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(report_buttons(
                ModerationAction::APPROVE_PLACEHOLDER.to_string(),
            ))
            .await
    )?;

    queue.register(
        posted.id,
        PendingReport {
            reported_name,
            reported_cam4: cam4_user,
            reported_telegram: telegram_user,
        },
    );

    // Now that the message exists, bake its id into the approve button.
    let markup_edit = teloxide_retry!(
        bot.edit_message_reply_markup(REPORT_CHANNEL_ID, posted.id)
            .reply_markup(report_buttons(ModerationAction::approve_payload(
                posted.id
            )))
            .await
    );
    match markup_edit {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => (),
        Err(e) => {
            // Discard still works, and approve presses are told to
            // retry for as long as the placeholder payload stays.
            log::error!(
                "Failed to put the real approve payload on message {}: {}",
                posted.id.0,
                e
            );
        }
    }

    for photo in extra_photos {
        let sent = teloxide_retry!(
            bot.send_photo(REPORT_CHANNEL_ID, InputFile::file_id(photo.clone()))
                .reply_to(posted.id)
                .await
        );
        if let Err(e) = sent {
            log::warn!(
                "Failed sending a supplementary photo for report {}: {}",
                posted.id.0,
                e
            );
            break;
        }
    }

    Ok(posted.id)
}

/// Merge the pending report behind `report_id` into the registry, then
/// rewrite the report message so it reads as handled. Returns the line
/// to show the admin in the callback answer.
///
/// Taking the report out of the queue is synchronous and happens
/// before the first await, so of two racing approve presses exactly
/// one merges and the other is told the report is gone.
pub async fn apply_approve(
    bot: &Bot,
    registry: &Registry,
    queue: &ModerationQueue,
    report_id: MessageId,
    caption: Option<&str>,
) -> Result<&'static str, RequestError> {
    let Some(report) = queue.take(report_id) else {
        log::info!(
            "Approve pressed for report {} but it has no queue entry.",
            report_id.0
        );
        append_to_report_caption(
            bot,
            report_id,
            caption,
            "⚠️ Report data not found. It may have already been handled, or it predates the bot's last restart.",
        )
        .await?;
        return Ok("Report data not found.");
    };

    let merged = registry.upsert(
        &report.reported_name,
        &report.reported_cam4,
        &report.reported_telegram,
    );
    log::info!("Approved report {}: {}", report_id.0, merged);

    let note = format!(
        "✔️ APPROVED and added to the registry ({})",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    );
    append_to_report_caption(bot, report_id, caption, &note).await?;

    Ok("Report approved.")
}

/// Delete a report message from the review channel and drop its queue
/// entry. Safe to repeat; a second press finds nothing left to remove.
/// Returns the line to show the admin in the callback answer.
pub async fn apply_discard(
    bot: &Bot,
    queue: &ModerationQueue,
    chat_id: ChatId,
    message_id: MessageId,
) -> Result<&'static str, RequestError> {
    match teloxide_retry!(bot.delete_message(chat_id, message_id).await) {
        Ok(_) => (),
        Err(RequestError::Api(ApiError::MessageIdInvalid | ApiError::MessageToDeleteNotFound)) => {
            // Someone already got rid of it. That's fine.
        }
        Err(RequestError::Api(ApiError::MessageCantBeDeleted)) => {
            // Keep the queue entry: the buttons are still on the
            // message, and the admin may approve it instead.
            log::warn!("Could not delete report message {}.", message_id.0);
            return Ok(concat!(
                "Telegram refused to delete the report message. ",
                "This bot may not be an admin with the ability to delete messages, ",
                "or the message is older than 48 hours."
            ));
        }
        Err(e) => return Err(e),
    }

    if queue.discard(message_id) {
        log::info!("Discarded pending report {}.", message_id.0);
    }

    Ok("Report discarded.")
}

/// Stick a status note under a report's caption and strip its buttons.
/// The edit is plain text, same as the Bot API returns the old caption.
async fn append_to_report_caption(
    bot: &Bot,
    report_id: MessageId,
    caption: Option<&str>,
    note: &str,
) -> Result<(), RequestError> {
    let caption = match caption {
        Some(caption) => format!("{}\n\n{}", caption, note),
        None => note.to_string(),
    };

    let edited = bot
        .edit_message_caption(REPORT_CHANNEL_ID, report_id)
        .caption(caption)
        .reply_markup(InlineKeyboardMarkup {
            inline_keyboard: Vec::new(),
        })
        .await;

    match edited {
        Ok(_) => Ok(()),
        // Same caption and markup as before; nothing to do.
        Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Reminds the admin about unhandled reports once a day.
pub async fn remind_about_pending_spinloop(bot: Bot, queue: std::sync::Weak<ModerationQueue>) {
    use tokio::time::{sleep, Duration};
    loop {
        let Some(queue) = queue.upgrade() else {
            // No more queue!
            return;
        };

        let pending_count = queue.pending_count();

        if pending_count > 0 {
            // No biggie if this fails, honestly.
            let _ = teloxide_retry!(
                bot.send_message(
                    ADMIN_USER_ID,
                    format!("There are {} reports awaiting moderation.", pending_count),
                )
                .await
            );
        }

        // Drop the upgraded queue.
        drop(queue);
        // Sleep for a day lol
        sleep(Duration::from_hours(24)).await;
    }
}
