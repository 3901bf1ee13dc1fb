//! Source code for Scam Registry Bot, a Telegram bot keeping a
//! crowd-sourced, moderated registry of known cam scammers.

/// Various types used throughout.
mod types;

/// The scammer registry and its JSON file persistence.
mod registry;

/// Fuzzy matching of queries against registry entries.
mod search;

/// Per-user report intake conversations.
mod intake;

/// Reports waiting for the administrator's verdict.
mod moderation;

/// Functions that perform stuff via the bot.
mod actions;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

use teloxide::types::{ChatId, UserId};

/// The single administrator of the registry. Only they may approve or
/// discard submitted reports, or add entries directly.
pub static ADMIN_USER_ID: UserId = UserId(491271283);

/// A private channel where finished reports land with their evidence
/// photos and the approve/discard buttons.
pub static REPORT_CHANNEL_ID: ChatId = ChatId(-1001847261854);
