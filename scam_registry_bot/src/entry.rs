use std::{fs, sync::Arc};
use teloxide::{dptree::deps, prelude::*};

use crate::{
    actions::remind_about_pending_spinloop,
    handlers::{commands::Command, handle_callback_query, handle_message},
    intake::IntakeSessions,
    moderation::ModerationQueue,
    registry::Registry,
};

/// # Panics
///
/// Panics if there's no key file
pub async fn entry() {
    log::info!("ASYNC WOOOO");
    let key = fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .expect("Could not load bot key file!");

    let bot = Bot::new(key);

    bot.set_my_commands(Command::generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    let registry = Registry::new();
    let sessions = IntakeSessions::new();
    let queue = ModerationQueue::new();

    tokio::spawn(remind_about_pending_spinloop(
        bot.clone(),
        Arc::downgrade(&queue),
    ));

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().branch(dptree::endpoint(handle_message)))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![registry, sessions, queue])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
