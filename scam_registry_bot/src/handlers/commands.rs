use std::{future::Future, pin::Pin};

use html_escape::encode_text;
use registry_bot_commons::useful_methods::*;

use teloxide::{
    types::{BotCommand, Chat, Me, Message},
    Bot, RequestError,
};

use crate::{
    actions,
    intake::{BeginOutcome, FinalizeOutcome, IntakeSessions, Stage},
    moderation::ModerationQueue,
    registry::Registry,
    search::{self, SearchConfig, SearchOutcome},
    ADMIN_USER_ID,
};

pub const COMMANDS: &[Command] = &[
    START,
    SEND_REPORT,
    FINALIZE_PHOTOS,
    CANCEL,
    SEARCH_SCAMMER,
    LIST_SCAMMERS,
    ADD_SCAMMER,
];

pub type Ret = Result<(), RequestError>;
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Ret> + Send + 'a>>;

pub struct CommandParams<'a> {
    pub bot: &'a Bot,
    pub bot_me: &'a Me,
    pub message: &'a Message,
    pub message_text: &'a str,
    pub command_len: usize,
    pub registry: &'a Registry,
    pub sessions: &'a IntakeSessions,
    pub queue: &'a ModerationQueue,
}

impl<'a> CommandParams<'a> {
    /// Package a message up for command dispatch. Returns [`None`] if
    /// the message has no text or its text doesn't look like a command.
    /// Captions don't count; a command in a photo caption is just a
    /// caption.
    pub fn new<'new>(
        bot: &'new Bot,
        bot_me: &'new Me,
        message: &'new Message,
        registry: &'new Registry,
        sessions: &'new IntakeSessions,
        queue: &'new ModerationQueue,
    ) -> Option<CommandParams<'new>> {
        let message_text = message.text()?;

        if !message_text.starts_with('/') {
            return None;
        }

        let command = message_text.split_whitespace().next()?;

        if !command.is_ascii() {
            // Telegram commands must be ASCII.
            // See https://core.telegram.org/bots/api#botcommand
            return None;
        }

        let command_len = command.len();

        Some(CommandParams {
            bot,
            bot_me,
            message,
            message_text,
            command_len,
            registry,
            sessions,
            queue,
        })
    }

    /// Resolve the command and run it. Returns [`None`] if the command
    /// is unknown or explicitly addressed to some other bot.
    pub fn make_response(self) -> Option<CommandFuture<'a>> {
        // Commands shouldn't have an "@" in their callnames.
        // If the command is "/cancel@Scam_Registry_Bot",
        // trim the "@" and everything after it.
        let callname = if let Some(username_start) = self.command().find('@') {
            // While we're here, also check if the username is actually ours.
            // Bot names are guaranteed ASCII, so ignore ASCII case specifically.
            if !self.command()[username_start + '@'.len_utf8()..]
                .eq_ignore_ascii_case(self.bot_me.username())
            {
                // This command is not for us. Ignore.
                return None;
            }

            &self.command()[0..username_start]
        } else {
            self.command()
        };
        for command in COMMANDS {
            if command.is_matching_callname(callname) {
                if !command.usable_in(&self.message.chat) {
                    // A report conversation command in a group chat.
                    // Whatever session the sender has stays untouched.
                    return Some(Box::pin(redirect_to_private(self)));
                }
                return Some((command.function)(self));
            }
        }
        // No matching command found.
        None
    }

    /// The invocation itself: for `/add_scammer A; B; C` this is the
    /// substring `/add_scammer`.
    #[inline]
    pub fn command(&self) -> &str {
        &self.message_text[..self.command_len]
    }

    /// Everything after the invocation, with leading whitespace gone.
    #[inline]
    pub fn get_params(&self) -> &str {
        self.message_text[self.command_len..].trim_start()
    }
}

pub struct Command {
    pub callname: &'static str,
    pub description: &'static str,
    pub function: fn(CommandParams) -> CommandFuture,
    hidden: bool,
    /// Only runs in private chats; anywhere else gets a redirect hint
    /// instead of the command function.
    private_only: bool,
}

impl Command {
    /// Whether this command is allowed to run in this chat. Report
    /// conversations live in private chats, and so do the commands
    /// that drive them.
    pub fn usable_in(&self, chat: &Chat) -> bool {
        !self.private_only || chat.is_private()
    }

    pub fn is_matching_callname(&self, command: &str) -> bool {
        self.callname
            .split_ascii_whitespace()
            .next()
            .is_some_and(|x| x.eq_ignore_ascii_case(command))
    }

    pub fn generate_bot_commands() -> Vec<BotCommand> {
        let mut output = Vec::new();

        for command in COMMANDS {
            if command.hidden {
                continue;
            }
            let Some(callname) = command.callname.split_ascii_whitespace().next() else {
                continue;
            };

            // Cut off the /
            let callname = callname[1..].trim().to_string();
            let description = command
                .description
                .replace("&lt;", "<")
                .replace("&gt;", ">");

            output.push(BotCommand {
                command: callname,
                description,
            });
        }

        output
    }
}

///////////////////////////////////////
/////////////////COMMAND DEFINITIONS
///////////////////////////////////////

/// Wraps the function's return value in a pinning closure.
macro_rules! wrap {
    ($thing:expr) => {
        |cp| Box::pin($thing(cp))
    };
}

/// Reply in the command's chat, then be done with this command.
macro_rules! respond {
    ($cp:expr, $text:expr) => {
        $cp.bot
            .send_html_message($cp.message.chat.id, $text, Some($cp.message.id))
            .await?;
        return Ok(());
    };
}

/// What a private-only command answers when invoked anywhere else.
async fn redirect_to_private(cp: CommandParams<'_>) -> Ret {
    respond!(
        cp,
        "Report conversations happen in a private chat with me. Please talk to me there."
    );
}

pub const START: Command = Command {
    callname: "/start",
    description: "",
    function: wrap!(start),
    hidden: true,
    private_only: false,
};
async fn start(cp: CommandParams<'_>) -> Ret {
    if !cp.message.chat.is_private() {
        return Ok(());
    }

    respond!(
        cp,
        concat!(
            "Hi! I keep a registry of known cam scammers.\n\n",
            "Use /send_report to report one, ",
            "/search_scammer to check a name or username, ",
            "or /list_scammers to see everything on record."
        )
    );
}

pub const SEND_REPORT: Command = Command {
    callname: "/send_report",
    description: "Report a scammer, step by step.",
    function: wrap!(send_report),
    hidden: false,
    private_only: true,
};
async fn send_report(cp: CommandParams<'_>) -> Ret {
    let Some(user) = &cp.message.from else {
        return Ok(());
    };

    match cp.sessions.begin(user.id) {
        BeginOutcome::Started => {
            respond!(
                cp,
                &format!(
                    "Great! I need a few details for your report.\n\n{}",
                    Stage::Cam4.prompt()
                )
            );
        }
        BeginOutcome::AlreadyActive(stage) => {
            respond!(
                cp,
                &format!(
                    "You already have a report in progress. You can abort it with /cancel.\n\n{}",
                    stage.prompt()
                )
            );
        }
    }
}

pub const FINALIZE_PHOTOS: Command = Command {
    callname: "/finalize_photos",
    description: "Finish sending evidence and submit your report.",
    function: wrap!(finalize_photos),
    hidden: false,
    private_only: true,
};
async fn finalize_photos(cp: CommandParams<'_>) -> Ret {
    let Some(user) = &cp.message.from else {
        return Ok(());
    };

    let report = match cp.sessions.finalize(user.id) {
        FinalizeOutcome::NoSession => {
            respond!(cp, "No report in progress. Start one with /send_report.");
        }
        FinalizeOutcome::WrongStage(stage) => {
            respond!(
                cp,
                &format!("We're not at the photos yet.\n\n{}", stage.prompt())
            );
        }
        FinalizeOutcome::NoPhotosYet => {
            respond!(
                cp,
                "You haven't sent any photos yet. Please send at least one before finishing the report."
            );
        }
        FinalizeOutcome::Submitted(report) => report,
    };

    match actions::post_submission(cp.bot, cp.queue, user, report).await {
        Ok(posted_id) => {
            log::info!(
                "Report from userid {} went up for moderation as message {}.",
                user.id,
                posted_id.0
            );
            respond!(
                cp,
                "Thanks! Your report was sent to the moderators for review."
            );
        }
        Err(e) => {
            log::error!("Failed to post a report from userid {}: {}", user.id, e);
            respond!(
                cp,
                "There was an error sending your report. Please try again later with /send_report."
            );
        }
    }
}

pub const CANCEL: Command = Command {
    callname: "/cancel",
    description: "Abort the report you're writing.",
    function: wrap!(cancel),
    hidden: false,
    private_only: true,
};
async fn cancel(cp: CommandParams<'_>) -> Ret {
    let Some(user) = &cp.message.from else {
        return Ok(());
    };

    if cp.sessions.cancel(user.id) {
        respond!(
            cp,
            "Report cancelled. You can start a new one with /send_report."
        );
    } else {
        respond!(cp, "No report in progress.");
    }
}

pub const SEARCH_SCAMMER: Command = Command {
    callname: "/search_scammer &lt;name or username&gt;",
    description: "Fuzzy-search the registry.",
    function: wrap!(search_scammer),
    hidden: false,
    private_only: false,
};
async fn search_scammer(cp: CommandParams<'_>) -> Ret {
    use std::fmt::Write;

    let query = cp.get_params();
    if query.is_empty() {
        respond!(
            cp,
            concat!(
                "Give me a name or username to look for. ",
                "Example: <code>/search_scammer Juanita</code>"
            )
        );
    }

    let entities = cp.registry.snapshot();
    let response = match search::search(query, &entities, &SearchConfig::default()) {
        SearchOutcome::QueryTooShort => format!(
            "Please give me at least {} characters to search for.",
            search::MIN_QUERY_CHARS
        ),
        SearchOutcome::NothingToSearch => {
            "The scammer registry is empty; there is nothing to search yet.".to_string()
        }
        SearchOutcome::NoMatches { threshold } => format!(
            concat!(
                "No registered scammer matched \"{}\" with a similarity of {}% or more.\n\n",
                "Try a different spelling if you expected a hit."
            ),
            encode_text(query),
            threshold
        ),
        SearchOutcome::Matches(matches) => {
            let mut response = String::from("Approximate matches found:\n");
            for entity in &matches {
                let name = match entity.name.is_empty() {
                    true => "(unknown)",
                    false => entity.name.as_str(),
                };
                let cam4 = match entity.cam4_aliases.is_empty() {
                    true => "N/A".to_string(),
                    false => entity.cam4_aliases.join(", "),
                };
                let telegram = match entity.telegram_aliases.is_empty() {
                    true => "N/A".to_string(),
                    false => entity.telegram_aliases.join(", "),
                };

                let _ = write!(
                    &mut response,
                    "\n<b>Name:</b> {}\n<b>cam4:</b> {}\n<b>telegram:</b> {}\n",
                    encode_text(name),
                    encode_text(&cam4),
                    encode_text(&telegram),
                );
            }
            response
        }
    };

    respond!(cp, &response);
}

pub const LIST_SCAMMERS: Command = Command {
    callname: "/list_scammers",
    description: "List every registered name and alias.",
    function: wrap!(list_scammers),
    hidden: false,
    private_only: false,
};
async fn list_scammers(cp: CommandParams<'_>) -> Ret {
    let entities = cp.registry.snapshot();
    if entities.is_empty() {
        respond!(cp, "The scammer registry is empty.");
    }

    // BTreeSets alphabetize and dedup in one go.
    let mut names = std::collections::BTreeSet::new();
    let mut cam4s = std::collections::BTreeSet::new();
    let mut telegrams = std::collections::BTreeSet::new();
    for entity in &entities {
        if !entity.name.is_empty() {
            names.insert(entity.name.as_str());
        }
        cam4s.extend(entity.cam4_aliases.iter().map(String::as_str));
        telegrams.extend(entity.telegram_aliases.iter().map(String::as_str));
    }

    let mut response = String::from("--- Scammer registry ---\n");
    push_alias_section(&mut response, "Full names", &names);
    push_alias_section(&mut response, "cam4 users", &cam4s);
    push_alias_section(&mut response, "telegram users", &telegrams);

    respond!(cp, &response);
}

fn push_alias_section(
    output: &mut String,
    title: &str,
    items: &std::collections::BTreeSet<&str>,
) {
    use std::fmt::Write;

    if items.is_empty() {
        let _ = write!(output, "\n<b>{}:</b> (none registered)\n", title);
        return;
    }

    let _ = write!(output, "\n<b>{}:</b>\n", title);
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(output, "{}. {}", i + 1, encode_text(item));
    }
}

pub const ADD_SCAMMER: Command = Command {
    callname: "/add_scammer &lt;full name&gt;; &lt;cam4 user&gt;; &lt;telegram user&gt;",
    description: "Add an entry to the registry directly, skipping moderation.",
    function: wrap!(add_scammer),
    hidden: true,
    private_only: false,
};
async fn add_scammer(cp: CommandParams<'_>) -> Ret {
    let Some(user) = &cp.message.from else {
        return Ok(());
    };

    if user.id != ADMIN_USER_ID {
        log::info!(
            "Unauthorized user trying to edit the registry: {} (userid {})",
            user.full_name(),
            user.id
        );
        respond!(cp, "You don't have permission to use this command.");
    }

    if cp.get_params().is_empty() {
        respond!(
            cp,
            concat!(
                "Wrong format. Use: ",
                "<code>/add_scammer Full Name; cam4_user; @telegram_user</code>"
            )
        );
    }

    // Keep empty parts: "Name;;" legitimately means "no known aliases".
    let parts: Vec<&str> = cp.get_params().split(';').map(str::trim).collect();

    let (name, cam4, telegram) = match parts.as_slice() {
        [name, cam4, telegram, ..] if !name.is_empty() => (*name, *cam4, *telegram),
        _ => {
            respond!(
                cp,
                concat!(
                    "Missing data. I need the full name, the cam4 user and the telegram user, ",
                    "separated by \";\". Either user may be left blank."
                )
            );
        }
    };

    let merged = cp.registry.upsert(name, cam4, telegram);
    log::info!("Registry edited directly: {}", merged);

    respond!(cp, &encode_text(&merged.to_string()));
}
