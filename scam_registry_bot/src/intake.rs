use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use teloxide::types::{FileId, UserId};

use crate::types::{FinishedReport, IntakeState, ReportDraft};

/// Which piece of the report the bot wants from a user right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cam4,
    Telegram,
    Name,
    Photos,
}

impl Stage {
    /// The canonical "what to send now" line for this stage.
    pub fn prompt(self) -> &'static str {
        match self {
            Stage::Cam4 => "Send the <b>cam4 username or profile link</b> of the scammer:",
            Stage::Telegram => "Send the <b>telegram username</b> they use (e.g. @pepito):",
            Stage::Name => {
                "Send the <b>full name of the model/scammer</b> (e.g. Juana Pérez):"
            }
            Stage::Photos => concat!(
                "Send <b>photos</b> proving your report (you can send several). ",
                "Make sure the transfer is visible in the chat, and crop out or blur ",
                "your personal data first.\n\n",
                "When you have sent all of them, use /finalize_photos"
            ),
        }
    }
}

impl IntakeState {
    fn stage(&self) -> Stage {
        match self {
            IntakeState::AwaitingCam4 => Stage::Cam4,
            IntakeState::AwaitingTelegram { .. } => Stage::Telegram,
            IntakeState::AwaitingName { .. } => Stage::Name,
            IntakeState::AwaitingPhotos(_) => Stage::Photos,
        }
    }
}

/// What starting a report did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    /// This user already has a report going; re-ask for this stage.
    AlreadyActive(Stage),
}

/// What a plain text message did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOutcome {
    /// No session; the text wasn't for us.
    NoSession,
    /// Stored and moved on; ask for this next.
    Advanced(Stage),
    /// Unusable at this stage; ask for it again.
    Rejected(Stage),
}

/// What a photo did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoOutcome {
    NoSession,
    /// Appended to the draft's evidence.
    Appended,
    /// Not collecting photos right now; re-ask for this stage.
    WrongStage(Stage),
}

/// What trying to finish a report did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    NoSession,
    /// Not at the photo stage yet; re-ask for this one.
    WrongStage(Stage),
    /// At the photo stage with nothing sent; keep collecting.
    NoPhotosYet,
    /// The finished report, already removed from the session map.
    /// Posting it somewhere is the caller's job.
    Submitted(FinishedReport),
}

/// Live report intake conversations, keyed by the reporting user.
///
/// Everything here is synchronous under one lock, so each incoming
/// message observes and changes a session atomically.
pub struct IntakeSessions {
    sessions: Mutex<HashMap<UserId, IntakeState>>,
}

impl IntakeSessions {
    pub fn new() -> Arc<IntakeSessions> {
        Arc::new(IntakeSessions {
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, IntakeState>> {
        self.sessions.lock().expect("Intake lock is poisoned!")
    }

    /// Start a report for this user, unless one is already going.
    pub fn begin(&self, user: UserId) -> BeginOutcome {
        let mut sessions = self.lock();
        match sessions.get(&user) {
            Some(state) => BeginOutcome::AlreadyActive(state.stage()),
            None => {
                sessions.insert(user, IntakeState::AwaitingCam4);
                BeginOutcome::Started
            }
        }
    }

    /// Feed a text message to this user's session, if any.
    pub fn accept_text(&self, user: UserId, text: &str) -> TextOutcome {
        let mut sessions = self.lock();
        let Some(state) = sessions.get_mut(&user) else {
            return TextOutcome::NoSession;
        };

        let text = text.trim();
        if text.is_empty() {
            return TextOutcome::Rejected(state.stage());
        }

        match state {
            IntakeState::AwaitingCam4 => {
                *state = IntakeState::AwaitingTelegram {
                    cam4_user: text.to_string(),
                };
                TextOutcome::Advanced(Stage::Telegram)
            }
            IntakeState::AwaitingTelegram { cam4_user } => {
                *state = IntakeState::AwaitingName {
                    cam4_user: std::mem::take(cam4_user),
                    telegram_user: text.to_string(),
                };
                TextOutcome::Advanced(Stage::Name)
            }
            IntakeState::AwaitingName {
                cam4_user,
                telegram_user,
            } => {
                *state = IntakeState::AwaitingPhotos(ReportDraft {
                    cam4_user: std::mem::take(cam4_user),
                    telegram_user: std::mem::take(telegram_user),
                    reported_name: text.to_string(),
                    photos: Vec::new(),
                });
                TextOutcome::Advanced(Stage::Photos)
            }
            IntakeState::AwaitingPhotos(_) => TextOutcome::Rejected(Stage::Photos),
        }
    }

    /// Feed a photo to this user's session, if any.
    pub fn accept_photo(&self, user: UserId, photo: FileId) -> PhotoOutcome {
        let mut sessions = self.lock();
        let Some(state) = sessions.get_mut(&user) else {
            return PhotoOutcome::NoSession;
        };

        match state {
            IntakeState::AwaitingPhotos(draft) => {
                draft.photos.push(photo);
                PhotoOutcome::Appended
            }
            other => PhotoOutcome::WrongStage(other.stage()),
        }
    }

    /// End photo collection and hand the draft over.
    ///
    /// On success the session is gone before this returns, so a cancel
    /// or second finalize racing us finds no session instead of
    /// submitting the same report twice.
    pub fn finalize(&self, user: UserId) -> FinalizeOutcome {
        let mut sessions = self.lock();

        match sessions.remove(&user) {
            None => FinalizeOutcome::NoSession,
            Some(IntakeState::AwaitingPhotos(draft)) if !draft.photos.is_empty() => {
                let ReportDraft {
                    cam4_user,
                    telegram_user,
                    reported_name,
                    mut photos,
                } = draft;
                let first_photo = photos.remove(0);

                FinalizeOutcome::Submitted(FinishedReport {
                    cam4_user,
                    telegram_user,
                    reported_name,
                    first_photo,
                    extra_photos: photos,
                })
            }
            Some(state) => {
                // Not ready yet; the session stays.
                let outcome = match &state {
                    IntakeState::AwaitingPhotos(_) => FinalizeOutcome::NoPhotosYet,
                    other => FinalizeOutcome::WrongStage(other.stage()),
                };
                sessions.insert(user, state);
                outcome
            }
        }
    }

    /// Throw this user's session away. True if there was one.
    pub fn cancel(&self, user: UserId) -> bool {
        self.lock().remove(&user).is_some()
    }

    /// The stage this user's session is at, if they have one.
    pub fn stage_of(&self, user: UserId) -> Option<Stage> {
        self.lock().get(&user).map(IntakeState::stage)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const REPORTER: UserId = UserId(1234);

    fn file_id(name: &str) -> FileId {
        FileId(name.to_string())
    }

    /// Drive a session up to the photo stage.
    fn reach_photos(sessions: &IntakeSessions, user: UserId) {
        assert_eq!(sessions.begin(user), BeginOutcome::Started);
        assert_eq!(
            sessions.accept_text(user, "juanita_c4"),
            TextOutcome::Advanced(Stage::Telegram)
        );
        assert_eq!(
            sessions.accept_text(user, "@juanita"),
            TextOutcome::Advanced(Stage::Name)
        );
        assert_eq!(
            sessions.accept_text(user, "Juana Pérez"),
            TextOutcome::Advanced(Stage::Photos)
        );
    }

    #[test]
    fn full_flow_produces_a_draft() {
        let sessions = IntakeSessions::new();
        reach_photos(&sessions, REPORTER);

        assert_eq!(
            sessions.accept_photo(REPORTER, file_id("photo-1")),
            PhotoOutcome::Appended
        );
        assert_eq!(
            sessions.accept_photo(REPORTER, file_id("photo-2")),
            PhotoOutcome::Appended
        );

        let FinalizeOutcome::Submitted(report) = sessions.finalize(REPORTER) else {
            panic!("expected a submitted report");
        };

        assert_eq!(report.cam4_user, "juanita_c4");
        assert_eq!(report.telegram_user, "@juanita");
        assert_eq!(report.reported_name, "Juana Pérez");
        // The first photo sent is the one split out to carry the
        // caption; the rest follow in order.
        assert_eq!(report.first_photo, file_id("photo-1"));
        assert_eq!(report.extra_photos, vec![file_id("photo-2")]);

        // Submitting ended the session.
        assert_eq!(sessions.stage_of(REPORTER), None);
        assert_eq!(sessions.finalize(REPORTER), FinalizeOutcome::NoSession);
    }

    #[test]
    fn wrong_kind_of_message_does_not_advance() {
        let sessions = IntakeSessions::new();
        assert_eq!(sessions.begin(REPORTER), BeginOutcome::Started);

        // A photo while text is expected changes nothing.
        assert_eq!(
            sessions.accept_photo(REPORTER, file_id("early")),
            PhotoOutcome::WrongStage(Stage::Cam4)
        );
        assert_eq!(sessions.stage_of(REPORTER), Some(Stage::Cam4));

        // Whitespace-only text changes nothing either.
        assert_eq!(
            sessions.accept_text(REPORTER, "   "),
            TextOutcome::Rejected(Stage::Cam4)
        );

        // The session still advances normally afterwards.
        assert_eq!(
            sessions.accept_text(REPORTER, "juanita_c4"),
            TextOutcome::Advanced(Stage::Telegram)
        );
    }

    #[test]
    fn text_during_photo_collection_is_rejected() {
        let sessions = IntakeSessions::new();
        reach_photos(&sessions, REPORTER);

        sessions.accept_photo(REPORTER, file_id("photo-1"));
        assert_eq!(
            sessions.accept_text(REPORTER, "one more thing"),
            TextOutcome::Rejected(Stage::Photos)
        );

        // The stray text didn't end up in the report.
        let FinalizeOutcome::Submitted(report) = sessions.finalize(REPORTER) else {
            panic!("expected a submitted report");
        };
        assert_eq!(report.first_photo, file_id("photo-1"));
        assert!(report.extra_photos.is_empty());
    }

    #[test]
    fn finalizing_without_photos_keeps_collecting() {
        let sessions = IntakeSessions::new();
        reach_photos(&sessions, REPORTER);

        assert_eq!(sessions.finalize(REPORTER), FinalizeOutcome::NoPhotosYet);
        assert_eq!(sessions.stage_of(REPORTER), Some(Stage::Photos));

        sessions.accept_photo(REPORTER, file_id("photo-1"));
        assert!(matches!(
            sessions.finalize(REPORTER),
            FinalizeOutcome::Submitted(_)
        ));
    }

    #[test]
    fn finalizing_too_early_reports_the_stage() {
        let sessions = IntakeSessions::new();
        assert_eq!(sessions.begin(REPORTER), BeginOutcome::Started);
        assert_eq!(
            sessions.finalize(REPORTER),
            FinalizeOutcome::WrongStage(Stage::Cam4)
        );

        sessions.accept_text(REPORTER, "juanita_c4");
        assert_eq!(
            sessions.finalize(REPORTER),
            FinalizeOutcome::WrongStage(Stage::Telegram)
        );
    }

    #[test]
    fn cancel_discards_everything() {
        let sessions = IntakeSessions::new();
        reach_photos(&sessions, REPORTER);
        sessions.accept_photo(REPORTER, file_id("photo-1"));

        assert!(sessions.cancel(REPORTER));
        assert_eq!(sessions.stage_of(REPORTER), None);
        assert_eq!(
            sessions.accept_text(REPORTER, "anything"),
            TextOutcome::NoSession
        );

        // Cancelling again has nothing to do.
        assert!(!sessions.cancel(REPORTER));
    }

    #[test]
    fn beginning_twice_reports_the_current_stage() {
        let sessions = IntakeSessions::new();
        assert_eq!(sessions.begin(REPORTER), BeginOutcome::Started);
        assert_eq!(
            sessions.begin(REPORTER),
            BeginOutcome::AlreadyActive(Stage::Cam4)
        );

        sessions.accept_text(REPORTER, "juanita_c4");
        assert_eq!(
            sessions.begin(REPORTER),
            BeginOutcome::AlreadyActive(Stage::Telegram)
        );
    }

    #[test]
    fn sessions_are_independent_per_user() {
        let other = UserId(5678);
        let sessions = IntakeSessions::new();

        reach_photos(&sessions, REPORTER);
        assert_eq!(sessions.begin(other), BeginOutcome::Started);

        assert_eq!(sessions.stage_of(REPORTER), Some(Stage::Photos));
        assert_eq!(sessions.stage_of(other), Some(Stage::Cam4));

        assert!(sessions.cancel(other));
        assert_eq!(sessions.stage_of(REPORTER), Some(Stage::Photos));
    }
}
