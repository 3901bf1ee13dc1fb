use std::fmt::Display;

use serde::{Deserialize, Serialize};
use teloxide::types::{FileId, MessageId};

/// One known scammer: a display name plus every handle they were seen
/// using, per platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScammerEntity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cam4_aliases: Vec<String>,
    #[serde(default)]
    pub telegram_aliases: Vec<String>,
}

impl ScammerEntity {
    /// The key entities are merged by. Aliases stay case-sensitive,
    /// names don't.
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// A finished report sitting in the moderation queue. Keyed externally
/// by the id of the channel message carrying its first photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReport {
    pub reported_name: String,
    pub reported_cam4: String,
    pub reported_telegram: String,
}

/// Everything a reporter has told us so far within one intake
/// conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDraft {
    pub cam4_user: String,
    pub telegram_user: String,
    pub reported_name: String,
    pub photos: Vec<FileId>,
}

/// A draft that made it through photo collection. The first photo is
/// split out, so a finished report always has at least one; it's the
/// photo that carries the caption and the moderation buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedReport {
    pub cam4_user: String,
    pub telegram_user: String,
    pub reported_name: String,
    pub first_photo: FileId,
    pub extra_photos: Vec<FileId>,
}

/// Where a reporter is in the intake conversation. One per user at a
/// time; finishing or cancelling removes the entry entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeState {
    AwaitingCam4,
    AwaitingTelegram {
        cam4_user: String,
    },
    AwaitingName {
        cam4_user: String,
        telegram_user: String,
    },
    AwaitingPhotos(ReportDraft),
}

/// A platform alias newly attached to an entity by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddedAlias {
    Cam4(String),
    Telegram(String),
}

/// What an upsert did to the registry. Displays as a plain-text summary;
/// escape it before embedding into HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    Created {
        name: String,
        cam4: Option<String>,
        telegram: Option<String>,
    },
    Merged {
        name: String,
        added: Vec<AddedAlias>,
    },
}

impl Display for MergeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeResult::Created {
                name,
                cam4,
                telegram,
            } => {
                write!(f, "Added {} to the registry", name)?;
                match (cam4, telegram) {
                    (Some(cam4), Some(telegram)) => {
                        write!(f, " (cam4: {}, telegram: {})", cam4, telegram)
                    }
                    (Some(cam4), None) => write!(f, " (cam4: {})", cam4),
                    (None, Some(telegram)) => write!(f, " (telegram: {})", telegram),
                    (None, None) => Ok(()),
                }
            }
            MergeResult::Merged { name, added } => {
                if added.is_empty() {
                    write!(
                        f,
                        "{} is already registered, with no new aliases to add",
                        name
                    )
                } else {
                    write!(f, "Updated {}: added", name)?;
                    for (i, alias) in added.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        match alias {
                            AddedAlias::Cam4(alias) => write!(f, " cam4 alias {}", alias)?,
                            AddedAlias::Telegram(alias) => write!(f, " telegram alias {}", alias)?,
                        }
                    }
                    Ok(())
                }
            }
        }
    }
}

/// What an admin pressed on a report message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    /// Merge the pending report behind this channel message id into the
    /// registry.
    Approve(MessageId),
    /// Delete the report message and drop its pending entry, if any.
    Discard,
}

impl ModerationAction {
    /// Payload the approve button is born with, before the real message
    /// id is known. Refuses to parse on purpose.
    pub const APPROVE_PLACEHOLDER: &'static str = "approve:pending";

    /// Payload for the discard button. Carries no id: discard resolves
    /// against whatever message it is attached to.
    pub const DISCARD_PAYLOAD: &'static str = "discard";

    /// Callback payload approving the report behind this channel message.
    pub fn approve_payload(message_id: MessageId) -> String {
        format!("approve:{}", message_id.0)
    }

    pub fn from_str(value: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if value == Self::DISCARD_PAYLOAD {
            return Ok(ModerationAction::Discard);
        }

        let Some(id) = value.strip_prefix("approve:") else {
            Err("Unknown action type")?
        };

        let id: i32 = id.parse().map_err(|_| "Failed to parse message id")?;

        Ok(ModerationAction::Approve(MessageId(id)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn action_payloads_round_trip() {
        let action =
            ModerationAction::from_str(&ModerationAction::approve_payload(MessageId(417))).unwrap();
        assert_eq!(action, ModerationAction::Approve(MessageId(417)));

        let action = ModerationAction::from_str(ModerationAction::DISCARD_PAYLOAD).unwrap();
        assert_eq!(action, ModerationAction::Discard);

        assert!(ModerationAction::from_str(ModerationAction::APPROVE_PLACEHOLDER).is_err());
        assert!(ModerationAction::from_str("approve:").is_err());
        assert!(ModerationAction::from_str("approve:4.5").is_err());
        assert!(ModerationAction::from_str("explode").is_err());
    }

    #[test]
    fn merge_result_summaries() {
        let created = MergeResult::Created {
            name: "Jane Doe".to_string(),
            cam4: Some("link1".to_string()),
            telegram: None,
        };
        assert_eq!(
            created.to_string(),
            "Added Jane Doe to the registry (cam4: link1)"
        );

        let merged = MergeResult::Merged {
            name: "Jane Doe".to_string(),
            added: vec![
                AddedAlias::Cam4("link2".to_string()),
                AddedAlias::Telegram("@jd".to_string()),
            ],
        };
        assert_eq!(
            merged.to_string(),
            "Updated Jane Doe: added cam4 alias link2, telegram alias @jd"
        );

        let nothing = MergeResult::Merged {
            name: "Jane Doe".to_string(),
            added: Vec::new(),
        };
        assert_eq!(
            nothing.to_string(),
            "Jane Doe is already registered, with no new aliases to add"
        );
    }
}
