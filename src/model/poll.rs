use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine;
use crate::model::{PollId, UserId, VariantId};

/// How many variants a voter may pick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Exactly one variant.
    Single,
    /// Up to `max_selections` variants.
    Multi,
}

/// One selectable option within a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub label: String,
}

/// A poll as described by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    /// Poll unique ID.
    pub id: PollId,
    /// Poll question.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Votes are accepted strictly before this instant, if set.
    #[serde(
        rename = "deadlineISO",
        default,
        with = "crate::model::deadline",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<DateTime<Utc>>,
    /// Single or multi choice.
    #[serde(rename = "type")]
    pub mode: SelectionMode,
    /// Candidate variants, in display order.
    pub variants: Vec<Variant>,
    /// Selection cap for multi polls. Ignored for single polls.
    #[serde(default = "default_max_selections")]
    pub max_selections: u32,
    /// Whether results hide who voted for what.
    #[serde(default = "default_anonymous")]
    pub is_anonymous: bool,
    /// Creator, if the service recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<UserId>,
}

fn default_max_selections() -> u32 {
    1
}

fn default_anonymous() -> bool {
    true
}

impl Poll {
    /// Look up a variant by ID.
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Whether the given user created this poll.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_user_id.as_deref() == Some(user_id)
    }

    /// Where this poll is in its lifecycle at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> PollStatus {
        PollStatus::of(self, now)
    }
}

/// Lifecycle status shown next to a poll in listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Has a deadline in the future.
    Active,
    /// Deadline has passed; no more votes.
    Completed,
    /// Open indefinitely.
    NoDeadline,
}

impl PollStatus {
    pub fn of(poll: &Poll, now: DateTime<Utc>) -> Self {
        if engine::is_closed(poll, now) {
            Self::Completed
        } else if poll.deadline.is_some() {
            Self::Active
        } else {
            Self::NoDeadline
        }
    }
}

impl Display for PollStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::NoDeadline => "no deadline",
        };
        write!(f, "{label}")
    }
}

/// Listing filter over [`PollStatus`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn matches(&self, poll: &Poll, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Active => poll.status(now) == PollStatus::Active,
            Self::Completed => poll.status(now) == PollStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status filter '{0}', expected one of: all, active, completed")]
pub struct UnknownStatusFilter(String);

impl FromStr for StatusFilter {
    type Err = UnknownStatusFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(UnknownStatusFilter(s.to_string())),
        }
    }
}

/// Reasons a new poll is refused before it is sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollSpecError {
    #[error("Poll title must not be empty")]
    EmptyTitle,
    #[error("Provide at least two variants (got {0})")]
    TooFewVariants(usize),
    #[error("Deadline must be in the future")]
    DeadlineInPast,
    #[error("Multi-choice polls must allow at least one selection")]
    InvalidMaxSelections,
}

/// A poll creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPoll {
    /// Poll question.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional voting deadline.
    #[serde(
        rename = "deadlineISO",
        default,
        with = "crate::model::deadline",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<DateTime<Utc>>,
    /// Single or multi choice.
    #[serde(rename = "type")]
    pub mode: SelectionMode,
    /// Variant labels; the service assigns IDs.
    pub variants: Vec<String>,
    /// Selection cap.
    pub max_selections: u32,
    /// Whether results hide who voted for what.
    pub is_anonymous: bool,
    /// Creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<UserId>,
}

impl NewPoll {
    /// Check the request and normalise it into what the service expects:
    /// trimmed text, no blank variants, and a cap of 1 for single polls.
    pub fn validate(mut self, now: DateTime<Utc>) -> Result<Self, PollSpecError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(PollSpecError::EmptyTitle);
        }
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.variants = self
            .variants
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if self.variants.len() < 2 {
            return Err(PollSpecError::TooFewVariants(self.variants.len()));
        }
        if matches!(self.deadline, Some(deadline) if deadline <= now) {
            return Err(PollSpecError::DeadlineInPast);
        }
        match self.mode {
            SelectionMode::Single => self.max_selections = 1,
            SelectionMode::Multi if self.max_selections < 1 => {
                return Err(PollSpecError::InvalidMaxSelections)
            }
            SelectionMode::Multi => {}
        }
        Ok(self)
    }
}
