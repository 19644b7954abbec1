//! A single user's voting session on a single poll.
//!
//! The session owns the in-progress [`Selection`] and walks it through
//! `Browsing -> Selecting -> Confirming -> Submitted`. Any rejection sends it
//! back to `Selecting` with the reason recorded.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use thiserror::Error;

use crate::api::PollService;
use crate::engine::{self, SelectionError};
use crate::error::Error;
use crate::model::{poll::Poll, selection::Selection, user::User, vote::VoteRequest};

/// States in the voting lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No poll open.
    Browsing,
    /// A poll is open and the selection may change.
    Selecting,
    /// Waiting for the user to confirm the selection.
    Confirming,
    /// The vote was accepted. Terminal until another poll is opened.
    Submitted,
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Browsing => "browsing",
            Self::Selecting => "selecting",
            Self::Confirming => "confirming",
            Self::Submitted => "submitted",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Refused locally; nothing was sent.
    #[error(transparent)]
    Rejected(#[from] SelectionError),
    #[error("Cannot {action} while {actual}")]
    InvalidPhase {
        action: &'static str,
        actual: SessionPhase,
    },
    /// The service failed or refused the vote.
    #[error(transparent)]
    Service(#[from] Error),
}

/// Explicit voting context, passed to whoever handles user input.
#[derive(Debug, Clone)]
pub struct VotingSession {
    poll: Option<Poll>,
    selection: Selection,
    phase: SessionPhase,
    last_rejection: Option<SelectionError>,
}

impl Default for VotingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VotingSession {
    pub fn new() -> Self {
        Self {
            poll: None,
            selection: Selection::new(),
            phase: SessionPhase::Browsing,
            last_rejection: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn poll(&self) -> Option<&Poll> {
        self.poll.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The most recent local rejection, cleared by the next successful step.
    pub fn last_rejection(&self) -> Option<&SelectionError> {
        self.last_rejection.as_ref()
    }

    /// Open `poll` for voting. Any previous selection is discarded.
    pub fn open(&mut self, poll: Poll) {
        debug!("Opening poll {} for voting", poll.id);
        self.poll = Some(poll);
        self.selection = Selection::new();
        self.phase = SessionPhase::Selecting;
        self.last_rejection = None;
    }

    /// Navigate away, discarding the poll and selection.
    pub fn close(&mut self) {
        self.poll = None;
        self.selection = Selection::new();
        self.phase = SessionPhase::Browsing;
        self.last_rejection = None;
    }

    /// Toggle a variant in the selection.
    pub fn toggle(&mut self, variant_id: &str, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Selecting, "change the selection")?;
        let poll = self.active_poll("change the selection")?;
        let verdict = if engine::is_closed(poll, now) {
            Err(SelectionError::PollClosed)
        } else if poll.variant(variant_id).is_none() {
            Err(SelectionError::UnknownVariant(variant_id.to_string()))
        } else {
            engine::toggle_choice(poll, &self.selection, variant_id)
        };
        match verdict {
            Ok(selection) => {
                self.selection = selection;
                self.last_rejection = None;
                Ok(())
            }
            Err(reason) => Err(self.reject(reason)),
        }
    }

    /// Whether the current selection would pass submission checks.
    pub fn can_submit(&self, now: DateTime<Utc>) -> bool {
        match (&self.poll, self.phase) {
            (Some(poll), SessionPhase::Selecting | SessionPhase::Confirming) => {
                engine::validate_submission(poll, &self.selection, now).is_ok()
            }
            _ => false,
        }
    }

    /// Validate the selection and move to the confirmation checkpoint.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Selecting, "confirm")?;
        let verdict = engine::validate_submission(self.active_poll("confirm")?, &self.selection, now);
        if let Err(reason) = verdict {
            return Err(self.reject(reason));
        }
        self.phase = SessionPhase::Confirming;
        self.last_rejection = None;
        Ok(())
    }

    /// Back out of confirmation, keeping the selection.
    pub fn cancel_confirmation(&mut self) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Confirming, "cancel confirmation")?;
        self.phase = SessionPhase::Selecting;
        Ok(())
    }

    /// Cast the vote as `user`.
    ///
    /// From `Selecting` the selection is validated first. From `Confirming`
    /// it was validated on entry and is sent as is. On any failure the
    /// session returns to `Selecting` with the selection intact.
    pub async fn submit<S>(
        &mut self,
        service: &S,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError>
    where
        S: PollService + ?Sized,
    {
        match self.phase {
            SessionPhase::Selecting => {
                let verdict =
                    engine::validate_submission(self.active_poll("submit")?, &self.selection, now);
                if let Err(reason) = verdict {
                    return Err(self.reject(reason));
                }
            }
            SessionPhase::Confirming => {}
            actual => {
                return Err(SessionError::InvalidPhase {
                    action: "submit",
                    actual,
                })
            }
        }

        let poll_id = self.active_poll("submit")?.id.clone();
        let vote = VoteRequest {
            user_id: user.id.clone(),
            choices: self.selection.to_choices(),
        };
        info!(
            "Submitting {} choice(s) for poll {} as {}",
            vote.choices.len(),
            poll_id,
            user.id
        );

        match service.cast_vote(&poll_id, &vote).await {
            Ok(_) => {
                info!("Vote for poll {poll_id} accepted");
                self.selection = Selection::new();
                self.phase = SessionPhase::Submitted;
                self.last_rejection = None;
                Ok(())
            }
            Err(err) => {
                warn!("Vote for poll {poll_id} failed: {err}");
                self.phase = SessionPhase::Selecting;
                Err(SessionError::Service(err))
            }
        }
    }

    fn expect_phase(&self, expected: SessionPhase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                action,
                actual: self.phase,
            })
        }
    }

    fn active_poll(&self, action: &'static str) -> Result<&Poll, SessionError> {
        self.poll.as_ref().ok_or(SessionError::InvalidPhase {
            action,
            actual: self.phase,
        })
    }

    fn reject(&mut self, reason: SelectionError) -> SessionError {
        debug!("Selection rejected: {reason}");
        self.phase = SessionPhase::Selecting;
        self.last_rejection = Some(reason.clone());
        SessionError::Rejected(reason)
    }
}
