//! The external poll/auth service and the client-side operations built on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    pagination::{Page, Pagination},
    poll::{NewPoll, Poll, StatusFilter},
    results::VoteResult,
    user::{Credentials, ProfileUpdate, Registration, User},
    vote::{StatusResponse, VoteRequest},
};

pub mod auth;
pub mod http;

pub use auth::AuthContext;
pub use http::HttpPollService;

/// Operations offered by the poll service. Implementations report every
/// failure as an opaque [`crate::error::Error`]; nothing here is retried.
#[async_trait]
pub trait PollService: Send + Sync {
    async fn list_polls(&self) -> Result<Vec<Poll>>;

    async fn get_poll(&self, poll_id: &str) -> Result<Poll>;

    async fn create_poll(&self, poll: &NewPoll) -> Result<Poll>;

    /// Requires a signed-in admin.
    async fn delete_poll(&self, poll_id: &str) -> Result<StatusResponse>;

    async fn cast_vote(&self, poll_id: &str, vote: &VoteRequest) -> Result<StatusResponse>;

    async fn get_results(&self, poll_id: &str) -> Result<VoteResult>;

    /// The results table rendered as CSV by the service.
    async fn export_results_csv(&self, poll_id: &str) -> Result<String>;

    async fn login(&self, credentials: &Credentials) -> Result<User>;

    async fn register(&self, registration: &Registration) -> Result<User>;

    /// Requires a signed-in user.
    async fn get_profile(&self) -> Result<User>;

    /// Requires a signed-in user.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User>;
}

/// Fetch all polls, keep those matching `filter` at `now`, and cut out the requested page.
pub async fn browse_polls<S>(
    service: &S,
    filter: StatusFilter,
    pagination: Pagination,
    now: DateTime<Utc>,
) -> Result<Page<Poll>>
where
    S: PollService + ?Sized,
{
    let polls = service
        .list_polls()
        .await?
        .into_iter()
        .filter(|poll| filter.matches(poll, now))
        .collect();
    Ok(pagination.apply(polls))
}
