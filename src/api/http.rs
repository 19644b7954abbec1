use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::PollService;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::{log_failure, log_request, log_response, RequestId};
use crate::model::{
    poll::{NewPoll, Poll},
    results::VoteResult,
    user::{Credentials, ProfileUpdate, Registration, User},
    vote::{StatusResponse, VoteRequest},
    UserId,
};

const USER_ID_HEADER: &str = "x-user-id";
const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// [`PollService`] over the service's REST API.
#[derive(Debug, Clone)]
pub struct HttpPollService {
    client: Client,
    base_url: String,
    /// Sent as `X-User-Id` on requests made on a user's behalf.
    user_id: Option<UserId>,
}

impl HttpPollService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url().to_string(),
            user_id: None,
        })
    }

    /// Act on behalf of `user` from now on.
    pub fn authenticate(&mut self, user: &User) {
        self.user_id = Some(user.id.clone());
    }

    pub fn sign_out(&mut self) {
        self.user_id = None;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn user_headers(&self) -> Result<HeaderMap> {
        let user_id = self.user_id.as_deref().ok_or(Error::Unauthenticated)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_ID_HEADER,
            user_id.parse().map_err(|_| Error::Unauthenticated)?,
        );
        Ok(headers)
    }

    /// Send a request, logging both ends, and turn any non-2xx answer into [`Error::Api`].
    async fn send<F>(&self, method: Method, path: &str, build: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder + Send,
    {
        let id = RequestId::next();
        log_request(id, &method, path);
        let request = build(self.client.request(method, format!("{}{path}", self.base_url)));

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                log_failure(id, path, &err);
                return Err(err.into());
            }
        };

        let status = response.status();
        log_response(id, status, path);
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Api {
                status,
                message: error_message(status, &body),
            })
        }
    }

    async fn send_json<T, F>(&self, method: Method, path: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder + Send,
    {
        let bytes = self.send(method, path, build).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn normalize_user(&self, mut user: User) -> User {
        user.avatar_url = user
            .avatar_url
            .map(|url| absolute_url(&self.base_url, &url));
        user
    }
}

#[async_trait]
impl PollService for HttpPollService {
    async fn list_polls(&self) -> Result<Vec<Poll>> {
        self.send_json(Method::GET, "/polls", |r| r).await
    }

    async fn get_poll(&self, poll_id: &str) -> Result<Poll> {
        self.send_json(Method::GET, &format!("/polls/{poll_id}"), |r| r)
            .await
    }

    async fn create_poll(&self, poll: &NewPoll) -> Result<Poll> {
        self.send_json(Method::POST, "/polls", |r| r.json(poll))
            .await
    }

    async fn delete_poll(&self, poll_id: &str) -> Result<StatusResponse> {
        let headers = self.user_headers()?;
        self.send_json(Method::DELETE, &format!("/polls/{poll_id}"), |r| {
            r.headers(headers)
        })
        .await
    }

    async fn cast_vote(&self, poll_id: &str, vote: &VoteRequest) -> Result<StatusResponse> {
        self.send_json(Method::POST, &format!("/polls/{poll_id}/vote"), |r| {
            r.json(vote)
        })
        .await
    }

    async fn get_results(&self, poll_id: &str) -> Result<VoteResult> {
        let mut result: VoteResult = self
            .send_json(Method::GET, &format!("/polls/{poll_id}/results"), |r| r)
            .await?;
        for voter in result
            .results
            .iter_mut()
            .flat_map(|tally| tally.voters.iter_mut().flatten())
        {
            voter.avatar_url = voter
                .avatar_url
                .take()
                .map(|url| absolute_url(&self.base_url, &url));
        }
        Ok(result)
    }

    async fn export_results_csv(&self, poll_id: &str) -> Result<String> {
        let response = self
            .send(Method::GET, &format!("/polls/{poll_id}/results"), |r| {
                r.query(&[("format", "csv")])
            })
            .await?;
        Ok(response.text().await?)
    }

    async fn login(&self, credentials: &Credentials) -> Result<User> {
        let user = self
            .send_json(Method::POST, "/auth/login", |r| r.json(credentials))
            .await?;
        Ok(self.normalize_user(user))
    }

    async fn register(&self, registration: &Registration) -> Result<User> {
        let token = registration.admin_token.clone();
        let user = self
            .send_json(Method::POST, "/auth/register", |r| {
                let r = r.json(registration);
                match token {
                    Some(token) => r.header(ADMIN_TOKEN_HEADER, token),
                    None => r,
                }
            })
            .await?;
        Ok(self.normalize_user(user))
    }

    async fn get_profile(&self) -> Result<User> {
        let headers = self.user_headers()?;
        let user = self
            .send_json(Method::GET, "/me", |r| r.headers(headers))
            .await?;
        Ok(self.normalize_user(user))
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let headers = self.user_headers()?;
        let user = self
            .send_json(Method::PUT, "/me", |r| r.headers(headers).json(update))
            .await?;
        Ok(self.normalize_user(user))
    }
}

/// Resolve a service-relative URL (e.g. an uploaded avatar) against the base URL.
pub fn absolute_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:") {
        url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

/// The most useful description of a failed response: the service's `detail`
/// field, else the raw body, else the status's reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        match fields.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(Value::Null) | None => {}
            Some(detail) => return detail.to_string(),
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or_else(|| status.as_str())
        .to_string()
}
