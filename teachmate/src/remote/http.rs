//! HTTP implementation of [`TaskRemote`] for the hosted task resource.
//!
//! Addresses the collection as `{base_url}/{tasks_path}/` and single tasks
//! as `{base_url}/{tasks_path}/{id}`. Non-success responses are mapped to
//! [`TransportError::Status`] with the `detail` field of the JSON error body
//! when the server supplied one.

use serde::de::DeserializeOwned;
use teachmate_proto::{ErrorBody, NewTask, Task, TaskId};

use super::{TaskRemote, TransportError};
use crate::config::ApiConfig;
use crate::session::Session;

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Task resource reached over HTTP.
///
/// Can only be built from an authenticated [`Session`]; the session's user
/// is attached to every request span.
#[derive(Debug, Clone)]
pub struct HttpTaskRemote {
    client: reqwest::Client,
    collection_url: String,
    session: Session,
}

impl HttpTaskRemote {
    /// Creates a remote for the configured API.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the HTTP client cannot be
    /// initialised (e.g. TLS backend failure).
    pub fn new(api: &ApiConfig, session: Session) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = api.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            collection_url: api.collection_url(),
            session,
        })
    }

    /// URL of the task collection (with trailing slash).
    #[must_use]
    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    /// URL of a single task.
    #[must_use]
    pub fn item_url(&self, id: &TaskId) -> String {
        format!("{}{}", self.collection_url, id.as_path_segment())
    }

    /// The session this remote acts for.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}

impl TaskRemote for HttpTaskRemote {
    async fn list(&self) -> Result<Vec<Task>, TransportError> {
        tracing::debug!(user = %self.session.user_id(), url = %self.collection_url, "GET tasks");
        let response = self.client.get(&self.collection_url).send().await?;
        read_json(response).await
    }

    async fn create(&self, task: &NewTask) -> Result<Task, TransportError> {
        tracing::debug!(user = %self.session.user_id(), title = %task.title, "POST task");
        let response = self
            .client
            .post(&self.collection_url)
            .json(task)
            .send()
            .await?;
        read_json(response).await
    }

    async fn update(&self, task: &Task) -> Result<Task, TransportError> {
        tracing::debug!(user = %self.session.user_id(), id = %task.id, "PUT task");
        let response = self
            .client
            .put(self.item_url(&task.id))
            .json(task)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TransportError> {
        tracing::debug!(user = %self.session.user_id(), %id, "DELETE task");
        let response = self.client.delete(self.item_url(id)).send().await?;
        check_status(response).await.map(drop)
    }
}

/// Maps a non-success response to [`TransportError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail_text());
    tracing::debug!(status = status.as_u16(), ?detail, "task resource returned an error");
    Err(TransportError::Status {
        status: status.as_u16(),
        detail,
    })
}

/// Checks the status and decodes a JSON body.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}
