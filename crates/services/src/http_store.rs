use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quiz_core::AttemptPayload;
use quiz_core::model::{AttemptId, UserId};
use storage::repository::{AttemptStore, StorageError};

use crate::error::HttpStoreError;

#[derive(Clone, Debug)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl HttpStoreConfig {
    /// Reads `QUIZ_API_BASE_URL` (required) and `QUIZ_API_TOKEN` (optional).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUIZ_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_token = env::var("QUIZ_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self {
            base_url,
            api_token,
        })
    }

    fn attempts_url(&self) -> String {
        format!("{}/quiz/attempts", self.base_url.trim_end_matches('/'))
    }
}

/// Remote persistence endpoint for finished attempts.
#[derive(Clone)]
pub struct HttpAttemptStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpAttemptStore {
    #[must_use]
    pub fn new(config: HttpStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// POST the payload and return the stored attempt id.
    ///
    /// # Errors
    ///
    /// Returns `HttpStoreError` when the request fails, the endpoint answers with
    /// a non-success status, or the response carries no attempt id.
    pub async fn post_attempt(
        &self,
        user: &UserId,
        payload: &AttemptPayload,
    ) -> Result<AttemptId, HttpStoreError> {
        let body = AttemptRequest {
            user_id: user.as_str(),
            attempt: payload,
        };

        let mut request = self.client.post(self.config.attempts_url()).json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(HttpStoreError::HttpStatus(response.status()));
        }

        let body: AttemptResponse = response.json().await?;
        body.attempt_id
            .filter(|id| !id.trim().is_empty())
            .map(AttemptId::new)
            .ok_or(HttpStoreError::MissingAttemptId)
    }
}

#[async_trait]
impl AttemptStore for HttpAttemptStore {
    async fn save_attempt(
        &self,
        user: &UserId,
        payload: &AttemptPayload,
    ) -> Result<AttemptId, StorageError> {
        Ok(self.post_attempt(user, payload).await?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttemptRequest<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    attempt: &'a AttemptPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptResponse {
    attempt_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_url_trims_trailing_slash() {
        let config = HttpStoreConfig {
            base_url: "https://api.example.com/v1/".into(),
            api_token: None,
        };
        assert_eq!(config.attempts_url(), "https://api.example.com/v1/quiz/attempts");
    }

    #[test]
    fn request_flattens_payload_next_to_user() {
        let payload = AttemptPayload {
            module: "quiz".into(),
            total_questions: 3,
            correct_answers: 2,
            score_percentage: 67,
            time_taken: 12,
            question_results: Vec::new(),
        };
        let body = AttemptRequest {
            user_id: "u-9",
            attempt: &payload,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["userId"], "u-9");
        assert_eq!(json["module"], "quiz");
        assert_eq!(json["scorePercentage"], 67);
    }

    #[test]
    fn response_accepts_attempt_id() {
        let body: AttemptResponse = serde_json::from_str(r#"{"attemptId":"abc"}"#).unwrap();
        assert_eq!(body.attempt_id.as_deref(), Some("abc"));
        let body: AttemptResponse = serde_json::from_str("{}").unwrap();
        assert!(body.attempt_id.is_none());
    }
}
