use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    api::error::ApiError,
    domain::{activity::Activity, conversation::ConversationSummary, message::Message},
    infra::config::ApiConfig,
    usecases::contracts::{ApiSourceError, ConversationApi},
};

const API_PREFIX: &str = "api/v1/";
const TEXT_CONTENT_TYPE: &str = "text";

const API_REQUEST_FAILED: &str = "API_REQUEST_FAILED";
const API_UNEXPECTED_STATUS: &str = "API_UNEXPECTED_STATUS";
const API_DECODE_FAILED: &str = "API_DECODE_FAILED";

#[derive(Debug, Deserialize)]
struct MessagesEnvelope {
    #[serde(default)]
    messages: Option<Vec<Message>>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    content: &'a str,
    content_type: &'a str,
}

/// REST client for the inbox API, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpConversationApi {
    client: Client,
    base: Url,
    token: String,
}

impl HttpConversationApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(ApiError::Client)?;

        Self::with_client(client, &config.base_url, &config.token)
    }

    pub fn with_client(client: Client, base_url: &str, token: &str) -> Result<Self, ApiError> {
        let raw = format!("{}/{API_PREFIX}", base_url.trim_end_matches('/'));
        let base = Url::parse(&raw).map_err(|error| ApiError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: error.to_string(),
        })?;

        Ok(Self {
            client,
            base,
            token: token.to_owned(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiSourceError> {
        let url = self.base.join(path).map_err(|error| {
            tracing::warn!(code = API_REQUEST_FAILED, path, error = %error, "invalid api path");
            ApiSourceError::InvalidData
        })?;

        Ok(self
            .client
            .request(method, url)
            .bearer_auth(&self.token))
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<reqwest::Response, ApiSourceError> {
        let response = request.send().await.map_err(|error| {
            tracing::warn!(
                code = API_REQUEST_FAILED,
                path,
                error = %error.without_url(),
                "api request failed"
            );
            ApiSourceError::Unavailable
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        tracing::warn!(
            code = API_UNEXPECTED_STATUS,
            path,
            status = status.as_u16(),
            "api answered with error status"
        );
        Err(map_status(status))
    }

    async fn fetch_json<T>(&self, request: RequestBuilder, path: &str) -> Result<T, ApiSourceError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, path).await?;
        response.json::<T>().await.map_err(|error| {
            tracing::warn!(
                code = API_DECODE_FAILED,
                path,
                error = %error.without_url(),
                "api response did not decode"
            );
            ApiSourceError::InvalidData
        })
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<(), ApiSourceError> {
        self.send(request, path).await.map(|_| ())
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_conversations(
        &self,
        inbox_id: Option<i64>,
    ) -> Result<Vec<ConversationSummary>, ApiSourceError> {
        let path = "conversations";
        let mut request = self.request(Method::GET, path)?;
        if let Some(inbox_id) = inbox_id {
            request = request.query(&[("inbox_id", inbox_id)]);
        }

        let conversations: Option<Vec<ConversationSummary>> = self.fetch_json(request, path).await?;
        Ok(conversations.unwrap_or_default())
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>, ApiSourceError> {
        let path = format!("conversation/{conversation_id}/messages");
        let request = self.request(Method::GET, &path)?;

        let envelope: MessagesEnvelope = self.fetch_json(request, &path).await?;
        Ok(envelope.messages.unwrap_or_default())
    }

    async fn list_activities(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<Activity>, ApiSourceError> {
        let path = format!("conversations/{conversation_id}/activities");
        let request = self.request(Method::GET, &path)?;

        let activities: Option<Vec<Activity>> = self.fetch_json(request, &path).await?;
        Ok(activities.unwrap_or_default())
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, ApiSourceError> {
        let path = format!("conversation/{conversation_id}/messages");
        let request = self.request(Method::POST, &path)?.json(&OutgoingMessage {
            content,
            content_type: TEXT_CONTENT_TYPE,
        });

        self.fetch_json(request, &path).await
    }

    async fn mark_read(&self, conversation_id: i64) -> Result<(), ApiSourceError> {
        let path = format!("conversation/{conversation_id}/read");
        let request = self.request(Method::POST, &path)?;
        self.execute(request, &path).await
    }

    async fn delete_conversation(&self, conversation_id: i64) -> Result<(), ApiSourceError> {
        let path = format!("conversations/{conversation_id}");
        let request = self.request(Method::DELETE, &path)?;
        self.execute(request, &path).await
    }

    async fn clear_inbox(&self, inbox_id: i64) -> Result<(), ApiSourceError> {
        let path = format!("inbox-clear/{inbox_id}");
        let request = self.request(Method::POST, &path)?;
        self.execute(request, &path).await
    }
}

fn map_status(status: StatusCode) -> ApiSourceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiSourceError::Unauthorized,
        StatusCode::NOT_FOUND => ApiSourceError::NotFound,
        status if status.is_server_error() => ApiSourceError::Unavailable,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => ApiSourceError::Unavailable,
        _ => ApiSourceError::InvalidData,
    }
}
