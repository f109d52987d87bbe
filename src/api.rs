use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::errors::{ClientError, CONNECTION_FAILED};
use crate::models::{
    ConversationDetail, ConversationListItem, CreateConversationResponse, ErrorBody,
    SendMessageRequest, SendMessageResponse, SentimentSummary,
};

/// Remote conversation service. Each call is a stateless request/response.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn create_conversation(&self) -> Result<CreateConversationResponse, ClientError>;

    async fn list_conversations(&self) -> Result<Vec<ConversationListItem>, ClientError>;

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ClientError>;

    async fn send_message(
        &self,
        id: &str,
        text: &str,
        image: Option<&str>,
    ) -> Result<SendMessageResponse, ClientError>;

    async fn get_conversation_sentiment(&self, id: &str) -> Result<SentimentSummary, ClientError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), ClientError>;
}

/// JSON-over-HTTP implementation of [`ConversationApi`].
#[derive(Clone)]
pub struct HttpConversationApi {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpConversationApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Initialization {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let resp = self.authorize(request).send().await.map_err(|e| {
            error!("Request failed: {e}");
            if e.is_connect() || e.is_timeout() {
                ClientError::network(CONNECTION_FAILED)
            } else {
                ClientError::network(format!("Network error: {e}"))
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| "An error occurred".to_string());
        debug!("Service returned {status}: {body}");
        Err(ClientError::Server { status: status.as_u16(), message })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode { message: e.to_string() })
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn create_conversation(&self) -> Result<CreateConversationResponse, ClientError> {
        self.json(self.client.post(self.url("/conversations"))).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationListItem>, ClientError> {
        self.json(self.client.get(self.url("/conversations"))).await
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ClientError> {
        self.json(self.client.get(self.url(&format!("/conversations/{id}"))))
            .await
    }

    async fn send_message(
        &self,
        id: &str,
        text: &str,
        image: Option<&str>,
    ) -> Result<SendMessageResponse, ClientError> {
        let body = SendMessageRequest {
            message: text.to_string(),
            image: image.map(str::to_string),
        };
        let request = self
            .client
            .post(self.url(&format!("/conversations/{id}/messages")))
            .json(&body);
        self.json(request).await
    }

    async fn get_conversation_sentiment(&self, id: &str) -> Result<SentimentSummary, ClientError> {
        self.json(self.client.get(self.url(&format!("/conversations/{id}/sentiment"))))
            .await
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ClientError> {
        self.execute(self.client.delete(self.url(&format!("/conversations/{id}"))))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ClientConfig {
            api_base_url: "http://localhost:5000/api/".into(),
            ..ClientConfig::default()
        };
        let api = HttpConversationApi::new(&config).unwrap();
        assert_eq!(api.url("/conversations"), "http://localhost:5000/api/conversations");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transient() {
        let config = ClientConfig {
            // Port 9 (discard) is not expected to be listening.
            api_base_url: "http://127.0.0.1:9/api".into(),
            request_timeout: std::time::Duration::from_secs(2),
            ..ClientConfig::default()
        };
        let api = HttpConversationApi::new(&config).unwrap();
        let err = api.get_conversation("c1").await.unwrap_err();
        assert!(err.is_transient());
    }
}
