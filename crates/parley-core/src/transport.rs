use std::future::Future;

use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::TransportError;

/// Shown when the endpoint answered but carried no reply text.
pub const UNPROCESSABLE_REPLY: &str = "Sorry, I couldn't process your request.";

/// Shown for any network, status, or decoding failure.
pub const CONNECTION_FALLBACK: &str =
    "Sorry, I'm having trouble connecting to the server. Please check your API configuration.";

/// Reply fields in lookup order.
const REPLY_FIELDS: [&str; 2] = ["message", "response"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    conversation_id: &'a str,
}

/// Sends one user message to the assistant and resolves to the text to show.
///
/// Implementations never fail: errors are turned into displayable text.
pub trait Transport: Send + Sync {
    fn send(&self, text: &str, conversation_id: &str) -> impl Future<Output = String> + Send;
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Single POST to the endpoint. `Ok(None)` means the body was JSON but had
    /// no usable reply field.
    pub async fn query(
        &self,
        text: &str,
        conversation_id: &str,
    ) -> Result<Option<String>, TransportError> {
        let request = ChatRequest {
            message: text,
            conversation_id,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        let body = response.bytes().await?;
        // Anything other than a JSON object (`null`, arrays, bare strings) is a decode failure
        let payload: Map<String, Value> = serde_json::from_slice(&body)?;
        Ok(extract_reply(&payload))
    }
}

impl Transport for ChatClient {
    async fn send(&self, text: &str, conversation_id: &str) -> String {
        debug!(conversation_id, endpoint = %self.endpoint, "sending chat message");

        match self.query(text, conversation_id).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                warn!(conversation_id, "assistant reply had no message field");
                UNPROCESSABLE_REPLY.to_string()
            }
            Err(e) => {
                warn!(conversation_id, error = %e, "chat request failed");
                CONNECTION_FALLBACK.to_string()
            }
        }
    }
}

/// Pull the reply text out of the endpoint's JSON body. Empty strings count
/// as missing.
fn extract_reply(payload: &Map<String, Value>) -> Option<String> {
    REPLY_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
