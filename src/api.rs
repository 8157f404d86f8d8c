use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Duration;
use tracing::debug;

use crate::models::{ChatMode, Conversation, GalleryImage, User};

/// Assistant reply after boundary normalization. The backend's response key
/// and shape have varied across versions; nothing past this type sees that.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub image_url: Option<String>,
}

/// HTTP client for the quickGPT backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

/// Every endpoint reports `success` plus an optional human-readable
/// `message`, with the payload fields alongside. Application errors
/// (`success: false`) carry the server's message verbatim; insufficient
/// credits and misconfigured services arrive here.
fn accept<T: for<'de> Deserialize<'de>>(payload: Value) -> Result<T> {
    if !payload["success"].as_bool().unwrap_or(false) {
        let message = payload["message"].as_str().unwrap_or("Request failed");
        return Err(anyhow!(message.to_string()));
    }
    serde_json::from_value(payload).context("Malformed server response")
}

#[derive(Debug, Deserialize)]
struct UserBody {
    user: User,
}

#[derive(Debug, Deserialize)]
struct ChatsBody {
    chats: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    chat: Conversation,
}

#[derive(Debug, Deserialize)]
struct ImagesBody {
    images: Vec<GalleryImage>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_envelope<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("Authorization", &self.token)
            .send()
            .await
            .with_context(|| format!("Request to {path} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Server error ({status}): {text}"));
        }

        let payload: Value = response
            .json()
            .await
            .with_context(|| format!("Invalid response from {path}"))?;
        accept(payload)
    }

    pub async fn fetch_user(&self) -> Result<User> {
        let body: UserBody = self.get_envelope("/api/user/data").await?;
        Ok(body.user)
    }

    pub async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        let body: ChatsBody = self.get_envelope("/api/chat/get").await?;
        debug!(count = body.chats.len(), "fetched conversations");
        Ok(body.chats)
    }

    pub async fn create_conversation(&self) -> Result<Conversation> {
        let body: ChatBody = self.get_envelope("/api/chat/create").await?;
        Ok(body.chat)
    }

    pub async fn delete_conversation(&self, chat_id: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/api/chat/delete"))
            .header("Authorization", &self.token)
            .json(&serde_json::json!({ "chatId": chat_id }))
            .send()
            .await
            .context("Delete request failed")?;

        let payload: Value = response.json().await.context("Invalid delete response")?;
        if payload["success"].as_bool().unwrap_or(false) {
            Ok(payload["message"]
                .as_str()
                .unwrap_or("Chat deleted")
                .to_string())
        } else {
            Err(anyhow!(
                payload["message"]
                    .as_str()
                    .unwrap_or("Failed to delete chat")
                    .to_string()
            ))
        }
    }

    pub async fn fetch_published_images(&self) -> Result<Vec<GalleryImage>> {
        let body: ImagesBody = self.get_envelope("/api/user/published-images").await?;
        Ok(body.images)
    }

    /// Send a prompt and return the normalized assistant reply. The server
    /// deducts credits before answering; a rejection surfaces as an error
    /// carrying its message.
    pub async fn send_message(
        &self,
        chat_id: &str,
        prompt: &str,
        mode: ChatMode,
        is_published: bool,
    ) -> Result<AssistantReply> {
        let path = format!("/api/message/{}", mode.as_ref());
        let response = self
            .client
            .post(self.url(&path))
            .header("Authorization", &self.token)
            .json(&serde_json::json!({
                "chatId": chat_id,
                "prompt": prompt,
                "isPublished": is_published,
            }))
            .send()
            .await
            .context("Message request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Server error ({status}): {text}"));
        }

        let payload: Value = response.json().await.context("Invalid message response")?;
        let payload: Value = accept(payload)?;
        Ok(normalize_reply(&payload))
    }
}

/// Map the heterogeneous reply payload into one canonical shape. Older
/// server versions spelled the key `replay` and sometimes returned a bare
/// string instead of a message object.
pub fn normalize_reply(payload: &Value) -> AssistantReply {
    let candidates = [&payload["reply"], &payload["replay"]];

    let content = candidates
        .iter()
        .find_map(|v| v.get("content").and_then(Value::as_str))
        .or_else(|| candidates.iter().find_map(|v| v.as_str()))
        .unwrap_or("No response")
        .to_string();

    let image_url = candidates
        .iter()
        .find_map(|v| v.get("imageUrl").and_then(Value::as_str))
        .or_else(|| payload["imageUrl"].as_str())
        .map(str::to_string);

    AssistantReply { content, image_url }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_object_reply() {
        let reply = normalize_reply(&json!({
            "success": true,
            "reply": {"role": "assistant", "content": "hello there", "isImage": false}
        }));
        assert_eq!(reply.content, "hello there");
        assert!(reply.image_url.is_none());
    }

    #[test]
    fn normalizes_misspelled_replay_key() {
        let reply = normalize_reply(&json!({
            "success": true,
            "replay": {"content": "from the old server"}
        }));
        assert_eq!(reply.content, "from the old server");
    }

    #[test]
    fn normalizes_bare_string_reply() {
        let reply = normalize_reply(&json!({"success": true, "reply": "plain text"}));
        assert_eq!(reply.content, "plain text");

        let replay = normalize_reply(&json!({"success": true, "replay": "older plain text"}));
        assert_eq!(replay.content, "older plain text");
    }

    #[test]
    fn missing_reply_falls_back_to_placeholder() {
        let reply = normalize_reply(&json!({"success": true}));
        assert_eq!(reply.content, "No response");
        assert!(reply.image_url.is_none());
    }

    #[test]
    fn image_url_resolves_from_any_location() {
        let nested = normalize_reply(&json!({
            "reply": {"content": "https://ik.io/a.png", "imageUrl": "https://ik.io/a.png"}
        }));
        assert_eq!(nested.image_url.as_deref(), Some("https://ik.io/a.png"));

        let top_level = normalize_reply(&json!({
            "reply": {"content": "https://ik.io/b.png"},
            "imageUrl": "https://ik.io/b.png"
        }));
        assert_eq!(top_level.image_url.as_deref(), Some("https://ik.io/b.png"));
    }

    #[test]
    fn accept_rejects_application_errors_with_server_message() {
        let err = accept::<ChatsBody>(json!({
            "success": false,
            "message": "You don't have enough credits to use this feature"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("enough credits"));
    }

    #[test]
    fn accept_extracts_payload_fields() {
        let body: ChatsBody = accept(json!({
            "success": true,
            "message": "Chats fetched successfully",
            "chats": [{
                "_id": "c1",
                "name": "New Chat",
                "messages": [],
                "updatedAt": "2026-08-26T10:05:00.000Z"
            }]
        }))
        .unwrap();
        assert_eq!(body.chats.len(), 1);
        assert_eq!(body.chats[0].id, "c1");
    }

    #[test]
    fn accept_treats_missing_success_as_failure() {
        let err = accept::<ChatsBody>(json!({"chats": []})).unwrap_err();
        assert_eq!(err.to_string(), "Request failed");
    }
}
