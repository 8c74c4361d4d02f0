//! Microsoft Graph client for the work calendar.
//!
//! Creates, moves, and deletes the busy blocks. Payloads are
//! content-free: a fixed subject, the time range, and a hidden
//! identity marker in the body so a human opening the block sees
//! nothing about the personal event.

use async_trait::async_trait;
use calmask_core::{BusyBlock, CalendarClient, RemoteError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    subject: String,
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

impl GraphClient {
    pub fn new(access_token: String, subject: String) -> GraphClient {
        GraphClient {
            http: reqwest::Client::new(),
            base_url: GRAPH_BASE.to_string(),
            access_token,
            subject,
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: String) -> GraphClient {
        GraphClient {
            http: reqwest::Client::new(),
            base_url,
            access_token: "test-token".to_string(),
            subject: "Personal Commitment".to_string(),
        }
    }

    fn event_payload(&self, block: &BusyBlock) -> serde_json::Value {
        json!({
            "subject": self.subject,
            "body": {
                "contentType": "html",
                "content": format!(
                    "Synced from personal calendar.<p style=\"display:none;\">SourceUID::{}</p>",
                    block.identity
                ),
            },
            "start": graph_time(block.start),
            "end": graph_time(block.end),
            "showAs": "busy",
            "isReminderOn": false,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RemoteError::transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

fn graph_time(dt: DateTime<Utc>) -> serde_json::Value {
    json!({
        "dateTime": dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "timeZone": "UTC",
    })
}

/// Throttling, timeouts, and server errors are worth retrying on the
/// next run; everything else means the request itself is bad.
fn classify_status(status: reqwest::StatusCode, body: &str) -> RemoteError {
    let message = format!("HTTP {status}: {body}");
    if status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        RemoteError::transient(message)
    } else {
        RemoteError::permanent(message)
    }
}

#[async_trait]
impl CalendarClient for GraphClient {
    async fn create_event(&self, block: &BusyBlock) -> Result<String, RemoteError> {
        let response = self
            .send(
                self.http
                    .post(format!("{}/me/events", self.base_url))
                    .json(&self.event_payload(block)),
            )
            .await?;

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|e| RemoteError::permanent(format!("unexpected create response: {e}")))?;

        Ok(created.id)
    }

    async fn update_event(
        &self,
        target_event_id: &str,
        block: &BusyBlock,
    ) -> Result<(), RemoteError> {
        self.send(
            self.http
                .patch(format!("{}/me/events/{target_event_id}", self.base_url))
                .json(&json!({
                    "start": graph_time(block.start),
                    "end": graph_time(block.end),
                })),
        )
        .await?;

        Ok(())
    }

    async fn delete_event(&self, target_event_id: &str) -> Result<(), RemoteError> {
        let result = self
            .send(
                self.http
                    .delete(format!("{}/me/events/{target_event_id}", self.base_url)),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            // Already gone: the desired end state holds
            Err(e) if e.message.starts_with("HTTP 404") => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calmask_core::Identity;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn block() -> BusyBlock {
        let start = Utc.with_ymd_and_hms(2025, 8, 18, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 8, 18, 10, 0, 0).unwrap();
        BusyBlock {
            identity: Identity::derive(Some("m1"), start, end, chrono::Duration::minutes(5)),
            start,
            end,
        }
    }

    #[tokio::test]
    async fn test_create_returns_target_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/events"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "evt-1"})))
            .mount(&server)
            .await;

        let client = GraphClient::with_base_url(server.uri());
        let id = client.create_event(&block()).await.unwrap();
        assert_eq!(id, "evt-1");
    }

    #[tokio::test]
    async fn test_create_payload_is_content_free() {
        let server = MockServer::start().await;
        let expected = json!({
            "subject": "Personal Commitment",
            "body": {
                "contentType": "html",
                "content": "Synced from personal calendar.<p style=\"display:none;\">SourceUID::uid:m1</p>",
            },
            "start": {"dateTime": "2025-08-18T09:00:00", "timeZone": "UTC"},
            "end": {"dateTime": "2025-08-18T10:00:00", "timeZone": "UTC"},
            "showAs": "busy",
            "isReminderOn": false,
        });
        Mock::given(method("POST"))
            .and(path("/me/events"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "evt-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = GraphClient::with_base_url(server.uri());
        client.create_event(&block()).await.unwrap();
    }

    #[tokio::test]
    async fn test_throttling_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/events"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GraphClient::with_base_url(server.uri());
        let err = client.create_event(&block()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/me/events/evt-1"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid payload"))
            .mount(&server)
            .await;

        let client = GraphClient::with_base_url(server.uri());
        let err = client.update_event("evt-1", &block()).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message.contains("invalid payload"));
    }

    #[tokio::test]
    async fn test_delete_of_missing_event_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/me/events/evt-gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GraphClient::with_base_url(server.uri());
        assert!(client.delete_event("evt-gone").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/me/events/evt-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = GraphClient::with_base_url(server.uri());
        assert!(client.delete_event("evt-1").await.is_ok());
    }
}
