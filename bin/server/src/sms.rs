//! Outbound SMS.
//!
//! [`HttpSmsSender`] posts messages to a JSON gateway. Without a gateway
//! configured the server falls back to [`LoggingSender`], which only
//! records that a message would have gone out.

use async_trait::async_trait;
use serde::Serialize;
use ssfi_platform_access::{DeliveryError, NotificationSender};
use std::time::Duration;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    message: &'a str,
}

/// Sends messages through an HTTP gateway with bearer authentication.
#[derive(Clone)]
pub struct HttpSmsSender {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSmsSender {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(endpoint: String, api_key: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl NotificationSender for HttpSmsSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&OutboundMessage { to: phone, message })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, endpoint = %self.endpoint, "SMS gateway unreachable");
                DeliveryError {
                    reason: if e.is_timeout() {
                        "gateway timed out".to_string()
                    } else {
                        "gateway unreachable".to_string()
                    },
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, endpoint = %self.endpoint, "SMS gateway rejected message");
            return Err(DeliveryError {
                reason: format!("gateway returned {status}"),
            });
        }
        tracing::debug!(phone, "SMS accepted by gateway");
        Ok(())
    }
}

/// Development sender. Message bodies carry codes and passwords, so only
/// their length is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSender;

#[async_trait]
impl NotificationSender for LoggingSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DeliveryError> {
        tracing::info!(phone, length = message.len(), "SMS not sent: no gateway configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn gateway(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .map(|v| v.to_str().unwrap().to_string());
                    sink.lock().unwrap().push((auth, body));
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/send"), received)
    }

    #[tokio::test]
    async fn posts_message_with_bearer_key() {
        let (endpoint, received) = gateway(StatusCode::OK).await;
        let sender = HttpSmsSender::new(endpoint, "key-123".to_string()).unwrap();

        sender.send("+919876543210", "hello").await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0.as_deref(), Some("Bearer key-123"));
        assert_eq!(received[0].1["to"], "+919876543210");
        assert_eq!(received[0].1["message"], "hello");
    }

    #[tokio::test]
    async fn gateway_errors_are_delivery_failures() {
        let (endpoint, _) = gateway(StatusCode::BAD_GATEWAY).await;
        let sender = HttpSmsSender::new(endpoint, "key".to_string()).unwrap();

        let err = sender.send("9876543210", "hello").await.unwrap_err();
        assert!(err.reason.contains("502"));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_delivery_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let sender = HttpSmsSender::new(format!("http://{addr}/send"), "key".to_string()).unwrap();

        let err = sender.send("9876543210", "hello").await.unwrap_err();
        assert_eq!(err.reason, "gateway unreachable");
    }

    #[tokio::test]
    async fn logging_sender_always_succeeds() {
        LoggingSender.send("9876543210", "code 123456").await.unwrap();
    }
}
