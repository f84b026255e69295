// src/subscription.rs

//! Client for the external subscription service.
//!
//! `POST <endpoint>` with `{"sub_url": ...}` and an `X-API-Key` header. The
//! reply is turned into one user-facing line by [`interpret_response`].

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SubscriptionSettings;
use crate::display::templates;
use crate::errors::{RelayError, Result};
use crate::types::BoxFuture;

/// Outcome of a subscription request, already phrased for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReply {
    pub accepted: bool,
    pub text: String,
}

impl SubscriptionReply {
    fn rejected(text: impl Into<String>) -> Self {
        Self {
            accepted: false,
            text: text.into(),
        }
    }
}

pub trait SubscriptionApi: Send + Sync {
    fn endpoint(&self) -> &str;

    fn add(&self, url: String) -> BoxFuture<'_, SubscriptionReply>;
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    sub_url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Map an HTTP status and body to the reply shown to the user.
pub fn interpret_response(status: u16, body: &str) -> SubscriptionReply {
    let parsed: ServiceResponse = serde_json::from_str(body).unwrap_or_default();
    let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

    if status == 200 {
        let message = non_empty(parsed.message).unwrap_or_else(|| templates::SUBSCRIPTION_ADDED.to_string());
        return SubscriptionReply {
            accepted: true,
            text: format!("✅ {message}"),
        };
    }

    let error = non_empty(parsed.error)
        .or_else(|| non_empty(parsed.message))
        .unwrap_or_else(|| templates::subscription_status_failed(status));
    if error.to_lowercase().contains("already exists") {
        SubscriptionReply::rejected(format!("⚠️ {error}"))
    } else {
        SubscriptionReply::rejected(format!("❌ {error}"))
    }
}

pub struct HttpSubscriptionClient {
    client: Client,
    settings: SubscriptionSettings,
}

impl HttpSubscriptionClient {
    pub fn new(settings: SubscriptionSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RelayError::Subscription(e.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn post(&self, url: &str) -> SubscriptionReply {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .header("X-API-Key", &self.settings.api_key)
            .json(&AddRequest { sub_url: url })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(url, "subscription request timed out");
                return SubscriptionReply::rejected(templates::SUBSCRIPTION_TIMEOUT);
            }
            Err(e) if e.is_connect() => {
                warn!(url, error = %e, "subscription service unreachable");
                return SubscriptionReply::rejected(templates::SUBSCRIPTION_UNREACHABLE);
            }
            Err(e) => {
                warn!(url, error = %e, "subscription request failed");
                return SubscriptionReply::rejected(templates::subscription_request_failed(&e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, error = %e, "subscription response unreadable");
                return SubscriptionReply::rejected(templates::SUBSCRIPTION_BAD_RESPONSE);
            }
        };

        let reply = interpret_response(status, &body);
        info!(url, status, accepted = reply.accepted, "subscription request answered");
        reply
    }
}

impl SubscriptionApi for HttpSubscriptionClient {
    fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    fn add(&self, url: String) -> BoxFuture<'_, SubscriptionReply> {
        Box::pin(async move { self.post(&url).await })
    }
}
