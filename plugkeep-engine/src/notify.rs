//! Outbound update notices.
//!
//! Delivery is fire-and-forget from the reconciler's point of view: errors
//! are returned here so callers can log them, and are never propagated past
//! the pass.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use plugkeep_core::{ComponentName, ComponentVersion, RepoRef};

use crate::error::EngineError;

pub const SUCCESS_COLOR: u32 = 0x57F287;
pub const FAILURE_COLOR: u32 = 0xED4245;

/// Something worth telling an operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateNotice {
    Success {
        component: ComponentName,
        repo: RepoRef,
        from: Option<ComponentVersion>,
        to: ComponentVersion,
    },
    Failure {
        component: ComponentName,
        repo: RepoRef,
        error: String,
    },
}

impl UpdateNotice {
    pub fn component(&self) -> &ComponentName {
        match self {
            UpdateNotice::Success { component, .. } | UpdateNotice::Failure { component, .. } => {
                component
            }
        }
    }

    /// Webhook document: `{"embeds": [{title, color, fields, timestamp}]}`.
    pub fn to_embed(&self, now: DateTime<Utc>) -> Value {
        let time = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let (title, color, component, repo, detail) = match self {
            UpdateNotice::Success {
                component,
                repo,
                from,
                to,
            } => {
                let from = from.map_or_else(|| "unknown".to_string(), |v| v.to_string());
                (
                    "✅ Plugin Update Successful",
                    SUCCESS_COLOR,
                    component,
                    repo,
                    json!({"name": "From → To", "value": format!("`{from}` → `{to}`"), "inline": false}),
                )
            }
            UpdateNotice::Failure {
                component,
                repo,
                error,
            } => (
                "❌ Plugin Update Failed",
                FAILURE_COLOR,
                component,
                repo,
                json!({"name": "Error", "value": error, "inline": false}),
            ),
        };

        json!({
            "embeds": [{
                "title": title,
                "color": color,
                "fields": [
                    {"name": "Plugin", "value": component.0, "inline": true},
                    {"name": "Repository", "value": format!("`{repo}`"), "inline": true},
                    detail,
                    {"name": "Time (UTC)", "value": time, "inline": false},
                ],
                "timestamp": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            }]
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &UpdateNotice) -> Result<(), EngineError>;
}

/// Posts embed documents to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &UpdateNotice) -> Result<(), EngineError> {
        let body = notice.to_embed(Utc::now());
        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        tracing::debug!(component = %notice.component(), "notification delivered");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".into(),
            repo: "foo".into(),
        }
    }

    fn success() -> UpdateNotice {
        UpdateNotice::Success {
            component: "Foo".into(),
            repo: repo(),
            from: None,
            to: "1.1.0".parse().unwrap(),
        }
    }

    #[test]
    fn success_embed_shape() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 4, 5, 6).unwrap();
        let doc = success().to_embed(now);
        let embed = &doc["embeds"][0];
        assert_eq!(embed["color"], json!(SUCCESS_COLOR));
        assert_eq!(embed["fields"][0]["value"], "Foo");
        assert_eq!(embed["fields"][1]["value"], "`acme/foo`");
        assert_eq!(embed["fields"][2]["value"], "`unknown` → `1.1.0`");
        assert_eq!(embed["fields"][3]["value"], "2026-03-01 04:05:06");
        assert_eq!(embed["timestamp"], "2026-03-01T04:05:06.000Z");
    }

    #[test]
    fn failure_embed_carries_error() {
        let notice = UpdateNotice::Failure {
            component: "Foo".into(),
            repo: repo(),
            error: "GET x returned 500".into(),
        };
        let doc = notice.to_embed(Utc::now());
        assert_eq!(doc["embeds"][0]["color"], json!(FAILURE_COLOR));
        assert_eq!(doc["embeds"][0]["fields"][2]["name"], "Error");
        assert_eq!(doc["embeds"][0]["fields"][2]["value"], "GET x returned 500");
    }

    #[tokio::test]
    async fn webhook_posts_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({"embeds": [{"color": SUCCESS_COLOR}]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", server.uri()), Duration::from_secs(5)).unwrap();
        notifier.notify(&success()).await.unwrap();
    }

    #[tokio::test]
    async fn webhook_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = notifier.notify(&success()).await.unwrap_err();
        assert!(matches!(err, EngineError::HttpStatus { status: 400, .. }));
    }
}
