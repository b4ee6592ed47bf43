//! Reminder endpoints: `POST /api/push/subscribe` stores the single reminder,
//! `GET /api/push/send_all` (hit by a scheduled trigger) delivers it when due.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use recipe_core::config::PushSettings;
use recipe_core::kv::RedisStore;
use recipe_core::push::{PushSender, WebPushSender};
use recipe_core::reminder::{Reminders, ScheduleError};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct PushState {
    /// `None` when the key-value store is not configured or unreachable.
    pub reminders: Option<Reminders>,
    /// `None` when VAPID credentials are missing.
    pub sender: Option<Arc<dyn PushSender>>,
    pub payload: Arc<Vec<u8>>,
    pub clock: Clock,
}

impl PushState {
    /// Build the state from settings, connecting to the store and setting
    /// up the push client. Failures disable the affected endpoint instead of
    /// aborting startup.
    pub async fn from_settings(settings: &PushSettings) -> Self {
        let reminders = match settings.kv_url.as_deref() {
            Some(url) => match RedisStore::connect(url).await {
                Ok(store) => Some(Reminders::new(Arc::new(store))),
                Err(e) => {
                    error!(error = %e, "Could not connect to key-value store");
                    None
                }
            },
            None => {
                warn!("KV_URL not set, reminder endpoints disabled");
                None
            }
        };

        let sender: Option<Arc<dyn PushSender>> = match settings.vapid.clone() {
            Some(vapid) => match WebPushSender::new(vapid, settings.ttl_secs) {
                Ok(s) => Some(Arc::new(s)),
                Err(e) => {
                    error!(error = %e, "Could not create push client");
                    None
                }
            },
            None => {
                warn!("VAPID keys not configured, delivery disabled");
                None
            }
        };

        Self {
            reminders,
            sender,
            payload: Arc::new(settings.notification_payload()),
            clock: Arc::new(Utc::now),
        }
    }
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// POST /api/push/subscribe — body `{"subscription": {...}, "timestamp": <epoch ms>}`.
pub async fn subscribe(State(state): State<PushState>, body: Bytes) -> Response {
    let Some(reminders) = state.reminders.as_ref() else {
        return json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": "KV store not available"}),
        );
    };

    let request = serde_json::from_slice::<Value>(&body).ok();
    let fields = request.as_ref().and_then(|r| {
        let subscription = r.get("subscription").filter(|v| !v.is_null())?;
        let timestamp = r.get("timestamp")?;
        Some((subscription, timestamp))
    });
    let Some((subscription, timestamp)) = fields else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Missing 'subscription' or 'timestamp' in request body"}),
        );
    };
    if !subscription.is_object() {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Invalid subscription"}),
        );
    }

    match reminders
        .schedule(subscription.clone(), timestamp, (state.clock)())
        .await
    {
        Ok(reminder) => {
            info!(scheduled_at = reminder.scheduled_at, "Subscription stored");
            json_response(StatusCode::CREATED, json!({"success": true}))
        }
        Err(e @ (ScheduleError::InvalidTimestamp | ScheduleError::InPast)) => {
            json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()}))
        }
        Err(ScheduleError::Store(e)) => {
            error!(error = %e, "Failed to save reminder");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Failed to save reminder"}),
            )
        }
    }
}

/// GET /api/push/send_all — delivery check run by the scheduler.
pub async fn send_all(State(state): State<PushState>) -> Response {
    let Some(reminders) = state.reminders.as_ref() else {
        warn!("Delivery check triggered but KV store not available");
        return json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"status": "KV store not available"}),
        );
    };
    let Some(sender) = state.sender.as_deref() else {
        error!("Delivery check triggered but VAPID keys not configured");
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"status": "VAPID keys not configured"}),
        );
    };

    info!("Delivery check triggered");

    match reminders
        .deliver_due(sender, &state.payload, (state.clock)())
        .await
    {
        Ok(outcome) => json_response(StatusCode::OK, json!({"status": outcome})),
        Err(e) => {
            error!(error = %e, "Failed to access KV during delivery check");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "KV access error"}),
            )
        }
    }
}

/// CORS preflight.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /health
pub async fn health() -> Response {
    json_response(StatusCode::OK, json!({"status": "ok"}))
}

pub async fn not_found() -> Response {
    json_response(StatusCode::NOT_FOUND, json!({"error": "Not Found"}))
}

/// Reminder routes with CORS headers; no fallback so it can be merged.
pub fn router(state: PushState) -> Router {
    Router::new()
        .route("/api/push/subscribe", post(subscribe).options(preflight))
        .route("/api/push/send_all", get(send_all).options(preflight))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

/// Standalone service: reminder routes plus health check and JSON 404.
pub fn app(state: PushState) -> Router {
    router(state)
        .route("/health", get(health))
        .fallback(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use recipe_core::error::{AppError, Result as CoreResult};
    use recipe_core::kv::{KeyValueStore, MemoryStore};
    use recipe_core::push::PushError;
    use recipe_core::reminder::{SUBSCRIPTION_KEY, TIMESTAMP_KEY};
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct ScriptedSender {
        result: std::result::Result<(), PushError>,
        calls: Mutex<usize>,
    }

    impl ScriptedSender {
        fn new(result: std::result::Result<(), PushError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PushSender for ScriptedSender {
        async fn send(
            &self,
            _subscription: &Value,
            _payload: &[u8],
        ) -> std::result::Result<(), PushError> {
            *self.calls.lock().unwrap() += 1;
            self.result.clone()
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> CoreResult<Option<String>> {
            Err(AppError::StoreError("connection reset".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> CoreResult<()> {
            Err(AppError::StoreError("connection reset".into()))
        }
        async fn delete(&self, _keys: &[&str]) -> CoreResult<()> {
            Err(AppError::StoreError("connection reset".into()))
        }
    }

    struct Harness {
        store: MemoryStore,
        now: Arc<Mutex<DateTime<Utc>>>,
        state: PushState,
    }

    impl Harness {
        fn new(sender: Option<Arc<ScriptedSender>>) -> Self {
            let store = MemoryStore::new();
            let now = Arc::new(Mutex::new(Utc::now()));
            let clock_now = Arc::clone(&now);
            let state = PushState {
                reminders: Some(Reminders::new(Arc::new(store.clone()))),
                sender: sender.map(|s| s as Arc<dyn PushSender>),
                payload: Arc::new(br#"{"title":"t","body":"b"}"#.to_vec()),
                clock: Arc::new(move || *clock_now.lock().unwrap()),
            };
            Self { store, now, state }
        }

        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }

        async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            call(app(self.state.clone()), method, uri, body).await
        }
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn subscription() -> Value {
        json!({"endpoint": "https://push.example.com/abc", "keys": {"p256dh": "p", "auth": "a"}})
    }

    #[tokio::test]
    async fn subscribe_then_deliver_after_due_time() {
        let sender = ScriptedSender::new(Ok(()));
        let h = Harness::new(Some(Arc::clone(&sender)));
        let due = h.now() + Duration::milliseconds(3_600_000);

        let (status, body) = h
            .call(
                "POST",
                "/api/push/subscribe",
                Some(json!({"subscription": subscription(), "timestamp": due.timestamp_millis()})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"success": true}));
        let stored = h.store.snapshot();
        assert_eq!(stored.len(), 2);

        let (status, body) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "not_due");
        assert_eq!(h.store.snapshot(), stored);
        assert_eq!(sender.calls(), 0);

        h.advance(Duration::hours(1) + Duration::seconds(1));
        let (status, body) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "delivered");
        assert_eq!(sender.calls(), 1);
        assert!(h.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn past_timestamp_is_400_and_store_untouched() {
        let h = Harness::new(Some(ScriptedSender::new(Ok(()))));
        let past = h.now() - Duration::minutes(5);
        let (status, body) = h
            .call(
                "POST",
                "/api/push/subscribe",
                Some(json!({"subscription": subscription(), "timestamp": past.timestamp_millis()})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Timestamp is in the past");
        assert!(h.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn missing_or_bad_fields_are_400() {
        let h = Harness::new(None);

        let (status, body) = h
            .call("POST", "/api/push/subscribe", Some(json!({"subscription": subscription()})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing 'subscription' or 'timestamp' in request body");

        let (status, body) = h
            .call(
                "POST",
                "/api/push/subscribe",
                Some(json!({"subscription": subscription(), "timestamp": "later"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid timestamp format");

        let (status, _) = h
            .call(
                "POST",
                "/api/push/subscribe",
                Some(json!({"subscription": "abc", "timestamp": 9_999_999_999_999i64})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let h = Harness::new(None);
        let request = Request::builder()
            .method("POST")
            .uri("/api/push/subscribe")
            .body(Body::from("not json"))
            .unwrap();
        let response = app(h.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gone_subscription_clears_both_keys() {
        let sender = ScriptedSender::new(Err(PushError::Gone));
        let h = Harness::new(Some(sender));
        h.store.set(SUBSCRIPTION_KEY, &subscription().to_string()).await.unwrap();
        h.store.set(TIMESTAMP_KEY, "1000").await.unwrap();

        let (status, body) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "subscription_gone");
        assert!(h.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn other_push_error_keeps_both_keys() {
        let sender = ScriptedSender::new(Err(PushError::Failed("429 Too Many Requests".into())));
        let h = Harness::new(Some(sender));
        h.store.set(SUBSCRIPTION_KEY, &subscription().to_string()).await.unwrap();
        h.store.set(TIMESTAMP_KEY, "1000").await.unwrap();
        let before = h.store.snapshot();

        let (status, body) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "delivery_failed");
        assert_eq!(h.store.snapshot(), before);
    }

    #[tokio::test]
    async fn empty_store_is_noop() {
        let sender = ScriptedSender::new(Ok(()));
        let h = Harness::new(Some(Arc::clone(&sender)));
        let (status, body) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "no_reminder");
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn missing_vapid_is_500() {
        let h = Harness::new(None);
        let (status, body) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "VAPID keys not configured");
    }

    #[tokio::test]
    async fn missing_store_disables_both_endpoints() {
        let mut h = Harness::new(Some(ScriptedSender::new(Ok(()))));
        h.state.reminders = None;

        let (status, _) = h
            .call(
                "POST",
                "/api/push/subscribe",
                Some(json!({"subscription": subscription(), "timestamp": 9_999_999_999_999i64})),
            )
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn store_failures_are_500() {
        let mut h = Harness::new(Some(ScriptedSender::new(Ok(()))));
        h.state.reminders = Some(Reminders::new(Arc::new(BrokenStore)));

        let (status, body) = h
            .call(
                "POST",
                "/api/push/subscribe",
                Some(json!({"subscription": subscription(), "timestamp": 9_999_999_999_999i64})),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to save reminder");

        let (status, body) = h.call("GET", "/api/push/send_all", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "KV access error");
    }

    #[tokio::test]
    async fn preflight_is_204_with_cors_headers() {
        let h = Harness::new(None);
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/push/subscribe")
            .body(Body::empty())
            .unwrap();
        let response = app(h.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let h = Harness::new(None);
        let (status, body) = h.call("GET", "/api/push/other", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
    }
}
