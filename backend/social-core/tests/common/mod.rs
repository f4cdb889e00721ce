//! Shared fixtures for the integration tests
//!
//! Recording fakes stand in for the search index and the push endpoint
//! registry; `capture_logs` collects emitted events for log assertions.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use doc_store::{Item, StoreClient};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use social_core::clients::{Channel, ClientError, PushEndpointClient, SearchClient};
use social_core::models::user::{User, UserDynamo};
use social_core::Managers;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 4, 1, 9, 30, 0).unwrap()
}

pub fn later(seconds: i64) -> DateTime<Utc> {
    now() + Duration::seconds(seconds)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchCall {
    Put {
        user_id: String,
        username: String,
        full_name: Option<String>,
    },
    Delete {
        user_id: String,
    },
}

/// Search client that records every call
#[derive(Clone, Default)]
pub struct RecordingSearchClient {
    calls: Arc<Mutex<Vec<SearchCall>>>,
}

impl RecordingSearchClient {
    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for RecordingSearchClient {
    async fn put_user(
        &self,
        user_id: &str,
        username: &str,
        full_name: Option<&str>,
    ) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(SearchCall::Put {
            user_id: user_id.to_string(),
            username: username.to_string(),
            full_name: full_name.map(str::to_string),
        });
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(SearchCall::Delete {
            user_id: user_id.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushCall {
    UpdateEndpoint {
        user_id: String,
        channel: Channel,
        address: String,
    },
    DeleteEndpoint {
        user_id: String,
        channel: Channel,
    },
    Enable(String),
    Disable(String),
    DeleteAll(String),
}

/// Push client that records every call; `failing()` makes every call error
#[derive(Clone, Default)]
pub struct RecordingPushClient {
    calls: Arc<Mutex<Vec<PushCall>>>,
    fail: bool,
}

impl RecordingPushClient {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PushCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PushCall) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            return Err(ClientError::UnexpectedStatus {
                service: "push",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PushEndpointClient for RecordingPushClient {
    async fn update_user_endpoint(
        &self,
        user_id: &str,
        channel: Channel,
        address: &str,
    ) -> Result<(), ClientError> {
        self.record(PushCall::UpdateEndpoint {
            user_id: user_id.to_string(),
            channel,
            address: address.to_string(),
        })
    }

    async fn delete_user_endpoint(&self, user_id: &str, channel: Channel) -> Result<(), ClientError> {
        self.record(PushCall::DeleteEndpoint {
            user_id: user_id.to_string(),
            channel,
        })
    }

    async fn enable_user_endpoints(&self, user_id: &str) -> Result<(), ClientError> {
        self.record(PushCall::Enable(user_id.to_string()))
    }

    async fn disable_user_endpoints(&self, user_id: &str) -> Result<(), ClientError> {
        self.record(PushCall::Disable(user_id.to_string()))
    }

    async fn delete_user_endpoints(&self, user_id: &str) -> Result<(), ClientError> {
        self.record(PushCall::DeleteAll(user_id.to_string()))
    }
}

pub struct TestEnv {
    pub store: StoreClient,
    pub managers: Managers,
    pub search: RecordingSearchClient,
    pub push: RecordingPushClient,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_push(RecordingPushClient::default())
    }

    pub fn with_push(push: RecordingPushClient) -> Self {
        let store = StoreClient::in_memory();
        let search = RecordingSearchClient::default();
        let managers = Managers::new(
            store.clone(),
            Some(Arc::new(search.clone())),
            Some(Arc::new(push.clone())),
        );
        Self {
            store,
            managers,
            search,
            push,
        }
    }

    pub async fn create_user(&self, user_id: &str, username: &str) -> User {
        self.managers
            .user
            .create_user(user_id, username, now())
            .await
            .unwrap()
    }

    pub async fn user(&self, user_id: &str) -> User {
        self.managers.user.get_user(user_id).await.unwrap().unwrap()
    }

    /// Raw profile row, as a change record would carry it
    pub async fn user_item(&self, user_id: &str) -> Item {
        self.store
            .get_item(&UserDynamo::pk(user_id), true)
            .await
            .unwrap()
            .unwrap()
    }
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

/// Layer collecting every event's level and message
#[derive(Clone, Default)]
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.level == Level::WARN)
            .map(|event| event.message)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
        });
    }
}

/// Install a capturing subscriber for the current thread. Events are
/// collected until the guard drops.
pub fn capture_logs() -> (CaptureLayer, tracing::subscriber::DefaultGuard) {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (layer, guard)
}
