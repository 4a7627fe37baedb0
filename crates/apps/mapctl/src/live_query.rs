//! Parse LiveQuery client: subscribes to the content of the bound scene.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use runtime::{BoxFuture, EventBus, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use session::{LiveSync, LiveSyncEvent, SceneError, SceneRecord};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Class holding the objects placed in a scene.
const NOT_CONNECTED: u64 = 0;

pub const CONTENT_CLASS: &str = "ARObject";

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ClientOp<'a> {
    Connect {
        #[serde(rename = "applicationId")]
        application_id: &'a str,
        #[serde(rename = "restAPIKey")]
        rest_api_key: &'a str,
    },
    Subscribe {
        #[serde(rename = "requestId")]
        request_id: u64,
        query: LiveQuery<'a>,
    },
    Unsubscribe {
        #[serde(rename = "requestId")]
        request_id: u64,
    },
}

#[derive(Debug, Serialize)]
struct LiveQuery<'a> {
    #[serde(rename = "className")]
    class_name: &'a str,
    #[serde(rename = "where")]
    filter: Value,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ServerOp {
    Connected,
    Subscribed {
        #[serde(rename = "requestId")]
        request_id: u64,
    },
    Unsubscribed {
        #[serde(rename = "requestId")]
        request_id: u64,
    },
    Error {
        #[serde(default)]
        code: i64,
        #[serde(default)]
        error: String,
    },
    Create { object: Value },
    Update { object: Value },
    Delete { object: Value },
    Enter { object: Value },
    Leave { object: Value },
    #[serde(other)]
    Other,
}

fn encode(op: &ClientOp<'_>) -> Result<Message, SceneError> {
    serde_json::to_string(op)
        .map(Message::Text)
        .map_err(|e| SceneError::Subscribe(e.to_string()))
}

struct LiveSession {
    object_id: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

pub struct LiveQueryClient {
    url: String,
    app_id: String,
    rest_key: String,
    /// Request id of the session whose socket is connected, 0 when none.
    connected: Arc<AtomicU64>,
    events: Arc<EventBus<LiveSyncEvent>>,
    next_request: AtomicU64,
    session: Mutex<Option<LiveSession>>,
}

impl LiveQueryClient {
    pub fn new(url: impl Into<String>, app_id: impl Into<String>, rest_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            app_id: app_id.into(),
            rest_key: rest_key.into(),
            connected: Arc::new(AtomicU64::new(NOT_CONNECTED)),
            events: Arc::new(EventBus::new(8)),
            next_request: AtomicU64::new(1),
            session: Mutex::new(None),
        }
    }

    async fn open(&self, scene: &SceneRecord) -> Result<LiveSession, SceneError> {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| SceneError::Subscribe(format!("connect {}: {e}", self.url)))?;

        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let connect = ClientOp::Connect {
            application_id: &self.app_id,
            rest_api_key: &self.rest_key,
        };
        let subscribe = ClientOp::Subscribe {
            request_id,
            query: LiveQuery {
                class_name: CONTENT_CLASS,
                filter: json!({ "sceneId": scene.object_id }),
            },
        };
        for op in [&connect, &subscribe] {
            ws.send(encode(op)?)
                .await
                .map_err(|e| SceneError::Subscribe(e.to_string()))?;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let connected = Arc::clone(&self.connected);
        let events = Arc::clone(&self.events);
        let object_id = scene.object_id.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        if let Ok(msg) = encode(&ClientOp::Unsubscribe { request_id }) {
                            let _ = ws.send(msg).await;
                        }
                        let _ = ws.close(None).await;
                        break;
                    }
                    msg = ws.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            handle_server_text(&text, request_id, &connected, &events);
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!("live query socket error: {err}");
                            break;
                        }
                    },
                }
            }
            mark_closed(request_id, &connected, &events);
            debug!(object_id = %object_id, "live query closed");
        });

        Ok(LiveSession {
            object_id: scene.object_id.clone(),
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

fn handle_server_text(
    text: &str,
    session: u64,
    connected: &AtomicU64,
    events: &EventBus<LiveSyncEvent>,
) {
    let op: ServerOp = match serde_json::from_str(text) {
        Ok(op) => op,
        Err(err) => {
            warn!("unreadable live query message: {err}");
            return;
        }
    };
    match op {
        ServerOp::Connected => {
            if connected.swap(session, Ordering::SeqCst) != session {
                events.emit(LiveSyncEvent::Connected);
            }
        }
        ServerOp::Subscribed { request_id } => debug!(request_id, "live query subscribed"),
        ServerOp::Unsubscribed { request_id } => debug!(request_id, "live query unsubscribed"),
        ServerOp::Error { code, error } => warn!(code, "live query error: {error}"),
        ServerOp::Create { object }
        | ServerOp::Update { object }
        | ServerOp::Delete { object }
        | ServerOp::Enter { object }
        | ServerOp::Leave { object } => {
            let id = object.get("objectId").and_then(Value::as_str).unwrap_or("?");
            info!(object_id = id, "scene content changed");
        }
        ServerOp::Other => debug!("unhandled live query message"),
    }
}

/// Clears the connected state only if it still belongs to `session`. A socket
/// replaced by a newer session closes without touching the newer one.
fn mark_closed(session: u64, connected: &AtomicU64, events: &EventBus<LiveSyncEvent>) {
    if connected
        .compare_exchange(session, NOT_CONNECTED, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        events.emit(LiveSyncEvent::Disconnected);
    }
}

impl LiveSync for LiveQueryClient {
    fn start<'a>(&'a self, scene: &'a SceneRecord) -> BoxFuture<'a, Result<(), SceneError>> {
        Box::pin(async move {
            self.stop();
            let session = self.open(scene).await?;
            info!(object_id = %scene.object_id, "live query started");
            *self.session.lock() = Some(session);
            Ok(())
        })
    }

    fn stop(&self) {
        let Some(mut session) = self.session.lock().take() else {
            return;
        };
        debug!(object_id = %session.object_id, "stopping live query");
        if let Some(shutdown) = session.shutdown.take() {
            // The task may already have exited on its own.
            let _ = shutdown.send(());
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) != NOT_CONNECTED
    }

    fn subscribe(&self) -> Subscription<LiveSyncEvent> {
        self.events.subscribe()
    }
}

impl Drop for LiveQueryClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.task.abort();
        }
    }
}
