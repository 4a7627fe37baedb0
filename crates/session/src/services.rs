//! Device and backend subsystems driven by the session controller.
//!
//! Implementations must be `Send + Sync` for use across async tasks.
//! Async methods return boxed futures for dyn-compatibility.

use std::sync::Arc;

use catalog::{LocationProvider, MapPayload, MapRecord};
use foundation::MapId;
use runtime::{BoxFuture, Subscription};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Backend record tying a map to its synchronized content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub object_id: String,
    pub map_id: MapId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizerError {
    pub message: String,
}

impl LocalizerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LocalizerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "localizer error: {}", self.message)
    }
}

impl std::error::Error for LocalizerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceError {
    Load { map_id: MapId, message: String },
    Instantiate { map_id: MapId, message: String },
}

impl std::fmt::Display for SpaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpaceError::Load { map_id, message } => {
                write!(f, "failed to load map {map_id}: {message}")
            }
            SpaceError::Instantiate { map_id, message } => {
                write!(f, "failed to instantiate map {map_id}: {message}")
            }
        }
    }
}

impl std::error::Error for SpaceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The backend could not be reached or refused the request.
    Backend(String),
    /// The backend answered with something unexpected.
    Decode(String),
    /// The live subscription could not be opened.
    Subscribe(String),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::Backend(msg) => write!(f, "scene backend error: {msg}"),
            SceneError::Decode(msg) => write!(f, "invalid scene backend response: {msg}"),
            SceneError::Subscribe(msg) => write!(f, "live subscription failed: {msg}"),
        }
    }
}

impl std::error::Error for SceneError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocalizerEvent {
    /// The localizer matched the camera against this map.
    MapChanged(MapId),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LiveSyncEvent {
    Connected,
    Disconnected,
}

/// Visual localizer. Setters take effect on the next start.
pub trait Localizer: Send + Sync {
    fn set_map_ids(&self, ids: Vec<MapId>);
    fn map_ids(&self) -> Vec<MapId>;
    fn set_use_server_localizer(&self, enabled: bool);
    fn use_server_localizer(&self) -> bool;
    fn set_auto_start(&self, enabled: bool);
    fn start_localizing(&self) -> Result<(), LocalizerError>;
    fn stop_localizing(&self);
    fn subscribe(&self) -> Subscription<LocalizerEvent>;
}

/// AR space holding the instantiated spatial maps.
pub trait ArSpace: Send + Sync {
    /// Fetches the map data itself and instantiates it.
    fn load_and_instantiate<'a>(
        &'a self,
        record: &'a MapRecord,
    ) -> BoxFuture<'a, Result<(), SpaceError>>;

    fn instantiate(&self, payload: &MapPayload) -> Result<(), SpaceError>;

    fn free_map(&self, id: MapId);

    fn instantiated(&self) -> Vec<MapId>;
}

pub trait SceneBackend: Send + Sync {
    fn scene_by_map_id(
        &self,
        map_id: MapId,
    ) -> BoxFuture<'_, Result<Option<SceneRecord>, SceneError>>;

    fn add_scene(&self, map_id: MapId) -> BoxFuture<'_, Result<SceneRecord, SceneError>>;
}

/// Real-time subscription to a scene's content.
pub trait LiveSync: Send + Sync {
    fn start<'a>(&'a self, scene: &'a SceneRecord) -> BoxFuture<'a, Result<(), SceneError>>;
    fn stop(&self);
    fn is_connected(&self) -> bool;
    fn subscribe(&self) -> Subscription<LiveSyncEvent>;
}

/// User-facing notification channel.
pub trait Notifier: Send + Sync {
    fn warning(&self, message: &str);
    fn success(&self, message: &str);
    /// `None` hides the status text.
    fn status_text(&self, text: Option<&str>);
}

/// Notifier that writes to the log, for headless runs.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warning(&self, message: &str) {
        warn!(target: "notify", "{message}");
    }

    fn success(&self, message: &str) {
        info!(target: "notify", "{message}");
    }

    fn status_text(&self, text: Option<&str>) {
        match text {
            Some(text) => info!(target: "notify", status = text, "status shown"),
            None => info!(target: "notify", "status hidden"),
        }
    }
}

/// Collaborators injected into the session controller.
#[derive(Clone)]
pub struct SessionServices {
    pub localizer: Arc<dyn Localizer>,
    pub space: Arc<dyn ArSpace>,
    pub scenes: Arc<dyn SceneBackend>,
    pub live: Arc<dyn LiveSync>,
    pub notifier: Arc<dyn Notifier>,
    pub location: Arc<dyn LocationProvider>,
}
