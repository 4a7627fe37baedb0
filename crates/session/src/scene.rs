use foundation::MapId;
use tracing::{debug, info};

use crate::services::{LiveSync, SceneBackend, SceneError, SceneRecord};

/// Finds the scene for `map_id`, creating it when the backend has none.
///
/// Lookup and creation are two sequential calls without a lock; the backend
/// is trusted to keep one scene per map.
pub async fn resolve_scene(
    backend: &dyn SceneBackend,
    map_id: MapId,
) -> Result<SceneRecord, SceneError> {
    if let Some(scene) = backend.scene_by_map_id(map_id).await? {
        return Ok(scene);
    }
    debug!(%map_id, "no scene for map, creating one");
    backend.add_scene(map_id).await
}

/// The single scene bound to the AR session.
#[derive(Debug, Default)]
pub struct SceneBinding {
    current: Option<SceneRecord>,
}

impl SceneBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SceneRecord> {
        self.current.as_ref()
    }

    pub fn is_bound_to(&self, scene: &SceneRecord) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.object_id == scene.object_id)
    }

    /// Binds `scene`, replacing the live subscription of a previous scene.
    ///
    /// Returns `Ok(false)` when `scene` is already bound; nothing is restarted.
    pub async fn bind(&mut self, live: &dyn LiveSync, scene: SceneRecord) -> Result<bool, SceneError> {
        if self.is_bound_to(&scene) {
            return Ok(false);
        }
        if let Some(old) = self.current.take() {
            debug!(object_id = %old.object_id, "stopping live sync of previous scene");
            live.stop();
        }
        live.start(&scene).await?;
        info!(object_id = %scene.object_id, map_id = %scene.map_id, "scene bound");
        self.current = Some(scene);
        Ok(true)
    }

    pub fn unbind(&mut self, live: &dyn LiveSync) -> Option<SceneRecord> {
        let old = self.current.take();
        if old.is_some() {
            live.stop();
        }
        old
    }
}
