//! Stand-ins for the device-side subsystems when running without AR hardware.

use std::collections::BTreeMap;
use std::sync::Arc;

use catalog::{LoadRequest, MapLoadService, MapPayload, MapRecord};
use foundation::MapId;
use parking_lot::Mutex;
use runtime::{BoxFuture, EventBus, Subscription};
use session::{ArSpace, Localizer, LocalizerError, LocalizerEvent, SpaceError};
use tracing::{debug, info};

/// Keeps downloaded map bytes in memory.
pub struct HeadlessSpace {
    loader: Arc<dyn MapLoadService>,
    maps: Mutex<BTreeMap<MapId, usize>>,
}

impl HeadlessSpace {
    pub fn new(loader: Arc<dyn MapLoadService>) -> Self {
        Self {
            loader,
            maps: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.maps.lock().values().sum()
    }
}

impl ArSpace for HeadlessSpace {
    fn load_and_instantiate<'a>(
        &'a self,
        record: &'a MapRecord,
    ) -> BoxFuture<'a, Result<(), SpaceError>> {
        Box::pin(async move {
            let request = LoadRequest {
                id: record.id,
                use_token: record.is_private(),
            };
            let payload = self
                .loader
                .load_map(request)
                .await
                .map_err(|e| SpaceError::Load {
                    map_id: record.id,
                    message: e.to_string(),
                })?;
            self.instantiate(&payload)
        })
    }

    fn instantiate(&self, payload: &MapPayload) -> Result<(), SpaceError> {
        if payload.bytes.is_empty() {
            return Err(SpaceError::Instantiate {
                map_id: payload.map_id,
                message: "empty map data".to_string(),
            });
        }
        self.maps.lock().insert(payload.map_id, payload.bytes.len());
        debug!(map_id = %payload.map_id, len = payload.bytes.len(), "map instantiated");
        Ok(())
    }

    fn free_map(&self, id: MapId) {
        if self.maps.lock().remove(&id).is_some() {
            debug!(map_id = %id, "map freed");
        }
    }

    fn instantiated(&self) -> Vec<MapId> {
        self.maps.lock().keys().copied().collect()
    }
}

#[derive(Debug, Default)]
struct LocalizerSettings {
    map_ids: Vec<MapId>,
    use_server: bool,
    auto_start: bool,
    running: bool,
}

/// Records localizer configuration; localization results are injected with
/// [`report_localized`](Self::report_localized).
pub struct HeadlessLocalizer {
    settings: Mutex<LocalizerSettings>,
    events: EventBus<LocalizerEvent>,
}

impl Default for HeadlessLocalizer {
    fn default() -> Self {
        Self {
            settings: Mutex::new(LocalizerSettings::default()),
            events: EventBus::new(8),
        }
    }
}

impl HeadlessLocalizer {
    pub fn is_running(&self) -> bool {
        self.settings.lock().running
    }

    pub fn report_localized(&self, id: MapId) -> bool {
        if !self.is_running() {
            return false;
        }
        self.events.emit(LocalizerEvent::MapChanged(id)) > 0
    }
}

impl Localizer for HeadlessLocalizer {
    fn set_map_ids(&self, ids: Vec<MapId>) {
        self.settings.lock().map_ids = ids;
    }

    fn map_ids(&self) -> Vec<MapId> {
        self.settings.lock().map_ids.clone()
    }

    fn set_use_server_localizer(&self, enabled: bool) {
        self.settings.lock().use_server = enabled;
    }

    fn use_server_localizer(&self) -> bool {
        self.settings.lock().use_server
    }

    fn set_auto_start(&self, enabled: bool) {
        self.settings.lock().auto_start = enabled;
    }

    fn start_localizing(&self) -> Result<(), LocalizerError> {
        let mut settings = self.settings.lock();
        if settings.use_server && settings.map_ids.is_empty() {
            return Err(LocalizerError::new("server localizer has no maps"));
        }
        settings.running = true;
        info!(
            maps = settings.map_ids.len(),
            server = settings.use_server,
            auto_start = settings.auto_start,
            "localizing"
        );
        Ok(())
    }

    fn stop_localizing(&self) {
        let mut settings = self.settings.lock();
        if settings.running {
            settings.running = false;
            debug!("localizing stopped");
        }
    }

    fn subscribe(&self) -> Subscription<LocalizerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use catalog::{LoadRequest, MapLoadService, MapPayload, MapRecord, MapStatus, MapType, ServiceError};
    use foundation::MapId;
    use foundation::time::Timestamp;
    use runtime::BoxFuture;
    use session::{ArSpace, Localizer, LocalizerEvent};

    use super::{HeadlessLocalizer, HeadlessSpace};

    struct FixedLoader;

    impl MapLoadService for FixedLoader {
        fn load_map(&self, request: LoadRequest) -> BoxFuture<'_, Result<MapPayload, ServiceError>> {
            Box::pin(async move {
                if request.id == MapId(0) {
                    return Err(ServiceError::Rejected("not found".to_string()));
                }
                Ok(MapPayload::new(request.id, vec![7u8; 16]))
            })
        }
    }

    fn record(id: i32) -> MapRecord {
        MapRecord {
            id: MapId(id),
            name: format!("map-{id}"),
            status: MapStatus::Done,
            map_type: MapType::Default,
            privacy: 0,
            latitude: 0.0,
            longitude: 0.0,
            created: Timestamp::unknown(),
        }
    }

    #[tokio::test]
    async fn space_loads_and_frees_maps() {
        let space = HeadlessSpace::new(Arc::new(FixedLoader));
        space.load_and_instantiate(&record(4)).await.unwrap();
        space.load_and_instantiate(&record(2)).await.unwrap();
        assert!(space.load_and_instantiate(&record(0)).await.is_err());
        assert_eq!(space.instantiated(), vec![MapId(2), MapId(4)]);
        assert_eq!(space.total_bytes(), 32);

        space.free_map(MapId(4));
        assert_eq!(space.instantiated(), vec![MapId(2)]);
        assert!(space.instantiate(&MapPayload::new(MapId(9), Vec::<u8>::new())).is_err());
    }

    #[tokio::test]
    async fn localizer_reports_only_while_running() {
        let localizer = HeadlessLocalizer::default();
        let mut events = localizer.subscribe();
        assert!(!localizer.report_localized(MapId(1)));

        localizer.set_use_server_localizer(true);
        assert!(localizer.start_localizing().is_err());
        localizer.set_map_ids(vec![MapId(1)]);
        localizer.start_localizing().unwrap();
        assert!(localizer.report_localized(MapId(1)));
        assert_eq!(events.try_recv(), Some(LocalizerEvent::MapChanged(MapId(1))));
    }
}
