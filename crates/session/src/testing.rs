//! In-memory collaborators for controller tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use catalog::{
    CatalogConfig, ListRequest, ListResponse, LoadRequest, Location, MapCatalogSync,
    MapListingService, MapLoadService, MapPayload, MapRecord, MapStatus, MapType, ServiceError,
};
use foundation::MapId;
use foundation::time::Timestamp;
use parking_lot::Mutex;
use runtime::{BoxFuture, EventBus, Subscription};

use crate::controller::{LocalizationSessionController, SessionConfig};
use crate::services::{
    ArSpace, LiveSync, LiveSyncEvent, Localizer, LocalizerError, LocalizerEvent, Notifier,
    SceneBackend, SceneError, SceneRecord, SessionServices, SpaceError,
};

pub(crate) fn map(id: i32, status: MapStatus) -> MapRecord {
    MapRecord {
        id: MapId(id),
        name: format!("map-{id}"),
        status,
        map_type: MapType::Default,
        privacy: 0,
        latitude: 0.0,
        longitude: 0.0,
        created: Timestamp::parse("2024-01-01"),
    }
}

/// Listing that always returns the current map set.
pub(crate) struct FakeMapService {
    maps: Mutex<Vec<MapRecord>>,
    fail_loads: AtomicBool,
    load_delay: Duration,
    pub(crate) lists: AtomicUsize,
    pub(crate) loads: Mutex<Vec<MapId>>,
}

impl FakeMapService {
    pub(crate) fn new(maps: Vec<MapRecord>) -> Self {
        Self {
            maps: Mutex::new(maps),
            fail_loads: AtomicBool::new(false),
            load_delay: Duration::from_millis(50),
            lists: AtomicUsize::new(0),
            loads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_loads(&self) {
        self.fail_loads.store(true, Ordering::SeqCst);
    }
}

impl MapListingService for FakeMapService {
    fn list_maps(&self, _request: ListRequest) -> BoxFuture<'_, Result<ListResponse, ServiceError>> {
        Box::pin(async move {
            self.lists.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            let jobs = self.maps.lock().clone();
            Ok(ListResponse {
                error: "none".to_string(),
                count: jobs.len() as i32,
                jobs,
            })
        })
    }
}

impl MapLoadService for FakeMapService {
    fn load_map(&self, request: LoadRequest) -> BoxFuture<'_, Result<MapPayload, ServiceError>> {
        Box::pin(async move {
            self.loads.lock().push(request.id);
            tokio::time::sleep(self.load_delay).await;
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(ServiceError::Network("connection reset".to_string()));
            }
            Ok(MapPayload::new(request.id, vec![0u8; 4]))
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct LocalizerState {
    pub(crate) map_ids: Vec<MapId>,
    pub(crate) use_server: bool,
    pub(crate) auto_start: bool,
    pub(crate) running: bool,
    pub(crate) starts: usize,
    pub(crate) stops: usize,
}

pub(crate) struct FakeLocalizer {
    pub(crate) state: Mutex<LocalizerState>,
    fail_start: AtomicBool,
    events: EventBus<LocalizerEvent>,
}

impl Default for FakeLocalizer {
    fn default() -> Self {
        Self {
            state: Mutex::new(LocalizerState::default()),
            fail_start: AtomicBool::new(false),
            events: EventBus::new(8),
        }
    }
}

impl FakeLocalizer {
    pub(crate) fn emit_map_changed(&self, id: MapId) {
        self.events.emit(LocalizerEvent::MapChanged(id));
    }

    pub(crate) fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub(crate) fn starts(&self) -> usize {
        self.state.lock().starts
    }
}

impl Localizer for FakeLocalizer {
    fn set_map_ids(&self, ids: Vec<MapId>) {
        self.state.lock().map_ids = ids;
    }

    fn map_ids(&self) -> Vec<MapId> {
        self.state.lock().map_ids.clone()
    }

    fn set_use_server_localizer(&self, enabled: bool) {
        self.state.lock().use_server = enabled;
    }

    fn use_server_localizer(&self) -> bool {
        self.state.lock().use_server
    }

    fn set_auto_start(&self, enabled: bool) {
        self.state.lock().auto_start = enabled;
    }

    fn start_localizing(&self) -> Result<(), LocalizerError> {
        let mut state = self.state.lock();
        state.starts += 1;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(LocalizerError::new("camera unavailable"));
        }
        state.running = true;
        Ok(())
    }

    fn stop_localizing(&self) {
        let mut state = self.state.lock();
        state.stops += 1;
        state.running = false;
    }

    fn subscribe(&self) -> Subscription<LocalizerEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub(crate) struct FakeSpace {
    instantiated: Mutex<Vec<MapId>>,
    pub(crate) fetched: Mutex<Vec<MapId>>,
    failing: Mutex<HashSet<MapId>>,
}

impl FakeSpace {
    pub(crate) fn fail_map(&self, id: MapId) {
        self.failing.lock().insert(id);
    }

    fn add(&self, id: MapId) -> Result<(), SpaceError> {
        if self.failing.lock().contains(&id) {
            return Err(SpaceError::Instantiate {
                map_id: id,
                message: "corrupt map".to_string(),
            });
        }
        let mut maps = self.instantiated.lock();
        if !maps.contains(&id) {
            maps.push(id);
        }
        Ok(())
    }
}

impl ArSpace for FakeSpace {
    fn load_and_instantiate<'a>(
        &'a self,
        record: &'a MapRecord,
    ) -> BoxFuture<'a, Result<(), SpaceError>> {
        Box::pin(async move {
            self.fetched.lock().push(record.id);
            self.add(record.id)
        })
    }

    fn instantiate(&self, payload: &MapPayload) -> Result<(), SpaceError> {
        self.add(payload.map_id)
    }

    fn free_map(&self, id: MapId) {
        self.instantiated.lock().retain(|m| *m != id);
    }

    fn instantiated(&self) -> Vec<MapId> {
        self.instantiated.lock().clone()
    }
}

#[derive(Default)]
pub(crate) struct FakeScenes {
    scenes: Mutex<Vec<SceneRecord>>,
    failing: AtomicBool,
    lookups: AtomicUsize,
    adds: AtomicUsize,
}

impl FakeScenes {
    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn adds(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }
}

impl SceneBackend for FakeScenes {
    fn scene_by_map_id(
        &self,
        map_id: MapId,
    ) -> BoxFuture<'_, Result<Option<SceneRecord>, SceneError>> {
        Box::pin(async move {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(SceneError::Backend("503 Service Unavailable".to_string()));
            }
            Ok(self.scenes.lock().iter().find(|s| s.map_id == map_id).cloned())
        })
    }

    fn add_scene(&self, map_id: MapId) -> BoxFuture<'_, Result<SceneRecord, SceneError>> {
        Box::pin(async move {
            let n = self.adds.fetch_add(1, Ordering::SeqCst) + 1;
            let scene = SceneRecord {
                object_id: format!("scene-{n}"),
                map_id,
            };
            self.scenes.lock().push(scene.clone());
            Ok(scene)
        })
    }
}

pub(crate) struct FakeLive {
    started: Mutex<Vec<String>>,
    stops: AtomicUsize,
    connected: AtomicBool,
    events: EventBus<LiveSyncEvent>,
}

impl Default for FakeLive {
    fn default() -> Self {
        Self {
            started: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
            events: EventBus::new(8),
        }
    }
}

impl FakeLive {
    pub(crate) fn starts(&self) -> usize {
        self.started.lock().len()
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.events.emit(LiveSyncEvent::Connected);
    }
}

impl LiveSync for FakeLive {
    fn start<'a>(&'a self, scene: &'a SceneRecord) -> BoxFuture<'a, Result<(), SceneError>> {
        Box::pin(async move {
            self.started.lock().push(scene.object_id.clone());
            Ok(())
        })
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Subscription<LiveSyncEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) warnings: Mutex<Vec<String>>,
    pub(crate) successes: Mutex<Vec<String>>,
    pub(crate) statuses: Mutex<Vec<Option<String>>>,
}

impl Notifier for RecordingNotifier {
    fn warning(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn success(&self, message: &str) {
        self.successes.lock().push(message.to_string());
    }

    fn status_text(&self, text: Option<&str>) {
        self.statuses.lock().push(text.map(str::to_string));
    }
}

/// Every fake wired into one controller.
pub(crate) struct Harness {
    pub(crate) maps: Arc<FakeMapService>,
    pub(crate) sync: Arc<MapCatalogSync>,
    pub(crate) localizer: Arc<FakeLocalizer>,
    pub(crate) space: Arc<FakeSpace>,
    pub(crate) scenes: Arc<FakeScenes>,
    pub(crate) live: Arc<FakeLive>,
    pub(crate) notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub(crate) fn new(maps: Vec<MapRecord>) -> Self {
        let service = Arc::new(FakeMapService::new(maps));
        let sync = Arc::new(MapCatalogSync::new(
            Arc::clone(&service) as Arc<dyn MapListingService>,
            Arc::clone(&service) as Arc<dyn MapLoadService>,
            CatalogConfig::default(),
        ));
        Self {
            maps: service,
            sync,
            localizer: Arc::new(FakeLocalizer::default()),
            space: Arc::new(FakeSpace::default()),
            scenes: Arc::new(FakeScenes::default()),
            live: Arc::new(FakeLive::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub(crate) fn services(&self) -> SessionServices {
        SessionServices {
            localizer: Arc::clone(&self.localizer) as Arc<dyn Localizer>,
            space: Arc::clone(&self.space) as Arc<dyn ArSpace>,
            scenes: Arc::clone(&self.scenes) as Arc<dyn SceneBackend>,
            live: Arc::clone(&self.live) as Arc<dyn LiveSync>,
            notifier: Arc::clone(&self.notifier) as Arc<dyn Notifier>,
            location: Arc::new(Location {
                latitude: 0.0,
                longitude: 0.0,
                gps_on: false,
            }),
        }
    }

    pub(crate) fn controller(&self) -> LocalizationSessionController {
        LocalizationSessionController::new(
            Arc::clone(&self.sync),
            self.services(),
            SessionConfig::default(),
        )
    }

    pub(crate) fn warnings(&self) -> Vec<String> {
        self.notifier.warnings.lock().clone()
    }
}
