use std::sync::Arc;

use catalog::{MapCatalogSync, MapPayload, MapRecord, PeriodicRefresh, ServiceError};
use foundation::MapId;
use runtime::{JobCanceled, Liveness, Subscription};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::scene::{SceneBinding, resolve_scene};
use crate::selector::MapSelector;
use crate::services::{LiveSyncEvent, LocalizerEvent, SceneRecord, SessionServices};
use crate::state::SessionState;

pub const NOT_READY_WARNING: &str =
    "The map hasn't finished processing yet, try again in a few seconds.";
pub const LOCALIZED_SUCCESS: &str = "Map localized successfully.";
pub const LOADING_STATUS: &str = "Please wait while loading...";
pub const LOAD_FAILED_WARNING: &str = "Could not load the map, please try again.";

/// User-facing messages.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub not_ready_warning: String,
    pub localized_success: String,
    pub loading_status: String,
    pub load_failed_warning: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            not_ready_warning: NOT_READY_WARNING.to_string(),
            localized_success: LOCALIZED_SUCCESS.to_string(),
            loading_status: LOADING_STATUS.to_string(),
            load_failed_warning: LOAD_FAILED_WARNING.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    Service(ServiceError),
    Canceled(JobCanceled),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Service(err) => write!(f, "{err}"),
            LoadError::Canceled(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Everything the controller reacts to, in arrival order.
#[derive(Debug)]
pub enum SessionEvent {
    Select(usize),
    SetAutoLocalize(bool),
    SetSelectorExpanded(bool),
    CatalogChanged,
    MapLocalized(MapId),
    LiveSyncConnected,
    MapLoaded {
        epoch: u64,
        request: u64,
        record: MapRecord,
        result: Result<MapPayload, LoadError>,
    },
    Disable,
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Select(_) => "select",
            SessionEvent::SetAutoLocalize(_) => "set_auto_localize",
            SessionEvent::SetSelectorExpanded(_) => "set_selector_expanded",
            SessionEvent::CatalogChanged => "catalog_changed",
            SessionEvent::MapLocalized(_) => "map_localized",
            SessionEvent::LiveSyncConnected => "live_sync_connected",
            SessionEvent::MapLoaded { .. } => "map_loaded",
            SessionEvent::Disable => "disable",
        }
    }
}

/// Sends UI intents to a running controller.
///
/// Methods return `false` once the controller has stopped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn select(&self, index: usize) -> bool {
        self.tx.send(SessionEvent::Select(index)).is_ok()
    }

    pub fn set_auto_localize(&self, on: bool) -> bool {
        self.tx.send(SessionEvent::SetAutoLocalize(on)).is_ok()
    }

    pub fn set_selector_expanded(&self, expanded: bool) -> bool {
        self.tx.send(SessionEvent::SetSelectorExpanded(expanded)).is_ok()
    }

    pub fn disable(&self) -> bool {
        self.tx.send(SessionEvent::Disable).is_ok()
    }
}

/// Drives which maps the localizer uses and which scene is bound.
///
/// Owns its state and handles one [`SessionEvent`] at a time. Subsystem
/// events are forwarded into the same channel by tasks spawned in
/// [`enable`](Self::enable).
pub struct LocalizationSessionController {
    catalog: Arc<MapCatalogSync>,
    services: SessionServices,
    config: SessionConfig,
    selector: MapSelector,
    state: SessionState,
    auto_localize: bool,
    map_changed_armed: bool,
    binding: SceneBinding,
    embedded_map: Option<MapPayload>,
    liveness: Liveness,
    enabled: bool,
    next_request: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    forwarders: Vec<JoinHandle<()>>,
    periodic: Option<PeriodicRefresh>,
}

impl LocalizationSessionController {
    pub fn new(
        catalog: Arc<MapCatalogSync>,
        services: SessionServices,
        config: SessionConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            catalog,
            services,
            config,
            selector: MapSelector::new(),
            state: SessionState::Idle,
            auto_localize: false,
            map_changed_armed: false,
            binding: SceneBinding::new(),
            embedded_map: None,
            liveness: Liveness::new(),
            enabled: false,
            next_request: 0,
            tx,
            rx,
            forwarders: Vec::new(),
            periodic: None,
        }
    }

    /// Map instantiated when the placeholder entry is chosen.
    pub fn with_embedded_map(mut self, payload: MapPayload) -> Self {
        self.embedded_map = Some(payload);
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn selector(&self) -> &MapSelector {
        &self.selector
    }

    pub fn auto_localize(&self) -> bool {
        self.auto_localize
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn bound_scene(&self) -> Option<&SceneRecord> {
        self.binding.current()
    }

    /// Must be called inside a tokio runtime (spawns the forwarders).
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.selector.show_loading();
        self.selector.set_interactable(!self.auto_localize);
        self.catalog.enable();

        // Subscribe before refreshing so the first ListChanged is not missed.
        self.forwarders.push(forward(
            self.catalog.subscribe(),
            self.tx.clone(),
            |_| Some(SessionEvent::CatalogChanged),
        ));
        self.forwarders.push(forward(
            self.services.localizer.subscribe(),
            self.tx.clone(),
            |event| match event {
                LocalizerEvent::MapChanged(id) => Some(SessionEvent::MapLocalized(id)),
            },
        ));
        self.forwarders.push(forward(
            self.services.live.subscribe(),
            self.tx.clone(),
            |event| match event {
                LiveSyncEvent::Connected => Some(SessionEvent::LiveSyncConnected),
                LiveSyncEvent::Disconnected => {
                    debug!("live sync disconnected");
                    None
                }
            },
        ));

        if self.catalog.pending_jobs() == 0 {
            // The outcome arrives as CatalogChanged.
            let _ = self.catalog.refresh_near(self.services.location.as_ref());
        }
        debug!(epoch = self.liveness.epoch(), "session enabled");
    }

    /// Tears the session down. In-flight loads complete into the void.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        if self.auto_localize {
            self.stop_server_localizer();
        }
        self.free_all_maps();
        self.binding.unbind(self.services.live.as_ref());
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
        self.periodic = None;
        let epoch = self.liveness.invalidate();
        self.catalog.disable();
        self.map_changed_armed = false;
        self.state = SessionState::Idle;

        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        debug!(epoch, dropped, "session disabled");
    }

    /// Enables the session and handles events until [`SessionHandle::disable`].
    pub async fn run(mut self) {
        self.enable();
        while let Some(event) = self.rx.recv().await {
            let stop = matches!(event, SessionEvent::Disable);
            self.dispatch(event).await;
            if stop {
                break;
            }
        }
    }

    /// Waits for the next event and handles it. Returns its kind.
    pub async fn step(&mut self) -> Option<&'static str> {
        let event = self.rx.recv().await?;
        let kind = event.kind();
        self.dispatch(event).await;
        Some(kind)
    }

    /// Handles every event already queued without waiting for more.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch(event).await;
            handled += 1;
        }
        handled
    }

    pub async fn dispatch(&mut self, event: SessionEvent) {
        if !self.enabled {
            match event {
                SessionEvent::SetAutoLocalize(on) => {
                    self.auto_localize = on;
                    self.selector.set_interactable(!on);
                }
                other => debug!(event = other.kind(), "session disabled, event ignored"),
            }
            return;
        }
        match event {
            SessionEvent::Select(index) => self.select(index).await,
            SessionEvent::SetAutoLocalize(on) => self.set_auto_localize(on).await,
            SessionEvent::SetSelectorExpanded(expanded) => self.set_selector_expanded(expanded),
            SessionEvent::CatalogChanged => self.on_catalog_changed().await,
            SessionEvent::MapLocalized(id) => self.on_map_localized(id).await,
            SessionEvent::LiveSyncConnected => self.on_live_sync_connected(),
            SessionEvent::MapLoaded {
                epoch,
                request,
                record,
                result,
            } => self.on_map_loaded(epoch, request, record, result).await,
            SessionEvent::Disable => self.disable(),
        }
    }

    pub async fn on_catalog_changed(&mut self) {
        let here = self.services.location.current();
        let view = self.catalog.sorted_view(here.latitude, here.longitude);
        info!(maps = view.len(), "map list updated");
        self.selector.populate(view.into_vec());
        if self.auto_localize {
            self.start_server_localizer().await;
        }
    }

    pub async fn set_auto_localize(&mut self, on: bool) {
        self.auto_localize = on;
        self.selector.set_interactable(!on);
        if on {
            self.start_server_localizer().await;
        } else {
            self.stop_server_localizer();
        }
    }

    pub fn set_selector_expanded(&mut self, expanded: bool) {
        if !expanded {
            if self.periodic.take().is_some() {
                debug!("periodic refresh stopped");
            }
            return;
        }
        if self.periodic.is_none() {
            let location = Arc::clone(&self.services.location);
            self.periodic = Some(self.catalog.start_periodic_refresh(location));
            debug!("periodic refresh started");
        }
    }

    /// Handles a pick from the map selector.
    pub async fn select(&mut self, index: usize) {
        self.services.localizer.stop_localizing();
        self.selector.set_value_without_notify(index);

        if index == 0 {
            if let Some(payload) = self.embedded_map.clone() {
                self.free_all_maps();
                match self.services.space.instantiate(&payload) {
                    Ok(()) => {
                        info!(map_id = %payload.map_id, "embedded map instantiated");
                        self.state = SessionState::SingleMapBound {
                            map_id: payload.map_id,
                        };
                    }
                    Err(err) => warn!("embedded map unusable: {err}"),
                }
            }
            return;
        }

        let Some(record) = self.selector.record_at(index).cloned() else {
            debug!(index, "no map at selector index");
            self.selector.reset();
            return;
        };
        if record.status.is_ready() {
            self.map_changed_armed = false;
            self.free_all_maps();
            self.begin_load(record);
        } else if record.status.is_in_progress() {
            debug!(map_id = %record.id, status = record.status.as_str(), "map not ready");
            self.services.notifier.warning(&self.config.not_ready_warning);
            self.selector.reset();
        } else {
            debug!(map_id = %record.id, status = record.status.as_str(), "map not selectable");
            self.selector.reset();
        }
    }

    pub async fn on_map_localized(&mut self, map_id: MapId) {
        if !self.map_changed_armed {
            debug!(%map_id, "map change ignored, not auto-localizing");
            return;
        }
        if let Some(index) = self.selector.index_of(map_id) {
            self.selector.set_value_without_notify(index);
            self.services
                .notifier
                .success(&self.config.localized_success);
        }
        self.bind_scene(map_id).await;
    }

    pub fn on_live_sync_connected(&mut self) {
        self.services.notifier.status_text(None);
    }

    fn begin_load(&mut self, record: MapRecord) {
        if !self.services.live.is_connected() {
            self.services
                .notifier
                .status_text(Some(&self.config.loading_status));
        }
        self.next_request += 1;
        let request = self.next_request;
        let epoch = self.liveness.epoch();
        self.state = SessionState::SingleMapLoading {
            map_id: record.id,
            request,
        };

        let ticket = self.catalog.load_map(&record);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match ticket.await {
                Ok(Ok(payload)) => Ok(payload),
                Ok(Err(err)) => Err(LoadError::Service(err)),
                Err(canceled) => Err(LoadError::Canceled(canceled)),
            };
            // The controller may be gone by now.
            let _ = tx.send(SessionEvent::MapLoaded {
                epoch,
                request,
                record,
                result,
            });
        });
    }

    async fn on_map_loaded(
        &mut self,
        epoch: u64,
        request: u64,
        record: MapRecord,
        result: Result<MapPayload, LoadError>,
    ) {
        if epoch != self.liveness.epoch() {
            debug!(map_id = %record.id, epoch, "map load finished after teardown, ignored");
            return;
        }
        match self.state {
            SessionState::SingleMapLoading { request: current, .. } if current == request => {}
            _ => {
                debug!(map_id = %record.id, request, "map load superseded, ignored");
                return;
            }
        }

        let payload = match result {
            Ok(payload) => payload,
            Err(err) => {
                warn!(map_id = %record.id, "map load failed: {err}");
                self.fail_load();
                return;
            }
        };
        if let Err(err) = self.services.space.instantiate(&payload) {
            warn!("{err}");
            self.fail_load();
            return;
        }
        info!(map_id = %record.id, name = %record.name, "map loaded");
        self.state = SessionState::SingleMapBound { map_id: record.id };
        self.bind_scene(record.id).await;

        let localizer = &self.services.localizer;
        if localizer.use_server_localizer() {
            localizer.set_map_ids(vec![record.id]);
        }
        localizer.set_auto_start(true);
        if let Err(err) = localizer.start_localizing() {
            warn!("{err}");
        }
    }

    fn fail_load(&mut self) {
        self.services
            .notifier
            .warning(&self.config.load_failed_warning);
        self.selector.reset();
        self.state = SessionState::Idle;
    }

    async fn bind_scene(&mut self, map_id: MapId) {
        let scene = match resolve_scene(self.services.scenes.as_ref(), map_id).await {
            Ok(scene) => scene,
            Err(err) => {
                warn!(%map_id, "continuing without a scene: {err}");
                self.binding.unbind(self.services.live.as_ref());
                return;
            }
        };
        match self.binding.bind(self.services.live.as_ref(), scene).await {
            Ok(true) => {}
            Ok(false) => debug!(%map_id, "scene already bound"),
            Err(err) => warn!(%map_id, "{err}"),
        }
    }

    async fn start_server_localizer(&mut self) {
        let localizer = Arc::clone(&self.services.localizer);
        localizer.stop_localizing();
        self.free_all_maps();
        self.selector.reset();

        let maps = self.catalog.maps();
        if maps.is_empty() {
            debug!("no maps to localize against");
            self.map_changed_armed = false;
            self.state = SessionState::Idle;
            return;
        }
        for map in &maps {
            if let Err(err) = self.services.space.load_and_instantiate(map).await {
                warn!("{err}");
            }
        }

        let map_ids: Vec<MapId> = maps.iter().map(|m| m.id).collect();
        self.map_changed_armed = true;
        localizer.set_map_ids(map_ids.clone());
        localizer.set_use_server_localizer(true);
        localizer.set_auto_start(true);
        match localizer.start_localizing() {
            Ok(()) => info!(maps = map_ids.len(), "server localization started"),
            Err(err) => warn!("{err}"),
        }
        self.state = SessionState::AutoLocalizing { map_ids };
    }

    fn stop_server_localizer(&mut self) {
        let localizer = &self.services.localizer;
        localizer.stop_localizing();
        localizer.set_use_server_localizer(false);
        self.map_changed_armed = false;
        self.selector.reset();
        self.free_all_maps();
        self.state = SessionState::Idle;
        debug!("server localization stopped");
    }

    fn free_all_maps(&self) {
        let space = &self.services.space;
        for id in space.instantiated() {
            space.free_map(id);
        }
        self.services.localizer.set_map_ids(Vec::new());
    }
}

impl std::fmt::Debug for LocalizationSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizationSessionController")
            .field("state", &self.state)
            .field("auto_localize", &self.auto_localize)
            .field("enabled", &self.enabled)
            .field("bound_scene", &self.binding.current())
            .finish()
    }
}

fn forward<E, F>(
    mut events: Subscription<E>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    map: F,
) -> JoinHandle<()>
where
    E: Clone + Send + 'static,
    F: Fn(E) -> Option<SessionEvent> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(event) = map(event) else {
                continue;
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    })
}
