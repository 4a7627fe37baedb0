use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use foundation::MapId;
use foundation::math::GeoPoint;
use parking_lot::{Mutex, RwLock};
use runtime::{EventBus, JobLane, JobTicket, Liveness, LivenessGuard, Subscription};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, SortedView};
use crate::record::{MapPayload, MapRecord};
use crate::service::{
    ListRequest, ListResponse, LoadRequest, LocationProvider, MapListingService, MapLoadService,
    ServiceError,
};

pub const DEFAULT_RADIUS: f64 = 200.0;
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// Search radius around the device when GPS search is enabled.
    pub radius: f64,
    /// Merge public maps into the catalog after the private ones.
    pub include_public: bool,
    /// Period of the background refresh while the map selector is open.
    pub refresh_interval: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            include_public: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshParams {
    pub use_gps: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub include_public: bool,
}

impl RefreshParams {
    fn list_request(&self, use_token: bool) -> ListRequest {
        ListRequest {
            use_token,
            use_gps: self.use_gps,
            latitude: self.latitude,
            longitude: self.longitude,
            radius: self.radius,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The catalog was rebuilt and `ListChanged` emitted.
    Updated {
        private: usize,
        /// `None` when public maps were not requested or their fetch failed.
        public: Option<usize>,
        total: usize,
    },
    /// The private fetch failed; the catalog is untouched.
    Failed(ServiceError),
    /// The sync was disabled while the job was in flight.
    Stale,
}

/// Notification that the catalog content was replaced. Re-read the catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ListChanged;

/// Holds one count in the jobs-since-last-disable total until its job
/// finishes or is dropped from the lane.
struct JobSlot {
    jobs: Arc<Mutex<usize>>,
    guard: LivenessGuard,
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        let mut jobs = self.jobs.lock();
        // A disable already reset the count for older epochs.
        if self.guard.is_live() {
            *jobs = jobs.saturating_sub(1);
        }
    }
}

/// Keeps the catalog of available maps in sync with the listing service.
///
/// Every network operation goes through one [`JobLane`], so a refresh never
/// overlaps another refresh or a map load.
pub struct MapCatalogSync {
    config: CatalogConfig,
    listing: Arc<dyn MapListingService>,
    loader: Arc<dyn MapLoadService>,
    catalog: Arc<RwLock<Catalog>>,
    list_changed: Arc<EventBus<ListChanged>>,
    liveness: Liveness,
    /// Jobs submitted since the last disable that have not finished yet.
    jobs: Arc<Mutex<usize>>,
    lane: JobLane,
}

impl MapCatalogSync {
    /// Must be called inside a tokio runtime (spawns the job lane).
    pub fn new(
        listing: Arc<dyn MapListingService>,
        loader: Arc<dyn MapLoadService>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            config,
            listing,
            loader,
            catalog: Arc::new(RwLock::new(Catalog::new())),
            list_changed: Arc::new(EventBus::new(16)),
            liveness: Liveness::new(),
            jobs: Arc::new(Mutex::new(0)),
            lane: JobLane::spawn("catalog"),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn submit<F, T>(&self, label: &'static str, work: F) -> JobTicket<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let slot = {
            let mut jobs = self.jobs.lock();
            *jobs += 1;
            JobSlot {
                jobs: Arc::clone(&self.jobs),
                guard: self.liveness.guard(),
            }
        };
        self.lane.submit(label, async move {
            let out = work.await;
            drop(slot);
            out
        })
    }

    /// Queues a catalog rebuild.
    pub fn refresh(&self, params: RefreshParams) -> JobTicket<RefreshOutcome> {
        let job = run_refresh(
            Arc::clone(&self.listing),
            Arc::clone(&self.catalog),
            Arc::clone(&self.list_changed),
            self.liveness.guard(),
            params,
        );
        self.submit("refresh", job)
    }

    /// Queues a refresh around the provider's current location using the
    /// configured radius and public-map setting.
    pub fn refresh_near(&self, location: &dyn LocationProvider) -> JobTicket<RefreshOutcome> {
        let here = location.current();
        self.refresh(RefreshParams {
            use_gps: here.gps_on,
            latitude: here.latitude,
            longitude: here.longitude,
            radius: self.config.radius,
            include_public: self.config.include_public,
        })
    }

    /// Queues a download of the map's binary payload.
    pub fn load_map(&self, record: &MapRecord) -> JobTicket<Result<MapPayload, ServiceError>> {
        let loader = Arc::clone(&self.loader);
        let request = LoadRequest {
            id: record.id,
            use_token: record.is_private(),
        };
        debug!(map_id = %record.id, use_token = request.use_token, "queueing map load");
        self.submit("load_map", async move { loader.load_map(request).await })
    }

    /// Records in catalog order.
    pub fn maps(&self) -> Vec<MapRecord> {
        self.catalog.read().records().to_vec()
    }

    pub fn map_ids(&self) -> Vec<MapId> {
        self.catalog.read().ids()
    }

    pub fn get(&self, id: MapId) -> Option<MapRecord> {
        self.catalog.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.catalog.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.read().is_empty()
    }

    pub fn sorted_view(&self, reference_lat: f64, reference_lon: f64) -> SortedView {
        self.catalog
            .read()
            .sorted_view(GeoPoint::new(reference_lat, reference_lon))
    }

    pub fn subscribe(&self) -> Subscription<ListChanged> {
        self.list_changed.subscribe()
    }

    /// Queued plus running jobs submitted since the last
    /// [`disable`](Self::disable). A stale job still draining on the lane is
    /// not counted.
    pub fn pending_jobs(&self) -> usize {
        *self.jobs.lock()
    }

    /// Starts accepting completions again after [`disable`](Self::disable).
    pub fn enable(&self) {
        debug!(epoch = self.liveness.epoch(), "catalog sync enabled");
    }

    /// Drops queued jobs; jobs already in flight finish without touching the
    /// catalog or notifying.
    pub fn disable(&self) {
        let dropped = self.lane.clear();
        let epoch = {
            let mut jobs = self.jobs.lock();
            *jobs = 0;
            self.liveness.invalidate()
        };
        let draining = self.lane.pending();
        debug!(dropped, draining, epoch, "catalog sync disabled");
    }
}

impl std::fmt::Debug for MapCatalogSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapCatalogSync")
            .field("config", &self.config)
            .field("maps", &self.len())
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

async fn fetch(
    listing: &dyn MapListingService,
    request: ListRequest,
) -> Result<ListResponse, ServiceError> {
    listing.list_maps(request).await?.into_result()
}

async fn run_refresh(
    listing: Arc<dyn MapListingService>,
    catalog: Arc<RwLock<Catalog>>,
    list_changed: Arc<EventBus<ListChanged>>,
    guard: LivenessGuard,
    params: RefreshParams,
) -> RefreshOutcome {
    let private = match fetch(listing.as_ref(), params.list_request(true)).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!("private map list failed, keeping previous catalog: {err}");
            return RefreshOutcome::Failed(err);
        }
    };
    if !guard.is_live() {
        debug!(epoch = guard.epoch(), "map list arrived after teardown, ignored");
        return RefreshOutcome::Stale;
    }

    info!(count = private.count, "found private maps");
    let private_admitted = catalog.write().replace_with(private.jobs);

    let mut public_admitted = None;
    if params.include_public {
        match fetch(listing.as_ref(), params.list_request(false)).await {
            Ok(resp) => {
                if !guard.is_live() {
                    debug!(epoch = guard.epoch(), "public map list arrived after teardown, ignored");
                    return RefreshOutcome::Stale;
                }
                info!(count = resp.count, "found public maps");
                public_admitted = Some(catalog.write().merge(resp.jobs));
            }
            Err(err) => warn!("public map list failed, keeping private maps: {err}"),
        }
    }

    if !guard.is_live() {
        return RefreshOutcome::Stale;
    }
    let total = catalog.read().len();
    list_changed.emit(ListChanged);
    RefreshOutcome::Updated {
        private: private_admitted,
        public: public_admitted,
        total,
    }
}
