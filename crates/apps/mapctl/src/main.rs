mod config;
mod headless;
mod live_query;
mod map_client;
mod parse;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog::{
    Location, LocationProvider, MapCatalogSync, MapListingService, MapLoadService, MapPayload,
    RefreshOutcome,
};
use clap::{Args, Parser, Subcommand};
use foundation::MapId;
use serde::Serialize;
use session::{
    ArSpace, LiveSync, LocalizationSessionController, Localizer, Notifier, SceneBackend,
    SessionConfig, SessionEvent, SessionServices, SessionState, TracingNotifier,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::headless::{HeadlessLocalizer, HeadlessSpace};
use crate::live_query::LiveQueryClient;
use crate::map_client::RestMapService;
use crate::parse::ParseSceneBackend;

#[derive(Debug, Parser)]
#[command(name = "mapctl", about = "Browse cloud maps and drive a headless localization session")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh the catalog and print it in display order.
    List {
        #[command(flatten)]
        location: LocationArgs,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Download one catalog map.
    Load {
        #[command(flatten)]
        location: LocationArgs,
        #[arg(long)]
        id: i32,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run a localization session against the catalog.
    Session {
        #[command(flatten)]
        location: LocationArgs,
        /// Localize against every catalog map.
        #[arg(long)]
        auto: bool,
        /// Load this map instead.
        #[arg(long, conflicts_with = "auto")]
        select: Option<i32>,
        /// Pretend the localizer matched this map.
        #[arg(long)]
        localized: Option<i32>,
        /// Map file instantiated when the placeholder entry is chosen.
        #[arg(long)]
        embedded: Option<PathBuf>,
        /// Seconds to keep the session open.
        #[arg(long, default_value_t = 10)]
        duration: u64,
    },
}

#[derive(Debug, Clone, Copy, Args)]
struct LocationArgs {
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    lon: f64,
    /// Only list maps within MAP_RADIUS of the location.
    #[arg(long)]
    gps: bool,
}

impl LocationArgs {
    fn location(&self) -> Location {
        Location {
            latitude: self.lat,
            longitude: self.lon,
            gps_on: self.gps,
        }
    }
}

#[derive(Debug, Serialize)]
struct MapRow<'a> {
    id: MapId,
    name: &'a str,
    status: &'static str,
    created: String,
    distance_m: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<(), String> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let http = config.http_client()?;
    let maps = Arc::new(RestMapService::new(
        http.clone(),
        config.map_service_url.clone(),
        config.map_token.clone(),
    ));
    let sync = Arc::new(MapCatalogSync::new(
        Arc::clone(&maps) as Arc<dyn MapListingService>,
        Arc::clone(&maps) as Arc<dyn MapLoadService>,
        config.catalog_config(),
    ));

    match cli.command {
        Command::List { location, json } => cmd_list(&sync, location.location(), json).await,
        Command::Load { location, id, out } => {
            cmd_load(&sync, location.location(), MapId(id), out).await
        }
        Command::Session {
            location,
            auto,
            select,
            localized,
            embedded,
            duration,
        } => {
            let localizer = Arc::new(HeadlessLocalizer::default());
            let live = Arc::new(LiveQueryClient::new(
                config.live_url(),
                config.parse_app_id.clone(),
                config.parse_rest_key.clone(),
            ));
            let services = SessionServices {
                localizer: Arc::clone(&localizer) as Arc<dyn Localizer>,
                space: Arc::new(HeadlessSpace::new(Arc::clone(&maps) as Arc<dyn MapLoadService>))
                    as Arc<dyn ArSpace>,
                scenes: Arc::new(ParseSceneBackend::new(
                    http,
                    config.parse_server_url.clone(),
                    config.parse_app_id.clone(),
                    config.parse_rest_key.clone(),
                )) as Arc<dyn SceneBackend>,
                live: live as Arc<dyn LiveSync>,
                notifier: Arc::new(TracingNotifier) as Arc<dyn Notifier>,
                location: Arc::new(location.location()) as Arc<dyn LocationProvider>,
            };
            let plan = SessionPlan {
                auto,
                select: select.map(MapId),
                localized: localized.map(MapId),
                embedded,
                duration: Duration::from_secs(duration),
            };
            cmd_session(sync, services, localizer, plan).await
        }
    }
}

async fn refresh(sync: &MapCatalogSync, location: &Location) -> Result<(), String> {
    match sync.refresh_near(location).await {
        Ok(RefreshOutcome::Updated { total, .. }) => {
            info!(total, "catalog refreshed");
            Ok(())
        }
        Ok(RefreshOutcome::Failed(err)) => Err(err.to_string()),
        Ok(RefreshOutcome::Stale) => Err("catalog refresh was abandoned".to_string()),
        Err(canceled) => Err(canceled.to_string()),
    }
}

async fn cmd_list(sync: &MapCatalogSync, location: Location, json: bool) -> Result<(), String> {
    refresh(sync, &location).await?;
    let view = sync.sorted_view(location.latitude, location.longitude);
    let rows: Vec<MapRow<'_>> = view
        .iter()
        .map(|m| MapRow {
            id: m.id,
            name: &m.name,
            status: m.status.as_str(),
            created: m
                .created
                .calendar_date()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            distance_m: view.order().distance_m(m),
        })
        .collect();

    if json {
        let text = serde_json::to_string_pretty(&rows).map_err(|e| format!("encode: {e}"))?;
        println!("{text}");
        return Ok(());
    }
    for row in &rows {
        println!(
            "{:>8}  {:<10}  {:<10}  {:>10.0} m  {}",
            row.id.to_string(),
            row.status,
            row.created,
            row.distance_m,
            row.name
        );
    }
    Ok(())
}

async fn cmd_load(
    sync: &MapCatalogSync,
    location: Location,
    id: MapId,
    out: PathBuf,
) -> Result<(), String> {
    refresh(sync, &location).await?;
    let record = sync
        .get(id)
        .ok_or_else(|| format!("map {id} is not in the catalog"))?;
    if !record.status.is_ready() {
        return Err(format!("map {id} is {}", record.status.as_str()));
    }
    let payload = sync
        .load_map(&record)
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
    tokio::fs::write(&out, &payload.bytes)
        .await
        .map_err(|e| format!("write {out:?}: {e}"))?;
    println!("wrote {} bytes to {}", payload.bytes.len(), out.display());
    Ok(())
}

struct SessionPlan {
    auto: bool,
    select: Option<MapId>,
    localized: Option<MapId>,
    embedded: Option<PathBuf>,
    duration: Duration,
}

async fn cmd_session(
    sync: Arc<MapCatalogSync>,
    services: SessionServices,
    localizer: Arc<HeadlessLocalizer>,
    plan: SessionPlan,
) -> Result<(), String> {
    let mut controller = LocalizationSessionController::new(sync, services, SessionConfig::default());
    if let Some(path) = &plan.embedded {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| format!("read {path:?}: {e}"))?;
        controller = controller.with_embedded_map(MapPayload::new(MapId(0), bytes));
    }

    controller.enable();
    wait_for(&mut controller, "catalog_changed", plan.duration).await?;
    for (index, option) in controller.selector().options().iter().enumerate() {
        println!("{index:>3}  {option}");
    }

    if plan.auto {
        controller.dispatch(SessionEvent::SetAutoLocalize(true)).await;
    } else if let Some(id) = plan.select {
        let index = controller
            .selector()
            .index_of(id)
            .ok_or_else(|| format!("map {id} is not in the catalog"))?;
        controller.dispatch(SessionEvent::Select(index)).await;
        if matches!(controller.state(), SessionState::SingleMapLoading { .. }) {
            wait_for(&mut controller, "map_loaded", plan.duration).await?;
        }
    } else if plan.embedded.is_some() {
        controller.dispatch(SessionEvent::Select(0)).await;
    }

    if let Some(id) = plan.localized {
        if !localizer.report_localized(id) {
            info!(%id, "localizer is not running, nothing reported");
        }
    }

    // Keep handling events until the time runs out.
    let _ = tokio::time::timeout(plan.duration, async {
        while controller.step().await.is_some() {}
    })
    .await;

    println!("state: {}", controller.state().name());
    if let Some(scene) = controller.bound_scene() {
        println!("scene: {} (map {})", scene.object_id, scene.map_id);
    }
    controller.disable();
    Ok(())
}

async fn wait_for(
    controller: &mut LocalizationSessionController,
    kind: &str,
    limit: Duration,
) -> Result<(), String> {
    tokio::time::timeout(limit, async {
        while let Some(handled) = controller.step().await {
            if handled == kind {
                return true;
            }
        }
        false
    })
    .await
    .ok()
    .filter(|reached| *reached)
    .map(|_| ())
    .ok_or_else(|| format!("timed out waiting for {kind}"))
}
