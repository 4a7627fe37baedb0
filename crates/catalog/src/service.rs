//! Seams to the remote map service and the device location.
//!
//! Implementations must be `Send + Sync` for use across async tasks.
//! Methods return boxed futures for dyn-compatibility.

use foundation::MapId;
use foundation::math::GeoPoint;
use runtime::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::record::{MapPayload, MapRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport failure (connect, timeout, TLS, ...).
    Network(String),
    /// The service answered with an error message.
    Rejected(String),
    /// The response body could not be decoded.
    Decode(String),
    /// No service is configured for this request.
    Unavailable,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Network(msg) => write!(f, "map service unreachable: {msg}"),
            ServiceError::Rejected(msg) => write!(f, "map service error: {msg}"),
            ServiceError::Decode(msg) => write!(f, "invalid map service response: {msg}"),
            ServiceError::Unavailable => write!(f, "map service unavailable"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Map list query. `use_token = false` lists public maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListRequest {
    pub use_token: bool,
    pub use_gps: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub count: i32,
    #[serde(default)]
    pub jobs: Vec<MapRecord>,
}

impl ListResponse {
    /// Maps an in-band error message to [`ServiceError::Rejected`].
    pub fn into_result(self) -> Result<Self, ServiceError> {
        let error = self.error.trim();
        if error.is_empty() || error.eq_ignore_ascii_case("none") {
            Ok(self)
        } else {
            Err(ServiceError::Rejected(error.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    pub id: MapId,
    pub use_token: bool,
}

pub trait MapListingService: Send + Sync {
    fn list_maps(&self, request: ListRequest) -> BoxFuture<'_, Result<ListResponse, ServiceError>>;
}

pub trait MapLoadService: Send + Sync {
    fn load_map(&self, request: LoadRequest) -> BoxFuture<'_, Result<MapPayload, ServiceError>>;
}

/// Device location snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Whether list queries should be restricted to a radius around the device.
    pub gps_on: bool,
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

pub trait LocationProvider: Send + Sync {
    fn current(&self) -> Location;
}

// A fixed location never changes.
impl LocationProvider for Location {
    fn current(&self) -> Location {
        *self
    }
}
