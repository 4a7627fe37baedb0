use bytes::Bytes;
use foundation::MapId;
use foundation::math::GeoPoint;
use foundation::time::Timestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Processing state of a map job, as reported by the listing service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MapStatus {
    Pending,
    Processing,
    Done,
    Sparse,
    Failed,
    /// Any status string this client does not know about.
    Unknown,
}

impl MapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapStatus::Pending => "pending",
            MapStatus::Processing => "processing",
            MapStatus::Done => "done",
            MapStatus::Sparse => "sparse",
            MapStatus::Failed => "failed",
            MapStatus::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => MapStatus::Pending,
            "processing" => MapStatus::Processing,
            "done" => MapStatus::Done,
            "sparse" => MapStatus::Sparse,
            "failed" => MapStatus::Failed,
            _ => MapStatus::Unknown,
        }
    }

    /// Whether the map binary can be downloaded and localized against.
    pub fn is_ready(&self) -> bool {
        matches!(self, MapStatus::Done | MapStatus::Sparse)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, MapStatus::Pending | MapStatus::Processing)
    }
}

impl Serialize for MapStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MapStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MapStatus::parse(&raw))
    }
}

/// Kind of map job. Encoded as an integer on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum MapType {
    #[default]
    Default,
    Stitch,
    /// Alignment jobs produce no localizable map.
    Alignment,
    Other(i32),
}

impl From<i32> for MapType {
    fn from(raw: i32) -> Self {
        match raw {
            0 => MapType::Default,
            1 => MapType::Stitch,
            2 => MapType::Alignment,
            n => MapType::Other(n),
        }
    }
}

impl From<MapType> for i32 {
    fn from(t: MapType) -> Self {
        match t {
            MapType::Default => 0,
            MapType::Stitch => 1,
            MapType::Alignment => 2,
            MapType::Other(n) => n,
        }
    }
}

/// Snapshot of one map as returned by the listing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    #[serde(default)]
    pub name: String,
    pub status: MapStatus,
    #[serde(rename = "type", default)]
    pub map_type: MapType,
    /// 0 is private (needs the account token), anything else is public.
    #[serde(default)]
    pub privacy: i32,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub created: Timestamp,
}

impl MapRecord {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_private(&self) -> bool {
        self.privacy == 0
    }
}

/// Loadable binary map data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapPayload {
    pub map_id: MapId,
    pub bytes: Bytes,
}

impl MapPayload {
    pub fn new(map_id: MapId, bytes: impl Into<Bytes>) -> Self {
        Self {
            map_id,
            bytes: bytes.into(),
        }
    }
}
