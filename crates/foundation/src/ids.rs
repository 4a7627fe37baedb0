use serde::{Deserialize, Serialize};

/// Identity of a cloud map, as issued by the map service.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub i32);

impl MapId {
    pub fn new(n: i32) -> Self {
        MapId(n)
    }
}

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
