use foundation::MapId;

/// Lifecycle of the localization session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Localizing against every catalog map through the server localizer.
    AutoLocalizing { map_ids: Vec<MapId> },
    /// A selected map is being downloaded. `request` identifies the load so
    /// that a superseded one can be told apart.
    SingleMapLoading { map_id: MapId, request: u64 },
    /// One selected map is instantiated and localizing.
    SingleMapBound { map_id: MapId },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AutoLocalizing { .. } => "auto_localizing",
            SessionState::SingleMapLoading { .. } => "single_map_loading",
            SessionState::SingleMapBound { .. } => "single_map_bound",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Map the session is loading or bound to in single-map mode.
    pub fn single_map(&self) -> Option<MapId> {
        match self {
            SessionState::SingleMapLoading { map_id, .. } | SessionState::SingleMapBound { map_id } => {
                Some(*map_id)
            }
            _ => None,
        }
    }
}
