use catalog::MapRecord;
use foundation::MapId;

pub const LOADING_PLACEHOLDER: &str = "Loading map list...";
pub const SELECT_PLACEHOLDER: &str = "Load map...";

/// State of the map drop-down.
///
/// Option 0 is always a placeholder; option `i > 0` is `entries()[i - 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSelector {
    options: Vec<String>,
    entries: Vec<MapRecord>,
    value: usize,
    interactable: bool,
}

impl Default for MapSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl MapSelector {
    pub fn new() -> Self {
        Self {
            options: vec![LOADING_PLACEHOLDER.to_string()],
            entries: Vec::new(),
            value: 0,
            interactable: true,
        }
    }

    /// Clears the entries and shows the loading placeholder.
    pub fn show_loading(&mut self) {
        self.options = vec![LOADING_PLACEHOLDER.to_string()];
        self.entries.clear();
        self.value = 0;
    }

    /// Replaces the entries, keeping the current index when it still points
    /// at an option.
    pub fn populate(&mut self, maps: Vec<MapRecord>) {
        let old = self.value;
        self.options = std::iter::once(SELECT_PLACEHOLDER.to_string())
            .chain(maps.iter().map(|m| m.name.clone()))
            .collect();
        self.entries = maps;
        self.value = if old < self.options.len() { old } else { 0 };
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn entries(&self) -> &[MapRecord] {
        &self.entries
    }

    pub fn value(&self) -> usize {
        self.value
    }

    /// Moves the selection without it counting as a user action.
    pub fn set_value_without_notify(&mut self, value: usize) {
        self.value = value.min(self.options.len().saturating_sub(1));
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }

    pub fn interactable(&self) -> bool {
        self.interactable
    }

    pub fn set_interactable(&mut self, interactable: bool) {
        self.interactable = interactable;
    }

    /// The record behind option `index`; `None` for the placeholder.
    pub fn record_at(&self, index: usize) -> Option<&MapRecord> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Option index showing `id`.
    pub fn index_of(&self, id: MapId) -> Option<usize> {
        self.entries.iter().position(|m| m.id == id).map(|i| i + 1)
    }

    pub fn selected(&self) -> Option<&MapRecord> {
        self.record_at(self.value)
    }
}
