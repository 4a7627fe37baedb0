use std::collections::HashMap;

use foundation::MapId;
use foundation::math::GeoPoint;

use crate::ordering::DateDistanceOrder;
use crate::record::{MapRecord, MapStatus, MapType};

/// Whether a listed map may enter the catalog.
pub fn admits(record: &MapRecord) -> bool {
    record.map_type != MapType::Alignment && record.status != MapStatus::Failed
}

/// Set of known maps keyed by id.
///
/// Iteration follows insertion order. Re-inserting an id replaces the record
/// in place so the position of the first insertion is kept.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Catalog {
    records: Vec<MapRecord>,
    index: HashMap<MapId, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: MapId) -> Option<&MapRecord> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: MapId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn records(&self) -> &[MapRecord] {
        &self.records
    }

    pub fn ids(&self) -> Vec<MapId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Returns `false` if the record was filtered out.
    pub fn insert(&mut self, record: MapRecord) -> bool {
        if !admits(&record) {
            return false;
        }
        match self.index.get(&record.id) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.id, self.records.len());
                self.records.push(record);
            }
        }
        true
    }

    /// Inserts every qualifying record; returns how many were admitted.
    pub fn merge<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = MapRecord>,
    {
        let mut admitted = 0;
        for record in records {
            if self.insert(record) {
                admitted += 1;
            }
        }
        admitted
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Drops all current records, then merges `records`.
    pub fn replace_with<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = MapRecord>,
    {
        self.clear();
        self.merge(records)
    }

    pub fn sorted_view(&self, reference: GeoPoint) -> SortedView {
        SortedView::new(self.records.clone(), DateDistanceOrder::new(reference))
    }
}

/// Ordered snapshot of a catalog.
///
/// Detached from the catalog it was taken from; iterate it as many times as
/// needed.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedView {
    order: DateDistanceOrder,
    records: Vec<MapRecord>,
}

impl SortedView {
    fn new(mut records: Vec<MapRecord>, order: DateDistanceOrder) -> Self {
        order.sort(&mut records);
        Self { order, records }
    }

    pub fn order(&self) -> &DateDistanceOrder {
        &self.order
    }

    pub fn reference(&self) -> GeoPoint {
        self.order.reference
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MapRecord> {
        self.records.get(index)
    }

    pub fn position(&self, id: MapId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MapRecord> {
        self.records.iter()
    }

    pub fn into_vec(self) -> Vec<MapRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a SortedView {
    type Item = &'a MapRecord;
    type IntoIter = std::slice::Iter<'a, MapRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for SortedView {
    type Item = MapRecord;
    type IntoIter = std::vec::IntoIter<MapRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
