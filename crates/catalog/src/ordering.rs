use std::cmp::Ordering;

use foundation::math::GeoPoint;

use crate::record::MapRecord;

/// Display order for maps: newest calendar day first, then nearest first.
///
/// Only the creation *date* takes part; maps created on the same day are
/// ranked by distance from `reference`. Callers rely on a stable sort so
/// records equal under both keys keep their input order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DateDistanceOrder {
    pub reference: GeoPoint,
}

impl DateDistanceOrder {
    pub fn new(reference: GeoPoint) -> Self {
        Self { reference }
    }

    pub fn distance_m(&self, record: &MapRecord) -> f64 {
        self.reference.distance_to(record.position())
    }

    pub fn compare(&self, a: &MapRecord, b: &MapRecord) -> Ordering {
        // Descending by date (unknown dates last), ascending by distance.
        b.created
            .calendar_date()
            .cmp(&a.created.calendar_date())
            .then_with(|| self.distance_m(a).total_cmp(&self.distance_m(b)))
    }

    pub fn sort(&self, records: &mut [MapRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::DateDistanceOrder;
    use crate::record::{MapRecord, MapStatus, MapType};
    use foundation::MapId;
    use foundation::math::GeoPoint;
    use foundation::time::Timestamp;
    use pretty_assertions::assert_eq;

    fn rec(id: i32, created: &str, lat: f64, lon: f64) -> MapRecord {
        MapRecord {
            id: MapId(id),
            name: format!("map-{id}"),
            status: MapStatus::Done,
            map_type: MapType::Default,
            privacy: 0,
            latitude: lat,
            longitude: lon,
            created: Timestamp::parse(created),
        }
    }

    fn ids(records: &[MapRecord]) -> Vec<i32> {
        records.iter().map(|r| r.id.0).collect()
    }

    #[test]
    fn newest_day_first_then_nearest() {
        let order = DateDistanceOrder::new(GeoPoint::new(0.0, 0.0));
        // A is farther than B on the same day; C is closest but a day older.
        let mut maps = vec![
            rec(1, "2024-01-02", 0.05, 0.0),
            rec(2, "2024-01-02", 0.01, 0.0),
            rec(3, "2024-01-01", 0.0, 0.0),
        ];
        order.sort(&mut maps);
        assert_eq!(ids(&maps), vec![2, 1, 3]);
    }

    #[test]
    fn time_of_day_is_ignored() {
        let order = DateDistanceOrder::new(GeoPoint::new(0.0, 0.0));
        let mut maps = vec![
            rec(1, "2024-03-04 23:00:00", 1.0, 0.0),
            rec(2, "2024-03-04 01:00:00", 0.5, 0.0),
        ];
        order.sort(&mut maps);
        assert_eq!(ids(&maps), vec![2, 1]);
    }

    #[test]
    fn full_ties_keep_input_order() {
        let order = DateDistanceOrder::new(GeoPoint::new(10.0, 10.0));
        let mut maps = vec![
            rec(5, "2024-01-02", 10.0, 10.2),
            rec(4, "2024-01-02", 10.0, 10.2),
            rec(6, "2024-01-02", 10.0, 10.2),
        ];
        order.sort(&mut maps);
        assert_eq!(ids(&maps), vec![5, 4, 6]);
    }

    #[test]
    fn unknown_dates_sort_last() {
        let order = DateDistanceOrder::new(GeoPoint::new(0.0, 0.0));
        let mut maps = vec![rec(1, "n/a", 0.0, 0.0), rec(2, "2001-01-01", 5.0, 5.0)];
        order.sort(&mut maps);
        assert_eq!(ids(&maps), vec![2, 1]);
    }
}
