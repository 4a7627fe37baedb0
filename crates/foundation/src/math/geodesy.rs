/// Mean Earth radius (meters), IUGG.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Geographic position in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    pub fn distance_to(self, other: GeoPoint) -> f64 {
        haversine_distance_m(self, other)
    }
}

/// Great-circle distance on a spherical Earth (meters).
///
/// Accuracy is within ~0.5% of the ellipsoidal distance, which is plenty for
/// ranking nearby maps.
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat_deg.to_radians();
    let lat_b = b.lat_deg.to_radians();
    let d_lat = (b.lat_deg - a.lat_deg).to_radians();
    let d_lon = (b.lon_deg - a.lon_deg).to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon * 0.5).sin().powi(2);
    // Clamp guards against h drifting just above 1.0 for antipodal points.
    2.0 * EARTH_MEAN_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::{EARTH_MEAN_RADIUS_M, GeoPoint, haversine_distance_m};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn same_point_is_zero() {
        let p = GeoPoint::new(60.17, 24.94);
        assert_close(haversine_distance_m(p, p), 0.0, 1e-9);
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let expected = EARTH_MEAN_RADIUS_M * 1.0_f64.to_radians();
        assert_close(haversine_distance_m(a, b), expected, 1e-6);
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 180.0);
        assert_close(a.distance_to(b), EARTH_MEAN_RADIUS_M * std::f64::consts::PI, 1e-3);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(60.1699, 24.9384);
        let b = GeoPoint::new(59.4370, 24.7536);
        assert_close(a.distance_to(b), b.distance_to(a), 1e-9);
        // Helsinki to Tallinn, roughly 82 km.
        assert!((80_000.0..84_000.0).contains(&a.distance_to(b)));
    }
}
