/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two `(latitude, longitude)`
/// points given in degrees.
pub fn haversine(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` marginally above 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(haversine((46.2, 6.1), (46.2, 6.1)), 0.0);
    }

    #[test]
    fn test_is_symmetric() {
        let cern = (46.23, 6.05);
        let fnal = (41.84, -88.26);
        assert!((haversine(cern, fnal) - haversine(fnal, cern)).abs() < 1e-9);
    }

    #[test]
    fn test_quarter_meridian() {
        // Equator to pole along a meridian is a quarter of the circumference.
        let expected = std::f64::consts::PI * EARTH_RADIUS_KM / 2.0;
        assert!((haversine((0.0, 0.0), (90.0, 0.0)) - expected).abs() < 1e-6);
    }
}
