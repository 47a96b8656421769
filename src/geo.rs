//! Coordinate transformation from the Krovak S-JTSK projection to WGS84
//!
//! The registry publishes address points as S-JTSK plane coordinates
//! (southing `X`, westing `Y`, both positive). Conversion runs in three steps:
//!
//! 1. inverse Krovak projection to geographic coordinates on the Bessel 1841
//!    ellipsoid,
//! 2. seven-parameter Helmert shift (position vector convention) from the
//!    S-JTSK datum to WGS84 in geocentric coordinates,
//! 3. geocentric to geodetic conversion on the WGS84 ellipsoid.
//!
//! The projection constants are derived once in [`KrovakTransformer::new`]
//! and reused for every row of an import run.

use crate::types::GeoPoint;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

const ARC_SECOND: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Reference ellipsoid
#[derive(Debug, Clone, Copy)]
struct Ellipsoid {
    a: f64,
    e2: f64,
}

impl Ellipsoid {
    fn from_inverse_flattening(a: f64, inv_f: f64) -> Self {
        let f = 1.0 / inv_f;
        Self { a, e2: 2.0 * f - f * f }
    }

    const fn bessel_1841() -> (f64, f64) {
        (6_377_397.155, 299.152_812_8)
    }

    const fn wgs84() -> (f64, f64) {
        (6_378_137.0, 298.257_223_563)
    }

    fn to_geocentric(&self, lat: f64, lon: f64, height: f64) -> [f64; 3] {
        let n = self.a / (1.0 - self.e2 * lat.sin().powi(2)).sqrt();
        [
            (n + height) * lat.cos() * lon.cos(),
            (n + height) * lat.cos() * lon.sin(),
            (n * (1.0 - self.e2) + height) * lat.sin(),
        ]
    }

    fn to_geodetic(&self, xyz: [f64; 3]) -> (f64, f64) {
        let [x, y, z] = xyz;
        let p = (x * x + y * y).sqrt();
        let lon = y.atan2(x);
        let mut lat = z.atan2(p * (1.0 - self.e2));
        for _ in 0..10 {
            let n = self.a / (1.0 - self.e2 * lat.sin().powi(2)).sqrt();
            let next = (z + self.e2 * n * lat.sin()).atan2(p);
            if (next - lat).abs() < 1e-14 {
                lat = next;
                break;
            }
            lat = next;
        }
        (lat, lon)
    }
}

/// Seven-parameter datum shift, position vector convention
#[derive(Debug, Clone, Copy)]
pub struct HelmertShift {
    /// Translations in metres
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// Rotations in arc seconds
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    /// Scale difference in parts per million
    pub ppm: f64,
}

impl HelmertShift {
    /// S-JTSK to WGS84 parameters published for the Czech territory
    pub const S_JTSK_TO_WGS84: HelmertShift = HelmertShift {
        dx: 570.69,
        dy: 85.69,
        dz: 462.84,
        rx: 4.99821,
        ry: 1.58676,
        rz: 5.2611,
        ppm: 3.543,
    };

    fn apply(&self, xyz: [f64; 3]) -> [f64; 3] {
        let [x, y, z] = xyz;
        let (rx, ry, rz) = (self.rx * ARC_SECOND, self.ry * ARC_SECOND, self.rz * ARC_SECOND);
        let m = 1.0 + self.ppm * 1e-6;
        [
            self.dx + m * (x - rz * y + ry * z),
            self.dy + m * (rz * x + y - rx * z),
            self.dz + m * (-ry * x + rx * y + z),
        ]
    }
}

/// Inverse Krovak projection with a datum shift to WGS84
#[derive(Debug, Clone)]
pub struct KrovakTransformer {
    bessel: Ellipsoid,
    wgs84: Ellipsoid,
    shift: HelmertShift,
    /// Longitude of origin (Greenwich), radians
    lon_origin: f64,
    /// Co-latitude of the cone axis, radians
    alpha_c: f64,
    /// Latitude of the pseudo standard parallel, radians
    phi_p: f64,
    e: f64,
    b: f64,
    t0: f64,
    n: f64,
    r0: f64,
}

impl Default for KrovakTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl KrovakTransformer {
    /// Build a transformer for the S-JTSK / Krovak East North system
    pub fn new() -> Self {
        Self::with_shift(HelmertShift::S_JTSK_TO_WGS84)
    }

    /// Build a transformer using a custom datum shift
    pub fn with_shift(shift: HelmertShift) -> Self {
        let (a, inv_f) = Ellipsoid::bessel_1841();
        let bessel = Ellipsoid::from_inverse_flattening(a, inv_f);
        let (wa, winv_f) = Ellipsoid::wgs84();
        let wgs84 = Ellipsoid::from_inverse_flattening(wa, winv_f);

        let deg = std::f64::consts::PI / 180.0;
        let phi_c = 49.5 * deg;
        let lon_origin = (24.0 + 50.0 / 60.0) * deg;
        let alpha_c = (30.0 + 17.0 / 60.0 + 17.303_11 / 3600.0) * deg;
        let phi_p = 78.5 * deg;
        let k_p = 0.9999;

        let e2 = bessel.e2;
        let e = e2.sqrt();
        let a_const = bessel.a * (1.0 - e2).sqrt() / (1.0 - e2 * phi_c.sin().powi(2));
        let b = (1.0 + e2 * phi_c.cos().powi(4) / (1.0 - e2)).sqrt();
        let gamma0 = (phi_c.sin() / b).asin();
        let t0 = (FRAC_PI_4 + gamma0 / 2.0).tan()
            * ((1.0 + e * phi_c.sin()) / (1.0 - e * phi_c.sin())).powf(e * b / 2.0)
            / (FRAC_PI_4 + phi_c / 2.0).tan().powf(b);
        let n = phi_p.sin();
        let r0 = k_p * a_const / phi_p.tan();

        Self {
            bessel,
            wgs84,
            shift,
            lon_origin,
            alpha_c,
            phi_p,
            e,
            b,
            t0,
            n,
            r0,
        }
    }

    /// Convert raw registry fields to WGS84.
    ///
    /// Returns [`GeoPoint::ZERO`] when either value is missing, empty or not a
    /// number. A decimal comma is accepted.
    pub fn transform(&self, x: Option<&str>, y: Option<&str>) -> GeoPoint {
        match (x.and_then(parse_coordinate), y.and_then(parse_coordinate)) {
            (Some(x), Some(y)) => self.transform_xy(x, y),
            _ => GeoPoint::ZERO,
        }
    }

    /// Convert S-JTSK southing `x` and westing `y` (metres) to WGS84.
    ///
    /// Signs are ignored so both the positive registry convention and the
    /// negative EPSG:5514 convention are accepted.
    pub fn transform_xy(&self, x: f64, y: f64) -> GeoPoint {
        let (x, y) = (x.abs(), y.abs());
        if x == 0.0 && y == 0.0 {
            return GeoPoint::ZERO;
        }
        let (lat, lon) = self.inverse_krovak(x, y);
        let geocentric = self.bessel.to_geocentric(lat, lon, 0.0);
        let shifted = self.shift.apply(geocentric);
        let (lat, lon) = self.wgs84.to_geodetic(shifted);
        let point = GeoPoint::new(lat.to_degrees(), lon.to_degrees());
        if point.lat.is_finite() && point.lon.is_finite() {
            point
        } else {
            GeoPoint::ZERO
        }
    }

    /// Geographic coordinates on the Bessel ellipsoid, radians
    fn inverse_krovak(&self, x: f64, y: f64) -> (f64, f64) {
        let r = (x * x + y * y).sqrt();
        let theta = y.atan2(x);
        let d = theta / self.n;
        let t = 2.0
            * (((self.r0 / r).powf(1.0 / self.n) * (FRAC_PI_4 + self.phi_p / 2.0).tan()).atan()
                - FRAC_PI_4);
        let u = (self.alpha_c.cos() * t.sin() - self.alpha_c.sin() * t.cos() * d.cos()).asin();
        let v = (t.cos() * d.sin() / u.cos()).asin();

        let e = self.e;
        let base = self.t0.powf(-1.0 / self.b) * (u / 2.0 + FRAC_PI_4).tan().powf(1.0 / self.b);
        let mut phi = u;
        for _ in 0..20 {
            let next = 2.0
                * ((base * ((1.0 + e * phi.sin()) / (1.0 - e * phi.sin())).powf(e / 2.0)).atan()
                    - FRAC_PI_4);
            if (next - phi).abs() < 1e-14 {
                phi = next;
                break;
            }
            phi = next;
        }
        let phi = phi.clamp(-FRAC_PI_2, FRAC_PI_2);
        let lambda = self.lon_origin - v / self.b;
        (phi, lambda)
    }
}

/// Parse a projected coordinate field, accepting a decimal comma
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-5;

    #[test]
    fn test_inverse_projection_matches_reference_point() {
        // EPSG Guidance Note 7-2 Krovak example, Bessel geographic coordinates
        let t = KrovakTransformer::new();
        let (lat, lon) = t.inverse_krovak(1_050_538.63, 568_991.00);
        assert!((lat.to_degrees() - 50.209_011_667).abs() < 1e-6);
        assert!((lon.to_degrees() - 16.849_771_944).abs() < 1e-6);
    }

    #[test]
    fn test_transform_prague_old_town() {
        let t = KrovakTransformer::new();
        let point = t.transform(Some("1043129.70"), Some("743104.50"));
        assert!((point.lat - 50.086_064_187).abs() < TOLERANCE, "lat {}", point.lat);
        assert!((point.lon - 14.417_395_296).abs() < TOLERANCE, "lon {}", point.lon);
    }

    #[test]
    fn test_transform_accepts_decimal_comma_and_negative_signs() {
        let t = KrovakTransformer::new();
        let a = t.transform(Some("1043129,70"), Some("743104,50"));
        let b = t.transform_xy(-1_043_129.70, -743_104.50);
        assert!((a.lat - b.lat).abs() < 1e-12);
        assert!((a.lon - b.lon).abs() < 1e-12);
    }

    #[test]
    fn test_transform_degrades_to_zero() {
        let t = KrovakTransformer::new();
        assert_eq!(t.transform(None, Some("743104.5")), GeoPoint::ZERO);
        assert_eq!(t.transform(Some(""), Some("743104.5")), GeoPoint::ZERO);
        assert_eq!(t.transform(Some("1043129.7"), Some("   ")), GeoPoint::ZERO);
        assert_eq!(t.transform(Some("abc"), Some("743104.5")), GeoPoint::ZERO);
        assert_eq!(t.transform(Some("NaN"), Some("743104.5")), GeoPoint::ZERO);
        assert_eq!(t.transform(Some("0"), Some("0")), GeoPoint::ZERO);
    }
}
