//! Globe camera: pose, animated flights and projection.

use crate::config::SceneMode;
use crate::types::EARTH_RADIUS_M;
use glam::{DVec2, DVec3};

/// Where the camera looks: the point under the view centre and the
/// distance to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub range_m: f64,
}

/// The default view, roughly centred over North America with the whole
/// globe and low orbits in frame.
pub const HOME_POSE: CameraPose = CameraPose {
    lon_deg: -90.0,
    lat_deg: 30.0,
    range_m: 20_000_000.0,
};

pub const MIN_RANGE_M: f64 = 1_000_000.0;
pub const MAX_RANGE_M: f64 = 200_000_000.0;

#[derive(Clone, Copy, Debug)]
struct Flight {
    from: CameraPose,
    to: CameraPose,
    duration: f64,
    elapsed: f64,
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub pose: CameraPose,
    pub mode: SceneMode,
    home: CameraPose,
    flight: Option<Flight>,
    home_requests: u64,
    last_flight_duration: Option<f64>,
}

/// Wraps a longitude into `[-180, 180)`.
fn wrap_lon(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Spherical longitude/latitude (degrees) of an Earth-fixed position.
pub fn ecef_to_lon_lat(p: DVec3) -> (f64, f64) {
    let lon = p.y.atan2(p.x).to_degrees();
    let lat = p.z.atan2(DVec2::new(p.x, p.y).length()).to_degrees();
    (lon, lat)
}

impl Camera {
    pub fn new(mode: SceneMode) -> Self {
        Self {
            pose: HOME_POSE,
            mode,
            home: HOME_POSE,
            flight: None,
            home_requests: 0,
            last_flight_duration: None,
        }
    }

    /// Flies back to the home pose. A `duration` of zero jumps there instantly.
    pub fn fly_home(&mut self, duration: f64) {
        self.home_requests += 1;
        self.fly_to(self.home, duration);
    }

    /// Starts a flight to `to`, replacing any flight in progress.
    ///
    /// Non-positive durations apply the pose immediately.
    pub fn fly_to(&mut self, to: CameraPose, duration: f64) {
        self.last_flight_duration = Some(duration);

        if duration <= 0.0 {
            self.pose = to;
            self.flight = None;
            return;
        }

        self.flight = Some(Flight {
            from: self.pose,
            to,
            duration,
            elapsed: 0.0,
        });
    }

    /// Advances a flight in progress by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        let Some(flight) = self.flight.as_mut() else {
            return;
        };

        flight.elapsed += dt;
        let t = (flight.elapsed / flight.duration).clamp(0.0, 1.0);
        let s = t * t * (3.0 - 2.0 * t);

        let (from, to) = (flight.from, flight.to);
        let dlon = wrap_lon(to.lon_deg - from.lon_deg);
        self.pose = CameraPose {
            lon_deg: wrap_lon(from.lon_deg + dlon * s),
            lat_deg: from.lat_deg + (to.lat_deg - from.lat_deg) * s,
            range_m: from.range_m + (to.range_m - from.range_m) * s,
        };

        if t >= 1.0 {
            self.pose = to;
            self.flight = None;
        }
    }

    pub fn is_flying(&self) -> bool {
        self.flight.is_some()
    }

    /// Number of times [`Camera::fly_home`] has been requested.
    pub fn home_requests(&self) -> u64 {
        self.home_requests
    }

    pub fn last_flight_duration(&self) -> Option<f64> {
        self.last_flight_duration
    }

    /// Rotates the view centre by the given degrees. Cancels any flight.
    pub fn rotate(&mut self, dlon_deg: f64, dlat_deg: f64) {
        self.flight = None;
        self.pose.lon_deg = wrap_lon(self.pose.lon_deg + dlon_deg);
        self.pose.lat_deg = (self.pose.lat_deg + dlat_deg).clamp(-90.0, 90.0);
    }

    /// Multiplies the range by `factor`. Cancels any flight.
    pub fn zoom(&mut self, factor: f64) {
        self.flight = None;
        self.pose.range_m = (self.pose.range_m * factor).clamp(MIN_RANGE_M, MAX_RANGE_M);
    }

    /// Scale from view-plane metres to pixels for a viewport whose smaller
    /// side is `viewport_min_px` pixels. The view spans the range across.
    pub fn pixels_per_metre(&self, viewport_min_px: f64) -> f64 {
        viewport_min_px / self.pose.range_m
    }

    /// Projects an Earth-fixed position onto the view plane, in metres
    /// (x east, y north of the view centre).
    ///
    /// ### Returns
    /// `None` if the globe hides the point (3D mode only).
    pub fn project(&self, p: DVec3) -> Option<DVec2> {
        let lon0 = self.pose.lon_deg.to_radians();
        let lat0 = self.pose.lat_deg.to_radians();

        match self.mode {
            SceneMode::Globe3D => {
                let (sin_lat, cos_lat) = lat0.sin_cos();
                let (sin_lon, cos_lon) = lon0.sin_cos();
                let east = DVec3::new(-sin_lon, cos_lon, 0.0);
                let north = DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
                let up = DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);

                let v = DVec2::new(p.dot(east), p.dot(north));
                let behind = p.dot(up) < 0.0;
                if behind && v.length_squared() < EARTH_RADIUS_M * EARTH_RADIUS_M {
                    return None;
                }
                Some(v)
            }
            SceneMode::Map2D => {
                let (lon, lat) = ecef_to_lon_lat(p);
                let x = wrap_lon(lon - self.pose.lon_deg).to_radians() * EARTH_RADIUS_M;
                let y = (lat.to_radians() - lat0) * EARTH_RADIUS_M;
                Some(DVec2::new(x, y))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lon_lat_to_ecef(lon_deg: f64, lat_deg: f64, r: f64) -> DVec3 {
        let (lon, lat) = (lon_deg.to_radians(), lat_deg.to_radians());
        DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()) * r
    }

    #[test]
    fn zero_duration_home_is_instant() {
        let mut cam = Camera::new(SceneMode::Globe3D);
        cam.rotate(40.0, -20.0);
        cam.zoom(3.0);

        cam.fly_home(0.0);

        assert_eq!(cam.pose, HOME_POSE);
        assert!(!cam.is_flying());
        assert_eq!(cam.home_requests(), 1);
        assert_eq!(cam.last_flight_duration(), Some(0.0));
    }

    #[test]
    fn timed_flight_reaches_target_after_duration() {
        let mut cam = Camera::new(SceneMode::Globe3D);
        let target = CameraPose {
            lon_deg: 10.0,
            lat_deg: 0.0,
            range_m: 10_000_000.0,
        };
        cam.fly_to(target, 2.0);
        assert!(cam.is_flying());

        cam.update(1.0);
        // Halfway through a smoothstep is exactly half the distance.
        assert!((cam.pose.lat_deg - 15.0).abs() < 1e-9);

        cam.update(1.5);
        assert_eq!(cam.pose, target);
        assert!(!cam.is_flying());
    }

    #[test]
    fn flight_takes_the_short_way_across_the_antimeridian() {
        let mut cam = Camera::new(SceneMode::Globe3D);
        cam.pose.lon_deg = 170.0;
        cam.fly_to(
            CameraPose {
                lon_deg: -170.0,
                ..cam.pose
            },
            1.0,
        );
        cam.update(0.5);
        assert!((cam.pose.lon_deg.abs() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn rotate_clamps_latitude_and_wraps_longitude() {
        let mut cam = Camera::new(SceneMode::Globe3D);
        cam.rotate(300.0, 100.0);
        assert_eq!(cam.pose.lat_deg, 90.0);
        assert!((cam.pose.lon_deg - (-150.0)).abs() < 1e-9);
    }

    #[test]
    fn globe_projection_hides_far_side() {
        let mut cam = Camera::new(SceneMode::Globe3D);
        cam.pose.lon_deg = 0.0;
        cam.pose.lat_deg = 0.0;

        let near = lon_lat_to_ecef(0.0, 0.0, EARTH_RADIUS_M);
        let v = cam.project(near).unwrap();
        assert!(v.length() < 1e-6);

        let far = lon_lat_to_ecef(180.0, 0.0, EARTH_RADIUS_M);
        assert!(cam.project(far).is_none());

        // A high orbit behind the limb is still visible beside the disc.
        let high = lon_lat_to_ecef(100.0, 0.0, 4.0 * EARTH_RADIUS_M);
        assert!(cam.project(high).is_some());
    }

    #[test]
    fn map_projection_is_equirectangular() {
        let mut cam = Camera::new(SceneMode::Map2D);
        cam.pose.lon_deg = 0.0;
        cam.pose.lat_deg = 0.0;

        let p = lon_lat_to_ecef(90.0, 45.0, EARTH_RADIUS_M);
        let v = cam.project(p).unwrap();
        assert!((v.x - std::f64::consts::FRAC_PI_2 * EARTH_RADIUS_M).abs() < 1e-3);
        assert!((v.y - std::f64::consts::FRAC_PI_4 * EARTH_RADIUS_M).abs() < 1e-3);
    }
}
