//! Synthetic debris field generator.
//!
//! Produces a CZML document with one reference satellite and a cloud of
//! randomly oriented low-Earth-orbit debris, each propagated with two-body
//! Keplerian motion and written as Lagrange-interpolated inertial samples.

use crate::czml::{
    Cartesian2, DOCUMENT_ID, InterpolationAlgorithm, LabelPacket, Material, ModelPacket, Packet,
    PathPacket, PositionPacket, ReferenceFrame, Rgba, SolidColor,
};
use chrono::{DateTime, SecondsFormat, Utc};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Earth's gravitational parameter, m^3/s^2.
pub const MU_EARTH: f64 = 3.986_004_418e14;

pub const DEBRIS_MODEL_URI: &str = "https://raw.githubusercontent.com/KhronosGroup/glTF-Sample-Models/main/2.0/AnimatedCube/glTF/AnimatedCube.gltf";

#[derive(Debug, Error, PartialEq)]
pub enum GeneratorError {
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("span and step give {0} samples per object, more than {MAX_SAMPLES}")]
    TooManySamples(f64),
}

/// Upper bound on samples written for a single object.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Debris speed factors are drawn from `[0.5, MAX_SPEED_FACTOR]` and divide the step.
const MAX_SPEED_FACTOR: f64 = 2.0;

/// Classical orbital elements. Lengths in metres, angles in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orbit {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub raan: f64,
    pub arg_periapsis: f64,
    pub true_anomaly: f64,
}

impl Orbit {
    /// Builds an orbit from kilometres and degrees.
    pub fn from_classical(a_km: f64, ecc: f64, inc_deg: f64, raan_deg: f64, argp_deg: f64, nu_deg: f64) -> Self {
        Self {
            semi_major_axis: a_km * 1_000.0,
            eccentricity: ecc,
            inclination: inc_deg.to_radians(),
            raan: raan_deg.to_radians(),
            arg_periapsis: argp_deg.to_radians(),
            true_anomaly: nu_deg.to_radians(),
        }
    }

    /// Random debris orbit: a in [7000, 7500] km, e in [0, 0.1],
    /// i in [0, 180] deg, remaining angles anywhere.
    pub fn random_debris(rng: &mut impl Rng) -> Self {
        Self::from_classical(
            rng.random_range(7_000.0..=7_500.0),
            rng.random_range(0.0..=0.1),
            rng.random_range(0.0..=180.0),
            rng.random_range(0.0..=360.0),
            rng.random_range(0.0..=360.0),
            rng.random_range(0.0..=360.0),
        )
    }

    pub fn mean_motion(&self) -> f64 {
        (MU_EARTH / self.semi_major_axis.powi(3)).sqrt()
    }

    pub fn period(&self) -> f64 {
        std::f64::consts::TAU / self.mean_motion()
    }

    /// Inertial position `dt` seconds after the element epoch.
    pub fn position_after(&self, dt: f64) -> DVec3 {
        let e = self.eccentricity;
        let root = (1.0 - e * e).sqrt();

        let (sin_nu0, cos_nu0) = self.true_anomaly.sin_cos();
        let ecc_anomaly0 = (root * sin_nu0).atan2(e + cos_nu0);
        let mean_anomaly = ecc_anomaly0 - e * ecc_anomaly0.sin() + self.mean_motion() * dt;

        let ecc_anomaly = solve_kepler(mean_anomaly, e);
        let (sin_e, cos_e) = ecc_anomaly.sin_cos();
        let nu = (root * sin_e).atan2(cos_e - e);
        let r = self.semi_major_axis * (1.0 - e * cos_e);

        let (sin_u, cos_u) = (self.arg_periapsis + nu).sin_cos();
        let (sin_o, cos_o) = self.raan.sin_cos();
        let (sin_i, cos_i) = self.inclination.sin_cos();

        DVec3::new(
            r * (cos_o * cos_u - sin_o * sin_u * cos_i),
            r * (sin_o * cos_u + cos_o * sin_u * cos_i),
            r * (sin_u * sin_i),
        )
    }
}

/// Solves Kepler's equation `E - e sin E = M` by Newton iteration.
fn solve_kepler(mean_anomaly: f64, e: f64) -> f64 {
    let m = mean_anomaly.rem_euclid(std::f64::consts::TAU);
    let mut ecc_anomaly = if e < 0.8 { m } else { std::f64::consts::PI };
    for _ in 0..32 {
        let f = ecc_anomaly - e * ecc_anomaly.sin() - m;
        let step = f / (1.0 - e * ecc_anomaly.cos());
        ecc_anomaly -= step;
        if step.abs() < 1e-12 {
            break;
        }
    }
    ecc_anomaly
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    pub debris: usize,
    /// Propagated time span, seconds.
    pub span: f64,
    /// Sampling step for the reference satellite, seconds.
    pub step: f64,
    /// Sample times are divided by this factor, compressing playback.
    pub time_scale: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            debris: 100,
            span: 24.0 * 3600.0,
            step: 60.0,
            time_scale: 10.0,
            seed: 42,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<(), GeneratorError> {
        if !(self.span > 0.0) {
            return Err(GeneratorError::NonPositive("span"));
        }
        if !(self.step > 0.0) {
            return Err(GeneratorError::NonPositive("step"));
        }
        if !(self.time_scale > 0.0) {
            return Err(GeneratorError::NonPositive("time scale"));
        }
        let samples = (self.span * MAX_SPEED_FACTOR / self.step).ceil();
        if !(samples <= MAX_SAMPLES as f64) {
            return Err(GeneratorError::TooManySamples(samples));
        }
        Ok(())
    }
}

fn sampled_position(orbit: &Orbit, epoch: &str, span: f64, step: f64, time_scale: f64) -> PositionPacket {
    let count = (span / step).ceil() as usize;
    let mut cartesian = Vec::with_capacity(count * 4);
    for k in 0..count {
        let dt = k as f64 * step;
        let p = orbit.position_after(dt);
        cartesian.extend_from_slice(&[dt / time_scale, p.x, p.y, p.z]);
    }

    PositionPacket {
        interpolation_algorithm: Some(InterpolationAlgorithm::Lagrange),
        interpolation_degree: Some(5),
        reference_frame: Some(ReferenceFrame::Inertial),
        epoch: Some(epoch.to_string()),
        cartesian,
    }
}

fn label(text: &str) -> LabelPacket {
    LabelPacket {
        text: text.to_string(),
        font: Some("12pt Helvetica".into()),
        fill_color: Some(Rgba::WHITE),
        outline_color: Some(Rgba::BLACK),
        outline_width: Some(2.0),
        show: Some(true),
        horizontal_origin: Some("CENTER".into()),
        vertical_origin: Some("BOTTOM".into()),
        pixel_offset: Some(Cartesian2 {
            cartesian2: [0.0, -20.0],
        }),
    }
}

/// Generates the full packet list, starting with the document packet.
///
/// ### Parameters
/// - `cfg` - Sizes, timing and RNG seed.
/// - `epoch` - Instant all orbits start from.
///
/// ### Returns
/// `1 + 1 + cfg.debris` packets: document, reference satellite, debris.
pub fn generate(cfg: &GeneratorConfig, epoch: DateTime<Utc>) -> Result<Vec<Packet>, GeneratorError> {
    cfg.validate()?;

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let epoch_str = epoch.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut packets = Vec::with_capacity(cfg.debris + 2);

    packets.push(Packet {
        id: DOCUMENT_ID.into(),
        name: Some("Debris Simulation".into()),
        version: Some("1.0".into()),
        ..Packet::default()
    });

    let satellite = Orbit::from_classical(7_000.0, 0.01, 45.0, 0.0, 0.0, 0.0);
    packets.push(Packet {
        id: "Satellite-1".into(),
        position: Some(sampled_position(
            &satellite,
            &epoch_str,
            cfg.span,
            cfg.step,
            cfg.time_scale,
        )),
        label: Some(label("Satellite")),
        path: Some(PathPacket {
            show: Some(true),
            lead_time: Some(0.0),
            trail_time: Some(cfg.span),
            width: Some(2.0),
            material: Some(Material {
                solid_color: Some(SolidColor {
                    color: Rgba { rgba: [255, 0, 0, 255] },
                }),
            }),
        }),
        ..Packet::default()
    });

    for i in 0..cfg.debris {
        let orbit = Orbit::random_debris(&mut rng);
        let speed_factor: f64 = rng.random_range(0.5..=MAX_SPEED_FACTOR);
        let id = i.to_string();

        packets.push(Packet {
            position: Some(sampled_position(
                &orbit,
                &epoch_str,
                cfg.span,
                cfg.step / speed_factor,
                cfg.time_scale,
            )),
            label: Some(label(&id)),
            model: Some(ModelPacket {
                gltf: DEBRIS_MODEL_URI.into(),
                scale: Some(0.5),
                minimum_pixel_size: Some(32.0),
                maximum_scale: Some(200.0),
                show: Some(true),
            }),
            id,
            ..Packet::default()
        });
    }

    log::debug!("generated {} packets", packets.len());
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::czml::CzmlDocument;
    use chrono::TimeZone;

    fn small() -> GeneratorConfig {
        GeneratorConfig {
            debris: 3,
            span: 3_600.0,
            step: 60.0,
            ..GeneratorConfig::default()
        }
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn circular_orbit_keeps_its_radius_and_period() {
        let orbit = Orbit::from_classical(7_000.0, 0.0, 45.0, 10.0, 0.0, 30.0);
        let start = orbit.position_after(0.0);
        for k in 0..10 {
            let p = orbit.position_after(k as f64 * 500.0);
            assert!((p.length() - 7_000_000.0).abs() < 1e-3);
        }
        let back = orbit.position_after(orbit.period());
        assert!((back - start).length() < 1e-2);
    }

    #[test]
    fn eccentric_orbit_spans_periapsis_to_apoapsis() {
        let orbit = Orbit::from_classical(7_000.0, 0.1, 0.0, 0.0, 0.0, 0.0);
        assert!((orbit.position_after(0.0).length() - 6_300_000.0).abs() < 1e-3);
        let apo = orbit.position_after(orbit.period() / 2.0);
        assert!((apo.length() - 7_700_000.0).abs() < 1e-3);
    }

    #[test]
    fn inclination_bounds_latitude() {
        let orbit = Orbit::from_classical(7_000.0, 0.0, 45.0, 0.0, 90.0, 0.0);
        let p = orbit.position_after(0.0);
        // Argument of latitude 90 deg puts the satellite at its highest point.
        assert!((p.z / p.length() - 45f64.to_radians().sin()).abs() < 1e-9);
    }

    #[test]
    fn generates_document_satellite_and_debris() {
        let packets = generate(&small(), epoch()).unwrap();
        assert_eq!(packets.len(), 5);
        assert_eq!(packets[0].id, "document");
        assert_eq!(packets[1].id, "Satellite-1");
        assert_eq!(packets[2].label.as_ref().unwrap().text, "0");
        assert!(packets[4].model.is_some());

        let sat = packets[1].position.as_ref().unwrap();
        // 60 samples of [t, x, y, z], times compressed tenfold.
        assert_eq!(sat.cartesian.len(), 240);
        assert_eq!(sat.cartesian[4], 6.0);
    }

    #[test]
    fn same_seed_same_field() {
        let a = generate(&small(), epoch()).unwrap();
        let b = generate(&small(), epoch()).unwrap();
        assert_eq!(a, b);

        let other = GeneratorConfig {
            seed: 7,
            ..small()
        };
        let c = generate(&other, epoch()).unwrap();
        assert_ne!(a[2], c[2]);
    }

    #[test]
    fn generated_document_loads_as_czml() {
        let packets = generate(&small(), epoch()).unwrap();
        let text = serde_json::to_string(&packets).unwrap();
        let doc = CzmlDocument::parse(&text).unwrap();

        assert_eq!(doc.name.as_deref(), Some("Debris Simulation"));
        assert_eq!(doc.entities.len(), 4);

        let sat = &doc.entities[0];
        let p = sat.position_at(epoch() + crate::clock::seconds(100.0)).unwrap();
        let r = p.length();
        assert!(r > 6_900_000.0 && r < 7_100_000.0, "radius {r}");
    }

    #[test]
    fn rejects_steps_too_small_for_the_span() {
        let cfg = GeneratorConfig {
            step: 1e-300,
            ..small()
        };
        assert!(matches!(
            generate(&cfg, epoch()).unwrap_err(),
            GeneratorError::TooManySamples(n) if n > MAX_SAMPLES as f64
        ));

        let cfg = GeneratorConfig {
            span: f64::INFINITY,
            ..small()
        };
        assert!(matches!(
            generate(&cfg, epoch()).unwrap_err(),
            GeneratorError::TooManySamples(_)
        ));
    }

    #[test]
    fn config_reads_camel_case_json_with_defaults() {
        let cfg: GeneratorConfig =
            serde_json::from_str(r#"{"debris": 5, "timeScale": 2.5}"#).unwrap();
        assert_eq!(cfg.debris, 5);
        assert_eq!(cfg.time_scale, 2.5);
        assert_eq!(cfg.step, 60.0);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn rejects_non_positive_step() {
        let cfg = GeneratorConfig {
            step: 0.0,
            ..small()
        };
        assert_eq!(
            generate(&cfg, epoch()).unwrap_err(),
            GeneratorError::NonPositive("step")
        );
    }
}
