//! CZML document model.
//!
//! A CZML document is a JSON array of packets. The first packet has the id
//! `"document"` and carries document-wide metadata (name, version, clock);
//! every other packet describes one entity. Only the properties the viewer
//! draws are modelled here; anything else in a packet is ignored.
//!
//! The packet structs double as the serialization model used by
//! [`crate::generator`], so they round-trip through `serde_json`.

use crate::clock::{ClockRange, offset_by, seconds_between};
use chrono::{DateTime, NaiveDateTime, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DOCUMENT_ID: &str = "document";

#[derive(Debug, Error)]
pub enum CzmlError {
    #[error("invalid CZML JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("first packet must have id \"document\"")]
    MissingDocumentPacket,
    #[error("invalid time {0:?}")]
    BadTime(String),
    #[error("invalid time interval {0:?}")]
    BadInterval(String),
    #[error("packet {id:?}: cartesian array of length {len} is neither [x, y, z] nor [t, x, y, z, ...]")]
    BadCartesian { id: String, len: usize },
    #[error("packet {id:?}: sample time {offset} s is not a representable instant")]
    SampleTimeOutOfRange { id: String, offset: f64 },
}

// ---------------------------------------------------------------------------
// Packets (wire format)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockPacket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionPacket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<LabelPacket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathPacket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelPacket>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockPacket {
    /// ISO 8601 interval, `"start/stop"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterpolationAlgorithm {
    #[default]
    Linear,
    Lagrange,
    Hermite,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceFrame {
    #[default]
    Fixed,
    Inertial,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation_algorithm: Option<InterpolationAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation_degree: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_frame: Option<ReferenceFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<String>,
    /// Either `[x, y, z]` or `[t0, x0, y0, z0, t1, x1, ...]` with `t` in
    /// seconds since `epoch` and positions in metres.
    #[serde(default)]
    pub cartesian: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub rgba: [u8; 4],
}

impl Rgba {
    pub const WHITE: Rgba = Rgba { rgba: [255, 255, 255, 255] };
    pub const BLACK: Rgba = Rgba { rgba: [0, 0, 0, 255] };
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cartesian2 {
    pub cartesian2: [f64; 2],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPacket {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline_color: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_offset: Option<Cartesian2>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolidColor {
    pub color: Rgba,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solid_color: Option<SolidColor>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
}

impl PathPacket {
    /// Time window `[t - trailTime, t + leadTime]` the path covers, saturated
    /// at the earliest and latest representable instants.
    pub fn window(&self, t: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let trail = self.trail_time.unwrap_or(0.0).max(0.0);
        let lead = self.lead_time.unwrap_or(0.0).max(0.0);
        (
            offset_by(t, -trail).unwrap_or(DateTime::<Utc>::MIN_UTC),
            offset_by(t, lead).unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    pub fn color(&self) -> Rgba {
        self.material
            .and_then(|m| m.solid_color)
            .map(|s| s.color)
            .unwrap_or(Rgba::WHITE)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPacket {
    #[serde(default)]
    pub gltf: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_pixel_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
}

// ---------------------------------------------------------------------------
// Resolved entities
// ---------------------------------------------------------------------------

/// Parses an ISO 8601 instant. Timestamps without an offset are taken as UTC.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, CzmlError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let trimmed = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|_| CzmlError::BadTime(s.to_string()))
}

/// Parses an ISO 8601 `"start/stop"` interval.
pub fn parse_interval(s: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), CzmlError> {
    let (a, b) = s
        .split_once('/')
        .ok_or_else(|| CzmlError::BadInterval(s.to_string()))?;
    let (start, stop) = (parse_time(a)?, parse_time(b)?);
    if stop < start {
        return Err(CzmlError::BadInterval(s.to_string()));
    }
    Ok((start, stop))
}

/// Greenwich mean sidereal angle at `t`, in radians.
pub fn gmst(t: DateTime<Utc>) -> f64 {
    let jd = t.timestamp_millis() as f64 / 86_400_000.0 + 2_440_587.5;
    let d = jd - 2_451_545.0;
    (280.460_618_37 + 360.985_647_366_29 * d)
        .rem_euclid(360.0)
        .to_radians()
}

/// Rotates an inertial position into the Earth-fixed frame at `t`.
pub fn inertial_to_fixed(p: DVec3, t: DateTime<Utc>) -> DVec3 {
    let (s, c) = gmst(t).sin_cos();
    DVec3::new(c * p.x + s * p.y, -s * p.x + c * p.y, p.z)
}

/// Time-tagged positions with an interpolation rule.
///
/// `times` are seconds since `epoch`, strictly increasing.
#[derive(Clone, Debug)]
pub struct SampledPosition {
    pub epoch: DateTime<Utc>,
    pub times: Vec<f64>,
    pub points: Vec<DVec3>,
    pub algorithm: InterpolationAlgorithm,
    pub degree: usize,
}

impl SampledPosition {
    /// First and last instants covered by the samples.
    pub fn availability(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = *self.times.first()?;
        let last = *self.times.last()?;
        Some((offset_by(self.epoch, first)?, offset_by(self.epoch, last)?))
    }

    /// Interpolates the position at `t` in the samples' own frame.
    ///
    /// ### Returns
    /// `None` if `t` lies outside the sampled range.
    pub fn interpolate(&self, t: DateTime<Utc>) -> Option<DVec3> {
        let x = seconds_between(self.epoch, t);
        let n = self.times.len();
        if n == 0 || x < self.times[0] || x > self.times[n - 1] {
            return None;
        }
        if n == 1 {
            return Some(self.points[0]);
        }

        // First sample strictly after x, kept inside [1, n - 1].
        let hi = self.times.partition_point(|&ti| ti <= x).clamp(1, n - 1);

        match self.algorithm {
            InterpolationAlgorithm::Linear => {
                let (t0, t1) = (self.times[hi - 1], self.times[hi]);
                let f = (x - t0) / (t1 - t0);
                Some(self.points[hi - 1].lerp(self.points[hi], f))
            }
            InterpolationAlgorithm::Lagrange | InterpolationAlgorithm::Hermite => {
                let count = self.degree.saturating_add(1).clamp(2, n);
                let start = hi.saturating_sub(count / 2).min(n - count);
                Some(lagrange(
                    &self.times[start..start + count],
                    &self.points[start..start + count],
                    x,
                ))
            }
        }
    }
}

fn lagrange(ts: &[f64], ps: &[DVec3], x: f64) -> DVec3 {
    let mut out = DVec3::ZERO;
    for (i, (&ti, &pi)) in ts.iter().zip(ps).enumerate() {
        let mut w = 1.0;
        for (j, &tj) in ts.iter().enumerate() {
            if i != j {
                w *= (x - tj) / (ti - tj);
            }
        }
        out += pi * w;
    }
    out
}

#[derive(Clone, Debug)]
pub enum PositionKind {
    Constant(DVec3),
    Sampled(SampledPosition),
}

#[derive(Clone, Debug)]
pub struct PositionProperty {
    pub kind: PositionKind,
    pub frame: ReferenceFrame,
}

impl PositionProperty {
    fn from_packet(id: &str, packet: &PositionPacket) -> Result<Self, CzmlError> {
        let frame = packet.reference_frame.unwrap_or_default();
        let c = &packet.cartesian;

        let kind = if c.len() == 3 {
            PositionKind::Constant(DVec3::new(c[0], c[1], c[2]))
        } else if !c.is_empty() && c.len() % 4 == 0 {
            let epoch = match &packet.epoch {
                Some(e) => parse_time(e)?,
                None => DateTime::<Utc>::UNIX_EPOCH,
            };
            let mut samples: Vec<(f64, DVec3)> = c
                .chunks_exact(4)
                .map(|s| (s[0], DVec3::new(s[1], s[2], s[3])))
                .collect();
            if let Some(&(offset, _)) = samples
                .iter()
                .find(|(t, _)| offset_by(epoch, *t).is_none())
            {
                return Err(CzmlError::SampleTimeOutOfRange {
                    id: id.to_string(),
                    offset,
                });
            }
            samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            samples.dedup_by(|a, b| a.0 == b.0);

            PositionKind::Sampled(SampledPosition {
                epoch,
                times: samples.iter().map(|s| s.0).collect(),
                points: samples.iter().map(|s| s.1).collect(),
                algorithm: packet.interpolation_algorithm.unwrap_or_default(),
                degree: packet.interpolation_degree.unwrap_or(1),
            })
        } else {
            return Err(CzmlError::BadCartesian {
                id: id.to_string(),
                len: c.len(),
            });
        };

        Ok(Self { kind, frame })
    }

    /// Earth-fixed position at `t`, or `None` if undefined at that time.
    pub fn position_at(&self, t: DateTime<Utc>) -> Option<DVec3> {
        let p = match &self.kind {
            PositionKind::Constant(p) => *p,
            PositionKind::Sampled(s) => s.interpolate(t)?,
        };
        Some(match self.frame {
            ReferenceFrame::Fixed => p,
            ReferenceFrame::Inertial => inertial_to_fixed(p, t),
        })
    }

    pub fn availability(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match &self.kind {
            PositionKind::Constant(_) => None,
            PositionKind::Sampled(s) => s.availability(),
        }
    }

    /// Positions at `count` evenly spaced instants across `[from, to]`,
    /// skipping instants where the position is undefined.
    ///
    /// For sampled positions the window is first narrowed to the sampled
    /// range, so a very long window still yields `count` points.
    pub fn positions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        count: usize,
    ) -> Vec<DVec3> {
        let (from, to) = match self.availability() {
            Some((start, stop)) => (from.max(start), to.min(stop)),
            None => (from, to),
        };
        if to < from {
            return Vec::new();
        }
        if count < 2 {
            return self.position_at(from).into_iter().collect();
        }
        let span = seconds_between(from, to);
        (0..count)
            .filter_map(|i| {
                let f = i as f64 / (count - 1) as f64;
                self.position_at(offset_by(from, span * f)?)
            })
            .collect()
    }
}

/// One drawable object from a CZML packet.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: String,
    pub name: Option<String>,
    pub position: Option<PositionProperty>,
    pub label: Option<LabelPacket>,
    pub path: Option<PathPacket>,
    pub model: Option<ModelPacket>,
}

impl Entity {
    pub fn from_packet(packet: Packet) -> Result<Self, CzmlError> {
        let position = packet
            .position
            .as_ref()
            .map(|p| PositionProperty::from_packet(&packet.id, p))
            .transpose()?;

        Ok(Self {
            id: packet.id,
            name: packet.name,
            position,
            label: packet.label,
            path: packet.path,
            model: packet.model,
        })
    }

    /// Text shown for the entity: label text, then name, then id.
    pub fn display_name(&self) -> &str {
        match (&self.label, &self.name) {
            (Some(l), _) if !l.text.is_empty() => &l.text,
            (_, Some(n)) => n,
            _ => &self.id,
        }
    }

    pub fn position_at(&self, t: DateTime<Utc>) -> Option<DVec3> {
        self.position.as_ref()?.position_at(t)
    }
}

/// A parsed CZML document.
#[derive(Clone, Debug)]
pub struct CzmlDocument {
    pub name: Option<String>,
    pub version: Option<String>,
    pub clock: Option<ClockRange>,
    pub entities: Vec<Entity>,
}

impl CzmlDocument {
    pub fn parse(text: &str) -> Result<Self, CzmlError> {
        let packets: Vec<Packet> = serde_json::from_str(text)?;
        Self::from_packets(packets)
    }

    pub fn from_packets(packets: Vec<Packet>) -> Result<Self, CzmlError> {
        let mut iter = packets.into_iter();
        let doc = match iter.next() {
            Some(p) if p.id == DOCUMENT_ID => p,
            _ => return Err(CzmlError::MissingDocumentPacket),
        };

        let clock = doc.clock.as_ref().map(clock_range).transpose()?.flatten();

        // Later packets with an id already seen update that entity.
        let mut entities: Vec<Entity> = Vec::new();
        for packet in iter {
            let entity = Entity::from_packet(packet)?;
            match entities.iter_mut().find(|e| e.id == entity.id) {
                Some(existing) => merge(existing, entity),
                None => entities.push(entity),
            }
        }

        Ok(Self {
            name: doc.name,
            version: doc.version,
            clock,
            entities,
        })
    }
}

fn clock_range(c: &ClockPacket) -> Result<Option<ClockRange>, CzmlError> {
    let Some(interval) = &c.interval else {
        return Ok(None);
    };
    let (start, stop) = parse_interval(interval)?;
    let current = match &c.current_time {
        Some(s) => parse_time(s)?,
        None => start,
    };
    Ok(Some(ClockRange {
        start,
        stop,
        current,
        multiplier: c.multiplier.unwrap_or(1.0),
    }))
}

fn merge(into: &mut Entity, from: Entity) {
    if from.name.is_some() {
        into.name = from.name;
    }
    if from.position.is_some() {
        into.position = from.position;
    }
    if from.label.is_some() {
        into.label = from.label;
    }
    if from.path.is_some() {
        into.path = from.path;
    }
    if from.model.is_some() {
        into.model = from.model;
    }
}
