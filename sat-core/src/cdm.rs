//! Conjunction Data Messages (CCSDS 508.0, XML encoding).
//!
//! A CDM describes one predicted close approach between two objects: a
//! header, relative metadata for the encounter (time of closest approach,
//! miss distance, relative state in the primary's RTN frame) and one
//! segment per object with its metadata, state vector and covariance.
//!
//! Element names follow the standard. Unit attributes are ignored; values
//! are taken in the standard's units (metres and m/s for relative
//! quantities, kilometres and km/s for state vectors).

use crate::czml::parse_time;
use chrono::{DateTime, Utc};
use glam::DVec3;
use roxmltree::Node;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdmError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{parent}> has no <{name}>")]
    MissingElement { parent: String, name: &'static str },
    #[error("<{name}> is not a number: {value:?}")]
    BadNumber { name: &'static str, value: String },
    #[error("<{name}> is not a valid time: {value:?}")]
    BadTime { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub comments: Vec<String>,
    pub creation_date: DateTime<Utc>,
    pub originator: String,
    pub message_for: Option<String>,
    pub message_id: String,
}

/// Position and velocity of the secondary relative to the primary, in the
/// primary's radial / transverse / normal frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeState {
    /// Metres, `(R, T, N)`.
    pub position: DVec3,
    /// Metres per second, `(R, T, N)`.
    pub velocity: DVec3,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelativeMetadata {
    /// Time of closest approach.
    pub tca: DateTime<Utc>,
    /// Metres.
    pub miss_distance: f64,
    /// Metres per second.
    pub relative_speed: f64,
    pub relative_state: RelativeState,
    pub start_screen_period: Option<String>,
    pub stop_screen_period: Option<String>,
    pub screen_volume_frame: Option<String>,
    pub screen_volume_shape: Option<String>,
    /// Screening volume extents, metres.
    pub screen_volume: DVec3,
    pub screen_entry_time: Option<String>,
    pub screen_exit_time: Option<String>,
}

/// Object metadata. Fields the standard marks optional are `None` when absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    pub object: String,
    pub object_designator: String,
    pub catalog_name: String,
    pub object_name: String,
    pub international_designator: String,
    pub object_type: String,
    pub ephemeris_name: String,
    pub covariance_method: String,
    pub maneuverable: String,
    pub ref_frame: String,
    pub gravity_model: Option<String>,
    pub atmospheric_model: Option<String>,
    pub n_body_perturbations: Option<String>,
    pub solar_rad_pressure: Option<String>,
    pub earth_tides: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdditionalParameters {
    pub comment: Option<String>,
    /// Square metres.
    pub area_pc: f64,
    pub cr_area_over_mass: Option<f64>,
}

/// Cartesian state in the segment's reference frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateVector {
    /// Kilometres.
    pub position: DVec3,
    /// Kilometres per second.
    pub velocity: DVec3,
}

/// Element names of the lower triangle of the 6x6 RTN covariance, row by row.
pub const COVARIANCE_TERMS: [&str; 21] = [
    "CR_R", "CT_R", "CT_T", "CN_R", "CN_T", "CN_N", "CRDOT_R", "CRDOT_T", "CRDOT_N", "CRDOT_RDOT",
    "CTDOT_R", "CTDOT_T", "CTDOT_N", "CTDOT_RDOT", "CTDOT_TDOT", "CNDOT_R", "CNDOT_T", "CNDOT_N",
    "CNDOT_RDOT", "CNDOT_TDOT", "CNDOT_NDOT",
];

/// Position/velocity covariance in RTN, stored as its lower triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Covariance {
    pub lower: [f64; 21],
}

impl Covariance {
    /// Entry `(row, col)` of the symmetric matrix, both in `0..6`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (i, j) = if row >= col { (row, col) } else { (col, row) };
        self.lower[i * (i + 1) / 2 + j]
    }

    pub fn matrix(&self) -> [[f64; 6]; 6] {
        let mut m = [[0.0; 6]; 6];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = self.get(i, j);
            }
        }
        m
    }

    /// Standard deviation of position along R, T and N.
    pub fn position_sigma(&self) -> DVec3 {
        let sigma = |i| self.get(i, i).max(0.0).sqrt();
        DVec3::new(sigma(0), sigma(1), sigma(2))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentData {
    /// Orbit determination parameters, element name to text.
    pub od_parameters: BTreeMap<String, String>,
    pub additional_parameters: Option<AdditionalParameters>,
    pub state_vector: Option<StateVector>,
    pub covariance: Option<Covariance>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub metadata: Metadata,
    pub data: SegmentData,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cdm {
    pub header: Header,
    pub relative: RelativeMetadata,
    pub segments: Vec<Segment>,
}

impl Cdm {
    pub fn parse(xml: &str) -> Result<Self, CdmError> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(xml, options)?;
        let root = doc.root_element();

        let header = parse_header(required(root, "header")?)?;
        let body = required(root, "body")?;
        let relative = parse_relative_metadata(required(body, "relativeMetadataData")?)?;
        let segments = elements(body, "segment")
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header,
            relative,
            segments,
        })
    }

    pub fn read(path: &Path) -> Result<Self, CdmError> {
        let text = std::fs::read_to_string(path).map_err(|source| CdmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Name of object `index` (0 = primary), falling back to its designator.
    pub fn object_name(&self, index: usize) -> Option<&str> {
        let meta = &self.segments.get(index)?.metadata;
        Some(if meta.object_name.is_empty() {
            &meta.object_designator
        } else {
            &meta.object_name
        })
    }
}

fn elements<'a, 'i>(parent: Node<'a, 'i>, name: &'static str) -> impl Iterator<Item = Node<'a, 'i>> {
    parent
        .children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child<'a, 'i>(parent: Node<'a, 'i>, name: &'static str) -> Option<Node<'a, 'i>> {
    elements(parent, name).next()
}

fn required<'a, 'i>(parent: Node<'a, 'i>, name: &'static str) -> Result<Node<'a, 'i>, CdmError> {
    child(parent, name).ok_or_else(|| CdmError::MissingElement {
        parent: parent.tag_name().name().to_string(),
        name,
    })
}

fn text(parent: Node, name: &'static str) -> Option<String> {
    child(parent, name).map(|n| n.text().unwrap_or("").trim().to_string())
}

fn required_text(parent: Node, name: &'static str) -> Result<String, CdmError> {
    Ok(required(parent, name)?.text().unwrap_or("").trim().to_string())
}

fn parse_number(name: &'static str, value: &str) -> Result<f64, CdmError> {
    value.parse().map_err(|_| CdmError::BadNumber {
        name,
        value: value.to_string(),
    })
}

fn number(parent: Node, name: &'static str) -> Result<f64, CdmError> {
    parse_number(name, &required_text(parent, name)?)
}

fn optional_number(parent: Node, name: &'static str) -> Result<Option<f64>, CdmError> {
    text(parent, name).map(|v| parse_number(name, &v)).transpose()
}

fn time(parent: Node, name: &'static str) -> Result<DateTime<Utc>, CdmError> {
    let value = required_text(parent, name)?;
    parse_time(&value).map_err(|_| CdmError::BadTime { name, value })
}

fn vec3(parent: Node, names: [&'static str; 3]) -> Result<DVec3, CdmError> {
    Ok(DVec3::new(
        number(parent, names[0])?,
        number(parent, names[1])?,
        number(parent, names[2])?,
    ))
}

fn parse_header(node: Node) -> Result<Header, CdmError> {
    Ok(Header {
        comments: elements(node, "COMMENT")
            .map(|c| c.text().unwrap_or("").trim().to_string())
            .collect(),
        creation_date: time(node, "CREATION_DATE")?,
        originator: required_text(node, "ORIGINATOR")?,
        message_for: text(node, "MESSAGE_FOR"),
        message_id: required_text(node, "MESSAGE_ID")?,
    })
}

fn parse_relative_metadata(node: Node) -> Result<RelativeMetadata, CdmError> {
    let rsv = required(node, "relativeStateVector")?;
    Ok(RelativeMetadata {
        tca: time(node, "TCA")?,
        miss_distance: number(node, "MISS_DISTANCE")?,
        relative_speed: number(node, "RELATIVE_SPEED")?,
        relative_state: RelativeState {
            position: vec3(
                rsv,
                ["RELATIVE_POSITION_R", "RELATIVE_POSITION_T", "RELATIVE_POSITION_N"],
            )?,
            velocity: vec3(
                rsv,
                ["RELATIVE_VELOCITY_R", "RELATIVE_VELOCITY_T", "RELATIVE_VELOCITY_N"],
            )?,
        },
        start_screen_period: text(node, "START_SCREEN_PERIOD"),
        stop_screen_period: text(node, "STOP_SCREEN_PERIOD"),
        screen_volume_frame: text(node, "SCREEN_VOLUME_FRAME"),
        screen_volume_shape: text(node, "SCREEN_VOLUME_SHAPE"),
        screen_volume: vec3(node, ["SCREEN_VOLUME_X", "SCREEN_VOLUME_Y", "SCREEN_VOLUME_Z"])?,
        screen_entry_time: text(node, "SCREEN_ENTRY_TIME"),
        screen_exit_time: text(node, "SCREEN_EXIT_TIME"),
    })
}

fn parse_metadata(node: Node) -> Metadata {
    let field = |name| text(node, name).unwrap_or_default();
    Metadata {
        object: field("OBJECT"),
        object_designator: field("OBJECT_DESIGNATOR"),
        catalog_name: field("CATALOG_NAME"),
        object_name: field("OBJECT_NAME"),
        international_designator: field("INTERNATIONAL_DESIGNATOR"),
        object_type: field("OBJECT_TYPE"),
        ephemeris_name: field("EPHEMERIS_NAME"),
        covariance_method: field("COVARIANCE_METHOD"),
        maneuverable: field("MANEUVERABLE"),
        ref_frame: field("REF_FRAME"),
        gravity_model: text(node, "GRAVITY_MODEL"),
        atmospheric_model: text(node, "ATMOSPHERIC_MODEL"),
        n_body_perturbations: text(node, "N_BODY_PERTURBATIONS"),
        solar_rad_pressure: text(node, "SOLAR_RAD_PRESSURE"),
        earth_tides: text(node, "EARTH_TIDES"),
    }
}

fn parse_segment(node: Node) -> Result<Segment, CdmError> {
    let metadata = parse_metadata(required(node, "metadata")?);
    let data = required(node, "data")?;

    let od_parameters = child(data, "odParameters")
        .map(|od| {
            od.children()
                .filter(|n| n.is_element())
                .map(|n| {
                    (
                        n.tag_name().name().to_string(),
                        n.text().unwrap_or("").trim().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let additional_parameters = child(data, "additionalParameters")
        .map(|ap| -> Result<_, CdmError> {
            Ok(AdditionalParameters {
                comment: text(ap, "COMMENT"),
                area_pc: number(ap, "AREA_PC")?,
                cr_area_over_mass: optional_number(ap, "CR_AREA_OVER_MASS")?,
            })
        })
        .transpose()?;

    let state_vector = child(data, "stateVector")
        .map(|sv| -> Result<_, CdmError> {
            Ok(StateVector {
                position: vec3(sv, ["X", "Y", "Z"])?,
                velocity: vec3(sv, ["X_DOT", "Y_DOT", "Z_DOT"])?,
            })
        })
        .transpose()?;

    let covariance = child(data, "covarianceMatrix")
        .map(|cov| -> Result<_, CdmError> {
            let mut lower = [0.0; 21];
            for (v, name) in lower.iter_mut().zip(COVARIANCE_TERMS) {
                *v = number(cov, name)?;
            }
            Ok(Covariance { lower })
        })
        .transpose()?;

    Ok(Segment {
        metadata,
        data: SegmentData {
            od_parameters,
            additional_parameters,
            state_vector,
            covariance,
        },
    })
}
