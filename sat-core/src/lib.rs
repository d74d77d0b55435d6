//! Core library for the satellite globe viewer.
//!
//! Main components:
//! - [`bootstrap`] — creates the one display session and wires the load button.
//! - [`session`] — the display session: overlays, camera, clock, credits.
//! - [`config`] — viewer options and the chrome toggles.
//! - [`document`] — hosting document: element registry and click dispatch.
//! - [`overlay`] — loaded data sources, the overlay collection and loaders.
//! - [`czml`] — CZML packet model, parsing and position sampling.
//! - [`camera`] — camera pose, flights and globe projection.
//! - [`clock`] — scene clock driving time-dependent data.
//! - [`generator`] — synthetic debris trajectory generator.
//! - [`cdm`] — Conjunction Data Message (XML) parsing.
//! - [`avoidance`] — genetic search for a collision-avoidance burn.
//! - [`types`] — shared type aliases and IDs.

pub mod avoidance;
pub mod bootstrap;
pub mod camera;
pub mod cdm;
pub mod clock;
pub mod config;
pub mod czml;
pub mod document;
pub mod generator;
pub mod overlay;
pub mod session;
pub mod types;
