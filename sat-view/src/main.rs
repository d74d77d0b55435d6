//! Application entry point for the satellite globe viewer.
//!
//! This binary sets up logging and eframe/egui and delegates all
//! interactive logic and rendering to [`Viewer`] from the `viewer` module.

mod viewer;

use anyhow::{Context, Result};
use sat_core::overlay::FileLoader;
use std::sync::Arc;
use viewer::Viewer;

/// Starts the native eframe application.
///
/// Data paths are resolved as if the viewer page lived in `./web`, so the
/// satellites button reads `./czml_data/simple.czml`.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if the viewer cannot be bootstrapped or eframe fails to create
///   the native window or event loop.
fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let page_dir = std::env::current_dir()
        .context("cannot determine working directory")?
        .join("web");
    let viewer = Viewer::new(Arc::new(FileLoader::new(page_dir)))?;

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Satellite Viewer",
        options,
        Box::new(move |_cc| Ok(Box::new(viewer))),
    )
    .map_err(|e| anyhow::anyhow!("eframe: {e}"))
}
