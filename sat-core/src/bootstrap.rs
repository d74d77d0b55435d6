//! Viewer bootstrapping: one configured display session and its load button.
//!
//! ```text
//! initialize(document, CONTAINER_ID, loader)   -> DisplaySession
//! register_load_handler(document, BUTTON_ID)   -> click loads SATELLITE_DATA_PATH
//!                                                 and snaps the camera home
//! ```

use crate::config::ViewerOptions;
use crate::document::{ClickHandler, Document, ElementKind};
use crate::overlay::DataLoader;
use crate::session::{Display, DisplaySession};
use std::sync::Arc;

pub use crate::document::BootstrapError;

pub const CONTAINER_ID: &str = "cesiumContainer";
pub const BUTTON_ID: &str = "satellitesButton";
pub const SATELLITE_DATA_PATH: &str = "../czml_data/simple.czml";

/// Creates the display session inside container `container_id`.
///
/// The session uses [`ViewerOptions::satellite_viewer`]. Because suppressing
/// credits through the options leaves the credit element in the layout, it is
/// hidden explicitly afterwards.
///
/// ### Errors
/// [`BootstrapError::ElementNotFound`] if the container does not exist, or
/// [`BootstrapError::WrongElementKind`] if the id names a button.
pub fn initialize(
    document: &Document,
    container_id: &str,
    loader: Arc<dyn DataLoader>,
) -> Result<DisplaySession, BootstrapError> {
    if document.get(container_id)? != &ElementKind::Container {
        return Err(BootstrapError::WrongElementKind(
            container_id.to_string(),
            "container",
        ));
    }

    let mut session = DisplaySession::new(container_id, ViewerOptions::satellite_viewer(), loader);
    session.credit_mut().set_display(Display::None);

    log::info!("viewer initialized in #{container_id}");
    Ok(session)
}

/// Loads the satellite data in the background and snaps the camera home.
///
/// Neither action waits for the other; the load result is never inspected
/// here, and every call adds another overlay once its load completes.
pub fn load_satellites(session: &mut DisplaySession) {
    session.load_overlay(SATELLITE_DATA_PATH);
    session.camera_mut().fly_home(0.0);
}

/// Wires button `button_id` to [`load_satellites`].
///
/// ### Errors
/// [`BootstrapError::ElementNotFound`] if the button does not exist.
pub fn register_load_handler(document: &mut Document, button_id: &str) -> Result<(), BootstrapError> {
    let handler: ClickHandler = Box::new(load_satellites);
    document.on_click(button_id, handler)?;
    log::debug!("load handler registered on #{button_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Widget;
    use crate::overlay::{LoadError, MemoryLoader, Overlay};
    use std::sync::Mutex;
    use std::sync::mpsc;

    const SIMPLE: &str = r#"[
        {"id": "document", "name": "Debris Simulation", "version": "1.0"},
        {"id": "Satellite-1", "label": {"text": "Satellite"},
         "position": {"interpolationAlgorithm": "LAGRANGE", "interpolationDegree": 5,
                      "referenceFrame": "INERTIAL", "epoch": "2024-01-01T00:00:00.000",
                      "cartesian": [0, 7000000, 0, 0, 6, 6999000, 42000, 42000]}}
    ]"#;

    fn page() -> Document {
        Document::new()
            .with_container(CONTAINER_ID)
            .with_button(BUTTON_ID, "Load satellites")
    }

    fn resolvable() -> Arc<dyn DataLoader> {
        Arc::new(MemoryLoader::default().with_document(SATELLITE_DATA_PATH, SIMPLE))
    }

    fn setup(loader: Arc<dyn DataLoader>) -> (Document, DisplaySession) {
        let mut doc = page();
        let session = initialize(&doc, CONTAINER_ID, loader).unwrap();
        register_load_handler(&mut doc, BUTTON_ID).unwrap();
        (doc, session)
    }

    /// Blocks loads until released, so tests can observe state mid-load.
    struct GatedLoader {
        gate: Mutex<mpsc::Receiver<()>>,
        inner: MemoryLoader,
    }

    impl DataLoader for GatedLoader {
        fn load(&self, source: &str) -> Result<Overlay, LoadError> {
            let _ = self.gate.lock().unwrap().recv();
            self.inner.load(source)
        }
    }

    #[test]
    fn initialize_hides_all_chrome_and_credits() {
        let (_, session) = setup(resolvable());

        assert_eq!(session.container_id(), CONTAINER_ID);
        for w in Widget::ALL {
            assert!(!session.widget_visible(w), "{w:?} should be hidden");
        }
        assert_eq!(session.credit().display(), Display::None);
        assert!(session.clock().should_animate);
        assert!(session.overlays().is_empty());
    }

    #[test]
    fn credit_is_hidden_even_though_options_alone_leave_it_shown() {
        let session = DisplaySession::new(
            CONTAINER_ID,
            ViewerOptions::satellite_viewer(),
            resolvable(),
        );
        assert_eq!(session.credit().display(), Display::Block);

        let (_, session) = setup(resolvable());
        assert_eq!(session.credit().display(), Display::None);
    }

    #[test]
    fn missing_elements_fail_setup() {
        let doc = Document::new().with_button(BUTTON_ID, "Load satellites");
        let err = initialize(&doc, CONTAINER_ID, resolvable()).err().unwrap();
        assert_eq!(err, BootstrapError::ElementNotFound(CONTAINER_ID.into()));

        let mut doc = Document::new().with_container(CONTAINER_ID);
        let err = register_load_handler(&mut doc, BUTTON_ID).unwrap_err();
        assert_eq!(err, BootstrapError::ElementNotFound(BUTTON_ID.into()));
    }

    #[test]
    fn initialize_rejects_a_button_as_container() {
        let doc = page();
        let err = initialize(&doc, BUTTON_ID, resolvable()).err().unwrap();
        assert_eq!(err, BootstrapError::WrongElementKind(BUTTON_ID.into(), "container"));
    }

    #[test]
    fn one_click_adds_one_overlay() {
        let (mut doc, mut session) = setup(resolvable());

        doc.click(BUTTON_ID, &mut session).unwrap();
        session.settle();

        assert_eq!(session.overlays().len(), 1);
        let overlay = session.overlays().get(0).unwrap();
        assert_eq!(overlay.source, SATELLITE_DATA_PATH);
        assert_eq!(overlay.entities.len(), 1);
    }

    #[test]
    fn camera_resets_instantly_before_the_load_completes() {
        let (release, gate) = mpsc::channel();
        let loader = Arc::new(GatedLoader {
            gate: Mutex::new(gate),
            inner: MemoryLoader::default().with_document(SATELLITE_DATA_PATH, SIMPLE),
        });
        let (mut doc, mut session) = setup(loader);
        session.camera_mut().rotate(45.0, -10.0);

        doc.click(BUTTON_ID, &mut session).unwrap();

        // The load is still parked on the gate.
        assert_eq!(session.pending_loads(), 1);
        assert!(session.overlays().is_empty());
        assert_eq!(session.camera().home_requests(), 1);
        assert_eq!(session.camera().last_flight_duration(), Some(0.0));
        assert_eq!(session.camera().pose, crate::camera::HOME_POSE);

        release.send(()).unwrap();
        session.settle();
        assert_eq!(session.overlays().len(), 1);
    }

    #[test]
    fn rapid_clicks_are_not_deduplicated() {
        let (mut doc, mut session) = setup(resolvable());

        doc.click(BUTTON_ID, &mut session).unwrap();
        doc.click(BUTTON_ID, &mut session).unwrap();
        session.settle();

        assert_eq!(session.load_requests(), 2);
        assert_eq!(session.camera().home_requests(), 2);
        assert_eq!(session.overlays().len(), 2);
    }

    #[test]
    fn n_clicks_issue_n_loads_and_n_resets() {
        let (mut doc, mut session) = setup(resolvable());

        for _ in 0..5 {
            doc.click(BUTTON_ID, &mut session).unwrap();
        }
        session.settle();

        assert_eq!(session.load_requests(), 5);
        assert_eq!(session.camera().home_requests(), 5);
        assert_eq!(session.overlays().len(), 5);
    }

    #[test]
    fn unresolvable_data_leaves_no_overlay_and_no_crash() {
        let (mut doc, mut session) = setup(Arc::new(MemoryLoader::default()));

        assert_eq!(doc.click(BUTTON_ID, &mut session), Ok(1));
        session.settle();

        assert!(session.overlays().is_empty());
        assert_eq!(session.camera().home_requests(), 1);

        // The session keeps working afterwards.
        session.tick(0.016);
        assert_eq!(doc.click(BUTTON_ID, &mut session), Ok(1));
        session.settle();
        assert!(session.overlays().is_empty());
    }
}
