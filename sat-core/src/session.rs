//! The display session: one configured viewer bound to a container.
//!
//! [`DisplaySession`] owns everything the viewer renders (overlays, camera,
//! clock, base layer) plus the credit element. Overlay loads are dispatched
//! to background threads and collected by [`DisplaySession::poll_loads`],
//! so requesting a load never blocks the caller.

use crate::camera::Camera;
use crate::clock::Clock;
use crate::config::{BaseLayer, ViewerOptions, Widget};
use crate::overlay::{DataLoader, LoadError, Overlay, OverlayCollection};
use chrono::Utc;
use std::sync::{Arc, mpsc};

/// CSS-like display style of a DOM-ish element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Display {
    #[default]
    Block,
    None,
}

/// The attribution area at the bottom of the viewer.
#[derive(Clone, Debug, Default)]
pub struct CreditElement {
    display: Display,
}

impl CreditElement {
    pub fn display(&self) -> Display {
        self.display
    }

    pub fn set_display(&mut self, display: Display) {
        self.display = display;
    }

    pub fn is_hidden(&self) -> bool {
        self.display == Display::None
    }
}

type LoadResult = Result<Overlay, LoadError>;

#[derive(Debug)]
struct PendingLoad {
    source: String,
    rx: mpsc::Receiver<LoadResult>,
}

pub struct DisplaySession {
    container_id: String,
    options: ViewerOptions,
    credit: CreditElement,
    overlays: OverlayCollection,
    camera: Camera,
    clock: Clock,
    base_layer: BaseLayer,
    loader: Arc<dyn DataLoader>,
    pending: Vec<PendingLoad>,
    load_requests: u64,
}

impl DisplaySession {
    /// Constructs a session in `container_id` with the given options.
    ///
    /// The credit element starts with its default display style regardless
    /// of [`ViewerOptions::credit_container`].
    pub fn new(container_id: &str, options: ViewerOptions, loader: Arc<dyn DataLoader>) -> Self {
        Self {
            container_id: container_id.to_string(),
            credit: CreditElement::default(),
            overlays: OverlayCollection::default(),
            camera: Camera::new(options.scene_mode),
            clock: Clock::new(Utc::now(), options.should_animate),
            base_layer: options.base_layer,
            loader,
            pending: Vec::new(),
            load_requests: 0,
            options,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn credit(&self) -> &CreditElement {
        &self.credit
    }

    pub fn credit_mut(&mut self) -> &mut CreditElement {
        &mut self.credit
    }

    pub fn overlays(&self) -> &OverlayCollection {
        &self.overlays
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn base_layer(&self) -> BaseLayer {
        self.base_layer
    }

    pub fn set_base_layer(&mut self, layer: BaseLayer) {
        self.base_layer = layer;
    }

    /// Whether a chrome widget is currently shown.
    ///
    /// The credit container additionally honours the element's display
    /// override.
    pub fn widget_visible(&self, widget: Widget) -> bool {
        match widget {
            Widget::CreditContainer => self.options.shows(widget) && !self.credit.is_hidden(),
            _ => self.options.shows(widget),
        }
    }

    /// Number of loads requested over the session's lifetime.
    pub fn load_requests(&self) -> u64 {
        self.load_requests
    }

    /// Number of loads still running in the background.
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Starts loading `source` on a background thread and returns at once.
    ///
    /// The overlay is added by a later [`DisplaySession::poll_loads`] or
    /// [`DisplaySession::settle`]. Failures are logged and dropped.
    pub fn load_overlay(&mut self, source: &str) {
        self.load_requests += 1;
        log::debug!("requesting overlay {source}");

        let (tx, rx) = mpsc::channel();
        let loader = Arc::clone(&self.loader);
        let src = source.to_string();
        let spawned = std::thread::Builder::new()
            .name("overlay-loader".into())
            .spawn(move || {
                let _ = tx.send(loader.load(&src));
            });

        match spawned {
            Ok(_) => self.pending.push(PendingLoad {
                source: source.to_string(),
                rx,
            }),
            Err(e) => log::error!("cannot start loader thread for {source}: {e}"),
        }
    }

    /// Adds every overlay whose load has completed since the last call.
    ///
    /// ### Returns
    /// The number of overlays added.
    pub fn poll_loads(&mut self) -> usize {
        let mut added = 0;
        for load in std::mem::take(&mut self.pending) {
            match load.rx.try_recv() {
                Ok(result) => added += self.finish(&load.source, result) as usize,
                Err(mpsc::TryRecvError::Empty) => self.pending.push(load),
                Err(mpsc::TryRecvError::Disconnected) => {
                    added += self.finish(&load.source, Err(LoadError::Aborted(load.source.clone())))
                        as usize
                }
            }
        }
        added
    }

    /// Blocks until every pending load has finished, adding the results.
    ///
    /// ### Returns
    /// The number of overlays added.
    pub fn settle(&mut self) -> usize {
        let mut added = 0;
        for load in std::mem::take(&mut self.pending) {
            let result = load
                .rx
                .recv()
                .unwrap_or_else(|_| Err(LoadError::Aborted(load.source.clone())));
            added += self.finish(&load.source, result) as usize;
        }
        added
    }

    fn finish(&mut self, source: &str, result: LoadResult) -> bool {
        match result {
            Ok(overlay) => {
                if self.overlays.is_empty() {
                    if let Some(range) = overlay.tracking_clock() {
                        log::debug!("clock now tracking {}", overlay.name);
                        self.clock.track(&range);
                    }
                }
                log::info!(
                    "loaded overlay {:?} ({} entities) from {source}",
                    overlay.name,
                    overlay.entities.len()
                );
                self.overlays.add(overlay);
                true
            }
            Err(e) => {
                log::warn!("failed to load overlay {source}: {e}");
                false
            }
        }
    }

    /// Advances the clock (when animating) and any camera flight by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        self.clock.tick(dt);
        self.camera.update(dt);
    }

    /// Whether the next frame will differ from this one without input.
    pub fn is_animating(&self) -> bool {
        self.clock.should_animate || self.camera.is_flying() || !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::MemoryLoader;
    use std::sync::Mutex;

    const DOC: &str = r#"[
        {"id": "document", "name": "one"},
        {"id": "sat", "position": {"epoch": "2024-01-01T00:00:00Z",
            "cartesian": [0, 7000000, 0, 0, 600, 0, 7000000, 0]}}
    ]"#;

    fn session(loader: impl DataLoader + 'static) -> DisplaySession {
        DisplaySession::new("container", ViewerOptions::default(), Arc::new(loader))
    }

    /// Holds every load until the test releases the gate.
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

    struct PanickingLoader;

    impl DataLoader for PanickingLoader {
        fn load(&self, _source: &str) -> Result<Overlay, LoadError> {
            panic!("loader exploded");
        }
    }

    #[test]
    fn load_is_not_visible_until_polled() {
        let (release, gate) = mpsc::channel();
        let mut s = session(GatedLoader {
            gate: Mutex::new(gate),
            inner: MemoryLoader::default().with_document("a", DOC),
        });

        s.load_overlay("a");
        assert_eq!(s.pending_loads(), 1);
        assert_eq!(s.poll_loads(), 0);
        assert!(s.overlays().is_empty());

        release.send(()).unwrap();
        assert_eq!(s.settle(), 1);
        assert_eq!(s.overlays().len(), 1);
        assert_eq!(s.pending_loads(), 0);
    }

    #[test]
    fn repeated_loads_accumulate() {
        let mut s = session(MemoryLoader::default().with_document("a", DOC));
        for _ in 0..3 {
            s.load_overlay("a");
        }
        s.settle();
        assert_eq!(s.load_requests(), 3);
        assert_eq!(s.overlays().len(), 3);
    }

    #[test]
    fn failed_and_aborted_loads_are_dropped() {
        let mut s = session(MemoryLoader::default());
        s.load_overlay("missing");
        assert_eq!(s.settle(), 0);
        assert!(s.overlays().is_empty());

        let mut s = session(PanickingLoader);
        s.load_overlay("anything");
        assert_eq!(s.settle(), 0);
        assert!(s.overlays().is_empty());
    }

    #[test]
    fn out_of_range_sample_times_fail_the_load_quietly() {
        let bad = r#"[{"id": "document"}, {"id": "x", "position": {
            "epoch": "2024-01-01T00:00:00Z",
            "cartesian": [0, 7000000, 0, 0, 1e13, 7000000, 0, 0]
        }}]"#;
        let mut s = session(MemoryLoader::default().with_document("a", bad));
        s.load_overlay("a");
        assert_eq!(s.settle(), 0);
        assert!(s.overlays().is_empty());
        assert_eq!(s.clock().range, None);

        s.clock_mut().should_animate = true;
        s.tick(1.0);
    }

    #[test]
    fn first_overlay_drives_the_clock() {
        let mut s = session(MemoryLoader::default().with_document("a", DOC));
        s.load_overlay("a");
        s.settle();

        let (start, stop) = s.clock().range.unwrap();
        assert_eq!(s.clock().current, start);
        assert_eq!(crate::clock::seconds_between(start, stop), 600.0);
    }

    #[test]
    fn credit_container_visibility_follows_display_override() {
        let mut s = session(MemoryLoader::default());
        assert!(s.widget_visible(Widget::CreditContainer));

        s.credit_mut().set_display(Display::None);
        assert!(!s.widget_visible(Widget::CreditContainer));
        assert!(s.widget_visible(Widget::Timeline));
    }

    #[test]
    fn tick_respects_should_animate() {
        let mut s = session(MemoryLoader::default());
        let before = s.clock().current;
        s.tick(1.0);
        assert_eq!(s.clock().current, before);

        s.clock_mut().should_animate = true;
        s.tick(1.0);
        assert!(s.clock().current > before);
    }
}
