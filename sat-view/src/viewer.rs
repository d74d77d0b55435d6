//! Interactive satellite globe viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the hosting [`Document`] and
//! the single [`DisplaySession`] created by the bootstrapper, and implements
//! [`eframe::App`] to render the session through an egui UI.

use chrono::SecondsFormat;
use eframe::App;
use glam::{DVec2, DVec3};
use sat_core::{
    bootstrap::{self, BUTTON_ID, BootstrapError, CONTAINER_ID},
    camera::{CameraPose, ecef_to_lon_lat},
    clock::{offset_by, seconds_between},
    config::{BaseLayer, SceneMode, Widget},
    czml::{Entity, Rgba},
    document::Document,
    overlay::DataLoader,
    session::DisplaySession,
    types::EARTH_RADIUS_M,
};
use std::sync::Arc;

/// Number of points sampled along a path trail.
const PATH_SAMPLES: usize = 96;
/// Duration of flights started from the chrome (home button, geocoder).
const CHROME_FLIGHT_SECONDS: f64 = 1.5;

/// Main application state for the interactive viewer.
///
/// The typical per-frame update is:
/// 1. Collect finished overlay loads and advance the clock and camera.
/// 2. Draw whatever chrome the session options leave visible.
/// 3. Handle drag/scroll input and render the globe and overlays.
///
/// ### Fields
/// - `document` - Hosting element tree; owns the load button's handler.
/// - `session` - The one display session.
/// - `geocoder_query` - Text typed into the geocoder box.
/// - `geocoder_status` - Result message of the last geocoder search.
/// - `show_help` - Whether the navigation help window is open.
pub struct Viewer {
    document: Document,
    session: DisplaySession,

    geocoder_query: String,
    geocoder_status: Option<String>,
    show_help: bool,
}

/// Converts a CZML colour to an egui colour.
fn color32(c: Rgba) -> egui::Color32 {
    let [r, g, b, a] = c.rgba;
    egui::Color32::from_rgba_unmultiplied(r, g, b, a)
}

fn lon_lat_to_ecef(lon_deg: f64, lat_deg: f64) -> DVec3 {
    let (lon, lat) = (lon_deg.to_radians(), lat_deg.to_radians());
    DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()) * EARTH_RADIUS_M
}

impl Viewer {
    /// Builds the hosting document, creates the session and wires the
    /// satellites button.
    ///
    /// ### Errors
    /// Propagates [`BootstrapError`] if the container or button is missing.
    pub fn new(loader: Arc<dyn DataLoader>) -> Result<Self, BootstrapError> {
        let mut document = Document::new()
            .with_container(CONTAINER_ID)
            .with_button(BUTTON_ID, "Load satellites");

        let session = bootstrap::initialize(&document, CONTAINER_ID, loader)?;
        bootstrap::register_load_handler(&mut document, BUTTON_ID)?;

        Ok(Self {
            document,
            session,
            geocoder_query: String::new(),
            geocoder_status: None,
            show_help: false,
        })
    }

    /// Dispatches a click on the document element `id`.
    fn click(&mut self, id: &str) {
        if let Err(e) = self.document.click(id, &mut self.session) {
            log::error!("click on #{id}: {e}");
        }
    }

    /// Converts a view-plane position (metres) to screen-space.
    ///
    /// The view centre maps to the centre of `rect`; y is flipped so that
    /// north is up.
    fn view_to_screen(&self, v: DVec2, rect: egui::Rect) -> egui::Pos2 {
        let ppm = self.session.camera().pixels_per_metre(rect.width().min(rect.height()) as f64);
        let center = rect.center();
        egui::pos2(
            center.x + (v.x * ppm) as f32,
            center.y - (v.y * ppm) as f32,
        )
    }

    /// Projects an Earth-fixed position to the screen, if visible.
    fn world_to_screen(&self, p: DVec3, rect: egui::Rect) -> Option<egui::Pos2> {
        self.session
            .camera()
            .project(p)
            .map(|v| self.view_to_screen(v, rect))
    }

    /// Projects a polyline, splitting it where points are hidden or where the
    /// 2D map wraps around.
    fn project_polyline(&self, points: &[DVec3], rect: egui::Rect) -> Vec<Vec<egui::Pos2>> {
        let wrap_px = rect.width().min(rect.height()) * 0.5;
        let mut runs = Vec::new();
        let mut run: Vec<egui::Pos2> = Vec::new();

        for &p in points {
            match self.world_to_screen(p, rect) {
                Some(s) => {
                    let jump = run.last().is_some_and(|last: &egui::Pos2| (last.x - s.x).abs() > wrap_px);
                    if jump && self.session.camera().mode == SceneMode::Map2D {
                        runs.push(std::mem::take(&mut run));
                    }
                    run.push(s);
                }
                None => {
                    if !run.is_empty() {
                        runs.push(std::mem::take(&mut run));
                    }
                }
            }
        }
        if !run.is_empty() {
            runs.push(run);
        }
        runs.retain(|r| r.len() >= 2);
        runs
    }

    /// Searches loaded overlays for an entity and flies to it.
    fn geocode(&mut self) {
        let query = self.geocoder_query.trim();
        if query.is_empty() {
            return;
        }

        let t = self.session.clock().current;
        let hit = self
            .session
            .overlays()
            .iter()
            .find_map(|o| o.find_entity(query))
            .and_then(|e| Some((e.display_name().to_string(), e.position_at(t)?)));

        match hit {
            Some((name, p)) => {
                let (lon_deg, lat_deg) = ecef_to_lon_lat(p);
                let range_m = (p.length() - EARTH_RADIUS_M).max(0.0) + 8_000_000.0;
                self.session.camera_mut().fly_to(
                    CameraPose {
                        lon_deg,
                        lat_deg,
                        range_m,
                    },
                    CHROME_FLIGHT_SECONDS,
                );
                self.geocoder_status = Some(format!("Flying to {name}"));
            }
            None => {
                self.geocoder_status = Some(format!("No visible entity matches {query:?}"));
            }
        }
    }

    /// Builds the document's buttons in the top-left corner.
    fn ui_document_buttons(&mut self, ctx: &egui::Context) {
        let buttons: Vec<(String, String)> = self
            .document
            .buttons()
            .into_iter()
            .map(|(id, label)| (id.to_string(), label.to_string()))
            .collect();

        egui::Area::new("document_buttons".into())
            .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
            .movable(false)
            .show(ctx, |ui| {
                for (id, label) in &buttons {
                    if ui.button(label).clicked() {
                        self.click(id);
                    }
                }
                if self.session.pending_loads() > 0 {
                    ui.spinner();
                }
            });
    }

    /// Builds the top-right toolbar: geocoder, home, scene mode, base layer,
    /// help and fullscreen. Each widget appears only if enabled.
    fn ui_toolbar(&mut self, ctx: &egui::Context) {
        let visible = |w| self.session.widget_visible(w);
        let any = [
            Widget::Geocoder,
            Widget::HomeButton,
            Widget::SceneModePicker,
            Widget::BaseLayerPicker,
            Widget::NavigationHelpButton,
            Widget::FullscreenButton,
        ]
        .into_iter()
        .any(visible);
        if !any {
            return;
        }

        egui::Area::new("toolbar".into())
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
            .movable(false)
            .show(ctx, |ui| {
                egui::Frame::new()
                    .fill(egui::Color32::from_rgba_unmultiplied(0, 0, 0, 96))
                    .inner_margin(egui::Margin::same(4))
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            if self.session.widget_visible(Widget::Geocoder) {
                                let edit = ui.add(
                                    egui::TextEdit::singleline(&mut self.geocoder_query)
                                        .hint_text("Search entities")
                                        .desired_width(140.0),
                                );
                                if edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                                    self.geocode();
                                }
                            }

                            if self.session.widget_visible(Widget::HomeButton)
                                && ui.button("⌂").on_hover_text("View home").clicked()
                            {
                                self.session.camera_mut().fly_home(CHROME_FLIGHT_SECONDS);
                            }

                            if self.session.widget_visible(Widget::SceneModePicker) {
                                let mode = &mut self.session.camera_mut().mode;
                                egui::ComboBox::from_id_salt("scene_mode")
                                    .selected_text(mode.label())
                                    .show_ui(ui, |ui| {
                                        for m in SceneMode::ALL {
                                            ui.selectable_value(mode, m, m.label());
                                        }
                                    });
                            }

                            if self.session.widget_visible(Widget::BaseLayerPicker) {
                                let mut layer = self.session.base_layer();
                                egui::ComboBox::from_id_salt("base_layer")
                                    .selected_text(layer.label())
                                    .show_ui(ui, |ui| {
                                        for l in BaseLayer::ALL {
                                            ui.selectable_value(&mut layer, l, l.label());
                                        }
                                    });
                                self.session.set_base_layer(layer);
                            }

                            if self.session.widget_visible(Widget::NavigationHelpButton)
                                && ui.button("?").on_hover_text("Navigation instructions").clicked()
                            {
                                self.show_help = !self.show_help;
                            }

                            if self.session.widget_visible(Widget::FullscreenButton)
                                && ui.button("⛶").on_hover_text("Full screen").clicked()
                            {
                                let full = ctx.input(|i| i.viewport().fullscreen.unwrap_or(false));
                                ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(!full));
                            }
                        });

                        if let Some(status) = &self.geocoder_status {
                            ui.label(status);
                        }
                    });
            });

        if self.show_help {
            egui::Window::new("Navigation")
                .open(&mut self.show_help)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label("Drag: rotate the globe");
                    ui.label("Scroll: zoom in and out");
                    ui.label("Home button: return to the default view");
                });
        }
    }

    /// Builds the bottom bar: animation controls, timeline and credits.
    fn ui_bottom_bar(&mut self, ctx: &egui::Context) {
        let animation = self.session.widget_visible(Widget::Animation);
        let timeline = self.session.widget_visible(Widget::Timeline);
        let credits = self.session.widget_visible(Widget::CreditContainer);
        if !(animation || timeline || credits) {
            return;
        }

        egui::TopBottomPanel::bottom("bottom_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if animation {
                    let clock = self.session.clock_mut();
                    if ui
                        .button(if clock.should_animate { "⏸" } else { "▶" })
                        .clicked()
                    {
                        clock.should_animate = !clock.should_animate;
                    }
                    if ui.button("⏪").clicked() {
                        clock.multiplier /= 2.0;
                    }
                    if ui.button("⏩").clicked() {
                        clock.multiplier *= 2.0;
                    }
                    ui.label(format!(
                        "{}  ×{}",
                        clock.current.to_rfc3339_opts(SecondsFormat::Secs, true),
                        clock.multiplier
                    ));
                    ui.separator();
                }

                if timeline {
                    let clock = self.session.clock_mut();
                    if let Some((start, stop)) = clock.range {
                        let total = seconds_between(start, stop);
                        let mut at = seconds_between(start, clock.current);
                        let slider = ui.add(
                            egui::Slider::new(&mut at, 0.0..=total)
                                .show_value(false)
                                .text("timeline"),
                        );
                        if slider.changed() {
                            if let Some(t) = offset_by(start, at) {
                                clock.set_current(t);
                            }
                        }
                    } else {
                        ui.label("timeline: no data");
                    }
                    ui.separator();
                }

                if credits {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.small("Globe: WGS84 sphere · Rendering: egui");
                    });
                }
            });
        });
    }

    /// Draws the base layer: the globe disc (3D) or map rectangle (2D), and
    /// the graticule if selected.
    fn draw_base_layer(&self, painter: &egui::Painter, rect: egui::Rect) {
        let ocean = egui::Color32::from_rgb(18, 42, 84);
        let camera = self.session.camera();
        let ppm = camera.pixels_per_metre(rect.width().min(rect.height()) as f64);

        match camera.mode {
            SceneMode::Globe3D => {
                let r = (EARTH_RADIUS_M * ppm) as f32;
                painter.circle_filled(rect.center(), r, ocean);
                painter.circle_stroke(rect.center(), r, egui::Stroke::new(1.0, egui::Color32::from_gray(90)));
            }
            SceneMode::Map2D => {
                let half_w = std::f64::consts::PI * EARTH_RADIUS_M;
                let lat0 = camera.pose.lat_deg.to_radians() * EARTH_RADIUS_M;
                let half_h = std::f64::consts::FRAC_PI_2 * EARTH_RADIUS_M;
                let min = self.view_to_screen(DVec2::new(-half_w, half_h - lat0), rect);
                let max = self.view_to_screen(DVec2::new(half_w, -half_h - lat0), rect);
                painter.rect_filled(egui::Rect::from_two_pos(min, max), 0.0, ocean);
            }
        }

        if self.session.base_layer() != BaseLayer::Graticule {
            return;
        }

        let stroke = egui::Stroke::new(0.6, egui::Color32::from_rgba_unmultiplied(150, 180, 220, 90));
        let mut lines: Vec<Vec<DVec3>> = Vec::new();
        for lat in (-75..=75).step_by(15) {
            lines.push((0..=72).map(|i| lon_lat_to_ecef(-180.0 + i as f64 * 5.0, lat as f64)).collect());
        }
        for lon in (-180..180).step_by(15) {
            lines.push((0..=36).map(|i| lon_lat_to_ecef(lon as f64, -90.0 + i as f64 * 5.0)).collect());
        }
        for line in &lines {
            for run in self.project_polyline(line, rect) {
                painter.add(egui::Shape::line(run, stroke));
            }
        }
    }

    /// Draws one entity's path trail, marker and label at the clock time.
    fn draw_entity(&self, painter: &egui::Painter, rect: egui::Rect, entity: &Entity) {
        let t = self.session.clock().current;
        let Some(position) = &entity.position else {
            return;
        };

        if let Some(path) = entity.path.as_ref().filter(|p| p.show.unwrap_or(true)) {
            let (from, to) = path.window(t);
            let points = position.positions_between(from, to, PATH_SAMPLES);
            let stroke = egui::Stroke::new(path.width.unwrap_or(1.0) as f32, color32(path.color()));
            for run in self.project_polyline(&points, rect) {
                painter.add(egui::Shape::line(run, stroke));
            }
        }

        let Some(screen) = position.position_at(t).and_then(|p| self.world_to_screen(p, rect)) else {
            return;
        };

        match entity.model.as_ref().filter(|m| m.show.unwrap_or(true)) {
            Some(model) => {
                let side = (model.minimum_pixel_size.unwrap_or(8.0) as f32 * 0.25).clamp(4.0, 16.0);
                painter.rect_filled(
                    egui::Rect::from_center_size(screen, egui::vec2(side, side)),
                    1.0,
                    egui::Color32::from_rgb(200, 200, 210),
                );
            }
            None => {
                painter.circle_filled(screen, 3.5, egui::Color32::YELLOW);
            }
        }

        if let Some(label) = entity.label.as_ref().filter(|l| l.show.unwrap_or(true)) {
            let [dx, dy] = label.pixel_offset.map(|o| o.cartesian2).unwrap_or([0.0, 0.0]);
            let fill = color32(label.fill_color.unwrap_or(Rgba::WHITE));
            painter.text(
                screen + egui::vec2(dx as f32, dy as f32),
                egui::Align2::CENTER_BOTTOM,
                entity.display_name(),
                egui::FontId::proportional(12.0),
                fill,
            );
        }
    }

    /// Builds the central panel where the globe and overlays are drawn and
    /// interacted with.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let response = ui.allocate_response(ui.available_size(), egui::Sense::drag());
                let rect = response.rect;
                let painter = ui.painter_at(rect);

                // Rotate with drag.
                if response.dragged() {
                    let delta = response.drag_delta();
                    let ppm = self
                        .session
                        .camera()
                        .pixels_per_metre(rect.width().min(rect.height()) as f64);
                    let to_deg = |px: f32| (px as f64 / ppm / EARTH_RADIUS_M).to_degrees();
                    self.session
                        .camera_mut()
                        .rotate(-to_deg(delta.x), to_deg(delta.y));
                }

                // Zoom with the scroll wheel.
                let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
                if scroll != 0.0 && response.hovered() {
                    let factor = (1.0 - scroll as f64 * 0.001).clamp(0.5, 2.0);
                    self.session.camera_mut().zoom(factor);
                }

                self.draw_base_layer(&painter, rect);
                for overlay in self.session.overlays().iter() {
                    for entity in &overlay.entities {
                        self.draw_entity(&painter, rect, entity);
                    }
                }
            });
    }
}

impl App for Viewer {
    /// eframe callback that advances the session and builds all UI for
    /// each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dt = ctx.input(|i| i.stable_dt).min(0.1) as f64;
        self.session.poll_loads();
        self.session.tick(dt);

        self.ui_toolbar(ctx);
        self.ui_bottom_bar(ctx);
        self.ui_central_panel(ctx);
        self.ui_document_buttons(ctx);

        if self.session.is_animating() {
            ctx.request_repaint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sat_core::{
        bootstrap::SATELLITE_DATA_PATH, camera::HOME_POSE, overlay::MemoryLoader, session::Display,
    };

    const SIMPLE: &str = r#"[
        {"id": "document", "name": "Debris Simulation", "version": "1.0"},
        {"id": "Satellite-1", "label": {"text": "Satellite"},
         "position": {"epoch": "2024-01-01T00:00:00Z",
                      "cartesian": [0, 7000000, 0, 0, 60, 0, 7000000, 0]}}
    ]"#;

    fn test_rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::new(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    fn viewer() -> Viewer {
        let loader = MemoryLoader::default().with_document(SATELLITE_DATA_PATH, SIMPLE);
        Viewer::new(Arc::new(loader)).unwrap()
    }

    #[test]
    fn new_viewer_hides_chrome_and_credits() {
        let viewer = viewer();
        for w in Widget::ALL {
            assert!(!viewer.session.widget_visible(w), "{w:?} should be hidden");
        }
        assert_eq!(viewer.session.credit().display(), Display::None);
        assert_eq!(viewer.document.buttons(), vec![(BUTTON_ID, "Load satellites")]);
    }

    #[test]
    fn clicking_the_button_loads_and_resets_the_camera() {
        let mut viewer = viewer();
        viewer.session.camera_mut().rotate(30.0, 30.0);

        viewer.click(BUTTON_ID);
        assert_eq!(viewer.session.camera().pose, HOME_POSE);

        viewer.session.settle();
        assert_eq!(viewer.session.overlays().len(), 1);
        assert_eq!(viewer.session.overlays().entity_count(), 1);
    }

    #[test]
    fn clicking_an_unknown_element_is_logged_not_fatal() {
        let mut viewer = viewer();
        viewer.click("noSuchButton");
        assert_eq!(viewer.session.load_requests(), 0);
    }

    #[test]
    fn view_centre_maps_to_rect_centre() {
        let viewer = viewer();
        let rect = test_rect();
        assert_eq!(viewer.view_to_screen(DVec2::ZERO, rect), rect.center());

        // North is up on screen.
        let north = viewer.view_to_screen(DVec2::new(0.0, 1_000_000.0), rect);
        assert!(north.y < rect.center().y);
    }

    #[test]
    fn geocoder_flies_to_a_loaded_entity() {
        let mut viewer = viewer();
        viewer.click(BUTTON_ID);
        viewer.session.settle();

        viewer.geocoder_query = "satellite".into();
        viewer.geocode();
        assert!(viewer.session.camera().is_flying());
        assert_eq!(viewer.geocoder_status.as_deref(), Some("Flying to Satellite"));

        viewer.geocoder_query = "nothing".into();
        viewer.geocode();
        assert!(viewer.geocoder_status.unwrap().starts_with("No visible entity"));
    }

    #[test]
    fn polylines_split_where_the_globe_hides_them() {
        let mut viewer = viewer();
        viewer.session.camera_mut().fly_to(
            CameraPose {
                lon_deg: 0.0,
                lat_deg: 0.0,
                range_m: HOME_POSE.range_m,
            },
            0.0,
        );
        let equator: Vec<DVec3> = (0..=36).map(|i| lon_lat_to_ecef(-180.0 + i as f64 * 10.0, 0.0)).collect();
        let runs = viewer.project_polyline(&equator, test_rect());

        // Only the near hemisphere is drawn, as one unbroken run.
        assert_eq!(runs.len(), 1);
        assert!(runs[0].len() < equator.len());
    }
}
