//! Viewer construction options.
//!
//! [`ViewerOptions`] mirrors the option names of the globe widget: one
//! on/off toggle per piece of built-in chrome, plus a few behavioural
//! settings that are not visual.

use serde::{Deserialize, Serialize};

/// Projection used to draw the scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneMode {
    /// Orthographic globe seen from space.
    #[default]
    Globe3D,
    /// Flat equirectangular map.
    Map2D,
}

impl SceneMode {
    pub const ALL: [SceneMode; 2] = [SceneMode::Globe3D, SceneMode::Map2D];

    pub fn label(&self) -> &'static str {
        match self {
            SceneMode::Globe3D => "3D",
            SceneMode::Map2D => "2D",
        }
    }
}

/// Imagery drawn underneath the overlays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseLayer {
    /// Solid ocean-coloured globe.
    Plain,
    /// Globe with a 15° latitude/longitude grid.
    #[default]
    Graticule,
}

impl BaseLayer {
    pub const ALL: [BaseLayer; 2] = [BaseLayer::Plain, BaseLayer::Graticule];

    pub fn label(&self) -> &'static str {
        match self {
            BaseLayer::Plain => "Plain",
            BaseLayer::Graticule => "Graticule",
        }
    }
}

/// Where attribution credits are placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditPlacement {
    /// Credits are laid out inside the viewer's bottom bar.
    #[default]
    Inline,
    /// Credits are redirected to a detached element outside the layout.
    ///
    /// The viewer's own credit element still exists and keeps its display
    /// style; callers who want it gone must hide it explicitly.
    Suppressed,
}

/// One piece of optional viewer chrome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Widget {
    Animation,
    Timeline,
    FullscreenButton,
    HomeButton,
    Geocoder,
    NavigationHelpButton,
    SceneModePicker,
    BaseLayerPicker,
    CreditContainer,
}

impl Widget {
    pub const ALL: [Widget; 9] = [
        Widget::Animation,
        Widget::Timeline,
        Widget::FullscreenButton,
        Widget::HomeButton,
        Widget::Geocoder,
        Widget::NavigationHelpButton,
        Widget::SceneModePicker,
        Widget::BaseLayerPicker,
        Widget::CreditContainer,
    ];
}

/// Options accepted when constructing a [`crate::session::DisplaySession`].
///
/// ### Fields
/// - `animation` .. `base_layer_picker` - Whether each chrome widget is shown.
/// - `credit_container` - Where attribution credits go.
/// - `should_animate` - Whether the clock advances on its own every frame.
/// - `scene_mode` - Initial projection.
/// - `base_layer` - Initial imagery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerOptions {
    pub animation: bool,
    pub timeline: bool,
    pub fullscreen_button: bool,
    pub home_button: bool,
    pub geocoder: bool,
    pub navigation_help_button: bool,
    pub scene_mode_picker: bool,
    pub base_layer_picker: bool,
    pub credit_container: CreditPlacement,
    pub should_animate: bool,
    pub scene_mode: SceneMode,
    pub base_layer: BaseLayer,
}

impl Default for ViewerOptions {
    /// The widget's own defaults: every piece of chrome visible, inline
    /// credits and a paused clock.
    fn default() -> Self {
        Self {
            animation: true,
            timeline: true,
            fullscreen_button: true,
            home_button: true,
            geocoder: true,
            navigation_help_button: true,
            scene_mode_picker: true,
            base_layer_picker: true,
            credit_container: CreditPlacement::Inline,
            should_animate: false,
            scene_mode: SceneMode::default(),
            base_layer: BaseLayer::default(),
        }
    }
}

impl ViewerOptions {
    /// The fixed configuration of the satellite viewer: all chrome hidden,
    /// credits suppressed and the clock running on its own.
    pub fn satellite_viewer() -> Self {
        Self {
            animation: false,
            timeline: false,
            fullscreen_button: false,
            home_button: false,
            geocoder: false,
            navigation_help_button: false,
            scene_mode_picker: false,
            base_layer_picker: false,
            credit_container: CreditPlacement::Suppressed,
            should_animate: true,
            ..Self::default()
        }
    }

    /// Returns whether the options ask for `widget` to be shown.
    pub fn shows(&self, widget: Widget) -> bool {
        match widget {
            Widget::Animation => self.animation,
            Widget::Timeline => self.timeline,
            Widget::FullscreenButton => self.fullscreen_button,
            Widget::HomeButton => self.home_button,
            Widget::Geocoder => self.geocoder,
            Widget::NavigationHelpButton => self.navigation_help_button,
            Widget::SceneModePicker => self.scene_mode_picker,
            Widget::BaseLayerPicker => self.base_layer_picker,
            Widget::CreditContainer => self.credit_container == CreditPlacement::Inline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_show_every_widget() {
        let opts = ViewerOptions::default();
        for w in Widget::ALL {
            assert!(opts.shows(w), "{w:?} should be shown by default");
        }
        assert!(!opts.should_animate);
    }

    #[test]
    fn satellite_viewer_hides_every_widget() {
        let opts = ViewerOptions::satellite_viewer();
        for w in Widget::ALL {
            assert!(!opts.shows(w), "{w:?} should be hidden");
        }
        assert!(opts.should_animate);
        assert_eq!(opts.credit_container, CreditPlacement::Suppressed);
    }

    #[test]
    fn options_use_widget_option_names_in_json() {
        let json = serde_json::to_value(ViewerOptions::satellite_viewer()).unwrap();
        assert_eq!(json["navigationHelpButton"], false);
        assert_eq!(json["shouldAnimate"], true);
        assert_eq!(json["creditContainer"], "Suppressed");

        // Missing keys fall back to the widget defaults.
        let parsed: ViewerOptions = serde_json::from_str(r#"{"timeline": false}"#).unwrap();
        assert!(!parsed.timeline);
        assert!(parsed.animation);
    }
}
