use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Visualizer {
    Waveform,
    Spectrum,
    Circular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Professional,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Resolution {
    #[serde(rename = "720p")]
    #[value(name = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    #[value(name = "1080p")]
    Hd1080,
    #[serde(rename = "4k")]
    #[value(name = "4k")]
    Uhd4k,
}

impl Resolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Hd720 => (1280, 720),
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Uhd4k => (3840, 2160),
        }
    }
}

/// Immutable snapshot of every tunable parameter. A pipeline or live
/// session holds exactly one of these at a time; live tuning replaces it
/// wholesale rather than mutating it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_visualizer")]
    pub visualizer: Visualizer,
    #[serde(default = "default_theme")]
    pub theme: Theme,
    #[serde(default = "default_resolution")]
    pub resolution: Resolution,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_band_count")]
    pub band_count: usize,
    #[serde(default = "default_inner_band_count")]
    pub inner_band_count: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing_factor: f32,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "default_amp_floor")]
    pub amp_floor: f32,
    #[serde(default = "default_amp_ceiling")]
    pub amp_ceiling: f32,
    #[serde(default = "default_amp_decay")]
    pub amp_decay: f32,
    #[serde(default = "default_target_level")]
    pub target_level: f32,
    #[serde(default)]
    pub rotation_speed: f32,
    #[serde(default)]
    pub inner_rotation_speed: f32,
    #[serde(default = "default_min_radius")]
    pub min_radius: f32,
    #[serde(default = "default_max_radius")]
    pub max_radius: f32,
    #[serde(default = "default_inner_min_radius")]
    pub inner_min_radius: f32,
    #[serde(default = "default_inner_max_radius")]
    pub inner_max_radius: f32,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_primary")]
    pub primary: String,
    #[serde(default = "default_secondary")]
    pub secondary: String,
    #[serde(default = "default_accent")]
    pub accent: String,
    #[serde(default = "default_gradient")]
    pub gradient: bool,
}

fn default_visualizer() -> Visualizer { Visualizer::Spectrum }
fn default_theme() -> Theme { Theme::Professional }
fn default_resolution() -> Resolution { Resolution::Hd1080 }
fn default_fps() -> u32 { 30 }
fn default_band_count() -> usize { 64 }
fn default_inner_band_count() -> usize { 32 }
fn default_smoothing() -> f32 { 0.8 }
fn default_sensitivity() -> f32 { 1.2 }
fn default_amp_floor() -> f32 { 0.05 }
fn default_amp_ceiling() -> f32 { 4.0 }
fn default_amp_decay() -> f32 { 0.95 }
fn default_target_level() -> f32 { 0.85 }
fn default_min_radius() -> f32 { 0.15 }
fn default_max_radius() -> f32 { 0.35 }
fn default_inner_min_radius() -> f32 { 0.05 }
fn default_inner_max_radius() -> f32 { 0.2 }
fn default_background() -> String { "#1a1a1a".into() }
fn default_primary() -> String { "#00ff88".into() }
fn default_secondary() -> String { "#ffffff".into() }
fn default_accent() -> String { "#64ffda".into() }
fn default_gradient() -> bool { true }

impl Default for RenderConfig {
    fn default() -> Self {
        // Route through serde so the per-field defaults stay the single
        // source of truth.
        serde_json::from_str("{}").expect("default config is well-formed")
    }
}

impl RenderConfig {
    /// Config pre-populated with a theme's palette and tuning defaults.
    pub fn for_theme(theme: Theme) -> Self {
        let mut config = Self::default();
        config.apply_theme(theme);
        config
    }

    /// Resets palette and theme-tuned scalars to the named theme.
    pub fn apply_theme(&mut self, theme: Theme) {
        self.theme = theme;
        match theme {
            Theme::Professional => {
                self.background = "#1a1a1a".into();
                self.primary = "#00ff88".into();
                self.secondary = "#ffffff".into();
                self.accent = "#64ffda".into();
                self.gradient = true;
                self.smoothing_factor = 0.9;
                self.sensitivity = 1.0;
            }
            Theme::Minimal => {
                self.background = "#000000".into();
                self.primary = "#ffffff".into();
                self.secondary = "#cccccc".into();
                self.accent = "#ffffff".into();
                self.gradient = false;
                self.smoothing_factor = 0.6;
                self.sensitivity = 1.0;
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.resolution.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.resolution.dimensions().1
    }

    /// Validates every field. Runs once at session/pipeline start so that
    /// configuration problems never surface mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 || self.fps > 240 {
            return Err(Error::ConfigValidation(format!(
                "fps must be in 1..=240, got {}",
                self.fps
            )));
        }
        if self.band_count < 2 || self.band_count > 256 {
            return Err(Error::ConfigValidation(format!(
                "band_count must be in 2..=256, got {}",
                self.band_count
            )));
        }
        if self.inner_band_count < 2 || self.inner_band_count > 128 {
            return Err(Error::ConfigValidation(format!(
                "inner_band_count must be in 2..=128, got {}",
                self.inner_band_count
            )));
        }
        if !(0.0..=0.99).contains(&self.smoothing_factor) {
            return Err(Error::ConfigValidation(format!(
                "smoothing_factor must be in 0.0..=0.99, got {}",
                self.smoothing_factor
            )));
        }
        if self.sensitivity <= 0.0 || self.sensitivity > 5.0 {
            return Err(Error::ConfigValidation(format!(
                "sensitivity must be in (0.0, 5.0], got {}",
                self.sensitivity
            )));
        }
        if self.amp_floor <= 0.0 {
            return Err(Error::ConfigValidation(format!(
                "amp_floor must be positive, got {}",
                self.amp_floor
            )));
        }
        if self.amp_ceiling < 1.0 {
            return Err(Error::ConfigValidation(format!(
                "amp_ceiling must be at least 1.0, got {}",
                self.amp_ceiling
            )));
        }
        if !(0.0..1.0).contains(&self.amp_decay) {
            return Err(Error::ConfigValidation(format!(
                "amp_decay must be in [0.0, 1.0), got {}",
                self.amp_decay
            )));
        }
        if self.target_level <= 0.0 || self.target_level > 1.0 {
            return Err(Error::ConfigValidation(format!(
                "target_level must be in (0.0, 1.0], got {}",
                self.target_level
            )));
        }
        for (name, min, max) in [
            ("radius", self.min_radius, self.max_radius),
            ("inner radius", self.inner_min_radius, self.inner_max_radius),
        ] {
            if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min >= max {
                return Err(Error::ConfigValidation(format!(
                    "{} range must satisfy 0.0 <= min < max <= 1.0, got {}..{}",
                    name, min, max
                )));
            }
        }
        for (name, value) in [
            ("background", &self.background),
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("accent", &self.accent),
        ] {
            if parse_hex_color(value).is_none() {
                return Err(Error::ConfigValidation(format!(
                    "{} color {:?} is not a #rrggbb hex value",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Serializes the config verbatim as pretty JSON, the format live
    /// sessions export and `generate --config` loads back.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::ConfigValidation(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::ConfigIo {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

pub fn parse_hex_color(value: &str) -> Option<[u8; 4]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b, 255])
}

/// Partial config as read from a file. Every field is optional so that a
/// hand-written file can name only the parameters it cares about; fields
/// present here override whatever the CLI produced.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverlay {
    pub visualizer: Option<Visualizer>,
    pub theme: Option<Theme>,
    pub resolution: Option<Resolution>,
    pub fps: Option<u32>,
    pub band_count: Option<usize>,
    pub inner_band_count: Option<usize>,
    pub smoothing_factor: Option<f32>,
    pub sensitivity: Option<f32>,
    pub amp_floor: Option<f32>,
    pub amp_ceiling: Option<f32>,
    pub amp_decay: Option<f32>,
    pub target_level: Option<f32>,
    pub rotation_speed: Option<f32>,
    pub inner_rotation_speed: Option<f32>,
    pub min_radius: Option<f32>,
    pub max_radius: Option<f32>,
    pub inner_min_radius: Option<f32>,
    pub inner_max_radius: Option<f32>,
    pub background: Option<String>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub accent: Option<String>,
    pub gradient: Option<bool>,
}

impl ConfigOverlay {
    /// Applies this overlay on top of `base`. A theme named in the file
    /// resets the palette first, then explicit color fields win over it.
    pub fn apply(&self, base: &mut RenderConfig) {
        if let Some(theme) = self.theme {
            base.apply_theme(theme);
        }
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field.clone() {
                    base.$field = value;
                })*
            };
        }
        overlay!(
            visualizer,
            resolution,
            fps,
            band_count,
            inner_band_count,
            smoothing_factor,
            sensitivity,
            amp_floor,
            amp_ceiling,
            amp_decay,
            target_level,
            rotation_speed,
            inner_rotation_speed,
            min_radius,
            max_radius,
            inner_min_radius,
            inner_max_radius,
            background,
            primary,
            secondary,
            accent,
            gradient,
        );
    }
}

/// Loads an overlay from `.json` or `.toml`, chosen by extension. Unknown
/// keys are ignored; unknown enum values are configuration errors.
pub fn load_overlay(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigIo {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(&content).map_err(|e| Error::ConfigValidation(e.to_string()))
    } else {
        serde_json::from_str(&content).map_err(|e| Error::ConfigValidation(e.to_string()))
    }
}

/// Looks for a config file in the conventional spots: ./voviz.toml, then
/// the per-user config directories.
pub fn discover_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("voviz.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("voviz").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("voviz").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        RenderConfig::default().validate().unwrap();
        RenderConfig::for_theme(Theme::Minimal).validate().unwrap();
    }

    #[test]
    fn file_fields_override_cli_values() {
        // CLI asked for 24 fps, the file says 30: the file wins.
        let mut config = RenderConfig::default();
        config.fps = 24;

        let overlay: ConfigOverlay = serde_json::from_str(r#"{"fps": 30}"#).unwrap();
        overlay.apply(&mut config);

        assert_eq!(config.fps, 30);
        // Fields absent from the file stay as the CLI set them.
        assert_eq!(config.visualizer, Visualizer::Spectrum);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let overlay: ConfigOverlay =
            serde_json::from_str(r#"{"fps": 25, "some_future_knob": 7}"#).unwrap();
        assert_eq!(overlay.fps, Some(25));
    }

    #[test]
    fn unknown_theme_value_is_rejected() {
        let result: std::result::Result<ConfigOverlay, _> =
            serde_json::from_str(r#"{"theme": "vaporwave"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn export_reload_round_trip_is_structural_identity() {
        let mut exported = RenderConfig::for_theme(Theme::Minimal);
        exported.visualizer = Visualizer::Circular;
        exported.rotation_speed = 2.5;
        exported.band_count = 48;

        let json = serde_json::to_string(&exported).unwrap();
        let overlay: ConfigOverlay = serde_json::from_str(&json).unwrap();
        let mut reloaded = RenderConfig::default();
        overlay.apply(&mut reloaded);

        assert_eq!(exported, reloaded);
    }

    #[test]
    fn theme_in_file_resets_palette_before_explicit_colors() {
        let mut config = RenderConfig::default();
        let overlay: ConfigOverlay =
            serde_json::from_str(r##"{"theme": "minimal", "primary": "#123456"}"##).unwrap();
        overlay.apply(&mut config);

        assert_eq!(config.background, "#000000");
        assert_eq!(config.primary, "#123456");
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut config = RenderConfig::default();
        config.band_count = 1;
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));

        let mut config = RenderConfig::default();
        config.fps = 0;
        assert!(config.validate().is_err());

        let mut config = RenderConfig::default();
        config.amp_decay = 1.0;
        assert!(config.validate().is_err());

        let mut config = RenderConfig::default();
        config.min_radius = 0.5;
        config.max_radius = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#00ff88"), Some([0, 255, 136, 255]));
        assert_eq!(parse_hex_color("00ff88"), None);
        assert_eq!(parse_hex_color("#00ff8"), None);
        assert_eq!(parse_hex_color("#zzffzz"), None);
    }

    #[test]
    fn toml_overlay_parses() {
        let overlay: ConfigOverlay = toml::from_str("fps = 60\nband_count = 32\n").unwrap();
        assert_eq!(overlay.fps, Some(60));
        assert_eq!(overlay.band_count, Some(32));
    }
}
