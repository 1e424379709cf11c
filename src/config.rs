use crate::render::HighlightStyle;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Viewer tunables. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// `#rrggbb` clear color.
    pub background: String,
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    pub initial_near: f32,
    pub initial_far: f32,
    pub initial_camera: [f32; 3],
    /// Framing margin applied after a model loads.
    pub fit_margin: f32,
    /// Framing margin applied when focusing a node from the browser.
    pub focus_margin: f32,
    pub damping_factor: f32,
    pub screen_space_panning: bool,
    pub highlight_intensity: f32,
    pub tint_free: String,
    pub tint_reserved: String,
    pub tint_sold: String,
    pub browser_max_items: usize,
    pub screenshot_name: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            background: "#eeeeee".to_string(),
            fov_deg: 60.0,
            initial_near: 0.01,
            initial_far: 1e7,
            initial_camera: [2.0, 1.2, 2.0],
            fit_margin: 1.3,
            focus_margin: 1.35,
            damping_factor: 0.08,
            screen_space_panning: true,
            highlight_intensity: 0.6,
            tint_free: "#2ecc71".to_string(),
            tint_reserved: "#f1c40f".to_string(),
            tint_sold: "#e74c3c".to_string(),
            browser_max_items: 400,
            screenshot_name: "screenshot.png".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn background_rgb(&self) -> [u8; 3] {
        color_or_default(&self.background, [0xee, 0xee, 0xee])
    }

    pub fn highlight_style(&self) -> HighlightStyle {
        let defaults = HighlightStyle::default();
        let tint = |hex: &str, fallback: [f32; 3]| match parse_hex_color(hex) {
            Some(rgb) => rgb.map(|c| c as f32 / 255.0),
            None => {
                log::warn!("Invalid tint color '{}', using default", hex);
                fallback
            }
        };
        HighlightStyle {
            free: tint(&self.tint_free, defaults.free),
            reserved: tint(&self.tint_reserved, defaults.reserved),
            sold: tint(&self.tint_sold, defaults.sold),
            intensity: self.highlight_intensity.clamp(0.0, 1.0),
        }
    }
}

fn color_or_default(hex: &str, fallback: [u8; 3]) -> [u8; 3] {
    parse_hex_color(hex).unwrap_or_else(|| {
        log::warn!("Invalid color '{}', using default", hex);
        fallback
    })
}

/// `#rrggbb` or `rrggbb`.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json(r##"{"fov_deg": 45.0, "tint_sold": "#000000"}"##).unwrap();
        assert_eq!(config.fov_deg, 45.0);
        assert_eq!(config.fit_margin, 1.3);
        assert_eq!(config.browser_max_items, 400);
        assert_eq!(config.highlight_style().sold, [0.0, 0.0, 0.0]);
        assert_eq!(config.highlight_style().free, HighlightStyle::default().free);
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(parse_hex_color("#eeeeee"), Some([0xee, 0xee, 0xee]));
        assert_eq!(parse_hex_color("2ecc71"), Some([0x2e, 0xcc, 0x71]));
        assert_eq!(parse_hex_color("#eee"), None);
        assert_eq!(parse_hex_color("#gggggg"), None);
    }

    #[test]
    fn test_invalid_colors_fall_back() {
        let config = ViewerConfig {
            background: "white".to_string(),
            tint_free: "green".to_string(),
            ..ViewerConfig::default()
        };
        assert_eq!(config.background_rgb(), [0xee, 0xee, 0xee]);
        assert_eq!(config.highlight_style().free, HighlightStyle::default().free);
    }

    #[test]
    fn test_load_from_file() {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("archviz_config_{}_{}.json", std::process::id(), nonce));
        std::fs::write(&path, r##"{"background": "#101010"}"##).unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.background_rgb(), [0x10, 0x10, 0x10]);

        let _ = std::fs::remove_file(&path);
        assert!(matches!(ViewerConfig::load(&path), Err(ConfigError::Io(_))));
    }
}
