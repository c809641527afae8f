// Subsystem settings, persisted as JSON

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PadError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PadSettings {
    /// Backend to try first; the rest of [`crate::driver::DRIVER_IDENTS`]
    /// serves as fallback.
    #[serde(default = "default_driver")]
    pub joypad_driver: String,
    /// Fraction of full scale past which an axis counts as a pressed
    /// digital input.
    #[serde(default = "default_axis_threshold")]
    pub axis_threshold: f32,
    /// Where autoconfig profiles live, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoconf_dir: Option<PathBuf>,
}

fn default_driver() -> String {
    "udev".to_string()
}

fn default_axis_threshold() -> f32 {
    0.5
}

impl Default for PadSettings {
    fn default() -> Self {
        PadSettings {
            joypad_driver: default_driver(),
            axis_threshold: default_axis_threshold(),
            autoconf_dir: None,
        }
    }
}

/// Load settings, falling back to defaults if the file is missing or does
/// not parse.
pub fn load_settings(path: &Path) -> PadSettings {
    if let Ok(file) = File::open(path) {
        if let Ok(settings) = serde_json::from_reader::<_, PadSettings>(BufReader::new(file)) {
            return settings;
        }
    }
    PadSettings::default()
}

pub fn save_settings(path: &Path, settings: &PadSettings) -> Result<(), PadError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, settings)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: PadSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, PadSettings::default());
        assert_eq!(settings.joypad_driver, "udev");
        assert!((settings.axis_threshold - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn settings_survive_a_json_round_trip() {
        let settings = PadSettings {
            joypad_driver: "sdl".to_string(),
            axis_threshold: 0.25,
            autoconf_dir: Some(PathBuf::from("/tmp/autoconf")),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: PadSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn unparseable_file_yields_defaults() {
        let settings = load_settings(Path::new("/nonexistent/padbus-settings.json"));
        assert_eq!(settings, PadSettings::default());
    }
}
