//! Engine settings schema and loader
//!
//! Settings are stored as YAML. Default location:
//! `~/.config/fmrack/midi.yaml`. Everything here is a read-only input to
//! the router; channel assignments arrive separately through
//! `MessageRouter::set_channel`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Read-only inputs consumed by the message router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Trace every incoming message at debug level.
    pub dump_enabled: bool,

    /// Endpoint whose incoming traffic is forwarded verbatim.
    /// Empty string disables Thru.
    pub thru_in: String,

    /// Endpoint that receives the forwarded traffic.
    pub thru_out: String,

    /// Accept Program Change messages (per tone generator and for
    /// performance selection).
    pub program_change_enabled: bool,

    /// Ignore CC 123 (All Notes Off) regardless of channel mode.
    pub ignore_all_notes_off: bool,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            dump_enabled: false,
            thru_in: String::new(),
            thru_out: String::new(),
            program_change_enabled: true,
            ignore_all_notes_off: false,
        }
    }
}

/// Get the default settings file path.
///
/// Returns: `~/.config/fmrack/midi.yaml` (platform equivalent).
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fmrack")
        .join("midi.yaml")
}

/// Load settings from a YAML file.
///
/// If the file doesn't exist, returns defaults. If the file exists but is
/// invalid, logs a warning and returns defaults.
pub fn load_settings(path: &Path) -> MidiSettings {
    if !path.exists() {
        log::info!("MIDI: no settings file at {:?}, using defaults", path);
        return MidiSettings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<MidiSettings>(&contents) {
            Ok(settings) => {
                log::info!("MIDI: settings loaded from {:?}", path);
                settings
            }
            Err(e) => {
                log::warn!("MIDI: failed to parse settings: {}", e);
                MidiSettings::default()
            }
        },
        Err(e) => {
            log::warn!("MIDI: failed to read settings file: {}", e);
            MidiSettings::default()
        }
    }
}

/// Save settings to a YAML file, creating parent directories as needed.
pub fn save_settings(settings: &MidiSettings, path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create settings directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(settings).context("failed to serialize settings")?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write settings file: {:?}", path))?;

    Ok(())
}
