// src/eye_tracking/settings.rs
use crate::eye_tracking::error::{GazeError, GazeResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Dwell and mapping policy. Every field can be overridden from the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeSettings {
    /// How long gaze must stay on one target before it activates.
    pub dwell_threshold_ms: u64,
    /// Sampling period of the tracking loop. Shorter periods give a smoother
    /// cursor at the cost of more detector calls.
    pub tick_period_ms: u64,
    /// Maximum distance from a target's center for it to count as gazed at.
    /// Divided by the device pixel ratio at resolve time.
    pub hit_tolerance_radius_px: f64,
    /// Expansion applied around the frame center so small eye movements
    /// cover the whole screen.
    pub sensitivity_factor: f64,
}

impl Default for GazeSettings {
    fn default() -> Self {
        Self {
            dwell_threshold_ms: 2000,
            tick_period_ms: 100,
            hit_tolerance_radius_px: 150.0,
            sensitivity_factor: 2.5,
        }
    }
}

impl GazeSettings {
    pub fn dwell_threshold(&self) -> Duration {
        Duration::from_millis(self.dwell_threshold_ms)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn validate(&self) -> GazeResult<()> {
        if self.dwell_threshold_ms == 0 {
            return Err(GazeError::InvalidSettings("dwell_threshold_ms must be greater than 0".to_string()));
        }
        if self.tick_period_ms == 0 {
            return Err(GazeError::InvalidSettings("tick_period_ms must be greater than 0".to_string()));
        }
        if !self.hit_tolerance_radius_px.is_finite() || self.hit_tolerance_radius_px <= 0.0 {
            return Err(GazeError::InvalidSettings(format!(
                "hit_tolerance_radius_px must be a positive number, got {}",
                self.hit_tolerance_radius_px
            )));
        }
        if !self.sensitivity_factor.is_finite() || self.sensitivity_factor <= 0.0 {
            return Err(GazeError::InvalidSettings(format!(
                "sensitivity_factor must be a positive number, got {}",
                self.sensitivity_factor
            )));
        }
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> GazeResult<Self> {
        let json = fs::read_to_string(path)?;
        let settings: GazeSettings = serde_json::from_str(&json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_path(&self, path: &Path) -> GazeResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn get_settings_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    let app_dir = config_dir.join("caresight");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("gaze_settings.json"))
}

pub fn save_gaze_settings(settings: &GazeSettings) -> anyhow::Result<()> {
    let settings_path = get_settings_path()?;
    settings.save_to_path(&settings_path)?;
    log::info!("💾 Gaze settings saved to {}", settings_path.display());
    Ok(())
}

/// Loads the user's settings file. `Ok(None)` means no file has been saved yet.
pub fn load_gaze_settings() -> anyhow::Result<Option<GazeSettings>> {
    let settings_path = get_settings_path()?;

    if !settings_path.exists() {
        return Ok(None);
    }

    let settings = GazeSettings::load_from_path(&settings_path)?;
    log::info!("📂 Gaze settings loaded from {}", settings_path.display());
    Ok(Some(settings))
}
