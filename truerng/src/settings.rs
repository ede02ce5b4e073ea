use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::source::ApiKey;

pub const MAX_CACHED_RANGE: (u32, u32) = (5, 200);
pub const UPDATE_POINT_RANGE: (u32, u32) = (1, 100);

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: ApiKey,
    /// Values requested per refill.
    pub max_cached: u32,
    /// Refill once the buffer drops below this percentage of `max_cached`.
    pub update_point: u32,
    pub enabled: bool,
    pub debug: bool,
    pub show_toggle: bool,
    pub show_seeds: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            max_cached: 10,
            update_point: 50,
            enabled: true,
            debug: true,
            show_toggle: true,
            show_seeds: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    ApiKey(ApiKey),
    MaxCached(u32),
    UpdatePoint(u32),
    Enabled(bool),
    Debug(bool),
    ShowToggle(bool),
    ShowSeeds(bool),
}

fn check_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<(), SettingsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let settings: Settings = serde_json::from_reader(reader)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("max_cached", self.max_cached, MAX_CACHED_RANGE)?;
        check_range("update_point", self.update_point, UPDATE_POINT_RANGE)?;
        Ok(())
    }

    /// The update point as a fraction of capacity.
    pub fn refill_threshold(&self) -> f64 {
        f64::from(self.update_point) * 0.01
    }

    pub fn apply(&mut self, change: &SettingChange) -> Result<(), SettingsError> {
        match change {
            SettingChange::ApiKey(key) => self.api_key = key.clone(),
            SettingChange::MaxCached(n) => {
                check_range("max_cached", *n, MAX_CACHED_RANGE)?;
                self.max_cached = *n;
            }
            SettingChange::UpdatePoint(p) => {
                check_range("update_point", *p, UPDATE_POINT_RANGE)?;
                self.update_point = *p;
            }
            SettingChange::Enabled(v) => self.enabled = *v,
            SettingChange::Debug(v) => self.debug = *v,
            SettingChange::ShowToggle(v) => self.show_toggle = *v,
            SettingChange::ShowSeeds(v) => self.show_seeds = *v,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_cached, 10);
        assert_eq!(settings.refill_threshold(), 0.5);
        assert!(settings.enabled);
        assert!(!settings.show_seeds);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_apply_enforces_bounds() {
        let mut settings = Settings::default();
        assert!(settings.apply(&SettingChange::MaxCached(4)).is_err());
        assert!(settings.apply(&SettingChange::MaxCached(201)).is_err());
        assert!(settings.apply(&SettingChange::UpdatePoint(0)).is_err());
        assert_eq!(settings.max_cached, 10);

        settings.apply(&SettingChange::MaxCached(200)).unwrap();
        settings.apply(&SettingChange::UpdatePoint(25)).unwrap();
        assert_eq!(settings.max_cached, 200);
        assert_eq!(settings.refill_threshold(), 0.25);
    }

    #[test]
    fn test_round_trip_through_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load(&path)?, Settings::default());

        let settings = Settings {
            api_key: ApiKey::new("k"),
            max_cached: 50,
            show_seeds: true,
            ..Default::default()
        };
        settings.save(&path)?;
        assert_eq!(Settings::load(&path)?, settings);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"update_point": 80}"#)?;
        let settings = Settings::load(&path)?;
        assert_eq!(settings.update_point, 80);
        assert_eq!(settings.max_cached, 10);

        std::fs::write(&path, r#"{"max_cached": 1000}"#)?;
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::OutOfRange { field: "max_cached", .. })
        ));
        Ok(())
    }
}
