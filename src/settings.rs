use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::analysis::AnalysisConfig;
use crate::climb::DetectionConfig;
use crate::tips::TipBook;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbSettings {
    pub detection: DetectionConfig,
    pub analysis: AnalysisConfig,
    /// Per-label replacements for the built-in tips.
    pub tip_overrides: TipBook,
    pub climber_name: Option<String>,
}

impl Default for ClimbSettings {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            analysis: AnalysisConfig::default(),
            tip_overrides: TipBook::empty(),
            climber_name: None,
        }
    }
}

impl ClimbSettings {
    /// Built-in tips with the overrides applied.
    pub fn tip_book(&self) -> TipBook {
        TipBook::default().merged(&self.tip_overrides)
    }
}

/// `settings.json` backed store. A missing or unreadable file yields the defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClimbSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings at {}: {err}",
                    path.display()
                );
                ClimbSettings::default()
            })
        } else {
            ClimbSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> ClimbSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remember the climber credited with new attempts.
    pub fn set_climber_name(&self, name: Option<String>) -> Result<()> {
        self.modify(|settings| settings.climber_name = name)
    }

    fn modify(&self, change: impl FnOnce(&mut ClimbSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &ClimbSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::analysis::pressure;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("climb-settings-{}", Uuid::new_v4()))
            .join("settings.json")
    }

    #[test]
    fn missing_file_gives_defaults() {
        let store = SettingsStore::new(temp_path()).unwrap();
        assert_eq!(store.settings(), ClimbSettings::default());
        assert_eq!(store.settings().detection.debounce_ms, 2_000);
    }

    #[test]
    fn climber_name_persists_across_reopen() {
        let path = temp_path();
        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_climber_name(Some("Jules".to_string())).unwrap();

        let reopened = SettingsStore::new(path.clone()).unwrap().settings();
        assert_eq!(reopened.climber_name.as_deref(), Some("Jules"));
        assert_eq!(reopened.detection, DetectionConfig::default());

        store.set_climber_name(None).unwrap();
        let cleared = SettingsStore::new(path.clone()).unwrap().settings();
        assert_eq!(cleared.climber_name, None);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"detection": {"debounce_ms": 500}, "analysis": {"weights": {"pressure": 0.5}}}"#)
            .unwrap();

        let settings = SettingsStore::new(path.clone()).unwrap().settings();
        assert_eq!(settings.detection.debounce_ms, 500);
        assert_eq!(settings.detection.position_buffer, 0.05);
        assert_eq!(settings.analysis.weights.pressure, 0.5);
        assert_eq!(settings.analysis.weights.positioning, 0.4);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn tip_overrides_replace_builtin_tips() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            format!(r#"{{"tip_overrides": {{"{}": ["Feet first."]}}}}"#, pressure::EFFICIENCY),
        )
        .unwrap();

        let settings = SettingsStore::new(path.clone()).unwrap().settings();
        assert_eq!(
            settings.tip_book().tips_for(pressure::EFFICIENCY),
            ["Feet first.".to_string()]
        );

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.settings(), ClimbSettings::default());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
