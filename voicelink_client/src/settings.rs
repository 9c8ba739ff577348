use crate::error::SettingsError;
use crate::protocol::ConfigFlag;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub const SETTINGS_RECORD_VERSION: u32 = 1;

/// User toggles persisted with the save game.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub enable_voice_open: bool,
    pub enable_voice_close: bool,
    pub enable_dialogue_select: bool,
    pub enable_voice_shouts: bool,
    pub enable_powers: bool,
    pub mute_shout_voice_line: bool,
    pub enable_weapons: bool,
    pub enable_spells: bool,
    pub enable_potions: bool,
    pub debug: bool,
    pub save_wav_captures: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_voice_open: true,
            enable_voice_close: true,
            enable_dialogue_select: true,
            enable_voice_shouts: true,
            enable_powers: false,
            mute_shout_voice_line: true,
            enable_weapons: false,
            enable_spells: false,
            enable_potions: false,
            debug: false,
            save_wav_captures: false,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SettingsRecord {
    version: u32,
    #[serde(default)]
    settings: Settings,
}

impl Settings {
    pub fn to_record(&self) -> Result<String, SettingsError> {
        let record = SettingsRecord {
            version: SETTINGS_RECORD_VERSION,
            settings: *self,
        };
        Ok(serde_json::to_string(&record)?)
    }

    pub fn from_record(raw: &str) -> Result<Settings, SettingsError> {
        let record: SettingsRecord = serde_json::from_str(raw)?;
        if record.version != SETTINGS_RECORD_VERSION {
            return Err(SettingsError::UnsupportedVersion(record.version));
        }
        Ok(record.settings)
    }

    /// Value the server should mirror for `flag`.
    pub fn config_value(&self, flag: ConfigFlag) -> bool {
        match flag {
            ConfigFlag::Open => self.enable_voice_open,
            ConfigFlag::Close => self.enable_voice_close,
            ConfigFlag::Shouts => self.enable_voice_shouts,
            ConfigFlag::Debug => self.debug,
            ConfigFlag::SaveWav => self.save_wav_captures,
            ConfigFlag::DialogueSelect => self.enable_dialogue_select,
            ConfigFlag::Weapons => self.enable_weapons,
            ConfigFlag::Spells => self.enable_spells,
            ConfigFlag::Powers => self.enable_powers,
            ConfigFlag::Potions => self.enable_potions,
        }
    }

    /// True when a change between `self` and `other` alters what a favorites
    /// scan would collect.
    pub fn favorites_scope_differs(&self, other: &Settings) -> bool {
        self.enable_voice_shouts != other.enable_voice_shouts
            || self.enable_powers != other.enable_powers
            || self.enable_weapons != other.enable_weapons
            || self.enable_spells != other.enable_spells
            || self.enable_potions != other.enable_potions
    }

    pub fn powers_active(&self) -> bool {
        self.enable_voice_shouts && self.enable_powers
    }
}

/// Current settings, readable from any thread.
#[derive(Clone, Default)]
pub struct SettingsCell {
    inner: Arc<Mutex<Settings>>,
}

impl SettingsCell {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn get(&self) -> Settings {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores `next` and returns what it replaced.
    pub fn replace(&self, next: Settings) -> Settings {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip_and_missing_fields_default() {
        let mut s = Settings::default();
        s.enable_spells = true;
        let raw = s.to_record().unwrap();
        assert_eq!(Settings::from_record(&raw).unwrap(), s);

        let partial = r#"{"version":1,"settings":{"debug":true}}"#;
        let loaded = Settings::from_record(partial).unwrap();
        assert!(loaded.debug);
        assert!(loaded.enable_voice_open);
        assert!(!loaded.enable_weapons);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let raw = r#"{"version":7,"settings":{}}"#;
        assert!(matches!(
            Settings::from_record(raw),
            Err(SettingsError::UnsupportedVersion(7))
        ));
        assert!(matches!(
            Settings::from_record("not json"),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn powers_need_shouts() {
        let mut s = Settings::default();
        s.enable_powers = true;
        assert!(s.powers_active());
        s.enable_voice_shouts = false;
        assert!(!s.powers_active());
        assert!(s.config_value(ConfigFlag::Powers));
    }
}
