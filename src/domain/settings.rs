use crate::domain::errors::ConfigError;
use crate::domain::models::PeripheralRecord;
use crate::domain::registry::PeripheralRegistry;
use crate::domain::stages::StageSequence;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "stage_tracker".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// How an order id is read out of a scanner payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderIdFormat {
    /// The whole trimmed payload is the order id
    #[default]
    WholePayload,
    /// Everything before the first `-`, for labels like `1042-XL-BLUE`
    PrefixBeforeDash,
}

impl OrderIdFormat {
    /// Returns `None` when the payload carries no usable order id.
    pub fn extract<'a>(&self, payload: &'a str) -> Option<&'a str> {
        let order_id = match self {
            Self::WholePayload => payload,
            Self::PrefixBeforeDash => payload.split('-').next().unwrap_or(payload),
        }
        .trim();
        (!order_id.is_empty()).then_some(order_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_peripherals")]
    pub peripherals: Vec<PeripheralRecord>,
    #[serde(default = "default_stage_sequence")]
    pub stage_sequence: Vec<String>,

    // Radio Settings
    #[serde(default = "default_data_uuid")]
    pub data_characteristic_uuid: String,
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
    #[serde(default = "default_collect_window_secs")]
    pub collect_window_secs: u64,

    // Aggregation Settings
    #[serde(default)]
    pub order_id_format: OrderIdFormat,
    #[serde(default = "default_fold_conflict_retries")]
    pub fold_conflict_retries: u32,
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            peripherals: default_peripherals(),
            stage_sequence: default_stage_sequence(),
            data_characteristic_uuid: default_data_uuid(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            collect_window_secs: default_collect_window_secs(),
            order_id_format: OrderIdFormat::default(),
            fold_conflict_retries: default_fold_conflict_retries(),
            store_path: None,
            log_settings: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn collect_window(&self) -> Duration {
        Duration::from_secs(self.collect_window_secs)
    }

    pub fn build_stage_sequence(&self) -> Result<StageSequence, ConfigError> {
        StageSequence::new(self.stage_sequence.iter().cloned())
    }

    pub fn build_registry(&self, stages: &StageSequence) -> Result<PeripheralRegistry, ConfigError> {
        PeripheralRegistry::new(self.peripherals.iter().cloned(), stages)
    }

    /// Configured store location, or `order_logs.json` in the data directory.
    pub fn resolved_store_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let mut path = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        path.push("StageTracker");
        path.push("order_logs.json");
        Ok(path)
    }
}

fn peripheral(identity: &str, name: &str, stage: &str, operator: &str) -> PeripheralRecord {
    PeripheralRecord {
        identity: identity.to_string(),
        display_name: name.to_string(),
        assigned_stage: stage.to_string(),
        assigned_operator: operator.to_string(),
    }
}

fn default_peripherals() -> Vec<PeripheralRecord> {
    vec![
        peripheral("AA:FC:8C:18:12:33", "Scanner 1", "Checking", "Alpa"),
        peripheral("AA:FC:8D:4C:11:35", "Scanner 2", "Sewing_1", "Asgar"),
        peripheral("AA:FC:8E:56:11:35", "Scanner 3", "Tailoring", "Jatin"),
        peripheral("AA:FC:4B:5A:10:35", "Scanner 4", "Ironing", "Ramesh"),
        peripheral("AA:FC:4A:1C:10:35", "Scanner 5", "Sewing_2", "Zakhir"),
        peripheral("AA:FC:65:5B:11:35", "Scanner 6", "Sewing_3", "Sharif"),
    ]
}
fn default_stage_sequence() -> Vec<String> {
    [
        "Tailoring",
        "Sewing_1",
        "Sewing_2",
        "Sewing_3",
        "Checking",
        "Ironing",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_data_uuid() -> String {
    "00002aa1-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_discovery_timeout_secs() -> u64 {
    10
}
fn default_collect_window_secs() -> u64 {
    10
}
fn default_fold_conflict_retries() -> u32 {
    crate::domain::aggregation::DEFAULT_CONFLICT_RETRIES
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Loads `path`, falling back to defaults when it is missing or unreadable.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let settings_path = path.into();
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}: {})",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("StageTracker");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_describe_a_valid_line() {
        let settings = Settings::default();
        let stages = settings.build_stage_sequence().unwrap();
        let registry = settings.build_registry(&stages).unwrap();

        assert_eq!(registry.len(), 6);
        assert_eq!(registry.lookup("AA:FC:4A:1C:10:35").stage(), "Sewing_2");
        assert_eq!(settings.collect_window(), Duration::from_secs(10));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "collect_window_secs": 60, "order_id_format": "prefix_before_dash" }"#,
        )
        .unwrap();

        let service = SettingsService::from_path(&path);
        let settings = service.get();
        assert_eq!(settings.collect_window_secs, 60);
        assert_eq!(settings.order_id_format, OrderIdFormat::PrefixBeforeDash);
        assert_eq!(settings.discovery_timeout_secs, 10);
        assert_eq!(settings.stage_sequence.len(), 6);
    }

    #[test]
    fn save_then_reload_round_trips() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("settings.json");

        let mut service = SettingsService::from_path(&path);
        service.get_mut().discovery_timeout_secs = 3;
        service.save().unwrap();

        let reloaded = SettingsService::from_path(&path);
        assert_eq!(reloaded.get().discovery_timeout_secs, 3);
    }

    #[test]
    fn order_id_formats() {
        assert_eq!(OrderIdFormat::WholePayload.extract("1042-XL"), Some("1042-XL"));
        assert_eq!(OrderIdFormat::PrefixBeforeDash.extract("1042-XL"), Some("1042"));
        assert_eq!(OrderIdFormat::PrefixBeforeDash.extract("1042"), Some("1042"));
        assert_eq!(OrderIdFormat::PrefixBeforeDash.extract("1042 -M"), Some("1042"));
    }

    #[test]
    fn blank_order_ids_are_rejected() {
        assert_eq!(OrderIdFormat::PrefixBeforeDash.extract("-XL-BLUE"), None);
        assert_eq!(OrderIdFormat::PrefixBeforeDash.extract(" -M"), None);
        assert_eq!(OrderIdFormat::WholePayload.extract("   "), None);
    }
}
