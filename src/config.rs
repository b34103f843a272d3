use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::error::{ScoutError, ScoutResult};
use crate::form::InputMode;
use crate::timer::TimerConfig;

/// Where submissions for this device go
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetConfig {
    pub spreadsheet_id: String,
    pub sheet_id: String,
}

impl SpreadsheetConfig {
    /// Accepts a bare spreadsheet id or a full sheets URL
    pub fn new(spreadsheet: &str, sheet_id: &str) -> ScoutResult<Self> {
        let spreadsheet_id = extract_spreadsheet_id(spreadsheet);
        let sheet_id = sheet_id.trim().to_string();
        if spreadsheet_id.is_empty() {
            return Err(ScoutError::Config("Spreadsheet ID is required".into()));
        }
        if sheet_id.is_empty() {
            return Err(ScoutError::Config("Sheet ID is required".into()));
        }
        Ok(Self {
            spreadsheet_id,
            sheet_id,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub spreadsheet: Option<SpreadsheetConfig>,
    pub teams: BTreeMap<String, String>,
    pub timer: TimerConfig,
    pub input_mode: InputMode,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Merge an imported team map over the current one; returns how many
    /// entries were imported.
    pub fn merge_teams(&mut self, teams: BTreeMap<String, String>) -> usize {
        let count = teams.len();
        self.teams.extend(teams);
        count
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(AppDirs::submissions_dir)
    }
}

/// Name for a team number in an imported team map. Keys are the trimmed
/// decimal team number.
pub fn team_name_for(teams: &BTreeMap<String, String>, team_number: i64) -> Option<&str> {
    teams.get(&team_number.to_string()).map(String::as_str)
}

/// Pull the id out of a `.../spreadsheets/d/<id>/...` URL. Anything that
/// does not look like a URL is taken as the id itself.
pub fn extract_spreadsheet_id(input: &str) -> String {
    if !(input.contains('/') || input.contains(':')) {
        return input.trim().to_string();
    }

    const MARKER: &str = "/spreadsheets/d/";
    if let Some(start) = input.find(MARKER) {
        let id: String = input[start + MARKER.len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if !id.is_empty() {
            return id;
        }
    }

    input.trim().to_string()
}

/// Parse a team-number → team-name JSON object. Non-string values and
/// blank keys are skipped.
pub fn parse_team_map(json: &str) -> ScoutResult<BTreeMap<String, String>> {
    let parsed: serde_json::Value = serde_json::from_str(json)?;
    let object = parsed
        .as_object()
        .ok_or_else(|| ScoutError::Config("Invalid JSON shape".into()))?;

    let teams: BTreeMap<String, String> = object
        .iter()
        .filter_map(|(key, value)| {
            let name = value.as_str()?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), name.trim().to_string()))
        })
        .collect();

    if teams.is_empty() {
        return Err(ScoutError::Config("No team names found".into()));
    }
    Ok(teams)
}

pub fn load_team_map(path: &Path) -> ScoutResult<BTreeMap<String, String>> {
    let contents = fs::read_to_string(path)?;
    parse_team_map(&contents)
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> ScoutResult<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => {
                debug!(path = %self.path.display(), "no config file, using defaults");
                return Config::default();
            }
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable config, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> ScoutResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let mut cfg = Config {
            spreadsheet: Some(SpreadsheetConfig::new("abc123", "Sheet1").unwrap()),
            input_mode: InputMode::Field,
            output_dir: Some(dir.path().join("out")),
            ..Default::default()
        };
        cfg.timer.tick_interval_ms = 250;
        cfg.teams.insert("1234".into(), "Robo Rangers".into());

        store.save(&cfg).unwrap();

        assert_eq!(cfg, store.load());
    }

    #[test]
    fn missing_or_corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"timer":{"total_secs":90.0}}"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();

        assert_eq!(cfg.timer.total_secs, 90.0);
        assert_eq!(cfg.timer.pause_threshold_secs, 120.0);
        assert!(cfg.spreadsheet.is_none());
    }

    #[test]
    fn extracts_id_from_sheets_url() {
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/1AbC-d_E/edit#gid=0"),
            "1AbC-d_E"
        );
        assert_eq!(extract_spreadsheet_id("  raw-id  "), "raw-id");
        assert_eq!(
            extract_spreadsheet_id("https://example.com/other"),
            "https://example.com/other"
        );
    }

    #[test]
    fn spreadsheet_config_requires_ids() {
        assert_matches!(SpreadsheetConfig::new("", "Sheet1"), Err(ScoutError::Config(_)));
        assert_matches!(SpreadsheetConfig::new("abc", "  "), Err(ScoutError::Config(_)));
    }

    #[test]
    fn parses_team_map_skipping_bad_entries() {
        let teams =
            parse_team_map(r#"{" 1234 ": " Robo Rangers ", "": "blank", "99": 5}"#).unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams["1234"], "Robo Rangers");
    }

    #[test]
    fn rejects_bad_team_maps() {
        assert_matches!(
            parse_team_map("[1, 2]"),
            Err(ScoutError::Config(msg)) if msg == "Invalid JSON shape"
        );
        assert_matches!(
            parse_team_map(r#"{"1": 2}"#),
            Err(ScoutError::Config(msg)) if msg == "No team names found"
        );
        assert_matches!(parse_team_map("nope"), Err(ScoutError::Json(_)));
    }

    #[test]
    fn team_lookup_and_merge() {
        let mut cfg = Config::default();
        cfg.teams.insert("1".into(), "Old".into());
        let mut incoming = BTreeMap::new();
        incoming.insert("1".into(), "New".into());
        incoming.insert("2".into(), "Two".into());

        assert_eq!(cfg.merge_teams(incoming), 2);
        assert_eq!(team_name_for(&cfg.teams, 1), Some("New"));
        assert_eq!(team_name_for(&cfg.teams, 2), Some("Two"));
        assert_eq!(team_name_for(&cfg.teams, 3), None);
    }
}
