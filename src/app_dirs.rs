use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "matchscout")
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("matchscout_config.json"))
    }

    /// Default root for locally written submission sheets
    pub fn submissions_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("matchscout")
                .join("sheets")
        } else {
            ProjectDirs::from("", "", "matchscout")
                .map(|pd| pd.data_local_dir().join("sheets"))
                .unwrap_or_else(|| PathBuf::from("matchscout_sheets"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_namespaced() {
        assert!(AppDirs::config_path().ends_with("config.json"));
        assert!(AppDirs::submissions_dir().ends_with("sheets"));
    }
}
