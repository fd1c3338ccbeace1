use std::env;
use std::path::PathBuf;

// Constants
pub const DEFAULT_WORKBOOK: &str = "data/staff_feedback.xlsx";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_STATIC_DIR: &str = "static";

pub const WORKBOOK_VAR: &str = "REPORT_WORKBOOK";
pub const BIND_VAR: &str = "REPORT_BIND";
pub const STATIC_DIR_VAR: &str = "REPORT_STATIC_DIR";

/// Runtime settings for the report binaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Workbook file holding every weekly sheet.
    pub workbook_path: PathBuf,
    /// Address the web server listens on.
    pub bind_addr: String,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workbook_path: PathBuf::from(DEFAULT_WORKBOOK),
            bind_addr: DEFAULT_BIND.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl Config {
    /// Read settings from `REPORT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; blank values fall back to the
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        Config {
            workbook_path: get(WORKBOOK_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.workbook_path),
            bind_addr: get(BIND_VAR).unwrap_or(defaults.bind_addr),
            static_dir: get(STATIC_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        }
    }

    pub fn with_workbook_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.workbook_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.workbook_path, PathBuf::from("data/staff_feedback.xlsx"));
    }

    #[test]
    fn variables_override_defaults() {
        let vars: HashMap<&str, &str> = [
            (WORKBOOK_VAR, "/srv/reports/weekly.xlsx"),
            (BIND_VAR, "0.0.0.0:8080"),
            (STATIC_DIR_VAR, "  "),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.workbook_path, PathBuf::from("/srv/reports/weekly.xlsx"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.static_dir, PathBuf::from(DEFAULT_STATIC_DIR));

        let config = config.with_workbook_path("other.xlsx");
        assert_eq!(config.workbook_path, PathBuf::from("other.xlsx"));
    }
}
