//! scalegrid.toml configuration.
//!
//! ```toml
//! [scaler]
//! max_scale = 10
//!
//! [scaler.timeouts]
//! create = 300
//!
//! [admin]
//! program = "asadmin"
//! args = ["--user", "admin"]
//!
//! [aws]
//! profile = "ops"
//! api_call_timeout_secs = 120
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scalegrid_admin::{AdminCliConfig, AwsCliConfig};
use scalegrid_scaler::ScalerSettings;

/// Environment variable overriding `scaler.max_scale`.
pub const MAX_SCALE_ENV: &str = "SCALEGRID_MAX_SCALE";

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "scalegrid.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scaler: ScalerSettings,
    pub admin: AdminCliConfig,
    pub aws: AwsCliConfig,
}

impl Settings {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load an explicit config file, or `scalegrid.toml` if present, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_env(std::env::var(MAX_SCALE_ENV).ok().as_deref());
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    /// Apply the value of [`MAX_SCALE_ENV`], if set. An unparsable value is
    /// ignored with a warning.
    pub fn apply_env(&mut self, max_scale: Option<&str>) {
        let Some(raw) = max_scale else {
            return;
        };
        match raw.trim().parse::<i64>() {
            Ok(value) => self.scaler.max_scale = value,
            Err(e) => warn!(value = raw, error = %e, "ignoring {MAX_SCALE_ENV}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_all_sections() {
        let settings: Settings = toml::from_str(
            r#"
[scaler]
max_scale = 3

[scaler.timeouts]
create = 30

[admin]
program = "/opt/payara/bin/asadmin"
args = ["--port", "4848"]

[aws]
profile = "ops"
"#,
        )
        .unwrap();

        assert_eq!(settings.scaler.max_scale, 3);
        assert_eq!(settings.scaler.timeouts.create, Duration::from_secs(30));
        assert_eq!(settings.admin.program, "/opt/payara/bin/asadmin");
        assert_eq!(settings.admin.args, vec!["--port", "4848"]);
        assert_eq!(settings.aws.profile.as_deref(), Some("ops"));
        assert_eq!(settings.aws.program, "aws");
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn env_overrides_max_scale() {
        let mut settings = Settings::default();
        settings.apply_env(Some("25"));
        assert_eq!(settings.scaler.max_scale, 25);

        settings.apply_env(Some("lots"));
        assert_eq!(settings.scaler.max_scale, 25);

        settings.apply_env(None);
        assert_eq!(settings.scaler.max_scale, 25);
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalegrid.toml");
        std::fs::write(&path, "[scaler]\nmax_scale = 7\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.scaler.max_scale, 7);

        let err = Settings::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
