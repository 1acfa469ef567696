//! Runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into
//! [`crate::engine::ChartManager`]. Nothing in this crate reads environment
//! variables while handling a request; the host reads them and hands the raw
//! values to the `*_from_env_value` helpers.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::ValidationError;

/// Environment variable holding the SQLite database path.
pub const DATABASE_PATH_ENV: &str = "ODONTOGRAM_DB_PATH";

/// Environment variable holding the active-version policy.
pub const ACTIVE_POLICY_ENV: &str = "ODONTOGRAM_ACTIVE_POLICY";

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "odontograms.db";

/// What happens to older active versions when a new version is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivePolicy {
    /// Older versions stay active until archived explicitly. The current
    /// chart is the highest active version.
    #[default]
    AllowConcurrent,
    /// Creating a version archives every other active version of that
    /// patient in the same transaction.
    SingleActive,
}

impl ActivePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivePolicy::AllowConcurrent => "allow-concurrent",
            ActivePolicy::SingleActive => "single-active",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow-concurrent" | "concurrent" => Ok(ActivePolicy::AllowConcurrent),
            "single-active" | "single" => Ok(ActivePolicy::SingleActive),
            other => Err(ValidationError(format!("Unknown active policy: {}", other))),
        }
    }
}

impl fmt::Display for ActivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ChartConfig {
    database_path: PathBuf,
    active_policy: ActivePolicy,
}

impl ChartConfig {
    pub fn new(database_path: PathBuf, active_policy: ActivePolicy) -> Result<Self, ValidationError> {
        if database_path.as_os_str().is_empty() {
            return Err(ValidationError("database path cannot be empty".into()));
        }
        Ok(Self {
            database_path,
            active_policy,
        })
    }

    /// Build from raw (possibly unset) environment values.
    pub fn from_env_values(
        database_path: Option<String>,
        active_policy: Option<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            database_path_from_env_value(database_path),
            active_policy_from_env_value(active_policy)?,
        )
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn active_policy(&self) -> ActivePolicy {
        self.active_policy
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            active_policy: ActivePolicy::default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the database path. Unset or blank falls back to the default.
pub fn database_path_from_env_value(value: Option<String>) -> PathBuf {
    non_empty(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
}

/// Parse the active policy. Unset or blank means [`ActivePolicy::AllowConcurrent`].
pub fn active_policy_from_env_value(value: Option<String>) -> Result<ActivePolicy, ValidationError> {
    non_empty(value)
        .map(|v| ActivePolicy::parse(&v))
        .transpose()
        .map(Option::unwrap_or_default)
}
