use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReportError;

pub const DEFAULT_CONFIG_PATH: &str = "productivity.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub query: QuerySettings,
    pub report: ReportSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    /// `HOST`, `HOST,PORT` or `HOST\INSTANCE`.
    pub server: Option<String>,
    pub database: Option<String>,
    pub trust_server_certificate: bool,
    pub application_name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            server: None,
            database: None,
            trust_server_certificate: true,
            application_name: "productivity-report".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QuerySettings {
    pub department_ids: Vec<String>,
    pub excluded_provider_ids: Vec<String>,
    pub excluded_cancel_reason: Option<String>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            department_ids: [
                "246001002",
                "246002001",
                "246003002",
                "246004002",
                "246006002",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excluded_provider_ids: vec!["246206".to_string()],
            excluded_cancel_reason: Some("4".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSettings {
    pub title: String,
    pub output: PathBuf,
    pub percent_summary: PercentSummary,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "BEHAVIORAL HEALTH: MONTHLY SUMMARY OF DAILY PRODUCTIVITY TRACKING".to_string(),
            output: PathBuf::from("test.xlsx"),
            percent_summary: PercentSummary::default(),
        }
    }
}

/// How a location's summary percentages are derived from its rows.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PercentSummary {
    /// Arithmetic mean of each provider's percentage.
    #[default]
    RowMean,
    /// Summed events over summed scheduled appointments.
    Pooled,
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub database: Option<String>,
    pub output: Option<PathBuf>,
    pub percent_summary: Option<PercentSummary>,
}

impl Settings {
    /// Reads `path` when given, otherwise `productivity.toml` if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ReportError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReportError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ReportError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(server) = overrides.server {
            self.database.server = Some(server);
        }
        if let Some(database) = overrides.database {
            self.database.database = Some(database);
        }
        if let Some(output) = overrides.output {
            self.report.output = output;
        }
        if let Some(mode) = overrides.percent_summary {
            self.report.percent_summary = mode;
        }
    }

    /// Checks what the query needs; connection targets are checked by
    /// [`Settings::connection_target`].
    pub fn validate_query(&self) -> Result<(), ReportError> {
        if self.query.department_ids.is_empty() {
            return Err(ReportError::Config(
                "query.department_ids must list at least one department".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connection_target(&self) -> Result<(&str, &str), ReportError> {
        let server = non_blank(self.database.server.as_deref()).ok_or_else(|| {
            ReportError::Config(
                "database server is not set (use --server or PRODUCTIVITY_SERVER)".to_string(),
            )
        })?;
        let database = non_blank(self.database.database.as_deref()).ok_or_else(|| {
            ReportError::Config(
                "database name is not set (use --database or PRODUCTIVITY_DATABASE)".to_string(),
            )
        })?;
        Ok((server, database))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
