use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::logging::LogConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:13331".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Archives are fully buffered before parsing, so this bounds memory per upload.
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_archive_bytes: default_max_archive_bytes(),
        }
    }
}

fn default_max_archive_bytes() -> u64 {
    256 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SearchConfig {
    /// Clamp applied by the HTTP layer. The engine itself returns every match.
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl Config {
    /// Configuration with defaults for everything but the database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            server: ServerConfig::default(),
            upload: UploadConfig::default(),
            search: SearchConfig::default(),
            log: LogConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.upload.max_archive_bytes == 0 {
        anyhow::bail!("upload.max_archive_bytes must be > 0");
    }

    if config.search.max_results == Some(0) {
        anyhow::bail!("search.max_results must be >= 1 when set");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let file = write_config("[db]\npath = \"/tmp/tweets.sqlite\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.db.path, PathBuf::from("/tmp/tweets.sqlite"));
        assert_eq!(config.server.bind, "127.0.0.1:13331");
        assert_eq!(config.upload.max_archive_bytes, 256 * 1024 * 1024);
        assert_eq!(config.search.max_results, None);
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn full_config_parses() {
        let file = write_config(
            r#"
[db]
path = "data/t.sqlite"

[server]
bind = "0.0.0.0:8080"

[upload]
max_archive_bytes = 1024

[search]
max_results = 50

[log]
level = "debug"
format = "json"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.upload.max_archive_bytes, 1024);
        assert_eq!(config.search.max_results, Some(50));
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn missing_db_section_is_rejected() {
        let file = write_config("[server]\nbind = \"127.0.0.1:1\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn zero_upload_limit_is_rejected() {
        let file = write_config("[db]\npath = \"x\"\n[upload]\nmax_archive_bytes = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_archive_bytes"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/tweetarchive.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
