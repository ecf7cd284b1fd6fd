use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow};

use crate::preprocess;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite://database/users.db";
const DEFAULT_MODEL_PATH: &str = "model/model.onnx";
const DEFAULT_MODEL_INPUT_WIDTH: usize = 768;
const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
const DEFAULT_MAX_UPLOAD_MB: usize = 16;

/// Process-wide settings resolved once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub model_path: PathBuf,
    pub model_input_width: usize,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// defaults for absent or blank keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let port: u16 = parse_or(value("PORT"), "PORT", DEFAULT_PORT)?;
        let model_input_width: usize = parse_or(
            value("MODEL_INPUT_WIDTH"),
            "MODEL_INPUT_WIDTH",
            DEFAULT_MODEL_INPUT_WIDTH,
        )?;
        preprocess::validate_row_width(model_input_width)
            .context("MODEL_INPUT_WIDTH is incompatible with the image preprocessor")?;

        let max_upload_mb: usize =
            parse_or(value("MAX_UPLOAD_MB"), "MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?;
        if max_upload_mb == 0 {
            return Err(anyhow!("MAX_UPLOAD_MB must be greater than 0"));
        }
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow!("MAX_UPLOAD_MB is too large: {max_upload_mb}"))?;

        Ok(Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            database_url: value("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            model_path: value("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            model_input_width,
            upload_dir: value("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_upload_bytes,
        })
    }

    /// On-disk path of the SQLite database, or `None` for in-memory URLs.
    pub fn database_file(&self) -> Option<PathBuf> {
        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or_default();
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.model_path, PathBuf::from("model/model.onnx"));
        assert_eq!(config.model_input_width, 768);
        assert_eq!(config.upload_dir, PathBuf::from("static/uploads"));
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn overrides_are_read() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("MODEL_INPUT_WIDTH", "336"),
            ("UPLOAD_DIR", " /tmp/uploads "),
            ("MAX_UPLOAD_MB", "2"),
        ]))
        .expect("config");

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.model_input_width, 336);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("PORT", "  ")])).expect("config");
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn database_file_is_derived_from_the_url() {
        let file = AppConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(file.database_file(), Some(PathBuf::from("database/users.db")));

        let memory =
            AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite::memory:")]))
                .expect("config");
        assert_eq!(memory.database_file(), None);

        let with_params = AppConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "sqlite:data/app.db?mode=rwc",
        )]))
        .expect("config");
        assert_eq!(with_params.database_file(), Some(PathBuf::from("data/app.db")));
    }

    #[test]
    fn rejects_unparseable_port() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn rejects_width_that_does_not_divide_the_image() {
        assert!(AppConfig::from_lookup(lookup_from(&[("MODEL_INPUT_WIDTH", "1000")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("MODEL_INPUT_WIDTH", "0")])).is_err());
    }

    #[test]
    fn rejects_zero_upload_limit() {
        assert!(AppConfig::from_lookup(lookup_from(&[("MAX_UPLOAD_MB", "0")])).is_err());
    }

    #[test]
    fn rejects_upload_limit_that_overflows() {
        let max = usize::MAX.to_string();
        let err = AppConfig::from_lookup(lookup_from(&[("MAX_UPLOAD_MB", max.as_str())]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_MB"));
    }
}
