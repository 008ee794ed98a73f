// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use movefinder_app::{FormDefinition, FormKind, SystemClock};
use movefinder_client::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT, RetryPolicy};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::UtcOffset;
use time::macros::format_description;

const CONFIG_VERSION: i64 = 1;
const CONFIG_PATH_ENV: &str = "MOVEFINDER_CONFIG_PATH";
const DEFAULT_ENDPOINT: &str = "https://austinmovefinder.com/api/leads";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub submission: Submission,
    #[serde(default)]
    pub form: Form,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            submission: Submission::default(),
            form: Form::default(),
            logging: Logging::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub endpoint: Option<String>,
    pub timeout: Option<String>,
    pub max_attempts: Option<i64>,
    pub base_delay: Option<String>,
}

impl Default for Submission {
    fn default() -> Self {
        Self {
            endpoint: Some(DEFAULT_ENDPOINT.to_owned()),
            timeout: Some("10s".to_owned()),
            max_attempts: Some(i64::from(DEFAULT_MAX_ATTEMPTS)),
            base_delay: Some("1s".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Form {
    pub kind: Option<String>,
    pub utc_offset: Option<String>,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            kind: Some(FormKind::Quote.as_str().to_owned()),
            utc_offset: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Logging {
    pub file: Option<String>,
    pub filter: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(movefinder_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [storage], [submission], [form], and [logging]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            movefinder_db::validate_db_path(db_path)?;
        }

        let endpoint = self.endpoint();
        if endpoint.trim().is_empty() {
            bail!("submission.endpoint in {} must not be empty", path.display());
        }

        if let Some(attempts) = self.submission.max_attempts
            && !(1..=10).contains(&attempts)
        {
            bail!(
                "submission.max_attempts in {} must be between 1 and 10, got {}",
                path.display(),
                attempts
            );
        }

        for (key, raw) in [
            ("submission.timeout", &self.submission.timeout),
            ("submission.base_delay", &self.submission.base_delay),
        ] {
            if let Some(raw) = raw {
                let parsed = parse_duration(raw)?;
                if parsed <= Duration::ZERO {
                    bail!("{key} in {} must be positive, got {}", path.display(), raw);
                }
            }
        }

        if let Some(kind) = &self.form.kind
            && FormKind::parse(kind).is_none()
        {
            bail!(
                "form.kind in {} must be \"quote\" or \"lead\", got {:?}",
                path.display(),
                kind
            );
        }

        if let Some(offset) = &self.form.utc_offset {
            parse_utc_offset(offset)?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => movefinder_db::default_db_path(),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.submission
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn timeout(&self) -> Result<Duration> {
        match &self.submission.timeout {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let max_attempts = match self.submission.max_attempts {
            Some(attempts) => u32::try_from(attempts)
                .with_context(|| format!("submission.max_attempts {attempts} out of range"))?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        let base_delay = match &self.submission.base_delay {
            Some(raw) => parse_duration(raw)?,
            None => DEFAULT_BASE_DELAY,
        };
        Ok(RetryPolicy {
            max_attempts,
            base_delay,
        })
    }

    pub fn form_definition(&self) -> FormDefinition {
        self.form
            .kind
            .as_deref()
            .and_then(FormKind::parse)
            .unwrap_or(FormKind::Quote)
            .definition()
    }

    /// Fixed business offset when configured, the machine's local offset
    /// otherwise.
    pub fn clock(&self) -> Result<SystemClock> {
        match &self.form.utc_offset {
            Some(raw) => Ok(SystemClock::fixed(parse_utc_offset(raw)?)),
            None => Ok(SystemClock::local()),
        }
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging
            .file
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn log_filter(&self) -> &str {
        self.logging
            .filter
            .as_deref()
            .unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# movefinder config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/movefinder/movefinder.db)\n# db_path = \"/absolute/path/to/movefinder.db\"\n\n[submission]\nendpoint = \"{}\"\ntimeout = \"10s\"\nmax_attempts = {}\nbase_delay = \"1s\"\n\n[form]\n# quote (3 steps) or lead (2 steps)\nkind = \"quote\"\n# Optional. Fixed offset used to decide \"today\"; default is the local offset.\n# utc_offset = \"-06:00\"\n\n[logging]\n# Logs go nowhere unless a file is set; MOVEFINDER_LOG overrides filter.\n# file = \"/tmp/movefinder.log\"\nfilter = \"{}\"\n",
            path.display(),
            DEFAULT_ENDPOINT,
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_LOG_FILTER,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("duration {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}

fn parse_utc_offset(raw: &str) -> Result<UtcOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        trimmed,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid form.utc_offset {raw:?}; use a value like \"-06:00\""))
}
