use crate::alerts::{AlertThresholds, KindThresholds};
use crate::clients::cloudflare::CLOUDFLARE_API_URL;
use crate::clients::telegram::TELEGRAM_API_URL;
use crate::models::PerKind;
use crate::utils::{Backoff, RetryPolicy, TimezoneCalculator};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ACCOUNT_ID: &str = "CFSTATS_CLOUDFLARE_ACCOUNT_ID";
pub const ENV_API_TOKEN: &str = "CFSTATS_CLOUDFLARE_API_TOKEN";
pub const ENV_BOT_TOKEN: &str = "CFSTATS_TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "CFSTATS_TELEGRAM_CHAT_ID";
pub const ENV_TELEGRAM_API_URL: &str = "CFSTATS_TELEGRAM_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cloudflare: CloudflareConfig,
    pub telegram: TelegramConfig,
    pub thresholds: ThresholdsConfig,
    pub retry: RetryConfig,
    pub history: HistoryConfig,
    pub charts: ChartsConfig,
    pub timezone: TimezoneConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflareConfig {
    pub account_id: String,
    pub api_token: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub pages_request_increase: f64,
    pub pages_request_decrease: f64,
    pub workers_request_increase: f64,
    pub workers_request_decrease: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_secs: u64,
    pub backoff: Backoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub storage_days: u32,
    pub data_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub enabled: bool,
    pub output_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimezoneConfig {
    pub timezone: String, // "local" or e.g. "Asia/Shanghai"
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: String::new(),
            api_base_url: CLOUDFLARE_API_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base_url: TELEGRAM_API_URL.to_string(),
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            pages_request_increase: 30.0,
            pages_request_decrease: 25.0,
            workers_request_increase: 35.0,
            workers_request_decrease: 30.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 1,
            backoff: Backoff::Linear,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_days: 30,
            data_file: "~/.config/cfstats/history.json".to_string(),
        }
    }
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: "~/.config/cfstats/charts".to_string(),
        }
    }
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            timezone: "local".to_string(),
        }
    }
}

impl TelegramConfig {
    /// Credentials read straight from the environment, used to report a
    /// failure when the config file itself could not be loaded
    pub fn from_env<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup(ENV_BOT_TOKEN).filter(|v| !v.is_empty())?;
        let chat_id = lookup(ENV_CHAT_ID).filter(|v| !v.is_empty())?;
        let mut telegram = Self {
            bot_token,
            chat_id,
            ..Self::default()
        };
        if let Some(url) = lookup(ENV_TELEGRAM_API_URL).filter(|v| !v.is_empty()) {
            telegram.api_base_url = url;
        }
        Some(telegram)
    }

    pub fn is_complete(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

impl Config {
    /// Effective configuration: the file at `path` (or the default location)
    /// with environment overrides applied
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], reading overrides through `lookup`
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides(lookup);
        Ok(config)
    }

    /// The file contents only. A missing file is created with defaults, as on
    /// first run.
    pub fn load_file(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path)?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
            Self::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
        } else {
            let config = Self::default();
            config.save(&config_path)?;
            Ok(config)
        }
    }

    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(p.to_path_buf()),
            None => Self::default_path(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Secrets from the environment win over the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };
        set(&mut self.cloudflare.account_id, ENV_ACCOUNT_ID);
        set(&mut self.cloudflare.api_token, ENV_API_TOKEN);
        set(&mut self.telegram.bot_token, ENV_BOT_TOKEN);
        set(&mut self.telegram.chat_id, ENV_CHAT_ID);
        set(&mut self.telegram.api_base_url, ENV_TELEGRAM_API_URL);
    }

    /// Check everything a run needs before any network call is made
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.cloudflare.account_id.is_empty() {
            missing.push("cloudflare.account_id");
        }
        if self.cloudflare.api_token.is_empty() {
            missing.push("cloudflare.api_token");
        }
        if self.telegram.bot_token.is_empty() {
            missing.push("telegram.bot_token");
        }
        if self.telegram.chat_id.is_empty() {
            missing.push("telegram.chat_id");
        }
        if !missing.is_empty() {
            anyhow::bail!("Missing required settings: {}", missing.join(", "));
        }

        for (key, value) in [
            ("thresholds.pages_request_increase", self.thresholds.pages_request_increase),
            ("thresholds.pages_request_decrease", self.thresholds.pages_request_decrease),
            ("thresholds.workers_request_increase", self.thresholds.workers_request_increase),
            ("thresholds.workers_request_decrease", self.thresholds.workers_request_decrease),
        ] {
            validate_percentage(key, value)?;
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        TimezoneCalculator::new(&self.timezone.timezone)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let contents = self.to_commented_toml();
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// TOML with a comment above every option
    pub fn to_commented_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# cfstats configuration\n");
        output.push_str("# Secrets may also come from CFSTATS_CLOUDFLARE_ACCOUNT_ID,\n");
        output.push_str("# CFSTATS_CLOUDFLARE_API_TOKEN, CFSTATS_TELEGRAM_BOT_TOKEN and\n");
        output.push_str("# CFSTATS_TELEGRAM_CHAT_ID, which take precedence over this file.\n");
        output.push('\n');

        output.push_str("[cloudflare]\n");
        output.push_str("# Account whose Pages projects and Workers services are tracked\n");
        output.push_str(&format!("account_id = {}\n", toml_string(&self.cloudflare.account_id)));
        output.push_str("# API token with Account Analytics read permission\n");
        output.push_str(&format!("api_token = {}\n", toml_string(&self.cloudflare.api_token)));
        let cloudflare = &self.cloudflare;
        output.push_str(&format!("api_base_url = {}\n", toml_string(&cloudflare.api_base_url)));
        output.push_str("# Per-request timeout in seconds\n");
        output.push_str(&format!("request_timeout_secs = {}\n", cloudflare.request_timeout_secs));
        output.push('\n');

        output.push_str("[telegram]\n");
        output.push_str(&format!("bot_token = {}\n", toml_string(&self.telegram.bot_token)));
        output.push_str(&format!("chat_id = {}\n", toml_string(&self.telegram.chat_id)));
        output.push_str(&format!("api_base_url = {}\n", toml_string(&self.telegram.api_base_url)));
        output.push('\n');

        output.push_str("[thresholds]\n");
        output.push_str("# Day-over-day change, in percent, that raises an alert\n");
        let limits = &self.thresholds;
        output.push_str(&format!("pages_request_increase = {:?}\n", limits.pages_request_increase));
        output.push_str(&format!("pages_request_decrease = {:?}\n", limits.pages_request_decrease));
        output.push_str(&format!(
            "workers_request_increase = {:?}\n",
            limits.workers_request_increase
        ));
        output.push_str(&format!(
            "workers_request_decrease = {:?}\n",
            limits.workers_request_decrease
        ));
        output.push('\n');

        output.push_str("[retry]\n");
        output.push_str("# Attempts per API call, including the first one\n");
        output.push_str(&format!("max_attempts = {}\n", self.retry.max_attempts));
        output.push_str("# Base pause between attempts in seconds\n");
        output.push_str(&format!("delay_secs = {}\n", self.retry.delay_secs));
        output.push_str("# \"linear\" (delay * attempt) or \"exponential\" (delay * 2^(n-1))\n");
        output.push_str(&format!("backoff = \"{}\"\n", self.retry.backoff.as_str()));
        output.push('\n');

        output.push_str("[history]\n");
        output.push_str("# Days of snapshots kept; older entries are pruned after each run\n");
        output.push_str(&format!("storage_days = {}\n", self.history.storage_days));
        output.push_str(&format!("data_file = {}\n", toml_string(&self.history.data_file)));
        output.push('\n');

        output.push_str("[charts]\n");
        output.push_str(&format!("enabled = {}\n", self.charts.enabled));
        output.push_str(&format!("output_dir = {}\n", toml_string(&self.charts.output_dir)));
        output.push('\n');

        output.push_str("[timezone]\n");
        output.push_str("# Zone that decides which calendar day a run belongs to.\n");
        output.push_str("# \"local\" uses the system zone, otherwise an IANA name\n");
        output.push_str("# such as \"Asia/Shanghai\"\n");
        output.push_str(&format!("timezone = {}\n", toml_string(&self.timezone.timezone)));

        output
    }

    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(".config").join("cfstats").join("config.toml"))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "cloudflare.account_id" => self.cloudflare.account_id = value.to_string(),
            "cloudflare.api_token" => self.cloudflare.api_token = value.to_string(),
            "cloudflare.api_base_url" => self.cloudflare.api_base_url = value.to_string(),
            "cloudflare.request_timeout_secs" => {
                self.cloudflare.request_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout value: {}", value))?;
            }
            "telegram.bot_token" => self.telegram.bot_token = value.to_string(),
            "telegram.chat_id" => self.telegram.chat_id = value.to_string(),
            "telegram.api_base_url" => self.telegram.api_base_url = value.to_string(),
            "thresholds.pages_request_increase" => {
                self.thresholds.pages_request_increase = parse_percentage(key, value)?;
            }
            "thresholds.pages_request_decrease" => {
                self.thresholds.pages_request_decrease = parse_percentage(key, value)?;
            }
            "thresholds.workers_request_increase" => {
                self.thresholds.workers_request_increase = parse_percentage(key, value)?;
            }
            "thresholds.workers_request_decrease" => {
                self.thresholds.workers_request_decrease = parse_percentage(key, value)?;
            }
            "retry.max_attempts" => {
                let attempts: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid attempt count: {}", value))?;
                if attempts == 0 {
                    anyhow::bail!("retry.max_attempts must be at least 1");
                }
                self.retry.max_attempts = attempts;
            }
            "retry.delay_secs" => {
                self.retry.delay_secs = value
                    .parse()
                    .with_context(|| format!("Invalid delay value: {}", value))?;
            }
            "retry.backoff" => {
                self.retry.backoff = Backoff::from_config_str(value).with_context(|| {
                    format!("Invalid backoff: {}. Must be 'linear' or 'exponential'", value)
                })?;
            }
            "history.storage_days" => {
                self.history.storage_days = value
                    .parse()
                    .with_context(|| format!("Invalid day count: {}", value))?;
            }
            "history.data_file" => self.history.data_file = value.to_string(),
            "charts.enabled" => {
                self.charts.enabled = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }
            "charts.output_dir" => self.charts.output_dir = value.to_string(),
            "timezone.timezone" => {
                TimezoneCalculator::new(value)?;
                self.timezone.timezone = value.to_string();
            }
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }

    pub fn alert_thresholds(&self) -> AlertThresholds {
        PerKind::new(
            KindThresholds::new(
                self.thresholds.pages_request_increase,
                self.thresholds.pages_request_decrease,
            ),
            KindThresholds::new(
                self.thresholds.workers_request_increase,
                self.thresholds.workers_request_decrease,
            ),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.delay_secs),
            self.retry.backoff,
        )
    }

    pub fn timezone_calculator(&self) -> Result<TimezoneCalculator> {
        TimezoneCalculator::new(&self.timezone.timezone)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.cloudflare.request_timeout_secs)
    }

    pub fn history_path(&self) -> PathBuf {
        expand_home(&self.history.data_file)
    }

    pub fn chart_dir(&self) -> PathBuf {
        expand_home(&self.charts.output_dir)
    }
}

/// Resolve a leading `~/` against the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn validate_percentage(key: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        anyhow::bail!("{} must be a non-negative percentage, got {}", key, value);
    }
    Ok(())
}

fn parse_percentage(key: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value
        .parse()
        .with_context(|| format!("Invalid percentage for {}: {}", key, value))?;
    validate_percentage(key, parsed)?;
    Ok(parsed)
}

fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
