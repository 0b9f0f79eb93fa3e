//! Pipeline configuration: the value object every component is built from,
//! plus the optional TOML file that overrides its defaults.
//!
//! Precedence is CLI flag > config file > built-in default. The file layer is
//! applied here; the CLI layer is applied by the binary on top.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::TransferSettings;
use crate::endpoint::{DEFAULT_CONTROL_URL, DEFAULT_ENDPOINT_TIMEOUT};
use crate::extract::{CollectionSettings, ID_PLACEHOLDER, ItemSettings};
use crate::retry::RetryPolicy;

/// Directory name used under the user config root.
pub const CONFIG_DIR_NAME: &str = "vidgrab";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const MAX_ATTEMPTS_RANGE: std::ops::RangeInclusive<u32> = 1..=10;
const TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=86_400;
const DELAY_SECS_RANGE: std::ops::RangeInclusive<u64> = 0..=600;

/// Control endpoint discovery settings.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// URL of the JSON document advertising the control channel.
    pub url: String,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Attempt budget.
    pub retry: RetryPolicy,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_CONTROL_URL.to_string(),
            timeout: DEFAULT_ENDPOINT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Everything needed to build a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which item directories are created.
    pub output_dir: PathBuf,
    /// Control endpoint discovery.
    pub endpoint: EndpointSettings,
    /// Collection expansion.
    pub collection: CollectionSettings,
    /// Item metadata extraction.
    pub item: ItemSettings,
    /// Asset transfers.
    pub transfer: TransferSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            endpoint: EndpointSettings::default(),
            collection: CollectionSettings::default(),
            item: ItemSettings::default(),
            transfer: TransferSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Overrides attempt count and/or delay at every retrying call site.
    pub fn set_retry(&mut self, max_attempts: Option<u32>, delay: Option<Duration>) {
        for policy in [
            &mut self.endpoint.retry,
            &mut self.collection.retry,
            &mut self.item.retry,
            &mut self.transfer.retry,
        ] {
            *policy = override_policy(*policy, max_attempts, delay);
        }
    }
}

fn override_policy(
    policy: RetryPolicy,
    max_attempts: Option<u32>,
    delay: Option<Duration>,
) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts.unwrap_or(policy.max_attempts()),
        delay.unwrap_or(policy.delay()),
    )
}

/// Errors from loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Dotted key of the offending value.
        field: String,
        /// Offending value, rendered.
        value: String,
        /// Accepted range or shape.
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &str, value: impl ToString, expected: &'static str) -> Self {
        Self::Invalid {
            field: field.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

/// Retry overrides for one call site (or for all of them at the top level).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Attempts including the first (1..=10).
    pub max_attempts: Option<u32>,
    /// Fixed delay between attempts in seconds (0..=600).
    pub delay_secs: Option<u64>,
}

/// `[endpoint]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    /// Per-attempt request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Retry overrides.
    pub retry: Option<RetrySection>,
}

/// `[collection]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionSection {
    /// Page URL template containing `{id}`.
    pub url_template: Option<String>,
    /// Selector for candidate anchors.
    pub anchor_selector: Option<String>,
    /// `class` value of item anchors.
    pub marker_class: Option<String>,
    /// Settle period in seconds.
    pub settle_secs: Option<u64>,
    /// Session ceiling in seconds.
    pub page_timeout_secs: Option<u64>,
    /// Retry overrides.
    pub retry: Option<RetrySection>,
}

/// `[item]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemSection {
    /// Page URL template containing `{id}`.
    pub url_template: Option<String>,
    /// Title selector.
    pub title_selector: Option<String>,
    /// Cover image selector.
    pub image_selector: Option<String>,
    /// Asset URL selector.
    pub asset_selector: Option<String>,
    /// Visibility wait bound in seconds.
    pub visible_timeout_secs: Option<u64>,
    /// Settle period in seconds.
    pub settle_secs: Option<u64>,
    /// Session ceiling in seconds.
    pub page_timeout_secs: Option<u64>,
    /// Retry overrides.
    pub retry: Option<RetrySection>,
}

/// `[transfer]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferSection {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-attempt ceiling in seconds.
    pub timeout_secs: Option<u64>,
    /// Staging file suffix.
    pub staging_suffix: Option<String>,
    /// Retry overrides.
    pub retry: Option<RetrySection>,
}

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Control endpoint discovery URL.
    pub control_url: Option<String>,
    /// Root for item directories.
    pub output_dir: Option<PathBuf>,
    /// Directory for collection screenshots.
    pub screenshot_dir: Option<PathBuf>,
    /// Stop retrying an item as soon as its metadata comes back incomplete.
    pub stop_on_incomplete: Option<bool>,
    /// Retry overrides applied to every call site before the per-site tables.
    pub retry: Option<RetrySection>,
    /// `[endpoint]` table.
    pub endpoint: Option<EndpointSection>,
    /// `[collection]` table.
    pub collection: Option<CollectionSection>,
    /// `[item]` table.
    pub item: Option<ItemSection>,
    /// `[transfer]` table.
    pub transfer: Option<TransferSection>,
}

impl FileConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// the errors of [`parse`](Self::parse).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Loads `explicit` if given, otherwise the default path when it exists.
    ///
    /// # Errors
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load_optional(explicit: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }

        let Some(path) = resolve_default_config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file found");
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Checks every present value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_retry("retry", self.retry.as_ref())?;

        if let Some(endpoint) = &self.endpoint {
            validate_timeout_secs("endpoint.timeout_secs", endpoint.timeout_secs)?;
            validate_retry("endpoint.retry", endpoint.retry.as_ref())?;
        }
        if let Some(collection) = &self.collection {
            validate_template("collection.url_template", collection.url_template.as_deref())?;
            validate_delay_secs("collection.settle_secs", collection.settle_secs)?;
            validate_timeout_secs("collection.page_timeout_secs", collection.page_timeout_secs)?;
            validate_retry("collection.retry", collection.retry.as_ref())?;
        }
        if let Some(item) = &self.item {
            validate_template("item.url_template", item.url_template.as_deref())?;
            validate_timeout_secs("item.visible_timeout_secs", item.visible_timeout_secs)?;
            validate_delay_secs("item.settle_secs", item.settle_secs)?;
            validate_timeout_secs("item.page_timeout_secs", item.page_timeout_secs)?;
            validate_retry("item.retry", item.retry.as_ref())?;
        }
        if let Some(transfer) = &self.transfer {
            validate_timeout_secs("transfer.connect_timeout_secs", transfer.connect_timeout_secs)?;
            validate_timeout_secs("transfer.timeout_secs", transfer.timeout_secs)?;
            if transfer.staging_suffix.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::invalid(
                    "transfer.staging_suffix",
                    "\"\"",
                    "a non-empty suffix",
                ));
            }
            validate_retry("transfer.retry", transfer.retry.as_ref())?;
        }
        Ok(())
    }

    /// Applies every present value onto `config`.
    pub fn apply_to(&self, config: &mut PipelineConfig) {
        if let Some(url) = &self.control_url {
            config.endpoint.url.clone_from(url);
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir.clone_from(output_dir);
        }
        if let Some(screenshot_dir) = &self.screenshot_dir {
            config.collection.screenshot_dir = Some(screenshot_dir.clone());
        }
        if let Some(stop) = self.stop_on_incomplete {
            config.item.retry_incomplete = !stop;
        }
        if let Some(retry) = &self.retry {
            config.set_retry(retry.max_attempts, retry.delay_secs.map(Duration::from_secs));
        }

        if let Some(endpoint) = &self.endpoint {
            set_secs(&mut config.endpoint.timeout, endpoint.timeout_secs);
            apply_retry(&mut config.endpoint.retry, endpoint.retry.as_ref());
        }
        if let Some(collection) = &self.collection {
            let target = &mut config.collection;
            set_string(&mut target.url_template, collection.url_template.as_ref());
            set_string(&mut target.anchor_selector, collection.anchor_selector.as_ref());
            set_string(&mut target.marker_class, collection.marker_class.as_ref());
            set_secs(&mut target.settle, collection.settle_secs);
            set_secs(&mut target.page_timeout, collection.page_timeout_secs);
            apply_retry(&mut target.retry, collection.retry.as_ref());
        }
        if let Some(item) = &self.item {
            let target = &mut config.item;
            set_string(&mut target.url_template, item.url_template.as_ref());
            set_string(&mut target.title_selector, item.title_selector.as_ref());
            set_string(&mut target.image_selector, item.image_selector.as_ref());
            set_string(&mut target.asset_selector, item.asset_selector.as_ref());
            set_secs(&mut target.visible_timeout, item.visible_timeout_secs);
            set_secs(&mut target.settle, item.settle_secs);
            set_secs(&mut target.page_timeout, item.page_timeout_secs);
            apply_retry(&mut target.retry, item.retry.as_ref());
        }
        if let Some(transfer) = &self.transfer {
            let target = &mut config.transfer;
            set_secs(&mut target.connect_timeout, transfer.connect_timeout_secs);
            set_secs(&mut target.timeout, transfer.timeout_secs);
            set_string(&mut target.staging_suffix, transfer.staging_suffix.as_ref());
            apply_retry(&mut target.retry, transfer.retry.as_ref());
        }
    }
}

fn set_secs(target: &mut Duration, secs: Option<u64>) {
    if let Some(secs) = secs {
        *target = Duration::from_secs(secs);
    }
}

fn set_string(target: &mut String, value: Option<&String>) {
    if let Some(value) = value {
        target.clone_from(value);
    }
}

fn apply_retry(policy: &mut RetryPolicy, section: Option<&RetrySection>) {
    if let Some(section) = section {
        *policy = override_policy(
            *policy,
            section.max_attempts,
            section.delay_secs.map(Duration::from_secs),
        );
    }
}

fn validate_retry(prefix: &str, section: Option<&RetrySection>) -> Result<(), ConfigError> {
    let Some(section) = section else {
        return Ok(());
    };
    if let Some(attempts) = section.max_attempts
        && !MAX_ATTEMPTS_RANGE.contains(&attempts)
    {
        return Err(ConfigError::invalid(
            &format!("{prefix}.max_attempts"),
            attempts,
            "range 1..=10",
        ));
    }
    validate_delay_secs(&format!("{prefix}.delay_secs"), section.delay_secs)
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !TIMEOUT_SECS_RANGE.contains(&value) {
        return Err(ConfigError::invalid(field, value, "range 1..=86400"));
    }
    Ok(())
}

fn validate_delay_secs(field: &str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !DELAY_SECS_RANGE.contains(&value) {
        return Err(ConfigError::invalid(field, value, "range 0..=600"));
    }
    Ok(())
}

fn validate_template(field: &str, value: Option<&str>) -> Result<(), ConfigError> {
    match value {
        Some(template) if !template.contains(ID_PLACEHOLDER) => Err(ConfigError::invalid(
            field,
            template,
            "a URL template containing {id}",
        )),
        _ => Ok(()),
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/vidgrab/config.toml`
/// 2. `$HOME/.config/vidgrab/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
