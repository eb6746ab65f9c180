//! Processor configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILPROC_CONFIG` (environment variable)
//! 2. `~/.config/mailproc/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailproc\config.toml` (Windows)
//! 3. The defaults file next to it (`config.defaults.toml`), written from the
//!    built-in defaults on first use.
//!
//! Values are read either through the typed sections of [`Config`] or through
//! the [`ConfigKey`] accessors, which is what the command surface uses for
//! overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Scheduler and worker settings.
    pub processing: ProcessingConfig,
    /// File-state suffixes.
    pub files: FilesConfig,
    /// Where and what to search.
    pub search: SearchConfig,
    /// Mail parser options.
    pub parser: ParserConfig,
    /// Where parsed documents go.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs and the default sink file.
    pub cache_dir: Option<PathBuf>,
}

/// Scheduler and worker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Seconds to sleep between scheduler ticks.
    pub search_interval_secs: u64,
    /// Maximum number of files in one round.
    pub max_emails: usize,
    /// When false, at most one partition runs at a time.
    pub use_multithreading: bool,
    /// Maximum concurrent partitions; -1 uses every logical processor.
    pub core_use: i32,
    /// Per-file processing timeout in seconds (0 = no timeout).
    pub file_timeout_secs: u64,
    /// What happens to the lock of a file that failed to parse.
    pub skip_policy: SkipPolicy,
}

/// File-state suffixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Suffix of files claimed for processing (not yet indexed).
    pub pending_suffix: String,
    /// Suffix of freshly delivered files.
    pub ready_suffix: String,
}

/// Where and what to search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Domain root directories, searched in order.
    pub directories: Vec<PathBuf>,
    /// Pattern a root directory name must match (case-insensitive).
    pub domain_pattern: String,
    /// Pattern a mailbox directory name must match (case-insensitive).
    pub username_pattern: String,
}

/// Mail parser options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Files larger than this are skipped without parsing.
    pub max_message_size: u64,
    /// Strip a leading mbox `From ` separator line before parsing.
    pub strip_mbox_separator: bool,
    /// Reject messages that carry none of the standard RFC 5322 headers.
    pub require_headers: bool,
}

/// Where parsed documents go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON Lines file receiving documents and skip records.
    /// Defaults to `<cache_dir>/documents.jsonl`.
    pub sink_path: Option<PathBuf>,
}

/// What to do with a file whose processing failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipPolicy {
    /// Leave the file read-only so discovery never picks it up again.
    #[default]
    KeepLocked,
    /// Clear the read-only flag so the next discovery pass retries it.
    Release,
}

impl SkipPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeepLocked => "keep-locked",
            Self::Release => "release",
        }
    }
}

impl FromStr for SkipPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-locked" | "keep_locked" => Ok(Self::KeepLocked),
            "release" => Ok(Self::Release),
            other => Err(ConfigError::Invalid {
                key: ConfigKey::SkipPolicy.name(),
                reason: format!("expected 'keep-locked' or 'release', got '{other}'"),
            }),
        }
    }
}

// ── Default implementations ─────────────────────────────────────

/// Default domain pattern: a DNS name, optionally IDNA-encoded.
pub const DEFAULT_DOMAIN_PATTERN: &str = r"^(?:(?:xn--)?[a-z0-9_](?:[a-z0-9_-]{0,60}[a-z0-9])?\.)*(?:xn--)?(?:[a-z0-9-]{1,61}|[a-z0-9-]{1,30}\.[a-z]{2,})$";

/// Default username pattern: the local-part characters accepted by HTML email inputs.
pub const DEFAULT_USERNAME_PATTERN: &str = r"[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~\-]+";

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            search_interval_secs: 600, // 10 minutes
            max_emails: 6000,
            use_multithreading: true,
            core_use: -1,
            file_timeout_secs: 0,
            skip_policy: SkipPolicy::KeepLocked,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            pending_suffix: ".noidx".to_string(),
            ready_suffix: ".eml".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            domain_pattern: DEFAULT_DOMAIN_PATTERN.to_string(),
            username_pattern: DEFAULT_USERNAME_PATTERN.to_string(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_message_size: 256 * 1024 * 1024, // 256 MB
            strip_mbox_separator: true,
            require_headers: true,
        }
    }
}

// ── Keyed access ────────────────────────────────────────────────

/// Every configuration value addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    SearchInterval,
    MaxEmails,
    UseMultithreading,
    CoreUse,
    FileTimeout,
    SkipPolicy,
    PendingSuffix,
    ReadySuffix,
    SearchDirectories,
    DomainPattern,
    UsernamePattern,
    MaxMessageSize,
    StripMboxSeparator,
    RequireHeaders,
    SinkPath,
    LogLevel,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 16] = [
        Self::SearchInterval,
        Self::MaxEmails,
        Self::UseMultithreading,
        Self::CoreUse,
        Self::FileTimeout,
        Self::SkipPolicy,
        Self::PendingSuffix,
        Self::ReadySuffix,
        Self::SearchDirectories,
        Self::DomainPattern,
        Self::UsernamePattern,
        Self::MaxMessageSize,
        Self::StripMboxSeparator,
        Self::RequireHeaders,
        Self::SinkPath,
        Self::LogLevel,
    ];

    /// Dotted TOML path of the key.
    pub fn name(self) -> &'static str {
        match self {
            Self::SearchInterval => "processing.search_interval_secs",
            Self::MaxEmails => "processing.max_emails",
            Self::UseMultithreading => "processing.use_multithreading",
            Self::CoreUse => "processing.core_use",
            Self::FileTimeout => "processing.file_timeout_secs",
            Self::SkipPolicy => "processing.skip_policy",
            Self::PendingSuffix => "files.pending_suffix",
            Self::ReadySuffix => "files.ready_suffix",
            Self::SearchDirectories => "search.directories",
            Self::DomainPattern => "search.domain_pattern",
            Self::UsernamePattern => "search.username_pattern",
            Self::MaxMessageSize => "parser.max_message_size",
            Self::StripMboxSeparator => "parser.strip_mbox_separator",
            Self::RequireHeaders => "parser.require_headers",
            Self::SinkPath => "output.sink_path",
            Self::LogLevel => "general.log_level",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    /// Accepts the dotted name or just its last segment (`max_emails`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|key| {
                let name = key.name();
                name == wanted || name.rsplit('.').next() == Some(wanted)
            })
            .ok_or_else(|| ConfigError::UnknownKey(wanted.to_string()))
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Bool(bool),
    Duration(Duration),
    StringList(Vec<String>),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Duration(_) => "duration",
            Self::StringList(_) => "string list",
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Duration(d) => write!(f, "{}s", d.as_secs()),
            Self::StringList(list) => write!(f, "{list:?}"),
        }
    }
}

fn wrong_type(key: ConfigKey, expected: &'static str, found: &ConfigValue) -> ConfigError {
    ConfigError::WrongType {
        key: key.name(),
        expected,
        found: found.type_name(),
    }
}

fn to_usize(key: ConfigKey, value: i64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|_| ConfigError::Invalid {
        key: key.name(),
        reason: format!("{value} is negative"),
    })
}

impl Config {
    /// Time to sleep between scheduler ticks.
    pub fn search_interval(&self) -> Duration {
        Duration::from_secs(self.processing.search_interval_secs)
    }

    /// Per-file timeout, if enabled.
    pub fn file_timeout(&self) -> Option<Duration> {
        (self.processing.file_timeout_secs > 0)
            .then(|| Duration::from_secs(self.processing.file_timeout_secs))
    }

    /// Read a value by key.
    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        use ConfigValue as V;
        match key {
            ConfigKey::SearchInterval => V::Duration(self.search_interval()),
            ConfigKey::MaxEmails => V::Int(self.processing.max_emails as i64),
            ConfigKey::UseMultithreading => V::Bool(self.processing.use_multithreading),
            ConfigKey::CoreUse => V::Int(i64::from(self.processing.core_use)),
            ConfigKey::FileTimeout => {
                V::Duration(Duration::from_secs(self.processing.file_timeout_secs))
            }
            ConfigKey::SkipPolicy => V::String(self.processing.skip_policy.as_str().to_string()),
            ConfigKey::PendingSuffix => V::String(self.files.pending_suffix.clone()),
            ConfigKey::ReadySuffix => V::String(self.files.ready_suffix.clone()),
            ConfigKey::SearchDirectories => V::StringList(
                self.search
                    .directories
                    .iter()
                    .map(|d| d.to_string_lossy().into_owned())
                    .collect(),
            ),
            ConfigKey::DomainPattern => V::String(self.search.domain_pattern.clone()),
            ConfigKey::UsernamePattern => V::String(self.search.username_pattern.clone()),
            ConfigKey::MaxMessageSize => V::Int(self.parser.max_message_size as i64),
            ConfigKey::StripMboxSeparator => V::Bool(self.parser.strip_mbox_separator),
            ConfigKey::RequireHeaders => V::Bool(self.parser.require_headers),
            ConfigKey::SinkPath => V::String(
                self.output
                    .sink_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            ConfigKey::LogLevel => V::String(self.general.log_level.clone()),
        }
    }

    /// Overwrite a value by key. The value must have the key's type.
    pub fn set(&mut self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError> {
        use ConfigValue as V;
        match (key, value) {
            (ConfigKey::SearchInterval, V::Duration(d)) => {
                self.processing.search_interval_secs = d.as_secs()
            }
            (ConfigKey::MaxEmails, V::Int(i)) => self.processing.max_emails = to_usize(key, i)?,
            (ConfigKey::UseMultithreading, V::Bool(b)) => self.processing.use_multithreading = b,
            (ConfigKey::CoreUse, V::Int(i)) => {
                self.processing.core_use = i32::try_from(i).map_err(|_| ConfigError::Invalid {
                    key: key.name(),
                    reason: format!("{i} is out of range"),
                })?
            }
            (ConfigKey::FileTimeout, V::Duration(d)) => {
                self.processing.file_timeout_secs = d.as_secs()
            }
            (ConfigKey::SkipPolicy, V::String(s)) => self.processing.skip_policy = s.parse()?,
            (ConfigKey::PendingSuffix, V::String(s)) => self.files.pending_suffix = s,
            (ConfigKey::ReadySuffix, V::String(s)) => self.files.ready_suffix = s,
            (ConfigKey::SearchDirectories, V::StringList(list)) => {
                self.search.directories = list.into_iter().map(PathBuf::from).collect()
            }
            (ConfigKey::DomainPattern, V::String(s)) => self.search.domain_pattern = s,
            (ConfigKey::UsernamePattern, V::String(s)) => self.search.username_pattern = s,
            (ConfigKey::MaxMessageSize, V::Int(i)) => {
                self.parser.max_message_size = to_usize(key, i)? as u64
            }
            (ConfigKey::StripMboxSeparator, V::Bool(b)) => self.parser.strip_mbox_separator = b,
            (ConfigKey::RequireHeaders, V::Bool(b)) => self.parser.require_headers = b,
            (ConfigKey::SinkPath, V::String(s)) => {
                self.output.sink_path = (!s.is_empty()).then(|| PathBuf::from(s))
            }
            (ConfigKey::LogLevel, V::String(s)) => self.general.log_level = s,
            (key, other) => {
                let expected = self.get(key).type_name();
                return Err(wrong_type(key, expected, &other));
            }
        }
        Ok(())
    }

    pub fn get_string(&self, key: ConfigKey) -> Result<String, ConfigError> {
        match self.get(key) {
            ConfigValue::String(s) => Ok(s),
            other => Err(wrong_type(key, "string", &other)),
        }
    }

    pub fn get_int(&self, key: ConfigKey) -> Result<i64, ConfigError> {
        match self.get(key) {
            ConfigValue::Int(i) => Ok(i),
            other => Err(wrong_type(key, "int", &other)),
        }
    }

    pub fn get_bool(&self, key: ConfigKey) -> Result<bool, ConfigError> {
        match self.get(key) {
            ConfigValue::Bool(b) => Ok(b),
            other => Err(wrong_type(key, "bool", &other)),
        }
    }

    pub fn get_duration(&self, key: ConfigKey) -> Result<Duration, ConfigError> {
        match self.get(key) {
            ConfigValue::Duration(d) => Ok(d),
            other => Err(wrong_type(key, "duration", &other)),
        }
    }

    pub fn get_string_list(&self, key: ConfigKey) -> Result<Vec<String>, ConfigError> {
        match self.get(key) {
            ConfigValue::StringList(list) => Ok(list),
            other => Err(wrong_type(key, "string list", &other)),
        }
    }

    /// Check every value a processing round depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.search_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ConfigKey::SearchInterval.name(),
                reason: "must be at least one second".into(),
            });
        }
        if self.processing.core_use == 0 || self.processing.core_use < -1 {
            return Err(ConfigError::Invalid {
                key: ConfigKey::CoreUse.name(),
                reason: format!(
                    "{} is neither -1 nor a positive worker count",
                    self.processing.core_use
                ),
            });
        }
        for (key, suffix) in [
            (ConfigKey::PendingSuffix, &self.files.pending_suffix),
            (ConfigKey::ReadySuffix, &self.files.ready_suffix),
        ] {
            if suffix.trim().trim_matches('.').is_empty() {
                return Err(ConfigError::Invalid {
                    key: key.name(),
                    reason: "suffix must not be empty".into(),
                });
            }
        }
        if self.files.pending_suffix == self.files.ready_suffix {
            return Err(ConfigError::Invalid {
                key: ConfigKey::PendingSuffix.name(),
                reason: "pending and ready suffixes must differ".into(),
            });
        }
        compile_pattern(ConfigKey::DomainPattern, &self.search.domain_pattern)?;
        compile_pattern(ConfigKey::UsernamePattern, &self.search.username_pattern)?;
        Ok(())
    }

    /// Parse and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config: Config = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty TOML, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| ConfigError::io(path, e))
    }
}

/// Compile a directory-name pattern the way discovery matches it.
pub fn compile_pattern(key: ConfigKey, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::Invalid {
            key: key.name(),
            reason: e.to_string(),
        })
}

// ── Store ───────────────────────────────────────────────────────

/// Owns the live configuration and notifies subscribers on every change.
///
/// Subscribers receive a fresh `Arc<Config>` each time the configuration is
/// loaded, reloaded or a single key is set. Only validated configurations are
/// ever published.
pub struct ConfigStore {
    config_path: Option<PathBuf>,
    defaults_path: Option<PathBuf>,
    current: watch::Sender<Arc<Config>>,
}

impl ConfigStore {
    /// Open the store backed by `config_path`, falling back to `defaults_path`
    /// when the main file does not exist.
    pub fn open(
        config_path: impl Into<PathBuf>,
        defaults_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let store = Self {
            config_path: Some(config_path.into()),
            defaults_path: Some(defaults_path.into()),
            current: watch::Sender::new(Arc::new(Config::default())),
        };
        let has_config = store.config_path.as_deref().is_some_and(Path::exists);
        if has_config {
            store.load()?;
        } else {
            store.load_defaults()?;
        }
        Ok(store)
    }

    /// Open the store at the standard locations.
    pub fn open_default() -> Result<Self, ConfigError> {
        let config_path = config_file_path().ok_or_else(|| ConfigError::Invalid {
            key: "config_path",
            reason: "could not determine config file path".into(),
        })?;
        let defaults_path = defaults_file_path(&config_path);
        Self::open(config_path, defaults_path)
    }

    /// A store with no backing files, used by tests and embedding hosts.
    pub fn in_memory(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config_path: None,
            defaults_path: None,
            current: watch::Sender::new(Arc::new(config)),
        })
    }

    /// Current configuration.
    pub fn snapshot(&self) -> Arc<Config> {
        self.current.borrow().clone()
    }

    /// Subscribe to configuration changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.current.subscribe()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load the main config file and publish it.
    pub fn load(&self) -> Result<(), ConfigError> {
        let Some(path) = self.config_path.as_deref() else {
            return Err(no_backing_file());
        };
        let config = Config::from_file(path)?;
        tracing::info!(path = %path.display(), "Loaded config");
        self.publish(config);
        Ok(())
    }

    /// Load the defaults file (creating it from built-in defaults if absent)
    /// and publish it.
    pub fn load_defaults(&self) -> Result<(), ConfigError> {
        let Some(path) = self.defaults_path.as_deref() else {
            return Err(no_backing_file());
        };
        if !path.exists() {
            match Config::default().write_to(path) {
                Ok(()) => tracing::info!(path = %path.display(), "Wrote default config"),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Cannot write defaults file, using built-in defaults"
                    );
                    self.publish(Config::default());
                    return Ok(());
                }
            }
        }
        let config = Config::from_file(path)?;
        tracing::info!(path = %path.display(), "Loaded default config");
        self.publish(config);
        Ok(())
    }

    /// Re-read whichever backing file exists.
    pub fn reload(&self) -> Result<(), ConfigError> {
        if self.config_path.as_deref().is_some_and(Path::exists) {
            self.load()
        } else {
            self.load_defaults()
        }
    }

    /// Persist the current configuration to the main config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = self.config_path.as_deref() else {
            return Err(no_backing_file());
        };
        self.snapshot().write_to(path)?;
        tracing::info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Set one key in memory and publish the result. Not persisted until
    /// [`ConfigStore::save`] is called.
    pub fn set(&self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError> {
        let mut next = (*self.snapshot()).clone();
        next.set(key, value)?;
        next.validate()?;
        tracing::debug!(key = %key, value = %next.get(key), "Config value set");
        self.publish(next);
        Ok(())
    }

    /// Validate and publish a whole configuration at once.
    pub fn replace(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        self.publish(config);
        Ok(())
    }

    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        self.snapshot().get(key)
    }

    pub fn get_string(&self, key: ConfigKey) -> Result<String, ConfigError> {
        self.snapshot().get_string(key)
    }

    pub fn get_int(&self, key: ConfigKey) -> Result<i64, ConfigError> {
        self.snapshot().get_int(key)
    }

    pub fn get_bool(&self, key: ConfigKey) -> Result<bool, ConfigError> {
        self.snapshot().get_bool(key)
    }

    pub fn get_duration(&self, key: ConfigKey) -> Result<Duration, ConfigError> {
        self.snapshot().get_duration(key)
    }

    pub fn get_string_list(&self, key: ConfigKey) -> Result<Vec<String>, ConfigError> {
        self.snapshot().get_string_list(key)
    }

    fn publish(&self, config: Config) {
        self.current.send_replace(Arc::new(config));
    }
}

fn no_backing_file() -> ConfigError {
    ConfigError::Invalid {
        key: "config_path",
        reason: "store has no backing file".into(),
    }
}

// ── Locations ───────────────────────────────────────────────────

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILPROC_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailproc").join("config.toml"))
}

/// The defaults file lives next to the main config file.
pub fn defaults_file_path(config_path: &Path) -> PathBuf {
    config_path.with_file_name("config.defaults.toml")
}

/// Return the cache directory for logs and the default sink.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailproc")
}

/// Return the JSON Lines sink path.
pub fn sink_path(config: &Config) -> PathBuf {
    config
        .output
        .sink_path
        .clone()
        .unwrap_or_else(|| cache_dir(config).join("documents.jsonl"))
}
