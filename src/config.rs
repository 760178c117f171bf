//! Global configuration and target definitions.
//!
//! The global settings live in a TOML document with a `[global]` table, the
//! targets in a YAML mapping keyed by target name. Both are loaded once at
//! startup and never mutated afterwards. Target definitions are kept as raw
//! YAML values and only decoded when the target runs, so a malformed target
//! fails on its own instead of blocking the whole run.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Package name.
pub(crate) const PKG_NAME: &str = env!("CARGO_PKG_NAME");
/// Default global configuration file name.
pub const CONFIG_NAME: &str = "backup.toml";
/// Default targets file name.
pub const TARGETS_NAME: &str = "targets.yaml";

/// Severity threshold of the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Parses a level name case-insensitively. Unknown names fall back to `Info`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// A boolean setting that may be written either as a real boolean or as a string.
///
/// Strings are matched against `true`, `yes`, `on` and `1` (case-insensitive);
/// anything else, including `"false"`, reads as false.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn value(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            ),
        }
    }
}

/// On-disk shape of the global configuration file.
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    #[serde(default)]
    global: RawGlobal,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawGlobal {
    mkdir: Option<String>,
    rsync: Option<String>,
    rsyncoption: Option<String>,
    backuphiddenfiles: Option<Flag>,
    logfile: Option<PathBuf>,
    loglevel: Option<String>,
    backuproot: Option<PathBuf>,
    strict: Option<Flag>,
}

/// Global settings shared by every target.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    /// Command used to create destination directories.
    pub mkdir: String,
    /// Command used to synchronize files.
    pub rsync: String,
    /// Options prepended to every sync invocation.
    pub rsync_option: String,
    /// Whether dotfiles are transferred unless a target overrides it.
    pub backup_hidden_files: bool,
    /// Optional file receiving a copy of the run log.
    pub log_file: Option<PathBuf>,
    pub log_level: LogLevel,
    /// Root directory under which each target gets its own directory.
    pub backup_root: PathBuf,
    /// Treat non-zero exit codes of mkdir/sync as target failures.
    pub strict: bool,
}

impl GlobalConfig {
    /// Creates a configuration with every setting at its default value.
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            mkdir: "mkdir".to_string(),
            rsync: "rsync".to_string(),
            rsync_option: String::new(),
            backup_hidden_files: true,
            log_file: None,
            log_level: LogLevel::Info,
            backup_root: backup_root.into(),
            strict: true,
        }
    }

    /// Reads the global configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read(path)?;
        Self::from_toml(&text, path)
    }

    /// Parses a global configuration document, merging it over the defaults.
    ///
    /// `origin` is only used for error messages.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|source| Error::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        let raw = file.global;
        let backup_root = raw.backuproot.ok_or(Error::MissingBackupRoot)?;

        let mut config = Self::new(backup_root);
        if let Some(mkdir) = raw.mkdir {
            config.mkdir = mkdir;
        }
        if let Some(rsync) = raw.rsync {
            config.rsync = rsync;
        }
        if let Some(option) = raw.rsyncoption {
            config.rsync_option = option;
        }
        if let Some(flag) = raw.backuphiddenfiles {
            config.backup_hidden_files = flag.value();
        }
        if let Some(flag) = raw.strict {
            config.strict = flag.value();
        }
        if let Some(level) = raw.loglevel {
            config.log_level = LogLevel::parse(&level);
        }
        config.log_file = raw.logfile;
        Ok(config)
    }
}

/// Sync options of a target, written either as one string or as a list.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SyncOptions {
    Scalar(String),
    List(Vec<String>),
}

impl SyncOptions {
    /// Returns the options as a single space-separated string.
    pub fn joined(&self) -> String {
        match self {
            SyncOptions::Scalar(s) => s.clone(),
            SyncOptions::List(list) => list.join(" "),
        }
    }
}

/// Declarative include/exclude specification of a target.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Fileset {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Per-target definition. Every field except the fileset is an optional
/// override of a global setting.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TargetConfig {
    /// Remote host, defaults to the target name.
    pub host: Option<String>,
    /// Literal destination shared by all include paths.
    pub dest: Option<PathBuf>,
    #[serde(rename = "backuproot")]
    pub backup_root: Option<PathBuf>,
    pub option: Option<SyncOptions>,
    pub fileset: Option<Fileset>,
    #[serde(rename = "backuphiddenfiles")]
    pub backup_hidden_files: Option<Flag>,
    /// File receiving the raw output of the sync command.
    #[serde(rename = "log")]
    pub log_file: Option<PathBuf>,
}

impl TargetConfig {
    pub fn host<'a>(&'a self, name: &'a str) -> &'a str {
        self.host.as_deref().unwrap_or(name)
    }

    /// Directory under which the target's include paths are mirrored.
    pub fn destination_root(&self, name: &str, global: &GlobalConfig) -> PathBuf {
        self.backup_root
            .as_deref()
            .unwrap_or(global.backup_root.as_path())
            .join(name)
    }

    pub fn option_string(&self) -> String {
        self.option
            .as_ref()
            .map(SyncOptions::joined)
            .unwrap_or_default()
    }

    /// The target's fileset laid over the empty default.
    pub fn fileset(&self) -> Result<Fileset> {
        // Absent fields were already replaced by empty lists when decoding.
        self.fileset.clone().ok_or(Error::MissingFileset)
    }

    pub fn backup_hidden_files(&self, global: &GlobalConfig) -> bool {
        self.backup_hidden_files
            .as_ref()
            .map(Flag::value)
            .unwrap_or(global.backup_hidden_files)
    }
}

/// A named target whose definition has not been decoded yet.
#[derive(Debug, Clone)]
pub struct TargetEntry {
    name: String,
    definition: serde_yaml::Value,
}

impl TargetEntry {
    pub fn new(name: impl Into<String>, definition: serde_yaml::Value) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decodes the target definition.
    pub fn config(&self) -> Result<TargetConfig> {
        serde_yaml::from_value(self.definition.clone()).map_err(Error::TargetDefinition)
    }
}

/// Target definitions in document order.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    entries: Vec<TargetEntry>,
}

impl Targets {
    pub fn new(entries: Vec<TargetEntry>) -> Self {
        Self { entries }
    }

    /// Reads the targets file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read(path)?;
        Self::from_yaml(&text, path)
    }

    /// Parses a targets document. An empty document yields no targets.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self> {
        let yaml_error = |source| Error::Yaml {
            path: origin.to_path_buf(),
            source,
        };
        let document: serde_yaml::Value = serde_yaml::from_str(text).map_err(yaml_error)?;
        if document.is_null() {
            return Ok(Self::default());
        }
        let mapping: serde_yaml::Mapping =
            serde_yaml::from_value(document).map_err(yaml_error)?;

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, definition) in mapping {
            let name = match key {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                other => return Err(Error::TargetKey(format!("{other:?}"))),
            };
            entries.push(TargetEntry::new(name, definition));
        }
        Ok(Self { entries })
    }

    /// Keeps only the named targets, in document order.
    ///
    /// Fails if a name does not match any target.
    pub fn select(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.entries.iter().any(|e| &e.name == *name))
        {
            return Err(Error::UnknownTarget(unknown.clone()));
        }
        let entries = self
            .entries
            .into_iter()
            .filter(|e| names.contains(&e.name))
            .collect();
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Global configuration plus target definitions, loaded once per run.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pub global: GlobalConfig,
    pub targets: Targets,
}

impl ConfigStore {
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        Ok(Self {
            global: GlobalConfig::load(&paths.config)?,
            targets: Targets::load(&paths.targets)?,
        })
    }
}

/// Locations of the two configuration documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub config: PathBuf,
    pub targets: PathBuf,
}

impl ConfigPaths {
    /// Resolves both files. Explicit paths win, then the working directory,
    /// then the platform configuration directory.
    pub fn locate(config: Option<PathBuf>, targets: Option<PathBuf>) -> Self {
        Self {
            config: config.unwrap_or_else(|| default_file(CONFIG_NAME)),
            targets: targets.unwrap_or_else(|| default_file(TARGETS_NAME)),
        }
    }
}

fn default_file(name: &str) -> PathBuf {
    let local = PathBuf::from(name);
    if local.exists() {
        return local;
    }
    match config_dir() {
        Some(dir) if dir.join(name).exists() => dir.join(name),
        _ => local,
    }
}

/// Returns the configuration directory for the application, platform-specific.
#[cfg(not(target_os = "macos"))]
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(PKG_NAME))
}

/// Returns the configuration directory for the application, platform-specific.
#[cfg(target_os = "macos")]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|dir| dir.join(".config").join(PKG_NAME))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("test.toml")
    }

    #[test]
    fn test_global_defaults() {
        let config = GlobalConfig::from_toml("[global]\nbackuproot = \"/bk\"\n", origin()).unwrap();
        assert_eq!(config, GlobalConfig::new("/bk"));
        assert_eq!(config.mkdir, "mkdir");
        assert_eq!(config.rsync, "rsync");
        assert_eq!(config.rsync_option, "");
        assert!(config.backup_hidden_files);
        assert!(config.strict);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_global_overrides() {
        let text = r#"
[global]
backuproot = "/srv/backup"
mkdir = "/bin/mkdir"
rsync = "/usr/bin/rsync"
rsyncoption = "-a --delete"
backuphiddenfiles = "no"
logfile = "/var/log/rbackup.log"
loglevel = "DEBUG"
strict = false
"#;
        let config = GlobalConfig::from_toml(text, origin()).unwrap();
        assert_eq!(config.backup_root, PathBuf::from("/srv/backup"));
        assert_eq!(config.mkdir, "/bin/mkdir");
        assert_eq!(config.rsync, "/usr/bin/rsync");
        assert_eq!(config.rsync_option, "-a --delete");
        assert!(!config.backup_hidden_files);
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/rbackup.log")));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(!config.strict);
    }

    #[test]
    fn test_missing_backup_root() {
        let res = GlobalConfig::from_toml("[global]\nrsync = \"rsync\"\n", origin());
        assert!(matches!(res, Err(Error::MissingBackupRoot)));

        let res = GlobalConfig::from_toml("", origin());
        assert!(matches!(res, Err(Error::MissingBackupRoot)));
    }

    #[test]
    fn test_invalid_toml() {
        let res = GlobalConfig::from_toml("[global\nbackuproot = ", origin());
        let err = res.unwrap_err();
        assert!(matches!(err, Error::Toml { .. }));
        assert!(err.to_string().contains("test.toml"));
    }

    #[test]
    fn test_flag_tokens() {
        for token in ["true", "TRUE", "yes", "Yes", "on", "1", " true "] {
            assert!(Flag::Text(token.to_string()).value(), "{token}");
        }
        for token in ["false", "no", "off", "0", "", "enabled"] {
            assert!(!Flag::Text(token.to_string()).value(), "{token}");
        }
        assert!(Flag::Bool(true).value());
        assert!(!Flag::Bool(false).value());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("Info"), LogLevel::Info);
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warning);
        assert_eq!(LogLevel::parse("error"), LogLevel::Error);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
        assert_eq!(LogLevel::parse(""), LogLevel::Info);
    }

    #[test]
    fn test_sync_options_joined() {
        let list = SyncOptions::List(vec!["-v".to_string(), "-z".to_string()]);
        assert_eq!(list.joined(), "-v -z");
        let scalar = SyncOptions::Scalar("-av".to_string());
        assert_eq!(scalar.joined(), "-av");
    }

    #[test]
    fn test_targets_keep_document_order() {
        let text = r#"
zeta:
  fileset:
    include: [/z]
alpha:
  fileset:
    include: [/a]
mid:
  fileset:
    include: [/m]
"#;
        let targets = Targets::from_yaml(text, Path::new("targets.yaml")).unwrap();
        let names: Vec<&str> = targets.iter().map(TargetEntry::name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_target_config_fields() {
        let text = r#"
alice:
  host: alice.example.org
  dest: /bk/all
  backuproot: /other
  option: [-v, -z]
  backuphiddenfiles: false
  log: /var/log/alice.log
  fileset:
    include:
      - /home/alice/docs
    exclude:
      - /home/alice/docs/tmp
"#;
        let targets = Targets::from_yaml(text, Path::new("targets.yaml")).unwrap();
        let entry = targets.iter().next().unwrap();
        let config = entry.config().unwrap();
        assert_eq!(config.host("alice"), "alice.example.org");
        assert_eq!(config.dest, Some(PathBuf::from("/bk/all")));
        assert_eq!(config.option_string(), "-v -z");
        assert!(!config.backup_hidden_files(&GlobalConfig::new("/bk")));
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/alice.log")));
        assert_eq!(
            config.destination_root("alice", &GlobalConfig::new("/bk")),
            PathBuf::from("/other/alice")
        );
        let fileset = config.fileset().unwrap();
        assert_eq!(fileset.include, vec!["/home/alice/docs"]);
        assert_eq!(fileset.exclude, vec!["/home/alice/docs/tmp"]);
    }

    #[test]
    fn test_target_fallbacks() {
        let global = GlobalConfig::new("/bk");
        let config = TargetConfig::default();
        assert_eq!(config.host("bob"), "bob");
        assert_eq!(config.option_string(), "");
        assert!(config.backup_hidden_files(&global));
        assert_eq!(
            config.destination_root("bob", &global),
            PathBuf::from("/bk/bob")
        );
        assert!(matches!(config.fileset(), Err(Error::MissingFileset)));
    }

    #[test]
    fn test_fileset_fields_default_to_empty() {
        let text = "carol:\n  fileset:\n    include: [/etc]\n";
        let targets = Targets::from_yaml(text, Path::new("targets.yaml")).unwrap();
        let config = targets.iter().next().unwrap().config().unwrap();
        let fileset = config.fileset().unwrap();
        assert_eq!(fileset.include, vec!["/etc"]);
        assert!(fileset.exclude.is_empty());
    }

    #[test]
    fn test_malformed_target_fails_lazily() {
        let text = r#"
broken:
  fileset: "not a mapping"
good:
  fileset:
    include: [/srv]
"#;
        let targets = Targets::from_yaml(text, Path::new("targets.yaml")).unwrap();
        assert_eq!(targets.len(), 2);
        let mut iter = targets.iter();
        let broken = iter.next().unwrap().config();
        assert!(matches!(broken, Err(Error::TargetDefinition(_))));
        assert!(iter.next().unwrap().config().is_ok());
    }

    #[test]
    fn test_empty_targets_document() {
        let targets = Targets::from_yaml("", Path::new("targets.yaml")).unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn test_non_mapping_targets_document() {
        let res = Targets::from_yaml("- a\n- b\n", Path::new("targets.yaml"));
        assert!(matches!(res, Err(Error::Yaml { .. })));
    }

    #[test]
    fn test_select_targets() {
        let text = "a:\n  fileset: {}\nb:\n  fileset: {}\nc:\n  fileset: {}\n";
        let targets = Targets::from_yaml(text, Path::new("targets.yaml")).unwrap();
        let selected = targets
            .clone()
            .select(&["c".to_string(), "a".to_string()])
            .unwrap();
        let names: Vec<&str> = selected.iter().map(TargetEntry::name).collect();
        assert_eq!(names, vec!["a", "c"]);

        let res = targets.select(&["nope".to_string()]);
        assert!(matches!(res, Err(Error::UnknownTarget(name)) if name == "nope"));
    }

    #[test]
    fn test_locate_prefers_explicit_paths() {
        let paths = ConfigPaths::locate(
            Some(PathBuf::from("/etc/rbackup/backup.toml")),
            Some(PathBuf::from("/etc/rbackup/targets.yaml")),
        );
        assert_eq!(paths.config, PathBuf::from("/etc/rbackup/backup.toml"));
        assert_eq!(paths.targets, PathBuf::from("/etc/rbackup/targets.yaml"));
    }

    #[test]
    fn test_config_store_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join(CONFIG_NAME);
        let targets = dir.path().join(TARGETS_NAME);
        fs::write(&config, "[global]\nbackuproot = \"/bk\"\n").unwrap();
        fs::write(&targets, "host1:\n  fileset:\n    include: [/etc]\n").unwrap();

        let store = ConfigStore::load(&ConfigPaths::locate(Some(config), Some(targets))).unwrap();
        assert_eq!(store.global.backup_root, PathBuf::from("/bk"));
        assert_eq!(store.targets.len(), 1);
    }

    #[test]
    fn test_config_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::locate(
            Some(dir.path().join("missing.toml")),
            Some(dir.path().join("missing.yaml")),
        );
        let err = ConfigStore::load(&paths).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }
}
