use crate::cli::{Cli, OutputFormat};
use crate::xml::WriteOrdering;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const ENV_PREFIX: &str = "YANG_XML_CODEC";
const APP_DIR: &str = "yang-xml-codec";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub parser: ParserConfig,
    pub writer: WriterConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
    /// Number of worker threads; defaults to the number of CPUs
    pub threads: Option<usize>,
}

/// Parser settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Fail on elements that are not in the schema
    pub strict: bool,
}

/// Writer settings used by `--normalize`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WriterConfig {
    pub ordering: WriteOrdering,
    /// Spaces per nesting level; unset writes everything on one line
    pub indent: Option<usize>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormatConfig,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (failures only)
    pub quiet: bool,
}

/// File processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// File extensions to process
    pub extensions: Vec<String>,
    /// Include patterns (glob syntax)
    pub include_patterns: Vec<String>,
    /// Exclude patterns (glob syntax)
    pub exclude_patterns: Vec<String>,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    Human,
    Json,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }
}

fn env_key(name: &str) -> String {
    format!("{}_{}", ENV_PREFIX, name)
}

fn parse_env<T: std::str::FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
    let key = env_key(name);
    match env.get(&key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, raw))),
        None => Ok(None),
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli)
    }

    pub fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path)?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file()? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in the current directory, then the user
    /// config directory
    pub fn find_config_file() -> Result<Option<Config>> {
        let mut candidates = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(APP_DIR));
        }
        for dir in candidates {
            if let Some(path) = Self::find_config_in(&dir) {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }
        Ok(None)
    }

    /// First known configuration file name present in `dir`
    pub fn find_config_in(dir: &Path) -> Option<PathBuf> {
        let config_names = [
            "yang-xml-codec.toml",
            "yang-xml-codec.json",
            ".yang-xml-codec.toml",
            ".yang-xml-codec.json",
        ];
        config_names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(threads) = parse_env(env, "THREADS")? {
            config.threads = Some(threads);
        }

        // Parser settings
        if let Some(strict) = parse_env(env, "STRICT")? {
            config.parser.strict = strict;
        }

        // Writer settings
        let ordering_key = env_key("ORDERING");
        if let Some(ordering) = env.get(&ordering_key) {
            config.writer.ordering = match ordering.trim().to_lowercase().as_str() {
                "insertion" => WriteOrdering::Insertion,
                "schema" => WriteOrdering::Schema,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {} value: {}",
                        ordering_key, ordering
                    )));
                }
            };
        }
        if let Some(indent) = parse_env(env, "INDENT")? {
            config.writer.indent = Some(indent);
        }

        // Output settings
        if let Some(verbose) = parse_env(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = parse_env(env, "QUIET")? {
            config.output.quiet = quiet;
        }
        let format_key = env_key("FORMAT");
        if let Some(format) = env.get(&format_key) {
            config.output.format = match format.trim().to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                "summary" => OutputFormatConfig::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {} value: {}",
                        format_key, format
                    )));
                }
            };
        }

        // File settings
        if let Some(extensions) = env.get(&env_key("EXTENSIONS")) {
            config.files.extensions = extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.threads.is_some() {
            config.threads = cli.threads;
        }

        // Parser settings
        if cli.lenient {
            config.parser.strict = false;
        }

        // Writer settings
        if cli.schema_order {
            config.writer.ordering = WriteOrdering::Schema;
        }
        if cli.indent.is_some() {
            config.writer.indent = cli.indent;
        }

        // Output settings
        if let Some(format) = cli.output_format {
            config.output.format = format.into();
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        // File settings
        if let Some(extensions) = cli.get_extensions() {
            config.files.extensions = extensions;
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }

        config
    }

    /// Merge two configurations (second takes precedence for set values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        if override_config.threads.is_some() {
            base.threads = override_config.threads;
        }

        base.parser = override_config.parser;

        base.writer.ordering = override_config.writer.ordering;
        if override_config.writer.indent.is_some() {
            base.writer.indent = override_config.writer.indent;
        }

        base.output = override_config.output;

        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        if !override_config.files.include_patterns.is_empty() {
            base.files.include_patterns = override_config.files.include_patterns;
        }
        if !override_config.files.exclude_patterns.is_empty() {
            base.files.exclude_patterns = override_config.files.exclude_patterns;
        }

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if let Some(indent) = config.writer.indent
            && indent > 16
        {
            return Err(ConfigError::Validation(
                "Indentation cannot exceed 16 spaces".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        Ok(())
    }

    /// Get the effective thread count
    pub fn get_thread_count(config: &Config) -> usize {
        config.threads.unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.threads, None);
        assert!(config.parser.strict);
        assert_eq!(config.writer.ordering, WriteOrdering::Insertion);
        assert_eq!(config.writer.indent, None);
        assert_eq!(config.output.format, OutputFormatConfig::Human);
        assert!(!config.output.verbose);
        assert!(!config.output.quiet);
        assert_eq!(config.files.extensions, vec!["xml"]);
        assert!(config.files.include_patterns.is_empty());
        assert!(config.files.exclude_patterns.is_empty());
    }

    #[test]
    fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
threads = 8

[parser]
strict = false

[writer]
ordering = "schema"
indent = 2

[output]
format = "json"
verbose = true
quiet = false

[files]
extensions = ["xml", "netconf"]
include_patterns = ["*.xml"]
exclude_patterns = ["*.bak"]
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert_eq!(config.threads, Some(8));
        assert!(!config.parser.strict);
        assert_eq!(config.writer.ordering, WriteOrdering::Schema);
        assert_eq!(config.writer.indent, Some(2));
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert!(config.output.verbose);
        assert_eq!(config.files.extensions, vec!["xml", "netconf"]);
        assert_eq!(config.files.include_patterns, vec!["*.xml"]);
        assert_eq!(config.files.exclude_patterns, vec!["*.bak"]);
    }

    #[test]
    fn test_load_partial_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, r#"{ "output": { "format": "summary", "quiet": true } }"#).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert_eq!(config.output.format, OutputFormatConfig::Summary);
        assert!(config.output.quiet);
        assert!(config.parser.strict);
        assert_eq!(config.files.extensions, vec!["xml"]);
    }

    #[test]
    fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "invalid: yaml").unwrap();

        match ConfigManager::load_from_file(&config_path).unwrap_err() {
            ConfigError::UnsupportedFormat(ext) => assert_eq!(ext, "yaml"),
            other => panic!("Expected UnsupportedFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_toml_and_json() {
        let temp_dir = TempDir::new().unwrap();
        let toml_path = temp_dir.path().join("config.toml");
        fs::write(&toml_path, "invalid toml [[[").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&toml_path).unwrap_err(),
            ConfigError::TomlParsing(_)
        ));

        let json_path = temp_dir.path().join("config.json");
        fs::write(&json_path, "{ invalid json }").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&json_path).unwrap_err(),
            ConfigError::JsonParsing(_)
        ));
    }

    #[test]
    fn test_find_config_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(ConfigManager::find_config_in(temp_dir.path()), None);

        let hidden = temp_dir.path().join(".yang-xml-codec.json");
        fs::write(&hidden, "{}").unwrap();
        assert_eq!(ConfigManager::find_config_in(temp_dir.path()), Some(hidden));

        let visible = temp_dir.path().join("yang-xml-codec.toml");
        fs::write(&visible, "").unwrap();
        assert_eq!(ConfigManager::find_config_in(temp_dir.path()), Some(visible));
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("YANG_XML_CODEC_THREADS", "16");
        mock_env.set("YANG_XML_CODEC_STRICT", "false");
        mock_env.set("YANG_XML_CODEC_ORDERING", "Schema");
        mock_env.set("YANG_XML_CODEC_INDENT", "4");
        mock_env.set("YANG_XML_CODEC_VERBOSE", "true");
        mock_env.set("YANG_XML_CODEC_FORMAT", "json");
        mock_env.set("YANG_XML_CODEC_EXTENSIONS", "xml,netconf");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, Config::default()).unwrap();

        assert_eq!(config.threads, Some(16));
        assert!(!config.parser.strict);
        assert_eq!(config.writer.ordering, WriteOrdering::Schema);
        assert_eq!(config.writer.indent, Some(4));
        assert!(config.output.verbose);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert_eq!(config.files.extensions, vec!["xml", "netconf"]);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("YANG_XML_CODEC_THREADS", "invalid");
        let err = ConfigManager::apply_environment_overrides_with(&mock_env, Config::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Environment(_)));
        assert!(err.to_string().contains("YANG_XML_CODEC_THREADS"));

        let mut mock_env = MockEnvProvider::default();
        mock_env.set("YANG_XML_CODEC_ORDERING", "random");
        assert!(
            ConfigManager::apply_environment_overrides_with(&mock_env, Config::default()).is_err()
        );
    }

    #[test]
    fn test_merge_with_cli() {
        let cli = Cli::try_parse_from([
            "yang-xml-codec",
            "--schema",
            "schema.json",
            "--threads",
            "12",
            "--lenient",
            "--normalize",
            "--schema-order",
            "--indent",
            "2",
            "--extensions",
            "xml,netconf",
            "--format",
            "summary",
            "/tmp",
        ])
        .unwrap();
        let config = ConfigManager::merge_with_cli(Config::default(), &cli);

        assert_eq!(config.threads, Some(12));
        assert!(!config.parser.strict);
        assert_eq!(config.writer.ordering, WriteOrdering::Schema);
        assert_eq!(config.writer.indent, Some(2));
        assert_eq!(config.files.extensions, vec!["xml", "netconf"]);
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
    }

    #[test]
    fn test_cli_defaults_keep_file_settings() {
        let mut file_config = Config::default();
        file_config.output.format = OutputFormatConfig::Json;
        file_config.files.extensions = vec!["netconf".to_string()];

        let cli = Cli::try_parse_from(["yang-xml-codec", "-s", "schema.json", "/tmp"]).unwrap();
        let config = ConfigManager::merge_with_cli(file_config, &cli);

        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert_eq!(config.files.extensions, vec!["netconf"]);
    }

    #[test]
    fn test_merge_configs() {
        let mut base = Config::default();
        base.threads = Some(4);
        base.writer.indent = Some(2);

        let mut override_config = Config::default();
        override_config.threads = Some(8);
        override_config.parser.strict = false;

        let merged = ConfigManager::merge_configs(base, override_config);

        assert_eq!(merged.threads, Some(8));
        assert!(!merged.parser.strict);
        assert_eq!(merged.writer.indent, Some(2));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.threads = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.threads = Some(1001);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.threads = Some(4);

        config.writer.indent = Some(40);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.writer.indent = Some(2);

        config.output.verbose = true;
        config.output.quiet = true;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.output.quiet = false;

        config.files.extensions = vec![];
        assert!(ConfigManager::validate_config(&config).is_err());
        config.files.extensions = vec!["invalid/ext".to_string()];
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_thread_count() {
        let mut config = Config::default();
        assert!(ConfigManager::get_thread_count(&config) >= 1);
        config.threads = Some(3);
        assert_eq!(ConfigManager::get_thread_count(&config), 3);
    }

    #[test]
    fn test_load_config_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(
            &config_path,
            r#"
threads = 6

[parser]
strict = true

[output]
format = "summary"
"#,
        )
        .unwrap();

        let mut mock_env = MockEnvProvider::default();
        mock_env.set("YANG_XML_CODEC_STRICT", "false");
        mock_env.set("YANG_XML_CODEC_THREADS", "7");

        let cli = Cli::try_parse_from([
            "yang-xml-codec",
            "--schema",
            "schema.json",
            "--config",
            config_path.to_str().unwrap(),
            "--threads",
            "8",
            temp_dir.path().to_str().unwrap(),
        ])
        .unwrap();
        let config = ConfigManager::load_config_with(&mock_env, &cli).unwrap();

        assert_eq!(config.threads, Some(8));
        assert!(!config.parser.strict);
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
    }

    #[test]
    fn test_output_format_conversion() {
        for format in [OutputFormat::Human, OutputFormat::Json, OutputFormat::Summary] {
            assert_eq!(OutputFormat::from(OutputFormatConfig::from(format)), format);
        }
    }
}
