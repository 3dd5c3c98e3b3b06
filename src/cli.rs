use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show per-document details
    Verbose,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Summary,
}

/// Schema-driven YANG XML document checker and normalizer
#[derive(Parser, Debug, Clone)]
#[command(name = "yang-xml-codec")]
#[command(about = "Parse YANG-modelled XML documents against a resolved schema")]
#[command(version)]
pub struct Cli {
    /// Document or directory to process
    #[arg(help = "XML document or directory of documents")]
    pub path: PathBuf,

    /// Resolved schema description (JSON or TOML)
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,

    /// Top-level schema node the documents are instances of, in `{namespace}local`
    /// form. Without it the root element is treated as a datastore wrapper.
    #[arg(short = 'r', long = "root")]
    pub root: Option<String>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// File extensions to process (comma-separated)
    #[arg(
        short = 'e',
        long = "extensions",
        help = "File extensions to process (e.g., 'xml,netconf')"
    )]
    pub extensions: Option<String>,

    /// Skip elements that are not in the schema instead of failing
    #[arg(long = "lenient")]
    pub lenient: bool,

    /// Re-emit every document canonically on stdout
    #[arg(long = "normalize")]
    pub normalize: bool,

    /// Emit children in schema order when normalizing
    #[arg(long = "schema-order", requires = "normalize")]
    pub schema_order: bool,

    /// Indentation for normalized output
    #[arg(long = "indent")]
    pub indent: Option<usize>,

    /// Number of worker threads
    #[arg(short = 't', long = "threads", help = "Number of worker threads")]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (failures only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Report format
    #[arg(short = 'f', long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Extensions given on the command line, if any
    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Path does not exist: {}", self.path.display()));
        }
        if !self.schema.is_file() {
            return Err(format!("Schema file does not exist: {}", self.schema.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}
