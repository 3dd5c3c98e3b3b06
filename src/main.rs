use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use yang_xml_codec::cli::{Cli, OutputFormat, VerbosityLevel};
use yang_xml_codec::config::{Config, ConfigManager};
use yang_xml_codec::file_discovery::FileDiscovery;
use yang_xml_codec::output::Output;
use yang_xml_codec::qname::QName;
use yang_xml_codec::schema_loader::SchemaLoader;
use yang_xml_codec::validator::{ValidationConfig, ValidationEngine, ValidationResults};

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(&cli) {
        Ok(results) if !results.has_errors() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_logging(config: &Config) {
    let default_level = if config.output.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<ValidationResults> {
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = ConfigManager::load_config(cli).context("Failed to load configuration")?;
    init_logging(&config);
    debug!(?config, "effective configuration");

    let context = SchemaLoader::load(&cli.schema)
        .with_context(|| format!("Failed to load schema {}", cli.schema.display()))?;
    let root = cli
        .root
        .as_deref()
        .map(str::parse::<QName>)
        .transpose()
        .context("Invalid --root, expected {namespace}local-name")?;

    let engine_config = ValidationConfig {
        threads: ConfigManager::get_thread_count(&config),
        strict: config.parser.strict,
        normalize: cli.normalize,
        ordering: config.writer.ordering,
        indent: config.writer.indent,
    };
    let engine = ValidationEngine::new(Arc::new(context), root, engine_config)?;

    let discovery = FileDiscovery::new()
        .with_extensions(config.files.extensions.clone())
        .with_include_patterns(config.files.include_patterns.clone())?
        .with_exclude_patterns(config.files.exclude_patterns.clone())?;

    let results = engine.validate_path(&cli.path, &discovery)?;
    info!(
        "Processed {} documents, {} failed",
        results.total_files,
        results.total_files - results.valid_files
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if cli.normalize {
        for result in &results.file_results {
            if let Some(normalized) = &result.normalized {
                writeln!(out, "{}", normalized)?;
            }
        }
    }

    let format: OutputFormat = config.output.format.into();
    let verbosity = if config.output.quiet {
        VerbosityLevel::Quiet
    } else if config.output.verbose {
        VerbosityLevel::Verbose
    } else {
        VerbosityLevel::Normal
    };
    let report = Output::new(format, verbosity).render(&results)?;
    if cli.normalize && format == OutputFormat::Human {
        // Keep stdout for the normalized documents
        eprint!("{}", report);
    } else {
        write!(out, "{}", report)?;
        if format == OutputFormat::Json {
            writeln!(out)?;
        }
    }

    Ok(results)
}
