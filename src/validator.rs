//! Parallel document engine.
//!
//! Discovered documents are parsed against one shared, read-only schema
//! context on a rayon pool. All workers share a single [`CodecRegistry`], so
//! each leaf codec is built once per run no matter how many documents use it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::CodecCacheStats;
use crate::codec::CodecRegistry;
use crate::error::CodecError;
use crate::file_discovery::{DiscoveryError, FileDiscovery};
use crate::qname::QName;
use crate::schema::SchemaContext;
use crate::xml::{WriteOrdering, XmlParser, XmlTreeWriter};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Root node {0} is not a top-level node of the schema")]
    UnknownRoot(QName),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Number of worker threads
    pub threads: usize,
    /// Fail on elements that are not in the schema
    pub strict: bool,
    /// Re-emit every document that parses
    pub normalize: bool,
    pub ordering: WriteOrdering,
    pub indent: Option<usize>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            strict: true,
            normalize: false,
            ordering: WriteOrdering::Insertion,
            indent: None,
        }
    }
}

/// Status of a single document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Parsed (and, when asked, re-emitted) successfully
    Valid,
    /// The codec rejected the document
    Invalid { kind: String },
    /// The document could not be read
    Error { message: String },
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationStatus::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationStatus::Error { .. })
    }
}

/// Result of processing a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationResult {
    pub path: PathBuf,
    pub status: ValidationStatus,
    pub duration: Duration,
    /// Error details if the document failed
    pub error_details: Vec<String>,
    /// Canonical form of the document when normalizing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
}

impl FileValidationResult {
    pub fn valid(path: PathBuf, duration: Duration, normalized: Option<String>) -> Self {
        Self {
            path,
            status: ValidationStatus::Valid,
            duration,
            error_details: Vec::new(),
            normalized,
        }
    }

    pub fn invalid(path: PathBuf, error: &CodecError, duration: Duration) -> Self {
        let mut error_details = vec![error.to_string()];
        if let Some(value) = error.invalid_value() {
            if let Some(tag) = &value.app_tag {
                error_details.push(format!("error-app-tag: {}", tag));
            }
            for (key, info) in &value.info {
                error_details.push(format!("{}: {}", key, info));
            }
        }
        Self {
            path,
            status: ValidationStatus::Invalid {
                kind: error.kind_name().to_string(),
            },
            duration,
            error_details,
            normalized: None,
        }
    }

    pub fn error(path: PathBuf, message: String, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Error {
                message: message.clone(),
            },
            duration,
            error_details: vec![message],
            normalized: None,
        }
    }
}

/// Progress update, emitted after each document
#[derive(Debug, Clone)]
pub struct ValidationProgress {
    pub current_file: PathBuf,
    pub completed: usize,
    pub total: usize,
}

/// Progress callback type for validation updates
pub type ProgressCallback = Arc<dyn Fn(ValidationProgress) + Send + Sync>;

/// Codec cache usage over a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecStats {
    pub codecs_built: u64,
    pub cache_hits: u64,
}

impl From<CodecCacheStats> for CodecStats {
    fn from(stats: CodecCacheStats) -> Self {
        Self {
            codecs_built: stats.misses,
            cache_hits: stats.hits,
        }
    }
}

/// Aggregated results of processing multiple documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResults {
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub error_files: usize,
    /// Wall-clock duration of the run
    pub total_duration: Duration,
    /// Average duration per document
    pub average_duration: Duration,
    pub file_results: Vec<FileValidationResult>,
    pub codec_stats: CodecStats,
}

impl ValidationResults {
    /// Aggregate individual file results into summary
    pub fn aggregate(file_results: Vec<FileValidationResult>, total_duration: Duration) -> Self {
        let total_files = file_results.len();
        let mut valid_files = 0;
        let mut invalid_files = 0;
        let mut error_files = 0;
        let mut busy = Duration::ZERO;

        for result in &file_results {
            match result.status {
                ValidationStatus::Valid => valid_files += 1,
                ValidationStatus::Invalid { .. } => invalid_files += 1,
                ValidationStatus::Error { .. } => error_files += 1,
            }
            busy += result.duration;
        }

        let average_duration = if total_files > 0 {
            busy / total_files as u32
        } else {
            Duration::ZERO
        };

        Self {
            total_files,
            valid_files,
            invalid_files,
            error_files,
            total_duration,
            average_duration,
            file_results,
            codec_stats: CodecStats::default(),
        }
    }

    /// Check if all files parsed successfully
    pub fn all_valid(&self) -> bool {
        self.valid_files == self.total_files && self.total_files > 0
    }

    pub fn has_errors(&self) -> bool {
        self.error_files > 0 || self.invalid_files > 0
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.valid_files as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Parses documents against one schema on a bounded rayon pool
pub struct ValidationEngine {
    context: Arc<SchemaContext>,
    codecs: Arc<CodecRegistry>,
    root: Option<QName>,
    config: ValidationConfig,
}

impl ValidationEngine {
    /// `root` names the top-level schema node documents are instances of;
    /// without it the document element is a datastore wrapper
    pub fn new(
        context: Arc<SchemaContext>,
        root: Option<QName>,
        config: ValidationConfig,
    ) -> Result<Self> {
        if let Some(qname) = &root
            && context.data_child(qname).is_none()
        {
            return Err(EngineError::UnknownRoot(qname.clone()));
        }
        let codecs = Arc::new(CodecRegistry::new(&context));
        Ok(Self {
            context,
            codecs,
            root,
            config,
        })
    }

    /// Discover documents under `path` and process them
    pub fn validate_path(&self, path: &Path, discovery: &FileDiscovery) -> Result<ValidationResults> {
        let files = discovery.discover_files(path)?;
        info!("Discovered {} documents under {}", files.len(), path.display());
        self.validate_files(files, None)
    }

    /// Process `files` in parallel; results keep the input order
    pub fn validate_files(
        &self,
        files: Vec<PathBuf>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<ValidationResults> {
        let start = Instant::now();
        let total = files.len();
        let completed = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()?;

        let file_results: Vec<FileValidationResult> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let result = self.validate_single_file(path);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(callback) = &progress_callback {
                        callback(ValidationProgress {
                            current_file: path.clone(),
                            completed: done,
                            total,
                        });
                    }
                    result
                })
                .collect()
        });

        let mut results = ValidationResults::aggregate(file_results, start.elapsed());
        results.codec_stats = self.codecs.stats().into();
        Ok(results)
    }

    /// Read and process one document
    pub fn validate_single_file(&self, path: &Path) -> FileValidationResult {
        let start = Instant::now();
        let xml = match std::fs::read_to_string(path) {
            Ok(xml) => xml,
            Err(e) => {
                return FileValidationResult::error(
                    path.to_path_buf(),
                    format!("Failed to read {}: {}", path.display(), e),
                    start.elapsed(),
                );
            }
        };

        match self.check_document(&xml) {
            Ok(normalized) => {
                debug!("{} parsed in {:?}", path.display(), start.elapsed());
                FileValidationResult::valid(path.to_path_buf(), start.elapsed(), normalized)
            }
            Err(e) => {
                debug!("{} rejected: {}", path.display(), e);
                FileValidationResult::invalid(path.to_path_buf(), &e, start.elapsed())
            }
        }
    }

    /// Parse `xml` and, when normalizing, write it back out
    pub fn check_document(&self, xml: &str) -> std::result::Result<Option<String>, CodecError> {
        let parser = XmlParser::new(&self.context, &self.codecs).with_strict(self.config.strict);
        let mut writer =
            XmlTreeWriter::new(&self.context, &self.codecs).with_ordering(self.config.ordering);
        if let Some(indent) = self.config.indent {
            writer = writer.with_indent(indent);
        }

        match &self.root {
            Some(qname) => {
                let schema = self.context.data_child(qname).ok_or_else(|| {
                    CodecError::schema_mismatch(format!("Schema node {} does not exist", qname))
                })?;
                let node = parser.parse_str(xml, schema)?;
                if self.config.normalize {
                    return writer.write_to_string(&node, schema).map(Some);
                }
            }
            None => {
                let data = parser.parse_data_str(xml)?;
                if self.config.normalize {
                    return writer.write_data_to_string(&data).map(Some);
                }
            }
        }
        Ok(None)
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn codec_stats(&self) -> CodecCacheStats {
        self.codecs.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        ContainerSchema, DataSchemaNode, LeafSchema, Module, RangeRestriction, TypeDefinition,
    };
    use std::sync::Mutex;
    use tempfile::TempDir;

    const NS: &str = "urn:engine";

    fn context() -> Arc<SchemaContext> {
        let level = TypeDefinition::Uint8 {
            range: Some(RangeRestriction::single(1, 10)),
        };
        let top = ContainerSchema::new(
            QName::new(NS, "top"),
            vec![
                DataSchemaNode::Leaf(LeafSchema::new(QName::new(NS, "name"), TypeDefinition::string())),
                DataSchemaNode::Leaf(LeafSchema::new(QName::new(NS, "level"), level)),
            ],
        );
        Arc::new(SchemaContext::new(
            vec![Module::new("engine", NS, "e")],
            vec![DataSchemaNode::Container(top)],
        ))
    }

    fn engine(root: Option<QName>, normalize: bool) -> ValidationEngine {
        let config = ValidationConfig {
            threads: 2,
            normalize,
            ..ValidationConfig::default()
        };
        ValidationEngine::new(context(), root, config).unwrap()
    }

    #[test]
    fn test_unknown_root_rejected() {
        let result = ValidationEngine::new(
            context(),
            Some(QName::new(NS, "missing")),
            ValidationConfig::default(),
        );
        assert!(matches!(result, Err(EngineError::UnknownRoot(_))));
    }

    #[test]
    fn test_check_document_with_root() {
        let engine = engine(Some(QName::new(NS, "top")), true);
        let normalized = engine
            .check_document(r#"<top xmlns="urn:engine"><level> 3 </level><name>x</name></top>"#)
            .unwrap();
        assert_eq!(
            normalized.as_deref(),
            Some(r#"<top xmlns="urn:engine"><level>3</level><name>x</name></top>"#)
        );
    }

    #[test]
    fn test_check_datastore_document() {
        let engine = engine(None, true);
        let normalized = engine
            .check_document(r#"<data><top xmlns="urn:engine"><name>x</name></top></data>"#)
            .unwrap();
        assert_eq!(
            normalized.as_deref(),
            Some(r#"<data><top xmlns="urn:engine"><name>x</name></top></data>"#)
        );
    }

    #[test]
    fn test_validate_files_in_parallel() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.xml");
        let bad = temp_dir.path().join("bad.xml");
        let missing = temp_dir.path().join("missing.xml");
        std::fs::write(&good, r#"<top xmlns="urn:engine"><level>4</level></top>"#).unwrap();
        std::fs::write(&bad, r#"<top xmlns="urn:engine"><level>40</level></top>"#).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |progress: ValidationProgress| {
            recorder.lock().unwrap().push(progress.completed);
        });

        let engine = engine(Some(QName::new(NS, "top")), false);
        let results = engine
            .validate_files(vec![good.clone(), bad.clone(), missing.clone()], Some(callback))
            .unwrap();

        assert_eq!(results.total_files, 3);
        assert_eq!(results.valid_files, 1);
        assert_eq!(results.invalid_files, 1);
        assert_eq!(results.error_files, 1);
        assert!(results.has_errors());
        assert!(!results.all_valid());

        assert_eq!(results.file_results[0].path, good);
        assert_eq!(
            results.file_results[1].status,
            ValidationStatus::Invalid {
                kind: "invalid-value".to_string()
            }
        );
        assert!(results.file_results[1].error_details[0].contains("[[1..10]]"));
        assert!(results.file_results[2].status.is_error());

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(results.codec_stats.codecs_built, 1);
    }

    #[test]
    fn test_empty_run() {
        let results = engine(None, false).validate_files(Vec::new(), None).unwrap();
        assert_eq!(results.total_files, 0);
        assert_eq!(results.success_rate(), 0.0);
        assert!(!results.all_valid());
    }
}
