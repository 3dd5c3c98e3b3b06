use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Finds the documents to process under a file or directory
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include (e.g., ["xml", "netconf"])
    extensions: Vec<String>,
    /// Include patterns (glob syntax, gitignore-style anchoring)
    include_patterns: Vec<String>,
    /// Exclude patterns
    exclude_patterns: Vec<String>,
    /// Maximum depth below the root, files directly in the root are at depth 0
    max_depth: Option<usize>,
    /// Follow symbolic links
    follow_symlinks: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_depth: None,
            follow_symlinks: false,
        }
    }

    /// Set file extensions to discover
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Only process files matching at least one of `patterns`
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        build_overrides(Path::new("."), &patterns)?;
        self.include_patterns = patterns;
        Ok(self)
    }

    /// Skip files matching any of `patterns`
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        build_overrides(Path::new("."), &patterns)?;
        self.exclude_patterns = patterns;
        Ok(self)
    }

    /// Set maximum traversal depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set whether to follow symbolic links
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Files to process under `path`, sorted; a file path is returned as-is
    /// when it passes the filters
    pub fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = std::fs::metadata(path)?;
        if metadata.is_file() {
            let root = path.parent().unwrap_or_else(|| Path::new("."));
            let filters = self.filters(root)?;
            return Ok(if filters.accepts(self, path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let filters = self.filters(path)?;
        let mut walker = WalkBuilder::new(path);
        walker
            .standard_filters(false)
            .follow_links(self.follow_symlinks)
            .max_depth(self.max_depth.map(|depth| depth + 1))
            .sort_by_file_path(|a, b| a.cmp(b));

        let mut files = Vec::new();
        for entry in walker.build() {
            match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_some_and(|t| t.is_file());
                    if is_file && filters.accepts(self, entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                // Log error but continue processing other files
                Err(e) => warn!("Error walking {}: {}", path.display(), e),
            }
        }
        Ok(files)
    }

    /// Check a file against the extension filter only
    pub fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    fn filters(&self, root: &Path) -> Result<Filters> {
        Ok(Filters {
            include: build_overrides(root, &self.include_patterns)?,
            exclude: build_overrides(root, &self.exclude_patterns)?,
        })
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

struct Filters {
    include: Option<Override>,
    exclude: Option<Override>,
}

impl Filters {
    fn accepts(&self, discovery: &FileDiscovery, path: &Path) -> bool {
        if !discovery.has_extension(path) {
            return false;
        }

        // Check exclude patterns first
        if let Some(exclude) = &self.exclude
            && exclude.matched(path, false).is_whitelist()
        {
            return false;
        }

        // If any include patterns are given, at least one must match
        match &self.include {
            Some(include) => include.matched(path, false).is_whitelist(),
            None => true,
        }
    }
}

fn build_overrides(root: &Path, patterns: &[String]) -> Result<Option<Override>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = OverrideBuilder::new(root);
    for pattern in patterns {
        builder.add(pattern).map_err(|e| DiscoveryError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
    }
    let overrides = builder.build().map_err(|e| DiscoveryError::Pattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })?;
    Ok(Some(overrides))
}
