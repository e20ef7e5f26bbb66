use crate::error::Error;
use crate::model::Language;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Source parser for every supported language.
///
/// Rust files are checked with `syn` up front so that a file with broken syntax
/// is skipped as a whole. Every file keeps only its text: the Rust adapters
/// parse it again with [`SourceFile::syntax`], the others build pseudo-trees
/// from it on demand (see [`crate::lang::tokens`]).
///
/// # Example
///
/// ```no_run
/// use routescope::parser::SourceParser;
/// use std::path::Path;
///
/// let parsed = SourceParser::parse_file(Path::new("src/main.rs")).unwrap();
/// println!("{} is {:?}", parsed.path.display(), parsed.language);
/// ```
pub struct SourceParser;

/// A successfully read (and, for Rust, syntax-checked) source file.
///
/// Holds no `syn` tree: those contain `proc_macro2` spans, which are not
/// `Sync`, and files are shared across the extraction thread pool.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path to the source file
    pub path: PathBuf,
    pub language: Language,
    /// Raw file content
    pub source: String,
}

impl SourceFile {
    /// Build a source file from in-memory text.
    ///
    /// # Errors
    ///
    /// Returns an error if the language is Rust and the text is not valid Rust syntax.
    pub fn from_source(path: impl Into<PathBuf>, language: Language, source: String) -> Result<Self> {
        let path = path.into();
        if language == Language::Rust {
            syn::parse_file(&source)
                .map_err(|e| Error::Parse {
                    file: path.clone(),
                    message: e.to_string(),
                })
                .with_context(|| {
                    format!("Failed to parse Rust syntax in file: {}", path.display())
                })?;
        }

        Ok(Self {
            path,
            language,
            source,
        })
    }

    /// The `syn` tree of a Rust file, `None` for every other language
    pub fn syntax(&self) -> Option<syn::File> {
        if self.language != Language::Rust {
            return None;
        }
        match syn::parse_file(&self.source) {
            Ok(ast) => Some(ast),
            Err(e) => {
                warn!("Skipping {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl SourceParser {
    /// Reads a single source file and parses it when it is Rust.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file extension is not a supported language
    /// - The file cannot be read
    /// - The file is Rust and contains invalid syntax
    pub fn parse_file(path: &Path) -> Result<SourceFile> {
        debug!("Parsing file: {}", path.display());

        let language = Language::from_path(path)
            .with_context(|| format!("Unsupported source file: {}", path.display()))?;

        let content = fs::read_to_string(path)
            .map_err(Error::from)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let parsed = SourceFile::from_source(path, language, content)?;
        debug!("Successfully parsed file: {}", path.display());
        Ok(parsed)
    }

    /// Parses multiple source files, continuing even if some fail.
    ///
    /// Files that fail are logged as warnings and returned as `Err`, so one broken
    /// file never hides the routes of the others.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<SourceFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<SourceFile>> = paths
            .iter()
            .map(|path| match Self::parse_file(path) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    Err(e)
                }
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}
