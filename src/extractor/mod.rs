//! Per-framework route extraction.
//!
//! Every supported framework has one adapter implementing [`FrameworkExtractor`].
//! Adapters only recognize declaration sites and turn them into
//! [`RouteCandidate`]s; prefix resolution, path normalization and
//! deduplication are shared engine code.
//!
//! # Supported Frameworks
//!
//! - **Axum**: See [`axum::AxumExtractor`]
//! - **Actix-Web**: See [`actix::ActixExtractor`]
//! - **Gin**: See [`gin::GinExtractor`]
//! - **Express**: See [`express::ExpressExtractor`]
//! - **Fastify**: See [`fastify::FastifyExtractor`]
//! - **Flask**: See [`flask::FlaskExtractor`]
//! - **FastAPI**: See [`fastapi::FastApiExtractor`]
//! - **Spring**: See [`spring::SpringExtractor`]
//! - **Servant**: See [`servant::ServantExtractor`]
//!
//! # Example
//!
//! ```no_run
//! use routescope::extractor::ExtractorRegistry;
//! use routescope::lang::rust::ProjectIndex;
//! use routescope::parser::SourceParser;
//! use std::path::Path;
//!
//! let file = SourceParser::parse_file(Path::new("src/main.rs")).unwrap();
//! let registry = ExtractorRegistry::with_all();
//! let index = ProjectIndex::new();
//! for extractor in registry.iter().filter(|e| e.probe(&file)) {
//!     let extraction = extractor.extract_routes(&file, &index);
//!     println!("{:?}: {} routes", extractor.framework(), extraction.candidates.len());
//! }
//! ```

pub mod actix;
pub mod axum;
pub mod express;
pub mod fastapi;
pub mod fastify;
pub mod flask;
pub mod gin;
pub mod servant;
pub mod spring;

use crate::engine::schema_walker::SchemaNode;
use crate::lang::rust::ProjectIndex;
use crate::model::{Diagnostic, Framework, Language, RouteCandidate};
use crate::parser::SourceFile;
use clap::ValueEnum;

/// Capability interface of a framework adapter.
///
/// Implementations are stateless values; the same adapter is shared by every
/// worker of a parallel extraction run.
pub trait FrameworkExtractor: Send + Sync {
    fn framework(&self) -> Framework;

    /// Languages this adapter reads
    fn languages(&self) -> &'static [Language];

    /// Whether `file` uses this framework (typically: imports its package)
    fn probe(&self, file: &SourceFile) -> bool;

    /// Route candidates declared in `file`, in source order.
    ///
    /// # Arguments
    ///
    /// * `file` - A file for which [`probe`](Self::probe) returned true
    /// * `index` - Handler signatures of the whole project, for adapters that type
    ///   routes from handler functions
    fn extract_routes(&self, file: &SourceFile, index: &ProjectIndex) -> FileExtraction;

    /// Named schemas declared in `file`
    fn extract_schemas(&self, file: &SourceFile) -> Vec<(String, SchemaNode)>;
}

/// Routes and problems found in one file by one adapter.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub candidates: Vec<RouteCandidate>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileExtraction {
    pub fn new(candidates: Vec<RouteCandidate>) -> Self {
        Self {
            candidates,
            diagnostics: Vec::new(),
        }
    }
}

/// The adapters taking part in one extraction run, in probing order.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn FrameworkExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registry with every supported adapter
    pub fn with_all() -> Self {
        Self::for_frameworks(Framework::value_variants())
    }

    /// Registry restricted to `frameworks`, in the given order
    pub fn for_frameworks(frameworks: &[Framework]) -> Self {
        let mut registry = Self::new();
        for framework in frameworks {
            if !registry.contains(*framework) {
                registry.register(adapter_for(*framework));
            }
        }
        registry
    }

    pub fn register(&mut self, extractor: Box<dyn FrameworkExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn contains(&self, framework: Framework) -> bool {
        self.extractors.iter().any(|e| e.framework() == framework)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn FrameworkExtractor> {
        self.extractors.iter().map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_all()
    }
}

fn adapter_for(framework: Framework) -> Box<dyn FrameworkExtractor> {
    match framework {
        Framework::Axum => Box::new(axum::AxumExtractor),
        Framework::ActixWeb => Box::new(actix::ActixExtractor),
        Framework::Gin => Box::new(gin::GinExtractor),
        Framework::Express => Box::new(express::ExpressExtractor),
        Framework::Fastify => Box::new(fastify::FastifyExtractor),
        Framework::Flask => Box::new(flask::FlaskExtractor),
        Framework::FastApi => Box::new(fastapi::FastApiExtractor),
        Framework::Spring => Box::new(spring::SpringExtractor),
        Framework::Servant => Box::new(servant::ServantExtractor),
    }
}
