//! Runs the registered adapters over a parsed project.
//!
//! Per-file extraction is independent (each adapter call owns its own scope
//! context) and may run on the rayon pool. Results are gathered back in file
//! order before canonicalization, so a parallel run produces exactly the route
//! table of a sequential one.

use crate::engine::canonicalize::{canonicalize, CanonicalizeOptions};
use crate::engine::schema_walker::{SchemaNode, SchemaRegistry};
use crate::extractor::ExtractorRegistry;
use crate::lang::rust::ProjectIndex;
use crate::model::{Diagnostic, Framework, RouteCandidate, RouteDescriptor};
use crate::parser::SourceFile;
use log::{debug, info, warn};
use rayon::prelude::*;

/// Engine-facing settings derived from the command line.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub canonicalize: CanonicalizeOptions,
    /// Extract files on the rayon thread pool
    pub parallel: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            canonicalize: CanonicalizeOptions::default(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub files: usize,
    /// Files at least one adapter recognized
    pub matched_files: usize,
    pub candidates: usize,
    pub routes: usize,
    pub schemas: usize,
}

/// Everything one run produced.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub routes: Vec<RouteDescriptor>,
    pub schemas: SchemaRegistry,
    pub diagnostics: Vec<Diagnostic>,
    /// Frameworks whose probe matched at least one file, in registry order
    pub frameworks: Vec<Framework>,
    pub stats: ExtractionStats,
}

/// Output of one file, before merging
#[derive(Default)]
struct FileOutput {
    candidates: Vec<RouteCandidate>,
    schemas: Vec<(String, SchemaNode)>,
    diagnostics: Vec<Diagnostic>,
    frameworks: Vec<Framework>,
}

pub struct ExtractionDriver {
    registry: ExtractorRegistry,
    options: ExtractionOptions,
}

impl ExtractionDriver {
    pub fn new(registry: ExtractorRegistry, options: ExtractionOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Extract, merge and canonicalize the routes of `files`.
    ///
    /// # Arguments
    ///
    /// * `files` - Successfully parsed source files, in scan order
    ///
    /// # Returns
    ///
    /// The canonical route table, every named schema that was discovered, and
    /// the diagnostics of constructs that had to be skipped.
    pub fn run(&self, files: &[SourceFile]) -> ExtractionReport {
        info!(
            "Extracting routes from {} files with {} adapters",
            files.len(),
            self.registry.len()
        );

        let index = ProjectIndex::build(files);

        let outputs: Vec<FileOutput> = if self.options.parallel {
            files
                .par_iter()
                .map(|file| self.extract_file(file, &index))
                .collect()
        } else {
            files
                .iter()
                .map(|file| self.extract_file(file, &index))
                .collect()
        };

        let mut report = ExtractionReport::default();
        let mut candidates = Vec::new();
        report.stats.files = files.len();

        for output in outputs {
            if !output.frameworks.is_empty() {
                report.stats.matched_files += 1;
            }
            for framework in output.frameworks {
                if !report.frameworks.contains(&framework) {
                    report.frameworks.push(framework);
                }
            }
            for (name, schema) in output.schemas {
                report.schemas.insert(name, schema);
            }
            candidates.extend(output.candidates);
            report.diagnostics.extend(output.diagnostics);
        }
        report
            .frameworks
            .sort_by_key(|f| self.registry.iter().position(|e| e.framework() == *f));

        report.stats.candidates = candidates.len();
        report.routes = canonicalize(candidates, &self.options.canonicalize);
        report.stats.routes = report.routes.len();
        report.stats.schemas = report.schemas.len();

        info!(
            "Found {} routes and {} schemas ({} diagnostics)",
            report.stats.routes,
            report.stats.schemas,
            report.diagnostics.len()
        );

        report
    }

    fn extract_file(&self, file: &SourceFile, index: &ProjectIndex) -> FileOutput {
        let mut output = FileOutput::default();

        // Schemas come from the first adapter reading the file's language,
        // whether or not the file itself declares routes
        if let Some(extractor) = self
            .registry
            .iter()
            .find(|e| e.languages().contains(&file.language))
        {
            output.schemas = extractor.extract_schemas(file);
        }

        for extractor in self.registry.iter() {
            if !extractor.languages().contains(&file.language) || !extractor.probe(file) {
                continue;
            }
            debug!(
                "{} matched {:?}",
                file.path.display(),
                extractor.framework()
            );

            let extraction = extractor.extract_routes(file, index);
            for diagnostic in &extraction.diagnostics {
                warn!("{}", diagnostic);
            }
            output.frameworks.push(extractor.framework());
            output.candidates.extend(extraction.candidates);
            output.diagnostics.extend(extraction.diagnostics);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpMethod, Language};
    use pretty_assertions::assert_eq;

    fn source(path: &str, language: Language, code: &str) -> SourceFile {
        SourceFile::from_source(path, language, code.to_string()).unwrap()
    }

    fn routes(report: &ExtractionReport) -> Vec<(HttpMethod, String)> {
        report
            .routes
            .iter()
            .map(|r| (r.method, r.path_string()))
            .collect()
    }

    fn project() -> Vec<SourceFile> {
        vec![
            source(
                "main.go",
                Language::Go,
                r#"
package main

import "github.com/gin-gonic/gin"

func main() {
    r := gin.Default()
    api := r.Group("/api")
    api.GET("/users", listUsers)
    api.GET("/users", listUsersAgain)
}
"#,
            ),
            source(
                "models.go",
                Language::Go,
                "package main\n\ntype User struct {\n    ID int `json:\"id\"`\n}\n",
            ),
            source(
                "app.py",
                Language::Python,
                "from flask import Flask\napp = Flask(__name__)\n\n@app.route('/health')\ndef health():\n    return 'ok'\n",
            ),
            source("notes.js", Language::JavaScript, "console.log('no framework here')\n"),
        ]
    }

    #[test]
    fn test_run_merges_files_in_order() {
        let driver = ExtractionDriver::new(ExtractorRegistry::with_all(), ExtractionOptions::default());
        let report = driver.run(&project());

        assert_eq!(
            routes(&report),
            vec![
                (HttpMethod::Get, "/api/users".to_string()),
                (HttpMethod::Get, "/health".to_string()),
            ]
        );
        assert_eq!(report.frameworks, vec![Framework::Gin, Framework::Flask]);
        assert!(report.schemas.contains("User"));
        assert_eq!(
            report.stats,
            ExtractionStats {
                files: 4,
                matched_files: 2,
                candidates: 3,
                routes: 2,
                schemas: 1,
            }
        );
    }

    #[test]
    fn test_parallel_and_sequential_runs_agree() {
        let files = project();
        let parallel = ExtractionDriver::new(ExtractorRegistry::with_all(), ExtractionOptions::default())
            .run(&files);
        let sequential = ExtractionDriver::new(
            ExtractorRegistry::with_all(),
            ExtractionOptions {
                parallel: false,
                ..ExtractionOptions::default()
            },
        )
        .run(&files);

        assert_eq!(parallel.routes, sequential.routes);
        assert_eq!(parallel.diagnostics, sequential.diagnostics);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_rust_files_extract_on_the_thread_pool() {
        assert_send_sync::<SourceFile>();

        let files: Vec<SourceFile> = ["users", "orders", "items"]
            .iter()
            .map(|name| {
                let code = format!(
                    "use axum::{{Router, routing::get}};\nfn app() -> Router {{ Router::new().route(\"/{}\", get(list)) }}\n",
                    name
                );
                SourceFile::from_source(format!("src/{}.rs", name), Language::Rust, code).unwrap()
            })
            .collect();
        let report = ExtractionDriver::new(ExtractorRegistry::with_all(), ExtractionOptions::default())
            .run(&files);

        let paths: Vec<String> = report.routes.iter().map(|r| r.path_string()).collect();
        assert_eq!(paths, vec!["/users", "/orders", "/items"]);
        assert_eq!(report.frameworks, vec![Framework::Axum]);
    }

    #[test]
    fn test_restricted_registry_ignores_other_frameworks() {
        let driver = ExtractionDriver::new(
            ExtractorRegistry::for_frameworks(&[Framework::Flask]),
            ExtractionOptions::default(),
        );
        let report = driver.run(&project());

        assert_eq!(routes(&report), vec![(HttpMethod::Get, "/health".to_string())]);
        assert!(report.schemas.is_empty());
    }

    #[test]
    fn test_servant_diagnostics_are_collected() {
        let files = vec![source(
            "Api.hs",
            Language::Haskell,
            "import Servant\n\ntype Broken = \"a\" :> Get '[JSON] Int)\ntype Fine = \"b\" :> Get '[JSON] Int\n",
        )];
        let driver = ExtractionDriver::new(ExtractorRegistry::with_all(), ExtractionOptions::default());
        let report = driver.run(&files);

        assert_eq!(routes(&report), vec![(HttpMethod::Get, "/b".to_string())]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].location.line, 3);
    }
}
