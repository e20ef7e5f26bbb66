use crate::engine::canonicalize::{CanonicalizeOptions, DEFAULT_WILDCARD_METHODS};
use crate::engine::driver::{ExtractionDriver, ExtractionOptions, ExtractionReport};
use crate::error::Error;
pub use crate::model::Framework;
use crate::model::HttpMethod;
use crate::openapi_builder::OpenApiDocument;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Static route discovery - generate OpenAPI documentation from web projects
/// written for Axum, Actix-Web, Gin, Express, Fastify, Flask, FastAPI, Spring
/// or Servant
#[derive(Parser, Debug)]
#[command(name = "routescope")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Only run the adapter of this framework; repeat for several (default: auto-detect)
    #[arg(short = 'w', long = "framework", value_enum)]
    pub frameworks: Vec<Framework>,

    /// Title of the generated API
    #[arg(long = "title", value_name = "TITLE")]
    pub title: Option<String>,

    /// Version of the generated API
    #[arg(long = "api-version", value_name = "VERSION")]
    pub api_version: Option<String>,

    /// Methods a catch-all route (`Any`, `all`, `any`) stands for
    #[arg(
        long = "wildcard-methods",
        value_name = "METHODS",
        value_delimiter = ',',
        value_parser = parse_wildcard_method
    )]
    pub wildcard_methods: Vec<HttpMethod>,

    /// Extract files one at a time instead of on the thread pool
    #[arg(long = "sequential")]
    pub sequential: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// The `info` block of the generated document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            description: Some("API documentation generated from source code".to_string()),
        }
    }
}

fn parse_wildcard_method(value: &str) -> std::result::Result<HttpMethod, Error> {
    match HttpMethod::parse(value) {
        Some(method) if !method.is_wildcard() => Ok(method),
        Some(_) => Err(Error::InvalidArgument(format!(
            "`{}` cannot be part of its own expansion",
            value
        ))),
        None => Err(Error::InvalidArgument(format!("unknown HTTP method `{}`", value))),
    }
}

impl CliArgs {
    /// Engine settings selected on the command line
    pub fn extraction_options(&self) -> ExtractionOptions {
        let wildcard_methods = if self.wildcard_methods.is_empty() {
            DEFAULT_WILDCARD_METHODS.to_vec()
        } else {
            let mut methods = Vec::new();
            for method in &self.wildcard_methods {
                if !methods.contains(method) {
                    methods.push(*method);
                }
            }
            methods
        };

        ExtractionOptions {
            canonicalize: CanonicalizeOptions { wildcard_methods },
            parallel: !self.sequential,
        }
    }

    pub fn document_info(&self) -> DocumentInfo {
        let defaults = DocumentInfo::default();
        DocumentInfo {
            title: self.title.clone().unwrap_or(defaults.title),
            version: self.api_version.clone().unwrap_or(defaults.version),
            description: defaults.description,
        }
    }

    /// The registry of adapters this run uses
    pub fn registry(&self) -> crate::extractor::ExtractorRegistry {
        if self.frameworks.is_empty() {
            crate::extractor::ExtractorRegistry::with_all()
        } else {
            crate::extractor::ExtractorRegistry::for_frameworks(&self.frameworks)
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }
    if args.frameworks.is_empty() {
        info!("Framework: auto-detect");
    } else {
        info!("Frameworks: {:?}", args.frameworks);
    }

    Ok(args)
}

/// A generated document together with what the extraction run found
pub struct Generation {
    pub document: OpenApiDocument,
    pub report: ExtractionReport,
}

/// Scan, parse and extract the project, then build its OpenAPI document.
pub fn generate(args: &CliArgs) -> Result<Generation> {
    use crate::detector::FrameworkDetector;
    use crate::openapi_builder::OpenApiBuilder;
    use crate::parser::{SourceFile, SourceParser};
    use crate::scanner::FileScanner;
    use crate::schema_generator::SchemaGenerator;

    // Step 1: Scan directory for source files
    info!("Scanning project directory...");
    let scanner = FileScanner::new(args.project_path.clone());
    let scan_result = scanner.scan()?;

    info!("Found {} source files", scan_result.files.len());
    for warning in &scan_result.warnings {
        warn!("{}", warning);
    }

    if scan_result.files.is_empty() {
        anyhow::bail!("No supported source files found in the project directory");
    }

    // Step 2: Parse files
    info!("Parsing source files...");
    let parsed_files: Vec<SourceFile> = SourceParser::parse_files(&scan_result.files)
        .into_iter()
        .filter_map(|r| match r {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping file: {:#}", e);
                None
            }
        })
        .collect();

    info!("Successfully parsed {} files", parsed_files.len());

    if parsed_files.is_empty() {
        anyhow::bail!("No files could be parsed successfully");
    }

    // Step 3: Probe for frameworks
    let registry = args.registry();
    let detection = FrameworkDetector::detect(&parsed_files, &registry);
    if detection.frameworks.is_empty() {
        if args.frameworks.is_empty() {
            let supported: Vec<String> = Framework::value_variants()
                .iter()
                .filter_map(|f| f.to_possible_value())
                .map(|v| v.get_name().to_string())
                .collect();
            return Err(Error::FrameworkNotDetected).with_context(|| {
                format!(
                    "Please specify a framework using --framework. Supported frameworks: {}",
                    supported.join(", ")
                )
            });
        }
        warn!("None of {:?} is used by the project", args.frameworks);
    } else {
        info!("Detected frameworks: {:?}", detection.frameworks);
    }

    // Step 4: Extract and canonicalize routes
    info!("Extracting routes...");
    let driver = ExtractionDriver::new(registry, args.extraction_options());
    let report = driver.run(&parsed_files);

    if report.routes.is_empty() {
        warn!("No routes found in the project");
    }

    // Step 5: Build OpenAPI document
    info!("Building OpenAPI document...");
    let info = args.document_info();
    let mut schema_gen = SchemaGenerator::new(&report.schemas);
    let mut builder = OpenApiBuilder::new().with_info(info.title, info.version, info.description);
    builder.add_routes(&report.routes, &mut schema_gen);
    let document = builder.build(schema_gen);
    info!("OpenAPI document built successfully");

    Ok(Generation { document, report })
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::serializer::{serialize, write_to_file};

    info!("Starting OpenAPI document generation...");
    let Generation { document, report } = generate(&args)?;

    // Step 6: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = serialize(&document, args.output_format)?;

    // Step 7: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    // Step 8: Display summary
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Files parsed: {}", report.stats.files);
    info!("  - Files with routes: {}", report.stats.matched_files);
    info!("  - Route declarations: {}", report.stats.candidates);
    info!("  - Routes: {}", report.stats.routes);
    info!("  - Schemas: {}", report.stats.schemas);
    info!("  - Diagnostics: {}", report.diagnostics.len());
    info!("  - Frameworks: {:?}", report.frameworks);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("routescope").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = args(&["./project"]);

        assert_eq!(args.project_path, PathBuf::from("./project"));
        assert_eq!(args.output_format, OutputFormat::Yaml);
        assert!(args.output_path.is_none());
        assert!(args.frameworks.is_empty());
        assert!(!args.verbose);

        let options = args.extraction_options();
        assert!(options.parallel);
        assert_eq!(options.canonicalize.wildcard_methods, DEFAULT_WILDCARD_METHODS.to_vec());
        assert_eq!(args.document_info(), DocumentInfo::default());
    }

    #[test]
    fn test_repeated_framework_flag() {
        let args = args(&["-w", "gin", "--framework", "actix-web", "-w", "fastapi", "."]);

        assert_eq!(
            args.frameworks,
            vec![Framework::Gin, Framework::ActixWeb, Framework::FastApi]
        );
        let registered: Vec<Framework> = args.registry().iter().map(|e| e.framework()).collect();
        assert_eq!(registered, args.frameworks);
    }

    #[test]
    fn test_unknown_framework_is_rejected() {
        assert!(CliArgs::try_parse_from(["routescope", "-w", "rails", "."]).is_err());
    }

    #[test]
    fn test_wildcard_methods() {
        let args = args(&["--wildcard-methods", "get,HEAD,get", "."]);

        assert_eq!(
            args.extraction_options().canonicalize.wildcard_methods,
            vec![HttpMethod::Get, HttpMethod::Head]
        );
    }

    #[test]
    fn test_wildcard_methods_rejects_bad_values() {
        assert!(CliArgs::try_parse_from(["routescope", "--wildcard-methods", "get,fetch", "."]).is_err());
        assert!(CliArgs::try_parse_from(["routescope", "--wildcard-methods", "any", "."]).is_err());
    }

    #[test]
    fn test_document_info_and_sequential() {
        let args = args(&[
            "--title",
            "Shop",
            "--api-version",
            "3.1.0",
            "--sequential",
            "-f",
            "json",
            "-o",
            "out/api.json",
            ".",
        ]);

        let info = args.document_info();
        assert_eq!(info.title, "Shop");
        assert_eq!(info.version, "3.1.0");
        assert!(!args.extraction_options().parallel);
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.output_path, Some(PathBuf::from("out/api.json")));
    }

    #[test]
    fn test_parse_args_rejects_missing_path() {
        let args = args(&["/definitely/not/a/real/project"]);
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_parse_args_rejects_file_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.go");
        fs::write(&file, "package main").unwrap();

        let args = args(&[file.to_str().unwrap()]);
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_generate_without_framework_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("util.py"), "def helper():\n    return 1\n").unwrap();

        let args = args(&[dir.path().to_str().unwrap()]);
        let err = generate(&args).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::FrameworkNotDetected)
        ));
    }

    #[test]
    fn test_generate_flask_project() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app.py"),
            "from flask import Flask\napp = Flask(__name__)\n\n@app.route('/ping')\ndef ping():\n    return 'pong'\n",
        )
        .unwrap();

        let args = args(&["--title", "Ping", dir.path().to_str().unwrap()]);
        let generation = generate(&args).unwrap();

        assert_eq!(generation.document.info.title, "Ping");
        assert!(generation.document.paths["/ping"].get.is_some());
        assert_eq!(generation.report.frameworks, vec![Framework::Flask]);
    }
}
