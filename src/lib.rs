//! routescope - static route discovery for web projects, producing OpenAPI documents.
//!
//! The library reads a project's source code without running it, finds the HTTP
//! routes it declares and the request/response types they use, and synthesizes an
//! OpenAPI 3.0 document from them.
//!
//! # Supported Frameworks
//!
//! - **Axum** and **Actix-Web** (Rust, parsed with `syn`)
//! - **Gin** (Go)
//! - **Express** and **Fastify** (JavaScript/TypeScript)
//! - **Flask** and **FastAPI** (Python)
//! - **Spring Web** (Java)
//! - **Servant** (Haskell, type-level route combinators)
//!
//! # Architecture
//!
//! 1. [`scanner`] - Recursively scans project directories for source files
//! 2. [`parser`] - Reads files; Rust files are syntax-checked with `syn` and re-parsed by the Rust adapters
//! 3. [`detector`] - Probes which web frameworks are used
//! 4. [`extractor`] - One thin adapter per framework, turning declaration sites into route candidates
//! 5. [`engine`] - Scope resolution, path normalization, combinator parsing and
//!    canonicalization shared by every adapter
//! 6. [`schema_generator`] - Converts walked schemas to OpenAPI schemas
//! 7. [`openapi_builder`] - Constructs the complete OpenAPI document
//! 8. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use routescope::{
//!     engine::driver::{ExtractionDriver, ExtractionOptions},
//!     extractor::ExtractorRegistry,
//!     openapi_builder::OpenApiBuilder,
//!     parser::SourceParser,
//!     scanner::FileScanner,
//!     schema_generator::SchemaGenerator,
//!     serializer::serialize_yaml,
//! };
//! use std::path::PathBuf;
//!
//! let scan_result = FileScanner::new(PathBuf::from("./my-project")).scan().unwrap();
//! let files: Vec<_> = SourceParser::parse_files(&scan_result.files)
//!     .into_iter()
//!     .filter_map(Result::ok)
//!     .collect();
//!
//! let driver = ExtractionDriver::new(ExtractorRegistry::with_all(), ExtractionOptions::default());
//! let report = driver.run(&files);
//!
//! let mut schema_gen = SchemaGenerator::new(&report.schemas);
//! let mut builder = OpenApiBuilder::new();
//! builder.add_routes(&report.routes, &mut schema_gen);
//! let document = builder.build(schema_gen);
//!
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod detector;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod lang;
pub mod model;
pub mod openapi_builder;
pub mod parser;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_mapper;
