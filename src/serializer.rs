//! Rendering of the finished OpenAPI document as YAML or JSON.
//!
//! Every map in [`OpenApiDocument`] is ordered, so the same route table always
//! renders to the same bytes.

use crate::cli::OutputFormat;
use crate::error::Error;
use crate::openapi_builder::OpenApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a document in the requested output format.
///
/// # Example
///
/// ```
/// use routescope::cli::OutputFormat;
/// use routescope::engine::schema_walker::SchemaRegistry;
/// use routescope::openapi_builder::OpenApiBuilder;
/// use routescope::schema_generator::SchemaGenerator;
/// use routescope::serializer::serialize;
///
/// let registry = SchemaRegistry::new();
/// let doc = OpenApiBuilder::new().build(SchemaGenerator::new(&registry));
/// let yaml = serialize(&doc, OutputFormat::Yaml).unwrap();
/// assert!(yaml.contains("openapi: 3.0.3"));
/// ```
pub fn serialize(doc: &OpenApiDocument, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serialize_yaml(doc),
        OutputFormat::Json => serialize_json(doc),
    }
}

pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc)
        .map_err(Error::from)
        .context("Failed to serialize OpenAPI document to YAML")
}

/// Pretty-printed JSON
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc)
        .map_err(Error::from)
        .context("Failed to serialize OpenAPI document to JSON")
}

/// Writes `content` to `path`, creating missing parent directories and
/// replacing any existing file.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
