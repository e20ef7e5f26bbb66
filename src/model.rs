//! Data model shared by the adapters, the engine, and the OpenAPI builder.
//!
//! Adapters produce [`RouteCandidate`]s; the canonicalizer turns them into
//! [`RouteDescriptor`]s, which are what the document builder consumes.

use crate::engine::path_template::PathTemplate;
use crate::engine::schema_walker::SchemaNode;
use clap::ValueEnum;
use std::fmt;
use std::path::{Path, PathBuf};

/// Handler identifier used when a route is served by a closure or a wrapped expression.
pub const ANONYMOUS_HANDLER: &str = "<anonymous>";

/// HTTP methods recognized at declaration sites.
///
/// `All` is the wildcard used by `Any`/`all`/`Raw` style declarations; the
/// canonicalizer expands it into concrete methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    All,
}

impl HttpMethod {
    /// Upper-case wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::All => "ALL",
        }
    }

    /// Parse a method name case-insensitively. `any`, `all` and `*` map to [`HttpMethod::All`].
    pub fn parse(method: &str) -> Option<HttpMethod> {
        match method.trim().to_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            "all" | "any" | "*" => Some(HttpMethod::All),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        *self == HttpMethod::All
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source languages the scanner picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Go,
    JavaScript,
    TypeScript,
    Python,
    Java,
    Haskell,
}

impl Language {
    /// Map a file path to a language by extension
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" => Some(Language::TypeScript),
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "hs" => Some(Language::Haskell),
            _ => None,
        }
    }
}

/// Supported web frameworks, in probing order
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash)]
pub enum Framework {
    /// Axum (Rust)
    Axum,
    /// Actix-Web (Rust)
    #[value(name = "actix-web")]
    ActixWeb,
    /// Gin (Go)
    Gin,
    /// Express (JavaScript/TypeScript)
    Express,
    /// Fastify (JavaScript/TypeScript)
    Fastify,
    /// Flask (Python)
    Flask,
    /// FastAPI (Python)
    #[value(name = "fastapi")]
    FastApi,
    /// Spring Web (Java)
    Spring,
    /// Servant (Haskell)
    Servant,
}

/// Where a declaration was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based line number, 0 when unknown
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One raw piece of a declared path, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFragment {
    /// Path text exactly as written; may contain any recognized parameter notation
    Literal(String),
    /// A capture declared outside the path text (combinator DSLs)
    Capture {
        name: Option<String>,
        type_name: Option<String>,
    },
}

impl RawFragment {
    pub fn literal(text: impl Into<String>) -> Self {
        RawFragment::Literal(text.into())
    }
}

/// Type information for a path parameter supplied by the declaration site.
///
/// Named hints apply to the parameter of that name; unnamed hints apply to
/// still-untyped path parameters in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamHint {
    pub name: Option<String>,
    pub schema: SchemaNode,
}

/// A query string parameter declared at the route site.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub required: bool,
    pub schema: SchemaNode,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, required: bool, schema: SchemaNode) -> Self {
        Self {
            name: name.into(),
            required,
            schema,
        }
    }
}

/// Status variants carried by method terminals such as `PostCreated`.
///
/// They never change the route's method; they only pick the default success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusVariant {
    Created,
    Accepted,
    NoContent,
}

impl StatusVariant {
    pub fn status_code(&self) -> u16 {
        match self {
            StatusVariant::Created => 201,
            StatusVariant::Accepted => 202,
            StatusVariant::NoContent => 204,
        }
    }
}

/// A provisional route extracted from one declaration site.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCandidate {
    pub method: HttpMethod,
    /// Resolved prefix of the enclosing scope at the declaration site
    pub prefix: String,
    pub fragments: Vec<RawFragment>,
    pub handler: Option<String>,
    pub location: SourceLocation,
    pub language: Language,
    /// Enclosing structural grouping (controller class, blueprint name)
    pub group: Option<String>,
    pub param_hints: Vec<ParamHint>,
    pub query: Vec<QueryParam>,
    pub request_body: Option<SchemaNode>,
    pub response: Option<SchemaNode>,
    pub status: Option<StatusVariant>,
}

impl RouteCandidate {
    pub fn new(method: HttpMethod, language: Language, location: SourceLocation) -> Self {
        Self {
            method,
            prefix: String::new(),
            fragments: Vec::new(),
            handler: None,
            location,
            language,
            group: None,
            param_hints: Vec::new(),
            query: Vec::new(),
            request_body: None,
            response: None,
            status: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.fragments.push(RawFragment::Literal(path.into()));
        self
    }

    pub fn with_fragments(mut self, fragments: Vec<RawFragment>) -> Self {
        self.fragments.extend(fragments);
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_optional_handler(mut self, handler: Option<String>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = group;
        self
    }

    pub fn with_param_hint(mut self, name: Option<String>, schema: SchemaNode) -> Self {
        self.param_hints.push(ParamHint { name, schema });
        self
    }

    pub fn with_query(mut self, param: QueryParam) -> Self {
        self.query.push(param);
        self
    }

    pub fn with_request_body(mut self, body: Option<SchemaNode>) -> Self {
        self.request_body = body;
        self
    }

    pub fn with_response(mut self, response: Option<SchemaNode>) -> Self {
        self.response = response;
        self
    }

    pub fn with_status(mut self, status: Option<StatusVariant>) -> Self {
        self.status = status;
        self
    }

    /// Copy of this candidate with a different method, used by wildcard expansion
    pub fn with_method(&self, method: HttpMethod) -> Self {
        let mut copy = self.clone();
        copy.method = method;
        copy
    }
}

/// The location where a parameter value is extracted from in an HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
        }
    }
}

/// A parameter of a canonical route.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: SchemaNode,
}

/// The canonical, deduplicated route record.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    pub path: PathTemplate,
    pub parameters: Vec<ParameterDescriptor>,
    pub operation_id: String,
    pub tags: Vec<String>,
    pub request_body: Option<SchemaNode>,
    pub response: Option<SchemaNode>,
    pub status: Option<StatusVariant>,
    pub handler: Option<String>,
    pub location: SourceLocation,
}

impl RouteDescriptor {
    /// Canonical `{name}` path string
    pub fn path_string(&self) -> String {
        self.path.render()
    }

    /// Default success status for the operation
    pub fn success_status(&self) -> u16 {
        self.status.map(|s| s.status_code()).unwrap_or(200)
    }
}

/// A located, non-fatal problem found during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_value_names() {
        let names: Vec<String> = Framework::value_variants()
            .iter()
            .filter_map(|f| f.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["axum", "actix-web", "gin", "express", "fastify", "flask", "fastapi", "spring", "servant"]
        );
        assert_eq!(Framework::from_str("actix-web", true), Ok(Framework::ActixWeb));
    }

    #[test]
    fn test_parse_http_method() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("delete"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::parse("Any"), Some(HttpMethod::All));
        assert_eq!(HttpMethod::parse("connect"), None);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("a/main.go")), Some(Language::Go));
        assert_eq!(Language::from_path(Path::new("api.ts")), Some(Language::TypeScript));
        assert_eq!(Language::from_path(Path::new("Api.hs")), Some(Language::Haskell));
        assert_eq!(Language::from_path(Path::new("README.md")), None);
    }

    #[test]
    fn test_candidate_builder() {
        let candidate = RouteCandidate::new(
            HttpMethod::Post,
            Language::Go,
            SourceLocation::new("main.go", 12),
        )
        .with_prefix("/api")
        .with_path("/users")
        .with_handler("createUser");

        assert_eq!(candidate.prefix, "/api");
        assert_eq!(candidate.fragments, vec![RawFragment::literal("/users")]);
        assert_eq!(candidate.handler.as_deref(), Some("createUser"));

        let copy = candidate.with_method(HttpMethod::Put);
        assert_eq!(copy.method, HttpMethod::Put);
        assert_eq!(copy.fragments, candidate.fragments);
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new(SourceLocation::new("Api.hs", 3), "unbalanced parentheses");
        assert_eq!(diag.to_string(), "Api.hs:3: unbalanced parentheses");
    }
}
