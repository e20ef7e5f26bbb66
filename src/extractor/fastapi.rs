use crate::engine::node::{walk, Node, NodeVisitor, VisitFlow};
use crate::engine::schema_walker::{SchemaKind, SchemaNode, SchemaWalker, TypeExpr};
use crate::engine::scope::{join_paths, ScopeContext};
use crate::extractor::flask::{python_schemas, PY_DEF};
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::calls::{parse_statement, ChainCall};
use crate::lang::literal::{balanced_group, call_args, keyword, positional, split_top_level, string_list, string_value};
use crate::lang::rust::ProjectIndex;
use crate::lang::tokens::{indent_tree, PYTHON};
use crate::model::{
    Framework, HttpMethod, Language, QueryParam, RouteCandidate, SourceLocation, StatusVariant,
};
use crate::parser::SourceFile;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const MAX_BINDING_PASSES: usize = 8;
const ROUTE_DECORATORS: &[&str] = &["get", "post", "put", "delete", "patch", "options", "head"];
/// Parameter annotations injected by the framework rather than read from the request
const INJECTED_TYPES: &[&str] = &[
    "Request", "Response", "BackgroundTasks", "WebSocket", "Session", "AsyncSession", "HTTPConnection",
    "SecurityScopes", "UploadFile",
];

static FASTAPI_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:from\s+fastapi\b|import\s+fastapi\b)").unwrap());
static PATH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)(?::[^}]*)?\}").unwrap());
static RETURN_ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\)\s*->\s*(.+?)\s*:?\s*$").unwrap());

/// FastAPI route extractor.
///
/// `APIRouter(prefix=..., tags=[...])` routers are mounted with
/// `include_router`, whose own `prefix` goes in front of the router's. The
/// decorated function's signature types the route: path parameters by name,
/// model-typed parameters as the request body, other primitives as query
/// parameters.
pub struct FastApiExtractor;

impl FrameworkExtractor for FastApiExtractor {
    fn framework(&self) -> Framework {
        Framework::FastApi
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Python]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        FASTAPI_IMPORT.is_match(&file.source)
    }

    fn extract_routes(&self, file: &SourceFile, _index: &ProjectIndex) -> FileExtraction {
        let tree = indent_tree(&file.source, &PYTHON);
        let routers = routers(&tree);

        let mut bindings: Vec<(String, String)> = Vec::new();
        let mut routes = Vec::new();
        for _ in 0..MAX_BINDING_PASSES {
            let mut visitor = FastApiVisitor::new(file, &routers, &bindings);
            walk(&tree, &mut visitor);
            routes = visitor.routes;

            if visitor.bindings == bindings {
                break;
            }
            bindings = visitor.bindings;
        }

        FileExtraction::new(routes)
    }

    fn extract_schemas(&self, file: &SourceFile) -> Vec<(String, SchemaNode)> {
        python_schemas(file)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Router {
    prefix: String,
    tag: Option<String>,
}

/// `router = APIRouter(prefix='/p', tags=['t'])` and `app = FastAPI(root_path=...)` assignments
fn routers(tree: &Node) -> HashMap<String, Router> {
    struct Collector(HashMap<String, Router>);

    impl NodeVisitor for Collector {
        fn enter(&mut self, node: &Node) -> VisitFlow {
            let Some(statement) = parse_statement(&node.text) else {
                return VisitFlow::Continue;
            };
            let (Some(target), Some(call)) = (statement.target, statement.calls.first()) else {
                return VisitFlow::Continue;
            };
            if call.method == "APIRouter" {
                let args = call.args();
                let router = Router {
                    prefix: keyword(&args, "prefix")
                        .and_then(string_value)
                        .unwrap_or_default(),
                    tag: keyword(&args, "tags").and_then(|t| string_list(t).into_iter().next()),
                };
                self.0.insert(target, router);
            }
            VisitFlow::Continue
        }
    }

    let mut collector = Collector(HashMap::new());
    walk(tree, &mut collector);
    collector.0
}

/// A route decorator waiting for the function it decorates
struct PendingRoute {
    methods: Vec<HttpMethod>,
    path: String,
    receiver: String,
    tag: Option<String>,
    response_model: Option<String>,
    status: Option<StatusVariant>,
    line: usize,
}

struct FastApiVisitor<'a> {
    file: &'a SourceFile,
    routers: &'a HashMap<String, Router>,
    /// Mount prefixes from `include_router`, keyed by router variable
    scope: ScopeContext,
    walker: SchemaWalker,
    pending: Vec<PendingRoute>,
    routes: Vec<RouteCandidate>,
    bindings: Vec<(String, String)>,
}

impl<'a> FastApiVisitor<'a> {
    fn new(file: &'a SourceFile, routers: &'a HashMap<String, Router>, seed: &[(String, String)]) -> Self {
        let mut scope = ScopeContext::new();
        for (name, prefix) in seed {
            scope.bind(name, prefix);
        }
        Self {
            file,
            routers,
            scope,
            walker: SchemaWalker::new(Language::Python),
            pending: Vec::new(),
            routes: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Full prefix of routes declared on `receiver`: its mount point, then its own prefix
    fn prefix_of(&self, receiver: &str) -> String {
        let own = self
            .routers
            .get(receiver)
            .map(|r| r.prefix.as_str())
            .unwrap_or_default();
        join_paths(&self.scope.resolve(receiver), own)
    }

    fn decorator(&mut self, text: &str, line: usize) {
        let Some(statement) = parse_statement(text) else {
            return;
        };
        let Some(call) = statement.calls.first() else {
            return;
        };
        let args = call.args();

        let methods: Vec<HttpMethod> = match call.method.as_str() {
            "api_route" => match keyword(&args, "methods") {
                Some(methods) => string_list(methods)
                    .iter()
                    .filter_map(|m| HttpMethod::parse(m))
                    .collect(),
                None => vec![HttpMethod::Get],
            },
            method if ROUTE_DECORATORS.contains(&method) => {
                HttpMethod::parse(method).into_iter().collect()
            }
            _ => return,
        };

        let Some(path) = keyword(&args, "path")
            .or_else(|| positional(&args, 0))
            .and_then(string_value)
        else {
            debug!("Skipping decorator with a non-literal path at line {}", line);
            return;
        };

        let receiver = statement.receiver_name().to_string();
        let tag = keyword(&args, "tags")
            .and_then(|t| string_list(t).into_iter().next())
            .or_else(|| self.routers.get(&receiver).and_then(|r| r.tag.clone()));

        self.pending.push(PendingRoute {
            methods,
            path,
            receiver,
            tag,
            response_model: keyword(&args, "response_model").map(str::to_string),
            status: keyword(&args, "status_code").and_then(status_variant),
            line,
        });
    }

    /// `parent.include_router(router, prefix='/p')`
    fn include(&mut self, parent: &str, call: &ChainCall) {
        let args = call.args();
        let Some(name) = keyword(&args, "router")
            .or_else(|| positional(&args, 0))
            .map(|n| n.trim().rsplit('.').next().unwrap_or(n).to_string())
        else {
            return;
        };
        let mount = keyword(&args, "prefix")
            .and_then(string_value)
            .unwrap_or_default();

        let resolved = join_paths(&self.prefix_of(parent), &mount);
        self.scope.bind(&name, &resolved);
        self.bindings.push((name, resolved));
    }

    fn function(&mut self, header: &str, name: &str) {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return;
        }

        let params = header
            .find('(')
            .and_then(|open| balanced_group(header, open))
            .map(signature_params)
            .unwrap_or_default();
        let returns = RETURN_ANNOTATION
            .captures(header)
            .map(|caps| caps[1].trim().to_string());

        for route in pending {
            let path_params: Vec<&str> = PATH_PARAM
                .captures_iter(&route.path)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
                .collect();
            let response = route
                .response_model
                .as_deref()
                .or(returns.as_deref())
                .filter(|ty| !matches!(*ty, "None" | "Response" | "JSONResponse"))
                .map(|ty| self.walker.walk_type(&TypeExpr::parse(ty)).0);

            for method in &route.methods {
                let mut candidate = RouteCandidate::new(
                    *method,
                    self.file.language,
                    SourceLocation::new(&self.file.path, route.line),
                )
                .with_prefix(self.prefix_of(&route.receiver))
                .with_path(route.path.as_str())
                .with_handler(name)
                .with_group(route.tag.clone())
                .with_response(response.clone())
                .with_status(route.status);
                candidate = self.apply_params(candidate, &params, &path_params);
                self.routes.push(candidate);
            }
        }
    }

    fn apply_params(
        &self,
        mut candidate: RouteCandidate,
        params: &[SignatureParam],
        path_params: &[&str],
    ) -> RouteCandidate {
        for param in params {
            let Some(annotation) = param.annotation.as_deref() else {
                continue;
            };
            let ty = TypeExpr::parse(annotation);
            if INJECTED_TYPES.contains(&ty.base_name()) {
                continue;
            }
            let marker = param.default.as_deref().and_then(default_marker);
            if matches!(marker, Some(("Depends" | "Security" | "Header" | "Cookie", _))) {
                continue;
            }

            let (schema, optional) = self.walker.walk_type(&ty);
            if path_params.contains(&param.name.as_str()) || matches!(marker, Some(("Path", _))) {
                candidate = candidate.with_param_hint(Some(param.name.clone()), schema);
                continue;
            }

            let is_model = matches!(schema.kind, SchemaKind::Reference(_) | SchemaKind::Object { .. });
            if matches!(marker, Some(("Body", _))) || (is_model && marker.is_none()) {
                candidate = candidate.with_request_body(Some(schema));
                continue;
            }

            let required = match (&param.default, marker) {
                (_, Some((_, explicit_required))) => explicit_required && !optional,
                (Some(_), None) => false,
                (None, None) => !optional,
            };
            candidate = candidate.with_query(QueryParam::new(param.name.as_str(), required, schema));
        }
        candidate
    }
}

impl NodeVisitor for FastApiVisitor<'_> {
    fn enter(&mut self, node: &Node) -> VisitFlow {
        if node.text.starts_with('@') {
            self.decorator(&node.text, node.line);
        } else if let Some(caps) = PY_DEF.captures(&node.text) {
            self.function(&node.text, &caps[1]);
        } else {
            self.pending.clear();
            if let Some(statement) = parse_statement(&node.text) {
                let parent = statement.receiver_name().to_string();
                for call in statement.calls.iter().filter(|c| c.method == "include_router") {
                    self.include(&parent, call);
                }
            }
        }
        VisitFlow::Continue
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SignatureParam {
    name: String,
    annotation: Option<String>,
    default: Option<String>,
}

/// `name: Annotation = default` entries of a `def` parameter list
fn signature_params(inner: &str) -> Vec<SignatureParam> {
    split_top_level(inner, ',')
        .into_iter()
        .filter(|p| !p.is_empty() && !p.starts_with('*') && *p != "/")
        .filter_map(|param| {
            let (head, default) = match split_top_level(param, '=').as_slice() {
                [head, default] => (head.to_string(), Some(default.to_string())),
                _ => (param.to_string(), None),
            };
            let (name, annotation) = match head.split_once(':') {
                Some((name, annotation)) => (name.trim().to_string(), Some(annotation.trim().to_string())),
                None => (head.trim().to_string(), None),
            };
            (name != "self" && name != "cls").then_some(SignatureParam {
                name,
                annotation,
                default,
            })
        })
        .collect()
}

/// `Query(...)`, `Path()`, `Depends(get_db)`: the marker name and whether it makes the parameter required
fn default_marker(default: &str) -> Option<(&'static str, bool)> {
    let default = default.trim();
    let (name, rest) = default.split_once('(')?;
    let name = name.trim().rsplit('.').next().unwrap_or(name);
    let marker = ["Query", "Path", "Body", "Depends", "Security", "Header", "Cookie"]
        .into_iter()
        .find(|m| *m == name)?;

    let open = default.len() - rest.len() - 1;
    let args = balanced_group(default, open).map(call_args).unwrap_or_default();
    let required = match keyword(&args, "default").or_else(|| positional(&args, 0)) {
        None => true,
        Some(value) => value.trim() == "...",
    };
    Some((marker, required))
}

fn status_variant(code: &str) -> Option<StatusVariant> {
    let code = code.trim();
    let numeric = code
        .rsplit('_')
        .find(|part| part.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(code);
    match numeric {
        "201" => Some(StatusVariant::Created),
        "202" => Some(StatusVariant::Accepted),
        "204" => Some(StatusVariant::NoContent),
        _ => None,
    }
}
