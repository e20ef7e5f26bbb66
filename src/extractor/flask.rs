use crate::engine::node::{walk, Node, NodeVisitor, VisitFlow};
use crate::engine::schema_walker::SchemaNode;
use crate::engine::scope::{join_paths, ScopeContext};
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::calls::{handler_ident, parse_statement, ChainCall};
use crate::lang::literal::{keyword, positional, string_list, string_value};
use crate::lang::records::{python_classes, to_schemas};
use crate::lang::rust::ProjectIndex;
use crate::lang::tokens::{indent_tree, PYTHON};
use crate::model::{Framework, HttpMethod, Language, RouteCandidate, SourceLocation};
use crate::parser::SourceFile;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const MAX_BINDING_PASSES: usize = 8;
const SHORTCUT_METHODS: &[&str] = &["get", "post", "put", "delete", "patch"];

static FLASK_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:from\s+flask\b|import\s+flask\b)").unwrap());
pub(crate) static PY_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap());

/// Flask route extractor.
///
/// Blueprints carry their own `url_prefix`; `register_blueprint` on the app
/// (or on another blueprint) replaces it with the registration prefix under
/// the parent's prefix. The blueprint name becomes the route's tag.
pub struct FlaskExtractor;

impl FrameworkExtractor for FlaskExtractor {
    fn framework(&self) -> Framework {
        Framework::Flask
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Python]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        FLASK_IMPORT.is_match(&file.source)
    }

    fn extract_routes(&self, file: &SourceFile, _index: &ProjectIndex) -> FileExtraction {
        let tree = indent_tree(&file.source, &PYTHON);
        let blueprints = blueprints(&tree);

        let mut bindings: Vec<(String, String)> = Vec::new();
        let mut routes = Vec::new();
        for _ in 0..MAX_BINDING_PASSES {
            let mut visitor = FlaskVisitor::new(file, &blueprints, &bindings);
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

/// Pydantic models and dataclasses of a Python file
pub(crate) fn python_schemas(file: &SourceFile) -> Vec<(String, SchemaNode)> {
    to_schemas(
        python_classes(&indent_tree(&file.source, &PYTHON)),
        Language::Python,
    )
}

#[derive(Debug, Clone, PartialEq)]
struct Blueprint {
    name: String,
    url_prefix: String,
}

/// `bp = Blueprint('name', __name__, url_prefix='/p')` assignments
fn blueprints(tree: &Node) -> HashMap<String, Blueprint> {
    struct Collector(HashMap<String, Blueprint>);

    impl NodeVisitor for Collector {
        fn enter(&mut self, node: &Node) -> VisitFlow {
            let Some(statement) = parse_statement(&node.text) else {
                return VisitFlow::Continue;
            };
            let (Some(target), Some(call)) = (statement.target, statement.calls.first()) else {
                return VisitFlow::Continue;
            };
            if call.method == "Blueprint" {
                let args = call.args();
                let name = keyword(&args, "name")
                    .or_else(|| positional(&args, 0))
                    .and_then(string_value)
                    .unwrap_or_else(|| target.clone());
                let url_prefix = keyword(&args, "url_prefix")
                    .and_then(string_value)
                    .unwrap_or_default();
                self.0.insert(target, Blueprint { name, url_prefix });
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
    line: usize,
}

struct FlaskVisitor<'a> {
    file: &'a SourceFile,
    blueprints: &'a HashMap<String, Blueprint>,
    /// Registration prefixes, keyed by blueprint variable
    scope: ScopeContext,
    pending: Vec<PendingRoute>,
    routes: Vec<RouteCandidate>,
    bindings: Vec<(String, String)>,
}

impl<'a> FlaskVisitor<'a> {
    fn new(
        file: &'a SourceFile,
        blueprints: &'a HashMap<String, Blueprint>,
        seed: &[(String, String)],
    ) -> Self {
        let mut scope = ScopeContext::new();
        for (name, prefix) in seed {
            scope.bind(name, prefix);
        }
        Self {
            file,
            blueprints,
            scope,
            pending: Vec::new(),
            routes: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn prefix_of(&self, receiver: &str) -> String {
        if self.scope.is_bound(receiver) {
            return self.scope.resolve(receiver);
        }
        self.blueprints
            .get(receiver)
            .map(|bp| bp.url_prefix.clone())
            .unwrap_or_default()
    }

    /// `@x.route('/p', methods=[...])` or `@x.get('/p')`
    fn decorator(&mut self, text: &str, line: usize) {
        let Some(statement) = parse_statement(text) else {
            return;
        };
        let Some(call) = statement.calls.first() else {
            return;
        };
        let args = call.args();

        let methods = match call.method.as_str() {
            "route" => match keyword(&args, "methods") {
                Some(methods) => string_list(methods)
                    .iter()
                    .filter_map(|m| HttpMethod::parse(m))
                    .collect(),
                None => vec![HttpMethod::Get],
            },
            method if SHORTCUT_METHODS.contains(&method) => {
                HttpMethod::parse(method).into_iter().collect()
            }
            _ => return,
        };

        let Some(path) = keyword(&args, "rule")
            .or_else(|| positional(&args, 0))
            .and_then(string_value)
        else {
            debug!("Skipping @{}.{} with a non-literal rule at line {}", statement.receiver, call.method, line);
            return;
        };

        self.pending.push(PendingRoute {
            methods,
            path,
            receiver: statement.receiver_name().to_string(),
            line,
        });
    }

    fn statement(&mut self, text: &str, line: usize) {
        let Some(statement) = parse_statement(text) else {
            return;
        };
        let receiver = statement.receiver_name().to_string();

        for call in &statement.calls {
            match call.method.as_str() {
                "register_blueprint" => self.register(&receiver, call),
                "add_url_rule" => self.url_rule(&receiver, call, line),
                _ => {}
            }
        }
    }

    /// `parent.register_blueprint(bp, url_prefix='/p')`
    fn register(&mut self, parent: &str, call: &ChainCall) {
        let args = call.args();
        let Some(name) = positional(&args, 0).map(str::trim) else {
            return;
        };
        let Some(blueprint) = self.blueprints.get(name) else {
            debug!("Registered blueprint {} is not declared in this file", name);
            return;
        };

        let own_prefix = keyword(&args, "url_prefix")
            .and_then(string_value)
            .unwrap_or_else(|| blueprint.url_prefix.clone());
        let resolved = join_paths(&self.prefix_of(parent), &own_prefix);
        self.scope.bind(name, &resolved);
        self.bindings.push((name.to_string(), resolved));
    }

    /// `x.add_url_rule('/p', 'endpoint', view_func, methods=[...])`
    fn url_rule(&mut self, receiver: &str, call: &ChainCall, line: usize) {
        let args = call.args();
        let Some(path) = keyword(&args, "rule")
            .or_else(|| positional(&args, 0))
            .and_then(string_value)
        else {
            return;
        };
        let methods: Vec<HttpMethod> = match keyword(&args, "methods") {
            Some(methods) => string_list(methods)
                .iter()
                .filter_map(|m| HttpMethod::parse(m))
                .collect(),
            None => vec![HttpMethod::Get],
        };
        let handler = keyword(&args, "view_func")
            .or_else(|| positional(&args, 2))
            .map(handler_ident);

        for method in methods {
            let candidate = self
                .candidate(method, receiver, &path, line)
                .with_optional_handler(handler.clone());
            self.routes.push(candidate);
        }
    }

    fn function(&mut self, name: &str) {
        for route in std::mem::take(&mut self.pending) {
            for method in &route.methods {
                let candidate = self
                    .candidate(*method, &route.receiver, &route.path, route.line)
                    .with_handler(name);
                self.routes.push(candidate);
            }
        }
    }

    fn candidate(&self, method: HttpMethod, receiver: &str, path: &str, line: usize) -> RouteCandidate {
        RouteCandidate::new(
            method,
            self.file.language,
            SourceLocation::new(&self.file.path, line),
        )
        .with_prefix(self.prefix_of(receiver))
        .with_path(path)
        .with_group(self.blueprints.get(receiver).map(|bp| bp.name.clone()))
    }
}

impl NodeVisitor for FlaskVisitor<'_> {
    fn enter(&mut self, node: &Node) -> VisitFlow {
        if node.text.starts_with('@') {
            self.decorator(&node.text, node.line);
        } else if let Some(caps) = PY_DEF.captures(&node.text) {
            self.function(&caps[1]);
        } else {
            self.pending.clear();
            self.statement(&node.text, node.line);
        }
        VisitFlow::Continue
    }
}
