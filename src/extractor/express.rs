use crate::engine::node::{walk, Node, NodeVisitor, VisitFlow};
use crate::engine::schema_walker::SchemaNode;
use crate::engine::scope::{join_paths, ScopeContext};
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::calls::{handler_ident, is_identifier, parse_statement, CallStatement};
use crate::lang::literal::{string_value, CallArg};
use crate::lang::records::{to_schemas, typescript_interfaces};
use crate::lang::rust::ProjectIndex;
use crate::lang::tokens::{brace_tree, JAVASCRIPT};
use crate::model::{Framework, HttpMethod, Language, RouteCandidate, SourceLocation};
use crate::parser::SourceFile;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const MAX_BINDING_PASSES: usize = 8;
const ROUTE_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "options", "head", "all"];

static EXPRESS_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:require\s*\(\s*|from\s+)['"]express['"]"#).unwrap());

/// Express route extractor.
///
/// Routers are the variables holding `express.Router()`. Mounting one with
/// `parent.use('/p', router)` binds it to the parent's prefix plus `/p`, even
/// when the mount comes after the router's routes.
pub struct ExpressExtractor;

impl FrameworkExtractor for ExpressExtractor {
    fn framework(&self) -> Framework {
        Framework::Express
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::JavaScript, Language::TypeScript]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        EXPRESS_IMPORT.is_match(&file.source)
    }

    fn extract_routes(&self, file: &SourceFile, _index: &ProjectIndex) -> FileExtraction {
        let tree = brace_tree(&file.source, &JAVASCRIPT);
        let routers = router_variables(&tree);

        let mut bindings: Vec<(String, String)> = Vec::new();
        let mut routes = Vec::new();
        for _ in 0..MAX_BINDING_PASSES {
            let mut visitor = ExpressVisitor::new(file, &routers, &bindings);
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
        script_schemas(file)
    }
}

/// TypeScript interfaces of a script file
pub(crate) fn script_schemas(file: &SourceFile) -> Vec<(String, SchemaNode)> {
    if file.language != Language::TypeScript {
        return Vec::new();
    }
    to_schemas(
        typescript_interfaces(&brace_tree(&file.source, &JAVASCRIPT)),
        Language::TypeScript,
    )
}

/// Variables assigned `express.Router()`, `Router()` or `new Router()`
fn router_variables(tree: &Node) -> HashSet<String> {
    struct Collector(HashSet<String>);

    impl NodeVisitor for Collector {
        fn enter(&mut self, node: &Node) -> VisitFlow {
            if let Some(statement) = parse_statement(&node.text) {
                let creates_router = statement
                    .calls
                    .first()
                    .is_some_and(|c| c.method == "Router");
                if let (Some(target), true) = (statement.target, creates_router) {
                    self.0.insert(target);
                }
            }
            VisitFlow::Continue
        }
    }

    let mut collector = Collector(HashSet::new());
    walk(tree, &mut collector);
    collector.0
}

struct ExpressVisitor<'a> {
    file: &'a SourceFile,
    routers: &'a HashSet<String>,
    scope: ScopeContext,
    routes: Vec<RouteCandidate>,
    bindings: Vec<(String, String)>,
}

impl<'a> ExpressVisitor<'a> {
    fn new(file: &'a SourceFile, routers: &'a HashSet<String>, seed: &[(String, String)]) -> Self {
        let mut scope = ScopeContext::new();
        for (name, prefix) in seed {
            scope.bind(name, prefix);
        }
        Self {
            file,
            routers,
            scope,
            routes: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn statement(&mut self, statement: &CallStatement, line: usize) {
        let prefix = self.scope.resolve(statement.receiver_name());
        // Path set by `.route('/p')` for the calls chained after it
        let mut route_path: Option<String> = None;

        for call in &statement.calls {
            let args = call.args();
            match call.method.as_str() {
                "use" => self.mount(&prefix, &args),
                "route" => {
                    route_path = args.first().and_then(|a| string_value(&a.value));
                    if route_path.is_none() {
                        debug!("Skipping route() with non-literal path at line {}", line);
                        return;
                    }
                }
                method if ROUTE_METHODS.contains(&method) => {
                    let (path, handlers) = match &route_path {
                        Some(path) => (Some(path.clone()), &args[..]),
                        // `app.get('setting')` reads a setting
                        None if args.len() < 2 => continue,
                        None => (
                            args.first().and_then(|a| string_value(&a.value)),
                            &args[1..],
                        ),
                    };
                    let Some(path) = path else {
                        debug!("Skipping {}() with non-literal path at line {}", method, line);
                        continue;
                    };
                    let Some(method) = HttpMethod::parse(method) else {
                        continue;
                    };

                    let handler = handlers.last().map(|a| handler_ident(&a.value));
                    self.routes.push(
                        RouteCandidate::new(
                            method,
                            self.file.language,
                            SourceLocation::new(&self.file.path, line),
                        )
                        .with_prefix(prefix.as_str())
                        .with_path(path)
                        .with_optional_handler(handler),
                    );
                }
                _ => {}
            }
        }
    }

    /// `parent.use('/p', mw, router)` or `parent.use(router)`
    fn mount(&mut self, parent_prefix: &str, args: &[CallArg]) {
        let path = args.first().and_then(|a| string_value(&a.value));
        let routers = &args[usize::from(path.is_some())..];

        for arg in routers {
            let name = arg.value.trim();
            if !is_identifier(name) || !self.routers.contains(name) {
                continue;
            }
            let prefix = join_paths(parent_prefix, path.as_deref().unwrap_or(""));
            self.scope.bind(name, &prefix);
            self.bindings.push((name.to_string(), prefix));
        }
    }
}

impl NodeVisitor for ExpressVisitor<'_> {
    fn enter(&mut self, node: &Node) -> VisitFlow {
        if let Some(statement) = parse_statement(&node.text) {
            self.statement(&statement, node.line);
        }
        VisitFlow::Continue
    }
}
