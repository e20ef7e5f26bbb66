use crate::engine::node::{walk, Node, NodeKind, NodeVisitor, VisitFlow};
use crate::engine::schema_walker::{SchemaKind, SchemaNode, SchemaWalker};
use crate::engine::scope::{join_paths, ScopeContext, ScopeHandle};
use crate::extractor::express::script_schemas;
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::calls::{handler_ident, is_identifier, parse_statement, ChainCall};
use crate::lang::literal::{parse_object_literal, string_value};
use crate::lang::rust::ProjectIndex;
use crate::lang::tokens::{brace_tree, JAVASCRIPT};
use crate::model::{
    Framework, HttpMethod, Language, QueryParam, RouteCandidate, SourceLocation, StatusVariant,
    ANONYMOUS_HANDLER,
};
use crate::parser::SourceFile;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_BINDING_PASSES: usize = 8;
const SHORTHAND_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "options", "head", "all"];
/// Response codes whose schema documents the success response, in preference order
const SUCCESS_CODES: &[(&str, Option<StatusVariant>)] = &[
    ("200", None),
    ("201", Some(StatusVariant::Created)),
    ("202", Some(StatusVariant::Accepted)),
    ("2xx", None),
    ("204", Some(StatusVariant::NoContent)),
];

static FASTIFY_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:require\s*\(\s*|from\s+)['"](?:fastify|fastify-plugin|@fastify/[\w-]+)['"]"#).unwrap()
});
static FUNCTION_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)?\s*\(([^)]*)\)")
        .unwrap()
});
static ARROW_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\s*[\w$]*\s*)?\(([^)]*)\)")
        .unwrap()
});

/// Fastify route extractor.
///
/// Plugins are functions whose first parameter is the Fastify instance;
/// `app.register(plugin, { prefix: '/p' })` gives every route the plugin
/// declares on that instance the prefix. Inline route schemas
/// (`schema.body`, `schema.querystring`, `schema.params`, `schema.response`)
/// are walked into request, parameter and response schemas.
pub struct FastifyExtractor;

impl FrameworkExtractor for FastifyExtractor {
    fn framework(&self) -> Framework {
        Framework::Fastify
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::JavaScript, Language::TypeScript]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        FASTIFY_IMPORT.is_match(&file.source)
    }

    fn extract_routes(&self, file: &SourceFile, _index: &ProjectIndex) -> FileExtraction {
        let tree = brace_tree(&file.source, &JAVASCRIPT);

        let mut bindings: Vec<(String, String)> = Vec::new();
        let mut routes = Vec::new();
        for _ in 0..MAX_BINDING_PASSES {
            let mut visitor = FastifyVisitor::new(file, &bindings);
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

enum Frame {
    Plugin(ScopeHandle),
    Plain,
}

struct FastifyVisitor<'a> {
    file: &'a SourceFile,
    scope: ScopeContext,
    frames: Vec<Frame>,
    /// Instance parameter of each enclosing plugin function
    instances: Vec<Option<String>>,
    routes: Vec<RouteCandidate>,
    bindings: Vec<(String, String)>,
}

impl<'a> FastifyVisitor<'a> {
    fn new(file: &'a SourceFile, seed: &[(String, String)]) -> Self {
        let mut scope = ScopeContext::new();
        for (name, prefix) in seed {
            scope.bind(name, prefix);
        }
        Self {
            file,
            scope,
            frames: Vec::new(),
            instances: Vec::new(),
            routes: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn prefix_of(&self, receiver: &str) -> String {
        let is_instance = self
            .instances
            .last()
            .is_some_and(|i| i.as_deref() == Some(receiver));
        if !is_instance && self.scope.is_bound(receiver) {
            self.scope.resolve(receiver)
        } else {
            self.scope.current_prefix()
        }
    }

    fn statement(&mut self, node: &Node) {
        let Some(statement) = parse_statement(&node.text) else {
            return;
        };
        let prefix = self.prefix_of(statement.receiver_name());

        for call in &statement.calls {
            match call.method.as_str() {
                "register" => self.register(call, &prefix),
                "route" => self.route_object(call, &prefix, node.line),
                method if SHORTHAND_METHODS.contains(&method) => {
                    self.shorthand(call, &prefix, node.line)
                }
                _ => {}
            }
        }
    }

    /// `x.register(plugin, { prefix: '/p' })`
    fn register(&mut self, call: &ChainCall, parent_prefix: &str) {
        let args = call.args();
        let Some(plugin) = args.first().map(|a| a.value.trim()) else {
            return;
        };
        if !is_identifier(plugin) {
            debug!("Not following registered plugin {}", plugin);
            return;
        }

        let prefix = args
            .get(1)
            .and_then(|opts| parse_object_literal(&opts.value, 0))
            .and_then(|opts| opts.field("prefix").cloned())
            .filter(|p| p.kind == NodeKind::String)
            .map(|p| p.text)
            .unwrap_or_default();

        let name = plugin.rsplit('.').next().unwrap_or(plugin).to_string();
        let resolved = join_paths(parent_prefix, &prefix);
        self.scope.bind(&name, &resolved);
        self.bindings.push((name, resolved));
    }

    /// `x.get('/p', handler)`, `x.get('/p', { schema }, handler)`, `x.get('/p', { schema, handler })`
    fn shorthand(&mut self, call: &ChainCall, prefix: &str, line: usize) {
        let args = call.args();
        let Some(path) = args.first().and_then(|a| string_value(&a.value)) else {
            debug!("Skipping {}() without a literal path at line {}", call.method, line);
            return;
        };
        let Some(method) = HttpMethod::parse(&call.method) else {
            return;
        };

        let options = args
            .get(1)
            .filter(|a| a.value.trim_start().starts_with('{'))
            .and_then(|a| parse_object_literal(&a.value, line));
        let handler = match args.get(2) {
            Some(handler) => Some(handler_ident(&handler.value)),
            None if options.is_none() => args.get(1).map(|a| handler_ident(&a.value)),
            None => options.as_ref().and_then(options_handler),
        };

        let candidate = self
            .candidate(method, prefix, &path, line)
            .with_optional_handler(handler);
        self.routes.push(apply_options(candidate, options.as_ref()));
    }

    /// `x.route({ method: ['GET', 'HEAD'], url: '/p', schema, handler })`
    fn route_object(&mut self, call: &ChainCall, prefix: &str, line: usize) {
        let Some(options) = call
            .args()
            .first()
            .and_then(|a| parse_object_literal(&a.value, line))
        else {
            return;
        };
        let Some(path) = options
            .field("url")
            .or_else(|| options.field("path"))
            .filter(|u| u.kind == NodeKind::String)
            .map(|u| u.text.clone())
        else {
            debug!("Skipping route() without a literal url at line {}", line);
            return;
        };

        let methods: Vec<HttpMethod> = match options.field("method") {
            Some(node) if node.kind == NodeKind::Array => node
                .children
                .iter()
                .filter_map(|m| HttpMethod::parse(&m.text))
                .collect(),
            Some(node) => HttpMethod::parse(&node.text).into_iter().collect(),
            None => Vec::new(),
        };
        let handler = options_handler(&options);

        for method in methods {
            let candidate = self
                .candidate(method, prefix, &path, line)
                .with_optional_handler(handler.clone());
            self.routes.push(apply_options(candidate, Some(&options)));
        }
    }

    fn candidate(&self, method: HttpMethod, prefix: &str, path: &str, line: usize) -> RouteCandidate {
        RouteCandidate::new(
            method,
            self.file.language,
            SourceLocation::new(&self.file.path, line),
        )
        .with_prefix(prefix)
        .with_path(path)
    }
}

impl NodeVisitor for FastifyVisitor<'_> {
    fn enter(&mut self, node: &Node) -> VisitFlow {
        let plugin = FUNCTION_DECL
            .captures(&node.text)
            .or_else(|| ARROW_DECL.captures(&node.text))
            .filter(|_| !node.children.is_empty());

        match plugin {
            Some(caps) => {
                let prefix = caps
                    .get(1)
                    .map(|name| self.scope.resolve(name.as_str()))
                    .unwrap_or_default();
                let instance = caps
                    .get(2)
                    .and_then(|params| params.as_str().split(',').next())
                    .map(|param| param.split(':').next().unwrap_or(param).trim().to_string())
                    .filter(|param| !param.is_empty());

                let handle = self.scope.push(&prefix);
                self.instances.push(instance);
                self.frames.push(Frame::Plugin(handle));
            }
            None => {
                self.statement(node);
                self.frames.push(Frame::Plain);
            }
        }
        VisitFlow::Continue
    }

    fn leave(&mut self, _node: &Node) {
        if let Some(Frame::Plugin(handle)) = self.frames.pop() {
            self.scope.pop(handle);
            self.instances.pop();
        }
    }
}

fn options_handler(options: &Node) -> Option<String> {
    let handler = options.field("handler")?;
    Some(match handler.kind {
        NodeKind::Ident => handler_ident(&handler.text),
        _ => ANONYMOUS_HANDLER.to_string(),
    })
}

/// Attach the walked `schema` of a route's options
fn apply_options(mut candidate: RouteCandidate, options: Option<&Node>) -> RouteCandidate {
    let Some(schema) = options.and_then(|o| o.field("schema")) else {
        return candidate;
    };
    let walker = SchemaWalker::new(candidate.language);

    if let Some(body) = schema.field("body") {
        candidate = candidate.with_request_body(Some(walker.walk(body)));
    }

    if let Some(query) = schema.field("querystring").or_else(|| schema.field("query")) {
        if let SchemaKind::Object { properties, required } = walker.walk(query).kind {
            for (name, property) in properties {
                let is_required = required.contains(&name);
                candidate = candidate.with_query(QueryParam::new(name, is_required, property));
            }
        }
    }

    if let Some(params) = schema.field("params") {
        if let SchemaKind::Object { properties, .. } = walker.walk(params).kind {
            for (name, property) in properties {
                candidate = candidate.with_param_hint(Some(name), property);
            }
        }
    }

    if let Some(responses) = schema.field("response") {
        if let Some((node, status)) = SUCCESS_CODES
            .iter()
            .find_map(|(code, status)| responses.field(code).map(|node| (node, *status)))
        {
            let response = (status != Some(StatusVariant::NoContent)).then(|| walker.walk(node));
            candidate = candidate.with_response(response).with_status(status);
        }
    }

    candidate
}
