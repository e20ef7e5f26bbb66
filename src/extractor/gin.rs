use crate::engine::node::{walk, Node, NodeVisitor, VisitFlow};
use crate::engine::schema_walker::SchemaNode;
use crate::engine::scope::{join_paths, ScopeContext, ScopeHandle};
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::calls::{handler_ident, is_identifier, parse_chain, parse_statement, ChainCall};
use crate::lang::literal::string_value;
use crate::lang::records::{go_structs, to_schemas};
use crate::lang::rust::ProjectIndex;
use crate::lang::tokens::{brace_tree, GO};
use crate::model::{Framework, HttpMethod, Language, RouteCandidate, SourceLocation};
use crate::parser::SourceFile;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const GIN_IMPORT: &str = "\"github.com/gin-gonic/gin\"";
const MAX_BINDING_PASSES: usize = 8;

static FUNC_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*\(([^)]*)\)").unwrap());

/// Gin route extractor.
///
/// `v := parent.Group("/p")` binds `v` to the parent's prefix plus `/p`.
/// A function taking a `*gin.Engine` or `*gin.RouterGroup` gets the prefix of
/// the router it is called with (`RegisterUsers(api.Group("/users"))`).
pub struct GinExtractor;

impl FrameworkExtractor for GinExtractor {
    fn framework(&self) -> Framework {
        Framework::Gin
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Go]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        file.source.contains(GIN_IMPORT)
    }

    fn extract_routes(&self, file: &SourceFile, _index: &ProjectIndex) -> FileExtraction {
        let tree = brace_tree(&file.source, &GO);
        let mut functions = HashMap::new();
        router_functions(&tree, &mut functions);

        // Only router-function mounts carry over between passes; variables stay local
        let mut mounts: Vec<(String, String)> = Vec::new();
        let mut routes = Vec::new();
        for _ in 0..MAX_BINDING_PASSES {
            let mut visitor = GinVisitor::new(file, &functions, &mounts);
            walk(&tree, &mut visitor);
            routes = visitor.routes;

            if visitor.mounted == mounts {
                break;
            }
            mounts = visitor.mounted;
        }

        FileExtraction::new(routes)
    }

    fn extract_schemas(&self, file: &SourceFile) -> Vec<(String, SchemaNode)> {
        to_schemas(go_structs(&brace_tree(&file.source, &GO)), Language::Go)
    }
}

/// A function with a router parameter: its index and name
#[derive(Debug, Clone)]
struct RouterParam {
    index: usize,
    name: String,
}

fn router_functions(node: &Node, out: &mut HashMap<String, RouterParam>) {
    for child in &node.children {
        if let Some(caps) = FUNC_DECL.captures(&child.text) {
            let param = caps[2]
                .split(',')
                .map(str::trim)
                .enumerate()
                .find_map(|(index, param)| {
                    let (name, ty) = param.split_once(char::is_whitespace)?;
                    let is_router = ty.contains("gin.") && !ty.contains("gin.Context");
                    is_router.then(|| RouterParam {
                        index,
                        name: name.to_string(),
                    })
                });
            if let Some(param) = param {
                out.insert(caps[1].to_string(), param);
            }
        }
        router_functions(child, out);
    }
}

enum Frame {
    /// Scope handle plus the variable bindings visible before the function
    Func(ScopeHandle, HashMap<String, String>),
    Plain,
}

struct GinVisitor<'a> {
    file: &'a SourceFile,
    functions: &'a HashMap<String, RouterParam>,
    scope: ScopeContext,
    frames: Vec<Frame>,
    /// Router parameter of each enclosing function
    params: Vec<Option<String>>,
    routes: Vec<RouteCandidate>,
    /// Prefix each router function is called with
    mounts: HashMap<String, String>,
    /// Mounts recorded during this pass, in call order
    mounted: Vec<(String, String)>,
}

impl<'a> GinVisitor<'a> {
    fn new(
        file: &'a SourceFile,
        functions: &'a HashMap<String, RouterParam>,
        seed: &[(String, String)],
    ) -> Self {
        Self {
            file,
            functions,
            scope: ScopeContext::new(),
            frames: Vec::new(),
            params: Vec::new(),
            routes: Vec::new(),
            mounts: seed.iter().cloned().collect(),
            mounted: Vec::new(),
        }
    }

    /// Prefix of routes declared on `receiver`
    fn prefix_of(&self, receiver: &str) -> String {
        let is_param = self
            .params
            .last()
            .is_some_and(|p| p.as_deref() == Some(receiver));
        if !is_param && self.scope.is_bound(receiver) {
            self.scope.resolve(receiver)
        } else {
            self.scope.current_prefix()
        }
    }

    fn mount(&mut self, function: &str, prefix: String) {
        debug!("Mounting {} at {}", function, prefix);
        self.mounts.insert(function.to_string(), prefix.clone());
        self.mounted.push((function.to_string(), prefix));
    }

    fn statement(&mut self, node: &Node) {
        let Some(statement) = parse_statement(&node.text) else {
            return;
        };

        let functions = self.functions;
        if let Some(param) = statement
            .calls
            .first()
            .and_then(|call| functions.get(&call.method))
        {
            self.router_call(&statement.calls[0], param);
            return;
        }

        let mut prefix = self.prefix_of(statement.receiver_name());
        let mut grouped = false;
        for call in &statement.calls {
            if call.method == "Group" {
                match group_path(call) {
                    Some(path) => prefix = join_paths(&prefix, &path),
                    None => {
                        debug!("Skipping group with non-literal path at line {}", node.line);
                        return;
                    }
                }
                grouped = true;
            } else {
                self.route(call, &prefix, node.line);
            }
        }

        if let (Some(target), true) = (&statement.target, grouped) {
            self.scope.bind(target, &prefix);
        }
    }

    /// `RegisterUsers(api)` or `RegisterUsers(r.Group("/users"))`
    fn router_call(&mut self, call: &ChainCall, param: &RouterParam) {
        let args = call.args();
        let Some(arg) = args.get(param.index).map(|a| a.value.as_str()) else {
            return;
        };

        let prefix = if is_identifier(arg) {
            Some(self.prefix_of(arg))
        } else {
            parse_chain(arg).and_then(|(receiver, calls)| {
                let receiver = receiver.rsplit('.').next().unwrap_or(&receiver).to_string();
                calls
                    .iter()
                    .filter(|c| c.method == "Group")
                    .try_fold(self.prefix_of(&receiver), |prefix, c| {
                        group_path(c).map(|path| join_paths(&prefix, &path))
                    })
            })
        };

        if let Some(prefix) = prefix {
            self.mount(&call.method, prefix);
        }
    }

    /// `x.GET("/p", mw, h)`, `x.Any("/p", h)`, `x.Handle("PATCH", "/p", h)`
    fn route(&mut self, call: &ChainCall, prefix: &str, line: usize) {
        let args = call.args();
        let (method, path_index) = match call.method.as_str() {
            "Handle" => match args.first().and_then(|a| string_value(&a.value)) {
                Some(method) => (HttpMethod::parse(&method), 1),
                None => return,
            },
            "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "OPTIONS" | "HEAD" | "Any" => {
                (HttpMethod::parse(&call.method), 0)
            }
            _ => return,
        };
        let Some(method) = method else {
            return;
        };
        let Some(path) = args.get(path_index).and_then(|a| string_value(&a.value)) else {
            debug!("Skipping {} with non-literal path at line {}", call.method, line);
            return;
        };
        let handler = args
            .get(path_index + 1..)
            .and_then(|rest| rest.last())
            .map(|a| handler_ident(&a.value));

        self.routes.push(
            RouteCandidate::new(method, Language::Go, SourceLocation::new(&self.file.path, line))
                .with_prefix(prefix)
                .with_path(path)
                .with_optional_handler(handler),
        );
    }
}

impl NodeVisitor for GinVisitor<'_> {
    fn enter(&mut self, node: &Node) -> VisitFlow {
        match FUNC_DECL.captures(&node.text) {
            Some(caps) => {
                let name = &caps[1];
                let saved = self.scope.save_bindings();
                let mount = self.mounts.get(name).cloned().unwrap_or_default();
                let handle = self.scope.push(&mount);
                self.params
                    .push(self.functions.get(name).map(|p| p.name.clone()));
                self.frames.push(Frame::Func(handle, saved));
            }
            None => {
                self.statement(node);
                self.frames.push(Frame::Plain);
            }
        }
        VisitFlow::Continue
    }

    fn leave(&mut self, _node: &Node) {
        if let Some(Frame::Func(handle, saved)) = self.frames.pop() {
            self.scope.pop(handle);
            self.scope.restore_bindings(saved);
            self.params.pop();
        }
    }
}

fn group_path(call: &ChainCall) -> Option<String> {
    call.args().first().and_then(|a| string_value(&a.value))
}
