use crate::engine::schema_walker::SchemaNode;
use crate::engine::scope::ScopeContext;
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::rust::{collect_schemas, handler_name, line_of, path_name, string_literal, uses_crate, ProjectIndex};
use crate::model::{Framework, HttpMethod, Language, RouteCandidate, SourceLocation};
use crate::parser::SourceFile;
use syn::visit::{self, Visit};
use syn::{Expr, ExprAssign, ExprMethodCall, ImplItemFn, ItemFn, Local, Pat};

use log::debug;

/// Upper bound on re-walks while router variables are still being rebound
const MAX_BINDING_PASSES: usize = 8;

/// Axum route extractor.
///
/// Routes come from `Router` method chains: `.route("/p", get(h).post(h2))`,
/// `.nest("/p", router)` and `.merge(router)`. A router mounted through a
/// variable or a function call (`.nest("/api", users())`) gives that name a
/// prefix; routes declared on the name pick it up, wherever in the file the
/// mount happens.
pub struct AxumExtractor;

impl FrameworkExtractor for AxumExtractor {
    fn framework(&self) -> Framework {
        Framework::Axum
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Rust]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        file.syntax()
            .is_some_and(|ast| uses_crate(&ast, "axum"))
    }

    fn extract_routes(&self, file: &SourceFile, index: &ProjectIndex) -> FileExtraction {
        let Some(ast) = file.syntax() else {
            return FileExtraction::default();
        };

        // A mount can come after the routes it prefixes, so walk until the
        // bindings stop changing
        let mut bindings: Vec<(String, String)> = Vec::new();
        let mut routes = Vec::new();
        for pass in 1..=MAX_BINDING_PASSES {
            let mut visitor = AxumVisitor::new(file, &bindings);
            visitor.visit_file(&ast);
            routes = visitor.routes;

            if visitor.bindings == bindings {
                debug!("{}: router bindings settled after {} passes", file.path.display(), pass);
                break;
            }
            bindings = visitor.bindings;
        }

        FileExtraction::new(routes.into_iter().map(|r| index.enrich(r)).collect())
    }

    fn extract_schemas(&self, file: &SourceFile) -> Vec<(String, SchemaNode)> {
        file.syntax().as_ref().map(collect_schemas).unwrap_or_default()
    }
}

/// Visitor for traversing the AST and finding Axum routes
struct AxumVisitor<'a> {
    file: &'a SourceFile,
    scope: ScopeContext,
    /// Variable or function the chain being visited belongs to
    owner: Option<String>,
    routes: Vec<RouteCandidate>,
    /// Bindings made during this pass, in order
    bindings: Vec<(String, String)>,
}

impl<'a> AxumVisitor<'a> {
    fn new(file: &'a SourceFile, seed: &[(String, String)]) -> Self {
        let mut scope = ScopeContext::new();
        for (name, prefix) in seed {
            scope.bind(name, prefix);
        }
        Self {
            file,
            scope,
            owner: None,
            routes: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn with_owner(&mut self, owner: Option<String>, f: impl FnOnce(&mut Self)) {
        let previous = std::mem::replace(&mut self.owner, owner);
        f(self);
        self.owner = previous;
    }

    /// Walk a router expression, receivers first so routes keep source order
    fn chain(&mut self, expr: &Expr) {
        match expr {
            Expr::MethodCall(call) => self.chain_call(call),
            Expr::Paren(paren) => self.chain(&paren.expr),
            Expr::Group(group) => self.chain(&group.expr),
            _ => {}
        }
    }

    fn chain_call(&mut self, call: &ExprMethodCall) {
        self.chain(&call.receiver);

        match call.method.to_string().as_str() {
            "route" => self.parse_route_method(call),
            "nest" => self.parse_nest_method(call),
            "merge" => {
                if let Some(router) = call.args.first() {
                    self.mount("", router);
                }
            }
            _ => {}
        }
    }

    /// `.route(path, method_router)`
    fn parse_route_method(&mut self, call: &ExprMethodCall) {
        let Some(path_arg) = call.args.first() else {
            return;
        };
        let Some(path) = string_literal(path_arg) else {
            debug!("Skipping route with non-literal path at line {}", line_of(path_arg));
            return;
        };
        let Some(router) = call.args.iter().nth(1) else {
            return;
        };

        let mut methods = Vec::new();
        method_router(router, &mut methods);
        let prefix = self.scope.current_prefix();

        for (method, handler) in methods {
            self.routes.push(
                RouteCandidate::new(
                    method,
                    Language::Rust,
                    SourceLocation::new(&self.file.path, line_of(path_arg)),
                )
                .with_prefix(prefix.as_str())
                .with_path(path.as_str())
                .with_handler(handler),
            );
        }
    }

    /// `.nest(path, router)`
    fn parse_nest_method(&mut self, call: &ExprMethodCall) {
        let (Some(path), Some(router)) = (
            call.args.first().and_then(string_literal),
            call.args.iter().nth(1),
        ) else {
            debug!("Skipping nest without a literal path at line {}", line_of(call));
            return;
        };
        self.mount(&path, router);
    }

    fn mount(&mut self, path: &str, router: &Expr) {
        if is_inline_router(router) {
            let handle = self.scope.push(path);
            self.chain(router);
            self.scope.pop(handle);
        } else if let Some(name) = mounted_name(router) {
            self.scope.bind_here(&name, path);
            self.bindings.push((name.clone(), self.scope.resolve(&name)));
        } else {
            debug!("Cannot follow mounted router at line {}", line_of(router));
        }
    }
}

impl<'ast> Visit<'ast> for AxumVisitor<'_> {
    fn visit_item_fn(&mut self, item: &'ast ItemFn) {
        self.with_owner(Some(item.sig.ident.to_string()), |v| visit::visit_item_fn(v, item));
    }

    fn visit_impl_item_fn(&mut self, item: &'ast ImplItemFn) {
        self.with_owner(Some(item.sig.ident.to_string()), |v| {
            visit::visit_impl_item_fn(v, item)
        });
    }

    fn visit_local(&mut self, local: &'ast Local) {
        match pattern_name(&local.pat) {
            Some(name) => self.with_owner(Some(name), |v| visit::visit_local(v, local)),
            None => visit::visit_local(self, local),
        }
    }

    fn visit_expr_assign(&mut self, assign: &'ast ExprAssign) {
        match path_name(&assign.left) {
            Some(name) => self.with_owner(Some(name), |v| visit::visit_expr_assign(v, assign)),
            None => visit::visit_expr_assign(self, assign),
        }
    }

    fn visit_expr_method_call(&mut self, call: &'ast ExprMethodCall) {
        if !is_router_chain(call) {
            visit::visit_expr_method_call(self, call);
            return;
        }

        let base = self
            .owner
            .as_deref()
            .map(|owner| self.scope.resolve(owner))
            .unwrap_or_default();
        let handle = self.scope.push(&base);
        self.chain_call(call);
        self.scope.pop(handle);
    }
}

/// Whether the chain ending in `call` declares or mounts routes
fn is_router_chain(call: &ExprMethodCall) -> bool {
    matches!(call.method.to_string().as_str(), "route" | "nest" | "merge")
        || match &*call.receiver {
            Expr::MethodCall(receiver) => is_router_chain(receiver),
            _ => false,
        }
}

fn is_inline_router(expr: &Expr) -> bool {
    match expr {
        Expr::MethodCall(call) => is_router_chain(call),
        Expr::Paren(paren) => is_inline_router(&paren.expr),
        _ => false,
    }
}

/// Name a mounted router is known by: `users`, `users::router()`, `api.with_state(s)`
fn mounted_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(_) => last_segment(&path_name(expr)?),
        Expr::Call(call) => last_segment(&path_name(&call.func)?),
        Expr::MethodCall(call) => mounted_name(&call.receiver),
        Expr::Paren(paren) => mounted_name(&paren.expr),
        Expr::Reference(reference) => mounted_name(&reference.expr),
        _ => None,
    }
}

fn last_segment(path: &str) -> Option<String> {
    path.rsplit("::").next().map(str::to_string)
}

fn pattern_name(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::Type(typed) => pattern_name(&typed.pat),
        _ => None,
    }
}

/// Methods and handlers of a method router: `get(h)`, `get(h).post(h2)`,
/// `on(MethodFilter::PUT, h)`, `any(h)`
fn method_router(expr: &Expr, out: &mut Vec<(HttpMethod, String)>) {
    match expr {
        Expr::Call(call) => {
            if let Some(name) = path_name(&call.func).and_then(|p| last_segment(&p)) {
                let args: Vec<&Expr> = call.args.iter().collect();
                method_filter(&name, &args, out);
            }
        }
        Expr::MethodCall(call) => {
            method_router(&call.receiver, out);
            let args: Vec<&Expr> = call.args.iter().collect();
            method_filter(&call.method.to_string(), &args, out);
        }
        Expr::Paren(paren) => method_router(&paren.expr, out),
        _ => debug!("Unrecognized method router at line {}", line_of(expr)),
    }
}

fn method_filter(name: &str, args: &[&Expr], out: &mut Vec<(HttpMethod, String)>) {
    if name == "on" {
        let method = args
            .first()
            .and_then(|filter| path_name(filter))
            .and_then(|filter| last_segment(&filter))
            .and_then(|filter| HttpMethod::parse(&filter));
        if let (Some(method), Some(handler)) = (method, args.get(1)) {
            out.push((method, handler_of(handler)));
        }
        return;
    }

    // `layer`, `with_state` and friends are not methods
    if let (Some(method), Some(handler)) = (HttpMethod::parse(name), args.first()) {
        out.push((method, handler_of(handler)));
    }
}

/// Handler name, looking through `handler.layer(..)` style wrappers
fn handler_of(expr: &Expr) -> String {
    match expr {
        Expr::MethodCall(call) => handler_of(&call.receiver),
        _ => handler_name(expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::canonicalize::{canonicalize, CanonicalizeOptions};
    use crate::model::{ParameterLocation, RouteDescriptor, ANONYMOUS_HANDLER};
    use pretty_assertions::assert_eq;

    fn parse_code(code: &str) -> SourceFile {
        SourceFile::from_source("src/routes.rs", Language::Rust, code.to_string()).unwrap()
    }

    fn extract(code: &str) -> Vec<RouteCandidate> {
        let file = parse_code(code);
        let index = ProjectIndex::build(std::slice::from_ref(&file));
        AxumExtractor.extract_routes(&file, &index).candidates
    }

    fn routes(code: &str) -> Vec<RouteDescriptor> {
        canonicalize(extract(code), &CanonicalizeOptions::default())
    }

    fn summary(routes: &[RouteDescriptor]) -> Vec<(HttpMethod, String)> {
        routes.iter().map(|r| (r.method, r.path_string())).collect()
    }

    #[test]
    fn test_simple_route_extraction() {
        let code = r#"
            use axum::{Router, routing::get};

            async fn handler() -> &'static str {
                "Hello, World!"
            }

            fn app() -> Router {
                Router::new().route("/hello", get(handler))
            }
        "#;

        let routes = extract(code);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].handler, Some("handler".to_string()));
        assert_eq!(routes[0].location.line, 9);
    }

    #[test]
    fn test_method_chain_on_one_route() {
        let code = r#"
            use axum::{Router, routing::{get, post}};

            fn app() -> Router {
                Router::new()
                    .route("/users", get(list_users).post(create_user))
                    .route("/users/:id", get(get_user).delete(delete_user))
            }
        "#;

        let routes = routes(code);
        assert_eq!(
            summary(&routes),
            vec![
                (HttpMethod::Get, "/users".to_string()),
                (HttpMethod::Post, "/users".to_string()),
                (HttpMethod::Get, "/users/{id}".to_string()),
                (HttpMethod::Delete, "/users/{id}".to_string()),
            ]
        );
        assert_eq!(routes[1].handler, Some("create_user".to_string()));
    }

    #[test]
    fn test_path_parameters_typed_from_handler() {
        let code = r#"
            use axum::{Router, routing::get, extract::Path};

            async fn get_comment(Path((post_id, comment_id)): Path<(u64, String)>) {}

            fn app() -> Router {
                Router::new().route("/posts/:post_id/comments/:comment_id", get(get_comment))
            }
        "#;

        let routes = routes(code);
        let params = &routes[0].parameters;
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "post_id");
        assert_eq!(params[0].location, ParameterLocation::Path);
        assert!(params[0].required);
        assert_eq!(params[0].schema, SchemaNode::primitive("integer", Some("int64")));
        assert_eq!(params[1].schema, SchemaNode::string());
    }

    #[test]
    fn test_nested_router_function() {
        let code = r#"
            use axum::{Router, routing::get};

            fn users_router() -> Router {
                Router::new()
                    .route("/", get(list_users))
                    .route("/:id", get(get_user))
            }

            fn app() -> Router {
                Router::new().nest("/api/users", users_router())
            }
        "#;

        assert_eq!(
            summary(&routes(code)),
            vec![
                (HttpMethod::Get, "/api/users".to_string()),
                (HttpMethod::Get, "/api/users/{id}".to_string()),
            ]
        );
    }

    #[test]
    fn test_nested_router_variables_resolve_transitively() {
        let code = r#"
            use axum::{Router, routing::get};

            fn app() -> Router {
                let users = Router::new().route("/users", get(list_users));
                let v1 = Router::new().nest("/v1", users).route("/status", get(status));
                Router::new()
                    .route("/health", get(health))
                    .nest("/api", v1)
            }
        "#;

        assert_eq!(
            summary(&routes(code)),
            vec![
                (HttpMethod::Get, "/api/v1/users".to_string()),
                (HttpMethod::Get, "/api/status".to_string()),
                (HttpMethod::Get, "/health".to_string()),
            ]
        );
    }

    #[test]
    fn test_inline_nest_and_merge() {
        let code = r#"
            use axum::{Router, routing::get};

            fn app(state: AppState) -> Router {
                let public = Router::new().route("/login", post(login));
                Router::new()
                    .nest("/admin", Router::new().route("/stats", get(stats)))
                    .merge(public.with_state(state))
            }
        "#;

        assert_eq!(
            summary(&routes(code)),
            vec![
                (HttpMethod::Post, "/login".to_string()),
                (HttpMethod::Get, "/admin/stats".to_string()),
            ]
        );
    }

    #[test]
    fn test_on_and_any_method_routers() {
        let code = r#"
            use axum::{Router, routing::{any, on, MethodFilter}};

            fn app() -> Router {
                Router::new()
                    .route("/replace", on(MethodFilter::PUT, replace))
                    .route("/proxy", any(proxy))
                    .route("/closure", get(|| async { "hi" }))
            }
        "#;

        let candidates = extract(code);
        let methods: Vec<HttpMethod> = candidates.iter().map(|c| c.method).collect();
        assert_eq!(methods, vec![HttpMethod::Put, HttpMethod::All, HttpMethod::Get]);
        assert_eq!(candidates[2].handler, Some(ANONYMOUS_HANDLER.to_string()));

        // The wildcard expands to the default method set
        assert_eq!(routes(code).len(), 1 + 5 + 1);
    }

    #[test]
    fn test_handler_types_attach_body_query_and_response() {
        let code = r#"
            use axum::{Json, Router, extract::Query, routing::{get, post}};
            use serde::{Deserialize, Serialize};

            #[derive(Deserialize)]
            pub struct Pagination { pub page: u32, pub limit: Option<u32> }

            #[derive(Deserialize)]
            pub struct CreateUser { pub name: String }

            #[derive(Serialize)]
            pub struct User { pub id: u64, pub name: String }

            async fn list_users(Query(p): Query<Pagination>) -> Json<Vec<User>> { todo!() }
            async fn create_user(Json(body): Json<CreateUser>) -> Result<Json<User>, AppError> { todo!() }

            fn app() -> Router {
                Router::new().route("/users", get(list_users).post(create_user))
            }
        "#;

        let routes = routes(code);
        let list = &routes[0];
        assert_eq!(list.parameters.len(), 2);
        assert_eq!(list.parameters[0].location, ParameterLocation::Query);
        assert!(list.parameters[0].required);
        assert!(!list.parameters[1].required);
        assert_eq!(list.response, Some(SchemaNode::array(SchemaNode::reference("User"))));

        let create = &routes[1];
        assert_eq!(create.request_body, Some(SchemaNode::reference("CreateUser")));
        assert_eq!(create.response, Some(SchemaNode::reference("User")));
    }

    #[test]
    fn test_layered_handler_keeps_its_name() {
        let code = r#"
            use axum::{Router, routing::get};

            fn app() -> Router {
                Router::new().route("/audit", get(audit.layer(TraceLayer::new())))
            }
        "#;

        assert_eq!(extract(code)[0].handler, Some("audit".to_string()));
    }

    #[test]
    fn test_non_literal_paths_are_skipped() {
        let code = r#"
            use axum::{Router, routing::get};

            fn app(path: &str) -> Router {
                Router::new().route(path, get(dynamic)).route("/static", get(fixed))
            }
        "#;

        assert_eq!(
            summary(&routes(code)),
            vec![(HttpMethod::Get, "/static".to_string())]
        );
    }

    #[test]
    fn test_probe() {
        assert!(AxumExtractor.probe(&parse_code("use axum::Router;")));
        assert!(!AxumExtractor.probe(&parse_code("use actix_web::App;")));
    }

    #[test]
    fn test_extract_schemas() {
        let file = parse_code("pub struct User { pub id: u64 }\npub enum Role { Admin }");
        let names: Vec<String> = AxumExtractor
            .extract_schemas(&file)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["User", "Role"]);
    }
}
