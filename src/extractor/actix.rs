use crate::engine::schema_walker::SchemaNode;
use crate::engine::scope::ScopeContext;
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::rust::{collect_schemas, handler_name, line_of, path_name, string_literal, uses_crate, ProjectIndex};
use crate::model::{Framework, HttpMethod, Language, RouteCandidate, SourceLocation};
use crate::parser::SourceFile;
use log::debug;
use syn::parse::ParseStream;
use syn::visit::{self, Visit};
use syn::{Attribute, Expr, ExprMethodCall, ImplItemFn, ItemFn, LitStr, MetaNameValue, Token};

const MAX_BINDING_PASSES: usize = 8;

/// Actix-Web route extractor.
///
/// Reads route macros (`#[get("/p")]`, `#[route("/p", method = "GET", method = "POST")]`)
/// and the builder API: `web::scope`, `web::resource`, `.route(path, web::get().to(h))`,
/// `.service(..)` and `.configure(f)`. A macro-annotated handler gets the prefix of
/// the scope it is registered in with `.service(handler)`.
pub struct ActixExtractor;

impl FrameworkExtractor for ActixExtractor {
    fn framework(&self) -> Framework {
        Framework::ActixWeb
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Rust]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        file.syntax()
            .is_some_and(|ast| uses_crate(&ast, "actix_web"))
    }

    fn extract_routes(&self, file: &SourceFile, index: &ProjectIndex) -> FileExtraction {
        let Some(ast) = file.syntax() else {
            return FileExtraction::default();
        };

        let mut bindings: Vec<(String, String)> = Vec::new();
        let mut routes = Vec::new();
        for _ in 0..MAX_BINDING_PASSES {
            let mut visitor = ActixVisitor::new(file, &bindings);
            visitor.visit_file(&ast);
            routes = visitor.finish();

            if visitor.bindings == bindings {
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

/// A handler annotated with a route macro
struct MacroRoute {
    methods: Vec<HttpMethod>,
    path: String,
    handler: String,
    line: usize,
}

/// Visitor for traversing the AST and finding Actix-Web routes
struct ActixVisitor<'a> {
    file: &'a SourceFile,
    scope: ScopeContext,
    owner: Option<String>,
    routes: Vec<RouteCandidate>,
    macros: Vec<MacroRoute>,
    bindings: Vec<(String, String)>,
}

/// What a builder chain starts from
enum ChainBase {
    Scope(String),
    Resource(String),
    Other,
}

impl<'a> ActixVisitor<'a> {
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
            macros: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Resolve macro routes against the registrations seen in this pass
    fn finish(&mut self) -> Vec<RouteCandidate> {
        let mut routes = std::mem::take(&mut self.routes);
        for route in &self.macros {
            let prefix = self.scope.resolve(&route.handler);
            for method in &route.methods {
                routes.push(
                    self.candidate(*method, route.line)
                        .with_prefix(prefix.as_str())
                        .with_path(route.path.as_str())
                        .with_handler(route.handler.as_str()),
                );
            }
        }
        routes.sort_by_key(|r| r.location.line);
        routes
    }

    fn candidate(&self, method: HttpMethod, line: usize) -> RouteCandidate {
        RouteCandidate::new(method, Language::Rust, SourceLocation::new(&self.file.path, line))
    }

    fn find_route_macros(&mut self, attrs: &[Attribute], fn_name: String) {
        for attr in attrs {
            if let Some((methods, path)) = parse_route_macro(attr) {
                self.macros.push(MacroRoute {
                    methods,
                    path,
                    handler: fn_name.clone(),
                    line: line_of(attr),
                });
            }
        }
    }

    fn bind(&mut self, name: String) {
        self.scope.bind_here(&name, "");
        let resolved = self.scope.resolve(&name);
        self.bindings.push((name, resolved));
    }

    fn chain(&mut self, expr: &Expr) {
        match expr {
            Expr::MethodCall(call) => self.chain_call(call),
            Expr::Paren(paren) => self.chain(&paren.expr),
            _ => {}
        }
    }

    fn chain_call(&mut self, call: &ExprMethodCall) {
        let (base, calls) = unroll(call);
        match chain_base(base) {
            ChainBase::Scope(path) => {
                let handle = self.scope.push(&path);
                for call in calls {
                    self.scope_method(call);
                }
                self.scope.pop(handle);
            }
            ChainBase::Resource(path) => {
                for call in calls {
                    self.resource_method(&path, call);
                }
            }
            ChainBase::Other => {
                for call in calls {
                    self.scope_method(call);
                }
            }
        }
    }

    /// Methods of `App`, `web::scope` and `ServiceConfig`
    fn scope_method(&mut self, call: &ExprMethodCall) {
        match call.method.to_string().as_str() {
            "service" => {
                for arg in &call.args {
                    self.service_arg(arg);
                }
            }
            "route" => {
                let Some(path_arg) = call.args.first() else {
                    return;
                };
                let Some(path) = string_literal(path_arg) else {
                    debug!("Skipping route with non-literal path at line {}", line_of(path_arg));
                    return;
                };
                if let Some((method, handler)) = call.args.iter().nth(1).and_then(route_def) {
                    let route = self
                        .candidate(method, line_of(path_arg))
                        .with_prefix(self.scope.current_prefix())
                        .with_path(path)
                        .with_handler(handler);
                    self.routes.push(route);
                }
            }
            "configure" => {
                if let Some(name) = call.args.first().and_then(path_name) {
                    self.bind(last_segment(&name));
                }
            }
            _ => {}
        }
    }

    /// Methods of `web::resource(path)`
    fn resource_method(&mut self, path: &str, call: &ExprMethodCall) {
        let method_name = call.method.to_string();
        let declared = match method_name.as_str() {
            "route" => call.args.first().and_then(route_def),
            "to" => call
                .args
                .first()
                .map(|h| (HttpMethod::All, handler_name(h))),
            other => HttpMethod::parse(other)
                .filter(|m| !m.is_wildcard())
                .zip(call.args.first().map(handler_name)),
        };

        if let Some((method, handler)) = declared {
            let route = self
                .candidate(method, line_of(call))
                .with_prefix(self.scope.current_prefix())
                .with_path(path)
                .with_handler(handler);
            self.routes.push(route);
        }
    }

    fn service_arg(&mut self, arg: &Expr) {
        match arg {
            Expr::Path(_) => {
                if let Some(name) = path_name(arg) {
                    self.bind(last_segment(&name));
                }
            }
            Expr::Tuple(tuple) => {
                for elem in &tuple.elems {
                    self.service_arg(elem);
                }
            }
            _ => self.chain(arg),
        }
    }
}

impl<'ast> Visit<'ast> for ActixVisitor<'_> {
    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        let fn_name = node.sig.ident.to_string();
        self.find_route_macros(&node.attrs, fn_name.clone());

        let previous = self.owner.replace(fn_name);
        visit::visit_item_fn(self, node);
        self.owner = previous;
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        let fn_name = node.sig.ident.to_string();
        self.find_route_macros(&node.attrs, fn_name.clone());

        let previous = self.owner.replace(fn_name);
        visit::visit_impl_item_fn(self, node);
        self.owner = previous;
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        if !is_actix_chain(node) {
            visit::visit_expr_method_call(self, node);
            return;
        }

        let base = self
            .owner
            .as_deref()
            .map(|owner| self.scope.resolve(owner))
            .unwrap_or_default();
        let handle = self.scope.push(&base);
        self.chain_call(node);
        self.scope.pop(handle);
    }
}

/// `#[get("/p")]`, `#[route("/p", method = "GET", method = "PUT")]`
fn parse_route_macro(attr: &Attribute) -> Option<(Vec<HttpMethod>, String)> {
    let attr_name = attr.path().segments.last()?.ident.to_string();
    let named_method = if attr_name == "route" {
        None
    } else {
        Some(HttpMethod::parse(&attr_name).filter(|m| !m.is_wildcard())?)
    };

    let (path, listed) = attr
        .parse_args_with(|input: ParseStream| {
            let path: LitStr = input.parse()?;
            let mut methods = Vec::new();
            while input.parse::<Option<Token![,]>>()?.is_some() {
                if input.is_empty() {
                    break;
                }
                let arg: MetaNameValue = input.parse()?;
                if arg.path.is_ident("method") {
                    if let Some(method) = string_literal(&arg.value).and_then(|m| HttpMethod::parse(&m)) {
                        methods.push(method);
                    }
                }
            }
            Ok((path.value(), methods))
        })
        .ok()?;

    let methods = match named_method {
        Some(method) => vec![method],
        None if listed.is_empty() => {
            debug!("#[route(\"{}\")] without a method", path);
            return None;
        }
        None => listed,
    };
    Some((methods, path))
}

/// `web::get().to(h)`, `web::route().method(Method::PUT).to(h)`
fn route_def(expr: &Expr) -> Option<(HttpMethod, String)> {
    let Expr::MethodCall(call) = expr else {
        return None;
    };
    let (base, calls) = unroll(call);

    let Expr::Call(base_call) = base else {
        return None;
    };
    let base_name = last_segment(&path_name(&base_call.func)?);
    let mut method = match base_name.as_str() {
        "route" => HttpMethod::All,
        "method" => base_call
            .args
            .first()
            .and_then(path_name)
            .and_then(|m| HttpMethod::parse(&last_segment(&m)))?,
        other => HttpMethod::parse(other)?,
    };

    let mut handler = None;
    for call in calls {
        match call.method.to_string().as_str() {
            "method" => {
                if let Some(m) = call
                    .args
                    .first()
                    .and_then(path_name)
                    .and_then(|m| HttpMethod::parse(&last_segment(&m)))
                {
                    method = m;
                }
            }
            "to" => handler = call.args.first().map(handler_name),
            _ => {}
        }
    }

    Some((method, handler?))
}

/// Split `base.a().b().c()` into `base` and `[a, b, c]`
fn unroll(call: &ExprMethodCall) -> (&Expr, Vec<&ExprMethodCall>) {
    let mut calls = vec![call];
    let mut base = &*call.receiver;
    while let Expr::MethodCall(inner) = base {
        calls.push(inner);
        base = &inner.receiver;
    }
    calls.reverse();
    (base, calls)
}

fn chain_base(base: &Expr) -> ChainBase {
    let Expr::Call(call) = base else {
        return ChainBase::Other;
    };
    let Some(name) = path_name(&call.func) else {
        return ChainBase::Other;
    };
    let path = call.args.first().and_then(string_literal);
    match (last_segment(&name).as_str(), path) {
        ("scope", Some(path)) => ChainBase::Scope(path),
        ("resource", Some(path)) => ChainBase::Resource(path),
        _ => ChainBase::Other,
    }
}

fn is_actix_chain(call: &ExprMethodCall) -> bool {
    let (base, calls) = unroll(call);
    !matches!(chain_base(base), ChainBase::Other)
        || calls.iter().any(|c| {
            matches!(
                c.method.to_string().as_str(),
                "service" | "route" | "configure"
            )
        })
}

fn last_segment(path: &str) -> String {
    path.rsplit("::").next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::canonicalize::{canonicalize, CanonicalizeOptions};
    use crate::model::{ParameterLocation, RouteDescriptor};
    use pretty_assertions::assert_eq;

    fn parse_code(code: &str) -> SourceFile {
        SourceFile::from_source("src/main.rs", Language::Rust, code.to_string()).unwrap()
    }

    fn extract(code: &str) -> Vec<RouteCandidate> {
        let file = parse_code(code);
        let index = ProjectIndex::build(std::slice::from_ref(&file));
        ActixExtractor.extract_routes(&file, &index).candidates
    }

    fn routes(code: &str) -> Vec<RouteDescriptor> {
        canonicalize(extract(code), &CanonicalizeOptions::default())
    }

    fn summary(routes: &[RouteDescriptor]) -> Vec<(HttpMethod, String)> {
        routes.iter().map(|r| (r.method, r.path_string())).collect()
    }

    #[test]
    fn test_simple_get_route() {
        let code = r#"
            use actix_web::{get, HttpResponse};

            #[get("/hello")]
            async fn hello() -> HttpResponse {
                HttpResponse::Ok().body("Hello, World!")
            }
        "#;

        let routes = extract(code);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].handler, Some("hello".to_string()));
        assert_eq!(routes[0].location.line, 4);
        assert_eq!(routes[0].response, None);
    }

    #[test]
    fn test_multiple_http_methods() {
        let code = r#"
            use actix_web::{get, post, put, delete, patch, HttpResponse};

            #[get("/resource")]
            async fn get_resource() -> HttpResponse { HttpResponse::Ok().finish() }

            #[post("/resource")]
            async fn create_resource() -> HttpResponse { HttpResponse::Created().finish() }

            #[put("/resource")]
            async fn update_resource() -> HttpResponse { HttpResponse::Ok().finish() }

            #[delete("/resource")]
            async fn delete_resource() -> HttpResponse { HttpResponse::NoContent().finish() }

            #[patch("/resource")]
            async fn patch_resource() -> HttpResponse { HttpResponse::Ok().finish() }
        "#;

        let methods: Vec<HttpMethod> = extract(code).iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            vec![
                HttpMethod::Get,
                HttpMethod::Post,
                HttpMethod::Put,
                HttpMethod::Delete,
                HttpMethod::Patch,
            ]
        );
    }

    #[test]
    fn test_route_macro_with_several_methods() {
        let code = r#"
            use actix_web::{route, HttpResponse};

            #[route("/items", method = "GET", method = "HEAD", wrap = "Logger::default()")]
            async fn items() -> HttpResponse { HttpResponse::Ok().finish() }
        "#;

        assert_eq!(
            summary(&routes(code)),
            vec![
                (HttpMethod::Get, "/items".to_string()),
                (HttpMethod::Head, "/items".to_string()),
            ]
        );
    }

    #[test]
    fn test_scope_handling() {
        let code = r#"
            use actix_web::{get, web, App, HttpServer};

            #[get("/{id}")]
            async fn get_user(path: web::Path<u64>) -> web::Json<User> { todo!() }

            #[get("/health")]
            async fn health() -> &'static str { "ok" }

            async fn create_user(body: web::Json<NewUser>) -> HttpResponse { todo!() }

            fn app() -> App {
                App::new()
                    .service(
                        web::scope("/api").service(
                            web::scope("/users")
                                .service(get_user)
                                .route("", web::post().to(create_user)),
                        ),
                    )
                    .service(health)
            }
        "#;

        let routes = routes(code);
        assert_eq!(
            summary(&routes),
            vec![
                (HttpMethod::Get, "/api/users/{id}".to_string()),
                (HttpMethod::Get, "/health".to_string()),
                (HttpMethod::Post, "/api/users".to_string()),
            ]
        );
        assert_eq!(routes[0].parameters[0].location, ParameterLocation::Path);
        assert_eq!(
            routes[0].parameters[0].schema,
            SchemaNode::primitive("integer", Some("int64"))
        );
        assert_eq!(routes[0].response, Some(SchemaNode::reference("User")));
        assert_eq!(routes[2].request_body, Some(SchemaNode::reference("NewUser")));
    }

    #[test]
    fn test_resource_routes() {
        let code = r#"
            use actix_web::{web, App, http::Method};

            fn app() -> App {
                App::new()
                    .service(
                        web::resource("/items/{id}")
                            .route(web::get().to(get_item))
                            .route(web::route().method(Method::PUT).to(put_item))
                            .delete(delete_item),
                    )
                    .service(web::resource("/ping").to(ping))
            }
        "#;

        let candidates = extract(code);
        let declared: Vec<(HttpMethod, Option<String>)> = candidates
            .iter()
            .map(|c| (c.method, c.handler.clone()))
            .collect();
        assert_eq!(
            declared,
            vec![
                (HttpMethod::Get, Some("get_item".to_string())),
                (HttpMethod::Put, Some("put_item".to_string())),
                (HttpMethod::Delete, Some("delete_item".to_string())),
                (HttpMethod::All, Some("ping".to_string())),
            ]
        );
    }

    #[test]
    fn test_configure_function_gets_scope_prefix() {
        let code = r#"
            use actix_web::{web, App};

            fn config(cfg: &mut web::ServiceConfig) {
                cfg.service(web::resource("/status").route(web::get().to(status)));
            }

            fn app() -> App {
                App::new().service(web::scope("/v1").configure(config))
            }
        "#;

        assert_eq!(
            summary(&routes(code)),
            vec![(HttpMethod::Get, "/v1/status".to_string())]
        );
    }

    #[test]
    fn test_query_extractor() {
        let code = r#"
            use actix_web::{get, web};

            pub struct Filter { pub q: String, pub limit: Option<u32> }

            #[get("/search")]
            async fn search(query: web::Query<Filter>) -> web::Json<Vec<String>> { todo!() }
        "#;

        let routes = routes(code);
        let names: Vec<&str> = routes[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["q", "limit"]);
        assert!(routes[0].parameters[0].required);
        assert!(!routes[0].parameters[1].required);
        assert_eq!(routes[0].parameters[0].location, ParameterLocation::Query);
    }

    #[test]
    fn test_non_route_attributes_are_ignored() {
        let code = r#"
            use actix_web::web;

            #[actix_web::main]
            async fn main() {}

            #[test]
            fn check() {}
        "#;

        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_probe() {
        assert!(ActixExtractor.probe(&parse_code("use actix_web::{web, App};")));
        assert!(ActixExtractor.probe(&parse_code("extern crate actix_web;")));
        assert!(!ActixExtractor.probe(&parse_code("use axum::Router;")));
    }
}
