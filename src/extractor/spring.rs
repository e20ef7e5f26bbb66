use crate::engine::node::{walk, Node, NodeVisitor, VisitFlow};
use crate::engine::schema_walker::{SchemaNode, SchemaWalker, TypeExpr};
use crate::engine::scope::{ScopeContext, ScopeHandle};
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::literal::{balanced_group, call_args, keyword, positional, string_list, string_value, CallArg};
use crate::lang::records::{java_classes, to_schemas};
use crate::lang::rust::ProjectIndex;
use crate::lang::tokens::{brace_tree, JAVA};
use crate::model::{
    Framework, HttpMethod, Language, QueryParam, RouteCandidate, SourceLocation, StatusVariant,
};
use crate::parser::SourceFile;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MAPPINGS: &[(&str, Option<HttpMethod>)] = &[
    ("GetMapping", Some(HttpMethod::Get)),
    ("PostMapping", Some(HttpMethod::Post)),
    ("PutMapping", Some(HttpMethod::Put)),
    ("DeleteMapping", Some(HttpMethod::Delete)),
    ("PatchMapping", Some(HttpMethod::Patch)),
    ("RequestMapping", None),
];
const METHOD_MODIFIERS: &[&str] = &[
    "public", "protected", "private", "static", "final", "abstract", "synchronized", "default",
];
/// Return types whose first type argument is the response body
const RESPONSE_WRAPPERS: &[&str] = &["ResponseEntity", "HttpEntity", "Mono", "CompletableFuture", "Callable", "DeferredResult"];

static SPRING_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+(?:static\s+)?org\.springframework\.").unwrap());
static ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@([A-Za-z_][\w.]*)").unwrap());
static TYPE_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:class|interface)\s+([A-Za-z_]\w*)").unwrap());
static METHOD_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z_]\w*)\s*\(").unwrap());

/// Spring MVC / WebFlux route extractor.
///
/// A class-level `@RequestMapping` prefixes every handler method of the
/// class, and the class name is the routes' tag. Handler parameters are typed
/// from `@PathVariable`, `@RequestParam` and `@RequestBody`.
pub struct SpringExtractor;

impl FrameworkExtractor for SpringExtractor {
    fn framework(&self) -> Framework {
        Framework::Spring
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Java]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        SPRING_IMPORT.is_match(&file.source)
    }

    fn extract_routes(&self, file: &SourceFile, _index: &ProjectIndex) -> FileExtraction {
        let tree = brace_tree(&file.source, &JAVA);
        let mut visitor = SpringVisitor {
            file,
            scope: ScopeContext::new(),
            walker: SchemaWalker::new(Language::Java),
            frames: Vec::new(),
            classes: Vec::new(),
            routes: Vec::new(),
        };
        walk(&tree, &mut visitor);
        FileExtraction::new(visitor.routes)
    }

    fn extract_schemas(&self, file: &SourceFile) -> Vec<(String, SchemaNode)> {
        to_schemas(java_classes(&brace_tree(&file.source, &JAVA)), Language::Java)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Annotation {
    name: String,
    args: Vec<CallArg>,
}

impl Annotation {
    /// `value`/`path`/first positional argument, as a list of strings
    fn paths(&self) -> Vec<String> {
        keyword(&self.args, "value")
            .or_else(|| keyword(&self.args, "path"))
            .or_else(|| positional(&self.args, 0))
            .map(string_list)
            .unwrap_or_default()
    }

    /// `name`/`value`/first positional argument as a string
    fn name_arg(&self) -> Option<String> {
        keyword(&self.args, "name")
            .or_else(|| keyword(&self.args, "value"))
            .or_else(|| positional(&self.args, 0))
            .and_then(string_value)
    }
}

/// Split the annotations off the front of a declaration
fn leading_annotations(text: &str) -> (Vec<Annotation>, &str) {
    let mut annotations = Vec::new();
    let mut rest = text.trim_start();

    while let Some(caps) = ANNOTATION.captures(rest) {
        let name = caps[1].rsplit('.').next().unwrap_or(&caps[1]).to_string();
        let mut end = caps.get(0).map_or(0, |m| m.end());
        let mut args = Vec::new();
        if rest[end..].starts_with('(') {
            if let Some(inner) = balanced_group(rest, end) {
                args = call_args(inner);
                end += inner.len() + 2;
            }
        }
        // `@interface` declares an annotation type
        if name == "interface" {
            break;
        }
        annotations.push(Annotation { name, args });
        rest = rest[end..].trim_start();
    }

    (annotations, rest)
}

enum Frame {
    Class(ScopeHandle),
    Plain,
}

struct SpringVisitor<'a> {
    file: &'a SourceFile,
    scope: ScopeContext,
    walker: SchemaWalker,
    frames: Vec<Frame>,
    /// Names of the enclosing classes, innermost last
    classes: Vec<String>,
    routes: Vec<RouteCandidate>,
}

impl SpringVisitor<'_> {
    fn method(&mut self, node: &Node, annotations: &[Annotation], signature: &str, class: Option<&str>) {
        let Some((mapping, fixed_method)) = annotations.iter().find_map(|a| {
            MAPPINGS
                .iter()
                .find(|(name, _)| *name == a.name)
                .map(|(_, method)| (a, *method))
        }) else {
            return;
        };

        let methods = match fixed_method {
            Some(method) => vec![method],
            None => request_methods(mapping),
        };
        let mut paths = mapping.paths();
        if paths.is_empty() {
            paths.push(String::new());
        }

        let Some(name) = METHOD_NAME.captures(signature) else {
            debug!("No method signature after mapping at line {}", node.line);
            return;
        };
        let name_match = name.get(1).map_or("", |m| m.as_str());
        let open = name.get(0).map_or(0, |m| m.end() - 1);
        let params = balanced_group(signature, open).map(split_params).unwrap_or_default();
        let returns = return_type(&signature[..name.get(0).map_or(0, |m| m.start())]);

        let handler = match class {
            Some(class) => format!("{}.{}", class, name_match),
            None => name_match.to_string(),
        };
        let status = annotations
            .iter()
            .find(|a| a.name == "ResponseStatus")
            .and_then(|a| {
                keyword(&a.args, "code")
                    .or_else(|| keyword(&a.args, "value"))
                    .or_else(|| positional(&a.args, 0))
            })
            .and_then(status_variant);
        let response = returns.and_then(|ty| self.response_schema(&ty));

        let prefix = self.scope.current_prefix();
        for path in &paths {
            for method in &methods {
                let mut candidate = RouteCandidate::new(
                    *method,
                    Language::Java,
                    SourceLocation::new(&self.file.path, node.line),
                )
                .with_prefix(prefix.as_str())
                .with_path(path.as_str())
                .with_handler(handler.as_str())
                .with_group(class.map(str::to_string))
                .with_response(response.clone())
                .with_status(status);
                for param in &params {
                    candidate = self.apply_param(candidate, param);
                }
                self.routes.push(candidate);
            }
        }
    }

    fn apply_param(&self, candidate: RouteCandidate, param: &str) -> RouteCandidate {
        let (annotations, declaration) = leading_annotations(param);
        let words: Vec<&str> = declaration
            .split_whitespace()
            .filter(|w| *w != "final")
            .collect();
        let Some((name, type_words)) = words.split_last() else {
            return candidate;
        };
        let ty = TypeExpr::parse(&type_words.join(" "));
        let (schema, optional) = self.walker.walk_type(&ty);

        let binding = annotations.iter().find(|a| {
            matches!(
                a.name.as_str(),
                "PathVariable" | "RequestParam" | "RequestBody" | "RequestHeader" | "CookieValue" | "ModelAttribute"
            )
        });
        match binding.map(|a| (a.name.as_str(), a)) {
            Some(("PathVariable", annotation)) => {
                let name = annotation.name_arg().unwrap_or_else(|| name.to_string());
                candidate.with_param_hint(Some(name), schema)
            }
            Some(("RequestParam", annotation)) => {
                let name = annotation.name_arg().unwrap_or_else(|| name.to_string());
                let required = keyword(&annotation.args, "required").map(str::trim) != Some("false")
                    && keyword(&annotation.args, "defaultValue").is_none()
                    && !optional;
                candidate.with_query(QueryParam::new(name, required, schema))
            }
            Some(("RequestBody", _)) => candidate.with_request_body(Some(schema)),
            Some(_) => candidate,
            // Unannotated simple values bind to optional request parameters
            None if schema.is_primitive() => {
                candidate.with_query(QueryParam::new(*name, false, schema))
            }
            None => candidate,
        }
    }

    fn response_schema(&self, return_type: &str) -> Option<SchemaNode> {
        let mut ty = TypeExpr::parse(return_type);
        while RESPONSE_WRAPPERS.contains(&ty.base_name()) {
            ty = ty.args.first()?.clone();
        }
        if ty.base_name() == "Flux" {
            let item = self.walker.walk_type(ty.args.first()?).0;
            return Some(SchemaNode::array(item));
        }
        if matches!(ty.base_name(), "void" | "Void" | "?" | "") {
            return None;
        }
        Some(self.walker.walk_type(&ty).0)
    }
}

impl NodeVisitor for SpringVisitor<'_> {
    fn enter(&mut self, node: &Node) -> VisitFlow {
        let (annotations, rest) = leading_annotations(&node.text);

        if !node.children.is_empty() {
            if let Some(caps) = TYPE_DECL.captures(rest) {
                let prefix = annotations
                    .iter()
                    .find(|a| a.name == "RequestMapping")
                    .and_then(|a| a.paths().into_iter().next())
                    .unwrap_or_default();
                let handle = self.scope.push(&prefix);
                self.classes.push(caps[1].to_string());
                self.frames.push(Frame::Class(handle));
                return VisitFlow::Continue;
            }
        }

        let class = self.classes.last().cloned();
        self.method(node, &annotations, rest, class.as_deref());
        self.frames.push(Frame::Plain);
        VisitFlow::Continue
    }

    fn leave(&mut self, _node: &Node) {
        if let Some(Frame::Class(handle)) = self.frames.pop() {
            self.scope.pop(handle);
            self.classes.pop();
        }
    }
}

/// Methods named by `@RequestMapping(method = ...)`; none means every method
fn request_methods(mapping: &Annotation) -> Vec<HttpMethod> {
    let Some(value) = keyword(&mapping.args, "method") else {
        return vec![HttpMethod::All];
    };
    let value = value.trim();
    let inner = value
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .unwrap_or(value);
    let methods: Vec<HttpMethod> = inner
        .split(',')
        .filter_map(|m| HttpMethod::parse(m.trim().rsplit('.').next().unwrap_or(m)))
        .collect();
    if methods.is_empty() {
        vec![HttpMethod::All]
    } else {
        methods
    }
}

/// Return type text of a method signature prefix (`public <T> ResponseEntity<T> `)
fn return_type(head: &str) -> Option<String> {
    let mut head = head.trim();
    loop {
        let word = head.split_whitespace().next()?;
        if METHOD_MODIFIERS.contains(&word) {
            head = head[word.len()..].trim_start();
        } else if head.starts_with('<') {
            let close = head.find('>')?;
            head = head[close + 1..].trim_start();
        } else {
            break;
        }
    }
    let head = head.trim_end();
    (!head.is_empty()).then(|| head.to_string())
}

/// Split a Java parameter list on commas outside generics, parentheses and strings
fn split_params(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        match c {
            '"' => in_string = !in_string,
            _ if in_string => {}
            '(' | '<' | '{' | '[' => depth += 1,
            ')' | '>' | '}' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn status_variant(value: &str) -> Option<StatusVariant> {
    match value.trim().rsplit('.').next()? {
        "CREATED" => Some(StatusVariant::Created),
        "ACCEPTED" => Some(StatusVariant::Accepted),
        "NO_CONTENT" => Some(StatusVariant::NoContent),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::canonicalize::{canonicalize, CanonicalizeOptions};
    use crate::model::{ParameterLocation, RouteDescriptor};
    use pretty_assertions::assert_eq;

    fn java(code: &str) -> SourceFile {
        SourceFile::from_source("UserController.java", Language::Java, code.to_string()).unwrap()
    }

    fn routes(code: &str) -> Vec<RouteDescriptor> {
        let candidates = SpringExtractor
            .extract_routes(&java(code), &ProjectIndex::new())
            .candidates;
        canonicalize(candidates, &CanonicalizeOptions::default())
    }

    const CONTROLLER: &str = r#"
package com.example.api;

import org.springframework.http.ResponseEntity;
import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/api/users")
public class UserController {

    private final UserService service;

    @GetMapping("/{id}")
    public ResponseEntity<User> getUser(@PathVariable("id") Long userId) {
        return ResponseEntity.ok(service.find(userId));
    }

    @GetMapping
    public List<User> list(@RequestParam(value = "page", required = false) Integer page,
                           @RequestParam String sort) {
        return service.list(page, sort);
    }

    @PostMapping
    @ResponseStatus(HttpStatus.CREATED)
    public User create(@Valid @RequestBody CreateUser request) {
        return service.create(request);
    }

    @RequestMapping(value = "/{id}", method = {RequestMethod.PUT, RequestMethod.PATCH})
    public void update(@PathVariable Long id, @RequestBody Map<String, Object> changes) {
        service.update(id, changes);
    }

    private void helper() {
        if (true) {
            log.info("not a route");
        }
    }
}
"#;

    #[test]
    fn test_controller_routes() {
        let routes = routes(CONTROLLER);
        let summary: Vec<(HttpMethod, String)> =
            routes.iter().map(|r| (r.method, r.path_string())).collect();
        assert_eq!(
            summary,
            vec![
                (HttpMethod::Get, "/api/users/{id}".to_string()),
                (HttpMethod::Get, "/api/users".to_string()),
                (HttpMethod::Post, "/api/users".to_string()),
                (HttpMethod::Put, "/api/users/{id}".to_string()),
                (HttpMethod::Patch, "/api/users/{id}".to_string()),
            ]
        );
        assert!(routes.iter().all(|r| r.tags == vec!["user".to_string()]));
        assert_eq!(routes[0].handler.as_deref(), Some("UserController.getUser"));
        assert_eq!(routes[0].operation_id, "getGetUser");
        assert_eq!(routes[0].location.line, 13);
    }

    #[test]
    fn test_parameter_and_body_types() {
        let routes = routes(CONTROLLER);

        let get = &routes[0];
        assert_eq!(get.parameters[0].schema, SchemaNode::primitive("integer", Some("int64")));
        assert_eq!(get.response, Some(SchemaNode::reference("User")));

        let list = &routes[1];
        let params: Vec<(&str, ParameterLocation, bool)> = list
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.location, p.required))
            .collect();
        assert_eq!(
            params,
            vec![
                ("page", ParameterLocation::Query, false),
                ("sort", ParameterLocation::Query, true),
            ]
        );
        assert_eq!(list.response, Some(SchemaNode::array(SchemaNode::reference("User"))));

        let create = &routes[2];
        assert_eq!(create.request_body, Some(SchemaNode::reference("CreateUser")));
        assert_eq!(create.status, Some(StatusVariant::Created));

        let update = &routes[3];
        assert_eq!(update.response, None);
        assert_eq!(update.request_body, Some(SchemaNode::any()));
    }

    #[test]
    fn test_request_mapping_without_method_is_a_wildcard() {
        let code = r#"
import org.springframework.web.bind.annotation.RequestMapping;

@Controller
public class PingResource {
    @RequestMapping({"/ping", "/healthz"})
    public String ping() { return "pong"; }
}
"#;

        let candidates = SpringExtractor
            .extract_routes(&java(code), &ProjectIndex::new())
            .candidates;
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.method == HttpMethod::All));
        assert_eq!(candidates[0].group.as_deref(), Some("PingResource"));
    }

    #[test]
    fn test_leading_annotations() {
        let (annotations, rest) =
            leading_annotations(r#"@GetMapping(value = "/a", produces = "application/json") @Deprecated public void a()"#);
        let names: Vec<&str> = annotations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["GetMapping", "Deprecated"]);
        assert_eq!(annotations[0].paths(), vec!["/a".to_string()]);
        assert_eq!(rest, "public void a()");
    }

    #[test]
    fn test_return_type_and_params() {
        assert_eq!(return_type("public static <T> List<T> ").as_deref(), Some("List<T>"));
        assert_eq!(return_type("public "), None);
        assert_eq!(
            split_params(r#"@RequestParam(defaultValue = "a,b") String q, Map<String, Integer> m"#),
            vec![r#"@RequestParam(defaultValue = "a,b") String q"#, "Map<String, Integer> m"]
        );
    }

    #[test]
    fn test_probe_and_schemas() {
        assert!(SpringExtractor.probe(&java(CONTROLLER)));
        assert!(!SpringExtractor.probe(&java("import java.util.List;\nclass A {}\n")));

        let file = java("public class User {\n    private long id;\n    private String name;\n}\n");
        let schemas = SpringExtractor.extract_schemas(&file);
        assert_eq!(schemas[0].0, "User");
        assert_eq!(schemas[0].1.required(), &["id".to_string()]);
    }
}
