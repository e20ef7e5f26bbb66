//! Candidate routes → canonical route table.
//!
//! Order matters here: candidates arrive in file order, then source order, and
//! the first candidate for a `(method, path)` pair is the one that survives.
//! Operation IDs are made unique in the same order.

use crate::engine::path_template::{normalize, PathTemplate};
use crate::engine::schema_walker::SchemaNode;
use crate::model::{
    HttpMethod, ParamHint, ParameterDescriptor, ParameterLocation, RouteCandidate,
    RouteDescriptor, ANONYMOUS_HANDLER,
};
use crate::type_mapper;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Leading path segments that never name a resource
const GENERIC_SEGMENTS: &[&str] = &["api", "v1", "v2", "v3"];

/// Suffixes stripped from grouping names (controller classes, blueprints)
const GROUP_SUFFIXES: &[&str] = &[
    "Controller", "Resource", "Handler", "Handlers", "Router", "Routes", "Api", "API", "Blueprint",
    "_blueprint", "_bp", "_router", "_routes",
];

/// Methods a wildcard declaration stands for when nothing else is configured
pub const DEFAULT_WILDCARD_METHODS: &[HttpMethod] = &[
    HttpMethod::Get,
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Patch,
    HttpMethod::Delete,
];

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalizeOptions {
    pub wildcard_methods: Vec<HttpMethod>,
}

impl Default for CanonicalizeOptions {
    fn default() -> Self {
        Self {
            wildcard_methods: DEFAULT_WILDCARD_METHODS.to_vec(),
        }
    }
}

/// Deduplicate and identify the complete candidate list.
pub fn canonicalize(
    candidates: Vec<RouteCandidate>,
    options: &CanonicalizeOptions,
) -> Vec<RouteDescriptor> {
    let total = candidates.len();
    let mut seen: HashSet<(HttpMethod, String)> = HashSet::new();
    let mut operation_ids: HashMap<String, usize> = HashMap::new();
    let mut routes = Vec::new();

    for candidate in expand_wildcards(candidates, options) {
        let template = normalize(&candidate.fragments, &candidate.prefix);
        let path = template.render();

        if !seen.insert((candidate.method, path.clone())) {
            debug!(
                "Dropping duplicate route {} {} declared at {}",
                candidate.method, path, candidate.location
            );
            continue;
        }

        let operation_id = unique_operation_id(
            operation_id(candidate.method, &path, candidate.handler.as_deref()),
            &mut operation_ids,
        );
        let tags = candidate
            .group
            .as_deref()
            .and_then(sanitize_group)
            .or_else(|| infer_tag(&path))
            .into_iter()
            .collect();
        let parameters = parameters(&candidate, &template);

        routes.push(RouteDescriptor {
            method: candidate.method,
            path: template,
            parameters,
            operation_id,
            tags,
            request_body: candidate.request_body,
            response: candidate.response,
            status: candidate.status,
            handler: candidate.handler,
            location: candidate.location,
        });
    }

    info!("Canonicalized {} candidates into {} routes", total, routes.len());
    routes
}

fn expand_wildcards(
    candidates: Vec<RouteCandidate>,
    options: &CanonicalizeOptions,
) -> Vec<RouteCandidate> {
    let mut expanded = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.method.is_wildcard() {
            expanded.extend(
                options
                    .wildcard_methods
                    .iter()
                    .map(|method| candidate.with_method(*method)),
            );
        } else {
            expanded.push(candidate);
        }
    }
    expanded
}

fn parameters(candidate: &RouteCandidate, template: &PathTemplate) -> Vec<ParameterDescriptor> {
    let mut unnamed_hints = candidate
        .param_hints
        .iter()
        .filter(|hint| hint.name.is_none());
    let named_hint = |name: &str| -> Option<&ParamHint> {
        candidate
            .param_hints
            .iter()
            .find(|hint| hint.name.as_deref() == Some(name))
    };

    let mut parameters: Vec<ParameterDescriptor> = template
        .parameters()
        .into_iter()
        .map(|(name, type_name)| {
            let schema = named_hint(name)
                .or_else(|| unnamed_hints.next())
                .map(|hint| hint.schema.clone())
                .or_else(|| {
                    type_name
                        .and_then(|t| type_mapper::openapi_type(candidate.language, t))
                        .map(|(ty, format)| SchemaNode::primitive(ty, format))
                })
                .unwrap_or_else(SchemaNode::string);
            ParameterDescriptor {
                name: name.to_string(),
                location: ParameterLocation::Path,
                required: true,
                schema,
            }
        })
        .collect();

    for query in &candidate.query {
        if parameters.iter().any(|p| p.name == query.name) {
            continue;
        }
        parameters.push(ParameterDescriptor {
            name: query.name.clone(),
            location: ParameterLocation::Query,
            required: query.required,
            schema: query.schema.clone(),
        });
    }

    parameters
}

/// Deterministic operation identifier for a route.
///
/// A known handler wins; otherwise the ID is built from the path, with
/// `{param}` spelled `ByParam`.
pub fn operation_id(method: HttpMethod, path: &str, handler: Option<&str>) -> String {
    let mut id = method.as_str().to_lowercase();

    let handler = handler
        .map(str::trim)
        .filter(|h| !h.is_empty() && *h != ANONYMOUS_HANDLER)
        .map(type_mapper::base_name)
        .filter(|h| h.chars().any(char::is_alphanumeric));

    match handler {
        Some(handler) => id.push_str(&title_case(handler)),
        None => {
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(param) => {
                        id.push_str("By");
                        id.push_str(&title_case(param));
                    }
                    None => id.push_str(&title_case(segment)),
                }
            }
        }
    }

    id
}

fn unique_operation_id(id: String, used: &mut HashMap<String, usize>) -> String {
    match used.get_mut(&id) {
        None => {
            used.insert(id.clone(), 1);
            id
        }
        Some(count) => {
            let mut n = *count + 1;
            let mut candidate = format!("{}{}", id, n);
            while used.contains_key(&candidate) {
                n += 1;
                candidate = format!("{}{}", id, n);
            }
            used.insert(id, n);
            used.insert(candidate.clone(), 1);
            debug!("Operation ID collision, using {}", candidate);
            candidate
        }
    }
}

/// Capitalize every word; words split on anything that is not alphanumeric
fn title_case(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// First resource-like literal segment of a canonical path
pub fn infer_tag(path: &str) -> Option<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .filter(|s| !GENERIC_SEGMENTS.contains(&s.to_lowercase().as_str()))
        .find(|s| !is_placeholder(s))
        .map(str::to_string)
}

fn is_placeholder(segment: &str) -> bool {
    segment.starts_with(['{', ':', '<', '*'])
}

/// Tag for a structural grouping name: `UserController` → `user`, `admin_bp` → `admin`
pub fn sanitize_group(name: &str) -> Option<String> {
    let name = name.trim();
    let stripped = GROUP_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix).filter(|rest| !rest.is_empty()))
        .unwrap_or(name);

    let mut tag = String::with_capacity(stripped.len() + 4);
    let mut previous_lower = false;
    for c in stripped.chars() {
        if c.is_uppercase() {
            if previous_lower {
                tag.push('-');
            }
            tag.extend(c.to_lowercase());
            previous_lower = false;
        } else if c == '_' || c == ' ' || c == '-' {
            if !tag.is_empty() && !tag.ends_with('-') {
                tag.push('-');
            }
            previous_lower = false;
        } else {
            tag.push(c);
            previous_lower = c.is_alphanumeric();
        }
    }

    let tag = tag.trim_matches('-').to_string();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, QueryParam, RawFragment, SourceLocation};
    use pretty_assertions::assert_eq;

    fn candidate(method: HttpMethod, path: &str, line: usize) -> RouteCandidate {
        RouteCandidate::new(method, Language::Go, SourceLocation::new("main.go", line))
            .with_path(path)
    }

    #[test]
    fn test_operation_id() {
        assert_eq!(operation_id(HttpMethod::Get, "/users/{id}", None), "getUsersById");
        assert_eq!(operation_id(HttpMethod::Get, "/users/{id}", Some("")), "getUsersById");
        assert_eq!(
            operation_id(HttpMethod::Get, "/users", Some("ListUsers")),
            "getListUsers"
        );
        assert_eq!(operation_id(HttpMethod::Get, "/", None), "get");
        assert_eq!(
            operation_id(HttpMethod::Post, "/users", Some("handlers::users::create_user")),
            "postCreateUser"
        );
        assert_eq!(
            operation_id(HttpMethod::Delete, "/x", Some(ANONYMOUS_HANDLER)),
            "deleteX"
        );
        assert_eq!(
            operation_id(HttpMethod::Get, "/order-items/{item_id}", None),
            "getOrderItemsByItemId"
        );
    }

    #[test]
    fn test_infer_tag() {
        assert_eq!(infer_tag("/api/v1/users/{id}"), Some("users".to_string()));
        assert_eq!(infer_tag("/{id}"), None);
        assert_eq!(infer_tag("/"), None);
        assert_eq!(infer_tag("/v2/orders"), Some("orders".to_string()));
    }

    #[test]
    fn test_sanitize_group() {
        assert_eq!(sanitize_group("UserController"), Some("user".to_string()));
        assert_eq!(sanitize_group("OrderItemResource"), Some("order-item".to_string()));
        assert_eq!(sanitize_group("admin_bp"), Some("admin".to_string()));
        assert_eq!(sanitize_group("items"), Some("items".to_string()));
        assert_eq!(sanitize_group("Controller"), Some("controller".to_string()));
        assert_eq!(sanitize_group("  "), None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let routes = canonicalize(
            vec![
                candidate(HttpMethod::Get, "/users/:id", 1).with_handler("first"),
                candidate(HttpMethod::Get, "/users/{id}", 2).with_handler("second"),
                candidate(HttpMethod::Post, "/users/:id", 3),
            ],
            &CanonicalizeOptions::default(),
        );

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].handler.as_deref(), Some("first"));
        assert_eq!(routes[0].location.line, 1);
        assert_eq!(routes[1].method, HttpMethod::Post);
    }

    #[test]
    fn test_canonicalize_is_deterministic() {
        let input = vec![
            candidate(HttpMethod::Get, "/a", 1),
            candidate(HttpMethod::Get, "/a", 2),
            candidate(HttpMethod::All, "/b", 3),
            candidate(HttpMethod::Get, "/b", 4),
        ];
        let first = canonicalize(input.clone(), &CanonicalizeOptions::default());
        let second = canonicalize(input, &CanonicalizeOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_wildcard_expands_before_dedup() {
        let routes = canonicalize(
            vec![
                candidate(HttpMethod::All, "/proxy", 1),
                candidate(HttpMethod::Get, "/proxy", 2).with_handler("later"),
            ],
            &CanonicalizeOptions::default(),
        );
        let methods: Vec<HttpMethod> = routes.iter().map(|r| r.method).collect();
        assert_eq!(methods, DEFAULT_WILDCARD_METHODS.to_vec());
        assert_eq!(routes[0].handler, None);

        let narrow = CanonicalizeOptions {
            wildcard_methods: vec![HttpMethod::Get, HttpMethod::Head],
        };
        let routes = canonicalize(vec![candidate(HttpMethod::All, "/proxy", 1)], &narrow);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].method, HttpMethod::Head);
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let routes = canonicalize(
            vec![
                candidate(HttpMethod::Get, "/a", 1).with_handler("list"),
                candidate(HttpMethod::Get, "/b", 2).with_handler("list"),
                candidate(HttpMethod::Get, "/c", 3).with_handler("list"),
            ],
            &CanonicalizeOptions::default(),
        );
        let ids: Vec<&str> = routes.iter().map(|r| r.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["getList", "getList2", "getList3"]);
    }

    #[test]
    fn test_group_tag_preferred_over_path() {
        let routes = canonicalize(
            vec![candidate(HttpMethod::Get, "/api/v1/people", 1)
                .with_group(Some("UserController".to_string()))],
            &CanonicalizeOptions::default(),
        );
        assert_eq!(routes[0].tags, vec!["user".to_string()]);
    }

    #[test]
    fn test_parameters_from_template_hints_and_query() {
        let c = RouteCandidate::new(
            HttpMethod::Get,
            Language::Python,
            SourceLocation::new("app.py", 1),
        )
        .with_path("/users/<int:user_id>/files/<path:name>")
        .with_query(QueryParam::new("limit", false, SchemaNode::primitive("integer", None)));

        let routes = canonicalize(vec![c], &CanonicalizeOptions::default());
        let params = &routes[0].parameters;

        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "user_id");
        assert_eq!(params[0].schema, SchemaNode::primitive("integer", None));
        assert_eq!(params[1].schema, SchemaNode::string());
        assert_eq!(params[2].location, ParameterLocation::Query);
        assert!(!params[2].required);
    }

    #[test]
    fn test_unnamed_hints_apply_in_order() {
        let c = RouteCandidate::new(HttpMethod::Get, Language::Rust, SourceLocation::new("a.rs", 1))
            .with_fragments(vec![RawFragment::literal("/orgs/{org}/repos/{repo}")])
            .with_param_hint(Some("repo".to_string()), SchemaNode::primitive("integer", Some("int64")))
            .with_param_hint(None, SchemaNode::primitive("integer", Some("int32")));

        let routes = canonicalize(vec![c], &CanonicalizeOptions::default());
        let params = &routes[0].parameters;
        assert_eq!(params[0].schema, SchemaNode::primitive("integer", Some("int32")));
        assert_eq!(params[1].schema, SchemaNode::primitive("integer", Some("int64")));
    }
}
