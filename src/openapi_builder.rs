use crate::model::{HttpMethod, RouteDescriptor};
use crate::schema_generator::{Schema, SchemaGenerator};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const OPENAPI_VERSION: &str = "3.0.3";
const JSON_CONTENT_TYPE: &str = "application/json";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: HttpMethod) -> Option<&mut Option<Operation>> {
        match method {
            HttpMethod::Get => Some(&mut self.get),
            HttpMethod::Post => Some(&mut self.post),
            HttpMethod::Put => Some(&mut self.put),
            HttpMethod::Delete => Some(&mut self.delete),
            HttpMethod::Patch => Some(&mut self.patch),
            HttpMethod::Options => Some(&mut self.options),
            HttpMethod::Head => Some(&mut self.head),
            HttpMethod::All => None,
        }
    }

    /// Operations of this path in method order
    pub fn operations(&self) -> Vec<(&'static str, &Operation)> {
        [
            ("get", &self.get),
            ("post", &self.post),
            ("put", &self.put),
            ("delete", &self.delete),
            ("patch", &self.patch),
            ("options", &self.options),
            ("head", &self.head),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
        .collect()
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    /// Parameters (path, query, header)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: BTreeMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query, header)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Components {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemas: Option<BTreeMap<String, Schema>>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(JSON_CONTENT_TYPE.to_string(), MediaType { schema });
    content
}

fn status_description(status: u16) -> &'static str {
    match status {
        201 => "Created",
        202 => "Accepted",
        204 => "No content",
        _ => "Successful response",
    }
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: Some("API documentation generated from source code".to_string()),
            },
            paths: BTreeMap::new(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Add a canonical route to the document
    pub fn add_route(&mut self, route: &RouteDescriptor, schema_gen: &mut SchemaGenerator) {
        let path = route.path_string();
        debug!("Adding route: {} {}", route.method, path);

        let parameters = if route.parameters.is_empty() {
            None
        } else {
            Some(
                route
                    .parameters
                    .iter()
                    .map(|p| {
                        let param_schema = schema_gen.generate_parameter_schema(p);
                        Parameter {
                            name: param_schema.name,
                            location: param_schema.location,
                            required: param_schema.required,
                            schema: param_schema.schema,
                            description: None,
                        }
                    })
                    .collect(),
            )
        };

        let request_body = route.request_body.as_ref().map(|body| RequestBody {
            description: Some("Request body".to_string()),
            required: true,
            content: json_content(schema_gen.generate_schema(body)),
        });

        let status = route.success_status();
        // 204 never carries a body
        let content = match (&route.response, status) {
            (Some(response), s) if s != 204 => Some(json_content(schema_gen.generate_schema(response))),
            _ => None,
        };
        let mut responses = BTreeMap::new();
        responses.insert(
            status.to_string(),
            Response {
                description: status_description(status).to_string(),
                content,
            },
        );

        let operation = Operation {
            summary: Some(format!("{} {}", route.method, path)),
            description: route
                .handler
                .as_ref()
                .map(|handler| format!("Handled by `{}` ({})", handler, route.location)),
            operation_id: Some(route.operation_id.clone()),
            tags: route.tags.clone(),
            parameters,
            request_body,
            responses,
        };

        let path_item = self.paths.entry(path).or_default();
        match path_item.slot(route.method) {
            Some(slot) => *slot = Some(operation),
            None => debug!("Skipping unexpanded wildcard route at {}", route.location),
        }
    }

    /// Add every route of a canonical route table
    pub fn add_routes(&mut self, routes: &[RouteDescriptor], schema_gen: &mut SchemaGenerator) {
        for route in routes {
            self.add_route(route, schema_gen);
        }
    }

    /// Build the final OpenAPI document
    pub fn build(self, schema_gen: SchemaGenerator) -> OpenApiDocument {
        debug!("Building final OpenAPI document");

        let schemas = schema_gen.into_schemas();
        let components = if !schemas.is_empty() {
            Some(Components {
                schemas: Some(schemas),
            })
        } else {
            None
        };

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info,
            paths: self.paths,
            components,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::canonicalize::{canonicalize, CanonicalizeOptions};
    use crate::engine::schema_walker::{SchemaNode, SchemaRegistry};
    use crate::model::{Language, QueryParam, RouteCandidate, SourceLocation, StatusVariant};
    use pretty_assertions::assert_eq;

    fn candidate(method: HttpMethod, path: &str) -> RouteCandidate {
        RouteCandidate::new(method, Language::Rust, SourceLocation::new("src/main.rs", 10))
            .with_path(path)
    }

    fn routes(candidates: Vec<RouteCandidate>) -> Vec<RouteDescriptor> {
        canonicalize(candidates, &CanonicalizeOptions::default())
    }

    fn user_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.insert(
            "User",
            SchemaNode::object(
                vec![
                    ("id".to_string(), SchemaNode::primitive("integer", Some("int32"))),
                    ("name".to_string(), SchemaNode::string()),
                ],
                vec!["id".to_string(), "name".to_string()],
            ),
        );
        registry
    }

    #[test]
    fn test_new_builder() {
        let builder = OpenApiBuilder::new();

        assert_eq!(builder.info.title, "Generated API");
        assert_eq!(builder.info.version, "1.0.0");
        assert!(builder.info.description.is_some());
        assert!(builder.paths.is_empty());
    }

    #[test]
    fn test_with_info() {
        let builder = OpenApiBuilder::new().with_info(
            "My API".to_string(),
            "2.0.0".to_string(),
            Some("Custom description".to_string()),
        );

        assert_eq!(builder.info.title, "My API");
        assert_eq!(builder.info.version, "2.0.0");
        assert_eq!(builder.info.description, Some("Custom description".to_string()));
    }

    #[test]
    fn test_add_simple_get_route() {
        let registry = SchemaRegistry::new();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let route = routes(vec![candidate(HttpMethod::Get, "/users").with_handler("get_users")]);
        builder.add_route(&route[0], &mut schema_gen);

        assert_eq!(builder.paths.len(), 1);
        let path_item = &builder.paths["/users"];
        assert!(path_item.get.is_some());
        assert!(path_item.post.is_none());

        let operation = path_item.get.as_ref().unwrap();
        assert_eq!(operation.operation_id, Some("getGetUsers".to_string()));
        assert_eq!(operation.summary, Some("GET /users".to_string()));
        assert_eq!(operation.tags, vec!["users".to_string()]);
        assert!(operation.parameters.is_none());
        assert!(operation.request_body.is_none());
        assert!(operation.responses.contains_key("200"));
    }

    #[test]
    fn test_add_post_route_with_request_body() {
        let registry = user_registry();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let route = routes(vec![candidate(HttpMethod::Post, "/users")
            .with_handler("create_user")
            .with_request_body(Some(SchemaNode::reference("User")))]);
        builder.add_route(&route[0], &mut schema_gen);

        let operation = builder.paths["/users"].post.as_ref().unwrap();
        let body = operation.request_body.as_ref().unwrap();
        assert!(body.required);
        assert_eq!(
            body.content["application/json"].schema.reference,
            Some("#/components/schemas/User".to_string())
        );
        assert!(schema_gen.get_schemas().contains_key("User"));
    }

    #[test]
    fn test_add_route_with_path_and_query_parameters() {
        let registry = SchemaRegistry::new();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let route = routes(vec![candidate(HttpMethod::Get, "/users/:id")
            .with_param_hint(Some("id".to_string()), SchemaNode::primitive("integer", Some("int64")))
            .with_query(QueryParam::new("page", false, SchemaNode::primitive("integer", None)))]);
        builder.add_route(&route[0], &mut schema_gen);

        let operation = builder.paths["/users/{id}"].get.as_ref().unwrap();
        let params = operation.parameters.as_ref().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "id");
        assert_eq!(params[0].location, "path");
        assert!(params[0].required);
        assert_eq!(params[0].schema.format, Some("int64".to_string()));
        assert_eq!(params[1].name, "page");
        assert_eq!(params[1].location, "query");
        assert!(!params[1].required);
    }

    #[test]
    fn test_response_schema_and_status() {
        let registry = user_registry();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let table = routes(vec![
            candidate(HttpMethod::Post, "/users")
                .with_response(Some(SchemaNode::reference("User")))
                .with_status(Some(StatusVariant::Created)),
            candidate(HttpMethod::Delete, "/users/{id}")
                .with_response(Some(SchemaNode::string()))
                .with_status(Some(StatusVariant::NoContent)),
            candidate(HttpMethod::Get, "/users").with_response(Some(SchemaNode::array(
                SchemaNode::reference("User"),
            ))),
        ]);
        builder.add_routes(&table, &mut schema_gen);

        let created = &builder.paths["/users"].post.as_ref().unwrap().responses;
        assert_eq!(created.keys().collect::<Vec<_>>(), vec!["201"]);
        assert!(created["201"].content.is_some());

        let deleted = &builder.paths["/users/{id}"].delete.as_ref().unwrap().responses;
        assert_eq!(deleted.keys().collect::<Vec<_>>(), vec!["204"]);
        assert!(deleted["204"].content.is_none());

        let listed = &builder.paths["/users"].get.as_ref().unwrap().responses["200"];
        let schema = &listed.content.as_ref().unwrap()["application/json"].schema;
        assert_eq!(schema.schema_type, Some("array".to_string()));
    }

    #[test]
    fn test_default_response_without_type() {
        let registry = SchemaRegistry::new();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let route = routes(vec![candidate(HttpMethod::Get, "/health")]);
        builder.add_route(&route[0], &mut schema_gen);

        let response = &builder.paths["/health"].get.as_ref().unwrap().responses["200"];
        assert_eq!(response.description, "Successful response");
        assert!(response.content.is_none());
    }

    #[test]
    fn test_add_multiple_routes_same_path() {
        let registry = SchemaRegistry::new();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let table = routes(vec![
            candidate(HttpMethod::Get, "/items"),
            candidate(HttpMethod::Post, "/items"),
            candidate(HttpMethod::Put, "/items"),
        ]);
        builder.add_routes(&table, &mut schema_gen);

        assert_eq!(builder.paths.len(), 1);
        let methods: Vec<&str> = builder.paths["/items"]
            .operations()
            .into_iter()
            .map(|(method, _)| method)
            .collect();
        assert_eq!(methods, vec!["get", "post", "put"]);
    }

    #[test]
    fn test_build_document_structure() {
        let registry = user_registry();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new().with_info("Users".to_string(), "0.1.0".to_string(), None);

        let table = routes(vec![candidate(HttpMethod::Get, "/users/{id}")
            .with_response(Some(SchemaNode::reference("User")))]);
        builder.add_routes(&table, &mut schema_gen);
        let doc = builder.build(schema_gen);

        assert_eq!(doc.openapi, "3.0.3");
        assert_eq!(doc.info.title, "Users");
        assert!(doc.paths.contains_key("/users/{id}"));
        let schemas = doc.components.unwrap().schemas.unwrap();
        assert!(schemas.contains_key("User"));
    }

    #[test]
    fn test_build_document_no_schemas() {
        let registry = user_registry();
        let schema_gen = SchemaGenerator::new(&registry);
        let doc = OpenApiBuilder::new().build(schema_gen);

        // Registered but unreferenced schemas are not emitted
        assert!(doc.components.is_none());
        assert!(doc.paths.is_empty());
    }

    #[test]
    fn test_paths_are_sorted() {
        let registry = SchemaRegistry::new();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let table = routes(vec![
            candidate(HttpMethod::Get, "/zebras"),
            candidate(HttpMethod::Get, "/apples"),
            candidate(HttpMethod::Get, "/mangos"),
        ]);
        builder.add_routes(&table, &mut schema_gen);

        let paths: Vec<&String> = builder.paths.keys().collect();
        assert_eq!(paths, vec!["/apples", "/mangos", "/zebras"]);
    }

    #[test]
    fn test_handler_appears_in_description() {
        let registry = SchemaRegistry::new();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OpenApiBuilder::new();

        let table = routes(vec![candidate(HttpMethod::Get, "/ping").with_handler("handlers::ping")]);
        builder.add_routes(&table, &mut schema_gen);

        let operation = builder.paths["/ping"].get.as_ref().unwrap();
        assert_eq!(
            operation.description,
            Some("Handled by `handlers::ping` (src/main.rs:10)".to_string())
        );
    }
}
