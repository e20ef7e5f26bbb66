// Handlers, models and routers living in different files of one project
use pretty_assertions::assert_eq;
use routescope::engine::driver::{ExtractionDriver, ExtractionOptions};
use routescope::engine::schema_walker::SchemaNode;
use routescope::extractor::axum::AxumExtractor;
use routescope::extractor::{ExtractorRegistry, FrameworkExtractor};
use routescope::lang::rust::ProjectIndex;
use routescope::model::{HttpMethod, Language, ParameterLocation};
use routescope::parser::SourceFile;

fn rust_file(path: &str, code: &str) -> SourceFile {
    SourceFile::from_source(path, Language::Rust, code.to_string()).unwrap()
}

fn project() -> Vec<SourceFile> {
    vec![
        rust_file(
            "src/models.rs",
            r#"
            use serde::{Deserialize, Serialize};

            #[derive(Serialize)]
            pub struct User {
                pub id: u32,
                pub name: String,
            }

            #[derive(Deserialize)]
            pub struct UserFilter {
                pub name: Option<String>,
                pub active: bool,
            }
            "#,
        ),
        rust_file(
            "src/handlers.rs",
            r#"
            use axum::{extract::{Path, Query}, Json};
            use crate::models::{User, UserFilter};

            pub async fn get_user(Path(id): Path<u32>) -> Json<User> {
                todo!()
            }

            pub async fn list_users(Query(filter): Query<UserFilter>) -> Json<Vec<User>> {
                Json(vec![])
            }
            "#,
        ),
        rust_file(
            "src/routes.rs",
            r#"
            use axum::{Router, routing::get};
            use crate::handlers;

            pub fn app() -> Router {
                Router::new()
                    .route("/users/:id", get(handlers::get_user))
                    .route("/users", get(handlers::list_users))
            }
            "#,
        ),
    ]
}

#[test]
fn test_handler_signatures_resolve_across_files() {
    let files = project();
    let index = ProjectIndex::build(&files);

    let routes = AxumExtractor.extract_routes(&files[2], &index).candidates;
    assert_eq!(routes.len(), 2);

    assert_eq!(routes[0].handler.as_deref(), Some("handlers::get_user"));
    assert_eq!(routes[0].response, Some(SchemaNode::reference("User")));
    assert_eq!(
        routes[1].response,
        Some(SchemaNode::array(SchemaNode::reference("User")))
    );
}

#[test]
fn test_files_without_routes_still_contribute() {
    let report = ExtractionDriver::new(ExtractorRegistry::with_all(), ExtractionOptions::default())
        .run(&project());

    let summary: Vec<(HttpMethod, String)> = report
        .routes
        .iter()
        .map(|r| (r.method, r.path_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (HttpMethod::Get, "/users/{id}".to_string()),
            (HttpMethod::Get, "/users".to_string()),
        ]
    );

    // The path parameter is typed from the handler in handlers.rs
    let id = &report.routes[0].parameters[0];
    assert_eq!(id.location, ParameterLocation::Path);
    assert_eq!(id.schema, SchemaNode::primitive("integer", Some("int32")));

    // The query struct from models.rs is flattened into parameters
    let query: Vec<(&str, bool)> = report.routes[1]
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.required))
        .collect();
    assert_eq!(query, vec![("name", false), ("active", true)]);

    assert!(report.schemas.contains("User"));
    assert!(report.schemas.contains("UserFilter"));
    assert_eq!(report.routes[0].location.file.to_string_lossy(), "src/routes.rs");
}

#[test]
fn test_unknown_handlers_are_left_untyped() {
    let files = vec![rust_file(
        "src/routes.rs",
        r#"
        use axum::{Router, routing::get};

        pub fn app() -> Router {
            Router::new().route("/metrics", get(metrics::render))
        }
        "#,
    )];
    let index = ProjectIndex::build(&files);

    let routes = AxumExtractor.extract_routes(&files[0], &index).candidates;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].response, None);
    assert_eq!(routes[0].request_body, None);
}
