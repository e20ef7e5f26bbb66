// Axum fixture: a small bookstore API
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub subtitle: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Deserialize)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Review {
    pub stars: u8,
    pub text: String,
}

async fn list_books(Query(page): Query<Pagination>) -> Json<Vec<Book>> {
    Json(vec![])
}

async fn get_book(Path(id): Path<u64>) -> Json<Book> {
    Json(Book {
        id,
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        subtitle: None,
    })
}

async fn create_book(Json(body): Json<NewBook>) -> Result<Json<Book>, StatusCode> {
    Err(StatusCode::NOT_IMPLEMENTED)
}

async fn update_book(Path(id): Path<u64>, Json(patch): Json<BookPatch>) -> Json<Book> {
    todo!()
}

async fn delete_book(Path(id): Path<u64>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn list_reviews(Path(id): Path<u64>) -> Json<Vec<Review>> {
    Json(vec![])
}

async fn health() -> &'static str {
    "OK"
}

fn book_routes() -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/:id", get(get_book).put(update_book).delete(delete_book))
        .route("/:id/reviews", get(list_reviews))
}

pub fn app() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/books", book_routes())
}
