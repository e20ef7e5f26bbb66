// Actix-Web fixture: authors of the bookstore, registered through a ServiceConfig
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct Author {
    pub id: u32,
    pub name: String,
    pub born: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    pub born: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
    pub q: String,
    pub limit: Option<u32>,
}

#[get("/authors")]
async fn list_authors(query: web::Query<Search>) -> web::Json<Vec<Author>> {
    web::Json(Vec::new())
}

#[get("/authors/{id}")]
async fn get_author(path: web::Path<u32>) -> web::Json<Author> {
    let id = path.into_inner();
    web::Json(Author {
        id,
        name: "Ursula K. Le Guin".to_string(),
        born: Some(1929),
    })
}

#[post("/authors")]
async fn create_author(body: web::Json<NewAuthor>) -> HttpResponse {
    HttpResponse::Created().finish()
}

#[put("/authors/{id}")]
async fn update_author(path: web::Path<u32>, body: web::Json<NewAuthor>) -> web::Json<Author> {
    todo!()
}

#[delete("/authors/{id}")]
async fn delete_author(path: web::Path<u32>) -> HttpResponse {
    HttpResponse::NoContent().finish()
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

async fn stats() -> HttpResponse {
    HttpResponse::Ok().finish()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(list_authors)
            .service(get_author)
            .service(create_author)
            .service(update_author)
            .service(delete_author),
    );
    cfg.service(health);
    cfg.route("/stats", web::get().to(stats));
}
