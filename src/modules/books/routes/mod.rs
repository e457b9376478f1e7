//! HTTP handlers for the books module.

mod form;

use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bookshelf_http::error::AppError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::ValidationErrors;

use super::models::{BookResponse, PaginatedItems};
use super::service::{BookError, BookService};
use form::BookForm;

/// Routes relative to the module mount point.
pub fn router(service: Arc<BookService>) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book).put(update_book))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).delete(delete_book))
        .route("/{id}/CoverImage", get(get_cover_image).post(upload_cover_image))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[serde(alias = "PageSize", alias = "pagesize")]
    page_size: Option<u32>,
    #[serde(alias = "PageIndex", alias = "pageindex")]
    page_index: Option<u32>,
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(
    State(service): State<Arc<BookService>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<PaginatedItems<BookResponse>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(e.body_text()))?;

    let page_size = query.page_size.unwrap_or_else(|| service.default_page_size());
    let page_index = query.page_index.unwrap_or(0);

    Ok(Json(service.list(page_size, page_index).await?))
}

async fn get_book(
    State(service): State<Arc<BookService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookResponse>, AppError> {
    let id = book_id(id)?;
    Ok(Json(service.get(id).await?))
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|e| AppError::bad_request(e.body_text()))?;
    let (request, cover) = BookForm::read(multipart).await?.into_create()?;

    let book = service.create(request, cover).await?;
    Ok(created(book))
}

async fn update_book(
    State(service): State<Arc<BookService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|e| AppError::bad_request(e.body_text()))?;
    let (request, cover) = BookForm::read(multipart).await?.into_update()?;

    let book = service.update(request, cover).await?;
    Ok(created(book))
}

async fn delete_book(
    State(service): State<Arc<BookService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = book_id(id)?;
    service.delete(id).await?;
    Ok(StatusCode::OK)
}

async fn get_cover_image(
    State(service): State<Arc<BookService>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, AppError> {
    let id = book_id(id)?;
    let cover = service.cover_image(id).await?;

    Ok(([(header::CONTENT_TYPE, cover.content_type)], cover.bytes).into_response())
}

async fn upload_cover_image(
    State(service): State<Arc<BookService>>,
    id: Result<Path<Uuid>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BookResponse>, AppError> {
    let id = book_id(id)?;
    let multipart = multipart.map_err(|e| AppError::bad_request(e.body_text()))?;
    let cover = BookForm::read(multipart).await?.into_cover();

    Ok(Json(service.replace_cover(id, cover).await?))
}

fn book_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    id.map(|Path(id)| id)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

fn created(book: BookResponse) -> Response {
    let location = format!("/api/books/{}", book.id);
    (
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(book),
    )
        .into_response()
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::NotFound(id) => AppError::not_found(format!("book {id} was not found")),
            BookError::CoverNotFound(id) => {
                AppError::not_found(format!("book {id} has no cover image"))
            }
            BookError::Validation(errors) => {
                AppError::validation(validation_details(&errors), "one or more fields are invalid")
            }
            BookError::Internal(e) => AppError::Internal(e),
        }
    }
}

/// Flatten field errors into `{field, error, message}` entries, sorted by field.
fn validation_details(errors: &ValidationErrors) -> Vec<serde_json::Value> {
    let mut entries: Vec<(String, String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            let field = field.to_string();
            field_errors.iter().map(move |error| {
                let message = match &error.message {
                    Some(message) => message.to_string(),
                    None => default_message(&field, &error.code),
                };
                (field.clone(), error.code.to_string(), message)
            })
        })
        .collect();
    entries.sort();

    entries
        .into_iter()
        .map(|(field, error, message)| json!({ "field": field, "error": error, "message": message }))
        .collect()
}

fn default_message(field: &str, code: &str) -> String {
    match code {
        "required" => format!("{field} is required"),
        "length" => format!("{field} has an invalid length"),
        _ => format!("{field} is invalid"),
    }
}
