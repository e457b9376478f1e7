pub mod images;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, Migration, Module};
use serde_json::json;

use images::ImageStore;
use service::BookService;
use store::SqliteBookStore;

/// Book catalog with cover image storage
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(db: Database, settings: &Settings) -> Self {
        let service = BookService::new(
            Arc::new(SqliteBookStore::new(db)),
            ImageStore::new(&settings.storage),
            settings.books.clone(),
        );

        Self {
            service: Arc::new(service),
        }
    }

    pub fn service(&self) -> Arc<BookService> {
        Arc::clone(&self.service)
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.service.images().ensure_dir().await?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            images = %self.service.images().dir().display(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: store::SCHEMA,
        }]
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.books.seed_demo_data {
            let seeded = self.service.seed_demo_data().await?;
            tracing::info!(module = self.name(), seeded, "demo data checked");
        }

        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    })
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    })
}

fn query_parameter(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "in": "query",
        "required": false,
        "schema": { "type": "integer", "minimum": 0 }
    })
}

fn book_form(required: &[&str], with_id: bool) -> serde_json::Value {
    let mut properties = json!({
        "title": { "type": "string", "minLength": 1, "maxLength": 1000 },
        "author": { "type": "string", "minLength": 1, "maxLength": 1000 },
        "description": { "type": "string", "maxLength": 1000 },
        "price": { "type": "number", "minimum": 0 },
        "coverImage": { "type": "string", "format": "binary" }
    });
    if with_id {
        properties["id"] = json!({ "type": "string", "format": "uuid" });
    }

    json!({
        "required": true,
        "content": {
            "multipart/form-data": {
                "schema": {
                    "type": "object",
                    "properties": properties,
                    "required": required
                }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "parameters": [
                        query_parameter("pageSize"),
                        query_parameter("pageIndex")
                    ],
                    "responses": {
                        "200": {
                            "description": "One page of books",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/PaginatedBooks" }
                                }
                            }
                        },
                        "400": error_response("Malformed query"),
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_form(&["title", "author", "price"], false),
                    "responses": {
                        "201": book_response("Book created; Location points at the new book"),
                        "400": error_response("Validation error"),
                        "500": error_response("Internal server error")
                    }
                },
                "put": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "requestBody": book_form(&["id"], true),
                    "responses": {
                        "201": book_response("Book updated"),
                        "400": error_response("Validation error"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": book_response("The book"),
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found")
                    }
                },
                "delete": {
                    "summary": "Delete a book and its cover image",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": { "description": "Deleted" },
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/{id}/CoverImage": {
                "get": {
                    "summary": "Download a book's cover image",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": {
                            "description": "Image bytes",
                            "content": { "image/*": { "schema": { "type": "string", "format": "binary" } } }
                        },
                        "404": error_response("Book or cover image not found")
                    }
                },
                "post": {
                    "summary": "Replace a book's cover image",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "multipart/form-data": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "coverImage": { "type": "string", "format": "binary" }
                                    },
                                    "required": ["coverImage"]
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": book_response("Cover replaced"),
                        "400": error_response("Missing or empty cover image"),
                        "404": error_response("Book not found")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "description": { "type": ["string", "null"] },
                        "coverImageURL": { "type": ["string", "null"] },
                        "price": { "type": "number" }
                    },
                    "required": ["id", "title", "author", "coverImageURL", "price"]
                },
                "PaginatedBooks": {
                    "type": "object",
                    "properties": {
                        "pageIndex": { "type": "integer" },
                        "pageSize": { "type": "integer" },
                        "count": { "type": "integer" },
                        "data": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/Book" }
                        }
                    },
                    "required": ["pageIndex", "pageSize", "count", "data"]
                }
            }
        }
    })
}

/// Create the books module backed by `db`
pub fn create_module(db: Database, settings: &Settings) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(db, settings))
}
