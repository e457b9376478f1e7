//! Multipart form decoding for book requests.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use bookshelf_http::error::AppError;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::modules::books::models::{CoverUpload, CreateBook, UpdateBook};

const COVER_FIELD: &str = "coverimage";

/// Text fields keyed by lowercased name, plus the uploaded cover if any.
#[derive(Debug, Default)]
pub struct BookForm {
    fields: HashMap<String, String>,
    cover: Option<CoverUpload>,
}

impl BookForm {
    /// Drain every part of `multipart`. Later parts with the same name win.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_ascii_lowercase) else {
                continue;
            };

            if name == COVER_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                form.cover = Some(CoverUpload { file_name, bytes });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn into_create(mut self) -> Result<(CreateBook, Option<CoverUpload>), AppError> {
        let request = CreateBook {
            price: self.price()?,
            title: self.take("title"),
            author: self.take("author"),
            description: self.take("description"),
        };
        Ok((request, self.cover))
    }

    pub fn into_update(mut self) -> Result<(UpdateBook, Option<CoverUpload>), AppError> {
        let id = match self.take("id").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Uuid::parse_str(raw.trim())
                .map_err(|_| invalid_field("id", "invalid", "id must be a valid UUID"))?,
            None => return Err(invalid_field("id", "required", "id is required")),
        };

        let request = UpdateBook {
            id,
            price: self.price()?,
            title: self.take("title"),
            author: self.take("author"),
            description: self.take("description"),
        };
        Ok((request, self.cover))
    }

    pub fn into_cover(self) -> Option<CoverUpload> {
        self.cover
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    fn price(&mut self) -> Result<Option<Decimal>, AppError> {
        let Some(raw) = self.take("price").filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };

        Decimal::from_str(raw.trim())
            .or_else(|_| Decimal::from_scientific(raw.trim()))
            .map(Some)
            .map_err(|_| invalid_field("price", "invalid", "price must be a decimal number"))
    }
}

fn invalid_field(field: &str, error: &str, message: &str) -> AppError {
    AppError::validation(
        vec![json!({ "field": field, "error": error, "message": message })],
        "one or more fields are invalid",
    )
}
