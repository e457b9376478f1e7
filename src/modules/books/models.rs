use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// A book as persisted in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    /// Unique identifier, assigned once at creation
    pub id: Uuid,
    /// Title of the book
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Summary or blurb
    pub description: Option<String>,
    /// Non-negative price
    pub price: Decimal,
    /// Stored cover image file name, generated by the server
    pub cover_image_file_name: Option<String>,
}

/// A book as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    #[serde(rename = "coverImageURL")]
    pub cover_image_url: Option<String>,
    /// Written as a JSON number with every stored digit
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
}

/// One page of a listing plus the total number of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedItems<T> {
    pub page_index: u32,
    pub page_size: u32,
    pub count: u64,
    pub data: Vec<T>,
}

/// Fields accepted when creating a book.
#[derive(Debug, Clone, Default, Validate)]
pub struct CreateBook {
    #[validate(required, length(min = 2, max = 1000))]
    pub title: Option<String>,
    #[validate(required, length(min = 2, max = 1000))]
    pub author: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(required, custom(function = "validate_price"))]
    pub price: Option<Decimal>,
}

impl CreateBook {
    /// Trim text fields; blank ones count as omitted.
    pub fn normalized(self) -> Self {
        Self {
            title: non_empty(self.title),
            author: non_empty(self.author),
            description: non_empty(self.description),
            price: self.price,
        }
    }
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateBook {
    pub id: Uuid,
    #[validate(length(min = 1, max = 1000))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub author: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,
}

impl UpdateBook {
    /// Trim text fields; blank ones count as omitted.
    pub fn normalized(self) -> Self {
        Self {
            id: self.id,
            title: non_empty(self.title),
            author: non_empty(self.author),
            description: non_empty(self.description),
            price: self.price,
        }
    }

    /// Copy the supplied fields onto `book`.
    pub fn apply_to(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(description) = self.description {
            book.description = Some(description);
        }
        if let Some(price) = self.price {
            book.price = price;
        }
    }
}

/// An uploaded cover image as received from the client.
#[derive(Debug, Clone)]
pub struct CoverUpload {
    /// Client-side file name; only its extension is kept
    pub file_name: String,
    pub bytes: Bytes,
}

/// Cover image bytes ready to be served.
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Map a stored book to its API shape.
///
/// The cover URL is only present when the book has a stored file; `{id}` in
/// the template is replaced with the book id.
pub fn to_response(book: &Book, cover_image_base_url: &str) -> BookResponse {
    let cover_image_url = book
        .cover_image_file_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(|_| cover_image_base_url.replace("{id}", &book.id.to_string()));

    BookResponse {
        id: book.id,
        title: book.title.clone(),
        author: book.author.clone(),
        description: book.description.clone(),
        cover_image_url,
        price: book.price,
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        let mut error = ValidationError::new("non_negative");
        error.message = Some("price must not be negative".into());
        return Err(error);
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    const TEMPLATE: &str = "http://books.test/api/books/{id}/CoverImage";

    fn sample_book() -> Book {
        Book {
            id: Uuid::now_v7(),
            title: "Sapiens".to_string(),
            author: "Yuval Noah Harari".to_string(),
            description: None,
            price: Decimal::from(200),
            cover_image_file_name: None,
        }
    }

    #[test]
    fn response_without_cover_has_no_url() {
        let book = sample_book();
        let response = to_response(&book, TEMPLATE);

        assert_eq!(response.id, book.id);
        assert_eq!(response.title, "Sapiens");
        assert_eq!(response.cover_image_url, None);
    }

    #[test]
    fn response_with_cover_substitutes_id() {
        let mut book = sample_book();
        book.cover_image_file_name = Some("0f8fad5b.jpg".to_string());

        let response = to_response(&book, TEMPLATE);

        assert_eq!(
            response.cover_image_url,
            Some(format!("http://books.test/api/books/{}/CoverImage", book.id))
        );
    }

    #[test]
    fn response_serializes_with_api_field_names() {
        let json = serde_json::to_value(to_response(&sample_book(), TEMPLATE)).unwrap();

        assert!(json.get("coverImageURL").unwrap().is_null());
        assert_eq!(json["price"], 200.0);
        assert_eq!(json["author"], "Yuval Noah Harari");
    }

    #[test]
    fn price_keeps_every_digit_on_the_wire() {
        let mut book = sample_book();
        book.price = "12345678901234567.89".parse().unwrap();

        let body = serde_json::to_string(&to_response(&book, TEMPLATE)).unwrap();
        assert!(body.contains(r#""price":12345678901234567.89"#), "{body}");

        let parsed: BookResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.price, book.price);
    }

    #[test]
    fn create_requires_title_author_and_price() {
        let errors = CreateBook::default().validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("author"));
        assert!(fields.contains_key("price"));
        assert!(!fields.contains_key("description"));
    }

    #[test]
    fn create_rejects_short_title_and_negative_price() {
        let request = CreateBook {
            title: Some("A".to_string()),
            author: Some("Roy Osherove".to_string()),
            description: None,
            price: Decimal::from_f64(-1.5),
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("price"));
        assert!(!fields.contains_key("author"));
    }

    #[test]
    fn create_accepts_zero_price() {
        let request = CreateBook {
            title: Some("Free Book".to_string()),
            author: Some("Anonymous".to_string()),
            description: None,
            price: Some(Decimal::ZERO),
        };

        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_fields_are_treated_as_omitted() {
        let request = UpdateBook {
            id: Uuid::now_v7(),
            title: Some("   ".to_string()),
            author: Some(String::new()),
            description: Some("kept".to_string()),
            price: None,
        }
        .normalized();

        assert_eq!(request.title, None);
        assert_eq!(request.author, None);
        assert_eq!(request.description.as_deref(), Some("kept"));
    }

    #[test]
    fn padded_fields_are_trimmed_before_length_checks() {
        let request = CreateBook {
            title: Some("  a ".to_string()),
            author: Some(" Roy Osherove\t".to_string()),
            description: None,
            price: Some(Decimal::ONE),
        }
        .normalized();

        assert_eq!(request.title.as_deref(), Some("a"));
        assert_eq!(request.author.as_deref(), Some("Roy Osherove"));

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(!fields.contains_key("author"));
    }

    #[test]
    fn update_applies_only_supplied_fields() {
        let mut book = sample_book();
        book.description = Some("history of humankind".to_string());

        UpdateBook {
            id: book.id,
            title: Some("X".to_string()),
            price: Some(Decimal::from(999)),
            ..Default::default()
        }
        .apply_to(&mut book);

        assert_eq!(book.title, "X");
        assert_eq!(book.price, Decimal::from(999));
        assert_eq!(book.author, "Yuval Noah Harari");
        assert_eq!(book.description.as_deref(), Some("history of humankind"));
    }
}
