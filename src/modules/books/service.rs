//! Book operations composed from the record store and the image store.

use std::sync::Arc;

use anyhow::anyhow;
use bookshelf_kernel::settings::BookSettings;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use super::images::{self, ImageStore};
use super::models::{
    to_response, Book, BookResponse, CoverImage, CoverUpload, CreateBook, PaginatedItems,
    UpdateBook,
};
use super::store::BookStore;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("book {0} not found")]
    NotFound(Uuid),

    #[error("book {0} has no cover image")]
    CoverNotFound(Uuid),

    #[error("invalid book: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct BookService {
    store: Arc<dyn BookStore>,
    images: ImageStore,
    settings: BookSettings,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>, images: ImageStore, settings: BookSettings) -> Self {
        Self {
            store,
            images,
            settings,
        }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Page size used when a listing request does not name one.
    pub fn default_page_size(&self) -> u32 {
        self.settings.default_page_size
    }

    pub async fn list(
        &self,
        page_size: u32,
        page_index: u32,
    ) -> Result<PaginatedItems<BookResponse>, BookError> {
        let count = self.store.count().await?;
        let books = self.store.list(page_size, page_index).await?;

        Ok(PaginatedItems {
            page_index,
            page_size,
            count,
            data: books.iter().map(|book| self.respond(book)).collect(),
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<BookResponse, BookError> {
        let book = self.find(id).await?;
        Ok(self.respond(&book))
    }

    /// Validate, store the cover if one was uploaded, then persist the record.
    pub async fn create(
        &self,
        request: CreateBook,
        cover: Option<CoverUpload>,
    ) -> Result<BookResponse, BookError> {
        let request = request.normalized();
        request.validate()?;

        let CreateBook {
            title: Some(title),
            author: Some(author),
            description,
            price: Some(price),
        } = request
        else {
            return Err(anyhow!("validated create request is missing required fields").into());
        };

        let cover_image_file_name = self.store_cover(cover).await?;
        let book = Book {
            id: Uuid::now_v7(),
            title,
            author,
            description,
            price,
            cover_image_file_name,
        };

        if let Err(e) = self.store.add(&book).await {
            self.discard_cover(book.cover_image_file_name.as_deref()).await;
            return Err(e.into());
        }

        tracing::info!(book_id = %book.id, has_cover = book.cover_image_file_name.is_some(), "book created");
        Ok(self.respond(&book))
    }

    /// Apply the supplied fields; a new cover replaces the stored one.
    pub async fn update(
        &self,
        request: UpdateBook,
        cover: Option<CoverUpload>,
    ) -> Result<BookResponse, BookError> {
        let request = request.normalized();
        request.validate()?;

        let mut book = self.find(request.id).await?;
        let previous_cover = book.cover_image_file_name.clone();

        let new_cover = self.store_cover(cover).await?;
        if new_cover.is_some() {
            book.cover_image_file_name = new_cover.clone();
        }
        request.apply_to(&mut book);

        self.persist_update(&book, new_cover.as_deref()).await?;
        if new_cover.is_some() {
            self.discard_cover(previous_cover.as_deref()).await;
        }

        tracing::info!(book_id = %book.id, cover_replaced = new_cover.is_some(), "book updated");
        Ok(self.respond(&book))
    }

    /// Remove the cover file, then the record.
    pub async fn delete(&self, id: Uuid) -> Result<(), BookError> {
        let book = self.find(id).await?;

        if let Some(file_name) = book.cover_image_file_name.as_deref() {
            self.images.delete(file_name).await?;
        }
        self.store.remove(&book).await?;

        tracing::info!(book_id = %id, "book deleted");
        Ok(())
    }

    pub async fn cover_image(&self, id: Uuid) -> Result<CoverImage, BookError> {
        let book = self.find(id).await?;
        let file_name = book
            .cover_image_file_name
            .filter(|name| !name.is_empty())
            .ok_or(BookError::CoverNotFound(id))?;

        let bytes = self
            .images
            .read(&file_name)
            .await?
            .ok_or(BookError::CoverNotFound(id))?;

        Ok(CoverImage {
            content_type: images::mime_type(images::extension_of(&file_name)),
            bytes,
        })
    }

    /// Store `cover` under a fresh name and point the book at it.
    pub async fn replace_cover(
        &self,
        id: Uuid,
        cover: Option<CoverUpload>,
    ) -> Result<BookResponse, BookError> {
        let mut book = self.find(id).await?;

        let Some(cover) = cover.filter(|c| !c.bytes.is_empty()) else {
            let mut errors = ValidationErrors::new();
            let mut error = ValidationError::new("required");
            error.message = Some("a non-empty cover image is required".into());
            errors.add("coverImage", error);
            return Err(errors.into());
        };

        let previous_cover = book.cover_image_file_name.clone();
        let new_cover = self.store_cover(Some(cover)).await?;
        book.cover_image_file_name = new_cover.clone();

        self.persist_update(&book, new_cover.as_deref()).await?;
        self.discard_cover(previous_cover.as_deref()).await;

        tracing::info!(book_id = %id, "cover image replaced");
        Ok(self.respond(&book))
    }

    /// Insert the sample catalog when no books exist yet.
    pub async fn seed_demo_data(&self) -> Result<usize, BookError> {
        if self.store.count().await? > 0 {
            return Ok(0);
        }

        let books = demo_books();
        for book in &books {
            self.store.add(book).await?;
        }

        tracing::info!(count = books.len(), "seeded demo books");
        Ok(books.len())
    }

    async fn find(&self, id: Uuid) -> Result<Book, BookError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(BookError::NotFound(id))
    }

    /// Write `book` back; a freshly stored cover is removed when the write does not land.
    async fn persist_update(&self, book: &Book, new_cover: Option<&str>) -> Result<(), BookError> {
        match self.store.update(book).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.discard_cover(new_cover).await;
                Err(BookError::NotFound(book.id))
            }
            Err(e) => {
                self.discard_cover(new_cover).await;
                Err(e.into())
            }
        }
    }

    async fn store_cover(&self, cover: Option<CoverUpload>) -> anyhow::Result<Option<String>> {
        let Some(cover) = cover.filter(|c| !c.bytes.is_empty()) else {
            return Ok(None);
        };

        let file_name = images::generate_file_name(&cover.file_name);
        self.images.save(&cover.bytes, &file_name).await?;
        Ok(Some(file_name))
    }

    async fn discard_cover(&self, file_name: Option<&str>) {
        let Some(file_name) = file_name else {
            return;
        };

        if let Err(e) = self.images.delete(file_name).await {
            tracing::warn!(file = %file_name, error = ?e, "failed to remove cover image");
        }
    }

    fn respond(&self, book: &Book) -> BookResponse {
        to_response(book, &self.settings.cover_image_base_url)
    }
}

fn demo_books() -> Vec<Book> {
    vec![
        Book {
            id: Uuid::from_u128(0x176924b6_adcc_4ee0_b791_430105b5af51),
            title: "Sapiens: A Brief History of Humankind".to_string(),
            author: "Yuval Noah Harari".to_string(),
            description: Some(
                "The book surveys the history of humankind from the evolution of archaic human \
                 species in the Stone Age up to the twenty-first century, focusing on Homo sapiens."
                    .to_string(),
            ),
            price: Decimal::from(200),
            cover_image_file_name: None,
        },
        Book {
            id: Uuid::from_u128(0x17418cd0_ef0d_4523_872b_49c87b55fd3a),
            title: "One Flew Over the Cuckoo's Nest".to_string(),
            author: "Ken Kesey".to_string(),
            description: Some(
                "Set in an Oregon psychiatric hospital, the narrative serves as a study of \
                 institutional processes and the human mind."
                    .to_string(),
            ),
            price: Decimal::from(1000),
            cover_image_file_name: None,
        },
        Book {
            id: Uuid::from_u128(0xc143a75a_fa88_4c38_86aa_f0cf3795bf11),
            title: "Book 1".to_string(),
            author: "Author 1".to_string(),
            description: None,
            price: Decimal::from(300),
            cover_image_file_name: None,
        },
        Book {
            id: Uuid::from_u128(0x63303204_0abf_447f_89f1_95938e9fc7da),
            title: "Book 2".to_string(),
            author: "Author 2".to_string(),
            description: None,
            price: Decimal::from(400),
            cover_image_file_name: None,
        },
    ]
}
