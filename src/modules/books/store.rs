//! Persistence for book records.

use anyhow::Context;
use async_trait::async_trait;
use bookshelf_db::Database;
use rusqlite::{params, types::Type, OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::models::Book;

/// Initial schema for the books table.
pub const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS books (
        id                    TEXT PRIMARY KEY,
        title                 TEXT NOT NULL,
        author                TEXT NOT NULL,
        description           TEXT,
        price                 TEXT NOT NULL,
        cover_image_file_name TEXT
    );
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, title, author, description, price, cover_image_file_name FROM books";

/// Storage for book records. Each call commits on its own.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Total number of books.
    async fn count(&self) -> anyhow::Result<u64>;

    /// One page of books ordered by id, skipping `page_size * page_index`.
    async fn list(&self, page_size: u32, page_index: u32) -> anyhow::Result<Vec<Book>>;

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Book>>;

    async fn add(&self, book: &Book) -> anyhow::Result<()>;

    /// Replace every mutable field of the stored record.
    ///
    /// Returns `false` when no record has the book's id.
    async fn update(&self, book: &Book) -> anyhow::Result<bool>;

    async fn remove(&self, book: &Book) -> anyhow::Result<()>;
}

/// [`BookStore`] backed by the shared SQLite database.
#[derive(Clone)]
pub struct SqliteBookStore {
    db: Database,
}

impl SqliteBookStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
        let id: String = row.get(0)?;
        let price: String = row.get(4)?;

        Ok(Book {
            id: Uuid::parse_str(&id)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
            title: row.get(1)?,
            author: row.get(2)?,
            description: row.get(3)?,
            price: price
                .parse::<Decimal>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
            cover_image_file_name: row.get(5)?,
        })
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn count(&self) -> anyhow::Result<u64> {
        self.db
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
                    .context("failed to count books")?;
                Ok(u64::try_from(count).unwrap_or_default())
            })
            .await
    }

    async fn list(&self, page_size: u32, page_index: u32) -> anyhow::Result<Vec<Book>> {
        let limit = i64::from(page_size);
        let offset = i64::try_from(u64::from(page_size) * u64::from(page_index)).unwrap_or(i64::MAX);

        self.db
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!("{SELECT_COLUMNS} ORDER BY id LIMIT ?1 OFFSET ?2"))
                    .context("failed to prepare book listing")?;

                let books = stmt
                    .query_map(params![limit, offset], Self::row_to_book)
                    .context("failed to list books")?
                    .collect::<Result<Vec<_>, _>>()
                    .context("failed to read book rows")?;

                Ok(books)
            })
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Book>> {
        self.db
            .call(move |conn| {
                conn.query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id.to_string()],
                    Self::row_to_book,
                )
                .optional()
                .with_context(|| format!("failed to get book {id}"))
            })
            .await
    }

    async fn add(&self, book: &Book) -> anyhow::Result<()> {
        let book = book.clone();

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO books (id, title, author, description, price, cover_image_file_name)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        book.id.to_string(),
                        book.title,
                        book.author,
                        book.description,
                        book.price.to_string(),
                        book.cover_image_file_name,
                    ],
                )
                .with_context(|| format!("failed to insert book {}", book.id))?;
                Ok(())
            })
            .await
    }

    async fn update(&self, book: &Book) -> anyhow::Result<bool> {
        let book = book.clone();

        self.db
            .call(move |conn| {
                let rows = conn
                    .execute(
                        "UPDATE books
                         SET title = ?2, author = ?3, description = ?4, price = ?5,
                             cover_image_file_name = ?6
                         WHERE id = ?1",
                        params![
                            book.id.to_string(),
                            book.title,
                            book.author,
                            book.description,
                            book.price.to_string(),
                            book.cover_image_file_name,
                        ],
                    )
                    .with_context(|| format!("failed to update book {}", book.id))?;

                Ok(rows > 0)
            })
            .await
    }

    async fn remove(&self, book: &Book) -> anyhow::Result<()> {
        let id = book.id;

        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM books WHERE id = ?1", params![id.to_string()])
                    .with_context(|| format!("failed to delete book {id}"))?;
                Ok(())
            })
            .await
    }
}
