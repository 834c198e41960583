use crate::config::Config;
use crate::error::DomainError;
use crate::handler::HandlerParams;
use crate::model::*;
use anyhow::Result;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[
    ("001_schema.sql", include_str!("migrations/001_schema.sql")),
    ("002_seed_status.sql", include_str!("migrations/002_seed_status.sql")),
];

#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataAggregate {
    pub authors: Vec<AuthorAggregate>,
    pub categories: Vec<CategoryAggregate>,
}

pub struct Database {
    _db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Mutex<()>,
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Serializes writers that need BEGIN/COMMIT on the shared connection.
    pub async fn lock_tx(&self) -> MutexGuard<'_, ()> {
        self.tx_lock.lock().await
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(cfg.app.get_db());
        let db = Builder::new_local(&path).build().await?;

        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in crate::members::migrations() {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in crate::circulation::migrations() {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in crate::auth::migrations() {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            _db: db,
            conn,
            tx_lock: Mutex::new(()),
        })
    }

    fn split_comma_separated_string(s: String) -> Vec<String> {
        s.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn row_to_book(row: &libsql::Row) -> Result<Book, DomainError> {
        let authors: String = row.get::<Option<String>>(7)?.unwrap_or_default();
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            isbn: row.get(2)?,
            category: row.get(3)?,
            status: row.get(4)?,
            total_copies: row.get(5)?,
            available_copies: row.get(6)?,
            authors: Self::split_comma_separated_string(authors),
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub async fn get_books(&self, params: HandlerParams) -> Result<Vec<Book>, DomainError> {
        let list_books = r#"
SELECT
    books.id,
    books.title,
    books.isbn,
    categories.name,
    status.name,
    books.total_copies,
    books.available_copies,
    GROUP_CONCAT(DISTINCT authors.name),
    books.created_at,
    books.updated_at
FROM books
LEFT JOIN categories ON categories.id = books.category_id
JOIN status ON status.id = books.status_id
LEFT JOIN book_authors ON book_authors.book_id = books.id
LEFT JOIN authors ON authors.id = book_authors.author_id
WHERE books.deleted_at IS NULL
GROUP BY books.id
ORDER BY books.id
LIMIT ? OFFSET ?
"#;

        let search_books = r#"
SELECT
    books.id,
    books.title,
    books.isbn,
    categories.name,
    status.name,
    books.total_copies,
    books.available_copies,
    GROUP_CONCAT(DISTINCT authors.name),
    books.created_at,
    books.updated_at
FROM books
LEFT JOIN categories ON categories.id = books.category_id
JOIN status ON status.id = books.status_id
LEFT JOIN book_authors ON book_authors.book_id = books.id
LEFT JOIN authors ON authors.id = book_authors.author_id
WHERE books.deleted_at IS NULL
  AND (books.title LIKE ? OR books.isbn LIKE ? OR authors.name LIKE ? OR categories.name LIKE ?)
GROUP BY books.id
ORDER BY books.id
LIMIT ? OFFSET ?
"#;

        let mut rows = if let Some(search) = &params.q {
            let pattern = format!("%{}%", search);
            self.conn
                .query(
                    search_books,
                    (
                        pattern.clone(),
                        pattern.clone(),
                        pattern.clone(),
                        pattern,
                        params.limit as i32,
                        params.offset as i32,
                    ),
                )
                .await?
        } else {
            self.conn
                .query(list_books, (params.limit as i32, params.offset as i32))
                .await?
        };

        let mut books: Vec<Book> = vec![];
        while let Some(row) = rows.next().await? {
            books.push(Self::row_to_book(&row)?);
        }

        Ok(books)
    }

    pub async fn get_book_by_id(&self, book_id: i32) -> Result<Option<Book>, DomainError> {
        let query = r#"
SELECT
    books.id,
    books.title,
    books.isbn,
    categories.name,
    status.name,
    books.total_copies,
    books.available_copies,
    GROUP_CONCAT(DISTINCT authors.name),
    books.created_at,
    books.updated_at
FROM books
LEFT JOIN categories ON categories.id = books.category_id
JOIN status ON status.id = books.status_id
LEFT JOIN book_authors ON book_authors.book_id = books.id
LEFT JOIN authors ON authors.id = book_authors.author_id
WHERE books.id = ? AND books.deleted_at IS NULL
GROUP BY books.id
"#;

        let mut rows = self.conn.query(query, libsql::params![book_id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_book(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Autocomplete search: a small payload, capped at `limit` hits.
    pub async fn search_books(&self, q: &str, limit: i32) -> Result<Vec<BookHit>, DomainError> {
        let query = r#"
SELECT id, title, isbn
FROM books
WHERE deleted_at IS NULL AND (title LIKE ? OR isbn LIKE ?)
ORDER BY title
LIMIT ?
"#;
        let pattern = format!("%{}%", q);
        let mut rows = self
            .conn
            .query(query, libsql::params![pattern.clone(), pattern, limit])
            .await?;

        let mut hits = vec![];
        while let Some(row) = rows.next().await? {
            hits.push(BookHit {
                id: row.get(0)?,
                title: row.get(1)?,
                isbn: row.get(2)?,
            });
        }
        Ok(hits)
    }

    pub async fn count_books(&self) -> Result<i32, DomainError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM books WHERE deleted_at IS NULL", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    pub async fn get_or_create_author(&self, name: &str) -> Result<i32, DomainError> {
        let insert_query = "INSERT OR IGNORE INTO authors (name) VALUES (?)";
        self.conn.execute(insert_query, libsql::params![name]).await?;

        let select_query = "SELECT id FROM authors WHERE name = ? LIMIT 1";
        let mut rows = self.conn.query(select_query, libsql::params![name]).await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Err(DomainError::Internal(anyhow::anyhow!(
                "failed to get or create author: {}",
                name
            )))
        }
    }

    pub async fn get_or_create_category(&self, name: &str) -> Result<i32, DomainError> {
        let insert_query = "INSERT OR IGNORE INTO categories (name) VALUES (?)";
        self.conn.execute(insert_query, libsql::params![name]).await?;

        let select_query = "SELECT id FROM categories WHERE name = ? LIMIT 1";
        let mut rows = self.conn.query(select_query, libsql::params![name]).await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Err(DomainError::Internal(anyhow::anyhow!(
                "failed to get or create category: {}",
                name
            )))
        }
    }

    pub async fn create_author(&self, name: &str) -> Result<Author, DomainError> {
        if let Err(e) = self
            .conn
            .execute("INSERT INTO authors (name) VALUES (?)", libsql::params![name])
            .await
        {
            if is_unique_violation(&e) {
                return Err(DomainError::Conflict(format!("author '{}' already exists", name)));
            }
            return Err(e.into());
        }
        let mut rows = self
            .conn
            .query("SELECT id, name FROM authors WHERE name = ?", libsql::params![name])
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(Author {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        } else {
            Err(DomainError::Internal(anyhow::anyhow!("failed to create author")))
        }
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, DomainError> {
        if let Err(e) = self
            .conn
            .execute("INSERT INTO categories (name) VALUES (?)", libsql::params![name])
            .await
        {
            if is_unique_violation(&e) {
                return Err(DomainError::Conflict(format!("category '{}' already exists", name)));
            }
            return Err(e.into());
        }
        let mut rows = self
            .conn
            .query("SELECT id, name FROM categories WHERE name = ?", libsql::params![name])
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        } else {
            Err(DomainError::Internal(anyhow::anyhow!("failed to create category")))
        }
    }

    /// Recomputes the derived `status_id` for one book. Runs inside every
    /// transaction that can change availability or deletion state.
    pub async fn refresh_book_status(&self, book_id: i32) -> Result<(), DomainError> {
        let query = r#"
UPDATE books SET status_id = CASE
    WHEN deleted_at IS NOT NULL THEN (SELECT id FROM status WHERE name = 'Deleted')
    WHEN available_copies = 0 THEN (SELECT id FROM status WHERE name = 'Issued')
    ELSE (SELECT id FROM status WHERE name = 'Available')
END
WHERE id = ?
"#;
        self.conn.execute(query, libsql::params![book_id]).await?;
        Ok(())
    }

    pub async fn create_book(&self, input: CreateBook) -> Result<Book, DomainError> {
        if input.total_copies < 1 {
            return Err(DomainError::Invalid("total_copies must be at least 1".into()));
        }
        if input.title.trim().is_empty() || input.isbn.trim().is_empty() {
            return Err(DomainError::Invalid("title and isbn are required".into()));
        }

        let _guard = self.lock_tx().await;

        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = self.create_book_internal(&input).await;

        match result {
            Ok(book_id) => {
                self.conn.execute("COMMIT", ()).await?;
                self.get_book_by_id(book_id)
                    .await?
                    .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("created book vanished")))
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn create_book_internal(&self, input: &CreateBook) -> Result<i32, DomainError> {
        let category_id = match &input.category {
            Some(name) if !name.trim().is_empty() => Some(self.get_or_create_category(name.trim()).await?),
            _ => None,
        };

        let insert_book = r#"
            INSERT INTO books (title, isbn, category_id, status_id, total_copies, available_copies)
            VALUES (?, ?, ?, (SELECT id FROM status WHERE name = 'Available'), ?, ?)
            RETURNING id
        "#;

        let mut rows = match self
            .conn
            .query(
                insert_book,
                libsql::params![
                    input.title.trim(),
                    input.isbn.trim(),
                    category_id,
                    input.total_copies,
                    input.total_copies
                ],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) if is_unique_violation(&e) => {
                return Err(DomainError::Conflict(format!(
                    "a book with ISBN {} already exists",
                    input.isbn.trim()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let book_id: i32 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            return Err(DomainError::Internal(anyhow::anyhow!("failed to create book")));
        };

        for author_name in &input.authors {
            let author_id = self.get_or_create_author(author_name.trim()).await?;
            let link_query = "INSERT OR IGNORE INTO book_authors (book_id, author_id) VALUES (?, ?)";
            self.conn
                .execute(link_query, libsql::params![book_id, author_id])
                .await?;
        }

        Ok(book_id)
    }

    pub async fn update_book(&self, book_id: i32, input: UpdateBook) -> Result<Book, DomainError> {
        let _guard = self.lock_tx().await;

        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = self.update_book_internal(book_id, &input).await;

        match result {
            Ok(_) => {
                self.conn.execute("COMMIT", ()).await?;
                self.get_book_by_id(book_id)
                    .await?
                    .ok_or(DomainError::NotFound("book"))
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn update_book_internal(&self, book_id: i32, input: &UpdateBook) -> Result<(), DomainError> {
        let mut rows = self
            .conn
            .query(
                "SELECT total_copies, available_copies FROM books WHERE id = ? AND deleted_at IS NULL",
                libsql::params![book_id],
            )
            .await?;
        let (total, available): (i32, i32) = match rows.next().await? {
            Some(row) => (row.get(0)?, row.get(1)?),
            None => return Err(DomainError::NotFound("book")),
        };

        let mut updates = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(title) = &input.title {
            updates.push("title = ?");
            params.push(title.trim().to_string().into());
        }
        if let Some(isbn) = &input.isbn {
            updates.push("isbn = ?");
            params.push(isbn.trim().to_string().into());
        }
        if let Some(category) = &input.category {
            let category_id = self.get_or_create_category(category.trim()).await?;
            updates.push("category_id = ?");
            params.push(category_id.into());
        }
        if let Some(new_total) = input.total_copies {
            // Copies currently out on loan cap how far total can shrink.
            let issued = total - available;
            if new_total < issued {
                return Err(DomainError::Invalid(format!(
                    "cannot reduce total_copies below {} currently issued",
                    issued
                )));
            }
            if new_total < 1 {
                return Err(DomainError::Invalid("total_copies must be at least 1".into()));
            }
            updates.push("total_copies = ?");
            params.push(new_total.into());
            updates.push("available_copies = ?");
            params.push((new_total - issued).into());
        }

        if !updates.is_empty() {
            updates.push("updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')");
            params.push(book_id.into());

            let query = format!("UPDATE books SET {} WHERE id = ?", updates.join(", "));
            if let Err(e) = self.conn.execute(&query, params).await {
                if is_unique_violation(&e) {
                    return Err(DomainError::Conflict("a book with this ISBN already exists".into()));
                }
                return Err(e.into());
            }
        }

        if let Some(authors) = &input.authors {
            self.conn
                .execute("DELETE FROM book_authors WHERE book_id = ?", libsql::params![book_id])
                .await?;
            for author_name in authors {
                let author_id = self.get_or_create_author(author_name.trim()).await?;
                self.conn
                    .execute(
                        "INSERT OR IGNORE INTO book_authors (book_id, author_id) VALUES (?, ?)",
                        libsql::params![book_id, author_id],
                    )
                    .await?;
            }
        }

        self.refresh_book_status(book_id).await?;
        Ok(())
    }

    pub async fn soft_delete_book(&self, book_id: i32) -> Result<(), DomainError> {
        let _guard = self.lock_tx().await;

        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = self.soft_delete_book_internal(book_id).await;

        match result {
            Ok(_) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn soft_delete_book_internal(&self, book_id: i32) -> Result<(), DomainError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM books WHERE id = ? AND deleted_at IS NULL",
                libsql::params![book_id],
            )
            .await?;
        if rows.next().await?.is_none() {
            return Err(DomainError::NotFound("book"));
        }

        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM issues WHERE book_id = ? AND return_date IS NULL",
                libsql::params![book_id],
            )
            .await?;
        let open: i32 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        if open > 0 {
            return Err(DomainError::Conflict(format!(
                "book has {} open loan(s) and cannot be deleted",
                open
            )));
        }

        self.conn
            .execute(
                "UPDATE books SET deleted_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
                libsql::params![book_id],
            )
            .await?;
        self.refresh_book_status(book_id).await?;
        Ok(())
    }

    pub async fn get_metadata_aggregates(&self) -> Result<MetadataAggregate, DomainError> {
        let query = r#"
WITH
author_count AS (
    SELECT authors.id, authors.name, COUNT(book_authors.id) as count
    FROM authors
    LEFT JOIN book_authors ON authors.id = book_authors.author_id
    LEFT JOIN books ON books.id = book_authors.book_id AND books.deleted_at IS NULL
    GROUP BY authors.id, authors.name
),
category_count AS (
    SELECT categories.id, categories.name, COUNT(books.id) as count
    FROM categories
    LEFT JOIN books ON categories.id = books.category_id AND books.deleted_at IS NULL
    GROUP BY categories.id, categories.name
)
SELECT 'author' as type, id, name, count FROM author_count
UNION ALL
SELECT 'category' as type, id, name, count FROM category_count
ORDER BY type, count DESC;
        "#;

        let mut author_aggregates: Vec<AuthorAggregate> = vec![];
        let mut category_aggregates: Vec<CategoryAggregate> = vec![];

        let mut rows = self.conn.query(query, ()).await?;

        while let Some(row) = rows.next().await? {
            let aggregate_type: String = row.get(0)?;
            let id = row.get(1)?;
            let name: String = row.get(2)?;
            let count = row.get(3)?;

            match aggregate_type.as_str() {
                "author" => author_aggregates.push(AuthorAggregate {
                    author: Author { id, name },
                    count,
                }),
                "category" => category_aggregates.push(CategoryAggregate {
                    category: Category { id, name },
                    count,
                }),
                _ => {
                    tracing::error!("invalid aggregate type: ->{}", aggregate_type);
                    continue;
                }
            }
        }

        Ok(MetadataAggregate {
            authors: author_aggregates,
            categories: category_aggregates,
        })
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::Database;

    pub(crate) async fn test_db(dir: &std::path::Path) -> Database {
        let cfg: crate::config::Config = serde_yaml::from_str(
            "app:\n  database: test.db\n  port: 0\nauth:\n  admin_password: secret\n",
        )
        .unwrap();
        Database::new(&cfg, dir).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerParams;

    fn params(q: Option<&str>) -> HandlerParams {
        HandlerParams {
            q: q.map(|s| s.to_string()),
            page: 1,
            limit: 50,
            offset: 0,
        }
    }

    fn sample_book(isbn: &str) -> CreateBook {
        CreateBook {
            title: "The Count of Monte Cristo".to_string(),
            isbn: isbn.to_string(),
            category: Some("Fiction".to_string()),
            authors: vec!["Alexandre Dumas".to_string()],
            total_copies: 3,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_book() {
        let dir = tempfile::tempdir().unwrap();
        let db = testutil::test_db(dir.path()).await;

        let book = db.create_book(sample_book("978-0140449266")).await.unwrap();
        assert_eq!(book.available_copies, 3);
        assert_eq!(book.status, "Available");
        assert_eq!(book.authors, vec!["Alexandre Dumas".to_string()]);
        assert_eq!(book.category.as_deref(), Some("Fiction"));

        let fetched = db.get_book_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, book.title);
    }

    #[tokio::test]
    async fn duplicate_isbn_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let db = testutil::test_db(dir.path()).await;

        db.create_book(sample_book("978-1")).await.unwrap();
        let err = db.create_book(sample_book("978-1")).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn search_matches_title_author_and_category() {
        let dir = tempfile::tempdir().unwrap();
        let db = testutil::test_db(dir.path()).await;

        db.create_book(sample_book("978-2")).await.unwrap();

        for q in ["Monte", "Dumas", "Fiction", "978-2"] {
            let books = db.get_books(params(Some(q))).await.unwrap();
            assert_eq!(books.len(), 1, "query {:?} should match", q);
        }

        let books = db.get_books(params(Some("zzz-no-match"))).await.unwrap();
        assert!(books.is_empty());
    }

    #[tokio::test]
    async fn soft_deleted_books_disappear_from_reads() {
        let dir = tempfile::tempdir().unwrap();
        let db = testutil::test_db(dir.path()).await;

        let book = db.create_book(sample_book("978-3")).await.unwrap();
        db.soft_delete_book(book.id).await.unwrap();

        assert!(db.get_book_by_id(book.id).await.unwrap().is_none());
        assert!(db.get_books(params(None)).await.unwrap().is_empty());
        assert!(db.search_books("Monte", 10).await.unwrap().is_empty());
        assert_eq!(db.count_books().await.unwrap(), 0);

        let err = db.soft_delete_book(book.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn shrinking_copies_keeps_the_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let db = testutil::test_db(dir.path()).await;

        let book = db.create_book(sample_book("978-4")).await.unwrap();
        let updated = db
            .update_book(
                book.id,
                UpdateBook {
                    title: None,
                    isbn: None,
                    category: None,
                    authors: None,
                    total_copies: Some(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_copies, 1);
        assert_eq!(updated.available_copies, 1);
    }

    #[tokio::test]
    async fn update_replaces_authors() {
        let dir = tempfile::tempdir().unwrap();
        let db = testutil::test_db(dir.path()).await;

        let book = db.create_book(sample_book("978-5")).await.unwrap();
        let updated = db
            .update_book(
                book.id,
                UpdateBook {
                    title: Some("The Three Musketeers".to_string()),
                    isbn: None,
                    category: None,
                    authors: Some(vec!["A. Dumas".to_string(), "A. Maquet".to_string()]),
                    total_copies: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "The Three Musketeers");
        assert_eq!(updated.authors.len(), 2);
    }

    #[tokio::test]
    async fn aggregates_count_books_per_author_and_category() {
        let dir = tempfile::tempdir().unwrap();
        let db = testutil::test_db(dir.path()).await;

        db.create_book(sample_book("978-6")).await.unwrap();
        db.create_book(CreateBook {
            title: "Twenty Years After".to_string(),
            isbn: "978-7".to_string(),
            category: Some("Fiction".to_string()),
            authors: vec!["Alexandre Dumas".to_string()],
            total_copies: 1,
        })
        .await
        .unwrap();

        let agg = db.get_metadata_aggregates().await.unwrap();
        let dumas = agg
            .authors
            .iter()
            .find(|a| a.author.name == "Alexandre Dumas")
            .unwrap();
        assert_eq!(dumas.count, 2);
        let fiction = agg
            .categories
            .iter()
            .find(|c| c.category.name == "Fiction")
            .unwrap();
        assert_eq!(fiction.count, 2);
    }
}
