use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub category: Option<String>,
    pub status: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub authors: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Compact shape returned by the autocomplete endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookHit {
    pub id: i32,
    pub title: String,
    pub isbn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBook {
    pub title: String,
    pub isbn: String,
    pub category: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub total_copies: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub authors: Option<Vec<String>>,
    pub total_copies: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Author {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorAggregate {
    pub author: Author,
    pub count: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryAggregate {
    pub category: Category,
    pub count: i32,
}
