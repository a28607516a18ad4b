#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera::schema::parse_schema_str;
use tessera::{Id, MemoryStore, Patch, Runtime, Store, Table};

pub const SCHEMA: &str = r#"
limits:
  max_page_size: 100
  max_vector_results: 16

tables:
  users:
    fields:
      name: { type: string, required: true }
      role: { type: string, enum: [admin, member], default: member }

  notes:
    fields:
      text: { type: string, required: true, max_length: 100 }
      tag: { type: string }
      author:
        type: object
        fields:
          role: { type: string, enum: [user, assistant], required: true }
          name: { type: string, required: true }
      embedding: { type: vector, dimensions: 3 }
      user_id: { type: id, table: users }
    indexes:
      by_text: [text]
      by_tag: [tag, text]
    search_indexes:
      search_text: { search_field: text, filter_fields: [tag] }
    vector_indexes:
      by_embedding: { vector_field: embedding, dimensions: 3, filter_fields: [tag] }

  posts:
    fields:
      title: { type: string, required: true }
      meta:
        type: object
        fields:
          owner: { type: id, table: users, required: true }
      readers: { type: list, items: { type: id, table: users } }
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub role: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Id<User>>,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Note {
            text: text.into(),
            tag: None,
            author: None,
            embedding: None,
            user_id: None,
        }
    }

    pub fn tagged(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Note {
            tag: Some(tag.into()),
            ..Note::new(text)
        }
    }
}

impl Table for Note {
    const NAME: &'static str = "notes";
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub text: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub tag: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub author: Patch<Author>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Table for User {
    const NAME: &'static str = "users";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMeta {
    pub owner: Id<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PostMeta>,
    #[serde(default)]
    pub readers: Vec<Id<User>>,
}

impl Table for Post {
    const NAME: &'static str = "posts";
}

pub fn setup() -> (Runtime, Arc<MemoryStore>) {
    let schema = parse_schema_str(SCHEMA).unwrap();
    let store = Arc::new(MemoryStore::new());
    let runtime = Runtime::new(store.clone() as Arc<dyn Store>, schema);
    (runtime, store)
}

/// Insert one note per text, in order.
pub async fn insert_texts(runtime: &Runtime, texts: &[&str]) -> Vec<Id<Note>> {
    let db = runtime.mutation_ctx().db;
    let mut ids = Vec::new();
    for text in texts {
        ids.push(db.insert(&Note::new(*text)).await.unwrap());
    }
    ids
}

pub fn texts<'a>(rows: impl IntoIterator<Item = &'a tessera::Row<Note>>) -> Vec<String> {
    rows.into_iter().map(|row| row.text.clone()).collect()
}
