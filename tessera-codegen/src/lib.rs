//! Tessera code generation: typed rows, ids and patches from schema.yaml at
//! build time.
//!
//! The main entry point is [`generate_from_schema`], which reads a schema file
//! and writes a Rust source file with row structs, `Table` impls, id aliases,
//! patch structs and value enums.

mod enum_gen;
mod generator;
mod struct_gen;
pub mod type_utils;

use std::path::Path;

/// Generate Rust types from a schema.yaml file.
///
/// Reads the schema at `schema_path`, checks it, and writes the generated
/// code to `output_path`. Intended to be called from a `build.rs` script.
///
/// # Example
///
/// ```no_run
/// // In build.rs:
/// let out = format!("{}/tessera_generated.rs", std::env::var("OUT_DIR").unwrap());
/// tessera_codegen::generate_from_schema("schema.yaml", &out).unwrap();
/// ```
pub fn generate_from_schema(
    schema_path: &str,
    output_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(Path::new(schema_path))?;
    let formatted = generate_from_schema_str(&source)?;
    std::fs::write(output_path, formatted)?;
    Ok(())
}

/// Generate Rust types from a schema YAML string.
pub fn generate_from_schema_str(
    schema_yaml: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let schema = tessera::schema::parse_schema_str(schema_yaml)?;
    let tokens = generator::generate_all(&schema, schema_yaml);
    Ok(generator::format_token_stream(&tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SCHEMA: &str = r#"
types:
  address:
    street: { type: string, required: true }
    city: { type: string, required: true }
    zip: { type: string }

tables:
  users:
    fields:
      name: { type: string, required: true }
      email: { type: string, required: true }
      role: { type: string, enum: [admin, member, guest], default: member }
      address: { type: address }
    indexes:
      by_email: [email]

  messages:
    fields:
      body: { type: string, required: true, max_length: 2000 }
      author:
        type: object
        required: true
        fields:
          role: { type: string, enum: [user, assistant], required: true }
          name: { type: string, required: true }
      user_id: { type: id, table: users, required: true }
      tags: { type: list, items: string }
      embedding: { type: vector, dimensions: 4 }
      payload: { type: any }
    search_indexes:
      search_body: { search_field: body, filter_fields: [user_id] }
    vector_indexes:
      by_embedding: { vector_field: embedding, dimensions: 4 }
"#;

    #[test]
    fn test_generate_from_schema_str_full() {
        let result = generate_from_schema_str(TEST_SCHEMA);
        assert!(result.is_ok(), "Generation failed: {:?}", result.err());

        let code = result.unwrap();
        assert!(
            syn::parse_file(&code).is_ok(),
            "Generated code is not valid Rust:\n{}",
            &code[..code.len().min(2000)]
        );

        // Value enums, including one inside a nested object
        assert!(code.contains("pub enum UserRole"), "Missing UserRole enum");
        assert!(code.contains("pub enum MessageAuthorRole"), "Missing MessageAuthorRole");
        assert!(code.contains("impl Default for UserRole"), "Missing UserRole Default impl");
        assert!(code.contains("Assistant"), "Missing Assistant variant");

        // Row structs and their bindings
        assert!(code.contains("pub struct User"), "Missing User struct");
        assert!(code.contains("pub struct Message"), "Missing Message struct");
        assert!(code.contains("impl tessera::Table for Message"), "Missing Table impl");
        assert!(code.contains("const NAME: &'static str = \"messages\""));
        assert!(code.contains("pub type UserId = tessera::Id<User>"), "Missing UserId alias");
        assert!(code.contains("pub user_id: tessera::Id<User>"), "Id field not typed");

        // Nested and reusable types
        assert!(code.contains("pub struct MessageAuthor"), "Missing MessageAuthor");
        assert!(code.contains("pub struct Address"), "Missing Address struct");
        assert!(code.contains("pub address: Option<Address>"));

        // Patch structs
        assert!(code.contains("pub struct UserPatch"), "Missing UserPatch");
        assert!(code.contains("pub body: tessera::Patch<String>"));

        // Embedded schema
        assert!(code.contains("pub const SCHEMA_YAML"));
        assert!(code.contains("pub fn schema()"));
    }

    #[test]
    fn test_generate_minimal_schema() {
        let schema = r#"
tables:
  items:
    fields:
      name: { type: string, required: true }
"#;
        let code = generate_from_schema_str(schema).unwrap();
        assert!(syn::parse_file(&code).is_ok(), "Not valid Rust");
        assert!(code.contains("pub struct Item"));
        assert!(code.contains("pub struct ItemPatch"));
        assert!(code.contains("pub type ItemId"));
    }

    #[test]
    fn test_generate_all_field_types() {
        let schema = r#"
tables:
  records:
    fields:
      name: { type: string, required: true }
      count: { type: number, required: true }
      active: { type: boolean, required: true }
      tags: { type: list, items: string }
      metadata: { type: object }
      owner: { type: id, table: records }
      embedding: { type: vector, dimensions: 2 }
"#;
        let code = generate_from_schema_str(schema).unwrap();
        assert!(syn::parse_file(&code).is_ok(), "Not valid Rust:\n{}", &code[..code.len().min(2000)]);

        assert!(code.contains("pub count: f64"));
        assert!(code.contains("pub active: bool"));
        assert!(code.contains("pub tags: Vec<String>"));
        assert!(code.contains("pub metadata: Option<serde_json::Value>"));
        assert!(code.contains("pub owner: Option<tessera::Id<Record>>"));
        assert!(code.contains("pub embedding: Option<Vec<f64>>"));
    }

    #[test]
    fn test_rust_keyword_field_names() {
        let schema = r#"
tables:
  events:
    fields:
      type: { type: string, required: true }
      ref: { type: string }
      createdBy: { type: string }
"#;
        let code = generate_from_schema_str(schema).unwrap();
        assert!(syn::parse_file(&code).is_ok(), "Not valid Rust:\n{}", &code[..code.len().min(2000)]);
        assert!(code.contains("pub r#type: String"));
        assert!(code.contains("rename = \"createdBy\""));
    }

    #[test]
    fn test_invalid_schema_is_an_error() {
        let schema = r#"
tables:
  notes:
    fields:
      owner: { type: id, table: nobody }
"#;
        assert!(generate_from_schema_str(schema).is_err());
    }

    #[test]
    fn test_output_is_deterministic() {
        let first = generate_from_schema_str(TEST_SCHEMA).unwrap();
        let second = generate_from_schema_str(TEST_SCHEMA).unwrap();
        assert_eq!(first, second);
    }
}
