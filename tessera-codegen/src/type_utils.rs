use heck::{ToPascalCase, ToSnakeCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use tessera::schema::{FieldDefinition, FieldType, ItemType};

/// Convert a table name to its singular PascalCase row struct name.
/// e.g. "users" -> "User", "notes" -> "Note", "categories" -> "Category"
pub fn table_struct_name(table_name: &str) -> String {
    singularize(table_name).to_pascal_case()
}

/// Name of a type derived from a field of `owner`.
/// e.g. ("Note", "status") -> "NoteStatus", ("Note", "author") -> "NoteAuthor"
pub fn field_type_name(owner: &str, field_name: &str) -> String {
    format!("{}{}", owner, field_name.to_pascal_case())
}

/// e.g. "Note" -> "NoteId"
pub fn id_alias_name(struct_name: &str) -> String {
    format!("{}Id", struct_name)
}

/// e.g. "Note" -> "NotePatch"
pub fn patch_struct_name(struct_name: &str) -> String {
    format!("{}Patch", struct_name)
}

/// Whether a field has generated struct of its own: an `object` with
/// inline `fields`.
pub fn has_nested_struct(field: &FieldDefinition) -> bool {
    field.field_type == FieldType::Object && field.fields.is_some()
}

/// Map a schema field to its Rust type as a TokenStream.
///
/// `owner` is the PascalCase name of the struct the field belongs to, used
/// to name generated enums and nested structs. `known_types` is the set of
/// reusable type names from the schema.
pub fn field_to_rust_type(
    field: &FieldDefinition,
    owner: &str,
    field_name: &str,
    known_types: &[String],
) -> TokenStream {
    let base_type = field_base_type(field, owner, field_name, known_types);

    // Lists default to an empty vec; everything else optional is wrapped
    if field.required || field.default.is_some() || field.field_type == FieldType::List {
        base_type
    } else {
        quote! { Option<#base_type> }
    }
}

/// Get the base Rust type (without Option wrapping) for a field.
pub fn field_base_type(
    field: &FieldDefinition,
    owner: &str,
    field_name: &str,
    known_types: &[String],
) -> TokenStream {
    if field.enum_values.is_some() {
        let ident = format_ident!("{}", field_type_name(owner, field_name));
        return quote! { #ident };
    }

    match &field.field_type {
        FieldType::String => quote! { String },
        FieldType::Number => quote! { f64 },
        FieldType::Boolean => quote! { bool },
        FieldType::Id => id_rust_type(field),
        FieldType::Vector => quote! { Vec<f64> },
        FieldType::Any => quote! { serde_json::Value },
        FieldType::Object => {
            if has_nested_struct(field) {
                let ident = format_ident!("{}", field_type_name(owner, field_name));
                quote! { #ident }
            } else {
                quote! { serde_json::Value }
            }
        }
        FieldType::List => {
            let item_type = list_item_type(field, known_types);
            quote! { Vec<#item_type> }
        }
        FieldType::Custom(type_name) => custom_type(type_name, known_types),
    }
}

/// Get the Rust type for a list's item type.
fn list_item_type(field: &FieldDefinition, known_types: &[String]) -> TokenStream {
    match &field.items {
        Some(ItemType::Simple(s)) => match s.as_str() {
            "string" => quote! { String },
            "number" => quote! { f64 },
            "boolean" => quote! { bool },
            "any" | "object" => quote! { serde_json::Value },
            other => custom_type(other, known_types),
        },
        Some(ItemType::Complex(inner)) => match &inner.field_type {
            FieldType::Id => id_rust_type(inner),
            FieldType::String => quote! { String },
            FieldType::Number => quote! { f64 },
            FieldType::Boolean => quote! { bool },
            FieldType::Custom(type_name) => custom_type(type_name, known_types),
            _ => quote! { serde_json::Value },
        },
        None => quote! { serde_json::Value },
    }
}

/// `tessera::Id<TargetRow>` for an id field bound to a table.
fn id_rust_type(field: &FieldDefinition) -> TokenStream {
    match &field.table {
        Some(table) => {
            let target = format_ident!("{}", table_struct_name(table));
            quote! { tessera::Id<#target> }
        }
        None => quote! { String },
    }
}

fn custom_type(type_name: &str, known_types: &[String]) -> TokenStream {
    if known_types.iter().any(|t| t == type_name) {
        let ident = format_ident!("{}", type_name.to_pascal_case());
        quote! { #ident }
    } else {
        quote! { serde_json::Value }
    }
}

/// Naive singularization of English words.
pub fn singularize(word: &str) -> String {
    let w = word.to_lowercase();
    if w.ends_with("ies") {
        format!("{}y", &w[..w.len() - 3])
    } else if w.ends_with("ses") || w.ends_with("xes") || w.ends_with("zes") {
        w[..w.len() - 2].to_string()
    } else if w.ends_with("ves") {
        format!("{}f", &w[..w.len() - 3])
    } else if w.ends_with('s') && !w.ends_with("ss") {
        w[..w.len() - 1].to_string()
    } else {
        w
    }
}

/// Check if a field name is a Rust keyword and needs raw identifier syntax.
pub fn safe_field_ident(name: &str) -> proc_macro2::Ident {
    match name {
        "type" | "struct" | "enum" | "fn" | "let" | "mut" | "ref" | "super" | "mod" | "use"
        | "pub" | "impl" | "trait" | "for" | "loop" | "while" | "if" | "else" | "match"
        | "return" | "break" | "continue" | "as" | "in" | "where" | "async" | "await" | "dyn"
        | "move" | "static" | "const" | "unsafe" | "extern" | "true" | "false" | "abstract"
        | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof"
        | "unsized" | "virtual" | "yield" | "try" => format_ident!("r#{}", name),
        _ => format_ident!("{}", name.to_snake_case()),
    }
}

/// Whether the serialized name differs from the Rust field name.
pub fn needs_rename(field_name: &str) -> bool {
    let ident = safe_field_ident(field_name).to_string();
    ident.starts_with("r#") || ident != field_name
}

pub fn enum_variant_ident(value: &str) -> proc_macro2::Ident {
    format_ident!("{}", value.to_pascal_case())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("notes"), "note");
        assert_eq!(singularize("messages"), "message");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
    }

    #[test]
    fn test_table_struct_name() {
        assert_eq!(table_struct_name("users"), "User");
        assert_eq!(table_struct_name("notes"), "Note");
        assert_eq!(table_struct_name("chat_messages"), "ChatMessage");
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(field_type_name("Note", "status"), "NoteStatus");
        assert_eq!(field_type_name("NoteAuthor", "role"), "NoteAuthorRole");
        assert_eq!(id_alias_name("Note"), "NoteId");
        assert_eq!(patch_struct_name("Note"), "NotePatch");
    }

    #[test]
    fn test_id_field_type() {
        let mut field = FieldDefinition::of(FieldType::Id);
        field.table = Some("users".into());
        field.required = true;
        let ty = field_to_rust_type(&field, "Note", "user_id", &[]);
        assert_eq!(ty.to_string(), "tessera :: Id < User >");

        field.required = false;
        let ty = field_to_rust_type(&field, "Note", "user_id", &[]);
        assert_eq!(ty.to_string(), "Option < tessera :: Id < User > >");
    }

    #[test]
    fn test_lists_are_not_wrapped() {
        let mut field = FieldDefinition::of(FieldType::List);
        field.items = Some(ItemType::Simple("string".into()));
        let ty = field_to_rust_type(&field, "Note", "tags", &[]);
        assert_eq!(ty.to_string(), "Vec < String >");
    }

    #[test]
    fn test_safe_field_ident() {
        assert_eq!(safe_field_ident("type").to_string(), "r#type");
        assert_eq!(safe_field_ident("name").to_string(), "name");
        assert!(needs_rename("type"));
        assert!(needs_rename("createdBy"));
        assert!(!needs_rename("user_id"));
    }
}
