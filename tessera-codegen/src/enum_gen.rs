use heck::ToPascalCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashMap;
use tessera::schema::{FieldDefinition, SchemaDefinition};

use crate::type_utils::{enum_variant_ident, field_type_name, table_struct_name};

/// Generate value enums for every field with `enum` values: table fields,
/// reusable type fields and fields of nested objects.
pub fn generate_enums(schema: &SchemaDefinition) -> TokenStream {
    let mut tokens = TokenStream::new();

    let mut types: Vec<_> = schema.types.iter().collect();
    types.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (type_name, fields) in types {
        tokens.extend(generate_field_enums(&type_name.to_pascal_case(), fields));
    }

    let mut tables: Vec<_> = schema.tables.iter().collect();
    tables.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (table_name, table_def) in tables {
        tokens.extend(generate_field_enums(
            &table_struct_name(table_name),
            &table_def.fields,
        ));
    }

    tokens
}

fn generate_field_enums(owner: &str, fields: &HashMap<String, FieldDefinition>) -> TokenStream {
    let mut tokens = TokenStream::new();

    let mut fields: Vec<_> = fields.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (field_name, field_def) in fields {
        if let Some(ref enum_values) = field_def.enum_values {
            tokens.extend(generate_value_enum(owner, field_name, enum_values, field_def));
        }
        if let Some(ref nested) = field_def.fields {
            tokens.extend(generate_field_enums(&field_type_name(owner, field_name), nested));
        }
    }

    tokens
}

/// Generate a value enum like NoteStatus. Variants keep their stored
/// spelling through `#[serde(rename)]`.
fn generate_value_enum(
    owner: &str,
    field_name: &str,
    enum_values: &[String],
    field_def: &FieldDefinition,
) -> TokenStream {
    let type_ident = format_ident!("{}", field_type_name(owner, field_name));

    let variants: Vec<_> = enum_values
        .iter()
        .map(|v| {
            let variant = enum_variant_ident(v);
            quote! {
                #[serde(rename = #v)]
                #variant
            }
        })
        .collect();

    let default_impl = field_def
        .default
        .as_ref()
        .and_then(serde_yaml::Value::as_str)
        .map(|default_str| {
            let default_variant = enum_variant_ident(default_str);
            quote! {
                impl Default for #type_ident {
                    fn default() -> Self {
                        Self::#default_variant
                    }
                }
            }
        });

    quote! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum #type_ident {
            #(#variants),*
        }

        #default_impl
    }
}
