use heck::ToPascalCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashMap;
use tessera::schema::{FieldDefinition, FieldType, SchemaDefinition, TableDefinition};

use crate::type_utils::{
    field_base_type, field_to_rust_type, field_type_name, id_alias_name, needs_rename,
    patch_struct_name, safe_field_ident, table_struct_name,
};

/// Generate reusable type structs, nested object structs, and per table
/// the row struct, its `Table` impl, id alias and patch struct.
pub fn generate_structs(schema: &SchemaDefinition) -> TokenStream {
    let mut tokens = TokenStream::new();

    let known_types: Vec<String> = schema.types.keys().cloned().collect();

    let mut types: Vec<_> = schema.types.iter().collect();
    types.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (type_name, fields) in types {
        let owner = type_name.to_pascal_case();
        tokens.extend(generate_plain_struct(&owner, fields, &known_types, None));
        tokens.extend(generate_nested_structs(&owner, fields, &known_types));
    }

    let mut tables: Vec<_> = schema.tables.iter().collect();
    tables.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (table_name, table_def) in tables {
        tokens.extend(generate_table_struct(table_name, table_def, &known_types));
        tokens.extend(generate_patch_struct(table_name, table_def, &known_types));
        tokens.extend(generate_nested_structs(
            &table_struct_name(table_name),
            &table_def.fields,
            &known_types,
        ));
    }

    tokens
}

/// A struct with one field per definition, sorted by name.
fn generate_plain_struct(
    name: &str,
    fields: &HashMap<String, FieldDefinition>,
    known_types: &[String],
    doc: Option<String>,
) -> TokenStream {
    let struct_ident = format_ident!("{}", name);

    let mut fields: Vec<_> = fields.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    let field_tokens: Vec<_> = fields
        .iter()
        .map(|(field_name, field_def)| {
            let ident = safe_field_ident(field_name);
            let ty = field_to_rust_type(field_def, name, field_name, known_types);
            generate_field_with_attrs(&ident, &ty, field_def, name, field_name)
        })
        .collect();

    let doc_attr = doc.map(|doc| quote! { #[doc = #doc] });

    quote! {
        #doc_attr
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct #struct_ident {
            #(#field_tokens)*
        }
    }
}

/// Structs for `object` fields with inline `fields`, recursively.
fn generate_nested_structs(
    owner: &str,
    fields: &HashMap<String, FieldDefinition>,
    known_types: &[String],
) -> TokenStream {
    let mut tokens = TokenStream::new();

    let mut fields: Vec<_> = fields.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (field_name, field_def) in fields {
        if let (FieldType::Object, Some(nested)) = (&field_def.field_type, &field_def.fields) {
            let name = field_type_name(owner, field_name);
            tokens.extend(generate_plain_struct(&name, nested, known_types, None));
            tokens.extend(generate_nested_structs(&name, nested, known_types));
        }
    }

    tokens
}

/// Row struct, `Table` impl and id alias for a table.
fn generate_table_struct(
    table_name: &str,
    table_def: &TableDefinition,
    known_types: &[String],
) -> TokenStream {
    let struct_name = table_struct_name(table_name);
    let struct_ident = format_ident!("{}", struct_name);
    let alias_ident = format_ident!("{}", id_alias_name(&struct_name));

    let doc = format!(" A row of the `{}` table.", table_name);
    let alias_doc = format!(" Identifier of a row in `{}`.", table_name);
    let row = generate_plain_struct(&struct_name, &table_def.fields, known_types, Some(doc));

    quote! {
        #row

        impl tessera::Table for #struct_ident {
            const NAME: &'static str = #table_name;
        }

        #[doc = #alias_doc]
        pub type #alias_ident = tessera::Id<#struct_ident>;
    }
}

/// Partial update struct: every field is a `tessera::Patch`.
fn generate_patch_struct(
    table_name: &str,
    table_def: &TableDefinition,
    known_types: &[String],
) -> TokenStream {
    let base_name = table_struct_name(table_name);
    let patch_ident = format_ident!("{}", patch_struct_name(&base_name));

    let mut fields: Vec<_> = table_def.fields.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    let field_tokens: Vec<_> = fields
        .iter()
        .map(|(field_name, field_def)| {
            let ident = safe_field_ident(field_name);
            let base_ty = field_base_type(field_def, &base_name, field_name, known_types);
            let serde_attr = if needs_rename(field_name) {
                let original = field_name.as_str();
                quote! {
                    #[serde(rename = #original, default, skip_serializing_if = "tessera::Patch::is_keep")]
                }
            } else {
                quote! {
                    #[serde(default, skip_serializing_if = "tessera::Patch::is_keep")]
                }
            };
            quote! {
                #serde_attr
                pub #ident: tessera::Patch<#base_ty>,
            }
        })
        .collect();

    quote! {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        pub struct #patch_ident {
            #(#field_tokens)*
        }
    }
}

/// Generate a struct field with appropriate serde attributes.
fn generate_field_with_attrs(
    ident: &proc_macro2::Ident,
    ty: &TokenStream,
    field_def: &FieldDefinition,
    owner: &str,
    field_name: &str,
) -> TokenStream {
    let rename_attr = needs_rename(field_name).then(|| quote! { #[serde(rename = #field_name)] });
    let serde_attrs = generate_serde_attrs(field_def, owner, field_name);

    quote! {
        #rename_attr
        #serde_attrs
        pub #ident: #ty,
    }
}

fn generate_serde_attrs(field_def: &FieldDefinition, owner: &str, field_name: &str) -> TokenStream {
    if field_def.field_type == FieldType::List {
        return quote! { #[serde(default)] };
    }

    if field_def.default.is_some() {
        if field_def.enum_values.is_some() {
            let default_fn = format!("{}::default", field_type_name(owner, field_name));
            quote! { #[serde(default = #default_fn)] }
        } else {
            quote! { #[serde(default)] }
        }
    } else if !field_def.required {
        quote! { #[serde(default, skip_serializing_if = "Option::is_none")] }
    } else {
        quote! {}
    }
}
