use proc_macro2::TokenStream;
use quote::quote;
use tessera::schema::SchemaDefinition;

use crate::enum_gen::generate_enums;
use crate::struct_gen::generate_structs;

const HEADER: &str = "// Generated by tessera-codegen from the schema. Do not edit.\n\n";

/// All generated items for `schema`. `source` is the schema text, embedded
/// as `SCHEMA_YAML` so the runtime loads the same schema the types came from.
pub fn generate_all(schema: &SchemaDefinition, source: &str) -> TokenStream {
    let enums = generate_enums(schema);
    let structs = generate_structs(schema);

    quote! {
        #[allow(unused_imports)]
        use serde::{Deserialize, Serialize};

        /// The schema these types were generated from.
        pub const SCHEMA_YAML: &str = #source;

        /// Parse and check [`SCHEMA_YAML`].
        pub fn schema() -> tessera::Result<tessera::SchemaDefinition> {
            tessera::schema::parse_schema_str(SCHEMA_YAML)
        }

        #enums
        #structs
    }
}

/// Pretty-print generated tokens. Falls back to the raw token string when
/// the tokens do not parse as a file.
pub fn format_token_stream(tokens: &TokenStream) -> String {
    match syn::parse2::<syn::File>(tokens.clone()) {
        Ok(file) => format!("{HEADER}{}", prettyplease::unparse(&file)),
        Err(_) => format!("{HEADER}{tokens}"),
    }
}
