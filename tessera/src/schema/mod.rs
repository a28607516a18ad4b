mod parser;
mod types;

pub use parser::{parse_schema, parse_schema_str};
pub use types::*;

use crate::error::{Result, TesseraError};
use std::collections::HashMap;

impl SchemaDefinition {
    /// Look up a table, failing with a schema error if it is not declared.
    pub fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .get(name)
            .ok_or_else(|| TesseraError::Schema(format!("Table '{name}' not found in schema")))
    }

    pub fn get_custom_type(&self, name: &str) -> Option<&HashMap<String, FieldDefinition>> {
        self.types.get(name)
    }

    /// Resolve a possibly dotted field path (`author.name`) to its definition.
    pub fn resolve_field<'a>(
        &'a self,
        table: &'a TableDefinition,
        path: &str,
    ) -> Option<&'a FieldDefinition> {
        let mut segments = path.split('.');
        let mut def = table.fields.get(segments.next()?)?;
        for segment in segments {
            def = match &def.field_type {
                FieldType::Object => def.fields.as_ref()?.get(segment)?,
                FieldType::Custom(type_name) => self.get_custom_type(type_name)?.get(segment)?,
                _ => return None,
            };
        }
        Some(def)
    }

    /// Semantic checks the YAML parser cannot express: id targets, index
    /// fields and custom types must exist, index fields must have the right
    /// types.
    pub fn check(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.limits.max_page_size == 0 {
            problems.push("limits.max_page_size must be positive".to_string());
        }
        if self.limits.max_vector_results == 0 {
            problems.push("limits.max_vector_results must be positive".to_string());
        }

        let mut types: Vec<_> = self.types.iter().collect();
        types.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (type_name, fields) in types {
            self.check_fields(&format!("type '{type_name}'"), fields, &mut problems);
        }

        let mut tables: Vec<_> = self.tables.iter().collect();
        tables.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (table_name, table) in tables {
            if table_name.starts_with('_') {
                problems.push(format!("Table name '{table_name}' is reserved"));
            }
            self.check_fields(&format!("table '{table_name}'"), &table.fields, &mut problems);
            self.check_indexes(table_name, table, &mut problems);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TesseraError::Schema(problems.join("; ")))
        }
    }

    fn check_fields(
        &self,
        context: &str,
        fields: &HashMap<String, FieldDefinition>,
        problems: &mut Vec<String>,
    ) {
        let mut entries: Vec<_> = fields.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (name, def) in entries {
            if name.starts_with('_') {
                problems.push(format!("{context}: field name '{name}' is reserved"));
            }
            self.check_field(&format!("{context}.{name}"), def, problems);
        }
    }

    fn check_field(&self, path: &str, def: &FieldDefinition, problems: &mut Vec<String>) {
        match &def.field_type {
            FieldType::Id => match &def.table {
                None => problems.push(format!("{path}: id field must name a target table")),
                Some(target) if !self.tables.contains_key(target) => {
                    problems.push(format!("{path}: id field targets unknown table '{target}'"))
                }
                Some(_) => {}
            },
            FieldType::Vector => {
                if def.dimensions.unwrap_or(0) == 0 {
                    problems.push(format!("{path}: vector field needs positive dimensions"));
                }
            }
            FieldType::Object => {
                if let Some(fields) = &def.fields {
                    self.check_fields(path, fields, problems);
                }
            }
            FieldType::List => {
                if let Some(items) = &def.items {
                    self.check_field(&format!("{path}[]"), &items.to_definition(), problems);
                }
            }
            FieldType::Custom(type_name) => {
                if !self.types.contains_key(type_name) {
                    problems.push(format!("{path}: unknown type '{type_name}'"));
                }
            }
            FieldType::String | FieldType::Number | FieldType::Boolean | FieldType::Any => {}
        }

        if def.enum_values.is_some() && def.field_type != FieldType::String {
            problems.push(format!("{path}: enum is only allowed on string fields"));
        }
        if let (Some(min), Some(max)) = (def.min_length, def.max_length) {
            if min > max {
                problems.push(format!("{path}: min_length {min} exceeds max_length {max}"));
            }
        }
    }

    fn check_indexes(&self, table_name: &str, table: &TableDefinition, problems: &mut Vec<String>) {
        let mut indexes: Vec<_> = table.indexes.iter().collect();
        indexes.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (index_name, fields) in indexes {
            if fields.is_empty() {
                problems.push(format!("Index '{index_name}' on table '{table_name}' has no fields"));
            }
            for field in fields {
                if self.resolve_field(table, field).is_none() {
                    problems.push(format!(
                        "Index '{index_name}' on table '{table_name}' references unknown field '{field}'"
                    ));
                }
            }
        }

        let mut search: Vec<_> = table.search_indexes.iter().collect();
        search.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (index_name, index) in search {
            match self.resolve_field(table, &index.search_field) {
                Some(def) if def.field_type == FieldType::String => {}
                Some(_) => problems.push(format!(
                    "Search index '{index_name}' on table '{table_name}': field '{}' is not a string",
                    index.search_field
                )),
                None => problems.push(format!(
                    "Search index '{index_name}' on table '{table_name}' references unknown field '{}'",
                    index.search_field
                )),
            }
            self.check_filter_fields(table_name, index_name, table, &index.filter_fields, problems);
        }

        let mut vector: Vec<_> = table.vector_indexes.iter().collect();
        vector.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (index_name, index) in vector {
            if index.dimensions == 0 {
                problems.push(format!(
                    "Vector index '{index_name}' on table '{table_name}' needs positive dimensions"
                ));
            }
            match self.resolve_field(table, &index.vector_field) {
                Some(def) if def.field_type == FieldType::Vector => {
                    if let Some(dims) = def.dimensions {
                        if dims != index.dimensions {
                            problems.push(format!(
                                "Vector index '{index_name}' on table '{table_name}' has {} dimensions but field '{}' has {dims}",
                                index.dimensions, index.vector_field
                            ));
                        }
                    }
                }
                Some(_) => problems.push(format!(
                    "Vector index '{index_name}' on table '{table_name}': field '{}' is not a vector",
                    index.vector_field
                )),
                None => problems.push(format!(
                    "Vector index '{index_name}' on table '{table_name}' references unknown field '{}'",
                    index.vector_field
                )),
            }
            self.check_filter_fields(table_name, index_name, table, &index.filter_fields, problems);
        }
    }

    fn check_filter_fields(
        &self,
        table_name: &str,
        index_name: &str,
        table: &TableDefinition,
        filter_fields: &[String],
        problems: &mut Vec<String>,
    ) {
        for field in filter_fields {
            if self.resolve_field(table, field).is_none() {
                problems.push(format!(
                    "Index '{index_name}' on table '{table_name}' has unknown filter field '{field}'"
                ));
            }
        }
    }
}
