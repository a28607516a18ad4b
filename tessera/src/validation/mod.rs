use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{Result, TesseraError};
use crate::schema::{FieldDefinition, FieldType, SchemaDefinition, TableDefinition};
use crate::store::{FieldPatch, PatchDocument};
use crate::value::{type_name, yaml_to_json};

/// Result of validating a document
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, message: String) {
        self.errors.push(message);
    }
}

/// Validate a complete document against its table definition.
pub fn validate_document(
    schema: &SchemaDefinition,
    table: &TableDefinition,
    fields: &Map<String, Value>,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    for key in fields.keys() {
        if key.starts_with('_') {
            result.push(format!("Field '{key}' is a system field and cannot be written"));
        }
    }

    validate_object(
        schema,
        "",
        &table.fields,
        fields,
        table.additional_properties,
        &mut result,
    );
    result
}

/// Validate only the fields a patch touches. Removing a required field is an
/// error; untouched fields are not checked.
pub fn validate_partial(
    schema: &SchemaDefinition,
    table: &TableDefinition,
    patch: &PatchDocument,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (field_name, change) in &patch.fields {
        if field_name.starts_with('_') {
            result.push(format!(
                "Field '{field_name}' is a system field and cannot be written"
            ));
            continue;
        }

        let def = match table.fields.get(field_name) {
            Some(def) => def,
            None => {
                if !table.additional_properties {
                    result.push(format!(
                        "Unexpected field '{field_name}' (additional_properties is false)"
                    ));
                }
                continue;
            }
        };

        match change {
            FieldPatch::Unset => {
                if def.required {
                    result.push(format!("Required field '{field_name}' cannot be removed"));
                }
            }
            FieldPatch::Set(value) => {
                validate_field_value(schema, field_name, def, value, &mut result);
            }
        }
    }

    result
}

/// Fill in schema defaults for fields that are absent. Existing values are
/// never overwritten.
pub fn apply_defaults(table: &TableDefinition, fields: &mut Map<String, Value>) -> Result<()> {
    for (field_name, field_def) in &table.fields {
        let has_value = fields.get(field_name).map(|v| !v.is_null()).unwrap_or(false);

        if !has_value {
            if let Some(default) = &field_def.default {
                fields.insert(field_name.clone(), yaml_to_json(default)?);
            }
        }
    }
    Ok(())
}

/// Apply defaults and validate. Returns a `SchemaValidation` error listing
/// every problem found.
pub fn validate_and_prepare(
    schema: &SchemaDefinition,
    table_name: &str,
    table: &TableDefinition,
    fields: &mut Map<String, Value>,
) -> Result<()> {
    apply_defaults(table, fields)?;
    let result = validate_document(schema, table, fields);

    if !result.is_ok() {
        log::debug!(
            "Rejected document for '{table_name}': {} problem(s)",
            result.errors.len()
        );
        return Err(TesseraError::validation(table_name, result.errors));
    }

    Ok(())
}

fn validate_object(
    schema: &SchemaDefinition,
    prefix: &str,
    defs: &HashMap<String, FieldDefinition>,
    fields: &Map<String, Value>,
    allow_extra: bool,
    result: &mut ValidationResult,
) {
    let mut declared: Vec<_> = defs.iter().collect();
    declared.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (field_name, field_def) in declared {
        let path = join_path(prefix, field_name);
        match fields.get(field_name) {
            None | Some(Value::Null) => {
                if field_def.required && field_def.default.is_none() {
                    result.push(format!("Required field '{path}' is missing"));
                }
            }
            Some(value) => validate_field_value(schema, &path, field_def, value, result),
        }
    }

    if !allow_extra {
        for key in fields.keys() {
            if key.starts_with('_') && prefix.is_empty() {
                continue;
            }
            if !defs.contains_key(key) {
                let path = join_path(prefix, key);
                result.push(format!(
                    "Unexpected field '{path}' (additional_properties is false)"
                ));
            }
        }
    }
}

fn validate_field_value(
    schema: &SchemaDefinition,
    field_name: &str,
    field_def: &FieldDefinition,
    value: &Value,
    result: &mut ValidationResult,
) {
    match &field_def.field_type {
        FieldType::String => {
            let s = match value.as_str() {
                Some(s) => s,
                None => {
                    result.push(format!(
                        "Field '{field_name}' expected string, got {}",
                        type_name(value)
                    ));
                    return;
                }
            };

            if let Some(enum_values) = &field_def.enum_values {
                if !enum_values.iter().any(|allowed| allowed == s) {
                    result.push(format!(
                        "Field '{field_name}' value '{s}' is not in enum: {enum_values:?}"
                    ));
                }
            }

            let length = s.chars().count();
            if let Some(max) = field_def.max_length {
                if length > max {
                    result.push(format!(
                        "Field '{field_name}' is {length} characters long, maximum is {max}"
                    ));
                }
            }
            if let Some(min) = field_def.min_length {
                if length < min {
                    result.push(format!(
                        "Field '{field_name}' is {length} characters long, minimum is {min}"
                    ));
                }
            }
        }
        FieldType::Number => {
            let n = match value.as_f64() {
                Some(n) => n,
                None => {
                    result.push(format!(
                        "Field '{field_name}' expected number, got {}",
                        type_name(value)
                    ));
                    return;
                }
            };
            if let Some(min) = field_def.min {
                if n < min {
                    result.push(format!("Field '{field_name}' value {n} is below minimum {min}"));
                }
            }
            if let Some(max) = field_def.max {
                if n > max {
                    result.push(format!("Field '{field_name}' value {n} is above maximum {max}"));
                }
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                result.push(format!(
                    "Field '{field_name}' expected boolean, got {}",
                    type_name(value)
                ));
            }
        }
        FieldType::Id => match value.as_str() {
            Some(s) if !s.is_empty() => {}
            _ => {
                let target = field_def.table.as_deref().unwrap_or("?");
                result.push(format!(
                    "Field '{field_name}' expected id of table '{target}', got {}",
                    type_name(value)
                ));
            }
        },
        FieldType::List => {
            let items = match value.as_array() {
                Some(items) => items,
                None => {
                    result.push(format!(
                        "Field '{field_name}' expected list, got {}",
                        type_name(value)
                    ));
                    return;
                }
            };
            if let Some(max) = field_def.max_items {
                if items.len() > max {
                    result.push(format!(
                        "Field '{field_name}' has {} items, maximum is {max}",
                        items.len()
                    ));
                }
            }
            if let Some(item_type) = &field_def.items {
                let item_def = item_type.to_definition();
                for (i, item) in items.iter().enumerate() {
                    validate_field_value(
                        schema,
                        &format!("{field_name}[{i}]"),
                        &item_def,
                        item,
                        result,
                    );
                }
            }
        }
        FieldType::Object => {
            let obj = match value.as_object() {
                Some(obj) => obj,
                None => {
                    result.push(format!(
                        "Field '{field_name}' expected object, got {}",
                        type_name(value)
                    ));
                    return;
                }
            };
            // Free-form unless the schema declares its fields
            if let Some(nested) = &field_def.fields {
                validate_object(schema, field_name, nested, obj, false, result);
            }
        }
        FieldType::Vector => {
            let items = match value.as_array() {
                Some(items) if items.iter().all(Value::is_number) => items,
                _ => {
                    result.push(format!(
                        "Field '{field_name}' expected vector of numbers, got {}",
                        type_name(value)
                    ));
                    return;
                }
            };
            if let Some(dims) = field_def.dimensions {
                if items.len() != dims {
                    result.push(format!(
                        "Field '{field_name}' has {} dimensions, expected {dims}",
                        items.len()
                    ));
                }
            }
        }
        FieldType::Any => {}
        FieldType::Custom(type_name_str) => {
            if let Some(type_fields) = schema.get_custom_type(type_name_str) {
                match value.as_object() {
                    Some(obj) => validate_object(schema, field_name, type_fields, obj, false, result),
                    None => result.push(format!(
                        "Field '{field_name}' expected object (type '{type_name_str}'), got {}",
                        type_name(value)
                    )),
                }
            }
        }
    }
}

/// An `id` value found while walking a document, with the dotted path it
/// sits at and the table it must resolve in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReference {
    pub path: String,
    pub table: String,
    pub id: String,
}

/// Every `id` value of a document that declares a target table, including
/// those inside nested objects, custom types and lists.
pub fn document_references(
    schema: &SchemaDefinition,
    table: &TableDefinition,
    fields: &Map<String, Value>,
) -> Vec<IdReference> {
    let mut refs = Vec::new();
    collect_object_references(schema, "", &table.fields, fields, &mut refs);
    refs
}

/// The `id` values inside a single field value.
pub fn field_references(
    schema: &SchemaDefinition,
    field_name: &str,
    field_def: &FieldDefinition,
    value: &Value,
) -> Vec<IdReference> {
    let mut refs = Vec::new();
    collect_value_references(schema, field_name, field_def, value, &mut refs);
    refs
}

fn collect_object_references(
    schema: &SchemaDefinition,
    prefix: &str,
    defs: &HashMap<String, FieldDefinition>,
    fields: &Map<String, Value>,
    refs: &mut Vec<IdReference>,
) {
    let mut present: Vec<_> = fields.iter().collect();
    present.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (field_name, value) in present {
        if let Some(def) = defs.get(field_name) {
            collect_value_references(schema, &join_path(prefix, field_name), def, value, refs);
        }
    }
}

fn collect_value_references(
    schema: &SchemaDefinition,
    path: &str,
    field_def: &FieldDefinition,
    value: &Value,
    refs: &mut Vec<IdReference>,
) {
    match &field_def.field_type {
        FieldType::Id => {
            if let (Some(target), Some(id)) = (&field_def.table, value.as_str()) {
                refs.push(IdReference {
                    path: path.to_string(),
                    table: target.clone(),
                    id: id.to_string(),
                });
            }
        }
        FieldType::List => {
            if let (Some(item_type), Some(items)) = (&field_def.items, value.as_array()) {
                let item_def = item_type.to_definition();
                for (i, item) in items.iter().enumerate() {
                    collect_value_references(schema, &format!("{path}[{i}]"), &item_def, item, refs);
                }
            }
        }
        FieldType::Object => {
            if let (Some(nested), Some(obj)) = (&field_def.fields, value.as_object()) {
                collect_object_references(schema, path, nested, obj, refs);
            }
        }
        FieldType::Custom(type_name_str) => {
            if let (Some(type_fields), Some(obj)) =
                (schema.get_custom_type(type_name_str), value.as_object())
            {
                collect_object_references(schema, path, type_fields, obj, refs);
            }
        }
        _ => {}
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
