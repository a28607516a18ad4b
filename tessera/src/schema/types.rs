use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level schema definition parsed from schema.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub types: HashMap<String, HashMap<String, FieldDefinition>>,
    #[serde(default)]
    pub tables: HashMap<String, TableDefinition>,
    #[serde(default)]
    pub limits: Limits,
}

/// Definition of a single table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    #[serde(default)]
    pub fields: HashMap<String, FieldDefinition>,
    #[serde(default)]
    pub additional_properties: bool,
    /// Index name -> indexed field paths, in key order
    #[serde(default)]
    pub indexes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub search_indexes: HashMap<String, SearchIndexDefinition>,
    #[serde(default)]
    pub vector_indexes: HashMap<String, VectorIndexDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexDefinition {
    pub search_field: String,
    #[serde(default)]
    pub filter_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexDefinition {
    pub vector_field: String,
    pub dimensions: usize,
    #[serde(default)]
    pub filter_fields: Vec<String>,
}

/// Definition of a single field in a table or type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    /// Target table of an `id` field
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub items: Option<ItemType>,
    /// Inline field definitions of an `object` field
    #[serde(default)]
    pub fields: Option<HashMap<String, FieldDefinition>>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub dimensions: Option<usize>,
}

impl FieldDefinition {
    /// An optional field of the given type with no constraints.
    pub fn of(field_type: FieldType) -> Self {
        FieldDefinition {
            field_type,
            required: false,
            enum_values: None,
            default: None,
            table: None,
            items: None,
            fields: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            max_items: None,
            dimensions: None,
        }
    }
}

/// Field type enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Id,
    List,
    Object,
    Vector,
    Any,
    #[serde(untagged)]
    Custom(std::string::String),
}

impl FieldType {
    pub fn from_name(name: &str) -> FieldType {
        match name {
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "id" => FieldType::Id,
            "list" => FieldType::List,
            "object" => FieldType::Object,
            "vector" => FieldType::Vector,
            "any" => FieldType::Any,
            other => FieldType::Custom(other.to_string()),
        }
    }
}

/// Item type for lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemType {
    Simple(String),
    Complex(Box<FieldDefinition>),
}

impl ItemType {
    pub fn to_definition(&self) -> FieldDefinition {
        match self {
            ItemType::Simple(name) => {
                let mut def = FieldDefinition::of(FieldType::from_name(name));
                def.required = true;
                def
            }
            ItemType::Complex(def) => {
                let mut def = (**def).clone();
                def.required = true;
                def
            }
        }
    }
}

/// Runtime bounds, from the optional `limits:` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_max_vector_results")]
    pub max_vector_results: usize,
}

fn default_max_page_size() -> usize {
    1024
}

fn default_max_vector_results() -> usize {
    256
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_page_size: default_max_page_size(),
            max_vector_results: default_max_vector_results(),
        }
    }
}
