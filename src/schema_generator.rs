use crate::engine::schema_walker::{SchemaKind, SchemaNode, SchemaRegistry};
use crate::model::ParameterDescriptor;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema generator - converts walked [`SchemaNode`]s into OpenAPI schemas.
///
/// References are resolved against the [`SchemaRegistry`]: a known name becomes a
/// `$ref` and is emitted (with everything it references in turn) into the
/// components section; an unknown name becomes an untyped object.
pub struct SchemaGenerator<'a> {
    registry: &'a SchemaRegistry,
    /// Components generated so far
    schemas: BTreeMap<String, Schema>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "date-time")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Enum values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Schema {
    fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("#/components/schemas/{}", name)),
            ..Self::default()
        }
    }
}

/// Parameter schema for OpenAPI parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,
    /// Parameter location (path, query, header)
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the parameter is required
    pub required: bool,
    /// Schema for the parameter
    pub schema: Schema,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        debug!("Initializing SchemaGenerator with {} named schemas", registry.len());
        Self {
            registry,
            schemas: BTreeMap::new(),
        }
    }

    /// Generate the OpenAPI schema for a walked schema node
    pub fn generate_schema(&mut self, node: &SchemaNode) -> Schema {
        let mut schema = match &node.kind {
            SchemaKind::Primitive {
                openapi_type,
                format,
                enum_values,
            } => Schema {
                schema_type: Some(openapi_type.clone()),
                format: format.clone(),
                enum_values: (!enum_values.is_empty()).then(|| enum_values.clone()),
                ..Schema::default()
            },
            SchemaKind::Array(items) => Schema {
                items: Some(Box::new(self.generate_schema(items))),
                ..Schema::typed("array")
            },
            SchemaKind::Object {
                properties,
                required,
            } => {
                let properties: BTreeMap<String, Schema> = properties
                    .iter()
                    .map(|(name, property)| (name.clone(), self.generate_schema(property)))
                    .collect();
                Schema {
                    properties: (!properties.is_empty()).then_some(properties),
                    required: (!required.is_empty()).then(|| required.clone()),
                    ..Schema::typed("object")
                }
            }
            SchemaKind::Reference(name) => {
                if self.registry.contains(name) {
                    self.generate_component(name);
                    Schema::reference(name)
                } else {
                    debug!("Unknown type: {}, using object placeholder", name);
                    Schema::typed("object")
                }
            }
        };

        // `$ref` siblings are ignored by OpenAPI 3.0 tooling
        if schema.reference.is_none() {
            schema.description = node.description.clone();
        }
        schema
    }

    /// Emit the component for `name` and, transitively, everything it references
    fn generate_component(&mut self, name: &str) {
        if self.schemas.contains_key(name) {
            debug!("Schema for {} already exists", name);
            return;
        }
        let Some(node) = self.registry.get(name) else {
            return;
        };

        debug!("Generating component schema for: {}", name);
        // Placeholder first so self-referencing types terminate
        self.schemas.insert(name.to_string(), Schema::default());
        let schema = self.generate_schema(node);
        self.schemas.insert(name.to_string(), schema);
    }

    /// Generate the schema of a route parameter
    pub fn generate_parameter_schema(&mut self, param: &ParameterDescriptor) -> ParameterSchema {
        ParameterSchema {
            name: param.name.clone(),
            location: param.location.as_str().to_string(),
            required: param.required,
            schema: self.generate_schema(&param.schema),
        }
    }

    /// Get all generated component schemas
    pub fn get_schemas(&self) -> &BTreeMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> BTreeMap<String, Schema> {
        self.schemas
    }
}
