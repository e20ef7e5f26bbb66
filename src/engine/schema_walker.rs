//! Structural schema reconstruction.
//!
//! Two front ends feed the same [`SchemaNode`] model:
//!
//! - [`SchemaWalker::walk`] reads a JSON-Schema-like object literal
//!   (`{ type: 'object', properties: { .. }, required: [..] }`).
//! - [`SchemaWalker::walk_fields`] reads record/struct field declarations and
//!   decides nullability and array-ness from a small set of known wrappers.
//!
//! Named types become [`SchemaKind::Reference`]s. The walker never resolves
//! them; that is done against the [`SchemaRegistry`] when the document is built.

use crate::engine::node::{Node, NodeKind};
use crate::model::Language;
use crate::type_mapper;
use log::debug;
use std::collections::HashMap;

const OPTIONAL_WRAPPERS: &[&str] = &["Option", "Optional", "Maybe", "Nullable", "*"];
const LIST_WRAPPERS: &[&str] = &[
    "Vec", "VecDeque", "HashSet", "BTreeSet", "List", "list", "Set", "set", "Sequence",
    "Iterable", "Collection", "ArrayList", "Array", "NonEmpty", "[]",
];
const MAP_WRAPPERS: &[&str] = &["HashMap", "BTreeMap", "Map", "map", "Dict", "dict"];
const TRANSPARENT_WRAPPERS: &[&str] = &["Box", "Arc", "Rc", "Cow", "Json", "Annotated"];

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Object {
        properties: Vec<(String, SchemaNode)>,
        required: Vec<String>,
    },
    Array(Box<SchemaNode>),
    Primitive {
        openapi_type: String,
        format: Option<String>,
        enum_values: Vec<String>,
    },
    /// Named schema, resolved later against the registry
    Reference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub description: Option<String>,
}

impl SchemaNode {
    fn from_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn object(properties: Vec<(String, SchemaNode)>, required: Vec<String>) -> Self {
        Self::from_kind(SchemaKind::Object {
            properties,
            required,
        })
    }

    /// Object with no known structure
    pub fn any() -> Self {
        Self::object(Vec::new(), Vec::new())
    }

    pub fn array(items: SchemaNode) -> Self {
        Self::from_kind(SchemaKind::Array(Box::new(items)))
    }

    pub fn primitive(openapi_type: &str, format: Option<&str>) -> Self {
        Self::from_kind(SchemaKind::Primitive {
            openapi_type: openapi_type.to_string(),
            format: format.map(str::to_string),
            enum_values: Vec::new(),
        })
    }

    pub fn string() -> Self {
        Self::primitive("string", None)
    }

    pub fn string_enum(values: Vec<String>) -> Self {
        Self::from_kind(SchemaKind::Primitive {
            openapi_type: "string".to_string(),
            format: None,
            enum_values: values,
        })
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::from_kind(SchemaKind::Reference(name.into()))
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn reference_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Reference(name) => Some(name),
            _ => None,
        }
    }

    /// Property schema for object nodes
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        match &self.kind {
            SchemaKind::Object { properties, .. } => properties
                .iter()
                .find(|(prop, _)| prop == name)
                .map(|(_, schema)| schema),
            _ => None,
        }
    }

    /// Required property names for object nodes
    pub fn required(&self) -> &[String] {
        match &self.kind {
            SchemaKind::Object { required, .. } => required,
            _ => &[],
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, SchemaKind::Primitive { .. })
    }
}

/// A type as written in source: head name plus type arguments.
///
/// `Option<Vec<User>>`, `[]*User`, `List[Optional[str]]` and `Maybe [Item]` all
/// parse into the same nested shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub name: String,
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn base_name(&self) -> &str {
        type_mapper::base_name(&self.name)
    }

    /// Parse textual type syntax from Go, Python, Java, TypeScript or Haskell sources
    pub fn parse(text: &str) -> TypeExpr {
        let text = strip_wrapping_parens(text.trim().trim_start_matches('&').trim());

        let unions = split_top_level(text, '|');
        if unions.len() > 1 {
            let nullable = unions
                .iter()
                .any(|p| matches!(*p, "None" | "null" | "undefined" | "nil"));
            let first = unions
                .iter()
                .find(|p| !matches!(**p, "None" | "null" | "undefined" | "nil"))
                .copied()
                .unwrap_or("None");
            let inner = TypeExpr::parse(first);
            return if nullable {
                TypeExpr::generic("Optional", vec![inner])
            } else {
                inner
            };
        }

        if let Some(rest) = text.strip_prefix('*') {
            return TypeExpr::generic("*", vec![TypeExpr::parse(rest)]);
        }
        if let Some(rest) = text.strip_prefix("[]") {
            return TypeExpr::generic("[]", vec![TypeExpr::parse(rest)]);
        }
        if let Some(rest) = text.strip_prefix("map[") {
            if let Some(close) = matching_close(rest, '[', ']') {
                return TypeExpr::generic(
                    "map",
                    vec![
                        TypeExpr::parse(&rest[..close]),
                        TypeExpr::parse(&rest[close + 1..]),
                    ],
                );
            }
        }
        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            if matching_close(&text[1..], '[', ']') == Some(text.len() - 2) {
                return TypeExpr::generic("[]", vec![TypeExpr::parse(inner)]);
            }
        }
        if let Some(elem) = text.strip_suffix("[]") {
            return TypeExpr::generic("[]", vec![TypeExpr::parse(elem)]);
        }

        for (open, close) in [('<', '>'), ('[', ']')] {
            if let Some(start) = text.find(open) {
                if text.ends_with(close) {
                    let name = text[..start].trim();
                    let inner = &text[start + 1..text.len() - 1];
                    let args = split_top_level(inner, ',')
                        .into_iter()
                        .filter(|a| !a.is_empty())
                        .map(TypeExpr::parse)
                        .collect();
                    return TypeExpr::generic(name, args);
                }
            }
        }

        // Haskell-style application: `Maybe Int`, `Map Text (Maybe Int)`
        let words = split_top_level(text, ' ');
        let words: Vec<&str> = words.into_iter().filter(|w| !w.is_empty()).collect();
        if words.len() > 1 {
            return TypeExpr::generic(
                words[0],
                words[1..].iter().map(|w| TypeExpr::parse(w)).collect(),
            );
        }

        TypeExpr::simple(text)
    }
}

/// One field of a record/struct/class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Serialized property name
    pub name: String,
    pub ty: TypeExpr,
    /// Optional regardless of its type (`omitempty`, default values)
    pub optional: bool,
    pub description: Option<String>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            description: None,
        }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

pub struct SchemaWalker {
    language: Language,
}

impl SchemaWalker {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Reconstruct a schema from a structural object literal.
    pub fn walk(&self, node: &Node) -> SchemaNode {
        match node.kind {
            NodeKind::Object => self.walk_object_literal(node),
            // A bare identifier where an object is expected names a schema
            NodeKind::Ident => SchemaNode::reference(type_mapper::base_name(&node.text)),
            NodeKind::Array => {
                let items = node
                    .children
                    .first()
                    .map(|item| self.walk(item))
                    .unwrap_or_else(SchemaNode::any);
                SchemaNode::array(items)
            }
            _ => {
                debug!("Unrecognized schema literal of kind {:?}", node.kind);
                SchemaNode::any()
            }
        }
    }

    fn walk_object_literal(&self, node: &Node) -> SchemaNode {
        let description = node
            .field("description")
            .filter(|d| d.kind == NodeKind::String)
            .map(|d| d.text.clone());

        if let Some(target) = node.field("$ref") {
            let name = target.text.rsplit('/').next().unwrap_or(&target.text);
            return SchemaNode::reference(name).with_description(description);
        }

        let declared_type = node
            .field("type")
            .filter(|t| matches!(t.kind, NodeKind::String | NodeKind::Ident))
            .map(|t| t.text.as_str());

        let schema = match declared_type {
            Some("array") => {
                let items = node
                    .field("items")
                    .map(|items| self.walk(items))
                    .unwrap_or_else(SchemaNode::any);
                SchemaNode::array(items)
            }
            Some("object") | None if node.field("properties").is_some() => {
                self.walk_properties(node)
            }
            Some("object") | None => SchemaNode::any(),
            Some(primitive) => {
                let format = node
                    .field("format")
                    .filter(|f| f.kind == NodeKind::String)
                    .map(|f| f.text.clone());
                let enum_values = node
                    .field("enum")
                    .map(|values| values.children.iter().map(|v| v.text.clone()).collect())
                    .unwrap_or_default();
                SchemaNode::from_kind(SchemaKind::Primitive {
                    openapi_type: primitive.to_string(),
                    format,
                    enum_values,
                })
            }
        };

        schema.with_description(description)
    }

    fn walk_properties(&self, node: &Node) -> SchemaNode {
        let properties = node
            .field("properties")
            .map(|props| {
                props
                    .children
                    .iter()
                    .filter(|pair| pair.kind == NodeKind::Pair)
                    .filter_map(|pair| {
                        pair.children
                            .first()
                            .map(|value| (pair.text.clone(), self.walk(value)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let required = node
            .field("required")
            .filter(|r| r.kind == NodeKind::Array)
            .map(|r| {
                r.children
                    .iter()
                    .filter(|c| c.kind == NodeKind::String)
                    .map(|c| c.text.clone())
                    .collect()
            })
            .unwrap_or_default();

        SchemaNode::object(properties, required)
    }

    /// Object schema for a record declaration
    pub fn walk_fields(&self, fields: &[FieldDecl]) -> SchemaNode {
        let mut properties = Vec::with_capacity(fields.len());
        let mut required = Vec::new();

        for field in fields {
            let (schema, optional) = self.walk_type(&field.ty);
            if !optional && !field.optional {
                required.push(field.name.clone());
            }
            properties.push((
                field.name.clone(),
                schema.with_description(field.description.clone()),
            ));
        }

        SchemaNode::object(properties, required)
    }

    /// Schema for a type, and whether an optional wrapper was found around it
    pub fn walk_type(&self, ty: &TypeExpr) -> (SchemaNode, bool) {
        let base = ty.base_name();
        let first_arg = ty.args.first();

        if OPTIONAL_WRAPPERS.contains(&base) || ty.name == "*" {
            if let Some(inner) = first_arg {
                return (self.walk_type(inner).0, true);
            }
        }
        if TRANSPARENT_WRAPPERS.contains(&base) {
            if let Some(inner) = first_arg {
                return self.walk_type(inner);
            }
        }
        if LIST_WRAPPERS.contains(&base) || ty.name == "[]" {
            let items = first_arg
                .map(|inner| self.walk_type(inner).0)
                .unwrap_or_else(SchemaNode::any);
            return (SchemaNode::array(items), false);
        }
        if MAP_WRAPPERS.contains(&base) {
            return (SchemaNode::any(), false);
        }
        if let Some((openapi_type, format)) = type_mapper::openapi_type(self.language, &ty.name) {
            return (SchemaNode::primitive(openapi_type, format), false);
        }

        (SchemaNode::reference(base), false)
    }
}

/// Ordered name → schema table populated by schema discovery.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    order: Vec<String>,
    schemas: HashMap<String, SchemaNode>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema. The first registration of a name wins.
    pub fn insert(&mut self, name: impl Into<String>, schema: SchemaNode) -> bool {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            debug!("Schema {} already registered, keeping the first", name);
            return false;
        }
        self.order.push(name.clone());
        self.schemas.insert(name, schema);
        true
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.order
            .iter()
            .filter_map(move |name| self.schemas.get(name).map(|s| (name.as_str(), s)))
    }
}

/// Split on `sep` where no (), [], <>, {} or quotes are open
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth -= 1,
            _ if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

/// Offset of the `close` that balances an already-consumed `open`
fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 1;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn strip_wrapping_parens(mut text: &str) -> &str {
    while let Some(inner) = text.strip_prefix('(') {
        match inner.strip_suffix(')') {
            Some(body) if matching_close(inner, '(', ')') == Some(body.len()) => text = body.trim(),
            _ => break,
        }
    }
    text
}
