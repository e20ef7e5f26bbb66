//! Record declarations of the text-parsed languages.
//!
//! Each function reads a pseudo-tree and returns the named types it declares,
//! expressed as field lists (or enum members) for the schema walker.

use crate::engine::node::Node;
use crate::engine::schema_walker::{FieldDecl, SchemaNode, SchemaWalker, TypeExpr};
use crate::lang::literal::{balanced_group, call_args, positional, split_top_level, string_value};
use crate::model::Language;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static GO_STRUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^type\s+([A-Za-z_]\w*)\s+struct$").unwrap());
static GO_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s+(\S.*)$").unwrap());
static GO_JSON_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r#"json:"([^"]*)""#).unwrap());
static PY_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^class\s+([A-Za-z_]\w*)\s*(?:\((.*)\))?\s*:$").unwrap());
static JAVA_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(class|record|enum)\s+([A-Za-z_]\w*)").unwrap());
static JAVA_ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([A-Za-z_][\w.]*)").unwrap());
static TS_INTERFACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)").unwrap());
static HS_DATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:data|newtype)\s+([A-Z]\w*)[^=]*=\s*(.*)$").unwrap());

const JAVA_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "final", "transient", "volatile",
];
const JAVA_PRIMITIVES: &[&str] = &["int", "long", "short", "byte", "float", "double", "boolean", "char"];
const JAVA_NOT_NULL: &[&str] = &["NotNull", "NonNull", "NotBlank", "NotEmpty"];
const PYTHON_MODEL_BASES: &[&str] = &["BaseModel", "SQLModel", "TypedDict", "Schema"];

/// Shape of a discovered named type
#[derive(Debug, Clone, PartialEq)]
pub enum RecordShape {
    Fields(Vec<FieldDecl>),
    Enum(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub shape: RecordShape,
    pub line: usize,
}

impl Record {
    fn fields(name: impl Into<String>, fields: Vec<FieldDecl>, line: usize) -> Self {
        Self {
            name: name.into(),
            shape: RecordShape::Fields(fields),
            line,
        }
    }

    pub fn to_schema(&self, language: Language) -> SchemaNode {
        match &self.shape {
            RecordShape::Fields(fields) => SchemaWalker::new(language).walk_fields(fields),
            RecordShape::Enum(values) => SchemaNode::string_enum(values.clone()),
        }
    }
}

/// Convert every record into a named schema
pub fn to_schemas(records: Vec<Record>, language: Language) -> Vec<(String, SchemaNode)> {
    records
        .into_iter()
        .map(|record| {
            let schema = record.to_schema(language);
            (record.name, schema)
        })
        .collect()
}

fn descendants<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    for child in &node.children {
        out.push(child);
        descendants(child, out);
    }
}

/// `type X struct { .. }` declarations with their `json` tags
pub fn go_structs(tree: &Node) -> Vec<Record> {
    let mut nodes = Vec::new();
    descendants(tree, &mut nodes);

    nodes
        .into_iter()
        .filter_map(|node| {
            let caps = GO_STRUCT.captures(&node.text)?;
            let fields = node.children.iter().flat_map(|f| go_field(&f.text)).collect();
            Some(Record::fields(&caps[1], fields, node.line))
        })
        .collect()
}

fn go_field(text: &str) -> Vec<FieldDecl> {
    let (decl, tag) = match text.find('`') {
        Some(tick) => (text[..tick].trim(), Some(&text[tick..])),
        None => (text.trim(), None),
    };

    // Embedded structs have no field name
    let Some(caps) = GO_FIELD.captures(decl) else {
        return Vec::new();
    };
    let names: Vec<&str> = caps.get(1).map_or("", |m| m.as_str()).split(',').map(str::trim).collect();
    let type_text = caps.get(2).map_or("", |m| m.as_str()).trim();

    let json = tag.and_then(|t| GO_JSON_TAG.captures(t)).map(|c| c[1].to_string());
    let mut tag_parts = json.as_deref().unwrap_or("").split(',');
    let tag_name = tag_parts.next().unwrap_or("").to_string();
    let omitempty = tag_parts.any(|p| p == "omitempty");

    if tag_name == "-" {
        return Vec::new();
    }

    names
        .into_iter()
        .filter(|name| name.chars().next().is_some_and(char::is_uppercase))
        .map(|name| {
            let serialized = if tag_name.is_empty() {
                name.to_string()
            } else {
                tag_name.clone()
            };
            FieldDecl::new(serialized, TypeExpr::parse(type_text)).optional(omitempty)
        })
        .collect()
}

/// Pydantic models, `TypedDict`s, `@dataclass` classes and `Enum` subclasses
pub fn python_classes(tree: &Node) -> Vec<Record> {
    let mut records: Vec<Record> = Vec::new();
    let mut decorators: Vec<&str> = Vec::new();

    for node in &tree.children {
        if node.text.starts_with('@') {
            decorators.push(&node.text);
            continue;
        }
        let pending = std::mem::take(&mut decorators);

        let Some(caps) = PY_CLASS.captures(&node.text) else {
            continue;
        };
        let name = caps[1].to_string();
        let bases: Vec<String> = caps
            .get(2)
            .map(|b| split_top_level(b.as_str(), ',').into_iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();
        let base_names: Vec<&str> = bases
            .iter()
            .map(|b| b.rsplit('.').next().unwrap_or(b))
            .collect();

        if base_names.iter().any(|b| b.ends_with("Enum")) {
            let values = node
                .children
                .iter()
                .filter_map(|member| {
                    let (key, value) = member.text.split_once('=')?;
                    if !key.trim().chars().all(|c| c.is_alphanumeric() || c == '_') {
                        return None;
                    }
                    Some(string_value(value).unwrap_or_else(|| key.trim().to_string()))
                })
                .collect();
            records.push(Record {
                name,
                shape: RecordShape::Enum(values),
                line: node.line,
            });
            continue;
        }

        let is_dataclass = pending.iter().any(|d| d.starts_with("@dataclass") || d.contains(".dataclass"));
        let inherits_model = base_names
            .iter()
            .any(|b| PYTHON_MODEL_BASES.contains(b) || records.iter().any(|r| r.name == *b));
        if !is_dataclass && !inherits_model {
            continue;
        }

        let mut fields: Vec<FieldDecl> = base_names
            .iter()
            .filter_map(|b| records.iter().find(|r| r.name == *b))
            .flat_map(|r| match &r.shape {
                RecordShape::Fields(fields) => fields.clone(),
                RecordShape::Enum(_) => Vec::new(),
            })
            .collect();
        fields.extend(node.children.iter().filter_map(|n| python_field(&n.text)));

        records.push(Record::fields(name, fields, node.line));
    }

    records
}

fn python_field(text: &str) -> Option<FieldDecl> {
    let (name, rest) = text.split_once(':')?;
    let name = name.trim();
    if name.is_empty()
        || name.starts_with('_')
        || name == "model_config"
        || !name.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }

    let (annotation, default) = match rest.split_once('=') {
        Some((annotation, default)) => (annotation.trim(), Some(default.trim())),
        None => (rest.trim(), None),
    };
    if annotation.starts_with("ClassVar") {
        return None;
    }

    let optional = match default {
        None => false,
        // `Field(...)` keeps the field required
        Some(value) if value.starts_with("Field(") => {
            let inner = balanced_group(value, 5).unwrap_or("");
            let args = call_args(inner);
            positional(&args, 0) != Some("...")
        }
        Some(_) => true,
    };

    Some(FieldDecl::new(name, TypeExpr::parse(annotation)).optional(optional))
}

/// Classes and records with their non-static fields
pub fn java_classes(tree: &Node) -> Vec<Record> {
    let mut nodes = Vec::new();
    descendants(tree, &mut nodes);

    nodes
        .into_iter()
        .filter_map(|node| {
            let caps = JAVA_CLASS.captures(&node.text)?;
            let name = caps[2].to_string();
            match &caps[1] {
                "enum" => {
                    let values = node
                        .children
                        .first()
                        .map(|constants| {
                            split_top_level(constants.text.trim_end_matches(';'), ',')
                                .into_iter()
                                .map(|c| c.split('(').next().unwrap_or(c).trim().to_string())
                                .filter(|c| c.chars().all(|ch| ch.is_alphanumeric() || ch == '_') && !c.is_empty())
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(Record {
                        name,
                        shape: RecordShape::Enum(values),
                        line: node.line,
                    })
                }
                "record" => {
                    let open = caps.get(0)?.end() + node.text[caps.get(0)?.end()..].find('(')?;
                    let components = balanced_group(&node.text, open)?;
                    let fields = split_top_level(components, ',')
                        .into_iter()
                        .filter_map(java_field)
                        .collect();
                    Some(Record::fields(name, fields, node.line))
                }
                _ => {
                    let fields = node
                        .children
                        .iter()
                        .filter(|member| member.children.is_empty())
                        .filter_map(|member| java_field(&member.text))
                        .collect();
                    Some(Record::fields(name, fields, node.line))
                }
            }
        })
        .collect()
}

fn java_field(text: &str) -> Option<FieldDecl> {
    let mut rename = None;
    let mut ignored = false;
    let mut not_null = false;
    let mut rest = text.trim();

    while let Some(caps) = JAVA_ANNOTATION.captures(rest).filter(|c| c.get(0).is_some_and(|m| m.start() == 0)) {
        let annotation = caps[1].rsplit('.').next().unwrap_or(&caps[1]).to_string();
        let mut end = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
        let mut args = None;
        if rest[end..].starts_with('(') {
            args = balanced_group(rest, end);
            end += args.map(|a| a.len() + 2).unwrap_or(0);
        }
        match annotation.as_str() {
            "JsonProperty" | "SerializedName" => {
                rename = args.and_then(|a| {
                    let parsed = call_args(a);
                    positional(&parsed, 0)
                        .or_else(|| crate::lang::literal::keyword(&parsed, "value"))
                        .and_then(string_value)
                });
            }
            "JsonIgnore" | "Transient" => ignored = true,
            a if JAVA_NOT_NULL.contains(&a) => not_null = true,
            _ => {}
        }
        rest = rest[end.min(rest.len())..].trim_start();
    }

    let declaration = rest.split('=').next().unwrap_or(rest).trim().trim_end_matches(';');
    if ignored || declaration.contains('(') {
        return None;
    }

    let mut words: Vec<&str> = declaration.split_whitespace().collect();
    if words.contains(&"static") {
        return None;
    }
    words.retain(|w| !JAVA_MODIFIERS.contains(w));
    let (name, type_words) = words.split_last()?;
    if type_words.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let type_text = type_words.join(" ");

    let required = not_null || JAVA_PRIMITIVES.contains(&type_text.as_str());
    Some(
        FieldDecl::new(rename.unwrap_or_else(|| name.to_string()), TypeExpr::parse(&type_text))
            .optional(!required),
    )
}

/// `interface X { a: T; b?: U }` declarations
pub fn typescript_interfaces(tree: &Node) -> Vec<Record> {
    let mut nodes = Vec::new();
    descendants(tree, &mut nodes);

    nodes
        .into_iter()
        .filter_map(|node| {
            let caps = TS_INTERFACE.captures(&node.text)?;
            let fields = node
                .children
                .iter()
                .flat_map(|member| split_top_level(&member.text, ','))
                .filter_map(|member| {
                    let (name, ty) = member.split_once(':')?;
                    let name = name.trim().trim_start_matches("readonly ").trim();
                    let optional = name.ends_with('?');
                    let name = name.trim_end_matches('?').trim_matches(|c| c == '\'' || c == '"');
                    if name.is_empty() || name.contains('(') {
                        return None;
                    }
                    Some(FieldDecl::new(name, TypeExpr::parse(ty.trim())).optional(optional))
                })
                .collect();
            Some(Record::fields(&caps[1], fields, node.line))
        })
        .collect()
}

/// Record syntax `data` declarations and all-nullary sum types
pub fn haskell_records(tree: &Node) -> Vec<Record> {
    tree.children
        .iter()
        .filter_map(|node| {
            let text = node.full_text();
            let caps = HS_DATA.captures(&text)?;
            let name = caps[1].to_string();
            let body = caps[2].split(" deriving").next().unwrap_or(&caps[2]).trim();

            if let Some(open) = body.find('{') {
                let inner = balanced_group(body, open)?;
                return Some(Record::fields(name, haskell_fields(inner), node.line));
            }

            let constructors: Vec<&str> = body.split('|').map(str::trim).collect();
            if constructors.len() > 1 && constructors.iter().all(|c| !c.is_empty() && !c.contains(' ')) {
                return Some(Record {
                    name,
                    shape: RecordShape::Enum(constructors.iter().map(|c| c.to_string()).collect()),
                    line: node.line,
                });
            }
            debug!("Skipping non-record data declaration {}", name);
            None
        })
        .collect()
}

fn haskell_fields(inner: &str) -> Vec<FieldDecl> {
    let mut fields = Vec::new();
    let mut names: Vec<String> = Vec::new();

    for part in split_top_level(inner, ',') {
        match part.split_once("::") {
            Some((name, ty)) => {
                names.push(name.trim().to_string());
                let ty = TypeExpr::parse(ty.trim().trim_start_matches('!'));
                fields.extend(names.drain(..).map(|n| FieldDecl::new(n, ty.clone())));
            }
            None => names.push(part.trim().to_string()),
        }
    }

    fields
}
