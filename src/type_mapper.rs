//! Source type name → OpenAPI `(type, format)` lookup tables, one per language.

use crate::model::Language;

/// OpenAPI primitive for a source type name, `None` when the name is not a primitive.
///
/// Qualified names are tried as written first, then by their last component.
pub fn openapi_type(
    language: Language,
    type_name: &str,
) -> Option<(&'static str, Option<&'static str>)> {
    let name = type_name.trim();
    lookup(language, name).or_else(|| {
        let base = base_name(name);
        if base != name {
            lookup(language, base)
        } else {
            None
        }
    })
}

/// Last component of a qualified name (`a::b::C`, `pkg.Type`)
pub fn base_name(name: &str) -> &str {
    let name = name.rsplit("::").next().unwrap_or(name);
    name.rsplit('.').next().unwrap_or(name)
}

fn lookup(language: Language, name: &str) -> Option<(&'static str, Option<&'static str>)> {
    match language {
        Language::Rust => rust_type(name),
        Language::Go => go_type(name),
        Language::Python => python_type(name),
        Language::Java => java_type(name),
        Language::Haskell => haskell_type(name),
        Language::JavaScript | Language::TypeScript => typescript_type(name),
    }
}

fn rust_type(name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match name {
        "String" | "str" | "char" => ("string", None),
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => ("integer", Some("int32")),
        "i64" | "i128" | "isize" | "u64" | "u128" | "usize" => ("integer", Some("int64")),
        "f32" => ("number", Some("float")),
        "f64" => ("number", Some("double")),
        "bool" => ("boolean", None),
        "Uuid" => ("string", Some("uuid")),
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" => ("string", Some("date-time")),
        "NaiveDate" | "Date" => ("string", Some("date")),
        "Value" => ("object", None),
        _ => return None,
    };
    Some(mapped)
}

fn go_type(name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match name {
        "string" | "rune" => ("string", None),
        "int" | "int64" | "uint" | "uint64" => ("integer", Some("int64")),
        "int8" | "int16" | "int32" | "uint8" | "uint16" | "uint32" | "byte" => {
            ("integer", Some("int32"))
        }
        "float32" => ("number", Some("float")),
        "float64" => ("number", Some("double")),
        "bool" => ("boolean", None),
        "time.Time" => ("string", Some("date-time")),
        "uuid.UUID" => ("string", Some("uuid")),
        "interface{}" | "any" => ("object", None),
        _ => return None,
    };
    Some(mapped)
}

fn python_type(name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match name {
        "str" | "EmailStr" | "HttpUrl" | "string" | "path" => ("string", None),
        "int" => ("integer", None),
        "uuid" => ("string", Some("uuid")),
        "float" | "Decimal" => ("number", None),
        "bool" => ("boolean", None),
        "datetime" => ("string", Some("date-time")),
        "date" => ("string", Some("date")),
        "UUID" => ("string", Some("uuid")),
        "bytes" => ("string", Some("binary")),
        "Any" | "dict" | "Dict" => ("object", None),
        _ => return None,
    };
    Some(mapped)
}

fn java_type(name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match name {
        "String" | "char" | "Character" => ("string", None),
        "int" | "Integer" | "short" | "Short" | "byte" | "Byte" => ("integer", Some("int32")),
        "long" | "Long" | "BigInteger" => ("integer", Some("int64")),
        "float" | "Float" => ("number", Some("float")),
        "double" | "Double" | "BigDecimal" => ("number", Some("double")),
        "boolean" | "Boolean" => ("boolean", None),
        "UUID" => ("string", Some("uuid")),
        "LocalDate" => ("string", Some("date")),
        "LocalDateTime" | "OffsetDateTime" | "Instant" | "ZonedDateTime" => {
            ("string", Some("date-time"))
        }
        "Object" => ("object", None),
        _ => return None,
    };
    Some(mapped)
}

fn haskell_type(name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match name {
        "Text" | "String" | "Char" | "ByteString" => ("string", None),
        "Int" | "Int32" | "Word32" => ("integer", Some("int32")),
        "Integer" | "Int64" | "Word64" | "Natural" => ("integer", Some("int64")),
        "Float" => ("number", Some("float")),
        "Double" | "Scientific" => ("number", Some("double")),
        "Bool" => ("boolean", None),
        "UUID" => ("string", Some("uuid")),
        "Day" => ("string", Some("date")),
        "UTCTime" => ("string", Some("date-time")),
        "Value" => ("object", None),
        _ => return None,
    };
    Some(mapped)
}

fn typescript_type(name: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match name {
        "string" | "String" => ("string", None),
        "number" | "Number" => ("number", None),
        "integer" => ("integer", None),
        "boolean" | "Boolean" => ("boolean", None),
        "Date" => ("string", Some("date-time")),
        "object" | "any" | "unknown" => ("object", None),
        _ => return None,
    };
    Some(mapped)
}
