//! Canonical path templates.
//!
//! Every source notation for path parameters is rewritten into `{name}`:
//!
//! | Notation            | Example            | Frameworks                 |
//! |---------------------|--------------------|----------------------------|
//! | colon               | `:id`, `:id?`      | axum 0.6, gin, express     |
//! | angle, typed        | `<int:id>`, `<id>` | flask                      |
//! | brace, constrained  | `{id}`, `{id:\d+}` | actix, spring, fastapi     |
//! | wildcard            | `*`, `*path`       | gin, express               |
//!
//! Unnamed captures get synthetic names `param1`, `param2`, ... in
//! left-to-right order.

use crate::model::RawFragment;
use std::collections::HashSet;

/// Type and converter names that make `<word>` an unnamed typed capture
const TYPE_KEYWORDS: &[&str] = &[
    "int", "float", "path", "uuid", "string", "any", "Int", "Integer", "Text", "String", "UUID",
    "Double", "Bool",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Param {
        name: String,
        type_name: Option<String>,
    },
}

/// Canonical path: ordered segments, parameter names unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathTemplate {
    pub segments: Vec<Segment>,
}

impl PathTemplate {
    /// Render with `{name}` placeholders; the empty template renders as `/`
    pub fn render(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param { name, .. } => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Parameters in segment order as `(name, declared type)`
    pub fn parameters(&self) -> Vec<(&str, Option<&str>)> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param { name, type_name } => Some((name.as_str(), type_name.as_deref())),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Literal segments in order
    pub fn literals(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(text) => Some(text.as_str()),
                Segment::Param { .. } => None,
            })
            .collect()
    }

    /// Raw fragments that normalize back to this template
    pub fn to_fragments(&self) -> Vec<RawFragment> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => RawFragment::Literal(text.clone()),
                Segment::Param { name, type_name } => RawFragment::Capture {
                    name: Some(name.clone()),
                    type_name: type_name.clone(),
                },
            })
            .collect()
    }
}

/// One classified path piece before synthetic naming
enum Piece {
    Literal(String),
    Param {
        name: Option<String>,
        type_name: Option<String>,
    },
}

/// Build the canonical template for `raw` declared under `prefix`.
pub fn normalize(raw: &[RawFragment], prefix: &str) -> PathTemplate {
    let mut pieces = Vec::new();
    split_into_pieces(prefix, &mut pieces);
    for fragment in raw {
        match fragment {
            RawFragment::Literal(text) => split_into_pieces(text, &mut pieces),
            RawFragment::Capture { name, type_name } => pieces.push(Piece::Param {
                name: name.clone().filter(|n| !n.is_empty()),
                type_name: type_name.clone(),
            }),
        }
    }

    let mut unnamed = 0;
    let mut used = HashSet::new();
    let segments = pieces
        .into_iter()
        .map(|piece| match piece {
            Piece::Literal(text) => Segment::Literal(text),
            Piece::Param { name, type_name } => {
                let base = name.unwrap_or_else(|| {
                    unnamed += 1;
                    format!("param{}", unnamed)
                });
                Segment::Param {
                    name: unique_name(base, &mut used),
                    type_name,
                }
            }
        })
        .collect();

    PathTemplate { segments }
}

/// Convenience for a single literal path
pub fn normalize_path(path: &str) -> PathTemplate {
    normalize(&[RawFragment::literal(path)], "")
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn split_into_pieces(text: &str, pieces: &mut Vec<Piece>) {
    // Query strings and fragments are not part of the route
    let text = text.split(['?', '#']).next().unwrap_or_default();
    for raw in text.split('/') {
        let segment = raw.trim();
        if segment.is_empty() {
            continue;
        }
        pieces.push(classify(segment));
    }
}

fn classify(segment: &str) -> Piece {
    if let Some(rest) = segment.strip_prefix(':') {
        // `:id?` (optional) and `:id(\d+)` (constrained) keep only the name
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        return Piece::Param {
            name: Some(name).filter(|n| !n.is_empty()),
            type_name: None,
        };
    }

    if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        return match inner.split_once(':') {
            Some((type_name, name)) => Piece::Param {
                name: Some(name.trim().to_string()).filter(|n| !n.is_empty()),
                type_name: Some(type_name.trim().to_string()).filter(|t| !t.is_empty()),
            },
            None if TYPE_KEYWORDS.contains(&inner.trim()) => Piece::Param {
                name: None,
                type_name: Some(inner.trim().to_string()),
            },
            None => Piece::Param {
                name: Some(inner.trim().to_string()).filter(|n| !n.is_empty()),
                type_name: None,
            },
        };
    }

    if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let inner = inner.trim().trim_start_matches('*');
        return match inner.split_once(':') {
            Some((name, constraint)) => Piece::Param {
                name: Some(name.trim().to_string()).filter(|n| !n.is_empty()),
                type_name: Some(constraint.trim().to_string()).filter(|t| !t.is_empty()),
            },
            None => Piece::Param {
                name: Some(inner.trim_end_matches("...").to_string()).filter(|n| !n.is_empty()),
                type_name: None,
            },
        };
    }

    if let Some(rest) = segment.strip_prefix('*') {
        return Piece::Param {
            name: Some(rest.to_string()).filter(|n| !n.is_empty()),
            type_name: None,
        };
    }

    Piece::Literal(segment.to_string())
}
