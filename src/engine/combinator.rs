//! Type-level route combinators (`"users" :> Capture "id" Int :> Get '[JSON] User`).
//!
//! `:<|>` (alternation) binds looser than `:>` (sequencing), and both are
//! split only at parenthesis depth zero. `prefix :> (A :<|> B)` needs no
//! special case: flattening a sequence is the cross product of its steps, so
//! the prefix ends up in front of every alternative.

use crate::engine::schema_walker::{SchemaNode, SchemaWalker, TypeExpr};
use crate::error::CombinatorError;
use crate::model::{HttpMethod, Language, QueryParam, RawFragment, RouteCandidate, SourceLocation, StatusVariant};
use log::debug;
use std::collections::HashMap;

pub const ALTERNATION: &str = ":<|>";
pub const SEQUENCE: &str = ":>";

/// Modifiers that carry no routing information
const IGNORED_COMBINATORS: &[&str] = &[
    "Header", "Header'", "Summary", "Description", "AuthProtect", "BasicAuth", "Auth", "Vault",
    "RemoteHost", "IsSecure", "HttpVersion", "WithNamedContext", "Fragment", "CaptureMode",
];

const METHOD_PREFIXES: &[(&str, HttpMethod)] = &[
    ("Get", HttpMethod::Get),
    ("Post", HttpMethod::Post),
    ("Put", HttpMethod::Put),
    ("Delete", HttpMethod::Delete),
    ("Patch", HttpMethod::Patch),
    ("Head", HttpMethod::Head),
    ("Options", HttpMethod::Options),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// `"segment"`
    Literal(String),
    /// `Capture "id" Int`, `CaptureAll "rest" Text`
    Capture {
        name: String,
        type_name: String,
        many: bool,
    },
    /// `QueryParam "q" Text`, `QueryParams`, `QueryFlag`
    Query {
        name: String,
        type_name: Option<String>,
        required: bool,
        many: bool,
    },
    /// `ReqBody '[JSON] T`
    Body(String),
    Method {
        method: HttpMethod,
        status: Option<StatusVariant>,
        response: Option<String>,
    },
    /// Another type alias, expanded during flattening
    Alias(String),
    Ignored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CombinatorExpr {
    Alt(Vec<CombinatorExpr>),
    Seq(Vec<CombinatorExpr>),
    Term(Term),
}

/// Parse one combinator expression.
pub fn parse(text: &str) -> Result<CombinatorExpr, CombinatorError> {
    check_balanced(text)?;
    parse_balanced(text)
}

/// Top-level alternatives of `text`, unmodified
pub fn split_alternatives(text: &str) -> Result<Vec<&str>, CombinatorError> {
    check_balanced(text)?;
    Ok(split_on(text, ALTERNATION))
}

fn parse_balanced(text: &str) -> Result<CombinatorExpr, CombinatorError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CombinatorError::EmptyExpression);
    }

    let alternatives = split_on(text, ALTERNATION);
    if alternatives.len() > 1 {
        let parsed = alternatives
            .into_iter()
            .map(|alt| operand(alt, ALTERNATION))
            .collect::<Result<_, _>>()?;
        return Ok(CombinatorExpr::Alt(parsed));
    }

    let steps = split_on(text, SEQUENCE);
    if steps.len() > 1 {
        let parsed = steps
            .into_iter()
            .map(|step| operand(step, SEQUENCE))
            .collect::<Result<_, _>>()?;
        return Ok(CombinatorExpr::Seq(parsed));
    }

    if let Some(inner) = strip_group(text) {
        return parse_balanced(inner);
    }

    Ok(CombinatorExpr::Term(classify_term(text)))
}

fn operand(text: &str, operator: &str) -> Result<CombinatorExpr, CombinatorError> {
    if text.trim().is_empty() {
        return Err(CombinatorError::DanglingOperator {
            operator: operator.to_string(),
        });
    }
    parse_balanced(text)
}

fn check_balanced(text: &str) -> Result<(), CombinatorError> {
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'(' | b'[' => open.push(i),
            b')' | b']' => {
                if open.pop().is_none() {
                    return Err(CombinatorError::UnbalancedParens { position: i });
                }
            }
            _ => {}
        }
    }

    match open.last() {
        Some(&position) => Err(CombinatorError::UnbalancedParens { position }),
        None => Ok(()),
    }
}

/// Split on `op` outside parentheses, brackets and string literals
fn split_on<'a>(text: &'a str, op: &str) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                i += 1;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            _ if depth == 0 && bytes[i..].starts_with(op.as_bytes()) => {
                parts.push(&text[start..i]);
                i += op.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

/// Inner text when the whole of `text` is one parenthesized group
fn strip_group(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0i32;
    for b in inner.bytes() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                // `(a) :> (b)` style texts close the first group early
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(inner)
}

/// Whitespace-separated words outside brackets and strings
fn words(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                start.get_or_insert(i);
            }
            '(' | '[' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ')' | ']' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&text[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}

fn unquote(word: &str) -> Option<&str> {
    word.strip_prefix('"').and_then(|w| w.strip_suffix('"'))
}

/// Promoted type-level lists and symbols (`'[JSON]`, `'GET`)
fn is_promoted(word: &str) -> bool {
    word.starts_with('\'')
}

fn classify_term(text: &str) -> Term {
    let words = words(text);
    let Some((&head, rest)) = words.split_first() else {
        return Term::Ignored(text.to_string());
    };

    if let Some(literal) = unquote(head) {
        return Term::Literal(literal.to_string());
    }

    let named = |rest: &[&str]| -> Option<(String, Option<String>)> {
        let position = rest.iter().position(|w| unquote(w).is_some())?;
        let name = unquote(rest[position])?.to_string();
        let type_words = &rest[position + 1..];
        let type_name = (!type_words.is_empty()).then(|| type_words.join(" "));
        Some((name, type_name))
    };
    let has_modifier = |modifier: &str| {
        rest.iter()
            .any(|w| is_promoted(w) && w.contains(modifier))
    };

    match head {
        "Capture" | "Capture'" | "CaptureAll" => {
            if let Some((name, type_name)) = named(rest) {
                return Term::Capture {
                    name,
                    type_name: type_name.unwrap_or_else(|| "Text".to_string()),
                    many: head == "CaptureAll",
                };
            }
        }
        "QueryParam" | "QueryParam'" | "QueryParams" | "QueryFlag" => {
            if let Some((name, type_name)) = named(rest) {
                return Term::Query {
                    name,
                    type_name: if head == "QueryFlag" {
                        Some("Bool".to_string())
                    } else {
                        type_name
                    },
                    required: head == "QueryParam'" && has_modifier("Required"),
                    many: head == "QueryParams",
                };
            }
        }
        "ReqBody" | "ReqBody'" => {
            let body: Vec<&str> = rest.iter().copied().filter(|w| !is_promoted(w)).collect();
            if !body.is_empty() {
                return Term::Body(body.join(" "));
            }
        }
        _ => {}
    }

    if let Some(method) = method_terminal(head, rest) {
        return method;
    }

    if IGNORED_COMBINATORS.contains(&head) {
        return Term::Ignored(text.to_string());
    }

    if rest.is_empty() && head.starts_with(|c: char| c.is_ascii_uppercase()) {
        return Term::Alias(head.to_string());
    }

    debug!("Ignoring unrecognized combinator term `{}`", text);
    Term::Ignored(text.to_string())
}

fn method_terminal(head: &str, rest: &[&str]) -> Option<Term> {
    let response = |words: &[&str]| -> Option<String> {
        words
            .iter()
            .rev()
            .find(|w| !is_promoted(w) && !w.starts_with(|c: char| c.is_ascii_digit()))
            .filter(|w| **w != "NoContent")
            .map(|w| w.to_string())
    };

    match head {
        "Raw" | "RawM" => {
            return Some(Term::Method {
                method: HttpMethod::All,
                status: None,
                response: None,
            })
        }
        "Verb" | "UVerb" | "Stream" => {
            let method = HttpMethod::parse(rest.first()?.trim_start_matches('\''))?;
            let status = rest
                .get(1)
                .and_then(|code| code.parse::<u16>().ok())
                .and_then(status_for_code);
            let response = if head == "UVerb" {
                None
            } else {
                response(&rest[1..])
            };
            return Some(Term::Method {
                method,
                status,
                response,
            });
        }
        _ => {}
    }

    let head = head.strip_prefix("Stream").unwrap_or(head);
    for (prefix, method) in METHOD_PREFIXES {
        let Some(suffix) = head.strip_prefix(prefix) else {
            continue;
        };
        let status = match suffix {
            "" | "NonAuthoritative" | "PartialContent" => None,
            "Created" => Some(StatusVariant::Created),
            "Accepted" => Some(StatusVariant::Accepted),
            "NoContent" | "ResetContent" => Some(StatusVariant::NoContent),
            _ => continue,
        };
        let response = if status == Some(StatusVariant::NoContent) {
            None
        } else {
            response(rest)
        };
        return Some(Term::Method {
            method: *method,
            status,
            response,
        });
    }
    None
}

fn status_for_code(code: u16) -> Option<StatusVariant> {
    match code {
        201 => Some(StatusVariant::Created),
        202 => Some(StatusVariant::Accepted),
        204 => Some(StatusVariant::NoContent),
        _ => None,
    }
}

/// Names of the aliases `expr` refers to, in order of first use
pub fn referenced_aliases(expr: &CombinatorExpr) -> Vec<String> {
    fn collect(expr: &CombinatorExpr, out: &mut Vec<String>) {
        match expr {
            CombinatorExpr::Alt(items) | CombinatorExpr::Seq(items) => {
                items.iter().for_each(|item| collect(item, out))
            }
            CombinatorExpr::Term(Term::Alias(name)) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            CombinatorExpr::Term(_) => {}
        }
    }
    let mut out = Vec::new();
    collect(expr, &mut out);
    out
}

/// Expand `expr` into one route candidate per alternative that ends in a method.
///
/// `aliases` holds the other parsed type aliases of the file; references to
/// them are expanded in place. A reference back into an alias that is already
/// being expanded contributes nothing.
pub fn flatten(
    expr: &CombinatorExpr,
    aliases: &HashMap<String, CombinatorExpr>,
    location: &SourceLocation,
) -> Vec<RouteCandidate> {
    let mut expanding = Vec::new();
    expand(expr, aliases, &mut expanding)
        .into_iter()
        .filter_map(|terms| to_candidate(&terms, location))
        .collect()
}

fn expand(
    expr: &CombinatorExpr,
    aliases: &HashMap<String, CombinatorExpr>,
    expanding: &mut Vec<String>,
) -> Vec<Vec<Term>> {
    match expr {
        CombinatorExpr::Alt(items) => items
            .iter()
            .flat_map(|item| expand(item, aliases, expanding))
            .collect(),
        CombinatorExpr::Seq(items) => {
            let mut paths: Vec<Vec<Term>> = vec![Vec::new()];
            for item in items {
                let tails = expand(item, aliases, expanding);
                paths = paths
                    .iter()
                    .flat_map(|head| {
                        tails.iter().map(move |tail| {
                            let mut joined = head.clone();
                            joined.extend(tail.iter().cloned());
                            joined
                        })
                    })
                    .collect();
            }
            paths
        }
        CombinatorExpr::Term(Term::Alias(name)) => match aliases.get(name) {
            Some(_) if expanding.contains(name) => {
                debug!("Alias {} refers back to itself, not expanding", name);
                Vec::new()
            }
            Some(target) => {
                expanding.push(name.clone());
                let expanded = expand(target, aliases, expanding);
                expanding.pop();
                expanded
            }
            None => vec![Vec::new()],
        },
        CombinatorExpr::Term(term) => vec![vec![term.clone()]],
    }
}

fn to_candidate(terms: &[Term], location: &SourceLocation) -> Option<RouteCandidate> {
    let walker = SchemaWalker::new(Language::Haskell);
    let schema_of = |type_name: &str| walker.walk_type(&TypeExpr::parse(type_name)).0;

    let mut fragments = Vec::new();
    let mut hints = Vec::new();
    let mut query = Vec::new();
    let mut body = None;
    let mut terminal = None;

    for term in terms {
        match term {
            Term::Literal(text) => fragments.push(RawFragment::literal(text.as_str())),
            Term::Capture {
                name,
                type_name,
                many,
            } => {
                fragments.push(RawFragment::Capture {
                    name: Some(name.clone()),
                    type_name: Some(type_name.clone()),
                });
                let schema = schema_of(type_name);
                hints.push((name.clone(), if *many { SchemaNode::array(schema) } else { schema }));
            }
            Term::Query {
                name,
                type_name,
                required,
                many,
            } => {
                let schema = type_name
                    .as_deref()
                    .map(|t| schema_of(t))
                    .unwrap_or_else(SchemaNode::string);
                let schema = if *many { SchemaNode::array(schema) } else { schema };
                query.push(QueryParam::new(name.as_str(), *required, schema));
            }
            Term::Body(type_name) => body = Some(schema_of(type_name)),
            Term::Method {
                method,
                status,
                response,
            } => {
                if terminal.is_none() {
                    terminal = Some((*method, *status, response.clone()));
                }
            }
            Term::Alias(_) | Term::Ignored(_) => {}
        }
    }

    let Some((method, status, response)) = terminal else {
        debug!("Combinator alternative at {} has no method, skipping", location);
        return None;
    };

    let mut candidate = RouteCandidate::new(method, Language::Haskell, location.clone())
        .with_fragments(fragments)
        .with_request_body(body)
        .with_response(response.as_deref().map(|r| schema_of(r)))
        .with_status(status);
    for (name, schema) in hints {
        candidate = candidate.with_param_hint(Some(name), schema);
    }
    for param in query {
        candidate = candidate.with_query(param);
    }
    Some(candidate)
}
