//! JavaScript/Python literal values and call arguments.
//!
//! Only the shapes that route declarations actually use are understood:
//! objects/dicts, arrays/lists, strings, numbers, identifiers and member
//! expressions. Anything else (calls, arrow functions, spread) is kept as an
//! opaque `Other` node holding its raw text.

use crate::engine::node::{Node, NodeKind};

/// Parse a literal value (object, array, string, ...) from the start of `text`.
///
/// Returns `None` if nothing parseable starts there.
pub fn parse_object_literal(text: &str, line: usize) -> Option<Node> {
    let mut parser = LiteralParser {
        chars: text.chars().collect(),
        pos: 0,
        line,
    };
    parser.value()
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl LiteralParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Option<Node> {
        self.skip_ws();
        match self.peek()? {
            '{' => self.object(),
            '[' => self.array(),
            '"' | '\'' | '`' => self
                .string()
                .map(|s| Node::new(NodeKind::String, s, self.line)),
            c if c.is_ascii_digit() || c == '-' => Some(self.number()),
            c if is_ident_char(c) => Some(self.ident_or_call()),
            _ => None,
        }
    }

    fn object(&mut self) -> Option<Node> {
        self.pos += 1;
        let mut pairs = Vec::new();

        loop {
            self.skip_ws();
            match self.peek()? {
                '}' => {
                    self.pos += 1;
                    break;
                }
                ',' => {
                    self.pos += 1;
                    continue;
                }
                '.' => {
                    // spread: `...defaults`
                    while self.peek() == Some('.') {
                        self.pos += 1;
                    }
                    self.ident_or_call();
                    continue;
                }
                _ => {}
            }

            let key = match self.peek()? {
                '"' | '\'' | '`' => self.string()?,
                '[' => {
                    // computed key, keep its text
                    let start = self.pos;
                    self.skip_balanced('[', ']');
                    self.chars[start..self.pos].iter().collect()
                }
                _ => self.ident()?,
            };

            let value = if self.eat(':') {
                self.value()
                    .unwrap_or_else(|| Node::new(NodeKind::Other, self.skip_value(), self.line))
            } else if self.peek() == Some('(') {
                // method shorthand: `handler(req, reply) { ... }`
                self.skip_balanced('(', ')');
                self.skip_ws();
                if self.peek() == Some('{') {
                    self.skip_balanced('{', '}');
                }
                Node::new(NodeKind::Other, key.clone(), self.line)
            } else {
                // shorthand property: `{ prefix }`
                Node::new(NodeKind::Ident, key.clone(), self.line)
            };
            // arrow bodies and operators after the value
            self.skip_value();

            pairs.push(Node::new(NodeKind::Pair, key, self.line).with_children(vec![value]));
        }

        Some(Node::new(NodeKind::Object, "", self.line).with_children(pairs))
    }

    fn array(&mut self) -> Option<Node> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_ws();
            match self.peek()? {
                ']' => {
                    self.pos += 1;
                    break;
                }
                ',' => self.pos += 1,
                _ => {
                    let before = self.pos;
                    let item = self
                        .value()
                        .unwrap_or_else(|| Node::new(NodeKind::Other, self.skip_value(), self.line));
                    self.skip_value();
                    if self.pos == before {
                        // stray closing bracket of another kind
                        return None;
                    }
                    items.push(item);
                }
            }
        }

        Some(Node::new(NodeKind::Array, "", self.line).with_children(items))
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    if let Some(next) = self.peek() {
                        out.push(next);
                        self.pos += 1;
                    }
                }
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
        None
    }

    fn number(&mut self) -> Node {
        let start = self.pos;
        self.pos += 1;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Node::new(NodeKind::Number, text, self.line)
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    /// Identifier or member path, or an opaque call/arrow when followed by `(`/`=>`
    fn ident_or_call(&mut self) -> Node {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| is_ident_char(c) || c == '.')
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        self.skip_ws();
        if self.peek() == Some('(') {
            self.skip_balanced('(', ')');
            let text: String = self.chars[start..self.pos].iter().collect();
            return Node::new(NodeKind::Other, text, self.line);
        }
        Node::new(NodeKind::Ident, name, self.line)
    }

    fn skip_balanced(&mut self, open: char, close: char) {
        let mut depth = 0;
        while let Some(c) = self.peek() {
            if matches!(c, '"' | '\'' | '`') {
                self.string();
                continue;
            }
            self.pos += 1;
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Skip an unrecognized value up to the next `,` or closing bracket at this level
    fn skip_value(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0i32;
        while let Some(c) = self.peek() {
            if matches!(c, '"' | '\'' | '`') {
                self.string();
                continue;
            }
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => break,
                ')' | ']' | '}' => depth -= 1,
                ',' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect::<String>().trim().to_string()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Text between the bracket at `open_at` and its matching close, strings respected
pub fn balanced_group(text: &str, open_at: usize) -> Option<&str> {
    let open = text[open_at..].chars().next()?;
    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        _ => return None,
    };

    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text[open_at..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open_at + open.len_utf8()..open_at + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// One argument of a call or annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArg {
    /// Keyword/attribute name for `name=value` arguments
    pub name: Option<String>,
    pub value: String,
}

/// Split the inside of a call's parentheses into arguments.
///
/// `prefix='/v1', tags=["x"]` and `value = "/a", method = RequestMethod.GET`
/// both produce named arguments; everything else is positional.
pub fn call_args(inner: &str) -> Vec<CallArg> {
    split_top_level(inner, ',')
        .into_iter()
        .filter(|arg| !arg.is_empty())
        .map(|arg| match keyword_split(arg) {
            Some((name, value)) => CallArg {
                name: Some(name.to_string()),
                value: value.to_string(),
            },
            None => CallArg {
                name: None,
                value: arg.to_string(),
            },
        })
        .collect()
}

/// Value of the keyword argument `name`
pub fn keyword<'a>(args: &'a [CallArg], name: &str) -> Option<&'a str> {
    args.iter()
        .find(|a| a.name.as_deref() == Some(name))
        .map(|a| a.value.as_str())
}

/// The `index`th positional argument
pub fn positional(args: &[CallArg], index: usize) -> Option<&str> {
    args.iter()
        .filter(|a| a.name.is_none())
        .nth(index)
        .map(|a| a.value.as_str())
}

fn keyword_split(arg: &str) -> Option<(&str, &str)> {
    let bytes = arg.as_bytes();
    let eq = arg.find('=')?;
    let next = bytes.get(eq + 1).copied();
    let prev = eq.checked_sub(1).and_then(|p| bytes.get(p).copied());
    if matches!(next, Some(b'=') | Some(b'>')) || matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) {
        return None;
    }
    let name = arg[..eq].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, arg[eq + 1..].trim()))
}

/// Split on `sep` outside brackets and strings, trimming each part
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

/// Content of a string literal, `None` for anything else.
///
/// Python string prefixes (`r`, `f`, `b`, `u`) are accepted. Interpolated
/// strings (`f"{x}"`, `` `${x}` ``) and concatenations (`'/a' + '/b'`) are
/// not static and return `None`.
pub fn string_value(text: &str) -> Option<String> {
    let text = text.trim();
    let body = text.trim_start_matches(['r', 'f', 'b', 'u', 'R', 'F', 'B', 'U']);
    let prefix = &text[..text.len() - body.len()];
    let quote = body.chars().next()?;
    if !matches!(quote, '"' | '\'' | '`') {
        return None;
    }

    let triple: String = std::iter::repeat(quote).take(3).collect();
    let inner = match body.strip_prefix(triple.as_str()) {
        Some(rest) if rest.len() >= 3 => rest.strip_suffix(triple.as_str())?,
        _ => body.strip_prefix(quote)?.strip_suffix(quote)?,
    };
    if has_unescaped(inner, quote) {
        return None;
    }
    if quote == '`' && inner.contains("${") {
        return None;
    }
    if prefix.contains(['f', 'F']) && inner.replace("{{", "").contains('{') {
        return None;
    }
    Some(inner.to_string())
}

fn has_unescaped(text: &str, quote: char) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == quote => return true,
            _ => {}
        }
    }
    false
}

/// Items of an array/list literal of strings (`['GET', "POST"]`)
pub fn string_list(text: &str) -> Vec<String> {
    let text = text.trim();
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .or_else(|| text.strip_prefix('{').and_then(|t| t.strip_suffix('}')))
        .or_else(|| text.strip_prefix('(').and_then(|t| t.strip_suffix(')')));
    match inner {
        Some(inner) => split_top_level(inner, ',')
            .into_iter()
            .filter_map(string_value)
            .collect(),
        None => string_value(text).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_object() {
        let node = parse_object_literal(
            "{ method: 'POST', url: \"/users\", schema: { body: { type: 'object' } }, tags: ['a', 'b',], }",
            3,
        )
        .unwrap();

        assert_eq!(node.kind, NodeKind::Object);
        assert_eq!(node.line, 3);
        assert_eq!(node.field("method").unwrap().text, "POST");
        assert_eq!(node.field("url").unwrap().text, "/users");
        let body = node.field("schema").and_then(|s| s.field("body")).unwrap();
        assert_eq!(body.field("type").unwrap().text, "object");
        assert_eq!(node.field("tags").unwrap().children.len(), 2);
    }

    #[test]
    fn test_parse_handlers_and_shorthand() {
        let node = parse_object_literal(
            "{ handler: async (req, reply) => { return 1 }, prefix, preHandler: auth.check, ...rest, onSend(req) { } }",
            1,
        )
        .unwrap();

        assert_eq!(node.field("handler").unwrap().kind, NodeKind::Other);
        assert_eq!(node.field("prefix").unwrap().kind, NodeKind::Ident);
        assert_eq!(node.field("preHandler").unwrap().text, "auth.check");
        assert!(node.field("onSend").is_some());
    }

    #[test]
    fn test_parse_python_dict() {
        let node = parse_object_literal("{'id': 1, \"name\": None}", 1).unwrap();
        assert_eq!(node.field("id").unwrap().kind, NodeKind::Number);
        assert_eq!(node.field("name").unwrap().text, "None");
    }

    #[test]
    fn test_call_args() {
        let args = call_args(r#"'/users', prefix="/v1", tags=["users", "admin"], a == b"#);
        assert_eq!(positional(&args, 0), Some("'/users'"));
        assert_eq!(keyword(&args, "prefix"), Some("\"/v1\""));
        assert_eq!(string_list(keyword(&args, "tags").unwrap()), vec!["users", "admin"]);
        assert_eq!(positional(&args, 1), Some("a == b"));

        let args = call_args("(req, res) => res.send(x), handler");
        assert_eq!(args.len(), 2);
        assert!(args.iter().all(|a| a.name.is_none()));
    }

    #[test]
    fn test_balanced_group() {
        let text = r#"r.GET("/a(b", h)"#;
        let open = text.find('(').unwrap();
        assert_eq!(balanced_group(text, open), Some(r#""/a(b", h"#));
        assert_eq!(balanced_group("f(a", 1), None);
    }

    #[test]
    fn test_string_value() {
        assert_eq!(string_value("'/users'"), Some("/users".to_string()));
        assert_eq!(string_value("r\"/raw\""), Some("/raw".to_string()));
        assert_eq!(string_value("`/x`"), Some("/x".to_string()));
        assert_eq!(string_value("`/x/${id}`"), None);
        assert_eq!(string_value("PREFIX"), None);
    }

    #[test]
    fn test_string_value_rejects_dynamic_strings() {
        assert_eq!(string_value("f'/users/{user_id}'"), None);
        assert_eq!(string_value("F\"/items/{id}\""), None);
        assert_eq!(string_value("f'/static'"), Some("/static".to_string()));
        assert_eq!(string_value("f'/{{literal}}'"), Some("/{{literal}}".to_string()));
        assert_eq!(string_value("'/a' + '/b'"), None);
        assert_eq!(string_value("\"/a\" + PREFIX + \"/b\""), None);
    }

    #[test]
    fn test_string_value_quotes_and_escapes() {
        assert_eq!(string_value(r#""/it's""#), Some("/it's".to_string()));
        assert_eq!(string_value(r#"'/say \'hi\''"#), Some(r"/say \'hi\'".to_string()));
        assert_eq!(string_value(r#""""/doc""""#), Some("/doc".to_string()));
        assert_eq!(string_value("'/{id}'"), Some("/{id}".to_string()));
    }
}
