//! Pseudo syntax trees for languages without a native parser in this crate.
//!
//! These trees are a low-confidence structure: a statement is a run of source
//! text, and nesting follows braces (C family) or indentation (Python,
//! Haskell). They are only meant to give the adapters something to walk with
//! correct line numbers and a notion of "inside this block".

use crate::engine::node::{Node, NodeKind};
use crate::model::Language;

/// Lexical conventions needed to build a pseudo-tree.
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    pub line_comment: &'static str,
    pub block_comment: Option<(&'static str, &'static str)>,
    pub quotes: &'static [char],
    /// `"""` and `'''` strings that may span lines
    pub triple_quotes: bool,
    /// A newline at depth zero ends a statement (Go, JavaScript)
    pub newline_terminates: bool,
}

pub const GO: Syntax = Syntax {
    line_comment: "//",
    block_comment: Some(("/*", "*/")),
    quotes: &['"', '\'', '`'],
    triple_quotes: false,
    newline_terminates: true,
};

pub const JAVASCRIPT: Syntax = Syntax {
    line_comment: "//",
    block_comment: Some(("/*", "*/")),
    quotes: &['"', '\'', '`'],
    triple_quotes: false,
    newline_terminates: true,
};

pub const JAVA: Syntax = Syntax {
    line_comment: "//",
    block_comment: Some(("/*", "*/")),
    quotes: &['"', '\''],
    triple_quotes: false,
    newline_terminates: false,
};

pub const PYTHON: Syntax = Syntax {
    line_comment: "#",
    block_comment: None,
    quotes: &['"', '\''],
    triple_quotes: true,
    newline_terminates: true,
};

pub const HASKELL: Syntax = Syntax {
    line_comment: "--",
    block_comment: Some(("{-", "-}")),
    quotes: &['"'],
    triple_quotes: false,
    newline_terminates: true,
};

impl Syntax {
    pub fn for_language(language: Language) -> Option<&'static Syntax> {
        match language {
            Language::Go => Some(&GO),
            Language::JavaScript | Language::TypeScript => Some(&JAVASCRIPT),
            Language::Java => Some(&JAVA),
            Language::Python => Some(&PYTHON),
            Language::Haskell => Some(&HASKELL),
            Language::Rust => None,
        }
    }
}

/// Replace comments with spaces, keeping newlines so line numbers survive
pub fn strip_comments(source: &str, syntax: &Syntax) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < chars.len() {
        if let Some(end) = string_end(&chars, i, syntax) {
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }
        if starts_with(&chars, i, syntax.line_comment) {
            while i < chars.len() && chars[i] != '\n' {
                out.push(' ');
                i += 1;
            }
            continue;
        }
        if let Some((open, close)) = syntax.block_comment {
            if starts_with(&chars, i, open) {
                i += open.chars().count();
                out.extend(std::iter::repeat(' ').take(open.chars().count()));
                while i < chars.len() && !starts_with(&chars, i, close) {
                    out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                    i += 1;
                }
                let close_len = close.chars().count().min(chars.len() - i);
                out.extend(std::iter::repeat(' ').take(close_len));
                i += close_len;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    let mut idx = at;
    for p in pattern.chars() {
        if chars.get(idx) != Some(&p) {
            return false;
        }
        idx += 1;
    }
    !pattern.is_empty()
}

/// End offset (exclusive) of the string literal starting at `at`, if one starts there
fn string_end(chars: &[char], at: usize, syntax: &Syntax) -> Option<usize> {
    let quote = *chars.get(at)?;
    if !syntax.quotes.contains(&quote) {
        return None;
    }

    if syntax.triple_quotes && chars.get(at + 1) == Some(&quote) && chars.get(at + 2) == Some(&quote) {
        let mut i = at + 3;
        while i < chars.len() {
            if chars[i] == quote && chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Some(i + 3);
            }
            i += 1;
        }
        return Some(chars.len());
    }

    let mut i = at + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return Some(i + 1),
            // Only backtick strings span lines; anything else is unterminated
            '\n' if quote != '`' => return Some(i),
            _ => i += 1,
        }
    }
    Some(chars.len())
}

/// Statement tree for brace-delimited languages.
///
/// Statements end at `;`, at a closing block, or (when the syntax says so) at a
/// newline outside parentheses that is not followed by a `.`-chained call.
/// `{` at depth zero opens a block whose statements become the children of the
/// statement text preceding it.
pub fn brace_tree(source: &str, syntax: &Syntax) -> Node {
    let cleaned = strip_comments(source, syntax);
    let mut parser = BraceParser {
        chars: cleaned.chars().collect(),
        pos: 0,
        line: 1,
        syntax,
    };
    let children = parser.block(false);
    Node::new(NodeKind::File, "", 0).with_children(children)
}

struct BraceParser<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    syntax: &'a Syntax,
}

struct Pending {
    text: String,
    line: usize,
}

impl Pending {
    fn push(&mut self, c: char, line: usize) {
        if self.text.trim().is_empty() && !c.is_whitespace() {
            self.line = line;
        }
        self.text.push(c);
    }

    fn take(&mut self) -> Option<(String, usize)> {
        let collapsed = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        self.text.clear();
        (!collapsed.is_empty()).then_some((collapsed, self.line))
    }
}

impl BraceParser<'_> {
    fn block(&mut self, nested: bool) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut pending = Pending {
            text: String::new(),
            line: self.line,
        };
        let mut depth = 0usize;

        let flush = |pending: &mut Pending, nodes: &mut Vec<Node>| {
            if let Some((text, line)) = pending.take() {
                nodes.push(Node::new(NodeKind::Statement, text, line));
            }
        };

        while self.pos < self.chars.len() {
            if let Some(end) = string_end(&self.chars, self.pos, self.syntax) {
                for i in self.pos..end {
                    let c = self.chars[i];
                    pending.push(c, self.line);
                    if c == '\n' {
                        self.line += 1;
                    }
                }
                self.pos = end;
                continue;
            }

            let c = self.chars[self.pos];
            self.pos += 1;
            match c {
                '\n' => {
                    self.line += 1;
                    if depth == 0
                        && self.syntax.newline_terminates
                        && !self.chain_continues()
                        && !ends_with_operator(&pending.text)
                    {
                        flush(&mut pending, &mut nodes);
                    } else {
                        pending.push(' ', self.line);
                    }
                }
                '(' | '[' => {
                    depth += 1;
                    pending.push(c, self.line);
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    pending.push(c, self.line);
                }
                '{' if depth == 0 && !is_expression_context(&pending.text) => {
                    let line = if pending.text.trim().is_empty() {
                        self.line
                    } else {
                        pending.line
                    };
                    let text = pending.take().map(|(t, _)| t).unwrap_or_default();
                    let children = self.block(true);
                    nodes.push(Node::new(NodeKind::Statement, text, line).with_children(children));
                }
                '{' => {
                    depth += 1;
                    pending.push(c, self.line);
                }
                '}' if depth == 0 => {
                    if nested {
                        flush(&mut pending, &mut nodes);
                        return nodes;
                    }
                }
                '}' => {
                    depth -= 1;
                    pending.push(c, self.line);
                }
                ';' if depth == 0 => flush(&mut pending, &mut nodes),
                _ => pending.push(c, self.line),
            }
        }

        flush(&mut pending, &mut nodes);
        nodes
    }

    /// Next non-blank character starts a `.method()` continuation
    fn chain_continues(&self) -> bool {
        self.chars[self.pos..]
            .iter()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| *c == '.')
    }
}

fn ends_with_operator(text: &str) -> bool {
    let trimmed = text.trim_end();
    [",", "=", "+", "&&", "||", "?", ":"]
        .iter()
        .any(|op| trimmed.ends_with(op))
        && !trimmed.is_empty()
}

/// A `{` here starts an object literal rather than a block
fn is_expression_context(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with('=') && !trimmed.ends_with("=>")
        || trimmed.ends_with(':')
        || trimmed.ends_with(',')
        || trimmed.ends_with('?')
        || trimmed.ends_with("return")
}

/// Statement tree for indentation-structured languages.
///
/// Physical lines are joined into logical lines while brackets or multi-line
/// strings are open; a logical line becomes a child of the closest preceding
/// line with a smaller indentation.
pub fn indent_tree(source: &str, syntax: &Syntax) -> Node {
    let cleaned = strip_comments(source, syntax);
    let lines = logical_lines(&cleaned, syntax);

    let mut stack: Vec<(isize, Node)> = vec![(-1, Node::new(NodeKind::File, "", 0))];
    for (indent, line, text) in lines {
        let indent = indent as isize;
        while stack.len() > 1 && stack.last().is_some_and(|(i, _)| *i >= indent) {
            attach_top(&mut stack);
        }
        stack.push((indent, Node::new(NodeKind::Statement, text, line)));
    }
    while stack.len() > 1 {
        attach_top(&mut stack);
    }

    stack
        .pop()
        .map(|(_, root)| root)
        .unwrap_or_else(|| Node::new(NodeKind::File, "", 0))
}

fn attach_top(stack: &mut Vec<(isize, Node)>) {
    if let Some((_, node)) = stack.pop() {
        if let Some((_, parent)) = stack.last_mut() {
            parent.children.push(node);
        }
    }
}

/// `(indent, first line, collapsed text)` for every non-blank logical line
fn logical_lines(cleaned: &str, syntax: &Syntax) -> Vec<(usize, usize, String)> {
    let chars: Vec<char> = cleaned.chars().collect();
    let mut out = Vec::new();
    let mut text = String::new();
    let mut start_line = 1;
    let mut indent = 0;
    let mut at_line_start = true;
    let mut depth = 0usize;
    let mut line = 1;
    let mut i = 0;

    let mut emit = |text: &mut String, indent: usize, start_line: usize| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            out.push((indent, start_line, collapsed));
        }
        text.clear();
    };

    while i < chars.len() {
        let c = chars[i];

        if at_line_start {
            if c == ' ' || c == '\t' {
                indent += if c == '\t' { 4 } else { 1 };
                i += 1;
                continue;
            }
            if c == '\n' {
                indent = 0;
                line += 1;
                i += 1;
                continue;
            }
            at_line_start = false;
            start_line = line;
        }

        if let Some(end) = string_end(&chars, i, syntax) {
            for ch in &chars[i..end] {
                if *ch == '\n' {
                    line += 1;
                }
                text.push(*ch);
            }
            i = end;
            continue;
        }

        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }

        if c == '\n' {
            line += 1;
            let continued = depth > 0 || text.trim_end().ends_with('\\');
            if continued {
                if text.trim_end().ends_with('\\') {
                    let trimmed_len = text.trim_end().len() - 1;
                    text.truncate(trimmed_len);
                }
                text.push(' ');
            } else {
                emit(&mut text, indent, start_line);
                indent = 0;
                at_line_start = true;
            }
        } else {
            text.push(c);
        }
        i += 1;
    }
    emit(&mut text, indent, start_line);

    out
}
