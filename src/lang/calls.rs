//! Call statements of the text-parsed languages.
//!
//! A route declaration in Go, JavaScript or Python is almost always one
//! statement of the shape `target = receiver.method(args).method(args)`;
//! [`parse_statement`] splits such a statement into its pieces so that the
//! adapters only have to look at method names and arguments.

use crate::lang::literal::{balanced_group, call_args, CallArg};
use crate::model::ANONYMOUS_HANDLER;
use once_cell::sync::Lazy;
use regex::Regex;

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+)?(?:(?:const|let|var)\s+)?([A-Za-z_$][\w$]*)\s*(?::\s*[\w.\[\], ]+\s*)?(?::=|=)\s*(.+)$")
        .unwrap()
});
static CALL_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z_$][\w$]*(?:\s*\.\s*[A-Za-z_$][\w$]*)*)\s*\(").unwrap());
static CHAINED_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.\s*([A-Za-z_$][\w$]*)\s*\(").unwrap());
static HANDLER_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*$").unwrap());

/// One `.method(args)` link of a call chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCall {
    pub method: String,
    /// Raw text between the parentheses
    pub inner: String,
}

impl ChainCall {
    pub fn args(&self) -> Vec<CallArg> {
        call_args(&self.inner)
    }
}

/// A statement that is a call chain, possibly assigned to a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatement {
    /// Variable the chain's value is assigned to
    pub target: Option<String>,
    /// Dotted expression the first call is made on; empty for plain function calls
    pub receiver: String,
    pub calls: Vec<ChainCall>,
}

impl CallStatement {
    /// Last dotted component of the receiver (`this.app` -> `app`)
    pub fn receiver_name(&self) -> &str {
        self.receiver.rsplit('.').next().unwrap_or(&self.receiver)
    }
}

/// Split `[target =] receiver.m1(a).m2(b)` into its pieces.
///
/// Leading `await`, `new`, `return` and decorator `@` are skipped. Returns
/// `None` when the statement does not start with a call.
pub fn parse_statement(statement: &str) -> Option<CallStatement> {
    let statement = statement.trim().trim_end_matches(';').trim();
    let (target, expr) = match ASSIGNMENT.captures(statement) {
        Some(caps) if !caps[2].starts_with('=') && !caps[2].starts_with('>') => {
            (Some(caps[1].to_string()), caps.get(2).map_or("", |m| m.as_str()))
        }
        _ => (None, statement),
    };
    let (receiver, calls) = parse_chain(expr)?;
    Some(CallStatement {
        target,
        receiver,
        calls,
    })
}

/// Split `receiver.m1(a).m2(b)` into the receiver and its calls
pub fn parse_chain(expr: &str) -> Option<(String, Vec<ChainCall>)> {
    let mut expr = expr.trim().trim_start_matches('@').trim_start();
    for keyword in ["await ", "new ", "return "] {
        expr = expr.strip_prefix(keyword).unwrap_or(expr).trim_start();
    }

    let head = CALL_HEAD.captures(expr)?;
    let dotted: String = head[1].split_whitespace().collect();
    let (receiver, method) = match dotted.rsplit_once('.') {
        Some((receiver, method)) => (receiver.to_string(), method.to_string()),
        None => (String::new(), dotted.clone()),
    };

    let open = head.get(0)?.end() - 1;
    let inner = balanced_group(expr, open)?;
    let mut calls = vec![ChainCall {
        method,
        inner: inner.to_string(),
    }];

    // `(`, the arguments, `)`
    let mut rest = expr[open + inner.len() + 2..].trim_start();
    while let Some(link) = CHAINED_CALL.captures(rest) {
        let open = link.get(0)?.end() - 1;
        let inner = balanced_group(rest, open)?;
        calls.push(ChainCall {
            method: link[1].to_string(),
            inner: inner.to_string(),
        });
        rest = rest[open + inner.len() + 2..].trim_start();
    }

    Some((receiver, calls))
}

/// Handler identifier for a handler argument; inline functions are anonymous
pub fn handler_ident(arg: &str) -> String {
    let arg = arg.trim();
    if HANDLER_NAME.is_match(arg) {
        arg.to_string()
    } else {
        ANONYMOUS_HANDLER.to_string()
    }
}

/// Whether `arg` is a bare (possibly dotted) identifier
pub fn is_identifier(arg: &str) -> bool {
    HANDLER_NAME.is_match(arg.trim())
}
