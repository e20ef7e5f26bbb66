use crate::engine::combinator::{self, CombinatorExpr};
use crate::engine::schema_walker::SchemaNode;
use crate::error::Error;
use crate::extractor::{FileExtraction, FrameworkExtractor};
use crate::lang::records::{haskell_records, to_schemas};
use crate::lang::rust::ProjectIndex;
use crate::lang::tokens::{indent_tree, HASKELL};
use crate::model::{Diagnostic, Framework, Language, SourceLocation};
use crate::parser::SourceFile;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static SERVANT_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^import\s+(?:qualified\s+)?Servant\b").unwrap());
static TYPE_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^type\s+([A-Z][\w']*)(?:\s+[a-z_][\w']*)*\s*=\s*(.*)$").unwrap()
});

/// Servant route extractor.
///
/// Every `type X = ...` alias is parsed as a combinator expression. Aliases
/// used inside other aliases are expanded where they are used; the rest are
/// the API roots whose routes are reported.
pub struct ServantExtractor;

/// One parsed `type` alias of a module
struct Alias {
    name: String,
    line: usize,
    expr: CombinatorExpr,
}

impl FrameworkExtractor for ServantExtractor {
    fn framework(&self) -> Framework {
        Framework::Servant
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Haskell]
    }

    fn probe(&self, file: &SourceFile) -> bool {
        SERVANT_IMPORT.is_match(&file.source)
    }

    fn extract_routes(&self, file: &SourceFile, _index: &ProjectIndex) -> FileExtraction {
        let tree = indent_tree(&file.source, &HASKELL);
        let mut extraction = FileExtraction::default();
        let mut aliases: Vec<Alias> = Vec::new();

        for node in &tree.children {
            let text = node.full_text();
            let Some(caps) = TYPE_ALIAS.captures(&text) else {
                continue;
            };
            let name = caps[1].to_string();
            match combinator::parse(&caps[2]) {
                Ok(expr) => aliases.push(Alias {
                    name,
                    line: node.line,
                    expr,
                }),
                Err(err) => extraction.diagnostics.push(Diagnostic::new(
                    SourceLocation::new(&file.path, node.line),
                    format!("type {}: {}", name, Error::from(err)),
                )),
            }
        }

        let referenced: HashSet<String> = aliases
            .iter()
            .flat_map(|alias| {
                combinator::referenced_aliases(&alias.expr)
                    .into_iter()
                    .filter(move |name| *name != alias.name)
            })
            .collect();

        let mut table: HashMap<String, CombinatorExpr> = HashMap::new();
        for alias in &aliases {
            table
                .entry(alias.name.clone())
                .or_insert_with(|| alias.expr.clone());
        }

        for alias in aliases.iter().filter(|a| !referenced.contains(&a.name)) {
            let location = SourceLocation::new(&file.path, alias.line);
            let candidates = combinator::flatten(&alias.expr, &table, &location);
            debug!("type {} declares {} routes", alias.name, candidates.len());
            extraction.candidates.extend(candidates);
        }

        extraction
    }

    fn extract_schemas(&self, file: &SourceFile) -> Vec<(String, SchemaNode)> {
        to_schemas(
            haskell_records(&indent_tree(&file.source, &HASKELL)),
            Language::Haskell,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::canonicalize::{canonicalize, CanonicalizeOptions};
    use crate::model::{HttpMethod, ParameterLocation, StatusVariant};
    use pretty_assertions::assert_eq;

    fn module(code: &str) -> SourceFile {
        SourceFile::from_source("Api.hs", Language::Haskell, code.to_string()).unwrap()
    }

    fn summary(code: &str) -> Vec<(HttpMethod, String)> {
        let extraction = ServantExtractor.extract_routes(&module(code), &ProjectIndex::new());
        canonicalize(extraction.candidates, &CanonicalizeOptions::default())
            .iter()
            .map(|r| (r.method, r.path_string()))
            .collect()
    }

    #[test]
    fn test_grouped_alternatives_share_the_prefix() {
        let code = r#"
import Servant

type API = "items" :> ( Get '[JSON] [Item] :<|> Capture "id" Int :> Delete '[JSON] NoContent )
"#;

        assert_eq!(
            summary(code),
            vec![
                (HttpMethod::Get, "/items".to_string()),
                (HttpMethod::Delete, "/items/{id}".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_ascii_type_names() {
        let code = r#"
import Servant

type Größe = "x" :> Get '[JSON] Maß :<|> "b" :> Delete '[JSON] NoContent
"#;

        assert_eq!(
            summary(code),
            vec![
                (HttpMethod::Get, "/x".to_string()),
                (HttpMethod::Delete, "/b".to_string()),
            ]
        );
    }

    #[test]
    fn test_referenced_aliases_are_not_roots() {
        let code = r#"
{-# LANGUAGE DataKinds #-}
module Api where

import Servant

type UsersAPI =
       Get '[JSON] [User]
  :<|> ReqBody '[JSON] NewUser :> PostCreated '[JSON] User
  :<|> Capture "userId" Integer :> Get '[JSON] User

type API = "api" :> "users" :> UsersAPI
      :<|> "health" :> QueryParam "verbose" Bool :> Get '[JSON] Text

api :: Proxy API
api = Proxy
"#;

        assert_eq!(
            summary(code),
            vec![
                (HttpMethod::Get, "/api/users".to_string()),
                (HttpMethod::Post, "/api/users".to_string()),
                (HttpMethod::Get, "/api/users/{userId}".to_string()),
                (HttpMethod::Get, "/health".to_string()),
            ]
        );

        let extraction = ServantExtractor.extract_routes(&module(code), &ProjectIndex::new());
        let routes = canonicalize(extraction.candidates, &CanonicalizeOptions::default());
        assert_eq!(routes[0].location.line, 12);
        assert_eq!(routes[1].request_body, Some(SchemaNode::reference("NewUser")));
        assert_eq!(routes[1].status, Some(StatusVariant::Created));
        assert_eq!(
            routes[2].parameters[0].schema,
            SchemaNode::primitive("integer", Some("int64"))
        );
        assert_eq!(routes[3].parameters[0].location, ParameterLocation::Query);
        assert!(!routes[3].parameters[0].required);
    }

    #[test]
    fn test_malformed_alias_becomes_a_diagnostic() {
        let code = "import Servant\n\ntype Broken = \"a\" :> Get '[JSON] Int)\ntype Fine = \"b\" :> Get '[JSON] Int\n";
        let extraction = ServantExtractor.extract_routes(&module(code), &ProjectIndex::new());

        assert_eq!(extraction.candidates.len(), 1);
        assert_eq!(extraction.diagnostics.len(), 1);
        assert_eq!(extraction.diagnostics[0].location.line, 3);
        assert!(extraction.diagnostics[0]
            .message
            .starts_with("type Broken: Malformed combinator expression: unbalanced parentheses"));
    }

    #[test]
    fn test_probe_and_records() {
        assert!(ServantExtractor.probe(&module("module Main where\nimport Servant.API\n")));
        assert!(ServantExtractor.probe(&module("import qualified Servant as S\n")));
        assert!(!ServantExtractor.probe(&module("import Data.Text\n")));

        let file = module("data User = User\n  { userId :: Int\n  , userName :: Maybe Text\n  } deriving (Generic)\n");
        let schemas = ServantExtractor.extract_schemas(&file);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].0, "User");
        assert_eq!(schemas[0].1.required(), &["userId".to_string()]);
    }
}
