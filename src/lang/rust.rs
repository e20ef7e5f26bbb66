//! `syn` helpers shared by the Rust adapters: literal/handler extraction, type
//! conversion, serde-aware schema discovery, and the cross-file handler index.

use crate::engine::schema_walker::{FieldDecl, SchemaNode, SchemaWalker, TypeExpr};
use crate::model::{Language, QueryParam, RouteCandidate, ANONYMOUS_HANDLER};
use crate::parser::SourceFile;
use crate::type_mapper;
use log::debug;
use std::collections::HashMap;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, Fields, Item, Lit, LitStr, Token, UseTree};

/// Whether `file` imports the crate `crate_name` through any `use` form
pub fn uses_crate(file: &syn::File, crate_name: &str) -> bool {
    fn check(tree: &UseTree, crate_name: &str) -> bool {
        match tree {
            UseTree::Path(path) => path.ident == crate_name,
            UseTree::Name(name) => name.ident == crate_name,
            UseTree::Rename(rename) => rename.ident == crate_name,
            UseTree::Group(group) => group.items.iter().any(|item| check(item, crate_name)),
            UseTree::Glob(_) => false,
        }
    }

    file.items.iter().any(|item| match item {
        Item::Use(item_use) => check(&item_use.tree, crate_name),
        Item::ExternCrate(extern_crate) => extern_crate.ident == crate_name,
        _ => false,
    })
}

/// 1-based source line of a syntax node
pub fn line_of<T: Spanned>(node: &T) -> usize {
    node.span().start().line
}

pub fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(lit_str) => Some(lit_str.value()),
            _ => None,
        },
        Expr::Group(group) => string_literal(&group.expr),
        Expr::Paren(paren) => string_literal(&paren.expr),
        _ => None,
    }
}

/// `a::b::c` for path expressions
pub fn path_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path_expr) => Some(
            path_expr
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect::<Vec<_>>()
                .join("::"),
        ),
        Expr::Reference(reference) => path_name(&reference.expr),
        _ => None,
    }
}

/// Handler identifier for a handler expression; closures and calls are anonymous
pub fn handler_name(expr: &Expr) -> String {
    path_name(expr).unwrap_or_else(|| ANONYMOUS_HANDLER.to_string())
}

/// Convert a `syn` type into the walker's type expression
pub fn type_expr(ty: &syn::Type) -> Option<TypeExpr> {
    match ty {
        syn::Type::Path(type_path) => {
            let segment = type_path.path.segments.last()?;
            let args = match &segment.arguments {
                syn::PathArguments::AngleBracketed(args) => args
                    .args
                    .iter()
                    .filter_map(|arg| match arg {
                        syn::GenericArgument::Type(inner) => type_expr(inner),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Some(TypeExpr::generic(segment.ident.to_string(), args))
        }
        syn::Type::Reference(reference) => type_expr(&reference.elem),
        syn::Type::Paren(paren) => type_expr(&paren.elem),
        syn::Type::Group(group) => type_expr(&group.elem),
        syn::Type::Slice(slice) => Some(TypeExpr::generic("[]", vec![type_expr(&slice.elem)?])),
        syn::Type::Array(array) => Some(TypeExpr::generic("[]", vec![type_expr(&array.elem)?])),
        syn::Type::Tuple(tuple) => Some(TypeExpr::generic(
            "()",
            tuple.elems.iter().filter_map(type_expr).collect(),
        )),
        _ => None,
    }
}

/// Typed extractors and response of one handler function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerSignature {
    /// `T` of `Path<T>`
    pub path: Option<TypeExpr>,
    /// `T` of `Query<T>`
    pub query: Option<TypeExpr>,
    /// `T` of `Json<T>` or `Form<T>`
    pub body: Option<TypeExpr>,
    pub response: Option<TypeExpr>,
}

impl HandlerSignature {
    pub fn from_signature(sig: &syn::Signature) -> Self {
        let mut signature = HandlerSignature::default();

        for input in &sig.inputs {
            let syn::FnArg::Typed(pat_type) = input else {
                continue;
            };
            let Some(ty) = type_expr(&pat_type.ty) else {
                continue;
            };
            let inner = ty.args.first().cloned();
            match ty.name.as_str() {
                "Path" => signature.path = inner,
                "Query" => signature.query = inner,
                "Json" | "Form" => signature.body = inner,
                _ => {}
            }
        }

        if let syn::ReturnType::Type(_, ty) = &sig.output {
            signature.response = response_type(ty);
        }

        signature
    }
}

/// Body type of a handler's return type: `Json<T>`, `Result<T, _>`, `(StatusCode, Json<T>)`
fn response_type(ty: &syn::Type) -> Option<TypeExpr> {
    match ty {
        syn::Type::ImplTrait(_) => None,
        syn::Type::Tuple(tuple) => tuple.elems.iter().find_map(|elem| {
            let expr = type_expr(elem)?;
            (expr.name == "Json").then(|| expr.args.first().cloned()).flatten()
        }),
        _ => {
            let expr = type_expr(ty)?;
            unwrap_response(expr)
        }
    }
}

fn unwrap_response(expr: TypeExpr) -> Option<TypeExpr> {
    match expr.name.as_str() {
        "Json" => expr.args.into_iter().next(),
        "Result" => expr.args.into_iter().next().and_then(unwrap_response),
        "()" if expr.args.is_empty() => None,
        "()" => expr
            .args
            .into_iter()
            .find(|e| e.name == "Json")
            .and_then(|e| e.args.into_iter().next()),
        "StatusCode" | "HttpResponse" | "Response" | "Redirect" | "Responder" => None,
        _ => Some(expr),
    }
}

/// Handler signatures and record fields collected from every Rust file of a project.
///
/// Built once before per-file extraction so that a route declared in one file
/// can be typed from a handler defined in another.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    handlers: HashMap<String, HandlerSignature>,
    records: HashMap<String, Vec<FieldDecl>>,
}

impl ProjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(files: &[SourceFile]) -> Self {
        let mut index = ProjectIndex::new();
        for file in files {
            if let Some(ast) = file.syntax() {
                index.add_items(&ast.items);
            }
        }
        debug!(
            "Indexed {} handler signatures and {} records",
            index.handlers.len(),
            index.records.len()
        );
        index
    }

    fn add_items(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Fn(item_fn) => {
                    self.handlers
                        .entry(item_fn.sig.ident.to_string())
                        .or_insert_with(|| HandlerSignature::from_signature(&item_fn.sig));
                }
                Item::Impl(item_impl) => {
                    for impl_item in &item_impl.items {
                        if let syn::ImplItem::Fn(method) = impl_item {
                            self.handlers
                                .entry(method.sig.ident.to_string())
                                .or_insert_with(|| HandlerSignature::from_signature(&method.sig));
                        }
                    }
                }
                Item::Struct(item_struct) => {
                    if let Some(fields) = record_fields(item_struct) {
                        self.records
                            .entry(item_struct.ident.to_string())
                            .or_insert(fields);
                    }
                }
                Item::Mod(item_mod) => {
                    if let Some((_, items)) = &item_mod.content {
                        self.add_items(items);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerSignature> {
        self.handlers.get(type_mapper::base_name(name))
    }

    pub fn record(&self, name: &str) -> Option<&[FieldDecl]> {
        self.records.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.records.is_empty()
    }

    /// Attach parameter types, query parameters, body and response from the
    /// candidate's handler signature, when the handler is known.
    pub fn enrich(&self, mut candidate: RouteCandidate) -> RouteCandidate {
        let Some(signature) = candidate.handler.as_deref().and_then(|h| self.handler(h)) else {
            return candidate;
        };
        let walker = SchemaWalker::new(Language::Rust);

        if let Some(path) = &signature.path {
            if path.name == "()" {
                for element in &path.args {
                    candidate = candidate.with_param_hint(None, walker.walk_type(element).0);
                }
            } else if let Some(fields) = self.record(path.base_name()) {
                for field in fields {
                    candidate = candidate
                        .with_param_hint(Some(field.name.clone()), walker.walk_type(&field.ty).0);
                }
            } else {
                candidate = candidate.with_param_hint(None, walker.walk_type(path).0);
            }
        }

        if let Some(fields) = signature.query.as_ref().and_then(|q| self.record(q.base_name())) {
            for field in fields {
                let (schema, optional) = walker.walk_type(&field.ty);
                candidate = candidate.with_query(QueryParam::new(
                    field.name.as_str(),
                    !optional && !field.optional,
                    schema,
                ));
            }
        }

        if candidate.request_body.is_none() {
            let body = signature.body.as_ref().map(|b| walker.walk_type(b).0);
            candidate = candidate.with_request_body(body);
        }
        if candidate.response.is_none() {
            let response = signature.response.as_ref().map(|r| walker.walk_type(r).0);
            candidate = candidate.with_response(response);
        }

        candidate
    }
}

/// Serde attributes relevant to the serialized shape.
#[derive(Debug, Clone, Default)]
struct SerdeAttributes {
    rename: Option<String>,
    rename_all: Option<String>,
    skip: bool,
    default: bool,
    flatten: bool,
}

fn serde_attributes(attrs: &[Attribute]) -> SerdeAttributes {
    let mut serde = SerdeAttributes::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") || meta.path.is_ident("rename_all") {
                let is_all = meta.path.is_ident("rename_all");
                let mut value = None;
                if meta.input.peek(Token![=]) {
                    let lit: LitStr = meta.value()?.parse()?;
                    value = Some(lit.value());
                } else {
                    // rename(serialize = "..", deserialize = "..")
                    meta.parse_nested_meta(|inner| {
                        let lit: LitStr = inner.value()?.parse()?;
                        if inner.path.is_ident("serialize") {
                            value = Some(lit.value());
                        }
                        Ok(())
                    })?;
                }
                if is_all {
                    serde.rename_all = value;
                } else {
                    serde.rename = value;
                }
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                serde.skip = true;
            } else if meta.path.is_ident("flatten") {
                serde.flatten = true;
            } else if meta.path.is_ident("default") {
                serde.default = true;
                if meta.input.peek(Token![=]) {
                    let _: LitStr = meta.value()?.parse()?;
                }
            } else if meta.input.peek(Token![=]) {
                let _: Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
        if let Err(e) = parsed {
            debug!("Partially understood serde attribute: {}", e);
        }
    }

    serde
}

fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            syn::Meta::NameValue(nv) => string_literal(&nv.value),
            _ => None,
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    (!lines.is_empty()).then(|| lines.join(" "))
}

/// Apply a serde `rename_all` rule to a field or variant name
pub fn rename_all(rule: &str, name: &str) -> String {
    let words = split_words(name);
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let capitalized = || -> Vec<String> {
        lower
            .iter()
            .map(|w| {
                let mut chars = w.chars();
                chars
                    .next()
                    .map(|f| f.to_uppercase().chain(chars).collect())
                    .unwrap_or_default()
            })
            .collect()
    };

    match rule {
        "lowercase" => lower.concat(),
        "UPPERCASE" => lower.concat().to_uppercase(),
        "PascalCase" => capitalized().concat(),
        "camelCase" => {
            let caps = capitalized();
            match lower.first() {
                Some(first) => format!("{}{}", first, caps[1..].concat()),
                None => String::new(),
            }
        }
        "snake_case" => lower.join("_"),
        "SCREAMING_SNAKE_CASE" => lower.join("_").to_uppercase(),
        "kebab-case" => lower.join("-"),
        "SCREAMING-KEBAB-CASE" => lower.join("-").to_uppercase(),
        _ => name.to_string(),
    }
}

fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Serialized fields of a struct with named fields
fn record_fields(item: &syn::ItemStruct) -> Option<Vec<FieldDecl>> {
    let Fields::Named(named) = &item.fields else {
        return None;
    };
    let container = serde_attributes(&item.attrs);

    let fields = named
        .named
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?.to_string();
            let serde = serde_attributes(&field.attrs);
            if serde.skip {
                return None;
            }
            if serde.flatten {
                debug!("Flattened field {}.{} is not expanded", item.ident, ident);
                return None;
            }
            let ident = ident.trim_start_matches("r#").to_string();
            let name = serde.rename.clone().unwrap_or_else(|| match &container.rename_all {
                Some(rule) => rename_all(rule, &ident),
                None => ident.clone(),
            });
            let mut decl = FieldDecl::new(name, type_expr(&field.ty)?)
                .optional(serde.default || container.default);
            decl.description = doc_comment(&field.attrs);
            Some(decl)
        })
        .collect();

    Some(fields)
}

/// Named schemas declared in a Rust file: structs and enums, recursively through inline modules
pub fn collect_schemas(file: &syn::File) -> Vec<(String, SchemaNode)> {
    let walker = SchemaWalker::new(Language::Rust);
    let mut schemas = Vec::new();
    collect_from_items(&file.items, &walker, &mut schemas);
    schemas
}

fn collect_from_items(items: &[Item], walker: &SchemaWalker, out: &mut Vec<(String, SchemaNode)>) {
    for item in items {
        match item {
            Item::Struct(item_struct) => {
                let name = item_struct.ident.to_string();
                let description = doc_comment(&item_struct.attrs);
                let schema = match &item_struct.fields {
                    Fields::Named(_) => record_fields(item_struct)
                        .map(|fields| walker.walk_fields(&fields))
                        .unwrap_or_else(SchemaNode::any),
                    // newtype: `struct UserId(u64)`
                    Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => unnamed
                        .unnamed
                        .first()
                        .and_then(|f| type_expr(&f.ty))
                        .map(|ty| walker.walk_type(&ty).0)
                        .unwrap_or_else(SchemaNode::any),
                    _ => SchemaNode::any(),
                };
                out.push((name, schema.with_description(description)));
            }
            Item::Enum(item_enum) => {
                let container = serde_attributes(&item_enum.attrs);
                let unit_only = item_enum
                    .variants
                    .iter()
                    .all(|v| matches!(v.fields, Fields::Unit));
                let schema = if unit_only {
                    let values = item_enum
                        .variants
                        .iter()
                        .filter(|v| !serde_attributes(&v.attrs).skip)
                        .map(|v| {
                            let serde = serde_attributes(&v.attrs);
                            let ident = v.ident.to_string();
                            serde.rename.unwrap_or_else(|| match &container.rename_all {
                                Some(rule) => rename_all(rule, &ident),
                                None => ident,
                            })
                        })
                        .collect();
                    SchemaNode::string_enum(values)
                } else {
                    SchemaNode::any()
                };
                out.push((
                    item_enum.ident.to_string(),
                    schema.with_description(doc_comment(&item_enum.attrs)),
                ));
            }
            Item::Mod(item_mod) => {
                if let Some((_, items)) = &item_mod.content {
                    collect_from_items(items, walker, out);
                }
            }
            _ => {}
        }
    }
}
