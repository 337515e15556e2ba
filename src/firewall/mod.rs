//! GraphQL query firewall in front of the attestation indexer.
//!
//! Only bounded, read-only queries whose root fields are on the allow-list
//! are relayed. Validation happens before any network call.

mod cache;

pub use cache::ResponseCache;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::indexer::AttestationIndexer;

/// Maximum accepted query length, in characters.
pub const MAX_QUERY_LENGTH: usize = 4000;

/// Maximum brace nesting depth.
pub const MAX_QUERY_DEPTH: usize = 5;

/// Root fields a relayed query may select.
pub const ALLOWED_ROOT_FIELDS: [&str; 4] = ["attestation", "attestations", "schema", "schemas"];

const FORBIDDEN_OPERATIONS: [&str; 2] = ["mutation", "subscription"];

/// Why a query was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRejection {
    TooLong { length: usize },
    Empty,
    ForbiddenOperation(&'static str),
    TooDeep,
    UnbalancedBraces,
    NoFields,
    FieldNotAllowed(String),
}

impl std::fmt::Display for QueryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryRejection::TooLong { length } => write!(
                f,
                "Query is {} characters long, maximum is {}",
                length, MAX_QUERY_LENGTH
            ),
            QueryRejection::Empty => write!(f, "Query is empty"),
            QueryRejection::ForbiddenOperation(op) => {
                write!(f, "Only read-only queries are allowed, found '{}'", op)
            }
            QueryRejection::TooDeep => {
                write!(f, "Query nesting exceeds depth {}", MAX_QUERY_DEPTH)
            }
            QueryRejection::UnbalancedBraces => write!(f, "Query has unbalanced braces"),
            QueryRejection::NoFields => write!(f, "Query selects no fields"),
            QueryRejection::FieldNotAllowed(field) => {
                write!(f, "Root field '{}' is not allowed", field)
            }
        }
    }
}

impl std::error::Error for QueryRejection {}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidQuery(rejection.to_string())
    }
}

/// Validate a client-supplied GraphQL query. Rejects on the first failed check.
pub fn validate_query(query: &str) -> Result<(), QueryRejection> {
    let length = query.chars().count();
    if length > MAX_QUERY_LENGTH {
        return Err(QueryRejection::TooLong { length });
    }

    let text = collapse_whitespace(&strip_comments(query));
    if text.is_empty() {
        return Err(QueryRejection::Empty);
    }

    check_operation_kind(&text)?;
    check_brace_depth(&text)?;

    let fields = root_fields(&text);
    if fields.is_empty() {
        return Err(QueryRejection::NoFields);
    }
    if let Some(field) = fields
        .into_iter()
        .find(|f| !ALLOWED_ROOT_FIELDS.contains(&f.as_str()))
    {
        return Err(QueryRejection::FieldNotAllowed(field));
    }

    Ok(())
}

/// Boolean form of [`validate_query`].
#[cfg(test)]
pub fn is_allowed_eas_query(query: &str) -> bool {
    validate_query(query).is_ok()
}

fn strip_comments(query: &str) -> String {
    query
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn check_operation_kind(text: &str) -> Result<(), QueryRejection> {
    let lower = text.to_ascii_lowercase();
    let head = &lower[..lower.find('{').unwrap_or(lower.len())];
    for op in FORBIDDEN_OPERATIONS {
        if lower.starts_with(op) || head.contains(op) {
            return Err(QueryRejection::ForbiddenOperation(op));
        }
    }

    // Later operations of a multi-operation document
    let chars: Vec<char> = lower.chars().collect();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '"' => {
                i = skip_string(&chars, i);
                continue;
            }
            '{' | '(' => depth += 1,
            '}' | ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && is_name_start(c) => {
                let (name, next) = read_name(&chars, i);
                if let Some(op) = FORBIDDEN_OPERATIONS.iter().find(|op| **op == name) {
                    return Err(QueryRejection::ForbiddenOperation(*op));
                }
                i = next;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

fn check_brace_depth(text: &str) -> Result<(), QueryRejection> {
    let mut depth: usize = 0;
    for c in text.chars() {
        match c {
            '{' => {
                depth += 1;
                if depth > MAX_QUERY_DEPTH {
                    return Err(QueryRejection::TooDeep);
                }
            }
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(QueryRejection::UnbalancedBraces)?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(QueryRejection::UnbalancedBraces);
    }
    Ok(())
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn read_name(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_name_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }
    i
}

/// Index just past the string literal opening at `i`.
fn skip_string(chars: &[char], mut i: usize) -> usize {
    i += 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

/// Names selected directly inside any top-level selection set, with
/// `alias: field` resolved to `field`. Argument lists are skipped. Fragment
/// spreads are reported as `...` so they never pass the allow-list.
fn root_fields(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut fields = Vec::new();
    let mut braces = 0usize;
    let mut parens = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                i = skip_string(&chars, i);
                continue;
            }
            '{' => braces += 1,
            '}' => braces = braces.saturating_sub(1),
            '(' => parens += 1,
            ')' => parens = parens.saturating_sub(1),
            _ if braces == 1 && parens == 0 => {
                if c == '@' {
                    // Directive name is not a field
                    let (_, next) = read_name(&chars, i + 1);
                    i = next;
                    continue;
                }
                if c == '.' {
                    fields.push("...".to_string());
                    while i < chars.len() && chars[i] == '.' {
                        i += 1;
                    }
                    continue;
                }
                if is_name_start(c) {
                    let (name, next) = read_name(&chars, i);
                    let after = skip_spaces(&chars, next);
                    if after < chars.len() && chars[after] == ':' {
                        let (field, next) = read_name(&chars, skip_spaces(&chars, after + 1));
                        fields.push(field);
                        i = next;
                    } else {
                        fields.push(name);
                        i = next;
                    }
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    fields
}

/// Request body accepted by the proxy endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

/// Validates queries and relays accepted ones to the indexer through a response cache.
pub struct QueryFirewall {
    indexer: Arc<dyn AttestationIndexer>,
    cache: ResponseCache,
}

impl QueryFirewall {
    pub fn new(indexer: Arc<dyn AttestationIndexer>) -> Self {
        Self::with_cache(indexer, ResponseCache::new())
    }

    pub fn with_cache(indexer: Arc<dyn AttestationIndexer>, cache: ResponseCache) -> Self {
        Self { indexer, cache }
    }

    /// Validate `request` and return the indexer's raw JSON response.
    ///
    /// Rejected queries never leave the process.
    pub async fn proxy(&self, request: &ProxyRequest) -> Result<Value, AppError> {
        if let Err(rejection) = validate_query(&request.query) {
            tracing::warn!("Rejected indexer query: {}", rejection);
            return Err(rejection.into());
        }

        let body = serde_json::to_string(request)?;
        if let Some(cached) = self.cache.get(&body) {
            tracing::debug!("Serving indexer query from cache");
            return Ok(cached);
        }

        let response = self.indexer.execute_raw(&body).await?;
        self.cache.insert(body, response.clone());
        Ok(response)
    }
}
