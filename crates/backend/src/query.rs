//! Table-scoped query builder for the REST API.
//!
//! Filters are method-chained and rendered as query parameters
//! (`?region=eq.India&value=gte.100&order=created_at.desc`). Exact row counts
//! are requested with `Prefer: count=exact` and read back from the
//! `Content-Range` header.

use std::fmt::Display;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::client::BackendClient;
use crate::error::BackendError;

/// Sort direction for [`TableQuery::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// A pending query against one table.
///
/// Built with [`BackendClient::from`], consumed by one of the terminal
/// methods (`fetch`, `fetch_page`, `insert`, `upsert`, `update`, `delete`,
/// `count`).
#[derive(Debug, Clone)]
#[must_use = "queries do nothing until a terminal method is awaited"]
pub struct TableQuery {
    client: BackendClient,
    table: String,
    params: Vec<(String, String)>,
    orders: Vec<String>,
    offset: Option<u64>,
    limit: Option<u64>,
    token: Option<String>,
}

impl TableQuery {
    pub(crate) fn new(client: BackendClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            params: Vec::new(),
            orders: Vec::new(),
            offset: None,
            limit: None,
            token: None,
        }
    }

    /// Run the query as a signed-in user instead of with the server key.
    pub fn as_user(mut self, access_token: impl Into<String>) -> Self {
        self.token = Some(access_token.into());
        self
    }

    /// Columns to return (`*` when never called).
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    fn filter(mut self, column: &str, op: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("{op}.{value}")));
        self
    }

    /// `column = value`
    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    /// `column <> value`
    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "neq", value)
    }

    /// `column > value`
    pub fn gt(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gt", value)
    }

    /// `column >= value`
    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    /// `column < value`
    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lt", value)
    }

    /// `column <= value`
    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lte", value)
    }

    /// Case-insensitive substring match.
    pub fn ilike(self, column: &str, needle: &str) -> Self {
        self.filter(column, "ilike", contains_pattern(needle))
    }

    /// Case-insensitive equality.
    pub fn ilike_exact(self, column: &str, value: &str) -> Self {
        self.filter(column, "ilike", escape_like(value))
    }

    /// `column IN (values...)`
    pub fn in_list<V: Display>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let list = values
            .into_iter()
            .map(|v| quote_value(&v.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, "in", format!("({list})"))
    }

    /// Disjunction of already-rendered conditions (`title.ilike.*x*`).
    ///
    /// Use [`or_ilike`] to build a case-insensitive search across columns.
    pub fn or(mut self, conditions: &[String]) -> Self {
        self.params
            .push(("or".to_string(), format!("({})", conditions.join(","))));
        self
    }

    /// Add a sort key. Multiple calls sort by each key in turn.
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.orders
            .push(format!("{column}.{}", direction.as_str()));
        self
    }

    /// Inclusive row range, zero-based (`range(0, 9)` returns 10 rows).
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    /// Maximum number of rows.
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn query_params(&self) -> Vec<(String, String)> {
        let mut params = self.params.clone();
        if !self.orders.is_empty() {
            params.push(("order".to_string(), self.orders.join(",")));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    fn build(&self, method: Method) -> Result<reqwest::RequestBuilder, BackendError> {
        let url = self.client.rest_url(&self.table)?;
        let builder = match &self.token {
            Some(token) => self.client.request_as(method, url, token),
            None => self.client.request(method, url),
        };
        Ok(builder.query(&self.query_params()))
    }

    // =========================================================================
    // Terminal methods
    // =========================================================================

    /// Fetch all matching rows.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, BackendError> {
        let response = self.client.send(self.build(Method::GET)?).await?;
        BackendClient::json(response).await
    }

    /// Fetch matching rows plus the exact total count ignoring the range.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn fetch_page<T: DeserializeOwned>(self) -> Result<(Vec<T>, u64), BackendError> {
        let request = self.build(Method::GET)?.header("Prefer", "count=exact");
        let response = self.client.send(request).await?;
        let total = response
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows: Vec<T> = BackendClient::json(response).await?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    /// Fetch at most one row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, BackendError> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// Exact number of matching rows.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport or status failure, or if the
    /// backend omits the count.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn count(self) -> Result<u64, BackendError> {
        let request = self.build(Method::HEAD)?.header("Prefer", "count=exact");
        let response = self.client.send(request).await?;
        response
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| BackendError::Api {
                status: response.status().as_u16(),
                message: "missing Content-Range count".to_string(),
            })
    }

    /// Insert one or more rows and return them as stored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Conflict` on a unique violation, or any other
    /// transport, status or parse failure.
    #[instrument(skip(self, body), fields(table = %self.table))]
    pub async fn insert<B, T>(self, body: &B) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .build(Method::POST)?
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.client.send(request).await?;
        BackendClient::json(response).await
    }

    /// Insert, merging into the existing row on a conflict over `on_conflict`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    #[instrument(skip(self, body), fields(table = %self.table))]
    pub async fn upsert<B, T>(mut self, body: &B, on_conflict: &str) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.params
            .push(("on_conflict".to_string(), on_conflict.to_string()));
        let request = self
            .build(Method::POST)?
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(body);
        let response = self.client.send(request).await?;
        BackendClient::json(response).await
    }

    /// Patch every matching row and return them as stored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    #[instrument(skip(self, body), fields(table = %self.table))]
    pub async fn update<B, T>(self, body: &B) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .build(Method::PATCH)?
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.client.send(request).await?;
        BackendClient::json(response).await
    }

    /// Delete every matching row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport or status failure.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn delete(self) -> Result<(), BackendError> {
        self.client.send(self.build(Method::DELETE)?).await?;
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Characters with meaning inside `in.(...)` and `or=(...)` lists.
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\', ' '];

/// Quote a value for use inside a list filter if it contains reserved characters.
#[must_use]
pub fn quote_value(value: &str) -> String {
    if value.contains(RESERVED) {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

/// `value` as a literal `LIKE` pattern. `*` is dropped; `%`, `_` and
/// backslash are escaped.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => {}
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `*needle*` matching `needle` literally.
fn contains_pattern(needle: &str) -> String {
    format!("*{}*", escape_like(needle))
}

/// Conditions for a case-insensitive substring search across columns,
/// ready for [`TableQuery::or`].
#[must_use]
pub fn or_ilike(columns: &[&str], needle: &str) -> Vec<String> {
    let pattern = quote_value(&contains_pattern(needle));
    columns
        .iter()
        .map(|column| format!("{column}.ilike.{pattern}"))
        .collect()
}

/// Total row count from a `Content-Range` header (`0-9/42`, `*/0`).
#[must_use]
pub fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::config::BackendConfig;

    fn query(table: &str) -> TableQuery {
        let client = BackendClient::new(&BackendConfig {
            url: Url::parse("https://backend.test").unwrap(),
            anon_key: SecretString::from("anon"),
            service_key: None,
            storage_bucket: "images".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        client.from(table)
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn test_quote_value() {
        assert_eq!(quote_value("India"), "India");
        assert_eq!(quote_value("Very Rare"), "\"Very Rare\"");
        assert_eq!(quote_value("a,b"), "\"a,b\"");
        assert_eq!(quote_value("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_or_ilike_strips_wildcards() {
        let conditions = or_ilike(&["title", "region"], "gold*eagle");
        assert_eq!(
            conditions,
            vec!["title.ilike.*goldeagle*", "region.ilike.*goldeagle*"]
        );

        let conditions = or_ilike(&["title"], "double eagle");
        assert_eq!(conditions, vec!["title.ilike.\"*double eagle*\""]);
    }

    #[test]
    fn test_like_wildcards_are_literal() {
        assert_eq!(escape_like("Straits_Settlements"), "Straits\\_Settlements");
        assert_eq!(escape_like("100%*"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");

        let params = query("coin_listings")
            .ilike_exact("region", "Straits_Settlements")
            .query_params();
        assert_eq!(
            params,
            vec![(
                "region".to_string(),
                "ilike.Straits\\_Settlements".to_string()
            )]
        );

        let conditions = or_ilike(&["title"], "5_rupee");
        assert_eq!(conditions, vec!["title.ilike.\"*5\\\\_rupee*\""]);
    }

    #[test]
    fn test_query_params() {
        let q = query("coin_listings")
            .select("*")
            .eq("region", "India")
            .gt("stock_quantity", 0)
            .in_list("rarity", ["Rare", "Very Rare"])
            .order("created_at", Direction::Descending)
            .range(10, 19);

        let params = q.query_params();
        assert!(params.contains(&("region".to_string(), "eq.India".to_string())));
        assert!(params.contains(&("stock_quantity".to_string(), "gt.0".to_string())));
        assert!(params.contains(&(
            "rarity".to_string(),
            "in.(Rare,\"Very Rare\")".to_string()
        )));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("offset".to_string(), "10".to_string())));
        assert!(params.contains(&("limit".to_string(), "10".to_string())));
    }
}
