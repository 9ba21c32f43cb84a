use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{RowStore, SelectQuery};
use crate::error::{RowStoreError, SqlShimError};
use crate::results::Row;
use crate::statement::{ColumnValues, OrderBy};
use crate::types::Scalar;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a PostgREST-style hosted table API.
#[derive(Debug, Clone)]
pub struct RestOptions {
    /// Root of the table API, e.g. `https://project.example.co/rest/v1`.
    pub base_url: String,
    /// Sent both as the `apikey` header and as a bearer token.
    pub api_key: String,
    /// Optional schema profile (`Accept-Profile` / `Content-Profile`).
    pub schema: Option<String>,
    pub timeout: Duration,
}

impl RestOptions {
    #[must_use]
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            schema: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Fluent builder for [`RestOptions`]; validates on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RestOptionsBuilder {
    opts: RestOptions,
}

impl RestOptionsBuilder {
    #[must_use]
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            opts: RestOptions::new(base_url, api_key),
        }
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.opts.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    #[must_use]
    pub fn finish(self) -> RestOptions {
        self.opts
    }

    /// Validate the options and build the HTTP client.
    ///
    /// # Errors
    /// Returns `SqlShimError::ConfigError` for an empty or non-HTTP base URL, or if the client
    /// cannot be constructed.
    pub fn build(self) -> Result<RestRowStore, SqlShimError> {
        RestRowStore::new(self.finish())
    }
}

/// Row store that talks to a hosted PostgREST-compatible endpoint.
///
/// Each trait call is one HTTP request. Mutations ask for `return=representation`, so update and
/// delete counts are the number of rows the server sends back.
#[derive(Debug, Clone)]
pub struct RestRowStore {
    base_url: String,
    api_key: String,
    schema: Option<String>,
    client: Client,
}

impl RestRowStore {
    #[must_use]
    pub fn builder(base_url: String, api_key: String) -> RestOptionsBuilder {
        RestOptionsBuilder::new(base_url, api_key)
    }

    /// Build a store from validated options.
    ///
    /// # Errors
    /// Returns `SqlShimError::ConfigError` if the options are invalid.
    pub fn new(opts: RestOptions) -> Result<Self, SqlShimError> {
        let base_url = opts.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SqlShimError::ConfigError(
                "REST base URL must not be empty".to_string(),
            ));
        }
        let parsed = Url::parse(&base_url)
            .map_err(|e| SqlShimError::ConfigError(format!("Invalid REST base URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SqlShimError::ConfigError(format!(
                "REST base URL must be http or https, got `{}`",
                parsed.scheme()
            )));
        }
        let client = Client::builder()
            .timeout(opts.timeout)
            .build()
            .map_err(|e| SqlShimError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url,
            api_key: opts.api_key,
            schema: opts.schema,
            client,
        })
    }

    /// `<base>/<table>?<params>`; the table is always exactly one percent-encoded path segment.
    fn table_url(&self, table: &str, params: &[(String, String)]) -> Result<Url, RowStoreError> {
        if matches!(table.trim(), "" | "." | "..") {
            return Err(RowStoreError::Rejected {
                status: 400,
                message: format!("`{table}` is not a usable table name"),
            });
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RowStoreError::Other(format!("Invalid REST base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| RowStoreError::Other("REST base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(table);
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method.clone(), url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key));
        if let Some(schema) = &self.schema {
            let header = if method == Method::GET {
                "Accept-Profile"
            } else {
                "Content-Profile"
            };
            builder = builder.header(header, schema);
        }
        if method != Method::GET {
            builder = builder.header("Prefer", "return=representation");
        }
        builder
    }

    async fn send_for_rows(&self, builder: RequestBuilder) -> Result<Vec<Row>, RowStoreError> {
        let response = builder.send().await?;
        let body = check_status(response).await?;
        rows_from_json(&body)
    }
}

async fn check_status(response: Response) -> Result<JsonValue, RowStoreError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(RowStoreError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    // 204 No Content carries no rows.
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| RowStoreError::Other(format!("Failed to parse REST response: {e}")))
}

/// Render a scalar the way PostgREST filter operands expect.
fn filter_operand(value: &Scalar) -> String {
    match value {
        Scalar::Null => "is.null".to_string(),
        other => format!("eq.{other}"),
    }
}

/// `col=eq.val` pairs, one per equality filter.
pub(crate) fn filter_params(filters: &ColumnValues) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(column, value)| (column.to_string(), filter_operand(value)))
        .collect()
}

fn order_param(order_by: &[OrderBy]) -> String {
    order_by
        .iter()
        .map(|key| {
            format!(
                "{}.{}",
                key.column,
                if key.descending { "desc" } else { "asc" }
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Query string for a read: projection, filters, ordering and limit.
pub(crate) fn select_params(query: &SelectQuery<'_>) -> Vec<(String, String)> {
    let select = query.column_list().map_or_else(|| "*".to_string(), |c| c.join(","));
    let mut params = vec![("select".to_string(), select)];
    params.extend(filter_params(query.filters));
    if !query.order_by.is_empty() {
        params.push(("order".to_string(), order_param(query.order_by)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Decode a JSON array of objects into rows.
pub(crate) fn rows_from_json(body: &JsonValue) -> Result<Vec<Row>, RowStoreError> {
    let items = match body {
        JsonValue::Array(items) => items.as_slice(),
        JsonValue::Null => return Ok(Vec::new()),
        other => std::slice::from_ref(other),
    };
    items
        .iter()
        .map(|item| {
            Row::from_json_object(item).ok_or_else(|| {
                RowStoreError::Other(format!("Expected a JSON object per row, got {item}"))
            })
        })
        .collect()
}

#[async_trait]
impl RowStore for RestRowStore {
    async fn select_rows(&self, query: SelectQuery<'_>) -> Result<Vec<Row>, RowStoreError> {
        let url = self.table_url(query.table, &select_params(&query))?;
        debug!(%url, "rest select");
        self.send_for_rows(self.request(Method::GET, url)).await
    }

    async fn insert_rows(
        &self,
        table: &str,
        values: &ColumnValues,
    ) -> Result<Vec<Row>, RowStoreError> {
        let url = self.table_url(table, &[])?;
        debug!(%url, "rest insert");
        self.send_for_rows(self.request(Method::POST, url).json(values))
            .await
    }

    async fn update_rows(
        &self,
        table: &str,
        values: &ColumnValues,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        if values.is_empty() {
            return Err(RowStoreError::Rejected {
                status: 400,
                message: format!("UPDATE of `{table}` sets no columns"),
            });
        }
        let url = self.table_url(table, &filter_params(filters))?;
        debug!(%url, "rest update");
        let rows = self
            .send_for_rows(self.request(Method::PATCH, url).json(values))
            .await?;
        Ok(rows.len())
    }

    async fn delete_rows(
        &self,
        table: &str,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        let url = self.table_url(table, &filter_params(filters))?;
        debug!(%url, "rest delete");
        let rows = self.send_for_rows(self.request(Method::DELETE, url)).await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestRowStore {
        RestRowStore::builder("https://db.example.test/rest/v1/".into(), "key".into())
            .build()
            .expect("valid options")
    }

    #[test]
    fn rejects_bad_base_urls() {
        for url in ["", "   ", "ftp://example.test", "not a url"] {
            let err = RestRowStore::builder(url.into(), "key".into())
                .build()
                .unwrap_err();
            assert!(matches!(err, SqlShimError::ConfigError(_)), "{url}");
        }
    }

    #[test]
    fn select_query_string() {
        let filters: ColumnValues = [("category", Scalar::from("lamps")), ("sold", Scalar::Null)]
            .into_iter()
            .collect();
        let order = [OrderBy::desc("price"), OrderBy::asc("name")];
        let query = SelectQuery {
            table: "products",
            filters: &filters,
            columns: "name, price",
            order_by: &order,
            limit: Some(10),
        };
        let url = store()
            .table_url(query.table, &select_params(&query))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://db.example.test/rest/v1/products?select=name%2Cprice&category=eq.lamps&sold=is.null&order=price.desc%2Cname.asc&limit=10"
        );
    }

    #[test]
    fn mutation_without_filters_has_no_query() {
        let url = store().table_url("products", &[]).expect("url");
        assert_eq!(url.as_str(), "https://db.example.test/rest/v1/products");
    }

    #[test]
    fn decodes_row_arrays() {
        let body = serde_json::json!([{"id": 1, "name": "lamp"}, {"id": 2, "name": null}]);
        let rows = rows_from_json(&body).expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id(), Some(&Scalar::Int(1)));
        assert_eq!(rows[1].get("name"), Some(&Scalar::Null));

        assert!(rows_from_json(&JsonValue::Null).expect("empty").is_empty());
        assert!(rows_from_json(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn table_names_cannot_escape_their_path_segment() {
        let filters: ColumnValues = [("id", Scalar::Int(5))].into_iter().collect();
        let url = store()
            .table_url("orders?id=gt.0", &filter_params(&filters))
            .expect("url");
        assert_eq!(url.query(), Some("id=eq.5"));
        assert_eq!(url.path(), "/rest/v1/orders%3Fid=gt.0");

        let url = store().table_url("../auth/users", &[]).expect("url");
        assert!(url.path().starts_with("/rest/v1/"), "{url}");
        assert_eq!(url.path_segments().map(Iterator::count), Some(3));
        assert_eq!(url.query(), None);

        for table in ["..", ".", " "] {
            assert!(matches!(
                store().table_url(table, &[]),
                Err(RowStoreError::Rejected { status: 400, .. })
            ));
        }
    }

    #[test]
    fn base_url_without_path() {
        let store = RestRowStore::builder("http://127.0.0.1:3000".into(), "key".into())
            .build()
            .expect("valid options");
        let url = store.table_url("products", &[]).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/products");
    }

    mod http {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};
        use tokio::task::JoinHandle;

        use super::*;

        /// Serve one canned response on a local port; the task yields the raw request.
        async fn serve_once(
            status: &'static str,
            body: &'static str,
        ) -> std::io::Result<(RestRowStore, JoinHandle<std::io::Result<String>>)> {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            let addr = listener.local_addr()?;
            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await?;
                let request = read_request(&mut stream).await?;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await?;
                stream.shutdown().await?;
                Ok(request)
            });
            let store = RestRowStore::builder(format!("http://{addr}/rest/v1"), "secret".into())
                .build()
                .expect("valid options");
            Ok((store, server))
        }

        async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
            let mut buf = Vec::new();
            let mut chunk = [0_u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|len| len.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + body_len {
                        break;
                    }
                }
            }
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }

        #[tokio::test]
        async fn non_success_status_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
            let (store, server) =
                serve_once("404 Not Found", r#"{"message":"relation does not exist"}"#).await?;
            let none = ColumnValues::new();
            let query = SelectQuery {
                table: "products",
                filters: &none,
                columns: "*",
                order_by: &[],
                limit: None,
            };
            let err = store.select_rows(query).await.unwrap_err();
            match err {
                RowStoreError::Rejected { status, message } => {
                    assert_eq!(status, 404);
                    assert!(message.contains("relation does not exist"), "{message}");
                }
                other => panic!("unexpected error: {other:?}"),
            }

            let request = server.await??;
            assert!(request.starts_with("GET /rest/v1/products?select=*"), "{request}");
            let lower = request.to_ascii_lowercase();
            assert!(lower.contains("apikey: secret"));
            assert!(lower.contains("authorization: bearer secret"));
            assert!(!lower.contains("prefer:"));
            Ok(())
        }

        #[tokio::test]
        async fn no_content_means_no_rows() -> Result<(), Box<dyn std::error::Error>> {
            let (store, server) = serve_once("204 No Content", "").await?;
            let filters: ColumnValues = [("id", Scalar::Int(5))].into_iter().collect();
            assert_eq!(store.delete_rows("orders", &filters).await?, 0);

            let request = server.await??;
            assert!(request.starts_with("DELETE /rest/v1/orders?id=eq.5 "), "{request}");
            assert!(
                request
                    .to_ascii_lowercase()
                    .contains("prefer: return=representation")
            );
            Ok(())
        }

        #[tokio::test]
        async fn update_counts_returned_rows() -> Result<(), Box<dyn std::error::Error>> {
            let (store, server) = serve_once(
                "200 OK",
                r#"[{"id":1,"status":"shipped"},{"id":2,"status":"shipped"}]"#,
            )
            .await?;
            let values: ColumnValues = [("status", Scalar::from("shipped"))].into_iter().collect();
            let filters: ColumnValues = [("status", Scalar::from("new"))].into_iter().collect();
            assert_eq!(store.update_rows("orders", &values, &filters).await?, 2);

            let request = server.await??;
            assert!(request.starts_with("PATCH /rest/v1/orders?status=eq.new "), "{request}");
            assert!(
                request
                    .to_ascii_lowercase()
                    .contains("prefer: return=representation")
            );
            assert!(request.ends_with(r#"{"status":"shipped"}"#), "{request}");
            Ok(())
        }
    }
}
