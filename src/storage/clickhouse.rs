use super::traits::{Store, StoreError};
use crate::config::types::ClickHouseConfig;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Response, StatusCode, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Error returned by the server for an empty read result
const EMPTY_RESULT_CODE: &str = "Code: 62";

/// Leading keyword of a statement, lowercased
fn statement_kind(statement: &str) -> String {
    statement
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn is_read(statement: &str) -> bool {
    matches!(statement_kind(statement).as_str(), "select" | "show")
}

/// ClickHouse over its HTTP interface.
///
/// Every call is a POST to the base URL with credentials and the database
/// as query parameters; statements travel in the body.
#[derive(Debug, Clone)]
pub struct ClickHouseClient {
    base_url: Url,
    database: String,
    params: BTreeMap<String, String>,
    settings: BTreeMap<String, String>,
    http: Client,
}

impl ClickHouseClient {
    pub fn new(config: &ClickHouseConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url).map_err(|source| StoreError::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;
        let http = Client::builder().timeout(config.timeout).build()?;

        let mut params = BTreeMap::new();
        params.insert("user".to_string(), config.user.clone());
        params.insert("database".to_string(), config.database.clone());
        if !config.password.is_empty() {
            params.insert("password".to_string(), config.password.clone());
        }

        Ok(Self {
            base_url,
            database: config.database.clone(),
            params,
            settings: config.settings.clone(),
            http,
        })
    }

    fn url_with(&self, extra: &BTreeMap<String, String>) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.params.iter().chain(extra.iter()) {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    /// Send a statement; `Ok(None)` is the benign empty read result
    async fn send(&self, statement: &str) -> Result<Option<Response>> {
        debug!(statement, "Sending statement");
        let response = self
            .http
            .post(self.url_with(&BTreeMap::new()))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(CONTENT_LENGTH, statement.len())
            .body(statement.to_string())
            .send()
            .await?;
        check_response(response, is_read(statement)).await
    }

    /// Run a statement; reads get ` FORMAT <format>` appended.
    ///
    /// Returns the raw result body, empty when the server reports an empty
    /// read result.
    pub async fn query(&self, statement: &str, format: &str) -> Result<String> {
        let statement = with_format(statement, format);
        match self.send(&statement).await? {
            Some(response) => Ok(response.text().await?),
            None => Ok(String::new()),
        }
    }

    /// Run a read and decode the JSON result; `Value::Null` when empty
    pub async fn query_json(&self, statement: &str) -> Result<Value> {
        let body = self.query(statement, "JSON").await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Stream a result straight to `output`, returning the bytes written
    pub async fn query_to_file(&self, statement: &str, format: &str, output: &Path) -> Result<u64> {
        let io_err = |source| StoreError::Io {
            path: output.to_path_buf(),
            source,
        };
        let statement = with_format(statement, format);
        let mut file = tokio::fs::File::create(output).await.map_err(io_err)?;
        let mut written = 0u64;

        if let Some(response) = self.send(&statement).await? {
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await.map_err(io_err)?;
                written += chunk.len() as u64;
            }
        }
        file.flush().await.map_err(io_err)?;
        Ok(written)
    }

    /// Ask the engine to merge the table's parts now
    pub async fn optimize(&self, table: &str) -> Result<()> {
        info!(table, "Optimizing table");
        self.execute(&format!("OPTIMIZE TABLE {}", table)).await
    }
}

fn with_format(statement: &str, format: &str) -> String {
    if is_read(statement) {
        format!("{} FORMAT {}", statement.trim_end(), format)
    } else {
        statement.to_string()
    }
}

async fn check_response(response: Response, read: bool) -> Result<Option<Response>> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(Some(response));
    }

    let message = response.text().await.unwrap_or_default();
    if read && message.contains(EMPTY_RESULT_CODE) {
        warn!(status = status.as_u16(), "Read returned no rows");
        return Ok(None);
    }
    Err(StoreError::Server {
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}

#[async_trait]
impl Store for ClickHouseClient {
    fn database(&self) -> &str {
        &self.database
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        self.send(statement).await?;
        Ok(())
    }

    async fn fetch_json(&self, statement: &str) -> Result<Value> {
        self.query_json(statement).await
    }

    async fn import_file(&self, path: &Path) -> Result<()> {
        let path_buf: PathBuf = path.to_path_buf();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path_buf.clone(),
                source,
            })?;
        let length = file
            .metadata()
            .await
            .map_err(|source| StoreError::Io {
                path: path_buf.clone(),
                source,
            })?
            .len();

        info!(path = %path.display(), bytes = length, "Importing staging file");
        let response = self
            .http
            .post(self.url_with(&self.settings))
            .header(CONTENT_TYPE, "text/tab-separated-values; charset=utf-8")
            .header(CONTENT_LENGTH, length)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        check_response(response, false).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(url: &str) -> ClickHouseConfig {
        ClickHouseConfig {
            url: url.to_string(),
            user: "etl".to_string(),
            password: "secret".to_string(),
            database: "analytics".to_string(),
            timeout: Duration::from_secs(5),
            settings: BTreeMap::from([(
                "input_format_allow_errors_ratio".to_string(),
                "0.005".to_string(),
            )]),
        }
    }

    #[test]
    fn test_statement_kind() {
        assert!(is_read("  SELECT 1"));
        assert!(is_read("show create table t"));
        assert!(!is_read("INSERT INTO t SELECT * FROM u"));
        assert!(!is_read(""));
    }

    #[test]
    fn test_with_format() {
        assert_eq!(with_format("SELECT 1 ", "JSON"), "SELECT 1 FORMAT JSON");
        assert_eq!(with_format("DROP TABLE t", "JSON"), "DROP TABLE t");
    }

    #[test]
    fn test_url_parameters() {
        let client = ClickHouseClient::new(&config("http://localhost:8123/")).unwrap();
        let url = client.url_with(&client.settings);
        let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["user"], "etl");
        assert_eq!(pairs["password"], "secret");
        assert_eq!(pairs["database"], "analytics");
        assert_eq!(pairs["input_format_allow_errors_ratio"], "0.005");
        assert_eq!(client.database(), "analytics");
    }

    #[test]
    fn test_invalid_url() {
        let err = ClickHouseClient::new(&config("not a url")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUrl { .. }));
    }
}
