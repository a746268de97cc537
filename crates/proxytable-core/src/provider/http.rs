use std::time::Duration;

use reqwest::Client;
use url::Url;

use super::DataProvider;
use crate::model::{Configuration, Query, Slice};
use crate::{Error, Result};

/// Remote table served over HTTP as JSON.
///
/// `GET <url>?tableName=<t>` returns the configuration,
/// `GET <url>?tableName=<t>&beginRow=<b>&endRow=<e>&columns=<c1,c2>` a slice.
pub struct HttpProvider {
    client: Client,
    base: Url,
    table_name: Option<String>,
}

impl HttpProvider {
    pub fn new(url: &str, table_name: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base: Url::parse(url)?,
            table_name,
        })
    }

    fn configuration_url(&self) -> Url {
        let mut url = self.base.clone();
        if let Some(table) = &self.table_name {
            url.query_pairs_mut().append_pair("tableName", table);
        }
        url
    }

    fn slice_url(&self, query: &Query) -> Url {
        let mut url = self.configuration_url();
        url.query_pairs_mut()
            .append_pair("beginRow", &query.begin_row.to_string())
            .append_pair("endRow", &query.end_row.to_string())
            .append_pair("columns", &query.columns.join(","));
        url
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("HTTP {} for {}", status, url)));
        }

        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl DataProvider for HttpProvider {
    async fn request_configuration(&self) -> Result<Configuration> {
        let body = self.get_text(self.configuration_url()).await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Configuration(format!("Malformed configuration response: {}", e)))
    }

    async fn request_slice(&self, query: &Query) -> Result<Slice> {
        let body = self.get_text(self.slice_url(query)).await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Provider(format!("Malformed slice response: {}", e)))
    }

    fn describe(&self) -> String {
        match &self.table_name {
            Some(table) => format!("http source {} (table {})", self.base, table),
            None => format!("http source {}", self.base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Answer `responses.len()` requests with canned bodies, reporting each
    /// request line back
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap();
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let line = request.lines().next().unwrap_or_default().to_string();
                let _ = tx.send(line);

                let response = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/data", addr), rx)
    }

    #[test]
    fn test_slice_url() {
        let provider = HttpProvider::new("http://localhost/data", Some("cars".into()), 5).unwrap();
        let url = provider.slice_url(&Query::new(100, 200, vec!["a".into(), "b".into()]));
        assert_eq!(
            url.as_str(),
            "http://localhost/data?tableName=cars&beginRow=100&endRow=200&columns=a%2Cb"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            HttpProvider::new("not a url", None, 5),
            Err(Error::UrlParse(_))
        ));
    }

    #[tokio::test]
    async fn test_configuration_and_slice() {
        let (url, mut requests) = serve(vec![
            (200, r#"{"columns":[{"id":"a"},{"id":"b"}],"rowCount":250}"#),
            (
                200,
                r#"{"beginRow":100,"rows":[{"id":100},{"id":"101"}],"values":[[1,2],[3,null]],"tableRowCount":102}"#,
            ),
        ])
        .await;
        let provider = HttpProvider::new(&url, Some("t".into()), 5).unwrap();

        let config = provider.request_configuration().await.unwrap();
        assert_eq!(config.row_count, 250);
        assert_eq!(config.column_ids(), vec!["a", "b"]);
        assert_eq!(requests.recv().await.unwrap(), "GET /data?tableName=t HTTP/1.1");

        let query = Query::new(100, 200, vec!["a".into(), "b".into()]);
        let slice = provider.request_slice(&query).await.unwrap();
        assert_eq!(slice.begin_row, Some(100));
        assert_eq!(slice.rows[0].id, "100");
        assert_eq!(slice.row_count, Some(102));
        assert!(slice.check(&query, Some(102), 2).is_ok());
        assert_eq!(
            requests.recv().await.unwrap(),
            "GET /data?tableName=t&beginRow=100&endRow=200&columns=a%2Cb HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_errors_are_classified() {
        let (url, _requests) = serve(vec![
            (200, r#"{"rowCount":10}"#),
            (500, "oops"),
            (200, "not json"),
        ])
        .await;
        let provider = HttpProvider::new(&url, None, 5).unwrap();

        assert!(matches!(
            provider.request_configuration().await,
            Err(Error::Configuration(_))
        ));

        let query = Query::new(0, 10, vec![]);
        let err = provider.request_slice(&query).await.unwrap_err();
        assert!(err.is_provider_failure());
        let err = provider.request_slice(&query).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
