use crate::error::BoxError;
use crate::sink::{BulkRequest, BulkSink};
use async_trait::async_trait;
use reqwest::Client;

/// [`BulkSink`] that POSTs batches over HTTPS with `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpSink {
    client: Client,
}

impl HttpSink {
    /// Construct a sink with a default `reqwest` client.
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Construct a sink around an existing client, e.g. one configured
    /// with a proxy or custom timeouts.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BulkSink for HttpSink {
    async fn post(&self, request: BulkRequest) -> Result<(), BoxError> {
        let mut builder = self.client.post(&request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.body(request.payload).send().await?;
        check_status(resp).await
    }

    // Pooled connections of `self.client` are driven by the runtime that
    // opened them, which may be the one stuck in the panic. A fresh client
    // dials on the current runtime instead.
    async fn post_fatal(&self, request: BulkRequest) -> Result<(), BoxError> {
        let client = Client::builder().pool_max_idle_per_host(0).build()?;
        HttpSink::with_client(client).post(request).await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<(), BoxError> {
    if resp.status().is_success() {
        Ok(())
    } else {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
        Err(format!("bulk insert failed with status {}: {}", status, text).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn request(uri: String) -> BulkRequest {
        BulkRequest {
            uri,
            payload: "{\"a\":1}\n{\"b\":2}".to_string(),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("x-loggly-tag".to_string(), "prod,api".to_string()),
            ],
        }
    }

    #[tokio::test]
    async fn posts_payload_with_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bulk/abc")
            .match_header("content-type", "application/json")
            .match_header("x-loggly-tag", "prod,api")
            .match_body(Matcher::Exact("{\"a\":1}\n{\"b\":2}".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let sink = HttpSink::new();
        sink.post(request(format!("{}/bulk/abc", server.url())))
            .await
            .expect("accepted");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bulk/abc")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let err = HttpSink::new()
            .post(request(format!("{}/bulk/abc", server.url())))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("forbidden"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fatal_post_uses_its_own_connection() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bulk/abc")
            .match_header("x-loggly-tag", "prod,api")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let sink = HttpSink::new();
        let uri = format!("{}/bulk/abc", server.url());
        sink.post(request(uri.clone())).await.expect("accepted");
        sink.post_fatal(request(uri)).await.expect("accepted");

        mock.assert_async().await;
    }
}
