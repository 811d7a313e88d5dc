//! Meta Graph API client
//!
//! All write calls are form-encoded POSTs with the access token passed as a
//! query parameter. Graph reports failures as an `error` object in the JSON
//! body (sometimes alongside a 200), so the body is inspected before the
//! HTTP status.

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

const GRAPH_API_BASE: &str = "https://graph.facebook.com";

#[derive(Debug, Error)]
pub enum GraphError {
    /// Upstream error object with the Graph error code and message
    #[error("Graph API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Graph API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected Graph API response: {0}")]
    Response(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(api_version: &str) -> Self {
        Self::with_base_url(format!("{}/{}", GRAPH_API_BASE, api_version))
    }

    /// Point the client at a different Graph base (test doubles, proxies)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// POST `params` as a form body to `{base}/{path}`
    pub async fn post_form(
        &self,
        path: &str,
        access_token: &str,
        params: &[(&str, String)],
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .query(&[("access_token", access_token)])
            .form(params)
            .send()
            .await?;

        Self::parse_graph_response(response).await
    }

    /// GET `{base}/{path}` with a field-selection query
    pub async fn get(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        Self::parse_graph_response(response).await
    }

    /// GET a paginated collection, following `paging.next` until exhausted.
    /// Returns the concatenated `data` arrays.
    pub async fn get_all_pages(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = self.get(path, access_token, query).await?;

        loop {
            if let Some(Value::Array(data)) = page.get_mut("data").map(Value::take) {
                items.extend(data);
            }

            // `paging.next` is an absolute URL that already carries the token
            let next = page
                .get("paging")
                .and_then(|p| p.get("next"))
                .and_then(Value::as_str)
                .map(str::to_string);

            match next {
                Some(url) => {
                    let response = self.http.get(&url).send().await?;
                    page = Self::parse_graph_response(response).await?;
                }
                None => break,
            }
        }

        Ok(items)
    }

    async fn parse_graph_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        let body: Value = serde_json::from_str(&text)
            .map_err(|_| GraphError::Response(format!("status {}: {}", status, text)))?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(GraphError::Api { code, message });
        }

        Ok(body)
    }
}

/// Extract the `id` field Graph returns for created objects
pub fn object_id(body: &Value) -> Result<String> {
    body.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GraphError::Response(format!("missing id in response: {}", body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CallLog, graph_stub, spawn_server};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn post_form_sends_token_as_query_param_and_params_as_form_body() {
        let log = CallLog::default();
        let stub = graph_stub(log.clone(), Arc::new(|_| json!({"id": "123"})));
        let base = spawn_server(stub).await;

        let client = GraphClient::with_base_url(base);
        let body = client
            .post_form(
                "page_1/feed",
                "token-abc",
                &[("message", "hello world".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(object_id(&body).unwrap(), "123");

        let calls = log.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "page_1/feed");
        assert_eq!(calls[0].query.get("access_token").unwrap(), "token-abc");
        assert_eq!(calls[0].form.get("message").unwrap(), "hello world");
    }

    #[tokio::test]
    async fn error_object_in_body_surfaces_as_api_error_even_on_http_200() {
        let log = CallLog::default();
        let stub = graph_stub(
            log.clone(),
            Arc::new(|_| json!({"error": {"code": 190, "message": "Invalid OAuth access token"}})),
        );
        let base = spawn_server(stub).await;

        let client = GraphClient::with_base_url(base);
        let err = client
            .post_form("page_1/photos", "t", &[("url", "http://img".to_string())])
            .await
            .unwrap_err();

        match err {
            GraphError::Api { code, message } => {
                assert_eq!(code, 190);
                assert_eq!(message, "Invalid OAuth access token");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_all_pages_follows_paging_next() {
        // The stub needs its own base URL to emit an absolute `paging.next`
        // link, so the URL is filled in after the server is bound.
        let log = CallLog::default();
        let base_holder: Arc<std::sync::OnceLock<String>> = Arc::new(std::sync::OnceLock::new());
        let holder = base_holder.clone();

        let stub = graph_stub(
            log.clone(),
            Arc::new(move |call| {
                if call.query.contains_key("after") {
                    json!({"data": [{"id": "3"}]})
                } else {
                    let next = format!(
                        "{}/me/accounts?access_token=tok&after=cursor",
                        holder.get().map(String::as_str).unwrap_or_default()
                    );
                    json!({"data": [{"id": "1"}, {"id": "2"}], "paging": {"next": next}})
                }
            }),
        );
        let base = spawn_server(stub).await;
        base_holder.set(base.clone()).unwrap();

        let client = GraphClient::with_base_url(base);
        let items = client
            .get_all_pages("me/accounts", "tok", &[("limit", "2")])
            .await
            .unwrap();

        let ids: Vec<&str> = items.iter().filter_map(|v| v["id"].as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn object_id_rejects_bodies_without_id() {
        let err = object_id(&json!({"ok": true})).unwrap_err();
        assert!(matches!(err, GraphError::Response(_)));
    }
}
