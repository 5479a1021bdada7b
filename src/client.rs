//! HTTP client behind the `list`, `run`, and `metrics` commands.

use anyhow::{Context, bail};
use reqwest::Response;
use serde_json::Value;

use fnhost_common::FunctionInfo;

pub struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn list(&self) -> anyhow::Result<Vec<FunctionInfo>> {
        let body = check(self.http.get(self.url("/functions")).send().await?).await?;
        let functions = body
            .get("functions")
            .cloned()
            .context("response has no functions field")?;
        Ok(serde_json::from_value(functions)?)
    }

    pub async fn run(&self, name: &str, input: &Value) -> anyhow::Result<Value> {
        if !input.is_object() {
            bail!("input must be a JSON object");
        }
        let response = self
            .http
            .post(self.url(&format!("/run/{name}")))
            .json(input)
            .send()
            .await?;
        check(response).await
    }

    pub async fn metrics(&self, name: Option<&str>) -> anyhow::Result<Value> {
        let path = match name {
            Some(name) => format!("/metrics/{name}"),
            None => "/metrics".to_string(),
        };
        check(self.http.get(self.url(&path)).send().await?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

/// Decode the body, turning error statuses into errors carrying the
/// server's message.
async fn check(response: Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.context("server returned invalid JSON")?;

    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("server returned {status}: {message}");
    }

    Ok(body)
}
