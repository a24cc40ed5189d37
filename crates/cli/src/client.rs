// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking HTTP client for the daemon API.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tm_core::Settings;

pub struct ApiClient {
    base: String,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    /// Resolve the API base URL: explicit override, else the port from the
    /// environment file, bound on loopback.
    pub fn new(config: Option<PathBuf>, api_override: Option<String>) -> Result<Self> {
        let base = match api_override {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => {
                let env_path =
                    config.unwrap_or_else(|| PathBuf::from("/etc/tmservice/tmservice.env"));
                let settings = Settings::load(&env_path)
                    .with_context(|| format!("reading {}", env_path.display()))?;
                format!("http://127.0.0.1:{}", settings.api_port)
            }
        };
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building http client")?;
        Ok(Self { base, http })
    }

    fn check(response: reqwest::blocking::Response) -> Result<serde_json::Value> {
        let status = response.status();
        let body: serde_json::Value = response.json().unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            let reason = body
                .get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| status.to_string());
            bail!("{reason}");
        }
        Ok(body)
    }

    pub fn get(&self, path: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .send()
            .with_context(|| format!("GET {path} (is tmserviced running?)"))?;
        Self::check(response)
    }

    pub fn post(&self, path: &str, body: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let mut request = self.http.post(format!("{}{path}", self.base));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response =
            request.send().with_context(|| format!("POST {path} (is tmserviced running?)"))?;
        Self::check(response)
    }

    pub fn put(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .http
            .put(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .with_context(|| format!("PUT {path} (is tmserviced running?)"))?;
        Self::check(response)
    }

    pub fn delete(&self, path: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .delete(format!("{}{path}", self.base))
            .send()
            .with_context(|| format!("DELETE {path} (is tmserviced running?)"))?;
        Self::check(response)
    }
}
