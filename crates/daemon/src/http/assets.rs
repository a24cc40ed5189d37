// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static dashboard stubs. The real dashboard is an external client of the
//! JSON API; these keep `/` useful on a bare install.

use axum::http::header;
use axum::response::{Html, IntoResponse, Response};

const INDEX: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>tmservice</title>
  <link rel="stylesheet" href="/style.css">
</head>
<body>
  <h1>tmservice</h1>
  <p>The backup daemon is running. Status: <a href="/api/status">/api/status</a></p>
  <script src="/app.js"></script>
</body>
</html>
"#;

const STYLE: &str = "body { font-family: sans-serif; margin: 2rem; color: #222; }\n";

const APP_JS: &str = "// Dashboard clients talk to /api/*; nothing to do here.\n";

pub(crate) async fn index() -> Html<&'static str> {
    Html(INDEX)
}

pub(crate) async fn style() -> Response {
    ([(header::CONTENT_TYPE, "text/css")], STYLE).into_response()
}

pub(crate) async fn app_js() -> Response {
    ([(header::CONTENT_TYPE, "application/javascript")], APP_JS).into_response()
}

pub(crate) async fn favicon() -> Response {
    ([(header::CONTENT_TYPE, "image/x-icon")], &[] as &[u8]).into_response()
}
