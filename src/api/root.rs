//! Landing page and health check.

use axum::response::{Html, Json};
use serde_json::{json, Value};

pub async fn index() -> Html<&'static str> {
    Html(
        r#"<html>
  <head><title>Spotify Manager</title></head>
  <body style="font-family: sans-serif; padding: 24px;">
    <h1>Spotify Playlist Manager</h1>
    <p>Connect your Spotify to continue.</p>
    <a href="/auth/login"
       style="display:inline-block;padding:10px 14px;background:#1DB954;color:#fff;text-decoration:none;border-radius:6px;">
       Connect Spotify
    </a>
  </body>
</html>"#,
    )
}

pub async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}
