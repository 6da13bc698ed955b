//! services/api/src/web/pages.rs
//!
//! Static page handlers. Real template rendering is a frontend concern; the
//! service ships minimal placeholder pages that point at the JSON API.

use axum::response::Html;

const INDEX: &str = r#"<!DOCTYPE html>
<html>
<head><title>LearnSphere</title></head>
<body>
  <h1>LearnSphere</h1>
  <p>AI-assisted machine-learning tutor.</p>
  <ul>
    <li><a href="/register">Register</a></li>
    <li><a href="/login">Login</a></li>
    <li><a href="/editor">Code editor</a></li>
    <li><a href="/learning-path">Learning path</a></li>
    <li><a href="/swagger-ui">API documentation</a></li>
  </ul>
</body>
</html>
"#;

const REGISTER: &str = r#"<!DOCTYPE html>
<html>
<head><title>Register - LearnSphere</title></head>
<body>
  <h1>Register</h1>
  <p>POST {"username", "password"} to <code>/register</code>.</p>
</body>
</html>
"#;

const LOGIN: &str = r#"<!DOCTYPE html>
<html>
<head><title>Login - LearnSphere</title></head>
<body>
  <h1>Login</h1>
  <p>POST {"username", "password"} to <code>/login</code>.</p>
</body>
</html>
"#;

const EDITOR: &str = r#"<!DOCTYPE html>
<html>
<head><title>Editor - LearnSphere</title></head>
<body>
  <h1>Code Editor</h1>
  <p>POST {"code"} to <code>/api/run</code> to execute it server-side.</p>
</body>
</html>
"#;

const LEARNING_PATH: &str = r#"<!DOCTYPE html>
<html>
<head><title>Learning Path - LearnSphere</title></head>
<body>
  <h1>Learning Path</h1>
  <p>POST {"topic", "level"} to <code>/api/generate</code> for a structured lesson.</p>
</body>
</html>
"#;

pub async fn index() -> Html<&'static str> {
    Html(INDEX)
}

pub async fn register_page() -> Html<&'static str> {
    Html(REGISTER)
}

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN)
}

pub async fn editor() -> Html<&'static str> {
    Html(EDITOR)
}

pub async fn learning_path() -> Html<&'static str> {
    Html(LEARNING_PATH)
}
