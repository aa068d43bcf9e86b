//! HTML pages rendered from templates embedded at build time.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use minijinja::Environment;
use serde::Serialize;
use tracing::error;

pub const REGISTER: &str = "register.html";
pub const LOGIN: &str = "login.html";
pub const HOME: &str = "home.html";
pub const PROTECTED: &str = "protected.html";

const TEMPLATES: [(&str, &str); 5] = [
    ("base.html", include_str!("../../templates/base.html")),
    (REGISTER, include_str!("../../templates/register.html")),
    (LOGIN, include_str!("../../templates/login.html")),
    (HOME, include_str!("../../templates/home.html")),
    (PROTECTED, include_str!("../../templates/protected.html")),
];

/// Template environment shared by all handlers. `.html` templates are auto-escaped.
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    /// Load the embedded templates.
    ///
    /// # Errors
    /// Returns an error if a template does not parse.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render a page to a string.
    ///
    /// # Errors
    /// Returns an error if the template is unknown or fails to render.
    pub fn render_to_string<S: Serialize>(
        &self,
        name: &str,
        context: S,
    ) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(context)
    }

    /// Render a page as a `200 OK` HTML response; failures are logged and become a 500.
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Response {
        match self.render_to_string(name, context) {
            Ok(body) => Html(body).into_response(),
            Err(err) => {
                error!("Failed to render {name}: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

impl std::fmt::Debug for Pages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages").finish_non_exhaustive()
    }
}
