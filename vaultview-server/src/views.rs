//! HTML views rendered with minijinja.
//!
//! Templates are compiled into the binary. Names end in `.html`, so
//! minijinja escapes every interpolated value as HTML.

use minijinja::{context, Environment};
use serde::Serialize;

const BASE: &str = include_str!("../templates/base.html");
const INDEX: &str = include_str!("../templates/index.html");
const ERROR: &str = include_str!("../templates/error.html");

/// Data for the success view.
#[derive(Debug, Serialize)]
pub struct IndexContext<'a> {
    pub columns: &'a [String],
    pub rows: &'a [Vec<Option<String>>],
    /// Rendered only when exposure is enabled
    pub connection_string: Option<&'a str>,
}

/// The success and error views.
#[derive(Debug, Clone)]
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// Parse the embedded templates.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("base.html", BASE)?;
        env.add_template("index.html", INDEX)?;
        env.add_template("error.html", ERROR)?;
        Ok(Self { env })
    }

    pub fn render_index(&self, ctx: &IndexContext<'_>) -> Result<String, minijinja::Error> {
        self.env.get_template("index.html")?.render(ctx)
    }

    pub fn render_error(&self, message: &str) -> Result<String, minijinja::Error> {
        self.env
            .get_template("error.html")?
            .render(context! { error => message })
    }
}
