//! Application state shared across handlers

use std::sync::Arc;

use vaultview_core::ConnectionString;

use crate::db::RowSource;
use crate::views::Views;

/// Shared application state
///
/// Built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    rows: Arc<dyn RowSource>,
    views: Views,
    connection_string: ConnectionString,
    expose_connection_string: bool,
}

impl AppState {
    pub fn new(
        rows: Arc<dyn RowSource>,
        views: Views,
        connection_string: ConnectionString,
        expose_connection_string: bool,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                rows,
                views,
                connection_string,
                expose_connection_string,
            }),
        }
    }

    pub fn rows(&self) -> &dyn RowSource {
        self.inner.rows.as_ref()
    }

    pub fn views(&self) -> &Views {
        &self.inner.views
    }

    /// The raw connection string, if the success view may show it.
    pub fn exposed_connection_string(&self) -> Option<&str> {
        self.inner
            .expose_connection_string
            .then(|| self.inner.connection_string.expose())
    }
}
