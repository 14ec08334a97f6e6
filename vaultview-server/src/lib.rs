//! vaultview-server: renders the Users table over HTTP
//!
//! One route, `GET /`. Each request opens its own database connection,
//! runs `SELECT * FROM Users`, and renders the rows, or an error page if
//! anything went wrong on the way.

pub mod db;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod views;

pub use db::{DbError, PgRowSource, QueryResult, RowSource};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, run_server, ServerConfig};
pub use state::AppState;
pub use views::Views;
