//! JSON API over the catalog, reader, reviews and author content, served
//! next to the static site.

pub mod model;
pub mod routes;

pub use routes::{AppState, router, site};
