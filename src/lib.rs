#![forbid(unsafe_code)]

pub mod app;
pub mod author;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod document;
pub mod filter;
pub mod formats;
pub mod kv_store;
pub mod logging;
pub mod normalize;
pub mod pager;
pub mod reader;
pub mod reviews;
pub mod sanity;
pub mod schema;
pub mod source;
pub mod url_state;
