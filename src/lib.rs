//! QuerySense
//!
//! Answers plain-language questions about a small student roster:
//!
//! - **engine**: keyword intent matching and the aggregations behind it
//! - **store** / **db**: the roster, on local disk or in Postgres
//! - **report**: turns answers into sentences, tables and charts
//! - **import**, **history**, **config**: the plumbing around them

pub mod config;
pub mod db;
pub mod engine;
pub mod history;
pub mod import;
pub mod models;
pub mod report;
pub mod seed;
pub mod store;
