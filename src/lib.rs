//! Price catalog exchange service.
//!
//! Clients upload a zip archive holding one CSV table of priced items; the
//! service parses and stores the rows atomically and answers with aggregate
//! statistics over everything stored. The full collection can be downloaded
//! back in the same zip/CSV shape.

pub mod app;
pub mod archive;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod parser;
pub mod repository;
pub mod state;

pub use app::{build_router, build_router_with_limit};
pub use error::{AppError, AppResult};
pub use models::{BatchSummary, PriceRecord};
pub use repository::{InMemoryPriceStore, PgPriceStore, PriceStore};
