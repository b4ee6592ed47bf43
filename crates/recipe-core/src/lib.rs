pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod jsonld;
pub mod kv;
pub mod models;
pub mod ogp;
pub mod push;
pub mod reminder;
pub mod scrape;

pub use error::{AppError, Result};
pub use models::{DeliveryOutcome, RecipeMeta, Reminder};
