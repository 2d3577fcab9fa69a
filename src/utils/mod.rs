//! Utility modules shared by sources, downloads and the translation client.
//!
//! - [`HttpClient`]: reqwest client built once with a user agent and timeouts
//! - [`JsonStore`]: whole-document JSON persistence used by the history stores

mod http;
mod store;

pub use http::{HttpClient, BROWSER_USER_AGENT, USER_AGENT};
pub use store::{JsonStore, StoreError};
