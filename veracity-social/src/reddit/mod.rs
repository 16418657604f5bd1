//! Reddit public JSON API integration.
//!
//! No authentication is required; every request carries a `User-Agent` and
//! goes through the client's pacer (default: one request every 2 s).
pub mod client;
pub mod extract;
pub mod types;

pub use client::RedditApi;
pub use types::{RedditComment, RedditPost, RedditSort};
