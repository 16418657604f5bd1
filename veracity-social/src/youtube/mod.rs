//! YouTube Data API v3 integration (search, video details, comment threads).
pub mod client;
pub mod extract;
pub mod types;

pub use client::YouTubeApi;
pub use types::{YouTubeComment, YouTubeOrder, YouTubeVideo};
