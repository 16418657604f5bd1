use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Listing envelope: `{"kind": "Listing", "data": {"children": [...]}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
}

/// A typed child; `t3` is a post and `t1` a comment. Payload is decoded lazily
/// so unknown kinds (`more`, ads) do not fail the listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing {
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvote_ratio: f64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditPost {
    pub id: String,
    pub subreddit: String,
    pub title: String,
    pub selftext: String,
    pub author: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub num_comments: u64,
    /// Unix seconds.
    pub created: f64,
    pub url: String,
    /// Absolute `https://www.reddit.com/...` link.
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditComment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedditSort {
    #[default]
    Hot,
    New,
    Top,
}

impl RedditSort {
    pub fn as_str(self) -> &'static str {
        match self {
            RedditSort::Hot => "hot",
            RedditSort::New => "new",
            RedditSort::Top => "top",
        }
    }
}

impl fmt::Display for RedditSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedditSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(RedditSort::Hot),
            "new" => Ok(RedditSort::New),
            "top" => Ok(RedditSort::Top),
            other => Err(format!("unknown sort '{other}' (expected hot, new or top)")),
        }
    }
}
