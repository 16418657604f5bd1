//! Strategy knobs shared by configuration and the pipeline crates.
//!
//! The two platform pipelines historically disagree on how to treat a failed
//! item and how to group results into narratives. Both behaviours are kept as
//! named strategies and selected per platform.
use serde::{Deserialize, Serialize};

/// What a batch pipeline does with an item whose analysis failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFailurePolicy {
    /// Leave the item out of the returned results.
    Drop,
    /// Return the item with an inert low-risk record.
    SubstituteDefault,
}

/// How surviving results are grouped into candidate narratives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    /// Parent container (subreddit, channel).
    Container,
    /// Sorted set of linguistic risk categories.
    RiskSignature,
}

/// How a cluster's aggregate threat level is derived from its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatAggregation {
    /// Mean of ordinals (low=1..critical=4), bucketed at 1.5 / 2.5 / 3.5.
    MeanOrdinal,
    /// Critical on a strict critical majority, high on a strict high+critical
    /// majority, medium if any member is medium, else low.
    Majority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterPolicy {
    pub grouping: GroupingKey,
    pub threat: ThreatAggregation,
    /// Results with a fake-risk score below this are ignored.
    pub min_fake_risk: f64,
    pub min_cluster_size: usize,
    /// Write the assigned cluster id back onto member results.
    pub annotate_members: bool,
    /// Prefix for index-based cluster ids.
    pub id_prefix: String,
}

impl ClusterPolicy {
    /// Community grouping used for Reddit.
    pub fn by_container() -> Self {
        Self {
            grouping: GroupingKey::Container,
            threat: ThreatAggregation::MeanOrdinal,
            min_fake_risk: 60.0,
            min_cluster_size: 2,
            annotate_members: false,
            id_prefix: "reddit".to_string(),
        }
    }

    /// Content-pattern grouping used for YouTube.
    pub fn by_risk_signature() -> Self {
        Self {
            grouping: GroupingKey::RiskSignature,
            threat: ThreatAggregation::Majority,
            min_fake_risk: 40.0,
            min_cluster_size: 2,
            annotate_members: true,
            id_prefix: "youtube".to_string(),
        }
    }
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        Self::by_container()
    }
}
