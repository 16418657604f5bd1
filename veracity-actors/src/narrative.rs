//! Narrative cluster detection over a snapshot of analyzed items.
//!
//! Clusters are recomputed from scratch on every pass. Results below the
//! policy's fake-risk floor are ignored, the rest are grouped either by parent
//! container or by risk signature, and groups reaching `min_cluster_size`
//! become clusters in first-seen key order.
use crate::NarrativeCluster;
use crate::{RedditAnalysisResult, YouTubeAnalysisResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use veracity_common::{AnalysisRecord, ClusterPolicy, GroupingKey, ThreatAggregation, ThreatLevel};

/// Anything the detector can group.
pub trait ClusterCandidate {
    fn item_id(&self) -> &str;
    /// Subreddit, channel, ...
    fn container(&self) -> &str;
    fn analysis(&self) -> &AnalysisRecord;
    fn set_cluster_id(&mut self, id: String);
}

impl ClusterCandidate for RedditAnalysisResult {
    fn item_id(&self) -> &str {
        &self.post_id
    }
    fn container(&self) -> &str {
        &self.subreddit
    }
    fn analysis(&self) -> &AnalysisRecord {
        &self.analysis
    }
    fn set_cluster_id(&mut self, id: String) {
        self.narrative_cluster_id = Some(id);
    }
}

impl ClusterCandidate for YouTubeAnalysisResult {
    fn item_id(&self) -> &str {
        &self.video_id
    }
    fn container(&self) -> &str {
        &self.channel_title
    }
    fn analysis(&self) -> &AnalysisRecord {
        &self.analysis
    }
    fn set_cluster_id(&mut self, id: String) {
        self.narrative_cluster_id = Some(id);
    }
}

fn group_key<T: ClusterCandidate>(item: &T, grouping: GroupingKey) -> Option<String> {
    match grouping {
        GroupingKey::Container => Some(item.container().to_string()),
        GroupingKey::RiskSignature => {
            let signature = item.analysis().risk_signature();
            (!signature.is_empty()).then_some(signature)
        }
    }
}

/// Aggregate threat level of a cluster under the given rule.
pub fn aggregate_threat(levels: &[ThreatLevel], rule: ThreatAggregation) -> ThreatLevel {
    if levels.is_empty() {
        return ThreatLevel::Low;
    }
    let n = levels.len() as f64;
    match rule {
        ThreatAggregation::MeanOrdinal => {
            let sum: f64 = levels.iter().map(|l| f64::from(l.ordinal())).sum();
            ThreatLevel::from_mean_ordinal(sum / n)
        }
        ThreatAggregation::Majority => {
            let critical = levels.iter().filter(|l| **l == ThreatLevel::Critical).count() as f64;
            let high = levels.iter().filter(|l| **l == ThreatLevel::High).count() as f64;
            if critical > n / 2.0 {
                ThreatLevel::Critical
            } else if high + critical > n / 2.0 {
                ThreatLevel::High
            } else if levels.contains(&ThreatLevel::Medium) {
                ThreatLevel::Medium
            } else {
                ThreatLevel::Low
            }
        }
    }
}

/// Group `results` into clusters. When `policy.annotate_members` is set, each
/// member of a cluster gets its `narrative_cluster_id` assigned.
pub fn detect_clusters<T: ClusterCandidate>(
    results: &mut [T],
    policy: &ClusterPolicy,
) -> Vec<NarrativeCluster> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, item) in results.iter().enumerate() {
        if item.analysis().fake_risk_score < policy.min_fake_risk {
            continue;
        }
        let Some(key) = group_key(item, policy.grouping) else {
            continue;
        };
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(idx);
    }

    let min_size = policy.min_cluster_size.max(1);
    let detected_at = Utc::now();
    let mut clusters = Vec::new();
    for key in order {
        let members = &groups[&key];
        if members.len() < min_size {
            continue;
        }
        let id = match policy.grouping {
            GroupingKey::Container => {
                format!("cluster_{key}_{}", detected_at.timestamp_millis())
            }
            GroupingKey::RiskSignature => {
                format!("{}_cluster_{}", policy.id_prefix, clusters.len())
            }
        };
        let theme = match policy.grouping {
            GroupingKey::Container => "Multiple high-risk posts detected".to_string(),
            GroupingKey::RiskSignature => {
                let first = results[members[0]].analysis();
                let categories: Vec<&str> = first
                    .linguistic_risks
                    .iter()
                    .map(|r| r.category.as_str())
                    .collect();
                format!("Items showing similar patterns: {}", categories.join(", "))
            }
        };
        let risks: f64 = members
            .iter()
            .map(|&i| results[i].analysis().fake_risk_score)
            .sum();
        let levels: Vec<ThreatLevel> = members
            .iter()
            .map(|&i| results[i].analysis().threat_level)
            .collect();

        if policy.annotate_members {
            for &i in members {
                results[i].set_cluster_id(id.clone());
            }
        }
        tracing::info!(cluster = %id, members = members.len(), "narrative.cluster");
        clusters.push(NarrativeCluster {
            id,
            grouping: policy.grouping,
            member_ids: members
                .iter()
                .map(|&i| results[i].item_id().to_string())
                .collect(),
            average_fake_risk: risks / members.len() as f64,
            average_threat_level: aggregate_threat(&levels, policy.threat),
            theme,
            key,
            detected_at,
        });
    }
    clusters
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingTopic {
    pub topic: String,
    pub count: usize,
    pub average_risk: f64,
}

/// Most frequent risk categories among results with fake-risk at or above
/// `min_fake_risk`, most frequent first.
pub fn trending_topics<T: ClusterCandidate>(
    results: &[T],
    min_fake_risk: f64,
    limit: usize,
) -> Vec<TrendingTopic> {
    let mut order: Vec<String> = Vec::new();
    let mut tally: HashMap<String, (usize, f64)> = HashMap::new();
    for item in results {
        let record = item.analysis();
        if record.fake_risk_score < min_fake_risk {
            continue;
        }
        for risk in &record.linguistic_risks {
            let entry = tally.entry(risk.category.clone()).or_insert_with(|| {
                order.push(risk.category.clone());
                (0, 0.0)
            });
            entry.0 += 1;
            entry.1 += record.fake_risk_score;
        }
    }

    let mut topics: Vec<TrendingTopic> = order
        .into_iter()
        .map(|topic| {
            let (count, total) = tally[&topic];
            TrendingTopic {
                average_risk: total / count as f64,
                count,
                topic,
            }
        })
        .collect();
    // Stable: ties keep first-seen order.
    topics.sort_by(|a, b| b.count.cmp(&a.count));
    topics.truncate(limit);
    topics
}

#[cfg(test)]
mod tests {
    use super::*;
    use veracity_common::LinguisticRisk;

    #[derive(Debug, Clone)]
    struct Item {
        id: String,
        container: String,
        analysis: AnalysisRecord,
        cluster: Option<String>,
    }

    impl ClusterCandidate for Item {
        fn item_id(&self) -> &str {
            &self.id
        }
        fn container(&self) -> &str {
            &self.container
        }
        fn analysis(&self) -> &AnalysisRecord {
            &self.analysis
        }
        fn set_cluster_id(&mut self, id: String) {
            self.cluster = Some(id);
        }
    }

    fn item(id: &str, container: &str, risk: f64, level: ThreatLevel, tags: &[&str]) -> Item {
        let mut analysis = AnalysisRecord::inert();
        analysis.fake_risk_score = risk;
        analysis.threat_level = level;
        analysis.linguistic_risks = tags
            .iter()
            .map(|t| LinguisticRisk {
                category: t.to_string(),
                severity: 50.0,
                description: String::new(),
                found_phrases: vec![],
            })
            .collect();
        Item {
            id: id.to_string(),
            container: container.to_string(),
            analysis,
            cluster: None,
        }
    }

    #[test]
    fn container_grouping_keeps_high_risk_members() {
        let mut results: Vec<Item> = [80.0, 90.0, 10.0, 85.0, 20.0]
            .iter()
            .enumerate()
            .map(|(i, r)| item(&format!("p{i}"), "X", *r, ThreatLevel::High, &[]))
            .collect();

        let clusters = detect_clusters(&mut results, &ClusterPolicy::by_container());
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.key, "X");
        assert_eq!(cluster.member_ids, vec!["p0", "p1", "p3"]);
        assert!((cluster.average_fake_risk - 85.0).abs() < 1e-9);
        assert_eq!(cluster.average_threat_level, ThreatLevel::High);
        assert!(cluster.id.starts_with("cluster_X_"));
        assert_eq!(cluster.theme, "Multiple high-risk posts detected");
        assert!(results.iter().all(|r| r.cluster.is_none()));
    }

    #[test]
    fn undersized_groups_are_not_clusters() {
        let mut results = vec![
            item("a", "X", 90.0, ThreatLevel::High, &[]),
            item("b", "Y", 90.0, ThreatLevel::High, &[]),
        ];
        assert!(detect_clusters(&mut results, &ClusterPolicy::by_container()).is_empty());
    }

    #[test]
    fn signature_grouping_annotates_members_in_key_order() {
        let mut results = vec![
            item("v1", "c", 70.0, ThreatLevel::High, &["fear", "clickbait"]),
            item("v2", "c", 50.0, ThreatLevel::Medium, &["sensationalism"]),
            item("v3", "d", 60.0, ThreatLevel::High, &["clickbait", "fear"]),
            item("v4", "d", 45.0, ThreatLevel::Low, &["sensationalism"]),
            item("v5", "d", 95.0, ThreatLevel::Critical, &[]),
            item("v6", "d", 10.0, ThreatLevel::Low, &["fear", "clickbait"]),
        ];
        let clusters = detect_clusters(&mut results, &ClusterPolicy::by_risk_signature());

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, "youtube_cluster_0");
        assert_eq!(clusters[0].key, "clickbait|fear");
        assert_eq!(clusters[0].member_ids, vec!["v1", "v3"]);
        assert_eq!(clusters[0].theme, "Items showing similar patterns: fear, clickbait");
        assert_eq!(clusters[1].id, "youtube_cluster_1");
        assert_eq!(clusters[1].member_ids, vec!["v2", "v4"]);

        assert_eq!(results[0].cluster.as_deref(), Some("youtube_cluster_0"));
        assert_eq!(results[3].cluster.as_deref(), Some("youtube_cluster_1"));
        assert_eq!(results[4].cluster, None);
        assert_eq!(results[5].cluster, None);
    }

    #[test]
    fn majority_rule_boundaries() {
        use ThreatLevel::*;
        let rule = ThreatAggregation::Majority;
        assert_eq!(aggregate_threat(&[Critical, Critical, Critical, Low], rule), Critical);
        // Two of four is not a strict majority of critical...
        assert_eq!(aggregate_threat(&[Critical, Critical, High, Medium], rule), High);
        // ...and neither is two of four for high + critical.
        assert_eq!(aggregate_threat(&[Critical, High, Medium, Low], rule), Medium);
        assert_eq!(aggregate_threat(&[High, Low, Low], rule), Low);
    }

    #[test]
    fn mean_ordinal_rule_buckets() {
        use ThreatLevel::*;
        let rule = ThreatAggregation::MeanOrdinal;
        assert_eq!(aggregate_threat(&[Critical, Critical, High, Medium], rule), High);
        assert_eq!(aggregate_threat(&[Critical, Critical, Critical, High], rule), Critical);
        assert_eq!(aggregate_threat(&[Low, Medium], rule), Medium);
        assert_eq!(aggregate_threat(&[Low, Low, Medium], rule), Low);
    }

    #[test]
    fn trending_counts_categories_of_risky_items() {
        let results = vec![
            item("a", "c", 80.0, ThreatLevel::High, &["fear", "clickbait"]),
            item("b", "c", 60.0, ThreatLevel::High, &["clickbait"]),
            item("c", "c", 30.0, ThreatLevel::Low, &["clickbait", "satire"]),
            item("d", "c", 50.0, ThreatLevel::Medium, &["urgency"]),
        ];
        let topics = trending_topics(&results, 50.0, 5);
        let names: Vec<&str> = topics.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(names, vec!["clickbait", "fear", "urgency"]);
        assert_eq!(topics[0].count, 2);
        assert!((topics[0].average_risk - 70.0).abs() < 1e-9);
        assert_eq!(trending_topics(&results, 50.0, 1).len(), 1);
    }
}
