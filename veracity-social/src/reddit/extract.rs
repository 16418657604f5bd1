//! Listing decoding and analysis-text assembly for Reddit.
use crate::preprocess::clean_markdown;
use crate::reddit::types::{Listing, RawComment, RawPost, RedditComment, RedditPost};

const REDDIT_WEB: &str = "https://www.reddit.com";
/// Comments folded into one analysis text.
pub const MAX_ANALYSIS_COMMENTS: usize = 10;

/// Posts (`t3` children) of a listing. Undecodable children are skipped.
pub fn posts_from_listing(listing: Listing) -> Vec<RedditPost> {
    listing
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == "t3")
        .filter_map(|child| match serde_json::from_value::<RawPost>(child.data) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!(error = %e, "reddit.post.decode_skipped");
                None
            }
        })
        .map(|raw| RedditPost {
            permalink: format!("{REDDIT_WEB}{}", raw.permalink),
            id: raw.id,
            subreddit: raw.subreddit,
            title: raw.title,
            selftext: raw.selftext.unwrap_or_default(),
            author: raw.author,
            score: raw.score,
            upvote_ratio: raw.upvote_ratio,
            num_comments: raw.num_comments,
            created: raw.created_utc,
            url: raw.url,
        })
        .collect()
}

/// Top-level comments (`t1` with a non-empty body) from a comments listing,
/// at most `limit`.
pub fn comments_from_listing(listing: Listing, limit: usize) -> Vec<RedditComment> {
    listing
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == "t1")
        .filter_map(|child| serde_json::from_value::<RawComment>(child.data).ok())
        .filter_map(|raw| {
            let body = raw.body.filter(|b| !b.is_empty())?;
            Some(RedditComment {
                id: raw.id,
                author: raw.author,
                body,
                score: raw.score,
                created: raw.created_utc,
            })
        })
        .take(limit)
        .collect()
}

/// Combined, preprocessed text submitted to the oracle for one post.
pub fn analysis_text(post: &RedditPost, comments: &[RedditComment]) -> String {
    let title = clean_markdown(&post.title);
    let body = clean_markdown(&post.selftext);
    let comments: Vec<String> = comments
        .iter()
        .map(|c| clean_markdown(&c.body))
        .filter(|t| !t.is_empty())
        .take(MAX_ANALYSIS_COMMENTS)
        .collect();

    let mut text = format!("Post Title: {title}");
    if !body.is_empty() {
        text.push_str("\n\nPost Content: ");
        text.push_str(&body);
    }
    if !comments.is_empty() {
        text.push_str("\n\nTop Comments:\n");
        text.push_str(&comments.join("\n---\n"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(v: serde_json::Value) -> Listing {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn only_t3_children_become_posts() {
        let l = listing(json!({"data": {"children": [
            {"kind": "t3", "data": {"id": "a1", "subreddit": "news", "title": "T", "selftext": "",
                "author": "u", "score": 5, "upvote_ratio": 0.9, "num_comments": 2,
                "created_utc": 1700000000.0, "url": "https://x.test", "permalink": "/r/news/comments/a1/t/"}},
            {"kind": "more", "data": {"count": 3}},
            {"kind": "t3", "data": {"id": "a2", "title": "U", "selftext": null}}
        ]}}));
        let posts = posts_from_listing(l);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].permalink, "https://www.reddit.com/r/news/comments/a1/t/");
        assert_eq!(posts[1].selftext, "");
    }

    #[test]
    fn comments_skip_empty_bodies_and_respect_limit() {
        let l = listing(json!({"data": {"children": [
            {"kind": "t1", "data": {"id": "c1", "author": "a", "body": "first", "score": 1}},
            {"kind": "t1", "data": {"id": "c2", "author": "b", "body": ""}},
            {"kind": "more", "data": {}},
            {"kind": "t1", "data": {"id": "c3", "author": "c", "body": "third"}},
            {"kind": "t1", "data": {"id": "c4", "author": "d", "body": "fourth"}}
        ]}}));
        let comments = comments_from_listing(l, 2);
        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[test]
    fn analysis_text_layout() {
        let post = RedditPost {
            id: "p".into(),
            subreddit: "s".into(),
            title: "**Big** news".into(),
            selftext: "See https://x.test/y".into(),
            author: "a".into(),
            score: 0,
            upvote_ratio: 1.0,
            num_comments: 2,
            created: 0.0,
            url: String::new(),
            permalink: String::new(),
        };
        let comment = |body: &str| RedditComment {
            id: "c".into(),
            author: "a".into(),
            body: body.into(),
            score: 0,
            created: 0.0,
        };
        let text = analysis_text(&post, &[comment("fake!"), comment("***"), comment("true")]);
        assert_eq!(
            text,
            "Post Title: Big news\n\nPost Content: See [LINK]\n\nTop Comments:\nfake!\n---\ntrue"
        );

        let bare = RedditPost {
            selftext: String::new(),
            ..post
        };
        assert_eq!(analysis_text(&bare, &[]), "Post Title: Big news");
    }
}
