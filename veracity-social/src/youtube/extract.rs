//! Mapping from Data API resources to domain types, and analysis text.
use crate::preprocess::clean_video_text;
use crate::youtube::types::{CommentThread, VideoItem, YouTubeComment, YouTubeVideo};

/// Comments must be longer than this (in characters) to be analyzed.
pub const MIN_COMMENT_CHARS: usize = 10;
pub const MAX_ANALYSIS_COMMENTS: usize = 30;

fn count(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0)
}

pub fn video_from_item(item: VideoItem) -> YouTubeVideo {
    let thumbnails = &item.snippet.thumbnails;
    let thumbnail_url = thumbnails
        .medium
        .as_ref()
        .or(thumbnails.default.as_ref())
        .map(|t| t.url.clone())
        .unwrap_or_default();
    YouTubeVideo {
        view_count: count(item.statistics.view_count.as_deref()),
        like_count: count(item.statistics.like_count.as_deref()),
        comment_count: count(item.statistics.comment_count.as_deref()),
        thumbnail_url,
        id: item.id,
        title: item.snippet.title,
        description: item.snippet.description,
        channel_id: item.snippet.channel_id,
        channel_title: item.snippet.channel_title,
        published_at: item.snippet.published_at,
        duration: item.content_details.duration,
        tags: item.snippet.tags,
    }
}

pub fn comment_from_thread(thread: CommentThread) -> YouTubeComment {
    let top = thread.snippet.top_level_comment;
    YouTubeComment {
        id: top.id,
        author_display_name: top.snippet.author_display_name,
        text_display: top.snippet.text_display,
        like_count: top.snippet.like_count,
        published_at: top.snippet.published_at,
        video_id: top.snippet.video_id,
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Combined, preprocessed text submitted to the oracle for one video.
pub fn analysis_text(video: &YouTubeVideo, comments: &[YouTubeComment]) -> String {
    let title = clean_video_text(&video.title);
    let description = clean_video_text(&video.description);
    let comments = comments
        .iter()
        .map(|c| clean_video_text(&c.text_display))
        .filter(|t| t.chars().count() > MIN_COMMENT_CHARS)
        .take(MAX_ANALYSIS_COMMENTS)
        .collect::<Vec<_>>()
        .join(" | ");

    format!(
        "VIDEO TITLE: {title}\n\nVIDEO DESCRIPTION: {description}\n\nTOP COMMENTS: {comments}\n\nCHANNEL: {}\nVIEWS: {}\nCOMMENTS: {}",
        video.channel_title, video.view_count, video.comment_count
    )
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube::types::VideosResponse;
    use serde_json::json;

    #[test]
    fn video_fields_and_count_defaults() {
        let resp: VideosResponse = serde_json::from_value(json!({"items": [{
            "id": "v1",
            "snippet": {"title": "T", "description": "D", "channelId": "c", "channelTitle": "Chan",
                "publishedAt": "2024-01-01T00:00:00Z",
                "thumbnails": {"default": {"url": "https://i.test/d.jpg"}}},
            "statistics": {"viewCount": "1234", "commentCount": "oops"},
            "contentDetails": {"duration": "PT1M"}
        }]})).unwrap();
        let video = video_from_item(resp.items.into_iter().next().unwrap());
        assert_eq!(video.view_count, 1234);
        assert_eq!(video.like_count, 0);
        assert_eq!(video.comment_count, 0);
        assert_eq!(video.thumbnail_url, "https://i.test/d.jpg");
        assert!(video.tags.is_empty());
    }

    #[test]
    fn analysis_text_filters_short_comments() {
        let video = YouTubeVideo {
            id: "v".into(),
            title: "Cure 🔥 revealed".into(),
            description: "Watch https://x.test".into(),
            channel_id: "c".into(),
            channel_title: "Chan".into(),
            published_at: String::new(),
            view_count: 10,
            like_count: 0,
            comment_count: 2,
            thumbnail_url: String::new(),
            duration: String::new(),
            tags: vec![],
        };
        let comment = |t: &str| YouTubeComment {
            id: "c".into(),
            author_display_name: "a".into(),
            text_display: t.into(),
            like_count: 0,
            published_at: String::new(),
            video_id: "v".into(),
        };
        let text = analysis_text(
            &video,
            &[comment("lol"), comment("this is definitely true"), comment("share before deleted")],
        );
        assert_eq!(
            text,
            "VIDEO TITLE: Cure revealed\n\nVIDEO DESCRIPTION: Watch [LINK]\n\nTOP COMMENTS: this is definitely true | share before deleted\n\nCHANNEL: Chan\nVIEWS: 10\nCOMMENTS: 2"
        );
    }
}
