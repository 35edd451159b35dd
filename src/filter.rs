use tracing::debug;

use crate::models::Post;
use crate::query::Expr;

/// Keep the posts whose text satisfies `expr`, preserving input order.
///
/// Posts with empty text never match; they are dropped silently and only
/// counted in the logs.
pub fn filter_posts(expr: &Expr, posts: Vec<Post>) -> Vec<Post> {
    let total = posts.len();
    let mut skipped_empty = 0usize;

    let kept: Vec<Post> = posts
        .into_iter()
        .filter(|p| {
            if p.text.trim().is_empty() {
                skipped_empty += 1;
                return false;
            }
            expr.matches(&p.text)
        })
        .collect();

    if skipped_empty > 0 {
        debug!("Query filter skipped {} posts with no text", skipped_empty);
    }
    debug!("Query filter retained {}/{} posts", kept.len(), total);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_timestamp;

    fn post(text: &str) -> Post {
        Post {
            author_handle: "user.test".into(),
            author_display_name: "User".into(),
            created_at: parse_timestamp("2025-03-01T12:00:00Z").unwrap(),
            text: text.into(),
            uri: "at://test".into(),
            reply_count: Some(0),
            quote_count: Some(0),
            repost_count: Some(0),
            embed_type: None,
            platform: "bluesky".into(),
            language: "en".into(),
        }
    }

    #[test]
    fn retains_only_matching_posts_in_order() {
        let expr = Expr::parse("trekking AND (poles OR sticks) NOT broken").unwrap();
        let posts = vec![
            post("I love my new trekking poles"),
            post("trekking sticks are broken"),
            post("cycling gear review"),
        ];
        let kept = filter_posts(&expr, posts);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "I love my new trekking poles");
    }

    #[test]
    fn empty_text_never_matches() {
        // `NOT x` would match an empty string by substring rules; posts
        // without text are excluded outright instead.
        let expr = Expr::parse("NOT broken").unwrap();
        let kept = filter_posts(&expr, vec![post(""), post("  "), post("fine")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "fine");
    }

    #[test]
    fn preserves_relative_order() {
        let expr = Expr::parse("hike").unwrap();
        let kept = filter_posts(
            &expr,
            vec![post("hike one"), post("nope"), post("hike two"), post("hike three")],
        );
        let texts: Vec<_> = kept.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["hike one", "hike two", "hike three"]);
    }
}
