//! Client-side feed state.
//!
//! Every transition here is a plain function of the current state and a
//! result. The UI layer performs the network calls and feeds the outcomes
//! back in, so the like bookkeeping can be tested without a browser.

use std::collections::HashMap;

use crate::PostView;

/// Case-insensitive substring match on title or content, in input order.
pub fn filter_posts(posts: &[PostView], query: &str) -> Vec<PostView> {
    let needle = query.to_lowercase();
    posts
        .iter()
        .filter(|p| {
            p.post.title.to_lowercase().contains(&needle)
                || p.post.content.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// The posts to show for a search box value. An empty query shows everything.
pub fn visible_posts(posts: &[PostView], query: &str) -> Vec<PostView> {
    if query.is_empty() {
        posts.to_vec()
    } else {
        filter_posts(posts, query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LikeError {
    #[error("please log in to like posts")]
    AuthRequired,
    #[error("a like for post {0} is already in flight")]
    InFlight(i64),
    #[error("post {0} is not in the feed")]
    UnknownPost(i64),
}

/// What the effect layer has to send after [`FeedState::begin_like`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeIntent {
    pub post_id: i64,
    /// Like state before the optimistic flip.
    pub currently_liked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FeedState {
    posts: Vec<PostView>,
    latest_request: u64,
    loading: bool,
    /// Snapshots of posts with a like toggle in flight, keyed by post id.
    pending_likes: HashMap<i64, PostView>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> &[PostView] {
        &self.posts
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_pending(&self, post_id: i64) -> bool {
        self.pending_likes.contains_key(&post_id)
    }

    pub fn visible(&self, query: &str) -> Vec<PostView> {
        visible_posts(&self.posts, query)
    }

    /// Starts a feed load and returns its request number.
    pub fn begin_load(&mut self) -> u64 {
        self.latest_request += 1;
        self.loading = true;
        self.latest_request
    }

    /// Installs a loaded feed. Returns `false` and leaves the state alone
    /// when a newer load has been started since `request` was issued.
    pub fn finish_load(&mut self, request: u64, posts: Vec<PostView>) -> bool {
        if request != self.latest_request {
            return false;
        }
        self.loading = false;
        self.posts = posts;
        // Entries for in-flight toggles are re-applied so a reload does not
        // undo an optimistic flip that has not settled yet.
        for (id, snapshot) in &self.pending_likes {
            if let Some(post) = self.posts.iter_mut().find(|p| p.post.id == *id) {
                if post.is_liked == snapshot.is_liked {
                    flip(post);
                }
            }
        }
        true
    }

    /// Applies the optimistic like/unlike for `viewer` and marks the post
    /// in flight.
    pub fn begin_like(
        &mut self,
        post_id: i64,
        viewer: Option<i64>,
    ) -> Result<LikeIntent, LikeError> {
        if viewer.is_none() {
            return Err(LikeError::AuthRequired);
        }
        if self.pending_likes.contains_key(&post_id) {
            return Err(LikeError::InFlight(post_id));
        }
        let post = self
            .posts
            .iter_mut()
            .find(|p| p.post.id == post_id)
            .ok_or(LikeError::UnknownPost(post_id))?;

        let intent = LikeIntent {
            post_id,
            currently_liked: post.is_liked,
        };
        self.pending_likes.insert(post_id, post.clone());
        flip(post);
        Ok(intent)
    }

    /// Replaces the optimistic entry with the server's view of the post.
    pub fn settle_like(&mut self, confirmed: PostView) {
        let id = confirmed.post.id;
        self.pending_likes.remove(&id);
        if let Some(post) = self.posts.iter_mut().find(|p| p.post.id == id) {
            *post = confirmed;
        }
    }

    /// Rolls a failed toggle back to the state it started from.
    pub fn fail_like(&mut self, post_id: i64) {
        if let Some(snapshot) = self.pending_likes.remove(&post_id) {
            if let Some(post) = self.posts.iter_mut().find(|p| p.post.id == post_id) {
                *post = snapshot;
            }
        }
    }
}

fn flip(post: &mut PostView) {
    if post.is_liked {
        post.is_liked = false;
        post.post.like_count = (post.post.like_count - 1).max(0);
    } else {
        post.is_liked = true;
        post.post.like_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Post;

    fn view(id: i64, title: &str, content: &str, likes: i64, liked: bool) -> PostView {
        PostView {
            post: Post {
                id,
                title: title.to_string(),
                content: content.to_string(),
                image_url: None,
                author_id: 1,
                author: "writer".to_string(),
                created_at: format!("2024-05-0{id}T10:00:00.000Z"),
                like_count: likes,
                comments: Vec::new(),
            },
            is_liked: liked,
        }
    }

    fn sample() -> Vec<PostView> {
        vec![
            view(1, "The Dragon Queen", "fire and ash", 3, false),
            view(2, "Quiet Harbour", "a story about DRAGONS at sea", 0, false),
            view(3, "Night Train", "strangers on rails", 1, true),
        ]
    }

    fn loaded(posts: Vec<PostView>) -> FeedState {
        let mut state = FeedState::new();
        let req = state.begin_load();
        assert!(state.finish_load(req, posts));
        state
    }

    #[test]
    fn empty_query_is_identity() {
        let posts = sample();
        assert_eq!(visible_posts(&posts, ""), posts);
    }

    #[test]
    fn query_whitespace_is_part_of_the_match() {
        let posts = sample();
        let ids: Vec<i64> = visible_posts(&posts, "dragon ")
            .iter()
            .map(|p| p.post.id)
            .collect();
        assert_eq!(ids, vec![1]);
        assert!(visible_posts(&posts, "   ").is_empty());
    }

    #[test]
    fn filter_matches_title_or_content_ignoring_case() {
        let posts = sample();
        let hits = filter_posts(&posts, "dragon");
        let ids: Vec<i64> = hits.iter().map(|p| p.post.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn filter_with_no_match_is_empty() {
        assert!(filter_posts(&sample(), "submarine").is_empty());
    }

    #[test]
    fn stale_load_is_discarded() {
        let mut state = FeedState::new();
        let first = state.begin_load();
        let second = state.begin_load();

        assert!(state.finish_load(second, sample()));
        assert!(!state.finish_load(first, Vec::new()));
        assert_eq!(state.posts().len(), 3);
        assert!(!state.is_loading());
    }

    #[test]
    fn like_requires_viewer() {
        let mut state = loaded(sample());
        assert_eq!(state.begin_like(1, None), Err(LikeError::AuthRequired));
        assert_eq!(state.posts()[0].post.like_count, 3);
        assert!(!state.is_pending(1));
    }

    #[test]
    fn like_then_settle_uses_server_view() {
        let mut state = loaded(sample());
        let intent = state.begin_like(1, Some(9)).unwrap();
        assert!(!intent.currently_liked);
        assert_eq!(state.posts()[0].post.like_count, 4);
        assert!(state.posts()[0].is_liked);

        let server = view(1, "The Dragon Queen", "fire and ash", 5, true);
        state.settle_like(server.clone());
        assert_eq!(state.posts()[0], server);
        assert!(!state.is_pending(1));
    }

    #[test]
    fn second_toggle_while_pending_is_refused() {
        let mut state = loaded(sample());
        state.begin_like(1, Some(9)).unwrap();
        assert_eq!(state.begin_like(1, Some(9)), Err(LikeError::InFlight(1)));
        assert_eq!(state.posts()[0].post.like_count, 4);
    }

    #[test]
    fn failed_toggle_rolls_back() {
        let mut state = loaded(sample());
        let before = state.posts()[2].clone();
        let intent = state.begin_like(3, Some(9)).unwrap();
        assert!(intent.currently_liked);
        assert_eq!(state.posts()[2].post.like_count, 0);

        state.fail_like(3);
        assert_eq!(state.posts()[2], before);
        assert!(!state.is_pending(3));
    }

    #[test]
    fn unlike_never_goes_negative() {
        // Inconsistent cache: marked liked but the counter already at zero.
        let mut state = loaded(vec![view(4, "Drift", "", 0, true)]);
        state.begin_like(4, Some(9)).unwrap();
        assert_eq!(state.posts()[0].post.like_count, 0);
        assert!(!state.posts()[0].is_liked);
    }

    #[test]
    fn unknown_post_is_reported() {
        let mut state = loaded(sample());
        assert_eq!(state.begin_like(42, Some(9)), Err(LikeError::UnknownPost(42)));
    }

    #[test]
    fn reload_keeps_pending_flip() {
        let mut state = loaded(sample());
        state.begin_like(2, Some(9)).unwrap();

        let req = state.begin_load();
        assert!(state.finish_load(req, sample()));
        let post = &state.posts()[1];
        assert!(post.is_liked);
        assert_eq!(post.post.like_count, 1);
    }
}
