//! Process-wide session state, changed only through [`StoreAction`]s.

use std::collections::HashSet;

use shared::{
    domain::{ClubId, FeedId, MemberRole, UserId},
    protocol::Feed,
};
use tokio::sync::{watch, RwLock};

#[derive(Debug, Clone)]
pub enum StoreAction {
    SignIn { token: String, user_id: Option<UserId> },
    AppendFeeds(Vec<Feed>),
    RefreshFeeds(Vec<Feed>),
    SetFeedLike { feed_id: FeedId, liked: bool, likes_count: u64 },
    /// Like settlement; applied only while the feed still shows `expected`.
    SettleFeedLike {
        feed_id: FeedId,
        expected: (bool, u64),
        liked: bool,
        likes_count: u64,
    },
    UpdateCommentCount { feed_id: FeedId, count: u64 },
    SetClubRole { club_id: ClubId, role: Option<MemberRole> },
    Clear,
}

#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub token: Option<String>,
    pub user_id: Option<UserId>,
    pub feeds: Vec<Feed>,
    pub club_role: Option<(ClubId, MemberRole)>,
}

pub struct SessionStore {
    state: RwLock<StoreState>,
    version: watch::Sender<u64>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(StoreState::default()),
            version,
        }
    }

    pub async fn dispatch(&self, action: StoreAction) {
        let mut state = self.state.write().await;
        reduce(&mut state, action);
        self.version.send_modify(|version| *version += 1);
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.state.read().await.user_id
    }

    pub async fn feeds(&self) -> Vec<Feed> {
        self.state.read().await.feeds.clone()
    }

    pub async fn feed(&self, feed_id: FeedId) -> Option<Feed> {
        self.state
            .read()
            .await
            .feeds
            .iter()
            .find(|feed| feed.id == feed_id)
            .cloned()
    }

    pub async fn club_role(&self, club_id: ClubId) -> Option<MemberRole> {
        match self.state.read().await.club_role {
            Some((held, role)) if held == club_id => Some(role),
            _ => None,
        }
    }

    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }
}

fn reduce(state: &mut StoreState, action: StoreAction) {
    match action {
        StoreAction::SignIn { token, user_id } => {
            state.token = Some(token);
            state.user_id = user_id;
        }
        StoreAction::AppendFeeds(feeds) => {
            let mut seen: HashSet<FeedId> = state.feeds.iter().map(|feed| feed.id).collect();
            state
                .feeds
                .extend(feeds.into_iter().filter(|feed| seen.insert(feed.id)));
        }
        StoreAction::RefreshFeeds(feeds) => state.feeds = feeds,
        StoreAction::SetFeedLike {
            feed_id,
            liked,
            likes_count,
        } => {
            if let Some(feed) = state.feeds.iter_mut().find(|feed| feed.id == feed_id) {
                feed.like_yn = liked;
                feed.likes_count = likes_count;
            }
        }
        StoreAction::SettleFeedLike {
            feed_id,
            expected,
            liked,
            likes_count,
        } => {
            if let Some(feed) = state.feeds.iter_mut().find(|feed| feed.id == feed_id) {
                if (feed.like_yn, feed.likes_count) == expected {
                    feed.like_yn = liked;
                    feed.likes_count = likes_count;
                }
            }
        }
        StoreAction::UpdateCommentCount { feed_id, count } => {
            if let Some(feed) = state.feeds.iter_mut().find(|feed| feed.id == feed_id) {
                feed.comment_count = count;
            }
        }
        StoreAction::SetClubRole { club_id, role } => {
            state.club_role = role.map(|role| (club_id, role));
        }
        StoreAction::Clear => *state = StoreState::default(),
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
