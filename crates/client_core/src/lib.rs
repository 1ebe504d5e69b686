use std::sync::{Arc, Weak};

use anyhow::Result;
use shared::{
    domain::{ClubId, CommentId, FeedId, NotificationId, UserId},
    protocol::{
        Category, Club, ClubNotification, ClubsQuery, Comment, CommentCreateRequest, Feed,
        MyClub, ReportReason,
    },
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

pub mod api;
pub mod bucket;
pub mod config;
pub mod error;
pub mod events;
pub mod optimistic;
pub mod paginator;
pub mod store;

pub use api::{ClubApi, ClubPages, FeedPages, HttpClubApi};
pub use bucket::{bucketize, per_row, Bucket, MemberRoster};
pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, ClientResult};
pub use events::{AppEvent, EventBus, LogoutReason, RefetchTopic, Toast, ToastKind};
pub use optimistic::{LikeState, MutationCoordinator};
pub use paginator::{LoadOutcome, PageSnapshot, Paginator, SkipReason};
pub use store::{SessionStore, StoreAction};

const EMPTY_COMMENT_MESSAGE: &str = "enter a comment first";
const INVALID_COMMENT_MESSAGE: &str = "comment information is invalid";
const FEED_NOT_LOADED_MESSAGE: &str = "this post is no longer loaded";
const INVALID_FEED_MESSAGE: &str = "post information is invalid";
const INVALID_USER_MESSAGE: &str = "user information is invalid";

pub type FeedList = Paginator<FeedPages>;
pub type ClubList = Paginator<ClubPages>;

/// Client core behind the club app's screens.
///
/// Every failure that crosses this type is logged, shown as a warning toast,
/// and returned. An unauthorized response ends the session.
pub struct ClubClient {
    settings: ClientSettings,
    api: Arc<dyn ClubApi>,
    store: Arc<SessionStore>,
    events: EventBus,
    feeds: FeedList,
    likes: MutationCoordinator<FeedId, LikeState>,
    club_lists: Mutex<Vec<Weak<ClubList>>>,
}

impl ClubClient {
    pub fn new(settings: ClientSettings) -> Result<Arc<Self>> {
        let store = Arc::new(SessionStore::new());
        let api = Arc::new(HttpClubApi::new(&settings, Arc::clone(&store))?);
        Ok(Self::new_with_api(settings, store, api))
    }

    pub fn new_with_api(
        settings: ClientSettings,
        store: Arc<SessionStore>,
        api: Arc<dyn ClubApi>,
    ) -> Arc<Self> {
        let events = EventBus::new(settings.event_capacity);
        Arc::new(Self {
            feeds: Paginator::new("home_feed", FeedPages::new(Arc::clone(&api)), ()),
            likes: MutationCoordinator::new("feed_like"),
            club_lists: Mutex::new(Vec::new()),
            settings,
            api,
            store,
            events,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_store(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    pub fn request_refetch(&self, topic: RefetchTopic) {
        self.events.refetch(topic);
    }

    pub async fn sign_in(&self, token: impl Into<String>, user_id: Option<UserId>) {
        self.store
            .dispatch(StoreAction::SignIn {
                token: token.into(),
                user_id,
            })
            .await;
        self.feeds.reset().await;
        info!(user_id = user_id.map(|id| id.0), "session: signed in");
    }

    pub async fn logout(&self) {
        self.end_session(LogoutReason::UserRequested).await;
        self.events.toast(Toast::success("logged out"));
    }

    /// The one place session-dependent state is torn down.
    async fn end_session(&self, reason: LogoutReason) {
        self.store.dispatch(StoreAction::Clear).await;
        self.feeds.reset().await;
        self.likes.clear().await;

        let lists: Vec<Arc<ClubList>> = {
            let mut guard = self.club_lists.lock().await;
            guard.retain(|list| list.strong_count() > 0);
            guard.iter().filter_map(Weak::upgrade).collect()
        };
        for list in lists {
            list.reset().await;
        }

        self.events.publish(AppEvent::Logout { reason });
        info!(?reason, "session: ended");
    }

    async fn surface(&self, context: &'static str, err: ClientError) -> ClientError {
        warn!(context, code = err.code(), error = %err, "client: request failed");
        self.events.toast(Toast::warning(err.user_message()));
        if err.requires_reauth() {
            self.end_session(LogoutReason::SessionReplaced).await;
        }
        err
    }

    pub async fn feed_items(&self) -> Vec<Feed> {
        self.store.feeds().await
    }

    pub async fn feed_snapshot(&self) -> PageSnapshot<Feed> {
        self.feeds.snapshot().await
    }

    pub async fn load_more_feeds(&self) -> ClientResult<LoadOutcome<Feed>> {
        match self.feeds.load_next().await {
            Ok(outcome) => {
                if let LoadOutcome::Appended(items) = &outcome {
                    self.store
                        .dispatch(StoreAction::AppendFeeds(items.clone()))
                        .await;
                }
                Ok(outcome)
            }
            Err(err) => Err(self.surface("load_feeds", err).await),
        }
    }

    pub async fn refresh_feeds(&self) -> ClientResult<LoadOutcome<Feed>> {
        match self.feeds.refresh().await {
            Ok(outcome) => {
                if let LoadOutcome::Replaced(items) = &outcome {
                    self.store
                        .dispatch(StoreAction::RefreshFeeds(items.clone()))
                        .await;
                }
                Ok(outcome)
            }
            Err(err) => Err(self.surface("refresh_feeds", err).await),
        }
    }

    /// Flips the like on a loaded feed right away and settles it once the
    /// server answers. A press while the previous one is pending is rejected.
    pub async fn toggle_feed_like(&self, feed_id: FeedId) -> ClientResult<LikeState> {
        let Some(feed) = self.store.feed(feed_id).await else {
            let err = ClientError::Validation(FEED_NOT_LOADED_MESSAGE.to_string());
            return Err(self.surface("like_feed", err).await);
        };

        let previous = LikeState::new(feed.like_yn, feed.likes_count);
        let proposed = previous.toggled();
        let shown = (proposed.liked, proposed.displayed_count());
        let store = Arc::clone(&self.store);
        // Settling only replaces the optimistic value; a refresh that landed
        // meanwhile already holds the server's.
        let apply = move |state: LikeState| {
            let action = if state == proposed {
                StoreAction::SetFeedLike {
                    feed_id,
                    liked: state.liked,
                    likes_count: state.displayed_count(),
                }
            } else {
                StoreAction::SettleFeedLike {
                    feed_id,
                    expected: shown,
                    liked: state.liked,
                    likes_count: state.displayed_count(),
                }
            };
            let store = Arc::clone(&store);
            async move { store.dispatch(action).await }
        };

        let result = self
            .likes
            .run(
                feed_id,
                previous,
                proposed,
                apply,
                self.api.like_feed(feed_id),
                |echo, proposed| proposed.reconciled(echo.as_ref()),
            )
            .await;

        match result {
            Ok(echo) => Ok(proposed.reconciled(echo.as_ref())),
            Err(ClientError::Pending) => {
                debug!(feed_id = feed_id.0, "like: press ignored while pending");
                Err(ClientError::Pending)
            }
            Err(err) => Err(self.surface("like_feed", err).await),
        }
    }

    /// Deletes one of the user's own posts, then reloads the home feed.
    pub async fn delete_feed(&self, feed_id: FeedId) -> ClientResult<LoadOutcome<Feed>> {
        if feed_id.0 < 0 {
            let err = ClientError::Validation(INVALID_FEED_MESSAGE.to_string());
            return Err(self.surface("delete_feed", err).await);
        }
        if let Err(err) = self.api.delete_feed(feed_id).await {
            return Err(self.surface("delete_feed", err).await);
        }
        info!(feed_id = feed_id.0, "moderation: post deleted");
        self.after_moderation("post deleted", RefetchTopic::HomeFeed)
            .await
    }

    pub async fn report_feed(
        &self,
        feed_id: FeedId,
        reason: ReportReason,
    ) -> ClientResult<LoadOutcome<Feed>> {
        if feed_id.0 < 0 {
            let err = ClientError::Validation(INVALID_FEED_MESSAGE.to_string());
            return Err(self.surface("report_feed", err).await);
        }
        if let Err(err) = self.api.report_feed(feed_id, reason).await {
            return Err(self.surface("report_feed", err).await);
        }
        info!(feed_id = feed_id.0, ?reason, "moderation: post reported");
        self.after_moderation("report submitted", RefetchTopic::HomeFeed)
            .await
    }

    /// Blocks a post's author. Their posts disappear from every home list.
    pub async fn block_user(&self, user_id: UserId) -> ClientResult<LoadOutcome<Feed>> {
        if user_id.0 < 0 {
            let err = ClientError::Validation(INVALID_USER_MESSAGE.to_string());
            return Err(self.surface("block_user", err).await);
        }
        if let Err(err) = self.api.block_user(user_id).await {
            return Err(self.surface("block_user", err).await);
        }
        info!(user_id = user_id.0, "moderation: user blocked");
        self.after_moderation("user blocked", RefetchTopic::HomeAll)
            .await
    }

    async fn after_moderation(
        &self,
        message: &'static str,
        topic: RefetchTopic,
    ) -> ClientResult<LoadOutcome<Feed>> {
        self.events.toast(Toast::success(message));
        let outcome = self.refresh_feeds().await?;
        self.events.refetch(topic);
        Ok(outcome)
    }

    /// Loads a feed's comments and syncs the feed's comment counter.
    pub async fn load_comments(&self, feed_id: FeedId) -> ClientResult<Vec<Comment>> {
        match self.api.get_feed_comments(feed_id).await {
            Ok(comments) => {
                self.store
                    .dispatch(StoreAction::UpdateCommentCount {
                        feed_id,
                        count: comments.len() as u64,
                    })
                    .await;
                Ok(comments)
            }
            Err(err) => Err(self.surface("load_comments", err).await),
        }
    }

    /// Posts a comment and returns the reloaded comment list.
    pub async fn submit_comment(
        &self,
        feed_id: FeedId,
        content: &str,
    ) -> ClientResult<Vec<Comment>> {
        let content = content.trim();
        if content.is_empty() {
            let err = ClientError::Validation(EMPTY_COMMENT_MESSAGE.to_string());
            return Err(self.surface("submit_comment", err).await);
        }

        let request = CommentCreateRequest {
            feed_id,
            content: content.to_string(),
        };
        if let Err(err) = self.api.create_feed_comment(request).await {
            return Err(self.surface("submit_comment", err).await);
        }
        self.load_comments(feed_id).await
    }

    pub async fn delete_comment(
        &self,
        feed_id: FeedId,
        comment_id: CommentId,
    ) -> ClientResult<Vec<Comment>> {
        if comment_id.0 < 0 {
            let err = ClientError::Validation(INVALID_COMMENT_MESSAGE.to_string());
            return Err(self.surface("delete_comment", err).await);
        }
        if let Err(err) = self.api.delete_feed_comment(comment_id).await {
            return Err(self.surface("delete_comment", err).await);
        }
        let comments = self.load_comments(feed_id).await?;
        self.events.toast(Toast::success("comment deleted"));
        Ok(comments)
    }

    /// A club list for one screen. It is reset on logout while the screen
    /// holds it.
    pub async fn open_club_list(&self, query: ClubsQuery) -> Arc<ClubList> {
        let list = Arc::new(Paginator::new(
            "clubs",
            ClubPages::new(Arc::clone(&self.api)),
            query,
        ));
        let mut guard = self.club_lists.lock().await;
        guard.retain(|held| held.strong_count() > 0);
        guard.push(Arc::downgrade(&list));
        list
    }

    pub async fn load_more_clubs(&self, list: &ClubList) -> ClientResult<LoadOutcome<Club>> {
        match list.load_next().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.surface("load_clubs", err).await),
        }
    }

    pub async fn refresh_clubs(&self, list: &ClubList) -> ClientResult<LoadOutcome<Club>> {
        match list.refresh().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.surface("refresh_clubs", err).await),
        }
    }

    /// Applies new filter/sort parameters and reloads the list from the top.
    pub async fn filter_clubs(
        &self,
        list: &ClubList,
        query: ClubsQuery,
    ) -> ClientResult<LoadOutcome<Club>> {
        debug!(
            list = list.label(),
            filtered = query.uses_filter(),
            "clubs: query changed"
        );
        match list.set_query(query).await {
            Ok(outcome) => {
                self.events.refetch(RefetchTopic::ClubListScrollToTop);
                Ok(outcome)
            }
            Err(err) => Err(self.surface("filter_clubs", err).await),
        }
    }

    /// Member rows for the club home, sized for `screen_width`.
    ///
    /// Also records the signed-in user's role in that club.
    pub async fn club_roster(
        &self,
        club_id: ClubId,
        screen_width: u32,
    ) -> ClientResult<MemberRoster> {
        let club = match self.api.get_club(club_id).await {
            Ok(club) => club,
            Err(err) => return Err(self.surface("club_roster", err).await),
        };

        if let Some(user_id) = self.store.user_id().await {
            let role = club
                .members
                .iter()
                .find(|member| member.id == user_id)
                .and_then(|member| member.member_role());
            self.store
                .dispatch(StoreAction::SetClubRole { club_id, role })
                .await;
        }

        let available = screen_width.saturating_sub(self.settings.screen_padding);
        let per_line = per_row(
            available,
            self.settings.member_icon_size,
            self.settings.member_icon_gap,
        );
        Ok(MemberRoster::split(&club.members, per_line))
    }

    pub async fn category_pages(&self, include_all: bool) -> ClientResult<Vec<Bucket<Category>>> {
        match self.api.get_categories().await {
            Ok(categories) => Ok(bucket::category_pages(
                &categories,
                self.settings.category_page_size,
                include_all,
            )),
            Err(err) => Err(self.surface("categories", err).await),
        }
    }

    pub async fn club_notifications(
        &self,
        club_id: ClubId,
    ) -> ClientResult<Vec<ClubNotification>> {
        match self.api.get_club_notifications(club_id).await {
            Ok(notifications) => Ok(notifications),
            Err(err) => Err(self.surface("club_notifications", err).await),
        }
    }

    /// Clubs the user belongs to. Pending applications are left out.
    pub async fn my_clubs(&self) -> ClientResult<Vec<MyClub>> {
        match self.api.get_my_clubs().await {
            Ok(clubs) => Ok(clubs.into_iter().filter(MyClub::is_approved).collect()),
            Err(err) => Err(self.surface("my_clubs", err).await),
        }
    }

    pub async fn read_notification(&self, notification_id: NotificationId) -> ClientResult<()> {
        match self.api.read_notification(notification_id).await {
            Ok(()) => {
                self.events.refetch(RefetchTopic::ClubNotifications);
                Ok(())
            }
            Err(err) => Err(self.surface("read_notification", err).await),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
