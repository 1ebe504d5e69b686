use super::*;
use shared::domain::{ClubId, UserId};

fn feed(id: i64) -> Feed {
    Feed {
        id: FeedId(id),
        club_id: ClubId(1),
        club_name: "hikers".to_string(),
        user_id: UserId(9),
        user_name: "kim".to_string(),
        content: format!("post {id}"),
        image_urls: Vec::new(),
        like_yn: false,
        likes_count: 10,
        comment_count: 0,
        created: None,
        custom_cursor: Some(format!("c{id}")),
    }
}

#[tokio::test]
async fn append_skips_feeds_already_held() {
    let store = SessionStore::new();
    store
        .dispatch(StoreAction::AppendFeeds(vec![feed(1), feed(2)]))
        .await;
    store
        .dispatch(StoreAction::AppendFeeds(vec![feed(2), feed(3)]))
        .await;

    let ids: Vec<i64> = store.feeds().await.iter().map(|f| f.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn refresh_replaces_feeds_wholesale() {
    let store = SessionStore::new();
    store
        .dispatch(StoreAction::AppendFeeds(vec![feed(1), feed(2)]))
        .await;
    store.dispatch(StoreAction::RefreshFeeds(vec![feed(7)])).await;

    let ids: Vec<i64> = store.feeds().await.iter().map(|f| f.id.0).collect();
    assert_eq!(ids, vec![7]);
}

#[tokio::test]
async fn every_dispatch_bumps_version_and_notifies() {
    let store = SessionStore::new();
    let mut rx = store.subscribe();
    assert_eq!(store.version(), 0);

    store
        .dispatch(StoreAction::SignIn {
            token: "Bearer abc".to_string(),
            user_id: Some(UserId(3)),
        })
        .await;

    rx.changed().await.expect("version change");
    assert_eq!(*rx.borrow(), 1);
    assert_eq!(store.token().await.as_deref(), Some("Bearer abc"));
    assert_eq!(store.user_id().await, Some(UserId(3)));
}

#[tokio::test]
async fn like_and_comment_updates_target_one_feed() {
    let store = SessionStore::new();
    store
        .dispatch(StoreAction::AppendFeeds(vec![feed(1), feed(2)]))
        .await;
    store
        .dispatch(StoreAction::SetFeedLike {
            feed_id: FeedId(2),
            liked: true,
            likes_count: 11,
        })
        .await;
    store
        .dispatch(StoreAction::UpdateCommentCount {
            feed_id: FeedId(2),
            count: 4,
        })
        .await;

    let untouched = store.feed(FeedId(1)).await.expect("feed 1");
    assert!(!untouched.like_yn);
    let updated = store.feed(FeedId(2)).await.expect("feed 2");
    assert!(updated.like_yn);
    assert_eq!(updated.likes_count, 11);
    assert_eq!(updated.comment_count, 4);
}

#[tokio::test]
async fn club_role_is_scoped_to_its_club() {
    let store = SessionStore::new();
    store
        .dispatch(StoreAction::SetClubRole {
            club_id: ClubId(5),
            role: Some(MemberRole::Manager),
        })
        .await;

    assert_eq!(store.club_role(ClubId(5)).await, Some(MemberRole::Manager));
    assert_eq!(store.club_role(ClubId(6)).await, None);
}

#[tokio::test]
async fn clear_drops_session_and_feeds() {
    let store = SessionStore::new();
    store
        .dispatch(StoreAction::SignIn {
            token: "t".to_string(),
            user_id: None,
        })
        .await;
    store.dispatch(StoreAction::AppendFeeds(vec![feed(1)])).await;
    store.dispatch(StoreAction::Clear).await;

    let state = store.snapshot().await;
    assert!(state.token.is_none());
    assert!(state.feeds.is_empty());
    assert_eq!(store.version(), 3);
}

#[tokio::test]
async fn settle_like_only_touches_the_value_it_expects() {
    let store = SessionStore::new();
    store
        .dispatch(StoreAction::AppendFeeds(vec![feed(1), feed(2)]))
        .await;
    store
        .dispatch(StoreAction::SetFeedLike {
            feed_id: FeedId(1),
            liked: true,
            likes_count: 11,
        })
        .await;

    store
        .dispatch(StoreAction::SettleFeedLike {
            feed_id: FeedId(1),
            expected: (true, 11),
            liked: false,
            likes_count: 10,
        })
        .await;
    store
        .dispatch(StoreAction::SettleFeedLike {
            feed_id: FeedId(2),
            expected: (true, 11),
            liked: true,
            likes_count: 99,
        })
        .await;

    let first = store.feed(FeedId(1)).await.expect("feed 1");
    assert_eq!((first.like_yn, first.likes_count), (false, 10));
    let second = store.feed(FeedId(2)).await.expect("feed 2");
    assert_eq!((second.like_yn, second.likes_count), (false, 10));
}
