use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CategoryId, ClubId, ClubSortType, CommentId, FeedId, MemberRole, NotificationId, SortOrder,
    UserId,
};

/// An entity that can appear in a cursor-paginated list.
pub trait CursorItem {
    type Key: Copy + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync;

    /// Identity used to keep an aggregate free of duplicates.
    fn item_key(&self) -> Self::Key;

    /// Opaque position token the server attaches to the item, if any.
    fn cursor(&self) -> Option<&str>;
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct PageResponse<T> {
    #[serde(default)]
    pub content: Vec<T>,
    #[serde(default, alias = "hasData")]
    pub has_next: bool,
}

/// Envelope of single-resource and mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct DataResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: FeedId,
    pub club_id: ClubId,
    #[serde(default)]
    pub club_name: String,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub like_yn: bool,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_cursor: Option<String>,
}

impl CursorItem for Feed {
    type Key = FeedId;

    fn item_key(&self) -> FeedId {
        self.id
    }

    fn cursor(&self) -> Option<&str> {
        self.custom_cursor.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubMember {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ClubMember {
    pub fn member_role(&self) -> Option<MemberRole> {
        self.role.as_deref().and_then(MemberRole::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: ClubId,
    pub name: String,
    #[serde(default)]
    pub club_short_desc: String,
    #[serde(default)]
    pub club_long_desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub recruit_status: Option<String>,
    #[serde(default)]
    pub max_number: u32,
    #[serde(default)]
    pub recruit_number: u32,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub members: Vec<ClubMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_cursor: Option<String>,
}

impl CursorItem for Club {
    type Key = ClubId;

    fn item_key(&self) -> ClubId {
        self.id
    }

    fn cursor(&self) -> Option<&str> {
        self.custom_cursor.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubNotification {
    pub id: NotificationId,
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Server echo of a like mutation. Both fields are optional; the client keeps
/// its optimistic value for whatever is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeEcho {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_yn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreateRequest {
    pub feed_id: FeedId,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportReason {
    #[default]
    Spam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedReportRequest {
    pub reason: ReportReason,
}

/// A club on the user's profile, with the state of their membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyClub {
    pub id: ClubId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_status: Option<String>,
}

impl MyClub {
    /// Applications still waiting for a manager are not memberships yet.
    pub fn is_approved(&self) -> bool {
        self.apply_status
            .as_deref()
            .is_some_and(|status| status.eq_ignore_ascii_case("APPROVED"))
    }
}

/// Filter and sort parameters of the club list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    pub show_recruiting: bool,
    pub show_my: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_member: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_member: Option<u32>,
    pub sort_type: ClubSortType,
    pub order_by: SortOrder,
}

impl ClubsQuery {
    /// Category id 0 is the synthetic "all categories" entry and is never sent.
    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = (category_id.0 != 0).then_some(category_id);
        self
    }

    pub fn uses_filter(&self) -> bool {
        self.show_recruiting
            || self.show_my
            || self.min_member.is_some()
            || self.max_member.is_some()
    }
}
