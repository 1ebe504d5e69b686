use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ClubId, CommentId, FeedId, NotificationId, UserId},
    protocol::{
        Category, Club, ClubNotification, ClubsQuery, Comment, CommentCreateRequest,
        DataResponse, Feed, FeedReportRequest, LikeEcho, MyClub, PageResponse, ReportReason,
    },
};
use tracing::debug;

use crate::{
    config::ClientSettings,
    error::{ClientError, ClientResult},
    paginator::PageSource,
    store::SessionStore,
};

#[async_trait]
pub trait ClubApi: Send + Sync {
    async fn get_feeds(&self, cursor: Option<&str>) -> ClientResult<PageResponse<Feed>>;
    async fn like_feed(&self, feed_id: FeedId) -> ClientResult<Option<LikeEcho>>;
    async fn delete_feed(&self, feed_id: FeedId) -> ClientResult<()>;
    async fn report_feed(&self, feed_id: FeedId, reason: ReportReason) -> ClientResult<()>;
    async fn block_user(&self, user_id: UserId) -> ClientResult<()>;
    async fn get_feed_comments(&self, feed_id: FeedId) -> ClientResult<Vec<Comment>>;
    async fn create_feed_comment(&self, request: CommentCreateRequest) -> ClientResult<()>;
    async fn delete_feed_comment(&self, comment_id: CommentId) -> ClientResult<()>;
    async fn get_clubs(
        &self,
        query: &ClubsQuery,
        cursor: Option<&str>,
    ) -> ClientResult<PageResponse<Club>>;
    async fn get_club(&self, club_id: ClubId) -> ClientResult<Club>;
    async fn get_categories(&self) -> ClientResult<Vec<Category>>;
    async fn get_club_notifications(&self, club_id: ClubId)
        -> ClientResult<Vec<ClubNotification>>;
    async fn read_notification(&self, notification_id: NotificationId) -> ClientResult<()>;
    async fn get_my_clubs(&self) -> ClientResult<Vec<MyClub>>;
}

pub struct HttpClubApi {
    http: Client,
    base_url: String,
    store: Arc<SessionStore>,
}

impl HttpClubApi {
    pub fn new(settings: &ClientSettings, store: Arc<SessionStore>) -> anyhow::Result<Self> {
        let base_url = settings.normalized_base_url()?;
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends with the session token attached and folds every failure into
    /// [`ClientError`].
    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let builder = match self.store.token().await {
            Some(token) => builder.header(AUTHORIZATION, token),
            None => builder,
        };
        let response = builder.send().await.map_err(ClientError::from_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let err = ClientError::from_status(status, &body);
        debug!(status = status.as_u16(), error = %err, "api: request failed");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(ClientError::from_transport)
    }

    /// Reads an optional `data` envelope; an empty body means no data.
    async fn send_data<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> ClientResult<Option<T>> {
        let body = self
            .send(builder)
            .await?
            .bytes()
            .await
            .map_err(ClientError::from_transport)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice::<DataResponse<T>>(&body)
            .map(|envelope| envelope.data)
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    async fn send_required<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> ClientResult<T> {
        self.send_data(builder)
            .await?
            .ok_or_else(|| ClientError::Decode(format!("{what} response carried no data")))
    }
}

#[async_trait]
impl ClubApi for HttpClubApi {
    async fn get_feeds(&self, cursor: Option<&str>) -> ClientResult<PageResponse<Feed>> {
        let mut builder = self.http.get(self.url("/feeds"));
        if let Some(cursor) = cursor {
            builder = builder.query(&[("cursor", cursor)]);
        }
        self.send_json(builder).await
    }

    async fn like_feed(&self, feed_id: FeedId) -> ClientResult<Option<LikeEcho>> {
        self.send_data(self.http.post(self.url(&format!("/feeds/{feed_id}/likes"))))
            .await
    }

    async fn delete_feed(&self, feed_id: FeedId) -> ClientResult<()> {
        self.send(self.http.delete(self.url(&format!("/feeds/{feed_id}"))))
            .await
            .map(|_| ())
    }

    async fn report_feed(&self, feed_id: FeedId, reason: ReportReason) -> ClientResult<()> {
        let builder = self
            .http
            .post(self.url(&format!("/feeds/{feed_id}/reports")))
            .json(&FeedReportRequest { reason });
        self.send(builder).await.map(|_| ())
    }

    async fn block_user(&self, user_id: UserId) -> ClientResult<()> {
        self.send(self.http.post(self.url(&format!("/users/{user_id}/block"))))
            .await
            .map(|_| ())
    }

    async fn get_feed_comments(&self, feed_id: FeedId) -> ClientResult<Vec<Comment>> {
        Ok(self
            .send_data(self.http.get(self.url(&format!("/feeds/{feed_id}/comments"))))
            .await?
            .unwrap_or_default())
    }

    async fn create_feed_comment(&self, request: CommentCreateRequest) -> ClientResult<()> {
        let builder = self
            .http
            .post(self.url(&format!("/feeds/{}/comments", request.feed_id)))
            .json(&request);
        self.send(builder).await.map(|_| ())
    }

    async fn delete_feed_comment(&self, comment_id: CommentId) -> ClientResult<()> {
        self.send(self.http.delete(self.url(&format!("/comments/{comment_id}"))))
            .await
            .map(|_| ())
    }

    async fn get_clubs(
        &self,
        query: &ClubsQuery,
        cursor: Option<&str>,
    ) -> ClientResult<PageResponse<Club>> {
        let mut builder = self.http.get(self.url("/clubs")).query(query);
        if let Some(cursor) = cursor {
            builder = builder.query(&[("cursor", cursor)]);
        }
        self.send_json(builder).await
    }

    async fn get_club(&self, club_id: ClubId) -> ClientResult<Club> {
        self.send_required(self.http.get(self.url(&format!("/clubs/{club_id}"))), "club")
            .await
    }

    async fn get_categories(&self) -> ClientResult<Vec<Category>> {
        Ok(self
            .send_data(self.http.get(self.url("/categories")))
            .await?
            .unwrap_or_default())
    }

    async fn get_club_notifications(
        &self,
        club_id: ClubId,
    ) -> ClientResult<Vec<ClubNotification>> {
        Ok(self
            .send_data(
                self.http
                    .get(self.url(&format!("/clubs/{club_id}/notifications"))),
            )
            .await?
            .unwrap_or_default())
    }

    async fn read_notification(&self, notification_id: NotificationId) -> ClientResult<()> {
        self.send(
            self.http
                .post(self.url(&format!("/notifications/{notification_id}/read"))),
        )
        .await
        .map(|_| ())
    }

    async fn get_my_clubs(&self) -> ClientResult<Vec<MyClub>> {
        Ok(self
            .send_data(self.http.get(self.url("/users/me/clubs")))
            .await?
            .unwrap_or_default())
    }
}

/// Home feed pages.
pub struct FeedPages {
    api: Arc<dyn ClubApi>,
}

impl FeedPages {
    pub fn new(api: Arc<dyn ClubApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for FeedPages {
    type Item = Feed;
    type Query = ();

    async fn fetch_page(
        &self,
        _query: &(),
        cursor: Option<&str>,
    ) -> ClientResult<PageResponse<Feed>> {
        self.api.get_feeds(cursor).await
    }
}

/// Club list pages for the current filter and sort.
pub struct ClubPages {
    api: Arc<dyn ClubApi>,
}

impl ClubPages {
    pub fn new(api: Arc<dyn ClubApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for ClubPages {
    type Item = Club;
    type Query = ClubsQuery;

    async fn fetch_page(
        &self,
        query: &ClubsQuery,
        cursor: Option<&str>,
    ) -> ClientResult<PageResponse<Club>> {
        self.api.get_clubs(query, cursor).await
    }
}
