mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn get_user_by_login(&self, identifier: &str) -> Result<Option<User>>;
    fn update_user_profile(&self, id: &str, full_name: &str, email: &str) -> Result<()>;
    fn update_user_password(&self, id: &str, password_hash: &str) -> Result<()>;
    fn update_user_avatar(&self, id: &str, avatar: &str) -> Result<()>;
    fn update_user_cover_image(&self, id: &str, cover_image: &str) -> Result<()>;
    /// Overwrites the single active refresh token; `None` logs the user out.
    fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<()>;

    // Watch history operations
    fn push_watch_entry(&self, user_id: &str, video_id: &str) -> Result<()>;
    fn clear_watch_history(&self, user_id: &str) -> Result<()>;
    fn watch_history(&self, user_id: &str) -> Result<Vec<WatchedVideo>>;

    // Video operations
    fn create_video(&self, video: &Video) -> Result<()>;
    fn get_video(&self, id: &str) -> Result<Option<Video>>;
    fn update_video(&self, video: &Video) -> Result<()>;
    fn delete_video(&self, id: &str) -> Result<bool>;
    fn increment_video_views(&self, id: &str) -> Result<()>;
    fn list_videos(
        &self,
        owner_id: Option<&str>,
        include_unpublished: bool,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Video>>;

    // Subscription operations (toggled by create/delete, never a flag)
    fn subscription_exists(&self, subscriber_id: &str, channel_id: &str) -> Result<bool>;
    fn create_subscription(&self, subscriber_id: &str, channel_id: &str) -> Result<()>;
    fn delete_subscription(&self, subscriber_id: &str, channel_id: &str) -> Result<bool>;
    fn list_channel_subscribers(&self, channel_id: &str) -> Result<Vec<UserSummary>>;
    fn list_subscribed_channels(&self, subscriber_id: &str) -> Result<Vec<UserSummary>>;

    // Comment operations
    fn create_comment(&self, comment: &Comment) -> Result<()>;
    fn get_comment(&self, id: &str) -> Result<Option<Comment>>;
    fn update_comment(&self, id: &str, content: &str) -> Result<()>;
    fn delete_comment(&self, id: &str) -> Result<bool>;
    fn list_video_comments(
        &self,
        video_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CommentWithAuthor>>;

    // Like operations
    fn get_like(&self, user_id: &str, target: &LikeTarget) -> Result<Option<Like>>;
    fn create_like(&self, like: &Like) -> Result<()>;
    fn delete_like(&self, id: &str) -> Result<bool>;
    fn list_liked_videos(&self, user_id: &str) -> Result<Vec<Video>>;

    // Playlist operations
    fn create_playlist(&self, playlist: &Playlist) -> Result<()>;
    fn get_playlist(&self, id: &str) -> Result<Option<Playlist>>;
    fn update_playlist(&self, playlist: &Playlist) -> Result<()>;
    fn delete_playlist(&self, id: &str) -> Result<bool>;
    fn list_user_playlists(&self, user_id: &str) -> Result<Vec<Playlist>>;
    fn add_playlist_video(&self, playlist_id: &str, video_id: &str) -> Result<()>;
    fn remove_playlist_video(&self, playlist_id: &str, video_id: &str) -> Result<bool>;
    fn list_playlist_videos(&self, playlist_id: &str) -> Result<Vec<Video>>;

    // Tweet operations
    fn create_tweet(&self, tweet: &Tweet) -> Result<()>;
    fn get_tweet(&self, id: &str) -> Result<Option<Tweet>>;
    fn update_tweet(&self, id: &str, content: &str) -> Result<()>;
    fn delete_tweet(&self, id: &str) -> Result<bool>;
    fn list_user_tweets(&self, user_id: &str) -> Result<Vec<Tweet>>;

    // Derived read models (multi-table joins, no denormalized counters)
    fn channel_profile(&self, username: &str, viewer_id: Option<&str>)
    -> Result<Option<ChannelProfile>>;
    fn video_detail(&self, video_id: &str, viewer_id: Option<&str>)
    -> Result<Option<VideoDetail>>;
    fn channel_stats(&self, channel_id: &str) -> Result<ChannelStats>;

    fn close(&self) -> Result<()>;
}
