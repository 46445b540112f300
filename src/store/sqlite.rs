use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

/// How many entries a user's watch history may hold. Appending beyond the
/// cap drops the oldest rows.
pub const WATCH_HISTORY_CAP: i64 = 10;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

const USER_COLS: &str =
    "id, username, email, full_name, password_hash, avatar, cover_image, refresh_token, created_at, updated_at";

const VIDEO_COLS: &str = "id, owner_id, video_file, thumbnail, title, description, duration_secs, views, is_published, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        password_hash: row.get(4)?,
        avatar: row.get(5)?,
        cover_image: row.get(6)?,
        refresh_token: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

/// Reads a video starting at column `base`, so joined queries can append
/// their own columns after the video projection.
fn video_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Video> {
    Ok(Video {
        id: row.get(base)?,
        owner_id: row.get(base + 1)?,
        video_file: row.get(base + 2)?,
        thumbnail: row.get(base + 3)?,
        title: row.get(base + 4)?,
        description: row.get(base + 5)?,
        duration_secs: row.get(base + 6)?,
        views: row.get(base + 7)?,
        is_published: row.get(base + 8)?,
        created_at: parse_datetime(&row.get::<_, String>(base + 9)?),
        updated_at: parse_datetime(&row.get::<_, String>(base + 10)?),
    })
}

fn summary_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(base)?,
        username: row.get(base + 1)?,
        full_name: row.get(base + 2)?,
        avatar: row.get(base + 3)?,
    })
}

fn like_target_columns(target: &LikeTarget) -> (&'static str, &str) {
    match target {
        LikeTarget::Video(id) => ("video_id", id),
        LikeTarget::Comment(id) => ("comment_id", id),
        LikeTarget::Tweet(id) => ("tweet_id", id),
    }
}

fn like_from_row(row: &Row<'_>) -> rusqlite::Result<Like> {
    let video_id: Option<String> = row.get(2)?;
    let comment_id: Option<String> = row.get(3)?;
    let tweet_id: Option<String> = row.get(4)?;

    let target = match (video_id, comment_id, tweet_id) {
        (Some(id), None, None) => LikeTarget::Video(id),
        (None, Some(id), None) => LikeTarget::Comment(id),
        (None, None, Some(id)) => LikeTarget::Tweet(id),
        _ => {
            // The CHECK constraint makes this unreachable
            return Err(rusqlite::Error::InvalidQuery);
        }
    };

    Ok(Like {
        id: row.get(0)?,
        user_id: row.get(1)?,
        target,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, username, email, full_name, password_hash, avatar, cover_image, refresh_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.id,
                user.username,
                user.email,
                user.full_name,
                user.password_hash,
                user.avatar,
                user.cover_image,
                user.refresh_token,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE username = LOWER(?1)"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_login(&self, identifier: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE username = LOWER(?1) OR email = ?1"),
            params![identifier],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_user_profile(&self, id: &str, full_name: &str, email: &str) -> Result<()> {
        let result = self.conn().execute(
            "UPDATE users SET full_name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
            params![full_name, email, format_datetime(&Utc::now()), id],
        );

        match result {
            Ok(0) => Err(Error::NotFound),
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn update_user_password(&self, id: &str, password_hash: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_user_avatar(&self, id: &str, avatar: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET avatar = ?1, updated_at = ?2 WHERE id = ?3",
            params![avatar, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_user_cover_image(&self, id: &str, cover_image: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET cover_image = ?1, updated_at = ?2 WHERE id = ?3",
            params![cover_image, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET refresh_token = ?1, updated_at = ?2 WHERE id = ?3",
            params![token, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Watch history operations

    fn push_watch_entry(&self, user_id: &str, video_id: &str) -> Result<()> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO watch_history (user_id, video_id, watched_at) VALUES (?1, ?2, ?3)",
            params![user_id, video_id, format_datetime(&Utc::now())],
        )?;

        // Drop the oldest rows beyond the cap
        conn.execute(
            "DELETE FROM watch_history WHERE user_id = ?1 AND id NOT IN (
                 SELECT id FROM watch_history WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![user_id, WATCH_HISTORY_CAP],
        )?;

        Ok(())
    }

    fn clear_watch_history(&self, user_id: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM watch_history WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }

    fn watch_history(&self, user_id: &str) -> Result<Vec<WatchedVideo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT v.id, v.owner_id, v.video_file, v.thumbnail, v.title, v.description,
                    v.duration_secs, v.views, v.is_published, v.created_at, v.updated_at,
                    u.id, u.username, u.full_name, u.avatar
             FROM watch_history w
             JOIN videos v ON v.id = w.video_id
             JOIN users u ON u.id = v.owner_id
             WHERE w.user_id = ?1
             ORDER BY w.id",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(WatchedVideo {
                video: video_from_row(row, 0)?,
                owner: summary_from_row(row, 11)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Video operations

    fn create_video(&self, video: &Video) -> Result<()> {
        self.conn().execute(
            "INSERT INTO videos (id, owner_id, video_file, thumbnail, title, description, duration_secs, views, is_published, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                video.id,
                video.owner_id,
                video.video_file,
                video.thumbnail,
                video.title,
                video.description,
                video.duration_secs,
                video.views,
                video.is_published,
                format_datetime(&video.created_at),
                format_datetime(&video.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_video(&self, id: &str) -> Result<Option<Video>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {VIDEO_COLS} FROM videos WHERE id = ?1"),
            params![id],
            |row| video_from_row(row, 0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_video(&self, video: &Video) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE videos SET title = ?1, description = ?2, thumbnail = ?3, is_published = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                video.title,
                video.description,
                video.thumbnail,
                video.is_published,
                format_datetime(&Utc::now()),
                video.id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_video(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM videos WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn increment_video_views(&self, id: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE videos SET views = views + 1 WHERE id = ?1",
            params![id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn list_videos(
        &self,
        owner_id: Option<&str>,
        include_unpublished: bool,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Video>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VIDEO_COLS} FROM videos
             WHERE (?1 IS NULL OR owner_id = ?1)
               AND (?2 OR is_published = 1)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3 OFFSET ?4"
        ))?;

        let rows = stmt.query_map(params![owner_id, include_unpublished, limit, offset], |row| {
            video_from_row(row, 0)
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Subscription operations

    fn subscription_exists(&self, subscriber_id: &str, channel_id: &str) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
            params![subscriber_id, channel_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_subscription(&self, subscriber_id: &str, channel_id: &str) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO subscriptions (subscriber_id, channel_id, created_at) VALUES (?1, ?2, ?3)",
            params![subscriber_id, channel_id, format_datetime(&Utc::now())],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn delete_subscription(&self, subscriber_id: &str, channel_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
            params![subscriber_id, channel_id],
        )?;
        Ok(rows > 0)
    }

    fn list_channel_subscribers(&self, channel_id: &str) -> Result<Vec<UserSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.full_name, u.avatar
             FROM subscriptions s
             JOIN users u ON u.id = s.subscriber_id
             WHERE s.channel_id = ?1
             ORDER BY s.created_at",
        )?;

        let rows = stmt.query_map(params![channel_id], |row| summary_from_row(row, 0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_subscribed_channels(&self, subscriber_id: &str) -> Result<Vec<UserSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.full_name, u.avatar
             FROM subscriptions s
             JOIN users u ON u.id = s.channel_id
             WHERE s.subscriber_id = ?1
             ORDER BY s.created_at",
        )?;

        let rows = stmt.query_map(params![subscriber_id], |row| summary_from_row(row, 0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Comment operations

    fn create_comment(&self, comment: &Comment) -> Result<()> {
        self.conn().execute(
            "INSERT INTO comments (id, video_id, owner_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id,
                comment.video_id,
                comment.owner_id,
                comment.content,
                format_datetime(&comment.created_at),
                format_datetime(&comment.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, video_id, owner_id, content, created_at, updated_at
             FROM comments WHERE id = ?1",
            params![id],
            |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    video_id: row.get(1)?,
                    owner_id: row.get(2)?,
                    content: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    updated_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_comment(&self, id: &str, content: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![content, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_comment(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_video_comments(
        &self,
        video_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CommentWithAuthor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.video_id, c.content, c.created_at, c.updated_at,
                    u.id, u.username, u.full_name, u.avatar
             FROM comments c
             JOIN users u ON u.id = c.owner_id
             WHERE c.video_id = ?1
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![video_id, limit, offset], |row| {
            Ok(CommentWithAuthor {
                id: row.get(0)?,
                video_id: row.get(1)?,
                content: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
                updated_at: parse_datetime(&row.get::<_, String>(4)?),
                author: summary_from_row(row, 5)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Like operations

    fn get_like(&self, user_id: &str, target: &LikeTarget) -> Result<Option<Like>> {
        let (column, target_id) = like_target_columns(target);
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT id, user_id, video_id, comment_id, tweet_id, created_at
                 FROM likes WHERE user_id = ?1 AND {column} = ?2"
            ),
            params![user_id, target_id],
            like_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn create_like(&self, like: &Like) -> Result<()> {
        let (video_id, comment_id, tweet_id) = match &like.target {
            LikeTarget::Video(id) => (Some(id.as_str()), None, None),
            LikeTarget::Comment(id) => (None, Some(id.as_str()), None),
            LikeTarget::Tweet(id) => (None, None, Some(id.as_str())),
        };

        let result = self.conn().execute(
            "INSERT INTO likes (id, user_id, video_id, comment_id, tweet_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                like.id,
                like.user_id,
                video_id,
                comment_id,
                tweet_id,
                format_datetime(&like.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn delete_like(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM likes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_liked_videos(&self, user_id: &str) -> Result<Vec<Video>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT v.id, v.owner_id, v.video_file, v.thumbnail, v.title, v.description,
                    v.duration_secs, v.views, v.is_published, v.created_at, v.updated_at
             FROM likes l
             JOIN videos v ON v.id = l.video_id
             WHERE l.user_id = ?1 AND l.video_id IS NOT NULL
             ORDER BY l.created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| video_from_row(row, 0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Playlist operations

    fn create_playlist(&self, playlist: &Playlist) -> Result<()> {
        self.conn().execute(
            "INSERT INTO playlists (id, owner_id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                playlist.id,
                playlist.owner_id,
                playlist.name,
                playlist.description,
                format_datetime(&playlist.created_at),
                format_datetime(&playlist.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_playlist(&self, id: &str) -> Result<Option<Playlist>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, name, description, created_at, updated_at
             FROM playlists WHERE id = ?1",
            params![id],
            |row| {
                Ok(Playlist {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    updated_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_playlist(&self, playlist: &Playlist) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE playlists SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                playlist.name,
                playlist.description,
                format_datetime(&Utc::now()),
                playlist.id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_playlist(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM playlists WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_user_playlists(&self, user_id: &str) -> Result<Vec<Playlist>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, description, created_at, updated_at
             FROM playlists WHERE owner_id = ?1 ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Playlist {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
                updated_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn add_playlist_video(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        // Set semantics: re-adding an existing member is a no-op
        self.conn().execute(
            "INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id, position)
             VALUES (?1, ?2, (SELECT COALESCE(MAX(position) + 1, 0) FROM playlist_videos WHERE playlist_id = ?1))",
            params![playlist_id, video_id],
        )?;
        Ok(())
    }

    fn remove_playlist_video(&self, playlist_id: &str, video_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM playlist_videos WHERE playlist_id = ?1 AND video_id = ?2",
            params![playlist_id, video_id],
        )?;
        Ok(rows > 0)
    }

    fn list_playlist_videos(&self, playlist_id: &str) -> Result<Vec<Video>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT v.id, v.owner_id, v.video_file, v.thumbnail, v.title, v.description,
                    v.duration_secs, v.views, v.is_published, v.created_at, v.updated_at
             FROM playlist_videos pv
             JOIN videos v ON v.id = pv.video_id
             WHERE pv.playlist_id = ?1
             ORDER BY pv.position",
        )?;

        let rows = stmt.query_map(params![playlist_id], |row| video_from_row(row, 0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Tweet operations

    fn create_tweet(&self, tweet: &Tweet) -> Result<()> {
        self.conn().execute(
            "INSERT INTO tweets (id, owner_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tweet.id,
                tweet.owner_id,
                tweet.content,
                format_datetime(&tweet.created_at),
                format_datetime(&tweet.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_tweet(&self, id: &str) -> Result<Option<Tweet>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, content, created_at, updated_at FROM tweets WHERE id = ?1",
            params![id],
            |row| {
                Ok(Tweet {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    content: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    updated_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_tweet(&self, id: &str, content: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE tweets SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![content, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_tweet(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tweets WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_user_tweets(&self, user_id: &str) -> Result<Vec<Tweet>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, content, created_at, updated_at
             FROM tweets WHERE owner_id = ?1 ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Tweet {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                content: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
                updated_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Derived read models

    fn channel_profile(
        &self,
        username: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<ChannelProfile>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT u.id, u.username, u.full_name, u.email, u.avatar, u.cover_image,
                    (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id),
                    (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id),
                    EXISTS(SELECT 1 FROM subscriptions s
                           WHERE s.channel_id = u.id AND s.subscriber_id = ?2)
             FROM users u WHERE u.username = LOWER(?1)",
            params![username, viewer_id],
            |row| {
                Ok(ChannelProfile {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    full_name: row.get(2)?,
                    email: row.get(3)?,
                    avatar: row.get(4)?,
                    cover_image: row.get(5)?,
                    subscriber_count: row.get(6)?,
                    subscribed_to_count: row.get(7)?,
                    is_subscribed: row.get(8)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn video_detail(
        &self,
        video_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<VideoDetail>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT v.id, v.owner_id, v.video_file, v.thumbnail, v.title, v.description,
                    v.duration_secs, v.views, v.is_published, v.created_at, v.updated_at,
                    u.id, u.username, u.full_name, u.avatar,
                    (SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id),
                    EXISTS(SELECT 1 FROM likes l WHERE l.video_id = v.id AND l.user_id = ?2),
                    (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = v.owner_id),
                    EXISTS(SELECT 1 FROM subscriptions s
                           WHERE s.channel_id = v.owner_id AND s.subscriber_id = ?2)
             FROM videos v
             JOIN users u ON u.id = v.owner_id
             WHERE v.id = ?1",
            params![video_id, viewer_id],
            |row| {
                Ok(VideoDetail {
                    video: video_from_row(row, 0)?,
                    owner: summary_from_row(row, 11)?,
                    like_count: row.get(15)?,
                    has_liked: row.get(16)?,
                    subscriber_count: row.get(17)?,
                    is_subscribed: row.get(18)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn channel_stats(&self, channel_id: &str) -> Result<ChannelStats> {
        let conn = self.conn();

        let (total_videos, total_views, total_likes, total_comments, total_duration_secs) = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(v.views), 0),
                        COALESCE(SUM((SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id)), 0),
                        COALESCE(SUM((SELECT COUNT(*) FROM comments c WHERE c.video_id = v.id)), 0),
                        COALESCE(SUM(v.duration_secs), 0)
                 FROM videos v WHERE v.owner_id = ?1",
                params![channel_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                },
            )?;

        let subscriber_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1",
            params![channel_id],
            |row| row.get(0),
        )?;

        // A channel with no videos gets an all-zero row rather than a
        // division by zero
        let avg_subscribers_per_video = if total_videos == 0 {
            0.0
        } else {
            subscriber_count as f64 / total_videos as f64
        };

        Ok(ChannelStats {
            total_videos,
            total_views,
            total_likes,
            total_comments,
            total_duration_secs,
            avg_subscribers_per_video,
        })
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn make_user(username: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: format!("{username} Example"),
            password_hash: "$argon2id$test".to_string(),
            avatar: "image/avatar.png".to_string(),
            cover_image: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_video(owner: &User, title: &str) -> Video {
        let now = Utc::now();
        Video {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.id.clone(),
            video_file: "video/clip.mp4".to_string(),
            thumbnail: "image/thumb.png".to_string(),
            title: title.to_string(),
            description: None,
            duration_secs: 42.0,
            views: 0,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = test_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"videos".to_string()));
        assert!(tables.contains(&"subscriptions".to_string()));
        assert!(tables.contains(&"comments".to_string()));
        assert!(tables.contains(&"likes".to_string()));
        assert!(tables.contains(&"playlists".to_string()));
        assert!(tables.contains(&"playlist_videos".to_string()));
        assert!(tables.contains(&"tweets".to_string()));
        assert!(tables.contains(&"watch_history".to_string()));
    }

    #[test]
    fn test_user_crud_and_unique_username() {
        let (_temp, store) = test_store();

        let user = make_user("alice");
        store.create_user(&user).unwrap();

        let fetched = store.get_user(&user.id).unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.refresh_token, None);

        // Case-insensitive username lookup
        let by_name = store.get_user_by_username("ALICE").unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        // Login works by username or email
        let by_email = store
            .get_user_by_login("alice@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let mut dup = make_user("alice");
        dup.email = "other@example.com".to_string();
        assert!(matches!(
            store.create_user(&dup),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn test_refresh_token_set_and_clear() {
        let (_temp, store) = test_store();

        let user = make_user("bob");
        store.create_user(&user).unwrap();

        store.set_refresh_token(&user.id, Some("token-1")).unwrap();
        assert_eq!(
            store.get_user(&user.id).unwrap().unwrap().refresh_token,
            Some("token-1".to_string())
        );

        // Overwrite is the rotation point: only one token is ever live
        store.set_refresh_token(&user.id, Some("token-2")).unwrap();
        assert_eq!(
            store.get_user(&user.id).unwrap().unwrap().refresh_token,
            Some("token-2".to_string())
        );

        store.set_refresh_token(&user.id, None).unwrap();
        assert_eq!(store.get_user(&user.id).unwrap().unwrap().refresh_token, None);
    }

    #[test]
    fn test_watch_history_cap_and_order() {
        let (_temp, store) = test_store();

        let owner = make_user("owner");
        let viewer = make_user("viewer");
        store.create_user(&owner).unwrap();
        store.create_user(&viewer).unwrap();

        let videos: Vec<Video> = (0..15)
            .map(|i| {
                let v = make_video(&owner, &format!("video-{i}"));
                store.create_video(&v).unwrap();
                v
            })
            .collect();

        for v in &videos {
            store.push_watch_entry(&viewer.id, &v.id).unwrap();
        }

        let history = store.watch_history(&viewer.id).unwrap();
        assert_eq!(history.len(), WATCH_HISTORY_CAP as usize);

        // Oldest-to-newest, newest last: entries 5..15 survive
        assert_eq!(history.first().unwrap().video.title, "video-5");
        assert_eq!(history.last().unwrap().video.title, "video-14");
        assert_eq!(history.last().unwrap().owner.username, "owner");

        store.clear_watch_history(&viewer.id).unwrap();
        assert!(store.watch_history(&viewer.id).unwrap().is_empty());
    }

    #[test]
    fn test_subscription_toggle_roundtrip() {
        let (_temp, store) = test_store();

        let a = make_user("channel");
        let b = make_user("fan");
        store.create_user(&a).unwrap();
        store.create_user(&b).unwrap();

        assert!(!store.subscription_exists(&b.id, &a.id).unwrap());

        store.create_subscription(&b.id, &a.id).unwrap();
        assert!(store.subscription_exists(&b.id, &a.id).unwrap());

        // One edge per pair
        assert!(matches!(
            store.create_subscription(&b.id, &a.id),
            Err(Error::AlreadyExists)
        ));

        assert!(store.delete_subscription(&b.id, &a.id).unwrap());
        assert!(!store.subscription_exists(&b.id, &a.id).unwrap());
        assert!(!store.delete_subscription(&b.id, &a.id).unwrap());
    }

    #[test]
    fn test_channel_profile_counts_and_viewer_bit() {
        let (_temp, store) = test_store();

        let alice = make_user("alice");
        let bob = make_user("bob");
        let carol = make_user("carol");
        store.create_user(&alice).unwrap();
        store.create_user(&bob).unwrap();
        store.create_user(&carol).unwrap();

        // Anonymous viewer, fresh channel
        let profile = store.channel_profile("alice", None).unwrap().unwrap();
        assert_eq!(profile.subscriber_count, 0);
        assert_eq!(profile.subscribed_to_count, 0);
        assert!(!profile.is_subscribed);

        store.create_subscription(&bob.id, &alice.id).unwrap();
        store.create_subscription(&carol.id, &alice.id).unwrap();
        store.create_subscription(&alice.id, &bob.id).unwrap();

        let profile = store
            .channel_profile("ALICE", Some(&bob.id))
            .unwrap()
            .unwrap();
        assert_eq!(profile.subscriber_count, 2);
        assert_eq!(profile.subscribed_to_count, 1);
        assert!(profile.is_subscribed);

        let profile = store.channel_profile("alice", None).unwrap().unwrap();
        assert!(!profile.is_subscribed);

        assert!(store.channel_profile("nonexistent", None).unwrap().is_none());
    }

    #[test]
    fn test_video_detail_joins() {
        let (_temp, store) = test_store();

        let owner = make_user("owner");
        let fan = make_user("fan");
        store.create_user(&owner).unwrap();
        store.create_user(&fan).unwrap();

        let video = make_video(&owner, "first");
        store.create_video(&video).unwrap();

        let like = Like {
            id: Uuid::new_v4().to_string(),
            user_id: fan.id.clone(),
            target: LikeTarget::Video(video.id.clone()),
            created_at: Utc::now(),
        };
        store.create_like(&like).unwrap();
        store.create_subscription(&fan.id, &owner.id).unwrap();

        let detail = store
            .video_detail(&video.id, Some(&fan.id))
            .unwrap()
            .unwrap();
        assert_eq!(detail.like_count, 1);
        assert!(detail.has_liked);
        assert_eq!(detail.subscriber_count, 1);
        assert!(detail.is_subscribed);
        assert_eq!(detail.owner.username, "owner");

        let anon = store.video_detail(&video.id, None).unwrap().unwrap();
        assert_eq!(anon.like_count, 1);
        assert!(!anon.has_liked);
        assert!(!anon.is_subscribed);
    }

    #[test]
    fn test_channel_stats_zero_videos() {
        let (_temp, store) = test_store();

        let user = make_user("empty");
        store.create_user(&user).unwrap();

        let stats = store.channel_stats(&user.id).unwrap();
        assert_eq!(stats.total_videos, 0);
        assert_eq!(stats.total_views, 0);
        assert_eq!(stats.avg_subscribers_per_video, 0.0);
    }

    #[test]
    fn test_channel_stats_totals() {
        let (_temp, store) = test_store();

        let owner = make_user("owner");
        let fan = make_user("fan");
        store.create_user(&owner).unwrap();
        store.create_user(&fan).unwrap();

        let v1 = make_video(&owner, "one");
        let v2 = make_video(&owner, "two");
        store.create_video(&v1).unwrap();
        store.create_video(&v2).unwrap();

        store.increment_video_views(&v1.id).unwrap();
        store.increment_video_views(&v1.id).unwrap();
        store.increment_video_views(&v2.id).unwrap();

        store
            .create_like(&Like {
                id: Uuid::new_v4().to_string(),
                user_id: fan.id.clone(),
                target: LikeTarget::Video(v1.id.clone()),
                created_at: Utc::now(),
            })
            .unwrap();

        let now = Utc::now();
        store
            .create_comment(&Comment {
                id: Uuid::new_v4().to_string(),
                video_id: v2.id.clone(),
                owner_id: fan.id.clone(),
                content: "nice".to_string(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        store.create_subscription(&fan.id, &owner.id).unwrap();

        let stats = store.channel_stats(&owner.id).unwrap();
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.total_views, 3);
        assert_eq!(stats.total_likes, 1);
        assert_eq!(stats.total_comments, 1);
        assert_eq!(stats.avg_subscribers_per_video, 0.5);
    }

    #[test]
    fn test_like_one_per_target() {
        let (_temp, store) = test_store();

        let owner = make_user("owner");
        let fan = make_user("fan");
        store.create_user(&owner).unwrap();
        store.create_user(&fan).unwrap();

        let video = make_video(&owner, "clip");
        store.create_video(&video).unwrap();

        let target = LikeTarget::Video(video.id.clone());
        let like = Like {
            id: Uuid::new_v4().to_string(),
            user_id: fan.id.clone(),
            target: target.clone(),
            created_at: Utc::now(),
        };
        store.create_like(&like).unwrap();

        let dup = Like {
            id: Uuid::new_v4().to_string(),
            user_id: fan.id.clone(),
            target: target.clone(),
            created_at: Utc::now(),
        };
        assert!(matches!(store.create_like(&dup), Err(Error::AlreadyExists)));

        let fetched = store.get_like(&fan.id, &target).unwrap().unwrap();
        assert_eq!(fetched.id, like.id);
        assert_eq!(fetched.target, target);

        assert!(store.delete_like(&like.id).unwrap());
        assert!(store.get_like(&fan.id, &target).unwrap().is_none());
    }

    #[test]
    fn test_playlist_membership_set_semantics() {
        let (_temp, store) = test_store();

        let owner = make_user("owner");
        store.create_user(&owner).unwrap();

        let v1 = make_video(&owner, "one");
        let v2 = make_video(&owner, "two");
        store.create_video(&v1).unwrap();
        store.create_video(&v2).unwrap();

        let now = Utc::now();
        let playlist = Playlist {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.id.clone(),
            name: "favorites".to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        store.create_playlist(&playlist).unwrap();

        store.add_playlist_video(&playlist.id, &v1.id).unwrap();
        store.add_playlist_video(&playlist.id, &v2.id).unwrap();
        // Duplicate add is a no-op
        store.add_playlist_video(&playlist.id, &v1.id).unwrap();

        let videos = store.list_playlist_videos(&playlist.id).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].title, "one");
        assert_eq!(videos[1].title, "two");

        assert!(store.remove_playlist_video(&playlist.id, &v1.id).unwrap());
        assert!(!store.remove_playlist_video(&playlist.id, &v1.id).unwrap());
        assert_eq!(store.list_playlist_videos(&playlist.id).unwrap().len(), 1);
    }

    #[test]
    fn test_video_delete_cascades() {
        let (_temp, store) = test_store();

        let owner = make_user("owner");
        let fan = make_user("fan");
        store.create_user(&owner).unwrap();
        store.create_user(&fan).unwrap();

        let video = make_video(&owner, "doomed");
        store.create_video(&video).unwrap();

        let now = Utc::now();
        store
            .create_comment(&Comment {
                id: Uuid::new_v4().to_string(),
                video_id: video.id.clone(),
                owner_id: fan.id.clone(),
                content: "gone soon".to_string(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        store
            .create_like(&Like {
                id: Uuid::new_v4().to_string(),
                user_id: fan.id.clone(),
                target: LikeTarget::Video(video.id.clone()),
                created_at: now,
            })
            .unwrap();
        store.push_watch_entry(&fan.id, &video.id).unwrap();

        assert!(store.delete_video(&video.id).unwrap());
        assert!(store.get_video(&video.id).unwrap().is_none());
        assert!(store.list_video_comments(&video.id, 0, 10).unwrap().is_empty());
        assert!(store.watch_history(&fan.id).unwrap().is_empty());
        assert!(
            store
                .get_like(&fan.id, &LikeTarget::Video(video.id.clone()))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_list_videos_published_filter() {
        let (_temp, store) = test_store();

        let owner = make_user("owner");
        store.create_user(&owner).unwrap();

        let mut hidden = make_video(&owner, "draft");
        hidden.is_published = false;
        store.create_video(&hidden).unwrap();
        store.create_video(&make_video(&owner, "live")).unwrap();

        let published = store.list_videos(Some(&owner.id), false, 0, 10).unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].title, "live");

        let all = store.list_videos(Some(&owner.id), true, 0, 10).unwrap();
        assert_eq!(all.len(), 2);
    }
}
