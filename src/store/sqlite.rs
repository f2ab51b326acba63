use super::{EventStore, StoreError};
use crate::models::{AccessToken, Event, Member, Playlist, Role, Track, TrackAssociation};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::fs;
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = include_str!("schema.sql");

type AssociationRow = (String, String, String, String);

/// [`EventStore`] on a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn connect(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        log::info!("Connecting to database at: {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(db_path)
                    .create_if_missing(true),
            )
            .await?;

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    /// Private database living as long as the store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn apply_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(|e| {
                    StoreError::Setup(format!(
                        "Failed to execute schema statement '{}': {}",
                        stmt, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub async fn access_token(&self, user_id: &str) -> Result<Option<AccessToken>, StoreError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT access_token FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(token,)| token).map(AccessToken::new))
    }
}

fn association_from_row(row: AssociationRow) -> Result<TrackAssociation, StoreError> {
    let (id, event_id, track_id, status) = row;
    let status = status
        .parse()
        .map_err(|e: String| StoreError::Corrupt(format!("event_tracks {}: {}", id, e)))?;
    Ok(TrackAssociation {
        id,
        event_id,
        track_id,
        status,
    })
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, StoreError> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, name, date, locked FROM events WHERE id = ?",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn upsert_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO events (id, name, date, locked) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                date = excluded.date,
                locked = excluded.locked
            "#,
        )
        .bind(&event.id)
        .bind(&event.name)
        .bind(event.date)
        .bind(event.locked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_members(&self, event_id: &str) -> Result<Vec<Member>, StoreError> {
        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT m.user_id, m.role, u.refresh_token
            FROM event_members m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.event_id = ?
            ORDER BY m.rowid ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(user_id, role, refresh_token)| {
                let role = Role::from_str(&role).map_err(StoreError::Corrupt)?;
                Ok(Member {
                    user_id,
                    event_id: event_id.to_string(),
                    role,
                    refresh_token,
                })
            })
            .collect()
    }

    async fn upsert_member(&self, member: &Member) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, refresh_token) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET
                refresh_token = COALESCE(excluded.refresh_token, users.refresh_token)
            "#,
        )
        .bind(&member.user_id)
        .bind(&member.refresh_token)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO event_members (event_id, user_id, role) VALUES (?, ?, ?)
            ON CONFLICT(event_id, user_id) DO UPDATE SET role = excluded.role
            "#,
        )
        .bind(&member.event_id)
        .bind(&member.user_id)
        .bind(member.role.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save_access_token(
        &self,
        user_id: &str,
        token: &AccessToken,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, access_token, token_updated_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                token_updated_at = excluded.token_updated_at
            "#,
        )
        .bind(user_id)
        .bind(token.secret())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_track(&self, track_id: &str) -> Result<Option<Track>, StoreError> {
        let track = sqlx::query_as::<_, Track>(
            r#"
            SELECT id, name, duration_ms, genre, artist_id, artist_name, artwork_url
            FROM tracks WHERE id = ?
            "#,
        )
        .bind(track_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(track)
    }

    async fn insert_track(&self, track: &Track) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO tracks (id, name, duration_ms, genre, artist_id, artist_name, artwork_url)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&track.id)
        .bind(&track.name)
        .bind(track.duration_ms)
        .bind(&track.genre)
        .bind(&track.artist_id)
        .bind(&track.artist_name)
        .bind(&track.artwork_url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_association(
        &self,
        event_id: &str,
        track_id: &str,
    ) -> Result<Option<TrackAssociation>, StoreError> {
        let row: Option<AssociationRow> = sqlx::query_as(
            "SELECT id, event_id, track_id, status FROM event_tracks WHERE event_id = ? AND track_id = ?",
        )
        .bind(event_id)
        .bind(track_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(association_from_row).transpose()
    }

    async fn list_associations(
        &self,
        event_id: &str,
    ) -> Result<Vec<TrackAssociation>, StoreError> {
        let rows: Vec<AssociationRow> = sqlx::query_as(
            "SELECT id, event_id, track_id, status FROM event_tracks WHERE event_id = ? ORDER BY rowid ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(association_from_row).collect()
    }

    async fn upsert_association(&self, association: &TrackAssociation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO event_tracks (id, event_id, track_id, status) VALUES (?, ?, ?, ?)
            ON CONFLICT(event_id, track_id) DO UPDATE SET status = excluded.status
            "#,
        )
        .bind(&association.id)
        .bind(&association.event_id)
        .bind(&association.track_id)
        .bind(association.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_association_if_absent(
        &self,
        association: &TrackAssociation,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_tracks (id, event_id, track_id, status) VALUES (?, ?, ?, ?)
            ON CONFLICT(event_id, track_id) DO NOTHING
            "#,
        )
        .bind(&association.id)
        .bind(&association.event_id)
        .bind(&association.track_id)
        .bind(association.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_association(
        &self,
        event_id: &str,
        track_id: &str,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_tracks WHERE event_id = ? AND track_id = ?")
            .bind(event_id)
            .bind(track_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM event_tracks WHERE event_id = ? AND track_id = ?")
            .bind(event_id)
            .bind(track_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO playlists (id, event_id, accepted, created_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                event_id = excluded.event_id,
                accepted = excluded.accepted,
                created_at = excluded.created_at
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.event_id)
        .bind(playlist.accepted)
        .bind(playlist.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Option<Playlist>, StoreError> {
        let row: Option<(String, String, bool, i64)> = sqlx::query_as(
            "SELECT id, event_id, accepted, created_at FROM playlists WHERE id = ? AND event_id = ?",
        )
        .bind(playlist_id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, event_id, accepted, created_at)| Playlist {
            id,
            event_id,
            accepted,
            created_at,
        }))
    }

    async fn list_playlists(&self, event_id: &str) -> Result<Vec<Playlist>, StoreError> {
        let rows: Vec<(String, String, bool, i64)> = sqlx::query_as(
            "SELECT id, event_id, accepted, created_at FROM playlists WHERE event_id = ? ORDER BY created_at DESC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, event_id, accepted, created_at)| Playlist {
                id,
                event_id,
                accepted,
                created_at,
            })
            .collect())
    }

    async fn set_playlist_accepted(
        &self,
        event_id: &str,
        playlist_id: &str,
        accepted: bool,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE playlists SET accepted = ? WHERE id = ? AND event_id = ?")
            .bind(accepted)
            .bind(playlist_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ? AND event_id = ?")
            .bind(playlist_id)
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM playlists WHERE id = ? AND event_id = ?")
            .bind(playlist_id)
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_playlist_track(
        &self,
        event_id: &str,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO playlist_tracks (playlist_id, event_id, track_id, position)
            VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM playlist_tracks WHERE playlist_id = ?))
            ON CONFLICT(playlist_id, track_id) DO NOTHING
            "#,
        )
        .bind(playlist_id)
        .bind(event_id)
        .bind(track_id)
        .bind(playlist_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn playlist_associations(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Vec<TrackAssociation>, StoreError> {
        let rows: Vec<AssociationRow> = sqlx::query_as(
            r#"
            SELECT et.id, et.event_id, et.track_id, et.status
            FROM playlist_tracks pt
            JOIN event_tracks et ON et.event_id = pt.event_id AND et.track_id = pt.track_id
            WHERE pt.playlist_id = ? AND pt.event_id = ?
            ORDER BY pt.position ASC
            "#,
        )
        .bind(playlist_id)
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(association_from_row).collect()
    }

    async fn reset_generation(&self, event_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for stmt in [
            "DELETE FROM playlist_tracks WHERE event_id = ?",
            "DELETE FROM playlists WHERE event_id = ?",
            "DELETE FROM event_tracks WHERE event_id = ?",
        ] {
            sqlx::query(stmt).bind(event_id).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        log::info!("Cleared generated tracks and playlists of event {}", event_id);
        Ok(())
    }
}
