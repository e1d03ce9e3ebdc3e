use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

#[derive(Debug, Clone)]
pub struct ListenEntry {
    pub media_url: String,
    pub title: String,
    pub members: String,
    pub progress_seconds: u64,
    pub duration_seconds: u64,
    pub last_played_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS listen_history (
                media_url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                members TEXT NOT NULL,
                progress_seconds INTEGER NOT NULL,
                duration_seconds INTEGER NOT NULL,
                last_played_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_listen_history_played_at ON listen_history(last_played_at DESC);
            "#,
        )?;
        Ok(())
    }

    pub fn record_listen(
        &self,
        media_url: &str,
        title: &str,
        members: &str,
        duration_seconds: u64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO listen_history
                (media_url, title, members, progress_seconds, duration_seconds, last_played_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5)
            ON CONFLICT(media_url) DO UPDATE SET
                title = excluded.title,
                members = excluded.members,
                progress_seconds = 0,
                duration_seconds = excluded.duration_seconds,
                last_played_at = excluded.last_played_at
            "#,
            params![media_url, title, members, duration_seconds as i64, now],
        )?;
        Ok(())
    }

    pub fn update_progress(&self, media_url: &str, progress_seconds: u64) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE listen_history SET progress_seconds = ?1, last_played_at = ?2 WHERE media_url = ?3",
            params![progress_seconds as i64, now, media_url],
        )?;
        Ok(changed > 0)
    }

    pub fn list_history(&self) -> Result<Vec<ListenEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT media_url, title, members, progress_seconds, duration_seconds, last_played_at FROM listen_history ORDER BY last_played_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ListenEntry {
                media_url: row.get(0)?,
                title: row.get(1)?,
                members: row.get(2)?,
                progress_seconds: row.get::<_, i64>(3)?.max(0) as u64,
                duration_seconds: row.get::<_, i64>(4)?.max(0) as u64,
                last_played_at: row.get(5)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Database {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.migrate().expect("migrate");
        db
    }

    #[test]
    fn record_listen_resets_progress_on_replay() {
        let db = open();
        db.record_listen("https://cdn.test/a.mp3", "A", "Host", 100)
            .expect("record");
        assert!(db.update_progress("https://cdn.test/a.mp3", 42).expect("update"));

        db.record_listen("https://cdn.test/a.mp3", "A (remastered)", "Host", 100)
            .expect("record again");

        let rows = db.list_history().expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "A (remastered)");
        assert_eq!(rows[0].progress_seconds, 0);
        assert_eq!(rows[0].duration_seconds, 100);
    }

    #[test]
    fn update_progress_reports_unknown_episode() {
        let db = open();
        assert!(!db.update_progress("https://cdn.test/missing.mp3", 5).expect("update"));
    }
}
