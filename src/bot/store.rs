//! SQLite-backed key-value namespace for reminder records.
//!
//! One JSON document per key, keyed `user_<userId>_<reminderId>`.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::warn;

pub struct ReminderStore {
    conn: Mutex<Connection>,
}

impl ReminderStore {
    /// Create an in-memory store.
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("Failed to create in-memory store");
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema();
        store
    }

    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Self {
        let conn = Connection::open(path).expect("Failed to open reminder store");
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema();
        store
    }

    fn init_schema(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .expect("Failed to initialize store schema");
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .ok()
    }

    pub fn put(&self, key: &str, value: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .unwrap_or_else(|e| {
            warn!("Failed to write record {key}: {e}");
            0
        });
    }

    pub fn delete(&self, key: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .unwrap_or_else(|e| {
                warn!("Failed to delete record {key}: {e}");
                0
            });
    }

    /// All entries whose key starts with `prefix`, in key order.
    pub fn list_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        // Keys contain underscores, which are LIKE wildcards; escape them so
        // the prefix matches literally.
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        self.select(
            "SELECT key, value FROM kv WHERE key LIKE ?1 || '%' ESCAPE '\\' ORDER BY key",
            params![escaped],
        )
    }

    /// Every entry in the namespace, in key order.
    pub fn list_all(&self) -> Vec<(String, String)> {
        self.select("SELECT key, value FROM kv ORDER BY key", params![])
    }

    fn select(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Vec<(String, String)> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn.prepare(sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!("Failed to prepare store query: {e}");
                return Vec::new();
            }
        };
        match stmt.query_map(args, |row| Ok((row.get(0)?, row.get(1)?))) {
            Ok(rows) => rows.filter_map(Result::ok).collect(),
            Err(e) => {
                warn!("Failed to run store query: {e}");
                Vec::new()
            }
        }
    }
}

impl Default for ReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_absent() {
        let store = ReminderStore::new();
        assert_eq!(store.get("user_1_x"), None);
    }

    #[test]
    fn test_put_get_delete() {
        let store = ReminderStore::new();
        store.put("user_1_a", "{\"v\":1}");
        assert_eq!(store.get("user_1_a").as_deref(), Some("{\"v\":1}"));

        store.put("user_1_a", "{\"v\":2}");
        assert_eq!(store.get("user_1_a").as_deref(), Some("{\"v\":2}"));

        store.delete("user_1_a");
        assert_eq!(store.get("user_1_a"), None);
        // Deleting a missing key is a no-op.
        store.delete("user_1_a");
    }

    #[test]
    fn test_list_prefix_scopes_to_user() {
        let store = ReminderStore::new();
        store.put("user_42_reminder_1", "a");
        store.put("user_42_reminder_2", "b");
        store.put("user_421_reminder_1", "c");
        store.put("user_7_reminder_1", "d");

        let keys: Vec<String> = store
            .list_prefix("user_42_")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["user_42_reminder_1", "user_42_reminder_2"]);
    }

    #[test]
    fn test_list_all() {
        let store = ReminderStore::new();
        store.put("user_1_a", "x");
        store.put("user_2_b", "y");
        assert_eq!(store.list_all().len(), 2);
    }

    #[test]
    fn test_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.db");
        {
            let store = ReminderStore::open(&path);
            store.put("user_1_a", "kept");
        }
        let store = ReminderStore::open(&path);
        assert_eq!(store.get("user_1_a").as_deref(), Some("kept"));
    }
}
