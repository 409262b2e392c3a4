use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::tags::TagFields;

/// One row of the items table plus its flexible fields
#[derive(Debug, Clone)]
pub struct ItemRow {
    pub id: i64,
    pub path: Vec<u8>,
    pub fields: TagFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added(i64),
    Updated(i64),
}

/// SQLite store behind the library. Cheap to clone - every clone shares one connection.
#[derive(Clone)]
pub struct LibraryDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl LibraryDatabase {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Could not open library at {}", db_path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("library database lock poisoned"))
    }

    fn initialize_tables(&self) -> Result<()> {
        let conn = self.conn()?;

        // Items - path kept as raw bytes, exactly as the filesystem gave it
        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY,
                path BLOB NOT NULL UNIQUE,
                added TEXT NOT NULL,
                mtime INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Flexible attributes - any field name, string values
        conn.execute(
            "CREATE TABLE IF NOT EXISTS item_fields (
                item_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (item_id, key)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_item_fields_key ON item_fields(key)",
            [],
        )?;

        Ok(())
    }

    /// Insert a new item or refresh an existing one. Tag fields overwrite
    /// stored values of the same name; fields only the library knows stay put.
    pub fn upsert_item(&self, path: &[u8], mtime: i64, fields: &TagFields) -> Result<Upsert> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM items WHERE path = ?1", params![path], |row| row.get(0))
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                tx.execute("UPDATE items SET mtime = ?1 WHERE id = ?2", params![mtime, id])?;
                Upsert::Updated(id)
            }
            None => {
                tx.execute(
                    "INSERT INTO items (path, added, mtime) VALUES (?1, ?2, ?3)",
                    params![path, chrono::Utc::now().to_rfc3339(), mtime],
                )?;
                Upsert::Added(tx.last_insert_rowid())
            }
        };

        let id = match outcome {
            Upsert::Added(id) | Upsert::Updated(id) => id,
        };
        upsert_fields(&tx, id, fields.iter())?;

        tx.commit()?;
        Ok(outcome)
    }

    /// mtime recorded at the last scan, if the path is known
    pub fn item_mtime(&self, path: &[u8]) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let mtime = conn
            .query_row("SELECT mtime FROM items WHERE path = ?1", params![path], |row| row.get(0))
            .optional()?;
        Ok(mtime)
    }

    pub fn save_fields<'a, I>(&self, item_id: i64, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        upsert_fields(&tx, item_id, fields)?;
        tx.commit()?;
        Ok(())
    }

    pub fn all_items(&self) -> Result<Vec<ItemRow>> {
        let conn = self.conn()?;

        let mut fields_by_item: HashMap<i64, TagFields> = HashMap::new();
        let mut stmt = conn.prepare("SELECT item_id, key, value FROM item_fields")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        for row in rows {
            let (item_id, key, value) = row?;
            fields_by_item.entry(item_id).or_default().insert(key, value);
        }

        let mut stmt = conn.prepare("SELECT id, path FROM items ORDER BY path")?;
        let items = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?
            .map(|row| {
                row.map(|(id, path)| ItemRow {
                    id,
                    path,
                    fields: fields_by_item.remove(&id).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn remove_item(&self, item_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM item_fields WHERE item_id = ?1", params![item_id])?;
        tx.execute("DELETE FROM items WHERE id = ?1", params![item_id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn upsert_fields<'a, I>(conn: &Connection, item_id: i64, fields: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut stmt = conn.prepare(
        "INSERT INTO item_fields (item_id, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(item_id, key) DO UPDATE SET value = excluded.value",
    )?;
    for (key, value) in fields {
        stmt.execute(params![item_id, key, value])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fields(pairs: &[(&str, &str)]) -> TagFields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn upsert_adds_then_updates() {
        let db = LibraryDatabase::open_in_memory().unwrap();

        let first = db.upsert_item(b"/music/a.mp3", 10, &fields(&[("title", "A")])).unwrap();
        let second = db.upsert_item(b"/music/a.mp3", 20, &fields(&[("title", "A2")])).unwrap();

        let Upsert::Added(id) = first else { panic!("expected a new item") };
        assert_eq!(second, Upsert::Updated(id));
        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(db.item_mtime(b"/music/a.mp3").unwrap(), Some(20));

        let items = db.all_items().unwrap();
        assert_eq!(items[0].fields["title"], "A2");
    }

    #[test]
    fn rescans_keep_library_only_fields() {
        let db = LibraryDatabase::open_in_memory().unwrap();
        let Upsert::Added(id) = db.upsert_item(b"/music/a.mp3", 1, &fields(&[("title", "A")])).unwrap() else {
            panic!("expected a new item")
        };

        let mood = fields(&[("mood", "calm")]);
        db.save_fields(id, mood.iter()).unwrap();
        db.upsert_item(b"/music/a.mp3", 2, &fields(&[("title", "A")])).unwrap();

        let items = db.all_items().unwrap();
        assert_eq!(items[0].fields["mood"], "calm");
    }

    #[test]
    fn items_come_back_in_path_order_with_their_fields() {
        let db = LibraryDatabase::open_in_memory().unwrap();
        db.upsert_item(b"/music/b.mp3", 0, &fields(&[("title", "B")])).unwrap();
        db.upsert_item(b"/music/a.mp3", 0, &fields(&[("title", "A"), ("artist", "X")])).unwrap();

        let items = db.all_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, b"/music/a.mp3".to_vec());
        assert_eq!(items[0].fields.len(), 2);
        assert_eq!(items[1].fields["title"], "B");
    }

    #[test]
    fn remove_drops_item_and_fields() {
        let db = LibraryDatabase::open_in_memory().unwrap();
        let Upsert::Added(id) = db.upsert_item(b"/music/a.mp3", 0, &fields(&[("title", "A")])).unwrap() else {
            panic!("expected a new item")
        };

        db.remove_item(id).unwrap();
        assert_eq!(db.count().unwrap(), 0);
        assert!(db.all_items().unwrap().is_empty());
    }

    #[test]
    fn open_creates_the_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("library.db");

        let db = LibraryDatabase::open(&path).unwrap();
        db.upsert_item(b"/music/a.mp3", 0, &TagFields::new()).unwrap();

        let reopened = LibraryDatabase::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
