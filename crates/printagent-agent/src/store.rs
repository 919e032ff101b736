// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local key-value persistence and the saved-printer registry.
//
// Values are JSON documents stored under string keys.  The registry keeps the
// user's printers as one array under the `printers` key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info, instrument};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::{DiscoveredUsbDevice, PrinterRecord};

/// Store key holding the saved printer array.
pub const PRINTERS_KEY: &str = "printers";
/// Store key holding the backend bearer token.
pub const TOKEN_KEY: &str = "agentToken";
/// Store key holding `{ email, password }` for re-login.
pub const CREDENTIALS_KEY: &str = "agentCredentials";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

/// JSON key-value persistence.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// SQLite-backed store, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn storage(context: &str) -> impl FnOnce(rusqlite::Error) -> AgentError + '_ {
    move |e| AgentError::Storage(format!("{context}: {e}"))
}

impl SqliteStore {
    /// Open (or create) the store database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(storage("open"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(storage("WAL pragma"))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(storage("create table"))?;

        info!("store database opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage("open in-memory"))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(storage("create table"))?;

        debug!("in-memory store database opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AgentError::Storage("store lock poisoned".into()))
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(storage("get"))?;
        raw.map(|text| serde_json::from_str(&text).map_err(AgentError::from))
            .transpose()
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.conn()?
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, text, Utc::now().to_rfc3339()],
            )
            .map_err(storage("set"))?;
        debug!(key, "store value written");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(storage("delete"))?;
        Ok(())
    }
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.values
            .lock()
            .map_err(|_| AgentError::Storage("store lock poisoned".into()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.values()?.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

/// Saved printers on top of a `KvStore`.
#[derive(Clone)]
pub struct PrinterRegistry {
    store: Arc<dyn KvStore>,
}

impl PrinterRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// All saved printers; an absent key is an empty list.
    pub fn list(&self) -> Result<Vec<PrinterRecord>> {
        match self.store.get(PRINTERS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<PrinterRecord>> {
        Ok(self.list()?.into_iter().find(|p| p.id == id))
    }

    /// Replace the record with the same id, or append.  Saving a default
    /// printer clears the flag on every other record.
    #[instrument(skip(self, printer), fields(id = %printer.id))]
    pub fn save(&self, printer: PrinterRecord) -> Result<()> {
        let mut printers = self.list()?;
        if printer.is_default {
            for other in printers.iter_mut().filter(|p| p.id != printer.id) {
                other.is_default = false;
            }
        }
        match printers.iter_mut().find(|p| p.id == printer.id) {
            Some(existing) => *existing = printer,
            None => printers.push(printer),
        }
        self.write(&printers)?;
        info!(count = printers.len(), "printer saved");
        Ok(())
    }

    /// Remove a printer.  Returns whether a record was removed.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut printers = self.list()?;
        let before = printers.len();
        printers.retain(|p| p.id != id);
        let removed = printers.len() != before;
        if removed {
            self.write(&printers)?;
        }
        Ok(removed)
    }

    /// Make `id` the only default printer.
    pub fn set_default(&self, id: &str) -> Result<()> {
        let mut printers = self.list()?;
        if !printers.iter().any(|p| p.id == id) {
            return Err(AgentError::PrinterNotFound(id.to_string()));
        }
        for printer in &mut printers {
            printer.is_default = printer.id == id;
        }
        self.write(&printers)
    }

    /// Stamp `last_used` on a printer after a successful print.
    pub fn touch(&self, id: &str) -> Result<()> {
        let mut printers = self.list()?;
        if let Some(printer) = printers.iter_mut().find(|p| p.id == id) {
            printer.last_used = Some(Utc::now());
            self.write(&printers)?;
        }
        Ok(())
    }

    fn write(&self, printers: &[PrinterRecord]) -> Result<()> {
        self.store.set(PRINTERS_KEY, &serde_json::to_value(printers)?)
    }
}

/// Discovered devices that have not been saved yet.
pub fn new_devices<'a>(
    discovered: &'a [DiscoveredUsbDevice],
    saved: &[PrinterRecord],
) -> Vec<&'a DiscoveredUsbDevice> {
    discovered
        .iter()
        .filter(|d| !saved.iter().any(|s| s.id == d.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usb_record(id: &str, name: &str) -> PrinterRecord {
        let mut record = PrinterRecord::network(id, name, "", 0);
        record.ip_address = None;
        record.port = None;
        record.is_usb = true;
        record
    }

    fn device(id: &str) -> DiscoveredUsbDevice {
        DiscoveredUsbDevice {
            id: id.into(),
            name: format!("Printer {id}"),
            vendor_id: 0x04b8,
            product_id: 0x0003,
            brand: "Epson".into(),
            is_usb: true,
            is_connected: true,
        }
    }

    #[test]
    fn sqlite_store_round_trip_and_overwrite() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert_eq!(store.get("missing").expect("get"), None);

        store.set(TOKEN_KEY, &json!("abc")).expect("set");
        store.set(TOKEN_KEY, &json!("def")).expect("overwrite");
        assert_eq!(store.get(TOKEN_KEY).expect("get"), Some(json!("def")));

        store.delete(TOKEN_KEY).expect("delete");
        assert_eq!(store.get(TOKEN_KEY).expect("get"), None);
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.db");
        {
            let store = SqliteStore::open(&path).expect("open");
            store.set(CREDENTIALS_KEY, &json!({ "email": "a@b.c", "password": "x" })).expect("set");
        }
        let store = SqliteStore::open(&path).expect("reopen");
        let value = store.get(CREDENTIALS_KEY).expect("get").expect("present");
        assert_eq!(value["email"], "a@b.c");
    }

    #[test]
    fn save_replaces_by_id() {
        let registry = PrinterRegistry::new(Arc::new(MemoryStore::default()));
        registry.save(usb_record("04b8:0003", "Epson")).expect("save");
        registry.save(usb_record("03f0:2b17", "HP")).expect("save");
        registry.save(usb_record("04b8:0003", "Epson L3150")).expect("replace");

        let printers = registry.list().expect("list");
        assert_eq!(printers.len(), 2);
        assert_eq!(printers[0].name, "Epson L3150");
        assert_eq!(registry.get("03f0:2b17").expect("get").map(|p| p.name), Some("HP".into()));
    }

    #[test]
    fn at_most_one_default() {
        let registry = PrinterRegistry::new(Arc::new(MemoryStore::default()));
        let mut first = usb_record("a", "A");
        first.is_default = true;
        registry.save(first).expect("save");
        let mut second = usb_record("b", "B");
        second.is_default = true;
        registry.save(second).expect("save");

        let defaults: Vec<String> = registry
            .list()
            .expect("list")
            .into_iter()
            .filter(|p| p.is_default)
            .map(|p| p.id)
            .collect();
        assert_eq!(defaults, vec!["b"]);

        registry.set_default("a").expect("set default");
        let defaults: Vec<bool> = registry.list().expect("list").iter().map(|p| p.is_default).collect();
        assert_eq!(defaults, vec![true, false]);
        assert!(registry.set_default("zzz").is_err());
    }

    #[test]
    fn delete_reports_removal() {
        let registry = PrinterRegistry::new(Arc::new(MemoryStore::default()));
        registry.save(usb_record("a", "A")).expect("save");
        assert!(registry.delete("a").expect("delete"));
        assert!(!registry.delete("a").expect("delete again"));
        assert!(registry.list().expect("list").is_empty());
    }

    #[test]
    fn new_device_is_reported_until_saved() {
        let registry = PrinterRegistry::new(Arc::new(MemoryStore::default()));
        let discovered = vec![device("04b8:0003")];

        let fresh = new_devices(&discovered, &registry.list().expect("list"));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "04b8:0003");

        registry.save(PrinterRecord::from(fresh[0])).expect("save");
        let fresh = new_devices(&discovered, &registry.list().expect("list"));
        assert!(fresh.is_empty());
    }

    #[test]
    fn touch_sets_last_used() {
        let registry = PrinterRegistry::new(Arc::new(MemoryStore::default()));
        registry.save(usb_record("a", "A")).expect("save");
        registry.touch("a").expect("touch");
        assert!(registry.get("a").expect("get").expect("present").last_used.is_some());
    }
}
