//! Read/write access to the embedded message log.
//!
//! A [`Log`] wraps a single SQLite database holding the schema
//! `topics (id, name, message_type_id) x messages (topic_id, time_recv,
//! message)`. The write side batches inserts into periodic transactions;
//! the read side exposes the topic catalog as a [`Descriptor`] and answers
//! selection queries with lazy [`Batch`]es. All connection state lives
//! behind one mutex, so batches from several threads interleave safely
//! regardless of how the store library itself was compiled.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use rusqlite::{params, params_from_iter, Connection, OpenFlags};

use crate::batch::{Batch, Message};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::query::{AllTopics, QueryOptions};
use crate::sql::{SqlParameter, SqlStatement};

/// Schema version this crate reads and writes.
pub const SCHEMA_VERSION: &str = "0.1.0";

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS migrations (
  id INTEGER PRIMARY KEY,
  from_version TEXT,
  to_version TEXT NOT NULL
);
INSERT INTO migrations (to_version)
  SELECT '0.1.0' WHERE NOT EXISTS (SELECT 1 FROM migrations);
CREATE TABLE IF NOT EXISTS message_types (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS topics (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  message_type_id INTEGER NOT NULL REFERENCES message_types (id),
  UNIQUE (name, message_type_id)
);
CREATE TABLE IF NOT EXISTS messages (
  id INTEGER PRIMARY KEY,
  time_recv INTEGER NOT NULL,
  message BLOB NOT NULL,
  topic_id INTEGER NOT NULL REFERENCES topics (id)
);
CREATE INDEX IF NOT EXISTS messages_by_time ON messages (time_recv, id);
";

/// Inserts are grouped into transactions of roughly this length.
const TRANSACTION_PERIOD: Duration = Duration::from_millis(500);

/// How a log file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    /// Read-write; the file and schema are created if missing.
    ReadWriteCreate,
}

struct StoreInner {
    conn: Connection,
    descriptor: Option<Arc<Descriptor>>,
    in_transaction: bool,
    last_transaction: Instant,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(err) = self.conn.execute_batch("END;") {
                error!("failed to end transaction on close: {err}");
            }
        }
    }
}

/// An openable message log. Starts closed; [`Log::open`] makes it valid.
///
/// `Log` is a cheap handle: clones share the same underlying store, which
/// is how the playback factory, its handles, and in-flight batches all
/// reference one open file.
#[derive(Clone, Default)]
pub struct Log {
    inner: Arc<Mutex<Option<StoreInner>>>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the process-wide store library tolerates concurrent readers.
    pub fn threadsafe() -> bool {
        unsafe { rusqlite::ffi::sqlite3_threadsafe() != 0 }
    }

    /// Opens `file`, or the in-memory sentinel `:memory:`.
    ///
    /// In [`OpenMode::ReadWriteCreate`] a missing file is created and the
    /// schema initialized. Fails with [`Error::AlreadyOpen`] if this log is
    /// already open, [`Error::FailedToOpen`] if the path cannot be opened,
    /// and [`Error::InvalidVersion`] on a schema mismatch; in the failure
    /// cases the log stays invalid.
    pub fn open(&self, file: &str, mode: OpenMode) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            error!("a log file is already open");
            return Err(Error::AlreadyOpen);
        }

        let flags = match mode {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = match Connection::open_with_flags(file, flags) {
            Ok(conn) => conn,
            Err(err) => {
                error!("failed to open [{file}]: {err}");
                return Err(Error::FailedToOpen(file.to_owned()));
            }
        };

        if mode == OpenMode::ReadWriteCreate {
            if let Err(err) = conn.execute_batch(SCHEMA) {
                error!("failed to initialize schema in [{file}]: {err}");
                return Err(Error::FailedToOpen(file.to_owned()));
            }
        }

        match read_version(&conn) {
            Some(version) if version == SCHEMA_VERSION => {}
            Some(version) => {
                error!("log file [{file}] has unsupported version [{version}]");
                return Err(Error::InvalidVersion(version));
            }
            None => {
                error!("log file [{file}] has no version");
                return Err(Error::InvalidVersion("unknown".to_owned()));
            }
        }

        debug!("opened log file [{file}]");
        *guard = Some(StoreInner {
            conn,
            descriptor: None,
            in_transaction: false,
            last_transaction: Instant::now(),
        });
        Ok(())
    }

    /// Whether a log file is open with a recognized schema.
    pub fn valid(&self) -> bool {
        self.lock().is_some()
    }

    /// Commits any pending transaction and closes the file. The log may be
    /// opened again afterwards.
    pub fn close(&self) {
        *self.lock() = None;
    }

    /// The schema version recorded in the open file.
    pub fn version(&self) -> Result<String> {
        let guard = self.lock();
        let inner = guard.as_ref().ok_or(Error::LogInvalid)?;
        read_version(&inner.conn).ok_or_else(|| Error::InvalidVersion("unknown".to_owned()))
    }

    /// The catalog of topics and message types currently in the log.
    pub fn descriptor(&self) -> Result<Arc<Descriptor>> {
        let mut guard = self.lock();
        let inner = guard.as_mut().ok_or(Error::LogInvalid)?;
        build_descriptor(inner)
    }

    /// Appends one message. New `(topic, type)` pairings are added to the
    /// catalog on demand.
    pub fn insert_message(
        &self,
        time_ns: i64,
        topic: &str,
        msg_type: &str,
        data: &[u8],
    ) -> Result<()> {
        let mut guard = self.lock();
        let inner = guard.as_mut().ok_or(Error::LogInvalid)?;

        if !inner.in_transaction {
            inner.conn.execute_batch("BEGIN;")?;
            inner.in_transaction = true;
            inner.last_transaction = Instant::now();
        }

        let topic_id = insert_or_get_topic_id(inner, topic, msg_type)?;
        inner.conn.execute(
            "INSERT INTO messages (time_recv, message, topic_id) VALUES (?1, ?2, ?3);",
            params![time_ns, data, topic_id],
        )?;

        if inner.last_transaction.elapsed() > TRANSACTION_PERIOD {
            inner.conn.execute_batch("END;")?;
            inner.in_transaction = false;
        }
        Ok(())
    }

    /// Runs a selection and returns its batch. Selections that match nothing
    /// warn and yield an empty batch.
    pub fn query_messages(&self, options: &dyn QueryOptions) -> Batch {
        let statements = {
            let mut guard = self.lock();
            let Some(inner) = guard.as_mut() else {
                warn!("cannot query messages: no log file is open");
                return Batch::empty();
            };
            let descriptor = match build_descriptor(inner) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    error!("failed to read topic catalog: {err}");
                    return Batch::empty();
                }
            };
            options.generate_statements(&descriptor)
        };

        if statements.is_empty() {
            warn!("no matching topics found in log file");
            return Batch::empty();
        }
        Batch::new(self.clone(), statements)
    }

    /// Every message in the log, in time order.
    pub fn all_messages(&self) -> Batch {
        self.query_messages(&AllTopics::new())
    }

    /// Fetches up to `limit` rows of `statement`, resuming after `cursor`.
    pub(crate) fn fetch_chunk(
        &self,
        statement: &SqlStatement,
        cursor: (i64, i64),
        limit: usize,
    ) -> Result<Vec<(i64, Message)>> {
        let guard = self.lock();
        let inner = guard.as_ref().ok_or(Error::LogInvalid)?;

        let mut parameters = Vec::with_capacity(statement.parameters.len() + 4);
        parameters.push(SqlParameter::Integer(cursor.0));
        parameters.push(SqlParameter::Integer(cursor.0));
        parameters.push(SqlParameter::Integer(cursor.1));
        parameters.extend(statement.parameters.iter().cloned());
        parameters.push(SqlParameter::Integer(limit as i64));

        let mut prepared = inner.conn.prepare(&statement.text)?;
        let mut rows = prepared.query(params_from_iter(parameters.iter()))?;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let time_received: i64 = row.get(1)?;
            let topic: String = row.get(2)?;
            let msg_type: String = row.get(3)?;
            let data: Vec<u8> = row.get(4)?;
            fetched.push((
                id,
                Message {
                    topic,
                    msg_type,
                    time_received,
                    data,
                },
            ));
        }
        Ok(fetched)
    }

    fn lock(&self) -> MutexGuard<'_, Option<StoreInner>> {
        self.inner.lock().expect("log store lock poisoned")
    }
}

fn read_version(conn: &Connection) -> Option<String> {
    conn.query_row(
        "SELECT to_version FROM migrations ORDER BY id DESC LIMIT 1;",
        [],
        |row| row.get(0),
    )
    .ok()
}

fn build_descriptor(inner: &mut StoreInner) -> Result<Arc<Descriptor>> {
    if let Some(descriptor) = &inner.descriptor {
        return Ok(Arc::clone(descriptor));
    }

    let mut statement = inner.conn.prepare(
        "SELECT topics.id, topics.name, message_types.name FROM topics \
         JOIN message_types ON topics.message_type_id = message_types.id;",
    )?;
    let mut rows = statement.query([])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let topic: String = row.get(1)?;
        let msg_type: String = row.get(2)?;
        entries.push((id, topic, msg_type));
    }
    drop(rows);
    drop(statement);

    let descriptor = Arc::new(Descriptor::from_rows(entries));
    inner.descriptor = Some(Arc::clone(&descriptor));
    Ok(descriptor)
}

fn insert_or_get_topic_id(inner: &mut StoreInner, topic: &str, msg_type: &str) -> Result<i64> {
    if let Some(id) = build_descriptor(inner)?.topic_id(topic, msg_type) {
        return Ok(id);
    }

    // A new pairing invalidates the cached catalog.
    inner.descriptor = None;

    inner.conn.execute(
        "INSERT OR IGNORE INTO message_types (name) VALUES (?1);",
        params![msg_type],
    )?;
    inner.conn.execute(
        "INSERT INTO topics (name, message_type_id) \
         SELECT ?1, id FROM message_types WHERE name = ?2 LIMIT 1;",
        params![topic, msg_type],
    )?;
    let id = inner.conn.last_insert_rowid();
    debug!("inserted topic [{topic}] [{msg_type}] as id {id}");
    Ok(id)
}
