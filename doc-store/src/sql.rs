//! SQLite document store.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use rusqlite::{Connection, params, params_from_iter};
use tracing::{debug, info, trace};

use crate::{
    DocumentStore,
    document::{Document, Filters},
    errors::StoreError,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS document (
        seq  INTEGER PRIMARY KEY AUTOINCREMENT,
        id   TEXT NOT NULL UNIQUE,
        text TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS meta (
        document_id TEXT NOT NULL REFERENCES document(id) ON DELETE CASCADE,
        name        TEXT NOT NULL,
        value       TEXT NOT NULL,
        PRIMARY KEY (document_id, name)
    );
";

/// Max ids bound into one `IN (...)` meta lookup.
const META_BATCH: usize = 500;

/// Where a connection string points to.
#[derive(Debug, PartialEq)]
enum Target {
    Memory,
    File(PathBuf),
}

/// Parses SQLAlchemy-style SQLite URLs.
///
/// - `sqlite://` and `sqlite:///:memory:` → in-memory
/// - `sqlite:///qa.db` → relative path `qa.db`
/// - `sqlite:////var/qa.db` → absolute path `/var/qa.db`
/// - anything without a scheme is taken as a plain path
fn parse_url(url: &str) -> Result<Target, StoreError> {
    let url = url.trim();
    let Some((scheme, rest)) = url.split_once("://") else {
        if url.is_empty() {
            return Err(StoreError::InvalidUrl(url.to_string()));
        }
        return Ok(target_for(url));
    };

    if scheme != "sqlite" {
        return Err(StoreError::InvalidUrl(url.to_string()));
    }

    match rest.strip_prefix('/') {
        None if rest.is_empty() || rest == ":memory:" => Ok(Target::Memory),
        None => Err(StoreError::InvalidUrl(url.to_string())),
        Some("") => Err(StoreError::InvalidUrl(url.to_string())),
        Some(path) => Ok(target_for(path)),
    }
}

fn target_for(path: &str) -> Target {
    if path == ":memory:" {
        Target::Memory
    } else {
        Target::File(PathBuf::from(path))
    }
}

/// Document store backed by a single SQLite connection.
pub struct SqlDocumentStore {
    conn: Mutex<Connection>,
}

impl SqlDocumentStore {
    /// Opens (and creates the schema of) the database behind `url`.
    ///
    /// # Errors
    /// `StoreError::InvalidUrl` for non-SQLite URLs, `StoreError::Sqlite` on open
    /// or schema failures.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        match parse_url(url)? {
            Target::Memory => Self::in_memory(),
            Target::File(path) => Self::open(&path),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening document store at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// Opens an in-memory database (mostly for tests).
    pub fn in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory document store");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Loads meta rows for the ids in `docs` and attaches them.
    fn attach_meta(conn: &Connection, docs: &mut [Document]) -> Result<(), StoreError> {
        let mut by_doc: HashMap<String, Vec<(String, String)>> = HashMap::new();

        for chunk in docs.chunks(META_BATCH) {
            let marks = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT document_id, name, value FROM meta WHERE document_id IN ({marks})"
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|d| &d.id)), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (doc_id, name, value) = row?;
                by_doc.entry(doc_id).or_default().push((name, value));
            }
        }

        for doc in docs.iter_mut() {
            if let Some(pairs) = by_doc.remove(&doc.id) {
                doc.meta.extend(pairs);
            }
        }
        Ok(())
    }

    fn select_documents(
        conn: &Connection,
        sql: &str,
        args: Vec<String>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok(Document {
                id: row.get(0)?,
                text: row.get(1)?,
                meta: Default::default(),
            })
        })?;
        let mut docs = rows.collect::<Result<Vec<_>, _>>()?;
        Self::attach_meta(conn, &mut docs)?;
        Ok(docs)
    }
}

impl DocumentStore for SqlDocumentStore {
    fn write_documents(&self, docs: &[Document]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO document (id, text) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET text = excluded.text",
            )?;
            let mut clear_meta = tx.prepare("DELETE FROM meta WHERE document_id = ?1")?;
            let mut insert_meta =
                tx.prepare("INSERT INTO meta (document_id, name, value) VALUES (?1, ?2, ?3)")?;

            for doc in docs {
                upsert.execute(params![doc.id, doc.text])?;
                clear_meta.execute(params![doc.id])?;
                for (name, value) in &doc.meta {
                    insert_meta.execute(params![doc.id, name, value])?;
                }
            }
        }
        tx.commit()?;

        debug!("write_documents: wrote {} documents", docs.len());
        Ok(docs.len())
    }

    fn get_all_documents(&self) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;
        let docs = Self::select_documents(
            &conn,
            "SELECT id, text FROM document ORDER BY seq",
            Vec::new(),
        )?;
        trace!("get_all_documents: {} documents", docs.len());
        Ok(docs)
    }

    fn get_document_by_id(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        let mut docs = Self::select_documents(
            &conn,
            "SELECT id, text FROM document WHERE id = ?1",
            vec![id.to_string()],
        )?;
        Ok(docs.pop())
    }

    fn get_document_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM document", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query(&self, filters: &Filters) -> Result<Vec<Document>, StoreError> {
        let mut sql = String::from("SELECT d.id, d.text FROM document d WHERE 1 = 1");
        let mut args = Vec::with_capacity(filters.len() * 2);
        for (i, (name, value)) in filters.iter().enumerate() {
            let (n, v) = (i * 2 + 1, i * 2 + 2);
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM meta m WHERE m.document_id = d.id \
                 AND m.name = ?{n} AND m.value = ?{v})"
            ));
            args.push(name.clone());
            args.push(value.clone());
        }
        sql.push_str(" ORDER BY d.seq");

        let conn = self.lock()?;
        Self::select_documents(&conn, &sql, args)
    }
}
