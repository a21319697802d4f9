use super::{row_size, Capacities, NewRow, Row, RowMeta, TableStore, TableUsage};
use crate::error::{StoreError, StoreResult};
use crate::model::{SessionKey, Table};
use crate::schema::{TableSpec, UniqueKey};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct MemTable {
    unique: UniqueKey,
    rows: Vec<Row>,
}

impl MemTable {
    fn used_bytes(&self) -> u64 {
        self.rows.iter().map(|r| row_size(&r.session, &r.value)).sum()
    }

    fn violates_unique(&self, row: &NewRow) -> bool {
        self.rows.iter().any(|r| match self.unique {
            UniqueKey::Session => &r.session == row.session,
            UniqueKey::Timestamp => r.timestamp == row.timestamp,
        })
    }
}

#[derive(Default)]
struct Inner {
    tables: HashMap<Table, MemTable>,
    next_id: i64,
    unavailable: bool,
    failing_creates: HashSet<Table>,
    injected: HashMap<Table, VecDeque<StoreError>>,
    insert_attempts: HashMap<Table, usize>,
}

impl Inner {
    fn table(&self, table: Table) -> StoreResult<&MemTable> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.tables
            .get(&table)
            .ok_or(StoreError::MissingTable { table })
    }

    fn table_mut(&mut self, table: Table) -> StoreResult<&mut MemTable> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.tables
            .get_mut(&table)
            .ok_or(StoreError::MissingTable { table })
    }
}

/// In-memory store for testing and development.
/// Does NOT persist data.
///
/// Enforces the same uniqueness and capacity rules as the SQLite store, and
/// can be told to fail in the ways a real store fails.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    capacities: Capacities,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacities(capacities: Capacities) -> Self {
        Self {
            inner: Mutex::default(),
            capacities,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent `create_table` for this table fail.
    pub fn fail_create(&self, table: Table) {
        self.lock().failing_creates.insert(table);
    }

    /// Make the next `times` inserts into `table` fail with `error`.
    pub fn fail_next_inserts(&self, table: Table, error: StoreError, times: usize) {
        let mut inner = self.lock();
        let queue = inner.injected.entry(table).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// Simulate a store that could not be opened. Going down is logged once,
    /// like a failed open of the SQLite store.
    pub fn set_unavailable(&self, unavailable: bool) {
        let mut inner = self.lock();
        if unavailable && !inner.unavailable {
            tracing::error!(error = %StoreError::Unavailable, "Store unavailable");
        }
        inner.unavailable = unavailable;
    }

    /// Number of inserts attempted against `table`, failed ones included.
    pub fn insert_attempts(&self, table: Table) -> usize {
        self.lock().insert_attempts.get(&table).copied().unwrap_or(0)
    }

    /// Insert bypassing uniqueness and capacity checks, as a legacy table
    /// without constraints would allow.
    pub fn insert_unchecked(&self, table: Table, row: &NewRow) -> StoreResult<i64> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.table_mut(table)?.rows.push(Row {
            id,
            session: row.session.clone(),
            value: row.value.to_string(),
            timestamp: row.timestamp,
        });
        Ok(id)
    }
}

fn newest_first(a: &Row, b: &Row) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id))
}

impl TableStore for InMemoryStore {
    fn create_table(&self, spec: &TableSpec) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.unavailable {
            return Err(StoreError::Unavailable);
        }
        if inner.failing_creates.contains(&spec.table) {
            return Err(StoreError::Backend(format!(
                "Simulated create failure for '{}'",
                spec.table
            )));
        }
        inner.tables.entry(spec.table).or_insert_with(|| MemTable {
            unique: spec.unique,
            rows: Vec::new(),
        });
        Ok(())
    }

    fn drop_table(&self, table: Table) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.unavailable {
            return Err(StoreError::Unavailable);
        }
        inner.tables.remove(&table);
        Ok(())
    }

    fn has_table(&self, table: Table) -> bool {
        let inner = self.lock();
        !inner.unavailable && inner.tables.contains_key(&table)
    }

    fn insert(&self, table: Table, row: &NewRow) -> StoreResult<i64> {
        let mut inner = self.lock();
        *inner.insert_attempts.entry(table).or_default() += 1;

        if let Some(err) = inner.injected.get_mut(&table).and_then(VecDeque::pop_front) {
            return Err(err);
        }

        let capacity = self.capacities.for_table(table);
        let t = inner.table(table)?;
        if t.violates_unique(row) {
            return Err(StoreError::Conflict { table });
        }
        if t.used_bytes() + row_size(row.session, row.value) > capacity {
            return Err(StoreError::CapacityExhausted { table });
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.table_mut(table)?.rows.push(Row {
            id,
            session: row.session.clone(),
            value: row.value.to_string(),
            timestamp: row.timestamp,
        });
        Ok(id)
    }

    fn update(
        &self,
        table: Table,
        session: &SessionKey,
        value: &str,
        timestamp: i64,
    ) -> StoreResult<usize> {
        let capacity = self.capacities.for_table(table);
        let mut inner = self.lock();
        let t = inner.table_mut(table)?;

        let (old, new) = t
            .rows
            .iter()
            .filter(|r| &r.session == session)
            .fold((0, 0), |(old, new), r| {
                (old + row_size(&r.session, &r.value), new + row_size(session, value))
            });
        if t.used_bytes() - old + new > capacity {
            return Err(StoreError::CapacityExhausted { table });
        }

        let mut changed = 0;
        for row in t.rows.iter_mut().filter(|r| &r.session == session) {
            row.value = value.to_string();
            row.timestamp = timestamp;
            changed += 1;
        }
        Ok(changed)
    }

    fn select(&self, table: Table, session: &SessionKey) -> StoreResult<Vec<Row>> {
        let inner = self.lock();
        let mut rows: Vec<Row> = inner
            .table(table)?
            .rows
            .iter()
            .filter(|r| &r.session == session)
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }

    fn select_at(
        &self,
        table: Table,
        session: &SessionKey,
        timestamp: i64,
    ) -> StoreResult<Option<Row>> {
        let inner = self.lock();
        Ok(inner
            .table(table)?
            .rows
            .iter()
            .find(|r| &r.session == session && r.timestamp == timestamp)
            .cloned())
    }

    fn rows(&self, table: Table) -> StoreResult<Vec<RowMeta>> {
        let inner = self.lock();
        let mut rows: Vec<RowMeta> = inner
            .table(table)?
            .rows
            .iter()
            .map(|r| RowMeta {
                id: r.id,
                session: r.session.clone(),
                timestamp: r.timestamp,
                bytes: row_size(&r.session, &r.value),
            })
            .collect();
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn delete_session(&self, table: Table, session: &SessionKey) -> StoreResult<usize> {
        let mut inner = self.lock();
        let t = inner.table_mut(table)?;
        let before = t.rows.len();
        t.rows.retain(|r| &r.session != session);
        Ok(before - t.rows.len())
    }

    fn delete_at(&self, table: Table, session: &SessionKey, timestamp: i64) -> StoreResult<usize> {
        let mut inner = self.lock();
        let t = inner.table_mut(table)?;
        let before = t.rows.len();
        t.rows
            .retain(|r| !(&r.session == session && r.timestamp == timestamp));
        Ok(before - t.rows.len())
    }

    fn delete_ids(&self, table: Table, ids: &[i64]) -> StoreResult<usize> {
        let mut inner = self.lock();
        let t = inner.table_mut(table)?;
        let before = t.rows.len();
        t.rows.retain(|r| !ids.contains(&r.id));
        Ok(before - t.rows.len())
    }

    fn usage(&self, table: Table) -> StoreResult<TableUsage> {
        let inner = self.lock();
        let t = inner.table(table)?;
        Ok(TableUsage {
            table,
            rows: t.rows.len() as u64,
            bytes: t.used_bytes(),
            capacity: self.capacities.for_table(table),
        })
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::codec::{encode_value, Codec, DeflateCodec};
    use crate::model::{CursorPos, Features};
    use crate::schema::SchemaManager;
    use std::sync::Arc;

    /// Builds an `InMemoryStore` holding encoded rows, as the engine would write them.
    pub struct StoreFixture {
        pub store: Arc<InMemoryStore>,
        codec: DeflateCodec,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self::with_store(InMemoryStore::new())
        }

        pub fn with_store(store: InMemoryStore) -> Self {
            let store = Arc::new(store);
            SchemaManager::new(Arc::clone(&store)).initialize(Features::default());
            Self {
                store,
                codec: DeflateCodec::default(),
            }
        }

        pub fn with_snapshot(self, path: &str, timestamp: i64, text: &str) -> Self {
            let value = self.codec.encode_text(text).unwrap();
            self.store
                .insert(
                    Table::LocalHistory,
                    &NewRow {
                        session: &SessionKey::from(path),
                        value: &value,
                        timestamp,
                    },
                )
                .unwrap();
            self
        }

        pub fn with_unsaved_text(self, path: &str, touched_at: i64, text: &str) -> Self {
            let value = self.codec.encode_text(text).unwrap();
            self.store
                .insert(
                    Table::UnsavedDocChanges,
                    &NewRow {
                        session: &SessionKey::from(path),
                        value: &value,
                        timestamp: touched_at,
                    },
                )
                .unwrap();
            self
        }

        pub fn with_cursor(self, path: &str, touched_at: i64, cursor: CursorPos) -> Self {
            let value = encode_value(&self.codec, &cursor).unwrap();
            self.store
                .insert(
                    Table::CursorPos,
                    &NewRow {
                        session: &SessionKey::from(path),
                        value: &value,
                        timestamp: touched_at,
                    },
                )
                .unwrap();
            self
        }
    }
}
