//! Cursors: statement handle lifecycle and the execute/fetch protocol.

use std::{
    ffi::CString,
    sync::{Arc, Weak},
};

use tracing::{debug, warn};

use crate::{
    binder,
    connection::{ConnState, Shared},
    engine::{Engine, RawHandle},
    error::{Error, Result},
    registry::{HandleId, HandleKind},
    result::{self, ColumnDescriptor},
    status,
    types::{Param, Row, Value},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CursorState {
    /// Created, no statement run yet.
    Idle,
    /// Statement text accepted by the engine, not executed yet.
    Prepared,
    Executed,
    /// The result set has been read to its end.
    Exhausted,
    Closed,
}

/// Executes statements and reads their results.
///
/// A cursor references its [`Connection`](crate::Connection) but does not keep it alive; once
/// the connection is closed every operation fails with an interface error.
pub struct Cursor {
    conn: Weak<Shared>,
    stmt: Option<HandleId>,
    state: CursorState,
    has_result: bool,
    columns: Vec<ColumnDescriptor>,
    rowcount: i64,
    arraysize: usize,
    trim_char: bool,
}

impl Cursor {
    pub(crate) fn new(conn: Weak<Shared>, trim_char: bool) -> Self {
        Self {
            conn,
            stmt: None,
            state: CursorState::Idle,
            has_result: false,
            columns: Vec::new(),
            rowcount: -1,
            arraysize: 1,
            trim_char,
        }
    }

    /// Current state. A cursor whose connection has been closed reports [`CursorState::Closed`].
    pub fn state(&self) -> CursorState {
        match self.conn.upgrade() {
            Some(shared) if shared.state.lock().is_open() => self.state,
            _ => CursorState::Closed,
        }
    }

    fn ensure_usable(&self, context: &str) -> Result<Arc<Shared>> {
        if self.state == CursorState::Closed {
            return Err(Error::programming(context, "cursor is closed"));
        }
        self.conn
            .upgrade()
            .ok_or_else(|| Error::interface(context, "connection is closed"))
    }

    /// Execute `sql` with `params`, inferring each parameter's type tag from its value.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<&mut Self> {
        let params: Vec<Param> = params.iter().cloned().map(Param::from).collect();
        self.execute_typed(sql, &params)
    }

    /// Execute `sql` with explicitly typed parameters.
    ///
    /// Discards the previous result set, if any. Fails with a programming error before the
    /// native execute if the number of parameters does not match the statement.
    pub fn execute_typed(&mut self, sql: &str, params: &[Param]) -> Result<&mut Self> {
        let shared = self.ensure_usable("execute")?;
        let mut st = shared.state.lock();
        st.ensure_open("execute")?;
        let sql_c = statement_text(sql)?;

        let raw = self.statement(&mut st)?;
        let engine = shared.engine.as_ref();

        self.reset(engine, raw)?;
        let expected = prepare(engine, raw, &sql_c)?;
        self.state = CursorState::Prepared;

        let bindings = binder::bind(engine, raw, params, expected)?;
        debug!(sql, params = bindings.len(), "execute");
        let mut has_result = false;
        let rc = engine.execute(raw, &mut has_result);
        drop(bindings);
        status::check(engine, raw, rc, "execute")?;
        self.has_result = has_result;

        self.finish_execute(engine, raw)?;
        Ok(self)
    }

    /// Prepare `sql` once and execute it for every parameter set.
    ///
    /// `rowcount` becomes the sum of the affected rows. A statement that produces a result set
    /// is rejected with a programming error.
    pub fn executemany<I, P>(&mut self, sql: &str, param_sets: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[Value]>,
    {
        let shared = self.ensure_usable("executemany")?;
        let mut st = shared.state.lock();
        st.ensure_open("executemany")?;
        let sql_c = statement_text(sql)?;

        let raw = self.statement(&mut st)?;
        let engine = shared.engine.as_ref();

        self.reset(engine, raw)?;
        let expected = prepare(engine, raw, &sql_c)?;
        self.state = CursorState::Prepared;

        let mut total = 0i64;
        let mut sets = 0usize;
        for set in param_sets {
            let params: Vec<Param> = set.as_ref().iter().cloned().map(Param::from).collect();
            let bindings = binder::bind(engine, raw, &params, expected)?;
            let mut has_result = false;
            let rc = engine.execute(raw, &mut has_result);
            drop(bindings);
            status::check(engine, raw, rc, format_args!("executemany set {}", sets + 1))?;

            if has_result {
                self.has_result = true;
                self.reset(engine, raw)?;
                return Err(Error::programming(
                    "executemany",
                    "statement produced a result set",
                ));
            }
            let mut count = -1i64;
            let rc = engine.row_count(raw, &mut count);
            status::check(engine, raw, rc, "row count")?;
            total += count.max(0);
            sets += 1;
        }

        debug!(sql, sets, rows = total, "executemany");
        self.state = CursorState::Executed;
        self.rowcount = total;
        Ok(self)
    }

    /// The cursor's statement handle, allocated on first use.
    fn statement(&mut self, st: &mut ConnState) -> Result<RawHandle> {
        let stmt = match self.stmt.filter(|id| st.registry.is_live(*id)) {
            Some(id) => id,
            None => {
                let conn = st.conn;
                let id = st.registry.allocate(HandleKind::Statement, Some(conn))?;
                self.stmt = Some(id);
                id
            }
        };
        st.registry.raw(stmt)
    }

    /// Drop the previous result set before the statement is reused.
    ///
    /// `has_result` stays set until the engine has closed the result set, so a failed close is
    /// retried by the next reset.
    fn reset(&mut self, engine: &dyn Engine, raw: RawHandle) -> Result<()> {
        self.state = CursorState::Idle;
        self.columns.clear();
        self.rowcount = -1;
        if self.has_result {
            let rc = engine.close_result(raw);
            status::check(engine, raw, rc, "close result")?;
            self.has_result = false;
        }
        Ok(())
    }

    /// Read metadata after a successful native execute. `has_result` is already set, so an open
    /// result set is closed by the next reset even if this fails.
    fn finish_execute(&mut self, engine: &dyn Engine, raw: RawHandle) -> Result<()> {
        if self.has_result {
            self.columns = result::describe(engine, raw)?;
        }
        let mut count = -1i64;
        let rc = engine.row_count(raw, &mut count);
        status::check(engine, raw, rc, "row count")?;

        self.rowcount = count;
        self.state = CursorState::Executed;
        Ok(())
    }

    /// Next row of the current result set, or `None` once it is exhausted.
    pub fn fetchone(&mut self) -> Result<Option<Row>> {
        let shared = self.ensure_usable("fetch")?;
        let st = shared.state.lock();
        st.ensure_open("fetch")?;

        match self.state {
            CursorState::Exhausted => return Ok(None),
            CursorState::Executed if self.has_result => {}
            CursorState::Executed => {
                return Err(Error::programming("fetch", "statement did not produce a result set"))
            }
            _ => return Err(Error::programming("fetch", "no statement has been executed")),
        }

        let stmt = self
            .stmt
            .ok_or_else(|| Error::programming("fetch", "no statement has been executed"))?;
        let raw = st.registry.raw(stmt)?;
        match result::fetch_row(shared.engine.as_ref(), raw, &self.columns, self.trim_char)? {
            Some(row) => Ok(Some(row)),
            None => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Up to `size` rows, [`arraysize`](Cursor::arraysize) when `None`.
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        let size = size.unwrap_or(self.arraysize);
        let mut rows = Vec::with_capacity(size.min(self.arraysize));
        while rows.len() < size {
            match self.fetchone()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// All remaining rows.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        self.rows().collect()
    }

    /// Iterator over the remaining rows. Stops after the first error.
    pub fn rows(&mut self) -> Rows<'_> {
        Rows {
            cursor: self,
            done: false,
        }
    }

    /// Columns of the current result set; `None` if the last statement produced none.
    pub fn description(&self) -> Option<&[ColumnDescriptor]> {
        match self.state {
            CursorState::Executed | CursorState::Exhausted if self.has_result => {
                Some(self.columns.as_slice())
            }
            _ => None,
        }
    }

    /// Rows affected by the last statement; -1 when the engine does not know.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size.max(1);
    }

    /// Release the statement handle. Closing a closed cursor does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == CursorState::Closed {
            return Ok(());
        }
        self.state = CursorState::Closed;
        self.has_result = false;
        self.columns.clear();
        self.release_statement()
    }

    fn release_statement(&mut self) -> Result<()> {
        let Some(stmt) = self.stmt.take() else {
            return Ok(());
        };
        let Some(shared) = self.conn.upgrade() else {
            return Ok(());
        };
        let mut st = shared.state.lock();
        if !st.registry.is_live(stmt) {
            return Ok(());
        }
        st.registry.release(stmt)
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if let Err(e) = self.release_statement() {
            warn!(error = %e, "failed to release statement handle on drop");
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("state", &self.state)
            .field("columns", &self.columns.len())
            .field("rowcount", &self.rowcount)
            .finish()
    }
}

/// Iterator returned by [`Cursor::rows`].
pub struct Rows<'c> {
    cursor: &'c mut Cursor,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.cursor.fetchone().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

fn statement_text(sql: &str) -> Result<CString> {
    CString::new(sql).map_err(|_| Error::interface("execute", "SQL text contains a NUL byte"))
}

/// Prepare `sql` on `raw` and return its parameter count.
fn prepare(engine: &dyn Engine, raw: RawHandle, sql: &CString) -> Result<usize> {
    let rc = engine.prepare(raw, sql);
    status::check(engine, raw, rc, "prepare")?;
    let mut count = 0u16;
    let rc = engine.param_count(raw, &mut count);
    status::check(engine, raw, rc, "parameter count")?;
    Ok(usize::from(count))
}
