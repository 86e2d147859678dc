//! In-memory stand-in for the client engine.
//!
//! Understands just enough SQL for the driver tests:
//! `CREATE TABLE t (col TYPE [NOT NULL], ...)`, `INSERT INTO t VALUES (?, ...)`,
//! `SELECT * | col, ... FROM t` and `DELETE FROM t`. Values are stored as the native bytes the
//! driver bound, so every read goes back through the driver's decoder.
#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    ffi::CStr,
    sync::Arc,
};

use adsdb::{
    engine::{ColumnInfo, ConnectRequest, Engine, RawHandle, Status, SQLSTATE_LEN},
    marshal::NULL_INDICATOR,
    ConnectParams, TypeTag,
};
use parking_lot::Mutex;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Env,
    Conn,
    Stmt,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub allocated: usize,
    pub released: usize,
}

#[derive(Debug, Clone)]
struct Failure {
    code: i32,
    sqlstate: Option<String>,
    message: String,
}

#[derive(Debug, Clone)]
struct ColumnDef {
    name: String,
    tag: TypeTag,
    size: u32,
    /// Longer strings are rejected; memo columns only declare a size.
    bounded: bool,
    nullable: bool,
}

type Field = Option<Vec<u8>>;

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Field>>,
}

#[derive(Debug, Clone)]
enum Sql {
    Create { table: String, columns: Vec<ColumnDef> },
    Insert { table: String },
    Select { table: String, columns: Vec<usize> },
    Delete { table: String },
}

struct ResultSet {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Field>>,
    /// Index of the current row; `None` before the first fetch.
    pos: Option<usize>,
}

#[derive(Default)]
struct StmtData {
    conn: RawHandle,
    sql: Option<(Sql, u16)>,
    params: BTreeMap<u16, (TypeTag, Field)>,
    result: Option<ResultSet>,
    row_count: i64,
}

#[derive(Default)]
struct ConnData {
    env: RawHandle,
    connected: bool,
    autocommit: bool,
    snapshot: Option<BTreeMap<String, Table>>,
}

struct HandleData {
    kind: Kind,
    parent: RawHandle,
    live: bool,
}

#[derive(Default)]
struct Inner {
    next: RawHandle,
    handles: HashMap<RawHandle, HandleData>,
    counts: HashMap<Kind, Counts>,
    double_frees: usize,
    orphaned: usize,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, Failure>,
    last_error: HashMap<RawHandle, Failure>,
    conns: HashMap<RawHandle, ConnData>,
    stmts: HashMap<RawHandle, StmtData>,
    tables: BTreeMap<String, Table>,
    connect_server: Option<String>,
    connect_user: Option<String>,
    connect_server_types: u16,
    long_error_message: bool,
}

pub struct FakeEngine {
    inner: Mutex<Inner>,
}

impl FakeEngine {
    pub fn new() -> Arc<FakeEngine> {
        Arc::new(FakeEngine {
            inner: Mutex::new(Inner {
                next: 0x1000,
                ..Inner::default()
            }),
        })
    }

    /// Make the next call to `op` fail with `code`.
    pub fn fail_next(&self, op: &'static str, code: i32, sqlstate: Option<&str>, message: &str) {
        self.inner.lock().failures.insert(
            op,
            Failure {
                code,
                sqlstate: sqlstate.map(str::to_string),
                message: message.to_string(),
            },
        );
    }

    /// Report error messages longer than the driver's first buffer.
    pub fn use_long_error_messages(&self) {
        self.inner.lock().long_error_message = true;
    }

    pub fn counts(&self, kind: Kind) -> Counts {
        self.inner.lock().counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn live(&self, kind: Kind) -> usize {
        self.inner
            .lock()
            .handles
            .values()
            .filter(|h| h.kind == kind && h.live)
            .count()
    }

    pub fn live_total(&self) -> usize {
        self.inner.lock().handles.values().filter(|h| h.live).count()
    }

    pub fn double_frees(&self) -> usize {
        self.inner.lock().double_frees
    }

    /// Parents freed while they still had live children.
    pub fn orphaned(&self) -> usize {
        self.inner.lock().orphaned
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn connected_server(&self) -> Option<String> {
        self.inner.lock().connect_server.clone()
    }

    pub fn connected_user(&self) -> Option<String> {
        self.inner.lock().connect_user.clone()
    }

    pub fn connected_server_types(&self) -> u16 {
        self.inner.lock().connect_server_types
    }

    pub fn row_total(&self, table: &str) -> usize {
        self.inner
            .lock()
            .tables
            .get(table)
            .map_or(0, |t| t.rows.len())
    }
}

pub fn params() -> ConnectParams {
    ConnectParams::new("/srv/data")
}

fn err(code: i32, sqlstate: &str, message: &str) -> Failure {
    Failure {
        code,
        sqlstate: Some(sqlstate.to_string()),
        message: message.to_string(),
    }
}

fn parse_error(message: &str) -> Failure {
    err(7200, "42000", message)
}

fn column_type(spec: &str) -> Option<(TypeTag, u32, bool)> {
    let spec = spec.to_ascii_uppercase();
    let (base, size) = match spec.split_once('(') {
        Some((base, rest)) => (base.to_string(), rest.trim_end_matches(')').parse().ok()?),
        None => (spec.clone(), 0),
    };
    let fixed = |tag: TypeTag| Some((tag, tag.fixed_width().unwrap_or(0) as u32, true));
    match base.as_str() {
        "LOGICAL" => fixed(TypeTag::Bool),
        "SHORT" | "SMALLINT" => fixed(TypeTag::Int16),
        "INTEGER" | "INT" => fixed(TypeTag::Int32),
        "BIGINT" => fixed(TypeTag::Int64),
        "DOUBLE" => fixed(TypeTag::Float64),
        "NUMERIC" | "DECIMAL" => fixed(TypeTag::Decimal),
        "MONEY" => fixed(TypeTag::Money),
        "DATE" => fixed(TypeTag::Date),
        "TIME" => fixed(TypeTag::Time),
        "TIMESTAMP" => fixed(TypeTag::Timestamp),
        "CHAR" => Some((TypeTag::Char, size.max(1), true)),
        "VARCHAR" => Some((TypeTag::VarChar, size.max(1), true)),
        "MEMO" => Some((TypeTag::VarChar, 8, false)),
        "BLOB" => Some((TypeTag::Binary, 8, false)),
        _ => None,
    }
}

fn parse(sql: &str, tables: &BTreeMap<String, Table>) -> Result<(Sql, u16), Failure> {
    let text = sql.trim().trim_end_matches(';').trim();
    let upper = text.to_ascii_uppercase();
    let placeholders = text.matches('?').count() as u16;
    let lookup = |name: &str| {
        let name = name.trim().to_ascii_lowercase();
        tables
            .get(&name)
            .map(|t| (name.clone(), t))
            .ok_or_else(|| err(7041, "42S02", &format!("Table not found: {name}")))
    };

    if let Some(rest) = upper.strip_prefix("CREATE TABLE ") {
        let rest = &text[text.len() - rest.len()..];
        let open = rest.find('(').ok_or_else(|| parse_error("expected column list"))?;
        let close = rest.rfind(')').ok_or_else(|| parse_error("expected )"))?;
        let table = rest[..open].trim().to_ascii_lowercase();
        let mut columns = Vec::new();
        for def in rest[open + 1..close].split(',') {
            let words: Vec<&str> = def.split_whitespace().collect();
            let [name, ty, ..] = words.as_slice() else {
                return Err(parse_error(&format!("bad column definition {def:?}")));
            };
            let (tag, size, bounded) =
                column_type(ty).ok_or_else(|| parse_error(&format!("unknown type {ty}")))?;
            columns.push(ColumnDef {
                name: name.to_string(),
                tag,
                size,
                bounded,
                nullable: !def.to_ascii_uppercase().contains("NOT NULL"),
            });
        }
        return Ok((Sql::Create { table, columns }, placeholders));
    }

    if let Some(rest) = upper.strip_prefix("INSERT INTO ") {
        let name = rest.split_whitespace().next().unwrap_or_default();
        let (table, t) = lookup(name)?;
        if !upper.contains(" VALUES") {
            return Err(parse_error("expected VALUES"));
        }
        if usize::from(placeholders) != t.columns.len() {
            return Err(err(7202, "21S01", "Column count does not match value count"));
        }
        return Ok((Sql::Insert { table }, placeholders));
    }

    if let Some(rest) = upper.strip_prefix("SELECT ") {
        let from = rest.find(" FROM ").ok_or_else(|| parse_error("expected FROM"))?;
        let (table, t) = lookup(&rest[from + 6..])?;
        let list = &text[7..7 + from];
        let columns = if list.trim() == "*" {
            (0..t.columns.len()).collect()
        } else {
            list.split(',')
                .map(|c| {
                    let c = c.trim();
                    t.columns
                        .iter()
                        .position(|d| d.name.eq_ignore_ascii_case(c))
                        .ok_or_else(|| err(7202, "42S22", &format!("Column not found: {c}")))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        return Ok((Sql::Select { table, columns }, placeholders));
    }

    if let Some(rest) = upper.strip_prefix("DELETE FROM ") {
        let (table, _) = lookup(rest)?;
        return Ok((Sql::Delete { table }, placeholders));
    }

    Err(parse_error("Expected lexical element not found"))
}

fn decode_int(tag: TypeTag, b: &[u8]) -> Option<i128> {
    Some(match tag {
        TypeTag::Int8 => i8::from_ne_bytes(b.try_into().ok()?).into(),
        TypeTag::Int16 => i16::from_ne_bytes(b.try_into().ok()?).into(),
        TypeTag::Int32 => i32::from_ne_bytes(b.try_into().ok()?).into(),
        TypeTag::Int64 => i64::from_ne_bytes(b.try_into().ok()?).into(),
        TypeTag::UInt8 => u8::from_ne_bytes(b.try_into().ok()?).into(),
        TypeTag::UInt16 => u16::from_ne_bytes(b.try_into().ok()?).into(),
        TypeTag::UInt32 => u32::from_ne_bytes(b.try_into().ok()?).into(),
        TypeTag::UInt64 => u64::from_ne_bytes(b.try_into().ok()?).into(),
        _ => return None,
    })
}

fn encode_int(tag: TypeTag, n: i128) -> Option<Vec<u8>> {
    Some(match tag {
        TypeTag::Int16 => i16::try_from(n).ok()?.to_ne_bytes().to_vec(),
        TypeTag::Int32 => i32::try_from(n).ok()?.to_ne_bytes().to_vec(),
        TypeTag::Int64 => i64::try_from(n).ok()?.to_ne_bytes().to_vec(),
        _ => return None,
    })
}

/// Convert a bound value to the column's storage form.
fn store(col: &ColumnDef, tag: TypeTag, field: Field) -> Result<Field, Failure> {
    let Some(bytes) = field else {
        if !col.nullable {
            return Err(err(
                7057,
                "23502",
                &format!("Field {} cannot be NULL", col.name),
            ));
        }
        return Ok(None);
    };
    let mismatch = || {
        err(
            7011,
            "22018",
            &format!("Cannot convert {tag} to {} for column {}", col.tag, col.name),
        )
    };
    match col.tag {
        TypeTag::Int16 | TypeTag::Int32 | TypeTag::Int64 => {
            let n = decode_int(tag, &bytes).ok_or_else(mismatch)?;
            let stored = encode_int(col.tag, n)
                .ok_or_else(|| err(7012, "22003", "Numeric value out of range"))?;
            Ok(Some(stored))
        }
        TypeTag::Char | TypeTag::VarChar if matches!(tag, TypeTag::Char | TypeTag::VarChar) => {
            let declared = col.size as usize;
            if col.bounded && bytes.len() > declared {
                return Err(err(7013, "22001", "String data right truncation"));
            }
            let mut bytes = bytes;
            if col.tag == TypeTag::Char {
                bytes.resize(declared, b' ');
            }
            Ok(Some(bytes))
        }
        other if other == tag => Ok(Some(bytes)),
        _ => Err(mismatch()),
    }
}

impl Inner {
    fn take_failure(&mut self, op: &'static str, handle: RawHandle) -> Option<Status> {
        self.calls.push(op);
        let failure = self.failures.remove(op)?;
        let code = failure.code;
        self.last_error.insert(handle, failure);
        Some(Status::error(code))
    }

    fn fail(&mut self, handle: RawHandle, failure: Failure) -> Status {
        let code = failure.code;
        self.last_error.insert(handle, failure);
        Status::error(code)
    }

    fn is(&self, handle: RawHandle, kind: Kind) -> bool {
        self.handles
            .get(&handle)
            .is_some_and(|h| h.live && h.kind == kind)
    }

    fn alloc(&mut self, kind: Kind, parent: RawHandle, out: &mut RawHandle) -> Status {
        self.next += 1;
        let h = self.next;
        self.handles.insert(
            h,
            HandleData {
                kind,
                parent,
                live: true,
            },
        );
        self.counts.entry(kind).or_default().allocated += 1;
        *out = h;
        Status::SUCCESS
    }

    fn free(&mut self, kind: Kind, handle: RawHandle) -> Status {
        if !self.is(handle, kind) {
            self.double_frees += 1;
            return Status::INVALID_HANDLE;
        }
        let has_children = self
            .handles
            .values()
            .any(|h| h.live && h.parent == handle);
        if has_children {
            self.orphaned += 1;
        }
        if let Some(h) = self.handles.get_mut(&handle) {
            h.live = false;
        }
        self.counts.entry(kind).or_default().released += 1;
        self.stmts.remove(&handle);
        self.conns.remove(&handle);
        Status::SUCCESS
    }

    fn execute(&mut self, stmt: RawHandle) -> Result<bool, Failure> {
        let data = self.stmts.get(&stmt).ok_or_else(|| err(7000, "HY010", "not prepared"))?;
        let (sql, count) = data
            .sql
            .clone()
            .ok_or_else(|| err(7000, "HY010", "Function sequence error"))?;
        if data.result.is_some() {
            return Err(err(7000, "24000", "Invalid cursor state"));
        }
        let bound: Vec<(TypeTag, Field)> = (1..=count)
            .map(|p| data.params.get(&p).cloned())
            .collect::<Option<_>>()
            .ok_or_else(|| err(7001, "07002", "Not all parameters are bound"))?;

        let (has_result, row_count, result) = match sql {
            Sql::Create { table, columns } => {
                if self.tables.contains_key(&table) {
                    return Err(err(7041, "42S01", "Table already exists"));
                }
                self.tables.insert(
                    table,
                    Table {
                        columns,
                        rows: Vec::new(),
                    },
                );
                (false, 0, None)
            }
            Sql::Insert { table } => {
                let t = self
                    .tables
                    .get_mut(&table)
                    .ok_or_else(|| err(7041, "42S02", "Table not found"))?;
                let row = t
                    .columns
                    .iter()
                    .zip(bound)
                    .map(|(col, (tag, field))| store(col, tag, field))
                    .collect::<Result<Vec<_>, _>>()?;
                t.rows.push(row);
                (false, 1, None)
            }
            Sql::Select { table, columns } => {
                let t = self
                    .tables
                    .get(&table)
                    .ok_or_else(|| err(7041, "42S02", "Table not found"))?;
                let defs = columns.iter().map(|&i| t.columns[i].clone()).collect();
                let rows = t
                    .rows
                    .iter()
                    .map(|r| columns.iter().map(|&i| r[i].clone()).collect())
                    .collect();
                let rs = ResultSet {
                    columns: defs,
                    rows,
                    pos: None,
                };
                (true, -1, Some(rs))
            }
            Sql::Delete { table } => {
                let t = self
                    .tables
                    .get_mut(&table)
                    .ok_or_else(|| err(7041, "42S02", "Table not found"))?;
                let n = t.rows.len() as i64;
                t.rows.clear();
                (false, n, None)
            }
        };

        if let Some(data) = self.stmts.get_mut(&stmt) {
            data.result = result;
            data.row_count = row_count;
        }
        Ok(has_result)
    }
}

impl Engine for FakeEngine {
    fn env_alloc(&self, out: &mut RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("env_alloc", 0) {
            return st;
        }
        g.alloc(Kind::Env, 0, out)
    }

    fn env_free(&self, env: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("env_free", env) {
            return st;
        }
        g.free(Kind::Env, env)
    }

    fn conn_alloc(&self, env: RawHandle, out: &mut RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("conn_alloc", env) {
            return st;
        }
        if !g.is(env, Kind::Env) {
            return Status::INVALID_HANDLE;
        }
        let status = g.alloc(Kind::Conn, env, out);
        g.conns.insert(
            *out,
            ConnData {
                env,
                autocommit: true,
                ..ConnData::default()
            },
        );
        status
    }

    fn conn_free(&self, conn: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("conn_free", conn) {
            return st;
        }
        g.free(Kind::Conn, conn)
    }

    fn connect(&self, conn: RawHandle, request: &ConnectRequest<'_>) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("connect", conn) {
            return st;
        }
        if !g.is(conn, Kind::Conn) {
            return Status::INVALID_HANDLE;
        }
        g.connect_server = Some(request.server.to_string_lossy().into_owned());
        g.connect_user = request.user.map(|u| u.to_string_lossy().into_owned());
        g.connect_server_types = request.server_types;
        if let Some(c) = g.conns.get_mut(&conn) {
            c.connected = true;
        }
        Status::SUCCESS
    }

    fn disconnect(&self, conn: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("disconnect", conn) {
            return st;
        }
        match g.conns.get_mut(&conn) {
            Some(c) if c.connected => {
                c.connected = false;
                Status::SUCCESS
            }
            _ => Status::INVALID_HANDLE,
        }
    }

    fn set_autocommit(&self, conn: RawHandle, enabled: bool) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("set_autocommit", conn) {
            return st;
        }
        let snapshot = (!enabled).then(|| g.tables.clone());
        match g.conns.get_mut(&conn) {
            Some(c) if c.connected => {
                c.autocommit = enabled;
                c.snapshot = snapshot;
                Status::SUCCESS
            }
            _ => Status::INVALID_HANDLE,
        }
    }

    fn commit(&self, conn: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("commit", conn) {
            return st;
        }
        let tables = g.tables.clone();
        match g.conns.get_mut(&conn) {
            Some(c) if c.connected && !c.autocommit => {
                c.snapshot = Some(tables);
                Status::SUCCESS
            }
            Some(_) => Status::SUCCESS,
            None => Status::INVALID_HANDLE,
        }
    }

    fn rollback(&self, conn: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("rollback", conn) {
            return st;
        }
        let snapshot = match g.conns.get(&conn) {
            Some(c) => c.snapshot.clone(),
            None => return Status::INVALID_HANDLE,
        };
        if let Some(tables) = snapshot {
            g.tables = tables;
        }
        Status::SUCCESS
    }

    fn stmt_alloc(&self, conn: RawHandle, out: &mut RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("stmt_alloc", conn) {
            return st;
        }
        if !g.is(conn, Kind::Conn) {
            return Status::INVALID_HANDLE;
        }
        let status = g.alloc(Kind::Stmt, conn, out);
        g.stmts.insert(
            *out,
            StmtData {
                conn,
                ..StmtData::default()
            },
        );
        status
    }

    fn stmt_free(&self, stmt: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("stmt_free", stmt) {
            return st;
        }
        g.free(Kind::Stmt, stmt)
    }

    fn prepare(&self, stmt: RawHandle, sql: &CStr) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("prepare", stmt) {
            return st;
        }
        if !g.is(stmt, Kind::Stmt) {
            return Status::INVALID_HANDLE;
        }
        if g.stmts.get(&stmt).is_some_and(|s| s.result.is_some()) {
            return g.fail(stmt, err(7000, "24000", "Invalid cursor state"));
        }
        let parsed = parse(&sql.to_string_lossy(), &g.tables);
        match parsed {
            Ok(parsed) => {
                if let Some(s) = g.stmts.get_mut(&stmt) {
                    s.sql = Some(parsed);
                    s.params.clear();
                    s.row_count = -1;
                }
                Status::SUCCESS
            }
            Err(f) => g.fail(stmt, f),
        }
    }

    fn param_count(&self, stmt: RawHandle, out: &mut u16) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("param_count", stmt) {
            return st;
        }
        match g.stmts.get(&stmt).and_then(|s| s.sql.as_ref()) {
            Some((_, n)) => {
                *out = *n;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    unsafe fn bind_param(
        &self,
        stmt: RawHandle,
        position: u16,
        tag: TypeTag,
        data: &[u8],
        indicator: i32,
    ) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("bind_param", stmt) {
            return st;
        }
        let field = (indicator != NULL_INDICATOR).then(|| data.to_vec());
        match g.stmts.get_mut(&stmt) {
            Some(s) if s.sql.is_some() => {
                s.params.insert(position, (tag, field));
                Status::SUCCESS
            }
            _ => Status::INVALID_HANDLE,
        }
    }

    fn execute(&self, stmt: RawHandle, has_result: &mut bool) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("execute", stmt) {
            return st;
        }
        if !g.is(stmt, Kind::Stmt) {
            return Status::INVALID_HANDLE;
        }
        match g.execute(stmt) {
            Ok(r) => {
                *has_result = r;
                Status::SUCCESS
            }
            Err(f) => g.fail(stmt, f),
        }
    }

    fn row_count(&self, stmt: RawHandle, out: &mut i64) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("row_count", stmt) {
            return st;
        }
        match g.stmts.get(&stmt) {
            Some(s) => {
                *out = s.row_count;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn column_count(&self, stmt: RawHandle, out: &mut u16) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("column_count", stmt) {
            return st;
        }
        match g.stmts.get(&stmt).and_then(|s| s.result.as_ref()) {
            Some(rs) => {
                *out = rs.columns.len() as u16;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn describe_column(
        &self,
        stmt: RawHandle,
        column: u16,
        name: &mut [u8],
        name_len: &mut usize,
        info: &mut ColumnInfo,
    ) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("describe_column", stmt) {
            return st;
        }
        let Some(col) = g
            .stmts
            .get(&stmt)
            .and_then(|s| s.result.as_ref())
            .and_then(|rs| rs.columns.get(usize::from(column).wrapping_sub(1)))
        else {
            return Status::INVALID_HANDLE;
        };
        let bytes = col.name.as_bytes();
        *name_len = bytes.len();
        *info = ColumnInfo {
            tag: col.tag.raw(),
            size: col.size,
            scale: 0,
            nullable: col.nullable,
        };
        let n = bytes.len().min(name.len());
        name[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            Status::DATA_TRUNCATED
        } else {
            Status::SUCCESS
        }
    }

    fn fetch(&self, stmt: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("fetch", stmt) {
            return st;
        }
        let Some(rs) = g.stmts.get_mut(&stmt).and_then(|s| s.result.as_mut()) else {
            return Status::INVALID_HANDLE;
        };
        let next = rs.pos.map_or(0, |p| p + 1).min(rs.rows.len());
        rs.pos = Some(next);
        if next < rs.rows.len() {
            Status::SUCCESS
        } else {
            Status::NO_DATA
        }
    }

    fn get_data(
        &self,
        stmt: RawHandle,
        column: u16,
        tag: TypeTag,
        out: &mut [u8],
        used: &mut usize,
        indicator: &mut i32,
    ) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("get_data", stmt) {
            return st;
        }
        let Some(rs) = g.stmts.get(&stmt).and_then(|s| s.result.as_ref()) else {
            return Status::INVALID_HANDLE;
        };
        let col = usize::from(column).wrapping_sub(1);
        let (Some(def), Some(row)) = (rs.columns.get(col), rs.pos.and_then(|p| rs.rows.get(p)))
        else {
            return Status::INVALID_HANDLE;
        };
        if def.tag != tag {
            let f = err(7011, "22018", "Column type mismatch");
            return g.fail(stmt, f);
        }
        match &row[col] {
            None => {
                *used = 0;
                *indicator = NULL_INDICATOR;
                Status::SUCCESS
            }
            Some(bytes) => {
                *used = bytes.len();
                *indicator = 0;
                let n = bytes.len().min(out.len());
                out[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    Status::DATA_TRUNCATED
                } else {
                    Status::SUCCESS
                }
            }
        }
    }

    fn close_result(&self, stmt: RawHandle) -> Status {
        let mut g = self.inner.lock();
        if let Some(st) = g.take_failure("close_result", stmt) {
            return st;
        }
        match g.stmts.get_mut(&stmt) {
            Some(s) => {
                s.result = None;
                Status::SUCCESS
            }
            None => Status::INVALID_HANDLE,
        }
    }

    fn error_text(
        &self,
        handle: RawHandle,
        code: i32,
        sqlstate: &mut [u8; SQLSTATE_LEN],
        message: &mut [u8],
        len: &mut usize,
    ) -> Status {
        let g = self.inner.lock();
        let Some(f) = g.last_error.get(&handle).filter(|f| f.code == code) else {
            return Status::NO_DATA;
        };
        if let Some(state) = &f.sqlstate {
            let b = state.as_bytes();
            let n = b.len().min(SQLSTATE_LEN);
            sqlstate[..n].copy_from_slice(&b[..n]);
        }
        let text = if g.long_error_message {
            format!("{} {}", f.message, "x".repeat(600))
        } else {
            f.message.clone()
        };
        let b = text.as_bytes();
        *len = b.len();
        let n = b.len().min(message.len());
        message[..n].copy_from_slice(&b[..n]);
        if n < b.len() {
            Status::DATA_TRUNCATED
        } else {
            Status::SUCCESS
        }
    }
}
