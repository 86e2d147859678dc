//! Connections: environment and connection handle lifecycle, transactions, cursor creation.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::{
    config::ConnectParams,
    cursor::Cursor,
    engine::Engine,
    error::{Error, Result},
    registry::{HandleId, HandleKind, HandleRegistry},
    status,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionMode {
    /// Every statement commits on its own. The engine's default.
    AutoCommit,
    /// Work accumulates until [`Connection::commit`] or [`Connection::rollback`].
    Manual,
}

/// State shared between a connection and its cursors.
///
/// Every native call on the connection or one of its statements is made while holding `state`.
pub(crate) struct Shared {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) trim_char: bool,
    pub(crate) state: Mutex<ConnState>,
}

pub(crate) struct ConnState {
    pub(crate) registry: HandleRegistry,
    env: HandleId,
    pub(crate) conn: HandleId,
    mode: TransactionMode,
    open: bool,
}

impl ConnState {
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn ensure_open(&self, context: &str) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::interface(context, "connection is closed"))
        }
    }
}

/// An open session with the database server.
///
/// A `Connection` can be shared between threads; calls on it and on its cursors are serialized.
/// Dropping it closes it.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Connect through `engine`.
    ///
    /// Allocates the environment and connection handles, connects and applies the transaction
    /// mode. On any failure every handle allocated so far is released before the error is
    /// returned.
    pub fn open(engine: Arc<dyn Engine>, params: &ConnectParams) -> Result<Connection> {
        let native = params.to_native()?;
        let mut registry = HandleRegistry::new(Arc::clone(&engine));

        let env = registry.allocate(HandleKind::Environment, None)?;
        let (conn, raw) = match registry
            .allocate(HandleKind::Connection, Some(env))
            .and_then(|conn| Ok((conn, registry.raw(conn)?)))
        {
            Ok(pair) => pair,
            Err(e) => return Err(abandon(&mut registry, env, None, e)),
        };

        let rc = engine.connect(raw, &native.request());
        if let Err(e) = status::check(engine.as_ref(), raw, rc, "connect") {
            return Err(abandon(&mut registry, env, None, e));
        }

        let mode = if params.auto_commit {
            TransactionMode::AutoCommit
        } else {
            let rc = engine.set_autocommit(raw, false);
            if let Err(e) = status::check(engine.as_ref(), raw, rc, "set autocommit") {
                return Err(abandon(&mut registry, env, Some(conn), e));
            }
            TransactionMode::Manual
        };

        info!(
            data_source = %params.data_source,
            server_type = %params.server_type,
            ?mode,
            "connected"
        );
        Ok(Connection {
            shared: Arc::new(Shared {
                engine,
                trim_char: params.trim_trailing_spaces,
                state: Mutex::new(ConnState {
                    registry,
                    env,
                    conn,
                    mode,
                    open: true,
                }),
            }),
        })
    }

    /// A new cursor on this connection. Its statement handle is allocated on first execute.
    pub fn cursor(&self) -> Result<Cursor> {
        self.shared.state.lock().ensure_open("cursor")?;
        Ok(Cursor::new(Arc::downgrade(&self.shared), self.shared.trim_char))
    }

    pub fn commit(&self) -> Result<()> {
        self.end_transaction("commit")
    }

    pub fn rollback(&self) -> Result<()> {
        self.end_transaction("rollback")
    }

    fn end_transaction(&self, context: &'static str) -> Result<()> {
        let st = self.shared.state.lock();
        st.ensure_open(context)?;
        if st.mode == TransactionMode::AutoCommit {
            warn!("{context} ignored: connection is in autocommit mode");
            return Ok(());
        }
        let engine = self.shared.engine.as_ref();
        let raw = st.registry.raw(st.conn)?;
        let rc = if context == "commit" {
            engine.commit(raw)
        } else {
            engine.rollback(raw)
        };
        status::check(engine, raw, rc, context)?;
        Ok(())
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        self.shared.state.lock().mode
    }

    pub fn autocommit(&self) -> bool {
        self.transaction_mode() == TransactionMode::AutoCommit
    }

    /// Switch between autocommit and manual transactions.
    pub fn set_autocommit(&self, enabled: bool) -> Result<()> {
        let mut st = self.shared.state.lock();
        st.ensure_open("set autocommit")?;
        let mode = if enabled {
            TransactionMode::AutoCommit
        } else {
            TransactionMode::Manual
        };
        if st.mode == mode {
            return Ok(());
        }
        let engine = self.shared.engine.as_ref();
        let raw = st.registry.raw(st.conn)?;
        let rc = engine.set_autocommit(raw, enabled);
        status::check(engine, raw, rc, "set autocommit")?;
        st.mode = mode;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.state.lock().open
    }

    /// Close the connection.
    ///
    /// Uncommitted manual-mode work is rolled back. Statement handles of all cursors are released
    /// (the cursors become closed), then the connection and environment handles. Every step is
    /// attempted even if an earlier one fails; the first failure is returned. Closing a closed
    /// connection does nothing.
    pub fn close(&self) -> Result<()> {
        let mut st = self.shared.state.lock();
        if !st.open {
            return Ok(());
        }
        st.open = false;

        let engine = self.shared.engine.as_ref();
        let (env, conn) = (st.env, st.conn);
        let mut first_err: Option<Error> = None;
        let mut record = |r: Result<()>| {
            if let Err(e) = r {
                warn!(error = %e, "error while closing connection");
                first_err.get_or_insert(e);
            }
        };

        if let Ok(raw) = st.registry.raw(conn) {
            if st.mode == TransactionMode::Manual {
                let rc = engine.rollback(raw);
                record(status::check(engine, raw, rc, "rollback on close").map(drop));
            }
            for stmt in st.registry.live_children(conn) {
                record(st.registry.release(stmt));
            }
            let rc = engine.disconnect(raw);
            record(status::check(engine, raw, rc, "disconnect").map(drop));
        }
        if st.registry.is_live(conn) {
            record(st.registry.release(conn));
        }
        if st.registry.is_live(env) {
            record(st.registry.release(env));
        }

        info!("connection closed");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close connection on drop");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.state.lock();
        f.debug_struct("Connection")
            .field("open", &st.open)
            .field("mode", &st.mode)
            .field("registry", &st.registry)
            .finish()
    }
}

/// Undo a partially opened connection and return the error that stopped it.
fn abandon(
    registry: &mut HandleRegistry,
    env: HandleId,
    connected: Option<HandleId>,
    err: Error,
) -> Error {
    if let Some(conn) = connected {
        if let Ok(raw) = registry.raw(conn) {
            let engine = registry.engine();
            let rc = engine.disconnect(raw);
            if let Err(e) = status::check(engine, raw, rc, "disconnect") {
                warn!(error = %e, "disconnect after failed open");
            }
        }
    }
    if let Err(e) = registry.release(env) {
        warn!(error = %e, "releasing handles after failed open");
    }
    err
}
