//! Ownership of native handles.
//!
//! Each native handle gets a slot keyed by a [`HandleId`]; callers hold the id instead of the
//! raw value. Ids are issued in increasing order and never reissued, and a released slot is
//! removed, so an id below the next one to be issued with no slot is a released handle.
//!
//! Release policy: a second [`release`](HandleRegistry::release) of the same id fails with a
//! resource error and never reaches the engine. Releasing a parent first releases its live
//! children, youngest first.

use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{debug, warn};

use crate::{
    engine::{Engine, RawHandle},
    error::{Error, Result},
    status,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Environment,
    Connection,
    Statement,
}

impl HandleKind {
    fn parent_kind(self) -> Option<HandleKind> {
        match self {
            HandleKind::Environment => None,
            HandleKind::Connection => Some(HandleKind::Environment),
            HandleKind::Statement => Some(HandleKind::Connection),
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandleKind::Environment => "environment",
            HandleKind::Connection => "connection",
            HandleKind::Statement => "statement",
        })
    }
}

/// Index of a handle slot in a [`HandleRegistry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandleId(usize);

struct Slot {
    kind: HandleKind,
    raw: RawHandle,
    parent: Option<HandleId>,
    /// Live children only; a child removes itself on release.
    children: Vec<HandleId>,
}

pub struct HandleRegistry {
    engine: Arc<dyn Engine>,
    slots: HashMap<HandleId, Slot>,
    next_id: usize,
}

impl HandleRegistry {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            slots: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    fn slot(&self, id: HandleId, context: &str) -> Result<&Slot> {
        self.slots.get(&id).ok_or_else(|| self.missing(id, context))
    }

    fn missing(&self, id: HandleId, context: &str) -> Error {
        if id.0 < self.next_id {
            Error::resource(context, "handle already released")
        } else {
            Error::resource(context, format!("unknown handle {}", id.0))
        }
    }

    /// Allocate a native handle of `kind` under `parent`.
    ///
    /// Environments take no parent; connections need a live environment and statements a live
    /// connection.
    pub fn allocate(&mut self, kind: HandleKind, parent: Option<HandleId>) -> Result<HandleId> {
        let context = format!("allocate {kind} handle");
        let parent_raw = match (kind.parent_kind(), parent) {
            (None, None) => None,
            (Some(expected), Some(p)) => {
                let slot = self.slots.get(&p).ok_or_else(|| {
                    let err = self.missing(p, &context);
                    Error::resource(context.as_str(), format!("parent {}", err.message()))
                })?;
                if slot.kind != expected {
                    return Err(Error::resource(
                        context,
                        format!("parent must be a {expected} handle, got {}", slot.kind),
                    ));
                }
                Some(slot.raw)
            }
            (None, Some(_)) => {
                return Err(Error::resource(context, "environment handles have no parent"));
            }
            (Some(expected), None) => {
                return Err(Error::resource(context, format!("a {expected} parent is required")));
            }
        };

        let engine = self.engine.as_ref();
        let mut raw: RawHandle = 0;
        let rc = match (kind, parent_raw) {
            (HandleKind::Environment, _) => engine.env_alloc(&mut raw),
            (HandleKind::Connection, Some(env)) => engine.conn_alloc(env, &mut raw),
            (HandleKind::Statement, Some(conn)) => engine.stmt_alloc(conn, &mut raw),
            (_, None) => return Err(Error::resource(context, "missing parent handle")),
        };
        status::check(engine, parent_raw.unwrap_or(0), rc, &context).map_err(Error::into_resource)?;
        if raw == 0 {
            return Err(Error::resource(context, "engine returned a null handle"));
        }

        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.slots.insert(
            id,
            Slot {
                kind,
                raw,
                parent,
                children: Vec::new(),
            },
        );
        if let Some(slot) = parent.and_then(|p| self.slots.get_mut(&p)) {
            slot.children.push(id);
        }
        debug!(%kind, raw, id = id.0, "allocated native handle");
        Ok(id)
    }

    /// Raw value of a live handle.
    pub fn raw(&self, id: HandleId) -> Result<RawHandle> {
        Ok(self.slot(id, "use handle")?.raw)
    }

    pub fn kind(&self, id: HandleId) -> Option<HandleKind> {
        self.slots.get(&id).map(|s| s.kind)
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.slots.len()
    }

    pub fn live_children(&self, id: HandleId) -> Vec<HandleId> {
        self.slots
            .get(&id)
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    /// Release `id` and, before it, every live child.
    ///
    /// The slot is removed before the native call, so a failing native release is reported once
    /// and never retried. All children are attempted even when one fails; the first failure is
    /// returned.
    pub fn release(&mut self, id: HandleId) -> Result<()> {
        let Some(slot) = self.slots.remove(&id) else {
            return Err(self.missing(id, "release handle"));
        };
        if let Some(parent) = slot.parent.and_then(|p| self.slots.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut first_err = None;
        for &child in slot.children.iter().rev() {
            if !self.is_live(child) {
                continue;
            }
            if let Err(e) = self.release(child) {
                warn!(error = %e, "failed to release child handle");
                first_err.get_or_insert(e);
            }
        }

        let Slot { kind, raw, .. } = slot;
        let engine = self.engine.as_ref();
        let rc = match kind {
            HandleKind::Environment => engine.env_free(raw),
            HandleKind::Connection => engine.conn_free(raw),
            HandleKind::Statement => engine.stmt_free(raw),
        };
        debug!(%kind, raw, id = id.0, "released native handle");
        if let Err(e) = status::check(engine, raw, rc, format_args!("release {kind} handle")) {
            first_err.get_or_insert(e.into_resource());
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn parent(&self, id: HandleId) -> Option<HandleId> {
        self.slots.get(&id).and_then(|s| s.parent)
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.live_count())
            .field("issued", &self.next_id)
            .finish()
    }
}
