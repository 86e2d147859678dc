//! Parameter binding.
//!
//! [`bind`] marshals every parameter before the first native bind call, so a conversion failure
//! never leaves a statement half bound. The returned [`Bindings`] owns the bound buffers; the
//! cursor holds it until the execute call that reads them has returned.

use tracing::trace;

use crate::{
    engine::{Engine, RawHandle},
    error::{Error, Result},
    marshal::{self, BufferDescriptor},
    status,
    types::Param,
};

/// Buffers bound to one statement for one execute call.
#[derive(Debug, Default)]
pub(crate) struct Bindings {
    buffers: Vec<BufferDescriptor>,
}

impl Bindings {
    pub(crate) fn len(&self) -> usize {
        self.buffers.len()
    }
}

/// Bind `params` to positions `1..=params.len()` of `stmt`.
///
/// `expected` is the parameter count the engine reported for the prepared statement. A count
/// mismatch fails with a programming error before any native call.
pub(crate) fn bind(
    engine: &dyn Engine,
    stmt: RawHandle,
    params: &[Param],
    expected: usize,
) -> Result<Bindings> {
    if params.len() != expected {
        return Err(Error::programming(
            "bind parameters",
            format!(
                "statement takes {expected} parameter(s) but {} were supplied",
                params.len()
            ),
        ));
    }
    let last = u16::try_from(params.len()).map_err(|_| {
        Error::programming("bind parameters", format!("too many parameters: {}", params.len()))
    })?;

    let buffers = params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            marshal::to_native(&p.value, p.target_tag())
                .map_err(|e| Error::data(format!("bind parameter {}", i + 1), e))
        })
        .collect::<Result<Vec<_>>>()?;

    for (position, buf) in (1..=last).zip(&buffers) {
        trace!(position, tag = %buf.tag(), null = buf.is_null(), "binding parameter");
        // SAFETY: `buf` lives in the returned `Bindings`, which the caller keeps alive until the
        // execute on `stmt` has returned. Boxed slices do not move when the Vec is moved.
        let rc = unsafe {
            engine.bind_param(stmt, position, buf.tag(), buf.as_bytes(), buf.indicator())
        };
        status::check(engine, stmt, rc, format_args!("bind parameter {position}"))?;
    }

    Ok(Bindings { buffers })
}
