//! Scoped ownership of per-query engine handles.

use std::ops::{Deref, DerefMut};

use crate::engine::{Engine, EngineResult};

/// Engine handle released through `release` when the guard goes out of scope.
///
/// Guards declared in acquisition order are dropped in reverse order, which
/// gives the query its teardown order.
pub(crate) struct Scoped<'s, E: Engine, T> {
    engine: &'s E,
    session: &'s E::Session,
    /// Present until the guard is dropped.
    handle: Option<T>,
    release: fn(&E, &E::Session, T),
}

impl<'s, E: Engine, T> Scoped<'s, E, T> {
    /// Create a handle with `create`. Nothing needs releasing if it fails.
    pub(crate) fn acquire(
        engine: &'s E,
        session: &'s E::Session,
        create: fn(&E, &E::Session) -> EngineResult<T>,
        release: fn(&E, &E::Session, T),
    ) -> EngineResult<Self> {
        let handle = create(engine, session)?;
        Ok(Self {
            engine,
            session,
            handle: Some(handle),
            release,
        })
    }
}

impl<E: Engine, T> Deref for Scoped<'_, E, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.handle.as_ref().expect("handle is held until drop")
    }
}

impl<E: Engine, T> DerefMut for Scoped<'_, E, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.handle.as_mut().expect("handle is held until drop")
    }
}

impl<E: Engine, T> Drop for Scoped<'_, E, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            (self.release)(self.engine, self.session, handle);
        }
    }
}
