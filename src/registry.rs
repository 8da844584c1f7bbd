//! Per-request registry of named session accessors.
//!
//! Each [`SessionGuard`](crate::SessionGuard) wrapping a request registers
//! one accessor under its configured logical name before the handler runs;
//! the map is only read afterwards. Stacking guards is how a process exposes
//! multiple backing stores — every guard contributes one entry and each name
//! always resolves to the same lease within a request.
//!
//! Asking for a name no guard registered is not a runtime condition, it is a
//! programming error — the code path and its middleware stack disagree about
//! configuration. [`resolve`](DbHandles::resolve) panics loudly instead of
//! letting the mistake propagate as a recoverable error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::db::Db;

pub(crate) type SessionAccessor = Arc<dyn Fn() -> Db + Send + Sync>;

/// The capability map carried by every [`Request`](crate::Request).
#[derive(Clone, Default)]
pub(crate) struct DbHandles {
    map: HashMap<String, SessionAccessor>,
}

impl DbHandles {
    pub(crate) fn insert(&mut self, name: String, accessor: SessionAccessor) {
        self.map.insert(name, accessor);
    }

    /// Resolves the accessor registered under `name` and invokes it.
    ///
    /// # Panics
    ///
    /// Panics if no session guard registered `name` for this request.
    pub(crate) fn resolve(&self, name: &str) -> Db {
        match self.map.get(name) {
            Some(accessor) => accessor(),
            None => panic!(
                "no database registered under {name:?}: wrap the handler in a \
                 SessionGuard for that name"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionFactory;
    use crate::testing::StubFactory;

    #[test]
    fn resolve_invokes_the_registered_accessor() {
        let factory = StubFactory::new();
        let session = factory.copy();

        let mut handles = DbHandles::default();
        handles.insert(
            "accounts".to_owned(),
            Arc::new(move || Db::new("accounts".into(), Arc::clone(&session))),
        );

        let _db = handles.resolve("accounts");
    }

    #[test]
    #[should_panic(expected = "no database registered under \"reports\"")]
    fn resolve_unknown_name_panics_with_the_name() {
        DbHandles::default().resolve("reports");
    }
}
