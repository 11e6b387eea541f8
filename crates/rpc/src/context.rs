//! Application context - wires everything together

use std::sync::Arc;

use demobank_ledger::{AuthorizationGate, Identity, LedgerEngine, SessionGate};
use demobank_store::{StorageConfig, Store};

/// One authenticated session against one storage backend.
///
/// The store is constructed here at process start and closed when the
/// context drops; nothing else in the process holds a database handle.
pub struct AppContext {
    pub engine: LedgerEngine<Store>,
}

impl AppContext {
    /// Open the backend named by `config` and wire the engine to it.
    ///
    /// `identity` is whatever the session layer already authenticated;
    /// `None` means no session, and every engine operation will refuse.
    pub fn new(config: &StorageConfig, identity: Option<Identity>) -> Result<Self, anyhow::Error> {
        let store = Store::open(config)?;
        let gate: Arc<dyn AuthorizationGate> = Arc::new(SessionGate::new(identity));

        Ok(Self {
            engine: LedgerEngine::new(store, gate),
        })
    }
}
