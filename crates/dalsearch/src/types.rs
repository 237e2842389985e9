use std::sync::{Mutex, MutexGuard};

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::import::PortalClient;
use crate::schedule::{ScheduleStore, TimeGrid};

/// State shared by every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub grid: TimeGrid,
    pub catalog: Catalog,
    pub portal: PortalClient,
    /// Single writer; handlers hold the lock only for the store call itself.
    store: Mutex<ScheduleStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        grid: TimeGrid,
        catalog: Catalog,
        portal: PortalClient,
        store: ScheduleStore,
    ) -> Self {
        Self {
            config,
            grid,
            catalog,
            portal,
            store: Mutex::new(store),
        }
    }

    /// Locks the schedule store, recovering the guard if a previous holder panicked.
    pub fn store(&self) -> MutexGuard<'_, ScheduleStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
