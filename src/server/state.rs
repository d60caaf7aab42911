use crate::config::Settings;
use crate::geo::{Aggregator, ConfigError, Registry, Transport};
use std::sync::Arc;

/// Shared across requests. Each lookup gets its own `Aggregator`, so no lock
/// is held while providers are queried.
pub struct AppState<T: Transport> {
    pub registry: Arc<Registry>,
    pub transport: Arc<T>,
    pub settings: Settings,
}

impl<T: Transport> AppState<T> {
    pub fn new(registry: Arc<Registry>, transport: Arc<T>, settings: Settings) -> Self {
        Self {
            registry,
            transport,
            settings,
        }
    }

    /// Fresh engine preloaded with the server-wide settings.
    pub fn engine(&self) -> Result<Aggregator<T>, ConfigError> {
        let mut agg = Aggregator::new(Arc::clone(&self.registry), Arc::clone(&self.transport));
        self.settings.apply_to(&mut agg)?;
        Ok(agg)
    }
}
