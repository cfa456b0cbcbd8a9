//! Current configuration, swappable at runtime.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::ClientConfig;

/// Lock-free holder of the active [`ClientConfig`].
#[derive(Debug)]
pub struct SharedConfig {
    inner: ArcSwap<ClientConfig>,
}

impl SharedConfig {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: ArcSwap::from_pointee(config),
        }
    }

    pub fn current(&self) -> Arc<ClientConfig> {
        self.inner.load_full()
    }

    /// Install `config`, returning the one it replaced.
    pub fn replace(&self, config: ClientConfig) -> Arc<ClientConfig> {
        self.inner.swap(Arc::new(config))
    }
}
