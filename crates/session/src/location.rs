//! Current route of the host application.

use std::sync::{PoisonError, RwLock};

/// Source of the current path, remembered before leaving for the provider.
pub trait Location: Send + Sync {
    fn pathname(&self) -> String;
}

/// Location whose path is set explicitly by the host.
#[derive(Debug)]
pub struct StaticLocation {
    path: RwLock<String>,
}

impl StaticLocation {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: RwLock::new(path.into()),
        }
    }

    pub fn navigate(&self, path: impl Into<String>) {
        *self.path.write().unwrap_or_else(PoisonError::into_inner) = path.into();
    }
}

impl Default for StaticLocation {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Location for StaticLocation {
    fn pathname(&self) -> String {
        self.path.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
