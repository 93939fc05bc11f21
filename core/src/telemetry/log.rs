use log::{debug, info, warn};

/// Component-scoped logger. Every line is prefixed with the owning component
/// so store, query and analysis output can be told apart in one stream.
#[derive(Debug, Clone)]
pub struct LogManager {
    component: String,
}

impl LogManager {
    pub fn new() -> Self {
        Self::for_component("spectrum")
    }

    pub fn for_component(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.component, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.component, message);
    }

    pub fn debug(&self, message: &str) {
        debug!("[{}] {}", self.component, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
