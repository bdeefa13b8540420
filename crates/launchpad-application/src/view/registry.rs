use super::plugins::{TextAnalyzerView, WeatherView};
use super::{AgentView, ViewContext};
use launchpad_core::error::{LaunchpadError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a view for a mounted custom agent.
pub type ViewFactory = Arc<dyn Fn(ViewContext) -> Box<dyn AgentView> + Send + Sync>;

/// Component keys of `custom` agents mapped to view factories.
///
/// Populated at startup; views are only constructed when a session mounts.
#[derive(Default)]
pub struct PluginRegistry {
    factories: HashMap<String, ViewFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the plugins bundled with the workspace.
    pub fn with_builtin_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(WeatherView::KEY, WeatherView::boxed);
        registry.register(TextAnalyzerView::KEY, TextAnalyzerView::boxed);
        registry
    }

    /// Registers `factory` under `key`, returning the factory it replaced.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> Option<ViewFactory>
    where
        F: Fn(ViewContext) -> Box<dyn AgentView> + Send + Sync + 'static,
    {
        let key = key.into();
        tracing::debug!(key = %key, "registered view plugin");
        self.factories.insert(key, Arc::new(factory))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys in lexical order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn instantiate(&self, key: &str, ctx: ViewContext) -> Result<Box<dyn AgentView>> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| LaunchpadError::PluginNotRegistered(key.to_string()))?;
        Ok(factory(ctx))
    }
}
