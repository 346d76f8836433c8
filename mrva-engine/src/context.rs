//! Session context
//!
//! Owns the configuration, the outbound EventBus and the broadcaster for one
//! session. The caller constructs it and controls its lifetime; every engine
//! component is built from it instead of reaching for shared globals.

use crate::error::EngineResult;
use crate::modeling::session::ModelEditor;
use crate::run::monitor::RunMonitor;
use crate::sync::broadcaster::StateBroadcaster;
use crate::sync::dispatcher::MessageDispatcher;
use crate::types::{JobSource, ModelGenerator, ModelPersistence, Workbench};
use mrva_common::config::{ConfigResolver, TomlConfig};
use mrva_common::events::EventBus;
use mrva_common::logging;
use std::sync::Arc;
use tracing::info;

/// Explicitly constructed owner of per-session infrastructure
#[derive(Clone)]
pub struct SessionContext {
    config: TomlConfig,
    event_bus: EventBus,
    broadcaster: StateBroadcaster,
}

impl SessionContext {
    pub fn new(config: TomlConfig) -> Self {
        let event_bus = EventBus::new(config.events.capacity);
        let broadcaster = StateBroadcaster::new(
            event_bus.clone(),
            config.display.skipped_repositories_limit,
        );
        Self {
            config,
            event_bus,
            broadcaster,
        }
    }

    /// Build a context from the resolved configuration file
    pub fn from_resolver(resolver: &ConfigResolver) -> EngineResult<Self> {
        let config = resolver.load()?;
        Ok(Self::new(config))
    }

    /// Install the global tracing subscriber from `[logging]`
    ///
    /// Fails if a subscriber is already installed.
    pub fn init_logging(&self) -> EngineResult<()> {
        logging::init_tracing(&self.config.logging)?;
        info!(
            level = %self.config.logging.level,
            event_capacity = self.config.events.capacity,
            "Session logging initialized"
        );
        Ok(())
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn broadcaster(&self) -> &StateBroadcaster {
        &self.broadcaster
    }

    pub fn run_monitor(&self, source: Arc<dyn JobSource>) -> Arc<RunMonitor> {
        Arc::new(RunMonitor::new(
            source,
            self.broadcaster.clone(),
            self.config.monitor.clone(),
        ))
    }

    pub fn model_editor(
        &self,
        persistence: Arc<dyn ModelPersistence>,
        generator: Arc<dyn ModelGenerator>,
    ) -> Arc<ModelEditor> {
        Arc::new(ModelEditor::new(self.broadcaster.clone(), persistence, generator))
    }

    pub fn dispatcher(&self, editor: Arc<ModelEditor>, workbench: Arc<dyn Workbench>) -> MessageDispatcher {
        MessageDispatcher::new(editor, workbench, self.broadcaster.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_uses_configured_capacity() {
        let config = TomlConfig::from_toml_str("[events]\ncapacity = 8\n").unwrap();
        let context = SessionContext::new(config);
        assert_eq!(context.event_bus().capacity(), 8);
    }

    #[test]
    fn test_contexts_are_independent() {
        let a = SessionContext::new(TomlConfig::default());
        let b = SessionContext::new(TomlConfig::default());

        let _rx = a.event_bus().subscribe();
        assert_eq!(a.event_bus().subscriber_count(), 1);
        assert_eq!(b.event_bus().subscriber_count(), 0);
    }
}
