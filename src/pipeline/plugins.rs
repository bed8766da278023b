// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Compile-time plugin registry - factories keyed by class-path strings
//!
//! Schedule files and the `*_CLASS` environment variables select
//! implementations by `module:Class` keys. Unknown keys fail at startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::core::Task;
use crate::error::{Error, Result};
use crate::phase::{
    DebouncedPhaseEngine, IronGateScheduler, LoggingPhaseChangeEngine, PhaseChangeEngine,
    PhaseEngine, SchedulerEngine, SinglePhaseScheduler, TimeBasedPhaseEngine, TimeWindowScheduler,
};
use crate::tasks::{
    DefaultFormatEngine, DefaultIngestionEngine, DefaultRuleEngine, DispatchEngine, FormatEngine,
    HandlerDispatchEngine, IdlePipelineTask, IngestionEngine, PassthroughTrackingEngine,
    RuleEngine, TrackingEngine, WorkingPipelineTask,
};

use super::selector::{PipelineSelector, WorkingHoursSelector};

pub type PipelineFactory =
    Arc<dyn Fn(&Arc<Config>, &PluginRegistry) -> Result<Box<dyn Task>> + Send + Sync>;
pub type IngestionFactory = Arc<dyn Fn(&Arc<Config>) -> Box<dyn IngestionEngine> + Send + Sync>;
pub type TrackingFactory = Arc<dyn Fn(&Arc<Config>) -> Box<dyn TrackingEngine> + Send + Sync>;
pub type FormatFactory = Arc<dyn Fn(&Arc<Config>) -> Box<dyn FormatEngine> + Send + Sync>;
pub type RuleFactory = Arc<dyn Fn(&Arc<Config>) -> Box<dyn RuleEngine> + Send + Sync>;
pub type DispatchFactory = Arc<dyn Fn(&Arc<Config>) -> Box<dyn DispatchEngine> + Send + Sync>;
pub type SchedulerFactory = Arc<dyn Fn(&Arc<Config>) -> Box<dyn SchedulerEngine> + Send + Sync>;
pub type PhaseEngineFactory = Arc<
    dyn Fn(&Arc<Config>, Box<dyn SchedulerEngine>) -> Box<dyn PhaseEngine> + Send + Sync,
>;
pub type SelectorFactory = Arc<dyn Fn(&Arc<Config>) -> Box<dyn PipelineSelector> + Send + Sync>;
pub type PhaseChangeFactory =
    Arc<dyn Fn(&Arc<Config>) -> Box<dyn PhaseChangeEngine> + Send + Sync>;

/// One factory map per seam.
pub struct FactorySet<F> {
    kind: &'static str,
    map: HashMap<String, F>,
}

impl<F: Clone> FactorySet<F> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            map: HashMap::new(),
        }
    }

    pub fn register(&mut self, key: &str, factory: F) {
        self.map.insert(key.to_string(), factory);
    }

    pub fn resolve(&self, key: &str) -> Result<F> {
        self.map.get(key).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.map.keys().map(String::as_str).collect();
            known.sort_unstable();
            Error::Config(format!(
                "unknown {} {key:?}, known: {}",
                self.kind,
                known.join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

/// Registry of every swappable implementation, keyed by class-path strings.
pub struct PluginRegistry {
    pub pipelines: FactorySet<PipelineFactory>,
    pub ingestion: FactorySet<IngestionFactory>,
    pub tracking: FactorySet<TrackingFactory>,
    pub formats: FactorySet<FormatFactory>,
    pub rules: FactorySet<RuleFactory>,
    pub dispatchers: FactorySet<DispatchFactory>,
    pub schedulers: FactorySet<SchedulerFactory>,
    pub phase_engines: FactorySet<PhaseEngineFactory>,
    pub selectors: FactorySet<SelectorFactory>,
    pub phase_change: FactorySet<PhaseChangeFactory>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self {
            pipelines: FactorySet::new("pipeline"),
            ingestion: FactorySet::new("ingestion engine"),
            tracking: FactorySet::new("tracking engine"),
            formats: FactorySet::new("format engine"),
            rules: FactorySet::new("rule engine"),
            dispatchers: FactorySet::new("dispatch engine"),
            schedulers: FactorySet::new("scheduler engine"),
            phase_engines: FactorySet::new("phase engine"),
            selectors: FactorySet::new("pipeline selector"),
            phase_change: FactorySet::new("phase change engine"),
        }
    }

    /// Registry preloaded with every built-in implementation.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.pipelines.register(
            "edgebridge.pipelines:WorkingPipeline",
            Arc::new(|config, plugins| {
                Ok(Box::new(WorkingPipelineTask::from_config(config, plugins)?) as Box<dyn Task>)
            }),
        );
        registry.pipelines.register(
            "edgebridge.pipelines:IdlePipeline",
            Arc::new(|config, plugins| {
                Ok(Box::new(IdlePipelineTask::from_config(config, plugins)?) as Box<dyn Task>)
            }),
        );

        registry.ingestion.register(
            "edgebridge.ingestion:DefaultIngestionEngine",
            Arc::new(|_config| Box::new(DefaultIngestionEngine) as Box<dyn IngestionEngine>),
        );
        registry.tracking.register(
            "edgebridge.tracking:PassthroughTrackingEngine",
            Arc::new(|_config| Box::new(PassthroughTrackingEngine) as Box<dyn TrackingEngine>),
        );
        registry.formats.register(
            "edgebridge.formatting:DefaultFormatEngine",
            Arc::new(|_config| Box::new(DefaultFormatEngine) as Box<dyn FormatEngine>),
        );
        registry.rules.register(
            "edgebridge.rules:DefaultRuleEngine",
            Arc::new(|_config| Box::new(DefaultRuleEngine) as Box<dyn RuleEngine>),
        );
        registry.dispatchers.register(
            "edgebridge.dispatch:HandlerDispatchEngine",
            Arc::new(|config| {
                Box::new(HandlerDispatchEngine::with_builtin_handlers(
                    config.handler_timeout,
                )) as Box<dyn DispatchEngine>
            }),
        );

        registry.schedulers.register(
            "edgebridge.phase:SinglePhaseScheduler",
            Arc::new(|_config| Box::new(SinglePhaseScheduler::default()) as Box<dyn SchedulerEngine>),
        );
        registry.schedulers.register(
            "edgebridge.phase:TimeWindowScheduler",
            Arc::new(|config| {
                Box::new(TimeWindowScheduler::new(
                    config.working_windows.clone(),
                    config.timezone,
                )) as Box<dyn SchedulerEngine>
            }),
        );
        registry.schedulers.register(
            "edgebridge.phase:IronGateScheduler",
            Arc::new(|config| {
                Box::new(IronGateScheduler::new(config.iron_gate_camera_id.clone()))
                    as Box<dyn SchedulerEngine>
            }),
        );

        registry.phase_engines.register(
            "edgebridge.phase:TimeBasedPhaseEngine",
            Arc::new(|_config, scheduler| {
                Box::new(TimeBasedPhaseEngine::new(scheduler)) as Box<dyn PhaseEngine>
            }),
        );
        registry.phase_engines.register(
            "edgebridge.phase:DebouncedPhaseEngine",
            Arc::new(|config, scheduler| {
                Box::new(DebouncedPhaseEngine::new(
                    scheduler,
                    config.phase_stable,
                    config.edge_event_stale,
                    config.edge_event_stale_mode,
                    config.edge_event_unknown_phase.clone(),
                )) as Box<dyn PhaseEngine>
            }),
        );

        registry.selectors.register(
            "edgebridge.selector:WorkingHoursSelector",
            Arc::new(|_config| Box::new(WorkingHoursSelector) as Box<dyn PipelineSelector>),
        );
        registry.phase_change.register(
            "edgebridge.phase:LoggingPhaseChangeEngine",
            Arc::new(|_config| Box::new(LoggingPhaseChangeEngine) as Box<dyn PhaseChangeEngine>),
        );

        registry
    }

    pub fn ingestion_engine(&self, config: &Arc<Config>) -> Result<Box<dyn IngestionEngine>> {
        match &config.plugins.ingestion_engine {
            Some(key) => Ok((self.ingestion.resolve(key)?)(config)),
            None => Ok(Box::new(DefaultIngestionEngine)),
        }
    }

    pub fn tracking_engine(&self, config: &Arc<Config>) -> Result<Box<dyn TrackingEngine>> {
        match &config.plugins.tracking_engine {
            Some(key) => Ok((self.tracking.resolve(key)?)(config)),
            None => Ok(Box::new(PassthroughTrackingEngine)),
        }
    }

    pub fn format_engine(&self, config: &Arc<Config>) -> Result<Box<dyn FormatEngine>> {
        match &config.plugins.format_strategy {
            Some(key) => Ok((self.formats.resolve(key)?)(config)),
            None => Ok(Box::new(DefaultFormatEngine)),
        }
    }

    pub fn rule_engine(&self, config: &Arc<Config>) -> Result<Box<dyn RuleEngine>> {
        match &config.plugins.rules_engine {
            Some(key) => Ok((self.rules.resolve(key)?)(config)),
            None => Ok(Box::new(DefaultRuleEngine)),
        }
    }

    pub fn dispatch_engine(&self, config: &Arc<Config>) -> Result<Box<dyn DispatchEngine>> {
        match &config.plugins.event_dispatch_engine {
            Some(key) => Ok((self.dispatchers.resolve(key)?)(config)),
            None => Ok(Box::new(HandlerDispatchEngine::with_builtin_handlers(
                config.handler_timeout,
            ))),
        }
    }

    pub fn scheduler_engine(&self, config: &Arc<Config>) -> Result<Box<dyn SchedulerEngine>> {
        match &config.plugins.scheduler_engine {
            Some(key) => Ok((self.schedulers.resolve(key)?)(config)),
            None => Ok(Box::new(SinglePhaseScheduler::default())),
        }
    }

    pub fn phase_engine(&self, config: &Arc<Config>) -> Result<Box<dyn PhaseEngine>> {
        let scheduler = self.scheduler_engine(config)?;
        match &config.plugins.phase_engine {
            Some(key) => Ok((self.phase_engines.resolve(key)?)(config, scheduler)),
            None => Ok(Box::new(TimeBasedPhaseEngine::new(scheduler))),
        }
    }

    pub fn pipeline_selector(&self, config: &Arc<Config>) -> Result<Box<dyn PipelineSelector>> {
        match &config.plugins.pipeline_selector {
            Some(key) => Ok((self.selectors.resolve(key)?)(config)),
            None => Ok(Box::new(WorkingHoursSelector)),
        }
    }

    pub fn phase_change_engine(&self, config: &Arc<Config>) -> Result<Box<dyn PhaseChangeEngine>> {
        match &config.plugins.phase_change_engine {
            Some(key) => Ok((self.phase_change.resolve(key)?)(config)),
            None => Ok(Box::new(LoggingPhaseChangeEngine)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_fails_naming_known_entries() {
        let registry = PluginRegistry::with_builtins();
        let err = match registry.rules.resolve("acme.rules:Custom") {
            Ok(_) => panic!("expected resolve to fail for unknown key"),
            Err(e) => e,
        };
        let message = err.to_string();
        assert!(message.contains("acme.rules:Custom"));
        assert!(message.contains("edgebridge.rules:DefaultRuleEngine"));
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_override_resolution_fails_fast() {
        let registry = PluginRegistry::with_builtins();
        let mut config = Config::default();
        config.plugins.rules_engine = Some("missing:Engine".to_string());
        assert!(registry.rule_engine(&Arc::new(config)).is_err());
    }

    #[test]
    fn builtin_keys_resolve() {
        let registry = PluginRegistry::with_builtins();
        let config = Arc::new(Config::default());
        assert!(registry.ingestion.resolve("edgebridge.ingestion:DefaultIngestionEngine").is_ok());
        assert!(registry
            .pipelines
            .resolve("edgebridge.pipelines:WorkingPipeline")
            .is_ok());
        assert!(registry.phase_engine(&config).is_ok());
        assert!(registry.pipeline_selector(&config).is_ok());
    }
}
