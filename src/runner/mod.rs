// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Workflow runner - startup, per-tick phase control, shutdown

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::comm::{self, EventSink};
use crate::config::Config;
use crate::core::{DispatchEvent, Task, TaskContext, TaskResult};
use crate::error::Result;
use crate::phase::{Phase, PhaseChangeEngine, PhaseEngine};
use crate::pipeline::{PipelineRegistry, PipelineSchedule, PipelineSelector, PluginRegistry};
use crate::store::{epoch_seconds, EdgeEventStore};
use crate::tasks::EventDispatchTask;

/// Per-tick phase controller: resolves the phase, publishes the heartbeat,
/// emits phase-change events, selects and runs the pipeline.
pub struct PhaseTask {
    engine: Box<dyn PhaseEngine>,
    selector: Box<dyn PipelineSelector>,
    change_engine: Box<dyn PhaseChangeEngine>,
    heartbeat: Duration,
    previous: Option<Phase>,
    last_publish: Option<DateTime<Utc>>,
}

impl PhaseTask {
    pub fn new(
        engine: Box<dyn PhaseEngine>,
        selector: Box<dyn PipelineSelector>,
        change_engine: Box<dyn PhaseChangeEngine>,
        heartbeat: Duration,
    ) -> Self {
        Self {
            engine,
            selector,
            change_engine,
            heartbeat,
            previous: None,
            last_publish: None,
        }
    }

    /// Run one tick. Returns the sleep before the next tick.
    pub async fn tick(
        &mut self,
        ctx: &mut TaskContext,
        registry: &mut PipelineRegistry,
        now: DateTime<Utc>,
    ) -> Duration {
        let phase = self.engine.current_phase(now, &ctx.store);
        let changed = self
            .previous
            .as_ref()
            .map(|previous| previous.name != phase.name)
            .unwrap_or(true);

        // Publish after the engine commits, before the pipeline runs. The
        // cadence continues regardless of past publish results.
        let heartbeat_due = self
            .last_publish
            .map(|at| now.signed_duration_since(at).num_seconds() >= self.heartbeat.as_secs() as i64)
            .unwrap_or(true);
        if changed || heartbeat_due {
            let accepted = ctx
                .adapter
                .publish_phase(&phase.name, epoch_seconds(now))
                .await;
            if !accepted {
                warn!(phase = %phase.name, "phase publish not accepted");
            }
            self.last_publish = Some(now);
        }

        if changed {
            let old = self.previous.as_ref().map(|p| p.name.clone());
            self.change_engine.on_phase_change(old.as_deref(), &phase.name);
            if let Some(old) = old {
                ctx.enqueue_event(DispatchEvent::new(
                    "phase_controller",
                    ["monitor"],
                    json!({"from": old, "to": phase.name, "at": epoch_seconds(now)}),
                ));
            }
            self.previous = Some(phase.clone());
        }

        let selection = self.selector.select(&phase, ctx);
        if selection.phase_changed {
            ctx.enqueue_event(DispatchEvent::new(
                "pipeline_selector",
                ["monitor"],
                json!({"to": selection.name, "at": epoch_seconds(now)}),
            ));
        }

        let entry = match registry.get_mut(&selection.name) {
            Ok(entry) => entry,
            Err(e) => {
                error!("tick skipped: {e}");
                return ctx.config.loop_interval;
            }
        };

        let result = match entry.task.run(ctx).await {
            Ok(result) => result,
            Err(e) => {
                error!(pipeline = %selection.name, "pipeline failed: {e:#}");
                TaskResult::short_circuit()
            }
        };

        result
            .sleep
            .or(selection.sleep)
            .or(entry.default_sleep)
            .unwrap_or(ctx.config.loop_interval)
    }
}

/// Parse the schedule, instantiate every pipeline, and populate the registry.
pub fn init_pipelines(
    config: &Arc<Config>,
    plugins: &PluginRegistry,
) -> Result<PipelineRegistry> {
    let schedule = PipelineSchedule::load(&config.pipeline_schedule_path)?;
    let mut registry = PipelineRegistry::new();
    for (phase, binding) in &schedule.phases {
        let spec = &schedule.pipelines[&binding.pipeline];
        let factory = plugins.pipelines.resolve(&spec.class_path)?;
        let task = factory(config, plugins)?;
        registry.register(phase, task, binding.interval)?;
        info!(
            phase = %phase,
            pipeline = %spec.name,
            class = %spec.class_path,
            interval = ?binding.interval,
            "pipeline registered"
        );
    }
    Ok(registry)
}

/// Shutdown signal wired to SIGINT and SIGTERM.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Owns the task context and drives the main loop until shutdown.
pub struct WorkflowRunner {
    ctx: TaskContext,
    registry: PipelineRegistry,
    phase: PhaseTask,
    flush: EventDispatchTask,
    shutdown: watch::Receiver<bool>,
    heartbeat_cap: Duration,
}

impl WorkflowRunner {
    /// Build the full daemon: store, adapter, ingestion wiring, pipelines,
    /// and phase control.
    pub async fn bootstrap(config: Config, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let config = Arc::new(config);
        let plugins = PluginRegistry::with_builtins();

        let store = Arc::new(EdgeEventStore::new(
            config.edge_event_max_age,
            config.edge_event_skew_tolerance,
        ));
        let adapter = comm::build_adapter(&config)?;

        let sink: EventSink = {
            let store = Arc::clone(&store);
            Arc::new(move |payload| store.add_event(payload))
        };
        adapter.start_event_ingestion(sink).await?;
        info!(
            backend = ?config.edge_event_backend,
            publish = ?config.phase_publish_backend,
            "edge comm adapter ready"
        );

        let registry = init_pipelines(&config, &plugins)?;
        let phase = PhaseTask::new(
            plugins.phase_engine(&config)?,
            plugins.pipeline_selector(&config)?,
            plugins.phase_change_engine(&config)?,
            config.mqtt.heartbeat,
        );
        let flush = EventDispatchTask::new(plugins.dispatch_engine(&config)?);
        let heartbeat_cap = config.mqtt.heartbeat;
        let ctx = TaskContext::new(Arc::clone(&config), store, adapter);

        Ok(Self {
            ctx,
            registry,
            phase,
            flush,
            shutdown,
            heartbeat_cap,
        })
    }

    /// Main loop: tick, sleep, repeat until cancelled. Per-tick errors are
    /// contained; only startup configuration problems abort the process.
    pub async fn run(&mut self) -> Result<()> {
        info!("workflow loop started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            self.ctx.reset_scratch();
            let sleep = self
                .phase
                .tick(&mut self.ctx, &mut self.registry, Utc::now())
                .await;
            // Cap the sleep so the heartbeat cadence holds through long idles.
            let sleep = sleep.min(self.heartbeat_cap);

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = self.shutdown.changed() => break,
            }
        }
        self.stop().await;
        Ok(())
    }

    /// Deterministic shutdown: stop ingestion, flush the queue, release
    /// resources in reverse acquisition order.
    async fn stop(&mut self) {
        info!("shutting down");
        self.ctx.adapter.stop().await;
        if !self.ctx.event_queue.is_empty() {
            if let Err(e) = self.flush.run(&mut self.ctx).await {
                error!("final event flush failed: {e:#}");
            }
        }
        info!("shutdown complete");
    }
}
