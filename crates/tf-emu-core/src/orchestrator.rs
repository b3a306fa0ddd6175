//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Primary orchestration and lifecycle management."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tf_emu_common::AppConfig;
use tf_emu_msg::{HandlerRegistry, InMemoryBus, Transport};
use tf_emu_protocol::uid;
use tf_emu_rt::TaskGroup;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::catalog::DeviceCatalog;
use crate::runtime::{DeviceRuntime, RuntimeOptions};

/// Primary orchestrator entrypoint: one runtime per enabled device.
#[derive(Debug)]
pub struct EmulatorOrchestrator {
    config: Arc<AppConfig>,
    catalog: Arc<DeviceCatalog>,
    bus: InMemoryBus,
    registry: HandlerRegistry,
}

impl EmulatorOrchestrator {
    pub fn new(
        config: AppConfig,
        catalog: Arc<DeviceCatalog>,
        bus: InMemoryBus,
        registry: HandlerRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            bus,
            registry,
        }
    }

    /// Start all device runtimes and return a handle for lifecycle control.
    ///
    /// Every runtime is subscribed to its address before this returns.
    pub async fn start(self) -> Result<OrchestratorHandle> {
        self.config.validate()?;
        let (shutdown_tx, _) = broadcast::channel(16);
        let mut tasks = TaskGroup::new(Handle::current());
        let transport: Arc<dyn Transport> = Arc::new(self.bus.clone());
        let simulation = &self.config.simulation;

        let mut devices = IndexMap::new();
        for device in self.config.enabled_devices() {
            let profile = self
                .catalog
                .resolve(&device.device_type)
                .with_context(|| format!("device {} has no usable type", device.uid))?;
            let mut options = RuntimeOptions::new(device.uid.clone())
                .with_seed(simulation.random_seed)
                .with_generator_period(simulation.generator_period);
            options.connected_uid = device.connected_uid.clone();
            options.position = device.position;

            let runtime = DeviceRuntime::new(
                profile,
                options,
                Arc::clone(&transport),
                self.registry.clone(),
            )
            .with_context(|| format!("failed to start device {}", device.uid))?;
            if devices.contains_key(runtime.address()) {
                anyhow::bail!("device uid {} is configured more than once", device.uid);
            }
            runtime.attach(&mut tasks, &shutdown_tx);
            let generators = runtime.start_generators();
            info!(uid = %runtime.address(), device = %runtime.profile().key(), generators, "device started");
            devices.insert(runtime.address().to_owned(), runtime);
        }

        info!(devices = devices.len(), transport = transport.name(), "orchestrator started");
        Ok(OrchestratorHandle {
            shutdown: shutdown_tx,
            tasks,
            devices,
            bus: self.bus,
            registry: self.registry,
            config: self.config,
        })
    }
}

/// Handle returned from the orchestrator startup that can be used by the CLI.
#[derive(Debug)]
pub struct OrchestratorHandle {
    shutdown: broadcast::Sender<()>,
    tasks: TaskGroup,
    devices: IndexMap<String, DeviceRuntime>,
    bus: InMemoryBus,
    registry: HandlerRegistry,
    config: Arc<AppConfig>,
}

impl OrchestratorHandle {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> &InMemoryBus {
        &self.bus
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Running devices in configuration order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceRuntime> {
        self.devices.values()
    }

    /// Runtime listening on `uid`, which need not be canonical.
    pub fn device(&self, uid: &str) -> Option<&DeviceRuntime> {
        let address = uid::encode(uid::decode(uid).ok()?);
        self.devices.get(&address)
    }

    /// Stop all consumer loops and timers and wait for them to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.tasks.join().await?;
        for device in self.devices.values() {
            device.shutdown();
        }
        let metrics = self.bus.metrics();
        debug!(handlers = self.registry.len(), "handler registry at shutdown");
        info!(
            published = metrics.published,
            delivered = metrics.delivered,
            dropped = metrics.dropped,
            "orchestrator shutdown complete"
        );
        Ok(())
    }
}
