//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! One emulated device instance: state, dispatch, generators and callbacks.
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use tf_emu_msg::{log_envelope, Envelope, HandlerRegistry, MessageDirection, Transport, BROADCAST};
use tf_emu_protocol::{
    uid, EnumerationType, Header, Identity, Packet, Value, CALLBACK_ENUMERATE,
};
use tf_emu_rt::{spawn_periodic, TaskGroup, TaskSlots};
use tf_emu_sim::{DefaultValues, RampGenerator};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::dispatch::{self, Effect};
use crate::error::DispatchError;
use crate::marshal;
use crate::model::{DeviceProfile, RampSpec};
use crate::outbound::Outbound;
use crate::scheduler::{CallbackScheduler, CallbackState};
use crate::state::DeviceState;

fn default_generator_period() -> Duration {
    Duration::from_millis(100)
}

/// Per-instance settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeOptions {
    pub uid: String,
    pub connected_uid: Option<String>,
    pub position: Option<char>,
    /// Seed of the random default values.
    pub seed: u64,
    /// Tick of every ramp generator of the instance.
    pub generator_period: Duration,
}

impl RuntimeOptions {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            connected_uid: None,
            position: None,
            seed: 0,
            generator_period: default_generator_period(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_generator_period(mut self, period: Duration) -> Self {
        self.generator_period = period;
        self
    }
}

struct Device {
    profile: Arc<DeviceProfile>,
    state: Mutex<DeviceState>,
    outbound: Outbound,
    numeric_uid: u32,
    address: String,
    generator_period: Duration,
    handle: Handle,
    generators: TaskSlots<(usize, usize)>,
    callbacks: CallbackScheduler,
}

/// Running emulation of one configured device.
///
/// Cheap to clone; all clones drive the same instance. Timers hold only weak
/// references, so dropping the last clone stops everything.
#[derive(Clone)]
pub struct DeviceRuntime {
    inner: Arc<Device>,
}

impl fmt::Debug for DeviceRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRuntime")
            .field("uid", &self.inner.address)
            .field("device", &self.inner.profile.key())
            .finish()
    }
}

impl DeviceRuntime {
    /// Create an instance of `profile`; must be called inside a tokio runtime.
    pub fn new(
        profile: Arc<DeviceProfile>,
        options: RuntimeOptions,
        transport: Arc<dyn Transport>,
        registry: HandlerRegistry,
    ) -> Result<Self> {
        let numeric_uid = uid::decode(&options.uid)
            .with_context(|| format!("invalid device uid '{}'", options.uid))?;
        let handle = Handle::try_current().context("device runtimes need a tokio runtime")?;
        let address = uid::encode(numeric_uid);

        let device = profile.device();
        // Identity reports the uid as configured, leading '1' digits included.
        let mut identity = Identity::new(options.uid.clone(), device.device_identifier);
        identity.hardware_version = device.hardware_version;
        identity.firmware_version = device.firmware_version;
        if let Some(connected) = options.connected_uid {
            identity.connected_uid = connected;
        }
        if let Some(position) = options.position {
            identity.position = position;
        }

        let mut defaults = DefaultValues::seeded(options.seed, numeric_uid);
        let state = DeviceState::new(&profile, identity, &mut defaults);
        info!(uid = %address, device = %profile.key(), device_identifier = device.device_identifier, "device runtime created");

        Ok(Self {
            inner: Arc::new(Device {
                callbacks: CallbackScheduler::new(handle.clone()),
                profile,
                state: Mutex::new(state),
                outbound: Outbound::new(transport, registry),
                numeric_uid,
                address,
                generator_period: options.generator_period,
                handle,
                generators: TaskSlots::new(),
            }),
        })
    }

    /// Canonical UID, also the bus address the instance listens on.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn numeric_uid(&self) -> u32 {
        self.inner.numeric_uid
    }

    pub fn profile(&self) -> &Arc<DeviceProfile> {
        &self.inner.profile
    }

    /// Decode, dispatch and answer one inbound packet.
    ///
    /// Returns the encoded response, or `None` when nothing is to be sent:
    /// no response expected, a malformed packet, an unknown or unemulated
    /// function. Failures are logged, never propagated.
    pub fn handle_inbound(&self, frame: &[u8]) -> Option<Bytes> {
        let device = &self.inner;
        let packet = match Packet::parse(frame) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(uid = %device.address, error = %err, len = frame.len(), "dropping malformed packet");
                return None;
            }
        };
        trace!(uid = %device.address, request = %packet, "request");

        let outcome = {
            let mut state = device.state.lock();
            dispatch::invoke(&device.profile, &mut state, &packet.header, &packet.payload)
        };
        let effect = match outcome {
            Ok(effect) => effect,
            Err(err @ DispatchError::NotImplemented { .. }) => {
                info!(uid = %device.address, function_id = packet.header.function_id, error = %err, "ignoring request");
                return None;
            }
            Err(err) => {
                warn!(uid = %device.address, function_id = packet.header.function_id, error = %err, "request dropped");
                return None;
            }
        };

        let payload = match effect {
            Effect::Respond(payload) => payload,
            Effect::Silent => return None,
            Effect::Reschedule {
                cadence,
                period,
                ack,
            } => {
                self.reschedule(cadence, period);
                if !ack {
                    return None;
                }
                Bytes::new()
            }
        };
        let response = Packet::new(packet.header.response(packet.header.function_id), payload)
            .and_then(|packet| packet.encode());
        match response {
            Ok(bytes) => {
                trace!(uid = %device.address, answer = %hex::encode(&bytes), "answer");
                Some(bytes)
            }
            Err(err) => {
                warn!(uid = %device.address, function_id = packet.header.function_id, error = %err, "failed to encode response");
                None
            }
        }
    }

    /// Handle a frame taken off the device address and route the answer.
    pub fn handle_envelope(&self, envelope: Envelope) {
        if let Some(answer) = self.handle_inbound(&envelope.frame) {
            self.inner
                .outbound
                .respond(&self.inner.address, envelope.origin.as_ref(), answer);
        }
    }

    /// Encoded enumerate callback announcing this instance.
    pub fn enumerate_response(&self) -> Option<Bytes> {
        let identity = self.inner.state.lock().identity().clone();
        let encoded = identity
            .encode_enumerate(EnumerationType::Available)
            .and_then(|payload| {
                Packet::new(Header::callback(self.inner.numeric_uid, CALLBACK_ENUMERATE), payload)
            })
            .and_then(|packet| packet.encode());
        match encoded {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(uid = %self.inner.address, error = %err, "failed to encode enumerate answer");
                None
            }
        }
    }

    /// Answer a discovery broadcast to every registered handler.
    pub fn answer_broadcast(&self) -> usize {
        match self.enumerate_response() {
            Some(frame) => {
                debug!(uid = %self.inner.address, "answering enumerate");
                self.inner.outbound.to_all(&self.inner.address, frame)
            }
            None => 0,
        }
    }

    /// Start one generator per ramp driven field; returns how many run.
    pub fn start_generators(&self) -> usize {
        let device = &self.inner;
        for spec in device.profile.ramps() {
            let start = device.state.lock().slot(spec.slot)[spec.field]
                .as_f64()
                .unwrap_or(spec.bounds.min);
            let Some(ramp) = RampGenerator::new(start, spec.bounds) else {
                continue;
            };
            let task = spawn_periodic(
                &device.handle,
                device.generator_period,
                generator_tick(Arc::downgrade(&self.inner), *spec, ramp),
            );
            device.generators.replace((spec.slot, spec.field), task);
        }
        debug!(uid = %device.address, generators = device.generators.len(), "generators started");
        device.generators.len()
    }

    /// Timer state of the callback with wire id `callback_id`.
    pub fn callback_state(&self, callback_id: u8) -> Option<CallbackState> {
        let device = &self.inner;
        let index = device
            .profile
            .callbacks()
            .iter()
            .position(|callback| callback.id == callback_id)?;
        let period = match device.profile.callbacks()[index].cadence {
            Some(cadence) => device.state.lock().period(cadence),
            None => 0,
        };
        Some(device.callbacks.state(index, period))
    }

    /// Current values of the slot called `name`.
    pub fn slot_values(&self, name: &str) -> Option<Vec<Value>> {
        let index = self.inner.profile.slot_index(name)?;
        Some(self.inner.state.lock().slot(index).to_vec())
    }

    /// Subscribe to the device and discovery addresses and spawn the consumer
    /// loop into `tasks`. Subscriptions are in place when this returns.
    pub fn attach(&self, tasks: &mut TaskGroup, shutdown: &broadcast::Sender<()>) {
        let transport = self.inner.outbound.transport();
        let mut requests = transport.subscribe(&self.inner.address);
        let mut discovery = transport.subscribe(BROADCAST);
        let mut shutdown = shutdown.subscribe();
        let runtime = self.clone();
        let address = self.inner.address.clone();
        tasks.spawn(format!("device-{address}"), async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!(uid = %address, "device shutdown signal received");
                        break;
                    }
                    Some(envelope) = requests.recv() => {
                        log_envelope(MessageDirection::Inbound, &address, &envelope);
                        runtime.handle_envelope(envelope);
                    }
                    Some(envelope) = discovery.recv() => {
                        log_envelope(MessageDirection::Inbound, BROADCAST, &envelope);
                        runtime.answer_broadcast();
                    }
                    else => break,
                }
            }
            runtime.shutdown();
        });
    }

    /// Stop every generator and callback timer of the instance.
    pub fn shutdown(&self) {
        self.inner.generators.abort_all();
        self.inner.callbacks.stop_all();
        debug!(uid = %self.inner.address, "device timers stopped");
    }

    fn reschedule(&self, cadence: usize, period: u32) {
        let device = &self.inner;
        for callback in device.profile.callbacks_for_cadence(cadence) {
            let emit = callback_tick(Arc::downgrade(&self.inner), callback);
            let state = device.callbacks.apply(&device.address, callback, period, emit);
            debug!(
                uid = %device.address,
                callback_id = device.profile.callbacks()[callback].id,
                period_ms = period,
                state = ?state,
                "callback period set"
            );
        }
    }
}

fn generator_tick(
    device: Weak<Device>,
    spec: RampSpec,
    mut ramp: RampGenerator,
) -> impl FnMut() + Send + 'static {
    move || {
        let Some(device) = device.upgrade() else {
            return;
        };
        let raw = ramp.tick();
        match spec.element.value_from_f64(raw) {
            Ok(value) => device.state.lock().set_field(spec.slot, spec.field, value),
            Err(err) => debug!(uid = %device.address, error = %err, "ramp value not representable"),
        }
    }
}

fn callback_tick(device: Weak<Device>, callback: usize) -> impl FnMut() + Send + 'static {
    move || {
        let Some(device) = device.upgrade() else {
            return;
        };
        device.emit_callback(callback);
    }
}

impl Device {
    fn emit_callback(&self, callback: usize) {
        let compiled = &self.profile.callbacks()[callback];
        let changed = self.state.lock().take_change(callback, &compiled.reports);
        let Some(values) = changed else {
            trace!(uid = %self.address, callback_id = compiled.id, "value already called back");
            return;
        };
        let descriptor = self.profile.callback_descriptor(callback);
        let frame = marshal::encode_values(&descriptor.outputs, &values)
            .and_then(|payload| Packet::new(Header::callback(self.numeric_uid, compiled.id), payload))
            .and_then(|packet| packet.encode());
        match frame {
            Ok(frame) => {
                let reached = self.outbound.to_all(&self.address, frame);
                debug!(uid = %self.address, callback_id = compiled.id, callback = %descriptor.name, reached, "callback emitted");
            }
            Err(err) => warn!(uid = %self.address, callback_id = compiled.id, error = %err, "failed to encode callback"),
        }
    }
}
