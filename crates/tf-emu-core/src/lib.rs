//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Generic device runtime for emulated bricks and bricklets.
//!
//! A [`DeviceType`] describes a device as tagged data: state slots, functions
//! and callbacks. It is compiled once into a shared [`DeviceProfile`] holding
//! the dispatch table, and every configured UID gets its own
//! [`DeviceRuntime`] with private state, ramp generators and callback timers.

pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod marshal;
pub mod model;
pub mod orchestrator;
pub mod outbound;
pub mod runtime;
pub mod scheduler;
pub mod state;

pub use catalog::DeviceCatalog;
pub use dispatch::{DispatchTable, Effect, Handler};
pub use error::{DispatchError, ModelError};
pub use model::{
    CallbackDescriptor, DefaultPolicy, DeviceProfile, DeviceType, FunctionDescriptor,
    FunctionKind, SlotDescriptor,
};
pub use orchestrator::{EmulatorOrchestrator, OrchestratorHandle};
pub use runtime::{DeviceRuntime, RuntimeOptions};
pub use scheduler::CallbackState;
pub use state::DeviceState;
