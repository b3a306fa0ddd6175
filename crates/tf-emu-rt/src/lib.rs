//! ---
//! emu_section: "04-runtime"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Runtime helpers supporting device runtimes."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Timer and task helpers shared by ramp generators and callback timers.

pub mod scheduling;

pub use scheduling::{spawn_periodic, PeriodicTimer, TaskGroup, TaskSlots};
