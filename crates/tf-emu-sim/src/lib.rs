//! ---
//! emu_section: "05-simulation"
//! emu_subsection: "01-bootstrap"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Simulation module exports and shared types."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Sensor simulation for emulated devices.
//!
//! A [`RampGenerator`] drives a single sensor value back and forth between
//! its bounds; [`DefaultValues`] produces the per-instance initial readings
//! a device reports before anything else touched them.

pub mod defaults;
pub mod ramp;

pub use defaults::DefaultValues;
pub use ramp::{Direction, RampGenerator};
