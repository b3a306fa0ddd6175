//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Shared configuration and logging primitives."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Shared primitives for the tf-emu workspace: the TOML configuration model
//! with its loader and the tracing subscriber setup.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, BrickdConfig, DeviceConfig, DeviceTypeRef, LoadedAppConfig, LoggingConfig,
    SimulationConfig,
};
pub use logging::{init_tracing, LogFormat};
