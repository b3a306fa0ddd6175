//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Built-in device types and the registry that resolves configured ones.
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tf_emu_common::DeviceTypeRef;
use tf_emu_protocol::{ElementType, FieldDescriptor};
use tracing::debug;

use crate::error::ModelError;
use crate::model::{DeviceProfile, DeviceType, FunctionDescriptor, SlotDescriptor};

mod barometer;
mod distance_ir;
mod dual_button;
mod hall_effect;
mod imu;
mod led_strip;
mod rs232;

/// Compiled device types, addressable by key or numeric identifier.
#[derive(Debug, Default)]
pub struct DeviceCatalog {
    profiles: IndexMap<String, Arc<DeviceProfile>>,
    identifiers: HashMap<u16, String>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in device type.
    pub fn builtin() -> Result<Self, ModelError> {
        let mut catalog = Self::new();
        for device in builtin_types() {
            catalog.register(device)?;
        }
        Ok(catalog)
    }

    /// Compile and add a device type.
    pub fn register(&mut self, device: DeviceType) -> Result<Arc<DeviceProfile>, ModelError> {
        if self.profiles.contains_key(&device.key) {
            return Err(ModelError::DuplicateDeviceType(device.key));
        }
        if self.identifiers.contains_key(&device.device_identifier) {
            return Err(ModelError::DuplicateDeviceType(device.device_identifier.to_string()));
        }
        let profile = Arc::new(DeviceProfile::compile(device)?);
        let device = profile.device();
        debug!(device = %device.key, device_identifier = device.device_identifier, functions = profile.table().len(), "device type registered");
        self.identifiers
            .insert(device.device_identifier, device.key.clone());
        self.profiles.insert(device.key.clone(), Arc::clone(&profile));
        Ok(profile)
    }

    pub fn get(&self, key: &str) -> Option<&Arc<DeviceProfile>> {
        self.profiles.get(key)
    }

    pub fn by_identifier(&self, device_identifier: u16) -> Option<&Arc<DeviceProfile>> {
        self.identifiers
            .get(&device_identifier)
            .and_then(|key| self.profiles.get(key))
    }

    /// Look up the device type a configuration entry asks for.
    pub fn resolve(&self, device_type: &DeviceTypeRef) -> Result<Arc<DeviceProfile>, ModelError> {
        let found = match device_type {
            DeviceTypeRef::Key(key) => self.get(key),
            DeviceTypeRef::Identifier(id) => self.by_identifier(*id),
        };
        found
            .cloned()
            .ok_or_else(|| ModelError::UnknownDeviceType(device_type.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceProfile>> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn builtin_types() -> Vec<DeviceType> {
    vec![
        distance_ir::device(),
        hall_effect::device(),
        barometer::device(),
        dual_button::device(),
        led_strip::device(),
        rs232::device(),
        imu::device(),
    ]
}

fn field(name: &str, element: ElementType) -> FieldDescriptor {
    FieldDescriptor::scalar(name, element)
}

fn device_type(key: &str, display_name: &str, device_identifier: u16, firmware: [u8; 3]) -> DeviceType {
    DeviceType {
        key: key.to_owned(),
        display_name: display_name.to_owned(),
        device_identifier,
        hardware_version: [1, 0, 0],
        firmware_version: firmware,
        slots: Vec::new(),
        functions: vec![FunctionDescriptor::identity()],
        callbacks: Vec::new(),
    }
}

impl DeviceType {
    /// Add a random-default slot with a plain getter and setter.
    fn stored(mut self, slot: &str, setter: (u8, &str), getter: (u8, &str), fields: Vec<FieldDescriptor>) -> Self {
        self.slots.push(SlotDescriptor::new(slot, fields.clone()));
        self.functions
            .push(FunctionDescriptor::setter(setter.0, setter.1, slot, fields.clone()));
        self.functions
            .push(FunctionDescriptor::getter(getter.0, getter.1, slot, fields));
        self
    }

    /// Add a `char option, min, max` threshold slot with its setter and getter.
    fn threshold(self, slot: &str, ids: (u8, u8), element: ElementType) -> Self {
        let set = format!("set_{slot}");
        let get = format!("get_{slot}");
        self.stored(
            slot,
            (ids.0, set.as_str()),
            (ids.1, get.as_str()),
            vec![
                field("option", ElementType::Char),
                field("min", element),
                field("max", element),
            ],
        )
    }

    /// Add a callback period slot with its setter and getter.
    fn cadence(mut self, slot: &str, ids: (u8, u8)) -> Self {
        self.slots.push(SlotDescriptor::cadence(slot));
        self.functions
            .push(FunctionDescriptor::period_setter(ids.0, format!("set_{slot}"), slot));
        self.functions
            .push(FunctionDescriptor::period_getter(ids.1, format!("get_{slot}"), slot));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_compile() {
        let catalog = DeviceCatalog::builtin().expect("builtin catalog");
        assert_eq!(catalog.len(), 7);
        for profile in catalog.iter() {
            assert!(profile.table().route(255).is_some(), "{} lacks get_identity", profile.key());
        }
    }

    #[test]
    fn resolves_by_key_and_identifier() {
        let catalog = DeviceCatalog::builtin().unwrap();
        let by_key = catalog.resolve(&DeviceTypeRef::Key("distance_ir".into())).unwrap();
        let by_id = catalog.resolve(&DeviceTypeRef::Identifier(25)).unwrap();
        assert!(Arc::ptr_eq(&by_key, &by_id));
        assert_eq!(
            catalog.resolve(&DeviceTypeRef::Key("toaster".into())).unwrap_err(),
            ModelError::UnknownDeviceType("toaster".into())
        );
    }

    #[test]
    fn rejects_duplicate_registrations() {
        let mut catalog = DeviceCatalog::builtin().unwrap();
        assert_eq!(
            catalog.register(distance_ir::device()).unwrap_err(),
            ModelError::DuplicateDeviceType("distance_ir".into())
        );
        let clash = device_type("other", "Other", 25, [2, 0, 0]);
        assert_eq!(
            catalog.register(clash).unwrap_err(),
            ModelError::DuplicateDeviceType("25".into())
        );
    }
}
