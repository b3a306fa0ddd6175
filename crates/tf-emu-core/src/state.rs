//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use tf_emu_protocol::{Identity, Value};
use tf_emu_sim::DefaultValues;

use crate::marshal;
use crate::model::DeviceProfile;

/// Mutable state of one device instance.
///
/// Slot values are indexed like the profile's slots; the last-emitted cache
/// like its callbacks.
#[derive(Debug, Clone)]
pub struct DeviceState {
    identity: Identity,
    slots: Vec<Vec<Value>>,
    last_emitted: Vec<Option<Vec<Value>>>,
}

impl DeviceState {
    /// Fresh state with every slot at its default.
    ///
    /// The last-emitted cache starts out with the initial readings, so a value
    /// that never moves is never called back.
    pub fn new(profile: &DeviceProfile, identity: Identity, defaults: &mut DefaultValues) -> Self {
        let slots: Vec<Vec<Value>> = profile
            .slots()
            .iter()
            .map(|slot| marshal::initial_values(slot, defaults))
            .collect();
        let mut state = Self {
            identity,
            slots,
            last_emitted: Vec::new(),
        };
        state.last_emitted = profile
            .callbacks()
            .iter()
            .map(|callback| Some(state.reported(&callback.reports)))
            .collect();
        state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn uid(&self) -> &str {
        &self.identity.uid
    }

    pub fn slot(&self, index: usize) -> &[Value] {
        &self.slots[index]
    }

    pub fn store(&mut self, index: usize, values: Vec<Value>) {
        self.slots[index] = values;
    }

    pub fn set_field(&mut self, slot: usize, field: usize, value: Value) {
        self.slots[slot][field] = value;
    }

    pub fn period(&self, cadence: usize) -> u32 {
        match self.slots[cadence].first() {
            Some(Value::UInt(period)) => u32::try_from(*period).unwrap_or(u32::MAX),
            _ => 0,
        }
    }

    pub fn set_period(&mut self, cadence: usize, period: u32) {
        self.slots[cadence] = vec![Value::UInt(u64::from(period))];
    }

    /// Concatenated values of the given slots.
    pub fn reported(&self, slots: &[usize]) -> Vec<Value> {
        slots
            .iter()
            .flat_map(|index| self.slots[*index].iter().cloned())
            .collect()
    }

    /// Values of callback `callback` if they changed since the last emission;
    /// the cache is updated when they did.
    pub fn take_change(&mut self, callback: usize, slots: &[usize]) -> Option<Vec<Value>> {
        let current = self.reported(slots);
        let cached = &mut self.last_emitted[callback];
        if cached.as_ref() == Some(&current) {
            return None;
        }
        *cached = Some(current.clone());
        Some(current)
    }
}
