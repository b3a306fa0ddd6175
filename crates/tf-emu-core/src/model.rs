//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Declarative device descriptions and their compiled, shared form.
use std::collections::HashSet;

use bytes::BytesMut;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tf_emu_protocol::{
    ElementType, FieldDescriptor, FieldRole, Identity, RampBounds, Value, CALLBACK_ENUMERATE,
    FUNCTION_ENUMERATE, FUNCTION_GET_IDENTITY,
};

use crate::dispatch::DispatchTable;
use crate::error::ModelError;

/// Initial value policy of a state slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", content = "values", rename_all = "snake_case")]
pub enum DefaultPolicy {
    /// Fixed values, one per slot field.
    Fixed(Vec<Value>),
    /// Drawn once per instance from the seeded default source.
    #[default]
    Random,
}

/// Backing store for a group of values read and written together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub default: DefaultPolicy,
}

impl SlotDescriptor {
    /// Slot with random initial values.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|field| field.with_role(FieldRole::Store))
                .collect(),
            default: DefaultPolicy::Random,
        }
    }

    /// Single-field slot.
    pub fn scalar(name: impl Into<String>, element: ElementType) -> Self {
        let name = name.into();
        let field = FieldDescriptor::scalar(name.clone(), element);
        Self::new(name, vec![field])
    }

    /// Single-field sensor slot driven by a ramp generator from `start`.
    pub fn ramp(name: impl Into<String>, element: ElementType, start: Value, bounds: RampBounds) -> Self {
        let name = name.into();
        let field = FieldDescriptor::scalar(name.clone(), element).with_bounds(bounds);
        Self::new(name, vec![field]).with_default(vec![start])
    }

    /// Callback period slot: one uint32 in milliseconds, initially 0.
    pub fn cadence(name: impl Into<String>) -> Self {
        Self::new(name, vec![FieldDescriptor::scalar("period", ElementType::UInt32)])
            .with_default(vec![Value::UInt(0)])
    }

    pub fn with_default(mut self, values: Vec<Value>) -> Self {
        self.default = DefaultPolicy::Fixed(values);
        self
    }

    fn is_cadence(&self) -> bool {
        matches!(self.fields.as_slice(), [field] if is_period_field(field))
    }
}

/// Behavioural kind of a function, naming the slot it operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FunctionKind {
    /// Answers with the concatenated values of one or more slots.
    Getter { slots: Vec<String> },
    Setter { slot: String },
    Enable { slot: String },
    Disable { slot: String },
    CallbackPeriodSetter { cadence: String },
    CallbackPeriodGetter { cadence: String },
    Identity,
    NotImplemented,
}

/// A request type the device answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub id: u8,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<FieldDescriptor>,
    #[serde(default)]
    pub outputs: Vec<FieldDescriptor>,
    #[serde(flatten)]
    pub kind: FunctionKind,
}

impl FunctionDescriptor {
    fn build(id: u8, name: impl Into<String>, kind: FunctionKind) -> Self {
        Self {
            id,
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            kind,
        }
    }

    /// Getter answering with the values of `slot`.
    pub fn getter(id: u8, name: impl Into<String>, slot: &str, outputs: Vec<FieldDescriptor>) -> Self {
        Self::composite_getter(id, name, &[slot], outputs)
    }

    /// Getter answering with several slots back to back.
    pub fn composite_getter(
        id: u8,
        name: impl Into<String>,
        slots: &[&str],
        outputs: Vec<FieldDescriptor>,
    ) -> Self {
        let slots = slots.iter().map(|slot| (*slot).to_owned()).collect();
        Self::build(id, name, FunctionKind::Getter { slots }).with_outputs(outputs)
    }

    /// Setter replacing the values of `slot`.
    pub fn setter(id: u8, name: impl Into<String>, slot: &str, inputs: Vec<FieldDescriptor>) -> Self {
        Self::build(id, name, FunctionKind::Setter { slot: slot.to_owned() }).with_inputs(inputs)
    }

    pub fn enable(id: u8, name: impl Into<String>, slot: &str) -> Self {
        Self::build(id, name, FunctionKind::Enable { slot: slot.to_owned() })
    }

    pub fn disable(id: u8, name: impl Into<String>, slot: &str) -> Self {
        Self::build(id, name, FunctionKind::Disable { slot: slot.to_owned() })
    }

    pub fn period_setter(id: u8, name: impl Into<String>, cadence: &str) -> Self {
        Self::build(
            id,
            name,
            FunctionKind::CallbackPeriodSetter {
                cadence: cadence.to_owned(),
            },
        )
        .with_inputs(vec![period_field()])
    }

    pub fn period_getter(id: u8, name: impl Into<String>, cadence: &str) -> Self {
        Self::build(
            id,
            name,
            FunctionKind::CallbackPeriodGetter {
                cadence: cadence.to_owned(),
            },
        )
        .with_outputs(vec![period_field()])
    }

    /// The reserved `get_identity` function.
    pub fn identity() -> Self {
        Self::build(FUNCTION_GET_IDENTITY, "get_identity", FunctionKind::Identity)
            .with_outputs(Identity::fields().to_vec())
    }

    /// Function the device knows about but does not emulate.
    pub fn not_implemented(id: u8, name: impl Into<String>) -> Self {
        Self::build(id, name, FunctionKind::NotImplemented)
    }

    pub fn with_inputs(mut self, inputs: Vec<FieldDescriptor>) -> Self {
        self.inputs = inputs
            .into_iter()
            .map(|field| field.with_role(FieldRole::In))
            .collect();
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<FieldDescriptor>) -> Self {
        self.outputs = outputs
            .into_iter()
            .map(|field| field.with_role(FieldRole::Out))
            .collect();
        self
    }
}

/// An unsolicited message reporting one or more slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackDescriptor {
    pub id: u8,
    pub name: String,
    /// Slots whose values, concatenated, form the callback payload.
    pub reports: Vec<String>,
    /// Period slot arming the callback timer; event driven callbacks have none.
    #[serde(default)]
    pub cadence: Option<String>,
    pub outputs: Vec<FieldDescriptor>,
}

impl CallbackDescriptor {
    /// Periodic callback reporting `slot`, paced by `cadence`.
    pub fn periodic(
        id: u8,
        name: impl Into<String>,
        slot: &str,
        cadence: &str,
        outputs: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            reports: vec![slot.to_owned()],
            cadence: Some(cadence.to_owned()),
            outputs,
        }
    }

    /// Callback without a period of its own.
    pub fn event(id: u8, name: impl Into<String>, reports: &[&str], outputs: Vec<FieldDescriptor>) -> Self {
        Self {
            id,
            name: name.into(),
            reports: reports.iter().map(|slot| (*slot).to_owned()).collect(),
            cadence: None,
            outputs,
        }
    }
}

/// Declarative description of one device type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceType {
    /// Catalog key, e.g. `distance_ir`.
    pub key: String,
    pub display_name: String,
    pub device_identifier: u16,
    pub hardware_version: [u8; 3],
    pub firmware_version: [u8; 3],
    pub slots: Vec<SlotDescriptor>,
    pub functions: Vec<FunctionDescriptor>,
    #[serde(default)]
    pub callbacks: Vec<CallbackDescriptor>,
}

/// A field driven by a ramp generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampSpec {
    pub slot: usize,
    pub field: usize,
    pub element: ElementType,
    pub bounds: RampBounds,
}

/// Callback with its slot references resolved to indices.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCallback {
    pub id: u8,
    pub reports: Vec<usize>,
    pub cadence: Option<usize>,
}

/// Validated device type with its dispatch table; shared read-only by all
/// instances of the type.
#[derive(Debug)]
pub struct DeviceProfile {
    device: DeviceType,
    slot_index: IndexMap<String, usize>,
    table: DispatchTable,
    callbacks: Vec<CompiledCallback>,
    ramps: Vec<RampSpec>,
}

impl DeviceProfile {
    /// Validate `device` and build its dispatch table.
    pub fn compile(device: DeviceType) -> Result<Self, ModelError> {
        let slot_index = index_slots(&device)?;
        for slot in &device.slots {
            check_default(&device.key, slot)?;
        }
        let ramps = collect_ramps(&device)?;
        let table = DispatchTable::build(&device, &slot_index)?;
        let callbacks = compile_callbacks(&device, &slot_index)?;
        Ok(Self {
            device,
            slot_index,
            table,
            callbacks,
            ramps,
        })
    }

    pub fn device(&self) -> &DeviceType {
        &self.device
    }

    pub fn key(&self) -> &str {
        &self.device.key
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn slots(&self) -> &[SlotDescriptor] {
        &self.device.slots
    }

    pub fn slot(&self, index: usize) -> &SlotDescriptor {
        &self.device.slots[index]
    }

    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slot_index.get(name).copied()
    }

    pub fn function(&self, index: usize) -> &FunctionDescriptor {
        &self.device.functions[index]
    }

    pub fn callbacks(&self) -> &[CompiledCallback] {
        &self.callbacks
    }

    pub fn callback_descriptor(&self, index: usize) -> &CallbackDescriptor {
        &self.device.callbacks[index]
    }

    /// Indices of the callbacks paced by `cadence`.
    pub fn callbacks_for_cadence(&self, cadence: usize) -> impl Iterator<Item = usize> + '_ {
        self.callbacks
            .iter()
            .enumerate()
            .filter(move |(_, callback)| callback.cadence == Some(cadence))
            .map(|(index, _)| index)
    }

    pub fn ramps(&self) -> &[RampSpec] {
        &self.ramps
    }
}

pub(crate) fn period_field() -> FieldDescriptor {
    FieldDescriptor::scalar("period", ElementType::UInt32)
}

fn is_period_field(field: &FieldDescriptor) -> bool {
    field.element == ElementType::UInt32 && field.cardinality == 1
}

/// Human readable layout, e.g. `char, uint16, uint8[3]`.
pub(crate) fn layout(fields: &[FieldDescriptor]) -> String {
    fields
        .iter()
        .map(|field| {
            if field.cardinality == 1 {
                field.element.to_string()
            } else {
                format!("{}[{}]", field.element, field.cardinality)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether two field lists marshal identically.
pub(crate) fn same_layout(a: &[FieldDescriptor], b: &[FieldDescriptor]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.element == y.element && x.cardinality == y.cardinality)
}

pub(crate) fn require_layout(
    device: &str,
    item: &str,
    expected: &[FieldDescriptor],
    found: &[FieldDescriptor],
) -> Result<(), ModelError> {
    if same_layout(expected, found) {
        return Ok(());
    }
    Err(ModelError::LayoutMismatch {
        device: device.to_owned(),
        item: item.to_owned(),
        expected: layout(expected),
        found: layout(found),
    })
}

pub(crate) fn require_cadence(
    device: &DeviceType,
    slot_index: &IndexMap<String, usize>,
    item: &str,
    cadence: &str,
) -> Result<usize, ModelError> {
    let index = resolve_slot(&device.key, slot_index, item, cadence)?;
    if !device.slots[index].is_cadence() {
        return Err(ModelError::NotACadence {
            device: device.key.clone(),
            item: item.to_owned(),
            slot: cadence.to_owned(),
        });
    }
    Ok(index)
}

pub(crate) fn resolve_slot(
    device: &str,
    slot_index: &IndexMap<String, usize>,
    item: &str,
    slot: &str,
) -> Result<usize, ModelError> {
    slot_index
        .get(slot)
        .copied()
        .ok_or_else(|| ModelError::UnknownSlot {
            device: device.to_owned(),
            item: item.to_owned(),
            slot: slot.to_owned(),
        })
}

fn index_slots(device: &DeviceType) -> Result<IndexMap<String, usize>, ModelError> {
    let mut index = IndexMap::with_capacity(device.slots.len());
    for (position, slot) in device.slots.iter().enumerate() {
        if index.insert(slot.name.clone(), position).is_some() {
            return Err(ModelError::DuplicateSlot {
                device: device.key.clone(),
                slot: slot.name.clone(),
            });
        }
    }
    Ok(index)
}

fn check_default(device: &str, slot: &SlotDescriptor) -> Result<(), ModelError> {
    let invalid = |reason: String| ModelError::InvalidDefault {
        device: device.to_owned(),
        slot: slot.name.clone(),
        reason,
    };
    if slot.fields.is_empty() {
        return Err(invalid("slot has no fields".to_owned()));
    }
    let DefaultPolicy::Fixed(values) = &slot.default else {
        return Ok(());
    };
    if values.len() != slot.fields.len() {
        return Err(invalid(format!(
            "{} values for {} fields",
            values.len(),
            slot.fields.len()
        )));
    }
    let mut scratch = BytesMut::new();
    for (field, value) in slot.fields.iter().zip(values) {
        field
            .encode(value, &mut scratch)
            .map_err(|err| invalid(format!("{}: {err}", field.name)))?;
    }
    Ok(())
}

fn collect_ramps(device: &DeviceType) -> Result<Vec<RampSpec>, ModelError> {
    let mut ramps = Vec::new();
    for (slot_index, slot) in device.slots.iter().enumerate() {
        for (field_index, field) in slot.fields.iter().enumerate() {
            let Some(bounds) = field.bounds else {
                continue;
            };
            let numeric = field.cardinality == 1
                && (field.element.integer_bounds().is_some() || field.element == ElementType::Float);
            let usable = bounds.min.is_finite()
                && bounds.max.is_finite()
                && bounds.step.is_finite()
                && bounds.min <= bounds.max;
            if !numeric || !usable {
                return Err(ModelError::InvalidBounds {
                    device: device.key.clone(),
                    slot: slot.name.clone(),
                    field: field.name.clone(),
                });
            }
            if bounds.step == 0.0 {
                continue;
            }
            ramps.push(RampSpec {
                slot: slot_index,
                field: field_index,
                element: field.element,
                bounds,
            });
        }
    }
    Ok(ramps)
}

fn compile_callbacks(
    device: &DeviceType,
    slot_index: &IndexMap<String, usize>,
) -> Result<Vec<CompiledCallback>, ModelError> {
    let function_ids: HashSet<u8> = device.functions.iter().map(|f| f.id).collect();
    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(device.callbacks.len());
    for callback in &device.callbacks {
        if callback.id == CALLBACK_ENUMERATE
            || callback.id == FUNCTION_ENUMERATE
            || callback.id == FUNCTION_GET_IDENTITY
        {
            return Err(ModelError::ReservedId {
                device: device.key.clone(),
                item: callback.name.clone(),
                id: callback.id,
            });
        }
        if function_ids.contains(&callback.id) || !seen.insert(callback.id) {
            return Err(ModelError::DuplicateId {
                device: device.key.clone(),
                id: callback.id,
            });
        }
        let mut reports = Vec::with_capacity(callback.reports.len());
        let mut reported_fields = Vec::new();
        for slot in &callback.reports {
            let index = resolve_slot(&device.key, slot_index, &callback.name, slot)?;
            reported_fields.extend(device.slots[index].fields.iter().cloned());
            reports.push(index);
        }
        require_layout(&device.key, &callback.name, &reported_fields, &callback.outputs)?;
        let cadence = callback
            .cadence
            .as_deref()
            .map(|cadence| require_cadence(device, slot_index, &callback.name, cadence))
            .transpose()?;
        compiled.push(CompiledCallback {
            id: callback.id,
            reports,
            cadence,
        });
    }
    Ok(compiled)
}
