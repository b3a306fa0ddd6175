//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Function id to handler lookup, built once per device type.
use std::collections::HashMap;

use bytes::Bytes;
use indexmap::IndexMap;
use tf_emu_protocol::{
    ElementType, Header, Identity, CALLBACK_ENUMERATE, FUNCTION_ENUMERATE, FUNCTION_GET_IDENTITY,
};
use tracing::debug;

use crate::error::{DispatchError, ModelError};
use crate::marshal;
use crate::model::{
    period_field, require_cadence, require_layout, resolve_slot, DeviceProfile, DeviceType,
    FunctionKind,
};
use crate::state::DeviceState;

/// Resolved behaviour of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    Getter { slots: Vec<usize> },
    Setter { slot: usize },
    Enable { slot: usize },
    Disable { slot: usize },
    PeriodSetter { cadence: usize },
    PeriodGetter { cadence: usize },
    Identity,
    NotImplemented,
}

/// Table entry: the function descriptor index and its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub function: usize,
    pub handler: Handler,
}

/// What the runtime has to do after a handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a response carrying this payload; empty for acknowledgements.
    Respond(Bytes),
    /// Nothing to send.
    Silent,
    /// A cadence slot changed; its callbacks must be restarted or stopped.
    Reschedule {
        cadence: usize,
        period: u32,
        ack: bool,
    },
}

#[derive(Debug, Default)]
pub struct DispatchTable {
    routes: HashMap<u8, Route>,
}

impl DispatchTable {
    /// Build the table for `device`, validating every function against the
    /// slots it refers to.
    pub(crate) fn build(
        device: &DeviceType,
        slot_index: &IndexMap<String, usize>,
    ) -> Result<Self, ModelError> {
        let mut routes = HashMap::with_capacity(device.functions.len());
        for (position, function) in device.functions.iter().enumerate() {
            let reserved = function.id == CALLBACK_ENUMERATE
                || function.id == FUNCTION_ENUMERATE
                || (function.id == FUNCTION_GET_IDENTITY) != (function.kind == FunctionKind::Identity);
            if reserved {
                return Err(ModelError::ReservedId {
                    device: device.key.clone(),
                    item: function.name.clone(),
                    id: function.id,
                });
            }
            let item = function.name.as_str();
            let slot = |name: &str| resolve_slot(&device.key, slot_index, item, name);
            let handler = match &function.kind {
                FunctionKind::Getter { slots: names } => {
                    let mut slots = Vec::with_capacity(names.len());
                    let mut fields = Vec::new();
                    for name in names {
                        let index = slot(name)?;
                        fields.extend(device.slots[index].fields.iter().cloned());
                        slots.push(index);
                    }
                    require_layout(&device.key, item, &fields, &function.outputs)?;
                    Handler::Getter { slots }
                }
                FunctionKind::Setter { slot: name } => {
                    let index = slot(name)?;
                    require_layout(&device.key, item, &device.slots[index].fields, &function.inputs)?;
                    Handler::Setter { slot: index }
                }
                FunctionKind::Enable { slot: name } | FunctionKind::Disable { slot: name } => {
                    let index = slot(name)?;
                    let flag = matches!(
                        device.slots[index].fields.as_slice(),
                        [field] if field.cardinality == 1
                            && (field.element == ElementType::Bool
                                || field.element.integer_bounds().is_some())
                    );
                    if !flag || !function.inputs.is_empty() {
                        return Err(ModelError::NotAFlag {
                            device: device.key.clone(),
                            item: item.to_owned(),
                            slot: name.clone(),
                        });
                    }
                    if matches!(function.kind, FunctionKind::Enable { .. }) {
                        Handler::Enable { slot: index }
                    } else {
                        Handler::Disable { slot: index }
                    }
                }
                FunctionKind::CallbackPeriodSetter { cadence } => {
                    require_layout(&device.key, item, &[period_field()], &function.inputs)?;
                    Handler::PeriodSetter {
                        cadence: require_cadence(device, slot_index, item, cadence)?,
                    }
                }
                FunctionKind::CallbackPeriodGetter { cadence } => {
                    require_layout(&device.key, item, &[period_field()], &function.outputs)?;
                    Handler::PeriodGetter {
                        cadence: require_cadence(device, slot_index, item, cadence)?,
                    }
                }
                FunctionKind::Identity => {
                    require_layout(&device.key, item, Identity::fields(), &function.outputs)?;
                    Handler::Identity
                }
                FunctionKind::NotImplemented => Handler::NotImplemented,
            };
            let route = Route {
                function: position,
                handler,
            };
            if routes.insert(function.id, route).is_some() {
                return Err(ModelError::DuplicateId {
                    device: device.key.clone(),
                    id: function.id,
                });
            }
        }
        Ok(Self { routes })
    }

    pub fn route(&self, function_id: u8) -> Option<&Route> {
        self.routes.get(&function_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Function ids in ascending order.
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.routes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Run the handler for `header.function_id` against `state`.
pub fn invoke(
    profile: &DeviceProfile,
    state: &mut DeviceState,
    header: &Header,
    payload: &[u8],
) -> Result<Effect, DispatchError> {
    let function_id = header.function_id;
    let Some(route) = profile.table().route(function_id) else {
        return Err(DispatchError::UnknownFunction { function_id });
    };
    let function = profile.function(route.function);
    let response_expected = header.response_expected();
    let ack = || {
        if response_expected {
            Effect::Respond(Bytes::new())
        } else {
            Effect::Silent
        }
    };
    debug!(uid = %state.uid(), function_id, function = %function.name, response_expected, "invoking function");

    match &route.handler {
        Handler::Getter { slots } => {
            if !response_expected {
                return Ok(Effect::Silent);
            }
            let bytes = marshal::encode_values(&function.outputs, &state.reported(slots))?;
            Ok(Effect::Respond(bytes))
        }
        &Handler::Setter { slot } => match marshal::decode_values(&function.inputs, payload) {
            Ok(values) => {
                state.store(slot, values);
                Ok(ack())
            }
            Err(err) if !response_expected => {
                debug!(uid = %state.uid(), function_id, error = %err, "dropping undecodable fire-and-forget setter");
                Ok(Effect::Silent)
            }
            Err(err) => Err(err.into()),
        },
        &Handler::Enable { slot } | &Handler::Disable { slot } => {
            let raw = if matches!(route.handler, Handler::Enable { .. }) {
                1.0
            } else {
                0.0
            };
            let field = &profile.slot(slot).fields[0];
            let value = field.element.value_from_f64(raw)?;
            state.store(slot, vec![value]);
            Ok(ack())
        }
        &Handler::PeriodSetter { cadence } => {
            let values = marshal::decode_values(&function.inputs, payload)?;
            let period = values
                .first()
                .and_then(|value| value.as_f64())
                .map(|raw| raw as u32)
                .unwrap_or_default();
            state.set_period(cadence, period);
            Ok(Effect::Reschedule {
                cadence,
                period,
                ack: response_expected,
            })
        }
        &Handler::PeriodGetter { cadence } => {
            if !response_expected {
                return Ok(Effect::Silent);
            }
            let bytes = marshal::encode_values(&function.outputs, state.slot(cadence))?;
            Ok(Effect::Respond(bytes))
        }
        Handler::Identity => {
            if !response_expected {
                return Ok(Effect::Silent);
            }
            Ok(Effect::Respond(state.identity().encode()?))
        }
        Handler::NotImplemented => Err(DispatchError::NotImplemented {
            function_id,
            name: function.name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionDescriptor, SlotDescriptor};
    use tf_emu_protocol::{FieldDescriptor, Value};
    use tf_emu_sim::DefaultValues;

    fn device() -> DeviceType {
        DeviceType {
            key: "flagged".into(),
            display_name: "Flagged".into(),
            device_identifier: 99,
            hardware_version: [1, 0, 0],
            firmware_version: [2, 0, 0],
            slots: vec![
                SlotDescriptor::scalar("enabled", ElementType::Bool).with_default(vec![Value::Bool(false)]),
                SlotDescriptor::scalar("level", ElementType::UInt8).with_default(vec![Value::UInt(7)]),
                SlotDescriptor::cadence("level_period"),
            ],
            functions: vec![
                FunctionDescriptor::enable(1, "enable", "enabled"),
                FunctionDescriptor::disable(2, "disable", "enabled"),
                FunctionDescriptor::getter(
                    3,
                    "is_enabled",
                    "enabled",
                    vec![FieldDescriptor::scalar("enabled", ElementType::Bool)],
                ),
                FunctionDescriptor::setter(
                    4,
                    "set_level",
                    "level",
                    vec![FieldDescriptor::scalar("level", ElementType::UInt8)],
                ),
                FunctionDescriptor::period_setter(5, "set_level_callback_period", "level_period"),
                FunctionDescriptor::period_getter(6, "get_level_callback_period", "level_period"),
                FunctionDescriptor::not_implemented(7, "reset"),
                FunctionDescriptor::identity(),
            ],
            callbacks: Vec::new(),
        }
    }

    fn setup() -> (DeviceProfile, DeviceState) {
        let profile = DeviceProfile::compile(device()).expect("valid device");
        let mut defaults = DefaultValues::seeded(1, 1);
        let state = DeviceState::new(&profile, Identity::new("abc", 99), &mut defaults);
        (profile, state)
    }

    fn request(function_id: u8, response_expected: bool) -> Header {
        Header::new(1, function_id, 1, response_expected)
    }

    #[test]
    fn every_function_is_routed_exactly_once() {
        let (profile, _) = setup();
        assert_eq!(profile.table().ids(), vec![1, 2, 3, 4, 5, 6, 7, 255]);
        let mut device = device();
        device.functions.push(FunctionDescriptor::not_implemented(4, "shadow"));
        assert!(matches!(
            DeviceProfile::compile(device),
            Err(ModelError::DuplicateId { id: 4, .. })
        ));
    }

    #[test]
    fn identity_only_lives_at_its_reserved_id() {
        let mut device = device();
        device.functions.push(FunctionDescriptor::getter(
            255,
            "not_identity",
            "level",
            vec![FieldDescriptor::scalar("level", ElementType::UInt8)],
        ));
        assert!(matches!(
            DeviceProfile::compile(device),
            Err(ModelError::ReservedId { id: 255, .. })
        ));
    }

    #[test]
    fn flags_flip_and_read_back() {
        let (profile, mut state) = setup();
        let effect = invoke(&profile, &mut state, &request(1, false), &[]).unwrap();
        assert_eq!(effect, Effect::Silent);
        let effect = invoke(&profile, &mut state, &request(3, true), &[]).unwrap();
        assert_eq!(effect, Effect::Respond(Bytes::from_static(&[1])));
        let effect = invoke(&profile, &mut state, &request(2, true), &[]).unwrap();
        assert_eq!(effect, Effect::Respond(Bytes::new()));
        assert_eq!(state.slot(0), &[Value::Bool(false)]);
    }

    #[test]
    fn getters_without_response_expected_stay_silent() {
        let (profile, mut state) = setup();
        let effect = invoke(&profile, &mut state, &request(3, false), &[]).unwrap();
        assert_eq!(effect, Effect::Silent);
    }

    #[test]
    fn setters_store_even_without_acknowledgement() {
        let (profile, mut state) = setup();
        assert_eq!(
            invoke(&profile, &mut state, &request(4, false), &[42]).unwrap(),
            Effect::Silent
        );
        assert_eq!(state.slot(1), &[Value::UInt(42)]);
        assert_eq!(
            invoke(&profile, &mut state, &request(4, false), &[]).unwrap(),
            Effect::Silent
        );
        assert!(matches!(
            invoke(&profile, &mut state, &request(4, true), &[]),
            Err(DispatchError::Protocol(_))
        ));
    }

    #[test]
    fn period_setter_requests_a_reschedule() {
        let (profile, mut state) = setup();
        let effect = invoke(&profile, &mut state, &request(5, true), &[0x64, 0, 0, 0]).unwrap();
        assert_eq!(
            effect,
            Effect::Reschedule {
                cadence: 2,
                period: 100,
                ack: true
            }
        );
        let effect = invoke(&profile, &mut state, &request(6, true), &[]).unwrap();
        assert_eq!(effect, Effect::Respond(Bytes::from_static(&[0x64, 0, 0, 0])));
    }

    #[test]
    fn unknown_and_stubbed_functions_are_errors() {
        let (profile, mut state) = setup();
        assert_eq!(
            invoke(&profile, &mut state, &request(42, true), &[]),
            Err(DispatchError::UnknownFunction { function_id: 42 })
        );
        assert!(matches!(
            invoke(&profile, &mut state, &request(7, true), &[]),
            Err(DispatchError::NotImplemented { function_id: 7, .. })
        ));
    }

    #[test]
    fn identity_answers_regardless_of_state() {
        let (profile, mut state) = setup();
        let Effect::Respond(bytes) = invoke(&profile, &mut state, &request(255, true), &[]).unwrap()
        else {
            panic!("identity must respond");
        };
        let identity = Identity::decode(&bytes).unwrap();
        assert_eq!(identity.uid, "abc");
        assert_eq!(identity.device_identifier, 99);
    }

    #[test]
    fn identity_without_response_expected_stays_silent() {
        let (profile, mut state) = setup();
        let effect = invoke(&profile, &mut state, &request(255, false), &[]).unwrap();
        assert_eq!(effect, Effect::Silent);
    }
}
