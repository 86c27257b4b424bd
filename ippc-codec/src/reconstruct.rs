//! Three-phase instance reconstruction
//!
//! An instance payload decodes to either a singleton name or a
//! reconstruction tuple `(class, args, state?, extend?, update?)`. The
//! tuple is applied as: construct, then restore state, then extend, then
//! update, in that order. A unit in an optional slot skips its phase;
//! any failure discards the half-built object.

use crate::registry;
use ippc_core::{Instance, PackError, PackResult, Phase, Transmissible, Value};

/// Turn a decoded reduction value into a live instance value.
pub(crate) fn rebuild(reduction: Value) -> PackResult<Value> {
    match reduction {
        Value::Text(name) => rebuild_singleton(&name),
        Value::Tuple(items) => rebuild_instance(items),
        other => Err(PackError::BadReconstruction(format!(
            "reduction must be text or a tuple, not '{}'",
            other.kind_name()
        ))),
    }
}

fn rebuild_singleton(name: &str) -> PackResult<Value> {
    let identity = registry::name_identity(name)?;
    match registry::lookup(&identity) {
        Some(entry) => Ok(entry.to_value()),
        None => Err(PackError::UnknownIdentity(format!("'{}'", name))),
    }
}

fn rebuild_instance(items: Vec<Value>) -> PackResult<Value> {
    if !(2..=5).contains(&items.len()) {
        return Err(PackError::BadReconstruction(format!(
            "expected a tuple of 2 to 5 items, got {}",
            items.len()
        )));
    }
    let mut slots = items.into_iter();
    let (Some(callable), Some(args)) = (slots.next(), slots.next()) else {
        return Err(PackError::BadReconstruction(
            "expected a tuple of 2 to 5 items".to_string(),
        ));
    };
    let class = match callable {
        Value::Class(class) => class,
        other => {
            return Err(PackError::BadReconstruction(format!(
                "argument 1 must be a callable class, not '{}'",
                other.kind_name()
            )));
        }
    };
    let args = match args {
        Value::Tuple(args) => args,
        other => {
            return Err(PackError::BadReconstruction(format!(
                "argument 2 must be a tuple, not '{}'",
                other.kind_name()
            )));
        }
    };
    let state = slots.next().unwrap_or(Value::Unit);
    let extend = slots.next().unwrap_or(Value::Unit);
    let update = slots.next().unwrap_or(Value::Unit);

    let mut obj = class.construct(&args)?;
    if !state.is_unit() {
        apply_state(obj.as_mut(), &state)?;
    }
    if !extend.is_unit() {
        apply_extend(obj.as_mut(), &extend)?;
    }
    if !update.is_unit() {
        apply_update(obj.as_mut(), &update)?;
    }
    Ok(Value::Instance(Instance::from_boxed(obj)))
}

fn apply_state(obj: &mut dyn Transmissible, state: &Value) -> PackResult<()> {
    if obj.set_state(state)? == Phase::Applied {
        return Ok(());
    }
    let type_name = obj.type_name();
    match (state, obj.attrs_mut()) {
        (Value::Map(entries), Some(attrs)) => {
            for (key, value) in entries.iter() {
                if !matches!(key, Value::Text(_)) {
                    return Err(PackError::State(format!(
                        "expected state key to be text, not '{}'",
                        key.kind_name()
                    )));
                }
                attrs.insert(key.clone(), value.clone());
            }
            Ok(())
        }
        _ => Err(PackError::State(format!(
            "cannot restore state of '{}' objects",
            type_name
        ))),
    }
}

fn apply_extend(obj: &mut dyn Transmissible, tail: &Value) -> PackResult<()> {
    if obj.extend(tail)? == Phase::Applied {
        return Ok(());
    }
    Err(PackError::State(format!(
        "cannot extend '{}' objects",
        obj.type_name()
    )))
}

fn apply_update(obj: &mut dyn Transmissible, items: &Value) -> PackResult<()> {
    if obj.update(items)? == Phase::Applied {
        return Ok(());
    }
    for (key, value) in item_pairs(items)? {
        if obj.set_item(key, value)? != Phase::Applied {
            return Err(PackError::State(format!(
                "cannot update '{}' objects",
                obj.type_name()
            )));
        }
    }
    Ok(())
}

/// View an update payload as `(key, value)` pairs: a mapping's entries,
/// or any sequence of 2-element sequences.
fn item_pairs(items: &Value) -> PackResult<Vec<(&Value, &Value)>> {
    match items {
        Value::Map(map) => Ok(map.iter().map(|(k, v)| (k, v)).collect()),
        Value::Tuple(seq) | Value::List(seq) => seq.iter().map(pair_of).collect(),
        Value::Set(set) | Value::FrozenSet(set) => set.iter().map(pair_of).collect(),
        other => Err(PackError::State(format!(
            "'{}' object is not iterable",
            other.kind_name()
        ))),
    }
}

fn pair_of(item: &Value) -> PackResult<(&Value, &Value)> {
    match item {
        Value::Tuple(pair) | Value::List(pair) if pair.len() == 2 => Ok((&pair[0], &pair[1])),
        _ => Err(PackError::State("expected a sequence of len 2".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ippc_core::{ClassSpec, Map, Reduction, SingletonSpec};
    use std::sync::Mutex;

    static PHASES: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    // Serializes the tests that inspect PHASES.
    static SERIAL: Mutex<()> = Mutex::new(());

    struct Tracker;

    impl Transmissible for Tracker {
        fn type_name(&self) -> &'static str {
            "Tracker"
        }

        fn reduce(&self) -> Option<Reduction> {
            None
        }

        fn set_state(&mut self, _state: &Value) -> PackResult<Phase> {
            PHASES.lock().unwrap().push("set_state");
            Ok(Phase::Applied)
        }

        fn extend(&mut self, _tail: &Value) -> PackResult<Phase> {
            PHASES.lock().unwrap().push("extend");
            Ok(Phase::Applied)
        }

        fn update(&mut self, _items: &Value) -> PackResult<Phase> {
            PHASES.lock().unwrap().push("update");
            Ok(Phase::Applied)
        }
    }

    fn make_tracker(_args: &[Value]) -> PackResult<Box<dyn Transmissible>> {
        PHASES.lock().unwrap().push("new");
        Ok(Box::new(Tracker))
    }

    /// A bare object exposing only an attribute map.
    struct Bag {
        attrs: Map,
    }

    impl Transmissible for Bag {
        fn type_name(&self) -> &'static str {
            "Bag"
        }

        fn reduce(&self) -> Option<Reduction> {
            None
        }

        fn attrs_mut(&mut self) -> Option<&mut Map> {
            Some(&mut self.attrs)
        }
    }

    /// A keyed store exposing only per-item assignment.
    struct Store {
        items: Vec<(Value, Value)>,
    }

    impl Transmissible for Store {
        fn type_name(&self) -> &'static str {
            "Store"
        }

        fn reduce(&self) -> Option<Reduction> {
            None
        }

        fn set_item(&mut self, key: &Value, value: &Value) -> PackResult<Phase> {
            self.items.push((key.clone(), value.clone()));
            Ok(Phase::Applied)
        }
    }

    fn tracker_class() -> std::sync::Arc<ClassSpec> {
        ClassSpec::new("reconstruct.tests", "Tracker", make_tracker)
    }

    #[test]
    fn test_phases_run_in_order() {
        let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        PHASES.lock().unwrap().clear();
        let reduction = Value::Tuple(vec![
            Value::Class(tracker_class()),
            Value::Tuple(vec![]),
            Value::Int(1),
            Value::List(vec![Value::Int(2)]),
            Value::Map([(Value::Text("k".into()), Value::Int(3))].into_iter().collect()),
        ]);
        let rebuilt = rebuild(reduction).unwrap();
        assert!(matches!(rebuilt, Value::Instance(_)));
        assert_eq!(
            *PHASES.lock().unwrap(),
            ["new", "set_state", "extend", "update"]
        );
    }

    #[test]
    fn test_unit_slots_skip_phases() {
        let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        PHASES.lock().unwrap().clear();
        let reduction = Value::Tuple(vec![
            Value::Class(tracker_class()),
            Value::Tuple(vec![]),
            Value::Unit,
            Value::Unit,
            Value::Map(Map::new()),
        ]);
        rebuild(reduction).unwrap();
        assert_eq!(*PHASES.lock().unwrap(), ["new", "update"]);
    }

    #[test]
    fn test_arity_out_of_range() {
        let short = Value::Tuple(vec![Value::Class(tracker_class())]);
        assert!(matches!(
            rebuild(short),
            Err(PackError::BadReconstruction(_))
        ));

        let long = Value::Tuple(vec![Value::Unit; 6]);
        assert!(matches!(rebuild(long), Err(PackError::BadReconstruction(_))));
    }

    #[test]
    fn test_callable_must_be_class() {
        let reduction = Value::Tuple(vec![Value::Int(1), Value::Tuple(vec![])]);
        match rebuild(reduction) {
            Err(PackError::BadReconstruction(msg)) => {
                assert_eq!(msg, "argument 1 must be a callable class, not 'int'");
            }
            other => panic!("expected reconstruction error, got {:?}", other),
        }
    }

    #[test]
    fn test_args_must_be_tuple() {
        let reduction = Value::Tuple(vec![
            Value::Class(tracker_class()),
            Value::List(vec![]),
        ]);
        match rebuild(reduction) {
            Err(PackError::BadReconstruction(msg)) => {
                assert_eq!(msg, "argument 2 must be a tuple, not 'list'");
            }
            other => panic!("expected reconstruction error, got {:?}", other),
        }
    }

    #[test]
    fn test_state_fallback_fills_attrs() {
        let mut bag = Bag { attrs: Map::new() };
        let state = Value::Map(
            [(Value::Text("x".into()), Value::Int(10))]
                .into_iter()
                .collect(),
        );
        apply_state(&mut bag, &state).unwrap();
        assert_eq!(bag.attrs.get(&Value::Text("x".into())), Some(&Value::Int(10)));
    }

    #[test]
    fn test_state_fallback_rejects_non_text_keys() {
        let mut bag = Bag { attrs: Map::new() };
        let state = Value::Map([(Value::Int(1), Value::Int(2))].into_iter().collect());
        match apply_state(&mut bag, &state) {
            Err(PackError::State(msg)) => {
                assert_eq!(msg, "expected state key to be text, not 'int'");
            }
            other => panic!("expected state error, got {:?}", other),
        }
    }

    #[test]
    fn test_state_without_hooks_fails() {
        let mut store = Store { items: Vec::new() };
        let state = Value::Int(1);
        match apply_state(&mut store, &state) {
            Err(PackError::State(msg)) => {
                assert_eq!(msg, "cannot restore state of 'Store' objects");
            }
            other => panic!("expected state error, got {:?}", other),
        }
    }

    #[test]
    fn test_extend_without_support_fails() {
        let mut bag = Bag { attrs: Map::new() };
        match apply_extend(&mut bag, &Value::List(vec![])) {
            Err(PackError::State(msg)) => assert_eq!(msg, "cannot extend 'Bag' objects"),
            other => panic!("expected state error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_fallback_assigns_pairs() {
        let mut store = Store { items: Vec::new() };
        let items = Value::List(vec![
            Value::Tuple(vec![Value::Text("a".into()), Value::Int(1)]),
            Value::Tuple(vec![Value::Text("b".into()), Value::Int(2)]),
        ]);
        apply_update(&mut store, &items).unwrap();
        assert_eq!(store.items.len(), 2);
        assert_eq!(store.items[1].0, Value::Text("b".into()));
    }

    #[test]
    fn test_update_fallback_accepts_map_entries() {
        let mut store = Store { items: Vec::new() };
        let items = Value::Map(
            [(Value::Text("k".into()), Value::Int(9))]
                .into_iter()
                .collect(),
        );
        apply_update(&mut store, &items).unwrap();
        assert_eq!(store.items, [(Value::Text("k".into()), Value::Int(9))]);
    }

    #[test]
    fn test_update_fallback_rejects_bad_pairs() {
        let mut store = Store { items: Vec::new() };
        let items = Value::List(vec![Value::Int(3)]);
        match apply_update(&mut store, &items) {
            Err(PackError::State(msg)) => assert_eq!(msg, "expected a sequence of len 2"),
            other => panic!("expected state error, got {:?}", other),
        }
    }

    #[test]
    fn test_singleton_name_resolves_through_registry() {
        registry::register(SingletonSpec::new("ReconMark")).unwrap();
        match rebuild(Value::Text("ReconMark".into())).unwrap() {
            Value::Singleton(s) => assert_eq!(s.name(), "ReconMark"),
            other => panic!("expected singleton, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_singleton_name_fails() {
        match rebuild(Value::Text("NoSuchMark".into())) {
            Err(PackError::UnknownIdentity(who)) => assert_eq!(who, "'NoSuchMark'"),
            other => panic!("expected unknown identity, got {:?}", other),
        }
    }

    #[test]
    fn test_reduction_must_be_text_or_tuple() {
        match rebuild(Value::Int(5)) {
            Err(PackError::BadReconstruction(msg)) => {
                assert_eq!(msg, "reduction must be text or a tuple, not 'int'");
            }
            other => panic!("expected reconstruction error, got {:?}", other),
        }
    }
}
