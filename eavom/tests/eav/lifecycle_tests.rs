use eavom::validators::ValueRule;

use super::support::*;

#[test]
fn patient_age_round_trips_and_survives_bad_input() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    patient.eav_mut().expect("adapter").set("age", 15).expect("stage age");
    manager.save(&mut patient, persist_as("p1")).expect("save");

    let reloaded = manager.init(Patient::stored("p1")).expect("reload");
    assert_eq!(int(reloaded.eav().expect("adapter").get("age").expect("get")), Some(15));

    let mut patient = manager.init(Patient::stored("p1")).expect("reload");
    patient.eav_mut().expect("adapter").set("age", "bad").expect("stage bad age");
    let mut persisted = false;
    let err = manager
        .save(&mut patient, |_| {
            persisted = true;
            Ok(())
        })
        .expect_err("bad age rejected");
    let issues = err.validation_issues().expect("validation error");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "age");
    assert_eq!(issues[0].code, "validation.int");
    assert!(!persisted, "host save must not run after failed validation");

    let reloaded = manager.init(Patient::stored("p1")).expect("reload");
    assert_eq!(int(reloaded.eav().expect("adapter").get("age").expect("get")), Some(15));
}

#[test]
fn numeric_strings_are_range_checked_before_the_host_saves() {
    let store = mem_store();
    Attribute::create(
        store.as_ref(),
        Attribute::new("Age", Datatype::Int).with_rule(ValueRule::Range {
            min: Some(0.0),
            max: Some(150.0),
        }),
    )
    .expect("create attribute");
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    patient.eav_mut().expect("adapter").set("age", "200").expect("stage age");
    let mut persisted = false;
    let err = manager
        .save(&mut patient, |patient| {
            persisted = true;
            patient.id = Some("p1".into());
            Ok(())
        })
        .expect_err("age above range");
    let issues = err.validation_issues().expect("validation error");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "age");
    assert_eq!(issues[0].code, "validation.range");
    assert!(!persisted, "host save must not run after failed validation");
    assert_eq!(store.count_values(PATIENT_VALUES).expect("count"), 0);

    patient.eav_mut().expect("adapter").set("age", "42").expect("stage age");
    manager.save(&mut patient, persist_as("p1")).expect("save");
    let reloaded = manager.init(Patient::stored("p1")).expect("reload");
    assert_eq!(int(reloaded.eav().expect("adapter").get("age").expect("get")), Some(42));
}

#[test]
fn adapter_moves_through_its_states() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    assert_eq!(patient.eav().expect("adapter").state(), AdapterState::Unbound);

    patient.eav_mut().expect("adapter").set("age", "old").expect("stage");
    assert_eq!(patient.eav().expect("adapter").state(), AdapterState::Dirty);
    assert!(manager.save(&mut patient, persist_as("p1")).is_err());
    assert_eq!(patient.eav().expect("adapter").state(), AdapterState::Dirty);

    patient.eav_mut().expect("adapter").set("age", 40).expect("stage");
    manager.save(&mut patient, persist_as("p1")).expect("save");
    let adapter = patient.eav().expect("adapter");
    assert_eq!(adapter.state(), AdapterState::Persisted);
    assert!(adapter.staged().is_empty());
    assert_eq!(adapter.entity_id(), Some("p1"));
}

#[test]
fn unknown_and_unset_attributes_are_distinct() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store);

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    let adapter = patient.eav_mut().expect("adapter");

    assert!(matches!(adapter.get("height"), Err(EavError::UnknownAttribute { .. })));
    assert!(matches!(adapter.set("height", 1.8), Err(EavError::UnknownAttribute { .. })));
    assert!(matches!(adapter.require("age"), Err(EavError::Unset { .. })));
    assert_eq!(adapter.get("age").expect("known"), None);
    assert!(!adapter.contains("age").expect("contains"));
    assert!(!adapter.contains("height").expect("contains unknown"));

    adapter.set("age", 3).expect("stage");
    assert!(adapter.contains("age").expect("contains"));
}

#[test]
fn unset_deletes_the_stored_value() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.create(Patient::new("Jane"), persist_as("p1")).expect("create");
    patient.eav_mut().expect("adapter").set("age", 30).expect("stage");
    manager.save(&mut patient, |_| Ok(())).expect("save");
    assert_eq!(store.count_values(PATIENT_VALUES).expect("count"), 1);

    patient.eav_mut().expect("adapter").unset("age").expect("unset");
    manager.save(&mut patient, |_| Ok(())).expect("save");
    assert_eq!(store.count_values(PATIENT_VALUES).expect("count"), 0);
    assert!(!patient.eav().expect("adapter").contains("age").expect("contains"));
}

#[test]
fn required_attributes_must_hold_a_value() {
    let store = mem_store();
    Attribute::create(store.as_ref(), Attribute::new("Weight", Datatype::Float).required(true)).expect("weight");
    attribute(&store, "Age", Datatype::Int);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    patient.eav_mut().expect("adapter").set("age", "x").expect("stage");
    let err = manager.save(&mut patient, persist_as("p1")).expect_err("invalid");
    let issues = err.validation_issues().expect("validation error");
    let mut codes: Vec<(&str, &str)> = issues
        .iter()
        .map(|issue| (issue.field.as_str(), issue.code.as_str()))
        .collect();
    codes.sort();
    assert_eq!(codes, vec![("age", "validation.int"), ("weight", "validation.required")]);

    patient.eav_mut().expect("adapter").set("age", 3).expect("stage");
    patient.eav_mut().expect("adapter").set("weight", 61.5).expect("stage");
    manager.save(&mut patient, persist_as("p1")).expect("save");
}

#[test]
fn values_are_flushed_only_after_the_host_assigns_an_id() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    patient.eav_mut().expect("adapter").set("age", 3).expect("stage");
    let err = manager.save(&mut patient, |_| Ok(())).expect_err("no id");
    assert!(matches!(err, EavError::State { .. }));
    assert_eq!(store.count_values(PATIENT_VALUES).expect("count"), 0);
}

#[test]
fn iteration_yields_persisted_values_only() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    attribute(&store, "Nickname", Datatype::Text);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.create(Patient::new("Jane"), persist_as("p1")).expect("create");
    let adapter = patient.eav_mut().expect("adapter");
    adapter.set("age", 3).expect("stage");
    assert!(adapter.values().expect("values").is_empty());

    manager.save(&mut patient, |_| Ok(())).expect("save");
    let patient = manager.init(Patient::stored("p1")).expect("reload");
    let adapter = patient.eav().expect("adapter");
    let values = adapter.values().expect("values");
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].attribute.slug, "age");

    let current = adapter.get_attributes_and_values().expect("map");
    assert_eq!(current.len(), 1);
    assert_eq!(current.get("age").and_then(AttrValue::as_int), Some(3));
}

#[test]
fn saving_an_unchanged_value_writes_nothing() {
    let store = mem_store();
    let age = attribute(&store, "Age", Datatype::Int);

    assert!(age.save_value(store.as_ref(), PATIENT_VALUES, "p1", Some(7.into())).expect("first"));
    let first = store
        .value_row(PATIENT_VALUES, "p1", age.id.expect("saved"))
        .expect("row")
        .expect("exists");

    assert!(!age.save_value(store.as_ref(), PATIENT_VALUES, "p1", Some("7".into())).expect("second"));
    let second = store
        .value_row(PATIENT_VALUES, "p1", age.id.expect("saved"))
        .expect("row")
        .expect("exists");
    assert_eq!(first.id, second.id);
    assert_eq!(store.count_values(PATIENT_VALUES).expect("count"), 1);
}

#[test]
fn instances_of_unregistered_types_have_no_adapter() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    let mut registry = patient_registry(EavConfig::default());
    {
        let manager = EntityManager::new(&registry, store.clone());
        let patient = manager.init(Patient::new("Jane")).expect("init");
        assert!(patient.has_adapter());
    }

    assert!(registry.unregister_type::<Patient>());
    let manager = EntityManager::new(&registry, store);
    let mut patient = manager.init(Patient::new("John")).expect("init");
    assert!(!patient.has_adapter());
    assert!(matches!(patient.eav_mut(), Err(EavError::NotRegistered { .. })));
    manager.save(&mut patient, persist_as("p2")).expect("host save still works");
    assert_eq!(patient.name, "John");
}
