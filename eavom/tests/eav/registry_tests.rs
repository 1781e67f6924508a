use eavom::{EavSettings, Relation, Signal};

use super::support::*;

#[test]
fn registration_uses_default_names() {
    let registry = patient_registry(EavConfig::default());
    let binding = registry.binding("patient").expect("registered");
    assert_eq!(binding.config.eav_attr, "eav");
    assert_eq!(binding.config.eav_relation_attr, "eav_values");
    assert_eq!(binding.attribute_relation_name(), PATIENT_VALUES);
    assert_eq!(
        registry.relation("patient", "eav_values"),
        Some(&Relation::EntityValues {
            value_type: PATIENT_VALUES.into(),
            attribute_type: "attributes".into(),
        })
    );
}

#[test]
fn configuration_overrides_names() {
    let store = mem_store();
    let registry = patient_registry(
        EavConfig::new()
            .eav_attr("attrs")
            .eav_relation_attr("facts")
            .attribute_relation_attr("patient_facts"),
    );
    assert!(registry.relation("patient", "facts").is_some());
    assert!(registry.relation("attributes", "patient_facts").is_some());
    assert!(registry.relation("patient", "eav_values").is_none());

    let manager = EntityManager::new(&registry, store);
    let patient = manager.init(Patient::new("Jane")).expect("init");
    assert!(patient.adapter("attrs").is_some());
    assert!(patient.adapter("eav").is_none());
}

#[test]
fn settings_from_toml_build_a_config() {
    let settings = EavSettings::from_toml_str("eav_attr = \"attrs\"\nsite = \"clinic-a\"\n").expect("settings");
    let config = EavConfig::from(settings);
    assert_eq!(config.eav_attr, "attrs");
    assert_eq!(config.site.as_deref(), Some("clinic-a"));
    assert!(EavSettings::from_toml_str("unknown = 1").is_err());
}

#[test]
fn double_registration_keeps_the_first_binding() {
    let mut registry = patient_registry(EavConfig::default());
    assert!(!registry.register_type::<Patient>("other_attributes", "other_values", EavConfig::default()));
    assert_eq!(registry.require_binding("patient").expect("bound").value_type, PATIENT_VALUES);
    assert_eq!(registry.signals().receiver_count(Signal::PreSave, "patient"), 1);
}

#[test]
fn unregister_then_register_again() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    let mut registry = patient_registry(EavConfig::default());
    assert!(registry.unregister("patient"));
    assert!(!registry.unregister("patient"));
    assert!(registry.bindings().is_empty());

    assert!(registry.register_type::<Patient>("attributes", PATIENT_VALUES, EavConfig::default()));
    let manager = EntityManager::new(&registry, store);
    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    patient.eav_mut().expect("adapter").set("age", 3).expect("stage");
    manager.save(&mut patient, persist_as("p1")).expect("save");
}

#[test]
fn custom_selector_limits_attributes() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    attribute(&store, "Height", Datatype::Float);
    let registry = patient_registry(EavConfig::new().get_attributes(|store, scope| {
        Ok(Attribute::get_for_model(store, &scope.namespace, &scope.entity_type)?
            .into_iter()
            .filter(|attribute| attribute.slug == "age")
            .collect())
    }));
    assert!(registry.binding("patient").expect("bound").config.has_custom_selector());

    let manager = EntityManager::new(&registry, store.clone());
    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    let adapter = patient.eav_mut().expect("adapter");
    assert_eq!(adapter.get_all_attribute_slugs().expect("slugs"), vec!["age"]);
    assert!(matches!(adapter.set("height", 1.8), Err(EavError::UnknownAttribute { .. })));

    let slugs: Vec<String> = registry
        .get_attributes(store.as_ref(), "patient", None)
        .expect("attributes")
        .into_iter()
        .map(|attribute| attribute.slug)
        .collect();
    assert_eq!(slugs, vec!["age"]);
}

#[test]
fn site_and_parent_restrict_applicable_attributes() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    Attribute::create(store.as_ref(), Attribute::new("Ward", Datatype::Text).on_site("clinic-a")).expect("ward");
    Attribute::create(store.as_ref(), Attribute::new("Bed", Datatype::Text).on_site("clinic-b")).expect("bed");
    Attribute::create(store.as_ref(), Attribute::new("Reason", Datatype::Text).for_parent("encounter"))
        .expect("reason");

    let registry = patient_registry(EavConfig::new().site("clinic-a"));
    let slugs: Vec<String> = registry
        .get_attributes(store.as_ref(), "patient", None)
        .expect("attributes")
        .into_iter()
        .map(|attribute| attribute.slug)
        .collect();
    assert_eq!(slugs, vec!["age", "ward"]);

    let unscoped = patient_registry(EavConfig::default());
    assert_eq!(
        unscoped
            .get_attributes(store.as_ref(), "patient", None)
            .expect("attributes")
            .len(),
        3
    );
}

#[test]
fn manager_only_bindings_resolve_relations_without_hooks() {
    let store = mem_store();
    let reason = Attribute::create(
        store.as_ref(),
        Attribute::new("Reason", Datatype::Text).in_namespace("encounter_attributes"),
    )
    .expect("reason");

    let mut registry = Registry::new();
    registry.register_type::<Encounter>(
        "encounter_attributes",
        "encounter_values",
        EavConfig::new().manager_only(true),
    );
    let manager = EntityManager::new(&registry, store.clone());
    let encounter = manager.init(Encounter { pk: 7 }).expect("init");
    assert!(!encounter.has_adapter());

    reason
        .save_value(store.as_ref(), "encounter_values", "7", Some("checkup".into()))
        .expect("save");

    let by_entity = registry
        .resolve_relation(store.as_ref(), "encounter", "eav_values", "7")
        .expect("entity relation");
    assert_eq!(by_entity.len(), 1);
    assert_eq!(by_entity[0].value().and_then(AttrValue::as_text), Some("checkup"));

    let by_attribute = registry
        .resolve_relation(
            store.as_ref(),
            "encounter_attributes",
            "encounter_values",
            &reason.id.expect("saved").to_string(),
        )
        .expect("attribute relation");
    assert_eq!(by_attribute.len(), 1);
    assert_eq!(by_attribute[0].entity_id, "7");

    assert!(matches!(
        registry.resolve_relation(store.as_ref(), "encounter", "missing", "7"),
        Err(EavError::NotFound { .. })
    ));
}

#[test]
fn shared_attribute_types_keep_the_first_relation() {
    let mut registry = patient_registry(EavConfig::new().attribute_relation_attr("values"));
    registry.register_type::<Encounter>("attributes", "encounter_values", EavConfig::new().attribute_relation_attr("values"));
    assert_eq!(
        registry.relation("attributes", "values"),
        Some(&Relation::AttributeValues {
            value_type: PATIENT_VALUES.into(),
            attribute_type: "attributes".into(),
        })
    );

    registry.unregister_type::<Encounter>();
    assert!(registry.relation("attributes", "values").is_some());
    registry.unregister_type::<Patient>();
    assert!(registry.relation("attributes", "values").is_none());
}
