use super::support::*;

#[derive(EavEntity)]
struct LabResult {
    id: String,
}

#[test]
fn entity_type_defaults_to_snake_case() {
    assert_eq!(Patient::ENTITY_TYPE, "patient");
    assert_eq!(LabResult::ENTITY_TYPE, "lab_result");
    assert_eq!(Encounter::ENTITY_TYPE, "encounter");
}

#[test]
fn entity_ids_come_from_the_id_field() {
    assert_eq!(Patient::new("Jane").entity_id(), None);
    assert_eq!(Patient::stored("p1").entity_id().as_deref(), Some("p1"));
    assert_eq!(Encounter { pk: 7 }.entity_id().as_deref(), Some("7"));
    assert_eq!(LabResult { id: String::new() }.entity_id(), None);
    assert_eq!(
        LabResult { id: "lr-1".into() }.entity_ref(),
        Some(EntityRef::new("lab_result", "lr-1"))
    );
}

#[test]
fn derived_entities_register_like_hand_written_ones() {
    let store = mem_store();
    attribute(&store, "Value", Datatype::Float);
    let mut registry = Registry::new();
    assert!(registry.register_type::<LabResult>("attributes", "lab_values", EavConfig::default()));

    let manager = EntityManager::new(&registry, store.clone());
    let mut result = manager
        .init(LabResult { id: String::new() })
        .expect("init");
    result.eav_mut().expect("adapter").set("value", 4.2).expect("stage");
    manager
        .save(&mut result, |lab| {
            lab.id = "lr-1".into();
            Ok(())
        })
        .expect("save");
    assert_eq!(store.count_values("lab_values").expect("count"), 1);
    let instance: Instance<LabResult> = result;
    assert_eq!(instance.into_inner().id, "lr-1");
}
