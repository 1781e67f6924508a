use std::collections::BTreeSet;

use eavom::SchemaError;

use super::support::*;

fn fever(store: &Rc<dyn EavStore>, choices: &Choices) -> Attribute {
    Attribute::create(
        store.as_ref(),
        Attribute::new("Fever", Datatype::Enum).with_enum_group(choices.group.require_id().expect("group id")),
    )
    .expect("fever")
}

fn ids(values: &[&EnumValue]) -> BTreeSet<eavom::EnumValueId> {
    values.iter().map(|value| value.reference().expect("saved")).collect()
}

#[test]
fn fever_accepts_members_of_its_group_only() {
    let store = mem_store();
    let choices = yes_no_unknown(&store);
    fever(&store, &choices);

    let mut colors = EnumGroup::new("Colors");
    colors.save(store.as_ref()).expect("colors");
    let mut red = EnumValue::new("red");
    colors.add(store.as_ref(), &mut red).expect("red");

    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    patient
        .eav_mut()
        .expect("adapter")
        .set("fever", red.reference().expect("saved"))
        .expect("stage");
    let err = manager.save(&mut patient, persist_as("p1")).expect_err("red is not a fever choice");
    let issues = err.validation_issues().expect("validation error");
    assert_eq!(issues[0].code, "validation.choice");
    assert!(issues[0].message.starts_with("red is not a valid choice"));

    patient
        .eav_mut()
        .expect("adapter")
        .set("fever", choices.yes.to_attr_value().expect("saved"))
        .expect("stage");
    manager.save(&mut patient, persist_as("p1")).expect("save");

    let reloaded = manager.init(Patient::stored("p1")).expect("reload");
    let stored = reloaded.eav().expect("adapter").get("fever").expect("get").expect("set");
    assert_eq!(stored.as_enum(), Some(ids(&[&choices.yes])));
}

#[test]
fn multiple_choices_replace_previous_links() {
    let store = mem_store();
    let choices = yes_no_unknown(&store);
    let fever = fever(&store, &choices);

    let both: EnumChoice = [&choices.yes, &choices.no]
        .iter()
        .map(|value| value.reference().expect("saved"))
        .collect();
    assert!(fever.save_value(store.as_ref(), PATIENT_VALUES, "p1", Some(both.into())).expect("save"));

    let row = store
        .value_row(PATIENT_VALUES, "p1", fever.id.expect("saved"))
        .expect("row")
        .expect("exists");
    assert_eq!(row.value_enum, ids(&[&choices.yes, &choices.no]));

    assert!(
        fever
            .save_value(store.as_ref(), PATIENT_VALUES, "p1", Some(choices.unknown.to_attr_value().expect("ref")))
            .expect("replace")
    );
    let row = store
        .value_row(PATIENT_VALUES, "p1", fever.id.expect("saved"))
        .expect("row")
        .expect("exists");
    assert_eq!(row.value_enum, ids(&[&choices.unknown]));
}

#[test]
fn single_and_set_forms_of_the_same_choice_are_unchanged() {
    let store = mem_store();
    let choices = yes_no_unknown(&store);
    let fever = fever(&store, &choices);
    let yes = choices.yes.reference().expect("saved");

    assert!(fever.save_value(store.as_ref(), PATIENT_VALUES, "p1", Some(yes.into())).expect("first"));
    let as_set: EnumChoice = [yes].into_iter().collect();
    assert!(!fever.save_value(store.as_ref(), PATIENT_VALUES, "p1", Some(as_set.into())).expect("second"));
}

#[test]
fn enum_attributes_need_an_existing_group() {
    let store = mem_store();
    let err = Attribute::create(store.as_ref(), Attribute::new("Fever", Datatype::Enum)).expect_err("missing group");
    assert!(matches!(err, EavError::Schema(SchemaError::MissingEnumGroup { .. })));

    let choices = yes_no_unknown(&store);
    let err = Attribute::create(
        store.as_ref(),
        Attribute::new("Age", Datatype::Int).with_enum_group(choices.group.require_id().expect("id")),
    )
    .expect_err("group on int");
    assert!(matches!(err, EavError::Schema(SchemaError::UnexpectedEnumGroup { .. })));
}

#[test]
fn choices_list_the_group_members() {
    let store = mem_store();
    let choices = yes_no_unknown(&store);
    let fever = fever(&store, &choices);

    let listed: Vec<String> = fever
        .get_choices(store.as_ref())
        .expect("choices")
        .expect("enum attribute")
        .into_iter()
        .map(|choice| choice.value)
        .collect();
    assert_eq!(listed, vec!["yes", "no", "unknown"]);

    let age = attribute(&store, "Age", Datatype::Int);
    assert!(age.get_choices(store.as_ref()).expect("choices").is_none());
}

#[test]
fn enum_value_names_are_unique_across_groups() {
    let store = mem_store();
    let choices = yes_no_unknown(&store);
    let mut other = EnumGroup::new("Other");
    other.save(store.as_ref()).expect("other");
    let err = other
        .add(store.as_ref(), &mut EnumValue::new("yes"))
        .expect_err("duplicate value");
    assert!(matches!(err, EavError::Schema(SchemaError::DuplicateEnumValue { .. })));
    assert_eq!(choices.group.members(store.as_ref()).expect("members").len(), 3);
}
