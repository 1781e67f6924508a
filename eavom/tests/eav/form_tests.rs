use eavom::{DynamicEntityForm, FieldKind, FieldOverrides, FormData};

use super::support::*;

fn setup(store: &Rc<dyn EavStore>) -> Choices {
    let choices = yes_no_unknown(store);
    Attribute::create(
        store.as_ref(),
        Attribute::new("Fever", Datatype::Enum)
            .with_enum_group(choices.group.require_id().expect("group"))
            .required(true)
            .with_description("Temperature above 38C"),
    )
    .expect("fever");
    attribute(store, "Age", Datatype::Int);
    attribute(store, "Last visit", Datatype::Date);
    attribute(store, "Smoker", Datatype::Bool);
    attribute(store, "Doctor", Datatype::Object);
    choices
}

#[test]
fn fields_follow_attribute_definitions() {
    let store = mem_store();
    let choices = setup(&store);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store);
    let mut patient = manager.init(Patient::new("Jane")).expect("init");

    let form = DynamicEntityForm::unbound(&mut patient).expect("form");
    assert!(!form.is_bound());
    assert!(!form.is_valid());

    let names: Vec<&str> = form.fields().iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, vec!["age", "fever", "last_visit", "smoker"]);

    let fever = form.field("fever").expect("fever field");
    assert_eq!(fever.label, "Fever");
    assert_eq!(fever.kind, FieldKind::MultipleChoice);
    assert!(fever.required);
    assert_eq!(fever.help_text.as_deref(), Some("Temperature above 38C"));
    assert!(fever.validators.is_empty());
    let labels: Vec<&str> = fever.choices.iter().map(|(_, label)| label.as_str()).collect();
    assert_eq!(labels, vec!["yes", "no", "unknown"]);
    assert_eq!(fever.choices[0].0, choices.yes.reference().expect("saved"));

    let visit = form.field("last_visit").expect("date field");
    assert_eq!(visit.label, "Last visit");
    assert_eq!(visit.kind, FieldKind::SplitDateTime);
    assert_eq!(form.field("smoker").map(|field| field.kind), Some(FieldKind::NullBoolean));
    assert_eq!(form.field("age").map(|field| field.kind), Some(FieldKind::Integer));
}

#[test]
fn required_enum_must_be_selected() {
    let store = mem_store();
    setup(&store);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store);
    let mut patient = manager.init(Patient::new("Jane")).expect("init");

    let data: FormData = [("age", "12")].into_iter().collect();
    let form = DynamicEntityForm::new(&mut patient, data).expect("form");
    assert!(!form.is_valid());
    assert_eq!(form.errors().get("fever"), Some(&vec!["This field is required.".to_string()]));
    assert!(form.cleaned_data().is_none());

    let err = form.save(&manager, persist_as("p1")).expect_err("invalid form");
    assert!(matches!(err, EavError::State { .. }));
}

#[test]
fn valid_submission_saves_through_the_manager() {
    let store = mem_store();
    let choices = setup(&store);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());
    let mut patient = manager.init(Patient::new("Jane")).expect("init");

    let yes = choices.yes.reference().expect("saved").to_string();
    let no = choices.no.reference().expect("saved").to_string();
    let mut data = FormData::new();
    data.set("fever", [yes, no])
        .insert("age", "12")
        .insert("last_visit_0", "2012-01-01")
        .insert("last_visit_1", "12:00")
        .insert("smoker", "unknown");

    let form = DynamicEntityForm::new(&mut patient, data).expect("form");
    assert!(form.is_valid(), "errors: {:?}", form.errors());
    let cleaned = form.cleaned_data().expect("cleaned");
    assert_eq!(cleaned.get("smoker"), Some(&None));
    form.save(&manager, persist_as("p1")).expect("save");

    let reloaded = manager.init(Patient::stored("p1")).expect("reload");
    let adapter = reloaded.eav().expect("adapter");
    assert_eq!(int(adapter.get("age").expect("age")), Some(12));
    assert_eq!(
        adapter
            .get("fever")
            .expect("fever")
            .and_then(|value| value.as_enum())
            .map(|ids| ids.len()),
        Some(2)
    );
    assert_eq!(
        adapter
            .get("last_visit")
            .expect("visit")
            .and_then(|value| value.as_date())
            .map(|date| date.to_rfc3339()),
        Some("2012-01-01T12:00:00+00:00".to_string())
    );
    assert!(!adapter.contains("smoker").expect("smoker"));
}

#[test]
fn bad_input_is_reported_per_field() {
    let store = mem_store();
    let choices = setup(&store);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store);
    let mut patient = manager.init(Patient::new("Jane")).expect("init");

    let data: FormData = [
        ("fever", "999"),
        ("age", "twelve"),
        ("last_visit_0", "2012-01-01"),
        ("smoker", "maybe"),
    ]
    .into_iter()
    .collect();
    let form = DynamicEntityForm::new(&mut patient, data).expect("form");
    let errors = form.errors();
    assert_eq!(errors.len(), 4);
    assert!(errors["fever"][0].contains("999 is not one of the available choices"));
    assert_eq!(errors["age"], vec!["Enter a whole number.".to_string()]);
    assert_eq!(errors["last_visit"], vec!["Enter a valid time.".to_string()]);
    assert!(errors["smoker"][0].contains("maybe"));
    assert!(choices.yes.reference().is_ok());
}

#[test]
fn unbound_forms_show_stored_values_and_overrides_apply() {
    let store = mem_store();
    setup(&store);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store);

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    patient.eav_mut().expect("adapter").set("age", 40).expect("stage");
    let err = manager.save(&mut patient, persist_as("p1")).expect_err("fever is required");
    assert!(err.validation_issues().is_some());

    let mut overrides = FieldOverrides::new();
    overrides.insert(Datatype::Int, FieldKind::Text);
    let form = DynamicEntityForm::build(&mut patient, None, &overrides).expect("form");
    let age = form.field("age").expect("age");
    assert_eq!(age.kind, FieldKind::Text);
    assert_eq!(age.initial.as_ref().and_then(AttrValue::as_int), Some(40));
}
