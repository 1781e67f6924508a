use chrono::{NaiveDate, TimeZone, Utc};
use eavom::validators::ValueRule;

use super::support::*;

fn first_code(attribute: &Attribute, store: &Rc<dyn EavStore>, value: AttrValue) -> Option<String> {
    match attribute.validate_value(store.as_ref(), &value) {
        Ok(()) => None,
        Err(err) => err
            .validation_issues()
            .and_then(|issues| issues.first())
            .map(|issue| issue.code.clone()),
    }
}

#[test]
fn text_accepts_only_text() {
    let store = mem_store();
    let nickname = attribute(&store, "Nickname", Datatype::Text);
    assert_eq!(first_code(&nickname, &store, "Jen".into()), None);
    assert_eq!(first_code(&nickname, &store, 5.into()), Some("validation.text".into()));
}

#[test]
fn numbers_accept_numeric_text_and_widening() {
    let store = mem_store();
    let height = attribute(&store, "Height", Datatype::Float);
    let age = attribute(&store, "Age", Datatype::Int);

    assert_eq!(first_code(&height, &store, 1.5.into()), None);
    assert_eq!(first_code(&height, &store, 2.into()), None);
    assert_eq!(first_code(&height, &store, " 1.75 ".into()), None);
    assert_eq!(first_code(&height, &store, "tall".into()), Some("validation.float".into()));
    assert_eq!(first_code(&height, &store, true.into()), Some("validation.float".into()));

    assert_eq!(first_code(&age, &store, "42".into()), None);
    assert_eq!(first_code(&age, &store, 3.0.into()), None);
    assert_eq!(first_code(&age, &store, 3.5.into()), Some("validation.int".into()));

    age.save_value(store.as_ref(), PATIENT_VALUES, "p1", Some("42".into()))
        .expect("save numeric text");
    let row = store
        .value_row(PATIENT_VALUES, "p1", age.id.expect("saved"))
        .expect("row")
        .expect("exists");
    assert_eq!(row.value_int, Some(42));
    assert_eq!(row.value_text, None);
}

#[test]
fn dates_accept_dates_and_datetimes() {
    let store = mem_store();
    let visit = attribute(&store, "Last visit", Datatype::Date);
    let day = NaiveDate::from_ymd_opt(2012, 1, 1).expect("date");
    assert_eq!(first_code(&visit, &store, day.into()), None);
    assert_eq!(
        first_code(&visit, &store, Utc.with_ymd_and_hms(2012, 1, 1, 9, 30, 0).unwrap().into()),
        None
    );
    assert_eq!(first_code(&visit, &store, "2012-01-01".into()), Some("validation.date".into()));

    visit
        .save_value(store.as_ref(), PATIENT_VALUES, "p1", Some(day.into()))
        .expect("save");
    let row = store
        .value_row(PATIENT_VALUES, "p1", visit.id.expect("saved"))
        .expect("row")
        .expect("exists");
    assert_eq!(row.value_date.map(|date| date.to_rfc3339()), Some("2012-01-01T00:00:00+00:00".into()));
}

#[test]
fn booleans_reject_truthy_text() {
    let store = mem_store();
    let smoker = attribute(&store, "Smoker", Datatype::Bool);
    assert_eq!(first_code(&smoker, &store, false.into()), None);
    assert_eq!(first_code(&smoker, &store, "yes".into()), Some("validation.bool".into()));
    assert_eq!(first_code(&smoker, &store, 1.into()), Some("validation.bool".into()));
}

#[test]
fn objects_must_reference_saved_entities() {
    let store = mem_store();
    let doctor = attribute(&store, "Doctor", Datatype::Object);
    assert_eq!(first_code(&doctor, &store, EntityRef::new("doctor", "d1").into()), None);
    assert_eq!(
        first_code(&doctor, &store, EntityRef::new("doctor", "").into()),
        Some("validation.object".into())
    );
    assert_eq!(first_code(&doctor, &store, "d1".into()), Some("validation.object".into()));

    doctor
        .save_value(store.as_ref(), PATIENT_VALUES, "p1", Some(EntityRef::new("doctor", "d1").into()))
        .expect("save");
    let row = store
        .value_row(PATIENT_VALUES, "p1", doctor.id.expect("saved"))
        .expect("row")
        .expect("exists");
    assert_eq!(row.value_object, Some(EntityRef::new("doctor", "d1")));
}

#[test]
fn rules_run_after_the_datatype_validator() {
    let store = mem_store();
    let age = Attribute::create(
        store.as_ref(),
        Attribute::new("Age", Datatype::Int).with_rule(ValueRule::Range {
            min: Some(0.0),
            max: Some(150.0),
        }),
    )
    .expect("age");
    let email = Attribute::create(store.as_ref(), Attribute::new("Email", Datatype::Text).with_rule(ValueRule::Email))
        .expect("email");

    assert_eq!(age.get_validators().len(), 2);
    assert_eq!(first_code(&age, &store, 40.into()), None);
    assert_eq!(first_code(&age, &store, 200.into()), Some("validation.range".into()));
    assert_eq!(first_code(&email, &store, "jane@example.com".into()), None);
    assert_eq!(first_code(&email, &store, "jane".into()), Some("validation.email".into()));
}

#[test]
fn adapter_validation_aggregates_issues_per_slug() {
    let store = mem_store();
    attribute(&store, "Age", Datatype::Int);
    attribute(&store, "Smoker", Datatype::Bool);
    attribute(&store, "Nickname", Datatype::Text);
    let registry = patient_registry(EavConfig::default());
    let manager = EntityManager::new(&registry, store.clone());

    let mut patient = manager.init(Patient::new("Jane")).expect("init");
    let adapter = patient.eav_mut().expect("adapter");
    adapter.set("age", "old").expect("stage");
    adapter.set("smoker", "sometimes").expect("stage");
    adapter.set("nickname", "JJ").expect("stage");

    let err = adapter.validate_attributes().expect_err("two bad values");
    let EavError::Validation(validation) = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(validation.issues.len(), 2);
    assert_eq!(validation.for_field("age").count(), 1);
    assert_eq!(validation.for_field("smoker").count(), 1);
    assert_eq!(validation.for_field("nickname").count(), 0);
    assert!(err.to_string().contains("age EAV field"));
}
