pub(crate) use std::rc::Rc;

pub(crate) use eavom::{
    AdapterState, AttrValue, Attribute, Datatype, EavConfig, EavEntity, EavError, EavResult, EavStore, EntityManager,
    EntityRef, EnumChoice, EnumGroup, EnumValue, Instance, MemStore, Registry,
};

#[derive(Debug, Clone, EavEntity)]
pub(crate) struct Patient {
    pub(crate) id: Option<String>,
    pub(crate) name: String,
}

impl Patient {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }

    pub(crate) fn stored(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: String::new(),
        }
    }
}

#[derive(Debug, Clone, EavEntity)]
#[eav(entity_type = "encounter")]
pub(crate) struct Encounter {
    #[eav(id)]
    pub(crate) pk: u64,
}

pub(crate) const PATIENT_VALUES: &str = "patient_values";

pub(crate) fn mem_store() -> Rc<dyn EavStore> {
    Rc::new(MemStore::new())
}

pub(crate) fn patient_registry(config: EavConfig) -> Registry {
    let mut registry = Registry::new();
    registry.register_type::<Patient>(eavom::DEFAULT_ATTRIBUTE_NAMESPACE, PATIENT_VALUES, config);
    registry
}

pub(crate) fn attribute(store: &Rc<dyn EavStore>, name: &str, datatype: Datatype) -> Attribute {
    Attribute::create(store.as_ref(), Attribute::new(name, datatype)).expect("create attribute")
}

/// Stand-in for the host's own persistence: assigns the primary key.
pub(crate) fn persist_as(id: &str) -> impl FnOnce(&mut Patient) -> EavResult<()> + '_ {
    move |patient| {
        patient.id = Some(id.to_string());
        Ok(())
    }
}

pub(crate) struct Choices {
    pub(crate) group: EnumGroup,
    pub(crate) yes: EnumValue,
    pub(crate) no: EnumValue,
    pub(crate) unknown: EnumValue,
}

pub(crate) fn yes_no_unknown(store: &Rc<dyn EavStore>) -> Choices {
    let store = store.as_ref();
    let mut group = EnumGroup::new("Yes / No / Unknown");
    group.save(store).expect("group");
    let add = |value: &str| {
        let mut choice = EnumValue::new(value);
        group.add(store, &mut choice).expect("choice");
        choice
    };
    let yes = add("yes");
    let no = add("no");
    let unknown = add("unknown");
    Choices { group, yes, no, unknown }
}

pub(crate) fn int(value: Option<AttrValue>) -> Option<i64> {
    value.and_then(|value| value.as_int())
}
