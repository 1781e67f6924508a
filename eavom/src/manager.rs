use std::rc::Rc;

use crate::{
    entity::Instance,
    errors::EavResult,
    registry::Registry,
    signals::{Signal, SignalContext},
    store::EavStore,
    types::EavEntity,
};

/// Host-side lifecycle driver.
///
/// The host keeps persisting its own entities; the manager wraps construction
/// and save so the registry's hooks run around them:
/// `PreSave` -> host persist -> `PostSave`.
pub struct EntityManager<'r> {
    registry: &'r Registry,
    store: Rc<dyn EavStore>,
}

impl<'r> EntityManager<'r> {
    pub fn new(registry: &'r Registry, store: Rc<dyn EavStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn store(&self) -> &dyn EavStore {
        self.store.as_ref()
    }

    /// Wraps `model` and sends `PostInit`, which attaches the adapter for registered types.
    pub fn init<T: EavEntity>(&self, model: T) -> EavResult<Instance<T>> {
        let mut instance = Instance::new(model);
        self.send(Signal::PostInit, &mut instance)?;
        Ok(instance)
    }

    /// Validates, lets `persist` store the entity, then flushes EAV values.
    ///
    /// A validation failure aborts before `persist` runs.
    pub fn save<T, F>(&self, instance: &mut Instance<T>, persist: F) -> EavResult<()>
    where
        T: EavEntity,
        F: FnOnce(&mut T) -> EavResult<()>,
    {
        self.send(Signal::PreSave, instance)?;
        persist(instance.model_mut())?;
        self.send(Signal::PostSave, instance)
    }

    /// `init` followed by `save`.
    pub fn create<T, F>(&self, model: T, persist: F) -> EavResult<Instance<T>>
    where
        T: EavEntity,
        F: FnOnce(&mut T) -> EavResult<()>,
    {
        let mut instance = self.init(model)?;
        self.save(&mut instance, persist)?;
        Ok(instance)
    }

    fn send<T: EavEntity>(&self, signal: Signal, instance: &mut Instance<T>) -> EavResult<()> {
        let (model, adapter) = instance.parts_mut();
        let mut context = SignalContext {
            signal,
            entity_type: T::ENTITY_TYPE,
            entity_id: model.entity_id(),
            store: &self.store,
            adapter,
        };
        self.registry.signals().send(&mut context)
    }
}
