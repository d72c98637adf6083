//! Schema registry and late-bound references
//!
//! A [`Registry`] is built once from a [`RegistryBuilder`] and is read-only
//! afterwards. While it is being built, every model, serializer and
//! dispatcher it holds is handed a `Weak<Registry>`. Lazy references inside
//! them (related serializers named by string, record types named by string)
//! resolve through that handle on first use and memoize the result.
//!
//! A resolved target is held strongly, so a serializer taken out of the
//! registry keeps working after the registry is dropped. The one exception
//! is a reference naming its own owner, which is held as a `Weak` pointer:
//! a serializer that refers to itself must not keep itself alive.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::errors::{SchemaError, SchemaResult};
use crate::model::Model;
use crate::serializer::{Dispatcher, Serializable, Serializer};
use crate::value::EnumDef;

/// Lookup of a registered target by name
pub trait Lookup<T: ?Sized> {
    fn lookup(&self, name: &str) -> Option<Arc<T>>;
}

/// Registry handle plus the name of the schema holding the reference
#[derive(Clone)]
struct Binding {
    registry: Weak<Registry>,
    owner: String,
}

enum Target<T: ?Sized> {
    Shared(Arc<T>),
    /// The owner itself
    Owner(Weak<T>),
}

impl<T: ?Sized> Target<T> {
    fn upgrade(&self) -> Option<Arc<T>> {
        match self {
            Target::Shared(target) => Some(Arc::clone(target)),
            Target::Owner(target) => target.upgrade(),
        }
    }
}

impl<T: ?Sized> Clone for Target<T> {
    fn clone(&self) -> Self {
        match self {
            Target::Shared(target) => Target::Shared(Arc::clone(target)),
            Target::Owner(target) => Target::Owner(Weak::clone(target)),
        }
    }
}

/// A reference to a registered schema, resolved by name on first use.
pub struct LazyRef<T: ?Sized> {
    name: String,
    binding: OnceLock<Binding>,
    resolved: OnceLock<Option<Target<T>>>,
}

impl<T: ?Sized> LazyRef<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: OnceLock::new(),
            resolved: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attaches the registry this reference resolves through, and the name
    /// of the schema that holds it.
    ///
    /// Only the first binding takes effect.
    pub(crate) fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        let _ = self.binding.set(Binding {
            registry: registry.clone(),
            owner: owner.to_string(),
        });
    }

    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    fn unresolved(&self) -> SchemaError {
        SchemaError::ForwardReferenceUnresolved(self.name.clone())
    }
}

impl<T: ?Sized> LazyRef<T>
where
    Registry: Lookup<T>,
{
    /// Resolves the reference, looking it up at most once.
    pub fn resolve(&self) -> SchemaResult<Arc<T>> {
        let resolved = match self.resolved.get() {
            Some(resolved) => resolved,
            None => {
                let binding = self.binding.get().ok_or_else(|| self.unresolved())?;
                let registry = binding
                    .registry
                    .upgrade()
                    .ok_or_else(|| self.unresolved())?;
                self.resolved.get_or_init(|| {
                    <Registry as Lookup<T>>::lookup(&registry, &self.name).map(|target| {
                        if binding.owner == self.name {
                            Target::Owner(Arc::downgrade(&target))
                        } else {
                            Target::Shared(target)
                        }
                    })
                })
            }
        };

        resolved
            .as_ref()
            .and_then(Target::upgrade)
            .ok_or_else(|| self.unresolved())
    }
}

impl<T: ?Sized> Clone for LazyRef<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            binding: self.binding.clone(),
            resolved: self.resolved.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for LazyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRef")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Either a direct handle to a schema or a lazy reference by name
pub enum SchemaRef<T: ?Sized> {
    Direct(Arc<T>),
    Lazy(LazyRef<T>),
}

impl<T: ?Sized> SchemaRef<T> {
    pub fn named(name: impl Into<String>) -> Self {
        SchemaRef::Lazy(LazyRef::new(name))
    }
}

impl<T: ?Sized> SchemaRef<T>
where
    Registry: Lookup<T>,
{
    pub fn resolve(&self) -> SchemaResult<Arc<T>> {
        match self {
            SchemaRef::Direct(target) => Ok(Arc::clone(target)),
            SchemaRef::Lazy(lazy) => lazy.resolve(),
        }
    }
}

impl<T: ?Sized> Clone for SchemaRef<T> {
    fn clone(&self) -> Self {
        match self {
            SchemaRef::Direct(target) => SchemaRef::Direct(Arc::clone(target)),
            SchemaRef::Lazy(lazy) => SchemaRef::Lazy(lazy.clone()),
        }
    }
}

impl SchemaRef<dyn Serializable> {
    /// Name of the referenced serializer
    pub fn name(&self) -> &str {
        match self {
            SchemaRef::Direct(target) => target.name(),
            SchemaRef::Lazy(lazy) => lazy.name(),
        }
    }

    pub(crate) fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        match self {
            SchemaRef::Direct(target) => target.bind(registry),
            SchemaRef::Lazy(lazy) => lazy.bind(registry, owner),
        }
    }
}

impl SchemaRef<Model> {
    /// Name of the referenced model
    pub fn name(&self) -> &str {
        match self {
            SchemaRef::Direct(model) => model.name(),
            SchemaRef::Lazy(lazy) => lazy.name(),
        }
    }

    pub(crate) fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        match self {
            SchemaRef::Direct(model) => model.bind(registry),
            SchemaRef::Lazy(lazy) => lazy.bind(registry, owner),
        }
    }
}

impl fmt::Debug for SchemaRef<Model> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRef::Direct(model) => write!(f, "Direct({})", model.name()),
            SchemaRef::Lazy(lazy) => write!(f, "Lazy({})", lazy.name()),
        }
    }
}

impl fmt::Debug for SchemaRef<dyn Serializable> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRef::Direct(target) => write!(f, "Direct({})", target.name()),
            SchemaRef::Lazy(lazy) => write!(f, "Lazy({})", lazy.name()),
        }
    }
}

/// Read-only registry of models, serializers, dispatchers and enums
pub struct Registry {
    models: HashMap<String, Arc<Model>>,
    serializers: HashMap<String, Arc<Serializer>>,
    dispatchers: HashMap<String, Arc<Dispatcher>>,
    enums: HashMap<String, Arc<EnumDef>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn model(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    pub fn serializer(&self, name: &str) -> Option<Arc<Serializer>> {
        self.serializers.get(name).cloned()
    }

    pub fn dispatcher(&self, name: &str) -> Option<Arc<Dispatcher>> {
        self.dispatchers.get(name).cloned()
    }

    pub fn enumeration(&self, name: &str) -> Option<Arc<EnumDef>> {
        self.enums.get(name).cloned()
    }

    /// Looks up a serializer or dispatcher by name
    pub fn serializable(&self, name: &str) -> Option<Arc<dyn Serializable>> {
        if let Some(serializer) = self.serializers.get(name) {
            return Some(Arc::clone(serializer) as Arc<dyn Serializable>);
        }
        self.dispatchers
            .get(name)
            .map(|dispatcher| Arc::clone(dispatcher) as Arc<dyn Serializable>)
    }

    /// Registered model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        sorted_keys(&self.models)
    }

    /// Registered serializer names, sorted
    pub fn serializer_names(&self) -> Vec<&str> {
        sorted_keys(&self.serializers)
    }

    /// Registered dispatcher names, sorted
    pub fn dispatcher_names(&self) -> Vec<&str> {
        sorted_keys(&self.dispatchers)
    }

    /// Registered enum names, sorted
    pub fn enum_names(&self) -> Vec<&str> {
        sorted_keys(&self.enums)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

impl Lookup<Model> for Registry {
    fn lookup(&self, name: &str) -> Option<Arc<Model>> {
        self.model(name)
    }
}

impl Lookup<dyn Serializable> for Registry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Serializable>> {
        self.serializable(name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.model_names())
            .field("serializers", &self.serializer_names())
            .field("dispatchers", &self.dispatcher_names())
            .field("enums", &self.enum_names())
            .finish()
    }
}

/// Collects schemas before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    models: HashMap<String, Arc<Model>>,
    serializers: HashMap<String, Arc<Serializer>>,
    dispatchers: HashMap<String, Arc<Dispatcher>>,
    enums: HashMap<String, Arc<EnumDef>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model. Names must be unique.
    pub fn register_model(&mut self, model: Arc<Model>) -> SchemaResult<()> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(SchemaError::DuplicateName(name));
        }
        self.models.insert(name, model);
        Ok(())
    }

    /// Registers a serializer. Serializers and dispatchers share one namespace.
    pub fn register_serializer(&mut self, serializer: Arc<Serializer>) -> SchemaResult<()> {
        let name = serializer.name().to_string();
        self.check_serializable_name(&name)?;
        self.serializers.insert(name, serializer);
        Ok(())
    }

    pub fn register_dispatcher(&mut self, dispatcher: Arc<Dispatcher>) -> SchemaResult<()> {
        let name = dispatcher.name().to_string();
        self.check_serializable_name(&name)?;
        self.dispatchers.insert(name, dispatcher);
        Ok(())
    }

    pub fn register_enum(&mut self, def: Arc<EnumDef>) -> SchemaResult<()> {
        let name = def.name().to_string();
        if self.enums.contains_key(&name) {
            return Err(SchemaError::DuplicateName(name));
        }
        self.enums.insert(name, def);
        Ok(())
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    pub fn serializer(&self, name: &str) -> Option<Arc<Serializer>> {
        self.serializers.get(name).cloned()
    }

    pub fn enumeration(&self, name: &str) -> Option<Arc<EnumDef>> {
        self.enums.get(name).cloned()
    }

    fn check_serializable_name(&self, name: &str) -> SchemaResult<()> {
        if self.serializers.contains_key(name) || self.dispatchers.contains_key(name) {
            return Err(SchemaError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Freezes the registry and binds every lazy reference to it.
    pub fn build(self) -> Arc<Registry> {
        Arc::new_cyclic(|weak: &Weak<Registry>| {
            for model in self.models.values() {
                model.bind(weak);
            }
            for serializer in self.serializers.values() {
                serializer.bind(weak);
            }
            for dispatcher in self.dispatchers.values() {
                dispatcher.bind(weak);
            }

            Registry {
                models: self.models,
                serializers: self.serializers,
                dispatchers: self.dispatchers,
                enums: self.enums,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelField;

    fn point() -> Arc<Model> {
        Model::builder("Point")
            .field(ModelField::integer("x"))
            .field(ModelField::integer("y"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let mut builder = Registry::builder();
        builder.register_model(point()).unwrap();
        let err = builder.register_model(point()).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateName("Point".into()));
    }

    #[test]
    fn test_lazy_ref_resolves_once_bound() {
        let mut builder = Registry::builder();
        builder.register_model(point()).unwrap();
        let registry = builder.build();

        let lazy: LazyRef<Model> = LazyRef::new("Point");
        assert!(lazy.resolve().is_err());

        lazy.bind(&Arc::downgrade(&registry), "Line");
        assert_eq!(lazy.resolve().unwrap().name(), "Point");
        // memoized
        assert_eq!(lazy.resolve().unwrap().name(), "Point");
    }

    #[test]
    fn test_lazy_ref_unknown_name() {
        let registry = Registry::builder().build();
        let lazy: LazyRef<Model> = LazyRef::new("Missing");
        lazy.bind(&Arc::downgrade(&registry), "Line");

        let err = lazy.resolve().unwrap_err();
        assert_eq!(err, SchemaError::ForwardReferenceUnresolved("Missing".into()));
    }

    #[test]
    fn test_lazy_ref_fails_after_registry_dropped() {
        let mut builder = Registry::builder();
        builder.register_model(point()).unwrap();
        let registry = builder.build();

        let lazy: LazyRef<Model> = LazyRef::new("Point");
        lazy.bind(&Arc::downgrade(&registry), "Line");
        drop(registry);

        assert!(lazy.resolve().is_err());
    }

    #[test]
    fn test_resolved_target_outlives_registry() {
        let mut builder = Registry::builder();
        builder.register_model(point()).unwrap();
        let registry = builder.build();

        let lazy: LazyRef<Model> = LazyRef::new("Point");
        lazy.bind(&Arc::downgrade(&registry), "Line");
        assert_eq!(lazy.resolve().unwrap().name(), "Point");

        drop(registry);
        assert_eq!(lazy.resolve().unwrap().name(), "Point");
    }

    #[test]
    fn test_reference_to_owner_is_weak() {
        let mut builder = Registry::builder();
        builder.register_model(point()).unwrap();
        let registry = builder.build();
        let model = registry.model("Point").unwrap();

        let lazy: LazyRef<Model> = LazyRef::new("Point");
        lazy.bind(&Arc::downgrade(&registry), "Point");
        lazy.resolve().unwrap();
        assert_eq!(Arc::strong_count(&model), 2);

        drop(registry);
        assert!(lazy.resolve().is_ok());
        drop(model);
        assert_eq!(
            lazy.resolve().unwrap_err(),
            SchemaError::ForwardReferenceUnresolved("Point".into())
        );
    }

    #[test]
    fn test_concurrent_first_resolution() {
        let mut builder = Registry::builder();
        builder.register_model(point()).unwrap();
        let registry = builder.build();

        let lazy: LazyRef<Model> = LazyRef::new("Point");
        lazy.bind(&Arc::downgrade(&registry), "Line");

        let resolved: Vec<Arc<Model>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| lazy.resolve().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let expected = registry.model("Point").unwrap();
        for model in &resolved {
            assert!(Arc::ptr_eq(model, &expected));
        }
    }

    #[test]
    fn test_names_sorted() {
        let mut builder = Registry::builder();
        builder.register_model(point()).unwrap();
        builder
            .register_model(Model::builder("Line").build().unwrap())
            .unwrap();
        let registry = builder.build();
        assert_eq!(registry.model_names(), vec!["Line", "Point"]);
    }
}
