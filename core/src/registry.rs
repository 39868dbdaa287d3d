//! Component Registry

use crate::error::*;
use crate::paramset::*;
use std::any::Any;
use std::collections::BTreeMap;

/// An interface that implementations can be registered for. Implemented for
/// trait objects, e.g. `dyn Accelerator`.
pub trait Component {
    /// Interface name used in configuration and diagnostics.
    const INTERFACE: &'static str;
}

/// Factory that creates an implementation from its parameters. The registry
/// is passed along so factories can resolve nested components by name.
pub type Factory<T> = fn(&ParamSet, &ComponentRegistry) -> Result<Box<T>>;

/// Map from (interface name, implementation name) to factory. Filled once at
/// startup and read-only afterwards.
#[derive(Default)]
pub struct ComponentRegistry {
    factories: BTreeMap<(&'static str, &'static str), Box<dyn Any + Send + Sync>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation. A later registration with the same name
    /// replaces the earlier one.
    ///
    /// * `name`    - Implementation name.
    /// * `factory` - The factory.
    pub fn register<T>(&mut self, name: &'static str, factory: Factory<T>)
    where
        T: Component + ?Sized + 'static,
    {
        if self.factories.insert((T::INTERFACE, name), Box::new(factory)).is_some() {
            warn!("Replacing {} implementation '{}'", T::INTERFACE, name);
        }
    }

    /// Returns `true` if an implementation is registered.
    ///
    /// * `name` - Implementation name.
    pub fn contains<T>(&self, name: &str) -> bool
    where
        T: Component + ?Sized + 'static,
    {
        self.names::<T>().contains(&name)
    }

    /// Returns the registered implementation names of an interface in
    /// alphabetical order.
    pub fn names<T>(&self) -> Vec<&'static str>
    where
        T: Component + ?Sized + 'static,
    {
        self.factories
            .keys()
            .filter(|(interface, _)| *interface == T::INTERFACE)
            .map(|(_, name)| *name)
            .collect()
    }

    /// Create an implementation by name.
    ///
    /// * `name`   - Implementation name.
    /// * `params` - Parameters passed to the factory.
    pub fn create<T>(&self, name: &str, params: &ParamSet) -> Result<Box<T>>
    where
        T: Component + ?Sized + 'static,
    {
        let factory = self
            .factories
            .iter()
            .find(|((interface, n), _)| *interface == T::INTERFACE && *n == name)
            .and_then(|(_, f)| f.downcast_ref::<Factory<T>>())
            .ok_or_else(|| {
                Error::config(format!(
                    "unknown {} '{}' (expected one of: {})",
                    T::INTERFACE,
                    name,
                    self.names::<T>().join(", ")
                ))
            })?;
        debug!("Creating {} '{}'", T::INTERFACE, name);
        factory(params, self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {
        fn greet(&self) -> String;
    }

    impl Component for dyn Greeter {
        const INTERFACE: &'static str = "greeter";
    }

    struct Hello(String);

    impl Greeter for Hello {
        fn greet(&self) -> String {
            format!("hello {}", self.0)
        }
    }

    fn create_hello(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Greeter>> {
        Ok(Box::new(Hello(params.find_one_string("who", "world".to_string()))))
    }

    #[test]
    fn create_by_name() {
        let mut registry = ComponentRegistry::new();
        registry.register::<dyn Greeter>("hello", create_hello);

        let g = registry.create::<dyn Greeter>("hello", &ParamSet::new()).unwrap();
        assert_eq!(g.greet(), "hello world");
        assert_eq!(registry.names::<dyn Greeter>(), vec!["hello"]);
        assert!(registry.contains::<dyn Greeter>("hello"));
    }

    #[test]
    fn unknown_names_are_config_errors() {
        let registry = ComponentRegistry::new();
        let r = registry.create::<dyn Greeter>("bye", &ParamSet::new());
        assert!(matches!(r, Err(Error::Config(_))));
    }
}
