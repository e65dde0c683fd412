//! Typed service registry.
//!
//! Steps resolve their collaborators by key at runtime. A [`Container`] maps
//! keys to type-erased services; [`ServiceResolverExt::resolve`] recovers the
//! concrete type and fails with a [`ResolutionError`] when the key is missing
//! or bound to something else.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ResolutionError;

/// Looks up services by key.
pub trait ServiceResolver: Send + Sync {
    /// Returns the service registered under `key`.
    fn lookup(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>>;

    /// Returns true if a service is registered under `key`.
    fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }
}

/// Typed access on top of [`ServiceResolver`].
pub trait ServiceResolverExt: ServiceResolver {
    /// Resolves the service registered under `key` as a `T`.
    ///
    /// Services are usually registered as `Arc<dyn Trait>` so the clone is
    /// cheap.
    fn resolve<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Result<T, ResolutionError> {
        let service = self.lookup(key).ok_or_else(|| ResolutionError::Unknown {
            key: key.to_string(),
        })?;
        service
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ResolutionError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl<R: ServiceResolver + ?Sized> ServiceResolverExt for R {}

/// A service a step resolves: its key and the type it is resolved as.
#[derive(Clone, Copy)]
pub struct ServiceRequirement {
    key: &'static str,
    type_name: &'static str,
    matches: fn(&(dyn Any + Send + Sync)) -> bool,
}

fn is_a<T: Any>(service: &(dyn Any + Send + Sync)) -> bool {
    service.downcast_ref::<T>().is_some()
}

impl ServiceRequirement {
    /// A service registered under `key` that resolves as a `T`.
    pub fn of<T: Send + Sync + 'static>(key: &'static str) -> Self {
        Self {
            key,
            type_name: std::any::type_name::<T>(),
            matches: is_a::<T>,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fails unless `resolver` holds a service of the right type under the
    /// key.
    pub fn check<R: ServiceResolver + ?Sized>(&self, resolver: &R) -> Result<(), ResolutionError> {
        let service = resolver
            .lookup(self.key)
            .ok_or_else(|| ResolutionError::Unknown {
                key: self.key.to_string(),
            })?;
        if (self.matches)(&*service) {
            Ok(())
        } else {
            Err(ResolutionError::TypeMismatch {
                key: self.key.to_string(),
                expected: self.type_name,
            })
        }
    }
}

impl fmt::Debug for ServiceRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRequirement")
            .field("key", &self.key)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Service registry with an optional parent.
///
/// A child container created with [`Container::scope`] sees every service of
/// its parent and may override them; registrations on the child never leak
/// into the parent.
#[derive(Default)]
pub struct Container {
    services: HashMap<String, Arc<dyn Any + Send + Sync>>,
    parent: Option<Arc<Container>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` under `key`, replacing any previous binding.
    pub fn register<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, service: T) {
        self.services.insert(key.into(), Arc::new(service));
    }

    /// Builder-style variant of [`Container::register`].
    pub fn with<T: Send + Sync + 'static>(mut self, key: impl Into<String>, service: T) -> Self {
        self.register(key, service);
        self
    }

    /// Creates an empty child container that falls back to `self`.
    pub fn scope(self: &Arc<Self>) -> Container {
        Container {
            services: HashMap::new(),
            parent: Some(Arc::clone(self)),
        }
    }

    /// Keys visible from this container, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.services.keys().cloned().collect();
        if let Some(parent) = &self.parent {
            for key in parent.keys() {
                if !self.services.contains_key(&key) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        keys
    }
}

impl ServiceResolver for Container {
    fn lookup(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        match self.services.get(key) {
            Some(service) => Some(Arc::clone(service)),
            None => self.parent.as_ref().and_then(|parent| parent.lookup(key)),
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.keys())
            .finish()
    }
}
