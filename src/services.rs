// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Service Registry
//!
//! The mutable store of capability registrations that modules populate
//! while they are configured. The pipeline never reads it; modules and the
//! host do.
//!
//! ## Key Types
//!
//! - [`ServiceRegistry`]: the registry seam, object safe.
//! - [`ServiceRegistryExt`]: typed helpers available on every registry.
//! - [`ServiceCollection`]: the default, list-backed registry.
//!
//! ```rust
//! use modflow::services::{ServiceCollection, ServiceRegistryExt};
//!
//! #[derive(Debug)]
//! struct Clock(u64);
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Clock(42));
//!
//! let clock = services.resolve::<Clock>().unwrap();
//! assert_eq!(clock.0, 42);
//! ```

use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::core::error::{ModFlowError, Result};
use crate::settings::Settings;

/// A registered, type-erased service instance.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// A factory producing service instances.
pub type ServiceFactory = Arc<dyn Fn() -> ServiceInstance + Send + Sync>;

/// Identifies a registration: a Rust type, optionally with a string key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
    key: Option<String>,
}

impl ServiceKey {
    /// Key for the unkeyed registration of `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            key: None,
        }
    }

    /// Key for the registration of `T` under `key`.
    pub fn keyed<T: Any, K: Into<String>>(key: K) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::of::<T>()
        }
    }

    /// The Rust type name of the service.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The string key, for keyed services.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}[{}]", self.type_name, key),
            None => f.write_str(self.type_name),
        }
    }
}

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// One instance for the lifetime of the registry.
    Singleton,
    /// One instance per host-defined scope. The registry itself has no
    /// scopes, so every resolve builds a fresh instance.
    Scoped,
    /// A fresh instance on every resolve.
    Transient,
}

/// Where a registration's instances come from.
#[derive(Clone)]
pub enum ServiceImplementation {
    /// A ready instance.
    Instance(ServiceInstance),
    /// A factory invoked on resolve.
    Factory(ServiceFactory),
}

impl fmt::Debug for ServiceImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceImplementation::Instance(_) => f.write_str("Instance(..)"),
            ServiceImplementation::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A single registration.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    key: ServiceKey,
    lifetime: ServiceLifetime,
    implementation: ServiceImplementation,
    cached: Arc<RwLock<Option<ServiceInstance>>>,
}

impl ServiceDescriptor {
    fn from_parts(
        key: ServiceKey,
        lifetime: ServiceLifetime,
        implementation: ServiceImplementation,
    ) -> Self {
        Self {
            key,
            lifetime,
            implementation,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    fn factory_of<T, F>(factory: F) -> ServiceImplementation
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        ServiceImplementation::Factory(Arc::new(move || {
            let instance: ServiceInstance = Arc::new(factory());
            instance
        }))
    }

    /// Registers a ready singleton instance of `T`.
    pub fn singleton<T: Any + Send + Sync>(instance: T) -> Self {
        Self::from_parts(
            ServiceKey::of::<T>(),
            ServiceLifetime::Singleton,
            ServiceImplementation::Instance(Arc::new(instance)),
        )
    }

    /// Registers a singleton built on first resolve.
    pub fn singleton_factory<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_parts(
            ServiceKey::of::<T>(),
            ServiceLifetime::Singleton,
            Self::factory_of(factory),
        )
    }

    /// Registers a scoped service.
    pub fn scoped<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_parts(
            ServiceKey::of::<T>(),
            ServiceLifetime::Scoped,
            Self::factory_of(factory),
        )
    }

    /// Registers a transient service.
    pub fn transient<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_parts(
            ServiceKey::of::<T>(),
            ServiceLifetime::Transient,
            Self::factory_of(factory),
        )
    }

    /// Registers a ready singleton of `T` under `key`.
    pub fn keyed_singleton<T, K>(key: K, instance: T) -> Self
    where
        T: Any + Send + Sync,
        K: Into<String>,
    {
        Self::from_parts(
            ServiceKey::keyed::<T, K>(key),
            ServiceLifetime::Singleton,
            ServiceImplementation::Instance(Arc::new(instance)),
        )
    }

    /// The registration key.
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// The registration lifetime.
    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    /// The ready instance, if this registration holds one.
    pub fn implementation_instance(&self) -> Option<&ServiceInstance> {
        match &self.implementation {
            ServiceImplementation::Instance(instance) => Some(instance),
            ServiceImplementation::Factory(_) => None,
        }
    }

    /// Produces an instance according to the lifetime. Singleton
    /// factories run at most once per registration.
    pub fn instantiate(&self) -> ServiceInstance {
        match (&self.implementation, self.lifetime) {
            (ServiceImplementation::Instance(instance), _) => instance.clone(),
            (ServiceImplementation::Factory(factory), ServiceLifetime::Singleton) => {
                if let Some(instance) = self.cached.read().as_ref() {
                    return instance.clone();
                }
                let mut cached = self.cached.write();
                cached.get_or_insert_with(|| factory()).clone()
            }
            (ServiceImplementation::Factory(factory), _) => factory(),
        }
    }
}

/// Abstract, mutable store of service registrations.
pub trait ServiceRegistry: Send + Sync + fmt::Debug {
    /// Appends a registration. Later registrations win on lookup.
    fn add(&mut self, descriptor: ServiceDescriptor);

    /// Removes every registration with the descriptor's key, then adds
    /// it. Returns the number of removed registrations.
    fn replace(&mut self, descriptor: ServiceDescriptor) -> usize;

    /// Returns the effective registration for `key`.
    fn find(&self, key: &ServiceKey) -> Option<&ServiceDescriptor>;

    /// All registrations in insertion order.
    fn descriptors(&self) -> &[ServiceDescriptor];

    /// Number of registrations.
    fn len(&self) -> usize {
        self.descriptors().len()
    }

    /// Returns `true` if nothing is registered.
    fn is_empty(&self) -> bool {
        self.descriptors().is_empty()
    }
}

/// Typed helpers over any [`ServiceRegistry`].
pub trait ServiceRegistryExt: ServiceRegistry {
    /// Registers a ready singleton.
    fn add_singleton<T: Any + Send + Sync>(&mut self, instance: T) {
        self.add(ServiceDescriptor::singleton(instance));
    }

    /// Registers a singleton built on first resolve.
    fn add_singleton_factory<T, F>(&mut self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::singleton_factory(factory));
    }

    /// Registers a scoped service.
    fn add_scoped<T, F>(&mut self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::scoped(factory));
    }

    /// Registers a transient service.
    fn add_transient<T, F>(&mut self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::transient(factory));
    }

    /// Registers a ready singleton under a string key.
    fn add_keyed<T, K>(&mut self, key: K, instance: T)
    where
        T: Any + Send + Sync,
        K: Into<String>,
    {
        self.add(ServiceDescriptor::keyed_singleton(key, instance));
    }

    /// Replaces any registration of `T` with a ready singleton.
    fn replace_singleton<T: Any + Send + Sync>(&mut self, instance: T) -> usize {
        self.replace(ServiceDescriptor::singleton(instance))
    }

    /// Returns `true` if `T` is registered without a key.
    fn contains<T: Any>(&self) -> bool {
        self.find(&ServiceKey::of::<T>()).is_some()
    }

    /// Returns the ready singleton instance of `T`, ignoring factories.
    fn get_singleton_instance<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.find(&ServiceKey::of::<T>())
            .filter(|d| d.lifetime() == ServiceLifetime::Singleton)
            .and_then(ServiceDescriptor::implementation_instance)
            .and_then(|instance| instance.clone().downcast::<T>().ok())
    }

    /// Resolves `T` according to its registration.
    fn resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.find(&ServiceKey::of::<T>())
            .and_then(|d| d.instantiate().downcast::<T>().ok())
    }

    /// Resolves `T` registered under `key`.
    fn resolve_keyed<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.find(&ServiceKey::keyed::<T, &str>(key))
            .and_then(|d| d.instantiate().downcast::<T>().ok())
    }

    /// Resolves `T` or fails with [`ModFlowError::ServiceNotRegistered`].
    fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.resolve::<T>()
            .ok_or_else(|| ModFlowError::ServiceNotRegistered {
                service: ServiceKey::of::<T>().to_string(),
            })
    }

    /// Returns the registered configuration source, if any.
    fn get_configuration(&self) -> Option<Arc<Settings>> {
        self.resolve::<Settings>()
    }

    /// Replaces the registered configuration source.
    fn replace_configuration(&mut self, settings: Settings) -> usize {
        self.replace_singleton(settings)
    }
}

impl<R: ServiceRegistry + ?Sized> ServiceRegistryExt for R {}

/// Default, list-backed [`ServiceRegistry`].
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServiceRegistry for ServiceCollection {
    fn add(&mut self, descriptor: ServiceDescriptor) {
        self.descriptors.push(descriptor);
    }

    fn replace(&mut self, descriptor: ServiceDescriptor) -> usize {
        let before = self.descriptors.len();
        self.descriptors.retain(|d| d.key() != descriptor.key());
        let removed = before - self.descriptors.len();
        self.descriptors.push(descriptor);
        removed
    }

    fn find(&self, key: &ServiceKey) -> Option<&ServiceDescriptor> {
        self.descriptors.iter().rev().find(|d| d.key() == key)
    }

    fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }
}
