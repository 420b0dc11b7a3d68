//! Typed service container (spec C12).
//!
//! A small dependency-injection registry: services are registered as
//! singleton or transient factories and resolved by type. Resolution is
//! reentrancy-safe — a factory that (directly or transitively) tries to
//! resolve its own type again fails fast with [`ContainerError::Circular`]
//! instead of deadlocking or overflowing the stack.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("no service registered for {0}")]
    NotRegistered(&'static str),
    #[error("circular dependency detected while resolving {0}")]
    Circular(&'static str),
    #[error("construction of {0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
    #[error("construction of {0} failed: {1}")]
    ConstructionFailed(&'static str, String),
}

type AnyArc = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn(&Container) -> Result<AnyArc, ContainerError> + Send + Sync>;

enum Entry {
    Singleton { factory: Factory, instance: Mutex<Option<AnyArc>> },
    Transient { factory: Factory },
}

thread_local! {
    /// Per-thread resolve stack, used to detect reentrant resolution of the
    /// same type within one call chain.
    static RESOLVE_STACK: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

#[derive(Default)]
pub struct Container {
    entries: HashMap<TypeId, Entry>,
    type_names: HashMap<TypeId, &'static str>,
    /// Construction order, used to dispose services in reverse.
    construction_order: Mutex<Vec<TypeId>>,
    disposers: Mutex<Vec<Box<dyn Fn(&AnyArc) + Send + Sync>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_singleton<T, F>(&mut self, name: &'static str, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<T>();
        self.type_names.insert(type_id, name);
        self.entries.insert(
            type_id,
            Entry::Singleton {
                factory: Box::new(move |c| factory(c).map(|v| Arc::new(v) as AnyArc)),
                instance: Mutex::new(None),
            },
        );
    }

    pub fn register_transient<T, F>(&mut self, name: &'static str, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<T>();
        self.type_names.insert(type_id, name);
        self.entries.insert(type_id, Entry::Transient { factory: Box::new(move |c| factory(c).map(|v| Arc::new(v) as AnyArc)) });
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let type_id = TypeId::of::<T>();
        let name = self.type_names.get(&type_id).copied().unwrap_or("<unknown>");

        let reentrant = RESOLVE_STACK.with(|stack| stack.borrow().contains(&type_id));
        if reentrant {
            return Err(ContainerError::Circular(name));
        }

        RESOLVE_STACK.with(|stack| stack.borrow_mut().push(type_id));
        let result = self.resolve_inner::<T>(type_id, name);
        RESOLVE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        result
    }

    fn resolve_inner<T: Send + Sync + 'static>(&self, type_id: TypeId, name: &'static str) -> Result<Arc<T>, ContainerError> {
        let entry = self.entries.get(&type_id).ok_or(ContainerError::NotRegistered(name))?;

        let any_arc = match entry {
            Entry::Singleton { factory, instance } => {
                let mut guard = instance.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(existing) = guard.as_ref() {
                    existing.clone()
                } else {
                    let built = factory(self)?;
                    *guard = Some(built.clone());
                    self.construction_order.lock().unwrap_or_else(|e| e.into_inner()).push(type_id);
                    built
                }
            }
            Entry::Transient { factory } => factory(self)?,
        };

        any_arc.downcast::<T>().map_err(|_| ContainerError::ConstructionFailed(name, "type mismatch".to_string()))
    }

    /// Resolves with a bounded construction time; on timeout, falls back to
    /// `fallback` if one is given.
    pub async fn resolve_with_timeout<T: Send + Sync + 'static>(
        &self,
        timeout: Duration,
        fallback: Option<impl FnOnce() -> T>,
    ) -> Result<Arc<T>, ContainerError> {
        let name = self.type_names.get(&TypeId::of::<T>()).copied().unwrap_or("<unknown>");
        match tokio::time::timeout(timeout, async { self.resolve::<T>() }).await {
            Ok(result) => result,
            Err(_) => match fallback {
                Some(f) => Ok(Arc::new(f())),
                None => Err(ContainerError::Timeout(name, timeout)),
            },
        }
    }

    /// Registers a disposer invoked, in reverse construction order, when
    /// [`Container::dispose`] runs.
    pub fn on_dispose<T, F>(&self, disposer: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.disposers.lock().unwrap_or_else(|e| e.into_inner()).push(Box::new(move |any| {
            if let Some(v) = any.downcast_ref::<T>() {
                disposer(v);
            }
        }));
    }

    /// Disposes constructed singletons in reverse construction order.
    pub fn dispose(&self) {
        let order = self.construction_order.lock().unwrap_or_else(|e| e.into_inner());
        let disposers = self.disposers.lock().unwrap_or_else(|e| e.into_inner());
        for type_id in order.iter().rev() {
            if let Some(Entry::Singleton { instance, .. }) = self.entries.get(type_id) {
                if let Some(instance) = instance.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
                    for disposer in disposers.iter() {
                        disposer(instance);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A(u32);
    struct B(u32);

    #[test]
    fn singleton_returns_the_same_instance() {
        let mut container = Container::new();
        container.register_singleton::<A, _>("A", |_| Ok(A(42)));
        let a1 = container.resolve::<A>().unwrap();
        let a2 = container.resolve::<A>().unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
    }

    #[test]
    fn transient_returns_distinct_instances() {
        let mut container = Container::new();
        container.register_transient::<A, _>("A", |_| Ok(A(1)));
        let a1 = container.resolve::<A>().unwrap();
        let a2 = container.resolve::<A>().unwrap();
        assert!(!Arc::ptr_eq(&a1, &a2));
    }

    #[test]
    fn unregistered_type_errors() {
        let container = Container::new();
        assert!(matches!(container.resolve::<A>(), Err(ContainerError::NotRegistered(_))));
    }

    #[test]
    fn composing_factories_can_resolve_dependencies() {
        let mut container = Container::new();
        container.register_singleton::<A, _>("A", |_| Ok(A(7)));
        container.register_singleton::<B, _>("B", |c| Ok(B(c.resolve::<A>()?.0 * 2)));
        let b = container.resolve::<B>().unwrap();
        assert_eq!(b.0, 14);
    }

    #[test]
    fn circular_dependency_is_detected() {
        let mut container = Container::new();
        container.register_singleton::<A, _>("A", |c| {
            let _ = c.resolve::<A>()?;
            Ok(A(0))
        });
        assert!(matches!(container.resolve::<A>(), Err(ContainerError::Circular(_))));
    }
}
