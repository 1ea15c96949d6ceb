//! Component type registry.
//!
//! Assigns every component type a dense [`ComponentTypeId`] and answers
//! metadata queries by id. Registration is idempotent per Rust type, so a
//! type can never end up with two ids.

use std::any::TypeId;
use std::collections::HashMap;

use crate::component::{Component, ComponentTypeId, ComponentVtable, ConstructFn, DropFn};
use crate::error::{EcsError, Result};

/// Table of registered component types, indexed by [`ComponentTypeId`].
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    vtables: Vec<ComponentVtable>,
    by_rust_type: HashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers component type `T`, returning its id.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        self.register_vtable(ComponentVtable::of::<T>())
    }

    /// Registers a type from its descriptor.
    ///
    /// The first registration of a Rust type receives the next free id;
    /// later registrations of the same type return that id unchanged.
    pub fn register_vtable(&mut self, vtable: ComponentVtable) -> ComponentTypeId {
        if let Some(&id) = self.by_rust_type.get(&vtable.rust_type()) {
            return id;
        }
        let raw = u32::try_from(self.vtables.len()).expect("component type ids exhausted");
        let id = ComponentTypeId(raw);
        self.vtables.push(vtable);
        self.by_rust_type.insert(vtable.rust_type(), id);
        id
    }

    /// Returns the id of `T` if it has been registered.
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.id_of_rust_type(TypeId::of::<T>())
    }

    /// Returns the id registered for a Rust [`TypeId`].
    #[must_use]
    pub fn id_of_rust_type(&self, rust_type: TypeId) -> Option<ComponentTypeId> {
        self.by_rust_type.get(&rust_type).copied()
    }

    /// Returns `true` iff `type_id` was handed out by this registry.
    #[must_use]
    pub fn is_valid(&self, type_id: ComponentTypeId) -> bool {
        type_id.index() < self.vtables.len()
    }

    /// Returns the descriptor registered under `type_id`.
    pub fn vtable(&self, type_id: ComponentTypeId) -> Result<&ComponentVtable> {
        self.vtables
            .get(type_id.index())
            .ok_or(EcsError::InvalidComponentType(type_id))
    }

    /// Byte size of one instance of `type_id`.
    pub fn size_of(&self, type_id: ComponentTypeId) -> Result<usize> {
        self.vtable(type_id).map(ComponentVtable::size)
    }

    /// Construction function of `type_id`.
    pub fn construct_of(&self, type_id: ComponentTypeId) -> Result<ConstructFn> {
        self.vtable(type_id).map(|vtable| vtable.construct_fn())
    }

    /// Destruction function of `type_id`, `None` for types without drop glue.
    pub fn destruct_of(&self, type_id: ComponentTypeId) -> Result<Option<DropFn>> {
        self.vtable(type_id).map(|vtable| vtable.drop_fn())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vtables.len()
    }

    /// Returns `true` if no type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vtables.is_empty()
    }
}
