//! Per-type component arenas.
//!
//! [`ComponentStorage`] owns one [`ComponentArena`] per registered type and
//! performs construction and swap-removal. It does not know about entity
//! records: when a removal relocates an instance, it reports a
//! [`Relocation`] and the caller repoints the mover's bookkeeping.

use std::any::Any;

use crate::arena::ComponentArena;
use crate::component::ComponentTypeId;
use crate::entity::{ComponentSlot, Entity};
use crate::error::{EcsError, Result};
use crate::registry::ComponentRegistry;

/// An instance moved by swap-removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Entity owning the moved instance.
    pub owner: Entity,
    /// Row the instance used to occupy, the old tail.
    pub from: usize,
    /// Row it occupies now, the freed slot.
    pub to: usize,
}

/// Arenas for every component type, indexed by [`ComponentTypeId`].
#[derive(Debug, Default)]
pub struct ComponentStorage {
    arenas: Vec<Option<ComponentArena>>,
}

impl ComponentStorage {
    /// Creates storage with no arenas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a new instance of `type_id` from `blueprint` for `owner`.
    ///
    /// Returns the row of the new instance.
    pub fn create(
        &mut self,
        registry: &ComponentRegistry,
        type_id: ComponentTypeId,
        owner: Entity,
        blueprint: &dyn Any,
    ) -> Result<usize> {
        let vtable = registry.vtable(type_id)?;
        let index = type_id.index();
        if self.arenas.len() <= index {
            self.arenas.resize_with(index + 1, || None);
        }
        self.arenas[index]
            .get_or_insert_with(|| ComponentArena::new(type_id, vtable))
            .push(owner, blueprint)
            .ok_or(EcsError::BlueprintMismatch(type_id))
    }

    /// Destroys the instance at `row` of `type_id`.
    ///
    /// The arena's tail instance is moved into the freed row. If that
    /// happened, the returned [`Relocation`] names the entity whose
    /// component table still points at the old tail row.
    ///
    /// # Panics
    ///
    /// Panics if no instance lives at `row`; callers only pass rows taken
    /// from live bookkeeping.
    pub fn destroy(&mut self, type_id: ComponentTypeId, row: usize) -> Option<Relocation> {
        let arena = self
            .arena_mut(type_id)
            .unwrap_or_else(|| panic!("no arena for component type {type_id}"));
        let from = arena.len().saturating_sub(1);
        arena
            .swap_remove(row)
            .map(|owner| Relocation { owner, from, to: row })
    }

    /// Finds the row of `type_id` in an entity's component table.
    #[must_use]
    pub fn lookup(components: &[ComponentSlot], type_id: ComponentTypeId) -> Option<usize> {
        components
            .iter()
            .find(|slot| slot.type_id == type_id)
            .map(|slot| slot.row)
    }

    /// The arena of `type_id`, if any instance was ever created.
    #[must_use]
    pub fn arena(&self, type_id: ComponentTypeId) -> Option<&ComponentArena> {
        self.arenas.get(type_id.index())?.as_ref()
    }

    /// Mutable access to the arena of `type_id`.
    #[must_use]
    pub fn arena_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut ComponentArena> {
        self.arenas.get_mut(type_id.index())?.as_mut()
    }

    /// Number of live instances of `type_id`.
    #[must_use]
    pub fn instance_count(&self, type_id: ComponentTypeId) -> usize {
        self.arena(type_id).map_or(0, ComponentArena::len)
    }

    /// All arenas created so far.
    pub fn arenas(&self) -> impl Iterator<Item = &ComponentArena> {
        self.arenas.iter().flatten()
    }
}
