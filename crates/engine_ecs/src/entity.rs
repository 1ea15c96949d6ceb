//! Entity handles and the dense entity registry.
//!
//! An [`Entity`] is a generation-checked key: once the entity is removed the
//! handle stops resolving, even if its slot is reused. The registry also
//! keeps every live entity in a dense array, and each record remembers its
//! own position there so removal is O(1).

use slotmap::{SlotMap, new_key_type};

use crate::component::ComponentTypeId;

new_key_type! {
    /// Opaque handle to an entity owned by a [`World`](crate::World).
    pub struct Entity;
}

/// One `(component type, arena row)` entry in an entity's component table.
///
/// The instance's byte offset inside the arena is `row` times the type's
/// instance size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSlot {
    /// Type of the owned component.
    pub type_id: ComponentTypeId,
    /// Position of the instance in that type's arena.
    pub row: usize,
}

/// Bookkeeping for one live entity.
#[derive(Debug, Default)]
pub struct EntityRecord {
    pub(crate) index: usize,
    pub(crate) components: Vec<ComponentSlot>,
}

impl EntityRecord {
    /// Position of the entity in the registry's dense array.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The components this entity owns, at most one per type.
    #[must_use]
    pub fn components(&self) -> &[ComponentSlot] {
        &self.components
    }

    /// Arena row of the component of type `type_id`, if owned.
    #[must_use]
    pub fn row_of(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.components
            .iter()
            .find(|slot| slot.type_id == type_id)
            .map(|slot| slot.row)
    }
}

/// Owner of all entity records.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    records: SlotMap<Entity, EntityRecord>,
    dense: Vec<Entity>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity without components at the tail of the dense array.
    pub fn insert(&mut self) -> Entity {
        let index = self.dense.len();
        let entity = self.records.insert(EntityRecord {
            index,
            components: Vec::new(),
        });
        self.dense.push(entity);
        entity
    }

    /// Removes an entity, returning its record.
    ///
    /// The last entity of the dense array moves into the freed position and
    /// has its recorded index updated.
    pub fn remove(&mut self, entity: Entity) -> Option<EntityRecord> {
        let record = self.records.remove(entity)?;
        let removed = self.dense.swap_remove(record.index);
        debug_assert_eq!(removed, entity);
        if let Some(&moved) = self.dense.get(record.index) {
            self.records[moved].index = record.index;
        }
        Some(record)
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.records.contains_key(entity)
    }

    /// Returns the record of a live entity.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&EntityRecord> {
        self.records.get(entity)
    }

    /// Returns the record of a live entity mutably.
    #[must_use]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        self.records.get_mut(entity)
    }

    /// Live entities in dense-array order.
    #[must_use]
    pub fn as_slice(&self) -> &[Entity] {
        &self.dense
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` if there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}
