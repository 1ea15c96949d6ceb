//! World: entity lifecycle on top of packed component storage.
//!
//! The [`World`] owns the component registry, the arenas and the entity
//! records. Every component access goes through the owning entity's
//! component table, because swap-removal may move any instance to another
//! row.

use std::any::Any;
use std::ptr::NonNull;

use tracing::{debug, warn};

use crate::arena::ComponentArena;
use crate::blueprint::EntityBlueprint;
use crate::component::{Component, ComponentTypeId};
use crate::entity::{ComponentSlot, Entity, EntityRecord, EntityRegistry};
use crate::error::{EcsError, Result};
use crate::registry::ComponentRegistry;
use crate::storage::ComponentStorage;

/// The ECS world: component types, arenas and entities.
#[derive(Debug, Default)]
pub struct World {
    pub(crate) registry: ComponentRegistry,
    pub(crate) storage: ComponentStorage,
    pub(crate) entities: EntityRegistry,
    /// Dispatch passes run so far.
    pub(crate) tick: u64,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers component type `T` and returns its id.
    ///
    /// Registering the same type again returns the same id.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        self.registry.register::<T>()
    }

    /// The component type registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- Entity lifecycle --

    /// Creates an entity owning one component per `(blueprint, type id)`
    /// pair.
    ///
    /// All inputs are validated before anything is allocated: on error no
    /// entity is created and no arena changes. If a component's `Clone`
    /// panics, the partly built entity is removed while unwinding.
    pub fn make_entity(
        &mut self,
        blueprints: &[&dyn Any],
        type_ids: &[ComponentTypeId],
    ) -> Result<Entity> {
        if blueprints.len() != type_ids.len() {
            return Err(EcsError::BlueprintCount {
                blueprints: blueprints.len(),
                types: type_ids.len(),
            });
        }

        for (position, (&type_id, &blueprint)) in type_ids.iter().zip(blueprints).enumerate() {
            let vtable = match self.registry.vtable(type_id) {
                Ok(vtable) => vtable,
                Err(err) => {
                    warn!(%type_id, "rejected entity with unregistered component type");
                    return Err(err);
                }
            };
            if !vtable.accepts(blueprint) {
                return Err(EcsError::BlueprintMismatch(type_id));
            }
            if type_ids[..position].contains(&type_id) {
                return Err(EcsError::DuplicateComponent(type_id));
            }
        }

        let entity = self.entities.insert();
        let mut pending = PendingEntity {
            world: self,
            entity,
            armed: true,
        };
        for (&type_id, &blueprint) in type_ids.iter().zip(blueprints) {
            pending.world.attach(entity, type_id, blueprint)?;
        }
        let entity = pending.commit();

        debug!(?entity, components = type_ids.len(), "created entity");
        Ok(entity)
    }

    /// Creates an entity from a typed blueprint, registering its component
    /// types as needed.
    pub fn spawn(&mut self, blueprint: &EntityBlueprint) -> Result<Entity> {
        let mut type_ids = Vec::with_capacity(blueprint.len());
        let mut values = Vec::with_capacity(blueprint.len());
        for (vtable, value) in blueprint.parts() {
            type_ids.push(self.registry.register_vtable(*vtable));
            values.push(value);
        }
        self.make_entity(&values, &type_ids)
    }

    /// Removes an entity and destroys every component it owns.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<()> {
        let record = self
            .entities
            .remove(entity)
            .ok_or(EcsError::StaleEntity(entity))?;
        for slot in &record.components {
            self.destroy_component(slot.type_id, slot.row);
        }
        debug!(?entity, components = record.components.len(), "removed entity");
        Ok(())
    }

    /// Returns `true` if `entity` is alive.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in dense-array order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.entities.as_slice()
    }

    /// Bookkeeping record of a live entity.
    #[must_use]
    pub fn record(&self, entity: Entity) -> Option<&EntityRecord> {
        self.entities.get(entity)
    }

    // -- Component operations --

    /// Adds a component of `type_id` built from `blueprint`.
    pub fn add_component(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        blueprint: &dyn Any,
    ) -> Result<()> {
        let record = self
            .entities
            .get(entity)
            .ok_or(EcsError::StaleEntity(entity))?;
        let vtable = self.registry.vtable(type_id)?;
        if !vtable.accepts(blueprint) {
            return Err(EcsError::BlueprintMismatch(type_id));
        }
        if record.row_of(type_id).is_some() {
            return Err(EcsError::DuplicateComponent(type_id));
        }
        self.attach(entity, type_id, blueprint)
    }

    /// Removes the component of `type_id` from `entity`.
    ///
    /// Returns `Ok(false)` if the entity does not own one.
    pub fn remove_component(&mut self, entity: Entity, type_id: ComponentTypeId) -> Result<bool> {
        if !self.registry.is_valid(type_id) {
            return Err(EcsError::InvalidComponentType(type_id));
        }
        let record = self
            .entities
            .get_mut(entity)
            .ok_or(EcsError::StaleEntity(entity))?;
        let Some(position) = record
            .components
            .iter()
            .position(|slot| slot.type_id == type_id)
        else {
            return Ok(false);
        };
        let slot = record.components.swap_remove(position);
        self.destroy_component(type_id, slot.row);
        Ok(true)
    }

    /// Address of the component of `type_id` owned by `entity`.
    ///
    /// The pointer is invalidated by the next structural change.
    #[must_use]
    pub fn component(&self, entity: Entity, type_id: ComponentTypeId) -> Option<NonNull<u8>> {
        let row = ComponentStorage::lookup(self.entities.get(entity)?.components(), type_id)?;
        self.storage.arena(type_id)?.ptr(row)
    }

    /// Adds component `value` to `entity`, registering `T` if needed.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let type_id = self.register::<T>();
        self.add_component(entity, type_id, &value)
    }

    /// Removes the component of type `T` from `entity`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<bool> {
        match self.registry.id_of::<T>() {
            Some(type_id) => self.remove_component(entity, type_id),
            None if self.contains(entity) => Ok(false),
            None => Err(EcsError::StaleEntity(entity)),
        }
    }

    /// The component of type `T` owned by `entity`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let type_id = self.registry.id_of::<T>()?;
        let row = self.entities.get(entity)?.row_of(type_id)?;
        self.storage.arena(type_id)?.get::<T>(row)
    }

    /// The component of type `T` owned by `entity`, mutably.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let type_id = self.registry.id_of::<T>()?;
        let row = self.entities.get(entity)?.row_of(type_id)?;
        self.storage.arena_mut(type_id)?.get_mut::<T>(row)
    }

    /// Returns `true` if `entity` owns a component of type `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.registry
            .id_of::<T>()
            .zip(self.entities.get(entity))
            .is_some_and(|(type_id, record)| record.row_of(type_id).is_some())
    }

    /// The arena of `type_id`, if an instance was ever created.
    #[must_use]
    pub fn arena(&self, type_id: ComponentTypeId) -> Option<&ComponentArena> {
        self.storage.arena(type_id)
    }

    /// Number of live instances of `type_id`.
    #[must_use]
    pub fn instance_count(&self, type_id: ComponentTypeId) -> usize {
        self.storage.instance_count(type_id)
    }

    /// Number of completed [`update_systems`](Self::update_systems) passes.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // -- Internals --

    /// Builds one component for a live entity and records its slot.
    fn attach(&mut self, entity: Entity, type_id: ComponentTypeId, blueprint: &dyn Any) -> Result<()> {
        let record = self
            .entities
            .get_mut(entity)
            .ok_or(EcsError::StaleEntity(entity))?;
        let row = self
            .storage
            .create(&self.registry, type_id, entity, blueprint)?;
        record.components.push(ComponentSlot { type_id, row });
        Ok(())
    }

    /// Destroys one instance and repoints the entity whose instance was
    /// relocated into the hole.
    ///
    /// The caller must already have dropped the slot from the owner's table.
    ///
    /// # Panics
    ///
    /// Panics if the relocated instance has no matching bookkeeping entry.
    fn destroy_component(&mut self, type_id: ComponentTypeId, row: usize) {
        let Some(moved) = self.storage.destroy(type_id, row) else {
            return;
        };
        let record = self.entities.get_mut(moved.owner).unwrap_or_else(|| {
            panic!(
                "relocated component {type_id} belongs to dead {:?}",
                moved.owner
            )
        });
        // One instance per type per entity makes this match unique.
        let slot = record
            .components
            .iter_mut()
            .find(|slot| slot.type_id == type_id && slot.row == moved.from)
            .unwrap_or_else(|| {
                panic!(
                    "{:?} has no slot for component {type_id} at row {}",
                    moved.owner, moved.from
                )
            });
        slot.row = moved.to;
    }

    /// Checks every storage and entity invariant.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut slot_total = 0;
        for (position, &entity) in self.entities().iter().enumerate() {
            let record = self.record(entity).expect("dense entity must be live");
            assert_eq!(record.index(), position, "entity index out of sync");
            for (i, slot) in record.components().iter().enumerate() {
                assert!(
                    record.components()[..i]
                        .iter()
                        .all(|other| other.type_id != slot.type_id),
                    "duplicate component type on {entity:?}"
                );
                let arena = self.arena(slot.type_id).expect("slot without arena");
                assert_eq!(arena.owner(slot.row), Some(entity), "slot points at foreign row");
                slot_total += 1;
            }
        }

        let mut instance_total = 0;
        for arena in self.storage.arenas() {
            assert_eq!(arena.byte_len(), arena.len() * arena.item_size());
            for (row, &owner) in arena.owners().iter().enumerate() {
                let record = self.record(owner).expect("instance owned by dead entity");
                assert_eq!(record.row_of(arena.type_id()), Some(row));
            }
            instance_total += arena.len();
        }
        assert_eq!(slot_total, instance_total);
    }
}

/// A freshly inserted entity that is removed again unless committed.
///
/// Covers both early returns and unwinding out of a component's `Clone`.
struct PendingEntity<'w> {
    world: &'w mut World,
    entity: Entity,
    armed: bool,
}

impl PendingEntity<'_> {
    fn commit(mut self) -> Entity {
        self.armed = false;
        self.entity
    }
}

impl Drop for PendingEntity<'_> {
    fn drop(&mut self) {
        if self.armed {
            // The entity was inserted above, so removal cannot be stale.
            let _ = self.world.remove_entity(self.entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct A(u32);
    impl Component for A {}

    #[derive(Debug, Clone, PartialEq)]
    struct B(String);
    impl Component for B {}

    #[derive(Debug, Clone, PartialEq)]
    struct Tag;
    impl Component for Tag {}

    #[derive(Debug, Clone)]
    struct Counted(Rc<Cell<usize>>);
    impl Component for Counted {}
    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_make_entity_records_slots() {
        let mut world = World::new();
        let a = world.register::<A>();
        let b = world.register::<B>();

        let e = world
            .make_entity(&[&A(1), &B("one".into())], &[a, b])
            .unwrap();

        let record = world.record(e).unwrap();
        assert_eq!(record.index(), 0);
        assert_eq!(
            record.components(),
            &[
                ComponentSlot { type_id: a, row: 0 },
                ComponentSlot { type_id: b, row: 0 }
            ]
        );
        assert_eq!(world.get::<A>(e), Some(&A(1)));
        assert_eq!(world.get::<B>(e), Some(&B("one".into())));
        world.assert_consistent();
    }

    #[test]
    fn test_make_entity_invalid_type_is_all_or_nothing() {
        let mut world = World::new();
        let a = world.register::<A>();
        let bogus = ComponentTypeId(42);

        let result = world.make_entity(&[&A(1), &A(2)], &[a, bogus]);
        assert_eq!(result, Err(EcsError::InvalidComponentType(bogus)));
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.instance_count(a), 0);
        world.assert_consistent();
    }

    #[test]
    fn test_make_entity_rejects_bad_input() {
        let mut world = World::new();
        let a = world.register::<A>();
        let b = world.register::<B>();

        assert_eq!(
            world.make_entity(&[&A(1)], &[a, b]),
            Err(EcsError::BlueprintCount {
                blueprints: 1,
                types: 2
            })
        );
        assert_eq!(
            world.make_entity(&[&A(1)], &[b]),
            Err(EcsError::BlueprintMismatch(b))
        );
        assert_eq!(
            world.make_entity(&[&A(1), &A(2)], &[a, a]),
            Err(EcsError::DuplicateComponent(a))
        );
        assert_eq!(world.entity_count(), 0);
    }

    #[derive(Debug)]
    struct Fragile;
    impl Component for Fragile {}
    impl Clone for Fragile {
        fn clone(&self) -> Self {
            panic!("fragile component cannot be cloned");
        }
    }

    #[test]
    fn test_make_entity_rolls_back_on_panicking_clone() {
        let mut world = World::new();
        let a = world.register::<A>();
        let counted = world.register::<Counted>();
        let fragile = world.register::<Fragile>();
        let keep = world.make_entity(&[&A(7)], &[a]).unwrap();

        let drops = Rc::new(Cell::new(0));
        let prototype = Counted(drops.clone());
        let result = catch_unwind(AssertUnwindSafe(|| {
            world.make_entity(&[&A(1), &prototype, &Fragile], &[a, counted, fragile])
        }));
        assert!(result.is_err());

        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.instance_count(a), 1);
        assert_eq!(world.instance_count(counted), 0);
        assert_eq!(world.instance_count(fragile), 0);
        // The clone built before the panic was dropped during rollback.
        assert_eq!(drops.get(), 1);
        assert_eq!(world.get::<A>(keep), Some(&A(7)));
        world.assert_consistent();

        let e = world.make_entity(&[&A(2)], &[a]).unwrap();
        assert_eq!(world.get::<A>(e), Some(&A(2)));
        world.assert_consistent();
    }

    #[test]
    fn test_spawn_registers_types() {
        let mut world = World::new();
        let e = world
            .spawn(&EntityBlueprint::new().with(A(5)).with(Tag))
            .unwrap();
        assert_eq!(world.registry().len(), 2);
        assert_eq!(world.get::<A>(e), Some(&A(5)));
        assert!(world.has::<Tag>(e));
        assert!(!world.has::<B>(e));
    }

    #[test]
    fn test_swap_removal_repoints_moved_entity() {
        let mut world = World::new();
        let a = world.register::<A>();
        let entities: Vec<_> = (0..4)
            .map(|i| world.make_entity(&[&A(i)], &[a]).unwrap())
            .collect();

        // Remove a non-tail instance: the last entity's instance moves.
        assert_eq!(world.remove_component(entities[1], a), Ok(true));

        assert_eq!(world.instance_count(a), 3);
        assert_eq!(world.record(entities[3]).unwrap().row_of(a), Some(1));
        assert_eq!(world.get::<A>(entities[0]), Some(&A(0)));
        assert_eq!(world.get::<A>(entities[2]), Some(&A(2)));
        assert_eq!(world.get::<A>(entities[3]), Some(&A(3)));
        assert_eq!(world.get::<A>(entities[1]), None);
        world.assert_consistent();
    }

    #[test]
    fn test_remove_missing_component_is_not_found() {
        let mut world = World::new();
        let a = world.register::<A>();
        let b = world.register::<B>();
        let e = world.make_entity(&[&A(1)], &[a]).unwrap();

        assert_eq!(world.remove_component(e, b), Ok(false));
        assert_eq!(world.remove::<Tag>(e), Ok(false));
        assert_eq!(
            world.remove_component(e, ComponentTypeId(99)),
            Err(EcsError::InvalidComponentType(ComponentTypeId(99)))
        );
    }

    #[test]
    fn test_add_component() {
        let mut world = World::new();
        let a = world.register::<A>();
        let b = world.register::<B>();
        let e = world.make_entity(&[&A(1)], &[a]).unwrap();

        world.add_component(e, b, &B("late".into())).unwrap();
        assert_eq!(world.get::<B>(e), Some(&B("late".into())));
        assert_eq!(
            world.add_component(e, b, &B("again".into())),
            Err(EcsError::DuplicateComponent(b))
        );
        assert_eq!(
            world.add_component(e, a, &B("wrong".into())),
            Err(EcsError::BlueprintMismatch(a))
        );
        world.insert(e, Tag).unwrap();
        assert!(world.has::<Tag>(e));
        world.assert_consistent();
    }

    #[test]
    fn test_remove_entity_keeps_indices_dense() {
        let mut world = World::new();
        let a = world.register::<A>();
        let entities: Vec<_> = (0..5)
            .map(|i| world.make_entity(&[&A(i)], &[a]).unwrap())
            .collect();

        world.remove_entity(entities[0]).unwrap();
        world.remove_entity(entities[2]).unwrap();

        assert_eq!(world.entity_count(), 3);
        assert!(!world.contains(entities[0]));
        for &e in &[entities[1], entities[3], entities[4]] {
            let index = world.record(e).unwrap().index();
            assert_eq!(world.entities()[index], e);
        }
        assert_eq!(world.get::<A>(entities[4]), Some(&A(4)));
        world.assert_consistent();
    }

    #[test]
    fn test_stale_entity_is_rejected() {
        let mut world = World::new();
        let a = world.register::<A>();
        let e = world.make_entity(&[&A(1)], &[a]).unwrap();
        world.remove_entity(e).unwrap();

        assert_eq!(world.remove_entity(e), Err(EcsError::StaleEntity(e)));
        assert_eq!(world.remove_component(e, a), Err(EcsError::StaleEntity(e)));
        assert_eq!(world.insert(e, A(2)), Err(EcsError::StaleEntity(e)));
        assert_eq!(world.get::<A>(e), None);
        assert!(world.component(e, a).is_none());
    }

    #[test]
    fn test_component_pointer_resolves_owned_data() {
        let mut world = World::new();
        let a = world.register::<A>();
        let e = world.make_entity(&[&A(7)], &[a]).unwrap();
        let ptr = world.component(e, a).unwrap();
        // SAFETY: the pointer addresses a live `A` and the world is not mutated.
        assert_eq!(unsafe { ptr.cast::<A>().as_ref() }, &A(7));
    }

    #[test]
    fn test_get_mut_writes_through() {
        let mut world = World::new();
        let e = world.spawn(&EntityBlueprint::new().with(A(1))).unwrap();
        world.get_mut::<A>(e).unwrap().0 = 10;
        assert_eq!(world.get::<A>(e), Some(&A(10)));
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut world = World::new();
        let a = world.register::<A>();
        let b = world.register::<B>();

        let e1 = world
            .make_entity(&[&A(1), &B("b1".into())], &[a, b])
            .unwrap();
        let e2 = world.make_entity(&[&A(2)], &[a]).unwrap();

        assert_eq!(world.remove_component(e1, b), Ok(true));

        assert_eq!(world.instance_count(a), 2);
        assert_eq!(world.instance_count(b), 0);
        assert_eq!(world.get::<A>(e1), Some(&A(1)));
        assert_eq!(world.get::<A>(e2), Some(&A(2)));
        assert!(!world.has::<B>(e2));
        world.assert_consistent();
    }

    #[test]
    fn test_destructors_run_exactly_once() {
        let drops = Rc::new(Cell::new(0));
        let prefab = EntityBlueprint::new().with(Counted(drops.clone())).with(A(0));
        {
            let mut world = World::new();
            let entities: Vec<_> = (0..4).map(|_| world.spawn(&prefab).unwrap()).collect();
            world.remove_entity(entities[0]).unwrap();
            assert_eq!(drops.get(), 1);
            assert_eq!(world.remove::<Counted>(entities[1]), Ok(true));
            assert_eq!(drops.get(), 2);
        }
        assert_eq!(drops.get(), 4);
        drop(prefab);
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn test_random_operations_preserve_invariants() {
        let mut world = World::new();
        let a = world.register::<A>();
        let b = world.register::<B>();
        let tag = world.register::<Tag>();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut live: Vec<Entity> = Vec::new();

        for step in 0..2_000u32 {
            match rng.gen_range(0..5) {
                0 | 1 => {
                    let e = match rng.gen_range(0..3) {
                        0 => world.make_entity(&[&A(step)], &[a]),
                        1 => world.make_entity(&[&A(step), &B(step.to_string())], &[a, b]),
                        _ => world.make_entity(&[&Tag, &B(step.to_string())], &[tag, b]),
                    };
                    live.push(e.unwrap());
                }
                2 if !live.is_empty() => {
                    let e = live.swap_remove(rng.gen_range(0..live.len()));
                    world.remove_entity(e).unwrap();
                }
                3 if !live.is_empty() => {
                    let e = live[rng.gen_range(0..live.len())];
                    let type_id = [a, b, tag][rng.gen_range(0..3)];
                    let owned = world.record(e).unwrap().row_of(type_id).is_some();
                    assert_eq!(world.remove_component(e, type_id), Ok(owned));
                }
                4 if !live.is_empty() => {
                    let e = live[rng.gen_range(0..live.len())];
                    if !world.has::<A>(e) {
                        world.add_component(e, a, &A(step)).unwrap();
                    }
                }
                _ => {}
            }
            world.assert_consistent();
        }
        assert_eq!(world.entity_count(), live.len());
    }
}
