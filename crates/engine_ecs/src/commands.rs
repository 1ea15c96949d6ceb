//! Deferred structural changes.

use std::any::{Any, TypeId};

use tracing::{debug, warn};

use crate::blueprint::EntityBlueprint;
use crate::component::{Component, ComponentVtable};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

#[derive(Debug)]
enum Command {
    Spawn(EntityBlueprint),
    Despawn(Entity),
    Insert {
        entity: Entity,
        vtable: ComponentVtable,
        value: Box<dyn Any>,
    },
    Remove {
        entity: Entity,
        rust_type: TypeId,
    },
}

/// A queue of entity and component changes, applied in push order.
///
/// Systems cannot change the world while it is being iterated; they push
/// changes here instead and the dispatcher applies them after the pass.
#[derive(Debug, Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues creation of an entity from `blueprint`.
    pub fn spawn(&mut self, blueprint: EntityBlueprint) {
        self.queue.push(Command::Spawn(blueprint));
    }

    /// Queues removal of `entity` and all its components.
    pub fn despawn(&mut self, entity: Entity) {
        self.queue.push(Command::Despawn(entity));
    }

    /// Queues attaching `value` to `entity`.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) {
        self.queue.push(Command::Insert {
            entity,
            vtable: ComponentVtable::of::<T>(),
            value: Box::new(value),
        });
    }

    /// Queues removing the `T` component of `entity`.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        self.queue.push(Command::Remove {
            entity,
            rust_type: TypeId::of::<T>(),
        });
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Applies and drains every queued command.
    ///
    /// A failing command is logged and skipped; the rest still run. Returns
    /// the number of commands that succeeded.
    pub fn apply(&mut self, world: &mut World) -> usize {
        let total = self.queue.len();
        let mut applied = 0;
        for command in self.queue.drain(..) {
            match run(command, world) {
                Ok(()) => applied += 1,
                Err(err) => warn!(%err, "dropped deferred command"),
            }
        }
        if total > 0 {
            debug!(applied, total, "applied deferred commands");
        }
        applied
    }
}

fn run(command: Command, world: &mut World) -> Result<()> {
    match command {
        Command::Spawn(blueprint) => world.spawn(&blueprint).map(drop),
        Command::Despawn(entity) => world.remove_entity(entity),
        Command::Insert {
            entity,
            vtable,
            value,
        } => {
            let type_id = world.registry.register_vtable(vtable);
            world.add_component(entity, type_id, &*value)
        }
        Command::Remove { entity, rust_type } => {
            match world.registry.id_of_rust_type(rust_type) {
                Some(type_id) => world.remove_component(entity, type_id).map(drop),
                None if world.contains(entity) => Ok(()),
                None => Err(EcsError::StaleEntity(entity)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Shield;
    impl Component for Shield {}

    #[test]
    fn test_queue_does_not_touch_world_until_applied() {
        let mut world = World::new();
        let mut commands = Commands::new();
        commands.spawn(EntityBlueprint::new().with(Health(3)));
        assert_eq!(commands.len(), 1);
        assert_eq!(world.entity_count(), 0);

        assert_eq!(commands.apply(&mut world), 1);
        assert!(commands.is_empty());
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_insert_and_remove_in_order() {
        let mut world = World::new();
        let e = world.spawn(&EntityBlueprint::new().with(Health(1))).unwrap();

        let mut commands = Commands::new();
        commands.insert(e, Shield);
        commands.remove::<Health>(e);
        commands.apply(&mut world);

        assert!(world.has::<Shield>(e));
        assert!(!world.has::<Health>(e));
        world.assert_consistent();
    }

    #[test]
    fn test_failures_are_skipped() {
        let mut world = World::new();
        let e = world.spawn(&EntityBlueprint::new().with(Health(1))).unwrap();

        let mut commands = Commands::new();
        commands.despawn(e);
        commands.insert(e, Shield);
        commands.despawn(e);
        commands.spawn(EntityBlueprint::new().with(Shield));

        assert_eq!(commands.apply(&mut world), 2);
        assert_eq!(world.entity_count(), 1);
        world.assert_consistent();
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let mut world = World::new();
        let e = world.spawn(&EntityBlueprint::new().with(Health(1))).unwrap();

        let mut commands = Commands::new();
        commands.insert(e, Health(2));
        assert_eq!(commands.apply(&mut world), 0);
        assert_eq!(world.get::<Health>(e), Some(&Health(1)));
    }
}
