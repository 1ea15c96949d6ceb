//! Owned sets of typed component blueprints.

use std::any::{Any, TypeId};

use crate::component::{Component, ComponentVtable};

/// Prototype values for the components of one entity.
///
/// A blueprint is plain data: spawning copies every value into the world's
/// arenas and leaves the blueprint intact, so one blueprint can stamp out
/// any number of entities.
///
/// ```rust
/// use engine_ecs::{Component, EntityBlueprint, World};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Position(f32, f32);
/// impl Component for Position {}
///
/// let mut world = World::new();
/// let prefab = EntityBlueprint::new().with(Position(1.0, 2.0));
/// let a = world.spawn(&prefab).unwrap();
/// let b = world.spawn(&prefab).unwrap();
/// assert_eq!(world.get::<Position>(a), world.get::<Position>(b));
/// ```
#[derive(Debug, Default)]
pub struct EntityBlueprint {
    parts: Vec<(ComponentVtable, Box<dyn Any>)>,
}

impl EntityBlueprint {
    /// Creates an empty blueprint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component value. A second value of the same type replaces
    /// the first.
    #[must_use]
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.set(value);
        self
    }

    /// Adds or replaces a component value in place.
    pub fn set<T: Component>(&mut self, value: T) {
        let rust_type = TypeId::of::<T>();
        match self
            .parts
            .iter_mut()
            .find(|(vtable, _)| vtable.rust_type() == rust_type)
        {
            Some((_, existing)) => *existing = Box::new(value),
            None => self.parts.push((ComponentVtable::of::<T>(), Box::new(value))),
        }
    }

    /// Returns `true` if the blueprint has a value of type `T`.
    #[must_use]
    pub fn contains<T: Component>(&self) -> bool {
        let rust_type = TypeId::of::<T>();
        self.parts.iter().any(|(vtable, _)| vtable.rust_type() == rust_type)
    }

    /// Number of component values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if the blueprint has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn parts(&self) -> impl Iterator<Item = (&ComponentVtable, &dyn Any)> {
        self.parts.iter().map(|(vtable, value)| (vtable, &**value))
    }
}
