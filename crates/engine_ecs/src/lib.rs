//! # engine_ecs
//!
//! Entity-component-system core of the renderer.
//!
//! Components of one type live packed in a single byte arena; removing one
//! moves the arena's tail into the hole and repoints the owning entity.
//! Systems declare the component types they touch and are called once per
//! matching entity, iterating the least common mandatory type.
//!
//! This crate provides:
//!
//! - [`ComponentRegistry`] and [`Component`]: type ids and per-type vtables.
//! - [`ComponentArena`] and [`ComponentStorage`]: packed per-type storage.
//! - [`EntityRegistry`]: dense live-entity list with generational handles.
//! - [`World`]: entity lifecycle and component access.
//! - [`SystemList`] and [`World::update_systems`]: system dispatch.
//! - [`Commands`]: structural changes deferred past a dispatch pass.
//!
//! ## Usage
//!
//! ```rust
//! use engine_ecs::{Component, System, SystemContext, SystemDescriptor, SystemList, World};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position(f32);
//! impl Component for Position {}
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity(f32);
//! impl Component for Velocity {}
//!
//! let mut world = World::new();
//! let position = world.register::<Position>();
//! let velocity = world.register::<Velocity>();
//! let e = world
//!     .make_entity(&[&Position(0.0), &Velocity(2.0)], &[position, velocity])
//!     .unwrap();
//!
//! let mut systems = SystemList::new();
//! systems
//!     .add_system(System::new(
//!         SystemDescriptor::new("integrate").require(position).optional(velocity),
//!         |ctx: &mut SystemContext<'_>| {
//!             let v = ctx.get::<Velocity>(1).map_or(0.0, |v| v.0);
//!             let dt = ctx.dt;
//!             if let Some(p) = ctx.get_mut::<Position>(0) {
//!                 p.0 += v * dt;
//!             }
//!         },
//!     ))
//!     .unwrap();
//!
//! world.update_systems(&mut systems, 0.5);
//! assert_eq!(world.get::<Position>(e), Some(&Position(1.0)));
//! ```

pub mod arena;
pub mod blueprint;
pub mod commands;
pub mod component;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod registry;
pub mod storage;
pub mod system;
pub mod world;

pub use arena::ComponentArena;
pub use blueprint::EntityBlueprint;
pub use commands::Commands;
pub use component::{Component, ComponentTypeId, ComponentVtable, ConstructFn, DropFn};
pub use dispatch::SystemContext;
pub use entity::{ComponentSlot, Entity, EntityRecord, EntityRegistry};
pub use error::{EcsError, Result};
pub use registry::ComponentRegistry;
pub use storage::{ComponentStorage, Relocation};
pub use system::{Access, System, SystemDescriptor, SystemId, SystemList, UpdateFn};
pub use world::World;
