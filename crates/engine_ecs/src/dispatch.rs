//! Per-tick system dispatch.
//!
//! For every registered system the dispatcher picks the mandatory component
//! type with the fewest live instances as the driver, walks that type's
//! arena row by row, and resolves the system's other declared types on the
//! same owning entity. Entities missing a mandatory type are skipped;
//! missing optional types leave their argument slot empty.
//!
//! Dispatch borrows the [`World`] exclusively, so callbacks cannot create or
//! destroy components mid-pass. Structural changes go through the
//! [`Commands`] queue and are applied once every system has run.

use std::any::TypeId;
use std::ptr::NonNull;
use std::time::Instant;

use tracing::trace;

use crate::arena::ComponentArena;
use crate::commands::Commands;
use crate::component::ComponentTypeId;
use crate::entity::Entity;
use crate::storage::ComponentStorage;
use crate::system::{Access, SystemDescriptor, SystemList, UpdateFn};
use crate::world::World;

#[derive(Debug, Clone, Copy)]
struct ResolvedSlot {
    ptr: NonNull<u8>,
    rust_type: TypeId,
}

/// What a system callback sees for one matching entity.
///
/// Component slots follow the system's declaration order. The references
/// handed out are only valid for the duration of the callback.
#[derive(Debug)]
pub struct SystemContext<'a> {
    /// Seconds since the previous frame.
    pub dt: f32,
    /// Number of the dispatch pass, starting at 1.
    pub tick_id: u64,
    entity: Entity,
    slots: &'a [Option<ResolvedSlot>],
    commands: &'a mut Commands,
}

impl SystemContext<'_> {
    /// The entity being visited.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Number of declared component slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the system declared no component types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if the component in `slot` was resolved.
    ///
    /// Only optional slots can be absent.
    #[must_use]
    pub fn is_present(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    /// Raw address of the component in `slot`.
    #[must_use]
    pub fn ptr(&self, slot: usize) -> Option<NonNull<u8>> {
        self.resolved(slot).map(|resolved| resolved.ptr)
    }

    /// The component in `slot` as a `T`.
    ///
    /// Returns `None` if the slot is absent or holds another type.
    #[must_use]
    pub fn get<T: 'static>(&self, slot: usize) -> Option<&T> {
        let resolved = self.typed::<T>(slot)?;
        // SAFETY: the slot addresses a live `T`; the world is exclusively
        // borrowed by the dispatcher for as long as `self` exists.
        Some(unsafe { resolved.ptr.cast::<T>().as_ref() })
    }

    /// The component in `slot` as a mutable `T`.
    #[must_use]
    pub fn get_mut<T: 'static>(&mut self, slot: usize) -> Option<&mut T> {
        let resolved = self.typed::<T>(slot)?;
        // SAFETY: as in `get`; declared types are distinct, so every slot is
        // a different instance, and `&mut self` prevents a second borrow.
        Some(unsafe { resolved.ptr.cast::<T>().as_mut() })
    }

    /// Queue for structural changes applied after the pass.
    pub fn commands(&mut self) -> &mut Commands {
        self.commands
    }

    fn resolved(&self, slot: usize) -> Option<ResolvedSlot> {
        self.slots.get(slot).copied().flatten()
    }

    fn typed<T: 'static>(&self, slot: usize) -> Option<ResolvedSlot> {
        self.resolved(slot)
            .filter(|resolved| resolved.rust_type == TypeId::of::<T>())
    }
}

/// Scratch state shared by all systems of one pass.
struct Pass {
    dt: f32,
    tick_id: u64,
    slots: Vec<Option<ResolvedSlot>>,
    commands: Commands,
}

impl World {
    /// Runs every system in `systems` once over its matching entities.
    ///
    /// Commands queued by the callbacks are applied after the last system.
    pub fn update_systems(&mut self, systems: &mut SystemList, dt: f32) {
        self.tick += 1;
        let mut pass = Pass {
            dt,
            tick_id: self.tick,
            slots: Vec::new(),
            commands: Commands::new(),
        };

        for system in systems.iter_mut() {
            let (descriptor, update) = system.parts_mut();
            let started = Instant::now();
            let visited = self.run_system(descriptor, update, &mut pass);
            trace!(
                system = %descriptor.name,
                visited,
                elapsed = ?started.elapsed(),
                "system pass"
            );
        }

        pass.commands.apply(self);
    }

    /// The mandatory type with the fewest live instances, first in
    /// declaration order on ties.
    #[must_use]
    pub fn select_driver(&self, descriptor: &SystemDescriptor) -> Option<ComponentTypeId> {
        descriptor
            .required_types()
            .min_by_key(|&type_id| self.storage.instance_count(type_id))
    }

    /// Returns how many entities the system was invoked for.
    fn run_system(&self, descriptor: &SystemDescriptor, update: &mut UpdateFn, pass: &mut Pass) -> usize {
        let Some(driver) = self.select_driver(descriptor) else {
            return 0;
        };
        let Some(driver_arena) = self.storage.arena(driver) else {
            return 0;
        };

        if descriptor.params.len() == 1 {
            for (row, &owner) in driver_arena.owners().iter().enumerate() {
                pass.slots.clear();
                pass.slots.push(resolve(driver_arena, row));
                invoke(update, pass, owner);
            }
            return driver_arena.len();
        }

        let arenas: Vec<Option<&ComponentArena>> = descriptor
            .types()
            .map(|type_id| self.storage.arena(type_id))
            .collect();

        let mut visited = 0;
        'rows: for (row, &owner) in driver_arena.owners().iter().enumerate() {
            let record = self.entities.get(owner).unwrap_or_else(|| {
                panic!("component {driver} at row {row} belongs to dead {owner:?}")
            });

            pass.slots.clear();
            for (&(type_id, access), &arena) in descriptor.params.iter().zip(&arenas) {
                let resolved = if type_id == driver {
                    resolve(driver_arena, row)
                } else {
                    arena.and_then(|arena| {
                        let row = ComponentStorage::lookup(record.components(), type_id)?;
                        resolve(arena, row)
                    })
                };
                if resolved.is_none() && access == Access::Required {
                    continue 'rows;
                }
                pass.slots.push(resolved);
            }

            invoke(update, pass, owner);
            visited += 1;
        }
        visited
    }
}

fn resolve(arena: &ComponentArena, row: usize) -> Option<ResolvedSlot> {
    arena.ptr(row).map(|ptr| ResolvedSlot {
        ptr,
        rust_type: arena.rust_type(),
    })
}

fn invoke(update: &mut UpdateFn, pass: &mut Pass, entity: Entity) {
    let mut ctx = SystemContext {
        dt: pass.dt,
        tick_id: pass.tick_id,
        entity,
        slots: &pass.slots,
        commands: &mut pass.commands,
    };
    update(&mut ctx);
}
