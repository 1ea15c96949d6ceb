//! Packed, type-erased storage for all instances of one component type.
//!
//! A [`ComponentArena`] is a single aligned allocation holding instances
//! back to back, plus a parallel list of the entity that owns each row.
//! Instances only move when the tail is relocated into a hole left by
//! [`ComponentArena::swap_remove`].

use std::alloc::{self, Layout};
use std::any::{Any, TypeId};
use std::ptr::{self, NonNull};

use crate::component::{ComponentTypeId, ComponentVtable, ConstructFn, DropFn};
use crate::entity::Entity;

const MIN_CAPACITY: usize = 4;

/// Packed instances of a single component type.
#[derive(Debug)]
pub struct ComponentArena {
    type_id: ComponentTypeId,
    rust_type: TypeId,
    item: Layout,
    construct_fn: ConstructFn,
    drop_fn: Option<DropFn>,
    data: NonNull<u8>,
    /// Allocated rows.
    capacity: usize,
    /// `owners[row]` is the entity owning the instance at `row`.
    owners: Vec<Entity>,
}

impl ComponentArena {
    /// Creates an empty arena for the type described by `vtable`.
    #[must_use]
    pub fn new(type_id: ComponentTypeId, vtable: &ComponentVtable) -> Self {
        let item = vtable.layout();
        Self {
            type_id,
            rust_type: vtable.rust_type(),
            item,
            construct_fn: vtable.construct_fn(),
            drop_fn: vtable.drop_fn(),
            data: dangling(item.align()),
            capacity: if item.size() == 0 { usize::MAX } else { 0 },
            owners: Vec::new(),
        }
    }

    /// The component type stored here.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Rust type of the stored instances.
    #[must_use]
    pub fn rust_type(&self) -> TypeId {
        self.rust_type
    }

    /// Size of one instance in bytes.
    #[must_use]
    pub fn item_size(&self) -> usize {
        self.item.size()
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if the arena holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Bytes in use. Always `len() * item_size()`.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.len() * self.item.size()
    }

    /// Byte offset of `row` from the start of the arena.
    #[must_use]
    pub fn byte_offset(&self, row: usize) -> usize {
        row * self.item.size()
    }

    /// Entity owning the instance at `row`.
    #[must_use]
    pub fn owner(&self, row: usize) -> Option<Entity> {
        self.owners.get(row).copied()
    }

    /// Owners of every row, in row order.
    #[must_use]
    pub fn owners(&self) -> &[Entity] {
        &self.owners
    }

    /// Address of the instance at `row`.
    ///
    /// The pointer stays valid until the arena grows or `row` is removed.
    #[must_use]
    pub fn ptr(&self, row: usize) -> Option<NonNull<u8>> {
        if row >= self.len() {
            return None;
        }
        // SAFETY: `row` is live, so the offset stays inside the allocation.
        Some(unsafe { self.data.add(self.byte_offset(row)) })
    }

    /// Typed view of the instance at `row`.
    ///
    /// Returns `None` if `row` is out of range or `T` is not the stored type.
    #[must_use]
    pub fn get<T: 'static>(&self, row: usize) -> Option<&T> {
        if !self.holds::<T>() {
            return None;
        }
        // SAFETY: the row is live and holds a `T`.
        self.ptr(row).map(|ptr| unsafe { ptr.cast::<T>().as_ref() })
    }

    /// Typed mutable view of the instance at `row`.
    #[must_use]
    pub fn get_mut<T: 'static>(&mut self, row: usize) -> Option<&mut T> {
        if !self.holds::<T>() {
            return None;
        }
        // SAFETY: the row is live, holds a `T`, and `self` is borrowed mutably.
        self.ptr(row).map(|ptr| unsafe { ptr.cast::<T>().as_mut() })
    }

    /// All instances as a typed slice, in row order.
    #[must_use]
    pub fn as_slice<T: 'static>(&self) -> Option<&[T]> {
        if !self.holds::<T>() {
            return None;
        }
        // SAFETY: rows `0..len` are live `T`s laid out like an array.
        Some(unsafe { std::slice::from_raw_parts(self.data.cast::<T>().as_ptr(), self.len()) })
    }

    /// Returns `true` if the arena stores values of Rust type `T`.
    #[must_use]
    pub fn holds<T: 'static>(&self) -> bool {
        self.rust_type == TypeId::of::<T>()
    }

    /// Copy-constructs a new instance from `blueprint` at the tail.
    ///
    /// Returns the new row, or `None` if the blueprint has the wrong type.
    pub(crate) fn push(&mut self, owner: Entity, blueprint: &dyn Any) -> Option<usize> {
        if self.len() == self.capacity {
            self.grow();
        }
        let row = self.len();
        // SAFETY: `row < capacity`, so the slot is allocated and unused.
        let dest = unsafe { self.data.add(self.byte_offset(row)) };
        // SAFETY: `dest` is sized and aligned for the stored type.
        if !unsafe { (self.construct_fn)(blueprint, dest.as_ptr()) } {
            return None;
        }
        self.owners.push(owner);
        Some(row)
    }

    /// Destroys the instance at `row` and fills the hole with the tail.
    ///
    /// Returns the owner of the relocated instance, which now lives at
    /// `row` instead of the old last row. Returns `None` when `row` was the
    /// tail and nothing moved.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not live.
    pub(crate) fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        let len = self.len();
        assert!(
            row < len,
            "row {row} out of range for component type {} with {len} instances",
            self.type_id
        );
        let last = len - 1;
        // SAFETY: both rows are live.
        let (hole, tail) = unsafe {
            (
                self.data.add(self.byte_offset(row)),
                self.data.add(self.byte_offset(last)),
            )
        };

        if let Some(drop_fn) = self.drop_fn {
            // SAFETY: `hole` holds a live instance that is dropped exactly once.
            unsafe { drop_fn(hole.as_ptr()) };
        }

        if row == last {
            self.owners.pop();
            return None;
        }

        // SAFETY: distinct rows never overlap; the tail is moved bitwise and
        // its old slot is treated as uninitialised from here on.
        unsafe { ptr::copy_nonoverlapping(tail.as_ptr(), hole.as_ptr(), self.item.size()) };
        self.owners.swap_remove(row);
        Some(self.owners[row])
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity * 2).max(MIN_CAPACITY);
        let new_layout = self.array_layout(new_capacity);
        // SAFETY: zero-sized types never reach `grow`, so both layouts are
        // non-empty, and the old allocation was made with the old layout.
        let raw = unsafe {
            if self.capacity == 0 {
                alloc::alloc(new_layout)
            } else {
                let old_layout = self.array_layout(self.capacity);
                alloc::realloc(self.data.as_ptr(), old_layout, new_layout.size())
            }
        };
        self.data = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(new_layout));
        self.capacity = new_capacity;
    }

    fn array_layout(&self, rows: usize) -> Layout {
        self.item
            .size()
            .checked_mul(rows)
            .and_then(|size| Layout::from_size_align(size, self.item.align()).ok())
            .expect("component arena capacity overflow")
    }
}

impl Drop for ComponentArena {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.drop_fn {
            for row in 0..self.len() {
                // SAFETY: every row below `len` is live and dropped once.
                unsafe { drop_fn(self.data.add(self.byte_offset(row)).as_ptr()) };
            }
        }
        if self.item.size() != 0 && self.capacity != 0 {
            // SAFETY: the buffer was allocated with this layout by `grow`.
            unsafe { alloc::dealloc(self.data.as_ptr(), self.array_layout(self.capacity)) };
        }
    }
}

fn dangling(align: usize) -> NonNull<u8> {
    // SAFETY: alignments are non-zero.
    unsafe { NonNull::new_unchecked(ptr::without_provenance_mut(align)) }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use slotmap::SlotMap;

    use super::*;
    use crate::component::Component;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f64,
        y: f64,
    }
    impl Component for Position {}

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

    fn entities(n: usize) -> Vec<Entity> {
        let mut keys = SlotMap::<Entity, ()>::with_key();
        (0..n).map(|_| keys.insert(())).collect()
    }

    fn arena_of<T: Component>() -> ComponentArena {
        ComponentArena::new(ComponentTypeId(0), &ComponentVtable::of::<T>())
    }

    #[test]
    fn test_push_packs_instances() {
        let owners = entities(3);
        let mut arena = arena_of::<Position>();
        for (i, &owner) in owners.iter().enumerate() {
            let row = arena.push(owner, &Position { x: i as f64, y: 0.0 });
            assert_eq!(row, Some(i));
        }
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.byte_len(), 3 * std::mem::size_of::<Position>());
        assert_eq!(arena.get::<Position>(2).unwrap().x, 2.0);
        assert_eq!(arena.owners(), owners.as_slice());
    }

    #[test]
    fn test_push_rejects_wrong_blueprint() {
        let owners = entities(1);
        let mut arena = arena_of::<Position>();
        assert_eq!(arena.push(owners[0], &Tag), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_growth_keeps_data() {
        let owners = entities(100);
        let mut arena = arena_of::<Position>();
        for (i, &owner) in owners.iter().enumerate() {
            arena.push(owner, &Position { x: i as f64, y: -(i as f64) });
        }
        let slice = arena.as_slice::<Position>().unwrap();
        assert_eq!(slice.len(), 100);
        for (i, position) in slice.iter().enumerate() {
            assert_eq!(position.x, i as f64);
            assert_eq!(position.y, -(i as f64));
        }
    }

    #[test]
    fn test_swap_remove_relocates_tail() {
        let owners = entities(3);
        let mut arena = arena_of::<Position>();
        for (i, &owner) in owners.iter().enumerate() {
            arena.push(owner, &Position { x: i as f64, y: 0.0 });
        }

        let moved = arena.swap_remove(0);
        assert_eq!(moved, Some(owners[2]));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.byte_len(), 2 * arena.item_size());
        assert_eq!(arena.get::<Position>(0).unwrap().x, 2.0);
        assert_eq!(arena.get::<Position>(1).unwrap().x, 1.0);
        assert_eq!(arena.owners(), &[owners[2], owners[1]]);
    }

    #[test]
    fn test_swap_remove_tail_moves_nothing() {
        let owners = entities(2);
        let mut arena = arena_of::<Position>();
        arena.push(owners[0], &Position { x: 0.0, y: 0.0 });
        arena.push(owners[1], &Position { x: 1.0, y: 0.0 });
        assert_eq!(arena.swap_remove(1), None);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.owner(0), Some(owners[0]));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_swap_remove_out_of_range_panics() {
        let mut arena = arena_of::<Position>();
        arena.swap_remove(0);
    }

    #[test]
    fn test_destructor_runs_once_per_instance() {
        let drops = Rc::new(Cell::new(0));
        let owners = entities(3);
        let mut arena = arena_of::<Counted>();
        let blueprint = Counted(drops.clone());
        for &owner in &owners {
            arena.push(owner, &blueprint);
        }
        assert_eq!(drops.get(), 0);

        arena.swap_remove(0);
        assert_eq!(drops.get(), 1);

        drop(arena);
        assert_eq!(drops.get(), 3);
        drop(blueprint);
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn test_zero_sized_instances() {
        let owners = entities(3);
        let mut arena = arena_of::<Tag>();
        for &owner in &owners {
            assert!(arena.push(owner, &Tag).is_some());
        }
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.byte_len(), 0);
        assert_eq!(arena.swap_remove(0), Some(owners[2]));
        assert_eq!(arena.get::<Tag>(1), Some(&Tag));
    }

    #[test]
    fn test_typed_access_checks_type() {
        let owners = entities(1);
        let mut arena = arena_of::<Position>();
        arena.push(owners[0], &Position { x: 1.0, y: 2.0 });
        assert!(arena.get::<Tag>(0).is_none());
        assert!(arena.as_slice::<Tag>().is_none());
        assert!(arena.get::<Position>(1).is_none());

        arena.get_mut::<Position>(0).unwrap().y = 5.0;
        assert_eq!(arena.get::<Position>(0).unwrap().y, 5.0);
    }
}
