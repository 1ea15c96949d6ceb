//! Core [`Component`] trait and the type-erased descriptor used by storage.
//!
//! Component data lives in byte arenas that know nothing about Rust types.
//! Everything the arenas need to build, move and destroy an instance is
//! captured once per type in a [`ComponentVtable`].

use std::alloc::Layout;
use std::any::{Any, TypeId};
use std::fmt;

/// Dense, zero-based identifier of a registered component type.
///
/// Ids are handed out sequentially by the
/// [`ComponentRegistry`](crate::ComponentRegistry) and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u32);

impl ComponentTypeId {
    /// Returns the id as an index into per-type tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Copy-constructs an instance from a type-erased blueprint into `dest`.
///
/// Returns `false`, without touching `dest`, when the blueprint has the
/// wrong Rust type.
pub type ConstructFn = unsafe fn(blueprint: &dyn Any, dest: *mut u8) -> bool;

/// Runs the destructor of the instance at the given address in place.
pub type DropFn = unsafe fn(instance: *mut u8);

/// The core component trait.
///
/// Components are plain data. They are copy-constructed from a blueprint
/// with [`Clone`] and afterwards relocated by raw byte copies, which every
/// Rust value tolerates.
///
/// # Examples
///
/// ```rust
/// use engine_ecs::Component;
///
/// #[derive(Debug, Clone)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: Clone + 'static {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Metadata about a component type, used for type-erased storage.
///
/// Arenas trust every field to describe the same Rust type, so the only
/// way to obtain a vtable is [`ComponentVtable::of`]:
///
/// ```rust,compile_fail
/// use std::any::TypeId;
/// use engine_ecs::{Component, ComponentVtable};
///
/// #[derive(Clone)]
/// struct Word(usize, usize, usize);
/// impl Component for Word {}
///
/// let forged = ComponentVtable {
///     rust_type: TypeId::of::<String>(),
///     ..ComponentVtable::of::<Word>()
/// };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ComponentVtable {
    name: &'static str,
    rust_type: TypeId,
    layout: Layout,
    construct_fn: ConstructFn,
    drop_fn: Option<DropFn>,
}

impl ComponentVtable {
    /// Builds the descriptor for component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            name: T::type_name(),
            rust_type: TypeId::of::<T>(),
            layout: Layout::new::<T>(),
            construct_fn: construct::<T>,
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(destruct::<T>)
            } else {
                None
            },
        }
    }

    /// The human-readable name of the component.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The Rust type stored under this descriptor.
    #[must_use]
    pub fn rust_type(&self) -> TypeId {
        self.rust_type
    }

    /// Size and alignment of one instance.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Builds an instance from a blueprint.
    #[must_use]
    pub fn construct_fn(&self) -> ConstructFn {
        self.construct_fn
    }

    /// Drops an instance in place, `None` when the type has no drop glue.
    #[must_use]
    pub fn drop_fn(&self) -> Option<DropFn> {
        self.drop_fn
    }

    /// Size of one instance in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Returns `true` if `blueprint` can be used to construct this type.
    #[must_use]
    pub fn accepts(&self, blueprint: &dyn Any) -> bool {
        Any::type_id(blueprint) == self.rust_type
    }
}

unsafe fn construct<T: Component>(blueprint: &dyn Any, dest: *mut u8) -> bool {
    let Some(blueprint) = blueprint.downcast_ref::<T>() else {
        return false;
    };
    // Clone before writing so a panicking clone leaves `dest` untouched.
    let value = blueprint.clone();
    // SAFETY: the caller hands out a slot sized and aligned for `T`.
    unsafe { std::ptr::write(dest.cast::<T>(), value) };
    true
}

unsafe fn destruct<T: Component>(instance: *mut u8) {
    // SAFETY: the caller guarantees `instance` holds a live `T`.
    unsafe { std::ptr::drop_in_place(instance.cast::<T>()) };
}
