//! System declarations and the ordered list of registered systems.
//!
//! A system declares the component types it touches, each either mandatory
//! or optional, and supplies an update closure. The
//! [`SystemList`] rejects declarations that could not be dispatched.

use tracing::{debug, warn};

use crate::component::ComponentTypeId;
use crate::dispatch::SystemContext;
use crate::error::{EcsError, Result};

/// How a system depends on one declared component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Entities without this component are skipped.
    Required,
    /// Entities without this component are still visited; the slot is empty.
    Optional,
}

/// The component types a system is dispatched over, in argument order.
#[derive(Debug, Clone)]
pub struct SystemDescriptor {
    /// Human-readable system name, used in logs and errors.
    pub name: String,
    /// Declared component types and their access, in argument order.
    pub params: Vec<(ComponentTypeId, Access)>,
}

impl SystemDescriptor {
    /// Creates a descriptor with no component types.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Adds a mandatory component type.
    #[must_use]
    pub fn require(mut self, type_id: ComponentTypeId) -> Self {
        self.params.push((type_id, Access::Required));
        self
    }

    /// Adds an optional component type.
    #[must_use]
    pub fn optional(mut self, type_id: ComponentTypeId) -> Self {
        self.params.push((type_id, Access::Optional));
        self
    }

    /// Declared component types in argument order.
    pub fn types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.params.iter().map(|&(type_id, _)| type_id)
    }

    /// Mandatory component types in declaration order.
    pub fn required_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.params
            .iter()
            .filter(|(_, access)| *access == Access::Required)
            .map(|&(type_id, _)| type_id)
    }

    /// A system is valid if at least one declared type is mandatory.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.required_types().next().is_some()
    }

    /// Checks the declaration for dispatchability.
    pub fn validate(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(EcsError::NoMandatoryComponent(self.name.clone()));
        }
        for (position, &(type_id, _)) in self.params.iter().enumerate() {
            if self.params[..position].iter().any(|&(seen, _)| seen == type_id) {
                return Err(EcsError::DuplicateSystemComponent {
                    system: self.name.clone(),
                    type_id,
                });
            }
        }
        Ok(())
    }
}

/// Update callback of a system, called once per matching entity.
pub type UpdateFn = Box<dyn FnMut(&mut SystemContext<'_>)>;

/// A declaration plus the logic run for every matching entity.
pub struct System {
    descriptor: SystemDescriptor,
    update: UpdateFn,
}

impl System {
    /// Creates a system from its declaration and update callback.
    pub fn new<F>(descriptor: SystemDescriptor, update: F) -> Self
    where
        F: FnMut(&mut SystemContext<'_>) + 'static,
    {
        Self {
            descriptor,
            update: Box::new(update),
        }
    }

    /// The system's declaration.
    #[must_use]
    pub fn descriptor(&self) -> &SystemDescriptor {
        &self.descriptor
    }

    /// The system's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub(crate) fn parts_mut(&mut self) -> (&SystemDescriptor, &mut UpdateFn) {
        (&self.descriptor, &mut self.update)
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`SystemList::add_system`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(u64);

/// Registered systems, dispatched in registration order.
#[derive(Debug, Default)]
pub struct SystemList {
    systems: Vec<(SystemId, System)>,
    next_id: u64,
}

impl SystemList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system.
    ///
    /// Systems without a mandatory component type, or that list a type
    /// twice, are rejected and never dispatched.
    pub fn add_system(&mut self, system: System) -> Result<SystemId> {
        if let Err(err) = system.descriptor.validate() {
            warn!(system = system.name(), %err, "rejected system");
            return Err(err);
        }
        let id = SystemId(self.next_id);
        self.next_id += 1;
        debug!(
            system = system.name(),
            params = system.descriptor.params.len(),
            "registered system"
        );
        self.systems.push((id, system));
        Ok(id)
    }

    /// Removes a system, keeping the order of the rest.
    ///
    /// Returns `true` if the system was found.
    pub fn remove_system(&mut self, id: SystemId) -> bool {
        match self.systems.iter().position(|(candidate, _)| *candidate == id) {
            Some(position) => {
                self.systems.remove(position);
                true
            }
            None => false,
        }
    }

    /// Returns a registered system.
    #[must_use]
    pub fn get(&self, id: SystemId) -> Option<&System> {
        self.systems
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, system)| system)
    }

    /// Systems in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &System> {
        self.systems.iter().map(|(_, system)| system)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut System> {
        self.systems.iter_mut().map(|(_, system)| system)
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
