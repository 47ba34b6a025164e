//! Resource identity types.
//!
//! A resource is one physical subsystem (drivetrain, conveyor, intake arms)
//! that at most one command may drive at a time. Commands declare the set of
//! resources they need as a `ResourceSet`; the scheduler grants the whole set
//! or nothing.

use core::fmt;

use crate::consts::MAX_RESOURCES;

/// Opaque resource identifier (index into the scheduler's resource table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u8);

impl ResourceId {
    /// Create an id, returning `None` past `MAX_RESOURCES`.
    #[inline]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_RESOURCES {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// Fixed-capacity set of resources, one bit per `ResourceId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceSet(u32);

impl ResourceSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Set containing exactly one resource.
    #[inline]
    pub const fn single(id: ResourceId) -> Self {
        Self(1 << id.0)
    }

    /// Build a set from a slice of ids.
    pub fn of(ids: &[ResourceId]) -> Self {
        ids.iter().fold(Self::EMPTY, |acc, id| acc.with(*id))
    }

    /// Copy of this set with `id` added.
    #[inline]
    #[must_use]
    pub const fn with(self, id: ResourceId) -> Self {
        Self(self.0 | (1 << id.0))
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, id: ResourceId) -> bool {
        self.0 & (1 << id.0) != 0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = ResourceId> {
        let bits = self.0;
        (0..MAX_RESOURCES as u8).filter_map(move |i| {
            if bits & (1 << i) != 0 {
                Some(ResourceId(i))
            } else {
                None
            }
        })
    }
}

impl FromIterator<ResourceId> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = ResourceId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |acc, id| acc.with(id))
    }
}

/// Identity of one scheduled command instance.
///
/// Handles are never reused within a scheduler's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandHandle(pub u64);

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}
