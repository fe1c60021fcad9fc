//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Stores key their tables by `Entity::id`, so two values with the same id are
/// the same record at different points in time.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
