//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Only persisted records implement this; transient drafts have no identity yet.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
