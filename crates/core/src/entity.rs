//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Credential records (refresh tokens, revoked access tokens) are entities:
/// two records with equal attributes but different ids are still different
/// credentials.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
