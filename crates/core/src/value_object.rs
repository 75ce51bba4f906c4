//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are never partially updated: a tenant
/// directory snapshot or a token digest is replaced wholesale, not mutated.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct TokenHash(String);
///
/// impl ValueObject for TokenHash {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
