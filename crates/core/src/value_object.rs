//! Value object trait: equality by value, not identity.
//!
//! Aggregated figures such as an order's total adjustment have no identity of
//! their own: two adjustments with the same components are the same value.

/// Marker trait for value objects.
///
/// Value objects are immutable: combining two of them produces a third and
/// leaves both inputs untouched. Callers can therefore hand out references to
/// values they own without worrying that an aggregation step rewrites them.
///
/// ```ignore
/// impl ValueObject for Adjustment {}
///
/// let total = a.combine(&b);   // a and b are unchanged
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
