//! Error types for the registry surface.
//!
//! This module declares focused, composable error types for the four failure
//! kinds a registry operation can report, plus the component-capacity limit.
//! Each error carries enough structured context to make failures actionable
//! while remaining small and cheap to pass around or convert into the
//! aggregate [`ECSError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (stale
//!   entity handles, unregistered component types, absent component values,
//!   unbuildable view descriptors).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into [`ECSError`] so
//!   call sites can use `?` freely.
//! * **Actionability:** Structured fields (offending index and version,
//!   component type names, the full list of unknown view types) make logs
//!   useful without reproducing the issue.
//!
//! ## Propagation
//! All failures are fatal to the call that raised them; nothing in the
//! registry catches or retries. Callers who want to probe instead of raise
//! use the query surface (`get_opt`, `has`, `is_empty`).
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

use crate::engine::types::{IndexID, VersionID};

/// Returned when an entity handle fails validation.
///
/// A handle is invalid when its slot is out of range, the slot is not live,
/// or the stored version no longer matches (the entity was destroyed and the
/// slot possibly reused).
///
/// ### Fields
/// * `index` — Slot index carried by the offending handle.
/// * `version` — Version carried by the offending handle.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidEntityError {
    /// Slot index carried by the handle.
    pub index: IndexID,

    /// Version carried by the handle.
    pub version: VersionID,
}

impl fmt::Display for InvalidEntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid entity handle (index {}, version {})",
            self.index, self.version
        )
    }
}

impl std::error::Error for InvalidEntityError {}

/// Returned when an operation references a component type for which no pool
/// exists.
///
/// Registering the component (explicitly, or implicitly by adding a value of
/// it to any entity) pre-empts this error.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidComponentError {
    /// Rust type name of the unregistered component.
    pub name: &'static str,
}

impl fmt::Display for InvalidComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no component pool registered for {}", self.name)
    }
}

impl std::error::Error for InvalidComponentError {}

/// Returned when a pool exists but the entity owns no value of that type.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingComponentError {
    /// Rust type name of the absent component.
    pub name: &'static str,

    /// Slot index of the entity that was queried.
    pub index: IndexID,
}

impl fmt::Display for MissingComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entity (index {}) has no {} component",
            self.index, self.name
        )
    }
}

impl std::error::Error for MissingComponentError {}

/// Returned when a view descriptor references one or more component types
/// with no registered pool at build time.
///
/// The message enumerates every unknown type, not just the first, so a
/// mis-ordered setup can be fixed in one pass.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidViewError {
    /// Rust type names of every unresolvable component in the descriptor.
    pub unknown: Vec<&'static str>,
}

impl fmt::Display for InvalidViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "view descriptor references unregistered component types: {}",
            self.unknown.join(", ")
        )
    }
}

impl std::error::Error for InvalidViewError {}

/// Returned when the registry cannot assign another component id.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError {
    /// The fixed component-id capacity that was exhausted.
    pub cap: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component type limit reached (capacity {})", self.cap)
    }
}

impl std::error::Error for CapacityError {}

/// Aggregate error for all registry operations.
///
/// `From<T>` conversions are implemented for every focused error type so
/// low-level failures bubble up through `?` while retaining their structure.
///
/// ### Display
/// Single-line, human-readable messages suitable for logs. For deep
/// inspection, prefer `Debug`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ECSError {
    /// An entity handle failed validation.
    InvalidEntity(InvalidEntityError),

    /// A component type had no registered pool.
    InvalidComponent(InvalidComponentError),

    /// A pool existed but the entity owned no value of the type.
    MissingComponent(MissingComponentError),

    /// A view descriptor referenced unregistered component types.
    InvalidView(InvalidViewError),

    /// The component-id capacity was exhausted.
    Capacity(CapacityError),
}

impl fmt::Display for ECSError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ECSError::InvalidEntity(e) => write!(f, "{e}"),
            ECSError::InvalidComponent(e) => write!(f, "{e}"),
            ECSError::MissingComponent(e) => write!(f, "{e}"),
            ECSError::InvalidView(e) => write!(f, "{e}"),
            ECSError::Capacity(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ECSError {}

impl From<InvalidEntityError> for ECSError {
    fn from(e: InvalidEntityError) -> Self {
        ECSError::InvalidEntity(e)
    }
}
impl From<InvalidComponentError> for ECSError {
    fn from(e: InvalidComponentError) -> Self {
        ECSError::InvalidComponent(e)
    }
}
impl From<MissingComponentError> for ECSError {
    fn from(e: MissingComponentError) -> Self {
        ECSError::MissingComponent(e)
    }
}
impl From<InvalidViewError> for ECSError {
    fn from(e: InvalidViewError) -> Self {
        ECSError::InvalidView(e)
    }
}
impl From<CapacityError> for ECSError {
    fn from(e: CapacityError) -> Self {
        ECSError::Capacity(e)
    }
}

/// Convenience result alias used across the crate.
pub type ECSResult<T> = Result<T, ECSError>;
