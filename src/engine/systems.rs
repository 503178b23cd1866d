//! System abstractions for the phased lifecycle.
//!
//! A **system** is a unit of user logic bound to a [`ViewDescriptor`] and
//! one or more lifecycle phases. Systems:
//! - declare the phases they participate in via [`System::phases`],
//! - carry their own view descriptor,
//! - receive one [`Cursor`] per visited entity when dispatched.
//!
//! ## Phase model
//!
//! The scheduler drives six hooks: `Start` and `End` run once around the
//! session; `PreProcess`, `Process`, and `PostProcess` run every tick;
//! `SingleFrame` runs for one-shot systems drained from the queue after
//! every dispatched system. A system implements any subset and declares
//! that subset in its [`PhaseSet`] — the declaration replaces runtime
//! interface probing, which Rust's trait objects cannot do.
//!
//! ## Execution
//!
//! Dispatch is sequential and single-threaded: per system, the scheduler
//! builds a view from the system's descriptor and hands each cursor to the
//! matching hook. A hook returning an error aborts the active phase and
//! propagates to the caller; the scheduler installs no catch-all.

use std::any::{type_name, Any};

use crate::engine::error::ECSResult;
use crate::engine::query::{Cursor, ViewDescriptor};
use crate::engine::registry::Registry;

/// One lifecycle phase of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Runs once when the session starts.
    Start,
    /// Drained from the pre-process queue before each tick's Process batch.
    PreProcess,
    /// Runs every tick.
    Process,
    /// Drained from the post-process queue after each tick's Process batch.
    PostProcess,
    /// One-shot execution at the next drain point.
    SingleFrame,
    /// Runs once when the session ends.
    End,
}

impl Phase {
    /// The flag bit representing this phase in a [`PhaseSet`].
    pub const fn flag(self) -> PhaseSet {
        match self {
            Phase::Start => PhaseSet::START,
            Phase::PreProcess => PhaseSet::PRE_PROCESS,
            Phase::Process => PhaseSet::PROCESS,
            Phase::PostProcess => PhaseSet::POST_PROCESS,
            Phase::SingleFrame => PhaseSet::SINGLE_FRAME,
            Phase::End => PhaseSet::END,
        }
    }
}

/// Bit-flag set of lifecycle phases a system participates in.

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct PhaseSet(u8);

impl PhaseSet {
    /// The empty set.
    pub const NONE: PhaseSet = PhaseSet(0);
    /// Participates in the Start phase.
    pub const START: PhaseSet = PhaseSet(1 << 0);
    /// Participates in pre-process drains.
    pub const PRE_PROCESS: PhaseSet = PhaseSet(1 << 1);
    /// Participates in the Process phase.
    pub const PROCESS: PhaseSet = PhaseSet(1 << 2);
    /// Participates in post-process drains.
    pub const POST_PROCESS: PhaseSet = PhaseSet(1 << 3);
    /// Participates in single-frame drains.
    pub const SINGLE_FRAME: PhaseSet = PhaseSet(1 << 4);
    /// Participates in the End phase.
    pub const END: PhaseSet = PhaseSet(1 << 5);

    /// Returns `true` if every flag in `other` is present in `self`.
    #[inline]
    pub const fn contains(self, other: PhaseSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of the two sets.
    #[inline]
    pub const fn union(self, other: PhaseSet) -> PhaseSet {
        PhaseSet(self.0 | other.0)
    }

    /// Returns `true` if no flag is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for PhaseSet {
    type Output = PhaseSet;

    fn bitor(self, rhs: PhaseSet) -> PhaseSet {
        self.union(rhs)
    }
}

/// A unit of user logic dispatched over a view by the scheduler.
///
/// Implement the hooks for the phases declared in [`System::phases`]; the
/// remaining hooks default to no-ops. Each hook is invoked once per entity
/// the system's view yields, receiving the iteration [`Cursor`].
///
/// The `Any` supertrait supports typed lookup and removal
/// (`get_system::<T>()`, `remove_system::<T>()`).
pub trait System: Any {
    /// Human-readable name, used in dispatch diagnostics.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// The phases this system participates in.
    fn phases(&self) -> PhaseSet;

    /// The view the scheduler builds for each dispatch of this system.
    fn descriptor(&self) -> ViewDescriptor {
        ViewDescriptor::new()
    }

    /// Start-phase hook.
    fn start(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        let _ = cursor;
        Ok(())
    }

    /// Pre-process drain hook.
    fn pre_process(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        let _ = cursor;
        Ok(())
    }

    /// Process-phase hook.
    fn process(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        let _ = cursor;
        Ok(())
    }

    /// Post-process drain hook.
    fn post_process(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        let _ = cursor;
        Ok(())
    }

    /// Single-frame drain hook.
    fn single_frame(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        let _ = cursor;
        Ok(())
    }

    /// End-phase hook.
    fn end(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        let _ = cursor;
        Ok(())
    }
}

/// Observer of session boundaries, independent of any view.
///
/// Notificables run before the Start systems and after the End systems,
/// receiving the registry directly — they exist for world-level setup and
/// teardown that should not be phrased as per-entity iteration.
pub trait Notificable: Any {
    /// Invoked before the Start systems run.
    fn on_start(&mut self, registry: &mut Registry) -> ECSResult<()> {
        let _ = registry;
        Ok(())
    }

    /// Invoked after the End systems run.
    fn on_end(&mut self, registry: &mut Registry) -> ECSResult<()> {
        let _ = registry;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_set_flags() {
        let set = PhaseSet::START | PhaseSet::PROCESS;
        assert!(set.contains(PhaseSet::START));
        assert!(set.contains(PhaseSet::PROCESS));
        assert!(!set.contains(PhaseSet::END));
        assert!(set.contains(PhaseSet::NONE));
        assert!(PhaseSet::NONE.is_empty());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_phase_to_flag_mapping() {
        let all = [
            Phase::Start,
            Phase::PreProcess,
            Phase::Process,
            Phase::PostProcess,
            Phase::SingleFrame,
            Phase::End,
        ];
        let mut union = PhaseSet::NONE;
        for phase in all {
            assert!(!phase.flag().is_empty());
            assert!(!union.contains(phase.flag()));
            union = union | phase.flag();
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        struct Quiet;
        impl System for Quiet {
            fn phases(&self) -> PhaseSet {
                PhaseSet::PROCESS
            }
        }

        let quiet = Quiet;
        assert!(quiet.name().contains("Quiet"));
        assert_eq!(quiet.phases(), PhaseSet::PROCESS);
    }
}
