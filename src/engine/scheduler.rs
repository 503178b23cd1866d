//! Phased system scheduling and execution.
//!
//! ## Purpose
//! The scheduler owns the system roster and notificables and drives the
//! lifecycle against a registry:
//!
//! - **start** — start-notificables, then each Start system once.
//! - **process** — drain the pre-process queue, run each Process system,
//!   drain the post-process queue. Only meaningful while started.
//! - **end** — each End system once, then end-notificables.
//!
//! After every dispatched system — roster and queued alike — the
//! single-frame queue is drained to empty, FIFO.
//!
//! ## Dispatch
//! Per system, a view is built from the system's descriptor and iterated;
//! the system's hook receives each cursor. Execution is sequential and
//! single-threaded. There is no catch-all: a failing hook aborts the active
//! phase, propagates to the caller, and leaves any still-queued one-shot
//! systems undrained.
//!
//! ## Restart
//! `restart` outside a phase runs `end` then `start` immediately. A restart
//! requested mid-phase (via [`Registry::request_restart`], reachable from
//! any system body through its cursor) is deferred: the active phase honors
//! it at its natural exit — `end` followed by `start`, or just `start` when
//! the ending phase itself is completing. The doubled notificable
//! invocations on the deferred path are intended.
//!
//! ## Re-entrancy
//! Rosters are detached from the scheduler while a phase runs, so system
//! bodies may add systems (visible next phase) and enqueue one-shots
//! (visible at the next drain point) without aliasing the running roster.

use std::any::{Any, TypeId};
use std::mem;

use tracing::{debug, debug_span, warn};

use crate::engine::error::ECSResult;
use crate::engine::registry::Registry;
use crate::engine::systems::{Notificable, Phase, System};

/// Drives registered systems through the lifecycle phases.

#[derive(Default)]
pub struct Scheduler {
    systems: Vec<Box<dyn System>>,
    notificables: Vec<Box<dyn Notificable>>,
    started: bool,
    starting: bool,
    processing: bool,
    ending: bool,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Roster management ───────────────────────────────────────────────

    /// Registers a system at the end of the roster.
    ///
    /// Within a phase, systems dispatch in registration order.
    pub fn add_system(&mut self, system: impl System + 'static) {
        self.add_boxed(Box::new(system));
    }

    /// Registers a boxed system.
    pub fn add_boxed(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Removes every system of type `T` from the roster and from the
    /// registry's pending queues.
    ///
    /// Returns the total number of instances removed.
    pub fn remove_system<T: System>(&mut self, registry: &mut Registry) -> usize {
        let type_id = TypeId::of::<T>();
        let before = self.systems.len();
        self.systems.retain(|system| system_type_id(system.as_ref()) != type_id);
        (before - self.systems.len()) + registry.purge_queued_systems(type_id)
    }

    /// Returns the first registered system of type `T`.
    pub fn get_system<T: System>(&self) -> Option<&T> {
        self.systems.iter().find_map(|system| {
            let any: &dyn Any = system.as_ref();
            any.downcast_ref::<T>()
        })
    }

    /// Returns `true` if a system of type `T` is registered.
    pub fn has_system<T: System>(&self) -> bool {
        self.get_system::<T>().is_some()
    }

    /// Number of registered systems.
    pub fn systems_count(&self) -> usize {
        self.systems.len()
    }

    /// Subscribes a notificable to session boundaries.
    pub fn subscribe(&mut self, notificable: impl Notificable + 'static) {
        self.notificables.push(Box::new(notificable));
    }

    /// Unsubscribes every notificable of type `T`.
    ///
    /// Returns `true` if at least one was removed.
    pub fn unsubscribe<T: Notificable>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();
        let before = self.notificables.len();
        self.notificables.retain(|notificable| {
            let any: &dyn Any = notificable.as_ref();
            any.type_id() != type_id
        });
        self.notificables.len() != before
    }

    // ── State flags ─────────────────────────────────────────────────────

    /// Returns `true` between a completed `start` and a completed `end`.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Returns `true` while the start phase is executing.
    pub fn starting(&self) -> bool {
        self.starting
    }

    /// Returns `true` while the process phase is executing.
    pub fn processing(&self) -> bool {
        self.processing
    }

    /// Returns `true` while the end phase is executing.
    pub fn ending(&self) -> bool {
        self.ending
    }

    // ── Phases ──────────────────────────────────────────────────────────

    /// Runs the start phase.
    ///
    /// ## Behavior
    /// Start-notificables, then each Start system once with a single-frame
    /// drain after each. Sets `started` on successful completion; a no-op
    /// when already started.
    ///
    /// ## Errors
    /// A failing notificable or system aborts the phase; `started` stays
    /// `false`.
    pub fn start(&mut self, registry: &mut Registry) -> ECSResult<()> {
        if self.started {
            debug!("start requested while already started");
            return Ok(());
        }
        let outcome = {
            let span = debug_span!("start_phase");
            let _entered = span.enter();
            self.starting = true;
            let outcome = self.run_start(registry);
            self.starting = false;
            outcome
        };
        outcome?;
        self.started = true;
        self.finish_phase(registry)
    }

    /// Runs one tick of the process phase.
    ///
    /// ## Behavior
    /// Drains the pre-process queue, runs each Process system, drains the
    /// post-process queue; every dispatched system is followed by a
    /// single-frame drain. A warned no-op while not started.
    pub fn process(&mut self, registry: &mut Registry) -> ECSResult<()> {
        if !self.started {
            warn!("process requested while not started");
            return Ok(());
        }
        let outcome = {
            let span = debug_span!("process_phase");
            let _entered = span.enter();
            self.processing = true;
            let outcome = self.run_process(registry);
            self.processing = false;
            outcome
        };
        outcome?;
        self.finish_phase(registry)
    }

    /// Runs the end phase.
    ///
    /// ## Behavior
    /// Each End system once (with single-frame drains), then
    /// end-notificables. Clears `started` on successful completion; a
    /// no-op when not started.
    pub fn end(&mut self, registry: &mut Registry) -> ECSResult<()> {
        if !self.started {
            debug!("end requested while not started");
            return Ok(());
        }
        let outcome = {
            let span = debug_span!("end_phase");
            let _entered = span.enter();
            self.ending = true;
            let outcome = self.run_end(registry);
            self.ending = false;
            outcome
        };
        outcome?;
        self.started = false;
        self.finish_phase(registry)
    }

    /// Restarts the session.
    ///
    /// Not started: a no-op. Outside a phase: `end` then `start`
    /// immediately. Inside a phase (reachable only from re-entrant calls):
    /// deferred to the phase's natural exit.
    pub fn restart(&mut self, registry: &mut Registry) -> ECSResult<()> {
        if !self.started {
            return Ok(());
        }
        if self.starting || self.processing || self.ending {
            registry.request_restart();
            return Ok(());
        }
        self.end(registry)?;
        self.start(registry)
    }

    // ── Phase internals ─────────────────────────────────────────────────

    fn run_start(&mut self, registry: &mut Registry) -> ECSResult<()> {
        self.notify_start(registry)?;
        self.run_phase(registry, Phase::Start)
    }

    fn run_process(&mut self, registry: &mut Registry) -> ECSResult<()> {
        Self::drain_pre_process(registry)?;
        self.run_phase(registry, Phase::Process)?;
        Self::drain_post_process(registry)
    }

    fn run_end(&mut self, registry: &mut Registry) -> ECSResult<()> {
        self.run_phase(registry, Phase::End)?;
        self.notify_end(registry)
    }

    /// Honors a restart requested during the phase that just completed.
    fn finish_phase(&mut self, registry: &mut Registry) -> ECSResult<()> {
        if !registry.take_restart_request() {
            return Ok(());
        }
        debug!("honoring deferred restart");
        if self.started {
            self.end(registry)?;
        }
        self.start(registry)
    }

    /// Dispatches every roster system participating in `phase`, in
    /// registration order, draining the single-frame queue after each.
    ///
    /// The roster is detached while running so system bodies can register
    /// new systems; additions are appended afterwards.
    fn run_phase(&mut self, registry: &mut Registry, phase: Phase) -> ECSResult<()> {
        let flag = phase.flag();
        let mut roster = mem::take(&mut self.systems);
        let mut outcome = Ok(());
        for system in roster.iter_mut() {
            if !system.phases().contains(flag) {
                continue;
            }
            outcome = Self::dispatch(registry, system.as_mut(), phase);
            if outcome.is_ok() {
                outcome = Self::drain_single_frame(registry);
            }
            if outcome.is_err() {
                break;
            }
        }
        roster.extend(self.systems.drain(..));
        self.systems = roster;
        outcome
    }

    /// Builds the system's view and hands each cursor to the hook for
    /// `phase`.
    fn dispatch(registry: &mut Registry, system: &mut dyn System, phase: Phase) -> ECSResult<()> {
        let span = debug_span!("dispatch", system = system.name(), phase = ?phase);
        let _entered = span.enter();
        let view = system.descriptor().build(registry)?;
        match phase {
            Phase::Start => view.each(registry, |cursor| system.start(cursor)),
            Phase::PreProcess => view.each(registry, |cursor| system.pre_process(cursor)),
            Phase::Process => view.each(registry, |cursor| system.process(cursor)),
            Phase::PostProcess => view.each(registry, |cursor| system.post_process(cursor)),
            Phase::SingleFrame => view.each(registry, |cursor| system.single_frame(cursor)),
            Phase::End => view.each(registry, |cursor| system.end(cursor)),
        }
    }

    /// Drains the single-frame queue to empty, FIFO.
    ///
    /// One-shots enqueued by one-shots drain in the same pass. A failing
    /// one-shot is consumed; the systems still queued behind it stay
    /// queued.
    fn drain_single_frame(registry: &mut Registry) -> ECSResult<()> {
        while let Some(mut system) = registry.pop_single_frame() {
            Self::dispatch(registry, system.as_mut(), Phase::SingleFrame)?;
        }
        Ok(())
    }

    fn drain_pre_process(registry: &mut Registry) -> ECSResult<()> {
        while let Some(mut system) = registry.pop_pre_process() {
            Self::dispatch(registry, system.as_mut(), Phase::PreProcess)?;
            Self::drain_single_frame(registry)?;
        }
        Ok(())
    }

    fn drain_post_process(registry: &mut Registry) -> ECSResult<()> {
        while let Some(mut system) = registry.pop_post_process() {
            Self::dispatch(registry, system.as_mut(), Phase::PostProcess)?;
            Self::drain_single_frame(registry)?;
        }
        Ok(())
    }

    fn notify_start(&mut self, registry: &mut Registry) -> ECSResult<()> {
        let mut roster = mem::take(&mut self.notificables);
        let mut outcome = Ok(());
        for notificable in roster.iter_mut() {
            outcome = notificable.on_start(registry);
            if outcome.is_err() {
                break;
            }
        }
        roster.extend(self.notificables.drain(..));
        self.notificables = roster;
        outcome
    }

    fn notify_end(&mut self, registry: &mut Registry) -> ECSResult<()> {
        let mut roster = mem::take(&mut self.notificables);
        let mut outcome = Ok(());
        for notificable in roster.iter_mut() {
            outcome = notificable.on_end(registry);
            if outcome.is_err() {
                break;
            }
        }
        roster.extend(self.notificables.drain(..));
        self.notificables = roster;
        outcome
    }
}

fn system_type_id(system: &dyn System) -> TypeId {
    let any: &dyn Any = system;
    any.type_id()
}
