//! Simulation execution loop.
//!
//! Drives the scheduler: pops events, advances virtual time, dispatches
//! to a handler. Purely synchronous and single-threaded; a handler runs to
//! completion before the next event is popped.

use crate::error::{PuddleError, PuddleResult};
use crate::event::{Event, EventId, EventType};
use crate::scheduler::Scheduler;
use crate::time::VirtualTime;

// ── Handler trait ─────────────────────────────────────────────────────

/// Reacts to dispatched events.
///
/// The handler receives a `SimulationContext` so it can schedule
/// follow-up events. An `Err` stops the run and is returned to the
/// caller of [`Simulation::step`] / [`Simulation::run`].
pub trait EventHandler {
    /// Called for every dispatched event.
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) -> PuddleResult<()>;
}

/// A handler backed by a closure, handy in tests.
impl<F> EventHandler for F
where
    F: FnMut(&mut SimulationContext, &Event) -> PuddleResult<()>,
{
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) -> PuddleResult<()> {
        (self)(ctx, event)
    }
}

// ── Simulation Context ───────────────────────────────────────────────

/// Mutable context passed to the handler on every dispatch.
///
/// Borrows the scheduler mutably, so a handler can only affect dispatch
/// order through the schedule API.
pub struct SimulationContext<'a> {
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) now: VirtualTime,
}

impl<'a> SimulationContext<'a> {
    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Schedule an event at an absolute virtual time.
    pub fn schedule_at(&mut self, at: VirtualTime, payload: EventType) -> PuddleResult<EventId> {
        if at.is_before(self.now) {
            return Err(PuddleError::NonCausalEvent {
                requested: at.ticks(),
                current: self.now.ticks(),
            });
        }
        Ok(self.scheduler.schedule(at, payload))
    }

    /// Schedule an event `delay` ticks after now.
    pub fn schedule_after(&mut self, delay: u64, payload: EventType) -> PuddleResult<EventId> {
        let at = self.now.plus(delay).ok_or(PuddleError::TimeOverflow {
            now: self.now.ticks(),
            delay,
        })?;
        Ok(self.scheduler.schedule(at, payload))
    }

    /// Number of pending events in the scheduler.
    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// Owns the scheduler and the current virtual time. Movement timers re-arm
/// forever, so fog scenarios are normally driven with [`Simulation::run_until`].
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    scheduler: Scheduler,
    current_time: VirtualTime,
    events_processed: u64,
}

impl Simulation {
    /// Create a new simulation starting at time zero.
    pub fn new() -> Self {
        Simulation {
            scheduler: Scheduler::new(),
            current_time: VirtualTime::ZERO,
            events_processed: 0,
        }
    }

    /// Access the scheduler directly.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current virtual time.
    pub fn current_time(&self) -> VirtualTime {
        self.current_time
    }

    /// Total events processed so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Schedule an event before the simulation starts running.
    pub fn schedule(&mut self, at: VirtualTime, payload: EventType) -> EventId {
        self.scheduler.schedule(at, payload)
    }

    /// Execute a single step: pop one event, advance time, dispatch.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    pub fn step(&mut self, handler: &mut dyn EventHandler) -> PuddleResult<Option<Event>> {
        let Some(event) = self.scheduler.pop_next() else {
            return Ok(None);
        };

        // The scheduler only accepts causal events, so time never runs backwards.
        debug_assert!(event.scheduled_at >= self.current_time);
        self.current_time = event.scheduled_at;
        self.events_processed += 1;

        let mut ctx = SimulationContext {
            scheduler: &mut self.scheduler,
            now: self.current_time,
        };
        handler.handle(&mut ctx, &event)?;

        Ok(Some(event))
    }

    /// Run until the event queue is empty.
    ///
    /// Returns the number of events processed during this call.
    pub fn run(&mut self, handler: &mut dyn EventHandler) -> PuddleResult<u64> {
        let start = self.events_processed;
        while self.step(handler)?.is_some() {}
        Ok(self.events_processed - start)
    }

    /// Run until the queue is empty or `max_steps` events have been dispatched.
    pub fn run_for(&mut self, max_steps: u64, handler: &mut dyn EventHandler) -> PuddleResult<u64> {
        let start = self.events_processed;
        let mut steps = 0u64;
        while steps < max_steps {
            if self.step(handler)?.is_none() {
                break;
            }
            steps += 1;
        }
        Ok(self.events_processed - start)
    }

    /// Run every event scheduled at or before `end`.
    ///
    /// Events after `end` stay queued; the clock is left at `end` so a
    /// later call resumes from there.
    pub fn run_until(&mut self, end: VirtualTime, handler: &mut dyn EventHandler) -> PuddleResult<u64> {
        let start = self.events_processed;
        while let Some(next) = self.scheduler.peek_next() {
            if end.is_before(next.scheduled_at) {
                break;
            }
            self.step(handler)?;
        }
        if self.current_time.is_before(end) {
            self.current_time = end;
        }
        Ok(self.events_processed - start)
    }

    /// Returns `true` if there are no more events to process.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_execution_loop() {
        let mut sim = Simulation::new();

        sim.schedule(VirtualTime::new(10), EventType::marker(1));
        sim.schedule(VirtualTime::new(20), EventType::marker(2));
        sim.schedule(VirtualTime::new(30), EventType::marker(3));

        let mut seen: Vec<u64> = Vec::new();
        let processed = sim
            .run(&mut |_ctx: &mut SimulationContext, event: &Event| -> PuddleResult<()> {
                seen.extend(event.payload.marker_number());
                Ok(())
            })
            .unwrap();

        assert_eq!(processed, 3);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(sim.current_time(), VirtualTime::new(30));
    }

    #[test]
    fn test_handler_schedules_followup() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(0), EventType::marker(1));

        let mut log: Vec<(u64, u64)> = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| -> PuddleResult<()> {
            if let Some(n) = event.payload.marker_number() {
                log.push((ctx.now().ticks(), n));
                if ctx.now().ticks() < 30 {
                    ctx.schedule_after(10, EventType::marker(n + 1))?;
                }
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(log, vec![(0, 1), (10, 2), (20, 3), (30, 4)]);
    }

    #[test]
    fn test_schedule_in_past_is_error() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(10), EventType::Noop);

        let result = sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| -> PuddleResult<()> {
            ctx.schedule_at(VirtualTime::new(5), EventType::Noop)?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(PuddleError::NonCausalEvent { requested: 5, current: 10 })
        ));
    }

    #[test]
    fn test_handler_error_stops_run() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(1), EventType::Noop);
        sim.schedule(VirtualTime::new(2), EventType::Noop);

        let result = sim.run(&mut |_ctx: &mut SimulationContext, _event: &Event| -> PuddleResult<()> {
            Err(PuddleError::InvalidTopology("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(sim.events_processed(), 1);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_run_for_limits_steps() {
        let mut sim = Simulation::new();
        for i in 0..100 {
            sim.schedule(VirtualTime::new(i), EventType::Noop);
        }

        let mut noop = |_ctx: &mut SimulationContext, _event: &Event| -> PuddleResult<()> { Ok(()) };
        assert_eq!(sim.run_for(10, &mut noop).unwrap(), 10);
        assert_eq!(sim.events_processed(), 10);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_run_until_stops_at_horizon() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(0), EventType::Noop);

        // Self-perpetuating timer, like a movement tick.
        let mut timer = |ctx: &mut SimulationContext, _event: &Event| -> PuddleResult<()> {
            ctx.schedule_after(10, EventType::Noop)?;
            Ok(())
        };

        let processed = sim.run_until(VirtualTime::new(35), &mut timer).unwrap();
        assert_eq!(processed, 4); // 0, 10, 20, 30
        assert_eq!(sim.current_time(), VirtualTime::new(35));
        assert_eq!(sim.scheduler().peek_next().map(|e| e.scheduled_at.ticks()), Some(40));

        let processed = sim.run_until(VirtualTime::new(40), &mut timer).unwrap();
        assert_eq!(processed, 1);
    }

    #[test]
    fn test_deterministic_replay() {
        fn run_trace() -> Vec<(u64, u64, u64)> {
            let mut sim = Simulation::new();
            sim.schedule(VirtualTime::new(5), EventType::marker(1));
            sim.schedule(VirtualTime::new(5), EventType::marker(2));
            sim.schedule(VirtualTime::new(3), EventType::marker(3));

            let mut trace = Vec::new();
            sim.run(&mut |ctx: &mut SimulationContext, event: &Event| -> PuddleResult<()> {
                if let Some(n) = event.payload.marker_number() {
                    trace.push((event.id.raw(), ctx.now().ticks(), n));
                }
                Ok(())
            })
            .unwrap();
            trace
        }

        assert_eq!(run_trace(), run_trace());
        assert_eq!(run_trace(), vec![(2, 3, 3), (0, 5, 1), (1, 5, 2)]);
    }
}
