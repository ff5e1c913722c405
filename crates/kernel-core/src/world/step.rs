use tracing::debug;

use super::*;
use crate::runtime::TickOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepMetrics {
    pub tick: u64,
    pub processed_actors: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
}

impl SandboxWorld {
    /// Advance the world by one tick of `dt` seconds.
    ///
    /// Living actors are visited in ascending id order. Each one is offered a
    /// task when idle, runs its executor once with allowance `dt`, advances
    /// its activity by `dt`, and gets a zero-allowance settle pass when that
    /// activity finished during the tick.
    pub fn advance_time(&mut self, dt: f64) -> StepMetrics {
        let dt = dt.max(0.0);
        self.tick = self.tick.saturating_add(1);
        self.runtime.begin_tick(self.tick);
        let mut metrics = StepMetrics {
            tick: self.tick,
            ..StepMetrics::default()
        };

        for actor in self.state.living_actors() {
            let Some(group) = self.state.actor(actor).map(|state| state.group) else {
                continue;
            };
            metrics.processed_actors += 1;

            if self.runtime.current_task(actor).is_none() && self.state.is_activity_finished(actor) {
                self.runtime.assign_idle(actor, group);
            }

            let outcome = self.runtime.run_actor(&mut self.state, actor, dt);
            self.absorb(actor, &outcome, &mut metrics);

            let update = self.state.advance_activity(actor, dt);
            if update.finished() && self.runtime.current_task(actor).is_some() {
                let outcome = self.runtime.settle_actor(&mut self.state, actor);
                self.absorb(actor, &outcome, &mut metrics);
            }
        }

        debug!(
            tick = metrics.tick,
            actors = metrics.processed_actors,
            completed = metrics.completed_tasks,
            "tick advanced"
        );
        metrics
    }

    /// Advance `ticks` times with the same `dt`.
    pub fn run_ticks(&mut self, ticks: u64, dt: f64) -> Vec<StepMetrics> {
        (0..ticks).map(|_| self.advance_time(dt)).collect()
    }

    fn absorb(&mut self, actor: ActorId, outcome: &TickOutcome, metrics: &mut StepMetrics) {
        match outcome {
            TickOutcome::Completed(_) => metrics.completed_tasks += 1,
            TickOutcome::Failed(..) => {
                metrics.failed_tasks += 1;
                self.state.clear_activity(actor);
            }
            TickOutcome::Idle | TickOutcome::Running(_) => {}
        }
    }
}
