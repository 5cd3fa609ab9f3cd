//! A live exercise: one scenario played through the branch engine, with the
//! run state, config flags and clock a facilitator UI needs.

use thiserror::Error;
use tracing::{debug, info};

use crate::core::branch::{BranchEngine, BranchError, Choice, Cursor, RunState};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::EngineConfig;
use crate::schema::decision::{BranchDecision, DecidedBy};
use crate::schema::ids::BranchOptionId;
use crate::schema::inject::{BranchOption, Inject};
use crate::schema::module::Module;
use crate::schema::scenario::Scenario;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Branch(#[from] BranchError),
    #[error("backtracking is disabled for this run")]
    BacktrackingDisabled,
}

pub struct ExerciseRun {
    scenario: Scenario,
    state: RunState,
    allow_backtracking: bool,
    auto_advance_module: bool,
    clock: Box<dyn Clock>,
}

pub struct ExerciseRunBuilder {
    scenario: Scenario,
    allow_backtracking: bool,
    auto_advance_module: bool,
    clock: Option<Box<dyn Clock>>,
}

impl ExerciseRun {
    pub fn builder(scenario: Scenario) -> ExerciseRunBuilder {
        let defaults = EngineConfig::default();
        ExerciseRunBuilder {
            scenario,
            allow_backtracking: defaults.allow_backtracking,
            auto_advance_module: defaults.auto_advance_module,
            clock: None,
        }
    }

    pub fn new(scenario: Scenario) -> Self {
        Self::builder(scenario).build()
    }

    fn engine(&self) -> BranchEngine<'_> {
        BranchEngine::new(&self.scenario)
    }

    /// Step forward, taking `choice` at a decision point or the default
    /// option without one.
    ///
    /// A module boundary is held when automatic module advance is off; use
    /// [`continue_to_next_module`](Self::continue_to_next_module) there.
    pub fn advance(&mut self, choice: Option<&Choice>) -> Result<&Cursor, RunError> {
        if !self.auto_advance_module && matches!(self.state.cursor, Cursor::ModuleBoundary { .. }) {
            debug!(cursor = ?self.state.cursor, "holding at module boundary");
            return Ok(&self.state.cursor);
        }
        self.step(choice)
    }

    pub fn choose(
        &mut self,
        option_id: impl Into<BranchOptionId>,
        decided_by: DecidedBy,
    ) -> Result<&Cursor, RunError> {
        let choice = Choice {
            option_id: option_id.into(),
            decided_by,
        };
        self.advance(Some(&choice))
    }

    /// Leave a module boundary for the next module. No-op elsewhere.
    pub fn continue_to_next_module(&mut self) -> Result<&Cursor, RunError> {
        if !matches!(self.state.cursor, Cursor::ModuleBoundary { .. }) {
            return Ok(&self.state.cursor);
        }
        self.step(None)
    }

    fn step(&mut self, choice: Option<&Choice>) -> Result<&Cursor, RunError> {
        let now = self.clock.now();
        let next = self.engine().advance(&self.state, choice, now)?;
        self.state = next;
        Ok(&self.state.cursor)
    }

    /// Keep the first `decision_index` decisions and move back to the state
    /// right after the last kept one, or to the run start for 0. The cursor
    /// lands where that decision led, not on the next decision point.
    pub fn revert_to(&mut self, decision_index: usize) -> Result<&Cursor, RunError> {
        if !self.allow_backtracking {
            return Err(RunError::BacktrackingDisabled);
        }
        let reverted = self.engine().revert_to(&self.state, decision_index)?;
        self.state = reverted;
        Ok(&self.state.cursor)
    }

    pub fn end_module(&mut self) {
        self.state = self.engine().end_module(&self.state);
    }

    pub fn end_run(&mut self) {
        self.state = self.engine().finish(&self.state);
        info!(
            scenario_id = %self.scenario.id,
            decisions = self.state.log.len(),
            "run ended"
        );
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn cursor(&self) -> &Cursor {
        &self.state.cursor
    }

    pub fn current_inject(&self) -> Option<&Inject> {
        self.engine().active_inject(&self.state).ok().flatten()
    }

    pub fn current_module(&self) -> Option<&Module> {
        let module_id = self.state.cursor.module_id()?;
        self.scenario.module(module_id)
    }

    /// Options offered at the active inject; empty when it is not a
    /// decision point.
    pub fn pending_options(&self) -> &[BranchOption] {
        self.current_inject()
            .map(Inject::branch_options)
            .unwrap_or_default()
    }

    pub fn decision_log(&self) -> &[BranchDecision] {
        &self.state.log
    }

    pub fn path_summary(&self) -> Vec<String> {
        self.engine().path_summary(&self.state.log)
    }

    pub fn is_finished(&self) -> bool {
        self.state.cursor == Cursor::Terminal
    }

    /// Trigger time of the active inject, in minutes from module start.
    pub fn elapsed_trigger_time(&self) -> u32 {
        self.current_inject().map_or(0, |inject| inject.trigger_time)
    }

    pub fn allows_backtracking(&self) -> bool {
        self.allow_backtracking
    }
}

impl ExerciseRunBuilder {
    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.allow_backtracking = config.allow_backtracking;
        self.auto_advance_module = config.auto_advance_module;
        self
    }

    pub fn allow_backtracking(mut self, allow: bool) -> Self {
        self.allow_backtracking = allow;
        self
    }

    pub fn auto_advance_module(mut self, auto: bool) -> Self {
        self.auto_advance_module = auto;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Resume from a previously captured state instead of the start.
    pub fn build_from(self, state: RunState) -> ExerciseRun {
        let mut run = self.build();
        run.state = state;
        run
    }

    pub fn build(self) -> ExerciseRun {
        let state = BranchEngine::new(&self.scenario).start();
        info!(
            scenario_id = %self.scenario.id,
            cursor = ?state.cursor,
            "run started"
        );
        ExerciseRun {
            scenario: self.scenario,
            state,
            allow_backtracking: self.allow_backtracking,
            auto_advance_module: self.auto_advance_module,
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::schema::ids::{IdGen, InjectId, ModuleId};
    use crate::schema::inject::BranchTarget;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 5, 14, 0, 0).unwrap()
    }

    /// m1: a1 (t=0), a2 (t=15, branch: contain -> m2 | wait -> end module)
    /// m2: b1 (t=5)
    fn scenario() -> Scenario {
        let mut ids = IdGen::seeded(3);
        let mut scenario = Scenario::empty(t0(), &mut ids);
        let mut m1 = Module::empty(0, &mut ids);
        m1.id = ModuleId::new("m1");
        let mut a1 = Inject::empty(0, &mut ids);
        a1.id = InjectId::new("a1");
        let mut a2 = Inject::empty(1, &mut ids);
        a2.id = InjectId::new("a2");
        a2.trigger_time = 15;
        let mut contain = BranchOption::empty(false, &mut ids);
        contain.id = BranchOptionId::new("contain");
        contain.label = "Isolate hosts".to_string();
        contain.target = BranchTarget::Module {
            module_id: ModuleId::new("m2"),
        };
        let mut wait = BranchOption::empty(true, &mut ids);
        wait.id = BranchOptionId::new("wait");
        wait.label = "Monitor".to_string();
        wait.target = BranchTarget::EndModule;
        a2.branches = Some(vec![contain, wait]);
        m1.injects = vec![a1, a2];

        let mut m2 = Module::empty(1, &mut ids);
        m2.id = ModuleId::new("m2");
        let mut b1 = Inject::empty(0, &mut ids);
        b1.id = InjectId::new("b1");
        b1.trigger_time = 5;
        m2.injects = vec![b1];

        scenario.modules = vec![m1, m2];
        scenario
    }

    fn run() -> ExerciseRun {
        ExerciseRun::builder(scenario())
            .clock(FixedClock::ticking(t0(), Duration::minutes(1)))
            .build()
    }

    #[test]
    fn starts_on_first_inject() {
        let run = run();
        assert_eq!(run.current_inject().unwrap().id.as_str(), "a1");
        assert_eq!(run.current_module().unwrap().id.as_str(), "m1");
        assert!(run.pending_options().is_empty());
        assert!(!run.is_finished());
    }

    #[test]
    fn choose_logs_decider_and_time() {
        let mut run = run();
        run.advance(None).unwrap();
        assert_eq!(run.pending_options().len(), 2);
        assert_eq!(run.elapsed_trigger_time(), 15);

        run.choose("contain", DecidedBy::ParticipantVote).unwrap();
        assert_eq!(run.current_inject().unwrap().id.as_str(), "b1");
        let log = run.decision_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].decided_by, DecidedBy::ParticipantVote);
        assert!(log[0].decided_at >= t0());
        assert_eq!(run.path_summary(), vec!["Isolate hosts".to_string()]);
    }

    #[test]
    fn refused_choice_keeps_state() {
        let mut run = run();
        run.advance(None).unwrap();
        let before = run.state().clone();
        let err = run.choose("nope", DecidedBy::Facilitator).unwrap_err();
        assert!(matches!(err, RunError::Branch(BranchError::InvalidChoice { .. })));
        assert_eq!(run.state(), &before);
    }

    #[test]
    fn boundary_is_held_without_auto_advance() {
        let mut run = ExerciseRun::builder(scenario())
            .auto_advance_module(false)
            .clock(FixedClock::at(t0()))
            .build();
        run.advance(None).unwrap();
        run.advance(None).unwrap();
        let boundary = Cursor::ModuleBoundary {
            module_id: ModuleId::new("m1"),
        };
        assert_eq!(run.cursor(), &boundary);
        run.advance(None).unwrap();
        assert_eq!(run.cursor(), &boundary);

        run.continue_to_next_module().unwrap();
        assert_eq!(run.current_inject().unwrap().id.as_str(), "b1");
    }

    #[test]
    fn revert_respects_flag() {
        let mut run = ExerciseRun::builder(scenario())
            .config(&EngineConfig {
                allow_backtracking: false,
                ..EngineConfig::default()
            })
            .clock(FixedClock::at(t0()))
            .build();
        run.advance(None).unwrap();
        run.choose("contain", DecidedBy::Facilitator).unwrap();
        assert!(matches!(run.revert_to(0), Err(RunError::BacktrackingDisabled)));
        assert_eq!(run.decision_log().len(), 1);
    }

    #[test]
    fn revert_returns_to_decision_point() {
        let mut run = run();
        run.advance(None).unwrap();
        run.choose("contain", DecidedBy::Facilitator).unwrap();
        run.revert_to(0).unwrap();
        assert_eq!(run.current_inject().unwrap().id.as_str(), "a1");
        assert!(run.decision_log().is_empty());
    }

    #[test]
    fn end_run_finishes() {
        let mut run = run();
        run.end_run();
        assert!(run.is_finished());
        assert!(run.current_inject().is_none());
        assert_eq!(run.elapsed_trigger_time(), 0);
        run.advance(None).unwrap();
        assert!(run.is_finished());
    }

    #[test]
    fn end_module_then_next() {
        let mut run = run();
        run.end_module();
        assert_eq!(
            run.cursor(),
            &Cursor::ModuleBoundary {
                module_id: ModuleId::new("m1")
            }
        );
        run.advance(None).unwrap();
        assert_eq!(run.current_module().unwrap().id.as_str(), "m2");
    }

    #[test]
    fn resume_from_state() {
        let mut first = run();
        first.advance(None).unwrap();
        let saved = first.state().clone();
        let resumed = ExerciseRun::builder(scenario()).build_from(saved);
        assert_eq!(resumed.current_inject().unwrap().id.as_str(), "a2");
    }
}
