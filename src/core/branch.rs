//! Branch resolution — turns the linear module/inject sequence into a
//! navigable decision graph during playback.
//!
//! The engine is read-only over the scenario and holds no run state of its
//! own: every operation takes a `RunState` and returns a new one, leaving the
//! input untouched on error. The decision log and the early module exits are
//! the only inputs not derived from the scenario, so replaying them from the
//! start reproduces the state right after any logged decision.

use std::iter::Peekable;
use std::slice;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::index::ScenarioIndex;
use crate::schema::decision::{BranchDecision, DecidedBy};
use crate::schema::ids::{BranchOptionId, InjectId, ModuleId};
use crate::schema::inject::{BranchTarget, Inject};
use crate::schema::module::Module;
use crate::schema::scenario::Scenario;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BranchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("inject {0} has branches but none is marked default")]
    NoDefaultBranch(InjectId),
    #[error("branch option {option_id} is not offered by inject {inject_id}")]
    InvalidChoice {
        inject_id: InjectId,
        option_id: BranchOptionId,
    },
    #[error("decision index {index} is past the end of a log of {len}")]
    DecisionOutOfRange { index: usize, len: usize },
    #[error("replay could not reach logged decision {0}")]
    ReplayDiverged(usize),
}

impl BranchError {
    fn module(id: &ModuleId) -> Self {
        Self::NotFound {
            kind: "module",
            id: id.to_string(),
        }
    }

    fn inject(id: &InjectId) -> Self {
        Self::NotFound {
            kind: "inject",
            id: id.to_string(),
        }
    }
}

/// Position of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Cursor {
    /// Inside a module. `inject_id` is `None` at module start, before the
    /// first inject has been entered.
    #[serde(rename_all = "camelCase")]
    Active {
        module_id: ModuleId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inject_id: Option<InjectId>,
    },
    /// The module has no more injects to play.
    #[serde(rename_all = "camelCase")]
    ModuleBoundary { module_id: ModuleId },
    Terminal,
}

impl Cursor {
    pub fn module_id(&self) -> Option<&ModuleId> {
        match self {
            Self::Active { module_id, .. } | Self::ModuleBoundary { module_id } => Some(module_id),
            Self::Terminal => None,
        }
    }

    pub fn inject_id(&self) -> Option<&InjectId> {
        match self {
            Self::Active { inject_id, .. } => inject_id.as_ref(),
            _ => None,
        }
    }
}

/// Injects spliced into the run by an `insert_injects` target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detour {
    /// Inserted injects still to play; the first is the active one.
    pub queue: Vec<InjectId>,
    /// Module inject after which linear play resumes once the queue drains.
    pub resume_after: InjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub cursor: Cursor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detour: Option<Detour>,
    #[serde(default)]
    pub log: Vec<BranchDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exits: Vec<ModuleExit>,
}

impl RunState {
    /// Same run, new position, no detour.
    fn moved_to(&self, cursor: Cursor) -> Self {
        Self {
            cursor,
            detour: None,
            log: self.log.clone(),
            exits: self.exits.clone(),
        }
    }

    fn cursor_in_module(&self, module_id: &ModuleId) -> bool {
        matches!(&self.cursor, Cursor::Active { module_id: m, .. } if m == module_id)
    }

    fn in_detour(&self, inject_id: &InjectId) -> bool {
        self.detour
            .as_ref()
            .is_some_and(|d| d.queue.first() == Some(inject_id))
    }
}

/// A module left early through `end_module`, keyed by how many decisions
/// had been logged at the time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleExit {
    pub after_decisions: usize,
    pub module_id: ModuleId,
}

/// An explicit operator choice at a decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub option_id: BranchOptionId,
    pub decided_by: DecidedBy,
}

impl Choice {
    pub fn facilitator(option_id: impl Into<BranchOptionId>) -> Self {
        Self {
            option_id: option_id.into(),
            decided_by: DecidedBy::Facilitator,
        }
    }

    pub fn vote(option_id: impl Into<BranchOptionId>) -> Self {
        Self {
            option_id: option_id.into(),
            decided_by: DecidedBy::ParticipantVote,
        }
    }
}

pub struct BranchEngine<'a> {
    scenario: &'a Scenario,
    index: ScenarioIndex<'a>,
}

impl<'a> BranchEngine<'a> {
    pub fn new(scenario: &'a Scenario) -> Self {
        Self {
            scenario,
            index: ScenarioIndex::build(scenario),
        }
    }

    pub fn scenario(&self) -> &'a Scenario {
        self.scenario
    }

    pub fn index(&self) -> &ScenarioIndex<'a> {
        &self.index
    }

    /// Initial state: first inject of the first module by order.
    pub fn start(&self) -> RunState {
        let cursor = match self.scenario.sorted_modules().first() {
            Some(module) => enter_module(module),
            None => Cursor::Terminal,
        };
        RunState {
            cursor,
            detour: None,
            log: Vec::new(),
            exits: Vec::new(),
        }
    }

    /// The inject the cursor is on, if it is on one.
    pub fn active_inject(&self, state: &RunState) -> Result<Option<&'a Inject>, BranchError> {
        match &state.cursor {
            Cursor::Active {
                module_id,
                inject_id: Some(inject_id),
            } => self.resolve_active(state, module_id, inject_id).map(Some),
            _ => Ok(None),
        }
    }

    fn resolve_active(
        &self,
        state: &RunState,
        module_id: &ModuleId,
        inject_id: &InjectId,
    ) -> Result<&'a Inject, BranchError> {
        if state.in_detour(inject_id) {
            return self
                .index
                .inject(inject_id)
                .map(|entry| entry.inject)
                .ok_or_else(|| BranchError::inject(inject_id));
        }
        self.index.module(module_id).ok_or_else(|| BranchError::module(module_id))?;
        self.index
            .inject_in(module_id, inject_id)
            .ok_or_else(|| BranchError::inject(inject_id))
    }

    /// Move the run forward by one step.
    ///
    /// On a branching inject, `choice` selects the option; without one the
    /// inject's default option is taken and logged as automatic. On
    /// anything else `choice` is ignored.
    pub fn advance(
        &self,
        state: &RunState,
        choice: Option<&Choice>,
        now: DateTime<Utc>,
    ) -> Result<RunState, BranchError> {
        self.try_advance(state, choice, now).inspect_err(|err| {
            warn!(error = %err, cursor = ?state.cursor, "advance refused");
        })
    }

    fn try_advance(
        &self,
        state: &RunState,
        choice: Option<&Choice>,
        now: DateTime<Utc>,
    ) -> Result<RunState, BranchError> {
        let Cursor::Active {
            module_id,
            inject_id: Some(inject_id),
        } = &state.cursor
        else {
            return self.step(state);
        };
        let inject = self.resolve_active(state, module_id, inject_id)?;
        if !inject.has_branches() {
            return self.step(state);
        }

        let option = match choice {
            Some(choice) => inject
                .branch(&choice.option_id)
                .ok_or_else(|| BranchError::InvalidChoice {
                    inject_id: inject_id.clone(),
                    option_id: choice.option_id.clone(),
                })?,
            None => inject
                .default_branch()
                .ok_or_else(|| BranchError::NoDefaultBranch(inject_id.clone()))?,
        };
        let decision = BranchDecision {
            inject_id: inject_id.clone(),
            branch_option_id: option.id.clone(),
            decided_at: now,
            decided_by: choice.map_or(DecidedBy::Automatic, |c| c.decided_by),
        };
        self.decide(state, module_id, inject_id, decision)
    }

    /// Apply a decision whose option is known to exist on the active inject.
    fn decide(
        &self,
        state: &RunState,
        module_id: &ModuleId,
        inject_id: &InjectId,
        decision: BranchDecision,
    ) -> Result<RunState, BranchError> {
        let inject = self.resolve_active(state, module_id, inject_id)?;
        let option = inject
            .branch(&decision.branch_option_id)
            .ok_or_else(|| BranchError::InvalidChoice {
                inject_id: inject_id.clone(),
                option_id: decision.branch_option_id.clone(),
            })?;
        let mut next = self.follow(state, module_id, inject_id, &option.target)?;
        debug!(
            inject_id = %inject_id,
            option_id = %option.id,
            decided_by = ?decision.decided_by,
            cursor = ?next.cursor,
            "resolved branch"
        );
        next.log.push(decision);
        Ok(next)
    }

    /// Resolve a branch target into the next state. The log is carried over
    /// unchanged.
    fn follow(
        &self,
        state: &RunState,
        module_id: &ModuleId,
        inject_id: &InjectId,
        target: &BranchTarget,
    ) -> Result<RunState, BranchError> {
        match target {
            BranchTarget::Inject {
                inject_id: target_id,
                module_id: Some(target_module),
            } => {
                self.index
                    .module(target_module)
                    .ok_or_else(|| BranchError::module(target_module))?;
                self.index
                    .inject_in(target_module, target_id)
                    .ok_or_else(|| BranchError::inject(target_id))?;
                Ok(state.moved_to(Cursor::Active {
                    module_id: target_module.clone(),
                    inject_id: Some(target_id.clone()),
                }))
            }
            BranchTarget::Inject {
                inject_id: target_id,
                module_id: None,
            } => {
                let entry = self
                    .index
                    .inject(target_id)
                    .filter(|entry| !entry.inserted)
                    .ok_or_else(|| BranchError::inject(target_id))?;
                Ok(state.moved_to(Cursor::Active {
                    module_id: entry.module.id.clone(),
                    inject_id: Some(target_id.clone()),
                }))
            }
            BranchTarget::Module {
                module_id: target_module,
            } => {
                let module = self
                    .index
                    .module(target_module)
                    .ok_or_else(|| BranchError::module(target_module))?;
                Ok(state.moved_to(enter_module(module)))
            }
            BranchTarget::EndModule => Ok(state.moved_to(Cursor::ModuleBoundary {
                module_id: module_id.clone(),
            })),
            BranchTarget::EndScenario => Ok(state.moved_to(Cursor::Terminal)),
            BranchTarget::InsertInjects { injects } if injects.is_empty() => self.step(state),
            BranchTarget::InsertInjects { injects } => {
                let mut queue: Vec<InjectId> = injects.iter().map(|i| i.id.clone()).collect();
                let resume_after = match &state.detour {
                    Some(detour) if state.in_detour(inject_id) => {
                        queue.extend(detour.queue.iter().skip(1).cloned());
                        detour.resume_after.clone()
                    }
                    _ => inject_id.clone(),
                };
                let first = queue[0].clone();
                Ok(RunState {
                    cursor: Cursor::Active {
                        module_id: module_id.clone(),
                        inject_id: Some(first),
                    },
                    detour: Some(Detour {
                        queue,
                        resume_after,
                    }),
                    log: state.log.clone(),
                    exits: state.exits.clone(),
                })
            }
        }
    }

    /// Move forward without taking a decision.
    fn step(&self, state: &RunState) -> Result<RunState, BranchError> {
        match &state.cursor {
            Cursor::Terminal => Ok(state.clone()),
            Cursor::ModuleBoundary { module_id } => {
                self.index
                    .module(module_id)
                    .ok_or_else(|| BranchError::module(module_id))?;
                let cursor = match self.scenario.module_after(module_id) {
                    Some(next) => enter_module(next),
                    None => Cursor::Terminal,
                };
                Ok(state.moved_to(cursor))
            }
            Cursor::Active {
                module_id,
                inject_id: None,
            } => {
                let module = self
                    .index
                    .module(module_id)
                    .ok_or_else(|| BranchError::module(module_id))?;
                Ok(state.moved_to(enter_module(module)))
            }
            Cursor::Active {
                module_id,
                inject_id: Some(inject_id),
            } => {
                let module = self
                    .index
                    .module(module_id)
                    .ok_or_else(|| BranchError::module(module_id))?;
                if let Some(detour) = state.detour.as_ref().filter(|_| state.in_detour(inject_id)) {
                    if let Some(next) = detour.queue.get(1) {
                        return Ok(RunState {
                            cursor: Cursor::Active {
                                module_id: module_id.clone(),
                                inject_id: Some(next.clone()),
                            },
                            detour: Some(Detour {
                                queue: detour.queue[1..].to_vec(),
                                resume_after: detour.resume_after.clone(),
                            }),
                            log: state.log.clone(),
                            exits: state.exits.clone(),
                        });
                    }
                    return Ok(state.moved_to(next_in_module(module, &detour.resume_after)));
                }
                self.index
                    .inject_in(module_id, inject_id)
                    .ok_or_else(|| BranchError::inject(inject_id))?;
                Ok(state.moved_to(next_in_module(module, inject_id)))
            }
        }
    }

    /// Leave the current module early. No-op outside an active module.
    ///
    /// The exit is recorded against the current log length so replay can
    /// repeat it between the same two decisions.
    pub fn end_module(&self, state: &RunState) -> RunState {
        match &state.cursor {
            Cursor::Active { module_id, .. } => {
                let mut next = state.moved_to(Cursor::ModuleBoundary {
                    module_id: module_id.clone(),
                });
                next.exits.push(ModuleExit {
                    after_decisions: state.log.len(),
                    module_id: module_id.clone(),
                });
                next
            }
            _ => state.clone(),
        }
    }

    pub fn finish(&self, state: &RunState) -> RunState {
        state.moved_to(Cursor::Terminal)
    }

    /// Truncate the log to the decisions before `decision_index` and rebuild
    /// the cursor by replaying them, with the early module exits taken
    /// between them, from the start of the run. The result sits right after
    /// decision `decision_index - 1`.
    pub fn revert_to(&self, state: &RunState, decision_index: usize) -> Result<RunState, BranchError> {
        if decision_index > state.log.len() {
            return Err(BranchError::DecisionOutOfRange {
                index: decision_index,
                len: state.log.len(),
            });
        }
        let exits: Vec<ModuleExit> = state
            .exits
            .iter()
            .filter(|exit| exit.after_decisions < decision_index)
            .cloned()
            .collect();
        let replayed = self.replay(&state.log[..decision_index], &exits)?;
        debug!(
            decision_index,
            cursor = ?replayed.cursor,
            "reverted run"
        );
        Ok(replayed)
    }

    /// Rebuild a run from its decision log and early module exits.
    ///
    /// `exits` must be ordered as recorded. Exits recorded after the last
    /// decision are replayed too, leaving the cursor on that module's
    /// boundary.
    pub fn replay(&self, log: &[BranchDecision], exits: &[ModuleExit]) -> Result<RunState, BranchError> {
        let mut state = self.start();
        let mut pending = exits.iter().peekable();
        for (i, decision) in log.iter().enumerate() {
            state = self.replay_segment(state, i, Some(decision), &mut pending)?;
        }
        state = self.replay_segment(state, log.len(), None, &mut pending)?;
        match pending.next() {
            Some(exit) => Err(BranchError::ReplayDiverged(exit.after_decisions)),
            None => Ok(state),
        }
    }

    /// Walk linearly from `state` until decision `i` is taken, applying the
    /// exits recorded before it. With no decision the walk stops as soon as
    /// no exit for `i` is left.
    fn replay_segment(
        &self,
        mut state: RunState,
        i: usize,
        decision: Option<&BranchDecision>,
        pending: &mut Peekable<slice::Iter<'_, ModuleExit>>,
    ) -> Result<RunState, BranchError> {
        let step_limit = self.index.inject_count() + 2 * self.index.module_count() + 2;
        let mut steps = 0;
        loop {
            if pending
                .next_if(|exit| {
                    exit.after_decisions == i && state.cursor_in_module(&exit.module_id)
                })
                .is_some()
            {
                state = self.end_module(&state);
                continue;
            }
            let exit_due = pending.peek().is_some_and(|exit| exit.after_decisions == i);
            if decision.is_none() && !exit_due {
                return Ok(state);
            }
            if let Cursor::Active {
                module_id,
                inject_id: Some(inject_id),
            } = &state.cursor
            {
                let inject = self.resolve_active(&state, module_id, inject_id)?;
                if inject.has_branches() {
                    return match decision {
                        Some(decision) if !exit_due && inject_id == &decision.inject_id => {
                            self.decide(&state, module_id, inject_id, decision.clone())
                        }
                        _ => Err(BranchError::ReplayDiverged(i)),
                    };
                }
            }
            if state.cursor == Cursor::Terminal || steps > step_limit {
                return Err(BranchError::ReplayDiverged(i));
            }
            state = self.step(&state)?;
            steps += 1;
        }
    }

    /// Labels of the chosen options, in decision order. Options that no
    /// longer exist show their id.
    pub fn path_summary(&self, log: &[BranchDecision]) -> Vec<String> {
        log.iter()
            .map(|d| {
                self.index
                    .branch_label(&d.inject_id, &d.branch_option_id)
                    .map(str::to_string)
                    .unwrap_or_else(|| d.branch_option_id.to_string())
            })
            .collect()
    }
}

fn enter_module(module: &Module) -> Cursor {
    match module.first_inject() {
        Some(inject) => Cursor::Active {
            module_id: module.id.clone(),
            inject_id: Some(inject.id.clone()),
        },
        None => Cursor::ModuleBoundary {
            module_id: module.id.clone(),
        },
    }
}

fn next_in_module(module: &Module, after: &InjectId) -> Cursor {
    match module.inject_after(after) {
        Some(inject) => Cursor::Active {
            module_id: module.id.clone(),
            inject_id: Some(inject.id.clone()),
        },
        None => Cursor::ModuleBoundary {
            module_id: module.id.clone(),
        },
    }
}
