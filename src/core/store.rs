//! The mutation store — single owner of the document being edited.
//!
//! Every edit runs on a copy of the current document and, when it changes
//! something, pushes a full snapshot onto a bounded history. Undo and redo
//! move a cursor through that history.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::{EngineConfig, DEFAULT_HISTORY_LIMIT};
use crate::core::edits;
use crate::schema::ids::{BranchOptionId, DiscussionQuestionId, IdGen, InjectId, ModuleId};
use crate::schema::inject::{BranchOption, Inject};
use crate::schema::module::Module;
use crate::schema::question::DiscussionQuestion;
use crate::schema::scenario::Scenario;

/// Result of a store operation. Operations naming an unknown id are
/// `NoOp`, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    NoOp,
}

impl EditOutcome {
    pub fn applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub struct ScenarioStore {
    current: Option<Scenario>,
    dirty: bool,
    save_path: Option<PathBuf>,
    history: Vec<Scenario>,
    history_cursor: usize,
    history_limit: usize,
    clock: Box<dyn Clock>,
    ids: IdGen,
}

/// Builder for constructing a `ScenarioStore`.
pub struct ScenarioStoreBuilder {
    history_limit: usize,
    clock: Option<Box<dyn Clock>>,
    seed: Option<u64>,
}

impl ScenarioStore {
    pub fn builder() -> ScenarioStoreBuilder {
        ScenarioStoreBuilder {
            history_limit: DEFAULT_HISTORY_LIMIT,
            clock: None,
            seed: None,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    // Document lifecycle

    /// Replace the document with a fresh empty scenario.
    pub fn create_new(&mut self) {
        let scenario = Scenario::empty(self.clock.now(), &mut self.ids);
        info!(scenario_id = %scenario.id, "created new scenario");
        self.reset_with(scenario, None);
    }

    /// Replace the document with an already-parsed scenario.
    pub fn load(&mut self, scenario: Scenario, path: Option<PathBuf>) {
        info!(scenario_id = %scenario.id, path = ?path, "loaded scenario");
        self.reset_with(scenario, path);
    }

    fn reset_with(&mut self, scenario: Scenario, path: Option<PathBuf>) {
        self.history = vec![scenario.clone()];
        self.history_cursor = 0;
        self.current = Some(scenario);
        self.save_path = path;
        self.dirty = false;
    }

    /// Record that the document was written out. History is untouched.
    pub fn mark_saved(&mut self, path: Option<PathBuf>) {
        if let Some(path) = path {
            self.save_path = Some(path);
        }
        self.dirty = false;
        info!(path = ?self.save_path, "marked saved");
    }

    // Edits

    /// Run `mutator` on a copy of the current document.
    ///
    /// When the mutator reports a change, the copy becomes current, is
    /// stamped, marks the store dirty and is pushed onto the history. When it
    /// reports no change (or there is no document) nothing is touched.
    pub fn apply_edit<F>(&mut self, mutator: F) -> EditOutcome
    where
        F: FnOnce(&mut Scenario, &mut IdGen) -> bool,
    {
        let Some(current) = self.current.as_ref() else {
            return EditOutcome::NoOp;
        };
        let mut next = current.clone();
        if !mutator(&mut next, &mut self.ids) {
            debug!("edit was a no-op");
            return EditOutcome::NoOp;
        }
        next.updated_at = self.clock.now().max(next.created_at);
        self.push_history(next.clone());
        self.current = Some(next);
        self.dirty = true;
        debug!(
            history_len = self.history.len(),
            cursor = self.history_cursor,
            "applied edit"
        );
        EditOutcome::Applied
    }

    fn push_history(&mut self, snapshot: Scenario) {
        self.history.truncate(self.history_cursor + 1);
        self.history.push(snapshot);
        while self.history.len() > self.history_limit {
            self.history.remove(0);
        }
        self.history_cursor = self.history.len() - 1;
    }

    pub fn undo(&mut self) -> EditOutcome {
        if !self.can_undo() {
            return EditOutcome::NoOp;
        }
        self.history_cursor -= 1;
        self.current = Some(self.history[self.history_cursor].clone());
        self.dirty = true;
        debug!(cursor = self.history_cursor, "undo");
        EditOutcome::Applied
    }

    pub fn redo(&mut self) -> EditOutcome {
        if !self.can_redo() {
            return EditOutcome::NoOp;
        }
        self.history_cursor += 1;
        self.current = Some(self.history[self.history_cursor].clone());
        self.dirty = true;
        debug!(cursor = self.history_cursor, "redo");
        EditOutcome::Applied
    }

    pub fn can_undo(&self) -> bool {
        self.history_cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history_cursor + 1 < self.history.len()
    }

    // Scenario and modules

    pub fn update_scenario(&mut self, patch: impl FnOnce(&mut Scenario)) -> EditOutcome {
        self.apply_edit(|doc, _| edits::update_scenario(doc, patch))
    }

    pub fn add_module(&mut self) -> Option<ModuleId> {
        let mut created = None;
        self.apply_edit(|doc, ids| {
            created = Some(edits::add_module(doc, ids));
            true
        });
        created
    }

    pub fn update_module(&mut self, id: &ModuleId, patch: impl FnOnce(&mut Module)) -> EditOutcome {
        self.apply_edit(|doc, _| edits::update_module(doc, id, patch))
    }

    pub fn remove_module(&mut self, id: &ModuleId) -> EditOutcome {
        self.apply_edit(|doc, _| edits::remove_module(doc, id))
    }

    pub fn move_module(&mut self, id: &ModuleId, to: usize) -> EditOutcome {
        self.apply_edit(|doc, _| edits::move_module(doc, id, to))
    }

    // Injects

    pub fn add_inject(&mut self, module_id: &ModuleId) -> Option<InjectId> {
        let mut created = None;
        self.apply_edit(|doc, ids| {
            created = edits::add_inject(doc, module_id, ids);
            created.is_some()
        });
        created
    }

    pub fn update_inject(
        &mut self,
        module_id: &ModuleId,
        inject_id: &InjectId,
        patch: impl FnOnce(&mut Inject),
    ) -> EditOutcome {
        self.apply_edit(|doc, _| edits::update_inject(doc, module_id, inject_id, patch))
    }

    pub fn remove_inject(&mut self, module_id: &ModuleId, inject_id: &InjectId) -> EditOutcome {
        self.apply_edit(|doc, _| edits::remove_inject(doc, module_id, inject_id))
    }

    pub fn move_inject(&mut self, module_id: &ModuleId, inject_id: &InjectId, to: usize) -> EditOutcome {
        self.apply_edit(|doc, _| edits::move_inject(doc, module_id, inject_id, to))
    }

    pub fn duplicate_inject(&mut self, module_id: &ModuleId, inject_id: &InjectId) -> Option<InjectId> {
        let mut created = None;
        self.apply_edit(|doc, ids| {
            created = edits::duplicate_inject(doc, module_id, inject_id, ids);
            created.is_some()
        });
        created
    }

    // Discussion questions

    pub fn add_question(&mut self, module_id: &ModuleId) -> Option<DiscussionQuestionId> {
        let mut created = None;
        self.apply_edit(|doc, ids| {
            created = edits::add_question(doc, module_id, ids);
            created.is_some()
        });
        created
    }

    pub fn update_question(
        &mut self,
        module_id: &ModuleId,
        question_id: &DiscussionQuestionId,
        patch: impl FnOnce(&mut DiscussionQuestion),
    ) -> EditOutcome {
        self.apply_edit(|doc, ids| edits::update_question(doc, module_id, question_id, patch, ids))
    }

    pub fn remove_question(
        &mut self,
        module_id: &ModuleId,
        question_id: &DiscussionQuestionId,
    ) -> EditOutcome {
        self.apply_edit(|doc, _| edits::remove_question(doc, module_id, question_id))
    }

    // Branch options

    pub fn add_branch_option(
        &mut self,
        module_id: &ModuleId,
        inject_id: &InjectId,
    ) -> Option<BranchOptionId> {
        let mut created = None;
        self.apply_edit(|doc, ids| {
            created = edits::add_branch_option(doc, module_id, inject_id, ids);
            created.is_some()
        });
        created
    }

    pub fn update_branch_option(
        &mut self,
        module_id: &ModuleId,
        inject_id: &InjectId,
        option_id: &BranchOptionId,
        patch: impl FnOnce(&mut BranchOption),
    ) -> EditOutcome {
        self.apply_edit(|doc, _| {
            edits::update_branch_option(doc, module_id, inject_id, option_id, patch)
        })
    }

    pub fn remove_branch_option(
        &mut self,
        module_id: &ModuleId,
        inject_id: &InjectId,
        option_id: &BranchOptionId,
    ) -> EditOutcome {
        self.apply_edit(|doc, _| edits::remove_branch_option(doc, module_id, inject_id, option_id))
    }

    pub fn set_default_branch(
        &mut self,
        module_id: &ModuleId,
        inject_id: &InjectId,
        option_id: &BranchOptionId,
    ) -> EditOutcome {
        self.apply_edit(|doc, _| edits::set_default_branch(doc, module_id, inject_id, option_id))
    }

    // Accessors

    pub fn current(&self) -> Option<&Scenario> {
        self.current.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_cursor(&self) -> usize {
        self.history_cursor
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }
}

impl Default for ScenarioStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioStoreBuilder {
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.history_limit = config.history_limit;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Seed the id generator for reproducible ids.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> ScenarioStore {
        ScenarioStore {
            current: None,
            dirty: false,
            save_path: None,
            history: Vec::new(),
            history_cursor: 0,
            history_limit: self.history_limit.max(1),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            ids: self.seed.map(IdGen::seeded).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    fn store() -> ScenarioStore {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        let mut store = ScenarioStore::builder()
            .history_limit(5)
            .clock(FixedClock::ticking(start, Duration::seconds(1)))
            .seed(99)
            .build();
        store.create_new();
        store
    }

    #[test]
    fn new_store_is_empty() {
        let store = ScenarioStore::new();
        assert!(store.current().is_none());
        assert!(!store.can_undo());
        assert!(!store.can_redo());
        assert_eq!(store.history_limit(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn edits_without_document_are_noops() {
        let mut store = ScenarioStore::new();
        assert!(store.add_module().is_none());
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn create_new_resets_state() {
        let mut store = store();
        store.add_module();
        store.mark_saved(Some(PathBuf::from("drill.json")));
        store.create_new();
        assert_eq!(store.history_len(), 1);
        assert_eq!(store.history_cursor(), 0);
        assert!(!store.is_dirty());
        assert!(store.save_path().is_none());
        assert!(store.current().unwrap().modules.is_empty());
    }

    #[test]
    fn edit_marks_dirty_and_stamps() {
        let mut store = store();
        let created = store.current().unwrap().created_at;
        store.add_module().unwrap();
        let doc = store.current().unwrap();
        assert!(store.is_dirty());
        assert!(doc.updated_at > created);
        assert_eq!(store.history_len(), 2);
    }

    #[test]
    fn mark_saved_keeps_path_when_none_given() {
        let mut store = store();
        store.add_module();
        store.mark_saved(Some(PathBuf::from("a.json")));
        store.add_module();
        store.mark_saved(None);
        assert!(!store.is_dirty());
        assert_eq!(store.save_path(), Some(Path::new("a.json")));
        assert_eq!(store.history_len(), 3);
    }

    #[test]
    fn noop_edit_leaves_history_and_dirty() {
        let mut store = store();
        let before = store.current().unwrap().clone();
        assert_eq!(
            store.remove_module(&ModuleId::new("ghost")),
            EditOutcome::NoOp
        );
        assert_eq!(store.current().unwrap(), &before);
        assert!(!store.is_dirty());
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn undo_redo_walk_history() {
        let mut store = store();
        let original = store.current().unwrap().clone();
        store.add_module();
        let edited = store.current().unwrap().clone();

        assert!(store.undo().applied());
        assert_eq!(store.current().unwrap(), &original);
        assert!(store.is_dirty());
        assert_eq!(store.undo(), EditOutcome::NoOp);

        assert!(store.redo().applied());
        assert_eq!(store.current().unwrap(), &edited);
        assert_eq!(store.redo(), EditOutcome::NoOp);
    }

    #[test]
    fn edit_after_undo_drops_redo_tail() {
        let mut store = store();
        store.add_module();
        store.add_module();
        store.undo();
        assert!(store.can_redo());
        store.add_module();
        assert!(!store.can_redo());
        assert_eq!(store.history_len(), 3);
    }

    #[test]
    fn history_is_bounded() {
        let mut store = store();
        for _ in 0..12 {
            store.add_module();
        }
        assert_eq!(store.history_len(), 5);
        assert_eq!(store.history_cursor(), 4);
        let mut undos = 0;
        while store.undo().applied() {
            undos += 1;
        }
        assert_eq!(undos, 4);
        assert_eq!(store.current().unwrap().modules.len(), 8);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let store = ScenarioStore::builder().history_limit(0).build();
        assert_eq!(store.history_limit(), 1);
    }

    #[test]
    fn config_sets_limit() {
        let cfg = EngineConfig {
            history_limit: 7,
            ..EngineConfig::default()
        };
        let store = ScenarioStore::builder().config(&cfg).build();
        assert_eq!(store.history_limit(), 7);
    }

    #[test]
    fn nested_crud_through_store() {
        let mut store = store();
        let m = store.add_module().unwrap();
        let i = store.add_inject(&m).unwrap();
        let q = store.add_question(&m).unwrap();
        let b = store.add_branch_option(&m, &i).unwrap();
        assert!(store
            .update_branch_option(&m, &i, &b, |o| o.label = "Pay".to_string())
            .applied());
        assert!(store.update_inject(&m, &i, |inj| inj.trigger_time = 10).applied());
        assert!(store
            .update_question(&m, &q, |q| q.question = "Who decides?".to_string())
            .applied());

        let doc = store.current().unwrap();
        let inject = &doc.modules[0].injects[0];
        assert_eq!(inject.trigger_time, 10);
        assert_eq!(inject.branch_options()[0].label, "Pay");
        assert_eq!(doc.modules[0].discussion_questions[0].question, "Who decides?");

        assert!(store.remove_branch_option(&m, &i, &b).applied());
        assert!(store.remove_question(&m, &q).applied());
        assert!(store.remove_inject(&m, &i).applied());
        assert!(store.current().unwrap().modules[0].injects.is_empty());
    }

    #[test]
    fn repeated_default_is_not_recorded() {
        let mut store = store();
        let m = store.add_module().unwrap();
        let i = store.add_inject(&m).unwrap();
        store.add_branch_option(&m, &i).unwrap();
        let b = store.add_branch_option(&m, &i).unwrap();

        assert!(store.set_default_branch(&m, &i, &b).applied());
        store.mark_saved(None);
        let history = store.history_len();
        let cursor = store.history_cursor();

        assert_eq!(store.set_default_branch(&m, &i, &b), EditOutcome::NoOp);
        assert_eq!(store.history_len(), history);
        assert_eq!(store.history_cursor(), cursor);
        assert!(!store.is_dirty());
    }

    #[test]
    fn load_seeds_document_and_path() {
        let mut store = store();
        let mut ids = IdGen::seeded(3);
        let scenario = Scenario::empty(Utc::now(), &mut ids);
        let id = scenario.id.clone();
        store.load(scenario, Some(PathBuf::from("lib/ransomware.json")));
        assert_eq!(store.current().unwrap().id, id);
        assert_eq!(store.save_path(), Some(Path::new("lib/ransomware.json")));
        assert!(!store.is_dirty());
        assert!(!store.can_undo());
    }
}
