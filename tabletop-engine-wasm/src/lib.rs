//! WASM bindings for tabletop-engine — the editor and run surfaces a
//! browser UI drives.
//!
//! Everything crosses the boundary as JSON strings. Entity updates take a
//! partial JSON object whose fields replace the entity's; ids, order and
//! child collections are managed by their own calls and ignored in patches.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use tabletop_engine::core::config::EngineConfig;
use tabletop_engine::core::persist::ScenarioFile;
use tabletop_engine::core::run::ExerciseRun;
use tabletop_engine::core::store::{EditOutcome, ScenarioStore};
use tabletop_engine::core::validate::validate;
use tabletop_engine::schema::decision::DecidedBy;
use tabletop_engine::schema::ids::{BranchOptionId, DiscussionQuestionId, InjectId, ModuleId};
use tabletop_engine::schema::scenario::Scenario;

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------
fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| js_err("Serialization error", e))
}

/// Overlay the fields of `patch_json` onto `current`, skipping `locked`.
fn merged<T: Serialize + DeserializeOwned>(
    current: &T,
    patch_json: &str,
    locked: &[&str],
) -> Result<T, JsError> {
    let patch: Value =
        serde_json::from_str(patch_json).map_err(|e| js_err("Invalid patch JSON", e))?;
    let Value::Object(patch) = patch else {
        return Err(JsError::new("Patch must be a JSON object"));
    };
    let mut value = serde_json::to_value(current).map_err(|e| js_err("Serialization error", e))?;
    if let Value::Object(fields) = &mut value {
        for (key, field) in patch {
            if !locked.contains(&key.as_str()) {
                fields.insert(key, field);
            }
        }
    }
    serde_json::from_value(value).map_err(|e| js_err("Invalid field value", e))
}

fn parse_decided_by(s: &str) -> DecidedBy {
    match s {
        "participant_vote" | "vote" => DecidedBy::ParticipantVote,
        _ => DecidedBy::Facilitator,
    }
}

// ---------------------------------------------------------------------------
// EditorSession — document editing with undo/redo
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct EditorSession {
    store: ScenarioStore,
    config: EngineConfig,
}

#[wasm_bindgen]
impl EditorSession {
    /// Create a session. `config_ron` may be empty for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_ron: &str) -> Result<EditorSession, JsError> {
        let config = if config_ron.trim().is_empty() {
            EngineConfig::default()
        } else {
            EngineConfig::parse_ron(config_ron).map_err(|e| js_err("Config parse error", e))?
        };
        let store = ScenarioStore::builder().config(&config).build();
        Ok(EditorSession { store, config })
    }

    pub fn create_new(&mut self) {
        self.store.create_new();
    }

    /// Load a scenario envelope as produced by `export`.
    pub fn load(&mut self, envelope_json: &str) -> Result<(), JsError> {
        let file =
            ScenarioFile::from_json(envelope_json).map_err(|e| js_err("Invalid scenario file", e))?;
        self.store.load(file.into_scenario(), None);
        Ok(())
    }

    /// The current document wrapped in its envelope.
    pub fn export(&self) -> Result<String, JsError> {
        let scenario = self.scenario()?;
        ScenarioFile::from_scenario(scenario)
            .to_json_pretty()
            .map_err(|e| js_err("Serialization error", e))
    }

    /// The bare document, or `null` when none is open.
    pub fn document(&self) -> Result<String, JsError> {
        to_json(&self.store.current())
    }

    pub fn mark_saved(&mut self) {
        self.store.mark_saved(None);
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        self.store.undo().applied()
    }

    pub fn redo(&mut self) -> bool {
        self.store.redo().applied()
    }

    /// JSON `{errors, warnings}` for the current document.
    pub fn validate(&self) -> Result<String, JsError> {
        to_json(&validate(self.scenario()?))
    }

    // -- scenario --------------------------------------------------------

    pub fn update_scenario(&mut self, patch_json: &str) -> Result<bool, JsError> {
        let next: Scenario = merged(
            self.scenario()?,
            patch_json,
            &["id", "createdAt", "updatedAt", "modules"],
        )?;
        Ok(applied(self.store.update_scenario(|s| *s = next)))
    }

    // -- modules ---------------------------------------------------------

    pub fn add_module(&mut self) -> Option<String> {
        self.store.add_module().map(|id| id.to_string())
    }

    pub fn update_module(&mut self, module_id: &str, patch_json: &str) -> Result<bool, JsError> {
        let id = ModuleId::new(module_id);
        let Some(module) = self.scenario()?.module(&id) else {
            return Ok(false);
        };
        let next = merged(
            module,
            patch_json,
            &["id", "order", "injects", "discussionQuestions"],
        )?;
        Ok(applied(self.store.update_module(&id, |m| *m = next)))
    }

    pub fn remove_module(&mut self, module_id: &str) -> bool {
        self.store.remove_module(&ModuleId::new(module_id)).applied()
    }

    pub fn move_module(&mut self, module_id: &str, to_index: usize) -> bool {
        self.store
            .move_module(&ModuleId::new(module_id), to_index)
            .applied()
    }

    // -- injects ---------------------------------------------------------

    pub fn add_inject(&mut self, module_id: &str) -> Option<String> {
        self.store
            .add_inject(&ModuleId::new(module_id))
            .map(|id| id.to_string())
    }

    pub fn update_inject(
        &mut self,
        module_id: &str,
        inject_id: &str,
        patch_json: &str,
    ) -> Result<bool, JsError> {
        let (module_id, inject_id) = (ModuleId::new(module_id), InjectId::new(inject_id));
        let Some(inject) = self
            .scenario()?
            .module(&module_id)
            .and_then(|m| m.inject(&inject_id))
        else {
            return Ok(false);
        };
        let next = merged(inject, patch_json, &["id", "order", "branches"])?;
        Ok(applied(
            self.store.update_inject(&module_id, &inject_id, |i| *i = next),
        ))
    }

    pub fn remove_inject(&mut self, module_id: &str, inject_id: &str) -> bool {
        self.store
            .remove_inject(&ModuleId::new(module_id), &InjectId::new(inject_id))
            .applied()
    }

    pub fn move_inject(&mut self, module_id: &str, inject_id: &str, to_index: usize) -> bool {
        self.store
            .move_inject(&ModuleId::new(module_id), &InjectId::new(inject_id), to_index)
            .applied()
    }

    pub fn duplicate_inject(&mut self, module_id: &str, inject_id: &str) -> Option<String> {
        self.store
            .duplicate_inject(&ModuleId::new(module_id), &InjectId::new(inject_id))
            .map(|id| id.to_string())
    }

    // -- discussion questions --------------------------------------------

    pub fn add_question(&mut self, module_id: &str) -> Option<String> {
        self.store
            .add_question(&ModuleId::new(module_id))
            .map(|id| id.to_string())
    }

    pub fn update_question(
        &mut self,
        module_id: &str,
        question_id: &str,
        patch_json: &str,
    ) -> Result<bool, JsError> {
        let module_id = ModuleId::new(module_id);
        let question_id = DiscussionQuestionId::new(question_id);
        let Some(question) = self.scenario()?.module(&module_id).and_then(|m| {
            m.discussion_questions
                .iter()
                .find(|q| q.id == question_id)
        }) else {
            return Ok(false);
        };
        let next = merged(question, patch_json, &["id", "order"])?;
        Ok(applied(self.store.update_question(
            &module_id,
            &question_id,
            |q| *q = next,
        )))
    }

    pub fn remove_question(&mut self, module_id: &str, question_id: &str) -> bool {
        self.store
            .remove_question(
                &ModuleId::new(module_id),
                &DiscussionQuestionId::new(question_id),
            )
            .applied()
    }

    // -- branch options --------------------------------------------------

    pub fn add_branch_option(&mut self, module_id: &str, inject_id: &str) -> Option<String> {
        self.store
            .add_branch_option(&ModuleId::new(module_id), &InjectId::new(inject_id))
            .map(|id| id.to_string())
    }

    pub fn update_branch_option(
        &mut self,
        module_id: &str,
        inject_id: &str,
        option_id: &str,
        patch_json: &str,
    ) -> Result<bool, JsError> {
        let module_id = ModuleId::new(module_id);
        let inject_id = InjectId::new(inject_id);
        let option_id = BranchOptionId::new(option_id);
        let Some(option) = self
            .scenario()?
            .module(&module_id)
            .and_then(|m| m.inject(&inject_id))
            .and_then(|i| i.branch(&option_id))
        else {
            return Ok(false);
        };
        let next = merged(option, patch_json, &["id"])?;
        Ok(applied(self.store.update_branch_option(
            &module_id,
            &inject_id,
            &option_id,
            |o| *o = next,
        )))
    }

    pub fn remove_branch_option(&mut self, module_id: &str, inject_id: &str, option_id: &str) -> bool {
        self.store
            .remove_branch_option(
                &ModuleId::new(module_id),
                &InjectId::new(inject_id),
                &BranchOptionId::new(option_id),
            )
            .applied()
    }

    pub fn set_default_branch(&mut self, module_id: &str, inject_id: &str, option_id: &str) -> bool {
        self.store
            .set_default_branch(
                &ModuleId::new(module_id),
                &InjectId::new(inject_id),
                &BranchOptionId::new(option_id),
            )
            .applied()
    }

    // -- playback --------------------------------------------------------

    /// Start a run over a snapshot of the current document.
    pub fn start_run(&self) -> Result<RunSession, JsError> {
        let scenario = self.scenario()?.clone();
        Ok(RunSession {
            run: ExerciseRun::builder(scenario).config(&self.config).build(),
        })
    }
}

impl EditorSession {
    fn scenario(&self) -> Result<&Scenario, JsError> {
        self.store
            .current()
            .ok_or_else(|| JsError::new("No scenario is open"))
    }
}

fn applied(outcome: EditOutcome) -> bool {
    outcome.applied()
}

// ---------------------------------------------------------------------------
// RunSession — playback of one scenario
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct RunSession {
    run: ExerciseRun,
}

#[wasm_bindgen]
impl RunSession {
    /// Start a run directly from a scenario envelope.
    #[wasm_bindgen(constructor)]
    pub fn new(envelope_json: &str, allow_backtracking: bool) -> Result<RunSession, JsError> {
        let scenario = ScenarioFile::from_json(envelope_json)
            .map_err(|e| js_err("Invalid scenario file", e))?
            .into_scenario();
        Ok(RunSession {
            run: ExerciseRun::builder(scenario)
                .allow_backtracking(allow_backtracking)
                .build(),
        })
    }

    /// Advance, taking the default option at a decision point. Returns the
    /// new cursor as JSON.
    pub fn advance(&mut self) -> Result<String, JsError> {
        let cursor = self
            .run
            .advance(None)
            .map_err(|e| js_err("Advance refused", e))?;
        to_json(cursor)
    }

    /// Pick a branch option. `decided_by` is `facilitator` or
    /// `participant_vote`.
    pub fn choose(&mut self, option_id: &str, decided_by: &str) -> Result<String, JsError> {
        let cursor = self
            .run
            .choose(option_id, parse_decided_by(decided_by))
            .map_err(|e| js_err("Choice refused", e))?;
        to_json(cursor)
    }

    pub fn continue_to_next_module(&mut self) -> Result<String, JsError> {
        let cursor = self
            .run
            .continue_to_next_module()
            .map_err(|e| js_err("Advance refused", e))?;
        to_json(cursor)
    }

    pub fn revert_to(&mut self, decision_index: usize) -> Result<String, JsError> {
        let cursor = self
            .run
            .revert_to(decision_index)
            .map_err(|e| js_err("Revert refused", e))?;
        to_json(cursor)
    }

    pub fn end_module(&mut self) {
        self.run.end_module();
    }

    pub fn end_run(&mut self) {
        self.run.end_run();
    }

    /// Full run state (cursor, detour and decision log) as JSON.
    pub fn state(&self) -> Result<String, JsError> {
        to_json(self.run.state())
    }

    pub fn current_inject(&self) -> Result<String, JsError> {
        to_json(&self.run.current_inject())
    }

    pub fn current_module_title(&self) -> Option<String> {
        self.run.current_module().map(|m| m.title.clone())
    }

    pub fn pending_options(&self) -> Result<String, JsError> {
        to_json(self.run.pending_options())
    }

    pub fn decision_log(&self) -> Result<String, JsError> {
        to_json(self.run.decision_log())
    }

    pub fn path_summary(&self) -> Result<String, JsError> {
        to_json(&self.run.path_summary())
    }

    pub fn is_finished(&self) -> bool {
        self.run.is_finished()
    }

    pub fn elapsed_trigger_time(&self) -> u32 {
        self.run.elapsed_trigger_time()
    }
}
