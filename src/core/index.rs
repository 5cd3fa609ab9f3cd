//! Id lookup table over a borrowed scenario.
//!
//! Branch targets hold plain ids; this is where they are resolved. Entries
//! point at the entity and its owning module, never the other way round.

use rustc_hash::FxHashMap;

use crate::schema::ids::{BranchOptionId, DiscussionQuestionId, InjectId, ModuleId};
use crate::schema::inject::{BranchTarget, Inject};
use crate::schema::module::Module;
use crate::schema::question::DiscussionQuestion;
use crate::schema::scenario::Scenario;

#[derive(Debug, Clone, Copy)]
pub struct InjectEntry<'a> {
    pub inject: &'a Inject,
    /// The module that owns the inject, or the module of the inject whose
    /// `insert_injects` target carries it.
    pub module: &'a Module,
    pub inserted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioIndex<'a> {
    modules: FxHashMap<&'a ModuleId, &'a Module>,
    injects: FxHashMap<&'a InjectId, InjectEntry<'a>>,
    questions: FxHashMap<&'a DiscussionQuestionId, (&'a DiscussionQuestion, &'a Module)>,
    duplicates: Vec<String>,
}

impl<'a> ScenarioIndex<'a> {
    pub fn build(scenario: &'a Scenario) -> Self {
        let mut index = ScenarioIndex::default();

        for module in &scenario.modules {
            if index.modules.insert(&module.id, module).is_some() {
                index.duplicates.push(module.id.to_string());
            }
            for question in &module.discussion_questions {
                if index
                    .questions
                    .insert(&question.id, (question, module))
                    .is_some()
                {
                    index.duplicates.push(question.id.to_string());
                }
            }
        }

        // Module-owned injects first so they win over inserted copies.
        for module in &scenario.modules {
            for inject in &module.injects {
                index.add_inject(inject, module, false);
            }
        }
        for module in &scenario.modules {
            for inject in &module.injects {
                index.add_inserted(inject, module);
            }
        }

        index
    }

    fn add_inject(&mut self, inject: &'a Inject, module: &'a Module, inserted: bool) {
        if self.injects.contains_key(&inject.id) {
            self.duplicates.push(inject.id.to_string());
            return;
        }
        self.injects.insert(
            &inject.id,
            InjectEntry {
                inject,
                module,
                inserted,
            },
        );
    }

    fn add_inserted(&mut self, host: &'a Inject, module: &'a Module) {
        for option in host.branch_options() {
            if let BranchTarget::InsertInjects { injects } = &option.target {
                for inserted in injects {
                    self.add_inject(inserted, module, true);
                    self.add_inserted(inserted, module);
                }
            }
        }
    }

    pub fn module(&self, id: &ModuleId) -> Option<&'a Module> {
        self.modules.get(id).copied()
    }

    pub fn inject(&self, id: &InjectId) -> Option<InjectEntry<'a>> {
        self.injects.get(id).copied()
    }

    /// Look up an inject owned directly by the given module.
    pub fn inject_in(&self, module_id: &ModuleId, id: &InjectId) -> Option<&'a Inject> {
        self.module(module_id)?.inject(id)
    }

    pub fn question(&self, id: &DiscussionQuestionId) -> Option<&'a DiscussionQuestion> {
        self.questions.get(id).map(|(question, _)| *question)
    }

    pub fn branch_label(&self, inject_id: &InjectId, option_id: &BranchOptionId) -> Option<&'a str> {
        let entry = self.inject(inject_id)?;
        entry.inject.branch(option_id).map(|b| b.label.as_str())
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn inject_count(&self) -> usize {
        self.injects.len()
    }

    /// Ids seen more than once while building.
    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids::IdGen;
    use crate::schema::inject::BranchOption;
    use chrono::{TimeZone, Utc};

    fn scenario() -> Scenario {
        let mut ids = IdGen::seeded(11);
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        let mut scenario = Scenario::empty(now, &mut ids);
        let mut module = Module::empty(0, &mut ids);
        module.id = ModuleId::new("m1");
        let mut host = Inject::empty(0, &mut ids);
        host.id = InjectId::new("host");
        let mut extra = Inject::empty(0, &mut ids);
        extra.id = InjectId::new("extra");
        host.branches = Some(vec![BranchOption {
            id: BranchOptionId::new("detour"),
            label: "Call legal".to_string(),
            description: None,
            facilitator_notes: None,
            is_default: true,
            target: BranchTarget::InsertInjects {
                injects: vec![extra],
            },
        }]);
        module.injects.push(host);
        scenario.modules.push(module);
        scenario
    }

    #[test]
    fn indexes_module_and_inserted_injects() {
        let scenario = scenario();
        let index = ScenarioIndex::build(&scenario);
        assert_eq!(index.module_count(), 1);
        assert_eq!(index.inject_count(), 2);

        let host = index.inject(&InjectId::new("host")).unwrap();
        assert!(!host.inserted);
        let extra = index.inject(&InjectId::new("extra")).unwrap();
        assert!(extra.inserted);
        assert_eq!(extra.module.id.as_str(), "m1");
    }

    #[test]
    fn inject_in_only_sees_owned_injects() {
        let scenario = scenario();
        let index = ScenarioIndex::build(&scenario);
        let m1 = ModuleId::new("m1");
        assert!(index.inject_in(&m1, &InjectId::new("host")).is_some());
        assert!(index.inject_in(&m1, &InjectId::new("extra")).is_none());
    }

    #[test]
    fn branch_label_lookup() {
        let scenario = scenario();
        let index = ScenarioIndex::build(&scenario);
        assert_eq!(
            index.branch_label(&InjectId::new("host"), &BranchOptionId::new("detour")),
            Some("Call legal")
        );
        assert_eq!(
            index.branch_label(&InjectId::new("host"), &BranchOptionId::new("nope")),
            None
        );
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let mut scenario = scenario();
        let copy = scenario.modules[0].injects[0].clone();
        scenario.modules[0].injects.push(copy);
        let index = ScenarioIndex::build(&scenario);
        assert!(index.duplicate_ids().iter().any(|id| id == "host"));
    }
}
