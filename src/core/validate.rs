//! Structural checks over a scenario document.
//!
//! The store keeps these invariants for documents it edits; documents that
//! arrive from elsewhere (hand-written files, older tools) may not.

use serde::Serialize;

use crate::core::edits::is_dense;
use crate::core::index::ScenarioIndex;
use crate::schema::inject::{BranchTarget, Inject};
use crate::schema::module::Module;
use crate::schema::scenario::Scenario;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate(scenario: &Scenario) -> ValidationReport {
    let mut report = ValidationReport::default();
    let index = ScenarioIndex::build(scenario);

    if scenario.estimated_duration == 0 {
        report
            .errors
            .push("scenario estimatedDuration must be greater than zero".to_string());
    }
    if scenario.updated_at < scenario.created_at {
        report.errors.push(format!(
            "scenario updatedAt {} is before createdAt {}",
            scenario.updated_at, scenario.created_at
        ));
    }
    if !is_dense(&scenario.modules) {
        report
            .errors
            .push("module orders are not 0..n-1".to_string());
    }

    for id in index.duplicate_ids() {
        report.errors.push(format!("id '{id}' is used more than once"));
    }

    for module in &scenario.modules {
        check_module(module, &index, &mut report);
    }

    report
}

fn check_module(module: &Module, index: &ScenarioIndex<'_>, report: &mut ValidationReport) {
    if module.injects.is_empty() {
        report
            .warnings
            .push(format!("module '{}' has no injects", module.title));
    }
    if !is_dense(&module.injects) {
        report.errors.push(format!(
            "inject orders in module '{}' are not 0..n-1",
            module.title
        ));
    }
    if !is_dense(&module.discussion_questions) {
        report.errors.push(format!(
            "question orders in module '{}' are not 0..n-1",
            module.title
        ));
    }
    for question in &module.discussion_questions {
        if !question.options_consistent() {
            report.errors.push(format!(
                "question '{}' in module '{}' has response options that do not match its response type",
                question.id, module.title
            ));
        }
    }
    for inject in &module.injects {
        check_inject(inject, index, report);
    }
}

fn check_inject(inject: &Inject, index: &ScenarioIndex<'_>, report: &mut ValidationReport) {
    let branches = inject.branch_options();
    let defaults = branches.iter().filter(|b| b.is_default).count();
    if defaults > 1 {
        report.errors.push(format!(
            "inject '{}' has {defaults} default branches",
            inject.id
        ));
    } else if defaults == 0 && !branches.is_empty() {
        report.warnings.push(format!(
            "inject '{}' has branches but no default; playback cannot advance without a choice",
            inject.id
        ));
    }

    for option in branches {
        match &option.target {
            BranchTarget::Inject {
                inject_id,
                module_id: Some(module_id),
            } => {
                if index.inject_in(module_id, inject_id).is_none() {
                    report.errors.push(format!(
                        "branch '{}' of inject '{}' targets inject '{inject_id}' which is not in module '{module_id}'",
                        option.id, inject.id
                    ));
                }
            }
            BranchTarget::Inject {
                inject_id,
                module_id: None,
            } => {
                if !index.inject(inject_id).is_some_and(|entry| !entry.inserted) {
                    report.errors.push(format!(
                        "branch '{}' of inject '{}' targets unknown inject '{inject_id}'",
                        option.id, inject.id
                    ));
                }
            }
            BranchTarget::Module { module_id } => {
                if index.module(module_id).is_none() {
                    report.errors.push(format!(
                        "branch '{}' of inject '{}' targets unknown module '{module_id}'",
                        option.id, inject.id
                    ));
                }
            }
            BranchTarget::InsertInjects { injects } => {
                for inserted in injects {
                    check_inject(inserted, index, report);
                }
            }
            BranchTarget::EndModule | BranchTarget::EndScenario => {}
        }
    }
}
