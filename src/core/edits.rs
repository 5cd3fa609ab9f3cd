//! Entity-level edits over a whole scenario document.
//!
//! Every function here mutates a scenario in place and reports whether it
//! did anything. They are run by the store on a private copy of the current
//! document, so a `false`/`None` result means the copy is thrown away and no
//! history entry is recorded.

use crate::schema::ids::{BranchOptionId, DiscussionQuestionId, IdGen, InjectId, ModuleId};
use crate::schema::inject::{BranchOption, BranchTarget, Inject};
use crate::schema::module::Module;
use crate::schema::question::DiscussionQuestion;
use crate::schema::scenario::Scenario;

/// A sibling collection member carrying a dense `order` field.
pub trait Sequenced {
    fn order(&self) -> u32;
    fn set_order(&mut self, order: u32);
}

impl Sequenced for Module {
    fn order(&self) -> u32 {
        self.order
    }
    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

impl Sequenced for Inject {
    fn order(&self) -> u32 {
        self.order
    }
    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

impl Sequenced for DiscussionQuestion {
    fn order(&self) -> u32 {
        self.order
    }
    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// Rewrite `order` to 0..n-1 following array position.
pub fn resequence<T: Sequenced>(items: &mut [T]) {
    for (i, item) in items.iter_mut().enumerate() {
        item.set_order(i as u32);
    }
}

/// True if the orders form exactly 0..n-1.
pub fn is_dense<T: Sequenced>(items: &[T]) -> bool {
    let mut orders: Vec<u32> = items.iter().map(Sequenced::order).collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(i, order)| *order == i as u32)
}

fn next_order<T>(items: &[T]) -> u32 {
    items.len() as u32
}

/// Move the element at `from` to `to` after putting the collection into
/// playback order, then resequence.
fn move_within<T: Sequenced>(items: &mut Vec<T>, from_id: impl Fn(&T) -> bool, to: usize) -> bool {
    items.sort_by_key(Sequenced::order);
    let Some(from) = items.iter().position(from_id) else {
        return false;
    };
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
    resequence(items);
    true
}

fn keep_single_default(branches: &mut [BranchOption], keep: Option<&BranchOptionId>) {
    let keep = keep
        .cloned()
        .or_else(|| branches.iter().find(|b| b.is_default).map(|b| b.id.clone()));
    for branch in branches.iter_mut() {
        branch.is_default = keep.as_ref() == Some(&branch.id);
    }
}

fn inject_mut<'a>(
    doc: &'a mut Scenario,
    module_id: &ModuleId,
    inject_id: &InjectId,
) -> Option<&'a mut Inject> {
    doc.module_mut(module_id)?.inject_mut(inject_id)
}

// Scenario

pub fn update_scenario(doc: &mut Scenario, patch: impl FnOnce(&mut Scenario)) -> bool {
    let id = doc.id.clone();
    let created_at = doc.created_at;
    patch(doc);
    doc.id = id;
    doc.created_at = created_at;
    doc.estimated_duration = doc.estimated_duration.max(1);
    resequence(&mut doc.modules);
    true
}

// Modules

pub fn add_module(doc: &mut Scenario, ids: &mut IdGen) -> ModuleId {
    let module = Module::empty(next_order(&doc.modules), ids);
    let id = module.id.clone();
    doc.modules.push(module);
    id
}

pub fn update_module(doc: &mut Scenario, id: &ModuleId, patch: impl FnOnce(&mut Module)) -> bool {
    let Some(module) = doc.module_mut(id) else {
        return false;
    };
    let order = module.order;
    patch(module);
    module.id = id.clone();
    module.order = order;
    true
}

pub fn remove_module(doc: &mut Scenario, id: &ModuleId) -> bool {
    let before = doc.modules.len();
    doc.modules.retain(|module| &module.id != id);
    if doc.modules.len() == before {
        return false;
    }
    resequence(&mut doc.modules);
    true
}

pub fn move_module(doc: &mut Scenario, id: &ModuleId, to: usize) -> bool {
    move_within(&mut doc.modules, |module| &module.id == id, to)
}

// Injects

pub fn add_inject(doc: &mut Scenario, module_id: &ModuleId, ids: &mut IdGen) -> Option<InjectId> {
    let module = doc.module_mut(module_id)?;
    let inject = Inject::empty(next_order(&module.injects), ids);
    let id = inject.id.clone();
    module.injects.push(inject);
    Some(id)
}

pub fn update_inject(
    doc: &mut Scenario,
    module_id: &ModuleId,
    inject_id: &InjectId,
    patch: impl FnOnce(&mut Inject),
) -> bool {
    let Some(inject) = inject_mut(doc, module_id, inject_id) else {
        return false;
    };
    let order = inject.order;
    patch(inject);
    inject.id = inject_id.clone();
    inject.order = order;
    if let Some(branches) = inject.branches.as_mut() {
        keep_single_default(branches, None);
    }
    true
}

pub fn remove_inject(doc: &mut Scenario, module_id: &ModuleId, inject_id: &InjectId) -> bool {
    let Some(module) = doc.module_mut(module_id) else {
        return false;
    };
    let before = module.injects.len();
    module.injects.retain(|inject| &inject.id != inject_id);
    if module.injects.len() == before {
        return false;
    }
    resequence(&mut module.injects);
    true
}

pub fn move_inject(doc: &mut Scenario, module_id: &ModuleId, inject_id: &InjectId, to: usize) -> bool {
    let Some(module) = doc.module_mut(module_id) else {
        return false;
    };
    move_within(&mut module.injects, |inject| &inject.id == inject_id, to)
}

/// Give an inject, its branch options and any injects its options insert
/// fresh ids.
fn refresh_ids(inject: &mut Inject, ids: &mut IdGen) {
    inject.id = ids.next();
    for attachment in inject.attachments.iter_mut() {
        attachment.id = ids.next();
    }
    for option in inject.branches.iter_mut().flatten() {
        option.id = ids.next();
        if let BranchTarget::InsertInjects { injects } = &mut option.target {
            for inserted in injects.iter_mut() {
                refresh_ids(inserted, ids);
            }
        }
    }
}

/// Copy an inject and place the copy right after the original.
pub fn duplicate_inject(
    doc: &mut Scenario,
    module_id: &ModuleId,
    inject_id: &InjectId,
    ids: &mut IdGen,
) -> Option<InjectId> {
    let module = doc.module_mut(module_id)?;
    module.injects.sort_by_key(|inject| inject.order);
    let pos = module.injects.iter().position(|inject| &inject.id == inject_id)?;
    let mut copy = module.injects[pos].clone();
    refresh_ids(&mut copy, ids);
    copy.title = format!("{} (copy)", copy.title);
    let id = copy.id.clone();
    module.injects.insert(pos + 1, copy);
    resequence(&mut module.injects);
    Some(id)
}

// Discussion questions

pub fn add_question(
    doc: &mut Scenario,
    module_id: &ModuleId,
    ids: &mut IdGen,
) -> Option<DiscussionQuestionId> {
    let module = doc.module_mut(module_id)?;
    let question = DiscussionQuestion::empty(next_order(&module.discussion_questions), ids);
    let id = question.id.clone();
    module.discussion_questions.push(question);
    Some(id)
}

pub fn update_question(
    doc: &mut Scenario,
    module_id: &ModuleId,
    question_id: &DiscussionQuestionId,
    patch: impl FnOnce(&mut DiscussionQuestion),
    ids: &mut IdGen,
) -> bool {
    let Some(question) = doc
        .module_mut(module_id)
        .and_then(|m| m.discussion_questions.iter_mut().find(|q| &q.id == question_id))
    else {
        return false;
    };
    let order = question.order;
    patch(question);
    question.id = question_id.clone();
    question.order = order;
    question.normalize_options(ids);
    true
}

pub fn remove_question(
    doc: &mut Scenario,
    module_id: &ModuleId,
    question_id: &DiscussionQuestionId,
) -> bool {
    let Some(module) = doc.module_mut(module_id) else {
        return false;
    };
    let before = module.discussion_questions.len();
    module.discussion_questions.retain(|q| &q.id != question_id);
    if module.discussion_questions.len() == before {
        return false;
    }
    resequence(&mut module.discussion_questions);
    true
}

// Branch options

pub fn add_branch_option(
    doc: &mut Scenario,
    module_id: &ModuleId,
    inject_id: &InjectId,
    ids: &mut IdGen,
) -> Option<BranchOptionId> {
    let inject = inject_mut(doc, module_id, inject_id)?;
    let option = BranchOption::empty(false, ids);
    let id = option.id.clone();
    inject.branches.get_or_insert_with(Vec::new).push(option);
    Some(id)
}

pub fn update_branch_option(
    doc: &mut Scenario,
    module_id: &ModuleId,
    inject_id: &InjectId,
    option_id: &BranchOptionId,
    patch: impl FnOnce(&mut BranchOption),
) -> bool {
    let Some(branches) = inject_mut(doc, module_id, inject_id).and_then(|i| i.branches.as_mut())
    else {
        return false;
    };
    let Some(option) = branches.iter_mut().find(|b| &b.id == option_id) else {
        return false;
    };
    patch(option);
    option.id = option_id.clone();
    if option.is_default {
        keep_single_default(branches, Some(option_id));
    }
    true
}

pub fn remove_branch_option(
    doc: &mut Scenario,
    module_id: &ModuleId,
    inject_id: &InjectId,
    option_id: &BranchOptionId,
) -> bool {
    let Some(inject) = inject_mut(doc, module_id, inject_id) else {
        return false;
    };
    let Some(branches) = inject.branches.as_mut() else {
        return false;
    };
    let before = branches.len();
    branches.retain(|b| &b.id != option_id);
    if branches.len() == before {
        return false;
    }
    if branches.is_empty() {
        inject.branches = None;
    }
    true
}

pub fn set_default_branch(
    doc: &mut Scenario,
    module_id: &ModuleId,
    inject_id: &InjectId,
    option_id: &BranchOptionId,
) -> bool {
    let Some(branches) = inject_mut(doc, module_id, inject_id).and_then(|i| i.branches.as_mut())
    else {
        return false;
    };
    if !branches.iter().any(|b| &b.id == option_id) {
        return false;
    }
    if branches.iter().all(|b| b.is_default == (&b.id == option_id)) {
        return false;
    }
    keep_single_default(branches, Some(option_id));
    true
}
