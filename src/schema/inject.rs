use serde::{Deserialize, Serialize};

use super::ids::{AttachmentId, BranchOptionId, IdGen, InjectId, ModuleId};

/// What kind of narrative event an inject represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectType {
    #[default]
    Information,
    DecisionPoint,
    Escalation,
    Communication,
    Resource,
    Media,
    Regulatory,
    Technical,
}

impl InjectType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Information => "Information",
            Self::DecisionPoint => "Decision Point",
            Self::Escalation => "Escalation",
            Self::Communication => "Communication",
            Self::Resource => "Resource",
            Self::Media => "Media",
            Self::Regulatory => "Regulatory",
            Self::Technical => "Technical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
}

/// Where a branch option sends the exercise.
///
/// Inject and module targets are weak references: they name an id that is
/// looked up at resolution time, so a target may point backward without
/// creating an ownership cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BranchTarget {
    #[serde(rename_all = "camelCase")]
    Inject {
        inject_id: InjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        module_id: Option<ModuleId>,
    },
    #[serde(rename_all = "camelCase")]
    Module { module_id: ModuleId },
    EndModule,
    EndScenario,
    InsertInjects { injects: Vec<Inject> },
}

impl Default for BranchTarget {
    fn default() -> Self {
        Self::EndModule
    }
}

/// A named choice attached to an inject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOption {
    pub id: BranchOptionId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_notes: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub target: BranchTarget,
}

impl BranchOption {
    pub fn empty(is_default: bool, ids: &mut IdGen) -> Self {
        Self {
            id: ids.next(),
            label: "New option".to_string(),
            description: None,
            facilitator_notes: None,
            is_default,
            target: BranchTarget::default(),
        }
    }
}

/// A timed narrative event delivered to participants during a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inject {
    pub id: InjectId,
    pub title: String,
    #[serde(rename = "type")]
    pub inject_type: InjectType,
    pub severity: Severity,
    /// Minutes from module start.
    pub trigger_time: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub order: u32,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Facilitator-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<BranchOption>>,
}

impl Inject {
    pub fn empty(order: u32, ids: &mut IdGen) -> Self {
        Self {
            id: ids.next(),
            title: "New inject".to_string(),
            inject_type: InjectType::default(),
            severity: Severity::default(),
            trigger_time: 0,
            content: String::new(),
            source: None,
            order,
            attachments: Vec::new(),
            expected_actions: None,
            facilitator_notes: None,
            branches: None,
        }
    }

    /// Branch options, treating an absent list as empty.
    pub fn branch_options(&self) -> &[BranchOption] {
        self.branches.as_deref().unwrap_or(&[])
    }

    /// True if the inject carries at least one branch option. A decision
    /// point with an empty list advances linearly.
    pub fn has_branches(&self) -> bool {
        !self.branch_options().is_empty()
    }

    pub fn default_branch(&self) -> Option<&BranchOption> {
        self.branch_options().iter().find(|b| b.is_default)
    }

    pub fn branch(&self, id: &BranchOptionId) -> Option<&BranchOption> {
        self.branch_options().iter().find(|b| &b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, is_default: bool, target: BranchTarget) -> BranchOption {
        BranchOption {
            id: BranchOptionId::new(id),
            label: id.to_uppercase(),
            description: None,
            facilitator_notes: None,
            is_default,
            target,
        }
    }

    #[test]
    fn empty_inject_defaults() {
        let mut ids = IdGen::seeded(1);
        let inject = Inject::empty(3, &mut ids);
        assert_eq!(inject.order, 3);
        assert_eq!(inject.severity, Severity::Low);
        assert_eq!(inject.inject_type, InjectType::Information);
        assert_eq!(inject.trigger_time, 0);
        assert!(inject.branches.is_none());
        assert!(!inject.has_branches());
    }

    #[test]
    fn default_branch_lookup() {
        let mut ids = IdGen::seeded(1);
        let mut inject = Inject::empty(0, &mut ids);
        inject.branches = Some(vec![
            option("a", false, BranchTarget::EndModule),
            option("b", true, BranchTarget::EndScenario),
        ]);
        assert_eq!(inject.default_branch().unwrap().id.as_str(), "b");
        assert!(inject.branch(&BranchOptionId::new("a")).is_some());
        assert!(inject.branch(&BranchOptionId::new("zzz")).is_none());
    }

    #[test]
    fn empty_branch_list_is_not_branching() {
        let mut ids = IdGen::seeded(1);
        let mut inject = Inject::empty(0, &mut ids);
        inject.inject_type = InjectType::DecisionPoint;
        inject.branches = Some(Vec::new());
        assert!(!inject.has_branches());
    }

    #[test]
    fn branch_target_json_shape() {
        let target = BranchTarget::Inject {
            inject_id: InjectId::new("inj-9"),
            module_id: Some(ModuleId::new("mod-2")),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["type"], "inject");
        assert_eq!(json["injectId"], "inj-9");
        assert_eq!(json["moduleId"], "mod-2");

        let end = serde_json::to_value(BranchTarget::EndScenario).unwrap();
        assert_eq!(end["type"], "end_scenario");
    }

    #[test]
    fn inject_json_uses_camel_case() {
        let mut ids = IdGen::seeded(2);
        let mut inject = Inject::empty(0, &mut ids);
        inject.inject_type = InjectType::DecisionPoint;
        inject.trigger_time = 15;
        let json = serde_json::to_value(&inject).unwrap();
        assert_eq!(json["type"], "decision_point");
        assert_eq!(json["triggerTime"], 15);
        assert!(json.get("branches").is_none());
    }
}
