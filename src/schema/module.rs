use serde::{Deserialize, Serialize};

use super::ids::{IdGen, InjectId, ModuleId};
use super::inject::Inject;
use super::question::DiscussionQuestion;

/// Incident-response phase a module covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreIncident,
    #[default]
    Detection,
    Containment,
    Eradication,
    Recovery,
    PostIncident,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PreIncident => "Pre-Incident",
            Self::Detection => "Detection & Analysis",
            Self::Containment => "Containment",
            Self::Eradication => "Eradication",
            Self::Recovery => "Recovery",
            Self::PostIncident => "Post-Incident",
        }
    }
}

/// A phase-scoped grouping of injects and discussion questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: ModuleId,
    pub title: String,
    pub phase: Phase,
    pub order: u32,
    pub description: String,
    /// Minutes.
    pub suggested_duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_guidance: Option<String>,
    #[serde(default)]
    pub injects: Vec<Inject>,
    #[serde(default)]
    pub discussion_questions: Vec<DiscussionQuestion>,
}

impl Module {
    pub fn empty(order: u32, ids: &mut IdGen) -> Self {
        Self {
            id: ids.next(),
            title: format!("Module {}", order + 1),
            phase: Phase::default(),
            order,
            description: String::new(),
            suggested_duration: 30,
            facilitator_notes: None,
            transition_guidance: None,
            injects: Vec::new(),
            discussion_questions: Vec::new(),
        }
    }

    /// Injects by ascending `order`, ties kept in insertion order.
    pub fn sorted_injects(&self) -> Vec<&Inject> {
        let mut injects: Vec<&Inject> = self.injects.iter().collect();
        injects.sort_by_key(|inject| inject.order);
        injects
    }

    pub fn first_inject(&self) -> Option<&Inject> {
        self.sorted_injects().into_iter().next()
    }

    /// The inject that follows `id` in playback order, if any.
    pub fn inject_after(&self, id: &InjectId) -> Option<&Inject> {
        let sorted = self.sorted_injects();
        let pos = sorted.iter().position(|inject| &inject.id == id)?;
        sorted.get(pos + 1).copied()
    }

    pub fn inject(&self, id: &InjectId) -> Option<&Inject> {
        self.injects.iter().find(|inject| &inject.id == id)
    }

    pub(crate) fn inject_mut(&mut self, id: &InjectId) -> Option<&mut Inject> {
        self.injects.iter_mut().find(|inject| &inject.id == id)
    }

    /// Sum of inject trigger span and question time, in minutes.
    pub fn planned_minutes(&self) -> u32 {
        let last_trigger = self
            .injects
            .iter()
            .map(|inject| inject.trigger_time)
            .max()
            .unwrap_or(0);
        let discussion: u32 = self
            .discussion_questions
            .iter()
            .filter_map(|q| q.suggested_discussion_time)
            .sum();
        last_trigger.max(self.suggested_duration) + discussion
    }
}
