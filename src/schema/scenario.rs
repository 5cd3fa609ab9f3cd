use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::ids::{IdGen, MaterialId, ModuleId, ScenarioId};
use super::module::Module;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    #[default]
    Ransomware,
    Phishing,
    DataBreach,
    InsiderThreat,
    Ddos,
    SupplyChain,
    Malware,
    BusinessEmailCompromise,
    CloudCompromise,
    Physical,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// A long-form companion document (facilitator guide, handout, AAR template).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuideDocument {
    pub title: String,
    /// Markdown body.
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    #[default]
    Document,
    Image,
    Video,
    Link,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportingMaterial {
    pub id: MaterialId,
    pub name: String,
    pub kind: MaterialKind,
    /// Path or URL, resolved by whoever presents the material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The full authored exercise document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: ScenarioId,
    pub title: String,
    pub description: String,
    pub threat_category: ThreatCategory,
    pub difficulty: Difficulty,
    /// Minutes, always > 0.
    pub estimated_duration: u32,
    pub author: String,
    #[serde(default)]
    pub tags: FxHashSet<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_guide: Option<GuideDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_handout: Option<GuideDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aar_template: Option<GuideDocument>,
    #[serde(default)]
    pub supporting_materials: Vec<SupportingMaterial>,
}

impl Scenario {
    pub fn empty(now: DateTime<Utc>, ids: &mut IdGen) -> Self {
        Self {
            id: ids.next(),
            title: "Untitled Scenario".to_string(),
            description: String::new(),
            threat_category: ThreatCategory::default(),
            difficulty: Difficulty::default(),
            estimated_duration: 120,
            author: String::new(),
            tags: FxHashSet::default(),
            objectives: Vec::new(),
            created_at: now,
            updated_at: now,
            modules: Vec::new(),
            facilitator_guide: None,
            participant_handout: None,
            aar_template: None,
            supporting_materials: Vec::new(),
        }
    }

    /// Modules by ascending `order`, ties kept in insertion order.
    pub fn sorted_modules(&self) -> Vec<&Module> {
        let mut modules: Vec<&Module> = self.modules.iter().collect();
        modules.sort_by_key(|module| module.order);
        modules
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|module| &module.id == id)
    }

    pub(crate) fn module_mut(&mut self, id: &ModuleId) -> Option<&mut Module> {
        self.modules.iter_mut().find(|module| &module.id == id)
    }

    /// The module that follows `id` in playback order, if any.
    pub fn module_after(&self, id: &ModuleId) -> Option<&Module> {
        let sorted = self.sorted_modules();
        let pos = sorted.iter().position(|module| &module.id == id)?;
        sorted.get(pos + 1).copied()
    }

    pub fn total_inject_count(&self) -> usize {
        self.modules.iter().map(|module| module.injects.len()).sum()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
