use serde::{Deserialize, Serialize};

use crate::catalog::{GroupId, VariantId};
use crate::patch::GroupState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityIssue {
    /// Some, but not all, option regions hold cataloged bytes.
    PartialModification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    pub can_edit_resolutions: bool,
    pub can_edit_options: bool,
    pub issues: Vec<CapabilityIssue>,
}

impl Capabilities {
    pub fn full() -> Self {
        Self {
            can_edit_resolutions: true,
            can_edit_options: true,
            issues: Vec::new(),
        }
    }

    /// Options are locked because some option regions hold unknown bytes.
    pub fn resolutions_only() -> Self {
        Self {
            can_edit_resolutions: true,
            can_edit_options: false,
            issues: vec![CapabilityIssue::PartialModification],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionEntry {
    pub index: usize,
    pub stock_width: i32,
    pub stock_height: i32,
    pub width: i32,
    pub height: i32,
    pub fov: i32,
    pub fov_degrees: f64,
    pub hud_scale: f32,
    pub modified: bool,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionEntry {
    pub id: GroupId,
    pub description: String,
    pub state: GroupState,
    pub state_label: String,
    pub choices: Vec<String>,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub variant: VariantId,
    pub variant_name: String,
    pub recognized: bool,
    pub known_group_count: usize,
    pub total_group_count: usize,
    pub capabilities: Capabilities,
    pub resolutions: Vec<ResolutionEntry>,
    pub options: Vec<OptionEntry>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveSummary {
    pub resolutions_written: usize,
    pub options_written: usize,
}

impl SaveSummary {
    pub fn total(&self) -> usize {
        self.resolutions_written + self.options_written
    }
}
