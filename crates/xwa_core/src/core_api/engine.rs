use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::catalog::{
    self, GroupId, RESOLUTION_SLOTS, STOCK_RESOLUTIONS, VariantDescriptor, VariantId,
};
use crate::image::BinaryImage;
use crate::patch::{Choice, GroupState, PatchEngine};
use crate::resolution::{self, ResolutionRequest, ResolutionSlot};

use super::error::{CoreError, CoreErrorCode, SaveFailure, SaveTarget};
use super::types::{Capabilities, OptionEntry, ResolutionEntry, SaveSummary, Snapshot};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

/// An opened executable with editable resolution and option state.
///
/// Edits stay in memory until [`Session::save`] writes them.
#[derive(Debug)]
pub struct Session<F = File> {
    image: BinaryImage<F>,
    patches: PatchEngine,
    known_group_count: usize,
    capabilities: Capabilities,
    saved_resolutions: [ResolutionSlot; RESOLUTION_SLOTS],
    resolutions: [ResolutionSlot; RESOLUTION_SLOTS],
    group_states: Vec<GroupState>,
    pending_groups: Vec<Option<Choice>>,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn open_path(
        &self,
        path: &Path,
        hint: Option<VariantId>,
    ) -> Result<Session<File>, CoreError> {
        let image = BinaryImage::open(path)?;
        self.open_image(image, hint)
    }

    pub fn open_stream<F: Read + Write + Seek>(
        &self,
        stream: F,
        hint: Option<VariantId>,
    ) -> Result<Session<F>, CoreError> {
        let image = BinaryImage::from_stream(stream)?;
        self.open_image(image, hint)
    }

    fn open_image<F>(
        &self,
        image: BinaryImage<F>,
        hint: Option<VariantId>,
    ) -> Result<Session<F>, CoreError> {
        let (variant, known_group_count) = match hint {
            Some(id) => {
                let variant = catalog::variant(id);
                (variant, PatchEngine::new(variant).count_known_groups(&image))
            }
            None => detect_variant(&image),
        };
        let total = variant.total_groups();
        debug!(
            variant = variant.id.as_str(),
            known = known_group_count,
            total,
            "selected catalog variant"
        );

        if known_group_count == 0 {
            return Err(CoreError::new(
                CoreErrorCode::UnsupportedFile,
                "not a supported XWingAlliance binary",
            ));
        }

        let capabilities = if known_group_count == total {
            Capabilities::full()
        } else {
            warn!(
                known = known_group_count,
                total, "file has unsupported modifications, options disabled"
            );
            Capabilities::resolutions_only()
        };

        let resolutions = resolution::decode(&image, variant)?;
        let patches = PatchEngine::new(variant);
        let group_states = patches.group_states(&image);

        info!(variant = variant.name, "opened executable");
        Ok(Session {
            image,
            patches,
            known_group_count,
            capabilities,
            saved_resolutions: resolutions,
            resolutions,
            group_states,
            pending_groups: vec![None; total],
        })
    }
}

/// Picks the variant whose catalog matches the most groups; ties go to the
/// earlier variant.
pub fn detect_variant<F>(image: &BinaryImage<F>) -> (&'static VariantDescriptor, usize) {
    let mut best = (&catalog::VARIANTS[0], 0);
    for variant in catalog::VARIANTS {
        let known = PatchEngine::new(variant).count_known_groups(image);
        debug!(variant = variant.id.as_str(), known, "variant score");
        if known > best.1 {
            best = (variant, known);
        }
    }
    best
}

impl<F> Session<F> {
    pub fn variant(&self) -> &'static VariantDescriptor {
        self.patches.variant()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn known_group_count(&self) -> usize {
        self.known_group_count
    }

    pub fn total_group_count(&self) -> usize {
        self.variant().total_groups()
    }

    /// True when every option region holds cataloged bytes.
    pub fn is_recognized(&self) -> bool {
        self.known_group_count == self.total_group_count()
    }

    pub fn image(&self) -> &BinaryImage<F> {
        &self.image
    }

    pub fn resolutions(&self) -> &[ResolutionSlot; RESOLUTION_SLOTS] {
        &self.resolutions
    }

    pub fn resolution(&self, index: usize) -> Option<&ResolutionSlot> {
        self.resolutions.get(index)
    }

    /// State of an option including any unsaved choice.
    pub fn group_state(&self, id: GroupId) -> Option<GroupState> {
        let (index, _) = self.variant().group(id)?;
        Some(match self.pending_groups[index] {
            Some(choice) => choice.into(),
            None => self.group_states[index],
        })
    }

    pub fn option_enabled(&self, id: GroupId) -> Option<bool> {
        match self.group_state(id)? {
            GroupState::Member(_) => Some(true),
            GroupState::Original => Some(false),
            GroupState::Unknown => None,
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending_groups.iter().any(Option::is_some)
            || self
                .resolutions
                .iter()
                .zip(&self.saved_resolutions)
                .any(|(a, b)| a.to_record() != b.to_record())
    }

    pub fn set_resolution(
        &mut self,
        index: usize,
        request: ResolutionRequest,
    ) -> Result<(), CoreError> {
        let slot = self.resolution_slot_mut(index)?;
        *slot = request.resolve();
        debug!(index, ?slot, "resolution slot edited");
        Ok(())
    }

    /// Changes a slot's size and resets its fov and HUD scale to the defaults
    /// for the new height.
    pub fn set_resolution_size(
        &mut self,
        index: usize,
        width: i32,
        height: i32,
    ) -> Result<(), CoreError> {
        let slot = self.resolution_slot_mut(index)?;
        *slot = ResolutionSlot::with_defaults(width, height);
        Ok(())
    }

    pub fn reset_resolution(&mut self, index: usize) -> Result<(), CoreError> {
        let stock = ResolutionSlot::stock(index);
        let slot = self.resolution_slot_mut(index)?;
        if let Some(stock) = stock {
            *slot = stock;
        }
        Ok(())
    }

    pub fn set_group_variant(&mut self, id: GroupId, choice: Choice) -> Result<(), CoreError> {
        if !self.capabilities.can_edit_options {
            return Err(CoreError::new(
                CoreErrorCode::PartialModification,
                "file has unsupported modifications; options cannot be changed",
            ));
        }

        let (index, group) = self.variant().group(id).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::InvalidArgument,
                format!("option {} is not available for {}", id.as_str(), self.variant().name),
            )
        })?;
        if let Choice::Member(member) = choice {
            if member >= group.members.len() {
                return Err(CoreError::new(
                    CoreErrorCode::InvalidArgument,
                    format!(
                        "option {} has no member {member} ({} members)",
                        id.as_str(),
                        group.members.len()
                    ),
                ));
            }
        }

        self.pending_groups[index] = if self.patches.is_applied(&self.image, index, choice) {
            None
        } else {
            Some(choice)
        };
        Ok(())
    }

    /// Turns a plain on/off option on (first patched form) or off (original bytes).
    pub fn set_option(&mut self, id: GroupId, enabled: bool) -> Result<(), CoreError> {
        let choice = if enabled {
            Choice::Member(0)
        } else {
            Choice::Original
        };
        self.set_group_variant(id, choice)
    }

    pub fn snapshot(&self) -> Snapshot {
        let variant = self.variant();

        let resolutions = self
            .resolutions
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let (stock_width, stock_height) = STOCK_RESOLUTIONS[index];
                ResolutionEntry {
                    index,
                    stock_width,
                    stock_height,
                    width: slot.width,
                    height: slot.height,
                    fov: slot.fov,
                    fov_degrees: slot.fov_degrees(),
                    hud_scale: slot.hud_scale,
                    modified: slot.differs_from_stock(index),
                    pending: slot.to_record() != self.saved_resolutions[index].to_record(),
                }
            })
            .collect();

        let options = variant
            .groups
            .iter()
            .enumerate()
            .map(|(index, group)| {
                let state = self.pending_groups[index]
                    .map(GroupState::from)
                    .unwrap_or(self.group_states[index]);
                let state_label = match state {
                    GroupState::Unknown => "unknown",
                    GroupState::Original => "off",
                    GroupState::Member(member) => group.members[member].label,
                };
                let mut choices = Vec::with_capacity(group.members.len() + 1);
                if group.is_toggle() {
                    choices.push("off".to_string());
                }
                choices.extend(group.members.iter().map(|m| m.label.to_string()));

                OptionEntry {
                    id: group.id,
                    description: group.description.to_string(),
                    state,
                    state_label: state_label.to_string(),
                    choices,
                    pending: self.pending_groups[index].is_some(),
                }
            })
            .collect();

        Snapshot {
            variant: variant.id,
            variant_name: variant.name.to_string(),
            recognized: self.is_recognized(),
            known_group_count: self.known_group_count,
            total_group_count: self.total_group_count(),
            capabilities: self.capabilities.clone(),
            resolutions,
            options,
        }
    }

    fn resolution_slot_mut(&mut self, index: usize) -> Result<&mut ResolutionSlot, CoreError> {
        self.resolutions.get_mut(index).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::InvalidArgument,
                format!(
                    "resolution slot {index} out of range, expected 0-{}",
                    RESOLUTION_SLOTS - 1
                ),
            )
        })
    }
}

impl<F: Read + Write + Seek> Session<F> {
    /// Writes every changed resolution slot, then every changed option.
    ///
    /// Each target is an independent write. On failure the remaining targets
    /// are skipped and stay pending; targets already written are not undone.
    pub fn save(&mut self) -> Result<SaveSummary, SaveFailure> {
        let variant = self.variant();
        let mut summary = SaveSummary::default();

        for index in 0..RESOLUTION_SLOTS {
            let slot = self.resolutions[index];
            if slot.to_record() == self.saved_resolutions[index].to_record() {
                continue;
            }
            if let Err(error) = resolution::encode(&mut self.image, variant, &slot, index) {
                warn!(index, error = %error, "failed writing resolution slot");
                return Err(SaveFailure {
                    succeeded: summary.total(),
                    failed_at: SaveTarget::Resolution(index),
                    error,
                });
            }
            self.saved_resolutions[index] = slot;
            summary.resolutions_written += 1;
        }

        for (index, group) in variant.groups.iter().enumerate() {
            let Some(choice) = self.pending_groups[index] else {
                continue;
            };
            if !self.patches.is_applied(&self.image, index, choice) {
                let written = self
                    .patches
                    .apply_group_variant(&mut self.image, index, choice);
                if let Err(error) = written {
                    return Err(SaveFailure {
                        succeeded: summary.total(),
                        failed_at: SaveTarget::Option(group.id),
                        error,
                    });
                }
                summary.options_written += 1;
            }
            self.pending_groups[index] = None;
            self.group_states[index] = self.patches.group_state(&self.image, index);
        }

        info!(
            resolutions = summary.resolutions_written,
            options = summary.options_written,
            "saved changes"
        );
        Ok(summary)
    }

    pub fn into_inner(self) -> F {
        self.image.into_inner()
    }
}
