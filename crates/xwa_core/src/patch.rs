//! Detection and application of cataloged patches.
//!
//! All comparisons are raw byte comparisons against the loaded image. Nothing
//! here assumes a region was in a cataloged state before it is inspected.

use std::io::{Read, Seek, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{PatchDefinition, PatchGroup, PatchId, VariantDescriptor};
use crate::core_api::{CoreError, CoreErrorCode};
use crate::image::BinaryImage;

/// Which cataloged form of a region to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Original,
    Patched,
}

/// Detected state of one patch group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupState {
    /// Bytes match no cataloged form.
    Unknown,
    /// Bytes match the group's original form and no member.
    Original,
    /// Bytes match the patched form of this member.
    Member(usize),
}

impl GroupState {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A target state for [`PatchEngine::apply_group_variant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Choice {
    Original,
    Member(usize),
}

impl From<Choice> for GroupState {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Original => Self::Original,
            Choice::Member(index) => Self::Member(index),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PatchEngine {
    variant: &'static VariantDescriptor,
}

impl PatchEngine {
    pub fn new(variant: &'static VariantDescriptor) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> &'static VariantDescriptor {
        self.variant
    }

    /// Number of groups whose bytes match some cataloged form.
    pub fn count_known_groups<F>(&self, image: &BinaryImage<F>) -> usize {
        self.variant
            .groups
            .iter()
            .filter(|group| group_state(image, group).is_known())
            .count()
    }

    pub fn check_patch<F>(&self, image: &BinaryImage<F>, id: PatchId, form: Form) -> bool {
        match self.variant.patch(id) {
            Some(patch) => matches_form(image, patch, form),
            None => false,
        }
    }

    pub fn group_state<F>(&self, image: &BinaryImage<F>, group_index: usize) -> GroupState {
        match self.variant.groups.get(group_index) {
            Some(group) => group_state(image, group),
            None => GroupState::Unknown,
        }
    }

    pub fn group_states<F>(&self, image: &BinaryImage<F>) -> Vec<GroupState> {
        self.variant
            .groups
            .iter()
            .map(|group| group_state(image, group))
            .collect()
    }

    /// True when the group's region already holds the bytes `choice` would write.
    pub fn is_applied<F>(
        &self,
        image: &BinaryImage<F>,
        group_index: usize,
        choice: Choice,
    ) -> bool {
        let Some(group) = self.variant.groups.get(group_index) else {
            return false;
        };
        let expected = match choice {
            Choice::Original => Some(group.original()),
            Choice::Member(index) => group.member(index).map(|member| member.patched),
        };
        expected.is_some_and(|bytes| image.read_at(group.offset(), bytes.len()) == Some(bytes))
    }

    /// Writes the bytes for `choice` over the group's region.
    ///
    /// Members share one region, so this single write is the whole transition
    /// from whatever member was applied before.
    pub fn apply_group_variant<F: Read + Write + Seek>(
        &self,
        image: &mut BinaryImage<F>,
        group_index: usize,
        choice: Choice,
    ) -> Result<(), CoreError> {
        let group = self.variant.groups.get(group_index).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::InvalidArgument,
                format!(
                    "group index {group_index} out of range for {} ({} groups)",
                    self.variant.name,
                    self.variant.total_groups()
                ),
            )
        })?;

        let bytes = match choice {
            Choice::Original => group.original(),
            Choice::Member(index) => {
                let member = group.member(index).ok_or_else(|| {
                    CoreError::new(
                        CoreErrorCode::InvalidArgument,
                        format!(
                            "option {} has no member {index} ({} members)",
                            group.id.as_str(),
                            group.members.len()
                        ),
                    )
                })?;
                member.patched
            }
        };

        debug!(
            group = group.id.as_str(),
            ?choice,
            offset = group.offset(),
            "applying patch group"
        );
        image.write_at(group.offset(), bytes).map_err(|e| {
            warn!(group = group.id.as_str(), error = %e, "patch write failed");
            e
        })
    }
}

fn matches_form<F>(image: &BinaryImage<F>, patch: &PatchDefinition, form: Form) -> bool {
    let expected = match form {
        Form::Original => patch.original,
        Form::Patched => patch.patched,
    };
    image.read_at(patch.offset, patch.len()) == Some(expected)
}

fn group_state<F>(image: &BinaryImage<F>, group: &PatchGroup) -> GroupState {
    if let Some(index) = group
        .members
        .iter()
        .position(|member| matches_form(image, member, Form::Patched))
    {
        return GroupState::Member(index);
    }
    if group
        .members
        .first()
        .is_some_and(|member| matches_form(image, member, Form::Original))
    {
        return GroupState::Original;
    }
    GroupState::Unknown
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::catalog::{GroupId, VariantId, variant};

    fn stock_image(variant: &VariantDescriptor) -> BinaryImage<Cursor<Vec<u8>>> {
        BinaryImage::from_stream(Cursor::new(variant.stock_image())).expect("load stock image")
    }

    #[test]
    fn stock_image_has_every_group_known() {
        for variant in crate::catalog::VARIANTS {
            let engine = PatchEngine::new(variant);
            let image = stock_image(variant);
            assert_eq!(engine.count_known_groups(&image), variant.total_groups());
        }
    }

    #[test]
    fn stock_image_reports_off_states() {
        let variant = variant(VariantId::Cd);
        let engine = PatchEngine::new(variant);
        let image = stock_image(variant);

        for (index, group) in variant.groups.iter().enumerate() {
            let expected = if group.id == GroupId::ShowFps {
                GroupState::Member(0)
            } else {
                GroupState::Original
            };
            assert_eq!(engine.group_state(&image, index), expected, "{:?}", group.id);
        }
    }

    #[test]
    fn applying_a_member_makes_it_the_only_applied_member() {
        let variant = variant(VariantId::Cd);
        let engine = PatchEngine::new(variant);
        let mut image = stock_image(variant);

        for (group_index, group) in variant.groups.iter().enumerate() {
            for (member_index, member) in group.members.iter().enumerate() {
                engine
                    .apply_group_variant(&mut image, group_index, Choice::Member(member_index))
                    .expect("apply member");

                assert!(engine.check_patch(&image, member.id, Form::Patched));
                for other in group.members.iter().filter(|m| m.id != member.id) {
                    assert!(!engine.check_patch(&image, other.id, Form::Patched));
                }
                assert_eq!(
                    engine.group_state(&image, group_index),
                    GroupState::Member(member_index)
                );
            }
        }
        assert_eq!(engine.count_known_groups(&image), variant.total_groups());
    }

    #[test]
    fn reverting_to_original_restores_stock_bytes() {
        let variant = variant(VariantId::Steam);
        let engine = PatchEngine::new(variant);
        let stock = stock_image(variant);
        let mut image = stock_image(variant);
        let (index, _) = variant.group(GroupId::NoCdCheck).expect("no-cd group");

        engine
            .apply_group_variant(&mut image, index, Choice::Member(1))
            .expect("apply alternate");
        assert_ne!(image.bytes(), stock.bytes());
        engine
            .apply_group_variant(&mut image, index, Choice::Original)
            .expect("revert");
        assert_eq!(image.bytes(), stock.bytes());
    }

    #[test]
    fn toggling_one_group_leaves_other_regions_untouched() {
        let variant = variant(VariantId::Cd);
        let engine = PatchEngine::new(variant);
        let mut image = stock_image(variant);
        let before = engine.group_states(&image);
        let (index, _) = variant.group(GroupId::NoStars).expect("no-stars group");

        engine
            .apply_group_variant(&mut image, index, Choice::Member(0))
            .expect("apply");
        let after = engine.group_states(&image);

        for (i, (b, a)) in before.iter().zip(&after).enumerate() {
            if i == index {
                assert_eq!(*a, GroupState::Member(0));
            } else {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn tampered_group_is_unknown_and_lowers_the_count() {
        let variant = variant(VariantId::Cd);
        let engine = PatchEngine::new(variant);
        let mut image = stock_image(variant);
        let (index, group) = variant.group(GroupId::MessageLoop).expect("msg-loop group");

        image
            .write_at(group.offset(), &[0xCC; 5])
            .expect("tamper region");

        assert_eq!(engine.group_state(&image, index), GroupState::Unknown);
        assert_eq!(engine.count_known_groups(&image), variant.total_groups() - 1);
        assert!(!engine.check_patch(&image, group.members[0].id, Form::Patched));
        assert!(!engine.check_patch(&image, group.members[0].id, Form::Original));
    }

    #[test]
    fn foreign_bytes_have_no_known_groups() {
        let variant = variant(VariantId::Cd);
        let engine = PatchEngine::new(variant);
        let image = BinaryImage::from_stream(Cursor::new(vec![0xAB; variant.required_len()]))
            .expect("load");
        assert_eq!(engine.count_known_groups(&image), 0);
    }

    #[test]
    fn short_image_reports_regions_past_the_end_as_unknown() {
        let variant = variant(VariantId::Cd);
        let engine = PatchEngine::new(variant);
        let image = BinaryImage::from_stream(Cursor::new(vec![0u8; 64])).expect("load");
        assert_eq!(engine.count_known_groups(&image), 0);
        assert!(!engine.check_patch(&image, PatchId::StarsOff, Form::Original));
    }

    #[test]
    fn out_of_range_member_is_rejected_without_writing() {
        let variant = variant(VariantId::Cd);
        let engine = PatchEngine::new(variant);
        let mut image = stock_image(variant);
        let before = image.bytes().to_vec();
        let (index, _) = variant.group(GroupId::Render32Bit).expect("32bit group");

        let err = engine
            .apply_group_variant(&mut image, index, Choice::Member(1))
            .expect_err("toggle has one member");
        assert_eq!(err.code, CoreErrorCode::InvalidArgument);
        assert_eq!(image.bytes(), &before[..]);
    }
}
