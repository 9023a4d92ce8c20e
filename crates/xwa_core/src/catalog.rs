//! Static patch tables for the supported `XWingAlliance.exe` builds.
//!
//! Every option the patcher exposes is a [`PatchGroup`]: a byte range with one
//! shared original form and one or more patched forms. Offsets are file
//! offsets into the executable and differ between builds, so each build gets
//! its own [`VariantDescriptor`].

use std::io;

use serde::{Deserialize, Serialize};

use crate::resolution::ResolutionSlot;

/// Upper bound on how much of the executable is held in memory.
pub const MAX_IMAGE_LEN: usize = 0x40_0000;

/// Number of resolution slots in the game's resolution table.
pub const RESOLUTION_SLOTS: usize = 4;

/// Width, height, fov and hud-scale bits, each 4 bytes little-endian.
pub const RESOLUTION_RECORD_LEN: usize = 16;

/// The resolutions the game ships with, in slot order.
pub const STOCK_RESOLUTIONS: [(i32, i32); RESOLUTION_SLOTS] =
    [(640, 480), (800, 600), (1152, 864), (1600, 1200)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantId {
    Cd,
    Steam,
}

impl VariantId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cd => "cd",
            Self::Steam => "steam",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupId {
    #[serde(rename = "32bit")]
    Render32Bit,
    FixedClear,
    #[serde(rename = "force-800")]
    ForceResolution,
    #[serde(rename = "no-cd")]
    NoCdCheck,
    NoStars,
    #[serde(rename = "msg-loop")]
    MessageLoop,
    ShowFps,
}

impl GroupId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Render32Bit => "32bit",
            Self::FixedClear => "fixed-clear",
            Self::ForceResolution => "force-800",
            Self::NoCdCheck => "no-cd",
            Self::NoStars => "no-stars",
            Self::MessageLoop => "msg-loop",
            Self::ShowFps => "show-fps",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchId {
    Render32Bit,
    FixedClear,
    ForceResolution,
    NoCdCheck,
    NoCdCheckAlt,
    StarsOff,
    AddMessageLoop,
    ShowFpsDisabled,
    ShowFpsOnly,
    ShowFpsSceneStats,
    ShowFpsTexStats,
}

/// One known byte region and the form it takes once patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchDefinition {
    pub id: PatchId,
    pub label: &'static str,
    pub offset: usize,
    pub original: &'static [u8],
    pub patched: &'static [u8],
}

impl PatchDefinition {
    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn end(&self) -> usize {
        self.offset + self.len()
    }
}

/// Mutually exclusive forms of one user-facing option.
///
/// All members cover the same range and share the same original bytes, so
/// writing any one of them replaces whichever was there before.
///
/// `members` must not be empty: [`offset`](Self::offset) and
/// [`original`](Self::original) read the first member. The built-in variants
/// are checked at compile time and [`VariantDescriptor::validate`] rejects
/// empty groups in any other table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGroup {
    pub id: GroupId,
    pub description: &'static str,
    pub members: &'static [PatchDefinition],
}

impl PatchGroup {
    pub fn offset(&self) -> usize {
        self.members[0].offset
    }

    pub fn original(&self) -> &'static [u8] {
        self.members[0].original
    }

    pub fn member(&self, index: usize) -> Option<&'static PatchDefinition> {
        self.members.get(index)
    }

    /// True when no member restores the original bytes, so "off" is a
    /// choice of its own.
    pub fn is_toggle(&self) -> bool {
        self.members.iter().all(|m| m.patched != m.original)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub id: VariantId,
    pub name: &'static str,
    pub groups: &'static [PatchGroup],
    pub resolution_offsets: [usize; RESOLUTION_SLOTS],
}

impl VariantDescriptor {
    pub fn total_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, id: GroupId) -> Option<(usize, &'static PatchGroup)> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, group)| group.id == id)
    }

    pub fn patch(&self, id: PatchId) -> Option<&'static PatchDefinition> {
        self.groups
            .iter()
            .flat_map(|group| group.members.iter())
            .find(|patch| patch.id == id)
    }

    /// Smallest file length that contains every cataloged region and record.
    pub fn required_len(&self) -> usize {
        let patches = self
            .groups
            .iter()
            .flat_map(|group| group.members.iter())
            .map(PatchDefinition::end);
        let records = self
            .resolution_offsets
            .iter()
            .map(|offset| offset + RESOLUTION_RECORD_LEN);
        patches.chain(records).max().unwrap_or(0)
    }

    /// Image of an untouched executable as far as this catalog can tell.
    ///
    /// Every option region holds its original bytes and the resolution table
    /// holds the stock entries. All other bytes are zero.
    pub fn stock_image(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.required_len()];
        for group in self.groups {
            let start = group.offset();
            bytes[start..start + group.original().len()].copy_from_slice(group.original());
        }
        let slots = self.resolution_offsets.iter().zip(&STOCK_RESOLUTIONS);
        for (&offset, &(width, height)) in slots {
            let record = ResolutionSlot::with_defaults(width, height).to_record();
            bytes[offset..offset + RESOLUTION_RECORD_LEN].copy_from_slice(&record);
        }
        bytes
    }

    pub fn validate(&self) -> io::Result<()> {
        let mut ranges = Vec::new();

        for group in self.groups {
            let Some(first) = group.members.first() else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("group {} has no members", group.id.as_str()),
                ));
            };

            for member in group.members {
                if member.offset != first.offset || member.original != first.original {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "member {:?} of group {} does not share the group's region",
                            member.id,
                            group.id.as_str()
                        ),
                    ));
                }
                if member.patched.len() != member.original.len() || member.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "member {:?} has mismatched lengths: original {}, patched {}",
                            member.id,
                            member.original.len(),
                            member.patched.len()
                        ),
                    ));
                }
            }

            for (i, a) in group.members.iter().enumerate() {
                if group.members[i + 1..].iter().any(|b| b.patched == a.patched) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("group {} has duplicate member bytes", group.id.as_str()),
                    ));
                }
            }

            ranges.push((first.offset, first.end()));
        }

        for offset in self.resolution_offsets {
            ranges.push((offset, offset + RESOLUTION_RECORD_LEN));
        }

        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            if pair[0].1 > pair[1].0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "overlapping regions {:#x}..{:#x} and {:#x}..{:#x}",
                        pair[0].0, pair[0].1, pair[1].0, pair[1].1
                    ),
                ));
            }
        }

        if self.required_len() > MAX_IMAGE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "catalog reaches {:#x}, beyond the image capacity",
                    self.required_len()
                ),
            ));
        }

        Ok(())
    }
}

pub static VARIANTS: &[VariantDescriptor] = &[CD_RELEASE, STEAM_RELEASE];

const fn groups_have_members(groups: &[PatchGroup]) -> bool {
    let mut i = 0;
    while i < groups.len() {
        if groups[i].members.is_empty() {
            return false;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    groups_have_members(CD_RELEASE.groups) && groups_have_members(STEAM_RELEASE.groups),
    "every built-in patch group needs at least one member"
);

pub fn variant(id: VariantId) -> &'static VariantDescriptor {
    match id {
        VariantId::Cd => &VARIANTS[0],
        VariantId::Steam => &VARIANTS[1],
    }
}

const DESC_32BIT: &str = "32 bit rendering, breaks load screens";
const DESC_FIXED_CLEAR: &str = "Fix graphical corruption like disappearing objects";
const DESC_FORCE_RES: &str = "Use resolution marked 800x600 regardless of in-game settings";
const DESC_NO_CD: &str = "Disable CD checks, play from install path";
const DESC_NO_STARS: &str = "Disable starfield background (better performance on Linux)";
const DESC_MSG_LOOP: &str = "Fix keyboard not working in hangar (Linux/WINE fix)";
const DESC_SHOW_FPS: &str = "Show FPS";

// push 16 / push 32 as the frame buffer depth argument
const FB_DEPTH_16: &[u8] = &[0x6A, 0x10];
const FB_DEPTH_32: &[u8] = &[0x6A, 0x20];
// jz over the second clear / nop nop
const CLEAR_SKIP: &[u8] = &[0x74, 0x0D];
const CLEAR_ALWAYS: &[u8] = &[0x90, 0x90];
// movsx eax, word [esp+4] / mov eax, 1
const RES_FROM_SETTINGS: &[u8] = &[0x0F, 0xBF, 0x44, 0x24, 0x04];
const RES_SLOT_ONE: &[u8] = &[0xB8, 0x01, 0x00, 0x00, 0x00];
const CD_CHECK_TRUE: &[u8] = &[0xB8, 0x01, 0x00, 0x00, 0x00];
const CD_CHECK_TRUE_ALT: &[u8] = &[0x33, 0xC0, 0x40, 0x90, 0x90];
// jnz / jmp around the starfield draw
const STARS_DRAW: &[u8] = &[0x75, 0x1C];
const STARS_SKIP: &[u8] = &[0xEB, 0x1C];
const MSG_LOOP_NONE: &[u8] = &[0x85, 0xC0, 0x74, 0x1A, 0x90];
// push <overlay mode>
const FPS_MODE_OFF: &[u8] = &[0x6A, 0x00];
const FPS_MODE_FPS: &[u8] = &[0x6A, 0x01];
const FPS_MODE_SCENE: &[u8] = &[0x6A, 0x02];
const FPS_MODE_TEX: &[u8] = &[0x6A, 0x03];

const CD_CD_CHECK_CALL: &[u8] = &[0xE8, 0x5B, 0x2E, 0x00, 0x00];
const CD_MSG_LOOP_CALL: &[u8] = &[0xE8, 0x3B, 0xF2, 0xFF, 0xFF];
const STEAM_CD_CHECK_CALL: &[u8] = &[0xE8, 0x4B, 0x2F, 0x00, 0x00];
const STEAM_MSG_LOOP_CALL: &[u8] = &[0xE8, 0x1B, 0xF1, 0xFF, 0xFF];

const fn patch(
    id: PatchId,
    label: &'static str,
    offset: usize,
    original: &'static [u8],
    patched: &'static [u8],
) -> PatchDefinition {
    PatchDefinition {
        id,
        label,
        offset,
        original,
        patched,
    }
}

const CD_RELEASE: VariantDescriptor = VariantDescriptor {
    id: VariantId::Cd,
    name: "X-Wing Alliance 2.02 (CD release)",
    groups: &[
        PatchGroup {
            id: GroupId::Render32Bit,
            description: DESC_32BIT,
            members: &[patch(
                PatchId::Render32Bit,
                "enabled",
                0x0F_1E3A,
                FB_DEPTH_16,
                FB_DEPTH_32,
            )],
        },
        PatchGroup {
            id: GroupId::FixedClear,
            description: DESC_FIXED_CLEAR,
            members: &[patch(
                PatchId::FixedClear,
                "enabled",
                0x0E_8D14,
                CLEAR_SKIP,
                CLEAR_ALWAYS,
            )],
        },
        PatchGroup {
            id: GroupId::ForceResolution,
            description: DESC_FORCE_RES,
            members: &[patch(
                PatchId::ForceResolution,
                "enabled",
                0x0F_0562,
                RES_FROM_SETTINGS,
                RES_SLOT_ONE,
            )],
        },
        PatchGroup {
            id: GroupId::NoCdCheck,
            description: DESC_NO_CD,
            members: &[
                patch(
                    PatchId::NoCdCheck,
                    "enabled",
                    0x14_7C05,
                    CD_CD_CHECK_CALL,
                    CD_CHECK_TRUE,
                ),
                patch(
                    PatchId::NoCdCheckAlt,
                    "enabled-alt",
                    0x14_7C05,
                    CD_CD_CHECK_CALL,
                    CD_CHECK_TRUE_ALT,
                ),
            ],
        },
        PatchGroup {
            id: GroupId::NoStars,
            description: DESC_NO_STARS,
            members: &[patch(
                PatchId::StarsOff,
                "enabled",
                0x0D_43B9,
                STARS_DRAW,
                STARS_SKIP,
            )],
        },
        PatchGroup {
            id: GroupId::MessageLoop,
            description: DESC_MSG_LOOP,
            members: &[patch(
                PatchId::AddMessageLoop,
                "enabled",
                0x13_9A2E,
                MSG_LOOP_NONE,
                CD_MSG_LOOP_CALL,
            )],
        },
        PatchGroup {
            id: GroupId::ShowFps,
            description: DESC_SHOW_FPS,
            members: &[
                patch(
                    PatchId::ShowFpsDisabled,
                    "disabled",
                    0x10_2B47,
                    FPS_MODE_OFF,
                    FPS_MODE_OFF,
                ),
                patch(
                    PatchId::ShowFpsOnly,
                    "fps",
                    0x10_2B47,
                    FPS_MODE_OFF,
                    FPS_MODE_FPS,
                ),
                patch(
                    PatchId::ShowFpsSceneStats,
                    "scene-stats",
                    0x10_2B47,
                    FPS_MODE_OFF,
                    FPS_MODE_SCENE,
                ),
                patch(
                    PatchId::ShowFpsTexStats,
                    "tex-stats",
                    0x10_2B47,
                    FPS_MODE_OFF,
                    FPS_MODE_TEX,
                ),
            ],
        },
    ],
    resolution_offsets: [0x1A_4C20, 0x1A_4C30, 0x1A_4C40, 0x1A_4C50],
};

const STEAM_RELEASE: VariantDescriptor = VariantDescriptor {
    id: VariantId::Steam,
    name: "X-Wing Alliance 2.02 (Steam/GOG release)",
    groups: &[
        PatchGroup {
            id: GroupId::Render32Bit,
            description: DESC_32BIT,
            members: &[patch(
                PatchId::Render32Bit,
                "enabled",
                0x0F_3A6A,
                FB_DEPTH_16,
                FB_DEPTH_32,
            )],
        },
        PatchGroup {
            id: GroupId::FixedClear,
            description: DESC_FIXED_CLEAR,
            members: &[patch(
                PatchId::FixedClear,
                "enabled",
                0x0E_A944,
                CLEAR_SKIP,
                CLEAR_ALWAYS,
            )],
        },
        PatchGroup {
            id: GroupId::ForceResolution,
            description: DESC_FORCE_RES,
            members: &[patch(
                PatchId::ForceResolution,
                "enabled",
                0x0F_2192,
                RES_FROM_SETTINGS,
                RES_SLOT_ONE,
            )],
        },
        PatchGroup {
            id: GroupId::NoCdCheck,
            description: DESC_NO_CD,
            members: &[
                patch(
                    PatchId::NoCdCheck,
                    "enabled",
                    0x14_9835,
                    STEAM_CD_CHECK_CALL,
                    CD_CHECK_TRUE,
                ),
                patch(
                    PatchId::NoCdCheckAlt,
                    "enabled-alt",
                    0x14_9835,
                    STEAM_CD_CHECK_CALL,
                    CD_CHECK_TRUE_ALT,
                ),
            ],
        },
        PatchGroup {
            id: GroupId::NoStars,
            description: DESC_NO_STARS,
            members: &[patch(
                PatchId::StarsOff,
                "enabled",
                0x0D_5FE9,
                STARS_DRAW,
                STARS_SKIP,
            )],
        },
        PatchGroup {
            id: GroupId::MessageLoop,
            description: DESC_MSG_LOOP,
            members: &[patch(
                PatchId::AddMessageLoop,
                "enabled",
                0x13_B65E,
                MSG_LOOP_NONE,
                STEAM_MSG_LOOP_CALL,
            )],
        },
        PatchGroup {
            id: GroupId::ShowFps,
            description: DESC_SHOW_FPS,
            members: &[
                patch(
                    PatchId::ShowFpsDisabled,
                    "disabled",
                    0x10_4777,
                    FPS_MODE_OFF,
                    FPS_MODE_OFF,
                ),
                patch(
                    PatchId::ShowFpsOnly,
                    "fps",
                    0x10_4777,
                    FPS_MODE_OFF,
                    FPS_MODE_FPS,
                ),
                patch(
                    PatchId::ShowFpsSceneStats,
                    "scene-stats",
                    0x10_4777,
                    FPS_MODE_OFF,
                    FPS_MODE_SCENE,
                ),
                patch(
                    PatchId::ShowFpsTexStats,
                    "tex-stats",
                    0x10_4777,
                    FPS_MODE_OFF,
                    FPS_MODE_TEX,
                ),
            ],
        },
    ],
    resolution_offsets: [0x1A_6E40, 0x1A_6E50, 0x1A_6E60, 0x1A_6E70],
};
