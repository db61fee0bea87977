use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A pipeline stage. The order is fixed and each stage carries an explicit
/// ordinal in `0..=9` that does not depend on declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Input,
    Script,
    Description,
    Image,
    Storyboard,
    Animation,
    Audio,
    Subtitle,
    Compose,
    Output,
}

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Stage; 10] = [
        Stage::Input,
        Stage::Script,
        Stage::Description,
        Stage::Image,
        Stage::Storyboard,
        Stage::Animation,
        Stage::Audio,
        Stage::Subtitle,
        Stage::Compose,
        Stage::Output,
    ];

    /// The stage's ordinal.
    pub const fn index(self) -> u8 {
        match self {
            Stage::Input => 0,
            Stage::Script => 1,
            Stage::Description => 2,
            Stage::Image => 3,
            Stage::Storyboard => 4,
            Stage::Animation => 5,
            Stage::Audio => 6,
            Stage::Subtitle => 7,
            Stage::Compose => 8,
            Stage::Output => 9,
        }
    }

    /// Inverse of [`Stage::index`].
    pub fn from_index(index: u8) -> Result<Self, TypeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.index() == index)
            .ok_or(TypeError::StageIndexOutOfRange(index))
    }

    /// The persisted tag name.
    pub const fn tag(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Script => "script",
            Stage::Description => "description",
            Stage::Image => "image",
            Stage::Storyboard => "storyboard",
            Stage::Animation => "animation",
            Stage::Audio => "audio",
            Stage::Subtitle => "subtitle",
            Stage::Compose => "compose",
            Stage::Output => "output",
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1).ok()
    }
}

impl PartialOrd for Stage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index().cmp(&other.index())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Stage {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownStage(s.to_string()))
    }
}
