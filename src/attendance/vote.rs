use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::UnknownVariant;

pub const THUMBS_UP: &str = "👍";
pub const THINKING: &str = "🤔";
pub const THUMBS_DOWN: &str = "👎";

/// The three reactions seeded on every announcement. A player shows at most
/// one of them at a time.
pub const TRACKED_GLYPHS: [&str; 3] = [THUMBS_UP, THINKING, THUMBS_DOWN];

/// A player's answer for one playdate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attendance {
    #[default]
    No,
    Maybe,
    Yes,
}

impl Attendance {
    /// Map a reaction glyph to a vote. Anything unrecognised counts as `No`.
    pub fn from_glyph(glyph: &str) -> Self {
        match glyph {
            THUMBS_UP => Attendance::Yes,
            THINKING => Attendance::Maybe,
            _ => Attendance::No,
        }
    }

    /// Map a web form action (`yes`, `maybe`, `no`) or a glyph to a vote
    pub fn from_action(action: &str) -> Self {
        match action.trim().to_ascii_lowercase().as_str() {
            "yes" => Attendance::Yes,
            "maybe" => Attendance::Maybe,
            "no" => Attendance::No,
            other => Attendance::from_glyph(other),
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Attendance::Yes => THUMBS_UP,
            Attendance::Maybe => THINKING,
            Attendance::No => THUMBS_DOWN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Attendance::No => "no",
            Attendance::Maybe => "maybe",
            Attendance::Yes => "yes",
        }
    }

    /// Whether this player should be pinged when the playdate starts
    pub fn is_attending(&self) -> bool {
        *self != Attendance::No
    }
}

impl fmt::Display for Attendance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Attendance {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "no" => Ok(Attendance::No),
            "maybe" => Ok(Attendance::Maybe),
            "yes" => Ok(Attendance::Yes),
            _ => Err(UnknownVariant {
                kind: "attendance",
                value,
            }),
        }
    }
}
