//! Gesture labels produced by the recognizer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A gesture class the recognizer can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GestureLabel {
    #[serde(rename = "Thumb_Up")]
    ThumbUp,
    #[serde(rename = "Thumb_Down")]
    ThumbDown,
    #[serde(rename = "Open_Palm")]
    OpenPalm,
    #[serde(rename = "Closed_Fist")]
    ClosedFist,
    Victory,
    ILoveYou,
    #[serde(rename = "Pointing_Up")]
    PointingUp,
}

/// Error returned for a label outside the known set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown gesture label: {0}")]
pub struct ParseLabelError(pub String);

impl GestureLabel {
    pub const ALL: [GestureLabel; 7] = [
        GestureLabel::ThumbUp,
        GestureLabel::ThumbDown,
        GestureLabel::OpenPalm,
        GestureLabel::ClosedFist,
        GestureLabel::Victory,
        GestureLabel::ILoveYou,
        GestureLabel::PointingUp,
    ];

    /// The recognizer's name for this gesture
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::ThumbUp => "Thumb_Up",
            GestureLabel::ThumbDown => "Thumb_Down",
            GestureLabel::OpenPalm => "Open_Palm",
            GestureLabel::ClosedFist => "Closed_Fist",
            GestureLabel::Victory => "Victory",
            GestureLabel::ILoveYou => "ILoveYou",
            GestureLabel::PointingUp => "Pointing_Up",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GestureLabel::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| ParseLabelError(s.to_string()))
    }
}

/// One recognition event, as seen by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognition {
    Gesture(GestureLabel),
    /// The frame contained no recognizable gesture; never mapped to a command
    NoGesture,
}

/// Label the recognizer uses for "nothing recognized"
pub const NO_GESTURE_LABEL: &str = "None";

impl Recognition {
    /// Parse a raw recognizer label
    pub fn parse(raw: &str) -> Result<Self, ParseLabelError> {
        let raw = raw.trim();
        if raw.is_empty() || raw == NO_GESTURE_LABEL {
            return Ok(Recognition::NoGesture);
        }
        raw.parse().map(Recognition::Gesture)
    }
}

impl fmt::Display for Recognition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recognition::Gesture(label) => fmt::Display::fmt(label, f),
            Recognition::NoGesture => f.write_str(NO_GESTURE_LABEL),
        }
    }
}
