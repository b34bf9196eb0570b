use std::io;

use quick_xml::encoding::EncodingError;
use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// The turn document does not have the shape segmentation expects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    /// A node kind that is not allowed in a single-speaker turn
    #[error("unexpected <{tag}> inside the single-speaker turn starting at {turn_start}s")]
    UnexpectedNode { tag: String, turn_start: f64 },

    /// A `Who@nb` that does not select an entry of the turn's speaker list
    #[error(
        "Who nb={nb} is out of range for the turn starting at {turn_start}s ({speaker_count} speaker(s))"
    )]
    SpeakerIndexOutOfRange {
        nb: usize,
        speaker_count: usize,
        turn_start: f64,
    },

    /// A turn carrying text but no speaker to attribute it to
    #[error("turn starting at {turn_start}s has text but no speaker")]
    MissingSpeaker { turn_start: f64 },
}

/// A segment that violates the interval invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("segment of {speaker} has xmax {xmax} <= xmin {xmin}")]
    EmptyInterval {
        xmin: f64,
        xmax: f64,
        speaker: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised while loading, inspecting or writing a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] AttrError),

    #[error("XML encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("document is empty or has no root element")]
    NoRoot,

    #[error("unbalanced closing tag </{0}>")]
    UnbalancedTag(String),

    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("<{element}@{attribute}> has non-numeric value '{value}'")]
    InvalidNumber {
        element: String,
        attribute: &'static str,
        value: String,
    },

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
}

impl From<StructuralError> for DocumentError {
    fn from(err: StructuralError) -> Self {
        Self::Segmentation(err.into())
    }
}
