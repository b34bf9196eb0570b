use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;

/// Who a segment is attributed to.
///
/// Incidental events (laughter, noise) that no listed speaker produced go
/// to the non-speech channel instead of an ordinary speaker token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpeakerToken {
    Speaker(String),
    NonSpeech,
}

impl SpeakerToken {
    /// Token for an ordinary speaker
    pub fn speaker(token: impl Into<String>) -> Self {
        Self::Speaker(token.into())
    }

    /// The speaker token, or `None` for the non-speech channel
    pub fn as_speaker(&self) -> Option<&str> {
        match self {
            Self::Speaker(token) => Some(token),
            Self::NonSpeech => None,
        }
    }
}

impl fmt::Display for SpeakerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Speaker(token) => f.write_str(token),
            Self::NonSpeech => f.write_str("[nn]"),
        }
    }
}

impl Serialize for SpeakerToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Speaker(token) => serializer.serialize_some(token),
            Self::NonSpeech => serializer.serialize_none(),
        }
    }
}

/// A time-bounded, speaker-attributed span of transcript text.
///
/// `xmax > xmin` always holds; the only way to build one is [`Segment::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    xmin: f64,
    xmax: f64,
    speaker: SpeakerToken,
    content: String,
}

impl Segment {
    /// Build a segment, rejecting intervals where `xmax <= xmin`
    pub fn new(
        xmin: f64,
        xmax: f64,
        speaker: SpeakerToken,
        content: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        // written so that NaN bounds fail as well
        if !(xmax > xmin) {
            return Err(ValidationError::EmptyInterval {
                xmin,
                xmax,
                speaker: speaker.to_string(),
            });
        }
        Ok(Self {
            xmin,
            xmax,
            speaker,
            content: content.into(),
        })
    }

    /// Start in seconds
    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    /// End in seconds
    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    /// Who the segment is attributed to
    pub fn speaker(&self) -> &SpeakerToken {
        &self.speaker
    }

    /// Transcript text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub(crate) fn map_content(mut self, f: impl FnOnce(&str) -> String) -> Self {
        self.content = f(&self.content);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_requires_positive_duration() {
        let segment = Segment::new(1.0, 2.5, SpeakerToken::speaker("spk1"), "dober dan").unwrap();
        assert_eq!(segment.duration(), 1.5);
        assert_eq!(segment.speaker().as_speaker(), Some("spk1"));

        let zero = Segment::new(2.0, 2.0, SpeakerToken::speaker("spk1"), "x");
        assert_eq!(
            zero,
            Err(ValidationError::EmptyInterval {
                xmin: 2.0,
                xmax: 2.0,
                speaker: "spk1".to_string(),
            })
        );

        assert!(Segment::new(3.0, 2.0, SpeakerToken::NonSpeech, "[noise]").is_err());
        assert!(Segment::new(f64::NAN, 2.0, SpeakerToken::NonSpeech, "[noise]").is_err());
    }
}
