use tracing::debug;

use crate::models::{Segment, SpeakerToken};
use crate::stages::SpeakerDirectory;

/// All segments of one speaker, ordered by start time.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerSegments {
    /// Display name from the speaker directory
    pub name: String,
    /// Internal tokens that resolved to this name
    pub tokens: Vec<String>,
    pub segments: Vec<Segment>,
}

/// Segments partitioned per speaker, with non-speech events kept apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSegments {
    /// In speaker enumeration order, then first appearance
    pub speakers: Vec<SpeakerSegments>,
    /// Segments on the non-speech channel
    pub incidental_events: Vec<Segment>,
}

impl GroupedSegments {
    /// Segments for a display name
    pub fn get(&self, name: &str) -> Option<&[Segment]> {
        self.speakers
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.segments.as_slice())
    }

    /// Display names in group order
    pub fn names(&self) -> Vec<&str> {
        self.speakers.iter().map(|group| group.name.as_str()).collect()
    }

    /// Segments across all speakers plus incidental events
    pub fn segment_count(&self) -> usize {
        self.speakers
            .iter()
            .map(|group| group.segments.len())
            .sum::<usize>()
            + self.incidental_events.len()
    }

    fn group_mut(&mut self, name: &str) -> &mut SpeakerSegments {
        let index = match self.speakers.iter().position(|group| group.name == name) {
            Some(index) => index,
            None => {
                self.speakers.push(SpeakerSegments {
                    name: name.to_string(),
                    tokens: Vec::new(),
                    segments: Vec::new(),
                });
                self.speakers.len() - 1
            }
        };
        &mut self.speakers[index]
    }

    fn note_token(&mut self, token: &str, directory: &SpeakerDirectory) -> &mut SpeakerSegments {
        let group = self.group_mut(directory.resolve(token));
        if !group.tokens.iter().any(|t| t == token) {
            group.tokens.push(token.to_string());
        }
        group
    }
}

/// Partition validated segments by speaker and translate tokens to names.
///
/// Every speaker in `speaker_order` gets a group, even an empty one.
/// Tokens that resolve to the same display name share a group.
pub fn group_segments(
    segments: Vec<Segment>,
    speaker_order: &[String],
    directory: &SpeakerDirectory,
) -> GroupedSegments {
    let mut grouped = GroupedSegments::default();
    for token in speaker_order {
        grouped.note_token(token, directory);
    }

    for segment in segments {
        match segment.speaker().clone() {
            SpeakerToken::Speaker(token) => {
                grouped.note_token(&token, directory).segments.push(segment);
            }
            SpeakerToken::NonSpeech => grouped.incidental_events.push(segment),
        }
    }

    for group in &mut grouped.speakers {
        group.segments.sort_by(|a, b| a.xmin().total_cmp(&b.xmin()));
    }
    grouped
        .incidental_events
        .sort_by(|a, b| a.xmin().total_cmp(&b.xmin()));

    debug!(
        "Grouped segments into {} speakers and {} incidental events",
        grouped.speakers.len(),
        grouped.incidental_events.len()
    );
    grouped
}
