//! Turn/hierarchy documents: speaker turns holding text interleaved with
//! `Sync`, `Event` and `Who` markers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::{parsed_attr, required_attr};
use crate::error::{DocumentError, SegmentationError};
use crate::models::{Segment, Turn, TurnNode};
use crate::stages::{
    GroupedSegments, SpeakerDirectory, group_segments, segment_turns, speakers_from_turns,
};
use crate::xml::{XmlElement, XmlNode, parse_bytes, parse_document};

#[derive(Debug, Clone)]
pub struct TrsDocument {
    path: Option<PathBuf>,
    directory: SpeakerDirectory,
    turns: Vec<Turn>,
}

impl TrsDocument {
    /// Parse an already decoded document
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        Self::from_root(&parse_document(content)?)
    }

    /// Parse raw bytes in whatever encoding the document declares
    pub fn from_bytes(content: &[u8]) -> Result<Self, DocumentError> {
        Self::from_root(&parse_bytes(content)?)
    }

    fn from_root(root: &XmlElement) -> Result<Self, DocumentError> {
        let directory = root
            .find_all("Speaker")
            .into_iter()
            .map(|speaker| {
                Ok::<_, DocumentError>((
                    required_attr(speaker, "id")?,
                    required_attr(speaker, "name")?,
                ))
            })
            .collect::<Result<SpeakerDirectory, _>>()?;

        let turns = root
            .find_all("Turn")
            .into_iter()
            .map(turn_from_element)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Loaded {} turns and {} directory entries",
            turns.len(),
            directory.len()
        );
        Ok(Self {
            path: None,
            directory,
            turns,
        })
    }

    /// Load a turn document from disk, keeping its path
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let mut document = Self::from_bytes(&content)
            .with_context(|| format!("Failed to parse TRS document: {:?}", path))?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    /// Where the document was loaded from, if it came from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Speaker id to display name mapping from the `Speakers` section
    pub fn directory(&self) -> &SpeakerDirectory {
        &self.directory
    }

    /// Turns in document order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Internal speaker tokens in order of first appearance
    pub fn raw_speakers(&self) -> Vec<String> {
        speakers_from_turns(&self.turns)
    }

    /// Display names, in the same order as [`raw_speakers`](Self::raw_speakers)
    pub fn speakers(&self) -> Vec<String> {
        self.raw_speakers()
            .iter()
            .map(|token| self.directory.resolve(token).to_string())
            .collect()
    }

    /// Validated segments of all turns, ordered by start time
    pub fn segments(&self) -> Result<Vec<Segment>, SegmentationError> {
        segment_turns(&self.turns)
    }

    /// Segments grouped per display name, non-speech events kept apart
    pub fn contents(&self) -> Result<GroupedSegments, SegmentationError> {
        Ok(group_segments(
            self.segments()?,
            &self.raw_speakers(),
            &self.directory,
        ))
    }
}

fn turn_from_element(turn: &XmlElement) -> Result<Turn, DocumentError> {
    Ok(Turn {
        speakers: turn
            .attr("speaker")
            .map(|tokens| tokens.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        start: parsed_attr(turn, "startTime")?,
        end: parsed_attr(turn, "endTime")?,
        children: turn_nodes(&turn.children)?,
    })
}

fn turn_nodes(children: &[XmlNode]) -> Result<Vec<TurnNode>, DocumentError> {
    children
        .iter()
        .map(|child| {
            Ok(match child {
                XmlNode::Text(text) => TurnNode::Text(text.clone()),
                XmlNode::Element(e) => match e.name.as_str() {
                    "Sync" => TurnNode::Sync {
                        time: parsed_attr(e, "time")?,
                    },
                    "Event" => TurnNode::Event {
                        desc: required_attr(e, "desc")?.to_string(),
                        text: e.text_content(),
                    },
                    "Who" => TurnNode::Who {
                        nb: parsed_attr(e, "nb")?,
                        children: turn_nodes(&e.children)?,
                    },
                    _ => TurnNode::Other {
                        tag: e.name.clone(),
                        text: e.text_content(),
                    },
                },
            })
        })
        .collect()
}
