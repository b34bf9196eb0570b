use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::io::NON_SPEECH_TIER;
use crate::models::Segment;
use crate::stages::GroupedSegments;

/// Settings for exporting grouped segments.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Line width of the human-readable rendering
    pub wrap_width: usize,
    /// Whether non-speech events appear in the human-readable rendering
    pub include_incidental_events: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            wrap_width: 80,
            include_incidental_events: true,
        }
    }
}

/// Machine-readable export of a segmented transcript
#[derive(Debug, Clone, Serialize)]
pub struct SegmentExport {
    pub metadata: ExportMetadata,
    /// Per-speaker segments, in speaker order
    pub speakers: Vec<SpeakerExport>,
    /// Segments nobody spoke
    pub incidental_events: Vec<SegmentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub source: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub total_segments: usize,
    pub speaker_count: usize,
    /// End of the last segment, in seconds
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerExport {
    pub name: String,
    pub tokens: Vec<String>,
    pub segments: Vec<SegmentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub xmin: f64,
    pub xmax: f64,
    pub content: String,
}

impl From<&Segment> for SegmentRecord {
    fn from(segment: &Segment) -> Self {
        Self {
            xmin: segment.xmin(),
            xmax: segment.xmax(),
            content: segment.content().to_string(),
        }
    }
}

fn records(segments: &[Segment]) -> Vec<SegmentRecord> {
    segments.iter().map(SegmentRecord::from).collect()
}

impl SegmentExport {
    /// Build the export from grouped segments and the document they came from
    pub fn from_grouped(grouped: &GroupedSegments, source: Option<&Path>) -> Self {
        let duration = grouped
            .speakers
            .iter()
            .flat_map(|group| group.segments.iter())
            .chain(grouped.incidental_events.iter())
            .map(Segment::xmax)
            .fold(0.0, f64::max);

        Self {
            metadata: ExportMetadata {
                source: source.map(|path| path.display().to_string()),
                generated_at: Utc::now(),
                total_segments: grouped.segment_count(),
                speaker_count: grouped.speakers.len(),
                duration,
            },
            speakers: grouped
                .speakers
                .iter()
                .map(|group| SpeakerExport {
                    name: group.name.clone(),
                    tokens: group.tokens.clone(),
                    segments: records(&group.segments),
                })
                .collect(),
            incidental_events: records(&grouped.incidental_events),
        }
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Chronological, human-readable rendering of grouped segments
pub struct HumanTranscript<'a> {
    grouped: &'a GroupedSegments,
    config: ExportConfig,
}

impl<'a> HumanTranscript<'a> {
    /// Render with the default export settings
    pub fn new(grouped: &'a GroupedSegments) -> Self {
        Self::with_config(grouped, ExportConfig::default())
    }

    /// Render with custom wrapping and event settings
    pub fn with_config(grouped: &'a GroupedSegments, config: ExportConfig) -> Self {
        Self { grouped, config }
    }

    fn entries(&self) -> Vec<(&'a str, &'a Segment)> {
        let mut entries: Vec<(&str, &Segment)> = self
            .grouped
            .speakers
            .iter()
            .flat_map(|group| group.segments.iter().map(move |s| (group.name.as_str(), s)))
            .collect();
        if self.config.include_incidental_events {
            entries.extend(
                self.grouped
                    .incidental_events
                    .iter()
                    .map(|s| (NON_SPEECH_TIER, s)),
            );
        }
        entries.sort_by(|a, b| a.1.xmin().total_cmp(&b.1.xmin()));
        entries
    }

    /// Format the segments as human-readable text
    pub fn format(&self) -> String {
        let mut output = String::new();

        for (name, segment) in self.entries() {
            output.push_str(&format!(
                "[{}] {}:\n",
                format_timestamp(segment.xmin()),
                name
            ));
            output.push_str(&wrap_text(segment.content(), self.config.wrap_width));
            output.push_str("\n\n");
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

/// Format seconds as MM:SS.mmm
fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let secs = ms / 1000;
    format!("{:02}:{:02}.{:03}", secs / 60, secs % 60, ms % 1000)
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if line_len + word_len + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word_len;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpeakerToken;
    use crate::stages::{SpeakerDirectory, group_segments};

    fn grouped() -> GroupedSegments {
        let directory: SpeakerDirectory = [("spk1", "ROG-dialog-0007"), ("spk2", "ROG-dialog-0008")]
            .into_iter()
            .collect();
        let segments = vec![
            Segment::new(0.0, 1.8, SpeakerToken::speaker("spk1"), "Dober dan.").unwrap(),
            Segment::new(1.8, 4.2, SpeakerToken::speaker("spk2"), "Ja, [laugh] seveda.").unwrap(),
            Segment::new(4.2, 5.0, SpeakerToken::NonSpeech, "[noise]").unwrap(),
            Segment::new(65.25, 66.0, SpeakerToken::speaker("spk1"), "Mhm.").unwrap(),
        ];
        let order = vec!["spk1".to_string(), "spk2".to_string()];
        group_segments(segments, &order, &directory)
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00.000");
        assert_eq!(format_timestamp(1.5), "00:01.500");
        assert_eq!(format_timestamp(65.0), "01:05.000");
        assert_eq!(format_timestamp(3661.5), "61:01.500");
    }

    #[test]
    fn test_wrap_text() {
        let text = "This is a test of the text wrapping function that should wrap at 20 chars";
        let wrapped = wrap_text(text, 20);
        for line in wrapped.lines() {
            assert!(line.chars().count() <= 20);
        }
        assert_eq!(wrapped.split_whitespace().count(), text.split_whitespace().count());
    }

    #[test]
    fn test_human_transcript_is_chronological() {
        let grouped = grouped();

        let text = HumanTranscript::new(&grouped).format();

        assert_eq!(
            text,
            "[00:00.000] ROG-dialog-0007:\nDober dan.\n\n\
             [00:01.800] ROG-dialog-0008:\nJa, [laugh] seveda.\n\n\
             [00:04.200] [nn]:\n[noise]\n\n\
             [01:05.250] ROG-dialog-0007:\nMhm.\n\n"
        );
    }

    #[test]
    fn test_human_transcript_can_skip_incidental_events() {
        let grouped = grouped();
        let config = ExportConfig {
            include_incidental_events: false,
            ..Default::default()
        };

        let text = HumanTranscript::with_config(&grouped, config).format();

        assert!(!text.contains("[noise]"));
        assert_eq!(text.matches("ROG-dialog-0007:").count(), 2);
    }

    #[test]
    fn test_segment_export_json() {
        let grouped = grouped();

        let export = SegmentExport::from_grouped(&grouped, Some(Path::new("demo.trs")));
        assert_eq!(export.metadata.total_segments, 4);
        assert_eq!(export.metadata.speaker_count, 2);
        assert_eq!(export.metadata.duration, 66.0);
        assert_eq!(export.speakers[0].segments.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.json");
        export.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["source"], "demo.trs");
        assert_eq!(value["speakers"][1]["name"], "ROG-dialog-0008");
        assert_eq!(value["speakers"][1]["tokens"][0], "spk2");
        assert_eq!(value["speakers"][1]["segments"][0]["content"], "Ja, [laugh] seveda.");
        assert_eq!(value["incidental_events"][0]["xmin"], 4.2);
    }
}
