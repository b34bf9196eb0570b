use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{SegmentationError, StructuralError, ValidationError};
use crate::models::{Segment, SpeakerToken, Turn, TurnNode, TurnShape};

/// Cut every turn into segments, then order them by start time and
/// normalise their text.
///
/// Any structural or interval error aborts the whole run; a partially
/// segmented document is never returned.
pub fn segment_turns(turns: &[Turn]) -> Result<Vec<Segment>, SegmentationError> {
    let mut segments = Vec::new();
    for turn in turns {
        segments.extend(segment_turn(turn)?);
    }

    segments.sort_by(|a, b| a.xmin().total_cmp(&b.xmin()));
    let segments: Vec<Segment> = segments
        .into_iter()
        .map(|segment| segment.map_content(normalize_content))
        .collect();

    debug!(
        "Segmented {} turns into {} segments",
        turns.len(),
        segments.len()
    );
    Ok(segments)
}

/// Segments of a single turn, in emission order and with raw text.
pub fn segment_turn(turn: &Turn) -> Result<Vec<Segment>, SegmentationError> {
    match turn.shape() {
        TurnShape::EventOnly => segment_event_only(turn),
        TurnShape::Overlapping => segment_overlapping(turn),
        TurnShape::SingleSpeaker => segment_single_speaker(turn),
    }
}

/// Collapse line breaks and runs of whitespace into single spaces.
pub fn normalize_content(content: &str) -> String {
    let mut output = String::with_capacity(content.len());
    for word in content.split_whitespace() {
        if !output.is_empty() {
            output.push(' ');
        }
        output.push_str(word);
    }
    output
}

fn bracket(desc: &str) -> String {
    format!("[{desc}]")
}

/// Every event spans the whole turn.
fn segment_event_only(turn: &Turn) -> Result<Vec<Segment>, SegmentationError> {
    let speaker = turn
        .speakers
        .first()
        .map_or(SpeakerToken::NonSpeech, |s| SpeakerToken::speaker(s.as_str()));

    turn.event_descriptions()
        .into_iter()
        .map(|desc| {
            Segment::new(turn.start, turn.end, speaker.clone(), bracket(desc))
                .map_err(SegmentationError::from)
        })
        .collect()
}

enum Piece<'a> {
    Who(usize),
    Text(&'a str),
    Event(&'a str),
}

fn flatten<'a>(nodes: &'a [TurnNode], pieces: &mut Vec<Piece<'a>>) {
    for node in nodes {
        match node {
            TurnNode::Text(text) | TurnNode::Other { text, .. } => pieces.push(Piece::Text(text)),
            TurnNode::Sync { .. } => {}
            TurnNode::Event { desc, text } => {
                pieces.push(Piece::Event(desc));
                pieces.push(Piece::Text(text));
            }
            TurnNode::Who { nb, children } => {
                pieces.push(Piece::Who(*nb));
                flatten(children, pieces);
            }
        }
    }
}

fn append(content: &mut String, text: &str) {
    content.push(' ');
    content.push_str(text);
}

/// One segment per `Who` run, all sharing the turn's interval.
fn segment_overlapping(turn: &Turn) -> Result<Vec<Segment>, SegmentationError> {
    let mut pieces = Vec::new();
    flatten(&turn.children, &mut pieces);

    let mut runs: Vec<(usize, String)> = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Who(nb) => runs.push((nb, String::new())),
            // anything before the first Who has no speaker and is dropped
            Piece::Text(text) => {
                if let Some((_, content)) = runs.last_mut() {
                    append(content, text);
                }
            }
            Piece::Event(desc) => {
                if let Some((_, content)) = runs.last_mut() {
                    append(content, &bracket(desc));
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut segments = Vec::with_capacity(runs.len());
    for (nb, content) in runs {
        let speaker = resolve_who(turn, nb)?;
        if !seen.insert(speaker) {
            warn!(
                "Duplicate speakers appearing in the turn at {}s: '{}' (nb={}) speaks in more than one Who. Proceeding with garbage data.",
                turn.start, speaker, nb
            );
        }
        segments.push(Segment::new(
            turn.start,
            turn.end,
            SpeakerToken::speaker(speaker),
            content.trim(),
        )?);
    }
    Ok(segments)
}

fn resolve_who(turn: &Turn, nb: usize) -> Result<&str, StructuralError> {
    nb.checked_sub(1)
        .and_then(|index| turn.speakers.get(index))
        .map(String::as_str)
        .ok_or(StructuralError::SpeakerIndexOutOfRange {
            nb,
            speaker_count: turn.speakers.len(),
            turn_start: turn.start,
        })
}

/// The segment currently accumulating text in a single-speaker turn.
struct OpenSegment {
    xmin: f64,
    content: String,
}

impl OpenSegment {
    fn at(xmin: f64) -> Self {
        Self {
            xmin,
            content: String::new(),
        }
    }

    fn close(self, xmax: f64, speaker: &SpeakerToken) -> Result<Option<Segment>, ValidationError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        Segment::new(self.xmin, xmax, speaker.clone(), content).map(Some)
    }
}

/// Each `Sync` closes the open segment and opens the next one.
fn segment_single_speaker(turn: &Turn) -> Result<Vec<Segment>, SegmentationError> {
    let speaker = turn
        .speakers
        .first()
        .map(|s| SpeakerToken::speaker(s.as_str()))
        .ok_or(StructuralError::MissingSpeaker {
            turn_start: turn.start,
        })?;

    let mut segments = Vec::new();
    let mut open = OpenSegment::at(turn.start);

    for node in &turn.children {
        match node {
            TurnNode::Text(text) => append(&mut open.content, text),
            TurnNode::Sync { time } => {
                let closed = std::mem::replace(&mut open, OpenSegment::at(*time));
                segments.extend(closed.close(*time, &speaker)?);
            }
            TurnNode::Event { desc, text } => {
                append(&mut open.content, &bracket(desc));
                append(&mut open.content, text);
            }
            TurnNode::Who { .. } => {
                return Err(StructuralError::UnexpectedNode {
                    tag: "Who".to_string(),
                    turn_start: turn.start,
                }
                .into());
            }
            TurnNode::Other { tag, .. } => {
                return Err(StructuralError::UnexpectedNode {
                    tag: tag.clone(),
                    turn_start: turn.start,
                }
                .into());
            }
        }
    }

    segments.extend(open.close(turn.end, &speaker)?);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(t: &str) -> TurnNode {
        TurnNode::Text(t.to_string())
    }

    fn sync(time: f64) -> TurnNode {
        TurnNode::Sync { time }
    }

    fn event(desc: &str) -> TurnNode {
        TurnNode::Event {
            desc: desc.to_string(),
            text: String::new(),
        }
    }

    fn who(nb: usize) -> TurnNode {
        TurnNode::Who {
            nb,
            children: vec![],
        }
    }

    fn turn(speakers: &[&str], start: f64, end: f64, children: Vec<TurnNode>) -> Turn {
        Turn {
            speakers: speakers.iter().map(|s| s.to_string()).collect(),
            start,
            end,
            children,
        }
    }

    #[test]
    fn test_event_only_turn_spans_whole_turn() {
        let t = turn(&["spk1"], 3.0, 4.5, vec![sync(3.0), text("\n"), event("laugh"), text("\n")]);

        let segments = segment_turn(&t).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].xmin(), 3.0);
        assert_eq!(segments[0].xmax(), 4.5);
        assert_eq!(segments[0].content(), "[laugh]");
        assert_eq!(segments[0].speaker(), &SpeakerToken::speaker("spk1"));
    }

    #[test]
    fn test_event_only_turn_without_speaker_goes_to_non_speech() {
        let t = turn(&[], 0.0, 1.0, vec![sync(0.0), event("noise"), event("i")]);

        let segments = segment_turn(&t).unwrap();

        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.speaker() == &SpeakerToken::NonSpeech));
        assert_eq!(segments[1].content(), "[i]");
    }

    #[test]
    fn test_turn_without_events_or_text_yields_nothing() {
        let t = turn(&["spk1"], 0.0, 1.0, vec![sync(0.0), text("  ")]);
        assert!(segment_turn(&t).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_turn_shares_interval_across_speakers() {
        let t = turn(
            &["spk1", "spk2"],
            10.0,
            12.0,
            vec![
                sync(10.0),
                text("dropped"),
                who(1),
                text(" ja ja "),
                who(2),
                text("pa"),
                event("laugh"),
                text("res\n"),
            ],
        );

        let segments = segment_turn(&t).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speaker(), &SpeakerToken::speaker("spk1"));
        assert_eq!(segments[1].speaker(), &SpeakerToken::speaker("spk2"));
        for segment in &segments {
            assert_eq!((segment.xmin(), segment.xmax()), (10.0, 12.0));
        }
        assert_eq!(segments[0].content(), "ja ja");
        assert_eq!(normalize_content(segments[1].content()), "pa [laugh] res");
    }

    #[test]
    fn test_overlapping_turn_reads_nested_who_content() {
        let t = turn(
            &["spk1", "spk2"],
            0.0,
            1.0,
            vec![TurnNode::Who {
                nb: 2,
                children: vec![text("mhm"), event("breath")],
            }],
        );

        let segments = segment_turn(&t).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker(), &SpeakerToken::speaker("spk2"));
        assert_eq!(normalize_content(segments[0].content()), "mhm [breath]");
    }

    #[test]
    fn test_who_out_of_range_is_structural() {
        for nb in [0, 3] {
            let t = turn(&["spk1", "spk2"], 0.0, 1.0, vec![who(nb), text("x")]);
            assert_eq!(
                segment_turn(&t),
                Err(SegmentationError::Structural(
                    StructuralError::SpeakerIndexOutOfRange {
                        nb,
                        speaker_count: 2,
                        turn_start: 0.0,
                    }
                ))
            );
        }
    }

    #[test]
    fn test_duplicate_who_is_not_fatal() {
        let t = turn(
            &["spk1", "spk2"],
            0.0,
            1.0,
            vec![who(1), text("a"), who(1), text("b")],
        );

        let segments = segment_turn(&t).unwrap();

        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.speaker() == &SpeakerToken::speaker("spk1")));
    }

    #[test]
    fn test_single_speaker_turn_splits_on_sync() {
        let t = turn(
            &["spk1"],
            0.0,
            5.0,
            vec![
                sync(0.0),
                text("dober dan"),
                sync(2.0),
                text("kako"),
                event("laugh"),
                text("si"),
                sync(4.0),
                text("\n"),
            ],
        );

        let segments = segment_turn(&t).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].xmin(), segments[0].xmax()), (0.0, 2.0));
        assert_eq!(segments[0].content(), "dober dan");
        assert_eq!((segments[1].xmin(), segments[1].xmax()), (2.0, 4.0));
        assert_eq!(normalize_content(segments[1].content()), "kako [laugh] si");
    }

    #[test]
    fn test_single_speaker_last_segment_closes_at_turn_end() {
        let t = turn(&["spk2"], 1.0, 3.0, vec![sync(1.0), text("a"), sync(2.0), text("b")]);

        let segments = segment_turn(&t).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!((segments[1].xmin(), segments[1].xmax()), (2.0, 3.0));
        assert_eq!(segments[1].content(), "b");
    }

    #[test]
    fn test_unknown_node_in_single_speaker_turn_is_structural() {
        let t = turn(
            &["spk1"],
            0.0,
            1.0,
            vec![
                sync(0.0),
                text("a"),
                TurnNode::Other {
                    tag: "Comment".to_string(),
                    text: String::new(),
                },
            ],
        );

        assert_eq!(
            segment_turn(&t),
            Err(SegmentationError::Structural(StructuralError::UnexpectedNode {
                tag: "Comment".to_string(),
                turn_start: 0.0,
            }))
        );
    }

    #[test]
    fn test_text_without_speaker_is_structural() {
        let t = turn(&[], 0.0, 1.0, vec![sync(0.0), text("a")]);
        assert!(matches!(
            segment_turn(&t),
            Err(SegmentationError::Structural(StructuralError::MissingSpeaker { .. }))
        ));
    }

    #[test]
    fn test_empty_interval_aborts_segmentation() {
        let turns = vec![
            turn(&["spk1"], 0.0, 1.0, vec![sync(0.0), text("fine")]),
            turn(&["spk1"], 1.0, 2.0, vec![sync(1.0), text("a"), sync(2.0), text("b")]),
        ];

        let result = segment_turns(&turns);

        assert!(matches!(
            result,
            Err(SegmentationError::Validation(ValidationError::EmptyInterval { xmin, xmax, .. }))
                if xmin == 2.0 && xmax == 2.0
        ));
    }

    #[test]
    fn test_segment_turns_sorts_and_normalizes() {
        let turns = vec![
            turn(&["spk2"], 5.0, 6.0, vec![sync(5.0), text("later\n  on")]),
            turn(&["spk1"], 0.0, 2.0, vec![sync(0.0), text("first\r\nline"), event("cough")]),
            turn(&["spk1", "spk2"], 2.0, 3.0, vec![who(2), text("x"), who(1), text("y")]),
        ];

        let segments = segment_turns(&turns).unwrap();

        let summary: Vec<_> = segments
            .iter()
            .map(|s| (s.xmin(), s.speaker().to_string(), s.content().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0.0, "spk1".to_string(), "first line [cough]".to_string()),
                (2.0, "spk2".to_string(), "x".to_string()),
                (2.0, "spk1".to_string(), "y".to_string()),
                (5.0, "spk2".to_string(), "later on".to_string()),
            ]
        );
    }

    #[test]
    fn test_normalize_content() {
        assert_eq!(normalize_content("  hello \n\t world  "), "hello world");
        assert_eq!(normalize_content("   "), "");
    }
}
