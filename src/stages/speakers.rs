use std::collections::{HashMap, HashSet};

use crate::models::{Tier, Turn};

/// Maps internal speaker tokens to display names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeakerDirectory {
    names: HashMap<String, String>,
}

impl SpeakerDirectory {
    /// Display name for `token`; unknown tokens resolve to themselves.
    pub fn resolve<'a>(&'a self, token: &'a str) -> &'a str {
        self.names.get(token).map_or(token, String::as_str)
    }

    /// Number of directory entries
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the document listed no speakers
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SpeakerDirectory {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Keep the first occurrence of every item, in order.
pub fn dedup_preserving_order<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        let item = item.into();
        if seen.insert(item.clone()) {
            unique.push(item);
        }
    }
    unique
}

/// Speaker tokens of all turns, in order of first appearance.
pub fn speakers_from_turns(turns: &[Turn]) -> Vec<String> {
    dedup_preserving_order(
        turns
            .iter()
            .flat_map(|turn| turn.speakers.iter().map(String::as_str)),
    )
}

/// Speaker attributes of all tiers except the non-speech one, in order of
/// first appearance. Tiers without a speaker are skipped.
pub fn speakers_from_tiers(tiers: &[Tier], non_speech_display_name: &str) -> Vec<String> {
    dedup_preserving_order(
        tiers
            .iter()
            .filter(|tier| tier.display_name.as_deref() != Some(non_speech_display_name))
            .filter_map(|tier| tier.speaker.as_deref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(speakers: &[&str]) -> Turn {
        Turn {
            speakers: speakers.iter().map(|s| s.to_string()).collect(),
            start: 0.0,
            end: 1.0,
            children: vec![],
        }
    }

    fn tier(speaker: Option<&str>, display_name: &str) -> Tier {
        Tier {
            id: None,
            speaker: speaker.map(str::to_string),
            display_name: Some(display_name.to_string()),
            annotations: vec![],
        }
    }

    #[test]
    fn test_speakers_from_turns_keep_first_appearance() {
        let turns = vec![
            turn(&["spk2"]),
            turn(&[]),
            turn(&["spk1", "spk2"]),
            turn(&["spk3", "spk1"]),
            turn(&["spk2"]),
        ];
        assert_eq!(speakers_from_turns(&turns), vec!["spk2", "spk1", "spk3"]);
    }

    #[test]
    fn test_speakers_from_tiers_skip_non_speech() {
        let tiers = vec![
            tier(Some("SPK0"), "SPK0 [colloq]"),
            tier(Some("SPK0"), "SPK0 [norm]"),
            tier(Some("SPK1"), "SPK1 [colloq]"),
            tier(Some("SPK9"), "[nn]"),
            tier(None, "comments"),
        ];
        assert_eq!(speakers_from_tiers(&tiers, "[nn]"), vec!["SPK0", "SPK1"]);
    }

    #[test]
    fn test_directory_falls_back_to_token() {
        let directory: SpeakerDirectory = [("spk1", "ROG-dialog-0007")].into_iter().collect();
        assert_eq!(directory.resolve("spk1"), "ROG-dialog-0007");
        assert_eq!(directory.resolve("spk2"), "spk2");
        assert_eq!(directory.len(), 1);
        assert!(!directory.is_empty());
        assert!(SpeakerDirectory::default().is_empty());
    }
}
