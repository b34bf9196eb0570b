//! Tier/timeline documents: tiers of events pointing at shared `tli`
//! points on one common timeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, trace};

use super::{parsed_attr, required_attr};
use crate::error::DocumentError;
use crate::models::{AnnotationReference, Tier, TimePoint};
use crate::stages::{
    find_rounded, format_time, next_point_id, plan_consolidation, round_to_millis,
    speakers_from_tiers,
};
use crate::xml::{XmlElement, XmlNode, parse_bytes, parse_document, write_document};

/// Display name of the tier that carries non-speech events
pub const NON_SPEECH_TIER: &str = "[nn]";

/// Event attributes that reference timeline points. Both spellings of the
/// stop reference are accepted.
const REFERENCE_ATTRIBUTES: [&str; 3] = ["start", "stop", "end"];

/// Editor-only metadata removed before saving
#[derive(Debug, Clone)]
pub struct PruneConfig {
    /// `ud-information@attribute-name` values that are dropped
    pub redundant_attributes: Vec<String>,
    /// `ud-information@attribute-name` values whose parent block is dropped
    pub hidden_markers: Vec<String>,
    /// Drop `tier-format` and `tierformat-table`
    pub drop_tier_formats: bool,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            redundant_attributes: ["AutoSave", "Dialect", "Accent", "Check", "Scope"]
                .into_iter()
                .map(String::from)
                .collect(),
            hidden_markers: vec!["exmaralda:hidden".to_string()],
            drop_tier_formats: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExbConfig {
    pub non_speech_display_name: String,
    pub prune: PruneConfig,
    /// Whether `save` prunes metadata
    pub prune_on_save: bool,
}

impl Default for ExbConfig {
    fn default() -> Self {
        Self {
            non_speech_display_name: NON_SPEECH_TIER.to_string(),
            prune: PruneConfig::default(),
            prune_on_save: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub points_removed: usize,
    pub references_rewritten: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub metadata_removed: usize,
    pub tier_formats_removed: usize,
    pub tiers_unhidden: usize,
}

/// A loaded tier document, exclusively owned by its caller.
#[derive(Debug, Clone)]
pub struct ExbDocument {
    path: Option<PathBuf>,
    root: XmlElement,
    config: ExbConfig,
}

impl ExbDocument {
    /// Parse an already decoded document with the default configuration
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        Self::parse_with_config(content, ExbConfig::default())
    }

    /// Parse an already decoded document. Fails without a `common-timeline`.
    pub fn parse_with_config(content: &str, config: ExbConfig) -> Result<Self, DocumentError> {
        Self::from_root(parse_document(content)?, config)
    }

    /// Parse raw bytes in whatever encoding the document declares
    pub fn from_bytes_with_config(content: &[u8], config: ExbConfig) -> Result<Self, DocumentError> {
        Self::from_root(parse_bytes(content)?, config)
    }

    fn from_root(root: XmlElement, config: ExbConfig) -> Result<Self, DocumentError> {
        if root.find("common-timeline").is_none() {
            return Err(DocumentError::MissingElement("common-timeline"));
        }
        Ok(Self {
            path: None,
            root,
            config,
        })
    }

    /// Load a tier document from disk with the default configuration
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_config(path, ExbConfig::default())
    }

    /// Load a tier document from disk, keeping its path for media lookup
    pub fn load_with_config(path: &Path, config: ExbConfig) -> Result<Self> {
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let mut document = Self::from_bytes_with_config(&content, config)
            .with_context(|| format!("Failed to parse EXB document: {:?}", path))?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    /// The document tree as it currently stands
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    fn common_timeline_mut(&mut self) -> Result<&mut XmlElement, DocumentError> {
        self.root
            .find_mut("common-timeline")
            .ok_or(DocumentError::MissingElement("common-timeline"))
    }

    /// Timeline points in document order
    pub fn timeline(&self) -> Result<Vec<TimePoint>, DocumentError> {
        let timeline = self
            .root
            .find("common-timeline")
            .ok_or(DocumentError::MissingElement("common-timeline"))?;
        timeline
            .elements()
            .filter(|e| e.name == "tli")
            .map(|tli| -> Result<TimePoint, DocumentError> {
                Ok(TimePoint::new(required_attr(tli, "id")?, parsed_attr(tli, "time")?))
            })
            .collect()
    }

    /// All tiers with their events, in document order
    pub fn tiers(&self) -> Result<Vec<Tier>, DocumentError> {
        self.root
            .find_all("tier")
            .into_iter()
            .map(tier_from_element)
            .collect()
    }

    /// Display names of all tiers, falling back to tier ids
    pub fn tier_names(&self) -> Vec<String> {
        self.root
            .find_all("tier")
            .into_iter()
            .map(|tier| {
                tier.attr("display-name")
                    .or(tier.attr("id"))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    /// Tier speakers in order of appearance, skipping the non-speech tier
    pub fn speakers(&self) -> Result<Vec<String>, DocumentError> {
        Ok(speakers_from_tiers(
            &self.tiers()?,
            &self.config.non_speech_display_name,
        ))
    }

    /// The referenced recording, resolved against the document's directory
    pub fn referenced_media(&self) -> Option<PathBuf> {
        let url = self.root.find("referenced-file")?.attr("url")?;
        let raw = PathBuf::from(url);
        match self.path.as_deref().and_then(Path::parent) {
            Some(dir) if raw.is_relative() => Some(dir.join(raw)),
            _ => Some(raw),
        }
    }

    /// Sort the timeline and remove exact duplicate points, pointing every
    /// event that referenced a removed point at its survivor.
    pub fn consolidate_timeline(&mut self) -> Result<ConsolidationReport, DocumentError> {
        let snapshot = self.timeline()?;
        let plan = plan_consolidation(&snapshot);

        let timeline = self.common_timeline_mut()?;
        let (points, others): (Vec<XmlNode>, Vec<XmlNode>) = std::mem::take(&mut timeline.children)
            .into_iter()
            .partition(|child| matches!(child, XmlNode::Element(e) if e.name == "tli"));
        let mut slots: Vec<Option<XmlNode>> = points.into_iter().map(Some).collect();
        let mut children: Vec<XmlNode> = plan
            .kept
            .iter()
            .filter_map(|&index| slots[index].take())
            .collect();
        children.extend(others);
        timeline.children = children;

        let mut references_rewritten = 0;
        if plan.removed_count() > 0 {
            self.root.visit_mut(&mut |element: &mut XmlElement| {
                if element.name != "event" {
                    return;
                }
                for (key, value) in &mut element.attributes {
                    if !REFERENCE_ATTRIBUTES.contains(&key.as_str()) {
                        continue;
                    }
                    if let Some(survivor) = plan.survivor(value.as_str()) {
                        *value = survivor.to_string();
                        references_rewritten += 1;
                    }
                }
            });
        }

        debug!(
            "Consolidated timeline: {} points kept, {} removed, {} references rewritten",
            plan.timeline.len(),
            plan.removed_count(),
            references_rewritten
        );
        Ok(ConsolidationReport {
            points_removed: plan.removed_count(),
            references_rewritten,
        })
    }

    /// Id of the point at `seconds` (millisecond precision), creating one
    /// if no existing point rounds to the same value.
    pub fn add_to_timeline(&mut self, seconds: f64) -> Result<String, DocumentError> {
        let timeline = self.timeline()?;
        if let Some(existing) = find_rounded(&timeline, seconds) {
            return Ok(existing.id.clone());
        }

        let id = next_point_id(&timeline);
        let point = XmlElement::new("tli")
            .with_attribute("id", id.as_str())
            .with_attribute("time", format_time(round_to_millis(seconds)));
        self.common_timeline_mut()?
            .children
            .push(XmlNode::Element(point));
        trace!("Added tli {} at {}", id, seconds);

        self.consolidate_timeline()?;
        Ok(id)
    }

    /// Remove editor-only metadata and un-hide hidden tiers.
    pub fn prune_metadata(&mut self) -> PruneReport {
        let prune = &self.config.prune;
        let attribute_in = |element: &XmlElement, names: &[String]| {
            element.name == "ud-information"
                && element
                    .attr("attribute-name")
                    .is_some_and(|name| names.iter().any(|n| n == name))
        };

        let metadata_removed = self.root.remove_descendants(&|element: &XmlElement| {
            attribute_in(element, prune.redundant_attributes.as_slice())
        });

        let tier_formats_removed = if prune.drop_tier_formats {
            self.root.remove_descendants(&|element: &XmlElement| {
                element.name == "tier-format" || element.name == "tierformat-table"
            })
        } else {
            0
        };

        let tiers_unhidden = self.root.remove_descendants(&|element: &XmlElement| {
            element
                .elements()
                .any(|child| attribute_in(child, prune.hidden_markers.as_slice()))
        });

        let report = PruneReport {
            metadata_removed,
            tier_formats_removed,
            tiers_unhidden,
        };
        trace!("Removed redundant metadata: {:?}", report);
        report
    }

    /// Trim every non-empty event text and give it exactly one trailing space.
    pub fn add_trailing_spaces(&mut self) -> usize {
        let mut padded = 0;
        self.root.visit_mut(&mut |element: &mut XmlElement| {
            if element.name == "event" && pad_event(element) {
                padded += 1;
            }
        });
        padded
    }

    /// Same as [`add_trailing_spaces`](Self::add_trailing_spaces), limited to one tier.
    pub fn add_trailing_spaces_to_tier(&mut self, tier_id: &str) -> usize {
        let mut padded = 0;
        self.root.visit_mut(&mut |element: &mut XmlElement| {
            if element.name != "tier" || element.attr("id") != Some(tier_id) {
                return;
            }
            for child in &mut element.children {
                if let XmlNode::Element(event) = child {
                    if event.name == "event" && pad_event(event) {
                        padded += 1;
                    }
                }
            }
        });
        padded
    }

    /// Serialise the current tree as indented UTF-8 XML
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        write_document(&self.root)
    }

    /// Consolidate, optionally prune, and write the document with indentation.
    pub fn save(&mut self, path: &Path) -> Result<ConsolidationReport> {
        let report = self.consolidate_timeline()?;
        if self.config.prune_on_save {
            self.prune_metadata();
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        std::fs::write(path, self.to_xml()?)
            .with_context(|| format!("Failed to write file: {:?}", path))?;

        info!("EXB saved to {:?}", path);
        Ok(report)
    }
}

fn tier_from_element(tier: &XmlElement) -> Result<Tier, DocumentError> {
    let annotations = tier
        .elements()
        .filter(|e| e.name == "event")
        .map(|event| -> Result<AnnotationReference, DocumentError> {
            let stop_id = match event.attr("stop") {
                Some(stop) => stop,
                None => required_attr(event, "end")?,
            };
            Ok(AnnotationReference {
                start_id: required_attr(event, "start")?.to_string(),
                stop_id: stop_id.to_string(),
                text: event.text_content(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Tier {
        id: tier.attr("id").map(str::to_string),
        speaker: tier.attr("speaker").map(str::to_string),
        display_name: tier.attr("display-name").map(str::to_string),
        annotations,
    })
}

fn pad_event(event: &mut XmlElement) -> bool {
    let text = event.text_content();
    if text.is_empty() {
        return false;
    }
    event.set_text(format!("{} ", text.trim()));
    true
}
