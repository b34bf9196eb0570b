pub mod error;
pub mod io;
pub mod models;
pub mod stages;
pub mod xml;

pub use error::{DocumentError, SegmentationError, StructuralError, ValidationError};
pub use io::{
    ConsolidationReport, ExbConfig, ExbDocument, ExportConfig, HumanTranscript, PruneConfig,
    PruneReport, SegmentExport, TrsDocument,
};
pub use models::{AnnotationReference, Segment, SpeakerToken, Tier, TimePoint, Turn, TurnNode};
pub use stages::{
    GroupedSegments, SpeakerDirectory, SpeakerSegments, group_segments, segment_turns,
};
