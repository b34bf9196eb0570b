use serde::Serialize;

/// A shared, uniquely identified point on the common timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePoint {
    pub id: String,
    /// Seconds from the start of the recording
    pub time: f64,
}

impl TimePoint {
    /// Point with the given id at `time` seconds
    pub fn new(id: impl Into<String>, time: f64) -> Self {
        Self {
            id: id.into(),
            time,
        }
    }
}

/// An annotation unit that points at two timeline points by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationReference {
    pub start_id: String,
    pub stop_id: String,
    pub text: String,
}

/// A named annotation channel, optionally bound to a speaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tier {
    pub id: Option<String>,
    pub speaker: Option<String>,
    pub display_name: Option<String>,
    pub annotations: Vec<AnnotationReference>,
}

impl Tier {
    /// Display name, falling back to the tier id
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or_default()
    }
}
