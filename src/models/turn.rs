/// One child of a turn, in document order.
///
/// Trailing text after a `Sync`, `Event` or `Who` is its own `Text` node.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnNode {
    Text(String),
    Sync { time: f64 },
    Event { desc: String, text: String },
    /// 1-based index into the turn's speakers, plus anything nested inside the marker
    Who { nb: usize, children: Vec<TurnNode> },
    /// Any other element (comments, background, ...), kept with its text
    Other { tag: String, text: String },
}

impl TurnNode {
    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Sync { .. } => {}
            Self::Event { text, .. } | Self::Other { text, .. } => out.push_str(text),
            Self::Who { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    fn is_who(&self) -> bool {
        matches!(self, Self::Who { .. })
    }
}

/// How a turn gets cut into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnShape {
    /// No text at all, only events
    EventOnly,
    /// Several speakers talking over each other, separated by `Who` markers
    Overlapping,
    /// One speaker, subdivided by `Sync` checkpoints
    SingleSpeaker,
}

/// A contiguous block of transcript from the turn format.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// Speaker tokens as listed on the turn, in order
    pub speakers: Vec<String>,
    pub start: f64,
    pub end: f64,
    pub children: Vec<TurnNode>,
}

impl Turn {
    /// All text in the turn with markup removed
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            child.collect_text(&mut text);
        }
        text
    }

    /// Which segmentation rule applies to this turn
    pub fn shape(&self) -> TurnShape {
        if self.text().trim().is_empty() {
            TurnShape::EventOnly
        } else if self.children.iter().any(TurnNode::is_who) {
            TurnShape::Overlapping
        } else {
            TurnShape::SingleSpeaker
        }
    }

    /// Every event description in the turn, nested ones included
    pub fn event_descriptions(&self) -> Vec<&str> {
        fn walk<'a>(nodes: &'a [TurnNode], out: &mut Vec<&'a str>) {
            for node in nodes {
                match node {
                    TurnNode::Event { desc, .. } => out.push(desc),
                    TurnNode::Who { children, .. } => walk(children, out),
                    _ => {}
                }
            }
        }
        let mut descriptions = Vec::new();
        walk(&self.children, &mut descriptions);
        descriptions
    }
}
