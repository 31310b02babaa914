use serde::{Deserialize, Serialize};

use crate::links::wiki_link;

/// A relationship proposed between two text spans of a note. Missing
/// fields deserialize as empty and the directive is then ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipDirective {
    pub source: String,
    pub target: String,
    pub relationship: String,
}

impl RelationshipDirective {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.source.is_empty() && !self.target.is_empty() && !self.relationship.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub content: String,
    pub changed: bool,
    /// Directives that inserted at least one marker.
    pub applied: usize,
}

pub struct RelationshipAnnotator;

impl RelationshipAnnotator {
    pub fn apply(content: &str, directives: &[RelationshipDirective]) -> (String, bool) {
        let annotation = Self::annotate(content, directives);
        (annotation.content, annotation.changed)
    }

    /// Apply directives in order; each one sees the insertions of those
    /// before it.
    pub fn annotate(content: &str, directives: &[RelationshipDirective]) -> Annotation {
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        let mut changed = false;
        let mut applied = 0;

        for directive in directives {
            if !directive.is_complete() {
                log::debug!("Skipping incomplete relationship directive: {:?}", directive);
                continue;
            }

            let marker = wiki_link(&directive.relationship);
            let mut inserted = false;

            for (idx, line) in lines.iter_mut().enumerate() {
                if !line.contains(&directive.source)
                    || !line.contains(&directive.target)
                    || line.contains(&marker)
                {
                    continue;
                }

                if let Some(new_line) = Self::insert_marker(
                    line,
                    &directive.source,
                    &directive.target,
                    &directive.relationship,
                ) {
                    *line = new_line;
                    inserted = true;
                    log::debug!("Line {}: added relationship link {}", idx + 1, marker);
                }
            }

            if inserted {
                applied += 1;
                changed = true;
            }
        }

        Annotation {
            content: lines.join("\n"),
            changed,
            applied,
        }
    }

    /// Insert ` [[relationship]] ` right before whichever of `a`/`b` occurs
    /// later in the line. `None` if either is missing or the marker already
    /// precedes the later one.
    pub fn insert_marker(line: &str, a: &str, b: &str, relationship: &str) -> Option<String> {
        let first = line.find(a)?;
        let second = line.find(b)?;
        let later = first.max(second);

        let marker = wiki_link(relationship);
        let (before, after) = line.split_at(later);
        if before.contains(&marker) {
            return None;
        }

        Some(format!("{} {} {}", before, marker, after))
    }
}
