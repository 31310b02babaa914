use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ContextSettings, WeaverConfig};
use crate::context;

/// `[[target]]` or `[[target|display]]`, single line only.
pub(crate) static WIKI_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]\n]+)\]\]").expect("wiki-link pattern"));

/// Render `text` as a wiki-link.
pub fn wiki_link(text: &str) -> String {
    format!("[[{}]]", text)
}

/// True when the line carries an opening and a closing link bracket pair.
pub fn has_link_markers(line: &str) -> bool {
    line.contains("[[") && line.contains("]]")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub target: String,
    pub display: String,
    /// 1-based
    pub line_number: usize,
    pub line_content: String,
    pub context: String,
    #[serde(alias = "full_link")]
    pub full_link_text: String,
}

/// Finds wiki-links in a note, skipping lines that already carry a
/// relationship marker.
#[derive(Debug, Clone)]
pub struct LinkParser {
    relationship_markers: Vec<String>,
    context: ContextSettings,
}

impl Default for LinkParser {
    fn default() -> Self {
        Self::new(&WeaverConfig::default())
    }
}

impl LinkParser {
    pub fn new(config: &WeaverConfig) -> Self {
        Self {
            relationship_markers: config
                .relationship_labels
                .iter()
                .filter(|label| !label.is_empty())
                .map(|label| wiki_link(label))
                .collect(),
            context: config.link_context,
        }
    }

    pub fn extract_links(&self, content: &str) -> Vec<Link> {
        let lines: Vec<&str> = content.split('\n').collect();
        let mut links = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if !has_link_markers(line) || self.is_relationship_line(line) {
                continue;
            }

            for cap in WIKI_LINK_RE.captures_iter(line) {
                let inner = &cap[1];
                let (target, display) = match inner.split_once('|') {
                    Some((target, display)) => (target, display),
                    None => (inner, inner),
                };

                links.push(Link {
                    target: target.trim().to_string(),
                    display: display.trim().to_string(),
                    line_number: idx + 1,
                    line_content: line.trim().to_string(),
                    context: context::line_context(&lines, idx, &self.context),
                    full_link_text: wiki_link(inner),
                });
            }
        }

        links
    }

    /// A line holding any relationship marker has already been annotated.
    pub fn is_relationship_line(&self, line: &str) -> bool {
        self.relationship_markers
            .iter()
            .any(|marker| line.contains(marker.as_str()))
    }
}
