//! Tunables shared by the parser, extractor and rewriter.
//!
//! Everything here is plain data: components copy what they need at
//! construction and never consult a global.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Result, WeaverError};

/// Relationship labels recognised as already-annotated markers.
pub const DEFAULT_RELATIONSHIP_LABELS: &[&str] = &[
    "支撑观点",
    "反驳观点",
    "举例说明",
    "对比分析",
    "因果关系",
    "补充说明",
    "相关概念",
    "发展历程",
    "supports",
    "refutes",
    "exemplifies",
    "contrasts",
    "causal",
    "elaborates",
    "related-concept",
    "chronology",
];

/// High-frequency Chinese function words that never make useful keywords.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也",
    "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这", "那",
    "什么", "出", "就是", "他", "时候", "可以", "如果", "这个", "中", "么", "所", "只", "但",
    "又", "或", "为", "从", "而", "与", "及", "等",
];

/// How many surrounding lines feed a context snippet, and how wide the
/// snippet may get before it is re-centred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSettings {
    pub lines_before: usize,
    pub lines_after: usize,
    /// Characters kept on each side when trimming. Trimming kicks in once
    /// the joined lines exceed twice this value.
    pub radius: usize,
}

impl ContextSettings {
    /// Window around a wiki-link: 2 lines before, 3 after.
    pub fn link() -> Self {
        Self {
            lines_before: 2,
            lines_after: 3,
            radius: 100,
        }
    }

    /// Window around a keyword occurrence: 1 line each side.
    pub fn keyword() -> Self {
        Self {
            lines_before: 1,
            lines_after: 1,
            radius: 100,
        }
    }

    pub fn trim_threshold(&self) -> usize {
        self.radius * 2
    }

    fn merge(self, overrides: ContextOverrides) -> Self {
        Self {
            lines_before: overrides.lines_before.unwrap_or(self.lines_before),
            lines_after: overrides.lines_after.unwrap_or(self.lines_after),
            radius: overrides.radius.unwrap_or(self.radius),
        }
    }
}

/// A context section as written in YAML; absent keys keep that section's
/// own defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextOverrides {
    lines_before: Option<usize>,
    lines_after: Option<usize>,
    radius: Option<usize>,
}

fn link_context<'de, D>(deserializer: D) -> std::result::Result<ContextSettings, D::Error>
where
    D: Deserializer<'de>,
{
    ContextOverrides::deserialize(deserializer).map(|o| ContextSettings::link().merge(o))
}

fn keyword_context<'de, D>(deserializer: D) -> std::result::Result<ContextSettings, D::Error>
where
    D: Deserializer<'de>,
{
    ContextOverrides::deserialize(deserializer).map(|o| ContextSettings::keyword().merge(o))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaverConfig {
    pub relationship_labels: Vec<String>,
    pub stop_words: Vec<String>,
    #[serde(deserialize_with = "link_context")]
    pub link_context: ContextSettings,
    #[serde(deserialize_with = "keyword_context")]
    pub keyword_context: ContextSettings,
    pub keyword_min_chars: usize,
    pub keyword_max_chars: usize,
    pub min_occurrences: usize,
    pub backup_enabled: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            relationship_labels: DEFAULT_RELATIONSHIP_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            link_context: ContextSettings::link(),
            keyword_context: ContextSettings::keyword(),
            keyword_min_chars: 2,
            keyword_max_chars: 10,
            min_occurrences: 2,
            backup_enabled: true,
        }
    }
}

impl WeaverConfig {
    /// Parse a YAML document. Missing keys fall back to the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| WeaverError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WeaverError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let raw = fs::read_to_string(path).map_err(|e| WeaverError::io(path, e))?;
        let config = Self::from_yaml(&raw)?;
        log::debug!(
            "Loaded config from {} ({} relationship labels, {} stop words)",
            path.display(),
            config.relationship_labels.len(),
            config.stop_words.len()
        );
        Ok(config)
    }

    pub fn stop_word_set(&self) -> HashSet<String> {
        self.stop_words.iter().cloned().collect()
    }
}
