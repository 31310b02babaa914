use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::{ContextSettings, WeaverConfig};
use crate::context;
use crate::links::has_link_markers;

/// Maximal runs of CJK ideographs and word characters.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{4e00}-\u{9fff}\w]+").expect("keyword token pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordOccurrence {
    pub keyword: String,
    pub line_number: usize,
    pub line_content: String,
    pub context: String,
    pub length: usize,
}

/// All occurrences of one recurring keyword. `keyword` keeps the casing
/// of the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub keyword: String,
    pub occurrences: usize,
    pub contexts: Vec<String>,
    pub line_numbers: Vec<usize>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    stop_words: HashSet<String>,
    min_chars: usize,
    max_chars: usize,
    min_occurrences: usize,
    context: ContextSettings,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(&WeaverConfig::default())
    }
}

impl KeywordExtractor {
    pub fn new(config: &WeaverConfig) -> Self {
        Self {
            stop_words: config.stop_word_set(),
            // Single characters are never keywords, whatever the config says
            min_chars: config.keyword_min_chars.max(2),
            max_chars: config.keyword_max_chars,
            min_occurrences: config.min_occurrences.max(2),
            context: config.keyword_context,
        }
    }

    pub fn extract_keywords(&self, content: &str) -> Vec<KeywordGroup> {
        let lines: Vec<&str> = content.split('\n').collect();
        let mut occurrences = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if has_link_markers(line) || is_structural_line(line) {
                continue;
            }
            occurrences.extend(self.line_occurrences(&lines, idx));
        }

        self.group(occurrences)
    }

    fn line_occurrences(&self, lines: &[&str], idx: usize) -> Vec<KeywordOccurrence> {
        let line = lines[idx];
        TOKEN_RE
            .find_iter(line)
            .map(|m| m.as_str())
            .filter(|token| self.is_valid_keyword(token))
            .map(|token| KeywordOccurrence {
                keyword: token.to_string(),
                line_number: idx + 1,
                line_content: line.trim().to_string(),
                context: context::token_context(lines, idx, token, &self.context),
                length: context::char_len(token),
            })
            .collect()
    }

    pub fn is_valid_keyword(&self, token: &str) -> bool {
        let len = context::char_len(token);
        if len < self.min_chars || len > self.max_chars {
            return false;
        }
        if self.stop_words.contains(token) {
            return false;
        }
        !token.chars().all(char::is_numeric)
    }

    /// Group by lowercase key, keep groups meeting the recurrence threshold,
    /// most frequent first. Ties keep first-seen order.
    fn group(&self, occurrences: Vec<KeywordOccurrence>) -> Vec<KeywordGroup> {
        let mut order: Vec<String> = Vec::new();
        let mut buckets: HashMap<String, Vec<KeywordOccurrence>> = HashMap::new();

        for occ in occurrences {
            let key = occ.keyword.to_lowercase();
            if !buckets.contains_key(&key) {
                order.push(key.clone());
            }
            buckets.entry(key).or_default().push(occ);
        }

        let mut groups: Vec<KeywordGroup> = order
            .into_iter()
            .filter_map(|key| buckets.remove(&key))
            .filter(|occs| occs.len() >= self.min_occurrences)
            .map(|occs| KeywordGroup {
                keyword: occs[0].keyword.clone(),
                occurrences: occs.len(),
                contexts: occs.iter().map(|o| o.context.clone()).collect(),
                line_numbers: occs.iter().map(|o| o.line_number).collect(),
                lines: occs.into_iter().map(|o| o.line_content).collect(),
            })
            .collect();

        groups.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        groups
    }
}

/// Headings and code fences are never mined for keywords.
fn is_structural_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('#') || trimmed.starts_with("```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recurrence_threshold() {
        let content = "向量 数据库\n图谱 构建\n图谱 查询\n知识 图谱";
        let groups = KeywordExtractor::default().extract_keywords(content);

        assert!(groups.iter().all(|g| g.keyword != "向量"));
        let graph: Vec<&KeywordGroup> = groups.iter().filter(|g| g.keyword == "图谱").collect();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph[0].occurrences, 3);
        assert_eq!(graph[0].line_numbers, vec![2, 3, 4]);
        assert_eq!(graph[0].lines, vec!["图谱 构建", "图谱 查询", "知识 图谱"]);
    }

    #[test]
    fn test_filters_reject_noise() {
        let extractor = KeywordExtractor::default();
        assert!(!extractor.is_valid_keyword("a"));
        assert!(!extractor.is_valid_keyword("的"));
        assert!(!extractor.is_valid_keyword("一个"));
        assert!(!extractor.is_valid_keyword("2024"));
        assert!(!extractor.is_valid_keyword("abcdefghijk"));
        assert!(extractor.is_valid_keyword("abcdefghij"));
        assert!(extractor.is_valid_keyword("v2"));
        assert!(extractor.is_valid_keyword("机器学习"));
    }

    #[test]
    fn test_skips_linked_heading_and_fence_lines() {
        let content = "# Rust notes\n```rust\nRust [[Cargo]]\n  ## Rust again\nplain text\nplain text";
        let groups = KeywordExtractor::default().extract_keywords(content);
        let names: Vec<&str> = groups.iter().map(|g| g.keyword.as_str()).collect();
        assert_eq!(names, vec!["plain", "text"]);
    }

    #[test]
    fn test_groups_case_insensitively_keeping_first_casing() {
        let content = "Tokio runtime\ntokio tasks\nTOKIO io";
        let groups = KeywordExtractor::default().extract_keywords(content);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].keyword, "Tokio");
        assert_eq!(groups[0].occurrences, 3);
    }

    #[test]
    fn test_sorted_by_count_with_stable_ties() {
        let content = "beta alpha\ngamma alpha\nbeta gamma alpha";
        let groups = KeywordExtractor::default().extract_keywords(content);
        let names: Vec<(&str, usize)> = groups
            .iter()
            .map(|g| (g.keyword.as_str(), g.occurrences))
            .collect();
        assert_eq!(names, vec![("alpha", 3), ("beta", 2), ("gamma", 2)]);
    }

    #[test]
    fn test_empty_content() {
        assert!(KeywordExtractor::default().extract_keywords("").is_empty());
    }

    #[test]
    fn test_contexts_follow_occurrences() {
        let content = "前言\n机器学习 是 重要 技术\n中间\n机器学习 的 应用 广泛";
        let groups = KeywordExtractor::default().extract_keywords(content);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].contexts,
            vec![
                "前言\n机器学习 是 重要 技术\n中间".to_string(),
                "中间\n机器学习 的 应用 广泛".to_string(),
            ]
        );
    }
}
