//! Stage entry points and the records exchanged with the watcher, the
//! inference step and downstream consumers.
//!
//! Stages never return `Err`: a failure becomes a `{ "error": ... }`
//! record so callers can forward it like any other output.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::WeaverConfig;
use crate::error::{Result, WeaverError};
use crate::keywords::{KeywordExtractor, KeywordGroup};
use crate::links::{Link, LinkParser};
use crate::rewrite::{KeywordLinkDirective, RelationshipDirective, SafeRewriter};

/// One observed state of a markdown file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChange {
    pub file_path: String,
    pub file_name: String,
    pub content: String,
    /// Seconds since the Unix epoch.
    pub timestamp: Option<f64>,
}

impl FileChange {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WeaverError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| WeaverError::io(path, e))?;
        Ok(Self {
            file_path: path.to_string_lossy().to_string(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            content,
            timestamp: Some(now_epoch_secs()),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| WeaverError::MalformedInput(format!("Invalid file change: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLinks {
    pub file_path: String,
    pub file_name: String,
    pub links: Vec<Link>,
    pub link_count: usize,
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedKeywords {
    pub file_path: String,
    pub file_name: String,
    pub keywords: Vec<KeywordGroup>,
    pub keyword_count: usize,
    pub timestamp: Option<f64>,
    /// Upstream links, passed through untouched.
    pub extracted_links: Vec<Link>,
}

/// Directives produced by the inference step for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteRequest {
    pub file_path: String,
    pub relationships: Vec<RelationshipDirective>,
    pub keywords: Vec<KeywordLinkDirective>,
}

impl RewriteRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| WeaverError::MalformedInput(format!("Invalid rewrite request: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdated {
    pub file_path: String,
    pub updates_made: bool,
    pub relationships_added: usize,
    pub keywords_linked: usize,
    /// RFC 3339, local time.
    pub timestamp: String,
    pub backup_created: bool,
}

/// Either a stage's record or the error that prevented it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageOutput<T> {
    Failed { error: String },
    Done(T),
}

impl<T> StageOutput<T> {
    pub fn from_result(stage: &str, result: Result<T>) -> Self {
        match result {
            Ok(record) => StageOutput::Done(record),
            Err(e) => {
                let error = format!("{} failed: {}", stage, e);
                log::error!("{}", error);
                StageOutput::Failed { error }
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StageOutput::Failed { error } => Some(error),
            StageOutput::Done(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    pub fn ok(self) -> Option<T> {
        match self {
            StageOutput::Done(record) => Some(record),
            StageOutput::Failed { .. } => None,
        }
    }

    pub fn record(&self) -> Option<&T> {
        match self {
            StageOutput::Done(record) => Some(record),
            StageOutput::Failed { .. } => None,
        }
    }
}

/// The three annotation stages wired to one configuration.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    parser: LinkParser,
    extractor: KeywordExtractor,
    rewriter: SafeRewriter,
}

impl Pipeline {
    pub fn new(config: &WeaverConfig) -> Self {
        Self {
            parser: LinkParser::new(config),
            extractor: KeywordExtractor::new(config),
            rewriter: SafeRewriter::new(config),
        }
    }

    pub fn parse_links(&self, change: &FileChange) -> StageOutput<ParsedLinks> {
        log::info!("Parsing links: {}", change.file_path);

        let links = self.parser.extract_links(&change.content);
        if links.is_empty() {
            log::info!("No links found");
        } else {
            log::info!("Found {} links", links.len());
            for link in &links {
                log::debug!("  - {} (line {})", link.full_link_text, link.line_number);
            }
        }

        StageOutput::Done(ParsedLinks {
            file_path: change.file_path.clone(),
            file_name: change.file_name.clone(),
            link_count: links.len(),
            links,
            timestamp: change.timestamp,
        })
    }

    pub fn extract_keywords(
        &self,
        change: &FileChange,
        links: &ParsedLinks,
    ) -> StageOutput<ExtractedKeywords> {
        log::info!("Extracting keywords: {}", change.file_path);

        let keywords = self.extractor.extract_keywords(&change.content);
        if keywords.is_empty() {
            log::info!("No recurring keywords found");
        } else {
            log::info!("Found {} keyword groups", keywords.len());
            for group in keywords.iter().take(5) {
                log::debug!("  - {} ({} occurrences)", group.keyword, group.occurrences);
            }
        }

        StageOutput::Done(ExtractedKeywords {
            file_path: change.file_path.clone(),
            file_name: change.file_name.clone(),
            keyword_count: keywords.len(),
            keywords,
            timestamp: change.timestamp,
            extracted_links: links.links.clone(),
        })
    }

    /// Link and keyword stages for one file change.
    pub fn analyze(
        &self,
        change: &FileChange,
    ) -> (StageOutput<ParsedLinks>, StageOutput<ExtractedKeywords>) {
        let parsed = self.parse_links(change);
        let keywords = match parsed.record() {
            Some(links) => self.extract_keywords(change, links),
            None => StageOutput::Failed {
                error: "keyword extraction skipped: link parsing failed".to_string(),
            },
        };
        (parsed, keywords)
    }

    pub fn rewrite_file(&self, request: &RewriteRequest) -> StageOutput<FileUpdated> {
        StageOutput::from_result("file rewrite", self.try_rewrite_file(request))
    }

    fn try_rewrite_file(&self, request: &RewriteRequest) -> Result<FileUpdated> {
        if request.file_path.is_empty() {
            return Err(WeaverError::MalformedInput(
                "rewrite request has no file_path".to_string(),
            ));
        }

        let path = Path::new(&request.file_path);
        log::info!("Rewriting file: {}", path.display());
        if !path.exists() {
            return Err(WeaverError::NotFound(path.to_path_buf()));
        }

        let mut relationships_added = 0;
        let mut keywords_linked = 0;
        // Each pass retires or keeps its own backup, so only the last one
        // that ran decides what is left on disk.
        let mut backup_created = false;

        if !request.relationships.is_empty() {
            log::info!("Adding {} relationship links", request.relationships.len());
            let outcome = self
                .rewriter
                .add_relationship_links(path, &request.relationships)?;
            relationships_added = outcome.applied;
            backup_created = outcome.backup_created();
        }

        if !request.keywords.is_empty() {
            log::info!("Adding {} keyword links", request.keywords.len());
            let outcome = self.rewriter.add_keyword_links(path, &request.keywords)?;
            keywords_linked = outcome.applied;
            backup_created = outcome.backup_created();
        }

        let updates_made = relationships_added > 0 || keywords_linked > 0;
        if updates_made {
            log::info!("File update complete: {}", path.display());
        } else {
            log::info!("File needs no update: {}", path.display());
        }

        Ok(FileUpdated {
            file_path: request.file_path.clone(),
            updates_made,
            relationships_added,
            keywords_linked,
            timestamp: chrono::Local::now().to_rfc3339(),
            backup_created,
        })
    }
}

pub(crate) fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
