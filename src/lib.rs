pub mod config;
pub mod context;
pub mod error;
pub mod keywords;
pub mod links;
pub mod rewrite;
pub mod stages;
pub mod vault;
pub mod watcher;


#[cfg(test)]
mod annotation_scenario_test;

pub use config::WeaverConfig;
pub use error::{Result, WeaverError};
pub use keywords::{KeywordExtractor, KeywordGroup, KeywordOccurrence};
pub use links::{Link, LinkParser};
pub use rewrite::{
    backup_path, BackupGuard, KeywordLinkDirective, RelationshipAnnotator,
    RelationshipDirective, RewriteOutcome, SafeRewriter,
};
pub use stages::{
    ExtractedKeywords, FileChange, FileUpdated, ParsedLinks, Pipeline, RewriteRequest,
    StageOutput,
};
pub use vault::{collect_markdown_files, scan_vault, ScanEntry};
pub use watcher::VaultWatcher;
