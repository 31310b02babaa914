use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, WeaverError};
use crate::stages::{ExtractedKeywords, FileChange, ParsedLinks, Pipeline, StageOutput};

/// Link and keyword records for one note of a vault scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub file_path: String,
    pub links: StageOutput<ParsedLinks>,
    pub keywords: StageOutput<ExtractedKeywords>,
}

/// All `.md` files under `vault`, hidden entries excluded, sorted by path.
pub fn collect_markdown_files(vault: &Path) -> Result<Vec<PathBuf>> {
    if !vault.is_dir() {
        return Err(WeaverError::NotFound(vault.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(vault)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();

    files.sort();
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Run the link and keyword stages over every note in parallel. Files are
/// independent; an unreadable one yields error records for its entry only.
pub fn scan_vault(vault: &Path, pipeline: &Pipeline) -> Result<Vec<ScanEntry>> {
    let files = collect_markdown_files(vault)?;
    log::info!("Scanning {} notes in {}", files.len(), vault.display());

    let entries = files
        .par_iter()
        .map(|path| match FileChange::from_path(path) {
            Ok(change) => {
                let (links, keywords) = pipeline.analyze(&change);
                ScanEntry {
                    file_path: change.file_path,
                    links,
                    keywords,
                }
            }
            Err(e) => {
                let error = format!("Failed to read note: {}", e);
                log::warn!("{}", error);
                ScanEntry {
                    file_path: path.to_string_lossy().to_string(),
                    links: StageOutput::Failed {
                        error: error.clone(),
                    },
                    keywords: StageOutput::Failed { error },
                }
            }
        })
        .collect();

    Ok(entries)
}
