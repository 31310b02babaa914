//! Backup-guarded in-place rewriting of notes.
//!
//! Every mutation follows the same protocol: read, back up to
//! `<file>.bak`, transform, then either write the new content (keeping
//! the backup) or drop the backup because nothing changed. A `.bak` next
//! to a note after a rewrite call means that call modified the note.

pub mod relationships;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::config::WeaverConfig;
use crate::context::char_len;
use crate::error::{Result, WeaverError};
use crate::links::{wiki_link, WIKI_LINK_RE};

pub use relationships::{Annotation, RelationshipAnnotator, RelationshipDirective};

const BACKUP_SUFFIX: &str = ".bak";
const TEMP_SUFFIX: &str = ".weaver-tmp";

/// One keyword to turn into a wiki-link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordLinkDirective {
    pub keyword: String,
}

impl KeywordLinkDirective {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }
}

/// `<path>.bak`, next to the original.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write to a sibling temp file, sync, then rename over the target, so a
/// failure part-way leaves the original untouched.
pub(crate) fn atomic_write_file(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = with_suffix(path, TEMP_SUFFIX);

    let mut file = fs::File::create(&temp_path).map_err(|e| WeaverError::io(&temp_path, e))?;
    file.write_all(content).map_err(|e| WeaverError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| WeaverError::io(&temp_path, e))?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(WeaverError::io(path, e));
    }

    Ok(())
}

/// Backup taken before a mutation attempt.
///
/// Resolve it with [`BackupGuard::retain`] once the new content is on disk
/// or [`BackupGuard::release`] when the attempt was a no-op. A guard dropped
/// unresolved (write error, panic in a transform) leaves the backup in place.
#[derive(Debug)]
pub struct BackupGuard {
    backup: Option<PathBuf>,
}

impl BackupGuard {
    /// Best effort: a failed copy is logged and yields a guard with no backup.
    pub fn acquire(path: &Path, enabled: bool) -> Self {
        if !enabled {
            return Self { backup: None };
        }

        let backup = backup_path(path);
        match fs::copy(path, &backup) {
            Ok(_) => {
                log::debug!("Created backup: {}", backup.display());
                Self {
                    backup: Some(backup),
                }
            }
            Err(e) => {
                log::warn!("Failed to create backup for {}: {}", path.display(), e);
                Self { backup: None }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    pub fn retain(mut self) -> Option<PathBuf> {
        self.backup.take()
    }

    pub fn release(mut self) {
        if let Some(backup) = self.backup.take() {
            if let Err(e) = fs::remove_file(&backup) {
                log::warn!("Failed to remove backup {}: {}", backup.display(), e);
            }
        }
    }
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        if let Some(backup) = &self.backup {
            log::warn!("Rewrite interrupted, backup kept at {}", backup.display());
        }
    }
}

/// What one rewrite call did to its file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub changed: bool,
    /// Backup retained by this call. `None` for a no-op, with backups
    /// disabled, or when the copy could not be made.
    pub backup: Option<PathBuf>,
    /// Directives that took effect (link helpers only).
    pub applied: usize,
}

impl RewriteOutcome {
    pub fn backup_created(&self) -> bool {
        self.backup.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SafeRewriter {
    backup_enabled: bool,
}

impl Default for SafeRewriter {
    fn default() -> Self {
        Self::new(&WeaverConfig::default())
    }
}

impl SafeRewriter {
    pub fn new(config: &WeaverConfig) -> Self {
        Self {
            backup_enabled: config.backup_enabled,
        }
    }

    /// Run `transform` over the file's content and persist the result if it
    /// changed anything.
    pub fn rewrite<F>(&self, path: &Path, transform: F) -> Result<RewriteOutcome>
    where
        F: FnOnce(&str) -> (String, bool),
    {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WeaverError::NotFound(path.to_path_buf()),
            _ => WeaverError::io(path, e),
        })?;

        let guard = BackupGuard::acquire(path, self.backup_enabled);
        let (updated, changed) = transform(&content);

        if changed && updated != content {
            atomic_write_file(path, updated.as_bytes())?;
            let backup = guard.retain();
            log::info!("File updated: {}", path.display());
            Ok(RewriteOutcome {
                changed: true,
                backup,
                applied: 0,
            })
        } else {
            guard.release();
            log::info!("No changes needed: {}", path.display());
            Ok(RewriteOutcome::default())
        }
    }

    /// Insert relationship markers. `applied` counts directives that
    /// produced an insertion.
    pub fn add_relationship_links(
        &self,
        path: &Path,
        directives: &[RelationshipDirective],
    ) -> Result<RewriteOutcome> {
        let mut applied = 0;
        let outcome = self.rewrite(path, |content| {
            let annotation = RelationshipAnnotator::annotate(content, directives);
            applied = annotation.applied;
            (annotation.content, annotation.changed)
        })?;
        Ok(RewriteOutcome { applied, ..outcome })
    }

    /// Link the first plain occurrence of each keyword. `applied` counts
    /// keywords linked.
    pub fn add_keyword_links(
        &self,
        path: &Path,
        directives: &[KeywordLinkDirective],
    ) -> Result<RewriteOutcome> {
        let mut linked = 0;
        let outcome = self.rewrite(path, |content| {
            let (updated, count) = link_keywords(content, directives);
            linked = count;
            (updated, count > 0)
        })?;
        Ok(RewriteOutcome {
            applied: linked,
            ..outcome
        })
    }
}

/// Replace the first whole-word occurrence of each keyword with its
/// wiki-link form. Keywords already linked somewhere in the content are
/// left alone, and matches inside existing `[[...]]` spans are passed over.
pub fn link_keywords(content: &str, directives: &[KeywordLinkDirective]) -> (String, usize) {
    let mut updated = content.to_string();
    let mut linked = 0;

    for directive in directives {
        let keyword = directive.keyword.as_str();
        if char_len(keyword) <= 1 {
            log::debug!("Skipping keyword directive {:?}", keyword);
            continue;
        }

        let link = wiki_link(keyword);
        if updated.contains(&link) {
            continue;
        }

        let pattern = match Regex::new(&format!(r"\b{}\b", regex::escape(keyword))) {
            Ok(re) => re,
            Err(e) => {
                log::warn!("Invalid keyword pattern for {:?}: {}", keyword, e);
                continue;
            }
        };

        let spans: Vec<Range<usize>> = WIKI_LINK_RE
            .find_iter(&updated)
            .map(|m| m.range())
            .collect();
        let target = pattern
            .find_iter(&updated)
            .map(|m| m.range())
            .find(|range| !spans.iter().any(|span| overlaps(span, range)));

        if let Some(range) = target {
            updated.replace_range(range, &link);
            linked += 1;
            log::debug!("Linked keyword: {}", keyword);
        }
    }

    (updated, linked)
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
