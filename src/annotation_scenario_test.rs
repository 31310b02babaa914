// End-to-end annotation scenarios: parse -> extract -> rewrite on real files

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::rewrite::backup_path;
    use crate::stages::{FileChange, Pipeline, RewriteRequest};
    use crate::{KeywordLinkDirective, RelationshipDirective};

    fn write_note(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn request(path: &PathBuf) -> RewriteRequest {
        RewriteRequest {
            file_path: path.to_string_lossy().to_string(),
            ..RewriteRequest::default()
        }
    }

    /// 机器学习 appears twice: one group, and linking touches only the first.
    #[test]
    fn test_keyword_scenario_links_first_occurrence() {
        let dir = TempDir::new().unwrap();
        let content = "机器学习 是 重要 技术\n机器学习 的 应用 广泛\n";
        let path = write_note(&dir, "ml.md", content);
        let pipeline = Pipeline::default();

        let change = FileChange::from_path(&path).unwrap();
        let (parsed, extracted) = pipeline.analyze(&change);
        assert_eq!(parsed.ok().unwrap().link_count, 0);

        let extracted = extracted.ok().unwrap();
        assert_eq!(extracted.keyword_count, 1);
        assert_eq!(extracted.keywords[0].keyword, "机器学习");
        assert_eq!(extracted.keywords[0].occurrences, 2);
        assert_eq!(extracted.keywords[0].line_numbers, vec![1, 2]);

        let mut req = request(&path);
        req.keywords = vec![KeywordLinkDirective::new("机器学习")];
        let updated = pipeline.rewrite_file(&req).ok().unwrap();

        assert!(updated.updates_made);
        assert_eq!(updated.keywords_linked, 1);
        assert!(updated.backup_created);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[[机器学习]] 是 重要 技术\n机器学习 的 应用 广泛\n"
        );
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), content);

        println!("✅ keyword scenario: first occurrence linked, backup kept");
    }

    /// Second keyword pass is a no-op and retires its own backup.
    #[test]
    fn test_keyword_linking_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write_note(&dir, "ml.md", "机器学习 是 重要 技术\n机器学习 的 应用 广泛\n");
        let pipeline = Pipeline::default();
        let mut req = request(&path);
        req.keywords = vec![KeywordLinkDirective::new("机器学习")];

        pipeline.rewrite_file(&req).ok().unwrap();
        let after_first = fs::read_to_string(&path).unwrap();

        let second = pipeline.rewrite_file(&req).ok().unwrap();
        assert!(!second.updates_made);
        assert_eq!(second.keywords_linked, 0);
        assert!(!second.backup_created);
        assert!(!backup_path(&path).exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
    }

    /// Relationship insertion is idempotent and orders the marker by position.
    #[test]
    fn test_relationship_rewrite_idempotent_and_ordered() {
        let dir = TempDir::new().unwrap();
        let path = write_note(&dir, "rel.md", "# Notes\nAlpha leads to Beta.\n");
        let pipeline = Pipeline::default();
        let mut req = request(&path);
        // Source named second on purpose
        req.relationships = vec![RelationshipDirective::new("Beta", "Alpha", "causal")];

        let first = pipeline.rewrite_file(&req).ok().unwrap();
        assert!(first.updates_made);
        assert_eq!(first.relationships_added, 1);
        let once = fs::read_to_string(&path).unwrap();
        let line = once.lines().nth(1).unwrap();
        let alpha = line.find("Alpha").unwrap();
        let marker = line.find("[[causal]]").unwrap();
        let beta = line.find("Beta").unwrap();
        assert!(alpha < marker && marker < beta, "unexpected order in {:?}", line);

        let second = pipeline.rewrite_file(&req).ok().unwrap();
        assert!(!second.updates_made);
        assert_eq!(fs::read_to_string(&path).unwrap(), once);
        assert_eq!(once.matches("[[causal]]").count(), 1);
    }

    /// An annotated line is not re-parsed for links.
    #[test]
    fn test_annotated_line_is_skipped_by_link_parser() {
        let dir = TempDir::new().unwrap();
        let path = write_note(&dir, "rel.md", "[[Alpha]] leads to [[Beta]]\n[[Gamma]]\n");
        let pipeline = Pipeline::default();

        let before = pipeline
            .parse_links(&FileChange::from_path(&path).unwrap())
            .ok()
            .unwrap();
        assert_eq!(before.link_count, 3);

        let mut req = request(&path);
        req.relationships = vec![RelationshipDirective::new("[[Alpha]]", "[[Beta]]", "causal")];
        pipeline.rewrite_file(&req).ok().unwrap();

        let after = pipeline
            .parse_links(&FileChange::from_path(&path).unwrap())
            .ok()
            .unwrap();
        assert_eq!(after.link_count, 1);
        assert_eq!(after.links[0].target, "Gamma");
    }

    /// Both rewrites on one file: the keyword pass makes its own backup of
    /// the post-relationship content.
    #[test]
    fn test_relationship_then_keyword_backups_are_independent() {
        let dir = TempDir::new().unwrap();
        let original = "Alpha and Beta\ngraph theory\ngraph search\n";
        let path = write_note(&dir, "both.md", original);
        let pipeline = Pipeline::default();

        let mut req = request(&path);
        req.relationships = vec![RelationshipDirective::new("Alpha", "Beta", "supports")];
        req.keywords = vec![KeywordLinkDirective::new("graph")];
        let updated = pipeline.rewrite_file(&req).ok().unwrap();

        assert!(updated.updates_made);
        assert_eq!(updated.relationships_added, 1);
        assert_eq!(updated.keywords_linked, 1);
        assert!(updated.backup_created);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Alpha and  [[supports]] Beta\n[[graph]] theory\ngraph search\n"
        );
        assert_eq!(
            fs::read_to_string(backup_path(&path)).unwrap(),
            "Alpha and  [[supports]] Beta\ngraph theory\ngraph search\n"
        );
    }

    /// No links, no recurring tokens, empty directives: nothing happens.
    #[test]
    fn test_round_trip_without_annotations() {
        let dir = TempDir::new().unwrap();
        let content = "just one plain sentence here\n";
        let path = write_note(&dir, "plain.md", content);
        let pipeline = Pipeline::default();

        let (parsed, extracted) = pipeline.analyze(&FileChange::from_path(&path).unwrap());
        assert_eq!(parsed.ok().unwrap().link_count, 0);
        assert_eq!(extracted.ok().unwrap().keyword_count, 0);

        let updated = pipeline.rewrite_file(&request(&path)).ok().unwrap();
        assert!(!updated.updates_made);
        assert!(!updated.backup_created);
        assert!(!backup_path(&path).exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    /// Malformed directives are skipped one by one, not the whole batch.
    #[test]
    fn test_malformed_directives_are_skipped_individually() {
        let dir = TempDir::new().unwrap();
        let path = write_note(&dir, "m.md", "Alpha Beta\nRust async\n");
        let pipeline = Pipeline::default();

        let json = format!(
            r#"{{
                "file_path": {:?},
                "relationships": [
                    {{"source": "Alpha", "relationship": "causal"}},
                    {{"source": "Alpha", "target": "Beta", "relationship": "refutes"}}
                ],
                "keywords": [{{}}, {{"keyword": "Rust"}}]
            }}"#,
            path.to_string_lossy()
        );
        let req = RewriteRequest::from_json(&json).unwrap();
        let updated = pipeline.rewrite_file(&req).ok().unwrap();

        assert_eq!(updated.relationships_added, 1);
        assert_eq!(updated.keywords_linked, 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Alpha  [[refutes]] Beta\n[[Rust]] async\n"
        );
    }
}
