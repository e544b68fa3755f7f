// src/catalog.rs

//! Read-only catalogue of script descriptors with lookup and filtering.

use std::collections::BTreeSet;

use crate::config::ScriptDescriptor;

#[derive(Debug, Clone, Default)]
pub struct ScriptCatalog {
    scripts: Vec<ScriptDescriptor>,
}

impl ScriptCatalog {
    pub fn new(scripts: Vec<ScriptDescriptor>) -> Self {
        Self { scripts }
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptDescriptor> {
        self.scripts.iter()
    }

    /// Look a script up by exact path first, then by label (case-insensitive).
    pub fn find(&self, key: &str) -> Option<&ScriptDescriptor> {
        let key = key.trim();
        self.scripts
            .iter()
            .find(|s| s.path == key)
            .or_else(|| self.scripts.iter().find(|s| s.label.eq_ignore_ascii_case(key)))
    }

    /// Scripts whose label contains `search` (case-insensitive) and that carry
    /// `tag`, when given. Catalogue order is preserved.
    pub fn filter<'a>(
        &'a self,
        search: Option<&'a str>,
        tag: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ScriptDescriptor> + 'a {
        let term = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        self.scripts.iter().filter(move |s| {
            let label_ok = term
                .as_deref()
                .is_none_or(|t| s.label.to_lowercase().contains(t));
            let tag_ok = tag.is_none_or(|t| s.has_tag(t));
            label_ok && tag_ok
        })
    }

    /// All tags used in the catalogue, lower-cased and sorted.
    pub fn tags(&self) -> BTreeSet<String> {
        self.scripts
            .iter()
            .flat_map(|s| s.tags.iter().map(|t| t.to_lowercase()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(label: &str, path: &str, tags: &[&str]) -> ScriptDescriptor {
        ScriptDescriptor {
            label: label.to_string(),
            path: path.to_string(),
            needs_sudo: false,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            description: String::new(),
        }
    }

    fn catalog() -> ScriptCatalog {
        ScriptCatalog::new(vec![
            script("Update System", "sys/update.sh", &["System", "apt"]),
            script("Backup Home", "backup.sh", &["files"]),
            script("Clean Docker", "docker/clean.sh", &["system"]),
        ])
    }

    #[test]
    fn find_prefers_path_then_label() {
        let c = catalog();
        assert_eq!(c.find("backup.sh").unwrap().label, "Backup Home");
        assert_eq!(c.find("backup home").unwrap().path, "backup.sh");
        assert!(c.find("missing").is_none());
    }

    #[test]
    fn filter_combines_search_and_tag() {
        let c = catalog();
        let system: Vec<_> = c.filter(None, Some("system")).map(|s| s.path.as_str()).collect();
        assert_eq!(system, vec!["sys/update.sh", "docker/clean.sh"]);

        let clean: Vec<_> = c
            .filter(Some("CLEAN"), Some("system"))
            .map(|s| s.path.as_str())
            .collect();
        assert_eq!(clean, vec!["docker/clean.sh"]);

        assert_eq!(c.filter(Some("  "), None).count(), 3);
    }

    #[test]
    fn tags_are_deduplicated_case_insensitively() {
        let tags: Vec<_> = catalog().tags().into_iter().collect();
        assert_eq!(tags, vec!["apt", "files", "system"]);
    }
}
