//! Corpus catalog: the sweep's independent variable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// One corpus size under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSpec {
    /// Short identifier (`baseline`, `1k`, ...).
    pub name: String,
    /// Directory holding the corpus documents.
    pub path: PathBuf,
    /// Nominal number of chunks produced by this corpus.
    pub expected_chunks: u64,
}

impl CorpusSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, expected_chunks: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            expected_chunks,
        }
    }

    /// Whether the corpus directory exists and holds at least one document.
    #[must_use]
    pub fn has_documents(&self) -> bool {
        let Ok(entries) = std::fs::read_dir(&self.path) else {
            return false;
        };
        entries.filter_map(Result::ok).any(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "txt" || ext == "xml")
        })
    }
}

/// Ordered collection of corpora known to a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusCatalog {
    pub corpora: Vec<CorpusSpec>,
}

impl Default for CorpusCatalog {
    fn default() -> Self {
        let sizes = "Data/test_corpus/corpus_sizes";
        Self {
            corpora: vec![
                CorpusSpec::new("baseline", "Data/test_corpus/documents", 175),
                CorpusSpec::new("1k", format!("{sizes}/corpus_1k"), 5_562),
                CorpusSpec::new("10k", format!("{sizes}/corpus_10k"), 69_903),
                CorpusSpec::new("50k", format!("{sizes}/corpus_50k"), 345_046),
                CorpusSpec::new("100k", format!("{sizes}/corpus_100k"), 690_385),
                CorpusSpec::new("250k", format!("{sizes}/corpus_250k"), 1_775_361),
                CorpusSpec::new("500k", format!("{sizes}/corpus_500k"), 2_249_072),
                CorpusSpec::new("1m", format!("{sizes}/corpus_1m"), 2_249_072),
                CorpusSpec::new("full", format!("{sizes}/corpus_full"), 2_249_072),
            ],
        }
    }
}

impl CorpusCatalog {
    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let content = std::fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
        let catalog: Self =
            serde_json::from_str(&content).map_err(|e| SweepError::json(path, e))?;
        if catalog.corpora.is_empty() {
            return Err(SweepError::InvalidArgument(format!(
                "corpus catalog {} is empty",
                path.display()
            )));
        }
        for corpus in &catalog.corpora {
            if !is_valid_name(&corpus.name) {
                return Err(SweepError::InvalidArgument(format!(
                    "corpus name '{}' in {} must be letters, digits, '-', '_' or '.', not starting with '.'",
                    corpus.name,
                    path.display()
                )));
            }
        }
        tracing::debug!(path = %path.display(), corpora = catalog.corpora.len(), "loaded corpus catalog");
        Ok(catalog)
    }

    /// Resolve relative corpus paths against `root`.
    #[must_use]
    pub fn with_root(mut self, root: &Path) -> Self {
        for corpus in &mut self.corpora {
            if corpus.path.is_relative() {
                corpus.path = root.join(&corpus.path);
            }
        }
        self
    }

    /// Look up a corpus by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CorpusSpec> {
        self.corpora.iter().find(|c| c.name == name)
    }

    /// Select corpora by name, or all of them when `filter` is empty.
    ///
    /// The result is ordered by expected size ascending; ties keep catalog order.
    pub fn select(&self, filter: &[String]) -> Result<Vec<CorpusSpec>, SweepError> {
        let mut selected = if filter.is_empty() {
            self.corpora.clone()
        } else {
            let mut picked = Vec::with_capacity(filter.len());
            for name in filter {
                let corpus = self.get(name).ok_or_else(|| {
                    let known: Vec<&str> = self.corpora.iter().map(|c| c.name.as_str()).collect();
                    SweepError::InvalidArgument(format!(
                        "unknown corpus '{name}' (expected one of: {})",
                        known.join(", ")
                    ))
                })?;
                if !picked.iter().any(|c: &CorpusSpec| c.name == corpus.name) {
                    picked.push(corpus.clone());
                }
            }
            picked
        };
        selected.sort_by_key(|c| c.expected_chunks);
        Ok(selected)
    }
}

/// Corpus names become directory names (`corpus_<name>`), so they must stay
/// a single path component.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_catalog_is_size_ordered() {
        let all = CorpusCatalog::default().select(&[]).unwrap();
        assert_eq!(all.first().unwrap().name, "baseline");
        assert!(all.windows(2).all(|w| w[0].expected_chunks <= w[1].expected_chunks));
        // ties keep declaration order
        let tail: Vec<&str> = all[6..].iter().map(|c| c.name.as_str()).collect();
        assert_eq!(tail, ["500k", "1m", "full"]);
    }

    #[test]
    fn filter_reorders_by_size() {
        let filter = vec!["10k".to_string(), "baseline".to_string()];
        let picked = CorpusCatalog::default().select(&filter).unwrap();
        let names: Vec<&str> = picked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["baseline", "10k"]);
    }

    #[test]
    fn unknown_corpus_is_rejected() {
        let err = CorpusCatalog::default()
            .select(&["2k".to_string()])
            .unwrap_err();
        assert!(matches!(err, SweepError::InvalidArgument(_)));
    }

    #[test]
    fn has_documents_requires_txt_or_xml() {
        let dir = TempDir::new().unwrap();
        let spec = CorpusSpec::new("t", dir.path(), 1);
        assert!(!spec.has_documents());
        std::fs::write(dir.path().join("notes.md"), "x").unwrap();
        assert!(!spec.has_documents());
        std::fs::write(dir.path().join("doc.xml"), "<a/>").unwrap();
        assert!(spec.has_documents());
    }

    #[test]
    fn with_root_only_touches_relative_paths() {
        let catalog = CorpusCatalog {
            corpora: vec![
                CorpusSpec::new("a", "rel/a", 1),
                CorpusSpec::new("b", "/abs/b", 2),
            ],
        }
        .with_root(Path::new("/data"));
        assert_eq!(catalog.corpora[0].path, PathBuf::from("/data/rel/a"));
        assert_eq!(catalog.corpora[1].path, PathBuf::from("/abs/b"));
    }

    #[test]
    fn load_rejects_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"{"corpora": []}"#).unwrap();
        assert!(CorpusCatalog::load(&path).is_err());
    }

    #[test]
    fn load_rejects_names_that_leave_the_sweep_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        for name in ["../escape", "a/b", "..", "", r"a\b"] {
            let catalog = serde_json::json!({
                "corpora": [{"name": name, "path": "x", "expected_chunks": 1}]
            });
            std::fs::write(&path, catalog.to_string()).unwrap();
            assert!(
                matches!(CorpusCatalog::load(&path), Err(SweepError::InvalidArgument(_))),
                "{name:?} accepted"
            );
        }

        let catalog = serde_json::json!({
            "corpora": [{"name": "corpus-1.5k_v2", "path": "x", "expected_chunks": 1}]
        });
        std::fs::write(&path, catalog.to_string()).unwrap();
        assert_eq!(CorpusCatalog::load(&path).unwrap().corpora[0].name, "corpus-1.5k_v2");
    }
}
