use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::Source;
use crate::error::Result;
use crate::pipeline::ingestion::read_utf8;

#[derive(Debug, Deserialize)]
struct SourceRow {
    id: u32,
    name: String,
    #[serde(default)]
    file_path: String,
}

/// Read-only lookup of source documents, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<u32, Source>,
}

impl SourceRegistry {
    /// Load `id,name,file_path` rows from a CSV file. Malformed rows are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_utf8(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut sources = HashMap::new();
        for (line, row) in reader.deserialize::<SourceRow>().enumerate() {
            match row {
                Ok(row) => {
                    if sources.contains_key(&row.id) {
                        warn!(id = row.id, "duplicate source id in registry; keeping first");
                        continue;
                    }
                    sources.insert(
                        row.id,
                        Source {
                            id: row.id,
                            name: row.name,
                            file_path: PathBuf::from(row.file_path),
                        },
                    );
                }
                Err(e) => warn!(line = line + 2, error = %e, "skipping malformed registry row"),
            }
        }

        info!(path = %path.display(), sources = sources.len(), "loaded source registry");
        Ok(Self { sources })
    }

    pub fn from_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&Source> {
        self.sources.get(&id)
    }

    /// The registered source, or a placeholder named after the id
    pub fn resolve(&self, id: u32) -> Source {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| Source::unregistered(id))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_registry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "id,name,file_path\n1, Stanford AI Index ,reports/ai_index_2024.pdf\n2,McKinsey State of AI,\nx,broken,row\n"
        )
        .unwrap();

        let registry = SourceRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(1).unwrap().name, "Stanford AI Index");
        assert_eq!(
            registry.get(1).unwrap().file_path,
            PathBuf::from("reports/ai_index_2024.pdf")
        );
        assert_eq!(registry.resolve(9).name, "source_9");
    }
}
