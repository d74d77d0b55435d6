//! Data overlays (loaded data sources) and the loaders producing them.

use crate::clock::ClockRange;
use crate::czml::{CzmlDocument, CzmlError, Entity};
use crate::types::OverlayId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Component, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot resolve {0:?}")]
    NotFound(String),
    #[error(transparent)]
    Czml(#[from] CzmlError),
    #[error("loader for {0:?} stopped without a result")]
    Aborted(String),
}

/// A unit of loaded trajectory data added to a session for rendering.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub name: String,
    /// The path or URL the overlay was loaded from.
    pub source: String,
    pub entities: Vec<Entity>,
    pub clock: Option<ClockRange>,
}

impl Overlay {
    pub fn from_document(source: &str, doc: CzmlDocument) -> Self {
        Self {
            name: doc.name.unwrap_or_else(|| source.to_string()),
            source: source.to_string(),
            entities: doc.entities,
            clock: doc.clock,
        }
    }

    /// Union of the availability of every sampled entity.
    pub fn availability(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.entities
            .iter()
            .filter_map(|e| e.position.as_ref()?.availability())
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
    }

    /// The clock a viewer tracking this overlay should adopt: the document
    /// clock if present, otherwise one spanning the overlay's availability.
    pub fn tracking_clock(&self) -> Option<ClockRange> {
        if let Some(c) = self.clock {
            return Some(c);
        }
        let (start, stop) = self.availability()?;
        Some(ClockRange {
            start,
            stop,
            current: start,
            multiplier: 1.0,
        })
    }

    /// Finds an entity by id or displayed name, case-insensitively.
    pub fn find_entity(&self, query: &str) -> Option<&Entity> {
        let q = query.trim();
        self.entities
            .iter()
            .find(|e| e.id.eq_ignore_ascii_case(q) || e.display_name().eq_ignore_ascii_case(q))
    }
}

/// The session's overlays, in the order they finished loading.
///
/// Adding never deduplicates: loading the same source twice yields two
/// overlays.
#[derive(Debug, Default)]
pub struct OverlayCollection {
    overlays: Vec<Overlay>,
}

impl OverlayCollection {
    pub fn add(&mut self, overlay: Overlay) -> OverlayId {
        self.overlays.push(overlay);
        self.overlays.len() - 1
    }

    pub fn get(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.get(id)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter()
    }

    /// Total number of entities across all overlays.
    pub fn entity_count(&self) -> usize {
        self.overlays.iter().map(|o| o.entities.len()).sum()
    }
}

/// Fetches and parses a data resource into an [`Overlay`].
///
/// Loaders run on background threads, so they must be shareable.
pub trait DataLoader: Send + Sync {
    fn load(&self, source: &str) -> Result<Overlay, LoadError>;
}

/// Loads CZML files from disk, resolving relative paths against `base`.
///
/// `base` plays the role of the hosting page's directory, so sources such as
/// `../czml_data/simple.czml` resolve to a sibling of it. `..` is resolved
/// lexically and `base` itself need not exist.
#[derive(Clone, Debug)]
pub struct FileLoader {
    pub base: PathBuf,
}

impl FileLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve(&self, source: &str) -> PathBuf {
        let mut out = PathBuf::new();
        for component in self.base.join(source).components() {
            match component {
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir => {}
                other => out.push(other),
            }
        }
        out
    }
}

impl DataLoader for FileLoader {
    fn load(&self, source: &str) -> Result<Overlay, LoadError> {
        let path = self.resolve(source);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(source.to_string())
            } else {
                LoadError::Io { path: path.clone(), source: e }
            }
        })?;
        let doc = CzmlDocument::parse(&text)?;
        Ok(Overlay::from_document(source, doc))
    }
}

/// Serves CZML documents held in memory, keyed by source string.
///
/// Sources that were never inserted fail with [`LoadError::NotFound`].
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn with_document(mut self, source: &str, czml: &str) -> Self {
        self.documents.insert(source.to_string(), czml.to_string());
        self
    }
}

impl DataLoader for MemoryLoader {
    fn load(&self, source: &str) -> Result<Overlay, LoadError> {
        let text = self
            .documents
            .get(source)
            .ok_or_else(|| LoadError::NotFound(source.to_string()))?;
        let doc = CzmlDocument::parse(text)?;
        Ok(Overlay::from_document(source, doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DOC: &str = r#"[
        {"id": "document", "name": "Two sats"},
        {"id": "a", "label": {"text": "Alpha"}, "position": {
            "epoch": "2024-01-01T00:00:00Z", "cartesian": [0, 1, 0, 0, 60, 2, 0, 0]}},
        {"id": "b", "position": {
            "epoch": "2024-01-01T00:00:30Z", "cartesian": [0, 1, 0, 0, 60, 2, 0, 0]}}
    ]"#;

    fn overlay() -> Overlay {
        Overlay::from_document("mem.czml", CzmlDocument::parse(DOC).unwrap())
    }

    #[test]
    fn collection_keeps_duplicates() {
        let mut overlays = OverlayCollection::default();
        assert!(overlays.is_empty());

        let first = overlays.add(overlay());
        let second = overlays.add(overlay());

        assert_eq!((first, second), (0, 1));
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays.entity_count(), 4);
        assert_eq!(overlays.get(1).unwrap().name, "Two sats");
    }

    #[test]
    fn tracking_clock_spans_all_entities() {
        let o = overlay();
        let clock = o.tracking_clock().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(clock.start, t0);
        assert_eq!(clock.stop, t0 + chrono::TimeDelta::seconds(90));
        assert_eq!(clock.current, t0);
    }

    #[test]
    fn find_entity_matches_id_or_label() {
        let o = overlay();
        assert_eq!(o.find_entity("alpha").unwrap().id, "a");
        assert_eq!(o.find_entity(" B ").unwrap().id, "b");
        assert!(o.find_entity("gamma").is_none());
    }

    #[test]
    fn file_loader_reads_relative_paths() {
        let dir = std::env::temp_dir().join(format!("sat-core-loader-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("czml_data")).unwrap();
        std::fs::write(dir.join("czml_data/simple.czml"), DOC).unwrap();

        let loader = FileLoader::new(dir.join("web"));
        assert_eq!(
            loader.resolve("../czml_data/./simple.czml"),
            dir.join("czml_data/simple.czml")
        );
        let o = loader.load("../czml_data/simple.czml").unwrap();
        assert_eq!(o.entities.len(), 2);
        assert_eq!(o.source, "../czml_data/simple.czml");

        let err = loader.load("../czml_data/missing.czml").unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn memory_loader_serves_inserted_documents_only() {
        let loader = MemoryLoader::default().with_document("a.czml", DOC);
        assert_eq!(loader.load("a.czml").unwrap().entities.len(), 2);
        assert!(matches!(loader.load("b.czml"), Err(LoadError::NotFound(_))));

        let broken = MemoryLoader::default().with_document("bad.czml", "{not json");
        assert!(matches!(broken.load("bad.czml"), Err(LoadError::Czml(_))));
    }
}
