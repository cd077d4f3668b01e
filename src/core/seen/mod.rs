use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SeenStoreError {
    #[error("seen file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("seen file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted set of already-announced episode identifiers, grouped by show
/// name. The file only ever grows: identifiers are added, never removed.
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    shows: BTreeMap<String, Vec<String>>,
    dirty: bool,
}

impl SeenStore {
    /// Loads the store from disk. A missing file is an empty store; a file
    /// that exists but fails to parse is a hard error, since replacing it
    /// would re-announce the entire backlog.
    pub fn load(path: &Path) -> Result<Self, SeenStoreError> {
        let shows = match std::fs::read(path) {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            shows,
            dirty: false,
        })
    }

    pub fn contains(&self, show: &str, id: &str) -> bool {
        self.shows
            .get(show)
            .is_some_and(|ids| ids.iter().any(|known| known == id))
    }

    /// Records an identifier. Returns false if it was already present.
    pub fn insert(&mut self, show: &str, id: &str) -> bool {
        if self.contains(show, id) {
            return false;
        }
        self.shows
            .entry(show.to_string())
            .or_default()
            .push(id.to_string());
        self.dirty = true;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn total_ids(&self) -> usize {
        self.shows.values().map(Vec::len).sum()
    }

    /// Writes the store atomically: a sibling temp file is written first,
    /// then renamed over the target.
    pub fn save(&self) -> Result<(), SeenStoreError> {
        let serialized = serde_json::to_vec_pretty(&self.shows)?;
        let mut temp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "seen_episodes.json".into());
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);
        std::fs::write(&temp_path, serialized)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
