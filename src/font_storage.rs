use std::{collections::HashMap, path::PathBuf, sync::Arc};

/// Font lookup for banner rendering, backed by `fontdb` and `fontdue`.
///
/// `fontdb` knows every available face; `fontdue` fonts are only parsed when
/// a face is first requested and then kept for later measurement and
/// rasterization.
pub struct FontStorage {
    font_db: fontdb::Database,
    loaded_font: HashMap<fontdb::ID, Arc<fontdue::Font>, fxhash::FxBuildHasher>,
}

impl Default for FontStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FontStorage {
    /// Creates an empty storage. No system fonts are loaded.
    pub fn new() -> Self {
        Self {
            font_db: fontdb::Database::new(),
            loaded_font: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
        }
    }
}

/// Loading
impl FontStorage {
    /// Loads a font from in-memory data.
    pub fn load_font_binary(&mut self, data: impl Into<Vec<u8>>) {
        self.font_db.load_font_data(data.into());
    }

    /// Loads a font file. Fails if the file cannot be read.
    pub fn load_font_file(&mut self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_db.load_font_file(path)
    }

    /// Loads every font found in `dir`, recursively.
    pub fn load_fonts_dir(&mut self, dir: PathBuf) {
        self.font_db.load_fonts_dir(dir)
    }

    /// Loads the fonts installed on the system.
    pub fn load_system_fonts(&mut self) {
        self.font_db.load_system_fonts();
    }

    /// Sets which family the generic "monospace" family resolves to.
    ///
    /// Fonts already handed out stay valid; callers should re-measure glyphs
    /// after switching.
    pub fn set_monospace_family(&mut self, family: impl Into<String>) {
        self.font_db.set_monospace_family(family);
    }

    /// `true` if no face has been loaded.
    pub fn is_empty(&self) -> bool {
        self.font_db.is_empty()
    }

    /// Number of loaded faces.
    pub fn len(&self) -> usize {
        self.font_db.len()
    }
}

/// Get `Font`
impl FontStorage {
    /// Queries for a font matching the description.
    pub fn query(&mut self, query: &fontdb::Query) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        let id = self.font_db.query(query)?;
        self.font(id).map(|font| (id, font))
    }

    /// Regular-weight face of the monospace family.
    pub fn monospace(&mut self) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        self.query(&fontdb::Query {
            families: &[fontdb::Family::Monospace],
            ..fontdb::Query::default()
        })
    }

    /// Retrieves a loaded font by ID, parsing it on first use.
    pub fn font(&mut self, id: fontdb::ID) -> Option<Arc<fontdue::Font>> {
        use std::collections::hash_map::Entry;

        match self.loaded_font.entry(id) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let font_result = self.font_db.with_face_data(id, |data, index| {
                    fontdue::Font::from_bytes(
                        data,
                        fontdue::FontSettings {
                            collection_index: index,
                            ..Default::default()
                        },
                    )
                })?;

                match font_result {
                    Ok(font) => Some(Arc::clone(entry.insert(Arc::new(font)))),
                    Err(e) => {
                        log::error!("Failed to load font (id: {:?}): {}", id, e);
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_storage_finds_nothing() {
        let mut storage = FontStorage::new();
        assert!(storage.is_empty());
        assert_eq!(storage.len(), 0);
        assert!(storage.monospace().is_none());
    }

    #[test]
    fn invalid_binary_is_ignored() {
        let mut storage = FontStorage::default();
        storage.load_font_binary(vec![0u8; 16]);
        assert!(storage.monospace().is_none());
    }

    #[test]
    fn missing_file_is_reported() {
        let mut storage = FontStorage::new();
        let path = PathBuf::from("/nonexistent/noren/missing.ttf");
        assert!(storage.load_font_file(path).is_err());
    }
}
