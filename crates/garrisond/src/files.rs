//! Sandboxed file browsing and editing inside server working directories

use garrison_core::{constants, resolve_within, ConfigStore, Error, Result};
use garrison_ipc::{Event, ItemKind};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Characters that can never appear in a created file or folder name
const INVALID_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

pub struct FileBrowser {
    store: Arc<ConfigStore>,
}

impl FileBrowser {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    fn resolve(&self, id: &str, path: &str) -> Result<PathBuf> {
        let def = self
            .store
            .get_server(id)
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))?;
        resolve_within(&def.working_directory, path)
    }

    /// List one directory, split into dirs and files, case-insensitively sorted
    pub fn list_files(&self, id: &str, path: &str) -> Result<Event> {
        let dir = self.resolve(id, path)?;

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }
        dirs.sort_by_key(|name| name.to_lowercase());
        files.sort_by_key(|name| name.to_lowercase());

        Ok(Event::FileList {
            id: id.to_string(),
            path: path.to_string(),
            dirs,
            files,
        })
    }

    /// Read a file; errors travel inside the event payload so the viewer
    /// can render them in place
    pub fn file_content(&self, id: &str, path: &str) -> Event {
        match self.read_content(id, path) {
            Ok(content) => Event::FileContent {
                path: path.to_string(),
                content: Some(content),
                error: None,
            },
            Err(e) => Event::FileContent {
                path: path.to_string(),
                content: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn read_content(&self, id: &str, path: &str) -> Result<String> {
        let file = self.resolve(id, path)?;
        let metadata = fs::metadata(&file)?;
        if metadata.len() > constants::MAX_EDITABLE_FILE_SIZE {
            return Err(Error::FileTooLarge(file));
        }
        // Game config files are not always clean UTF-8; replace rather
        // than refuse.
        Ok(String::from_utf8_lossy(&fs::read(&file)?).into_owned())
    }

    /// Overwrite a file with new content
    pub fn save_file_content(&self, id: &str, path: &str, content: &str) -> Result<String> {
        let file = self.resolve(id, path)?;
        fs::write(&file, content)?;
        info!("Saved file {} for {}", path, id);
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        Ok(name)
    }

    /// Create an empty file or a folder under `path`
    pub fn create_item(&self, id: &str, path: &str, kind: ItemKind, name: &str) -> Result<()> {
        if name.is_empty() || name.contains(INVALID_NAME_CHARS) {
            return Err(Error::ConfigError("Invalid name provided".to_string()));
        }

        let relative = if path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", path, name)
        };
        let target = self.resolve(id, &relative)?;
        if target.exists() {
            return Err(Error::ConfigError(
                "File or folder already exists".to_string(),
            ));
        }

        match kind {
            ItemKind::File => {
                fs::File::create(&target)?;
            }
            ItemKind::Folder => {
                fs::create_dir_all(&target)?;
            }
        }
        info!("Created {} '{}' for {}", kind.as_str(), relative, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_core::ServerDefinition;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileBrowser) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().to_path_buf()));
        store.ensure_defaults().unwrap();

        let work_dir = dir.path().join("srv");
        fs::create_dir_all(work_dir.join("saves")).unwrap();
        fs::write(work_dir.join("server.cfg"), "port=2456\n").unwrap();
        fs::write(work_dir.join("Banlist.txt"), "").unwrap();

        let def = ServerDefinition::new(
            "s1".to_string(),
            "One".to_string(),
            "sleep 30".to_string(),
            work_dir,
        )
        .unwrap();
        store.save_servers(&[def]).unwrap();

        (dir, FileBrowser::new(store))
    }

    #[test]
    fn test_list_splits_and_sorts() {
        let (_dir, browser) = setup();
        match browser.list_files("s1", "").unwrap() {
            Event::FileList { dirs, files, .. } => {
                assert_eq!(dirs, vec!["saves"]);
                // Case-insensitive ordering puts Banlist.txt first.
                assert_eq!(files, vec!["Banlist.txt", "server.cfg"]);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_list_unknown_server() {
        let (_dir, browser) = setup();
        assert!(matches!(
            browser.list_files("missing", ""),
            Err(Error::ServerNotFound(_))
        ));
    }

    #[test]
    fn test_list_denies_escape() {
        let (_dir, browser) = setup();
        assert!(matches!(
            browser.list_files("s1", "../.."),
            Err(Error::AccessDenied(_))
        ));
    }

    #[test]
    fn test_read_and_save_round_trip() {
        let (_dir, browser) = setup();

        match browser.file_content("s1", "server.cfg") {
            Event::FileContent { content, error, .. } => {
                assert_eq!(content.as_deref(), Some("port=2456\n"));
                assert!(error.is_none());
            }
            other => panic!("Unexpected event: {:?}", other),
        }

        let name = browser
            .save_file_content("s1", "server.cfg", "port=2457\n")
            .unwrap();
        assert_eq!(name, "server.cfg");

        match browser.file_content("s1", "server.cfg") {
            Event::FileContent { content, .. } => {
                assert_eq!(content.as_deref(), Some("port=2457\n"));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_read_traversal_error_is_in_payload() {
        let (_dir, browser) = setup();
        match browser.file_content("s1", "../../etc/passwd") {
            Event::FileContent { content, error, .. } => {
                assert!(content.is_none());
                assert!(error.unwrap().contains("Access denied"));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_file_is_refused() {
        let (dir, browser) = setup();
        let big = dir.path().join("srv").join("world.bin");
        let data = vec![0u8; (constants::MAX_EDITABLE_FILE_SIZE + 1) as usize];
        fs::write(&big, data).unwrap();

        match browser.file_content("s1", "world.bin") {
            Event::FileContent { content, error, .. } => {
                assert!(content.is_none());
                assert!(error.unwrap().contains("too large"));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_create_item_file_and_folder() {
        let (dir, browser) = setup();

        browser
            .create_item("s1", "saves", ItemKind::File, "notes.txt")
            .unwrap();
        assert!(dir.path().join("srv/saves/notes.txt").is_file());

        browser
            .create_item("s1", "", ItemKind::Folder, "mods")
            .unwrap();
        assert!(dir.path().join("srv/mods").is_dir());
    }

    #[test]
    fn test_create_item_rejects_bad_names() {
        let (_dir, browser) = setup();
        for name in ["", "a/b", "c:d", "pipe|name", "back\\slash"] {
            assert!(browser.create_item("s1", "", ItemKind::File, name).is_err());
        }
    }

    #[test]
    fn test_create_item_rejects_existing() {
        let (_dir, browser) = setup();
        assert!(browser
            .create_item("s1", "", ItemKind::File, "server.cfg")
            .is_err());
    }
}
