use ahash::AHashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::page_store::PageStore;
use super::paged_file::PagedFile;
use super::PageId;

/// Handle to an open page store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(usize);

impl FileHandle {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.0)
    }
}

/// Manages open page stores and hands out stable handles for them
pub struct PagedFileManager {
    /// Map from file handles to open stores
    open_files: AHashMap<FileHandle, FileEntry>,
    /// Map from file paths to handles (for checking if already open)
    path_to_handle: AHashMap<PathBuf, FileHandle>,
    /// Next available file handle
    next_handle: usize,
    /// Maximum number of open files
    max_open_files: usize,
}

struct FileEntry {
    store: Box<dyn PageStore>,
    /// None for stores registered without a backing path
    path: Option<PathBuf>,
}

impl PagedFileManager {
    /// Create a new paged file manager
    pub fn new() -> Self {
        Self::with_max_files(128)
    }

    /// Create a new paged file manager with specified max open files
    pub fn with_max_files(max_open_files: usize) -> Self {
        Self {
            open_files: AHashMap::new(),
            path_to_handle: AHashMap::new(),
            next_handle: 0,
            max_open_files,
        }
    }

    /// Create a new, empty paged file on disk
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        PagedFile::create(path)?;
        Ok(())
    }

    /// Open an existing paged file
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<FileHandle> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        // Check if file is already open
        if let Some(&handle) = self.path_to_handle.get(&path) {
            return Ok(handle);
        }

        self.check_capacity()?;
        let store = PagedFile::open(&path)?;

        let handle = self.insert(Box::new(store), Some(path.clone()));
        self.path_to_handle.insert(path, handle);
        Ok(handle)
    }

    /// Register a store that has no path of its own (e.g. a `MemFile`)
    pub fn register(&mut self, store: Box<dyn PageStore>) -> FileResult<FileHandle> {
        self.check_capacity()?;
        Ok(self.insert(store, None))
    }

    /// Close a store; its handle becomes invalid
    pub fn close_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let mut entry = self
            .open_files
            .remove(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        if let Some(path) = &entry.path {
            self.path_to_handle.remove(path);
        }
        entry.store.sync()
    }

    /// Remove (delete) a file
    pub fn remove_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        // If file is open, close it first
        if let Ok(canonical_path) = path.canonicalize()
            && let Some(&handle) = self.path_to_handle.get(&canonical_path)
        {
            self.close_file(handle)?;
        }

        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Read a page from a store
    pub fn read_page(
        &mut self,
        handle: FileHandle,
        page_id: PageId,
        buffer: &mut [u8],
    ) -> FileResult<()> {
        self.store_mut(handle)?.read_page(page_id, buffer)
    }

    /// Write a page to a store
    pub fn write_page(
        &mut self,
        handle: FileHandle,
        page_id: PageId,
        buffer: &[u8],
    ) -> FileResult<()> {
        self.store_mut(handle)?.write_page(page_id, buffer)
    }

    /// Allocate a fresh page in a store
    pub fn allocate_page(&mut self, handle: FileHandle) -> FileResult<PageId> {
        self.store_mut(handle)?.allocate_page()
    }

    /// Return a page to its store
    pub fn dispose_page(&mut self, handle: FileHandle, page_id: PageId) -> FileResult<()> {
        self.store_mut(handle)?.dispose_page(page_id)
    }

    /// Get the number of pages a store spans
    pub fn page_count(&self, handle: FileHandle) -> FileResult<usize> {
        let entry = self
            .open_files
            .get(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;
        Ok(entry.store.page_count())
    }

    /// Sync a store to disk (flush all OS buffers)
    pub fn sync_file(&mut self, handle: FileHandle) -> FileResult<()> {
        self.store_mut(handle)?.sync()
    }

    /// Sync all open stores to disk
    pub fn sync_all(&mut self) -> FileResult<()> {
        for entry in self.open_files.values_mut() {
            entry.store.sync()?;
        }
        Ok(())
    }

    /// Check if a file is open
    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.open_files.contains_key(&handle)
    }

    /// Get the number of currently open files
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }

    fn check_capacity(&self) -> FileResult<()> {
        if self.open_files.len() >= self.max_open_files {
            return Err(FileError::TooManyOpenFiles);
        }
        Ok(())
    }

    fn insert(&mut self, store: Box<dyn PageStore>, path: Option<PathBuf>) -> FileHandle {
        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;
        self.open_files.insert(handle, FileEntry { store, path });
        handle
    }

    fn store_mut(&mut self, handle: FileHandle) -> FileResult<&mut dyn PageStore> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;
        Ok(entry.store.as_mut())
    }
}

impl Default for PagedFileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{MemFile, PAGE_SIZE};
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_create_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        assert!(manager.create_file(&test_file).is_ok());
        assert!(test_file.exists());
    }

    #[test]
    fn test_create_file_already_exists() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let result = manager.create_file(&test_file);
        assert!(matches!(result, Err(FileError::FileAlreadyExists(_))));
    }

    #[test]
    fn test_open_close_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();
        assert!(manager.is_file_open(handle));

        manager.close_file(handle).unwrap();
        assert!(!manager.is_file_open(handle));
        assert!(matches!(
            manager.close_file(handle),
            Err(FileError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_open_nonexistent_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("nonexistent.db");
        let mut manager = PagedFileManager::new();

        let result = manager.open_file(&test_file);
        assert!(matches!(result, Err(FileError::FileNotFound(_))));
    }

    #[test]
    fn test_open_same_file_twice() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle1 = manager.open_file(&test_file).unwrap();
        let handle2 = manager.open_file(&test_file).unwrap();

        assert_eq!(handle1, handle2);
        assert_eq!(manager.open_file_count(), 1);
    }

    #[test]
    fn test_read_write_through_handle() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();
        let page_id = manager.allocate_page(handle).unwrap();

        let mut write_buffer = vec![0u8; PAGE_SIZE];
        write_buffer[0] = 42;
        write_buffer[100] = 99;
        manager.write_page(handle, page_id, &write_buffer).unwrap();

        let mut read_buffer = vec![0u8; PAGE_SIZE];
        manager.read_page(handle, page_id, &mut read_buffer).unwrap();
        assert_eq!(read_buffer, write_buffer);
    }

    #[test]
    fn test_pages_persist_after_close() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();
        for page_id in 1..=10 {
            assert_eq!(manager.allocate_page(handle).unwrap(), page_id);
            let mut buffer = vec![0u8; PAGE_SIZE];
            buffer[0] = page_id as u8;
            manager.write_page(handle, page_id, &buffer).unwrap();
        }
        manager.close_file(handle).unwrap();

        let handle = manager.open_file(&test_file).unwrap();
        assert_eq!(manager.page_count(handle).unwrap(), 11);
        for page_id in 1..=10 {
            let mut buffer = vec![0u8; PAGE_SIZE];
            manager.read_page(handle, page_id, &mut buffer).unwrap();
            assert_eq!(buffer[0], page_id as u8);
        }
    }

    #[test]
    fn test_register_memory_store() {
        let mut manager = PagedFileManager::new();
        let h1 = manager.register(Box::new(MemFile::new())).unwrap();
        let h2 = manager.register(Box::new(MemFile::new())).unwrap();
        assert_ne!(h1, h2);

        let page_id = manager.allocate_page(h1).unwrap();
        manager.dispose_page(h1, page_id).unwrap();
        assert!(matches!(
            manager.dispose_page(h2, page_id),
            Err(FileError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_remove_open_file() {
        let temp_dir = setup_test_dir();
        let test_file = temp_dir.path().join("test.db");
        let mut manager = PagedFileManager::new();

        manager.create_file(&test_file).unwrap();
        let handle = manager.open_file(&test_file).unwrap();
        assert!(manager.is_file_open(handle));

        manager.remove_file(&test_file).unwrap();
        assert!(!test_file.exists());
        assert!(!manager.is_file_open(handle));
    }

    #[test]
    fn test_invalid_handle() {
        let mut manager = PagedFileManager::new();
        let mut buffer = vec![0u8; PAGE_SIZE];
        let result = manager.read_page(FileHandle(7), 1, &mut buffer);
        assert!(matches!(result, Err(FileError::InvalidHandle(7))));
    }

    #[test]
    fn test_max_open_files() {
        let temp_dir = setup_test_dir();
        let mut manager = PagedFileManager::with_max_files(2);

        let file1 = temp_dir.path().join("test1.db");
        let file2 = temp_dir.path().join("test2.db");

        manager.create_file(&file1).unwrap();
        manager.create_file(&file2).unwrap();

        manager.open_file(&file1).unwrap();
        manager.register(Box::new(MemFile::new())).unwrap();

        let result = manager.open_file(&file2);
        assert!(matches!(result, Err(FileError::TooManyOpenFiles)));
    }
}
