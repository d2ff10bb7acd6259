use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::error::{FileError, FileResult};
use super::page_store::{PageStore, check_page_size};
use super::{PAGE_SIZE, PageId};

/// Magic bytes at the start of the header page
const MAGIC: &[u8; 8] = b"BUFPOOL1";

/// Page 0 holds the header; user pages start at 1
const HEADER_PAGE: PageId = 0;

/// Terminator of the on-disk free list (the header page can never be free)
const NO_PAGE: u64 = 0;

/// Length of the free-list link stored at the start of a disposed page
const LINK_SIZE: usize = 8;

/// A persistent page file on disk
///
/// Layout:
/// - page 0: `magic (8) | page_count (u64) | first_free (u64)`
/// - page 1..: user pages; a disposed page carries the next free page number
///   in its first 8 bytes
pub struct PagedFile {
    file: File,
    /// Pages spanned by the file, header included
    page_count: usize,
    /// Free list in LIFO order, head last
    free_pages: Vec<PageId>,
}

impl PagedFile {
    /// Create a new, empty paged file
    pub fn create<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(PAGE_SIZE as u64)?;

        let mut paged = Self {
            file,
            page_count: 1,
            free_pages: Vec::new(),
        };
        paged.write_header()?;
        Ok(paged)
    }

    /// Open an existing paged file and rebuild its free list
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => FileError::FileNotFound(path.display().to_string()),
                _ => FileError::Io(e),
            })?;

        let mut header = [0u8; 24];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header).map_err(|_| {
            FileError::Corrupted(format!("{}: missing header page", path.display()))
        })?;

        if &header[0..8] != MAGIC {
            return Err(FileError::Corrupted(format!(
                "{}: bad magic",
                path.display()
            )));
        }

        let raw_count = read_u64(&header[8..16]);
        let first_free = read_u64(&header[16..24]);

        let file_len = file.metadata()?.len();
        let span = usize::try_from(raw_count)
            .ok()
            .and_then(|count| count.checked_mul(PAGE_SIZE))
            .and_then(|bytes| u64::try_from(bytes).ok());
        let page_count = match span {
            Some(bytes) if raw_count != 0 && bytes <= file_len => raw_count as usize,
            _ => {
                return Err(FileError::Corrupted(format!(
                    "{}: page count {} does not fit file length {}",
                    path.display(),
                    raw_count,
                    file_len
                )));
            }
        };

        let mut paged = Self {
            file,
            page_count,
            free_pages: Vec::new(),
        };

        // Walk the chain from the head; a chain longer than the file is a cycle
        let mut chain = Vec::new();
        let mut next = first_free;
        while next != NO_PAGE {
            let page_id = next as PageId;
            if page_id >= page_count || chain.len() >= page_count {
                return Err(FileError::Corrupted(format!(
                    "{}: broken free list at page {}",
                    path.display(),
                    page_id
                )));
            }
            chain.push(page_id);
            next = paged.read_link(page_id)?;
        }
        chain.reverse();
        paged.free_pages = chain;

        Ok(paged)
    }

    /// Number of pages currently on the free list
    pub fn free_page_count(&self) -> usize {
        self.free_pages.len()
    }

    fn offset(page_id: PageId) -> u64 {
        (page_id * PAGE_SIZE) as u64
    }

    fn check_range(&self, page_id: PageId) -> FileResult<()> {
        if page_id == HEADER_PAGE || page_id >= self.page_count {
            return Err(FileError::PageNotFound(page_id));
        }
        Ok(())
    }

    /// A page on the free list is not addressable until it is allocated again
    fn check_allocated(&self, page_id: PageId) -> FileResult<()> {
        self.check_range(page_id)?;
        if self.free_pages.contains(&page_id) {
            return Err(FileError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn write_header(&mut self) -> FileResult<()> {
        let head = self.free_pages.last().map_or(NO_PAGE, |&p| p as u64);

        let mut header = [0u8; 24];
        header[0..8].copy_from_slice(MAGIC);
        header[8..16].copy_from_slice(&(self.page_count as u64).to_le_bytes());
        header[16..24].copy_from_slice(&head.to_le_bytes());

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        Ok(())
    }

    fn read_link(&mut self, page_id: PageId) -> FileResult<u64> {
        let mut link = [0u8; LINK_SIZE];
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.read_exact(&mut link)?;
        Ok(read_u64(&link))
    }

    fn write_link(&mut self, page_id: PageId, next: u64) -> FileResult<()> {
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(&next.to_le_bytes())?;
        Ok(())
    }
}

impl PageStore for PagedFile {
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        check_page_size(buffer.len())?;
        self.check_allocated(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.read_exact(buffer)?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        check_page_size(buffer.len())?;
        self.check_allocated(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(buffer)?;
        // Note: Don't sync on every write - sync() is called on flush
        Ok(())
    }

    fn allocate_page(&mut self) -> FileResult<PageId> {
        if let Some(page_id) = self.free_pages.pop() {
            // Wipe the free-list link along with any old content
            let zeros = vec![0u8; PAGE_SIZE];
            self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
            self.file.write_all(&zeros)?;
            self.write_header()?;
            return Ok(page_id);
        }

        let page_id = self.page_count;
        self.file.set_len(Self::offset(page_id) + PAGE_SIZE as u64)?;
        self.page_count += 1;
        self.write_header()?;
        Ok(page_id)
    }

    fn dispose_page(&mut self, page_id: PageId) -> FileResult<()> {
        self.check_range(page_id)?;
        if self.free_pages.contains(&page_id) {
            return Err(FileError::PageAlreadyFree(page_id));
        }

        let head = self.free_pages.last().map_or(NO_PAGE, |&p| p as u64);
        self.write_link(page_id, head)?;
        self.free_pages.push(page_id);
        self.write_header()
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn sync(&mut self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_create_and_open_empty() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("test.db");

        let file = PagedFile::create(&path).unwrap();
        assert_eq!(file.page_count(), 1);
        drop(file);

        let file = PagedFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 1);
        assert_eq!(file.free_page_count(), 0);
    }

    #[test]
    fn test_create_existing_file() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("test.db");

        PagedFile::create(&path).unwrap();
        let result = PagedFile::create(&path);
        assert!(matches!(result, Err(FileError::FileAlreadyExists(_))));
    }

    #[test]
    fn test_open_nonexistent_file() {
        let temp_dir = setup_test_dir();
        let result = PagedFile::open(temp_dir.path().join("missing.db"));
        assert!(matches!(result, Err(FileError::FileNotFound(_))));
    }

    #[test]
    fn test_open_bad_magic() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("garbage.db");
        std::fs::write(&path, vec![7u8; PAGE_SIZE]).unwrap();

        let result = PagedFile::open(&path);
        assert!(matches!(result, Err(FileError::Corrupted(_))));
    }

    #[test]
    fn test_open_oversized_page_count() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("test.db");
        PagedFile::create(&path).unwrap();

        let mut raw = OpenOptions::new().write(true).open(&path).unwrap();
        raw.seek(SeekFrom::Start(8)).unwrap();
        raw.write_all(&(u64::MAX / 4).to_le_bytes()).unwrap();
        drop(raw);

        let result = PagedFile::open(&path);
        assert!(matches!(result, Err(FileError::Corrupted(_))));
    }

    #[test]
    fn test_allocate_starts_after_header() {
        let temp_dir = setup_test_dir();
        let mut file = PagedFile::create(temp_dir.path().join("test.db")).unwrap();

        assert_eq!(file.allocate_page().unwrap(), 1);
        assert_eq!(file.allocate_page().unwrap(), 2);
        assert_eq!(file.page_count(), 3);
    }

    #[test]
    fn test_read_write_page() {
        let temp_dir = setup_test_dir();
        let mut file = PagedFile::create(temp_dir.path().join("test.db")).unwrap();
        let page_id = file.allocate_page().unwrap();

        let mut write_buffer = vec![0u8; PAGE_SIZE];
        write_buffer[0] = 42;
        write_buffer[PAGE_SIZE - 1] = 255;
        file.write_page(page_id, &write_buffer).unwrap();

        let mut read_buffer = vec![0u8; PAGE_SIZE];
        file.read_page(page_id, &mut read_buffer).unwrap();
        assert_eq!(read_buffer, write_buffer);
    }

    #[test]
    fn test_header_and_out_of_range_pages_rejected() {
        let temp_dir = setup_test_dir();
        let mut file = PagedFile::create(temp_dir.path().join("test.db")).unwrap();
        file.allocate_page().unwrap();

        let mut buffer = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            file.read_page(0, &mut buffer),
            Err(FileError::PageNotFound(0))
        ));
        assert!(matches!(
            file.write_page(5, &buffer),
            Err(FileError::PageNotFound(5))
        ));
    }

    #[test]
    fn test_dispose_reuses_lifo_and_zeroes() {
        let temp_dir = setup_test_dir();
        let mut file = PagedFile::create(temp_dir.path().join("test.db")).unwrap();
        let p1 = file.allocate_page().unwrap();
        let p2 = file.allocate_page().unwrap();

        let mut buffer = vec![0u8; PAGE_SIZE];
        buffer[100] = 9;
        file.write_page(p1, &buffer).unwrap();

        file.dispose_page(p2).unwrap();
        file.dispose_page(p1).unwrap();
        assert_eq!(file.free_page_count(), 2);

        assert_eq!(file.allocate_page().unwrap(), p1);
        assert_eq!(file.allocate_page().unwrap(), p2);
        assert_eq!(file.page_count(), 3);

        file.read_page(p1, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_double_dispose() {
        let temp_dir = setup_test_dir();
        let mut file = PagedFile::create(temp_dir.path().join("test.db")).unwrap();
        let page_id = file.allocate_page().unwrap();

        file.dispose_page(page_id).unwrap();
        let result = file.dispose_page(page_id);
        assert!(matches!(result, Err(FileError::PageAlreadyFree(1))));
    }

    #[test]
    fn test_disposed_page_not_addressable() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("test.db");

        {
            let mut file = PagedFile::create(&path).unwrap();
            let a = file.allocate_page().unwrap();
            let b = file.allocate_page().unwrap();
            file.dispose_page(a).unwrap();

            let mut buffer = vec![0xAB; PAGE_SIZE];
            assert!(matches!(
                file.write_page(a, &buffer),
                Err(FileError::PageNotFound(1))
            ));
            assert!(matches!(
                file.read_page(a, &mut buffer),
                Err(FileError::PageNotFound(1))
            ));
            file.write_page(b, &buffer).unwrap();
            file.sync().unwrap();
        }

        // The rejected write must not have clobbered the free-list link
        let mut file = PagedFile::open(&path).unwrap();
        assert_eq!(file.free_page_count(), 1);
        assert_eq!(file.allocate_page().unwrap(), 1);
        assert_eq!(file.allocate_page().unwrap(), 3);
    }

    #[test]
    fn test_free_list_survives_reopen() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("test.db");

        {
            let mut file = PagedFile::create(&path).unwrap();
            for _ in 0..4 {
                file.allocate_page().unwrap();
            }
            file.dispose_page(2).unwrap();
            file.dispose_page(4).unwrap();
            file.sync().unwrap();
        }

        let mut file = PagedFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 5);
        assert_eq!(file.free_page_count(), 2);
        assert_eq!(file.allocate_page().unwrap(), 4);
        assert_eq!(file.allocate_page().unwrap(), 2);
        assert_eq!(file.allocate_page().unwrap(), 5);
    }

    #[test]
    fn test_invalid_buffer_size() {
        let temp_dir = setup_test_dir();
        let mut file = PagedFile::create(temp_dir.path().join("test.db")).unwrap();
        let page_id = file.allocate_page().unwrap();

        let mut small_buffer = vec![0u8; PAGE_SIZE - 1];
        let result = file.read_page(page_id, &mut small_buffer);
        assert!(matches!(result, Err(FileError::InvalidPageSize { .. })));

        let large_buffer = vec![0u8; PAGE_SIZE + 1];
        let result = file.write_page(page_id, &large_buffer);
        assert!(matches!(result, Err(FileError::InvalidPageSize { .. })));
    }
}
