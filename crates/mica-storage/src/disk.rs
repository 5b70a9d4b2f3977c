//! Disk-backed page file.

use log::debug;
use mica_common::page::{Page, PageNo, PAGE_SIZE};
use mica_common::{DbFile, MicaError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct DiskFileState {
    file: File,
    /// Number of pages in the file, including freed ones.
    num_pages: u32,
    /// Page numbers released by delete_page, reused by allocate_page.
    /// Kept in memory only; a reopened handle starts with an empty list.
    free_pages: Vec<PageNo>,
}

struct DiskFileInner {
    path: PathBuf,
    fsync_enabled: bool,
    state: Mutex<DiskFileState>,
}

/// Handle onto an on-disk page file.
///
/// Cloning is cheap and yields another handle onto the same open file.
/// Equality and hashing go by path, so handles opened separately on the
/// same path identify the same underlying file (they do keep independent
/// cursors and page counts; share clones of one handle within a process).
#[derive(Clone)]
pub struct DiskFile {
    inner: Arc<DiskFileInner>,
}

impl DiskFile {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>, fsync_enabled: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        debug!("created page file {}", path.display());
        Ok(Self::from_parts(path, file, 0, fsync_enabled))
    }

    /// Opens the file at `path`, creating it if missing.
    ///
    /// The page count is derived from the file length.
    pub fn open(path: impl AsRef<Path>, fsync_enabled: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        debug!("opened page file {} ({} pages)", path.display(), num_pages);
        Ok(Self::from_parts(path, file, num_pages, fsync_enabled))
    }

    fn from_parts(path: PathBuf, file: File, num_pages: u32, fsync_enabled: bool) -> Self {
        Self {
            inner: Arc::new(DiskFileInner {
                path,
                fsync_enabled,
                state: Mutex::new(DiskFileState {
                    file,
                    num_pages,
                    free_pages: Vec::new(),
                }),
            }),
        }
    }

    /// Returns the path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the number of pages in the file, including freed ones.
    pub fn num_pages(&self) -> u32 {
        self.inner.state.lock().num_pages
    }

    fn offset_of(page_no: PageNo) -> u64 {
        (page_no.0 as u64) * (PAGE_SIZE as u64)
    }

    fn write_at(&self, state: &mut DiskFileState, page_no: PageNo, data: &[u8]) -> Result<()> {
        state.file.seek(SeekFrom::Start(Self::offset_of(page_no)))?;
        state.file.write_all(data)?;
        if self.inner.fsync_enabled {
            state.file.sync_all()?;
        }
        Ok(())
    }
}

impl PartialEq for DiskFile {
    fn eq(&self, other: &Self) -> bool {
        self.inner.path == other.inner.path
    }
}

impl Eq for DiskFile {}

impl Hash for DiskFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.path.hash(state);
    }
}

impl std::fmt::Debug for DiskFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskFile")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl DbFile for DiskFile {
    fn read_page(&self, page_no: PageNo) -> Result<Page> {
        let mut state = self.inner.state.lock();

        if page_no.0 >= state.num_pages {
            return Err(MicaError::PageNotFound {
                file: self.filename(),
                page_no,
            });
        }

        state.file.seek(SeekFrom::Start(Self::offset_of(page_no)))?;
        let mut page = Page::new(page_no);
        state.file.read_exact(page.data_mut())?;

        Ok(page)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let mut state = self.inner.state.lock();
        let page_no = page.page_no();

        self.write_at(&mut state, page_no, page.data())?;

        // Writing past the end extends the file.
        if page_no.0 >= state.num_pages {
            state.num_pages = page_no.0 + 1;
        }
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page> {
        let mut state = self.inner.state.lock();

        if let Some(page_no) = state.free_pages.pop() {
            // Freed pages were zeroed when released.
            return Ok(Page::new(page_no));
        }

        let page_no = PageNo(state.num_pages);
        self.write_at(&mut state, page_no, &[0u8; PAGE_SIZE])?;
        state.num_pages = page_no.0 + 1;

        Ok(Page::new(page_no))
    }

    fn delete_page(&self, page_no: PageNo) -> Result<()> {
        let mut state = self.inner.state.lock();

        if page_no.0 >= state.num_pages {
            return Err(MicaError::PageNotFound {
                file: self.filename(),
                page_no,
            });
        }

        // Repeated deletion is a no-op.
        if state.free_pages.contains(&page_no) {
            return Ok(());
        }

        self.write_at(&mut state, page_no, &[0u8; PAGE_SIZE])?;
        state.free_pages.push(page_no);
        Ok(())
    }

    fn filename(&self) -> String {
        self.inner.path.display().to_string()
    }
}
