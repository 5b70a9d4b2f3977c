//! In-memory file mock for unit tests.

use mica_common::page::{Page, PageNo};
use mica_common::{DbFile, MicaError, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// One collaborator call observed by a [`MemFile`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read(PageNo),
    Write(PageNo),
    Allocate(PageNo),
    Delete(PageNo),
}

struct MemInner {
    name: String,
    pages: BTreeMap<PageNo, Page>,
    next_page_no: u32,
    ops: Vec<FileOp>,
}

/// An in-memory [`DbFile`] that journals every call made against it.
///
/// Clones share the same underlying file; equality and hashing follow that
/// identity, not the name.
#[derive(Clone)]
pub struct MemFile(Rc<RefCell<MemInner>>);

impl MemFile {
    pub fn new(name: &str) -> Self {
        Self(Rc::new(RefCell::new(MemInner {
            name: name.to_string(),
            pages: BTreeMap::new(),
            next_page_no: 0,
            ops: Vec::new(),
        })))
    }

    /// Creates a file preloaded with `count` zeroed pages numbered from 0.
    pub fn with_pages(name: &str, count: u32) -> Self {
        let file = Self::new(name);
        {
            let mut inner = file.0.borrow_mut();
            for i in 0..count {
                inner.pages.insert(PageNo(i), Page::new(PageNo(i)));
            }
            inner.next_page_no = count;
        }
        file
    }

    /// Returns the journal of calls made so far.
    pub fn ops(&self) -> Vec<FileOp> {
        self.0.borrow().ops.clone()
    }

    /// Returns the stored image of a page, if present.
    pub fn page(&self, page_no: PageNo) -> Option<Page> {
        self.0.borrow().pages.get(&page_no).cloned()
    }

    /// Counts journal entries matching `op`.
    pub fn count_of(&self, op: FileOp) -> usize {
        self.0.borrow().ops.iter().filter(|&&o| o == op).count()
    }
}

impl std::fmt::Debug for MemFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemFile({})", self.0.borrow().name)
    }
}

impl PartialEq for MemFile {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MemFile {}

impl Hash for MemFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl DbFile for MemFile {
    fn read_page(&self, page_no: PageNo) -> Result<Page> {
        let mut inner = self.0.borrow_mut();
        inner.ops.push(FileOp::Read(page_no));
        inner
            .pages
            .get(&page_no)
            .cloned()
            .ok_or_else(|| MicaError::PageNotFound {
                file: inner.name.clone(),
                page_no,
            })
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        inner.ops.push(FileOp::Write(page.page_no()));
        inner.pages.insert(page.page_no(), page.clone());
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page> {
        let mut inner = self.0.borrow_mut();
        let page_no = PageNo(inner.next_page_no);
        inner.next_page_no += 1;
        inner.ops.push(FileOp::Allocate(page_no));
        let page = Page::new(page_no);
        inner.pages.insert(page_no, page.clone());
        Ok(page)
    }

    fn delete_page(&self, page_no: PageNo) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        inner.ops.push(FileOp::Delete(page_no));
        inner.pages.remove(&page_no);
        Ok(())
    }

    fn filename(&self) -> String {
        self.0.borrow().name.clone()
    }
}
