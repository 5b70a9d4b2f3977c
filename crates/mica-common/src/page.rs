//! Page structures for mica storage.

use serde::{Deserialize, Serialize};

/// Size of a disk page in bytes (8 KB).
pub const PAGE_SIZE: usize = 8192;

/// Number of a page within a single file (0-indexed).
///
/// Page numbers are assigned by the owning file and are unique within that
/// file but not across files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PageNo(pub u32);

impl PageNo {
    /// Sentinel for "no page".
    pub const INVALID: PageNo = PageNo(u32::MAX);

    /// Returns true if this is a usable page number.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for PageNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fixed-size page image carrying its own page number.
///
/// Pages are plain byte containers; interpretation of the contents belongs
/// to higher layers. A page is assignable by value, which is how images move
/// between frame buffers and file I/O.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    page_no: PageNo,
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Creates a zeroed page with the given number.
    pub fn new(page_no: PageNo) -> Self {
        Self {
            page_no,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Returns the page number.
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Renumbers the page. Used by files when handing out fresh pages.
    pub fn set_page_no(&mut self, page_no: PageNo) {
        self.page_no = page_no;
    }

    /// Returns the page contents.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Returns mutable access to the page contents.
    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_no", &self.page_no)
            .finish_non_exhaustive()
    }
}
