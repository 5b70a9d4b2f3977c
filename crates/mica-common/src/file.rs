//! File collaborator contract consumed by the buffer manager.

use crate::error::Result;
use crate::page::{Page, PageNo};
use std::hash::Hash;

/// Capability set of a paged file usable with the buffer manager.
///
/// A `DbFile` is a cheap handle: cloning it yields another handle onto the
/// same underlying file, and two handles compare equal iff they refer to the
/// same underlying file. The buffer manager keys its page table on the
/// handle, so equality and hashing must agree on file identity.
///
/// All operations take `&self`; implementations that need mutable state
/// (a file cursor, a page count) keep it behind interior mutability.
pub trait DbFile: Clone + PartialEq + Eq + Hash {
    /// Fetches an existing page.
    fn read_page(&self, page_no: PageNo) -> Result<Page>;

    /// Persists a page image; the page carries its own number.
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Reserves and returns a freshly numbered zero page.
    fn allocate_page(&self) -> Result<Page>;

    /// Releases a page number back to the file.
    fn delete_page(&self, page_no: PageNo) -> Result<()>;

    /// Name of the file, for diagnostics and error messages.
    fn filename(&self) -> String;
}
