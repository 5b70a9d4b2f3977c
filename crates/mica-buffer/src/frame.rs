//! Frame descriptors and the frame table.

use mica_common::page::{Page, PageNo};
use mica_common::DbFile;
use std::cell::RefCell;
use std::rc::Rc;

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Returns the frame id as a table index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// Per-frame metadata.
///
/// A descriptor tracks which page occupies its frame, how many clients hold
/// a pin on it, whether the in-memory image diverges from disk, and the
/// reference bit consumed by the clock scan. The only transitions into and
/// out of residency are [`set`](FrameDesc::set) and
/// [`clear`](FrameDesc::clear), which keeps the pin/dirty invariants local
/// to this type.
pub struct FrameDesc<F> {
    /// This frame's own id. Fixed at construction.
    frame_no: FrameId,
    /// The file occupying this frame; dropped when the frame is cleared.
    file: Option<F>,
    /// Page number occupying this frame, meaningful only while valid.
    page_no: PageNo,
    /// Count of outstanding pins.
    pin_cnt: u32,
    /// True iff the in-memory page differs from disk.
    dirty: bool,
    /// Clock reference bit, set on every access.
    refbit: bool,
    /// True iff the frame holds a resident page.
    valid: bool,
}

impl<F: DbFile> FrameDesc<F> {
    fn new(frame_no: FrameId) -> Self {
        Self {
            frame_no,
            file: None,
            page_no: PageNo::INVALID,
            pin_cnt: 0,
            dirty: false,
            refbit: false,
            valid: false,
        }
    }

    /// Marks the frame occupied by `(file, page_no)` with a single pin.
    ///
    /// Called only on an empty or just-cleared frame.
    pub fn set(&mut self, file: F, page_no: PageNo) {
        self.file = Some(file);
        self.page_no = page_no;
        self.pin_cnt = 1;
        self.dirty = false;
        self.refbit = true;
        self.valid = true;
    }

    /// Restores the frame to the empty state.
    pub fn clear(&mut self) {
        self.file = None;
        self.page_no = PageNo::INVALID;
        self.pin_cnt = 0;
        self.dirty = false;
        self.refbit = false;
        self.valid = false;
    }

    /// Returns this frame's id.
    pub fn frame_no(&self) -> FrameId {
        self.frame_no
    }

    /// Returns the occupying file handle, if any.
    pub fn file(&self) -> Option<&F> {
        self.file.as_ref()
    }

    /// Returns the occupying page number.
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Returns the current pin count.
    pub fn pin_cnt(&self) -> u32 {
        self.pin_cnt
    }

    /// Returns true if the frame holds a resident page.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns true if the in-memory page diverges from disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the clock reference bit.
    pub fn refbit(&self) -> bool {
        self.refbit
    }

    /// Records an access: one more pin, reference bit set.
    pub fn pin(&mut self) {
        self.pin_cnt += 1;
        self.refbit = true;
    }

    /// Drops one pin. Underflow is clamped at zero.
    pub fn unpin(&mut self) {
        self.pin_cnt = self.pin_cnt.saturating_sub(1);
    }

    /// Sets or clears the dirty bit.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Clears the reference bit during a clock scan.
    pub fn clear_refbit(&mut self) {
        self.refbit = false;
    }

    /// Test hook: corrupts the valid flag without touching the rest of the
    /// descriptor, to exercise invariant-violation reporting.
    #[cfg(test)]
    pub(crate) fn force_invalidate(&mut self) {
        self.valid = false;
    }
}

impl<F: DbFile> std::fmt::Display for FrameDesc<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "{} file={} page={} pin={} dirty={} ref={}",
                self.frame_no,
                file.filename(),
                self.page_no,
                self.pin_cnt,
                self.dirty,
                self.refbit
            ),
            None => write!(f, "{} [free]", self.frame_no),
        }
    }
}

/// Fixed array of frame descriptors paired with the parallel page buffers.
///
/// The descriptor at index `i` always has `frame_no == i`. Each page buffer
/// is an `Rc<RefCell<Page>>` so that handed-out page handles keep a stable
/// address for as long as the pool lives, independent of borrows on the
/// table itself.
pub struct FrameTable<F> {
    descs: Vec<FrameDesc<F>>,
    pages: Vec<Rc<RefCell<Page>>>,
}

impl<F: DbFile> FrameTable<F> {
    /// Creates a table of `num_frames` empty frames.
    pub fn new(num_frames: usize) -> Self {
        let descs = (0..num_frames)
            .map(|i| FrameDesc::new(FrameId(i as u32)))
            .collect();
        let pages = (0..num_frames)
            .map(|_| Rc::new(RefCell::new(Page::new(PageNo::INVALID))))
            .collect();

        Self { descs, pages }
    }

    /// Returns the number of frames.
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    /// Returns true if the table has no frames.
    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Returns the descriptor for a frame.
    pub fn desc(&self, frame_no: FrameId) -> &FrameDesc<F> {
        &self.descs[frame_no.index()]
    }

    /// Returns mutable access to the descriptor for a frame.
    pub fn desc_mut(&mut self, frame_no: FrameId) -> &mut FrameDesc<F> {
        &mut self.descs[frame_no.index()]
    }

    /// Returns the page buffer for a frame.
    pub fn page(&self, frame_no: FrameId) -> &Rc<RefCell<Page>> {
        &self.pages[frame_no.index()]
    }
}
