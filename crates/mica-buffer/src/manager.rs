//! Buffer manager facade.

use crate::frame::{FrameId, FrameTable};
use crate::page_table::PageTable;
use crate::replacer::ClockReplacer;
use log::{error, warn};
use mica_common::page::{Page, PageNo, PAGE_SIZE};
use mica_common::{DbFile, MicaError, Result};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Handle onto a pinned page.
///
/// The handle aliases the frame buffer it was served from; the address is
/// stable for the lifetime of the pool. It remains meaningful until the
/// owning pin is released and the frame is recycled, after which the handle
/// observes whatever page occupies the frame next. Holding a borrow from
/// [`read`](PageHandle::read) or [`write`](PageHandle::write) across a
/// manager call that recycles the frame is a logic error and panics at the
/// `RefCell` borrow.
pub struct PageHandle {
    frame_no: FrameId,
    page: Rc<RefCell<Page>>,
}

impl PageHandle {
    /// Returns the frame this handle addresses.
    pub fn frame_no(&self) -> FrameId {
        self.frame_no
    }

    /// Returns the page number of the resident page.
    pub fn page_no(&self) -> PageNo {
        self.page.borrow().page_no()
    }

    /// Borrows the page for reading.
    pub fn read(&self) -> Ref<'_, Page> {
        self.page.borrow()
    }

    /// Borrows the page for writing.
    ///
    /// Writing through the handle does not mark the frame dirty; the client
    /// declares dirtiness when it unpins.
    pub fn write(&self) -> RefMut<'_, Page> {
        self.page.borrow_mut()
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("frame_no", &self.frame_no)
            .field("page_no", &self.page_no())
            .finish()
    }
}

/// Buffer manager.
///
/// A fixed pool of page frames serving pages of any number of files:
/// - page table lookup on every request
/// - pin counting to protect in-use frames
/// - clock replacement with write-back of dirty victims
///
/// Single-threaded by design: operations take `&mut self` and are
/// linearized in call order. A concurrent deployment wraps the whole
/// manager in one external lock.
pub struct BufferManager<F: DbFile> {
    frames: FrameTable<F>,
    page_table: PageTable<F>,
    replacer: ClockReplacer,
}

impl<F: DbFile> BufferManager<F> {
    /// Creates a buffer manager with `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            frames: FrameTable::new(num_frames),
            page_table: PageTable::new(num_frames),
            replacer: ClockReplacer::new(num_frames),
        }
    }

    /// Creates a buffer manager sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames to ensure useful caching even on low-memory
    /// systems.
    pub fn auto_sized() -> Self {
        let mut sys = sysinfo::System::new_all();
        sys.refresh_memory();

        let target_bytes = sys.available_memory() as usize / 4;
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(num_frames)
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn handle(&self, frame_no: FrameId) -> PageHandle {
        PageHandle {
            frame_no,
            page: Rc::clone(self.frames.page(frame_no)),
        }
    }

    /// Pins `(file, page_no)` into the pool and returns a handle to it.
    ///
    /// On a hit the resident frame is re-pinned. On a miss a frame is freed
    /// by the replacer, the page is fetched from the file, and the mapping
    /// is recorded. A failed fetch leaves the frame empty and unindexed.
    pub fn read_page(&mut self, file: &F, page_no: PageNo) -> Result<PageHandle> {
        if let Some(frame_no) = self.page_table.get(file, page_no) {
            self.frames.desc_mut(frame_no).pin();
            return Ok(self.handle(frame_no));
        }

        let frame_no = self
            .replacer
            .allocate_frame(&mut self.frames, &mut self.page_table)?;
        let page = file.read_page(page_no)?;

        *self.frames.page(frame_no).borrow_mut() = page;
        self.frames.desc_mut(frame_no).set(file.clone(), page_no);
        self.page_table.insert(file.clone(), page_no, frame_no)?;

        Ok(self.handle(frame_no))
    }

    /// Allocates a fresh page in `file` and pins it into the pool.
    ///
    /// The disk page is allocated before the frame; if no frame can be
    /// freed, the page is already persisted by the file and stays reachable
    /// through a later [`read_page`](BufferManager::read_page).
    pub fn alloc_page(&mut self, file: &F) -> Result<(PageNo, PageHandle)> {
        let page = file.allocate_page()?;
        let page_no = page.page_no();

        let frame_no = self
            .replacer
            .allocate_frame(&mut self.frames, &mut self.page_table)?;

        *self.frames.page(frame_no).borrow_mut() = page;
        self.frames.desc_mut(frame_no).set(file.clone(), page_no);
        self.page_table.insert(file.clone(), page_no, frame_no)?;

        Ok((page_no, self.handle(frame_no)))
    }

    /// Releases one pin on `(file, page_no)`.
    ///
    /// `dirty = true` marks the frame dirty; the flag is sticky and a later
    /// `dirty = false` unpin never clears it. Unpinning a page that is not
    /// resident is tolerated with a warning.
    pub fn unpin_page(&mut self, file: &F, page_no: PageNo, dirty: bool) -> Result<()> {
        let Some(frame_no) = self.page_table.get(file, page_no) else {
            warn!(
                "unpin of non-resident page {} of {}",
                page_no,
                file.filename()
            );
            return Ok(());
        };

        let desc = self.frames.desc_mut(frame_no);
        if desc.pin_cnt() == 0 {
            return Err(MicaError::PageNotPinned {
                file: file.filename(),
                page_no,
            });
        }

        desc.unpin();
        if dirty {
            desc.set_dirty(true);
        }
        Ok(())
    }

    /// Writes back and releases every resident page of `file`.
    ///
    /// Frames are visited in increasing frame order. A pinned page aborts
    /// with [`MicaError::PagePinned`]; an invalid frame still attributed to
    /// the file aborts with [`MicaError::BadBuffer`]. The scan is not
    /// atomic: frames visited before a failure stay flushed and cleared.
    pub fn flush_file(&mut self, file: &F) -> Result<()> {
        for i in 0..self.frames.len() {
            let frame_no = FrameId(i as u32);
            let (valid, page_no, pinned, dirty) = {
                let desc = self.frames.desc(frame_no);
                if desc.file() != Some(file) {
                    continue;
                }
                (
                    desc.is_valid(),
                    desc.page_no(),
                    desc.pin_cnt() > 0,
                    desc.is_dirty(),
                )
            };

            if !valid {
                return Err(MicaError::BadBuffer {
                    file: file.filename(),
                    frame_no: frame_no.0,
                });
            }
            if pinned {
                return Err(MicaError::PagePinned {
                    file: file.filename(),
                    page_no,
                });
            }
            if dirty {
                let page = self.frames.page(frame_no).borrow();
                file.write_page(&page)?;
                drop(page);
                self.frames.desc_mut(frame_no).set_dirty(false);
            }

            self.page_table.remove(file, page_no)?;
            self.frames.desc_mut(frame_no).clear();
        }
        Ok(())
    }

    /// Drops `(file, page_no)` from the pool, then deletes it in the file.
    ///
    /// A page that is not resident is fine; the goal is only that the page
    /// is gone afterwards.
    pub fn dispose_page(&mut self, file: &F, page_no: PageNo) -> Result<()> {
        if let Some(frame_no) = self.page_table.get(file, page_no) {
            self.frames.desc_mut(frame_no).clear();
            self.page_table.remove(file, page_no)?;
        }
        file.delete_page(page_no)
    }

    /// Prints every frame descriptor and a count of valid frames.
    pub fn print_self(&self) {
        let mut valid_frames = 0;

        for i in 0..self.frames.len() {
            let desc = self.frames.desc(FrameId(i as u32));
            println!("{}", desc);
            if desc.is_valid() {
                valid_frames += 1;
            }
        }

        println!("total valid frames: {}", valid_frames);
    }
}

impl<F: DbFile> Drop for BufferManager<F> {
    /// Flushes all dirty resident pages, best effort.
    fn drop(&mut self) {
        for i in 0..self.frames.len() {
            let frame_no = FrameId(i as u32);
            let (file, page_no) = {
                let desc = self.frames.desc(frame_no);
                if !desc.is_valid() || !desc.is_dirty() {
                    continue;
                }
                match desc.file() {
                    Some(file) => (file.clone(), desc.page_no()),
                    None => continue,
                }
            };

            let written = {
                let page = self.frames.page(frame_no).borrow();
                file.write_page(&page)
            };
            match written {
                Ok(()) => self.frames.desc_mut(frame_no).set_dirty(false),
                Err(e) => error!(
                    "failed to write back page {} of {} during teardown: {}",
                    page_no,
                    file.filename(),
                    e
                ),
            }
        }
    }
}
