//! Clock replacement policy for the buffer pool.

use crate::frame::{FrameId, FrameTable};
use crate::page_table::PageTable;
use log::debug;
use mica_common::{DbFile, MicaError, Result};

/// Clock (second-chance) victim selection over the frame table.
///
/// The hand starts on the last frame so the first advance lands on frame 0.
/// Frames are inspected in strictly increasing `(hand + k) mod N` order,
/// which makes victim choice deterministic for a given descriptor state.
pub struct ClockReplacer {
    hand: usize,
    num_frames: usize,
}

impl ClockReplacer {
    /// Creates a replacer for a pool of `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        assert!(num_frames > 0, "buffer pool needs at least one frame");
        Self {
            hand: num_frames - 1,
            num_frames,
        }
    }

    fn advance(&mut self) {
        self.hand = (self.hand + 1) % self.num_frames;
    }

    fn hand(&self) -> FrameId {
        FrameId(self.hand as u32)
    }

    /// Produces a frame the caller may load a page into.
    ///
    /// The returned frame is either already empty or has been evicted: a
    /// dirty victim is written back through its file, its page table entry
    /// is removed, and its descriptor is cleared.
    ///
    /// A frame whose reference bit is set gets a second chance: the bit is
    /// cleared and the scan moves on. Pinned frames are never evicted; once
    /// every frame has been seen as a pinned non-candidate the scan gives up
    /// with [`MicaError::BufferExceeded`]. Reference bits are only ever set
    /// by accesses outside this call, so each frame costs at most one extra
    /// pass and the scan finishes within 2N advances.
    pub fn allocate_frame<F: DbFile>(
        &mut self,
        frames: &mut FrameTable<F>,
        table: &mut PageTable<F>,
    ) -> Result<FrameId> {
        let mut scanned = 0;

        loop {
            self.advance();
            let victim = self.hand();
            let desc = frames.desc(victim);

            if !desc.is_valid() {
                return Ok(victim);
            }
            if desc.refbit() {
                frames.desc_mut(victim).clear_refbit();
                continue;
            }
            if desc.pin_cnt() > 0 {
                scanned += 1;
                if scanned >= self.num_frames {
                    return Err(MicaError::BufferExceeded);
                }
                continue;
            }

            self.evict(victim, frames, table)?;
            return Ok(victim);
        }
    }

    fn evict<F: DbFile>(
        &self,
        victim: FrameId,
        frames: &mut FrameTable<F>,
        table: &mut PageTable<F>,
    ) -> Result<()> {
        let desc = frames.desc(victim);
        let Some(file) = desc.file().cloned() else {
            return Ok(());
        };
        let page_no = desc.page_no();

        if desc.is_dirty() {
            debug!(
                "writing back page {} of {} from {}",
                page_no,
                file.filename(),
                victim
            );
            let page = frames.page(victim).borrow();
            file.write_page(&page)?;
            drop(page);
            frames.desc_mut(victim).set_dirty(false);
        }

        table.remove(&file, page_no)?;
        frames.desc_mut(victim).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FileOp, MemFile};
    use mica_common::page::PageNo;

    struct Harness {
        frames: FrameTable<MemFile>,
        table: PageTable<MemFile>,
        replacer: ClockReplacer,
    }

    impl Harness {
        fn new(num_frames: usize) -> Self {
            Self {
                frames: FrameTable::new(num_frames),
                table: PageTable::new(num_frames),
                replacer: ClockReplacer::new(num_frames),
            }
        }

        /// Makes `(file, page_no)` resident in `frame_no` with pin dropped,
        /// the way the buffer manager leaves a page after read + unpin.
        fn load_unpinned(&mut self, frame_no: FrameId, file: &MemFile, page_no: PageNo) {
            self.frames.desc_mut(frame_no).set(file.clone(), page_no);
            self.frames.desc_mut(frame_no).unpin();
            self.table.insert(file.clone(), page_no, frame_no).unwrap();
        }

        fn allocate(&mut self) -> Result<FrameId> {
            self.replacer
                .allocate_frame(&mut self.frames, &mut self.table)
        }
    }

    #[test]
    fn test_first_allocation_lands_on_frame_zero() {
        let mut h = Harness::new(3);
        assert_eq!(h.allocate().unwrap(), FrameId(0));
    }

    #[test]
    fn test_empty_frames_returned_in_ring_order() {
        let mut h = Harness::new(3);
        // No caller ever marks the frames occupied, so the hand keeps
        // handing out the next empty frame around the ring.
        assert_eq!(h.allocate().unwrap(), FrameId(0));
        assert_eq!(h.allocate().unwrap(), FrameId(1));
        assert_eq!(h.allocate().unwrap(), FrameId(2));
        assert_eq!(h.allocate().unwrap(), FrameId(0));
    }

    #[test]
    fn test_refbit_grants_second_chance() {
        let file = MemFile::new("a.db");
        let mut h = Harness::new(2);
        h.load_unpinned(FrameId(0), &file, PageNo(1));
        h.load_unpinned(FrameId(1), &file, PageNo(2));

        // Both refbits are set from set(); the first pass clears them and
        // the wrap-around picks frame 0.
        let victim = h.allocate().unwrap();
        assert_eq!(victim, FrameId(0));
        assert!(!h.frames.desc(FrameId(0)).is_valid());
        assert_eq!(h.table.get(&file, PageNo(1)), None);

        // Frame 1 survived with its refbit cleared.
        assert!(h.frames.desc(FrameId(1)).is_valid());
        assert!(!h.frames.desc(FrameId(1)).refbit());
    }

    #[test]
    fn test_pinned_frames_are_skipped() {
        let file = MemFile::new("a.db");
        let mut h = Harness::new(2);
        h.load_unpinned(FrameId(0), &file, PageNo(1));
        h.frames.desc_mut(FrameId(0)).pin();
        h.load_unpinned(FrameId(1), &file, PageNo(2));

        let victim = h.allocate().unwrap();
        assert_eq!(victim, FrameId(1));
        assert!(h.frames.desc(FrameId(0)).is_valid());
    }

    #[test]
    fn test_all_pinned_exceeds_buffer() {
        let file = MemFile::new("a.db");
        let mut h = Harness::new(3);
        for i in 0..3 {
            h.frames
                .desc_mut(FrameId(i))
                .set(file.clone(), PageNo(i));
            h.table
                .insert(file.clone(), PageNo(i), FrameId(i))
                .unwrap();
        }

        let err = h.allocate().unwrap_err();
        assert!(matches!(err, MicaError::BufferExceeded));

        // Nothing was evicted.
        for i in 0..3 {
            assert!(h.frames.desc(FrameId(i)).is_valid());
        }
        assert_eq!(h.table.len(), 3);
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let file = MemFile::with_pages("a.db", 1);
        let mut h = Harness::new(1);
        h.load_unpinned(FrameId(0), &file, PageNo(0));
        h.frames.desc_mut(FrameId(0)).clear_refbit();
        h.frames.desc_mut(FrameId(0)).set_dirty(true);
        {
            let page = h.frames.page(FrameId(0));
            let mut page = page.borrow_mut();
            page.set_page_no(PageNo(0));
            page.data_mut()[0] = 0x5A;
        }

        let victim = h.allocate().unwrap();
        assert_eq!(victim, FrameId(0));

        assert_eq!(file.count_of(FileOp::Write(PageNo(0))), 1);
        assert_eq!(file.page(PageNo(0)).unwrap().data()[0], 0x5A);
        assert!(h.table.is_empty());
        assert!(!h.frames.desc(FrameId(0)).is_valid());
    }

    #[test]
    fn test_clean_victim_skips_disk() {
        let file = MemFile::with_pages("a.db", 1);
        let mut h = Harness::new(1);
        h.load_unpinned(FrameId(0), &file, PageNo(0));
        h.frames.desc_mut(FrameId(0)).clear_refbit();

        h.allocate().unwrap();
        assert_eq!(file.count_of(FileOp::Write(PageNo(0))), 0);
    }

    #[test]
    #[should_panic(expected = "at least one frame")]
    fn test_zero_frames_rejected() {
        ClockReplacer::new(0);
    }
}
