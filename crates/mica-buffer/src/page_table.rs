//! Page table mapping resident pages to their frames.

use crate::frame::FrameId;
use mica_common::page::PageNo;
use mica_common::{DbFile, MicaError, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Number of buckets for a pool of `num_frames` frames: roughly 1.2x the
/// pool size, rounded to an odd integer to spread chains.
fn bucket_count(num_frames: usize) -> usize {
    ((num_frames * 6 / 5) & !1) + 1
}

struct Entry<F> {
    file: F,
    page_no: PageNo,
    frame_no: FrameId,
}

/// Separate-chaining hash table from `(file, page number)` to frame id.
///
/// Sized once at construction for the pool it serves; a full pool of N
/// resident pages stays at O(1) expected per operation.
pub struct PageTable<F> {
    buckets: Vec<Vec<Entry<F>>>,
}

impl<F: DbFile> PageTable<F> {
    /// Creates a page table sized for `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        let buckets = (0..bucket_count(num_frames)).map(|_| Vec::new()).collect();
        Self { buckets }
    }

    fn bucket_of(&self, file: &F, page_no: PageNo) -> usize {
        let mut hasher = DefaultHasher::new();
        file.hash(&mut hasher);
        page_no.hash(&mut hasher);
        (hasher.finish() % self.buckets.len() as u64) as usize
    }

    /// Records a `(file, page_no) -> frame_no` mapping.
    ///
    /// Fails with [`MicaError::HashAlreadyPresent`] if the key is already
    /// mapped. The buffer manager never triggers this: it always removes a
    /// mapping before inserting one for the same key.
    pub fn insert(&mut self, file: F, page_no: PageNo, frame_no: FrameId) -> Result<()> {
        if self.get(&file, page_no).is_some() {
            return Err(MicaError::HashAlreadyPresent {
                file: file.filename(),
                page_no,
            });
        }

        let bucket = self.bucket_of(&file, page_no);
        self.buckets[bucket].push(Entry {
            file,
            page_no,
            frame_no,
        });
        Ok(())
    }

    /// Looks up the frame holding `(file, page_no)`, if resident.
    pub fn get(&self, file: &F, page_no: PageNo) -> Option<FrameId> {
        let bucket = self.bucket_of(file, page_no);
        self.buckets[bucket]
            .iter()
            .find(|e| e.page_no == page_no && &e.file == file)
            .map(|e| e.frame_no)
    }

    /// Removes the mapping for `(file, page_no)`.
    ///
    /// Fails with [`MicaError::HashNotFound`] when the key is absent.
    pub fn remove(&mut self, file: &F, page_no: PageNo) -> Result<FrameId> {
        let bucket = self.bucket_of(file, page_no);
        let chain = &mut self.buckets[bucket];

        match chain
            .iter()
            .position(|e| e.page_no == page_no && &e.file == file)
        {
            Some(pos) => Ok(chain.swap_remove(pos).frame_no),
            None => Err(MicaError::HashNotFound {
                file: file.filename(),
                page_no,
            }),
        }
    }

    /// Returns the number of mappings.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    /// Returns true if no page is mapped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemFile;

    #[test]
    fn test_bucket_count_is_odd() {
        for num_frames in [1, 2, 3, 10, 100, 1024, 4096] {
            let count = bucket_count(num_frames);
            assert_eq!(count % 2, 1, "bucket count for {} frames", num_frames);
        }
    }

    #[test]
    fn test_bucket_count_scales_with_pool() {
        assert_eq!(bucket_count(10), 13);
        assert_eq!(bucket_count(100), 121);
        assert!(bucket_count(1000) >= 1000);
    }

    #[test]
    fn test_insert_get_remove() {
        let file = MemFile::new("a.db");
        let mut table = PageTable::new(10);

        table.insert(file.clone(), PageNo(5), FrameId(2)).unwrap();
        assert_eq!(table.get(&file, PageNo(5)), Some(FrameId(2)));
        assert_eq!(table.len(), 1);

        let removed = table.remove(&file, PageNo(5)).unwrap();
        assert_eq!(removed, FrameId(2));
        assert_eq!(table.get(&file, PageNo(5)), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let file = MemFile::new("a.db");
        let mut table = PageTable::new(10);

        table.insert(file.clone(), PageNo(5), FrameId(2)).unwrap();
        let err = table.insert(file.clone(), PageNo(5), FrameId(3)).unwrap_err();

        assert!(matches!(err, MicaError::HashAlreadyPresent { .. }));
        // Original mapping untouched.
        assert_eq!(table.get(&file, PageNo(5)), Some(FrameId(2)));
    }

    #[test]
    fn test_remove_missing_fails() {
        let file = MemFile::new("a.db");
        let mut table: PageTable<MemFile> = PageTable::new(10);

        let err = table.remove(&file, PageNo(1)).unwrap_err();
        assert!(matches!(err, MicaError::HashNotFound { .. }));
    }

    #[test]
    fn test_same_page_no_in_distinct_files() {
        let file_a = MemFile::new("a.db");
        let file_b = MemFile::new("b.db");
        let mut table = PageTable::new(10);

        table.insert(file_a.clone(), PageNo(1), FrameId(0)).unwrap();
        table.insert(file_b.clone(), PageNo(1), FrameId(1)).unwrap();

        assert_eq!(table.get(&file_a, PageNo(1)), Some(FrameId(0)));
        assert_eq!(table.get(&file_b, PageNo(1)), Some(FrameId(1)));

        table.remove(&file_a, PageNo(1)).unwrap();
        assert_eq!(table.get(&file_a, PageNo(1)), None);
        assert_eq!(table.get(&file_b, PageNo(1)), Some(FrameId(1)));
    }

    #[test]
    fn test_full_pool_volume() {
        let file = MemFile::new("a.db");
        let num_frames = 128;
        let mut table = PageTable::new(num_frames);

        for i in 0..num_frames as u32 {
            table.insert(file.clone(), PageNo(i), FrameId(i)).unwrap();
        }
        assert_eq!(table.len(), num_frames);

        for i in 0..num_frames as u32 {
            assert_eq!(table.get(&file, PageNo(i)), Some(FrameId(i)));
        }

        for i in 0..num_frames as u32 {
            table.remove(&file, PageNo(i)).unwrap();
        }
        assert!(table.is_empty());
    }
}
