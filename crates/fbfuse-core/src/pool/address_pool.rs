use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::PoolError;
use crate::model::AddressRange;

/// A contiguous block handed out by [`AddressRangeAllocator`].
///
/// The block is only a receipt: it must be given back with
/// [`AddressRangeAllocator::release`] for the addresses to be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressBlock {
    offset: u32,
    range: AddressRange,
}

impl AddressBlock {
    pub fn range(&self) -> AddressRange {
        self.range
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.range, f)
    }
}

/// First-fit allocator over one master multicast range.
#[derive(Debug)]
pub struct AddressRangeAllocator {
    master: AddressRange,
    /// Issued blocks keyed by offset into `master`, value is the length.
    issued: BTreeMap<u32, u32>,
}

impl AddressRangeAllocator {
    pub fn new(master: AddressRange) -> Self {
        Self {
            master,
            issued: BTreeMap::new(),
        }
    }

    pub fn master(&self) -> AddressRange {
        self.master
    }

    /// Reserve `count` contiguous addresses at the lowest free offset.
    pub fn allocate(&mut self, count: u32) -> Result<AddressBlock, PoolError> {
        let exhausted = || PoolError::AddressExhausted {
            requested: count,
            range: self.master.to_string(),
        };
        if count == 0 {
            return Err(exhausted());
        }

        let mut cursor = 0_u32;
        let mut found = None;
        for (&offset, &len) in &self.issued {
            if offset - cursor >= count {
                found = Some(cursor);
                break;
            }
            cursor = offset + len;
        }
        let offset = match found {
            Some(offset) => offset,
            None if self.master.count() - cursor >= count => cursor,
            None => return Err(exhausted()),
        };

        let range = self.master.sub_range(offset, count).map_err(|_| exhausted())?;
        self.issued.insert(offset, count);
        debug!(block = %range, "allocated multicast addresses");
        Ok(AddressBlock { offset, range })
    }

    /// Give a block back.
    pub fn release(&mut self, block: &AddressBlock) -> Result<(), PoolError> {
        match self.issued.get(&block.offset) {
            Some(&len) if len == block.range.count() => {
                self.issued.remove(&block.offset);
                debug!(block = %block, "released multicast addresses");
                Ok(())
            }
            _ => Err(PoolError::UnknownBlock {
                block: block.to_string(),
            }),
        }
    }

    /// Trade `old` blocks for new ones of the given sizes.
    ///
    /// The old blocks are returned first so their addresses can be reused.
    /// All or nothing: on failure the old blocks are issued again and no new
    /// block is kept.
    pub fn replace(
        &mut self,
        old: &[AddressBlock],
        counts: &[u32],
    ) -> Result<Vec<AddressBlock>, PoolError> {
        if let Some(unknown) = old
            .iter()
            .find(|b| self.issued.get(&b.offset) != Some(&b.range.count()))
        {
            return Err(PoolError::UnknownBlock {
                block: unknown.to_string(),
            });
        }
        for block in old {
            self.issued.remove(&block.offset);
        }

        let mut fresh = Vec::with_capacity(counts.len());
        for &count in counts {
            match self.allocate(count) {
                Ok(block) => fresh.push(block),
                Err(e) => {
                    for block in &fresh {
                        self.issued.remove(&block.offset);
                    }
                    for block in old {
                        self.issued.insert(block.offset, block.range.count());
                    }
                    return Err(e);
                }
            }
        }
        debug!(released = old.len(), allocated = fresh.len(), "replaced multicast blocks");
        Ok(fresh)
    }

    pub fn free_count(&self) -> u32 {
        self.master.count() - self.issued.values().sum::<u32>()
    }

    /// Currently issued ranges, lowest address first.
    pub fn issued(&self) -> Vec<AddressRange> {
        self.issued
            .iter()
            .filter_map(|(&offset, &len)| self.master.sub_range(offset, len).ok())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn allocator(count: u32) -> AddressRangeAllocator {
        let master = format!("spead://239.11.1.0+{}:7147", count - 1);
        AddressRangeAllocator::new(master.parse().unwrap())
    }

    #[test]
    fn first_fit_from_lowest_address() {
        let mut pool = allocator(256);
        let a = pool.allocate(1).unwrap();
        let b = pool.allocate(17).unwrap();
        assert_eq!(a.range().to_string(), "spead://239.11.1.0:7147");
        assert_eq!(b.range().to_string(), "spead://239.11.1.1+16:7147");
        assert_eq!(pool.free_count(), 256 - 18);
    }

    #[test]
    fn released_gap_is_reused() {
        let mut pool = allocator(16);
        let a = pool.allocate(4).unwrap();
        let _b = pool.allocate(4).unwrap();
        pool.release(&a).unwrap();
        let c = pool.allocate(2).unwrap();
        assert_eq!(c.range().base(), a.range().base());
    }

    #[test]
    fn issued_blocks_never_overlap() {
        let mut pool = allocator(32);
        let blocks: Vec<_> = (1..=5).map(|n| pool.allocate(n).unwrap()).collect();
        for (i, x) in blocks.iter().enumerate() {
            assert!(pool.master().contains(&x.range()));
            for y in &blocks[i + 1..] {
                assert!(!x.range().overlaps(&y.range()));
            }
        }
    }

    #[test]
    fn exhaustion_when_no_block_fits() {
        let mut pool = allocator(8);
        pool.allocate(3).unwrap();
        let mid = pool.allocate(2).unwrap();
        pool.allocate(3).unwrap();
        pool.release(&mid).unwrap();
        assert!(matches!(
            pool.allocate(3),
            Err(PoolError::AddressExhausted { requested: 3, .. })
        ));
        assert!(pool.allocate(2).is_ok());
    }

    #[test]
    fn double_release_is_rejected() {
        let mut pool = allocator(8);
        let a = pool.allocate(2).unwrap();
        pool.release(&a).unwrap();
        assert!(matches!(pool.release(&a), Err(PoolError::UnknownBlock { .. })));
    }

    #[test]
    fn zero_sized_request_is_rejected() {
        let mut pool = allocator(8);
        assert!(pool.allocate(0).is_err());
    }

    #[test]
    fn replace_reuses_the_released_block() {
        let mut pool = allocator(8);
        let _incoherent = pool.allocate(1).unwrap();
        let coherent = pool.allocate(6).unwrap();
        // Only one address is free, yet seven fit once the old block is back.
        let fresh = pool.replace(&[coherent], &[7]).unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].range().count(), 7);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn failed_replace_restores_old_blocks() {
        let mut pool = allocator(8);
        let a = pool.allocate(2).unwrap();
        let b = pool.allocate(2).unwrap();
        assert!(matches!(
            pool.replace(&[a], &[1, 9]),
            Err(PoolError::AddressExhausted { requested: 9, .. })
        ));
        assert_eq!(pool.free_count(), 4);
        pool.release(&a).unwrap();
        pool.release(&b).unwrap();
        assert_eq!(pool.free_count(), 8);
    }

    #[test]
    fn replace_rejects_foreign_blocks() {
        let mut pool = allocator(8);
        let a = pool.allocate(2).unwrap();
        pool.release(&a).unwrap();
        assert!(matches!(pool.replace(&[a], &[1]), Err(PoolError::UnknownBlock { .. })));
        assert_eq!(pool.free_count(), 8);
    }
}
