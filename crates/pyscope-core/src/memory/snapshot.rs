//! In-memory image of target address space.
//!
//! A `SnapshotMemory` is a set of non-overlapping regions captured from a
//! target (or built by hand in tests). Reads never straddle regions; a span
//! that is not fully inside one region is unreadable, exactly as it would be
//! if the gap were unmapped in a live process.

use std::collections::BTreeMap;

use super::MemoryAccess;
use crate::error::{InspectError, InspectResult};
use crate::types::Address;

/// Sparse, region-based memory image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotMemory
{
    regions: BTreeMap<u64, Vec<u8>>,
}

impl SnapshotMemory
{
    /// Create an empty image.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Map `bytes` at `base`.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the region is empty, wraps the address space, or
    /// overlaps a region already mapped.
    pub fn add_region(&mut self, base: Address, bytes: Vec<u8>) -> InspectResult<()>
    {
        let start = base.value();
        let end = region_end(start, bytes.len())
            .filter(|end| *end > start)
            .ok_or_else(|| InspectError::InvalidArgument(format!("invalid region of {} bytes at {base}", bytes.len())))?;

        if let Some((prev_start, prev)) = self.regions.range(..end).next_back() {
            let prev_end = region_end(*prev_start, prev.len()).unwrap_or(u64::MAX);
            if prev_end > start {
                return Err(InspectError::InvalidArgument(format!(
                    "region at {base} overlaps region at {}",
                    Address::from(*prev_start)
                )));
            }
        }

        self.regions.insert(start, bytes);
        Ok(())
    }

    /// Overwrite bytes inside an existing region.
    ///
    /// ## Errors
    ///
    /// `UnreadableMemory` if the span is not inside a single mapped region.
    pub fn write(&mut self, address: Address, bytes: &[u8]) -> InspectResult<()>
    {
        let (start, region) = self
            .regions
            .range_mut(..=address.value())
            .next_back()
            .ok_or(InspectError::UnreadableMemory {
                address,
                len: bytes.len(),
            })?;
        let offset = span_in_region(*start, region.len(), address, bytes.len())?;
        region[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Iterate mapped regions as `(base, bytes)`, lowest address first.
    pub fn regions(&self) -> impl Iterator<Item = (Address, &[u8])>
    {
        self.regions
            .iter()
            .map(|(start, bytes)| (Address::from(*start), bytes.as_slice()))
    }

    /// Total number of mapped bytes.
    pub fn mapped_len(&self) -> usize
    {
        self.regions.values().map(Vec::len).sum()
    }
}

impl MemoryAccess for SnapshotMemory
{
    fn read(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>
    {
        if len == 0 {
            return Ok(Vec::new());
        }
        let (start, region) = self
            .regions
            .range(..=address.value())
            .next_back()
            .ok_or(InspectError::UnreadableMemory { address, len })?;
        let offset = span_in_region(*start, region.len(), address, len)?;
        Ok(region[offset..offset + len].to_vec())
    }
}

fn region_end(start: u64, len: usize) -> Option<u64>
{
    start.checked_add(u64::try_from(len).ok()?)
}

fn span_in_region(start: u64, region_len: usize, address: Address, len: usize) -> InspectResult<usize>
{
    let unreadable = InspectError::UnreadableMemory { address, len };
    let offset = usize::try_from(address.value() - start).map_err(|_| unreadable.clone())?;
    match offset.checked_add(len) {
        Some(end) if end <= region_len => Ok(offset),
        _ => Err(unreadable),
    }
}
