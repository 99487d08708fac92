//! # Thread-Local Lookup
//!
//! Reads a thread's TLS slot value out of its environment block.
//!
//! On Windows each thread's TEB carries 64 inline slots (`TlsSlots`) and a
//! pointer to a lazily allocated array of 1024 more (`TlsExpansionSlots`).
//! Slot indices below 64 index the inline array; indices up to `0x440` index
//! the expansion array; anything above is invalid.
//!
//! ## References
//!
//! - [TlsGetValue](https://learn.microsoft.com/en-us/windows/win32/api/processthreadsapi/nf-processthreadsapi-tlsgetvalue)

use tracing::trace;

use crate::error::{InspectError, InspectResult};
use crate::memory::MemoryAccess;
use crate::types::Address;

/// Number of slots stored inline in the TEB (`TLS_MINIMUM_AVAILABLE`).
pub const TLS_MINIMUM_AVAILABLE: u32 = 0x40;

/// Number of slots in the expansion array (`TLS_EXPANSION_SLOTS`).
pub const TLS_EXPANSION_SLOTS: u32 = 0x400;

/// First invalid slot index.
pub const TLS_MAXIMUM_SLOT: u32 = TLS_MINIMUM_AVAILABLE + TLS_EXPANSION_SLOTS;

/// Capability to read a pointer-sized TLS value for one thread.
pub trait ThreadLocalLookup
{
    /// Value stored in `slot` for the thread whose environment block is at
    /// `environment_block`. An unset slot reads as [`Address::ZERO`].
    ///
    /// ## Errors
    ///
    /// - `TlsSlotOutOfRange` for an index at or above the maximum
    /// - `UnreadableMemory` if the environment block cannot be read
    fn tls_value(&self, memory: &dyn MemoryAccess, environment_block: Address, slot: u32) -> InspectResult<Address>;
}

/// TEB-based lookup for Windows threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TebTls
{
    /// Offset of `TlsSlots` inside the TEB.
    pub slots_offset: u64,
    /// Offset of the `TlsExpansionSlots` pointer inside the TEB.
    pub expansion_offset: u64,
    /// Width of one slot.
    pub pointer_size: u8,
}

impl TebTls
{
    /// Layout of a 64-bit TEB.
    pub const TEB64: Self = Self {
        slots_offset: 0x1480,
        expansion_offset: 0x1780,
        pointer_size: 8,
    };

    /// Layout of a 32-bit TEB.
    pub const TEB32: Self = Self {
        slots_offset: 0xe10,
        expansion_offset: 0xf94,
        pointer_size: 4,
    };
}

impl Default for TebTls
{
    fn default() -> Self
    {
        Self::TEB64
    }
}

impl ThreadLocalLookup for TebTls
{
    fn tls_value(&self, memory: &dyn MemoryAccess, environment_block: Address, slot: u32) -> InspectResult<Address>
    {
        let width = u64::from(self.pointer_size);
        let value = if slot < TLS_MINIMUM_AVAILABLE {
            let entry = environment_block + self.slots_offset + u64::from(slot) * width;
            memory.read_unsigned(entry, self.pointer_size)?
        } else if slot >= TLS_MAXIMUM_SLOT {
            return Err(InspectError::TlsSlotOutOfRange(slot));
        } else {
            let expansion = memory.read_unsigned(environment_block + self.expansion_offset, self.pointer_size)?;
            if expansion == 0 {
                trace!(slot, "tls expansion array not allocated");
                return Ok(Address::ZERO);
            }
            let entry = Address::from(expansion) + u64::from(slot - TLS_MINIMUM_AVAILABLE) * width;
            memory.read_unsigned(entry, self.pointer_size)?
        };
        Ok(Address::from(value))
    }
}
