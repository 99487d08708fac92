//! # Memory Access
//!
//! The only path from an [`Address`] to bytes.
//!
//! Implementors provide [`MemoryAccess::read`]; the typed readers are
//! provided on top of it. Every read is all-or-nothing: either the whole span
//! is legible or `UnreadableMemory` comes back. Nothing is cached, so each
//! read reflects the target at the instant it was issued. Two reads of the
//! same field at different times may disagree if the target is running; the
//! caller is responsible for quiescing it.
//!
//! All multi-byte values are little-endian.

pub mod snapshot;

pub use snapshot::SnapshotMemory;

use crate::error::{InspectError, InspectResult};
use crate::layout::{Field, FieldKind};
use crate::types::Address;

/// Raw-memory-read capability of the inspected target.
pub trait MemoryAccess
{
    /// Read exactly `len` bytes at `address`.
    ///
    /// ## Errors
    ///
    /// `UnreadableMemory` if any byte of the span is not readable.
    fn read(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>;

    /// Read a little-endian unsigned integer of `size` bytes (1, 2, 4 or 8).
    fn read_unsigned(&self, address: Address, size: u8) -> InspectResult<u64>
    {
        check_width(size)?;
        let bytes = self.read(address, usize::from(size))?;
        if bytes.len() != usize::from(size) {
            return Err(InspectError::UnreadableMemory {
                address,
                len: usize::from(size),
            });
        }
        let mut buffer = [0u8; 8];
        buffer[..bytes.len()].copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(buffer))
    }

    /// Read a little-endian two's complement integer of `size` bytes.
    #[allow(clippy::cast_possible_wrap)]
    fn read_signed(&self, address: Address, size: u8) -> InspectResult<i64>
    {
        let raw = self.read_unsigned(address, size)?;
        let shift = 64 - u32::from(size) * 8;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Read one unsigned byte.
    fn read_u8(&self, address: Address) -> InspectResult<u8>
    {
        self.read(address, 1)?
            .first()
            .copied()
            .ok_or(InspectError::UnreadableMemory { address, len: 1 })
    }

    /// Read one signed byte.
    fn read_i8(&self, address: Address) -> InspectResult<i8>
    {
        Ok(i8::from_le_bytes([self.read_u8(address)?]))
    }

    /// Read a 32-bit unsigned value.
    #[allow(clippy::cast_possible_truncation)]
    fn read_u32(&self, address: Address) -> InspectResult<u32>
    {
        Ok(self.read_unsigned(address, 4)? as u32)
    }

    /// Read a 64-bit unsigned value.
    fn read_u64(&self, address: Address) -> InspectResult<u64>
    {
        self.read_unsigned(address, 8)
    }

    /// Read a 64-bit pointer.
    fn read_pointer(&self, address: Address) -> InspectResult<Address>
    {
        self.read_u64(address).map(Address::from)
    }

    /// Read an unsigned field of the struct at `base`.
    ///
    /// ## Errors
    ///
    /// `MismatchedLayout` if `field` is not an unsigned field.
    fn read_unsigned_field(&self, base: Address, field: Field) -> InspectResult<u64>
    {
        expect_kind(field, FieldKind::Unsigned)?;
        self.read_unsigned(base + field.offset, field.size)
    }

    /// Read a signed field of the struct at `base`.
    fn read_signed_field(&self, base: Address, field: Field) -> InspectResult<i64>
    {
        expect_kind(field, FieldKind::Signed)?;
        self.read_signed(base + field.offset, field.size)
    }

    /// Read a pointer field of the struct at `base`.
    fn read_pointer_field(&self, base: Address, field: Field) -> InspectResult<Address>
    {
        expect_kind(field, FieldKind::Pointer)?;
        self.read_unsigned(base + field.offset, field.size).map(Address::from)
    }
}

impl<M: MemoryAccess + ?Sized> MemoryAccess for &M
{
    fn read(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>
    {
        (**self).read(address, len)
    }
}

fn check_width(size: u8) -> InspectResult<()>
{
    match size {
        1 | 2 | 4 | 8 => Ok(()),
        other => Err(InspectError::InvalidArgument(format!("unsupported integer width {other}"))),
    }
}

fn expect_kind(field: Field, expected: FieldKind) -> InspectResult<()>
{
    if field.kind == expected {
        Ok(())
    } else {
        Err(InspectError::MismatchedLayout(format!(
            "field at offset {} is {}, read as {expected}",
            field.offset, field.kind
        )))
    }
}
