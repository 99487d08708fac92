//! Generic object header access: type checks and bytes payloads.

use crate::error::{InspectError, InspectResult};
use crate::layout::{LayoutCatalog, StructKind};
use crate::memory::MemoryAccess;
use crate::types::Address;

/// `Py_TPFLAGS_BYTES_SUBCLASS`
pub const TPFLAGS_BYTES_SUBCLASS: u64 = 1 << 27;

/// `Py_TPFLAGS_UNICODE_SUBCLASS`
pub const TPFLAGS_UNICODE_SUBCLASS: u64 = 1 << 28;

/// Reads object headers through a layout catalog.
pub struct ObjectReader<'a, M>
{
    memory: &'a M,
    catalog: &'a LayoutCatalog,
}

impl<'a, M: MemoryAccess> ObjectReader<'a, M>
{
    /// Create a reader.
    pub fn new(memory: &'a M, catalog: &'a LayoutCatalog) -> Self
    {
        Self { memory, catalog }
    }

    /// `Py_TYPE(object)`
    pub fn type_of(&self, object: Address) -> InspectResult<Address>
    {
        let ob_type = self.catalog.field(StructKind::Object, "ob_type")?;
        self.memory.read_pointer_field(object, ob_type)
    }

    /// `Py_TYPE(object)->tp_flags`
    pub fn type_flags(&self, object: Address) -> InspectResult<u64>
    {
        let type_object = self.type_of(object)?;
        if type_object.is_null() {
            return Err(InspectError::CorruptObject {
                address: object,
                reason: "null type pointer".into(),
            });
        }
        let tp_flags = self.catalog.field(StructKind::TypeObject, "tp_flags")?;
        self.memory.read_unsigned_field(type_object, tp_flags)
    }

    /// `PyUnicode_Check(object)`
    pub fn is_unicode(&self, object: Address) -> InspectResult<bool>
    {
        Ok(self.type_flags(object)? & TPFLAGS_UNICODE_SUBCLASS != 0)
    }

    /// `PyBytes_Check(object)`
    pub fn is_bytes(&self, object: Address) -> InspectResult<bool>
    {
        Ok(self.type_flags(object)? & TPFLAGS_BYTES_SUBCLASS != 0)
    }

    /// Payload of a bytes object (`ob_sval[0..ob_size]`).
    ///
    /// ## Errors
    ///
    /// `CorruptObject` when `ob_size` is negative or larger than `max_len`.
    pub fn bytes_contents(&self, object: Address, max_len: usize) -> InspectResult<Vec<u8>>
    {
        let layout = self.catalog.get(StructKind::Bytes)?;
        let size = self.memory.read_signed_field(object, layout.field("ob_size")?)?;
        let len = usize::try_from(size)
            .ok()
            .filter(|len| *len <= max_len)
            .ok_or_else(|| InspectError::CorruptObject {
                address: object,
                reason: format!("bytes length {size} out of range"),
            })?;
        let data = object + layout.field("ob_sval")?.offset;
        self.memory.read(data, len)
    }
}
