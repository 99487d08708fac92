//! # Unicode String Reader
//!
//! Decodes a target `str` object into a Rust `String`.
//!
//! From 3.3 through 3.11 a string object takes one of three physical shapes,
//! selected by bits of the `state` word in its `PyASCIIObject` header:
//!
//! | Shape              | Flags                        | Character data |
//! |--------------------|------------------------------|----------------|
//! | compact ASCII      | `compact = 1`, `ascii = 1`   | inline after `PyASCIIObject`, 1 byte/char |
//! | compact non-ASCII  | `compact = 1`, `ascii = 0`   | inline after `PyCompactUnicodeObject`, `kind` bytes/char |
//! | legacy             | `compact = 0`                | behind `PyUnicodeObject.data`, `kind` bytes/char |
//!
//! A legacy string that has not been made "ready" has `kind = 0`
//! (`PyUnicode_WCHAR_KIND`): its only representation is the `wstr` buffer of
//! platform `wchar_t` units, with its length in `wstr_length`.
//!
//! ## References
//!
//! - [PEP 393](https://peps.python.org/pep-0393/)

use std::char::REPLACEMENT_CHARACTER;

use tracing::trace;

use crate::error::{InspectError, InspectResult};
use crate::layout::{LayoutCatalog, StructKind};
use crate::memory::MemoryAccess;
use crate::types::Address;

/// `PyUnicode_WCHAR_KIND`
pub const WCHAR_KIND: u8 = 0;
/// `PyUnicode_1BYTE_KIND`
pub const ONE_BYTE_KIND: u8 = 1;
/// `PyUnicode_2BYTE_KIND`
pub const TWO_BYTE_KIND: u8 = 2;
/// `PyUnicode_4BYTE_KIND`
pub const FOUR_BYTE_KIND: u8 = 4;

/// Decoded `PyASCIIObject.state` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnicodeState
{
    /// `SSTATE_*` interning mode.
    pub interned: u8,
    /// Bytes per character, or 0 for `wchar_t`-only strings.
    pub kind: u8,
    /// Character data follows the header.
    pub compact: bool,
    /// Only ASCII characters.
    pub ascii: bool,
    /// Canonical representation has been computed.
    pub ready: bool,
}

impl UnicodeState
{
    /// Unpack the state word.
    ///
    /// ```rust
    /// use pyscope_core::unicode::UnicodeState;
    ///
    /// // kind=1, compact, ascii, ready
    /// let state = UnicodeState::from_bits(0b1110_0100);
    /// assert_eq!(state.kind, 1);
    /// assert!(state.compact && state.ascii && state.ready);
    /// ```
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_bits(bits: u64) -> Self
    {
        Self {
            interned: (bits & 0b11) as u8,
            kind: ((bits >> 2) & 0b111) as u8,
            compact: (bits >> 5) & 1 == 1,
            ascii: (bits >> 6) & 1 == 1,
            ready: (bits >> 7) & 1 == 1,
        }
    }

    /// Pack back into a state word.
    pub const fn to_bits(self) -> u64
    {
        (self.interned as u64 & 0b11)
            | ((self.kind as u64 & 0b111) << 2)
            | ((self.compact as u64) << 5)
            | ((self.ascii as u64) << 6)
            | ((self.ready as u64) << 7)
    }
}

/// Reads string objects through a layout catalog.
pub struct UnicodeReader<'a, M>
{
    memory: &'a M,
    catalog: &'a LayoutCatalog,
    max_chars: usize,
}

impl<'a, M: MemoryAccess> UnicodeReader<'a, M>
{
    /// Create a reader that refuses strings longer than `max_chars`.
    pub fn new(memory: &'a M, catalog: &'a LayoutCatalog, max_chars: usize) -> Self
    {
        Self {
            memory,
            catalog,
            max_chars,
        }
    }

    /// Decode the string object at `string`.
    ///
    /// A null reference or a null data buffer decodes to an empty string.
    ///
    /// ## Errors
    ///
    /// - `UnreadableMemory` for any failed read
    /// - `CorruptObject` for an impossible kind or length
    pub fn read(&self, string: Address) -> InspectResult<String>
    {
        if string.is_null() {
            return Ok(String::new());
        }

        let ascii = self.catalog.get(StructKind::AsciiUnicode)?;
        let state = UnicodeState::from_bits(self.memory.read_unsigned_field(string, ascii.field("state")?)?);
        trace!(%string, ?state, "reading unicode object");

        if state.kind == WCHAR_KIND {
            return self.read_wide(string);
        }

        let data = if state.compact {
            let header = if state.ascii {
                ascii.size()
            } else {
                self.catalog.get(StructKind::CompactUnicode)?.size()
            };
            string + header
        } else {
            let data = self
                .memory
                .read_pointer_field(string, self.catalog.field(StructKind::Unicode, "data")?)?;
            if data.is_null() {
                return Ok(String::new());
            }
            data
        };

        let length = self.memory.read_signed_field(string, ascii.field("length")?)?;
        let length = self.checked_length(string, length)?;
        let bytes = self.memory.read(data, length * usize::from(state.kind))?;
        decode_code_points(&bytes, state.kind).ok_or_else(|| InspectError::CorruptObject {
            address: string,
            reason: format!("unknown unicode kind {}", state.kind),
        })
    }

    fn read_wide(&self, string: Address) -> InspectResult<String>
    {
        let wstr = self
            .memory
            .read_pointer_field(string, self.catalog.field(StructKind::AsciiUnicode, "wstr")?)?;
        if wstr.is_null() {
            return Ok(String::new());
        }

        let wstr_length = self
            .memory
            .read_signed_field(string, self.catalog.field(StructKind::CompactUnicode, "wstr_length")?)?;
        let length = self.checked_length(string, wstr_length)?;
        let width = self.catalog.wchar_size();
        let bytes = self.memory.read(wstr, length * usize::from(width))?;
        decode_wide(&bytes, width).ok_or_else(|| InspectError::CorruptObject {
            address: string,
            reason: format!("unsupported wchar_t width {width}"),
        })
    }

    fn checked_length(&self, string: Address, length: i64) -> InspectResult<usize>
    {
        usize::try_from(length)
            .ok()
            .filter(|length| *length <= self.max_chars)
            .ok_or_else(|| InspectError::CorruptObject {
                address: string,
                reason: format!("string length {length} out of range"),
            })
    }
}

/// Reassemble fixed-width code points (`PyUnicode_READ`). Code points that
/// are not Unicode scalar values (lone surrogates) become U+FFFD.
///
/// Returns `None` for a kind other than 1, 2 or 4.
pub fn decode_code_points(bytes: &[u8], kind: u8) -> Option<String>
{
    let text = match kind {
        ONE_BYTE_KIND => bytes.iter().map(|byte| char::from(*byte)).collect(),
        TWO_BYTE_KIND => bytes
            .chunks_exact(2)
            .map(|unit| scalar(u32::from(u16::from_le_bytes([unit[0], unit[1]]))))
            .collect(),
        FOUR_BYTE_KIND => bytes
            .chunks_exact(4)
            .map(|unit| scalar(u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])))
            .collect(),
        _ => return None,
    };
    Some(text)
}

/// Decode a `wchar_t` buffer: UTF-16 for 2-byte units, UCS-4 for 4-byte units.
///
/// Returns `None` for any other width.
pub fn decode_wide(bytes: &[u8], width: u8) -> Option<String>
{
    match width {
        2 => {
            let units = bytes.chunks_exact(2).map(|unit| u16::from_le_bytes([unit[0], unit[1]]));
            Some(
                char::decode_utf16(units)
                    .map(|unit| unit.unwrap_or(REPLACEMENT_CHARACTER))
                    .collect(),
            )
        }
        4 => decode_code_points(bytes, FOUR_BYTE_KIND),
        _ => None,
    }
}

fn scalar(code_point: u32) -> char
{
    char::from_u32(code_point).unwrap_or(REPLACEMENT_CHARACTER)
}
