//! # Line Number Resolver
//!
//! Maps a frame's current instruction to a source line.
//!
//! | Family  | Table          | Query position                              |
//! |---------|----------------|---------------------------------------------|
//! | ≤ 3.9   | `co_lnotab`    | `f_lasti` (bytes)                           |
//! | 3.10    | `co_linetable` | `f_lasti × sizeof(_Py_CODEUNIT)`            |
//! | 3.11    | `co_linetable` | `prev_instr − (code + offsetof(co_code_adaptive))` |
//!
//! Every family first consults the line number the interpreter may have
//! cached on the frame:
//!
//! - ≤ 3.9 trusts `f_lineno` only while a trace function is installed
//! - 3.10 trusts a non-zero `f_lineno`
//! - 3.11 trusts a non-zero `f_lineno` on the frame object, if one exists
//!
//! A missing, mistyped or garbled table degrades the line to
//! [`LineNumber::Unknown`]; it never fails the stack.

pub mod lnotab;
pub mod range;

pub use range::{RangeCursor, ScanRules};

use tracing::{trace, warn};

use crate::error::{InspectError, InspectResult};
use crate::layout::{LayoutCatalog, StructKind};
use crate::memory::MemoryAccess;
use crate::object::ObjectReader;
use crate::types::{Address, LineNumber};
use crate::version::VersionFamily;

/// Line-table algorithm for one version family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineAlgorithm
{
    /// Flat `(addr, line)` delta pairs.
    Lnotab,
    /// Range table, empty ranges skipped in both directions.
    RangeTable310,
    /// Range table, single-step retreat.
    RangeTable311,
}

impl LineAlgorithm
{
    /// Algorithm used by `family`.
    pub const fn for_family(family: VersionFamily) -> Self
    {
        match family {
            VersionFamily::Legacy => LineAlgorithm::Lnotab,
            VersionFamily::V310 => LineAlgorithm::RangeTable310,
            VersionFamily::V311Plus => LineAlgorithm::RangeTable311,
        }
    }

    /// Name of the code object field holding the table.
    pub const fn table_field(self) -> &'static str
    {
        match self {
            LineAlgorithm::Lnotab => "co_lnotab",
            LineAlgorithm::RangeTable310 | LineAlgorithm::RangeTable311 => "co_linetable",
        }
    }

    /// Resolve `addrq` against `table` (`PyCode_Addr2Line`).
    ///
    /// Returns `-1` when the position has no line.
    ///
    /// ## Errors
    ///
    /// `MalformedLineTable` for truncated tables or out-of-range positions.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use pyscope_core::lines::LineAlgorithm;
    ///
    /// // one 8-byte range, one line below the first
    /// let line = LineAlgorithm::RangeTable310.addr2line(&[8, 1], 20, 4).unwrap();
    /// assert_eq!(line, 21);
    /// ```
    pub fn addr2line(self, table: &[u8], first_line: i64, addrq: i64) -> InspectResult<i64>
    {
        if table.is_empty() {
            return Ok(first_line);
        }
        match self {
            LineAlgorithm::Lnotab => Ok(lnotab::addr2line(table, first_line, addrq)),
            LineAlgorithm::RangeTable310 | LineAlgorithm::RangeTable311 if addrq < 0 => Ok(first_line),
            LineAlgorithm::RangeTable310 => range::check_line_number(table, first_line, addrq, ScanRules::V310),
            LineAlgorithm::RangeTable311 => range::check_line_number(table, first_line, addrq, ScanRules::V311),
        }
    }
}

/// Resolves frame lines for one layout catalog.
pub struct LineResolver<'a, M>
{
    memory: &'a M,
    catalog: &'a LayoutCatalog,
    algorithm: LineAlgorithm,
    max_table_bytes: usize,
}

impl<'a, M: MemoryAccess> LineResolver<'a, M>
{
    /// Create a resolver for the catalog's family.
    pub fn new(memory: &'a M, catalog: &'a LayoutCatalog, max_table_bytes: usize) -> Self
    {
        Self {
            memory,
            catalog,
            algorithm: LineAlgorithm::for_family(catalog.family()),
            max_table_bytes,
        }
    }

    /// Algorithm in use.
    pub fn algorithm(&self) -> LineAlgorithm
    {
        self.algorithm
    }

    /// Current line of `frame`, whose code object is `code`.
    ///
    /// ## Errors
    ///
    /// Failures reading the frame itself are surfaced; anything wrong with
    /// the line table yields `Ok(LineNumber::Unknown)`.
    pub fn frame_line(&self, frame: Address, code: Address) -> InspectResult<LineNumber>
    {
        let frame_layout = self.catalog.get(StructKind::Frame)?;
        let addrq = match self.algorithm {
            LineAlgorithm::Lnotab => {
                let f_trace = self.memory.read_pointer_field(frame, frame_layout.field("f_trace")?)?;
                if !f_trace.is_null() {
                    let f_lineno = self.memory.read_signed_field(frame, frame_layout.field("f_lineno")?)?;
                    trace!(%frame, f_lineno, "traced frame, using f_lineno");
                    return Ok(LineNumber::from_raw(f_lineno));
                }
                self.memory.read_signed_field(frame, frame_layout.field("f_lasti")?)?
            }
            LineAlgorithm::RangeTable310 => {
                let f_lineno = self.memory.read_signed_field(frame, frame_layout.field("f_lineno")?)?;
                if f_lineno != 0 {
                    return Ok(LineNumber::from_raw(f_lineno));
                }
                let f_lasti = self.memory.read_signed_field(frame, frame_layout.field("f_lasti")?)?;
                f_lasti * i64::from(self.catalog.code_unit_size())
            }
            LineAlgorithm::RangeTable311 => {
                let frame_obj = self.memory.read_pointer_field(frame, frame_layout.field("frame_obj")?)?;
                if !frame_obj.is_null() {
                    let f_lineno = self
                        .memory
                        .read_signed_field(frame_obj, self.catalog.field(StructKind::FrameObject, "f_lineno")?)?;
                    if f_lineno != 0 {
                        return Ok(LineNumber::from_raw(f_lineno));
                    }
                }
                let prev_instr = self.memory.read_pointer_field(frame, frame_layout.field("prev_instr")?)?;
                let bytecode = code + self.catalog.field(StructKind::Code, "co_code_adaptive")?.offset;
                prev_instr.distance_from(bytecode)
            }
        };
        trace!(%frame, %code, addrq, algorithm = ?self.algorithm, "resolving line from table");
        self.code_line(code, addrq)
    }

    /// `PyCode_Addr2Line(code, addrq)`, degrading every table problem to
    /// [`LineNumber::Unknown`].
    ///
    /// ## Errors
    ///
    /// Only a failure to read `co_firstlineno` is surfaced.
    pub fn code_line(&self, code: Address, addrq: i64) -> InspectResult<LineNumber>
    {
        let first_line = self
            .memory
            .read_signed_field(code, self.catalog.field(StructKind::Code, "co_firstlineno")?)?;
        match self.read_table(code).and_then(|table| self.algorithm.addr2line(&table, first_line, addrq)) {
            Ok(line) => Ok(LineNumber::from_raw(line)),
            Err(err) => {
                warn!(%code, addrq, error = %err, "line number unavailable");
                Ok(LineNumber::Unknown)
            }
        }
    }

    fn read_table(&self, code: Address) -> InspectResult<Vec<u8>>
    {
        let field = self.catalog.field(StructKind::Code, self.algorithm.table_field())?;
        let table = self.memory.read_pointer_field(code, field)?;
        if table.is_null() {
            return Err(InspectError::MalformedLineTable(format!("code object {code} has no line table")));
        }
        let objects = ObjectReader::new(self.memory, self.catalog);
        if !objects.is_bytes(table)? {
            return Err(InspectError::MalformedLineTable(format!("line table {table} is not a bytes object")));
        }
        objects
            .bytes_contents(table, self.max_table_bytes)
            .map_err(|err| InspectError::MalformedLineTable(err.to_string()))
    }
}
