//! Range-table cursor for `co_linetable` (3.10 and 3.11).
//!
//! Each entry is two bytes: an unsigned range length in bytecode bytes and a
//! signed line delta. A delta of `-128` marks the range as having no line.
//! The cursor tracks the current range `[start, end)` and can step forward
//! and backward through the table.

use tracing::trace;

use crate::error::{InspectError, InspectResult};

/// Line delta meaning "no line for this range".
pub const NO_LINE_DELTA: i8 = -128;

/// How empty ranges are treated while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRules
{
    /// Keep advancing past zero-length ranges.
    pub skip_empty_forward: bool,
    /// Keep retreating past zero-length ranges.
    pub skip_empty_backward: bool,
}

impl ScanRules
{
    /// 3.10: zero-length ranges are skipped in both directions.
    pub const V310: Self = Self {
        skip_empty_forward: true,
        skip_empty_backward: true,
    };

    /// 3.11: a single retreat always lands on a non-empty range.
    pub const V311: Self = Self {
        skip_empty_forward: true,
        skip_empty_backward: false,
    };
}

/// Position inside a line table, mirroring `PyCodeAddressRange`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeCursor<'t>
{
    table: &'t [u8],
    next: usize,
    start: i64,
    end: i64,
    computed_line: i64,
    line: i64,
}

impl<'t> RangeCursor<'t>
{
    /// Cursor positioned before the first range.
    pub fn new(table: &'t [u8], first_line: i64) -> Self
    {
        Self {
            table,
            next: 0,
            start: -1,
            end: 0,
            computed_line: first_line,
            line: -1,
        }
    }

    /// First address of the current range.
    pub fn start(&self) -> i64
    {
        self.start
    }

    /// One past the last address of the current range.
    pub fn end(&self) -> i64
    {
        self.end
    }

    /// Line of the current range, `-1` if it has none.
    pub fn line(&self) -> i64
    {
        self.line
    }

    /// `(start, end, line)` of the current range.
    pub fn range(&self) -> (i64, i64, i64)
    {
        (self.start, self.end, self.line)
    }

    /// `true` once every entry has been consumed.
    pub fn at_end(&self) -> bool
    {
        self.next >= self.table.len()
    }

    /// Step to the next non-empty range (or the next range when
    /// `skip_empty` is false). Returns `Ok(false)` at the end of the table.
    ///
    /// ## Errors
    ///
    /// `MalformedLineTable` if the table ends inside an entry or in the middle
    /// of a run of empty ranges.
    pub fn next_range(&mut self, skip_empty: bool) -> InspectResult<bool>
    {
        if self.at_end() {
            return Ok(false);
        }
        self.advance()?;
        while skip_empty && self.start == self.end {
            self.advance()?;
        }
        Ok(true)
    }

    /// Step back to the previous non-empty range (or the previous range when
    /// `skip_empty` is false). Returns `Ok(false)` when already at the first
    /// range.
    ///
    /// ## Errors
    ///
    /// `MalformedLineTable` if stepping back would leave the table.
    pub fn previous_range(&mut self, skip_empty: bool) -> InspectResult<bool>
    {
        if self.start <= 0 {
            return Ok(false);
        }
        self.retreat()?;
        while skip_empty && self.start == self.end {
            self.retreat()?;
        }
        Ok(true)
    }

    fn advance(&mut self) -> InspectResult<()>
    {
        let length = self.byte(self.next)?;
        let delta = self.signed(self.next + 1)?;
        self.start = self.end;
        self.end += i64::from(length);
        self.next += 2;
        if delta == NO_LINE_DELTA {
            self.line = -1;
        } else {
            self.computed_line += i64::from(delta);
            self.line = self.computed_line;
        }
        trace!(start = self.start, end = self.end, line = self.line, "advance");
        Ok(())
    }

    fn retreat(&mut self) -> InspectResult<()>
    {
        let current = self.next.checked_sub(2).ok_or_else(|| underflow(self.next))?;
        let previous = current.checked_sub(2).ok_or_else(|| underflow(self.next))?;

        let undone = self.signed(current + 1)?;
        if undone != NO_LINE_DELTA {
            self.computed_line -= i64::from(undone);
        }
        let length = self.byte(previous)?;
        let delta = self.signed(previous + 1)?;

        self.next = current;
        self.end = self.start;
        self.start -= i64::from(length);
        self.line = if delta == NO_LINE_DELTA { -1 } else { self.computed_line };
        trace!(start = self.start, end = self.end, line = self.line, "retreat");
        Ok(())
    }

    fn byte(&self, index: usize) -> InspectResult<u8>
    {
        self.table.get(index).copied().ok_or_else(|| {
            InspectError::MalformedLineTable(format!(
                "entry at byte {index} is past the end of a {}-byte table",
                self.table.len()
            ))
        })
    }

    fn signed(&self, index: usize) -> InspectResult<i8>
    {
        self.byte(index).map(|byte| i8::from_le_bytes([byte]))
    }
}

fn underflow(next: usize) -> InspectError
{
    InspectError::MalformedLineTable(format!("cannot step back from table byte {next}"))
}

/// Line of the range containing `addrq` (`_PyCode_CheckLineNumber`).
///
/// Returns `-1` when the containing range has no line.
///
/// ## Errors
///
/// `MalformedLineTable` when `addrq` lies outside the table or the table is
/// truncated.
pub fn check_line_number(table: &[u8], first_line: i64, addrq: i64, rules: ScanRules) -> InspectResult<i64>
{
    let mut cursor = RangeCursor::new(table, first_line);
    while cursor.end() <= addrq {
        if !cursor.next_range(rules.skip_empty_forward)? {
            return Err(InspectError::MalformedLineTable(format!(
                "address {addrq} is past the last range ending at {}",
                cursor.end()
            )));
        }
    }
    while cursor.start() > addrq {
        if !cursor.previous_range(rules.skip_empty_backward)? {
            return Err(InspectError::MalformedLineTable(format!(
                "address {addrq} is before the first range"
            )));
        }
    }
    Ok(cursor.line())
}
