//! Resolved Python frame types.

use std::fmt;

use super::{Address, ThreadId};

/// Source line of a resolved frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineNumber
{
    /// 1-based line in the frame's source file.
    Known(u32),
    /// The line table was missing, garbled, or marked the range as artifact.
    Unknown,
}

impl LineNumber
{
    /// Interpret the signed convention used by the line resolvers, where any
    /// negative (or zero) value means "no line".
    pub fn from_raw(raw: i64) -> Self
    {
        match u32::try_from(raw) {
            Ok(line) if line > 0 => LineNumber::Known(line),
            _ => LineNumber::Unknown,
        }
    }

    /// The line, if known.
    pub fn get(self) -> Option<u32>
    {
        match self {
            LineNumber::Known(line) => Some(line),
            LineNumber::Unknown => None,
        }
    }
}

impl fmt::Display for LineNumber
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            LineNumber::Known(line) => write!(f, "{line}"),
            LineNumber::Unknown => f.write_str("???"),
        }
    }
}

/// One Python activation record, detached from target memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame
{
    /// Source file of the executing code object.
    pub filename: String,
    /// Function (code object) name.
    pub function: String,
    /// Current line.
    pub line: LineNumber,
    /// Frame address the values were read from.
    pub address: Address,
}

impl fmt::Display for ResolvedFrame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "in {} (File '{}', line {})", self.function, self.filename, self.line)
    }
}

/// Stack of one interpreter-attached thread, innermost frame first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStack
{
    /// OS thread the stack belongs to.
    pub thread: ThreadId,
    /// Interpreter thread state the walk started from.
    pub thread_state: Address,
    /// Resolved frames.
    pub frames: Vec<ResolvedFrame>,
}
