//! `co_lnotab` decoding (3.7 through 3.9).
//!
//! The table is a flat run of `(address delta, line delta)` byte pairs; the
//! address delta is unsigned and the line delta signed. `-128` is an ordinary
//! line delta here.

/// `PyCode_Addr2Line` over an lnotab blob.
///
/// A trailing odd byte is ignored.
pub fn addr2line(table: &[u8], first_line: i64, addrq: i64) -> i64
{
    let mut line = first_line;
    let mut addr = 0i64;
    for pair in table.chunks_exact(2) {
        addr += i64::from(pair[0]);
        if addr > addrq {
            break;
        }
        line += i64::from(i8::from_le_bytes([pair[1]]));
    }
    line
}
