//! Target memory address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed address in the target's address space
///
/// An `Address` is never dereferenced by the inspector. It only becomes data
/// when handed to a [`MemoryAccess`](crate::memory::MemoryAccess) together with
/// an explicit size, usually through a layout field.
///
/// ## Why use a newtype?
///
/// - **Type safety**: field offsets, lengths and addresses are all `u64`
///   underneath, and mixing them up is the classic bug of offset arithmetic
/// - **Self-documenting**: makes it clear that a value lives in the target
///
/// ## Example
///
/// ```rust
/// use pyscope_core::types::Address;
///
/// let frame = Address::from(0x1000);
/// let f_back = frame + 0x18;
/// assert_eq!(f_back.value(), 0x1018);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address, used as the terminator of every pointer chain
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// ```rust
    /// use pyscope_core::types::Address;
    ///
    /// const TEB: Address = Address::new(0x7ff6_0000_0000);
    /// ```
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// `true` for the null pointer
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use pyscope_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Signed byte distance from `origin` to `self`
    ///
    /// This is C pointer subtraction: the result is negative when `self`
    /// lies below `origin`.
    ///
    /// ```rust
    /// use pyscope_core::types::Address;
    ///
    /// let code = Address::from(0x2000);
    /// assert_eq!(Address::from(0x2010).distance_from(code), 0x10);
    /// assert_eq!(Address::from(0x1ffe).distance_from(code), -2);
    /// ```
    #[allow(clippy::cast_possible_wrap)]
    pub const fn distance_from(self, origin: Address) -> i64
    {
        self.0.wrapping_sub(origin.0) as i64
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
