//! Error handling. See [`Errno`].

use thiserror::Error;

mod constants;

/// Linux error numbers.
///
/// A transparent wrapper around Linux error numbers (i.e. `i32`s) intended to
/// provide some type safety by expecting explicit conversions to/from `i32`s.
/// The associated constants live in a private submodule so the mechanical
/// list stays out of the way.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Error)]
pub struct Errno {
    value: core::num::NonZeroU8,
}

impl From<Errno> for i32 {
    fn from(e: Errno) -> Self {
        e.value.get().into()
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Errno({})", self.value.get())
    }
}

impl Errno {
    /// The raw (positive) error number.
    pub const fn raw(self) -> i32 {
        self.value.get() as i32
    }

    /// The negative integer representation of the error.
    ///
    /// ```
    /// # use guestbox_common_linux::errno::Errno;
    /// assert_eq!(-1, Errno::EPERM.as_neg());
    /// assert_eq!(1, i32::from(Errno::EPERM));
    /// ```
    pub const fn as_neg(self) -> i32 {
        -(self.value.get() as i32)
    }

    /// (Private-only) helper that keeps the associated [`constants`]
    /// readable.
    const fn from_const(v: u8) -> Self {
        Self {
            value: match core::num::NonZeroU8::new(v) {
                Some(value) => value,
                None => unreachable!(),
            },
        }
    }
}

/// Errors when converting to an [`Errno`].
#[derive(Error, Debug)]
pub enum ErrnoConversionError {
    #[error("expected positive error number")]
    ExpectedPositive,
    #[error("error number cannot be zero")]
    ExpectedNonZero,
    #[error("error number is unexpectedly large")]
    ExpectedSmallEnough,
}

impl TryFrom<i32> for Errno {
    type Error = ErrnoConversionError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let value: u32 = value
            .try_into()
            .or(Err(ErrnoConversionError::ExpectedPositive))?;
        Self::try_from(value)
    }
}

impl TryFrom<u32> for Errno {
    type Error = ErrnoConversionError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        let value: u8 = value
            .try_into()
            .or(Err(ErrnoConversionError::ExpectedSmallEnough))?;
        Self::try_from(value)
    }
}

impl TryFrom<u8> for Errno {
    type Error = ErrnoConversionError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let value =
            core::num::NonZeroU8::new(value).ok_or(ErrnoConversionError::ExpectedNonZero)?;
        if value.get() <= Self::MAX.value.get() {
            Ok(Self { value })
        } else {
            Err(ErrnoConversionError::ExpectedSmallEnough)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Errno;

    #[test]
    fn conversions() {
        assert_eq!(Errno::try_from(9u8).unwrap(), Errno::EBADF);
        assert_eq!(i32::from(Errno::ETIMEDOUT), 110);
        assert_eq!(Errno::ENOSYS.as_neg(), -38);
        assert!(Errno::try_from(0u8).is_err());
        assert!(Errno::try_from(-5i32).is_err());
        assert!(Errno::try_from(200u32).is_err());
    }
}
