use core::fmt;
use std::ops::Deref;

/// A pair of values, one of which is expected and one of which is actually
/// observed somewhere. Carried by mismatch errors so callers can report both
/// sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GotExpected<T> {
    /// The value observed.
    pub got: T,
    /// The value expected.
    pub expected: T,
}

impl<T: fmt::Display> fmt::Display for GotExpected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "got {}, expected {}", self.got, self.expected)
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for GotExpected<T> {}

impl<T> From<(T, T)> for GotExpected<T> {
    #[inline]
    fn from((got, expected): (T, T)) -> Self {
        Self::new(got, expected)
    }
}

impl<T> GotExpected<T> {
    /// Creates a new error from a pair of values.
    #[inline]
    pub const fn new(got: T, expected: T) -> Self {
        Self { got, expected }
    }
}

/// A [`GotExpected`] pair with [`Box`]ed contents, to keep large payloads off
/// the error enum's inline size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotExpectedBoxed<T>(pub Box<GotExpected<T>>);

impl<T: fmt::Display> fmt::Display for GotExpectedBoxed<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for GotExpectedBoxed<T> {}

impl<T> Deref for GotExpectedBoxed<T> {
    type Target = GotExpected<T>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<(T, T)> for GotExpectedBoxed<T> {
    #[inline]
    fn from(value: (T, T)) -> Self {
        Self(Box::new(GotExpected::from(value)))
    }
}

impl<T> From<GotExpected<T>> for GotExpectedBoxed<T> {
    #[inline]
    fn from(value: GotExpected<T>) -> Self {
        Self(Box::new(value))
    }
}
