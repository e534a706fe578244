//! A neutral two-case sum type.
//!
//! `Either<L, R>` shows up in two places in this crate:
//!
//! - [`Schedule::and_then`](crate::Schedule::and_then) tags outputs with the
//!   schedule that produced them: `Left` for the first schedule, `Right` for
//!   the one that takes over when the first is done.
//! - The `*_or_else_either` drivers report how a loop ended: `Right` with the
//!   successful value, `Left` with whatever the fallback produced.
//!
//! Neither side implies failure, which is why this is not a `Result`. By
//! convention `Either` is right-biased: [`Either::map`] operates on `Right`.
//!
//! # Example
//!
//! ```rust
//! use breakwater::Either;
//!
//! let first_phase: Either<u64, u64> = Either::left(3);
//! let second_phase: Either<u64, u64> = Either::right(7);
//!
//! assert_eq!(first_phase.merge(), 3);
//! assert_eq!(second_phase.map(|n| n * 2).merge(), 14);
//! ```

/// A value that is either `Left(L)` or `Right(R)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Either<L, R> {
    /// The left variant
    Left(L),
    /// The right variant
    Right(R),
}

impl<L, R> Either<L, R> {
    /// Create a Left value.
    #[inline]
    pub fn left(value: L) -> Self {
        Either::Left(value)
    }

    /// Create a Right value.
    #[inline]
    pub fn right(value: R) -> Self {
        Either::Right(value)
    }

    /// Returns `true` if this is a `Left` value.
    #[inline]
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }

    /// Returns `true` if this is a `Right` value.
    #[inline]
    pub fn is_right(&self) -> bool {
        matches!(self, Either::Right(_))
    }

    /// Convert into the left value, if present.
    #[inline]
    pub fn into_left(self) -> Option<L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    /// Convert into the right value, if present.
    #[inline]
    pub fn into_right(self) -> Option<R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }

    /// Borrow the contents.
    #[inline]
    pub fn as_ref(&self) -> Either<&L, &R> {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(r),
        }
    }

    /// Transform the left value, passing right values through unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::Either;
    ///
    /// let left: Either<i32, &str> = Either::left(21);
    /// assert_eq!(left.map_left(|x| x * 2), Either::left(42));
    /// ```
    #[inline]
    pub fn map_left<L2, F>(self, f: F) -> Either<L2, R>
    where
        F: FnOnce(L) -> L2,
    {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(r),
        }
    }

    /// Transform the right value (right-biased `map`).
    #[inline]
    pub fn map<R2, F>(self, f: F) -> Either<L, R2>
    where
        F: FnOnce(R) -> R2,
    {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(f(r)),
        }
    }

    /// Transform both variants.
    #[inline]
    pub fn bimap<L2, R2, F, G>(self, f: F, g: G) -> Either<L2, R2>
    where
        F: FnOnce(L) -> L2,
        G: FnOnce(R) -> R2,
    {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(g(r)),
        }
    }

    /// Fold both variants into a single value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::Either;
    ///
    /// let outcome: Either<&str, u32> = Either::left("gave up");
    /// let text = outcome.fold(|reason| reason.to_string(), |n| format!("got {}", n));
    /// assert_eq!(text, "gave up");
    /// ```
    #[inline]
    pub fn fold<T, F, G>(self, left_fn: F, right_fn: G) -> T
    where
        F: FnOnce(L) -> T,
        G: FnOnce(R) -> T,
    {
        match self {
            Either::Left(l) => left_fn(l),
            Either::Right(r) => right_fn(r),
        }
    }

    /// Swap Left and Right.
    #[inline]
    pub fn swap(self) -> Either<R, L> {
        match self {
            Either::Left(l) => Either::Right(l),
            Either::Right(r) => Either::Left(r),
        }
    }

    /// Convert to Result (Right becomes Ok, Left becomes Err).
    #[inline]
    pub fn into_result(self) -> Result<R, L> {
        match self {
            Either::Left(l) => Err(l),
            Either::Right(r) => Ok(r),
        }
    }
}

impl<T> Either<T, T> {
    /// Extract the value when both sides share a type.
    ///
    /// This is how `repeat_or_else` and `retry_or_else` collapse the fallback
    /// and the success path into one value.
    #[inline]
    pub fn merge(self) -> T {
        match self {
            Either::Left(v) | Either::Right(v) => v,
        }
    }
}

impl<L, R> From<Result<R, L>> for Either<L, R> {
    fn from(result: Result<R, L>) -> Self {
        match result {
            Ok(r) => Either::Right(r),
            Err(l) => Either::Left(l),
        }
    }
}

impl<L, R> From<Either<L, R>> for Result<R, L> {
    fn from(either: Either<L, R>) -> Self {
        either.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let left: Either<i32, &str> = Either::left(42);
        let right: Either<i32, &str> = Either::right("hello");

        assert!(left.is_left());
        assert!(!left.is_right());
        assert!(!right.is_left());
        assert!(right.is_right());
    }

    #[test]
    fn test_into_left_into_right() {
        let left: Either<i32, &str> = Either::left(42);
        assert_eq!(left.into_left(), Some(42));
        assert_eq!(left.into_right(), None);

        let right: Either<i32, &str> = Either::right("hello");
        assert_eq!(right.into_right(), Some("hello"));
        assert_eq!(right.into_left(), None);
    }

    #[test]
    fn test_map_is_right_biased() {
        let left: Either<i32, i32> = Either::left(100);
        let right: Either<i32, i32> = Either::right(21);

        assert_eq!(left.map(|x| x * 2), Either::left(100));
        assert_eq!(right.map(|x| x * 2), Either::right(42));
    }

    #[test]
    fn test_bimap_and_swap() {
        let left: Either<i32, &str> = Either::left(1);
        assert_eq!(left.bimap(|x| x + 1, |s| s.len()), Either::left(2));
        assert_eq!(left.swap(), Either::right(1));
    }

    #[test]
    fn test_merge() {
        assert_eq!(Either::<u8, u8>::left(1).merge(), 1);
        assert_eq!(Either::<u8, u8>::right(2).merge(), 2);
    }

    #[test]
    fn test_result_conversions() {
        let from_ok: Either<&str, i32> = Ok(42).into();
        let from_err: Either<&str, i32> = Err("boom").into();
        assert_eq!(from_ok, Either::right(42));
        assert_eq!(from_err, Either::left("boom"));

        let back: Result<i32, &str> = from_err.into();
        assert_eq!(back, Err("boom"));
        assert_eq!(from_ok.into_result(), Ok(42));
    }
}
