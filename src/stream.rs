/// A lending iterator: each item may borrow from the stream itself.
///
/// Streams in this crate hand out keys that point into a buffer the stream
/// owns and rewrites on every call, so a scan never allocates per key. The
/// price is that an item cannot outlive the next call to `next`, and so this
/// cannot be an `Iterator`.
///
/// Code that accepts any stream has to quantify over the item lifetime:
///
/// ```ignore
/// fn count_keys<'f, I, S>(s: I) -> usize
///     where I: for<'a> IntoStreamer<'a, Into=S, Item=(&'a [u8], Output)>,
///           S: 'f + for<'a> Streamer<'a, Item=(&'a [u8], Output)>
/// {
///     let mut s = s.into_stream();
///     let mut n = 0;
///     while let Some(_) = s.next() {
///         n += 1;
///     }
///     n
/// }
/// ```
pub trait Streamer<'a> {
    /// What the stream yields, usually borrowing from the stream.
    type Item: 'a;

    /// Advances the stream. After the first `None`, every later call returns
    /// `None` too.
    fn next(&'a mut self) -> Option<Self::Item>;
}

/// Conversion into a `Streamer`, in the way `IntoIterator` converts into an
/// `Iterator`. Every stream converts into itself.
pub trait IntoStreamer<'a> {
    /// What the resulting stream yields.
    type Item: 'a;
    /// The resulting stream.
    type Into: Streamer<'a, Item = Self::Item>;

    /// Converts `self` into a stream.
    fn into_stream(self) -> Self::Into;
}

impl<'a, S: Streamer<'a>> IntoStreamer<'a> for S {
    type Item = S::Item;
    type Into = S;

    fn into_stream(self) -> S {
        self
    }
}
