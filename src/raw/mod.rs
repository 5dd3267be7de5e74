/*!
Operations on raw finite state transducers.

This sub-module exposes the guts of a finite state transducer. Construction
and traversal are mirrored by the friendlier `Map` type at the crate root.
Other parts, such as direct access to nodes and transitions, have no analog
there.

# Overview of types

`Fst` is a read only interface to pre-constructed finite state transducers.
`Node` is a read only interface to a single node in a transducer. `Builder` is
used to create new finite state transducers. (Once a transducer is created, it
can never be modified.) `Stream` is a stream of all inputs and outputs in a
transducer. `StreamBuilder` builds range queries, optionally filtered by an
automaton. `StreamWithState` is like `Stream`, but also hands out the
automaton state reached at each key.

# Binary layout

```text
+---------+---------+--------------------+-----------+-----------+----------+
| version | fst     | nodes, written     | key count | root addr | checksum |
| u64 LE  | type u64| back to front      | u64 LE    | u64 LE    | u32 LE   |
+---------+---------+--------------------+-----------+-----------+----------+
```

A node is addressed by its *last* byte, which always holds its state byte.
The checksum is a masked CRC32C of every byte before it. Transducers written
with a format version older than 3 have no checksum.
*/
use std::cmp;
use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{trace, warn};

use crate::automaton::{AlwaysMatch, Automaton};
use crate::error::Result;
use crate::raw::pack::u64_to_usize;
use crate::stream::{IntoStreamer, Streamer};

pub use crate::raw::build::Builder;
pub use crate::raw::error::Error;
pub use crate::raw::node::{Node, Transitions};

mod build;
mod common_inputs {
    include!(concat!(env!("OUT_DIR"), "/common_inputs.rs"));
}
mod counting_writer;
mod crc32;
mod crc32_table {
    include!(concat!(env!("OUT_DIR"), "/crc32_table.rs"));
}
mod error;
mod node;
mod pack;
mod registry;

/// The API version of this crate.
///
/// This version number is written to every finite state transducer created by
/// this crate. When a finite state transducer is read, its version number is
/// checked against this value.
///
/// Every version from 1 up to and including this one can be read. Version 2
/// added an index table to nodes with many transitions, and version 3 added
/// the trailing checksum.
pub const VERSION: u64 = 3;

/// FstType is a convention used to indicate the type of the underlying
/// transducer.
///
/// The index layer stamps each segment with a type, so that one kind of
/// transducer is never read as another. This crate gives no meaning to any
/// particular value. The default is `0`.
pub type FstType = u64;

/// The address of a compiled node: the offset of its state byte from the
/// start of the transducer.
///
/// Addresses are opaque outside of this crate except through `offset`, and
/// are resolved with `Fst::node`. Offsets `0` and `1` lie inside the header,
/// so no node lives there. The builder uses them as sentinels: `0` is the
/// empty final state, which is never written out, and `1` means no node has
/// been compiled yet.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CompiledAddr(usize);

impl CompiledAddr {
    /// The empty final state. Transitions into it carry a zero delta.
    pub(crate) const EMPTY: CompiledAddr = CompiledAddr(0);
    pub(crate) const NONE: CompiledAddr = CompiledAddr(1);

    /// Wraps a byte offset, typically one read back from a dump of the
    /// transducer's nodes.
    pub fn new(offset: usize) -> CompiledAddr {
        CompiledAddr(offset)
    }

    /// The byte offset of the node's state byte.
    pub fn offset(self) -> usize {
        self.0
    }

    /// Returns true for the empty final state, which has no bytes.
    pub fn is_empty_final(self) -> bool {
        self == CompiledAddr::EMPTY
    }
}

impl fmt::Debug for CompiledAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for CompiledAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Options that control how a transducer is built.
///
/// The registry is a cache of compiled nodes that lets the builder share
/// identical suffixes. It holds `registry_table_size * registry_mru_size`
/// nodes. A bigger registry produces smaller transducers at the cost of
/// memory during construction. A registry with no cells at all is allowed,
/// in which case no suffix is ever shared. Dimensions whose product does not
/// fit in a `usize` make the builder panic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BuilderOptions {
    fst_type: FstType,
    registry_table_size: usize,
    registry_mru_size: usize,
}

impl Default for BuilderOptions {
    fn default() -> BuilderOptions {
        BuilderOptions {
            fst_type: 0,
            registry_table_size: 10_000,
            registry_mru_size: 2,
        }
    }
}

impl BuilderOptions {
    /// Set the type written into the header of the transducer.
    pub fn fst_type(mut self, ty: FstType) -> BuilderOptions {
        self.fst_type = ty;
        self
    }

    /// Set the number of buckets in the node registry.
    pub fn registry_table_size(mut self, size: usize) -> BuilderOptions {
        self.registry_table_size = size;
        self
    }

    /// Set the number of nodes kept in each registry bucket.
    ///
    /// Within a bucket, the least recently used node is evicted first.
    pub fn registry_mru_size(mut self, size: usize) -> BuilderOptions {
        self.registry_mru_size = size;
        self
    }
}

/// An acyclic deterministic finite state transducer.
///
/// # How does it work?
///
/// A transducer is like a prefix trie, except that it also shares common
/// *suffixes*. Keys are spelled out by the transitions along a path from the
/// root to a final node. Each transition carries an output, and the value of
/// a key is the sum of the outputs along its path plus the final output of
/// the node it ends in.
///
/// Consider a few tag terms and their posting list offsets:
///
/// ```text
/// dc=east,1
/// dc=west,4
/// os=linux,9
/// ```
///
/// `dc=east` and `dc=west` share the path `dc=`, and the `t` that ends both
/// `east` and `west` leads to the same final node. The outputs are pushed as
/// close to the root as possible: the `d` transition carries `1`, and the
/// `w` transition carries the remaining `3`.
///
/// Looking up a key is proportional to the length of the key, not to the
/// number of keys stored. Keys can be enumerated in lexicographic order by
/// visiting the transitions of each node in order.
///
/// # Is the transducer minimal?
///
/// Not necessarily. The builder remembers compiled nodes in a bounded
/// registry, so memory use stays constant no matter how many keys are added.
/// Identical suffixes that fall out of the registry are written twice. See
/// [`BuilderOptions`](struct.BuilderOptions.html) for the knobs.
///
/// # Corruption
///
/// `Fst::new` checks only the header and trailer. Lookups and streams trust
/// the node bytes, and may panic or return garbage if those bytes are
/// corrupt. Use `Fst::verify` to check the whole buffer against its checksum.
#[derive(Clone)]
pub struct Fst<D> {
    meta: Meta,
    data: D,
}

#[derive(Clone, Debug)]
struct Meta {
    version: u64,
    root_addr: CompiledAddr,
    ty: FstType,
    len: usize,
    /// A checksum is missing when the FST version is <= 2. (Checksums were
    /// added in version 3.)
    checksum: Option<u32>,
}

impl Fst<Vec<u8>> {
    /// Create a new FST from an iterator of lexicographically ordered byte
    /// strings. Every key's value is set to `0`.
    ///
    /// If the iterator does not yield values in lexicographic order, then an
    /// error is returned.
    pub fn from_iter_set<K, I>(iter: I) -> Result<Fst<Vec<u8>>>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = K>,
    {
        let mut builder = Builder::memory();
        for k in iter {
            builder.add(k)?;
        }
        Ok(builder.into_fst())
    }

    /// Create a new FST from an iterator of lexicographically ordered byte
    /// strings. The iterator should consist of tuples, where the first element
    /// is the byte string and the second element is its corresponding value.
    ///
    /// If the iterator does not yield unique keys in lexicographic order, then
    /// an error is returned.
    pub fn from_iter_map<K, I>(iter: I) -> Result<Fst<Vec<u8>>>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, u64)>,
    {
        let mut builder = Builder::memory();
        for (k, v) in iter {
            builder.insert(k, v)?;
        }
        Ok(builder.into_fst())
    }
}

impl<D: AsRef<[u8]>> Fst<D> {
    /// Creates a transducer from its representation as a raw byte sequence.
    ///
    /// This operation is intentionally very cheap (no allocations and no
    /// copies). In particular, no verification on the integrity of the
    /// FST is performed. Callers may opt into integrity checks via the
    /// [`Fst::verify`](struct.Fst.html#method.verify) method.
    ///
    /// The fst must have been written with a compatible finite state
    /// transducer builder (`Builder` qualifies). If the format is invalid or
    /// if the version is one this crate cannot read, then an error is
    /// returned.
    pub fn new(data: D) -> Result<Fst<D>> {
        let bytes = data.as_ref();
        if bytes.len() < 32 {
            return Err(Error::Format { size: bytes.len() }.into());
        }
        let version = LittleEndian::read_u64(&bytes[0..8]);
        if version == 0 || version > VERSION {
            return Err(
                Error::Version { expected: VERSION, got: version }.into()
            );
        }
        let ty = LittleEndian::read_u64(&bytes[8..16]);

        let (end, checksum) = if version >= 3 {
            if bytes.len() < 36 {
                return Err(Error::Format { size: bytes.len() }.into());
            }
            let at = bytes.len() - 4;
            (at, Some(LittleEndian::read_u32(&bytes[at..])))
        } else {
            (bytes.len(), None)
        };
        let root_addr = CompiledAddr::new(u64_to_usize(
            LittleEndian::read_u64(&bytes[end - 8..end]),
        ));
        let len =
            u64_to_usize(LittleEndian::read_u64(&bytes[end - 16..end - 8]));

        // The root node is always the last node written, so its address is
        // one byte before the trailer. The only exception is a root that
        // compiled to the empty final state, which leaves no node bytes at
        // all.
        let trailer = bytes.len() - end + 16;
        let empty_total = 16 + trailer;
        let root_ok = if root_addr.is_empty_final() {
            bytes.len() == empty_total
        } else {
            root_addr.offset().checked_add(trailer + 1) == Some(bytes.len())
        };
        if !root_ok {
            return Err(Error::Format { size: bytes.len() }.into());
        }
        trace!(
            version,
            fst_type = ty,
            keys = len,
            root_addr = root_addr.offset(),
            bytes = bytes.len(),
            "opened fst"
        );
        let meta = Meta { version, root_addr, ty, len, checksum };
        Ok(Fst { meta, data })
    }

    /// Like `new`, but also fails unless the transducer's type equals
    /// `expected`.
    pub fn new_with_type(data: D, expected: FstType) -> Result<Fst<D>> {
        let fst = Fst::new(data)?;
        if fst.fst_type() != expected {
            return Err(
                Error::WrongType { expected, got: fst.fst_type() }.into()
            );
        }
        Ok(fst)
    }

    /// Retrieves the value associated with a key.
    ///
    /// If the key does not exist, then `None` is returned.
    #[inline]
    pub fn get<B: AsRef<[u8]>>(&self, key: B) -> Option<Output> {
        self.as_ref().get(key.as_ref())
    }

    /// Returns true if and only if the given key is in this FST.
    #[inline]
    pub fn contains_key<B: AsRef<[u8]>>(&self, key: B) -> bool {
        self.as_ref().contains_key(key.as_ref())
    }

    /// Return a lexicographically ordered stream of all key-value pairs in
    /// this fst.
    #[inline]
    pub fn stream(&self) -> Stream<'_> {
        StreamBuilder::new(self.as_ref(), AlwaysMatch).into_stream()
    }

    /// Return a builder for range queries.
    ///
    /// A range query returns a subset of key-value pairs in this fst in a
    /// range given in lexicographic order.
    #[inline]
    pub fn range(&self) -> StreamBuilder<'_> {
        StreamBuilder::new(self.as_ref(), AlwaysMatch)
    }

    /// Executes an automaton on the keys of this FST.
    #[inline]
    pub fn search<A: Automaton>(&self, aut: A) -> StreamBuilder<'_, A> {
        StreamBuilder::new(self.as_ref(), aut)
    }

    /// Executes an automaton on the keys of this FST and yields matching
    /// keys along with the corresponding matching states in the given
    /// automaton.
    #[inline]
    pub fn search_with_state<A: Automaton>(
        &self,
        aut: A,
    ) -> StreamWithStateBuilder<'_, A> {
        StreamWithStateBuilder::new(self.as_ref(), aut)
    }

    /// Returns the number of keys in this fst.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    /// Returns true if and only if this fst has no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of bytes used by this fst.
    #[inline]
    pub fn size(&self) -> usize {
        self.as_ref().size()
    }

    /// Attempts to verify this FST by computing its checksum.
    ///
    /// This will scan over all of the bytes in the underlying FST, so this
    /// may be an expensive operation depending on the size of the FST.
    ///
    /// This returns an error in two cases:
    ///
    /// 1. When a checksum does not exist, which is the case for FSTs that
    ///    were produced by a format version older than 3.
    /// 2. When the checksum does not match the bytes.
    #[inline]
    pub fn verify(&self) -> Result<()> {
        let expected = match self.as_ref().meta.checksum {
            None => return Err(Error::ChecksumMissing.into()),
            Some(expected) => expected,
        };
        let bytes = self.as_bytes();
        let got = crc32::masked_checksum(&bytes[..bytes.len() - 4]);
        if expected != got {
            warn!(expected, got, "fst checksum mismatch");
            return Err(Error::ChecksumMismatch { expected, got }.into());
        }
        Ok(())
    }

    /// Returns true if and only if the checksum stored in this FST matches
    /// its bytes.
    ///
    /// An FST without a checksum never matches.
    pub fn is_intact(&self) -> bool {
        self.verify().is_ok()
    }

    /// Returns the format version of this FST.
    #[inline]
    pub fn version(&self) -> u64 {
        self.as_ref().meta.version
    }

    /// Returns the underlying type of this fst.
    #[inline]
    pub fn fst_type(&self) -> FstType {
        self.as_ref().fst_type()
    }

    /// Returns the address of the root node of this fst.
    #[inline]
    pub fn root_addr(&self) -> CompiledAddr {
        self.as_ref().root_addr()
    }

    /// Returns the checksum stored in this FST's trailer, if any.
    #[inline]
    pub fn checksum(&self) -> Option<u32> {
        self.as_ref().meta.checksum
    }

    /// Returns the root node of this fst.
    #[inline]
    pub fn root(&self) -> Node<'_> {
        self.as_ref().root()
    }

    /// Returns the node at the given address.
    ///
    /// Node addresses can be obtained by reading transitions on `Node` values.
    #[inline]
    pub fn node(&self, addr: CompiledAddr) -> Node<'_> {
        self.as_ref().node(addr)
    }

    /// Returns a copy of the binary contents of this FST.
    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().as_bytes().to_vec()
    }

    /// Returns the binary contents of this FST.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.as_ref().as_bytes()
    }

    /// Returns the underlying data which constitutes the FST itself.
    #[inline]
    pub fn into_inner(self) -> D {
        self.data
    }

    /// Returns a borrow to the underlying data which constitutes the FST
    /// itself.
    #[inline]
    pub fn as_inner(&self) -> &D {
        &self.data
    }

    #[inline]
    fn as_ref(&self) -> FstRef<'_> {
        FstRef { meta: &self.meta, data: self.data.as_ref() }
    }
}

impl<'a, 'f, D: AsRef<[u8]>> IntoStreamer<'a> for &'f Fst<D> {
    type Item = (&'a [u8], Output);
    type Into = Stream<'f>;

    #[inline]
    fn into_stream(self) -> Stream<'f> {
        StreamBuilder::new(self.as_ref(), AlwaysMatch).into_stream()
    }
}

/// A borrowed view of an FST, shared by lookups and streams.
#[derive(Clone, Copy)]
struct FstRef<'f> {
    meta: &'f Meta,
    data: &'f [u8],
}

impl<'f> FstRef<'f> {
    #[inline]
    fn get(&self, key: &[u8]) -> Option<Output> {
        let mut node = self.root();
        let mut out = Output::zero();
        for &b in key {
            node = match node.find_input(b) {
                None => return None,
                Some(i) => {
                    let t = node.transition(i);
                    out = out.cat(t.out);
                    self.node(t.addr)
                }
            }
        }
        if !node.is_final() {
            None
        } else {
            Some(out.cat(node.final_output()))
        }
    }

    #[inline]
    fn contains_key(&self, key: &[u8]) -> bool {
        let mut node = self.root();
        for &b in key {
            node = match node.find_input(b) {
                None => return false,
                Some(i) => self.node(node.transition_addr(i)),
            }
        }
        node.is_final()
    }

    #[inline]
    fn len(&self) -> usize {
        self.meta.len
    }

    #[inline]
    fn size(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    fn fst_type(&self) -> FstType {
        self.meta.ty
    }

    #[inline]
    fn root_addr(&self) -> CompiledAddr {
        self.meta.root_addr
    }

    #[inline]
    fn root(&self) -> Node<'f> {
        self.node(self.root_addr())
    }

    #[inline]
    fn node(&self, addr: CompiledAddr) -> Node<'f> {
        Node::new(self.meta.version, addr, self.as_bytes())
    }

    #[inline]
    fn as_bytes(&self) -> &'f [u8] {
        self.data
    }

    #[inline]
    fn empty_final_output(&self) -> Option<Output> {
        let root = self.root();
        if root.is_final() {
            Some(root.final_output())
        } else {
            None
        }
    }
}

/// A builder for constructing range queries on streams.
///
/// Once all bounds are set, one should call `into_stream` to get a
/// `Stream`.
///
/// Bounds are not additive. That is, if `ge` is called twice on the same
/// builder, then the second setting wins.
///
/// The `A` type parameter corresponds to an optional automaton to filter
/// the stream. By default, no filtering is done.
///
/// The `'f` lifetime parameter refers to the lifetime of the underlying fst.
pub struct StreamBuilder<'f, A = AlwaysMatch> {
    fst: FstRef<'f>,
    aut: A,
    min: Bound,
    max: Bound,
}

impl<'f, A: Automaton> StreamBuilder<'f, A> {
    fn new(fst: FstRef<'f>, aut: A) -> StreamBuilder<'f, A> {
        StreamBuilder {
            fst,
            aut,
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }

    /// Specify a greater-than-or-equal-to bound.
    pub fn ge<T: AsRef<[u8]>>(mut self, bound: T) -> StreamBuilder<'f, A> {
        self.min = Bound::Included(bound.as_ref().to_owned());
        self
    }

    /// Specify a greater-than bound.
    pub fn gt<T: AsRef<[u8]>>(mut self, bound: T) -> StreamBuilder<'f, A> {
        self.min = Bound::Excluded(bound.as_ref().to_owned());
        self
    }

    /// Specify a less-than-or-equal-to bound.
    pub fn le<T: AsRef<[u8]>>(mut self, bound: T) -> StreamBuilder<'f, A> {
        self.max = Bound::Included(bound.as_ref().to_owned());
        self
    }

    /// Specify a less-than bound.
    pub fn lt<T: AsRef<[u8]>>(mut self, bound: T) -> StreamBuilder<'f, A> {
        self.max = Bound::Excluded(bound.as_ref().to_owned());
        self
    }
}

impl<'a, 'f, A: Automaton> IntoStreamer<'a> for StreamBuilder<'f, A> {
    type Item = (&'a [u8], Output);
    type Into = Stream<'f, A>;

    fn into_stream(self) -> Stream<'f, A> {
        Stream::new(self.fst, self.aut, self.min, self.max)
    }
}

/// A builder for constructing range queries on streams that include automaton
/// states.
///
/// In general, one should use `StreamBuilder` unless you have a specific need
/// for accessing the states of the underlying automaton that is being used to
/// filter this stream.
///
/// Once all bounds are set, one should call `into_stream` to get a
/// `StreamWithState`.
///
/// Bounds are not additive. That is, if `ge` is called twice on the same
/// builder, then the second setting wins.
///
/// The `'f` lifetime parameter refers to the lifetime of the underlying fst.
pub struct StreamWithStateBuilder<'f, A = AlwaysMatch> {
    fst: FstRef<'f>,
    aut: A,
    min: Bound,
    max: Bound,
}

impl<'f, A: Automaton> StreamWithStateBuilder<'f, A> {
    fn new(fst: FstRef<'f>, aut: A) -> StreamWithStateBuilder<'f, A> {
        StreamWithStateBuilder {
            fst,
            aut,
            min: Bound::Unbounded,
            max: Bound::Unbounded,
        }
    }

    /// Specify a greater-than-or-equal-to bound.
    pub fn ge<T: AsRef<[u8]>>(
        mut self,
        bound: T,
    ) -> StreamWithStateBuilder<'f, A> {
        self.min = Bound::Included(bound.as_ref().to_owned());
        self
    }

    /// Specify a greater-than bound.
    pub fn gt<T: AsRef<[u8]>>(
        mut self,
        bound: T,
    ) -> StreamWithStateBuilder<'f, A> {
        self.min = Bound::Excluded(bound.as_ref().to_owned());
        self
    }

    /// Specify a less-than-or-equal-to bound.
    pub fn le<T: AsRef<[u8]>>(
        mut self,
        bound: T,
    ) -> StreamWithStateBuilder<'f, A> {
        self.max = Bound::Included(bound.as_ref().to_owned());
        self
    }

    /// Specify a less-than bound.
    pub fn lt<T: AsRef<[u8]>>(
        mut self,
        bound: T,
    ) -> StreamWithStateBuilder<'f, A> {
        self.max = Bound::Excluded(bound.as_ref().to_owned());
        self
    }
}

impl<'a, 'f, A: 'a + Automaton> IntoStreamer<'a>
    for StreamWithStateBuilder<'f, A>
where
    A::State: Clone,
{
    type Item = (&'a [u8], Output, A::State);
    type Into = StreamWithState<'f, A>;

    fn into_stream(self) -> StreamWithState<'f, A> {
        StreamWithState::new(self.fst, self.aut, self.min, self.max)
    }
}

#[derive(Debug)]
enum Bound {
    Included(Vec<u8>),
    Excluded(Vec<u8>),
    Unbounded,
}

impl Bound {
    #[inline]
    fn exceeded_by(&self, inp: &[u8]) -> bool {
        match *self {
            Bound::Included(ref v) => inp > v,
            Bound::Excluded(ref v) => inp >= v,
            Bound::Unbounded => false,
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        match *self {
            Bound::Included(ref v) => v.is_empty(),
            Bound::Excluded(ref v) => v.is_empty(),
            Bound::Unbounded => true,
        }
    }

    #[inline]
    fn is_inclusive(&self) -> bool {
        match *self {
            Bound::Excluded(_) => false,
            _ => true,
        }
    }
}

/// A lexicographically ordered stream of key-value pairs from an fst.
///
/// The `A` type parameter corresponds to an optional automaton to filter
/// the stream. By default, no filtering is done.
///
/// The `'f` lifetime parameter refers to the lifetime of the underlying fst.
pub struct Stream<'f, A: Automaton = AlwaysMatch>(StreamWithState<'f, A>);

impl<'f, A: Automaton> Stream<'f, A> {
    fn new(fst: FstRef<'f>, aut: A, min: Bound, max: Bound) -> Stream<'f, A> {
        Stream(StreamWithState::new(fst, aut, min, max))
    }

    /// Convert this stream into a vector of byte strings and outputs.
    ///
    /// Note that this creates a new allocation for every key in the stream.
    pub fn into_byte_vec(mut self) -> Vec<(Vec<u8>, u64)> {
        let mut vs = vec![];
        while let Some((k, v)) = self.next() {
            vs.push((k.to_vec(), v.value()));
        }
        vs
    }

    /// Convert this stream into a vector of Unicode strings and outputs.
    ///
    /// If any key is not valid UTF-8, then iteration on the stream is stopped
    /// and a UTF-8 decoding error is returned.
    ///
    /// Note that this creates a new allocation for every key in the stream.
    pub fn into_str_vec(mut self) -> Result<Vec<(String, u64)>> {
        let mut vs = vec![];
        while let Some((k, v)) = self.next() {
            let k = String::from_utf8(k.to_vec()).map_err(Error::from)?;
            vs.push((k, v.value()));
        }
        Ok(vs)
    }

    /// Convert this stream into a vector of byte strings.
    ///
    /// Note that this creates a new allocation for every key in the stream.
    pub fn into_byte_keys(mut self) -> Vec<Vec<u8>> {
        let mut vs = vec![];
        while let Some((k, _)) = self.next() {
            vs.push(k.to_vec());
        }
        vs
    }

    /// Convert this stream into a vector of Unicode strings.
    ///
    /// If any key is not valid UTF-8, then iteration on the stream is stopped
    /// and a UTF-8 decoding error is returned.
    ///
    /// Note that this creates a new allocation for every key in the stream.
    pub fn into_str_keys(mut self) -> Result<Vec<String>> {
        let mut vs = vec![];
        while let Some((k, _)) = self.next() {
            let k = String::from_utf8(k.to_vec()).map_err(Error::from)?;
            vs.push(k);
        }
        Ok(vs)
    }

    /// Convert this stream into a vector of outputs.
    pub fn into_values(mut self) -> Vec<u64> {
        let mut vs = vec![];
        while let Some((_, v)) = self.next() {
            vs.push(v.value());
        }
        vs
    }
}

impl<'f, 'a, A: Automaton> Streamer<'a> for Stream<'f, A> {
    type Item = (&'a [u8], Output);

    fn next(&'a mut self) -> Option<(&'a [u8], Output)> {
        self.0.next_with(|_| ()).map(|(key, out, _)| (key, out))
    }
}

/// A lexicographically ordered stream of key-value-state triples from an fst
/// and an automaton.
///
/// The key-values are from the underlying FST while the states are from the
/// automaton.
///
/// The `A` type parameter corresponds to an optional automaton to filter
/// the stream. By default, no filtering is done.
///
/// The `'f` lifetime parameter refers to the lifetime of the underlying fst.
pub struct StreamWithState<'f, A = AlwaysMatch>
where
    A: Automaton,
{
    fst: FstRef<'f>,
    aut: A,
    /// The key spelled by the transitions taken so far.
    inp: Vec<u8>,
    /// Set when the empty key must be reported before anything else.
    empty_output: Option<Output>,
    stack: Vec<StreamState<'f, A::State>>,
    end_at: Bound,
}

/// A resumable position in a traversal: the next transition of `node` to
/// visit, the output accumulated on the way to `node` and the automaton
/// state reached there.
#[derive(Clone, Debug)]
struct StreamState<'f, S> {
    node: Node<'f>,
    trans: usize,
    out: Output,
    aut_state: S,
}

impl<'f, A: Automaton> StreamWithState<'f, A> {
    fn new(
        fst: FstRef<'f>,
        aut: A,
        min: Bound,
        max: Bound,
    ) -> StreamWithState<'f, A> {
        let mut rdr = StreamWithState {
            fst,
            aut,
            inp: Vec::with_capacity(16),
            empty_output: None,
            stack: vec![],
            end_at: max,
        };
        rdr.seek_min(min);
        rdr
    }

    /// Seeks the underlying stream such that the next key to be read is the
    /// smallest key in the underlying fst that satisfies the given minimum
    /// bound.
    ///
    /// The stack left behind must look exactly as if the stream had walked
    /// to that key on its own, automaton states included.
    fn seek_min(&mut self, min: Bound) {
        if min.is_empty() {
            if min.is_inclusive() {
                self.empty_output = self.fst.empty_final_output();
            }
            self.stack = vec![StreamState {
                node: self.fst.root(),
                trans: 0,
                out: Output::zero(),
                aut_state: self.aut.start(),
            }];
            return;
        }
        let (key, inclusive) = match min {
            Bound::Excluded(ref min) => (min, false),
            Bound::Included(ref min) => (min, true),
            Bound::Unbounded => unreachable!(),
        };
        // Walk as much of `key` as the FST has, pushing a frame for each
        // node passed. Each frame resumes just after the transition taken,
        // with the automaton state from before that transition.
        let mut node = self.fst.root();
        let mut out = Output::zero();
        let mut aut_state = self.aut.start();
        for &b in key {
            match node.find_input(b) {
                Some(i) => {
                    let t = node.transition(i);
                    let next_state = self.aut.accept(&aut_state, b);
                    self.inp.push(b);
                    self.stack.push(StreamState {
                        node,
                        trans: i + 1,
                        out,
                        aut_state,
                    });
                    aut_state = next_state;
                    out = out.cat(t.out);
                    node = self.fst.node(t.addr);
                }
                None => {
                    // `key` diverges from every key in the FST here. Every
                    // key greater than it starts with a transition on a
                    // byte greater than `b`.
                    self.stack.push(StreamState {
                        node,
                        trans: node
                            .transitions()
                            .position(|t| t.inp > b)
                            .unwrap_or_else(|| node.len()),
                        out,
                        aut_state,
                    });
                    return;
                }
            }
        }
        if !self.stack.is_empty() {
            let last = self.stack.len() - 1;
            if inclusive {
                // Step back so the transition into `key` is taken again,
                // which reports `key` itself if it is final.
                self.stack[last].trans -= 1;
                self.inp.pop();
            } else {
                // Skip `key` itself, but visit everything below it.
                let node = self.stack[last].node;
                let trans = self.stack[last].trans;
                self.stack.push(StreamState {
                    node: self.fst.node(node.transition(trans - 1).addr),
                    trans: 0,
                    out,
                    aut_state,
                });
            }
        }
    }

    fn next_with<T>(
        &mut self,
        mut map: impl FnMut(&A::State) -> T,
    ) -> Option<(&[u8], Output, T)> {
        if let Some(out) = self.empty_output.take() {
            if self.end_at.exceeded_by(&[]) {
                self.stack.clear();
                return None;
            }
            let start = self.aut.start();
            if self.aut.is_match(&start) {
                return Some((&[], out, map(&start)));
            }
        }
        while let Some(state) = self.stack.pop() {
            if state.trans >= state.node.len()
                || !self.aut.can_match(&state.aut_state)
            {
                if state.node.addr() != self.fst.root_addr() {
                    self.inp.pop();
                }
                continue;
            }
            let trans = state.node.transition(state.trans);
            let out = state.out.cat(trans.out);
            let next_state = self.aut.accept(&state.aut_state, trans.inp);
            let t = map(&next_state);
            let mut is_match = self.aut.is_match(&next_state);
            let next_node = self.fst.node(trans.addr);
            self.inp.push(trans.inp);
            if next_node.is_final() {
                if let Some(eof_state) = self.aut.accept_eof(&next_state) {
                    is_match = self.aut.is_match(&eof_state);
                }
            }
            self.stack.push(StreamState { trans: state.trans + 1, ..state });
            self.stack.push(StreamState {
                node: next_node,
                trans: 0,
                out,
                aut_state: next_state,
            });
            if self.end_at.exceeded_by(&self.inp) {
                // Keys only grow from here, so the stream is done for good.
                self.stack.clear();
                return None;
            }
            if next_node.is_final() && is_match {
                let out = out.cat(next_node.final_output());
                return Some((&self.inp, out, t));
            }
        }
        None
    }
}

impl<'a, 'f, A: 'a + Automaton> Streamer<'a> for StreamWithState<'f, A>
where
    A::State: Clone,
{
    type Item = (&'a [u8], Output, A::State);

    fn next(&'a mut self) -> Option<(&'a [u8], Output, A::State)> {
        self.next_with(|state| state.clone())
    }
}

/// An output is a value that is associated with a key in a finite state
/// transducer.
///
/// Outputs form a simple algebra: an additive identity (`zero`), `cat`
/// (addition), `prefix` (the minimum of two outputs) and `sub`. The builder
/// uses `prefix` and `sub` to push outputs as close to the root as possible.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd,
)]
pub struct Output(u64);

impl Output {
    /// Create a new output from a `u64`.
    #[inline]
    pub fn new(v: u64) -> Output {
        Output(v)
    }

    /// Create a zero output.
    #[inline]
    pub fn zero() -> Output {
        Output(0)
    }

    /// Retrieve the value inside this output.
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Returns true if this is a zero output.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns the prefix of this output and `o`.
    #[inline]
    pub fn prefix(self, o: Output) -> Output {
        Output(cmp::min(self.0, o.0))
    }

    /// Returns the concatenation of this output and `o`.
    #[inline]
    pub fn cat(self, o: Output) -> Output {
        Output(self.0 + o.0)
    }

    /// Returns the subtraction of `o` from this output.
    ///
    /// This function panics if `self < o`.
    #[inline]
    pub fn sub(self, o: Output) -> Output {
        match self.0.checked_sub(o.0) {
            Some(v) => Output(v),
            None => panic!("output underflow: {} - {}", self.0, o.0),
        }
    }
}

/// A transition from one node to another.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct Transition {
    /// The byte input associated with this transition.
    pub inp: u8,
    /// The output associated with this transition.
    pub out: Output,
    /// The address of the node that this transition points to.
    pub addr: CompiledAddr,
}

impl Default for Transition {
    #[inline]
    fn default() -> Transition {
        Transition { inp: 0, out: Output::zero(), addr: CompiledAddr::NONE }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.out.is_zero() {
            write!(f, "{} -> {}", self.inp as char, self.addr)
        } else {
            write!(
                f,
                "({}, {}) -> {}",
                self.inp as char,
                self.out.value(),
                self.addr
            )
        }
    }
}
