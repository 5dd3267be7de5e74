use std::cmp::Ordering;
use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::error::Result;
use crate::raw::counting_writer::CountingWriter;
use crate::raw::error::Error;
use crate::raw::pack::u64_to_usize;
use crate::raw::registry::{Registry, RegistryEntry};
use crate::raw::{
    BuilderOptions, CompiledAddr, Fst, FstType, Output, Transition, VERSION,
};
use crate::stream::{IntoStreamer, Streamer};

/// A builder for creating a finite state transducer.
///
/// Keys must be added in lexicographic order. Adding a key out of order, or
/// adding the same key twice with an output, results in an error. Once a key
/// is associated with a value, that association can never be modified or
/// deleted.
///
/// The transducer is streamed to *any* `io::Write` as it is built, so an
/// index can be written straight to a file without holding it in memory.
/// For an in memory representation, use `Builder::memory`.
///
/// Memory use is bounded by the node registry, whose size is set through
/// [`BuilderOptions`](struct.BuilderOptions.html). A larger registry finds
/// more shared suffixes and so produces a smaller transducer.
pub struct Builder<W> {
    /// Nodes are written here as soon as they are frozen. No buffering.
    wtr: CountingWriter<W>,
    /// The not yet written nodes along the most recent key.
    frontier: Frontier,
    /// Recently written nodes, used to share suffixes.
    registry: Registry,
    last_key: Option<Vec<u8>>,
    /// Where the most recently written node ended.
    ///
    /// A single transition that points here needs no stored target.
    last_addr: CompiledAddr,
    len: usize,
}

/// A node that has not yet been written.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct BuilderNode {
    pub is_final: bool,
    pub final_output: Output,
    pub trans: Vec<Transition>,
}

/// The path spelled by the most recently added key, root first.
///
/// Every node on it except the deepest has an open edge: the transition
/// taken by that key. An open edge may still gain siblings after it and may
/// still give part of its output to the node below, so it has no target
/// until the node below is frozen.
#[derive(Debug)]
struct Frontier {
    path: Vec<Pending>,
}

#[derive(Debug)]
struct Pending {
    node: BuilderNode,
    open: Option<OpenEdge>,
}

#[derive(Clone, Copy, Debug)]
struct OpenEdge {
    inp: u8,
    out: Output,
}

impl Builder<Vec<u8>> {
    /// Create a builder that builds an fst in memory.
    #[inline]
    pub fn memory() -> Builder<Vec<u8>> {
        Builder::memory_with_options(BuilderOptions::default())
    }

    /// Create an in memory builder with the given options.
    ///
    /// # Panics
    ///
    /// When the registry dimensions in `opts` multiply past `usize::MAX`.
    pub fn memory_with_options(opts: BuilderOptions) -> Builder<Vec<u8>> {
        let wtr = Vec::with_capacity(10 * (1 << 10));
        match Builder::with_options(wtr, opts) {
            Ok(builder) => builder,
            Err(err) => panic!("writing to a Vec cannot fail: {}", err),
        }
    }

    /// Finishes construction of the FST and returns it.
    ///
    /// Writing to a `Vec<u8>` never fails, and the bytes produced here are
    /// always a valid FST, so this does not return a `Result`.
    #[inline]
    pub fn into_fst(self) -> Fst<Vec<u8>> {
        match self.into_inner().and_then(Fst::new) {
            Ok(fst) => fst,
            Err(err) => panic!("in memory FST failed to build: {}", err),
        }
    }
}

impl<W: io::Write> Builder<W> {
    /// Create a builder that builds an fst by writing it to `wtr` in a
    /// streaming fashion.
    pub fn new(wtr: W) -> Result<Builder<W>> {
        Builder::with_options(wtr, BuilderOptions::default())
    }

    /// The same as `new`, except it sets the type of the fst to the type
    /// given.
    pub fn new_type(wtr: W, ty: FstType) -> Result<Builder<W>> {
        Builder::with_options(wtr, BuilderOptions::default().fst_type(ty))
    }

    /// Create a builder with the given options.
    ///
    /// This writes the header immediately, so it fails if `wtr` does.
    ///
    /// # Panics
    ///
    /// When the registry dimensions in `opts` multiply past `usize::MAX`.
    pub fn with_options(wtr: W, opts: BuilderOptions) -> Result<Builder<W>> {
        let mut wtr = CountingWriter::new(wtr);
        // The header covers addresses 0 through 15, which keeps the two
        // sentinel addresses from ever naming a real node.
        wtr.write_u64::<LittleEndian>(VERSION)?;
        wtr.write_u64::<LittleEndian>(opts.fst_type)?;
        Ok(Builder {
            wtr,
            frontier: Frontier::new(),
            registry: Registry::new(
                opts.registry_table_size,
                opts.registry_mru_size,
            ),
            last_key: None,
            last_addr: CompiledAddr::NONE,
            len: 0,
        })
    }

    /// Adds a byte string to this FST with a zero output value.
    ///
    /// Adding a key equal to the previous one is a no-op.
    pub fn add<B>(&mut self, bs: B) -> Result<()>
    where
        B: AsRef<[u8]>,
    {
        let key = bs.as_ref();
        self.check_order(key, true)?;
        self.push_key(key, None)
    }

    /// Insert a new key-value pair into the fst.
    ///
    /// If a key is inserted that is less than or equal to any previous key
    /// added, then an error is returned. Similarly, if there was a problem
    /// writing to the underlying writer, an error is returned.
    pub fn insert<B>(&mut self, bs: B, val: u64) -> Result<()>
    where
        B: AsRef<[u8]>,
    {
        let key = bs.as_ref();
        self.check_order(key, false)?;
        self.push_key(key, Some(Output::new(val)))
    }

    /// Calls insert on each item in the iterator.
    ///
    /// If an error occurred while adding an element, processing is stopped
    /// and the error is returned.
    pub fn extend_iter<T, I>(&mut self, iter: I) -> Result<()>
    where
        T: AsRef<[u8]>,
        I: IntoIterator<Item = (T, Output)>,
    {
        iter.into_iter()
            .try_for_each(|(key, out)| self.insert(key, out.value()))
    }

    /// Calls insert on each item in the stream.
    ///
    /// Note that unlike `extend_iter`, this is not generic on the items in
    /// the stream.
    pub fn extend_stream<'f, I, S>(&mut self, stream: I) -> Result<()>
    where
        I: for<'a> IntoStreamer<'a, Into = S, Item = (&'a [u8], Output)>,
        S: 'f + for<'a> Streamer<'a, Item = (&'a [u8], Output)>,
    {
        let mut stream = stream.into_stream();
        while let Some((key, out)) = stream.next() {
            self.insert(key, out.value())?;
        }
        Ok(())
    }

    /// Finishes the construction of the fst and flushes the underlying
    /// writer. After completion, the data written to `W` may be read using
    /// `Fst::new`.
    pub fn finish(self) -> Result<()> {
        self.into_inner().map(drop)
    }

    /// Just like `finish`, except it returns the underlying writer after
    /// flushing it.
    pub fn into_inner(mut self) -> Result<W> {
        self.freeze_below(0)?;
        let root = self.frontier.pop_root();
        let root_addr = self.compile(&root)?;

        // The checksum covers everything before it, trailer included.
        self.wtr.write_u64::<LittleEndian>(self.len as u64)?;
        self.wtr.write_u64::<LittleEndian>(root_addr.offset() as u64)?;
        let sum = self.wtr.masked_checksum();
        self.wtr.write_u32::<LittleEndian>(sum)?;
        self.wtr.flush()?;
        debug!(
            keys = self.len,
            root_addr = root_addr.offset(),
            bytes = self.wtr.count(),
            "finished building fst"
        );
        Ok(self.wtr.into_inner())
    }

    /// Gets a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.wtr.get_ref()
    }

    /// Returns the number of bytes written to the underlying writer.
    pub fn bytes_written(&self) -> u64 {
        self.wtr.count()
    }

    fn push_key(&mut self, key: &[u8], out: Option<Output>) -> Result<()> {
        if key.is_empty() {
            // The empty key sorts first, so nothing was added before it.
            self.len = 1;
            self.frontier.finalize_root(out.unwrap_or_else(Output::zero));
            return Ok(());
        }
        let (depth, rest) = self.frontier.walk_shared(key, out);
        if depth == key.len() {
            // `add` of the previous key again.
            return Ok(());
        }
        self.len += 1;
        self.freeze_below(depth)?;
        self.frontier.extend(&key[depth..], rest);
        Ok(())
    }

    /// Writes every frontier node deeper than `depth`, deepest first, then
    /// closes the open edge at `depth` onto what was written.
    fn freeze_below(&mut self, depth: usize) -> Result<()> {
        let mut child = None;
        while self.frontier.path.len() > depth + 1 {
            let mut pending = self.frontier.pop();
            match child {
                Some(addr) => pending.close(addr),
                None => assert!(pending.open.is_none()),
            }
            child = Some(self.compile(&pending.node)?);
        }
        if let Some(addr) = child {
            self.frontier.top().close(addr);
        }
        Ok(())
    }

    fn compile(&mut self, node: &BuilderNode) -> Result<CompiledAddr> {
        if *node == BuilderNode::empty_final() {
            return Ok(CompiledAddr::EMPTY);
        }
        let cell = match self.registry.entry(node) {
            RegistryEntry::Found(addr) => return Ok(addr),
            RegistryEntry::NotFound(cell) => Some(cell),
            RegistryEntry::Rejected => None,
        };
        let start = u64_to_usize(self.wtr.count());
        node.compile_to(&mut self.wtr, self.last_addr, start)?;
        let end = u64_to_usize(self.wtr.count());
        self.last_addr = CompiledAddr::new(end - 1);
        if let Some(cell) = cell {
            cell.insert(self.last_addr);
        }
        Ok(self.last_addr)
    }

    fn check_order(&mut self, key: &[u8], allow_repeat: bool) -> Result<()> {
        let last = match self.last_key.as_mut() {
            None => {
                self.last_key = Some(key.to_vec());
                return Ok(());
            }
            Some(last) => last,
        };
        match key.cmp(last) {
            Ordering::Less => {
                debug!(
                    previous = ?&**last,
                    key = ?key,
                    "rejected out of order key"
                );
                let previous = last.to_vec();
                Err(Error::OutOfOrder { previous, got: key.to_vec() }.into())
            }
            Ordering::Equal if !allow_repeat => {
                debug!(key = ?key, "rejected duplicate key");
                Err(Error::DuplicateKey { got: key.to_vec() }.into())
            }
            Ordering::Equal => Ok(()),
            Ordering::Greater => {
                last.clear();
                last.extend_from_slice(key);
                Ok(())
            }
        }
    }
}

impl BuilderNode {
    /// A final node with no transitions and no output. It is never written;
    /// transitions to it use `CompiledAddr::EMPTY`.
    fn empty_final() -> BuilderNode {
        BuilderNode { is_final: true, ..BuilderNode::default() }
    }
}

impl Frontier {
    fn new() -> Frontier {
        let mut path = Vec::with_capacity(64);
        path.push(Pending::new(false));
        Frontier { path }
    }

    fn pop(&mut self) -> Pending {
        match self.path.pop() {
            Some(pending) => pending,
            None => panic!("frontier lost its root"),
        }
    }

    fn top(&mut self) -> &mut Pending {
        match self.path.last_mut() {
            Some(pending) => pending,
            None => panic!("frontier lost its root"),
        }
    }

    fn pop_root(&mut self) -> BuilderNode {
        assert_eq!(self.path.len(), 1, "frontier still holds unfrozen nodes");
        let root = self.pop();
        assert!(root.open.is_none());
        root.node
    }

    fn finalize_root(&mut self, out: Output) {
        let root = &mut self.path[0].node;
        root.is_final = true;
        root.final_output = out;
    }

    /// Follows open edges for as long as they spell a prefix of `key`.
    ///
    /// With an output, each edge followed keeps only what it shares with the
    /// new key, and its surplus moves onto the node below. Returns how many
    /// edges were followed and the part of the output still unplaced.
    fn walk_shared(
        &mut self,
        key: &[u8],
        out: Option<Output>,
    ) -> (usize, Output) {
        let mut rest = out.unwrap_or_else(Output::zero);
        let mut depth = 0;
        while depth < key.len() {
            let edge = match self.path[depth].open.as_mut() {
                Some(edge) if edge.inp == key[depth] => edge,
                _ => break,
            };
            depth += 1;
            if out.is_none() {
                continue;
            }
            let shared = edge.out.prefix(rest);
            let surplus = edge.out.sub(shared);
            edge.out = shared;
            rest = rest.sub(shared);
            if !surplus.is_zero() {
                self.path[depth].prepend_output(surplus);
            }
        }
        (depth, rest)
    }

    /// Hangs a chain spelling `suffix` off the deepest node. The first edge
    /// carries `out` and the chain ends in a final node.
    fn extend(&mut self, suffix: &[u8], out: Output) {
        let (&first, rest) = match suffix.split_first() {
            Some(split) => split,
            None => return,
        };
        let top = self.top();
        assert!(top.open.is_none());
        top.open = Some(OpenEdge { inp: first, out });
        self.path.extend(rest.iter().map(|&inp| Pending {
            node: BuilderNode::default(),
            open: Some(OpenEdge { inp, out: Output::zero() }),
        }));
        self.path.push(Pending::new(true));
    }
}

impl Pending {
    fn new(is_final: bool) -> Pending {
        let node = BuilderNode { is_final, ..BuilderNode::default() };
        Pending { node, open: None }
    }

    /// Turns the open edge, if any, into a transition to `addr`.
    fn close(&mut self, addr: CompiledAddr) {
        if let Some(OpenEdge { inp, out }) = self.open.take() {
            self.node.trans.push(Transition { inp, out, addr });
        }
    }

    fn prepend_output(&mut self, prefix: Output) {
        if self.node.is_final {
            self.node.final_output = prefix.cat(self.node.final_output);
        }
        let open = self.open.iter_mut().map(|e| &mut e.out);
        for out in self.node.trans.iter_mut().map(|t| &mut t.out).chain(open) {
            *out = prefix.cat(*out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Builder;
    use crate::raw::{BuilderOptions, CompiledAddr, Output};

    /// The closed inputs and the open input of every frontier node.
    fn frontier(b: &Builder<Vec<u8>>) -> Vec<(Vec<u8>, Option<u8>)> {
        b.frontier
            .path
            .iter()
            .map(|p| {
                let closed = p.node.trans.iter().map(|t| t.inp).collect();
                (closed, p.open.map(|e| e.inp))
            })
            .collect()
    }

    #[test]
    fn frontier_follows_last_key() {
        let mut b = Builder::memory();
        b.insert("abc", 1).unwrap();
        // root, a, b, c (final)
        assert_eq!(b.frontier.path.len(), 4);
        b.insert("abd", 2).unwrap();
        assert_eq!(b.frontier.path.len(), 4);
        let path = frontier(&b);
        assert_eq!(path[2], (vec![b'c'], Some(b'd')));
        assert_eq!(path[0], (vec![], Some(b'a')));
        assert_eq!(path[3], (vec![], None));
    }

    #[test]
    fn shorter_key_after_longer_freezes_the_tail() {
        let mut b = Builder::memory();
        b.insert("abcd", 1).unwrap();
        b.insert("ax", 2).unwrap();
        let path = frontier(&b);
        assert_eq!(path.len(), 3);
        assert_eq!(path[1], (vec![b'b'], Some(b'x')));
        assert_ne!(b.frontier.path[1].node.trans[0].addr, CompiledAddr::NONE);
    }

    #[test]
    fn outputs_move_down_on_shared_prefix() {
        let mut b = Builder::memory();
        b.insert("ab", 5).unwrap();
        b.insert("ac", 3).unwrap();
        let path = &b.frontier.path;
        assert_eq!(path[0].open.unwrap().out, Output::new(3));
        // "ab" keeps the remaining 2 on its frozen edge.
        assert_eq!(path[1].node.trans[0].out, Output::new(2));
        assert_eq!(path[1].open.unwrap().out, Output::zero());
    }

    #[test]
    fn add_leaves_outputs_in_place() {
        let mut b = Builder::memory();
        b.insert("ab", 5).unwrap();
        b.add("ac").unwrap();
        let path = &b.frontier.path;
        assert_eq!(path[0].open.unwrap().out, Output::new(5));
        assert_eq!(path[1].node.trans[0].out, Output::zero());
    }

    #[test]
    fn repeated_add_is_ignored() {
        let mut b = Builder::memory();
        b.add("a").unwrap();
        b.add("a").unwrap();
        b.add("b").unwrap();
        let fst = b.into_fst();
        assert_eq!(fst.len(), 2);
    }

    #[test]
    fn bytes_written_counts_header() {
        let b = Builder::new(vec![]).unwrap();
        assert_eq!(b.bytes_written(), 16);
        assert_eq!(b.get_ref().len(), 16);
    }

    #[test]
    fn zero_registry_still_builds() {
        let opts = BuilderOptions::default()
            .registry_table_size(0)
            .registry_mru_size(0);
        let mut b = Builder::memory_with_options(opts);
        b.insert("xa", 1).unwrap();
        b.insert("ya", 1).unwrap();
        let fst = b.into_fst();
        assert_eq!(fst.get("xa"), Some(Output::new(1)));
        assert_eq!(fst.get("ya"), Some(Output::new(1)));
        assert_eq!(fst.len(), 2);
    }

    #[test]
    #[should_panic(expected = "overflows usize")]
    fn oversized_registry_is_refused() {
        let opts = BuilderOptions::default()
            .registry_table_size(usize::MAX)
            .registry_mru_size(2);
        Builder::memory_with_options(opts);
    }
}
