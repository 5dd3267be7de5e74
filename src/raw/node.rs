use std::cmp;
use std::fmt;
use std::io;
use std::ops::Range;

use byteorder::WriteBytesExt;

use crate::raw::build::BuilderNode;
use crate::raw::common_inputs::{COMMON_INPUTS, COMMON_INPUTS_INV};
use crate::raw::pack::{
    pack_delta_in, pack_delta_size, pack_size, pack_uint_in, unpack_delta,
    unpack_uint,
};
use crate::raw::{CompiledAddr, Output, Transition};

/// Nodes with more transitions than this carry a 256 byte table mapping each
/// input byte to its transition index.
pub(crate) const TRANS_INDEX_THRESHOLD: usize = 32;

/// The low six bits of a state byte hold either a common input code or a
/// transition count.
const PAYLOAD_MAX: u8 = 0b00_111111;

/// Set in the state byte of a final `AnyTrans` node.
const FINAL_FLAG: u8 = 0b01_000000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kind {
    /// A single transition with a zero output into the node compiled right
    /// before this one. Only the input byte is stored.
    OneTransNext,
    /// A single transition with an explicit target and output.
    OneTrans,
    /// Any number of transitions. The only shape that can be final.
    AnyTrans,
    /// Final, no transitions, zero output. Occupies no bytes.
    EmptyFinal,
}

/// How one node encoding is recognized by its state byte and decoded.
struct Shape {
    kind: Kind,
    label: &'static str,
    mask: u8,
    tag: u8,
    decode: fn(&[u8], usize, u64) -> Layout,
}

/// Exactly one shape matches any state byte.
static SHAPES: [Shape; 3] = [
    Shape {
        kind: Kind::OneTransNext,
        label: "OTN",
        mask: 0b11_000000,
        tag: 0b11_000000,
        decode: decode_one_trans_next,
    },
    Shape {
        kind: Kind::OneTrans,
        label: "OT",
        mask: 0b11_000000,
        tag: 0b10_000000,
        decode: decode_one_trans,
    },
    Shape {
        kind: Kind::AnyTrans,
        label: "AT",
        mask: 0b10_000000,
        tag: 0b00_000000,
        decode: decode_any_trans,
    },
];

impl Kind {
    fn shape(self) -> Option<&'static Shape> {
        SHAPES.iter().find(|shape| shape.kind == self)
    }

    fn label(self) -> &'static str {
        self.shape().map_or("EF", |shape| shape.label)
    }
}

fn shape_of(state: u8) -> &'static Shape {
    for shape in SHAPES.iter() {
        if state & shape.mask == shape.tag {
            return shape;
        }
    }
    &SHAPES[SHAPES.len() - 1]
}

/// Where the parts of a compiled node live.
///
/// Every offset is absolute and names the lowest byte of its section.
/// Sections hold one entry per transition, last transition first, so entry
/// `i` sits `ntrans - 1 - i` entries above the section offset.
#[derive(Clone, Copy, Debug)]
struct Layout {
    kind: Kind,
    ntrans: usize,
    is_final: bool,
    final_output: Output,
    /// The input of a single transition node, when it is folded into the
    /// state byte.
    inline_input: Option<u8>,
    sizes: PackSizes,
    inputs: usize,
    targets: usize,
    outputs: usize,
    index: Option<usize>,
    /// The lowest byte of the node. Targets are stored as distances below
    /// it.
    end: usize,
}

impl Layout {
    fn empty_final() -> Layout {
        Layout {
            kind: Kind::EmptyFinal,
            ntrans: 0,
            is_final: true,
            final_output: Output::zero(),
            inline_input: None,
            sizes: PackSizes::default(),
            inputs: 0,
            targets: 0,
            outputs: 0,
            index: None,
            end: 0,
        }
    }
}

// state byte, preceded by the input unless it is common
fn decode_one_trans_next(data: &[u8], at: usize, _: u64) -> Layout {
    let inline_input = common_byte(data[at] & PAYLOAD_MAX);
    let end = at - inline_input.map_or(1, |_| 0);
    Layout {
        kind: Kind::OneTransNext,
        ntrans: 1,
        is_final: false,
        final_output: Output::zero(),
        inline_input,
        sizes: PackSizes::default(),
        inputs: at - 1,
        targets: end,
        outputs: end,
        index: None,
        end,
    }
}

// output, target, sizes, input unless common, state byte
fn decode_one_trans(data: &[u8], at: usize, _: u64) -> Layout {
    let inline_input = common_byte(data[at] & PAYLOAD_MAX);
    let sizes_at = at - inline_input.map_or(1, |_| 0) - 1;
    let sizes = PackSizes::from_byte(data[sizes_at]);
    let targets = sizes_at - sizes.target;
    let outputs = targets - sizes.output;
    Layout {
        kind: Kind::OneTrans,
        ntrans: 1,
        is_final: false,
        final_output: Output::zero(),
        inline_input,
        sizes,
        inputs: at - 1,
        targets,
        outputs,
        index: None,
        end: outputs,
    }
}

// final output, outputs, targets, inputs, index, sizes, count unless it fits
// in the state byte, state byte
fn decode_any_trans(data: &[u8], at: usize, version: u64) -> Layout {
    let state = data[at];
    let (ntrans, sizes_at) = match state & PAYLOAD_MAX {
        0 => match data[at - 1] {
            1 => (256, at - 2),
            n => (n as usize, at - 2),
        },
        n => (n as usize, at - 1),
    };
    let sizes = PackSizes::from_byte(data[sizes_at]);
    let (index, inputs) = if has_index(version, ntrans) {
        (Some(sizes_at - 256), sizes_at - 256 - ntrans)
    } else {
        (None, sizes_at - ntrans)
    };
    let targets = inputs - ntrans * sizes.target;
    let outputs = targets - ntrans * sizes.output;
    let is_final = state & FINAL_FLAG != 0;
    let (final_output, end) = if is_final && sizes.output > 0 {
        let at = outputs - sizes.output;
        (Output::new(unpack_uint(&data[at..], sizes.output as u8)), at)
    } else {
        (Output::zero(), outputs)
    };
    Layout {
        kind: Kind::AnyTrans,
        ntrans,
        is_final,
        final_output,
        inline_input: None,
        sizes,
        inputs,
        targets,
        outputs,
        index,
        end,
    }
}

/// The index table first appeared in format version 2.
fn has_index(version: u64, ntrans: usize) -> bool {
    version >= 2 && ntrans > TRANS_INDEX_THRESHOLD
}

/// A single state in a finite state transducer.
///
/// A node is a view into the bytes of a transducer. Construction decodes the
/// state byte and locates each section of the node; transitions are read
/// from those sections on demand. Nodes are cheap to build and `Copy`.
#[derive(Clone, Copy)]
pub struct Node<'f> {
    data: &'f [u8],
    addr: CompiledAddr,
    layout: Layout,
}

impl<'f> fmt::Debug for Node<'f> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} node at {}: {} bytes, {} transitions",
            self.state(),
            self.addr,
            self.as_slice().len(),
            self.len(),
        )?;
        if self.is_final() {
            writeln!(f, "  final, output {}", self.final_output().value())?;
        }
        for t in self.transitions() {
            writeln!(f, "  {:?}", t)?;
        }
        Ok(())
    }
}

impl<'f> Node<'f> {
    /// Decodes the node whose state byte is at `addr` in `data`, a whole
    /// transducer written with format `version`.
    pub(crate) fn new(
        version: u64,
        addr: CompiledAddr,
        data: &'f [u8],
    ) -> Node<'f> {
        if addr.is_empty_final() {
            return Node { data: &[], addr, layout: Layout::empty_final() };
        }
        let at = addr.offset();
        let layout = (shape_of(data[at]).decode)(data, at, version);
        Node { data, addr, layout }
    }

    /// Returns an iterator over all transitions in this node in lexicographic
    /// order of their inputs.
    #[inline]
    pub fn transitions(&self) -> Transitions<'f> {
        Transitions { node: *self, range: 0..self.len() }
    }

    /// Returns the transition at index `i`.
    ///
    /// This panics if `i` is not less than the number of transitions.
    #[inline(always)]
    pub fn transition(&self, i: usize) -> Transition {
        Transition {
            inp: self.input(i),
            out: self.output(i),
            addr: self.transition_addr(i),
        }
    }

    /// Returns the target of the `i`th transition.
    #[inline(always)]
    pub fn transition_addr(&self, i: usize) -> CompiledAddr {
        let slot = self.slot(i);
        let layout = &self.layout;
        if layout.kind == Kind::OneTransNext {
            return CompiledAddr::new(layout.end - 1);
        }
        let width = layout.sizes.target;
        let at = layout.targets + slot * width;
        unpack_delta(&self.data[at..], width, layout.end)
    }

    /// Finds the index of the transition on input byte `b`, if there is one.
    #[inline(always)]
    pub fn find_input(&self, b: u8) -> Option<usize> {
        let layout = &self.layout;
        if let Some(index) = layout.index {
            let i = self.data[index + b as usize] as usize;
            return if i < layout.ntrans { Some(i) } else { None };
        }
        if let Some(inp) = layout.inline_input {
            return if inp == b { Some(0) } else { None };
        }
        let inputs = &self.data[layout.inputs..layout.inputs + layout.ntrans];
        inputs.iter().position(|&x| x == b).map(|p| layout.ntrans - 1 - p)
    }

    /// The output added when a key ends at this node. Zero unless the node
    /// is final with a nonzero final output.
    #[inline(always)]
    pub fn final_output(&self) -> Output {
        self.layout.final_output
    }

    /// Returns true if and only if a key may end at this node.
    #[inline(always)]
    pub fn is_final(&self) -> bool {
        self.layout.is_final
    }

    /// Returns the number of transitions in this node, at most 256.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.layout.ntrans
    }

    /// Returns true if and only if this node has zero transitions.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.layout.ntrans == 0
    }

    /// Returns the address of this node.
    #[inline(always)]
    pub fn addr(&self) -> CompiledAddr {
        self.addr
    }

    /// Returns the encoded bytes of this node.
    #[doc(hidden)]
    #[inline(always)]
    pub fn as_slice(&self) -> &'f [u8] {
        match self.layout.kind {
            Kind::EmptyFinal => &[],
            _ => &self.data[self.layout.end..=self.addr.offset()],
        }
    }

    /// Returns a short name for the encoding used by this node: `OTN`, `OT`,
    /// `AT` or `EF`.
    #[doc(hidden)]
    #[inline(always)]
    pub fn state(&self) -> &'static str {
        self.layout.kind.label()
    }

    /// Transitions are stored last first.
    #[inline(always)]
    fn slot(&self, i: usize) -> usize {
        assert!(
            i < self.layout.ntrans,
            "transition {} out of bounds for a node with {}",
            i,
            self.layout.ntrans
        );
        self.layout.ntrans - 1 - i
    }

    #[inline(always)]
    fn input(&self, i: usize) -> u8 {
        let slot = self.slot(i);
        match self.layout.inline_input {
            Some(inp) => inp,
            None => self.data[self.layout.inputs + slot],
        }
    }

    #[inline(always)]
    fn output(&self, i: usize) -> Output {
        let slot = self.slot(i);
        let width = self.layout.sizes.output;
        if width == 0 {
            return Output::zero();
        }
        let at = self.layout.outputs + slot * width;
        Output::new(unpack_uint(&self.data[at..], width as u8))
    }
}

impl BuilderNode {
    /// Writes this node to `wtr`.
    ///
    /// `start` is the number of bytes already written to the transducer, so
    /// the node's first byte lands there. `last` is the address of the node
    /// compiled just before this one.
    pub fn compile_to<W: io::Write>(
        &self,
        mut wtr: W,
        last: CompiledAddr,
        start: usize,
    ) -> io::Result<()> {
        assert!(self.trans.len() <= 256);
        let kind = self.kind(last);
        let tag = match kind.shape() {
            None => return Ok(()),
            Some(shape) => shape.tag,
        };
        if kind == Kind::OneTransNext {
            return write_input_and_state(&mut wtr, tag, self.trans[0].inp);
        }

        let sizes = PackSizes::fit(self, start);
        if sizes.output > 0 {
            let width = sizes.output as u8;
            if self.is_final {
                pack_uint_in(&mut wtr, self.final_output.value(), width)?;
            }
            for t in self.trans.iter().rev() {
                pack_uint_in(&mut wtr, t.out.value(), width)?;
            }
        }
        for t in self.trans.iter().rev() {
            pack_delta_in(&mut wtr, start, t.addr, sizes.target as u8)?;
        }
        if kind == Kind::OneTrans {
            wtr.write_u8(sizes.to_byte())?;
            return write_input_and_state(&mut wtr, tag, self.trans[0].inp);
        }

        for t in self.trans.iter().rev() {
            wtr.write_u8(t.inp)?;
        }
        if self.trans.len() > TRANS_INDEX_THRESHOLD {
            // Absent bytes get 255. That is never a valid index except in a
            // node with all 256 transitions, which has no absent bytes.
            let mut index = [255u8; 256];
            for (i, t) in self.trans.iter().enumerate() {
                index[t.inp as usize] = i as u8;
            }
            wtr.write_all(&index)?;
        }
        wtr.write_u8(sizes.to_byte())?;
        let mut state = tag;
        if self.is_final {
            state |= FINAL_FLAG;
        }
        match self.trans.len() {
            n if 1 <= n && n <= PAYLOAD_MAX as usize => state |= n as u8,
            // 1 always fits in the state byte, so it is free to mean 256.
            256 => wtr.write_u8(1)?,
            n => wtr.write_u8(n as u8)?,
        }
        wtr.write_u8(state)
    }

    fn kind(&self, last: CompiledAddr) -> Kind {
        match self.trans.as_slice() {
            [] if self.is_final && self.final_output.is_zero() => {
                Kind::EmptyFinal
            }
            [t] if !self.is_final => {
                if t.addr == last && t.out.is_zero() {
                    Kind::OneTransNext
                } else {
                    Kind::OneTrans
                }
            }
            _ => Kind::AnyTrans,
        }
    }
}

fn write_input_and_state<W: io::Write>(
    mut wtr: W,
    tag: u8,
    inp: u8,
) -> io::Result<()> {
    let code = common_code(inp);
    if code == 0 {
        wtr.write_u8(inp)?;
    }
    wtr.write_u8(tag | code)
}

/// Byte widths of transition targets (high nibble) and outputs (low nibble).
///
/// An output width of zero means every output of the node is zero and none
/// are stored.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct PackSizes {
    target: usize,
    output: usize,
}

impl PackSizes {
    #[inline(always)]
    fn from_byte(b: u8) -> PackSizes {
        PackSizes { target: (b >> 4) as usize, output: (b & 0x0f) as usize }
    }

    fn to_byte(self) -> u8 {
        assert!(self.target <= 8 && self.output <= 8);
        ((self.target as u8) << 4) | self.output as u8
    }

    /// The narrowest widths that hold every target and output of `node`
    /// when it is written at `start`.
    fn fit(node: &BuilderNode, start: usize) -> PackSizes {
        let mut target = 0;
        let mut output = pack_size(node.final_output.value());
        let mut any_output = !node.final_output.is_zero();
        for t in &node.trans {
            target = cmp::max(target, pack_delta_size(start, t.addr));
            output = cmp::max(output, pack_size(t.out.value()));
            any_output |= !t.out.is_zero();
        }
        PackSizes {
            target: target as usize,
            output: if any_output { output as usize } else { 0 },
        }
    }
}

/// An iterator over all transitions in a node.
///
/// `'f` is the lifetime of the underlying fst.
pub struct Transitions<'f> {
    node: Node<'f>,
    range: Range<usize>,
}

impl<'f> Iterator for Transitions<'f> {
    type Item = Transition;

    #[inline]
    fn next(&mut self) -> Option<Transition> {
        let node = &self.node;
        self.range.next().map(|i| node.transition(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<'f> ExactSizeIterator for Transitions<'f> {}

/// The 6 bit code of `input` when it ranks among the 63 most common bytes,
/// otherwise `0`.
#[inline(always)]
fn common_code(input: u8) -> u8 {
    let rank = COMMON_INPUTS[input as usize];
    if rank < PAYLOAD_MAX {
        rank + 1
    } else {
        0
    }
}

#[inline(always)]
fn common_byte(code: u8) -> Option<u8> {
    code.checked_sub(1).map(|rank| COMMON_INPUTS_INV[rank as usize])
}

#[cfg(test)]
mod tests {
    use quickcheck::{quickcheck, TestResult};

    use super::{common_byte, common_code, Node, TRANS_INDEX_THRESHOLD};
    use crate::raw::build::BuilderNode;
    use crate::raw::{Builder, CompiledAddr, Output, Transition, VERSION};
    use crate::stream::Streamer;

    /// Compiles `node` after 24 bytes of padding and decodes it again.
    fn compile_after(node: &BuilderNode, last: CompiledAddr) -> Vec<u8> {
        let mut buf = vec![0; 24];
        node.compile_to(&mut buf, last, 24).unwrap();
        buf
    }

    fn compile(node: &BuilderNode) -> Vec<u8> {
        compile_after(node, CompiledAddr::NONE)
    }

    fn decode(buf: &[u8]) -> Node<'_> {
        Node::new(VERSION, CompiledAddr::new(buf.len() - 1), buf)
    }

    fn assert_decodes_to(node: &Node<'_>, bnode: &BuilderNode) {
        assert_eq!(node.is_final(), bnode.is_final);
        assert_eq!(node.len(), bnode.trans.len());
        assert_eq!(node.final_output(), bnode.final_output);
        let got: Vec<Transition> = node.transitions().collect();
        assert_eq!(got, bnode.trans);
    }

    fn round_trip(bnode: &BuilderNode) {
        let buf = compile(bnode);
        assert_decodes_to(&decode(&buf), bnode);
    }

    fn trans(addr: usize, inp: u8) -> Transition {
        Transition { inp, out: Output::zero(), addr: CompiledAddr::new(addr) }
    }

    fn non_final(trans: Vec<Transition>) -> BuilderNode {
        BuilderNode { is_final: false, final_output: Output::zero(), trans }
    }

    #[test]
    fn prop_emits_inputs() {
        fn p(mut bs: Vec<Vec<u8>>) -> TestResult {
            bs.sort();
            bs.dedup();

            let mut bfst = Builder::memory();
            for word in &bs {
                bfst.add(word).unwrap();
            }
            let fst = bfst.into_fst();
            let mut rdr = fst.stream();
            let mut words = vec![];
            while let Some(w) = rdr.next() {
                words.push(w.0.to_owned());
            }
            TestResult::from_bool(bs == words)
        }
        quickcheck(p as fn(Vec<Vec<u8>>) -> TestResult)
    }

    #[test]
    fn common_codes_round_trip() {
        let mut coded = 0;
        for b in 0u8..=255 {
            let code = common_code(b);
            if code != 0 {
                coded += 1;
                assert_eq!(common_byte(code), Some(b));
            }
        }
        assert_eq!(coded, 63);
        assert_eq!(common_byte(0), None);
    }

    #[test]
    fn common_codes_follow_fixed_ranking() {
        assert_eq!(common_code(b't'), 1);
        assert_eq!(common_code(b'e'), 2);
        assert_eq!(common_code(b'/'), 3);
        assert_eq!(common_code(b'='), 24);
        assert_eq!(common_code(b'L'), 59);
        assert_eq!(common_code(b'O'), 60);
        assert_eq!(common_code(b'q'), 61);
        assert_eq!(common_code(b'H'), 62);
        assert_eq!(common_code(b'G'), 63);
        assert_eq!(common_code(b'W'), 0);
        assert_eq!(common_code(b'\xff'), 0);
    }

    #[test]
    fn no_trans() {
        let bnode = non_final(vec![]);
        let buf = compile(&bnode);
        // sizes, count, state
        assert_eq!(&buf[24..], &[0x00, 0x00, 0x00]);
        let node = decode(&buf);
        assert_eq!(node.state(), "AT");
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn empty_final_writes_nothing() {
        let bnode = BuilderNode {
            is_final: true,
            final_output: Output::zero(),
            trans: vec![],
        };
        assert_eq!(compile(&bnode).len(), 24);
        let node = Node::new(VERSION, CompiledAddr::EMPTY, &[]);
        assert_eq!(node.state(), "EF");
        assert!(node.is_final());
        assert!(node.as_slice().is_empty());
    }

    #[test]
    fn final_with_output() {
        let bnode = BuilderNode {
            is_final: true,
            final_output: Output::new(1000),
            trans: vec![],
        };
        let buf = compile(&bnode);
        // final output, sizes, count, state
        assert_eq!(&buf[24..], &[0xe8, 0x03, 0x02, 0x00, 0b01_000000]);
        assert_decodes_to(&decode(&buf), &bnode);
    }

    #[test]
    fn one_trans_next_common() {
        let bnode = non_final(vec![trans(23, b't')]);
        let buf = compile_after(&bnode, CompiledAddr::new(23));
        assert_eq!(&buf[24..], &[0b11_000001]);
        let node = decode(&buf);
        assert_eq!(node.state(), "OTN");
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn one_trans_next_not_common() {
        let bnode = non_final(vec![trans(23, b'\xff')]);
        let buf = compile_after(&bnode, CompiledAddr::new(23));
        assert_eq!(&buf[24..], &[0xff, 0b11_000000]);
        let node = decode(&buf);
        assert_eq!(node.state(), "OTN");
        assert_eq!(node.find_input(b'\xff'), Some(0));
        assert_eq!(node.find_input(b'\xfe'), None);
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn one_trans_common() {
        let bnode = non_final(vec![trans(20, b'e')]);
        let buf = compile(&bnode);
        // target 4 below, sizes, state with code 2
        assert_eq!(&buf[24..], &[0x04, 0x10, 0b10_000010]);
        let node = decode(&buf);
        assert_eq!(node.state(), "OT");
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn one_trans_not_common() {
        let bnode = non_final(vec![trans(2, b'\xff')]);
        let buf = compile(&bnode);
        assert_eq!(&buf[24..], &[22, 0x10, 0xff, 0b10_000000]);
        assert_decodes_to(&decode(&buf), &bnode);
    }

    #[test]
    fn one_trans_with_output() {
        let bnode = non_final(vec![Transition {
            inp: b'z',
            out: Output::new(70_000),
            addr: CompiledAddr::new(10),
        }]);
        let buf = compile(&bnode);
        let node = decode(&buf);
        // output (3) + target (1) + sizes + state
        assert_eq!(node.as_slice().len(), 6);
        assert_eq!(node.as_slice()[..3], [0x70, 0x11, 0x01]);
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn one_trans_to_empty_final() {
        round_trip(&non_final(vec![trans(0, b'a')]));
    }

    #[test]
    fn many_trans() {
        let bnode = non_final(vec![
            trans(2, b'a'),
            trans(3, b'b'),
            trans(4, b'c'),
            trans(5, b'd'),
            trans(6, b'e'),
            trans(7, b'f'),
        ]);
        let buf = compile(&bnode);
        let node = decode(&buf);
        // 6 targets, 6 inputs, sizes, state
        assert_eq!(node.as_slice().len(), 14);
        assert_eq!(node.transitions().len(), 6);
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn many_trans_final_with_outputs() {
        let bnode = BuilderNode {
            is_final: true,
            final_output: Output::new(7),
            trans: vec![
                Transition {
                    inp: b'a',
                    out: Output::new(1),
                    addr: CompiledAddr::new(2),
                },
                Transition {
                    inp: b'q',
                    out: Output::zero(),
                    addr: CompiledAddr::EMPTY,
                },
                Transition {
                    inp: b'~',
                    out: Output::new(300),
                    addr: CompiledAddr::new(20),
                },
            ],
        };
        round_trip(&bnode);
    }

    #[test]
    fn single_final_trans_is_any_trans() {
        let bnode = BuilderNode {
            is_final: true,
            final_output: Output::zero(),
            trans: vec![trans(23, b't')],
        };
        let buf = compile_after(&bnode, CompiledAddr::new(23));
        let node = decode(&buf);
        assert_eq!(node.state(), "AT");
        assert_eq!(*node.as_slice().last().unwrap(), 0b01_000001);
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn node_max_trans() {
        let bnode = non_final((0..256).map(|i| trans(0, i as u8)).collect());
        let buf = compile(&bnode);
        let node = decode(&buf);
        let slice = node.as_slice();
        // The count 256 is written as 1, below a state byte with no count.
        assert_eq!(slice[slice.len() - 2..], [1, 0]);
        assert_eq!(node.len(), 256);
        assert_eq!(node.transitions().count(), 256);
        for b in 0u8..=255 {
            assert_eq!(node.find_input(b), Some(b as usize));
        }
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    fn find_input_every_count() {
        // Every count from 2 up past the index threshold, with inputs
        // spread out so both present and absent bytes are probed.
        for n in 2..=(TRANS_INDEX_THRESHOLD + 2) {
            let is_final = n % 2 == 0;
            let bnode = BuilderNode {
                is_final,
                final_output: if is_final {
                    Output::new(n as u64 % 3)
                } else {
                    Output::zero()
                },
                trans: (0..n)
                    .map(|i| Transition {
                        inp: (i * 3) as u8,
                        out: Output::new(i as u64),
                        addr: CompiledAddr::new(2 + (i % 20)),
                    })
                    .collect(),
            };
            let buf = compile(&bnode);
            let node = decode(&buf);
            assert_eq!(node.len(), n);
            for b in 0u8..=255 {
                let expected = if b % 3 == 0 && (b as usize) / 3 < n {
                    Some(b as usize / 3)
                } else {
                    None
                };
                assert_eq!(node.find_input(b), expected, "n={} b={}", n, b);
                if let Some(i) = expected {
                    assert_eq!(node.transition(i).inp, b);
                }
            }
            assert_decodes_to(&node, &bnode);
        }
    }

    #[test]
    fn index_table_only_when_above_threshold() {
        let make =
            |n: usize| non_final((0..n).map(|i| trans(2, i as u8)).collect());
        let small = compile(&make(TRANS_INDEX_THRESHOLD)).len();
        let big = compile(&make(TRANS_INDEX_THRESHOLD + 1)).len();
        // One more input byte, one more target byte and the table.
        assert_eq!(big, small + 2 + 256);
    }

    #[test]
    fn version_one_has_no_index_table() {
        // A version 1 node with 40 transitions is the same bytes without the
        // table, so drop it and decode with the old version.
        let bnode =
            non_final((0..40).map(|i| trans(2, b'a' + i as u8)).collect());
        let mut buf = compile(&bnode);
        // sizes and state
        let tail = buf.split_off(buf.len() - 2);
        buf.truncate(buf.len() - 256);
        buf.extend_from_slice(&tail);
        let node = Node::new(1, CompiledAddr::new(buf.len() - 1), &buf);
        assert_eq!(node.find_input(b'a' + 39), Some(39));
        assert_decodes_to(&node, &bnode);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn transition_past_end_panics() {
        let buf = compile(&non_final(vec![trans(2, b'a'), trans(3, b'b')]));
        decode(&buf).transition(2);
    }
}
