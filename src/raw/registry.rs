use crate::raw::build::BuilderNode;
use crate::raw::CompiledAddr;

/// A bounded, set associative cache of compiled nodes.
///
/// Each node hashes to one bucket of `ways` cells. A bucket is kept in most
/// recently used order and a miss claims its least recently used cell. The
/// cache only shrinks the output: a miss on a node that was written before
/// just writes it again.
#[derive(Debug)]
pub struct Registry {
    cells: Vec<RegistryCell>,
    buckets: usize,
    ways: usize,
}

#[derive(Clone, Debug)]
pub struct RegistryCell {
    addr: CompiledAddr,
    node: BuilderNode,
}

#[derive(Debug)]
pub enum RegistryEntry<'a> {
    /// An equal node is already written at this address.
    Found(CompiledAddr),
    /// A cell now holds a copy of the node. The caller writes the node and
    /// then records where with `RegistryCell::insert`.
    NotFound(&'a mut RegistryCell),
    /// The cache has no cells.
    Rejected,
}

impl Registry {
    /// Panics when `buckets * ways` does not fit in a `usize`.
    pub fn new(buckets: usize, ways: usize) -> Registry {
        let ncells = match buckets.checked_mul(ways) {
            Some(ncells) => ncells,
            None => panic!(
                "registry of {} buckets with {} cells each overflows usize",
                buckets, ways
            ),
        };
        Registry { cells: vec![RegistryCell::vacant(); ncells], buckets, ways }
    }

    pub fn entry<'a>(&'a mut self, node: &BuilderNode) -> RegistryEntry<'a> {
        if self.cells.is_empty() {
            return RegistryEntry::Rejected;
        }
        let start = self.bucket_of(node) * self.ways;
        let bucket = &mut self.cells[start..start + self.ways];
        let hit = bucket.iter().position(|cell| cell.holds(node));
        let used = hit.unwrap_or(bucket.len() - 1);
        bucket[..=used].rotate_right(1);
        let front = &mut bucket[0];
        if hit.is_some() {
            RegistryEntry::Found(front.addr)
        } else {
            front.claim(node);
            RegistryEntry::NotFound(front)
        }
    }

    /// FNV-1a over the words that decide node equality.
    fn bucket_of(&self, node: &BuilderNode) -> usize {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        let mix = |h: u64, word: u64| (h ^ word).wrapping_mul(PRIME);

        let mut h = mix(OFFSET, node.is_final as u64);
        h = mix(h, node.final_output.value());
        for t in &node.trans {
            h = mix(h, t.inp as u64);
            h = mix(h, t.out.value());
            h = mix(h, t.addr.offset() as u64);
        }
        (h as usize) % self.buckets
    }
}

impl RegistryCell {
    fn vacant() -> RegistryCell {
        RegistryCell { addr: CompiledAddr::NONE, node: BuilderNode::default() }
    }

    fn holds(&self, node: &BuilderNode) -> bool {
        self.addr != CompiledAddr::NONE && self.node == *node
    }

    /// Copies `node` in, reusing the transition buffer. Until `insert` is
    /// called the cell matches nothing.
    fn claim(&mut self, node: &BuilderNode) {
        self.node.is_final = node.is_final;
        self.node.final_output = node.final_output;
        self.node.trans.clear();
        self.node.trans.extend_from_slice(&node.trans);
        self.addr = CompiledAddr::NONE;
    }

    pub fn insert(&mut self, addr: CompiledAddr) {
        self.addr = addr;
    }
}

#[cfg(test)]
mod tests {
    use super::{Registry, RegistryEntry};
    use crate::raw::build::BuilderNode;
    use crate::raw::{CompiledAddr, Output, Transition};

    /// Looks `node` up and, on a miss, records it at `addr`. Returns the
    /// address of an earlier equal node, if there was one.
    fn lookup(
        reg: &mut Registry,
        node: &BuilderNode,
        addr: usize,
    ) -> Option<usize> {
        match reg.entry(node) {
            RegistryEntry::Found(found) => Some(found.offset()),
            RegistryEntry::NotFound(cell) => {
                cell.insert(CompiledAddr::new(addr));
                None
            }
            RegistryEntry::Rejected => panic!("registry has no cells"),
        }
    }

    fn final_with(out: u64) -> BuilderNode {
        BuilderNode {
            is_final: true,
            final_output: Output::new(out),
            trans: vec![],
        }
    }

    fn one_trans(inp: u8, out: u64, addr: usize) -> BuilderNode {
        let addr = CompiledAddr::new(addr);
        let trans = vec![Transition { inp, out: Output::new(out), addr }];
        BuilderNode { trans, ..BuilderNode::default() }
    }

    #[test]
    fn no_cells_rejects() {
        for &(buckets, ways) in &[(0, 0), (0, 2), (10_000, 0)] {
            let mut reg = Registry::new(buckets, ways);
            match reg.entry(&BuilderNode::default()) {
                RegistryEntry::Rejected => {}
                entry => panic!("expected rejection, got {:?}", entry),
            }
        }
    }

    #[test]
    #[should_panic(expected = "overflows usize")]
    fn overflowing_dimensions_panic() {
        Registry::new(usize::MAX / 2 + 1, 2);
    }

    #[test]
    fn remembers_a_written_node() {
        let mut reg = Registry::new(1, 1);
        assert_eq!(lookup(&mut reg, &final_with(0), 20), None);
        assert_eq!(lookup(&mut reg, &final_with(0), 99), Some(20));
    }

    #[test]
    fn every_field_takes_part_in_equality() {
        let base = one_trans(b'a', 0, 100);
        let others = vec![
            BuilderNode { is_final: true, ..base.clone() },
            BuilderNode { final_output: Output::new(1), ..base.clone() },
            one_trans(b'b', 0, 100),
            one_trans(b'a', 1, 100),
            one_trans(b'a', 0, 101),
        ];
        for other in &others {
            let mut reg = Registry::new(1, 2);
            assert_eq!(lookup(&mut reg, &base, 20), None);
            assert_eq!(lookup(&mut reg, other, 30), None, "{:?}", other);
            assert_eq!(lookup(&mut reg, &base, 40), Some(20));
        }
    }

    #[test]
    fn claimed_cell_without_address_never_matches() {
        let mut reg = Registry::new(1, 2);
        let node = final_with(0);
        for _ in 0..2 {
            match reg.entry(&node) {
                RegistryEntry::NotFound(_) => {}
                entry => panic!("expected a miss, got {:?}", entry),
            }
        }
    }

    #[test]
    fn one_way_bucket_keeps_the_latest() {
        let mut reg = Registry::new(1, 1);
        assert_eq!(lookup(&mut reg, &final_with(0), 20), None);
        assert_eq!(lookup(&mut reg, &final_with(1), 30), None);
        assert_eq!(lookup(&mut reg, &final_with(0), 40), None);
        assert_eq!(lookup(&mut reg, &final_with(0), 50), Some(40));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut reg = Registry::new(1, 2);
        lookup(&mut reg, &final_with(1), 10);
        lookup(&mut reg, &final_with(2), 20);
        // Touching 1 leaves 2 as the eviction candidate.
        assert_eq!(lookup(&mut reg, &final_with(1), 0), Some(10));
        assert_eq!(lookup(&mut reg, &final_with(3), 30), None);
        assert_eq!(lookup(&mut reg, &final_with(1), 0), Some(10));
        assert_eq!(lookup(&mut reg, &final_with(3), 0), Some(30));
        assert_eq!(lookup(&mut reg, &final_with(2), 40), None);
    }

    #[test]
    fn hits_move_to_the_front() {
        let mut reg = Registry::new(1, 4);
        for (i, out) in (1..=4).enumerate() {
            lookup(&mut reg, &final_with(out), 10 * (i + 1));
        }
        let order = |reg: &Registry| -> Vec<usize> {
            reg.cells.iter().map(|c| c.addr.offset()).collect()
        };
        assert_eq!(order(&reg), vec![40, 30, 20, 10]);
        lookup(&mut reg, &final_with(2), 0);
        assert_eq!(order(&reg), vec![20, 40, 30, 10]);
        lookup(&mut reg, &final_with(1), 0);
        assert_eq!(order(&reg), vec![10, 20, 40, 30]);
    }
}
