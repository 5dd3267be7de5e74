use std::path::PathBuf;

use bit_set::BitSet;
use index_fst::raw::{Fst, Node};

use crate::util;
use crate::Error;

pub fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    Args::new(matches).and_then(|args| args.run())
}

#[derive(Debug)]
struct Args {
    input: PathBuf,
    output: Option<PathBuf>,
    which: Which,
}

#[derive(Debug)]
enum Which {
    Edges,
    Nodes,
}

impl Args {
    fn new(m: &clap::ArgMatches) -> Result<Args, Error> {
        let (which, m) = match m.subcommand() {
            ("edges", Some(m)) => (Which::Edges, m),
            ("nodes", Some(m)) => (Which::Nodes, m),
            (unknown, _) => {
                anyhow::bail!("unrecognized csv sub-command: {}", unknown)
            }
        };
        Ok(Args {
            input: match m.value_of_os("input") {
                Some(input) => PathBuf::from(input),
                None => anyhow::bail!("missing input path"),
            },
            output: m.value_of_os("output").map(PathBuf::from),
            which,
        })
    }

    fn run(&self) -> Result<(), Error> {
        let wtr = util::create_output(self.output.as_deref())?;
        let mut wtr = csv::Writer::from_writer(wtr);

        let fst = unsafe { util::open_fst(&self.input)? };
        match self.which {
            Which::Edges => {
                wtr.serialize(("addr_in", "addr_out", "input", "output"))?;
                for node in reachable(&fst) {
                    for t in node.transitions() {
                        wtr.serialize((
                            node.addr().offset(),
                            t.addr.offset(),
                            escape_input(t.inp),
                            t.out.value(),
                        ))?;
                    }
                }
            }
            Which::Nodes => {
                wtr.serialize((
                    "addr",
                    "state",
                    "size",
                    "transitions",
                    "final",
                    "final_output",
                ))?;
                for node in reachable(&fst) {
                    wtr.serialize((
                        node.addr().offset(),
                        node.state(),
                        node.as_slice().len(),
                        node.len(),
                        node.is_final(),
                        node.final_output().value(),
                    ))?;
                }
            }
        }
        wtr.flush().map_err(From::from)
    }
}

/// Returns every node reachable from the root, each exactly once, in
/// depth first order.
fn reachable<D: AsRef<[u8]>>(fst: &Fst<D>) -> Vec<Node<'_>> {
    let mut seen = BitSet::with_capacity(fst.size());
    let mut nodes = vec![];
    let mut stack = vec![fst.root_addr()];
    seen.insert(fst.root_addr().offset());
    while let Some(addr) = stack.pop() {
        let node = fst.node(addr);
        for t in node.transitions() {
            if seen.insert(t.addr.offset()) {
                stack.push(t.addr);
            }
        }
        nodes.push(node);
    }
    nodes
}

/// Renders a transition byte as printable ASCII, escaping everything else.
fn escape_input(b: u8) -> String {
    std::ascii::escape_default(b).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use index_fst::raw::Fst;

    use super::{escape_input, reachable};

    #[test]
    fn reachable_visits_shared_nodes_once() {
        let fst = Fst::from_iter_set(vec!["ax", "bx", "cx"]).unwrap();
        let nodes = reachable(&fst);
        // root, the shared `x` node and the empty final node
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].addr(), fst.root_addr());
    }

    #[test]
    fn escapes_non_printable_inputs() {
        assert_eq!(escape_input(b'a'), "a");
        assert_eq!(escape_input(b'\n'), "\\n");
        assert_eq!(escape_input(0xff), "\\xff");
    }
}
