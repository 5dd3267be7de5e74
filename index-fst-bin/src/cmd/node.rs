use std::io::{self, Write};
use std::path::PathBuf;

use index_fst::raw::CompiledAddr;

use crate::util;
use crate::Error;

pub fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    Args::new(matches).and_then(|args| args.run())
}

#[derive(Debug)]
struct Args {
    input: PathBuf,
    addr: usize,
}

impl Args {
    fn new(m: &clap::ArgMatches) -> Result<Args, Error> {
        let addr = match m.value_of_lossy("node-address") {
            Some(addr) => addr.parse()?,
            None => anyhow::bail!("missing node address"),
        };
        Ok(Args {
            input: match m.value_of_os("input") {
                Some(input) => PathBuf::from(input),
                None => anyhow::bail!("missing input path"),
            },
            addr,
        })
    }

    fn run(&self) -> Result<(), Error> {
        let fst = unsafe { util::open_fst(&self.input)? };
        if self.addr >= fst.size() {
            anyhow::bail!(
                "node address {} is past the end of a {} byte FST",
                self.addr,
                fst.size()
            );
        }
        let node = fst.node(CompiledAddr::new(self.addr));
        let mut wtr = io::BufWriter::new(io::stdout());
        writeln!(wtr, "{:?}", node)?;
        wtr.flush()?;
        Ok(())
    }
}
