use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use bstr::ByteVec;
use index_fst::automaton::{Str, Wildcard};
use index_fst::Automaton;

use crate::util;
use crate::Error;

pub fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    Args::new(matches).and_then(|args| args.run())
}

#[derive(Debug)]
struct Args {
    input: PathBuf,
    outputs: bool,
    start: Option<OsString>,
    end: Option<OsString>,
    prefix: Vec<u8>,
    like: Option<String>,
}

impl Args {
    fn new(m: &clap::ArgMatches) -> Result<Args, Error> {
        Ok(Args {
            input: match m.value_of_os("input") {
                Some(input) => PathBuf::from(input),
                None => anyhow::bail!("missing input path"),
            },
            outputs: m.is_present("outputs"),
            start: m.value_of_os("start").map(|v| v.to_os_string()),
            end: m.value_of_os("end").map(|v| v.to_os_string()),
            prefix: m
                .value_of_os("prefix")
                .map(|v| Vec::from_os_str_lossy(v).into_owned())
                .unwrap_or_default(),
            like: m.value_of_lossy("like").map(|v| v.into_owned()),
        })
    }

    fn run(&self) -> Result<(), Error> {
        let map = unsafe { util::open_map(&self.input)? };
        // An empty prefix and a lone '*' both match every key, so the
        // filters can always be combined.
        let aut = Str::from_bytes(&self.prefix)
            .starts_with()
            .intersection(Wildcard::new(self.like.as_deref().unwrap_or("*")));
        let mut q = map.search(aut);
        if let Some(ref start) = self.start {
            q = q.ge(Vec::from_os_str_lossy(start));
        }
        if let Some(ref end) = self.end {
            q = q.lt(Vec::from_os_str_lossy(end));
        }
        let wtr = io::BufWriter::new(io::stdout());
        util::write_entries(wtr, self.outputs, q)
    }
}
