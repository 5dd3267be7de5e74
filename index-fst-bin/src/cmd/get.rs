use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use bstr::{ByteSlice, ByteVec};

use crate::util;
use crate::Error;

pub fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    Args::new(matches).and_then(|args| args.run())
}

#[derive(Debug)]
struct Args {
    input: PathBuf,
    keys: Vec<OsString>,
}

impl Args {
    fn new(m: &clap::ArgMatches) -> Result<Args, Error> {
        Ok(Args {
            input: match m.value_of_os("input") {
                Some(input) => PathBuf::from(input),
                None => anyhow::bail!("missing input path"),
            },
            keys: m
                .values_of_os("key")
                .map(|vs| vs.map(|v| v.to_os_string()).collect())
                .unwrap_or_default(),
        })
    }

    fn run(&self) -> Result<(), Error> {
        let map = unsafe { util::open_map(&self.input)? };
        let mut wtr = csv::Writer::from_writer(io::stdout());
        let mut missing: Vec<String> = vec![];
        for key in &self.keys {
            let key = Vec::from_os_str_lossy(key);
            match map.get(&key) {
                Some(v) => {
                    let v = v.to_string();
                    wtr.write_record(&[&key[..], v.as_bytes()])?;
                }
                None => missing.push(key.to_str_lossy().into_owned()),
            }
        }
        wtr.flush()?;
        if !missing.is_empty() {
            anyhow::bail!("keys not found: {}", missing.join(", "));
        }
        Ok(())
    }
}
