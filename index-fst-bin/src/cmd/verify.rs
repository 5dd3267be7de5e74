use std::path::PathBuf;

use tracing::{debug, info};

use crate::{util, Error};

pub fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    Args::new(matches).and_then(|args| args.run())
}

#[derive(Debug)]
struct Args {
    inputs: Vec<PathBuf>,
}

impl Args {
    fn new(m: &clap::ArgMatches) -> Result<Args, Error> {
        Ok(Args {
            inputs: m
                .values_of_os("input")
                .map(|vs| vs.map(PathBuf::from).collect())
                .unwrap_or_default(),
        })
    }

    fn run(&self) -> Result<(), Error> {
        let mut failed = 0;
        for input in &self.inputs {
            let fst = unsafe { util::open_fst(input)? };
            match fst.verify() {
                Ok(()) => info!(path = %input.display(), "checksum ok"),
                Err(err) => {
                    debug!(path = %input.display(), "checksum failed");
                    println!("{}: {}", input.display(), err);
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            anyhow::bail!(
                "{} of {} inputs failed verification",
                failed,
                self.inputs.len()
            );
        }
        Ok(())
    }
}
