use std::io::{self, Write};
use std::process;

use tracing_subscriber::EnvFilter;

mod app;
mod cmd;
mod util;

type Error = anyhow::Error;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    if let Err(err) = try_main() {
        // A closed stdout (e.g. piping into `head`) is not worth a message.
        if let Some(ioerr) = err.root_cause().downcast_ref::<io::Error>() {
            if ioerr.kind() == io::ErrorKind::BrokenPipe {
                process::exit(0);
            }
        }
        let _ = writeln!(io::stderr(), "{:#}", err);
        process::exit(1);
    }
}

fn try_main() -> Result<(), Error> {
    let matches = app::app().get_matches();
    match matches.subcommand() {
        ("csv", Some(m)) => cmd::csv::run(m),
        ("get", Some(m)) => cmd::get::run(m),
        ("map", Some(m)) => cmd::map::run(m),
        ("node", Some(m)) => cmd::node::run(m),
        ("range", Some(m)) => cmd::range::run(m),
        ("verify", Some(m)) => cmd::verify::run(m),
        ("", _) => {
            app::app().print_help()?;
            println!();
            Ok(())
        }
        (unknown, _) => anyhow::bail!("unrecognized command: {}", unknown),
    }
}
