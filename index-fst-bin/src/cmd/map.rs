use std::fs;
use std::path::PathBuf;

use bstr::BString;
use index_fst::map::BuilderOptions;
use index_fst::MapBuilder;
use serde::Deserialize;
use tracing::info;

use crate::util;
use crate::Error;

pub fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    Args::new(matches).and_then(|args| args.run())
}

#[derive(Debug)]
struct Args {
    input: Vec<PathBuf>,
    output: PathBuf,
    force: bool,
    delimiter: u8,
    options: BuilderOptions,
}

/// One line of input. Keys need not be valid UTF-8.
#[derive(Debug, Deserialize)]
struct Row {
    key: BString,
    value: u64,
}

impl Args {
    fn new(m: &clap::ArgMatches) -> Result<Args, Error> {
        let delimiter = match m.value_of_lossy("delimiter") {
            None => b',',
            Some(d) => match d.as_bytes().first() {
                Some(&b) => b,
                None => anyhow::bail!("the delimiter must not be empty"),
            },
        };
        let buckets: usize = parse_flag(m, "registry-size")?;
        let cells: usize = parse_flag(m, "registry-mru")?;
        if buckets.checked_mul(cells).is_none() {
            anyhow::bail!(
                "a registry of {} buckets with {} cells each is too large",
                buckets,
                cells
            );
        }
        let options = BuilderOptions::default()
            .fst_type(parse_flag(m, "fst-type")?)
            .registry_table_size(buckets)
            .registry_mru_size(cells);
        Ok(Args {
            input: m
                .values_of_os("input")
                .map(|vs| vs.map(PathBuf::from).collect())
                .unwrap_or_default(),
            output: match m.value_of_os("output") {
                Some(out) => PathBuf::from(out),
                None => anyhow::bail!("missing output path"),
            },
            force: m.is_present("force"),
            delimiter,
            options,
        })
    }

    fn run(&self) -> Result<(), Error> {
        if !self.force && fs::metadata(&self.output).is_ok() {
            anyhow::bail!("Output file already exists: {:?}", self.output);
        }
        let wtr = util::create_output(Some(self.output.as_path()))?;
        let mut map = MapBuilder::with_options(wtr, self.options)?;
        let mut keys = 0u64;
        for input in &self.input {
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(self.delimiter)
                .has_headers(false)
                .from_reader(util::open_input(input)?);
            for row in rdr.deserialize() {
                let row: Row = row?;
                map.insert(&row.key, row.value)?;
                keys += 1;
            }
        }
        map.finish()?;
        let bytes = fs::metadata(&self.output).map(|m| m.len()).unwrap_or(0);
        info!(keys, bytes, output = ?self.output, "wrote map");
        Ok(())
    }
}

fn parse_flag<T>(m: &clap::ArgMatches, name: &str) -> Result<T, Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match m.value_of_lossy(name) {
        Some(v) => v
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid --{}: {}", name, err)),
        None => anyhow::bail!("missing --{}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use crate::app;
    use crate::Error;

    fn parse(flags: &[&str]) -> Result<Args, Error> {
        let mut argv = vec!["ifst", "map", "tags.csv", "tags.fst"];
        argv.extend_from_slice(flags);
        let matches = app::app().get_matches_from_safe(argv)?;
        match matches.subcommand() {
            ("map", Some(m)) => Args::new(m),
            (name, _) => panic!("parsed as {:?}", name),
        }
    }

    #[test]
    fn defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.delimiter, b',');
        assert!(!args.force);
        assert_eq!(args.input.len(), 1);
    }

    #[test]
    fn tab_delimiter() {
        let args = parse(&["--delimiter", "\t", "--force"]).unwrap();
        assert_eq!(args.delimiter, b'\t');
        assert!(args.force);
    }

    #[test]
    fn oversized_registry_is_an_error() {
        let max = usize::MAX.to_string();
        let err = parse(&["--registry-size", &max, "--registry-mru", "2"])
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("too large"), "{}", err);
    }

    #[test]
    fn bad_number_names_the_flag() {
        let err = parse(&["--fst-type", "x"]).map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("--fst-type"), "{}", err);
    }
}
