use clap::{App, AppSettings, Arg, SubCommand};

type Command = App<'static, 'static>;

const ABOUT: &str = "\
Build, query and inspect the term dictionaries of a tag index. A dictionary
maps byte-string keys to unsigned 64 bit values.

Log output goes to stderr and is controlled by RUST_LOG, e.g. RUST_LOG=debug.
";

pub fn app() -> Command {
    App::new("ifst")
        .version(clap::crate_version!())
        .about(ABOUT)
        .max_term_width(100)
        .setting(AppSettings::UnifiedHelpMessage)
        .subcommand(csv())
        .subcommand(get())
        .subcommand(map())
        .subcommand(node())
        .subcommand(range())
        .subcommand(verify())
}

fn command(name: &'static str, about: &'static str) -> Command {
    SubCommand::with_name(name).version(clap::crate_version!()).about(about)
}

/// The dictionary file a command reads.
fn dictionary(help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name("input").required(true).help(help)
}

/// A `--name` option that takes a value.
fn option(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name).long(name).takes_value(true).help(help)
}

fn csv() -> Command {
    let table = |name, about| {
        command(name, about)
            .arg(dictionary("The dictionary to describe."))
            .arg(Arg::with_name("output").help(
                "Where to write the CSV rows. Stdout when absent or '-'.",
            ))
    };
    command("csv", "Describe the nodes or edges of a dictionary as CSV.")
        .subcommand(table(
            "edges",
            "One row per transition: source, target, input byte and output.",
        ))
        .subcommand(table(
            "nodes",
            "One row per node: address, encoding, size and finality.",
        ))
}

fn get() -> Command {
    command(
        "get",
        "\
Look up keys in a dictionary and print each hit as a CSV row of key and value.

Keys that are missing are listed in an error once every hit is printed.
",
    )
    .arg(dictionary("The dictionary to search."))
    .arg(
        Arg::with_name("key")
            .required(true)
            .multiple(true)
            .help("The keys to look up."),
    )
}

fn map() -> Command {
    command(
        "map",
        "\
Build a dictionary from headerless two column CSV files of key and value.

Rows must be sorted by key, byte-wise, across all files taken together. A key
that is smaller than or equal to the one before it aborts the build.
",
    )
    .arg(
        Arg::with_name("input")
            .required(true)
            .multiple(true)
            .help("CSV files of key,value rows. '-' reads stdin."),
    )
    .arg(
        Arg::with_name("output")
            .required(true)
            .help("Where to write the dictionary."),
    )
    .arg(
        Arg::with_name("force")
            .long("force")
            .help("Replace the output file if it exists."),
    )
    .arg(option(
        "delimiter",
        "The CSV field separator. Only its first byte counts. Default ','.",
    ))
    .arg(
        option("fst-type", "A number stored in the header to tag its kind.")
            .default_value("0"),
    )
    .arg(
        option(
            "registry-size",
            "Buckets in the table of recently written nodes. More buckets \
             find more shared suffixes and cost more memory. 0 turns \
             sharing off.",
        )
        .default_value("10000"),
    )
    .arg(
        option("registry-mru", "Nodes remembered per registry bucket.")
            .default_value("2"),
    )
}

fn node() -> Command {
    command(
        "node",
        "\
Print one node of a dictionary: its encoding, finality and transitions.

Addresses come from 'ifst csv nodes'. An address that is not the last byte
of some node is decoded as garbage, and may abort the program.
",
    )
    .arg(dictionary("The dictionary holding the node."))
    .arg(
        Arg::with_name("node-address")
            .required(true)
            .help("The byte offset of the node."),
    )
}

fn range() -> Command {
    let short =
        |name: &'static str, help| option(name, help).short(&name[..1]);
    command(
        "range",
        "\
Print the keys of a dictionary that fall in [start, end), in order.

The results can be narrowed further to a key prefix, a wildcard pattern or
both. With no bounds and no filters, every key is printed.
",
    )
    .arg(dictionary("The dictionary to scan."))
    .arg(
        Arg::with_name("outputs")
            .long("outputs")
            .short("o")
            .help("Print key,value CSV rows instead of bare keys."),
    )
    .arg(short("start", "Skip keys smaller than this."))
    .arg(short("end", "Stop before the first key at or after this."))
    .arg(short("prefix", "Keep only keys beginning with this."))
    .arg(short(
        "like",
        "Keep only keys matching this pattern. '*' matches any run of bytes \
         and '?' exactly one.",
    ))
}

fn verify() -> Command {
    command(
        "verify",
        "\
Recompute the checksum of each dictionary and compare it with the one in its
trailer. A mismatch means the file is damaged and should be rebuilt.

Dictionaries older than format version 3 have no checksum and always fail.
",
    )
    .arg(dictionary("The dictionaries to check.").multiple(true))
}

#[cfg(test)]
mod tests {
    use super::app;

    #[test]
    fn range_short_flags() {
        let argv = vec!["ifst", "range", "d.fst", "-s", "a", "-e", "b", "-o"];
        let m = app().get_matches_from_safe(argv).unwrap();
        let m = m.subcommand_matches("range").unwrap();
        assert_eq!(m.value_of("start"), Some("a"));
        assert_eq!(m.value_of("end"), Some("b"));
        assert!(m.is_present("outputs"));
    }

    #[test]
    fn csv_table_subcommand() {
        let argv = vec!["ifst", "csv", "nodes", "d.fst"];
        let m = app().get_matches_from_safe(argv).unwrap();
        let csv = m.subcommand_matches("csv").unwrap();
        let nodes = csv.subcommand_matches("nodes").unwrap();
        assert_eq!(nodes.value_of("input"), Some("d.fst"));
        assert_eq!(nodes.value_of("output"), None);
    }

    #[test]
    fn map_defaults() {
        let argv = vec!["ifst", "map", "a.csv", "b.csv", "d.fst"];
        let m = app().get_matches_from_safe(argv).unwrap();
        let m = m.subcommand_matches("map").unwrap();
        assert_eq!(m.values_of("input").unwrap().count(), 2);
        assert_eq!(m.value_of("registry-size"), Some("10000"));
        assert_eq!(m.value_of("registry-mru"), Some("2"));
    }
}
