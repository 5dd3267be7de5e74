use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use index_fst::raw::Fst;
use index_fst::{IntoStreamer, Map, Streamer};
use memmap2::Mmap;
use tracing::debug;

use crate::Error;

/// Maps the file at `path` into memory and opens it as a transducer.
///
/// This is unsafe because the file must not be changed while it is mapped.
pub unsafe fn open_fst(path: &Path) -> Result<Fst<Mmap>, Error> {
    let file = File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mmap = Mmap::map(&file)?;
    debug!(path = %path.display(), bytes = mmap.len(), "mapped file");
    let fst = Fst::new(mmap).with_context(|| {
        format!("{} is not a term dictionary", path.display())
    })?;
    Ok(fst)
}

/// Like `open_fst`, but wrapped in the `u64` valued map interface.
pub unsafe fn open_map(path: &Path) -> Result<Map<Mmap>, Error> {
    open_fst(path).map(Map::from)
}

/// `-` names the standard stream in place of a file.
fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

pub fn open_input(path: &Path) -> Result<Box<dyn io::Read>, Error> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    Ok(Box::new(file))
}

/// Opens `path` for writing, or stdout when there is no path.
pub fn create_output(
    path: Option<&Path>,
) -> Result<Box<dyn io::Write>, Error> {
    let path = match path {
        Some(path) if !is_stdio(path) => path,
        _ => return Ok(Box::new(io::BufWriter::new(io::stdout()))),
    };
    let file = File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    Ok(Box::new(io::BufWriter::new(file)))
}

/// Writes each key of `entries` on its own line. With `values`, writes CSV
/// rows of key and value instead.
pub fn write_entries<'f, W, I, S>(
    wtr: W,
    values: bool,
    entries: I,
) -> Result<(), Error>
where
    W: io::Write,
    I: for<'a> IntoStreamer<'a, Into = S, Item = (&'a [u8], u64)>,
    S: 'f + for<'a> Streamer<'a, Item = (&'a [u8], u64)>,
{
    let mut entries = entries.into_stream();
    if values {
        let mut rows = csv::Writer::from_writer(wtr);
        while let Some((key, value)) = entries.next() {
            rows.write_field(key)?;
            rows.write_field(value.to_string())?;
            rows.write_record(None::<&[u8]>)?;
        }
        rows.flush()?;
    } else {
        let mut wtr = wtr;
        while let Some((key, _)) = entries.next() {
            wtr.write_all(key)?;
            wtr.write_all(b"\n")?;
        }
        wtr.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use index_fst::Map;

    use super::{is_stdio, open_fst, open_map, write_entries};

    #[test]
    fn keys_then_rows() {
        let map =
            Map::from_iter(vec![("dc=east", 1), ("dc=west", 2)]).unwrap();

        let mut keys = vec![];
        write_entries(&mut keys, false, map.range().ge("dc=f")).unwrap();
        assert_eq!(keys, b"dc=west\n".to_vec());

        let mut rows = vec![];
        write_entries(&mut rows, true, &map).unwrap();
        assert_eq!(rows, b"dc=east,1\ndc=west,2\n".to_vec());
    }

    #[test]
    fn keys_with_delimiters_are_quoted_in_rows() {
        let map = Map::from_iter(vec![("a,b", 3)]).unwrap();
        let mut rows = vec![];
        write_entries(&mut rows, true, &map).unwrap();
        assert_eq!(rows, b"\"a,b\",3\n".to_vec());
    }

    #[test]
    fn dash_is_stdio() {
        assert!(is_stdio(Path::new("-")));
        assert!(!is_stdio(Path::new("./-")));
    }

    #[test]
    fn mapped_file_reads_back() {
        let map = Map::from_iter(vec![("os=linux", 7)]).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(map.as_fst().as_bytes()).unwrap();
        file.flush().unwrap();

        let mapped = unsafe { open_map(file.path()).unwrap() };
        assert_eq!(mapped.get("os=linux"), Some(7));
        mapped.verify().unwrap();
    }

    #[test]
    fn garbage_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a dictionary").unwrap();
        file.flush().unwrap();

        let msg = match unsafe { open_fst(file.path()) } {
            Ok(_) => panic!("opened a file that is not a transducer"),
            Err(err) => format!("{:#}", err),
        };
        assert!(msg.contains("is not a term dictionary"), "{}", msg);
    }
}
