use std::fs::File;
use std::io::{self, Write};

use index_fst::automaton::{Str, Subsequence, Wildcard};
use index_fst::map::BuilderOptions;
use index_fst::raw::{self, Fst};
use index_fst::{Automaton, Error, IntoStreamer, Map, MapBuilder, Streamer};
use memmap2::Mmap;

/// Tag terms of a small metrics index, with posting list offsets.
const TERMS: &[(&str, u64)] = &[
    ("dc=ams", 0),
    ("dc=fra", 112),
    ("dc=iad", 260),
    ("env=prod", 301),
    ("env=staging", 977),
    ("host=db-01", 1024),
    ("host=db-02", 1180),
    ("host=web-01", 2048),
    ("host=web-02", 2200),
    ("host=web-10", 2391),
    ("os=linux", 4096),
    ("region=eu-west-1", 5000),
];

fn terms_map() -> Map<Vec<u8>> {
    Map::from_iter(TERMS.iter().cloned()).unwrap()
}

fn write_to_file(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn get_every_term() {
    let map = terms_map();
    assert_eq!(map.len(), TERMS.len());
    for &(k, v) in TERMS {
        assert_eq!(map.get(k), Some(v));
        assert!(map.contains_key(k));
    }
    assert_eq!(map.get("host=web"), None);
    assert_eq!(map.get("host=web-011"), None);
    assert_eq!(map.get(""), None);
    assert!(!map.contains_key("zone=a"));
}

#[test]
fn stream_is_sorted() {
    let map = terms_map();
    let mut stream = map.stream();
    let mut got = vec![];
    while let Some((k, v)) = stream.next() {
        got.push((String::from_utf8(k.to_vec()).unwrap(), v));
    }
    let want: Vec<(String, u64)> =
        TERMS.iter().map(|&(k, v)| (k.to_string(), v)).collect();
    assert_eq!(got, want);
}

#[test]
fn range_of_one_tag() {
    let map = terms_map();
    let hosts = map.range().ge("host=").lt("host>").into_stream();
    assert_eq!(
        hosts.into_str_keys().unwrap(),
        vec![
            "host=db-01",
            "host=db-02",
            "host=web-01",
            "host=web-02",
            "host=web-10",
        ]
    );
}

#[test]
fn prefix_and_pattern_search() {
    let map = terms_map();
    let web = map.search(Str::new("host=web").starts_with()).into_stream();
    assert_eq!(web.into_values(), vec![2048, 2200, 2391]);

    let like = map.search(Wildcard::new("host=*-0?")).into_stream();
    assert_eq!(
        like.into_str_keys().unwrap(),
        vec!["host=db-01", "host=db-02", "host=web-01", "host=web-02"]
    );

    let either = Str::new("os=linux").union(Str::new("dc=iad"));
    let got = map.search(either).into_stream().into_str_vec().unwrap();
    assert_eq!(
        got,
        vec![("dc=iad".to_string(), 260), ("os=linux".to_string(), 4096)]
    );

    let not_hosts = Str::new("host=").starts_with().complement();
    assert_eq!(map.search(not_hosts).into_stream().into_values().len(), 7);

    let fuzzy =
        Subsequence::new("hw2").intersection(Str::new("h").starts_with());
    assert_eq!(
        map.search(fuzzy).into_stream().into_str_keys().unwrap(),
        vec!["host=web-02"]
    );
}

#[test]
fn build_to_file_and_mmap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terms.fst");

    let wtr = io::BufWriter::new(File::create(&path).unwrap());
    let mut builder = MapBuilder::new(wtr).unwrap();
    builder.extend_iter(TERMS.iter().cloned()).unwrap();
    builder.finish().unwrap();

    let mmap = unsafe { Mmap::map(&File::open(&path).unwrap()).unwrap() };
    let map = Map::new(mmap).unwrap();
    map.verify().unwrap();
    assert_eq!(map.get("region=eu-west-1"), Some(5000));
    assert_eq!(map.as_fst().as_bytes(), terms_map().as_fst().as_bytes());
}

#[test]
fn mmap_detects_corruption() {
    let mut bytes = terms_map().into_fst().into_inner();
    bytes[20] ^= 0x80;
    let file = write_to_file(&bytes);

    let mmap = unsafe { Mmap::map(file.as_file()).unwrap() };
    let map = Map::new(mmap).unwrap();
    match map.verify() {
        Err(Error::Fst(raw::Error::ChecksumMismatch { .. })) => {}
        Err(err) => panic!("expected checksum mismatch, got {:?}", err),
        Ok(()) => panic!("corruption went unnoticed"),
    }
}

#[test]
fn truncated_file_is_rejected() {
    let bytes = terms_map().into_fst().into_inner();
    let file = write_to_file(&bytes[..bytes.len() - 1]);
    let mmap = unsafe { Mmap::map(file.as_file()).unwrap() };
    assert!(Map::new(mmap).is_err());
}

#[test]
fn builder_options_are_honored() {
    let opts = BuilderOptions::default().fst_type(42).registry_table_size(0);
    let mut builder = MapBuilder::with_options(vec![], opts).unwrap();
    builder.extend_iter(TERMS.iter().cloned()).unwrap();
    let bytes = builder.into_inner().unwrap();

    let fst = Fst::new_with_type(bytes, 42).unwrap();
    let map = Map::from(fst);
    for &(k, v) in TERMS {
        assert_eq!(map.get(k), Some(v));
    }
    assert_eq!(map.as_fst().fst_type(), 42);
}

#[test]
fn copy_between_builders() {
    let src = terms_map();
    let mut builder = MapBuilder::memory();
    builder.extend_stream(src.range().ge("env=").lt("host=")).unwrap();
    let copy = builder.into_map();
    assert_eq!(copy.len(), 2);
    assert_eq!(copy.get("env=staging"), Some(977));
}

#[test]
fn rejects_unsorted_input() {
    let res = Map::from_iter(vec![("b", 1), ("a", 2)]);
    match res {
        Err(Error::Fst(raw::Error::OutOfOrder { .. })) => {}
        Err(err) => panic!("expected out of order error, got {:?}", err),
        Ok(_) => panic!("unsorted input was accepted"),
    }
}
