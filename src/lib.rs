/*!
Crate `index_fst` is a library for building, storing and searching ordered
maps from byte strings to `u64` values using finite state transducers.

It is the term dictionary underneath a tag/column inverted index: the index
layer feeds it `(term, posting-list pointer)` pairs in sorted order, and the
transducer compresses them by sharing both prefixes and suffixes. The result
is a single self describing byte buffer (with a header, a trailer and a
checksum) that can be queried in place. No deserialization step exists; a
`Vec<u8>` or a memory map works equally well.

# Overview

* `Map` is the usual way in: build one from sorted pairs with
  `Map::from_iter`, or open existing bytes with `Map::new`.
* `MapBuilder` streams a map to any `io::Write`, for example a file.
* Range queries go through `StreamBuilder` (`ge`, `gt`, `le`, `lt`) and can
  be filtered by any `Automaton`, such as a prefix or a wildcard pattern.
* The `raw` module exposes the transducer itself, down to individual nodes
  and transitions.

# Example

```rust
use index_fst::{IntoStreamer, Map, Streamer};

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn std::error::Error>> {
    let map = Map::from_iter(vec![
        ("host=a", 1), ("host=b", 2), ("region=eu", 3), ("region=us", 4),
    ])?;
    assert_eq!(map.get("host=b"), Some(2));

    let mut stream = map.range().ge("host=b").lt("region=us").into_stream();
    let mut kvs = vec![];
    while let Some((k, v)) = stream.next() {
        kvs.push((k.to_vec(), v));
    }
    assert_eq!(kvs, vec![
        (b"host=b".to_vec(), 2),
        (b"region=eu".to_vec(), 3),
    ]);
    Ok(())
}
```

# Concurrency

Building is single threaded: a builder owns its frontier of pending nodes and
its node registry. A finished `Fst` is never mutated. Every `get` and every
stream carries its own traversal state, so a single `Fst` may be shared by
any number of readers.

# Corruption

Opening a transducer checks the header and trailer only. Routine lookups
never recompute the checksum. Call `verify` after loading bytes whose
integrity is not otherwise guaranteed.
*/

#![deny(missing_docs)]

pub use crate::automaton::Automaton;
pub use crate::error::{Error, Result};
pub use crate::map::{Map, MapBuilder};
pub use crate::stream::{IntoStreamer, Streamer};

pub mod automaton;
mod error;
#[path = "map.rs"]
mod inner_map;
pub mod raw;
mod stream;

/// Map operations implemented by finite state transducers.
///
/// This API provided by this sub-module is close in spirit to the API
/// provided by
/// [`std::collections::BTreeMap`](https://doc.rust-lang.org/stable/std/collections/struct.BTreeMap.html),
/// except that every map is immutable once built and traversal happens
/// through streams instead of iterators.
///
/// # Overview of types
///
/// `Map` is a read only interface to pre-constructed maps. `MapBuilder` is
/// used to create new maps. `Stream` is a stream of key-value pairs and
/// `StreamBuilder` builds range queries.
pub mod map {
    pub use crate::inner_map::*;
}
