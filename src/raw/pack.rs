use std::io;

use byteorder::{ByteOrder, LittleEndian};

use crate::raw::CompiledAddr;

/// Writes `n` little endian in exactly `nbytes` bytes.
///
/// `nbytes` must be at least `pack_size(n)` and at most 8.
pub fn pack_uint_in<W: io::Write>(
    mut wtr: W,
    n: u64,
    nbytes: u8,
) -> io::Result<()> {
    assert!(1 <= nbytes && nbytes <= 8);
    assert!(pack_size(n) <= nbytes);
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, n);
    wtr.write_all(&buf[..nbytes as usize])
}

/// Reads an integer written by `pack_uint_in` from the front of `slice`.
///
/// A width of zero is never read; callers treat it as the value `0`.
#[inline(always)]
pub fn unpack_uint(slice: &[u8], nbytes: u8) -> u64 {
    assert!(1 <= nbytes && nbytes <= 8);
    LittleEndian::read_uint(slice, nbytes as usize)
}

/// The smallest number of bytes that can hold `n`. Zero still takes a byte.
#[inline]
pub fn pack_size(n: u64) -> u8 {
    if n < 1 << 8 {
        1
    } else if n < 1 << 16 {
        2
    } else if n < 1 << 24 {
        3
    } else if n < 1 << 32 {
        4
    } else if n < 1 << 40 {
        5
    } else if n < 1 << 48 {
        6
    } else if n < 1 << 56 {
        7
    } else {
        8
    }
}

/// Writes the target of a transition as its distance below `node_start`,
/// the offset of the first byte of the node being written, in exactly
/// `nbytes` bytes.
///
/// The empty final state is written as a zero distance.
pub fn pack_delta_in<W: io::Write>(
    wtr: W,
    node_start: usize,
    target: CompiledAddr,
    nbytes: u8,
) -> io::Result<()> {
    pack_uint_in(wtr, distance(node_start, target) as u64, nbytes)
}

/// The smallest width `pack_delta_in` can use for `target`.
pub fn pack_delta_size(node_start: usize, target: CompiledAddr) -> u8 {
    pack_size(distance(node_start, target) as u64)
}

/// Reads a transition target written by `pack_delta_in` for a node whose first
/// byte is at `node_start`.
#[inline(always)]
pub fn unpack_delta(
    slice: &[u8],
    nbytes: usize,
    node_start: usize,
) -> CompiledAddr {
    match u64_to_usize(unpack_uint(slice, nbytes as u8)) {
        0 => CompiledAddr::EMPTY,
        d => CompiledAddr::new(node_start - d),
    }
}

#[inline(always)]
fn distance(node_start: usize, target: CompiledAddr) -> usize {
    if target.is_empty_final() {
        0
    } else {
        node_start - target.offset()
    }
}

#[inline]
#[cfg(target_pointer_width = "64")]
pub fn u64_to_usize(n: u64) -> usize {
    n as usize
}

#[inline]
#[cfg(not(target_pointer_width = "64"))]
pub fn u64_to_usize(n: u64) -> usize {
    if n > std::usize::MAX as u64 {
        panic!(
            "\
Cannot convert node address {} to a pointer sized variable. If this FST
is very large and was generated on a system with a larger pointer size
than this system, then it is not possible to read this FST on this
system.",
            n
        );
    }
    n as usize
}
