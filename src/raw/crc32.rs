use byteorder::{ByteOrder, LittleEndian};

use crate::raw::crc32_table::{TABLE, TABLE16};

/// A running CRC32C (Castagnoli) over everything passed to `update`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckSummer {
    crc: u32,
}

impl CheckSummer {
    pub fn update(&mut self, buf: &[u8]) {
        self.crc = extend(self.crc, buf);
    }

    /// The checksum so far, masked the way Snappy frames mask theirs. This
    /// is the value stored in the trailer.
    pub fn masked(&self) -> u32 {
        mask(self.crc)
    }
}

/// The masked checksum of `buf` in one call.
pub fn masked_checksum(buf: &[u8]) -> u32 {
    mask(extend(0, buf))
}

fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(0xa282_ead8)
}

/// Continues the CRC `prev` over `buf`, sixteen bytes per step.
fn extend(prev: u32, buf: &[u8]) -> u32 {
    let mut crc = !prev;
    let mut chunks = buf.chunks_exact(16);
    for chunk in &mut chunks {
        // The running CRC folds into the first four bytes. Byte `i` of the
        // block then contributes the table for `15 - i` trailing bytes.
        let head = (LittleEndian::read_u32(chunk) ^ crc).to_le_bytes();
        crc = head
            .iter()
            .chain(&chunk[4..])
            .enumerate()
            .fold(0, |acc, (i, &b)| acc ^ TABLE16[15 - i][b as usize]);
    }
    for &b in chunks.remainder() {
        crc = TABLE[((crc as u8) ^ b) as usize] ^ (crc >> 8);
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::{extend, masked_checksum, CheckSummer, TABLE};

    #[test]
    fn known_vector() {
        assert_eq!(extend(0, b"123456789"), 0xE3069283);
    }

    #[test]
    fn empty_input() {
        assert_eq!(extend(0, b""), 0);
        assert_eq!(masked_checksum(b""), 0xa282_ead8);
    }

    /// Bytewise CRC, to check the sixteen byte path against.
    fn slow(buf: &[u8]) -> u32 {
        !buf.iter().fold(!0u32, |crc, &b| {
            TABLE[((crc as u8) ^ b) as usize] ^ (crc >> 8)
        })
    }

    #[test]
    fn blocks_match_bytewise() {
        let data: Vec<u8> =
            (0..200u32).map(|i| (i * 31 % 256) as u8).collect();
        for n in 0..data.len() {
            let prefix = &data[..n];
            assert_eq!(extend(0, prefix), slow(prefix), "length {}", n);
        }
    }

    #[test]
    fn incremental_matches_whole() {
        let data: Vec<u8> =
            (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut parts = CheckSummer::default();
        for chunk in data.chunks(13) {
            parts.update(chunk);
        }
        assert_eq!(parts.masked(), masked_checksum(&data));
    }
}
