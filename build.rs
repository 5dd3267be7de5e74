use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CASTAGNOLI_POLY: u32 = 0x82f63b78;

/// The byte ranking shared by every reader and writer of format version 3,
/// most frequent first. It is the ranking the `fst` 0.4 crate ships, which
/// was measured over URL-like keys. Bytes missing from this list follow it in
/// ascending order. Changing either part changes the wire format.
const COMMON_BYTES: &[u8] =
    b"te/oasripcnw.hlm-du012g=:bf3y5&_4v9678k%?xCDASFIBEjPTzRNM+LOqHGWUV,YKJZXQ;)(~[]$!'*@";

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() {
    if let Err(err) = try_main() {
        panic!("{}", err);
    }
}

fn try_main() -> Result<()> {
    let out_dir = match env::var_os("OUT_DIR") {
        None => {
            return Err(From::from("OUT_DIR environment variable not defined"))
        }
        Some(out_dir) => PathBuf::from(out_dir),
    };
    write_common_inputs(&out_dir)?;
    write_crc_tables(&out_dir)?;
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}

fn write_common_inputs(out_dir: &Path) -> Result<()> {
    let out_path = out_dir.join("common_inputs.rs");
    let mut out = io::BufWriter::new(File::create(out_path)?);

    let (ranks, inverse) = common_input_tables()?;
    writeln!(out, "pub const COMMON_INPUTS: [u8; 256] = [")?;
    for &r in ranks.iter() {
        writeln!(out, "    {},", r)?;
    }
    writeln!(out, "];\n")?;

    writeln!(out, "pub const COMMON_INPUTS_INV: [u8; 256] = [")?;
    for &b in inverse.iter() {
        writeln!(out, "    {},", b)?;
    }
    writeln!(out, "];")?;

    out.flush()?;
    Ok(())
}

/// Returns a permutation of all bytes ranked by expected frequency, along
/// with its inverse. `ranks[b]` is the rank of byte `b` and `inverse[r]` is
/// the byte with rank `r`.
fn common_input_tables() -> Result<([u8; 256], [u8; 256])> {
    let mut seen = [false; 256];
    let mut order = Vec::with_capacity(256);
    for &b in COMMON_BYTES {
        if seen[b as usize] {
            return Err(From::from(format!("duplicate common byte {:?}", b)));
        }
        seen[b as usize] = true;
        order.push(b);
    }
    for b in 0u8..=255 {
        if !seen[b as usize] {
            order.push(b);
        }
    }

    let mut ranks = [0u8; 256];
    let mut inverse = [0u8; 256];
    for (rank, &b) in order.iter().enumerate() {
        ranks[b as usize] = rank as u8;
        inverse[rank] = b;
    }
    Ok((ranks, inverse))
}

fn write_crc_tables(out_dir: &Path) -> Result<()> {
    let out_path = out_dir.join("crc32_table.rs");
    let mut out = io::BufWriter::new(File::create(out_path)?);

    let table = make_table(CASTAGNOLI_POLY);
    let table16 = make_table16(CASTAGNOLI_POLY);

    writeln!(out, "pub const TABLE: [u32; 256] = [")?;
    for &x in table.iter() {
        writeln!(out, "    {},", x)?;
    }
    writeln!(out, "];\n")?;

    writeln!(out, "pub const TABLE16: [[u32; 256]; 16] = [")?;
    for table in table16.iter() {
        writeln!(out, "    [")?;
        for &x in table.iter() {
            writeln!(out, "        {},", x)?;
        }
        writeln!(out, "    ],")?;
    }
    writeln!(out, "];")?;

    out.flush()?;

    Ok(())
}

fn make_table16(poly: u32) -> [[u32; 256]; 16] {
    let mut tab = [[0; 256]; 16];
    tab[0] = make_table(poly);
    for i in 0..256 {
        let mut crc = tab[0][i];
        for j in 1..16 {
            crc = (crc >> 8) ^ tab[0][crc as u8 as usize];
            tab[j][i] = crc;
        }
    }
    tab
}

fn make_table(poly: u32) -> [u32; 256] {
    let mut tab = [0; 256];
    for i in 0u32..256u32 {
        let mut crc = i;
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ poly;
            } else {
                crc >>= 1;
            }
        }
        tab[i as usize] = crc;
    }
    tab
}
