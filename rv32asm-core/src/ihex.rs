//! Intel HEX (I32) emitter (§6.4).
//!
//! Each contiguous byte region is split into 16-byte data records; an
//! extended linear address record (type `04`) is emitted whenever a
//! record's address would straddle a 64 KiB boundary from the last one
//! written. Always ends with an EOF record.

use std::fmt::Write as _;

const BYTES_PER_RECORD: usize = 16;

/// One contiguous range of bytes destined for a fixed load address.
pub struct HexRegion<'a> {
    pub address: u32,
    pub data: &'a [u8],
}

fn checksum(bytes: &[u8]) -> u8 {
    let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
    (!(sum as u8)).wrapping_add(1)
}

fn write_record(out: &mut String, byte_count: u8, address16: u16, rec_type: u8, data: &[u8]) {
    let mut bytes = Vec::with_capacity(4 + data.len());
    bytes.push(byte_count);
    bytes.push((address16 >> 8) as u8);
    bytes.push((address16 & 0xFF) as u8);
    bytes.push(rec_type);
    bytes.extend_from_slice(data);
    let cksum = checksum(&bytes);

    write!(out, ":{byte_count:02X}{address16:04X}{rec_type:02X}").unwrap();
    for b in data {
        write!(out, "{b:02X}").unwrap();
    }
    writeln!(out, "{cksum:02X}").unwrap();
}

/// Render a set of byte regions into Intel HEX text.
pub fn render(regions: &[HexRegion]) -> String {
    let mut out = String::new();
    let mut current_upper: Option<u16> = Some(0);

    for region in regions {
        if region.data.is_empty() {
            continue;
        }
        for (chunk_idx, chunk) in region.data.chunks(BYTES_PER_RECORD).enumerate() {
            let addr = region.address.wrapping_add((chunk_idx * BYTES_PER_RECORD) as u32);
            let upper = (addr >> 16) as u16;
            if current_upper != Some(upper) {
                write_record(&mut out, 2, 0, 0x04, &[(upper >> 8) as u8, (upper & 0xFF) as u8]);
                current_upper = Some(upper);
            }
            write_record(&mut out, chunk.len() as u8, (addr & 0xFFFF) as u16, 0x00, chunk);
        }
    }

    write_record(&mut out, 0, 0, 0x01, &[]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_region_round_trips_checksum() {
        let data = [0x01u8, 0x02, 0x03];
        let text = render(&[HexRegion { address: 0, data: &data }]);
        let first_line = text.lines().next().unwrap();
        assert_eq!(first_line, ":03000000010203F7");
    }

    #[test]
    fn ends_with_eof_record() {
        let data = [0xAAu8; 1];
        let text = render(&[HexRegion { address: 0, data: &data }]);
        assert_eq!(text.lines().last().unwrap(), ":00000001FF");
    }

    #[test]
    fn crosses_64kib_boundary_with_extended_linear_record() {
        let data = [0u8; 4];
        let text = render(&[HexRegion { address: 0x1_0000, data: &data }]);
        assert!(text.lines().any(|l| l.contains(":02000004")));
    }

    #[test]
    fn splits_long_regions_into_16_byte_records() {
        let data = [0u8; 32];
        let text = render(&[HexRegion { address: 0, data: &data }]);
        let data_records: Vec<&str> = text.lines().filter(|l| l.len() > 11 && &l[7..9] == "00").collect();
        assert_eq!(data_records.len(), 2);
    }
}
