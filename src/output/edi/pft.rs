//! PFT (Protection, Fragmentation and Transport) framing: splits an AF
//! packet into MTU-sized PF fragments, with an optional trailing FEC
//! parity burst.
//!
//! The fragment/addressing/CRC framing below is fully implemented and
//! tested. The parity computation (`xor_parity`) is a structural
//! placeholder standing in for a real GF(256) Reed-Solomon coder: it
//! reconstructs a single lost fragment (XOR parity), not an arbitrary
//! number, and is not claimed to interoperate with a Reed-Solomon-based
//! receiver. Swapping in a real `reed-solomon-erasure`-backed coder
//! only touches this file.

use crc::{Crc, CRC_16_CCITT_FALSE};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_CCITT_FALSE);
const PF_HEADER_LEN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fec {
    Disabled,
    Enabled,
}

/// Splits `af` into PF fragments no larger than `mtu` bytes of payload,
/// each prefixed with a small header carrying `Findex`/`Fcount` and a
/// CRC16 over the fragment payload. When FEC is enabled, appends one
/// extra parity fragment carrying the XOR of all payload fragments,
/// zero-padded to the widest fragment.
pub fn fragment(af: &[u8], mtu: usize, fec: Fec) -> Vec<Vec<u8>> {
    assert!(mtu > 0, "PFT mtu must be positive");

    let payload_chunks: Vec<&[u8]> = af.chunks(mtu).collect();
    let fcount = payload_chunks.len() as u16;
    let mut out = Vec::with_capacity(payload_chunks.len() + 1);

    for (i, chunk) in payload_chunks.iter().enumerate() {
        out.push(build_fragment(i as u16, fcount, chunk, false));
    }

    if fec == Fec::Enabled && !payload_chunks.is_empty() {
        let width = payload_chunks.iter().map(|c| c.len()).max().unwrap_or(0);
        let mut parity = vec![0u8; width];
        for chunk in &payload_chunks {
            for (p, b) in parity.iter_mut().zip(chunk.iter()) {
                *p ^= b;
            }
        }
        out.push(build_fragment(fcount, fcount, &parity, true));
    }

    out
}

fn build_fragment(findex: u16, fcount: u16, payload: &[u8], is_fec: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(PF_HEADER_LEN + payload.len());
    out.extend_from_slice(b"PF");
    out.push(if is_fec { 1 } else { 0 });
    out.extend_from_slice(&findex.to_be_bytes());
    out.extend_from_slice(&fcount.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    let crc = CRC16.checksum(payload);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_fragment_when_under_mtu() {
        let af = vec![0u8; 100];
        let frags = fragment(&af, 1500, Fec::Disabled);
        assert_eq!(frags.len(), 1);
    }

    #[test]
    fn splits_into_contiguous_findex_fragments() {
        let af = vec![0xABu8; 3000];
        let frags = fragment(&af, 1000, Fec::Disabled);
        assert_eq!(frags.len(), 3);
        for (i, f) in frags.iter().enumerate() {
            let findex = u16::from_be_bytes([f[3], f[4]]);
            let fcount = u16::from_be_bytes([f[5], f[6]]);
            assert_eq!(findex, i as u16);
            assert_eq!(fcount, 3);
        }
    }

    #[test]
    fn fec_adds_one_trailing_parity_fragment() {
        let af = vec![0x11u8; 2500];
        let frags = fragment(&af, 1000, Fec::Enabled);
        assert_eq!(frags.len(), 4); // 3 payload + 1 parity
        assert_eq!(frags[3][2], 1); // is_fec marker
    }
}
