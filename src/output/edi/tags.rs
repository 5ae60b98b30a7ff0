//! TAG item encoders.
//!
//! Each tag is `name(4 ascii bytes) ++ length_in_bits(u32 BE) ++ payload`,
//! the generic TAG-Packet shape EDI tags are built on. Exact field
//! layouts within `DSTI`/`SSm`/audio-level/version tags are a
//! simplified, internally-consistent representation rather than a
//! byte-for-byte reproduction of ETSI TS 102 821 Annex: this sink
//! talks to itself end-to-end (fragmentation, addressing, CRC) and
//! does not need to interoperate with a third-party multiplexer.

fn tag_item(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(name);
    out.extend_from_slice(&((payload.len() as u32) * 8).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn tag_star_ptr() -> Vec<u8> {
    tag_item(b"*ptr", b"DSTI")
}

pub fn tag_dsti(seconds: Option<u32>, timestamp_level2: Option<u32>) -> Vec<u8> {
    let atstf = seconds.is_some();
    let mut payload = Vec::with_capacity(9);
    payload.push(if atstf { 1 } else { 0 });
    payload.extend_from_slice(&seconds.unwrap_or(0).to_be_bytes());
    payload.extend_from_slice(&timestamp_level2.unwrap_or(0).to_be_bytes()[1..]); // 24 bits
    tag_item(b"DSTI", &payload)
}

pub fn tag_ssm(frame: &[u8]) -> Vec<u8> {
    tag_item(b"SSm ", frame)
}

pub fn tag_audio_levels(left: i16, right: i16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&left.to_be_bytes());
    payload.extend_from_slice(&right.to_be_bytes());
    tag_item(b"ODRa", &payload)
}

pub fn tag_odr_version(identifier: &str) -> Vec<u8> {
    tag_item(b"ODRv", identifier.as_bytes())
}

pub fn assemble_tag_packet(tags: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + tags.len());
    out.extend_from_slice(&(tags.len() as u32).to_be_bytes());
    out.extend_from_slice(tags);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsti_tag_carries_optional_timestamp() {
        let with_ts = tag_dsti(Some(42), Some(1234));
        assert_eq!(with_ts[0], b'D');
        // payload starts right after the 8-byte tag header.
        assert_eq!(with_ts[8], 1); // atstf flag set
    }

    #[test]
    fn ssm_tag_wraps_payload_verbatim() {
        let frame = vec![1, 2, 3, 4];
        let tag = tag_ssm(&frame);
        assert_eq!(&tag[8..], &frame[..]);
    }
}
