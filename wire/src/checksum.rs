//! Internet checksum (RFC 1071).

use std::net::Ipv4Addr;

/// Ones'-complement checksum over `data`, ready to be stored in a header.
pub fn checksum(data: &[u8]) -> u16 {
    !fold(sum_words(data))
}

/// True when `data` (checksum field included) sums to all-ones.
pub fn verify_checksum(data: &[u8]) -> bool {
    fold(sum_words(data)) == 0xffff
}

/// TCP/UDP checksum including the IPv4 pseudo-header.
pub fn transport_checksum(src: Ipv4Addr, dst: Ipv4Addr, proto: u8, segment: &[u8]) -> u16 {
    let mut sum = sum_words(&src.octets()) + sum_words(&dst.octets());
    sum += proto as u64;
    sum += segment.len() as u64;
    sum += sum_words(segment);
    !fold(sum)
}

/// Update a stored checksum after the covered bytes `old` were replaced by
/// `new` (RFC 1624). Both must be the same even length and word aligned.
pub fn adjust_checksum(stored: u16, old: &[u8], new: &[u8]) -> u16 {
    let sum = !stored as u64 + !fold(sum_words(old)) as u64 + sum_words(new);
    !fold(sum)
}

#[inline]
fn fold(mut sum: u64) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Sum 16-bit big-endian words; an odd trailing byte is padded with zero.
#[inline]
fn sum_words(data: &[u8]) -> u64 {
    let mut chunks = data.chunks_exact(2);
    let mut sum: u64 = chunks
        .by_ref()
        .map(|w| u16::from_be_bytes([w[0], w[1]]) as u64)
        .sum();
    if let [last] = chunks.remainder() {
        sum += u16::from_be_bytes([*last, 0]) as u64;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc1071_example() {
        // Worked example from RFC 1071 section 3.
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), !0xddf2);
    }

    #[test]
    fn test_odd_length() {
        assert_eq!(checksum(&[0xff]), !0xff00);
    }

    #[test]
    fn test_verify_roundtrip() {
        let mut hdr = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let c = checksum(&hdr);
        assert_eq!(c, 0xb861);
        hdr[10..12].copy_from_slice(&c.to_be_bytes());
        assert!(verify_checksum(&hdr));
        hdr[15] ^= 1;
        assert!(!verify_checksum(&hdr));
    }

    #[test]
    fn test_adjust_matches_recompute() {
        let mut hdr = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let before = checksum(&hdr);
        let new_src = [10, 0, 0, 21];
        let adjusted = adjust_checksum(before, &hdr[12..16], &new_src);

        hdr[12..16].copy_from_slice(&new_src);
        assert_eq!(adjusted, checksum(&hdr));
        hdr[10..12].copy_from_slice(&adjusted.to_be_bytes());
        assert!(verify_checksum(&hdr));
    }
}
