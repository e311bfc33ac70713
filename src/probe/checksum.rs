/// Calculate the Internet checksum (RFC 1071) over `data`.
///
/// The buffer is summed as big-endian 16-bit words, an odd trailing byte is
/// padded with a zero low byte, carries are folded back in and the one's
/// complement of the result is returned. Write it with `to_be_bytes`.
///
/// When encoding, the checksum field inside `data` must be zero.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u16::from_be_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Returns true if `data`, checksum field included, sums to zero.
pub fn verify(data: &[u8]) -> bool {
    checksum(data) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn embed(mut data: Vec<u8>) -> Vec<u8> {
        data[2] = 0;
        data[3] = 0;
        let sum = checksum(&data);
        data[2..4].copy_from_slice(&sum.to_be_bytes());
        data
    }

    #[test]
    fn test_known_vector() {
        // Echo Request, id=0x1234 seq=1, no payload
        let data = [0x08, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00, 0x01];
        assert_eq!(checksum(&data), 0xE5CA);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_odd_length_pads_low_byte() {
        // [0xAB] is summed as the word 0xAB00
        assert_eq!(checksum(&[0xAB]), !0xAB00);
        assert_eq!(checksum(&[0x01, 0x02, 0xAB]), !(0x0102u16 + 0xAB00));
    }

    #[test]
    fn test_carry_is_folded() {
        // 0xFFFF + 0x0001 = 0x10000 -> folds to 0x0001
        assert_eq!(checksum(&[0xFF, 0xFF, 0x00, 0x01]), !0x0001);
    }

    #[test_case(vec![0u8; 8]; "all zero header")]
    #[test_case(vec![8, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]; "all ones id and seq")]
    #[test_case(vec![0, 0, 0, 0, 1, 2, 3, 4, 5]; "odd length")]
    #[test_case((0..=255u8).collect(); "every byte value")]
    fn test_embedded_checksum_verifies(data: Vec<u8>) {
        assert!(verify(&embed(data)));
    }

    #[test]
    fn test_corruption_is_detected() {
        let mut data = embed(vec![8, 0, 0, 0, 0x12, 0x34, 0x00, 0x07, 0xDE, 0xAD]);
        data[9] ^= 0x01;
        assert!(!verify(&data));
    }

    #[test]
    fn test_matches_pnet() {
        let data = embed(vec![8, 0, 0, 0, 0xBE, 0xEF, 0x00, 0x2A, 1, 2, 3, 4, 5, 6, 7]);
        // pnet skips the checksum word (index 1) itself
        assert_eq!(pnet::util::checksum(&data, 1), u16::from_be_bytes([data[2], data[3]]));
    }
}
