use crc::{Algorithm, Crc};

/// Poly 0x31, init 0x00, no reflection, xor-out 0xC5.
const ECO_ALGORITHM: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x31,
    init: 0x00,
    refin: false,
    refout: false,
    xorout: 0xC5,
    check: 0x67,
    residue: 0x00,
};

const ECO_CRC: Crc<u8> = Crc::<u8>::new(&ECO_ALGORITHM);

/// CRC-8 carried in byte 14 of every ECO frame.
pub fn crc8(bytes: &[u8]) -> u8 {
    ECO_CRC.checksum(bytes)
}
