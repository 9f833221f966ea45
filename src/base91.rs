//! basE91 binary-to-text encoding.
//!
//! Packs 13 or 14 bits into every two output characters, which is denser
//! than base64 and keeps mission tokens short enough for low-capacity
//! transports such as QR codes. The alphabet is printable ASCII minus the
//! characters that are unsafe inside URLs and quoted strings (`-`, `\`, `'`).

const ALPHABET: &[u8; 91] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&()*+,./:;<=>?@[]^_`{|}~\"";

const INVALID: u8 = 91;

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

const DECODE_TABLE: [u8; 256] = build_decode_table();

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Base91Error {
    #[error("Invalid basE91 character 0x{byte:02x} at position {position}")]
    InvalidCharacter { position: usize, byte: u8 },
}

/// Encode arbitrary bytes into a basE91 string.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 5 / 4 + 2);
    let mut accumulator: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data {
        accumulator |= (byte as u32) << bits;
        bits += 8;
        if bits > 13 {
            let mut value = accumulator & 8191;
            if value > 88 {
                accumulator >>= 13;
                bits -= 13;
            } else {
                // Low 13-bit values leave room for a 14th bit
                value = accumulator & 16383;
                accumulator >>= 14;
                bits -= 14;
            }
            out.push(ALPHABET[(value % 91) as usize] as char);
            out.push(ALPHABET[(value / 91) as usize] as char);
        }
    }

    if bits > 0 {
        out.push(ALPHABET[(accumulator % 91) as usize] as char);
        if bits > 7 || accumulator > 90 {
            out.push(ALPHABET[(accumulator / 91) as usize] as char);
        }
    }

    out
}

/// Decode a basE91 string back into bytes.
pub fn decode(input: &str) -> Result<Vec<u8>, Base91Error> {
    let mut out = Vec::with_capacity(input.len());
    let mut pending: i32 = -1;
    let mut accumulator: u32 = 0;
    let mut bits: u32 = 0;

    for (position, &byte) in input.as_bytes().iter().enumerate() {
        let digit = DECODE_TABLE[byte as usize];
        if digit == INVALID {
            return Err(Base91Error::InvalidCharacter { position, byte });
        }
        if pending < 0 {
            pending = digit as i32;
            continue;
        }
        let value = pending as u32 + digit as u32 * 91;
        accumulator |= value << bits;
        bits += if value & 8191 > 88 { 13 } else { 14 };
        while bits >= 8 {
            out.push((accumulator & 255) as u8);
            accumulator >>= 8;
            bits -= 8;
        }
        pending = -1;
    }

    if pending >= 0 {
        out.push(((accumulator | (pending as u32) << bits) & 255) as u8);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_text() {
        let data = b"May the force be with you";
        let encoded = encode(data);
        assert_eq!(decode(&encoded).expect("decode failed"), data.to_vec());
    }

    #[test]
    fn round_trips_every_byte_value() {
        let data: Vec<u8> = (0u8..=255).collect();
        let encoded = encode(&data);
        assert_eq!(decode(&encoded).expect("decode failed"), data);
    }

    #[test]
    fn round_trips_empty_and_single_byte() {
        assert_eq!(decode(&encode(&[])).expect("decode failed"), Vec::<u8>::new());
        assert_eq!(decode(&encode(&[0x42])).expect("decode failed"), vec![0x42]);
    }

    #[test]
    fn denser_than_base64() {
        let data = [0xa5u8; 300];
        // base64 would need 400 characters for 300 bytes
        assert!(encode(&data).len() < 400);
    }

    #[test]
    fn rejects_out_of_alphabet_characters() {
        let err = decode("ab-cd").expect_err("dash is not in the alphabet");
        assert_eq!(
            err,
            Base91Error::InvalidCharacter {
                position: 2,
                byte: b'-'
            }
        );
    }
}
