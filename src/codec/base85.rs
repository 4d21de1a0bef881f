use crate::internal::error::{Error, Result};

// RFC 1924 alphabet, the one git and Python's `b85encode` use.
const ALPHABET: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

const INVALID: u8 = 0xFF;

const fn decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

static DECODE: [u8; 256] = decode_table();

/// Encodes bytes as base85 text.
///
/// Input is processed in big-endian 4-byte words, each producing 5 digits. A
/// short final word is zero-padded and the padding digits are dropped again,
/// so `n` bytes always yield `ceil(n * 5 / 4)` characters.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(4) * 5);

    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut acc = u32::from_be_bytes(word);

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = ALPHABET[(acc % 85) as usize];
            acc /= 85;
        }

        let keep = if chunk.len() == 4 { 5 } else { chunk.len() + 1 };
        for &digit in &digits[..keep] {
            out.push(digit as char);
        }
    }

    out
}

/// Decodes base85 text produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let input = text.as_bytes();
    let mut out = Vec::with_capacity(input.len() / 5 * 4 + 4);

    for (index, chunk) in input.chunks(5).enumerate() {
        if chunk.len() == 1 {
            return Err(Error::conversion(format!(
                "Truncated base85 input: dangling character at offset {}",
                index * 5
            )));
        }

        // Short groups are padded with the highest digit, then truncated.
        let mut acc: u64 = 0;
        for i in 0..5 {
            let byte = chunk.get(i).copied().unwrap_or(b'~');
            let digit = DECODE[byte as usize];
            if digit == INVALID {
                return Err(Error::conversion(format!(
                    "Invalid base85 character {:?} at offset {}",
                    byte as char,
                    index * 5 + i
                )));
            }
            acc = acc * 85 + digit as u64;
        }

        if acc > u32::MAX as u64 {
            return Err(Error::conversion(format!(
                "base85 group at offset {} overflows 32 bits",
                index * 5
            )));
        }

        let word = (acc as u32).to_be_bytes();
        let keep = if chunk.len() == 5 { 4 } else { chunk.len() - 1 };
        out.extend_from_slice(&word[..keep]);
    }

    Ok(out)
}
