use crate::BuildError;

/// Code reserved for the synthetic end-of-key transition.
pub const TERMINAL_CODE: u32 = 0;

/// Returns the symbol code of a char: its code point plus one.
///
/// Code 0 is never produced, it is reserved for [`TERMINAL_CODE`].
#[inline]
pub fn symbol_code(c: char) -> u32 {
    c as u32 + 1
}

/// Returns the char for a symbol code, or `None` for the terminal code
/// and for values that are not valid code points.
#[inline]
pub fn symbol_char(code: u32) -> Option<char> {
    code.checked_sub(1).and_then(char::from_u32)
}

/// Converts a string into its symbol code sequence.
pub fn encode_key(key: &str) -> Vec<u32> {
    key.chars().map(symbol_code).collect()
}

/// Reconstructs the string for a stored code sequence.
pub fn decode_key(codes: &[u32]) -> Option<String> {
    codes.iter().map(|&code| symbol_char(code)).collect()
}

/// Encodes `keys` and verifies that they are strictly increasing.
///
/// The position of each key in the returned list is its key index.
pub(crate) fn encode_keys(keys: &[impl AsRef<str>]) -> Result<Vec<Vec<u32>>, BuildError> {
    let mut encoded: Vec<Vec<u32>> = Vec::with_capacity(keys.len());
    for (index, key) in keys.iter().enumerate() {
        let codes = encode_key(key.as_ref());
        if let Some(previous) = encoded.last() {
            if previous >= &codes {
                return Err(BuildError::Ordering {
                    index,
                    previous: keys[index - 1].as_ref().to_owned(),
                    current: key.as_ref().to_owned(),
                });
            }
        }
        encoded.push(codes);
    }
    Ok(encoded)
}
