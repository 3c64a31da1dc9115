use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::TokenError;

/// Encode binary data to a standard (padded) base64 string
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard base64 string to binary
///
/// # Errors
///
/// Returns `TokenError::Format` if the input is empty or not valid base64
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, TokenError> {
    if encoded.is_empty() {
        return Err(TokenError::format("empty base64 string"));
    }
    Ok(STANDARD.decode(encoded)?)
}

/// Encode binary data as lowercase hex
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string (either case) to binary
pub fn decode_hex(encoded: &str) -> Result<Vec<u8>, TokenError> {
    if encoded.is_empty() {
        return Err(TokenError::format("empty hex string"));
    }
    Ok(hex::decode(encoded)?)
}

/// Returns true when every character is a hex digit and the length is even.
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Decode base64 and require an exact byte length.
pub(crate) fn decode_base64_exact<const N: usize>(
    encoded: &str,
    what: &str,
) -> Result<[u8; N], TokenError> {
    let bytes = decode_base64(encoded)
        .map_err(|e| TokenError::format(format!("{} is not valid base64: {}", what, e)))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        TokenError::format(format!(
            "{} must decode to {} bytes, got {}",
            what,
            N,
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_utils() {
        let original = b"capability token bytes".to_vec();
        let encoded = encode_base64(&original);
        assert_eq!(decode_base64(&encoded).unwrap(), original);

        assert!(decode_base64("invalid-base64!").is_err());
        assert!(decode_base64("").is_err());
    }

    #[test]
    fn test_hex_utils() {
        let original = vec![0u8, 1, 0xab, 0xff];
        let encoded = encode_hex(&original);
        assert_eq!(encoded, "0001abff");
        assert_eq!(decode_hex("0001ABFF").unwrap(), original);

        assert!(is_hex("0001abff"));
        assert!(!is_hex("abc"));
        assert!(!is_hex("zz"));
        assert!(decode_hex("xyz").is_err());
    }

    #[test]
    fn test_decode_exact_length() {
        let encoded = encode_base64(&[7u8; 32]);
        let decoded: [u8; 32] = decode_base64_exact(&encoded, "seed").unwrap();
        assert_eq!(decoded, [7u8; 32]);

        let short = encode_base64(&[7u8; 31]);
        let err = decode_base64_exact::<32>(&short, "seed").unwrap_err();
        assert!(matches!(err, TokenError::Format(_)));
    }
}
