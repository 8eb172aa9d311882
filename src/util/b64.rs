use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::SyncError;

// Subscription hosts emit URL-safe base64 with or without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode URL-safe base64 into UTF-8 text, ignoring embedded whitespace.
pub fn decode_text(input: &str) -> Result<String, SyncError> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = URL_SAFE_LENIENT.decode(compact.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn encode_text(input: &str) -> String {
    URL_SAFE_NO_PAD.encode(input.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_padded_and_unpadded_input() {
        assert_eq!(decode_text("aGk=").unwrap(), "hi");
        assert_eq!(decode_text("aGk").unwrap(), "hi");
    }

    #[test]
    fn ignores_line_wrapping() {
        let wrapped = "c3Vic2Nya\nXB0aW9u\r\n";
        assert_eq!(decode_text(wrapped).unwrap(), "subscription");
    }

    #[test]
    fn rejects_standard_alphabet_symbols() {
        assert!(matches!(decode_text("a+b/"), Err(SyncError::Decode(_))));
    }
}
