//! # Validation Module
//!
//! Input validation for values typed or pasted by a user before they reach
//! the classification service. Decoded scans are already validated by
//! [`ScanResult::new`](crate::types::ScanResult::new).
//!
//! ## Usage
//! ```rust
//! use provenance_core::validation::validate_barcode;
//!
//! assert_eq!(validate_barcode(" 3017620425035 ").unwrap(), "3017620425035");
//! assert!(validate_barcode("").is_err());
//! ```

use crate::error::ValidationError;
use crate::MAX_BARCODE_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a manually entered barcode and returns it trimmed.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most [`MAX_BARCODE_LEN`] characters
/// - No inner whitespace or control characters
///
/// Digits are not required: QR payloads and internal codes are valid keys
/// for the product table.
pub fn validate_barcode(input: &str) -> ValidationResult<String> {
    let barcode = input.trim();

    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if barcode.chars().count() > MAX_BARCODE_LEN {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: MAX_BARCODE_LEN,
        });
    }

    if barcode.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain whitespace or control characters".to_string(),
        });
    }

    Ok(barcode.to_string())
}

/// Returns true for EAN-8, UPC-A, EAN-13 and GTIN-14 shaped input.
pub fn is_retail_barcode(barcode: &str) -> bool {
    matches!(barcode.len(), 8 | 12 | 13 | 14) && barcode.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_barcode() {
        assert_eq!(validate_barcode("8901030810033").unwrap(), "8901030810033");
        assert_eq!(validate_barcode("\t0012000171901\n").unwrap(), "0012000171901");
        assert!(matches!(
            validate_barcode("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_barcode("301 762"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            validate_barcode(&"9".repeat(MAX_BARCODE_LEN + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_non_numeric_codes_allowed() {
        assert!(validate_barcode("SKU-42").is_ok());
    }

    #[test]
    fn test_retail_shapes() {
        assert!(is_retail_barcode("3017620425035"));
        assert!(is_retail_barcode("012000171901"));
        assert!(is_retail_barcode("96385074"));
        assert!(!is_retail_barcode("301762042"));
        assert!(!is_retail_barcode("30176204250"));
        assert!(!is_retail_barcode("ABCDEFGH"));
    }
}
