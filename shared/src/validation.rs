//! Validation utilities for catalog and account input

// ============================================================================
// Catalog Validations
// ============================================================================

/// Normalize a SKU: trimmed and uppercased
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_uppercase()
}

/// Validate a normalized SKU (1-32 chars of A-Z, 0-9, `-`, `_`, `.`)
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.is_empty() {
        return Err("SKU is required");
    }
    if sku.len() > 32 {
        return Err("SKU must be at most 32 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err("SKU may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

/// Normalize a warehouse or location code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Validate a normalized warehouse or location code (1-16 uppercase alphanumeric or '-')
pub fn validate_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Code is required");
    }
    if code.len() > 16 {
        return Err("Code must be at most 16 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Code must be uppercase alphanumeric or '-'");
    }
    Ok(())
}

/// Validate reorder settings on a product
pub fn validate_reorder_settings(
    reorder_level: i64,
    reorder_quantity: i64,
    max_stock: Option<i64>,
) -> Result<(), &'static str> {
    if reorder_level < 0 {
        return Err("Reorder level cannot be negative");
    }
    if reorder_quantity < 0 {
        return Err("Reorder quantity cannot be negative");
    }
    if let Some(max) = max_stock {
        if max < reorder_level {
            return Err("Maximum stock cannot be below the reorder level");
        }
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku("  ab-12 "), "AB-12");
    }

    #[test]
    fn test_validate_sku_valid() {
        assert!(validate_sku("AB-12").is_ok());
        assert!(validate_sku("WIDGET_01.B").is_ok());
    }

    #[test]
    fn test_validate_sku_invalid() {
        assert!(validate_sku("").is_err());
        assert!(validate_sku("lower").is_err());
        assert!(validate_sku("HAS SPACE").is_err());
        assert!(validate_sku(&"X".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("WH-01").is_ok());
        assert!(validate_code("A1").is_ok());
        assert!(validate_code("").is_err());
        assert!(validate_code("BIN_1").is_err());
        assert!(validate_code("ABCDEFGHIJKLMNOPQ").is_err());
    }

    #[test]
    fn test_validate_reorder_settings() {
        assert!(validate_reorder_settings(10, 50, Some(100)).is_ok());
        assert!(validate_reorder_settings(0, 0, None).is_ok());
        assert!(validate_reorder_settings(-1, 0, None).is_err());
        assert!(validate_reorder_settings(10, -5, None).is_err());
        assert!(validate_reorder_settings(10, 5, Some(9)).is_err());
    }

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("user.name@domain.co.uk").is_ok());
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("no@domain").is_err());
        assert!(validate_email("@.").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("short").is_err());
    }
}
