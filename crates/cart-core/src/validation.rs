//! Request-level input validation, shared by the façade before any event
//! reaches the state machine or the tax/discount engines.

use crate::error::{CoreError, ValidationError};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// External item-master boundary (C4's master lookup). Catalog authoring
/// itself is out of scope; this is the seam a caller's real catalog
/// integration implements. cart-core only ever calls it, never implements it.
pub trait MasterDataLookup: Send + Sync {
    fn contains_item(&self, item_code: &str) -> bool;
}

/// Rejects `item_code` with [`CoreError::ItemNotFound`] if `lookup` doesn't
/// recognize it.
pub fn validate_item_exists(lookup: &dyn MasterDataLookup, item_code: &str) -> Result<(), CoreError> {
    if lookup.contains_item(item_code) {
        Ok(())
    } else {
        Err(CoreError::ItemNotFound { item_code: item_code.to_string() })
    }
}

pub const MAX_ITEM_CODE_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 200;
pub const MAX_QUANTITY_MILLI: i64 = 999_000;
pub const MAX_TAX_RATE_BPS: u32 = 10_000;

pub fn validate_item_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::Required { field: "item_code".into() });
    }
    if code.len() > MAX_ITEM_CODE_LEN {
        return Err(ValidationError::TooLong { field: "item_code".into(), max: MAX_ITEM_CODE_LEN });
    }
    if !code.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "item_code".into(),
            reason: "only alphanumeric, hyphen and underscore are allowed".into(),
        });
    }
    Ok(())
}

pub fn validate_description(description: &str) -> ValidationResult<()> {
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong { field: "description".into(), max: MAX_DESCRIPTION_LEN });
    }
    Ok(())
}

pub fn validate_quantity_milli(qty_milli: i64) -> ValidationResult<()> {
    if qty_milli <= 0 {
        return Err(ValidationError::MustBePositive { field: "quantity".into() });
    }
    if qty_milli > MAX_QUANTITY_MILLI {
        return Err(ValidationError::OutOfRange { field: "quantity".into(), min: 1, max: MAX_QUANTITY_MILLI });
    }
    Ok(())
}

pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustBePositive { field: "unit_price".into() });
    }
    Ok(())
}

pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive { field: "amount".into() });
    }
    Ok(())
}

pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > MAX_TAX_RATE_BPS {
        return Err(ValidationError::OutOfRange { field: "tax_rate_bps".into(), min: 0, max: MAX_TAX_RATE_BPS as i64 });
    }
    Ok(())
}

pub fn validate_staff(staff: &Option<String>) -> ValidationResult<()> {
    if staff.as_deref().map(str::is_empty).unwrap_or(true) {
        return Err(ValidationError::Required { field: "staff".into() });
    }
    Ok(())
}

pub fn validate_cart_size(current_count: usize, max: usize) -> ValidationResult<()> {
    if current_count >= max {
        return Err(ValidationError::OutOfRange { field: "line_items".into(), min: 0, max: max as i64 });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_code_rejects_empty_and_too_long() {
        assert!(validate_item_code("").is_err());
        assert!(validate_item_code(&"A".repeat(51)).is_err());
        assert!(validate_item_code("SKU-001_A").is_ok());
    }

    #[test]
    fn item_code_rejects_invalid_characters() {
        let err = validate_item_code("bad code!").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn quantity_must_be_positive_and_bounded() {
        assert!(validate_quantity_milli(0).is_err());
        assert!(validate_quantity_milli(-500).is_err());
        assert!(validate_quantity_milli(MAX_QUANTITY_MILLI + 1).is_err());
        assert!(validate_quantity_milli(2000).is_ok());
    }

    #[test]
    fn price_cannot_be_negative() {
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(0).is_ok());
    }

    #[test]
    fn staff_must_be_present_to_act() {
        assert!(validate_staff(&None).is_err());
        assert!(validate_staff(&Some("".into())).is_err());
        assert!(validate_staff(&Some("staff-1".into())).is_ok());
    }

    #[test]
    fn cart_size_rejects_at_capacity() {
        assert!(validate_cart_size(199, 200).is_ok());
        assert!(validate_cart_size(200, 200).is_err());
    }

    struct StaticCatalog(Vec<&'static str>);

    impl MasterDataLookup for StaticCatalog {
        fn contains_item(&self, item_code: &str) -> bool {
            self.0.contains(&item_code)
        }
    }

    #[test]
    fn validate_item_exists_rejects_unknown_code() {
        let catalog = StaticCatalog(vec!["SKU-1", "SKU-2"]);
        assert!(validate_item_exists(&catalog, "SKU-1").is_ok());
        let err = validate_item_exists(&catalog, "SKU-9").unwrap_err();
        assert!(matches!(err, CoreError::ItemNotFound { item_code } if item_code == "SKU-9"));
    }
}
