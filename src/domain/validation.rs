use std::borrow::Cow;

use validator::{Validate, ValidationError};

use super::errors::{ServiceError, ValidationErrors};

// ============================================================================
// Two-phase request validation
// ============================================================================
//
// Phase 1 checks that every required field is present and non-blank.
// Phase 2 runs the format constraints declared with `#[validate(...)]` and
// only starts when phase 1 found nothing. Each phase reports all of its
// failures at once.
//
// ============================================================================

pub const REQUIRED_FIELD: &str = "Required field";

/// Phase 1 for a text field. Records a failure and yields `None` when the
/// value is missing or blank.
pub fn required(errors: &mut ValidationErrors, field: &str, value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v.to_string()),
        _ => {
            errors.add(field, REQUIRED_FIELD);
            None
        }
    }
}

/// Phase 1 for a non-text field.
pub fn present<T: Clone>(errors: &mut ValidationErrors, field: &str, value: Option<&T>) -> Option<T> {
    match value {
        Some(v) => Some(v.clone()),
        None => {
            errors.add(field, REQUIRED_FIELD);
            None
        }
    }
}

/// Phase 2: every declared constraint, all failures collected.
pub fn check_format<T: Validate>(input: &T) -> Result<(), ServiceError> {
    match input.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(ServiceError::Validation(errors.into())),
    }
}

/// CPF: 11 digits whose last two are the mod-11 check digits of the rest.
pub fn validate_cpf(cpf: &str) -> Result<(), ValidationError> {
    if cpf_is_valid(cpf) {
        Ok(())
    } else {
        Err(ValidationError::new("cpf").with_message(Cow::Borrowed("Invalid CPF")))
    }
}

pub fn cpf_is_valid(cpf: &str) -> bool {
    if cpf.len() != 11 || !cpf.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = cpf.bytes().map(|b| u32::from(b - b'0')).collect();
    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

fn check_digit(digits: &[u32]) -> u32 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight_start - i as u32))
        .sum();

    match (sum * 10) % 11 {
        10 => 0,
        r => r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cpfs() {
        assert!(cpf_is_valid("52998224725"));
        assert!(cpf_is_valid("11144477735"));
        assert!(cpf_is_valid("11111111111"));
    }

    #[test]
    fn test_invalid_cpfs() {
        assert!(!cpf_is_valid("12345678900"));
        assert!(!cpf_is_valid("5299822472"));
        assert!(!cpf_is_valid("529.982.247-25"));
        assert!(!cpf_is_valid("5299822472a"));
    }

    #[test]
    fn test_required_rejects_blank() {
        let mut errors = ValidationErrors::new();
        assert_eq!(required(&mut errors, "name", Some("Ana")), Some("Ana".to_string()));
        assert_eq!(required(&mut errors, "lastName", Some("   ")), None);
        assert_eq!(required(&mut errors, "email", None), None);

        assert_eq!(errors.len(), 2);
        assert!(errors.contains("lastName"));
        assert!(errors.contains("email"));
        assert!(errors.fields().iter().all(|e| e.message == REQUIRED_FIELD));
    }
}
