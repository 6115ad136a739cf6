//! Boundary validation for contact handles and passwords.

use crate::error::AuthenticationError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Strips separators and validates a 10–15 digit phone number.
///
/// A leading `+` is kept.
///
/// # Errors
///
/// Returns a validation error for anything else.
pub fn normalize_phone(raw: &str) -> Result<String, AuthenticationError> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };
    let digits: String = rest
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    if !(10..=15).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthenticationError::Validation {
            field: "phone",
            reason: "expected 10 to 15 digits".to_string(),
        });
    }
    Ok(format!("{plus}{digits}"))
}

/// Lowercases and shape-checks an email address.
///
/// # Errors
///
/// Returns a validation error when there is no `local@domain.tld` shape.
pub fn normalize_email(raw: &str) -> Result<String, AuthenticationError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@')
    }) && !email.contains(char::is_whitespace);

    if valid {
        Ok(email)
    } else {
        Err(AuthenticationError::Validation {
            field: "email",
            reason: "not a valid address".to_string(),
        })
    }
}

/// Normalizes an optional email, treating blank input as absent.
///
/// # Errors
///
/// Propagates [`normalize_email`] failures.
pub fn normalize_optional_email(
    raw: Option<&str>,
) -> Result<Option<String>, AuthenticationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => normalize_email(value).map(Some),
    }
}

/// Checks password length.
///
/// # Errors
///
/// Returns a validation error for short passwords.
pub fn validate_password(password: &str) -> Result<(), AuthenticationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthenticationError::Validation {
            field: "password",
            reason: format!("must be at least {MIN_PASSWORD_LEN} characters"),
        });
    }
    Ok(())
}

/// Checks that a display name is present.
///
/// # Errors
///
/// Returns a validation error for blank names.
pub fn validate_name(name: &str) -> Result<String, AuthenticationError> {
    let name = name.trim();
    if name.is_empty() || name.len() > 120 {
        return Err(AuthenticationError::Validation {
            field: "full_name",
            reason: "must be 1 to 120 characters".to_string(),
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_strips_separators() {
        assert_eq!(normalize_phone("98765 43210").expect("phone"), "9876543210");
        assert_eq!(
            normalize_phone("+91 98765-43210").expect("phone"),
            "+919876543210"
        );
    }

    #[test]
    fn phone_rejects_short_or_alpha() {
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("98765abcde").is_err());
    }

    #[test]
    fn email_is_lowercased() {
        assert_eq!(
            normalize_email(" Asha@Example.COM ").expect("email"),
            "asha@example.com"
        );
    }

    #[test]
    fn email_rejects_bad_shapes() {
        for bad in ["asha", "@example.com", "asha@example", "a@b@c.com", "a b@c.com"] {
            assert!(normalize_email(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn blank_optional_email_is_none() {
        assert_eq!(normalize_optional_email(Some("  ")).expect("ok"), None);
        assert_eq!(normalize_optional_email(None).expect("ok"), None);
    }

    #[test]
    fn short_password_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long-enough").is_ok());
    }
}
