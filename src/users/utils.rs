use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::select;
use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{ApiError, ValidationError};

pub const PASSWORD_MIN_LEN: usize = 8;
pub const USERNAME_MAX_LEN: usize = 20;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from(
            "email",
            format!("Invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_LEN {
        Err(ValidationError::from(
            "username",
            format!("Username must be 1 to {} characters", USERNAME_MAX_LEN),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_email(email_to_validate: &str, connection: &mut PgConnection) -> Result<(), ApiError> {
    use crate::db::schema::users::dsl::*;
    let mut errors = ValidationError::default();
    if !EMAIL_RE.is_match(email_to_validate) {
        errors.add_error("email", format!("Invalid email: {}", email_to_validate));
    }

    let email_exists =
        select(exists(users.filter(email.eq(email_to_validate)))).get_result::<bool>(connection)?;
    if email_exists {
        errors.add_error("email", "Email already exists");
    }
    if errors.len() > 0 {
        Err(errors.into())
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        let e = ValidationError::from(
            "password",
            format!("Password must be at least {} characters", PASSWORD_MIN_LEN),
        );
        Err(e)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(validate_email_re("jake@jake.jake").is_ok());
        assert!(validate_email_re("first.last@example.co.uk").is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(validate_email_re("not-an-email").is_err());
        assert!(validate_email_re("missing@tld@twice.com").is_err());
        assert!(validate_email_re("@example.com").is_err());
    }

    #[test]
    fn username_must_fit_length_bounds() {
        assert!(validate_username_re("j").is_ok());
        assert!(validate_username_re(&"a".repeat(20)).is_ok());
        assert!(validate_username_re("").is_err());
        assert!(validate_username_re(&"a".repeat(21)).is_err());
    }

    #[test]
    fn password_must_be_at_least_eight_chars() {
        assert!(validate_password("hunter12").is_ok());
        assert!(validate_password("hunter2").is_err());
        assert!(validate_password("").is_err());
    }
}
