use std::collections::HashMap;

use diesel::pg::PgConnection;
use diesel::result::Error as DieselError;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, status, Responder};
use rocket::serde::json::{json, Json};
use serde::Serialize;
use thiserror::Error;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut PgConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(#[from] DieselError),
    #[error("validation failed")]
    Validation(#[from] ValidationError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token error: {0}")]
    Token(#[from] jwt::Error),
    #[error("internal error")]
    Internal,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Per-field validation messages, serialized under `{"errors": {...}}`.
#[derive(Debug, Serialize, Default, Error)]
#[error("one or more fields failed validation")]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ApiError::Database(error) => match error {
                DieselError::NotFound => Err(Status::NotFound),
                _ => Err(Status::InternalServerError),
            },

            ApiError::Validation(error) => {
                let body = json!({ "errors": error });
                status::Custom(Status::UnprocessableEntity, Json(body)).respond_to(req)
            }

            ApiError::Unauthorized => {
                let body = json!({ "errors": {
                    "status": "401 Unauthorized"
                }});
                status::Custom(Status::Unauthorized, Json(body)).respond_to(req)
            }

            ApiError::Forbidden => Err(Status::Forbidden),
            _ => Err(Status::InternalServerError),
        }
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    type Error = <T as Validate>::Error;
    fn validate(self, connection: &mut PgConnection) -> Result<Self, Self::Error> {
        let inner = self.0;
        let validated = inner.validate(connection)?;
        Ok(Json(validated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_error_appends_to_existing_field() {
        let mut error = ValidationError::default();
        error.add_error("email", "invalid email");
        error.add_error("email", "email already exists");
        assert_eq!(error.len(), 1);
        assert_eq!(error.0["email"].len(), 2);
    }

    #[test]
    fn merge_combines_fields() {
        let mut left = ValidationError::from("email", "invalid email");
        let right = ValidationError::from("password", "password too short");
        left.merge(right);
        assert_eq!(left.len(), 2);
        assert!(!left.empty());
    }

    #[test]
    fn default_is_empty() {
        assert!(ValidationError::default().empty());
    }
}
