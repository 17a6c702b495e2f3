use std::borrow::Cow;
use std::env;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use hmac::{Hmac, Mac};
use jwt::{RegisteredClaims, SignWithKey, VerifyWithKey};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::db::schema::users;
use crate::profile::Profile;
use crate::types::{ApiError, ValidationError};

pub type TokenKey = Hmac<Sha256>;

lazy_static! {
    static ref TOKEN_KEY: TokenKey = {
        let secret = env::var("SECRET_KEY").expect("SECRET_KEY must be set");
        TokenKey::new_from_slice(secret.as_bytes()).expect("SECRET_KEY must not be empty")
    };
}

#[derive(Debug, Queryable, Identifiable, AsChangeset)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire representation of the authenticated user, token included. The
/// password hash never leaves this module.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub email: String,
    pub token: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// Signs an HS256 token carrying the user's id and email.
pub fn sign_token(key: &TokenKey, user_id: i32, email: &str) -> Result<String, jwt::Error> {
    let claims = RegisteredClaims {
        issuer: Some(email.to_owned()),
        subject: Some(user_id.to_string()),
        ..Default::default()
    };
    claims.sign_with_key(key)
}

/// Verifies a token and extracts the `(id, email)` identity it carries.
pub fn token_identity(key: &TokenKey, token: &str) -> Option<(i32, String)> {
    let claims: RegisteredClaims = token.verify_with_key(key).ok()?;
    let user_id = claims.subject?.parse::<i32>().ok()?;
    let email = claims.issuer?;
    Some((user_id, email))
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        Ok(hash(password, DEFAULT_COST)?)
    }

    pub fn new_password(&mut self, password: &str) -> Result<(), ApiError> {
        self.password = hash(password, DEFAULT_COST)?;
        Ok(())
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, ApiError> {
        Ok(verify(password_to_verify, &self.password)?)
    }

    pub fn token(&self) -> Result<String, ApiError> {
        Ok(sign_token(&TOKEN_KEY, self.id, &self.email)?)
    }

    pub fn load_from_token(jwt_token: &str, connection: &mut PgConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;

        let (user_id, user_email) = token_identity(&TOKEN_KEY, jwt_token).ok_or_else(|| {
            ApiError::Validation(ValidationError::from("token", "Invalid jwt token"))
        })?;
        let user = users
            .filter(id.eq(user_id))
            .filter(email.eq(user_email))
            .get_result::<User>(connection)?;
        Ok(user)
    }

    pub fn load_by_name(name: &str, connection: &mut PgConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;

        users
            .filter(username.eq(name))
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_id(user_id: i32, connection: &mut PgConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;

        users
            .find(user_id)
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn profile(&self, following: bool) -> Profile<'static> {
        Profile {
            username: Cow::Owned(self.username.clone()),
            bio: self.bio.clone().map(Cow::Owned),
            image: self.image.clone().map(Cow::Owned),
            following,
        }
    }

    pub fn view(&self) -> Result<UserView, ApiError> {
        Ok(UserView {
            email: self.email.clone(),
            token: self.token()?,
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
        })
    }
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> TokenKey {
        TokenKey::new_from_slice(b"test-secret").unwrap()
    }

    fn test_user(password_hash: &str) -> User {
        User {
            id: 7,
            username: "jake".into(),
            email: "jake@jake.jake".into(),
            password: password_hash.into(),
            bio: None,
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trips_identity() {
        let key = test_key();
        let token = sign_token(&key, 7, "jake@jake.jake").unwrap();
        let (id, email) = token_identity(&key, &token).unwrap();
        assert_eq!(id, 7);
        assert_eq!(email, "jake@jake.jake");
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let token = sign_token(&test_key(), 7, "jake@jake.jake").unwrap();
        let other = TokenKey::new_from_slice(b"other-secret").unwrap();
        assert!(token_identity(&other, &token).is_none());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(token_identity(&test_key(), "not.a.token").is_none());
    }

    #[test]
    fn password_hash_verifies_original_only() {
        let hashed = User::make_password("correct horse").unwrap();
        let user = test_user(&hashed);
        assert!(user.verify_password("correct horse").unwrap());
        assert!(!user.verify_password("battery staple").unwrap());
    }

    #[test]
    fn new_password_replaces_hash() {
        let hashed = User::make_password("old password").unwrap();
        let mut user = test_user(&hashed);
        user.new_password("new password").unwrap();
        assert!(user.verify_password("new password").unwrap());
        assert!(!user.verify_password("old password").unwrap());
    }
}
