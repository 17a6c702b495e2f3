use chrono::Utc;
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::{insert_into, select, update as diesel_update};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome, Request};
use rocket::serde::json::{json, Json, Value};
use serde::Deserialize;
use tracing::info;

use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};

pub mod models;
mod utils;

use self::utils::*;

pub type CurrentUser = Result<models::User, ApiError>;

#[derive(Debug, Deserialize)]
struct RegistrationDetails {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    user: RegistrationDetails,
}

impl Validate for Registration {
    type Error = ApiError;
    fn validate(self, connection: &mut PgConnection) -> Result<Self, Self::Error> {
        use crate::db::schema::users::dsl::*;
        let mut errors = ValidationError::default();

        match validate_email(&self.user.email, connection) {
            Ok(_) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        if let Err(e) = validate_password(&self.user.password) {
            errors.merge(e);
        }

        if let Err(e) = validate_username_re(&self.user.username) {
            errors.merge(e);
        }

        let username_exists = select(exists(users.filter(username.eq(&self.user.username))))
            .get_result::<bool>(connection)?;

        if username_exists {
            errors.add_error("username", "Username already exists");
        }

        if errors.len() > 0 {
            Err(errors.into())
        } else {
            Ok(self)
        }
    }
}

#[post("/", format = "application/json", data = "<registration>")]
pub fn register(mut connection: DbConnection, registration: Json<Registration>) -> ApiResult<Value> {
    use crate::db::schema::users::dsl::*;

    let conn = &mut *connection;
    let registration = registration.validate(conn)?;
    let new_user = models::NewUser {
        username: registration.0.user.username.clone(),
        email: registration.0.user.email.clone(),
        password: models::User::make_password(&registration.0.user.password)?,
    };

    let user = insert_into(users)
        .values(&new_user)
        .get_result::<models::User>(conn)?;
    info!(username = %user.username, "registered new user");
    Ok(Json(json!({ "user": user.view()? })))
}

#[derive(Debug, Deserialize)]
struct LoginDetails {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    user: LoginDetails,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for models::User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token_header = request.headers().get_one("Authorization");
        let Some(token_header) = token_header else {
            return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized));
        };
        let token = str::replace(token_header, "Token ", "");
        let mut connection = match request.guard::<DbConnection>().await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        };
        match models::User::load_from_token(&token, &mut connection) {
            Ok(user) => Outcome::Success(user),
            Err(e @ ApiError::Validation(_)) => Outcome::Error((Status::UnprocessableEntity, e)),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        }
    }
}

#[post("/login", format = "application/json", data = "<login>")]
pub fn login(mut connection: DbConnection, login: Json<Login>) -> ApiResult<Value> {
    use crate::db::schema::users::dsl::*;

    let conn = &mut *connection;
    let user = users
        .filter(email.eq(&login.user.email))
        .first::<models::User>(conn)?;
    if user.verify_password(&login.user.password)? {
        Ok(Json(json!({ "user": user.view()? })))
    } else {
        let mut error = ValidationError::default();
        error.add_error("password", "Invalid password");
        Err(error.into())
    }
}

#[get("/user", format = "application/json")]
pub fn current(user: CurrentUser) -> ApiResult<Value> {
    let user = user?;
    Ok(Json(json!({ "user": user.view()? })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub user: UpdateUser,
}

#[put("/user", format = "application/json", data = "<update>")]
pub fn update(
    current_user: CurrentUser,
    mut connection: DbConnection,
    update: Json<Update>,
) -> ApiResult<Value> {
    use crate::db::schema::users::dsl::*;

    let conn = &mut *connection;
    let mut user = current_user?;
    let mut error = ValidationError::default();
    let update = update.into_inner();

    if update.user.bio.is_some() {
        user.bio = update.user.bio;
    }
    if update.user.image.is_some() {
        user.image = update.user.image;
    }

    if let Some(new_email) = update.user.email {
        match validate_email_re(&new_email) {
            Err(e) => {
                error.merge(e);
            }
            Ok(_) => {
                user.email = new_email;
            }
        }

        let expr = users.filter(email.eq(&user.email)).filter(id.ne(&user.id));
        let email_exists = select(exists(expr)).get_result::<bool>(conn)?;
        if email_exists {
            error.add_error("email", format!("Email already chosen: {}", &user.email));
        }
    }

    if let Some(new_username) = update.user.username {
        match validate_username_re(&new_username) {
            Err(e) => {
                error.merge(e);
            }
            Ok(_) => {
                user.username = new_username;
            }
        }
        let expr = users
            .filter(username.eq(&user.username))
            .filter(id.ne(user.id));
        let username_exists = select(exists(expr)).get_result::<bool>(conn)?;
        if username_exists {
            error.add_error(
                "username",
                format!("Username already chosen: {}", user.username),
            );
        }
    }

    if let Some(new_password) = update.user.password {
        match validate_password(&new_password) {
            Err(e) => {
                error.merge(e);
            }
            _ => {
                user.new_password(&new_password)?;
            }
        }
    }

    if !error.empty() {
        Err(error.into())
    } else {
        user.updated_at = Utc::now();
        diesel_update(&user).set(&user).execute(conn)?;
        Ok(Json(json!({ "user": user.view()? })))
    }
}
