use std::borrow::Cow;

use diesel::prelude::*;
use serde::Serialize;

use crate::db::DbConnection;
use crate::relations;
use crate::types::*;
use crate::users::models::User;
use crate::users::CurrentUser;
use rocket::serde::json::Json;

#[derive(Debug, Serialize)]
pub struct ProfileResponse<'a> {
    profile: Profile<'a>,
}

#[derive(Debug, Serialize)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub bio: Option<Cow<'a, str>>,
    pub image: Option<Cow<'a, str>>,
    pub following: bool,
}

#[get("/profiles/<name>", format = "application/json")]
pub fn profile(
    mut connection: DbConnection,
    current_user: Option<User>,
    name: String,
) -> ApiResult<ProfileResponse<'static>> {
    let conn = &mut *connection;
    let user = User::load_by_name(&name, conn)?;
    let following = match current_user {
        Some(current) => relations::is_following(conn, current.id, user.id)?,
        None => false,
    };

    Ok(Json(ProfileResponse {
        profile: user.profile(following),
    }))
}

#[post("/profiles/<name>/follow", format = "application/json")]
pub fn follow(
    mut connection: DbConnection,
    current_user: CurrentUser,
    name: String,
) -> ApiResult<ProfileResponse<'static>> {
    let conn = &mut *connection;
    let current = current_user?;
    let followed = User::load_by_name(&name, conn)?;
    conn.transaction(|conn| relations::follow(conn, current.id, followed.id))?;

    Ok(Json(ProfileResponse {
        profile: followed.profile(true),
    }))
}

#[delete("/profiles/<name>/follow", format = "application/json")]
pub fn unfollow(
    mut connection: DbConnection,
    current_user: CurrentUser,
    name: String,
) -> ApiResult<ProfileResponse<'static>> {
    let conn = &mut *connection;
    let current = current_user?;
    let followed = User::load_by_name(&name, conn)?;
    conn.transaction(|conn| relations::unfollow(conn, current.id, followed.id))?;

    Ok(Json(ProfileResponse {
        profile: followed.profile(false),
    }))
}
