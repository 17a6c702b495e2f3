#[macro_use]
extern crate rocket;

mod article;
mod comment;
mod db;
mod profile;
mod relations;
mod types;
mod users;
mod utils;

use rocket::serde::json::{json, Value};
use tracing_subscriber::EnvFilter;

#[catch(404)]
fn not_found() -> Value {
    json!({
        "errors": [
            "entity not found"
        ]
    })
}

#[catch(422)]
fn unprocessable() -> Value {
    json!({
        "errors": [
            "invalid request body"
        ]
    })
}

#[launch]
fn rocket() -> _ {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let pool = db::init_pool().expect("Failed to create database pool");
    rocket::build()
        .manage(pool)
        .mount("/api/users", routes![users::register, users::login])
        .mount("/api", routes![users::current, users::update])
        .mount(
            "/api",
            routes![profile::profile, profile::follow, profile::unfollow],
        )
        .mount(
            "/api/articles",
            routes![
                article::get,
                article::create,
                article::update,
                article::favorite,
                article::unfavorite,
                comment::add,
                comment::list,
                comment::delete,
            ],
        )
        .register("/", catchers![not_found, unprocessable])
}
