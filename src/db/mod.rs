use std::env;
use std::ops::{Deref, DerefMut};

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, PoolError, PooledConnection};
use dotenv::dotenv;
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome, Request};
use rocket::State;
use thiserror::Error;
use tracing::info;

pub mod schema;

// An alias to the type for a pool of Diesel Postgres connections.
pub type Pool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;

pub struct DbConnection(pub PooledConnection<ConnectionManager<PgConnection>>);

#[derive(Debug, Error)]
pub enum InitError {
    #[error("DATABASE_URL is not set: {0}")]
    Var(#[from] env::VarError),
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] PoolError),
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = match request.guard::<&State<Pool>>().await {
            Outcome::Success(pool) => pool,
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };
        match pool.get() {
            Ok(conn) => Outcome::Success(DbConnection(conn)),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

// For the convenience of using a DbConnection as a PgConnection.
impl Deref for DbConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

pub fn init_pool() -> Result<Pool, InitError> {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL")?;
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder().build(manager)?;
    info!("database pool ready");
    Ok(pool)
}
