use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::{insert_into, update as diesel_update};
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use slug::slugify;

use crate::db::schema::articles;
use crate::db::DbConnection;
use crate::profile::Profile;
use crate::relations;
use crate::types::*;
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::serialize_date;

#[derive(Identifiable, Queryable, AsChangeset, PartialEq, Debug)]
#[diesel(table_name = articles)]
pub struct Article {
    pub id: i32,
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    article: ArticleView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    slug: String,
    title: String,
    description: String,
    body: String,
    tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    updated_at: DateTime<Utc>,
    favorited: bool,
    favorites_count: i64,
    author: Profile<'static>,
}

impl Article {
    pub fn load_by_slug(slug_: &str, connection: &mut PgConnection) -> Result<Article, ApiError> {
        use crate::db::schema::articles::dsl::*;

        articles
            .filter(slug.eq(slug_))
            .get_result::<Article>(connection)
            .map_err(|e| e.into())
    }

    fn make_slug(title: &str, created: DateTime<Utc>) -> String {
        format!("{}-{}", created.timestamp(), slugify(title))
    }

    /// Assembles the wire representation, resolving the viewer-dependent
    /// `favorited` and `following` flags through the relation store.
    pub fn view(
        self,
        connection: &mut PgConnection,
        viewer: Option<&User>,
    ) -> Result<ArticleView, ApiError> {
        let author = User::load_by_id(self.author_id, connection)?;
        let favorites_count = relations::favorites_count(connection, self.id)?;
        let (favorited, following) = match viewer {
            Some(viewer) => (
                relations::is_favorited(connection, viewer.id, self.id)?,
                relations::is_following(connection, viewer.id, author.id)?,
            ),
            None => (false, false),
        };

        Ok(ArticleView {
            slug: self.slug,
            title: self.title,
            description: self.description,
            body: self.body,
            tag_list: self.tag_list.unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            favorited,
            favorites_count,
            author: author.profile(following),
        })
    }
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = articles)]
pub struct NewArticle {
    author_id: i32,
    slug: String,
    title: String,
    description: String,
    body: String,
    tag_list: Option<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ArticleDetails {
    title: String,
    description: String,
    body: String,
    #[serde(rename = "tagList", default)]
    tag_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    article: ArticleDetails,
}

impl Validate for CreateArticle {
    type Error = ValidationError;
    fn validate(self, _connection: &mut PgConnection) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.article.body.trim().is_empty() {
            error.add_error("body", "empty body");
        }

        if self.article.title.trim().is_empty() {
            error.add_error("title", "empty title");
        }

        if self.article.description.trim().is_empty() {
            error.add_error("description", "empty description");
        }

        if error.empty() {
            Ok(self)
        } else {
            Err(error)
        }
    }
}

#[post("/", format = "application/json", data = "<create>")]
pub fn create(
    mut connection: DbConnection,
    user: CurrentUser,
    create: Json<CreateArticle>,
) -> ApiResult<ArticleResponse> {
    use crate::db::schema::articles::dsl::*;

    let conn = &mut *connection;
    let created = Utc::now();
    let create = create.validate(conn)?.into_inner();
    let user = user?;
    let new_article = NewArticle {
        author_id: user.id,
        slug: Article::make_slug(&create.article.title, created),
        title: create.article.title,
        body: create.article.body,
        description: create.article.description,
        created_at: created,
        updated_at: None,
        tag_list: Some(create.article.tag_list),
    };
    let article = insert_into(articles)
        .values(&new_article)
        .get_result::<Article>(conn)?;

    let view = article.view(conn, Some(&user))?;
    Ok(Json(ArticleResponse { article: view }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetails {
    title: Option<String>,
    description: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticle {
    article: UpdateDetails,
}

#[put("/<slug>", format = "application/json", data = "<update>")]
pub fn update(
    slug: String,
    mut connection: DbConnection,
    current_user: CurrentUser,
    update: Json<UpdateArticle>,
) -> ApiResult<ArticleResponse> {
    let conn = &mut *connection;
    let current_user = current_user?;
    let mut article = Article::load_by_slug(&slug, conn)?;
    if article.author_id != current_user.id {
        return Err(ApiError::Forbidden);
    }

    let update = update.into_inner().article;
    let updated = Utc::now();
    if let Some(title) = update.title {
        article.slug = Article::make_slug(&title, updated);
        article.title = title;
    }
    if let Some(description) = update.description {
        article.description = description;
    }
    if let Some(body) = update.body {
        article.body = body;
    }
    article.updated_at = Some(updated);

    let article = conn.transaction(|conn| {
        diesel_update(&article).set(&article).execute(conn)?;
        Ok::<_, diesel::result::Error>(article)
    })?;

    let view = article.view(conn, Some(&current_user))?;
    Ok(Json(ArticleResponse { article: view }))
}

#[get("/<slug>", format = "application/json")]
pub fn get(
    slug: String,
    mut connection: DbConnection,
    current_user: Option<User>,
) -> ApiResult<ArticleResponse> {
    let conn = &mut *connection;
    let article = Article::load_by_slug(&slug, conn)?;
    let view = article.view(conn, current_user.as_ref())?;
    Ok(Json(ArticleResponse { article: view }))
}

#[post("/<slug>/favorite", format = "application/json")]
pub fn favorite(
    slug: String,
    mut connection: DbConnection,
    current_user: CurrentUser,
) -> ApiResult<ArticleResponse> {
    let conn = &mut *connection;
    let current_user = current_user?;
    let article = Article::load_by_slug(&slug, conn)?;
    conn.transaction(|conn| relations::favorite(conn, current_user.id, article.id))?;

    let view = article.view(conn, Some(&current_user))?;
    Ok(Json(ArticleResponse { article: view }))
}

/// Removing a favorite that was never set still answers 200 with the
/// article body, so retried requests observe the same response.
#[delete("/<slug>/favorite", format = "application/json")]
pub fn unfavorite(
    slug: String,
    mut connection: DbConnection,
    current_user: CurrentUser,
) -> ApiResult<ArticleResponse> {
    let conn = &mut *connection;
    let current_user = current_user?;
    let article = Article::load_by_slug(&slug, conn)?;
    conn.transaction(|conn| relations::unfavorite(conn, current_user.id, article.id))?;

    let view = article.view(conn, Some(&current_user))?;
    Ok(Json(ArticleResponse { article: view }))
}

#[cfg(test)]
mod tests {
    use super::Article;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn slugs_are_prefixed_with_creation_timestamp() {
        let created = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
        let slug = Article::make_slug("How to train your dragon", created);
        assert_eq!(slug, format!("{}-how-to-train-your-dragon", created.timestamp()));
    }

    #[test]
    fn slugs_drop_punctuation() {
        let created = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
        let slug = Article::make_slug("Hello, World!", created);
        assert!(slug.ends_with("-hello-world"));
    }
}
