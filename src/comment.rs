use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into};
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

use crate::article::Article;
use crate::db::schema::{comments, users};
use crate::db::DbConnection;
use crate::profile::Profile;
use crate::relations;
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::serialize_date;

#[derive(Debug, Queryable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(Article))]
#[diesel(table_name = comments)]
pub struct Comment {
    id: i32,
    article_id: i32,
    user_id: i32,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentView<'r> {
    id: i32,
    #[serde(serialize_with = "serialize_date")]
    created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    updated_at: DateTime<Utc>,
    body: String,
    author: Profile<'r>,
}

impl<'r> From<(Comment, Profile<'r>)> for CommentView<'r> {
    fn from((comment, profile): (Comment, Profile<'r>)) -> Self {
        CommentView {
            id: comment.id,
            author: profile,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
        }
    }
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    article_id: i32,
    user_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    body: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentBody {
    body: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentContainer<T> {
    comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsContainer<T> {
    comments: T,
}

#[post("/<slug>/comments", format = "application/json", data = "<details>")]
pub fn add(
    mut connection: DbConnection,
    user: CurrentUser,
    slug: String,
    details: Json<CommentContainer<CommentBody>>,
) -> ApiResult<CommentContainer<CommentView<'static>>> {
    let conn = &mut *connection;
    let details = details.into_inner();
    let article = Article::load_by_slug(&slug, conn)?;
    let user = user?;
    let now = Utc::now();
    let new_comment = NewComment {
        article_id: article.id,
        user_id: user.id,
        created_at: now,
        updated_at: now,
        body: details.comment.body,
    };

    let comment = insert_into(comments::table)
        .values(&new_comment)
        .get_result::<Comment>(conn)?;

    let profile = user.profile(false);

    let container = CommentContainer {
        comment: (comment, profile).into(),
    };
    Ok(Json(container))
}

#[get("/<slug>/comments", format = "application/json")]
pub fn list(
    mut connection: DbConnection,
    user: Option<User>,
    slug: String,
) -> ApiResult<CommentsContainer<Vec<CommentView<'static>>>> {
    let conn = &mut *connection;
    let article = Article::load_by_slug(&slug, conn)?;
    let data = Comment::belonging_to(&article)
        .inner_join(users::table)
        .get_results::<(Comment, User)>(conn)?;

    let comments = match user {
        Some(user) => {
            let author_ids = data.iter().map(|(_, author)| author.id).collect::<Vec<i32>>();
            let followed = relations::following_set(conn, user.id, &author_ids)?;
            data.into_iter()
                .map(|(comment, author)| {
                    let profile = author.profile(followed.contains(user.id, author.id));
                    (comment, profile).into()
                })
                .collect()
        }
        None => data
            .into_iter()
            .map(|(comment, author)| {
                let profile = author.profile(false);
                (comment, profile).into()
            })
            .collect(),
    };

    Ok(Json(CommentsContainer { comments }))
}

#[delete("/<_slug>/comments/<id>", format = "application/json")]
pub fn delete(
    mut connection: DbConnection,
    user: CurrentUser,
    _slug: String,
    id: i32,
) -> ApiResult<()> {
    let conn = &mut *connection;
    let user = user?;
    let comment = comments::table.find(id).first::<Comment>(conn)?;
    if comment.user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    diesel_delete(&comment).execute(conn)?;
    Ok(Json(()))
}
