//! Relationship bookkeeping for follows and favorites.
//!
//! Each relation has a single source of truth: its join table, keyed by an
//! `(owner, target)` id pair with a composite primary key. Both directions of
//! a relation are derived reads of that one set, so the "owning" and
//! "inverse" views cannot diverge. Every mutator is guarded: inserting an
//! existing pair or removing a missing one is a silent no-op, which makes
//! repeated follow/favorite calls idempotent.

use std::collections::HashSet;

use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::{delete, insert_into, select};

use crate::db::schema::{favorites, followers};

/// In-memory adjacency set over `(owner, target)` id pairs.
///
/// Used when assembling responses that need relationship flags for many rows
/// at once: load the relevant pairs in one query, then answer membership
/// lookups from memory. Mutations carry the same guard-then-mutate semantics
/// as the persisted relations and report whether state actually changed.
#[derive(Debug, Default)]
pub struct PairSet {
    pairs: HashSet<(i32, i32)>,
}

impl PairSet {
    pub fn new() -> Self {
        PairSet::default()
    }

    /// Adds a pair, returning false if it was already present.
    pub fn insert(&mut self, owner: i32, target: i32) -> bool {
        if self.pairs.contains(&(owner, target)) {
            return false;
        }
        self.pairs.insert((owner, target))
    }

    /// Removes a pair, returning false if it was not present.
    pub fn remove(&mut self, owner: i32, target: i32) -> bool {
        if !self.pairs.contains(&(owner, target)) {
            return false;
        }
        self.pairs.remove(&(owner, target))
    }

    pub fn contains(&self, owner: i32, target: i32) -> bool {
        self.pairs.contains(&(owner, target))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Owning view: all targets related to `owner`.
    pub fn targets_of(&self, owner: i32) -> impl Iterator<Item = i32> + '_ {
        self.pairs
            .iter()
            .filter(move |(o, _)| *o == owner)
            .map(|(_, t)| *t)
    }

    /// Derived inverse view: all owners related to `target`.
    pub fn owners_of(&self, target: i32) -> impl Iterator<Item = i32> + '_ {
        self.pairs
            .iter()
            .filter(move |(_, t)| *t == target)
            .map(|(o, _)| *o)
    }
}

impl FromIterator<(i32, i32)> for PairSet {
    fn from_iter<I: IntoIterator<Item = (i32, i32)>>(iter: I) -> Self {
        PairSet {
            pairs: iter.into_iter().collect(),
        }
    }
}

/// Records that `follower_id` follows `followed_id`. Idempotent: a duplicate
/// follow degrades to ON CONFLICT DO NOTHING on the pair's primary key.
pub fn follow(
    conn: &mut PgConnection,
    follower_id: i32,
    followed_id: i32,
) -> Result<(), DieselError> {
    use crate::db::schema::followers::dsl;

    insert_into(followers::table)
        .values((dsl::user_id.eq(followed_id), dsl::follower_id.eq(follower_id)))
        .on_conflict((dsl::user_id, dsl::follower_id))
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Removes a follow edge. Deleting a missing pair is a no-op.
pub fn unfollow(
    conn: &mut PgConnection,
    follower_id: i32,
    followed_id: i32,
) -> Result<(), DieselError> {
    use crate::db::schema::followers::dsl;

    delete(
        followers::table
            .filter(dsl::user_id.eq(followed_id))
            .filter(dsl::follower_id.eq(follower_id)),
    )
    .execute(conn)?;
    Ok(())
}

pub fn is_following(
    conn: &mut PgConnection,
    follower_id: i32,
    followed_id: i32,
) -> Result<bool, DieselError> {
    use crate::db::schema::followers::dsl;

    select(exists(
        followers::table
            .filter(dsl::user_id.eq(followed_id))
            .filter(dsl::follower_id.eq(follower_id)),
    ))
    .get_result::<bool>(conn)
}

/// Bulk-loads the viewer's follow edges towards `candidate_ids`, for
/// resolving `following` flags over many rows without one query per row.
pub fn following_set(
    conn: &mut PgConnection,
    follower_id: i32,
    candidate_ids: &[i32],
) -> Result<PairSet, DieselError> {
    use crate::db::schema::followers::dsl;

    let pairs = followers::table
        .filter(dsl::follower_id.eq(follower_id))
        .filter(dsl::user_id.eq_any(candidate_ids))
        .select((dsl::follower_id, dsl::user_id))
        .load::<(i32, i32)>(conn)?;
    Ok(pairs.into_iter().collect())
}

/// Marks an article as a favorite of `user_id`. Idempotent.
pub fn favorite(
    conn: &mut PgConnection,
    user_id: i32,
    article_id: i32,
) -> Result<(), DieselError> {
    use crate::db::schema::favorites::dsl;

    insert_into(favorites::table)
        .values((dsl::user_id.eq(user_id), dsl::article_id.eq(article_id)))
        .on_conflict((dsl::user_id, dsl::article_id))
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Removes an article from `user_id`'s favorites. Idempotent.
pub fn unfavorite(
    conn: &mut PgConnection,
    user_id: i32,
    article_id: i32,
) -> Result<(), DieselError> {
    use crate::db::schema::favorites::dsl;

    delete(
        favorites::table
            .filter(dsl::user_id.eq(user_id))
            .filter(dsl::article_id.eq(article_id)),
    )
    .execute(conn)?;
    Ok(())
}

pub fn is_favorited(
    conn: &mut PgConnection,
    user_id: i32,
    article_id: i32,
) -> Result<bool, DieselError> {
    use crate::db::schema::favorites::dsl;

    select(exists(
        favorites::table
            .filter(dsl::user_id.eq(user_id))
            .filter(dsl::article_id.eq(article_id)),
    ))
    .get_result::<bool>(conn)
}

pub fn favorites_count(conn: &mut PgConnection, article_id: i32) -> Result<i64, DieselError> {
    use crate::db::schema::favorites::dsl;

    favorites::table
        .filter(dsl::article_id.eq(article_id))
        .count()
        .get_result::<i64>(conn)
}

#[cfg(test)]
mod tests {
    use super::PairSet;

    #[test]
    fn insert_twice_leaves_one_pair() {
        let mut set = PairSet::new();
        assert!(set.insert(1, 2));
        assert!(!set.insert(1, 2));
        assert_eq!(set.len(), 1);
        assert_eq!(set.targets_of(1).count(), 1);
    }

    #[test]
    fn both_views_reflect_one_insert() {
        let mut set = PairSet::new();
        set.insert(1, 2);
        assert!(set.contains(1, 2));
        assert_eq!(set.targets_of(1).collect::<Vec<_>>(), vec![2]);
        assert_eq!(set.owners_of(2).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn remove_clears_both_views() {
        let mut set = PairSet::new();
        set.insert(1, 2);
        assert!(set.remove(1, 2));
        assert!(!set.contains(1, 2));
        assert_eq!(set.targets_of(1).count(), 0);
        assert_eq!(set.owners_of(2).count(), 0);
    }

    #[test]
    fn remove_missing_pair_is_a_noop() {
        let mut set = PairSet::new();
        set.insert(1, 2);
        assert!(!set.remove(3, 4));
        assert!(!set.remove(2, 1));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn pairs_are_directed() {
        let mut set = PairSet::new();
        set.insert(1, 2);
        assert!(!set.contains(2, 1));
        assert!(set.insert(2, 1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn views_are_scoped_to_their_key() {
        let mut set = PairSet::new();
        set.insert(1, 2);
        set.insert(1, 3);
        set.insert(4, 3);
        let mut targets = set.targets_of(1).collect::<Vec<_>>();
        targets.sort_unstable();
        assert_eq!(targets, vec![2, 3]);
        let mut owners = set.owners_of(3).collect::<Vec<_>>();
        owners.sort_unstable();
        assert_eq!(owners, vec![1, 4]);
    }

    #[test]
    fn collects_from_pairs() {
        let set: PairSet = vec![(1, 2), (1, 2), (3, 4)].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(3, 4));
    }
}
