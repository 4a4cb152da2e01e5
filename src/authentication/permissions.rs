use sqlx::{Postgres, QueryBuilder};

use crate::schema::Id;

/// Ownership predicate every tag, ingredient and recipe statement runs under.
///
/// A scope can only be obtained from an authenticated
/// [`SessionData`](crate::jwt::SessionData), and the repository functions take
/// one instead of a bare user id, so a call site cannot issue an unscoped read
/// or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerScope {
    user_id: Id,
}

impl OwnerScope {
    pub(crate) fn new(user_id: Id) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> Id {
        self.user_id
    }

    /// Pushes `<alias>.user_id = $n`.
    pub fn push_predicate(&self, builder: &mut QueryBuilder<'_, Postgres>, alias: &str) {
        builder
            .push(alias)
            .push(".user_id = ")
            .push_bind(self.user_id);
    }

    /// Starts `<statement> WHERE <alias>.user_id = $1`; callers append further `AND` clauses.
    pub fn scoped<'args>(&self, statement: &str, alias: &str) -> QueryBuilder<'args, Postgres> {
        let mut builder = QueryBuilder::new(statement);
        builder.push(" WHERE ");
        self.push_predicate(&mut builder, alias);
        builder
    }
}
