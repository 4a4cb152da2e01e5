use std::collections::HashMap;

use log::info;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    database::error::QueryError,
    error::Error,
    form::AttributePayload,
    permissions::OwnerScope,
    schema::{Attribute, AttributeKind, Id, LinkedAttribute},
};

/// Lists the requester's tags or ingredients, names in descending order.
pub async fn list_attributes(
    kind: AttributeKind,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<Vec<Attribute>, Error> {
    let mut builder = scope.scoped(&format!("SELECT a.id, a.name FROM {} a", kind.table()), "a");
    builder.push(" ORDER BY a.name DESC, a.id DESC");

    let rows: Vec<Attribute> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn create_attribute(
    kind: AttributeKind,
    payload: &AttributePayload,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<Attribute, Error> {
    let row: Attribute = sqlx::query_as(&format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, name",
        kind.table()
    ))
    .bind(scope.user_id())
    .bind(&payload.name)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    info!(
        "created {} {} for user {}",
        kind.field(),
        row.id,
        scope.user_id()
    );
    Ok(row)
}

/// Returns the ids from `ids` that do not name a row owned by `scope`.
pub async fn find_foreign_attributes(
    kind: AttributeKind,
    ids: &[Id],
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<Vec<Id>, Error> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let mut builder = scope.scoped(&format!("SELECT a.id FROM {} a", kind.table()), "a");
    builder.push(" AND a.id = ANY(").push_bind(ids.to_vec()).push(")");

    let owned: Vec<(Id,)> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;
    let owned: Vec<Id> = owned.into_iter().map(|row| row.0).collect();

    Ok(ids
        .iter()
        .copied()
        .filter(|id| !owned.contains(id))
        .collect())
}

/// Loads the linked rows of `kind` for every recipe in `recipe_ids`, grouped by recipe.
pub async fn list_linked_attributes(
    kind: AttributeKind,
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Attribute>>, Error> {
    let mut grouped: HashMap<Id, Vec<Attribute>> = HashMap::new();
    if recipe_ids.is_empty() {
        return Ok(grouped);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT l.recipe_id AS recipe_id, a.id AS id, a.name AS name FROM {link} l \
         INNER JOIN {table} a ON a.id = l.{column} WHERE l.recipe_id = ANY(",
        link = kind.link_table(),
        table = kind.table(),
        column = kind.link_column(),
    ));
    builder
        .push_bind(recipe_ids.to_vec())
        .push(") ORDER BY l.recipe_id, a.id");

    let rows: Vec<LinkedAttribute> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    rows.into_iter().for_each(|row| {
        grouped
            .entry(row.recipe_id)
            .or_default()
            .push(Attribute::from(row))
    });

    Ok(grouped)
}
