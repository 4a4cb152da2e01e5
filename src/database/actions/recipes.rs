use log::info;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    database::error::QueryError,
    error::{Error, FieldErrors, HtmlError},
    form::RecipePayload,
    permissions::OwnerScope,
    query::{RecipeFilter, RECIPE_COLUMNS},
    schema::{AttributeKind, FullRecipe, Id, Recipe},
};

use super::attributes::{find_foreign_attributes, list_linked_attributes};

const RELATIONS: [AttributeKind; 2] = [AttributeKind::Tag, AttributeKind::Ingredient];

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<Vec<FullRecipe>, Error> {
    let rows: Vec<Recipe> = filter
        .build(scope)
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    with_relations(rows, pool).await
}

/// Attaches tags and ingredients to each row, keeping the row order.
pub async fn with_relations(
    rows: Vec<Recipe>,
    pool: &Pool<Postgres>,
) -> Result<Vec<FullRecipe>, Error> {
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_linked_attributes(AttributeKind::Tag, &ids, pool).await?;
    let mut ingredients = list_linked_attributes(AttributeKind::Ingredient, &ids, pool).await?;

    Ok(rows
        .into_iter()
        .map(|recipe| FullRecipe {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

/// Looks up one recipe owned by `scope`. Rows of other users are reported as missing.
pub async fn get_recipe_row(
    id: Id,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let mut builder = scope.scoped(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r"), "r");
    builder.push(" AND r.id = ").push_bind(id);

    let row: Option<Recipe> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    row.ok_or_else(|| HtmlError::NotFound.default())
}

pub async fn get_recipe(
    id: Id,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<FullRecipe, Error> {
    let row = get_recipe_row(id, scope, pool).await?;
    single(with_relations(vec![row], pool).await?)
}

fn single(mut recipes: Vec<FullRecipe>) -> Result<FullRecipe, Error> {
    recipes.pop().ok_or_else(|| HtmlError::NotFound.default())
}

/// Rejects relation ids that are unknown or owned by someone else.
async fn validate_relations(
    payload: &RecipePayload,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    for kind in RELATIONS {
        let ids = match relation_ids(payload, kind) {
            Some(ids) => ids,
            None => continue,
        };
        let foreign = find_foreign_attributes(kind, ids, scope, pool).await?;
        if let Some(id) = foreign.first() {
            errors.insert(
                kind.field().to_string(),
                vec![format!("Invalid pk \"{id}\" - object does not exist.")],
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::fields(errors))
    }
}

fn relation_ids(payload: &RecipePayload, kind: AttributeKind) -> Option<&[Id]> {
    match kind {
        AttributeKind::Tag => payload.tags.as_deref(),
        AttributeKind::Ingredient => payload.ingredients.as_deref(),
    }
}

/// Replaces the association rows of `kind` for a recipe.
async fn replace_links(
    kind: AttributeKind,
    recipe_id: Id,
    ids: &[Id],
    conn: &mut PgConnection,
) -> Result<(), Error> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = $1",
        kind.link_table()
    ))
    .bind(recipe_id)
    .execute(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    if ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} (recipe_id, {}) ",
        kind.link_table(),
        kind.link_column()
    ));
    builder.push_values(ids.iter(), |mut b, id| {
        b.push_bind(recipe_id).push_bind(*id);
    });
    builder.push(" ON CONFLICT DO NOTHING");

    builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Inserts a recipe owned by `scope`, whatever ownership the payload claimed.
pub async fn create_recipe(
    payload: &RecipePayload,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<FullRecipe, Error> {
    validate_relations(payload, scope, pool).await?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, time_minutes, price, link)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, title, time_minutes, price, link, image
    ",
    )
    .bind(scope.user_id())
    .bind(payload.title.as_deref().unwrap_or_default())
    .bind(payload.time_minutes.unwrap_or_default())
    .bind(payload.price.unwrap_or_default())
    .bind(payload.link.as_deref().unwrap_or_default())
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    for kind in RELATIONS {
        if let Some(ids) = relation_ids(payload, kind) {
            replace_links(kind, recipe.id, ids, &mut tx).await?;
        }
    }

    tx.commit().await.map_err(QueryError::from)?;

    info!("created recipe {} for user {}", recipe.id, scope.user_id());
    get_recipe(recipe.id, scope, pool).await
}

/// Applies `payload` to a recipe owned by `scope`.
///
/// Only the keys set in the payload are written; a full update is expressed
/// by a payload read in replace mode, where every key is set. A recipe outside
/// `scope` matches no row and is reported as missing.
pub async fn update_recipe(
    id: Id,
    payload: &RecipePayload,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<FullRecipe, Error> {
    validate_relations(payload, scope, pool).await?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE recipes r SET ");
    let mut assignments = builder.separated(", ");
    assignments.push("id = r.id");
    if let Some(title) = &payload.title {
        assignments.push("title = ").push_bind_unseparated(title.to_owned());
    }
    if let Some(time_minutes) = payload.time_minutes {
        assignments
            .push("time_minutes = ")
            .push_bind_unseparated(time_minutes);
    }
    if let Some(price) = payload.price {
        assignments.push("price = ").push_bind_unseparated(price);
    }
    if let Some(link) = &payload.link {
        assignments.push("link = ").push_bind_unseparated(link.to_owned());
    }
    builder.push(" WHERE ");
    scope.push_predicate(&mut builder, "r");
    builder.push(" AND r.id = ").push_bind(id);

    let updated = builder
        .build()
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;
    if updated.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    for kind in RELATIONS {
        if let Some(ids) = relation_ids(payload, kind) {
            replace_links(kind, id, ids, &mut tx).await?;
        }
    }

    tx.commit().await.map_err(QueryError::from)?;

    info!("updated recipe {} for user {}", id, scope.user_id());
    get_recipe(id, scope, pool).await
}

/// Deletes a recipe and returns the stored image path it referenced, if any.
pub async fn delete_recipe(
    id: Id,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, Error> {
    let mut builder = scope.scoped("DELETE FROM recipes r", "r");
    builder.push(" AND r.id = ").push_bind(id).push(" RETURNING r.image");

    let row: Option<(Option<String>,)> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some((image,)) => {
            info!("deleted recipe {} for user {}", id, scope.user_id());
            Ok(image)
        }
        None => Err(HtmlError::NotFound.default()),
    }
}

/// Points a recipe at a newly stored image.
///
/// Returns the updated row and the path it referenced before, which the
/// caller releases once this has committed.
pub async fn set_recipe_image(
    id: Id,
    image: &str,
    scope: &OwnerScope,
    pool: &Pool<Postgres>,
) -> Result<(Recipe, Option<String>), Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let mut builder = scope.scoped("SELECT r.image FROM recipes r", "r");
    builder.push(" AND r.id = ").push_bind(id).push(" FOR UPDATE");
    let previous: Option<(Option<String>,)> = builder
        .build_query_as()
        .fetch_optional(&mut *tx)
        .await
        .map_err(QueryError::from)?;
    let previous = match previous {
        Some((previous,)) => previous,
        None => return Err(HtmlError::NotFound.default()),
    };

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE recipes r SET image = ");
    builder.push_bind(image.to_owned()).push(" WHERE ");
    scope.push_predicate(&mut builder, "r");
    builder
        .push(" AND r.id = ")
        .push_bind(id)
        .push(format!(" RETURNING {RECIPE_COLUMNS}"));

    let recipe: Recipe = builder
        .build_query_as()
        .fetch_one(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    tx.commit().await.map_err(QueryError::from)?;

    info!("stored image for recipe {} of user {}", id, scope.user_id());
    Ok((recipe, previous))
}
