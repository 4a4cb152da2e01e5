use sqlx::{Postgres, QueryBuilder};

use crate::{
    error::{Error, FieldErrors},
    permissions::OwnerScope,
    schema::{AttributeKind, Id},
};

pub const RECIPE_COLUMNS: &str = "r.id, r.user_id, r.title, r.time_minutes, r.price, r.link, r.image";

/// Optional relation filters taken from the `tags` / `ingredients` query parameters.
///
/// Within one relation the ids are alternatives (a recipe matches if it links
/// any of them); across relations and with the owner predicate the
/// conditions are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

enum Predicate<'a> {
    Owner(&'a OwnerScope),
    Linked(AttributeKind, &'a [Id]),
}

fn alias(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Tag => "rt",
        AttributeKind::Ingredient => "ri",
    }
}

impl RecipeFilter {
    /// Parses both parameters, reporting every malformed one at once.
    pub fn from_query(tags: Option<&str>, ingredients: Option<&str>) -> Result<Self, Error> {
        let mut errors = FieldErrors::new();
        let mut filter = Self::default();

        for (kind, raw) in [
            (AttributeKind::Tag, tags),
            (AttributeKind::Ingredient, ingredients),
        ] {
            match raw.map(parse_id_list).transpose() {
                Ok(ids) => match kind {
                    AttributeKind::Tag => filter.tags = ids.flatten(),
                    AttributeKind::Ingredient => filter.ingredients = ids.flatten(),
                },
                Err(message) => {
                    errors.insert(kind.field().to_string(), vec![message]);
                }
            }
        }

        if !errors.is_empty() {
            return Err(Error::fields(errors));
        }
        Ok(filter)
    }

    fn ids(&self, kind: AttributeKind) -> Option<&[Id]> {
        match kind {
            AttributeKind::Tag => self.tags.as_deref(),
            AttributeKind::Ingredient => self.ingredients.as_deref(),
        }
    }

    fn predicates<'a>(&'a self, scope: &'a OwnerScope) -> Vec<Predicate<'a>> {
        let mut predicates = vec![Predicate::Owner(scope)];
        for kind in [AttributeKind::Tag, AttributeKind::Ingredient] {
            if let Some(ids) = self.ids(kind) {
                predicates.push(Predicate::Linked(kind, ids));
            }
        }
        predicates
    }

    /// Compiles the filter into a single statement.
    ///
    /// Linked predicates join the association table, so a recipe matching
    /// several listed ids would come back once per match; `DISTINCT ON (r.id)`
    /// collapses those rows.
    pub fn build<'args>(&self, scope: &OwnerScope) -> QueryBuilder<'args, Postgres> {
        let predicates = self.predicates(scope);

        let mut builder = QueryBuilder::new("SELECT DISTINCT ON (r.id) ");
        builder.push(RECIPE_COLUMNS).push(" FROM recipes r");

        for predicate in &predicates {
            if let Predicate::Linked(kind, _) = predicate {
                let alias = alias(*kind);
                builder.push(format!(
                    " INNER JOIN {} {alias} ON {alias}.recipe_id = r.id",
                    kind.link_table()
                ));
            }
        }

        builder.push(" WHERE ");
        for (index, predicate) in predicates.into_iter().enumerate() {
            if index > 0 {
                builder.push(" AND ");
            }
            match predicate {
                Predicate::Owner(scope) => scope.push_predicate(&mut builder, "r"),
                Predicate::Linked(kind, ids) => {
                    builder
                        .push(format!("{}.{} = ANY(", alias(kind), kind.link_column()))
                        .push_bind(ids.to_vec())
                        .push(")");
                }
            }
        }

        builder.push(" ORDER BY r.id DESC");
        builder
    }
}

/// `"1,2,3"` -> `[1, 2, 3]`. An empty parameter means no filter.
pub fn parse_id_list(raw: &str) -> Result<Option<Vec<Id>>, String> {
    if raw.is_empty() {
        return Ok(None);
    }

    raw.split(',')
        .map(|token| {
            token
                .trim()
                .parse::<Id>()
                .map_err(|_| format!("Invalid id \"{token}\""))
        })
        .collect::<Result<Vec<Id>, String>>()
        .map(Some)
}
