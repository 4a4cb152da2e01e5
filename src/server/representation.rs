use serde::{Serialize, Serializer};

use crate::{
    constants::PRICE_DECIMAL_PLACES,
    media::MediaStorage,
    schema::{Attribute, FullRecipe, Id, User},
};

/// Request kinds served by the recipe endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    PartialUpdate,
    UploadImage,
}

/// Output shapes a recipe can be rendered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    /// Relations as bare ids.
    Summary,
    /// Relations as `{id, name}` objects, plus the image.
    Detail,
    /// Only the id and image.
    Image,
}

pub fn choose_representation(action: Action) -> Representation {
    match action {
        Action::Retrieve => Representation::Detail,
        Action::UploadImage => Representation::Image,
        Action::List | Action::Create | Action::Update | Action::PartialUpdate => {
            Representation::Summary
        }
    }
}

// prices go over the wire as fixed-point strings, e.g. "5.00"
fn price_string<S>(price: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!(
        "{:.*}",
        PRICE_DECIMAL_PLACES as usize,
        price
    ))
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeSummary {
    pub id: Id,
    pub title: String,
    pub ingredients: Vec<Id>,
    pub tags: Vec<Id>,
    pub time_minutes: i32,
    #[serde(serialize_with = "price_string")]
    pub price: f64,
    pub link: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeDetail {
    pub id: Id,
    pub title: String,
    pub ingredients: Vec<Attribute>,
    pub tags: Vec<Attribute>,
    pub time_minutes: i32,
    #[serde(serialize_with = "price_string")]
    pub price: f64,
    pub link: String,
    pub image: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeImage {
    pub id: Id,
    pub image: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RecipeBody {
    Summary(RecipeSummary),
    Detail(RecipeDetail),
    Image(RecipeImage),
}

/// Renders a recipe in the shape `action` calls for.
pub fn represent(action: Action, full: FullRecipe, media: &MediaStorage) -> RecipeBody {
    let image = full
        .recipe
        .image
        .as_deref()
        .map(|path| media.url_for(path));

    match choose_representation(action) {
        Representation::Summary => RecipeBody::Summary(RecipeSummary {
            tags: full.tag_ids(),
            ingredients: full.ingredient_ids(),
            id: full.recipe.id,
            title: full.recipe.title,
            time_minutes: full.recipe.time_minutes,
            price: full.recipe.price,
            link: full.recipe.link,
        }),
        Representation::Detail => RecipeBody::Detail(RecipeDetail {
            id: full.recipe.id,
            title: full.recipe.title,
            ingredients: full.ingredients,
            tags: full.tags,
            time_minutes: full.recipe.time_minutes,
            price: full.recipe.price,
            link: full.recipe.link,
            image,
        }),
        Representation::Image => RecipeBody::Image(RecipeImage {
            id: full.recipe.id,
            image,
        }),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserBody {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserBody {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            name: user.name.to_owned(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenBody {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::Recipe;

    fn recipe() -> FullRecipe {
        FullRecipe {
            recipe: Recipe {
                id: 4,
                user_id: 1,
                title: "Sample recipe".to_string(),
                time_minutes: 10,
                price: 5.0,
                link: String::new(),
                image: Some("uploads/recipe/a.jpg".to_string()),
            },
            tags: vec![Attribute {
                id: 2,
                name: "Main course".to_string(),
            }],
            ingredients: vec![Attribute {
                id: 3,
                name: "Cinnamon".to_string(),
            }],
        }
    }

    fn media() -> MediaStorage {
        MediaStorage::new("/srv/media", "/media/")
    }

    #[test]
    fn only_retrieve_uses_the_detail_shape() {
        assert_eq!(choose_representation(Action::Retrieve), Representation::Detail);
        assert_eq!(
            choose_representation(Action::UploadImage),
            Representation::Image
        );
        for action in [
            Action::List,
            Action::Create,
            Action::Update,
            Action::PartialUpdate,
        ] {
            assert_eq!(choose_representation(action), Representation::Summary);
        }
    }

    #[test]
    fn summaries_carry_relation_ids() {
        let body = serde_json::to_value(represent(Action::List, recipe(), &media())).unwrap();

        assert_eq!(
            body,
            json!({
                "id": 4,
                "title": "Sample recipe",
                "ingredients": [3],
                "tags": [2],
                "time_minutes": 10,
                "price": "5.00",
                "link": ""
            })
        );
    }

    #[test]
    fn details_embed_relations_and_the_image_url() {
        let body =
            serde_json::to_value(represent(Action::Retrieve, recipe(), &media())).unwrap();

        assert_eq!(body["tags"], json!([{"id": 2, "name": "Main course"}]));
        assert_eq!(body["ingredients"], json!([{"id": 3, "name": "Cinnamon"}]));
        assert_eq!(body["image"], "/media/uploads/recipe/a.jpg");
    }

    #[test]
    fn image_shape_has_only_id_and_image() {
        let body =
            serde_json::to_value(represent(Action::UploadImage, recipe(), &media())).unwrap();

        assert_eq!(
            body,
            json!({"id": 4, "image": "/media/uploads/recipe/a.jpg"})
        );
    }
}
