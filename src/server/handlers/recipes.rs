use std::collections::HashMap;

use futures_util::{pin_mut, TryStreamExt};
use log::error;
use warp::{
    http::StatusCode,
    hyper::body::Buf,
    multipart::{FormData, Part},
    reject::Rejection,
    reply, Reply,
};

use crate::{
    actions::{
        create_recipe, delete_recipe, fetch_recipes, get_recipe, get_recipe_row,
        set_recipe_image, update_recipe,
    },
    constants::{IMAGE_FIELD, MISSING_FILE},
    error::{Error, HtmlError},
    form::{Form, RecipePayload, WriteMode},
    jwt::SessionData,
    media::validate_image,
    query::RecipeFilter,
    schema::{FullRecipe, Id},
    server::{
        representation::{represent, Action, RecipeBody},
        state::AppState,
    },
};

pub async fn list_recipes(
    session: SessionData,
    params: HashMap<String, String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let filter = RecipeFilter::from_query(
        params.get("tags").map(String::as_str),
        params.get("ingredients").map(String::as_str),
    )?;
    let recipes = fetch_recipes(&filter, &session.scope(), &state.pool).await?;

    let body: Vec<RecipeBody> = recipes
        .into_iter()
        .map(|recipe| represent(Action::List, recipe, &state.media))
        .collect();
    Ok(reply::json(&body))
}

pub async fn create_recipe_handler(
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let payload = RecipePayload::from_form(form, WriteMode::Create)?;
    let recipe = create_recipe(&payload, &session.scope(), &state.pool).await?;

    Ok(reply::with_status(
        reply::json(&represent(Action::Create, recipe, &state.media)),
        StatusCode::CREATED,
    ))
}

pub async fn retrieve_recipe(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe(id, &session.scope(), &state.pool).await?;

    Ok(reply::json(&represent(
        Action::Retrieve,
        recipe,
        &state.media,
    )))
}

pub async fn update_recipe_handler(
    id: Id,
    mode: WriteMode,
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let scope = session.scope();
    // a foreign id is a 404 even when the body is also invalid
    get_recipe_row(id, &scope, &state.pool).await?;

    let payload = RecipePayload::from_form(form, mode)?;
    let recipe = update_recipe(id, &payload, &scope, &state.pool).await?;

    let action = match mode {
        WriteMode::Merge => Action::PartialUpdate,
        WriteMode::Create | WriteMode::Replace => Action::Update,
    };
    Ok(reply::json(&represent(action, recipe, &state.media)))
}

pub async fn delete_recipe_handler(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let image = delete_recipe(id, &session.scope(), &state.pool).await?;
    if let Some(image) = image {
        state.media.release(&image).await;
    }

    Ok(reply::with_status(reply(), StatusCode::NO_CONTENT))
}

fn malformed_upload(e: warp::Error) -> Error {
    Error::field(IMAGE_FIELD, &format!("Malformed upload: {e}"))
}

/// Reads the `image` file part of an upload. Parts are streamed in order, so
/// the wanted one is consumed as soon as it shows up.
async fn read_image_part(form: FormData) -> Result<Vec<u8>, Error> {
    pin_mut!(form);
    let part = loop {
        match form.try_next().await.map_err(malformed_upload)? {
            Some(part) if part.name() == IMAGE_FIELD => break part,
            Some(_) => continue,
            None => return Err(Error::field(IMAGE_FIELD, MISSING_FILE)),
        }
    };
    if part.filename().is_none() {
        return Err(Error::field(
            IMAGE_FIELD,
            "The submitted data was not a file. Check the encoding type on the form.",
        ));
    }

    read_part(part).await
}

async fn read_part(part: Part) -> Result<Vec<u8>, Error> {
    part.stream()
        .try_fold(Vec::new(), |mut bytes, mut chunk| async move {
            while chunk.has_remaining() {
                let slice = chunk.chunk();
                let len = slice.len();
                bytes.extend_from_slice(slice);
                chunk.advance(len);
            }
            Ok(bytes)
        })
        .await
        .map_err(malformed_upload)
}

pub async fn upload_image(
    id: Id,
    session: SessionData,
    form: FormData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let scope = session.scope();
    get_recipe_row(id, &scope, &state.pool).await?;

    let bytes = read_image_part(form).await?;
    let image = tokio::task::spawn_blocking(move || validate_image(bytes))
        .await
        .map_err(|e| {
            error!("image validation task failed: {e}");
            Rejection::from(HtmlError::InternalServerError.default())
        })??;

    let path = state.media.store_image(&image).await?;
    let (recipe, previous) = match set_recipe_image(id, &path, &scope, &state.pool).await {
        Ok(updated) => updated,
        Err(e) => {
            state.media.release(&path).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous.filter(|previous| previous != &path) {
        state.media.release(&previous).await;
    }

    let full = FullRecipe {
        recipe,
        tags: vec![],
        ingredients: vec![],
    };
    Ok(reply::with_status(
        reply::json(&represent(Action::UploadImage, full, &state.media)),
        StatusCode::OK,
    ))
}
