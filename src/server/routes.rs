use std::{collections::HashMap, convert::Infallible};

use serde_json::Value;
use warp::{filters::BoxedFilter, multipart, reject::Rejection, Filter, Reply};

use crate::{
    authentication::middleware::with_session,
    constants::MAX_JSON_BODY_BYTES,
    form::{Form, WriteMode},
    jwt::SessionData,
    schema::{AttributeKind, Id},
    server::{
        handlers::*,
        recover::handle_rejection,
        state::{with_state, AppState},
    },
};

/// A bounded json body, wrapped for field validation.
fn json_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_BYTES)
        .and(warp::body::json::<Value>())
        .map(Form::from_value)
}

/// PUT replaces, PATCH merges.
fn write_mode() -> impl Filter<Extract = (WriteMode,), Error = Rejection> + Clone {
    warp::put()
        .map(|| WriteMode::Replace)
        .or(warp::patch().map(|| WriteMode::Merge))
        .unify()
}

fn user_routes(state: AppState) -> BoxedFilter<(impl Reply,)> {
    let create = warp::path!("api" / "user" / "create")
        .and(warp::post())
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(create_user);

    let token = warp::path!("api" / "user" / "token")
        .and(warp::post())
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(create_token);

    let me = warp::path!("api" / "user" / "me");
    let profile = me
        .clone()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_profile);
    let edit = me
        .and(write_mode())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state))
        .and_then(edit_profile);

    create.or(token).or(profile).or(edit).boxed()
}

fn attribute_routes(
    kind: AttributeKind,
    segment: &'static str,
    state: AppState,
) -> BoxedFilter<(impl Reply,)> {
    let base = warp::path("api")
        .and(warp::path("recipe"))
        .and(warp::path(segment))
        .and(warp::path::end());

    let list = base
        .clone()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(move |session: SessionData, state: AppState| {
            list_attribute_handler(kind, session, state)
        });

    let create = base
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state))
        .and_then(move |session: SessionData, form: Form, state: AppState| {
            create_attribute_handler(kind, session, form, state)
        });

    list.or(create).boxed()
}

fn recipe_routes(state: AppState) -> BoxedFilter<(impl Reply,)> {
    let collection = warp::path!("api" / "recipe" / "recipes");
    let list = collection
        .clone()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(list_recipes);
    let create = collection
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(create_recipe_handler);

    let item = warp::path!("api" / "recipe" / "recipes" / Id);
    let retrieve = item
        .clone()
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(retrieve_recipe);
    let update = item
        .clone()
        .and(write_mode())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(update_recipe_handler);
    let delete = item
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe_handler);

    let upload = warp::path!("api" / "recipe" / "recipes" / Id / "upload-image")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(multipart::form().max_length(state.config.max_upload_bytes))
        .and(with_state(state))
        .and_then(upload_image);

    list.or(create)
        .or(retrieve)
        .or(update)
        .or(delete)
        .or(upload)
        .boxed()
}

fn media_routes(state: &AppState) -> BoxedFilter<(impl Reply,)> {
    warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.media.root().to_path_buf()))
        .boxed()
}

/// Every endpoint of the service, with rejections rendered as json.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    user_routes(state.clone())
        .or(attribute_routes(AttributeKind::Tag, "tags", state.clone()))
        .or(attribute_routes(
            AttributeKind::Ingredient,
            "ingredients",
            state.clone(),
        ))
        .or(recipe_routes(state.clone()))
        .or(media_routes(&state))
        .recover(handle_rejection)
        .with(warp::log("recipe_api"))
}
