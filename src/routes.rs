use std::{num::IntErrorKind, sync::Arc};

use axum::{
    Json, Router,
    http::Uri,
    response::Redirect,
    routing::get,
};
use sea_orm::{EntityTrait, PaginatorTrait, QueryOrder, QuerySelect};
use tracing::debug;

use crate::{
    AppState,
    entities::movie,
    error::{AppError, AppResult},
    extract::{DbSession, Path, Query},
    models::{MovieDetail, MovieList},
    pagination::{PageLinks, PageParams, total_pages},
};

/// Public path of the list endpoint; page links are built from it.
pub const MOVIES_PATH: &str = "/theater/movies/";

const NO_MOVIES: &str = "No movies found.";
const MOVIE_NOT_FOUND: &str = "Movie with the given ID was not found.";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(MOVIES_PATH, get(list_movies))
        .route("/theater/movies", get(add_trailing_slash))
        .route("/theater/movies/{movie_id}/", get(get_movie))
        .route("/theater/movies/{movie_id}", get(add_trailing_slash))
        .fallback(fallback)
        .with_state(state)
}

async fn add_trailing_slash(uri: Uri) -> Redirect {
    let query = uri.query().map(|q| format!("?{q}")).unwrap_or_default();
    Redirect::temporary(&format!("{}/{query}", uri.path()))
}

async fn fallback() -> AppError {
    AppError::NotFound("Not Found")
}

pub async fn list_movies(
    Query(params): Query<PageParams>,
    db: DbSession,
) -> AppResult<Json<MovieList>> {
    let params = params.validate()?;

    let total_items = movie::Entity::find().count(&*db).await?;
    let total_pages = total_pages(total_items, params.per_page);

    let Some(offset) = params.offset() else {
        return Err(AppError::NotFound(NO_MOVIES));
    };
    let movies = movie::Entity::find()
        .order_by_asc(movie::Column::Id)
        .offset(offset)
        .limit(params.per_page)
        .all(&*db)
        .await?;

    if movies.is_empty() {
        return Err(AppError::NotFound(NO_MOVIES));
    }

    debug!(page = params.page, per_page = params.per_page, returned = movies.len(), "listed movies");

    let links = PageLinks::new(MOVIES_PATH, params, total_pages);
    Ok(Json(MovieList {
        movies: movies.into_iter().map(MovieDetail::from).collect(),
        prev_page: links.prev,
        next_page: links.next,
        total_pages,
        total_items,
    }))
}

pub async fn get_movie(
    Path(movie_id): Path<String>,
    db: DbSession,
) -> AppResult<Json<MovieDetail>> {
    let Some(movie_id) = parse_movie_id(&movie_id)? else {
        return Err(AppError::NotFound(MOVIE_NOT_FOUND));
    };
    let movie = movie::Entity::find_by_id(movie_id)
        .one(&*db)
        .await?
        .ok_or(AppError::NotFound(MOVIE_NOT_FOUND))?;
    Ok(Json(movie.into()))
}

/// `None` for an integer no row can have because it overflows the id column.
fn parse_movie_id(raw: &str) -> AppResult<Option<i32>> {
    match raw.parse::<i32>() {
        Ok(id) => Ok(Some(id)),
        Err(err) if matches!(err.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            Ok(None)
        },
        Err(err) => Err(AppError::Validation(format!("movie_id: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        db::Db,
        seeder::{CsvSeeder, FIXTURE_CSV},
    };

    async fn app(seeded: bool) -> (Router, Db) {
        let db = Db::in_memory().await.unwrap();
        if seeded {
            CsvSeeder::new(FIXTURE_CSV).seed_if_empty(&db).await.unwrap();
        }
        let state = Arc::new(AppState { db: db.clone() });
        (router(state), db)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn first_page_of_25() {
        let (app, _db) = app(true).await;
        let (status, body) = get(&app, "/theater/movies/?page=1&per_page=10").await;

        assert_eq!(status, StatusCode::OK);
        let list: MovieList = serde_json::from_value(body).unwrap();
        assert_eq!(list.movies.len(), 10);
        assert_eq!(list.prev_page, None);
        assert_eq!(list.next_page.as_deref(), Some("/theater/movies/?page=2&per_page=10"));
        assert_eq!(list.total_pages, 3);
        assert_eq!(list.total_items, 25);
        assert_eq!(list.movies.iter().map(|m| m.id).collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn last_page_is_short() {
        let (app, _db) = app(true).await;
        let (status, body) = get(&app, "/theater/movies/?page=3&per_page=10").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["movies"].as_array().unwrap().len(), 5);
        assert_eq!(body["next_page"], Value::Null);
        assert_eq!(body["prev_page"], json!("/theater/movies/?page=2&per_page=10"));
    }

    #[tokio::test]
    async fn defaults_to_first_ten() {
        let (app, _db) = app(true).await;
        let (status, body) = get(&app, "/theater/movies/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["movies"].as_array().unwrap().len(), 10);
        assert_eq!(body["next_page"], json!("/theater/movies/?page=2&per_page=10"));
    }

    #[tokio::test]
    async fn every_page_size_walks_the_whole_table() {
        let (app, _db) = app(true).await;

        for per_page in 1..=20u64 {
            let pages = 25u64.div_ceil(per_page);
            let mut seen = 0;
            for page in 1..=pages {
                let (status, body) =
                    get(&app, &format!("/theater/movies/?page={page}&per_page={per_page}")).await;
                assert_eq!(status, StatusCode::OK);

                let list: MovieList = serde_json::from_value(body).unwrap();
                assert_eq!(list.total_pages, pages);
                assert!(list.movies.len() as u64 <= per_page);
                if page < pages {
                    assert_eq!(list.movies.len() as u64, per_page);
                }
                assert_eq!(list.prev_page.is_some(), page > 1);
                assert_eq!(list.next_page.is_some(), page < pages);
                seen += list.movies.len();
            }
            assert_eq!(seen, 25, "per_page={per_page}");
        }
    }

    #[tokio::test]
    async fn page_past_the_end_is_404() {
        let (app, _db) = app(true).await;
        let (status, body) = get(&app, "/theater/movies/?page=4&per_page=10").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "No movies found." }));

        let (status, _) = get(&app, &format!("/theater/movies/?page={}&per_page=20", u64::MAX)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_table_is_404() {
        let (app, _db) = app(false).await;
        let (status, body) = get(&app, "/theater/movies/").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "No movies found." }));
    }

    #[tokio::test]
    async fn invalid_params_are_422() {
        let (app, _db) = app(true).await;
        for uri in [
            "/theater/movies/?page=0",
            "/theater/movies/?per_page=0",
            "/theater/movies/?per_page=21",
            "/theater/movies/?page=-1",
            "/theater/movies/?page=abc",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert!(body["detail"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn detail_returns_stored_fields() {
        let (app, db) = app(true).await;
        let stored = movie::Entity::find_by_id(7).one(db.conn()).await.unwrap().unwrap();

        let (status, body) = get(&app, "/theater/movies/7/").await;
        assert_eq!(status, StatusCode::OK);

        let detail: MovieDetail = serde_json::from_value(body).unwrap();
        assert_eq!(detail, MovieDetail::from(stored));
        assert_eq!(detail.name, "John Wick: Chapter 4");
    }

    #[tokio::test]
    async fn unknown_id_is_404() {
        let (app, _db) = app(true).await;
        let (status, body) = get(&app, "/theater/movies/999/").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Movie with the given ID was not found." }));
    }

    #[tokio::test]
    async fn non_integer_id_is_422() {
        let (app, _db) = app(true).await;
        let (status, _) = get(&app, "/theater/movies/abc/").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn id_beyond_column_range_is_404() {
        let (app, _db) = app(true).await;
        for uri in ["/theater/movies/3000000000/", "/theater/movies/-3000000000/"] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body, json!({ "detail": "Movie with the given ID was not found." }));
        }
    }

    #[tokio::test]
    async fn page_beyond_u64_is_404() {
        let (app, _db) = app(true).await;
        let (status, body) =
            get(&app, "/theater/movies/?page=18446744073709551616&per_page=10").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "No movies found." }));
    }

    #[tokio::test]
    async fn missing_trailing_slash_redirects() {
        let (app, _db) = app(true).await;
        for (uri, location) in [
            ("/theater/movies?page=2&per_page=5", "/theater/movies/?page=2&per_page=5"),
            ("/theater/movies", "/theater/movies/"),
            ("/theater/movies/7", "/theater/movies/7/"),
        ] {
            let resp = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "{uri}");
            assert_eq!(resp.headers()["location"], location);
        }
    }

    #[tokio::test]
    async fn unknown_path_is_json_404() {
        let (app, _db) = app(true).await;
        let (status, body) = get(&app, "/theater/actors/").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Not Found" }));
    }

    #[test]
    fn movie_id_parsing() {
        assert_eq!(parse_movie_id("7").unwrap(), Some(7));
        assert_eq!(parse_movie_id("3000000000").unwrap(), None);
        assert!(matches!(parse_movie_id("abc"), Err(AppError::Validation(_))));
        assert!(matches!(parse_movie_id("7.5"), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn reset_empties_the_listing() {
        let (app, db) = app(true).await;
        assert_eq!(get(&app, "/theater/movies/").await.0, StatusCode::OK);

        db.reset().await.unwrap();
        assert_eq!(get(&app, "/theater/movies/").await.0, StatusCode::NOT_FOUND);
    }
}
