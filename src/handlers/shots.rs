use futures::future::join_all;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::tmdb::{movie_backdrops, search_movies, TmdbImage, TmdbMovie};
use crate::models::{MovieShot, Still};

pub const MAX_MOVIES: usize = 5;
pub const MAX_STILLS_PER_MOVIE: usize = 10;
const UNKNOWN_YEAR: &str = "Unknown";

/// Parses the `page` parameter; blank or absent means the first page.
pub fn parse_page(page: Option<&str>) -> Result<u32, PipelineError> {
    match page.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(1),
        Some(value) => value
            .parse::<u32>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| {
                PipelineError::MissingInput(format!("page must be a positive integer, got {value}"))
            }),
    }
}

fn release_year(release_date: Option<&str>) -> String {
    release_date
        .and_then(|date| date.split('-').next())
        .map(str::trim)
        .filter(|year| !year.is_empty())
        .unwrap_or(UNKNOWN_YEAR)
        .to_string()
}

fn image_url(config: &Config, size: &str, file_path: &str) -> String {
    format!("{}/{}{}", config.tmdb_image_base_url, size, file_path)
}

fn build_movie_shot(config: &Config, movie: &TmdbMovie, backdrops: Vec<TmdbImage>) -> MovieShot {
    let stills = backdrops
        .into_iter()
        .take(MAX_STILLS_PER_MOVIE)
        .map(|image| Still {
            url: image_url(config, "original", &image.file_path),
            thumbnail: image_url(config, "w500", &image.file_path),
            aspect: image.aspect_ratio,
        })
        .collect();

    MovieShot {
        id: movie.id,
        title: movie.title.clone().unwrap_or_default(),
        year: release_year(movie.release_date.as_deref()),
        backdrop: movie
            .backdrop_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(|path| image_url(config, "original", path)),
        stills,
    }
}

async fn lookup_movie(config: &Config, api_key: &str, movie: &TmdbMovie) -> Option<MovieShot> {
    match movie_backdrops(config, api_key, movie.id).await {
        Ok(backdrops) => Some(build_movie_shot(config, movie, backdrops)),
        Err(err) => {
            warn!("Error fetching images for movie {}: {}", movie.id, err);
            None
        }
    }
}

/// Searches TMDB and attaches up to ten stills to each of the top five hits.
/// Per-movie lookups run concurrently; a failed lookup drops only that movie
/// and the output keeps the search ranking.
pub async fn find_movie_shots(
    config: &Config,
    query: Option<&str>,
    page: Option<&str>,
) -> Result<Vec<MovieShot>, PipelineError> {
    let api_key = config.tmdb_api_key.trim();
    if api_key.is_empty() {
        return Err(PipelineError::MissingCredential(
            "TMDB_API_KEY not configured".to_string(),
        ));
    }
    let query = query
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(config.tmdb_default_query.as_str());
    let page = parse_page(page)?;

    let mut movies = search_movies(config, api_key, query, page).await?;
    movies.truncate(MAX_MOVIES);

    let lookups = movies
        .iter()
        .map(|movie| lookup_movie(config, api_key, movie));
    let shots: Vec<MovieShot> = join_all(lookups).await.into_iter().flatten().collect();

    info!(
        "TMDB query '{}' page {}: {} of {} movies with stills",
        query,
        page,
        shots.len(),
        movies.len()
    );
    Ok(shots)
}
