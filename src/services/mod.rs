mod image_cache;
mod tmdb;

pub use image_cache::{ImageCache, ImageKind};
pub use tmdb::{SearchPage, TmdbClient, BACKDROP_SIZE, POSTER_SIZE};
