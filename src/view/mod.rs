// Catalog view model: what the list and detail pages render.

pub mod listing;
pub mod model;

pub use listing::{Listing, Thumbnail, VideoCard};
pub use model::{CatalogStatus, CatalogViewModel, DeleteOutcome, DetailStatus, ViewState};
