mod classifier;
mod models;
mod normalize;

pub use classifier::{classify, BandDiscographyIndex, Classification};
pub use models::{
    BandDiscographyEntry, BandReference, CatalogueIndexEntry, CatalogueIndexStatus,
    DistributorCode, MediaType,
};
pub use normalize::normalize_album_title;
