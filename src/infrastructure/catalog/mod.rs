//! Static resource catalogs and the place gazetteer.

pub mod gazetteer;
pub mod static_catalog;

pub use gazetteer::{PlaceMatch, is_dense_area, lookup};
pub use static_catalog::StaticCatalog;
