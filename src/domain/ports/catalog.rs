use crate::domain::models::CatalogSet;

/// Source of per-city resource catalogs.
///
/// Implementations must always return a usable catalog, falling back to a
/// generic one for cities they do not know.
pub trait CatalogSource: Send + Sync {
    /// Catalog for a city. `None` means the city is unresolved.
    fn catalog_for(&self, city: Option<&str>) -> CatalogSet;
}
