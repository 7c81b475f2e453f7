//! Built-in catalogs for the supported cities.

use crate::domain::models::{CatalogRow, CatalogSet};
use crate::domain::ports::CatalogSource;

/// In-process catalog with a generic fallback. Never fails.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog;

impl StaticCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl CatalogSource for StaticCatalog {
    fn catalog_for(&self, city: Option<&str>) -> CatalogSet {
        match city.map(str::to_lowercase).as_deref() {
            Some("shanghai") => shanghai(),
            Some("shenzhen") => shenzhen(),
            Some("beijing") => beijing(),
            _ => generic(),
        }
    }
}

fn shanghai() -> CatalogSet {
    CatalogSet {
        eat: vec![
            CatalogRow::new("Lost Heaven Bund", 14, 168, 0.30, &["yunnan", "quiet"]),
            CatalogRow::new("Jia Jia Tang Bao", 8, 58, 0.45, &["dumplings", "fast"]),
            CatalogRow::new("Haidilao Jing'an", 12, 142, 0.40, &["hotpot", "kid_friendly"]),
            CatalogRow::new("Wujie Vegetarian", 16, 128, 0.20, &["vegetarian", "quiet"]),
            CatalogRow::new("Lao Zhengxing", 10, 96, 0.35, &["shanghainese"]),
            CatalogRow::new("Xibo Xinjiang Kitchen", 15, 110, 0.25, &["halal"]),
        ],
        trip: vec![
            CatalogRow::new("DiDi Express", 6, 38, 0.15, &["taxi"]),
            CatalogRow::new("Metro Line 2", 9, 6, 0.10, &["metro"]),
            CatalogRow::new("DiDi Premier", 5, 88, 0.12, &["taxi", "premium"]),
        ],
        hotel: vec![
            CatalogRow::new("Atour Hotel Jing'an", 20, 520, 0.20, &["business"]),
            CatalogRow::new("The PuLi Hotel", 22, 1680, 0.15, &["luxury", "quiet"]),
            CatalogRow::new("Hanting Express People's Square", 18, 260, 0.35, &["budget"]),
            CatalogRow::new("Yuanyuan Guesthouse", 25, 320, 0.30, &["guesthouse"]),
        ],
    }
}

fn shenzhen() -> CatalogSet {
    CatalogSet {
        eat: vec![
            CatalogRow::new("Chaoshan Beef Hotpot Nanshan", 10, 118, 0.40, &["hotpot"]),
            CatalogRow::new("Muwu BBQ Coastal City", 12, 136, 0.45, &["bbq", "kid_friendly"]),
            CatalogRow::new("Green Garden Vegetarian", 15, 92, 0.20, &["vegetarian", "quiet"]),
            CatalogRow::new("Dim Sum House Futian", 9, 84, 0.35, &["cantonese"]),
            CatalogRow::new("Bay Seafood Kitchen", 18, 210, 0.30, &["seafood"]),
            CatalogRow::new("Noodle Lab", 7, 42, 0.50, &["noodles", "fast"]),
        ],
        trip: vec![
            CatalogRow::new("DiDi Express", 6, 36, 0.15, &["taxi"]),
            CatalogRow::new("Metro Line 1", 8, 5, 0.10, &["metro"]),
            CatalogRow::new("Airport Express Shuttle", 12, 25, 0.20, &["airport"]),
        ],
        hotel: vec![
            CatalogRow::new("Vienna Hotel Nanshan", 18, 380, 0.30, &["business"]),
            CatalogRow::new("Hyatt Regency Futian", 20, 1280, 0.15, &["luxury"]),
            CatalogRow::new("Home Inn Shekou", 16, 230, 0.40, &["budget"]),
            CatalogRow::new("Atour S Hotel Houhai", 19, 640, 0.20, &["quiet"]),
        ],
    }
}

fn beijing() -> CatalogSet {
    CatalogSet {
        eat: vec![
            CatalogRow::new("Siji Minfu Roast Duck", 14, 156, 0.45, &["peking_duck"]),
            CatalogRow::new("Jing Zun Courtyard", 16, 132, 0.30, &["quiet"]),
            CatalogRow::new("Huguosi Snacks", 8, 48, 0.35, &["snacks", "fast"]),
            CatalogRow::new("Lily Vegetarian", 12, 88, 0.20, &["vegetarian"]),
            CatalogRow::new("Donglaishun Hotpot", 13, 148, 0.30, &["hotpot", "halal"]),
        ],
        trip: vec![
            CatalogRow::new("DiDi Express", 7, 40, 0.18, &["taxi"]),
            CatalogRow::new("Subway Line 1", 9, 6, 0.12, &["metro"]),
            CatalogRow::new("Airport Express Train", 15, 25, 0.15, &["airport", "train"]),
        ],
        hotel: vec![
            CatalogRow::new("Orange Hotel Sanlitun", 18, 480, 0.25, &["business"]),
            CatalogRow::new("Peninsula Beijing", 22, 1880, 0.12, &["luxury", "quiet"]),
            CatalogRow::new("7 Days Inn Wangfujing", 15, 240, 0.40, &["budget"]),
            CatalogRow::new("Courtyard Hutong Stay", 24, 420, 0.30, &["guesthouse", "quiet"]),
        ],
    }
}

fn generic() -> CatalogSet {
    CatalogSet {
        eat: vec![
            CatalogRow::new("City Noodle House", 9, 48, 0.35, &["noodles", "fast"]),
            CatalogRow::new("Family Hotpot", 13, 128, 0.40, &["hotpot", "kid_friendly"]),
            CatalogRow::new("Garden Vegetarian", 14, 86, 0.20, &["vegetarian", "quiet"]),
            CatalogRow::new("Local Bistro", 12, 110, 0.30, &["local"]),
            CatalogRow::new("Riverside Grill", 16, 180, 0.30, &["grill"]),
        ],
        trip: vec![
            CatalogRow::new("City Taxi", 7, 40, 0.18, &["taxi"]),
            CatalogRow::new("Metro", 10, 6, 0.12, &["metro"]),
            CatalogRow::new("Ride Hailing Comfort", 6, 62, 0.15, &["taxi"]),
        ],
        hotel: vec![
            CatalogRow::new("Central Business Hotel", 18, 450, 0.25, &["business"]),
            CatalogRow::new("Grand Plaza Hotel", 20, 1200, 0.15, &["luxury"]),
            CatalogRow::new("Budget Inn", 15, 220, 0.40, &["budget"]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_city_catalogs_are_populated() {
        let catalog = StaticCatalog::new();
        for city in ["Shanghai", "shenzhen", "BEIJING"] {
            let set = catalog.catalog_for(Some(city));
            assert!(!set.eat.is_empty(), "{city} eat");
            assert!(!set.trip.is_empty(), "{city} trip");
            assert!(!set.hotel.is_empty(), "{city} hotel");
        }
    }

    #[test]
    fn test_unknown_city_falls_back_to_generic() {
        let catalog = StaticCatalog::new();
        assert_eq!(catalog.catalog_for(Some("Atlantis")), generic());
        assert_eq!(catalog.catalog_for(None), generic());
    }
}
