//! Fixed bilingual gazetteer of supported cities and districts.

/// One gazetteer rule. Area rules name the city they belong to.
#[derive(Debug, Clone, Copy)]
pub struct PlaceRule {
    pub keywords: &'static [&'static str],
    pub city: &'static str,
    pub area: Option<&'static str>,
    /// Busy districts where queues run long.
    pub dense: bool,
}

/// A resolved place mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceMatch {
    pub city: String,
    pub area: Option<String>,
    /// True when the city itself was named, not just implied by the area.
    pub city_named: bool,
}

const fn area(keywords: &'static [&'static str], city: &'static str, name: &'static str) -> PlaceRule {
    PlaceRule {
        keywords,
        city,
        area: Some(name),
        dense: false,
    }
}

const fn busy_area(keywords: &'static [&'static str], city: &'static str, name: &'static str) -> PlaceRule {
    PlaceRule {
        dense: true,
        ..area(keywords, city, name)
    }
}

const fn city(keywords: &'static [&'static str], name: &'static str) -> PlaceRule {
    PlaceRule {
        keywords,
        city: name,
        area: None,
        dense: false,
    }
}

/// Areas first so a district mention also resolves its city.
const RULES: &[PlaceRule] = &[
    busy_area(&["nanshan", "南山"], "Shenzhen", "Nanshan"),
    busy_area(&["futian", "福田"], "Shenzhen", "Futian"),
    area(&["jing'an", "jingan", "静安"], "Shanghai", "Jing'an"),
    busy_area(&["xintiandi", "新天地"], "Shanghai", "Xintiandi"),
    area(&["lujiazui", "陆家嘴"], "Shanghai", "Lujiazui"),
    busy_area(&["the bund", "bund", "外滩"], "Shanghai", "Bund"),
    busy_area(&["sanlitun", "三里屯"], "Beijing", "Sanlitun"),
    busy_area(&["wangfujing", "王府井"], "Beijing", "Wangfujing"),
    area(&["tianhe", "天河"], "Guangzhou", "Tianhe"),
    busy_area(&["chunxi", "春熙路"], "Chengdu", "Chunxi Road"),
    city(&["shanghai", "上海"], "Shanghai"),
    city(&["shenzhen", "深圳"], "Shenzhen"),
    city(&["beijing", "北京"], "Beijing"),
    city(&["guangzhou", "广州"], "Guangzhou"),
    city(&["chengdu", "成都"], "Chengdu"),
    city(&["hangzhou", "杭州"], "Hangzhou"),
];

/// Resolve the first rule (in rule order) mentioned anywhere in `text`.
pub fn lookup(text: &str) -> Option<PlaceMatch> {
    let lowered = text.to_lowercase();
    let rule = RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| mentions(&lowered, k)))?;
    let city_named = rule.area.is_none() || mentions_city(&lowered, rule.city);
    Some(PlaceMatch {
        city: rule.city.to_string(),
        area: rule.area.map(str::to_string),
        city_named,
    })
}

fn mentions_city(lowered: &str, city_name: &str) -> bool {
    RULES
        .iter()
        .filter(|rule| rule.area.is_none() && rule.city == city_name)
        .any(|rule| rule.keywords.iter().any(|k| mentions(lowered, k)))
}

/// Latin keywords must stand alone; CJK keywords match anywhere.
fn mentions(lowered: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return lowered.contains(keyword);
    }
    lowered.match_indices(keyword).any(|(start, _)| {
        let before = lowered[..start].chars().next_back();
        let after = lowered[start + keyword.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Whether `area_name` is one of the busy districts.
pub fn is_dense_area(area_name: &str) -> bool {
    RULES
        .iter()
        .any(|rule| rule.dense && rule.area.is_some_and(|a| a.eq_ignore_ascii_case(area_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_implies_city() {
        let m = lookup("somewhere in 南山 please").unwrap();
        assert_eq!(m.city, "Shenzhen");
        assert_eq!(m.area.as_deref(), Some("Nanshan"));
        assert!(!m.city_named);
    }

    #[test]
    fn test_area_with_named_city() {
        let m = lookup("Shenzhen Nanshan").unwrap();
        assert_eq!(m.area.as_deref(), Some("Nanshan"));
        assert!(m.city_named);
    }

    #[test]
    fn test_city_only() {
        let m = lookup("I'm in BEIJING").unwrap();
        assert_eq!(m.city, "Beijing");
        assert_eq!(m.area, None);
        assert!(m.city_named);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(lookup("hi there"), None);
        assert_eq!(lookup("an abundant lunch"), None);
    }

    #[test]
    fn test_dense_areas() {
        assert!(is_dense_area("Nanshan"));
        assert!(is_dense_area("bund"));
        assert!(!is_dense_area("Shenzhen"));
        assert!(!is_dense_area("Jing'an"));
        assert!(!is_dense_area("Tianhe"));
        assert!(!is_dense_area("Atlantis"));
    }
}
