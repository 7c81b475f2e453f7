//! Seeded, platform-independent pseudo-randomness.
//!
//! Every "random" decision in planning and execution is a pure function of a
//! seed string and a key, so identical conversations replay identically.

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over the UTF-16 code units of `text`.
pub fn stable_hash32(text: &str) -> u32 {
    text.encode_utf16().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic draw in `[0, 1)` with 1e-4 resolution.
pub fn seeded_float(seed: &str, key: &str) -> f64 {
    let hash = stable_hash32(&format!("{seed}|{key}"));
    f64::from(hash % 10_000) / 10_000.0
}

/// Deterministic pick from a list. `None` when the list is empty.
pub fn seeded_pick<'a, T>(seed: &str, key: &str, list: &'a [T]) -> Option<&'a T> {
    if list.is_empty() {
        return None;
    }
    let index = (seeded_float(seed, key) * list.len() as f64).floor() as usize;
    list.get(index.min(list.len() - 1))
}

/// Deterministic value in `[min, max)`.
pub fn seeded_range(seed: &str, key: &str, min: f64, max: f64) -> f64 {
    min + seeded_float(seed, key) * (max - min)
}

/// Deterministic boolean that is true with probability `chance`.
pub fn seeded_chance(seed: &str, key: &str, chance: f64) -> bool {
    seeded_float(seed, key) < chance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(stable_hash32(""), 2_166_136_261);
        assert_eq!(stable_hash32("a"), 0xe40c_292c);
        assert_eq!(stable_hash32("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_hash_uses_utf16_units() {
        // A BMP character is one unit; the hash must differ from its UTF-8 bytes.
        let text = "南山";
        let utf8_hash = text.bytes().fold(FNV_OFFSET_BASIS, |h, b| {
            (h ^ u32::from(b)).wrapping_mul(FNV_PRIME)
        });
        assert_ne!(stable_hash32(text), utf8_hash);
        assert_eq!(stable_hash32(text), stable_hash32("南山"));
    }

    #[test]
    fn test_seeded_float_in_unit_range() {
        for i in 0..200 {
            let f = seeded_float("seed", &format!("k{i}"));
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn test_seeded_pick() {
        let empty: [u8; 0] = [];
        assert_eq!(seeded_pick("s", "k", &empty), None);
        let list = ["a", "b", "c"];
        let first = seeded_pick("s", "k", &list);
        assert!(first.is_some());
        assert_eq!(first, seeded_pick("s", "k", &list));
    }

    #[test]
    fn test_seeded_range_bounds() {
        for i in 0..100 {
            let v = seeded_range("seed", &i.to_string(), 0.88, 1.12);
            assert!((0.88..1.12).contains(&v));
        }
    }
}
