//! String similarity scores used by the fuzzy matching paths.
//!
//! Scores are on a 0–100 scale. The distance is a Levenshtein distance over
//! lowercased chars where substituting one OCR-confusable glyph for its twin
//! (`0`/`o`, `1`/`l`, `5`/`s`, ...) costs half an edit, so `J0HN` stays
//! close to `JOHN` without being identical to it.

/// Glyph pairs OCR engines routinely confuse (lowercase).
const CONFUSABLE: &[(char, char)] = &[
    ('0', 'o'),
    ('1', 'l'),
    ('1', 'i'),
    ('l', 'i'),
    ('5', 's'),
    ('8', 'b'),
    ('2', 'z'),
    ('6', 'g'),
];

const CONFUSABLE_COST: f64 = 0.5;

fn substitution_cost(a: char, b: char) -> f64 {
    if a == b {
        0.0
    } else if CONFUSABLE
        .iter()
        .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    {
        CONFUSABLE_COST
    } else {
        1.0
    }
}

fn lowercase_chars(s: &str) -> Vec<char> {
    s.chars().flat_map(char::to_lowercase).collect()
}

fn weighted_distance(a: &[char], b: &[char]) -> f64 {
    let mut prev: Vec<f64> = (0..=b.len()).map(|j| j as f64).collect();
    let mut curr = vec![0.0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = (i + 1) as f64;
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = (prev[j + 1] + 1.0)
                .min(curr[j] + 1.0)
                .min(prev[j] + substitution_cost(ca, cb));
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    100.0 * (1.0 - weighted_distance(a, b) / longest as f64)
}

/// Whole-string similarity, case-insensitive.
pub fn ratio(a: &str, b: &str) -> f64 {
    ratio_chars(&lowercase_chars(a), &lowercase_chars(b))
}

/// Best [`ratio`] of the shorter string against every window of the
/// longer one with the same char length.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a = lowercase_chars(a);
    let b = lowercase_chars(b);
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    long.windows(short.len())
        .map(|window| ratio_chars(short, window))
        .fold(0.0, f64::max)
}
