//! Property-based tests for the detection pipeline.
//!
//! Run detectors over a wide range of inputs and check invariants that
//! must hold for every one of them rather than specific expected outputs.

use piiredact::domain::similarity::{partial_ratio, ratio};
use piiredact::domain::{DenyList, DenyListFilter, KeywordMatcher, OverlapResolver};
use piiredact::{Category, DetectionSource, HybridDetector, MatchMode, Span};

fn sample_texts() -> Vec<String> {
    vec![
        String::new(),
        "a".to_string(),
        "Father Name  KISHOR KUMAR".to_string(),
        "Name as in Aadhaar   MANAS S".to_string(),
        "College District     DAKSHINA KANNADA".to_string(),
        "Aadhaar 1234 5678 9012 PAN ABCDE1234F".to_string(),
        "mail ravi@example.com or call +91 9876543210".to_string(),
        "name name name name".to_string(),
        "Student ID 21220755937\nFather Name: RAMESH\n".to_string(),
        "ÄÖÜ Näme: Jürgen Müller".to_string(),
        "🔢📱☎️ Name: 😀".to_string(),
        "\n\r\t".to_string(),
        " ".repeat(500),
        "Name: ".repeat(100),
        "x".repeat(2000),
    ]
}

mod overlap_properties {
    use super::*;

    fn span(text: &str, start: usize, end: usize, confidence: f64) -> Span {
        Span::from_range(text, start, end, Category::Person, confidence, DetectionSource::Exact).unwrap()
    }

    #[test]
    fn test_resolved_spans_never_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        for seed in 0..50usize {
            let mut spans = Vec::new();
            for i in 0..12usize {
                let start = (seed * 7 + i * 5) % 20;
                let len = 1 + (seed + i * 3) % 6;
                let confidence = ((seed + i) % 10) as f64 / 10.0;
                spans.push(span(text, start, start + len, confidence));
            }

            let resolved = OverlapResolver::new().resolve(spans);
            for pair in resolved.windows(2) {
                assert!(pair[0].end <= pair[1].start, "overlap in seed {}: {:?}", seed, pair);
            }
        }
    }

    #[test]
    fn test_detector_output_never_overlaps() {
        let detector = HybridDetector::with_pattern_recognizer();
        let keywords = vec!["name".to_string(), "KUMAR".to_string(), "1234".to_string()];

        for text in sample_texts() {
            for mode in [MatchMode::Exact, MatchMode::Fuzzy, MatchMode::Regex] {
                let spans = detector.detect(&text, Some(&keywords), mode, 80, None);
                for pair in spans.windows(2) {
                    assert!(!pair[0].overlaps(&pair[1]), "overlap for {:?}: {:?}", text, pair);
                }
                for s in &spans {
                    assert_eq!(&text[s.start..s.end], s.text);
                }
            }
        }
    }
}

mod deny_properties {
    use super::*;

    #[test]
    fn test_no_accepted_span_is_deny_listed() {
        let detector = HybridDetector::with_pattern_recognizer();
        let deny = DenyList::standard();
        let keywords: Vec<String> = ["name", "college", "district", "KUMAR", "id"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        for text in sample_texts() {
            let spans = detector.detect(&text, Some(&keywords), MatchMode::Exact, 85, None);
            for s in spans {
                assert!(
                    !deny.contains(&s.text.trim().to_lowercase()),
                    "deny-listed span '{}' accepted from {:?}",
                    s.text,
                    text
                );
            }
        }
    }

    #[test]
    fn test_filter_is_idempotent() {
        let text = "Name College RAVI district KUMAR";
        let filter = DenyListFilter::new(DenyList::standard());
        let spans: Vec<Span> = text
            .match_indices(|c: char| c.is_alphabetic())
            .filter_map(|(i, _)| {
                let end = text[i..].find(' ').map_or(text.len(), |e| i + e);
                Span::from_range(text, i, end, Category::Person, 0.9, DetectionSource::Exact)
            })
            .collect();

        let once = filter.filter(spans);
        let twice = filter.filter(once.clone());
        assert_eq!(once, twice);
    }
}

mod keyword_properties {
    use super::*;

    #[test]
    fn test_exact_is_case_insensitive() {
        let matcher = KeywordMatcher::new();
        for (text, keyword) in [
            ("RAVI kumar", "ravi"),
            ("ravi KUMAR", "Kumar"),
            ("Straße Müller", "MÜLLER"),
        ] {
            let upper = matcher.exact(text, &[keyword.to_uppercase()]);
            let lower = matcher.exact(text, &[keyword.to_lowercase()]);
            assert_eq!(upper.len(), 1, "{} in {}", keyword, text);
            assert_eq!(
                upper.iter().map(|s| (s.start, s.end)).collect::<Vec<_>>(),
                lower.iter().map(|s| (s.start, s.end)).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_exact_is_idempotent() {
        let matcher = KeywordMatcher::new();
        let keywords = vec!["ana".to_string(), "an".to_string()];
        for text in sample_texts() {
            let first = matcher.exact(&text, &keywords);
            let second = matcher.exact(&text, &keywords);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_fuzzy_is_threshold_monotonic() {
        let matcher = KeywordMatcher::new();
        let keywords = vec!["KISHOR".to_string(), "J0HN".to_string(), "kannada".to_string()];
        let text = "Father Name  KISH0R KUMAR, JOHN, DAKSHINA KANNDA";

        let mut previous = usize::MAX;
        for threshold in (0..=100).step_by(5) {
            let count = matcher.fuzzy(text, &keywords, threshold).len();
            assert!(count <= previous, "more matches at {} than below it", threshold);
            previous = count;
        }
    }

    #[test]
    fn test_similarity_bounds_and_symmetry() {
        let words = ["", "a", "JOHN", "J0HN", "kumar", "KUMARI", "Ⅻ", "ß"];
        for a in words {
            for b in words {
                let r = ratio(a, b);
                assert!((0.0..=100.0).contains(&r));
                assert_eq!(r, ratio(b, a));
                assert!((0.0..=100.0).contains(&partial_ratio(a, b)));
            }
        }
    }
}
