/*!
 * Tests for window extraction over generated transcripts
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vocabclip::caption_parser::Chunk;
use vocabclip::sentence_window::{contains_whole_word, WindowFinder, SPAN_TOLERANCE};

use crate::common;

const FILLER: [&str; 8] = ["so", "then we", "look at", "the big", "over there", "and", "maybe", "quite"];
const TERMINALS: [&str; 5] = ["", "", ".", "?", "!"];

/// Random transcript with `target` spoken in one chunk
fn generate_transcript(rng: &mut StdRng, target: &str) -> Vec<Chunk> {
    let count = rng.random_range(1..40);
    let hit = rng.random_range(0..count);
    let mut clock = rng.random_range(0.0..30.0);

    (0..count)
        .map(|i| {
            let start = clock;
            let end = start + rng.random_range(0.2..6.0);
            clock = end + rng.random_range(0.0..1.5);
            let filler = FILLER[rng.random_range(0..FILLER.len())];
            let terminal = TERMINALS[rng.random_range(0..TERMINALS.len())];
            let text = if i == hit {
                format!("{} {}{}", filler, target, terminal)
            } else {
                format!("{}{}", filler, terminal)
            };
            Chunk::new(text, start, end)
        })
        .collect()
}

#[test]
fn test_find_withGeneratedTranscripts_shouldKeepWindowBounded() {
    common::init_logging();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..500 {
        let chunks = generate_transcript(&mut rng, "lantern");
        let max_duration = rng.random_range(1.0..30.0);
        let finder = WindowFinder::new(rng.random_range(0..8), max_duration);

        let window = finder
            .find(&chunks, "lantern")
            .unwrap_or_else(|| panic!("round {}: word is present", round));

        assert!(window.start >= 0.0, "round {}: negative start {}", round, window.start);
        assert!(window.start < window.end, "round {}: empty window {:?}", round, window);
        assert!(
            window.duration() <= max_duration + SPAN_TOLERANCE,
            "round {}: span {} exceeds {}",
            round,
            window.duration(),
            max_duration
        );
        assert!(contains_whole_word(&window.sentence, "lantern"), "round {}: sentence lost the word", round);
    }
}

#[test]
fn test_find_withGeneratedTranscripts_shouldBeIdempotent() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..100 {
        let chunks = generate_transcript(&mut rng, "harbor");
        let finder = WindowFinder::new(6, 15.0);

        assert_eq!(finder.find(&chunks, "harbor"), finder.find(&chunks, "harbor"));
    }
}

#[test]
fn test_find_withAbsentWord_shouldReturnNone() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..100 {
        let chunks = generate_transcript(&mut rng, "harbor");
        let finder = WindowFinder::new(6, 15.0);

        assert!(finder.find(&chunks, "lantern").is_none());
        // "arbor" only occurs inside "harbor"
        assert!(finder.find(&chunks, "arbor").is_none());
    }
}

#[test]
fn test_find_withSampleTranscript_shouldStopAtSentenceBoundaries() {
    let chunks = common::sample_chunks();
    let finder = WindowFinder::new(6, 15.0);

    let river = finder.find(&chunks, "river").unwrap();
    assert_eq!(river.sentence, "We walked down to the river bank.");
    assert_eq!(river.start, 13.5);
    assert_eq!(river.end, 19.0);

    let apple = finder.find(&chunks, "Apple").unwrap();
    assert_eq!(apple.sentence, "I saw an apple today. It was red.");
}

#[test]
fn test_find_withHitInFirstAndLastChunk_shouldHaltAtEdges() {
    let chunks = vec![
        Chunk::new("lantern light", 0.0, 1.0),
        Chunk::new("in the", 1.0, 2.0),
        Chunk::new("dark harbor", 2.0, 3.0),
    ];
    let finder = WindowFinder::new(6, 15.0);

    let first = finder.find(&chunks, "lantern").unwrap();
    assert_eq!(first.start, 0.0);
    assert_eq!(first.sentence, "lantern light in the dark harbor");

    let last = finder.find(&chunks, "harbor").unwrap();
    assert_eq!(last.end, 3.5);
    assert_eq!(last.sentence, "lantern light in the dark harbor");
}
