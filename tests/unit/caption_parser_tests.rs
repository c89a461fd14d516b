/*!
 * Tests for caption payload decoding
 */

use vocabclip::caption_parser::{Chunk, ChunkParser};
use vocabclip::errors::CaptionError;
use vocabclip::sentence_window::WindowFinder;

use crate::common;

/// Decoded chunks feed straight into window extraction
#[test]
fn test_parse_withRealisticPayload_shouldProduceSearchableChunks() {
    let payload = common::json3_payload(&[
        ("[Music]", 0, 4000),
        ("so today we are\nlooking at", 4000, 2500),
        ("the old lighthouse.", 6500, 2000),
        ("[Applause]", 8500, 1500),
        ("It was built in 1890.", 10000, 3000),
    ]);

    let chunks = ChunkParser::parse(&payload).unwrap();

    assert_eq!(
        chunks,
        vec![
            Chunk::new("so today we are looking at", 4.0, 6.5),
            Chunk::new("the old lighthouse.", 6.5, 8.5),
            Chunk::new("It was built in 1890.", 10.0, 13.0),
        ]
    );

    let window = WindowFinder::new(6, 15.0).find(&chunks, "lighthouse").unwrap();
    // the hit chunk closes a sentence, the following one is still taken in
    assert_eq!(
        window.sentence,
        "so today we are looking at the old lighthouse. It was built in 1890."
    );
    assert_eq!(window.start, 3.5);
    assert_eq!(window.end, 13.5);
}

#[test]
fn test_parse_withOnlyAnnotations_shouldBeEmptyNotError() {
    let payload = common::json3_payload(&[("[Music]", 0, 1000), ("[ Laughter ]", 1000, 1000)]);

    let chunks = ChunkParser::parse(&payload).unwrap();

    assert!(chunks.is_empty());
}

#[test]
fn test_parse_withHtmlErrorPage_shouldFailMalformed() {
    let result = ChunkParser::parse("<html><body>Too Many Requests</body></html>");

    assert!(matches!(result, Err(CaptionError::MalformedPayload(_))));
}
