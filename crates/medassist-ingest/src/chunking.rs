//! Overlapping, boundary-seeking text chunking.
//!
//! Cuts prefer a sentence end (`". "`), then a word boundary, then the raw
//! character position. All lengths and offsets count characters, not bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::ExtractedText;
use medassist_core::{Error, NoopObserver, ProgressEvent, ProgressObserver, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// How far past the nominal end a sentence boundary may be taken.
pub const SENTENCE_LOOKAHEAD: usize = 100;
/// How far past the nominal end a word boundary may be taken.
pub const WORD_LOOKAHEAD: usize = 20;

/// Validated chunking parameters: `chunk_size > 0` and `overlap < chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkingConfig")]
pub struct ChunkingConfig {
    #[serde(rename = "chunkSize")]
    chunk_size: usize,
    overlap: usize,
}

#[derive(Deserialize)]
struct RawChunkingConfig {
    #[serde(default = "default_chunk_size", rename = "chunkSize", alias = "chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_overlap")]
    overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl TryFrom<RawChunkingConfig> for ChunkingConfig {
    type Error = Error;

    fn try_from(raw: RawChunkingConfig) -> Result<Self> {
        Self::new(raw.chunk_size, raw.overlap)
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkingConfig(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidChunkingConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Nominal cursor advance between chunks; always at least 1.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A slice of the normalized source, `text == source[start_char..end_char]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    #[serde(rename = "startChar")]
    pub start_char: usize,
    #[serde(rename = "endChar")]
    pub end_char: usize,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end_char - self.start_char
    }
}

/// Splits normalized text into overlapping chunks.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunk(&self, text: &ExtractedText) -> Vec<Chunk> {
        self.chunk_with(text, &NoopObserver)
    }

    /// Same as [`Chunker::chunk`], reporting start/finish to `observer`.
    pub fn chunk_with(&self, text: &ExtractedText, observer: &dyn ProgressObserver) -> Vec<Chunk> {
        let source = CharIndexed::new(text.as_str());
        observer.on_event(&ProgressEvent::ChunkingStarted { chars: source.len() });

        let chunks = self.split(&source);

        debug!(
            "Chunked {} chars into {} chunks (size={}, overlap={})",
            source.len(),
            chunks.len(),
            self.config.chunk_size,
            self.config.overlap
        );
        observer.on_event(&ProgressEvent::ChunkingFinished { chunks: chunks.len() });
        chunks
    }

    fn split(&self, source: &CharIndexed<'_>) -> Vec<Chunk> {
        let len = source.len();

        if len <= self.config.chunk_size {
            return vec![Chunk {
                index: 0,
                text: source.text.to_string(),
                start_char: 0,
                end_char: len,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let nominal_end = start + self.config.chunk_size;
            let end = if nominal_end >= len {
                len
            } else {
                self.find_cut(source, start, nominal_end)
            };

            if let Some(chunk) = source.trimmed(start, end, chunks.len()) {
                chunks.push(chunk);
            }
            if end == len {
                break;
            }

            // Fixed step, clamped so an early cut never drops characters.
            start = (start + self.config.step()).min(end);
            while start < len && source.is_space(start) {
                start += 1;
            }
        }

        chunks
    }

    /// Cut position for a chunk starting at `start` with nominal end `nominal_end < len`.
    fn find_cut(&self, source: &CharIndexed<'_>, start: usize, nominal_end: usize) -> usize {
        let len = source.len();
        let floor = start + self.config.chunk_size / 2;

        let sentence_window = (nominal_end + SENTENCE_LOOKAHEAD).min(len);
        if let Some(pos) = source.rfind(". ", start, sentence_window) {
            if pos > floor {
                return pos + 2;
            }
        }

        let word_window = (nominal_end + WORD_LOOKAHEAD).min(len);
        if let Some(pos) = source.rfind(" ", floor, word_window) {
            return pos + 1;
        }

        nominal_end.min(len)
    }
}

/// Normalize `raw` and chunk it in one step.
pub fn chunk_text(raw: &str, config: ChunkingConfig) -> Vec<Chunk> {
    Chunker::new(config).chunk(&ExtractedText::new(raw))
}

/// A string with a char-index → byte-offset table.
struct CharIndexed<'a> {
    text: &'a str,
    /// Byte offset of each char, plus a final entry for `text.len()`.
    offsets: Vec<usize>,
}

impl<'a> CharIndexed<'a> {
    fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Self { text, offsets }
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    fn is_space(&self, index: usize) -> bool {
        self.slice(index, index + 1).starts_with(char::is_whitespace)
    }

    fn char_at_byte(&self, byte: usize) -> usize {
        self.offsets.partition_point(|&o| o < byte)
    }

    /// Last char index in `[lo, hi)` where `needle` starts and fully fits.
    fn rfind(&self, needle: &str, lo: usize, hi: usize) -> Option<usize> {
        if lo >= hi {
            return None;
        }
        let found = self.slice(lo, hi).rfind(needle)?;
        Some(self.char_at_byte(self.offsets[lo] + found))
    }

    fn trimmed(&self, start: usize, end: usize, index: usize) -> Option<Chunk> {
        let raw = self.slice(start, end);
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        let leading = raw.len() - raw.trim_start().len();
        let start_char = self.char_at_byte(self.offsets[start] + leading);
        Some(Chunk {
            index,
            text: text.to_string(),
            start_char,
            end_char: start_char + text.chars().count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn config(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(size, overlap).unwrap()
    }

    fn span(chars: &[char], chunk: &Chunk) -> String {
        chars[chunk.start_char..chunk.end_char].iter().collect()
    }

    /// Deterministic pseudo-random prose with sentence ends and accents.
    fn synthetic_text(words: usize, seed: u64) -> String {
        const VOCAB: &[&str] = &[
            "patient", "fièvre", "tension", "dose", "mg", "antécédents", "examen",
            "traitement", "a", "le", "été", "contrôle", "biologique", "normal",
        ];
        let mut state = seed;
        let mut out = Vec::with_capacity(words);
        for _ in 0..words {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let word = VOCAB[(state >> 33) as usize % VOCAB.len()];
            if (state >> 20) % 9 == 0 {
                out.push(format!("{}.", word));
            } else {
                out.push(word.to_string());
            }
        }
        out.join(" ")
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start_char, chunks[0].end_char), (0, 13));
    }

    #[test]
    fn test_short_text_is_normalized() {
        let chunks = chunk_text("  Hello,\n\n world!  ", config(50, 10));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_text_exactly_chunk_size() {
        let text = "x".repeat(40);
        let chunks = chunk_text(&text, config(40, 5));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_empty_input_yields_one_empty_chunk() {
        let chunks = chunk_text("", ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        let chunks = chunk_text(" \n ", config(5, 0));
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(matches!(ChunkingConfig::new(0, 0), Err(Error::InvalidChunkingConfig(_))));
        assert!(matches!(ChunkingConfig::new(10, 10), Err(Error::InvalidChunkingConfig(_))));
        assert!(matches!(ChunkingConfig::new(10, 25), Err(Error::InvalidChunkingConfig(_))));
        assert_eq!(config(10, 9).step(), 1);
    }

    #[test]
    fn test_config_deserialization_validates() {
        let ok: ChunkingConfig = serde_json::from_str(r#"{"chunkSize": 500, "overlap": 50}"#).unwrap();
        assert_eq!((ok.chunk_size(), ok.overlap()), (500, 50));

        let defaults: ChunkingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, ChunkingConfig::default());

        let bad = serde_json::from_str::<ChunkingConfig>(r#"{"chunkSize": 100, "overlap": 100}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_tiny_text_with_windows_past_end() {
        let text = "A. B. C. D.";
        let chunks = chunk_text(text, config(6, 2));
        let chars: Vec<char> = text.chars().collect();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["A. B. C.", ". C.", "D."]);
        for chunk in &chunks {
            assert_eq!(span(&chars, chunk), chunk.text);
        }
    }

    #[test]
    fn test_cuts_land_on_sentence_ends() {
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < 2000 {
            text.push_str(&format!(
                "Sentence {:03} records the vitals, the dosage and the follow-up plan. ",
                i
            ));
            i += 1;
        }
        let source = normalize(&text);
        let chars: Vec<char> = source.chars().collect();

        let chunks = chunk_text(&text, ChunkingConfig::default());
        assert!(chunks.len() >= 2);

        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.ends_with('.'), "cut mid-sentence: {:?}", chunk.text);
            assert_eq!(chars[chunk.end_char], ' ');
            assert!(chunk.char_len() > 500 && chunk.char_len() <= 1000 + SENTENCE_LOOKAHEAD + 1);
        }
        assert!((900..=1100).contains(&chunks[0].end_char));
    }

    #[test]
    fn test_cursor_advances_by_fixed_step() {
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < 2000 {
            text.push_str(&format!(
                "Sentence {:03} records the vitals, the dosage and the follow-up plan. ",
                i
            ));
            i += 1;
        }

        let chunks = chunk_text(&text, ChunkingConfig::default());
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_char).collect();
        // The cursor lands on 1600, a space, so the third chunk starts one later.
        assert_eq!(starts, vec![0, 800, 1601]);
        let ends: Vec<usize> = chunks.iter().map(|c| c.end_char).collect();
        assert_eq!(ends, vec![1087, 1835, normalize(&text).chars().count()]);
    }

    #[test]
    fn test_falls_back_to_word_boundary() {
        // No sentence ends at all.
        let text = "word ".repeat(60);
        let chunks = chunk_text(&text, config(50, 10));
        for chunk in &chunks {
            assert!(!chunk.text.starts_with(' ') && !chunk.text.ends_with(' '));
            assert!(chunk.text.split(' ').all(|w| w == "word" || w.is_empty() || "word".ends_with(w)));
        }
        assert!(chunks[0].text.split(' ').all(|w| w == "word"));
    }

    #[test]
    fn test_raw_cut_without_any_boundary() {
        let text = "x".repeat(25);
        let chunks = chunk_text(&text, config(10, 2));
        assert_eq!(chunks[0].char_len(), 10);
        assert_eq!(chunks.last().unwrap().end_char, 25);
    }

    #[test]
    fn test_zero_overlap_is_contiguous() {
        // Raw cuts land on the nominal end, so nothing is read twice.
        let text = "x".repeat(230);
        let chunks = chunk_text(&text, config(50, 0));
        assert_eq!(chunks.len(), 5);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_char, pair[0].end_char);
        }
    }

    #[test]
    fn test_zero_overlap_rereads_only_sentence_runoff() {
        let text = synthetic_text(400, 7);
        let chunks = chunk_text(&text, config(120, 0));
        for pair in chunks.windows(2) {
            let reread = pair[0].end_char.saturating_sub(pair[1].start_char);
            assert!(reread <= SENTENCE_LOOKAHEAD + 1, "reread {} chars", reread);
            assert!(pair[1].start_char >= pair[0].start_char + 120 || pair[1].start_char >= pair[0].end_char);
        }
    }

    #[test]
    fn test_coverage_and_order_across_configs() {
        let text = synthetic_text(600, 42);
        let source = normalize(&text);
        let chars: Vec<char> = source.chars().collect();

        for (size, overlap) in [(1, 0), (7, 3), (50, 0), (50, 10), (50, 49), (300, 120), (1000, 200)] {
            let chunks = chunk_text(&text, config(size, overlap));
            let mut covered = vec![false; chars.len()];

            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
                assert!(!chunk.text.is_empty());
                assert_eq!(span(&chars, chunk), chunk.text);
                for c in &mut covered[chunk.start_char..chunk.end_char] {
                    *c = true;
                }
            }
            for pair in chunks.windows(2) {
                assert!(pair[1].start_char > pair[0].start_char, "size={} overlap={}", size, overlap);
            }
            for (pos, ch) in chars.iter().enumerate() {
                assert!(covered[pos] || *ch == ' ', "char {} lost (size={} overlap={})", pos, size, overlap);
            }
        }
    }

    #[test]
    fn test_heavy_overlap_terminates() {
        let text = synthetic_text(300, 3);
        let chunks = chunk_text(&text, config(40, 39));
        assert!(!chunks.is_empty());
        assert_eq!(chunks.last().unwrap().end_char, normalize(&text).chars().count());
    }

    #[test]
    fn test_observer_does_not_change_output() {
        let text = ExtractedText::new(&synthetic_text(200, 11));
        let chunker = Chunker::new(config(100, 20));
        let events = std::sync::Mutex::new(Vec::new());
        let observer = |e: &ProgressEvent| events.lock().unwrap().push(e.clone());

        let observed = chunker.chunk_with(&text, &observer);
        assert_eq!(observed, chunker.chunk(&text));

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ProgressEvent::ChunkingFinished { chunks: observed.len() });
    }
}
