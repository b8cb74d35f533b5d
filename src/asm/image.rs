//! Binary image format for LC-3 programs.
//!
//! An image is plain text:
//! - Every word is written as 16 binary digits (`0`/`1`)
//! - The first word is the start address
//! - Each following word is loaded at consecutive addresses from the start
//! - Words are separated by any whitespace, usually one per line
//! - Text after `;` on a line is a comment

use crate::word::{Address, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Digits in one encoded word.
pub const WORD_DIGITS: usize = 16;

/// A loadable program: a start address and the words placed from there on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Load address of the first word, and the initial PC.
    pub start: Address,
    /// Program words.
    pub words: Vec<Value>,
}

impl Image {
    /// Create an empty image loading at `start`.
    pub fn new(start: Address) -> Self {
        Self {
            start,
            words: Vec::new(),
        }
    }

    /// Append a word.
    pub fn push(&mut self, word: Value) {
        self.words.push(word);
    }

    /// Get the number of program words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if the image has no program words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Address of the `index`th word, wrapping at the top of memory.
    pub fn address_of(&self, index: usize) -> Address {
        self.start.wrapping_add(index as i16)
    }

    /// Render as image text: the start address, then one word per line.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((self.words.len() + 1) * (WORD_DIGITS + 1));
        for word in std::iter::once(self.start).chain(self.words.iter().copied()) {
            out.push_str(&format_word(word));
            out.push('\n');
        }
        out
    }
}

/// Format a word as 16 binary digits.
pub fn format_word(word: Value) -> String {
    format!("{:016b}", word as u16)
}

/// Parse one 16-digit binary word.
pub fn parse_word(token: &str) -> Result<Value, String> {
    if token.len() != WORD_DIGITS {
        return Err(format!("expected {} binary digits, found {}", WORD_DIGITS, token.chars().count()));
    }
    if let Some(bad) = token.chars().find(|c| !matches!(c, '0' | '1')) {
        return Err(format!("invalid binary digit {:?}", bad));
    }
    u16::from_str_radix(token, 2)
        .map(|w| w as Value)
        .map_err(|e| e.to_string())
}

/// Parse image text.
pub fn parse_image(text: &str) -> Result<Image, ImageError> {
    read_image(text.as_bytes())
}

/// Read image text from any reader.
pub fn read_image<R: Read>(reader: R) -> Result<Image, ImageError> {
    let reader = BufReader::new(reader);
    let mut image: Option<Image> = None;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let code = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line.as_str(),
        };

        for token in code.split_whitespace() {
            let word = parse_word(token).map_err(|reason| ImageError::Malformed {
                line: line_num + 1,
                token: token.to_string(),
                reason,
            })?;

            match image.as_mut() {
                Some(image) => image.push(word),
                None => image = Some(Image::new(word)),
            }
        }
    }

    image.ok_or(ImageError::Empty)
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageError> {
    let file = std::fs::File::open(path.as_ref())?;
    read_image(file)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())?;
    file.write_all(image.to_text().as_bytes())?;
    Ok(())
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed word {token:?} on line {line}: {reason}")]
    Malformed { line: usize, token: String, reason: String },

    #[error("image is empty: missing start address")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_halt_image() {
        let image = parse_image("0011000000000000\n1111000000100101\n").unwrap();
        assert_eq!(image.start, 0x3000);
        assert_eq!(image.words, vec![0xF025u16 as Value]);
    }

    #[test]
    fn test_parse_start_only() {
        let image = parse_image("0000000000000000").unwrap();
        assert_eq!(image.start, 0);
        assert!(image.is_empty());
    }

    #[test]
    fn test_parse_ignores_blank_lines_and_comments() {
        let text = "\n; program\n0011000000000000 ; origin\n\n   1111000000100101\n";
        let image = parse_image(text).unwrap();
        assert_eq!(image.start, 0x3000);
        assert_eq!(image.len(), 1);
    }

    #[test]
    fn test_parse_whitespace_separated_words() {
        let image = parse_image("0000000000000000 0000000000000001\t0000000000000010").unwrap();
        assert_eq!(image.words, vec![1, 2]);
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(parse_image(""), Err(ImageError::Empty)));
        assert!(matches!(parse_image("; nothing\n\n"), Err(ImageError::Empty)));
    }

    #[test]
    fn test_parse_wrong_length() {
        let err = parse_image("0011000000000000\n111100000010010\n").unwrap_err();
        match err {
            ImageError::Malformed { line, token, .. } => {
                assert_eq!(line, 2);
                assert_eq!(token, "111100000010010");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_bad_digit() {
        let err = parse_image("00110000000000002\n").unwrap_err();
        assert!(matches!(err, ImageError::Malformed { line: 1, .. }));

        let err = parse_image("001100000000000x\n").unwrap_err();
        assert!(err.to_string().contains("invalid binary digit"));
    }

    #[test]
    fn test_to_text() {
        let image = Image { start: 0x3000, words: vec![-1, 0] };
        assert_eq!(
            image.to_text(),
            "0011000000000000\n1111111111111111\n0000000000000000\n"
        );
        assert_eq!(parse_image(&image.to_text()).unwrap(), image);
    }

    #[test]
    fn test_address_of_wraps() {
        let image = Image { start: -1, words: vec![0, 0] };
        assert_eq!(image.address_of(0), -1);
        assert_eq!(image.address_of(1), 0);
    }
}
