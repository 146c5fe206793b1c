//! FITS header cards and keyword values.
//!
//! A header is a sequence of 80-byte ASCII cards padded to 2880-byte
//! blocks and terminated by an `END` card. Only fixed-format value cards
//! are interpreted; commentary cards are kept verbatim.

use std::fmt;

/// Bytes per header card.
pub const CARD_LEN: usize = 80;

/// Bytes per FITS logical block.
pub const BLOCK_LEN: usize = 2880;

/// Rounds `len` up to a whole number of blocks.
#[must_use]
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_LEN) * BLOCK_LEN
}

/// A keyword value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Numeric value as `f64` (integers are widened).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Integer(v) => Some(v as f64),
            Value::Real(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    fn format(&self) -> String {
        match self {
            Value::Logical(v) => format!("{:>20}", if *v { "T" } else { "F" }),
            Value::Integer(v) => format!("{v:>20}"),
            Value::Real(v) => format!("{:>20}", format!("{v:?}").to_uppercase()),
            Value::Text(v) => format!("'{:<8}'", v.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Logical(v) => write!(f, "{}", if *v { "T" } else { "F" }),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Logical(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Keyword name (up to 8 characters).
    pub keyword: String,
    /// Parsed value for `KEYWORD = value` cards.
    pub value: Option<Value>,
    /// Inline comment or commentary text.
    pub comment: Option<String>,
    raw: Option<String>,
}

impl Card {
    /// Creates a value card.
    #[must_use]
    pub fn new(keyword: &str, value: impl Into<Value>) -> Self {
        Self {
            keyword: keyword.to_ascii_uppercase(),
            value: Some(value.into()),
            comment: None,
            raw: None,
        }
    }

    /// The `END` card.
    #[must_use]
    pub fn end() -> Self {
        Self {
            keyword: "END".into(),
            value: None,
            comment: None,
            raw: None,
        }
    }

    /// Adds an inline comment.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self.raw = None;
        self
    }

    /// Parses one 80-byte card. Non-ASCII bytes are replaced with `?`.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let mut text: String = raw
            .iter()
            .take(CARD_LEN)
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect();
        while text.len() < CARD_LEN {
            text.push(' ');
        }

        let keyword = text[..8].trim_end().to_string();
        let (value, comment) = if &text[8..10] == "= " {
            parse_value(&text[10..])
        } else {
            let rest = text[8..].trim();
            (None, (!rest.is_empty()).then(|| rest.to_string()))
        };

        Self {
            keyword,
            value,
            comment,
            raw: Some(text),
        }
    }

    /// True for the header terminator.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.keyword == "END"
    }

    /// Replaces the value, keeping the comment.
    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
        self.raw = None;
    }

    /// Serializes the card. Untouched parsed cards are written verbatim;
    /// text beyond 80 columns is truncated.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CARD_LEN] {
        let text = self.raw.clone().unwrap_or_else(|| {
            let mut text = format!("{:<8}", self.keyword);
            match (&self.value, &self.comment) {
                (Some(value), comment) => {
                    text.push_str("= ");
                    text.push_str(&value.format());
                    if let Some(comment) = comment {
                        text.push_str(" / ");
                        text.push_str(comment);
                    }
                }
                (None, Some(comment)) => text.push_str(comment),
                (None, None) => {}
            }
            text
        });

        let mut bytes = [b' '; CARD_LEN];
        for (dst, src) in bytes.iter_mut().zip(text.bytes()) {
            *dst = src;
        }
        bytes
    }
}

/// Splits the value field (columns 11-80) into value and comment.
fn parse_value(field: &str) -> (Option<Value>, Option<String>) {
    let trimmed = field.trim_start();

    if let Some(body) = trimmed.strip_prefix('\'') {
        let mut text = String::new();
        let mut chars = body.char_indices().peekable();
        let mut rest = "";
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    text.push('\'');
                    chars.next();
                    continue;
                }
                rest = &body[i + 1..];
                break;
            }
            text.push(c);
        }
        let comment = rest
            .split_once('/')
            .map(|(_, c)| c.trim().to_string())
            .filter(|c| !c.is_empty());
        return (Some(Value::Text(text.trim_end().to_string())), comment);
    }

    let (raw_value, comment) = match trimmed.split_once('/') {
        Some((value, comment)) => (value.trim(), Some(comment.trim().to_string())),
        None => (trimmed.trim(), None),
    };
    let comment = comment.filter(|c| !c.is_empty());

    let value = match raw_value {
        "" => None,
        "T" => Some(Value::Logical(true)),
        "F" => Some(Value::Logical(false)),
        other => Some(
            other
                .parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| other.replace(['D', 'd'], "E").parse::<f64>().map(Value::Real))
                .unwrap_or_else(|_| Value::Text(other.to_string())),
        ),
    };
    (value, comment)
}

/// Parsed header of one HDU, without its `END` card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    /// Creates an empty header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a header from cards (an `END` card, if present, is dropped).
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self {
            cards: cards.into_iter().filter(|c| !c.is_end()).collect(),
        }
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Value of the first card named `keyword` (case-insensitive).
    #[must_use]
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.cards
            .iter()
            .find(|c| c.keyword.eq_ignore_ascii_case(keyword))
            .and_then(|c| c.value.as_ref())
    }

    /// Sets `keyword`, replacing the first existing card or appending one.
    pub fn set(&mut self, keyword: &str, value: impl Into<Value>) {
        let value = value.into();
        match self
            .cards
            .iter_mut()
            .find(|c| c.keyword.eq_ignore_ascii_case(keyword))
        {
            Some(card) => card.set_value(value),
            None => self.cards.push(Card::new(keyword, value)),
        }
    }

    /// Name of the extension, if any.
    #[must_use]
    pub fn extname(&self) -> Option<&str> {
        self.get("EXTNAME").and_then(Value::as_str)
    }

    /// Serializes the header with its `END` card, padded to whole blocks.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self
            .cards
            .iter()
            .chain(std::iter::once(&Card::end()))
            .flat_map(Card::to_bytes)
            .collect();
        bytes.resize(padded_len(bytes.len()), b' ');
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> Card {
        Card::parse(format!("{text:<80}").as_bytes())
    }

    #[test]
    fn test_parse_value_cards() {
        assert_eq!(card("SIMPLE  =                    T").value, Some(Value::Logical(true)));
        assert_eq!(
            card("NAXIS2  =                   12 / number of rows").value,
            Some(Value::Integer(12))
        );
        assert_eq!(
            card("EXPOSURE=        1.2345000E+03 / exposure time").value,
            Some(Value::Real(1234.5))
        );
        assert_eq!(card("TSTART  =   2.5D2").value, Some(Value::Real(250.0)));
    }

    #[test]
    fn test_parse_string_cards() {
        let parsed = card("BACKFILE= 'obs_back.pha'       / background file");
        assert_eq!(parsed.keyword, "BACKFILE");
        assert_eq!(parsed.value, Some(Value::Text("obs_back.pha".into())));
        assert_eq!(parsed.comment.as_deref(), Some("background file"));

        let quoted = card("OBSERVER= 'O''Brien  '");
        assert_eq!(quoted.value, Some(Value::Text("O'Brien".into())));

        let slash = card("RESPFILE= 'caldb/swxwt0to2s6_20131212v015.rmf'");
        assert_eq!(
            slash.value.as_ref().and_then(Value::as_str),
            Some("caldb/swxwt0to2s6_20131212v015.rmf")
        );
    }

    #[test]
    fn test_commentary_cards() {
        let history = card("HISTORY extractor 4.0");
        assert_eq!(history.value, None);
        assert_eq!(history.comment.as_deref(), Some("extractor 4.0"));
        assert!(card("END").is_end());
    }

    #[test]
    fn test_card_serialization() {
        let bytes = Card::new("BACKSCAL", 39.0).with_comment("area scaling").to_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(&text[..10], "BACKSCAL= ");
        assert_eq!(text[10..30].trim(), "39.0");
        assert_eq!(Card::parse(&bytes).value, Some(Value::Real(39.0)));

        let text_card = Card::new("EXTNAME", "GTI").to_bytes();
        assert_eq!(Card::parse(&text_card).value, Some(Value::Text("GTI".into())));
    }

    #[test]
    fn test_untouched_cards_are_verbatim() {
        let original = format!("{:<80}", "EXPOSURE= 1.0E3 / odd but legal spacing");
        let parsed = Card::parse(original.as_bytes());
        assert_eq!(parsed.to_bytes().as_slice(), original.as_bytes());
    }

    #[test]
    fn test_header_set_and_padding() {
        let mut header = Header::from_cards(vec![
            Card::new("XTENSION", "BINTABLE"),
            Card::new("BACKSCAL", 1.0),
        ]);
        header.set("backscal", 10.0);
        header.set("ANCRFILE", "obs_source.arf");

        assert_eq!(header.get("BACKSCAL"), Some(&Value::Real(10.0)));
        assert_eq!(header.get("ancrfile").and_then(Value::as_str), Some("obs_source.arf"));
        assert_eq!(header.cards().len(), 3);

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), BLOCK_LEN);
        assert!(bytes[3 * CARD_LEN..].starts_with(b"END     "));
    }
}
