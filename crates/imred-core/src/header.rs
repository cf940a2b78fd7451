use std::fmt;

/// Keywords describing array layout. They are regenerated on write and never
/// copied between headers.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "BZERO", "BSCALE", "PCOUNT", "GCOUNT",
    "LONGSTRN", "END",
];

/// Typed value of a header keyword.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Logical(bool),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for HeaderValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<usize> for HeaderValue {
    fn from(i: usize) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for HeaderValue {
    fn from(b: bool) -> Self {
        Self::Logical(b)
    }
}

/// Free-text header records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commentary {
    Comment,
    History,
}

impl Commentary {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Comment => "COMMENT",
            Self::History => "HISTORY",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "COMMENT" => Some(Self::Comment),
            "HISTORY" => Some(Self::History),
            _ => None,
        }
    }
}

/// One header record, in file order.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderRecord {
    Keyword {
        keyword: String,
        value: HeaderValue,
        comment: Option<String>,
    },
    Commentary { kind: Commentary, text: String },
}

impl HeaderRecord {
    /// Records that describe content rather than array layout.
    pub fn is_descriptive(&self) -> bool {
        match self {
            Self::Keyword { keyword, .. } => !is_structural(keyword),
            Self::Commentary { .. } => true,
        }
    }
}

/// Ordered primary-HDU header. Keywords are matched case-insensitively and
/// stored upper-case; commentary records keep their position and repeat.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    records: Vec<HeaderRecord>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        let keyword = keyword.to_ascii_uppercase();
        self.records.iter().find_map(|r| match r {
            HeaderRecord::Keyword { keyword: k, value, .. } if *k == keyword => Some(value),
            _ => None,
        })
    }

    /// String value, trimmed. Numeric values are rendered as text so that
    /// keys such as `CHIP` can be read either way.
    pub fn get_string(&self, keyword: &str) -> Option<String> {
        self.get(keyword).map(|v| v.to_string().trim().to_string())
    }

    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_float(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Insert or replace a keyword, keeping the original position on replace.
    pub fn set(&mut self, keyword: &str, value: impl Into<HeaderValue>) {
        self.set_with_comment(keyword, value, None);
    }

    pub fn set_with_comment(
        &mut self,
        keyword: &str,
        value: impl Into<HeaderValue>,
        comment: Option<&str>,
    ) {
        let keyword = keyword.to_ascii_uppercase();
        let record = HeaderRecord::Keyword {
            keyword: keyword.clone(),
            value: value.into(),
            comment: comment.map(str::to_string),
        };
        let existing = self.records.iter_mut().find(
            |r| matches!(r, HeaderRecord::Keyword { keyword: k, .. } if *k == keyword),
        );
        match existing {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    pub fn remove(&mut self, keyword: &str) -> Option<HeaderValue> {
        let keyword = keyword.to_ascii_uppercase();
        let idx = self.records.iter().position(
            |r| matches!(r, HeaderRecord::Keyword { keyword: k, .. } if *k == keyword),
        )?;
        match self.records.remove(idx) {
            HeaderRecord::Keyword { value, .. } => Some(value),
            HeaderRecord::Commentary { .. } => None,
        }
    }

    pub fn add_comment(&mut self, text: impl Into<String>) {
        self.push_commentary(Commentary::Comment, text);
    }

    pub fn add_history(&mut self, text: impl Into<String>) {
        self.push_commentary(Commentary::History, text);
    }

    fn push_commentary(&mut self, kind: Commentary, text: impl Into<String>) {
        self.records.push(HeaderRecord::Commentary {
            kind,
            text: text.into(),
        });
    }

    /// Append a record. Keywords replace an existing value; commentary
    /// records always append.
    pub fn push_record(&mut self, record: HeaderRecord) {
        match record {
            HeaderRecord::Keyword {
                keyword,
                value,
                comment,
            } => self.set_with_comment(&keyword, value, comment.as_deref()),
            commentary => self.records.push(commentary),
        }
    }

    /// Text of every commentary record of `kind`, in order.
    pub fn commentary(&self, kind: Commentary) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(move |r| match r {
            HeaderRecord::Commentary { kind: k, text } if *k == kind => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn records(&self) -> &[HeaderRecord] {
        &self.records
    }

    pub fn descriptive_records(&self) -> impl Iterator<Item = &HeaderRecord> {
        self.records.iter().filter(|r| r.is_descriptive())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut header = Header::new();
        header.set("object", "first");
        header.set("CHIP", 6i64);
        header.set("OBJECT", "second");
        assert_eq!(header.len(), 2);
        assert_eq!(header.get_string("Object").as_deref(), Some("second"));
        assert!(matches!(
            &header.records()[0],
            HeaderRecord::Keyword { keyword, .. } if keyword == "OBJECT"
        ));
    }

    #[test]
    fn test_commentary_repeats_and_keeps_order() {
        let mut header = Header::new();
        header.add_comment("first");
        header.set("CHIP", 2i64);
        header.add_history("bias subtracted");
        header.add_comment("second");

        let comments: Vec<_> = header.commentary(Commentary::Comment).collect();
        assert_eq!(comments, ["first", "second"]);
        assert_eq!(header.commentary(Commentary::History).count(), 1);
        assert_eq!(header.len(), 4);
        // Commentary is never a keyword lookup hit.
        assert!(!header.contains("COMMENT"));
    }

    #[test]
    fn test_numeric_accessors_accept_text() {
        let mut header = Header::new();
        header.set("CHIP", "6");
        header.set("EXPTIME", 30i64);
        assert_eq!(header.get_int("CHIP"), Some(6));
        assert_eq!(header.get_float("EXPTIME"), Some(30.0));
        assert_eq!(header.remove("chip"), Some(HeaderValue::Text("6".into())));
        assert!(!header.contains("CHIP"));
    }

    #[test]
    fn test_descriptive_records_skip_layout() {
        let mut header = Header::new();
        header.set("BITPIX", 16i64);
        header.set("NAXIS1", 8i64);
        header.set("LONGSTRN", "OGIP 1.0");
        header.set("SLITMASK", "LS1");
        header.add_history("raw");
        assert_eq!(header.descriptive_records().count(), 2);
    }

    #[test]
    fn test_structural_keywords() {
        assert!(is_structural("NAXIS2"));
        assert!(is_structural("BZERO"));
        assert!(!is_structural("NAXISX"));
        assert!(!is_structural("BINNING"));
    }
}
