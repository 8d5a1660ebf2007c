//! HTML entity escaping for `{{name}}` output

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which quote characters are escaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// Double quotes only
    #[default]
    Compat,
    /// Double and single quotes
    Quotes,
    /// Neither
    NoQuotes,
}

/// Target document type; decides how a single quote is spelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Doctype {
    #[default]
    Html401,
    Xml1,
    Xhtml,
    Html5,
}

/// Entity escaping flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityFlags {
    pub quotes: QuoteStyle,
    pub doctype: Doctype,
}

impl EntityFlags {
    pub fn new(quotes: QuoteStyle, doctype: Doctype) -> Self {
        Self { quotes, doctype }
    }

    /// Stable numeric encoding, used in template fingerprints
    pub fn bits(&self) -> u32 {
        let quotes = match self.quotes {
            QuoteStyle::NoQuotes => 0,
            QuoteStyle::Compat => 2,
            QuoteStyle::Quotes => 3,
        };
        let doctype = match self.doctype {
            Doctype::Html401 => 0,
            Doctype::Xml1 => 16,
            Doctype::Xhtml => 32,
            Doctype::Html5 => 48,
        };
        quotes | doctype
    }

    fn single_quote(&self) -> &'static str {
        match self.doctype {
            Doctype::Html401 => "&#039;",
            _ => "&apos;",
        }
    }
}

/// Character sets accepted for escaping
const CHARSETS: &[&str] = &[
    "UTF-8",
    "ISO-8859-1",
    "ISO-8859-5",
    "ISO-8859-15",
    "CP866",
    "CP1251",
    "CP1252",
    "KOI8-R",
    "BIG5",
    "GB2312",
    "BIG5-HKSCS",
    "SHIFT_JIS",
    "EUC-JP",
    "MACROMAN",
];

/// Validate a charset label, returning its canonical spelling
pub fn canonical_charset(label: &str) -> Result<String> {
    let upper = label.trim().to_ascii_uppercase();
    let upper = match upper.as_str() {
        "UTF8" => "UTF-8".to_string(),
        "LATIN1" | "ISO8859-1" => "ISO-8859-1".to_string(),
        "WINDOWS-1252" | "1252" => "CP1252".to_string(),
        "WINDOWS-1251" | "WIN-1251" | "1251" => "CP1251".to_string(),
        "SJIS" => "SHIFT_JIS".to_string(),
        _ => upper,
    };
    if CHARSETS.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(Error::invalid_argument(format!("unsupported charset `{}`", label)))
    }
}

/// Escape `&`, `<`, `>` and quotes as `flags` require
pub fn escape_html(input: &str, flags: &EntityFlags) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if flags.quotes != QuoteStyle::NoQuotes => out.push_str("&quot;"),
            '\'' if flags.quotes == QuoteStyle::Quotes => out.push_str(flags.single_quote()),
            _ => out.push(c),
        }
    }
    out
}

pub type EscapeFn = dyn Fn(&str) -> String + Send + Sync;

/// How escaped variable output is transformed
#[derive(Clone, Default)]
pub enum Escaper {
    /// Built-in HTML entity escaping
    #[default]
    Html,
    /// Output as-is
    Raw,
    /// Host-supplied function
    Custom(Arc<EscapeFn>),
}

impl Escaper {
    pub fn custom(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Escaper::Custom(Arc::new(f))
    }

    /// Escaper by configuration name: `html`, `none` or `raw`
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "html" => Ok(Escaper::Html),
            "none" | "raw" => Ok(Escaper::Raw),
            other => Err(Error::invalid_argument(format!(
                "unknown escape mode `{}`",
                other
            ))),
        }
    }

    /// Label mixed into template fingerprints
    pub fn label(&self) -> &'static str {
        match self {
            Escaper::Html => "default",
            Escaper::Raw => "none",
            Escaper::Custom(_) => "custom",
        }
    }

    pub fn escape(&self, input: &str, flags: &EntityFlags) -> String {
        match self {
            Escaper::Html => escape_html(input, flags),
            Escaper::Raw => input.to_string(),
            Escaper::Custom(f) => f(input),
        }
    }
}

impl fmt::Debug for Escaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Escaper({})", self.label())
    }
}
