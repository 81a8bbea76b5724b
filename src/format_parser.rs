use crate::error::{Error, Result};
use crate::loggable::ArgKind;

/// A conversion verb recognized by the scanner.
///
/// `d` and `i` are synonyms; both emit the argument's native integer width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// `%x` - integer, rendered as hex when the entry is printed.
    Hex,
    /// `%d` / `%i` - integer, rendered as decimal.
    Dec,
    /// `%c` - integer, rendered as a character.
    Char,
    /// `%s` - length-prefixed UTF-8 string.
    Str,
}

impl Verb {
    pub fn takes_string(self) -> bool {
        matches!(self, Verb::Str)
    }
}

/// The encoder choice for one argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgEncoder {
    /// Emit the N least-significant bytes of the widened value, LE.
    FixedBytes(usize),
    /// Emit a u16 LE length followed by the raw UTF-8 bytes.
    LengthPrefixedString,
}

/// Per-argument encoding plan, derived once when the handler is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgPlan {
    pub verb: Verb,
    pub kind: ArgKind,
    pub encoded_size: usize,
    pub encoder: ArgEncoder,
}

impl ArgPlan {
    /// Pairs a verb with the declared type of its representative argument.
    /// `%s` requires a string argument; the integer verbs require integers.
    pub fn new(verb: Verb, kind: ArgKind) -> Result<Self> {
        match (verb.takes_string(), kind == ArgKind::Str) {
            (true, false) => {
                return Err(Error::BadFormat(format!(
                    "verb %s paired with non-string argument {kind:?}"
                )))
            }
            (false, true) => {
                return Err(Error::BadFormat(
                    "string argument paired with an integer verb".into(),
                ))
            }
            _ => {}
        }
        let encoded_size = kind.encoded_size();
        let encoder = if verb.takes_string() {
            ArgEncoder::LengthPrefixedString
        } else {
            ArgEncoder::FixedBytes(encoded_size)
        };
        Ok(ArgPlan { verb, kind, encoded_size, encoder })
    }
}

/// Parsed representation of a format string.
#[derive(Clone, Debug)]
pub struct FormatPlan {
    /// The original string, kept for decode-time printing.
    pub fmt_string: String,
    pub args: Vec<ArgPlan>,
}

/// Characters allowed between `%` and the verb. They are preserved in the
/// format string for decode-time printing but never alter the encoding.
pub(crate) fn is_flag_rune(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '#' | ' ')
}

/// Scans a format string left to right and yields its verbs in order.
///
/// Literal runes pass through. `%%` is a literal percent sign. Any other `%`
/// starts a conversion: optional width/precision/flag runes are skipped, the
/// next rune must be one of `x d i c s`.
pub fn parse_format(fmt: &str) -> Result<Vec<Verb>> {
    let mut verbs = Vec::new();
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            continue;
        }
        while matches!(chars.peek(), Some(&c) if is_flag_rune(c)) {
            chars.next();
        }
        match chars.next() {
            Some('x') => verbs.push(Verb::Hex),
            Some('d') | Some('i') => verbs.push(Verb::Dec),
            Some('c') => verbs.push(Verb::Char),
            Some('s') => verbs.push(Verb::Str),
            Some(other) => {
                return Err(Error::BadFormat(format!(
                    "unknown verb %{other} in \"{fmt}\""
                )))
            }
            None => {
                return Err(Error::BadFormat(format!(
                    "dangling % at end of \"{fmt}\""
                )))
            }
        }
    }
    Ok(verbs)
}
