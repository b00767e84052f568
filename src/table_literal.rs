// 🧾 Table-Literal Evaluator
// Turns the addon's SavedVariables text into an in-memory value tree.
//
// The accepted language is the data subset of Lua: nil, booleans, numbers,
// strings and table constructors. Nothing is executed. The grammar lives in
// `table_literal.pest`; this module builds the tagged tree from the parse.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

/// Global variable the addon assigns its database to.
pub const SAVED_VARIABLE_NAME: &str = "WoWStatTrackerDB";

/// Deepest table nesting accepted. Real exports stay under ten levels.
pub const MAX_NESTING: usize = 100;

#[derive(Parser)]
#[grammar = "table_literal.pest"]
struct TableLiteralParser;

// ============================================================================
// VALUE TREE
// ============================================================================

/// Key of a table entry. Lua allows any value as a key; the addon only
/// writes strings and integers, so anything else is dropped at build time.
#[derive(Debug, Clone, PartialEq)]
pub enum RawKey {
    Index(i64),
    Name(String),
}

impl RawKey {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            RawKey::Name(name) => Some(name),
            RawKey::Index(_) => None,
        }
    }
}

/// Dynamically-typed node produced by evaluation.
///
/// A constructor holding only positional fields becomes `Array`; any keyed
/// field turns it into a `Map` where positional items take `Index(1..)`.
/// `{}` is an empty `Map`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<RawValue>),
    Map(Vec<(RawKey, RawValue)>),
}

impl RawValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Nil => "nil",
            RawValue::Bool(_) => "boolean",
            RawValue::Number(_) => "number",
            RawValue::Str(_) => "string",
            RawValue::Array(_) => "array",
            RawValue::Map(_) => "map",
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, RawValue::Map(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self, RawValue::Map(_) | RawValue::Array(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a named field. Only maps have named fields; a `Nil` value
    /// counts as absent.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        match self {
            RawValue::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_name() == Some(key))
                .map(|(_, v)| v)
                .filter(|v| !matches!(v, RawValue::Nil)),
            _ => None,
        }
    }

    /// Follow a chain of named fields, e.g. `["vault_delves", "count"]`.
    pub fn get_path(&self, path: &[&str]) -> Option<&RawValue> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// All entries with their keys, in source order. Arrays report their
    /// 1-based positions.
    pub fn entries(&self) -> Vec<(RawKey, &RawValue)> {
        match self {
            RawValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (RawKey::Index(i as i64 + 1), v))
                .collect(),
            RawValue::Map(entries) => entries.iter().map(|(k, v)| (k.clone(), v)).collect(),
            _ => Vec::new(),
        }
    }

    /// Values in sequence order: array order, or for maps the integer keys
    /// ascending followed by named keys in source order.
    pub fn values(&self) -> Vec<&RawValue> {
        match self {
            RawValue::Array(items) => items.iter().collect(),
            RawValue::Map(entries) => {
                let mut indexed: Vec<(i64, &RawValue)> = entries
                    .iter()
                    .filter_map(|(k, v)| match k {
                        RawKey::Index(i) => Some((*i, v)),
                        RawKey::Name(_) => None,
                    })
                    .collect();
                indexed.sort_by_key(|(i, _)| *i);

                let named = entries.iter().filter_map(|(k, v)| match k {
                    RawKey::Name(_) => Some(v),
                    RawKey::Index(_) => None,
                });

                indexed.into_iter().map(|(_, v)| v).chain(named).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawValue::Array(items) => items.len(),
            RawValue::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("tables nested {depth} deep (limit {limit})")]
    TooDeep { depth: usize, limit: usize },

    #[error("top-level value is a {0}, expected a map")]
    NotATable(&'static str),
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Evaluate a whole SavedVariables file. The result is always a map.
pub fn evaluate(text: &str) -> Result<RawValue, LiteralError> {
    let value = parse_value(strip_assignment_prefix(text))?;
    if value.is_map() {
        Ok(value)
    } else {
        Err(LiteralError::NotATable(value.type_name()))
    }
}

/// Drop a byte-order mark, leading whitespace and the
/// `WoWStatTrackerDB = ` assignment if present.
pub fn strip_assignment_prefix(text: &str) -> &str {
    let text = text.trim_start_matches('\u{feff}').trim_start();

    if let Some(rest) = text.strip_prefix(SAVED_VARIABLE_NAME) {
        if let Some(rest) = rest.trim_start().strip_prefix('=') {
            return rest;
        }
    }
    text
}

/// Parse a single literal value without any prefix handling.
pub fn parse_value(text: &str) -> Result<RawValue, LiteralError> {
    let depth = max_nesting(text);
    if depth > MAX_NESTING {
        return Err(LiteralError::TooDeep {
            depth,
            limit: MAX_NESTING,
        });
    }

    let mut pairs = TableLiteralParser::parse(Rule::document, text)
        .map_err(|e| LiteralError::Syntax(e.to_string()))?;

    let value = pairs
        .next()
        .and_then(|document| document.into_inner().find(|p| p.as_rule() != Rule::EOI))
        .ok_or_else(|| LiteralError::Syntax("empty document".to_string()))?;

    build_value(value)
}

/// Upper bound on brace nesting, skipping strings and comments. Runs
/// before the recursive parser so hostile input cannot exhaust the stack.
fn max_nesting(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_quoted(bytes, i),
            b'[' if bytes.get(i + 1) == Some(&b'[') => i = skip_past(bytes, i + 2, b"]]"),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = if bytes[i + 2..].starts_with(b"[[") {
                    skip_past(bytes, i + 4, b"]]")
                } else {
                    skip_past(bytes, i + 2, b"\n")
                };
            }
            b'{' => {
                depth += 1;
                max = max.max(depth);
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            _ => i += 1,
        }
    }

    max
}

/// Index just past the closing quote of the string opening at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut j = start + 1;

    while j < bytes.len() {
        match bytes[j] {
            b'\\' if bytes.get(j + 1) == Some(&b'z') => {
                j += 2;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
            }
            b'\\' => j += 2,
            b if b == quote || b == b'\n' => return j + 1,
            _ => j += 1,
        }
    }

    bytes.len()
}

/// Index just past the first `close` at or after `from`, or the end.
fn skip_past(bytes: &[u8], from: usize, close: &[u8]) -> usize {
    bytes[from..]
        .windows(close.len())
        .position(|w| w == close)
        .map_or(bytes.len(), |pos| from + pos + close.len())
}

fn build_value(pair: Pair<Rule>) -> Result<RawValue, LiteralError> {
    match pair.as_rule() {
        Rule::nil => Ok(RawValue::Nil),
        Rule::boolean => Ok(RawValue::Bool(pair.as_str() == "true")),
        Rule::number => parse_number(pair.as_str()).map(RawValue::Number),
        Rule::string => Ok(RawValue::Str(build_string(pair))),
        Rule::table => build_table(pair),
        other => Err(LiteralError::Syntax(format!("unexpected {:?}", other))),
    }
}

fn parse_number(text: &str) -> Result<f64, LiteralError> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        // Wider than 64 bits still reads as the nearest double
        hex.chars()
            .try_fold(0f64, |acc, c| c.to_digit(16).map(|d| acc * 16.0 + f64::from(d)))
    } else {
        digits.parse::<f64>().ok()
    };

    magnitude
        .map(|m| if negative { -m } else { m })
        .ok_or_else(|| LiteralError::Syntax(format!("bad number literal '{}'", text)))
}

fn build_string(pair: Pair<Rule>) -> String {
    let Some(body) = pair.into_inner().next() else {
        return String::new();
    };

    match body.as_rule() {
        Rule::long_body => {
            // A newline right after the opening brackets is not part of the string
            let raw = body.as_str();
            raw.strip_prefix("\r\n")
                .or_else(|| raw.strip_prefix('\n'))
                .unwrap_or(raw)
                .to_string()
        }
        _ => decode_escapes(body.as_str()),
    }
}

/// Resolve Lua escape sequences. Lua strings are byte strings, so decoding
/// works on bytes and invalid UTF-8 is replaced rather than rejected.
fn decode_escapes(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' || i + 1 >= bytes.len() {
            out.push(b);
            i += 1;
            continue;
        }

        let esc = bytes[i + 1];
        i += 2;

        match esc {
            b'n' | b'\n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'z' => {
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
            }
            b'x' => match body.get(i..i + 2).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                Some(v) => {
                    out.push(v);
                    i += 2;
                }
                None => out.extend_from_slice(b"\\x"),
            },
            b'u' => match decode_unicode_escape(&body[i..]) {
                Some((c, consumed)) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    i += consumed;
                }
                None => out.extend_from_slice(b"\\u"),
            },
            b'0'..=b'9' => {
                let mut value = u32::from(esc - b'0');
                let mut digits = 1;
                while digits < 3 && i < bytes.len() && bytes[i].is_ascii_digit() {
                    value = value * 10 + u32::from(bytes[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                out.push(value.min(255) as u8);
            }
            other => out.push(other),
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// `{XXXX}` following `\u`. Returns the char and the bytes consumed.
fn decode_unicode_escape(rest: &str) -> Option<(char, usize)> {
    let inner = rest.strip_prefix('{')?;
    let end = inner.find('}')?;
    let code = u32::from_str_radix(&inner[..end], 16).ok()?;
    char::from_u32(code).map(|c| (c, end + 2))
}

fn build_table(pair: Pair<Rule>) -> Result<RawValue, LiteralError> {
    let mut entries: Vec<(RawKey, RawValue)> = Vec::new();
    let mut next_index: i64 = 1;
    let mut all_positional = true;

    for field in pair.into_inner() {
        let rule = field.as_rule();
        let mut inner = field.into_inner();

        match rule {
            Rule::positional_field => {
                let value = build_value(next_pair(&mut inner)?)?;
                insert_entry(&mut entries, RawKey::Index(next_index), value);
                next_index += 1;
            }
            Rule::named_field => {
                all_positional = false;
                let name = next_pair(&mut inner)?.as_str().to_string();
                let value = build_value(next_pair(&mut inner)?)?;
                insert_entry(&mut entries, RawKey::Name(name), value);
            }
            Rule::keyed_field => {
                all_positional = false;
                let key = build_value(next_pair(&mut inner)?)?;
                let value = build_value(next_pair(&mut inner)?)?;
                if let Some(key) = table_key(&key) {
                    insert_entry(&mut entries, key, value);
                }
            }
            other => {
                return Err(LiteralError::Syntax(format!("unexpected {:?} in table", other)));
            }
        }
    }

    if entries.is_empty() {
        return Ok(RawValue::Map(entries));
    }

    if all_positional {
        Ok(RawValue::Array(entries.into_iter().map(|(_, v)| v).collect()))
    } else {
        // Assigning nil removes a key
        entries.retain(|(_, v)| !matches!(v, RawValue::Nil));
        Ok(RawValue::Map(entries))
    }
}

fn next_pair<'i>(
    inner: &mut pest::iterators::Pairs<'i, Rule>,
) -> Result<Pair<'i, Rule>, LiteralError> {
    inner
        .next()
        .ok_or_else(|| LiteralError::Syntax("truncated table field".to_string()))
}

fn table_key(key: &RawValue) -> Option<RawKey> {
    match key {
        RawValue::Str(s) => Some(RawKey::Name(s.clone())),
        RawValue::Number(n)
            if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 =>
        {
            Some(RawKey::Index(*n as i64))
        }
        _ => None,
    }
}

/// Later assignments to the same key win, keeping the first position.
fn insert_entry(entries: &mut Vec<(RawKey, RawValue)>, key: RawKey, value: RawValue) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_value("nil").unwrap(), RawValue::Nil);
        assert_eq!(parse_value("true").unwrap(), RawValue::Bool(true));
        assert_eq!(parse_value(" false ").unwrap(), RawValue::Bool(false));
        assert_eq!(parse_value("42").unwrap(), RawValue::Number(42.0));
        assert_eq!(parse_value("-3.5").unwrap(), RawValue::Number(-3.5));
        assert_eq!(parse_value("1e3").unwrap(), RawValue::Number(1000.0));
        assert_eq!(parse_value("0x1F").unwrap(), RawValue::Number(31.0));
        assert_eq!(parse_value(".5").unwrap(), RawValue::Number(0.5));
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            parse_value(r#""Tank \"main\"\n""#).unwrap(),
            RawValue::Str("Tank \"main\"\n".to_string())
        );
        assert_eq!(parse_value("'it\\'s'").unwrap(), RawValue::Str("it's".to_string()));
        assert_eq!(parse_value(r#""\65\066""#).unwrap(), RawValue::Str("AB".to_string()));
        assert_eq!(parse_value(r#""\x41\u{e9}""#).unwrap(), RawValue::Str("Aé".to_string()));
        assert_eq!(parse_value("\"\"").unwrap(), RawValue::Str(String::new()));
        assert_eq!(
            parse_value("[[\nline one\nline two]]").unwrap(),
            RawValue::Str("line one\nline two".to_string())
        );
        assert_eq!(
            parse_value("\"Tëst-Realm\"").unwrap(),
            RawValue::Str("Tëst-Realm".to_string())
        );
    }

    #[test]
    fn test_array_and_map_shapes() {
        let array = parse_value("{ 1, 6, 9, }").unwrap();
        assert_eq!(
            array,
            RawValue::Array(vec![
                RawValue::Number(1.0),
                RawValue::Number(6.0),
                RawValue::Number(9.0)
            ])
        );

        let map = parse_value(r#"{ ["a-b"] = 1; name = "x", [4] = 11 }"#).unwrap();
        assert!(map.is_map());
        assert_eq!(map.get("a-b"), Some(&RawValue::Number(1.0)));
        assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("x"));
        assert_eq!(map.len(), 3);

        assert_eq!(parse_value("{}").unwrap(), RawValue::Map(vec![]));
    }

    #[test]
    fn test_mixed_table_positions() {
        let mixed = parse_value(r#"{ "a", key = true, "b" }"#).unwrap();
        let entries = mixed.entries();
        assert_eq!(entries[0].0, RawKey::Index(1));
        assert_eq!(entries[1].0, RawKey::Name("key".to_string()));
        assert_eq!(entries[2].0, RawKey::Index(2));
    }

    #[test]
    fn test_sparse_values_in_key_order() {
        let sparse = parse_value("{ [4] = 11, [2] = 8, [10] = 3 }").unwrap();
        let values: Vec<f64> = sparse.values().iter().filter_map(|v| v.as_f64()).collect();
        assert_eq!(values, vec![8.0, 11.0, 3.0]);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let map = parse_value("{ a = 1, a = 2 }").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&RawValue::Number(2.0)));
    }

    #[test]
    fn test_nil_assignment_removes_key() {
        let map = parse_value("{ a = nil, b = 1 }").unwrap();
        assert!(map.get("a").is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_comments_are_ignored() {
        let map = parse_value("{ -- header\n a = 1, --[[ block\n comment ]] b = 2 }").unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_get_path() {
        let root = parse_value("{ vault_delves = { count = 5, tiers = { [2] = 8 } } }").unwrap();
        assert_eq!(
            root.get_path(&["vault_delves", "count"]),
            Some(&RawValue::Number(5.0))
        );
        assert!(root.get_path(&["vault_delves", "missing"]).is_none());
        assert!(root.get_path(&["vault_delves", "count", "deeper"]).is_none());
    }

    #[test]
    fn test_strip_assignment_prefix() {
        assert_eq!(strip_assignment_prefix("\u{feff}  WoWStatTrackerDB = {}"), " {}");
        assert_eq!(strip_assignment_prefix("WoWStatTrackerDB={}"), "{}");
        assert_eq!(strip_assignment_prefix("\n{}"), "{}");
        assert_eq!(strip_assignment_prefix("OtherDB = {}"), "OtherDB = {}");
    }

    #[test]
    fn test_evaluate_requires_map() {
        assert!(evaluate("WoWStatTrackerDB = { characters = {} }").is_ok());
        assert_eq!(
            evaluate("{ 1, 2 }").unwrap_err(),
            LiteralError::NotATable("array")
        );
        assert_eq!(evaluate("5").unwrap_err(), LiteralError::NotATable("number"));
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        assert!(matches!(evaluate("not valid {{{{"), Err(LiteralError::Syntax(_))));
        assert!(matches!(evaluate(""), Err(LiteralError::Syntax(_))));
        assert!(matches!(evaluate("{ a = }"), Err(LiteralError::Syntax(_))));
        assert!(matches!(evaluate("{ a = 1 } trailing"), Err(LiteralError::Syntax(_))));
        assert!(matches!(evaluate("{ a = print(1) }"), Err(LiteralError::Syntax(_))));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let hostile = "{".repeat(100_000);
        assert!(matches!(evaluate(&hostile), Err(LiteralError::TooDeep { .. })));

        let ok = format!("{}1{}", "{ a = ".repeat(20), " }".repeat(20));
        assert!(parse_value(&ok).is_ok());
    }

    #[test]
    fn test_braces_in_long_strings_and_comments_do_not_count() {
        let braces = "{".repeat(150);

        let long = format!("{{ note = [[{}]] }}", braces);
        let value = parse_value(&long).unwrap();
        assert_eq!(value.get("note").and_then(RawValue::as_str), Some(braces.as_str()));

        let line = format!("{{ -- {}\n a = 1 }}", braces);
        assert_eq!(parse_value(&line).unwrap().len(), 1);

        let block = format!("{{ --[[ {} ]] a = 1 }}", braces);
        assert_eq!(parse_value(&block).unwrap().len(), 1);

        let quoted = format!("{{ a = \"x\\z\n  {}\" }}", braces);
        assert!(parse_value(&quoted).is_ok());
    }

    #[test]
    fn test_hex_wider_than_64_bits() {
        assert_eq!(
            parse_value("0x10000000000000000").unwrap(),
            RawValue::Number(18_446_744_073_709_551_616.0)
        );
        assert_eq!(
            parse_value("{ id = -0x20000000000000000 }").unwrap().get("id"),
            Some(&RawValue::Number(-(2f64.powi(65))))
        );
    }

    #[test]
    fn test_braces_inside_strings_do_not_count_as_nesting() {
        let text = format!("{{ note = \"{}\" }}", "{".repeat(500));
        assert!(evaluate(&text).is_ok());
    }
}
