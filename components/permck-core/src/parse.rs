//! Recursive-descent parser for the permission mini-language (§4.1).
//!
//! Base-permission characters (`o r w R W m l v a n`) and the structural keywords
//! (`map`, `chan`, `struct`, `func`, `interface`) share a few starting letters (`m`, `a`),
//! so the base scanner stops the moment the remaining input is about to spell out a
//! keyword, rather than greedily eating it as more base flags. This mirrors ordered-choice
//! PEG grammars compiled by crates like `peg`, but is hand-written here so the
//! keyword-vs-flag lookahead can be expressed directly.

use crate::base::{parse_base_char, Base};
use crate::perm::{FuncPermission, Permission, PermissionData};

const KEYWORDS: &[&str] = &["interface", "struct", "func", "chan", "map"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at {position}: {reason}")]
pub struct ParseError {
    pub position: usize,
    pub reason: String,
}

impl ParseError {
    fn new(position: usize, reason: impl Into<String>) -> Self {
        ParseError {
            position,
            reason: reason.into(),
        }
    }
}

pub fn parse(text: &str) -> Result<Permission, ParseError> {
    let mut p = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    p.skip_ws();
    let perm = p.parse_inner()?;
    p.skip_ws();
    if !p.at_eof() {
        return Err(ParseError::new(p.pos, "trailing input after permission"));
    }
    Ok(perm)
}

/// Parse one permission starting at `pos` within `chars`, without requiring the rest of
/// the input to be consumed. Returns the permission and the position just past it.
///
/// Exposed so that a host grammar embedding permission specs inline (e.g. `permck-ast`'s
/// textual fixture language, which mixes statement syntax with permission specs in
/// parameter lists and annotations) can share this parser's char-offset bookkeeping
/// instead of re-extracting a substring and re-lexing it.
pub fn parse_prefix(chars: &[char], pos: usize) -> Result<(Permission, usize), ParseError> {
    let mut p = Parser {
        chars: chars.to_vec(),
        pos,
    };
    p.skip_ws();
    let perm = p.parse_inner()?;
    Ok((perm, p.pos))
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn at_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(ParseError::new(
                self.pos - 1,
                format!("expected `{expected}`, found `{c}`"),
            )),
            None => Err(ParseError::new(
                self.pos,
                format!("expected `{expected}`, found end of input"),
            )),
        }
    }

    /// Is one of the structural keywords about to start at the current position (after
    /// skipping no whitespace — callers already sit at the first non-base character)?
    fn peek_keyword(&self) -> Option<&'static str> {
        for &kw in KEYWORDS {
            let kw_chars: Vec<char> = kw.chars().collect();
            if self.pos + kw_chars.len() > self.chars.len() {
                continue;
            }
            if self.chars[self.pos..self.pos + kw_chars.len()] != kw_chars[..] {
                continue;
            }
            let boundary = self
                .chars
                .get(self.pos + kw_chars.len())
                .map(|c| !c.is_alphanumeric())
                .unwrap_or(true);
            if boundary {
                return Some(kw);
            }
        }
        None
    }

    fn eat_keyword(&mut self, kw: &str) -> Result<(), ParseError> {
        self.skip_ws();
        if self.peek_keyword() == Some(kw) {
            self.pos += kw.chars().count();
            Ok(())
        } else {
            Err(ParseError::new(self.pos, format!("expected keyword `{kw}`")))
        }
    }

    fn parse_base(&mut self) -> Base {
        let mut base = Base::NONE;
        loop {
            if self.peek_keyword().is_some() {
                break;
            }
            match self.peek().and_then(parse_base_char) {
                Some(flag) => {
                    base |= flag;
                    self.pos += 1;
                }
                None => break,
            }
        }
        base
    }

    fn parse_ident(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if self.pos == start {
            None
        } else {
            Some(self.chars[start..self.pos].iter().collect())
        }
    }

    fn parse_inner(&mut self) -> Result<Permission, ParseError> {
        self.skip_ws();

        if self.peek() == Some('_') {
            self.pos += 1;
            return Ok(Permission::wildcard());
        }

        // A leading `(paramList)` is only a function receiver list, never an independent
        // base, so it takes priority when no base characters precede it.
        if self.peek() == Some('(') {
            return self.parse_func(Base::NONE, true);
        }

        let base_start = self.pos;
        let base = self.parse_base();
        self.skip_ws();

        match self.peek_keyword() {
            Some("map") => {
                self.eat_keyword("map")?;
                self.expect_char('[')?;
                let key = self.parse_inner()?;
                self.expect_char(']')?;
                let value = self.parse_inner()?;
                Ok(Permission::new(PermissionData::Map { base, key, value }))
            }
            Some("chan") => {
                self.eat_keyword("chan")?;
                let element = self.parse_inner()?;
                Ok(Permission::new(PermissionData::Chan { base, element }))
            }
            Some("struct") => {
                self.eat_keyword("struct")?;
                self.expect_char('{')?;
                let fields = self.parse_field_list()?;
                self.expect_char('}')?;
                Ok(Permission::new(PermissionData::Struct { base, fields }))
            }
            Some("interface") => {
                self.eat_keyword("interface")?;
                self.expect_char('{')?;
                let methods = self.parse_method_list()?;
                self.expect_char('}')?;
                Ok(Permission::new(PermissionData::Interface { base, methods }))
            }
            Some("func") => self.parse_func(base, false),
            _ => {
                self.skip_ws();
                match self.peek() {
                    Some('*') => {
                        self.pos += 1;
                        let target = self.parse_inner()?;
                        Ok(Permission::new(PermissionData::Pointer { base, target }))
                    }
                    Some('[') => {
                        self.pos += 1;
                        let len = self.parse_array_len()?;
                        self.expect_char(']')?;
                        let element = self.parse_inner()?;
                        Ok(match len {
                            ArrayLen::Slice => {
                                Permission::new(PermissionData::Slice { base, element })
                            }
                            ArrayLen::Sized(n) => Permission::new(PermissionData::Array {
                                base,
                                element,
                                len: Some(n),
                            }),
                            ArrayLen::Unsized => Permission::new(PermissionData::Array {
                                base,
                                element,
                                len: None,
                            }),
                        })
                    }
                    // A base-prefixed receiver list (`om (om) func(...)`), symmetric with
                    // the empty-base leading-`(` branch above.
                    Some('(') => self.parse_func(base, true),
                    _ => {
                        if self.pos == base_start {
                            Err(ParseError::new(self.pos, "expected a permission"))
                        } else {
                            Ok(Permission::base_of(base))
                        }
                    }
                }
            }
        }
    }

    fn parse_array_len(&mut self) -> Result<ArrayLen, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(']') => Ok(ArrayLen::Slice),
            Some('_') => {
                self.pos += 1;
                Ok(ArrayLen::Unsized)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                let n: usize = text
                    .parse()
                    .map_err(|_| ParseError::new(start, "invalid array length"))?;
                Ok(ArrayLen::Sized(n))
            }
            Some(c) => Err(ParseError::new(self.pos, format!("unexpected `{c}` in array length"))),
            None => Err(ParseError::new(self.pos, "unexpected end of input in array length")),
        }
    }

    fn parse_field_list(&mut self) -> Result<Vec<Permission>, ParseError> {
        let mut fields = Vec::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            return Ok(fields);
        }
        loop {
            fields.push(self.parse_inner()?);
            self.skip_ws();
            match self.peek() {
                Some(';') | Some(',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(fields)
    }

    fn parse_method_list(&mut self) -> Result<Vec<FuncPermission>, ParseError> {
        let mut methods = Vec::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            return Ok(methods);
        }
        loop {
            let perm = self.parse_inner()?;
            match &*perm.data() {
                PermissionData::Func(f) => methods.push(f.clone()),
                _ => {
                    return Err(ParseError::new(
                        self.pos,
                        "only function permissions are allowed inside `interface { ... }`",
                    ))
                }
            }
            self.skip_ws();
            match self.peek() {
                Some(';') | Some(',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(methods)
    }

    fn parse_param_list(&mut self) -> Result<Vec<Permission>, ParseError> {
        let mut params = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            return Ok(params);
        }
        loop {
            params.push(self.parse_inner()?);
            self.skip_ws();
            if self.peek() == Some(',') {
                self.pos += 1;
                self.skip_ws();
            } else {
                break;
            }
        }
        Ok(params)
    }

    /// Parses a function permission. `leading_receiver` is true when we've already seen
    /// a `(` that must be the optional receiver list (i.e. the base before it was empty
    /// and no keyword matched at this position).
    fn parse_func(&mut self, base: Base, leading_receiver: bool) -> Result<Permission, ParseError> {
        let receivers = if leading_receiver || self.peek() == Some('(') {
            self.expect_char('(')?;
            let receivers = self.parse_param_list()?;
            self.expect_char(')')?;
            receivers
        } else {
            Vec::new()
        };

        self.skip_ws();
        self.eat_keyword("func")?;

        self.skip_ws();
        let name = if self.peek() != Some('(') {
            self.parse_ident()
        } else {
            None
        };

        self.expect_char('(')?;
        let params = self.parse_param_list()?;
        self.expect_char(')')?;

        self.skip_ws();
        let results = if self.peek() == Some('(') {
            self.pos += 1;
            let results = self.parse_param_list()?;
            self.expect_char(')')?;
            results
        } else if self.could_start_inner() {
            vec![self.parse_inner()?]
        } else {
            Vec::new()
        };

        Ok(Permission::new(PermissionData::Func(FuncPermission {
            base,
            name,
            receivers,
            params,
            results,
        })))
    }

    fn could_start_inner(&self) -> bool {
        match self.peek() {
            None => false,
            Some(')') | Some('}') | Some(']') | Some(',') | Some(';') => false,
            Some(c) if parse_base_char(c).is_some() => true,
            Some('_') | Some('*') | Some('[') | Some('(') => true,
            _ => self.peek_keyword().is_some(),
        }
    }
}

enum ArrayLen {
    Slice,
    Sized(usize),
    Unsized,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_of(p: &Permission) -> Base {
        p.base()
    }

    #[test]
    fn parses_plain_base() {
        let p = parse("om").unwrap();
        assert_eq!(format!("{p}"), "om");
    }

    #[test]
    fn parses_pointer() {
        let p = parse("om * om").unwrap();
        match &*p.data() {
            PermissionData::Pointer { base, target } => {
                assert_eq!(*base, Base::OWNED | Base::MUTABLE);
                assert_eq!(base_of(target), Base::OWNED | Base::MUTABLE);
            }
            other => panic!("expected pointer, got {other:?}"),
        }
    }

    #[test]
    fn parses_map_disambiguated_from_base_flags() {
        let p = parse("om map[om * om]om").unwrap();
        match &*p.data() {
            PermissionData::Map { base, key, value } => {
                assert_eq!(*base, Base::OWNED | Base::MUTABLE);
                assert!(matches!(&*key.data(), PermissionData::Pointer { .. }));
                assert_eq!(base_of(value), Base::OWNED | Base::MUTABLE);
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn parses_slice_and_array() {
        let slice = parse("om []om").unwrap();
        assert!(matches!(&*slice.data(), PermissionData::Slice { .. }));

        let array = parse("om [3]om").unwrap();
        match &*array.data() {
            PermissionData::Array { len: Some(3), .. } => {}
            other => panic!("expected sized array, got {other:?}"),
        }
    }

    #[test]
    fn parses_func_with_receiver_and_result() {
        let p = parse("om (om) func(om * om) or").unwrap();
        match &*p.data() {
            PermissionData::Func(f) => {
                assert_eq!(f.base, Base::OWNED | Base::MUTABLE);
                assert_eq!(f.receivers.len(), 1);
                assert_eq!(f.params.len(), 1);
                assert_eq!(f.results.len(), 1);
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn parses_interface_with_methods() {
        let p = parse("om interface { ov (om) func() }").unwrap();
        match &*p.data() {
            PermissionData::Interface { methods, .. } => {
                assert_eq!(methods.len(), 1);
                assert_eq!(methods[0].receivers.len(), 1);
            }
            other => panic!("expected interface, got {other:?}"),
        }
    }

    #[test]
    fn wildcard_round_trips() {
        let p = parse("_").unwrap();
        assert!(p.is_wildcard());
        assert_eq!(format!("{p}"), "_");
    }

    #[test]
    fn rejects_unknown_base_char() {
        assert!(parse("q").is_err());
    }

    #[test]
    fn rejects_unbalanced_delimiters() {
        assert!(parse("om map[om * om").is_err());
    }

    #[test]
    fn rejects_non_func_in_interface() {
        assert!(parse("interface { om }").is_err());
    }

    #[test]
    fn print_then_parse_is_idempotent() {
        let p = parse("om map[om * om]or").unwrap();
        let printed = format!("{p}");
        let reparsed = parse(&printed).unwrap();
        assert!(p.structurally_equal(&reparsed));
    }
}
