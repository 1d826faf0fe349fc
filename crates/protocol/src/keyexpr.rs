//! Key expressions: hierarchical, wildcard-capable resource names
//!
//! A key expression is a `/`-separated list of non-empty chunks, e.g.
//! `demo/room/1/temperature`. Three wildcards are recognized:
//!
//! - `*` — exactly one chunk, any content
//! - `**` — any number of chunks, including none
//! - `$*` — any run of characters inside a chunk, e.g. `file$*.log`
//!
//! The canon form forbids `#`, `?` and bare `$` anywhere, allows at
//! most one `$*` per chunk, requires `*`/`**` to stand alone as whole
//! chunks, and normalizes `**/**` to `**`, `**/*` to `*/**`, and a
//! lone `$*` chunk to `*`. [`KeyExpr::new`] accepts only canon input;
//! [`KeyExpr::autocanonize`] repairs what it can first.

use std::fmt;

use crate::error::{ProtocolError, Result};

/// A validated, canon-form key expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyExpr(String);

impl KeyExpr {
    /// Wraps a string that must already be in canon form
    pub fn new(expr: impl Into<String>) -> Result<Self> {
        let expr = expr.into();
        validate(&expr)?;
        Ok(KeyExpr(expr))
    }

    /// Normalizes the input to canon form, then validates it
    pub fn autocanonize(expr: impl Into<String>) -> Result<Self> {
        let expr = autocanonize(expr.into())?;
        Ok(KeyExpr(expr))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if every key matched by `other` is also matched by `self`
    pub fn includes(&self, other: &KeyExpr) -> bool {
        let a: Vec<&str> = self.0.split('/').collect();
        let b: Vec<&str> = other.0.split('/').collect();
        include_chunks(&a, &b)
    }

    /// True if at least one key is matched by both expressions
    pub fn intersects(&self, other: &KeyExpr) -> bool {
        let a: Vec<&str> = self.0.split('/').collect();
        let b: Vec<&str> = other.0.split('/').collect();
        intersect_chunks(&a, &b)
    }

    /// Appends `other` below `self` with a `/` separator
    pub fn join(&self, other: &str) -> Result<KeyExpr> {
        KeyExpr::autocanonize(format!("{}/{}", self.0, other))
    }

    /// Appends `suffix` to the last chunk of `self`, without a separator
    pub fn concat(&self, suffix: &str) -> Result<KeyExpr> {
        KeyExpr::autocanonize(format!("{}{}", self.0, suffix))
    }
}

impl fmt::Display for KeyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyExpr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for KeyExpr {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self> {
        KeyExpr::new(value)
    }
}

impl TryFrom<String> for KeyExpr {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self> {
        KeyExpr::new(value)
    }
}

impl From<KeyExpr> for String {
    fn from(value: KeyExpr) -> String {
        value.0
    }
}

fn err(expr: &str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidKeyExpr {
        expr: expr.to_string(),
        reason: reason.into(),
    }
}

/// Checks that `expr` is a canon-form key expression
pub fn validate(expr: &str) -> Result<()> {
    if expr.is_empty() {
        return Err(err(expr, "empty key expression"));
    }
    if let Some(forbidden) = expr.chars().find(|c| *c == '#' || *c == '?') {
        return Err(err(expr, format!("forbidden character {forbidden:?}")));
    }

    let chunks: Vec<&str> = expr.split('/').collect();
    for chunk in &chunks {
        validate_chunk(expr, chunk)?;
    }
    for pair in chunks.windows(2) {
        if pair[0] == "**" && (pair[1] == "**" || pair[1] == "*") {
            return Err(err(expr, format!("{}/{} is not canon", pair[0], pair[1])));
        }
    }
    Ok(())
}

fn validate_chunk(expr: &str, chunk: &str) -> Result<()> {
    if chunk.is_empty() {
        return Err(err(expr, "empty chunk"));
    }
    if chunk == "*" || chunk == "**" {
        return Ok(());
    }
    if chunk == "$*" {
        return Err(err(expr, "lone $* chunk must be written *"));
    }
    let bytes = chunk.as_bytes();
    let mut subwilds = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' => {
                if bytes.get(i + 1) != Some(&b'*') {
                    return Err(err(expr, "'$' must be followed by '*'"));
                }
                subwilds += 1;
                if subwilds > 1 {
                    return Err(err(expr, "more than one $* in a chunk"));
                }
                i += 2;
            }
            b'*' => {
                return Err(err(expr, "'*' may only stand alone in a chunk or follow '$'"));
            }
            _ => i += 1,
        }
    }
    Ok(())
}

/// Rewrites `expr` into canon form, failing on constructs that cannot
/// be repaired (forbidden characters, bare `$`, embedded `*`)
pub fn autocanonize(expr: String) -> Result<String> {
    let mut chunks: Vec<String> = expr.split('/').map(str::to_string).collect();

    for chunk in &mut chunks {
        while chunk.contains("$*$*") {
            *chunk = chunk.replace("$*$*", "$*");
        }
        if chunk == "$*" {
            *chunk = "*".to_string();
        }
    }

    // collapse **/** and bubble * in front of **
    let mut changed = true;
    while changed {
        changed = false;
        let mut i = 0;
        while i + 1 < chunks.len() {
            if chunks[i] == "**" && chunks[i + 1] == "**" {
                chunks.remove(i + 1);
                changed = true;
            } else if chunks[i] == "**" && chunks[i + 1] == "*" {
                chunks.swap(i, i + 1);
                changed = true;
            } else {
                i += 1;
            }
        }
    }

    let canon = chunks.join("/");
    validate(&canon)?;
    Ok(canon)
}

fn include_chunks(a: &[&str], b: &[&str]) -> bool {
    match (a.split_first(), b.split_first()) {
        (None, None) => true,
        (Some((&"**", rest)), _) => {
            include_chunks(rest, b) || (!b.is_empty() && include_chunks(a, &b[1..]))
        }
        (Some((&ac, at)), Some((&bc, bt))) => {
            bc != "**" && chunk_includes(ac, bc) && include_chunks(at, bt)
        }
        _ => false,
    }
}

fn intersect_chunks(a: &[&str], b: &[&str]) -> bool {
    match (a.split_first(), b.split_first()) {
        (None, None) => true,
        (Some((&"**", rest)), _) => {
            intersect_chunks(rest, b) || (!b.is_empty() && intersect_chunks(a, &b[1..]))
        }
        (_, Some((&"**", _))) => intersect_chunks(b, a),
        (Some((&ac, at)), Some((&bc, bt))) => {
            chunk_intersects(ac, bc) && intersect_chunks(at, bt)
        }
        _ => false,
    }
}

fn chunk_includes(a: &str, b: &str) -> bool {
    if a == "*" {
        return true;
    }
    if !a.contains("$*") {
        return a == b;
    }
    // treat the other side's text, wildcards included, as opaque chars
    let pattern = parse_elems(a);
    let text: Vec<char> = b.chars().collect();
    let (lp, lt) = (pattern.len(), text.len());
    let mut dp = vec![vec![false; lt + 1]; lp + 1];
    dp[lp][lt] = true;
    for i in (0..lp).rev() {
        for j in (0..=lt).rev() {
            dp[i][j] = match pattern[i] {
                Elem::Star => dp[i + 1][j] || (j < lt && dp[i][j + 1]),
                Elem::Char(c) => j < lt && text[j] == c && dp[i + 1][j + 1],
            };
        }
    }
    dp[0][0]
}

fn chunk_intersects(a: &str, b: &str) -> bool {
    if a == b || a == "*" || b == "*" {
        return true;
    }
    let pa = parse_elems(a);
    let pb = parse_elems(b);
    let (la, lb) = (pa.len(), pb.len());
    let mut dp = vec![vec![false; lb + 1]; la + 1];
    dp[la][lb] = true;
    for i in (0..=la).rev() {
        for j in (0..=lb).rev() {
            if i == la && j == lb {
                continue;
            }
            let mut ok = false;
            if i < la {
                match pa[i] {
                    Elem::Star => ok = dp[i + 1][j] || (j < lb && dp[i][j + 1]),
                    Elem::Char(c1) => {
                        if j < lb {
                            if let Elem::Char(c2) = pb[j] {
                                ok = c1 == c2 && dp[i + 1][j + 1];
                            }
                        }
                    }
                }
            }
            if !ok && j < lb {
                if let Elem::Star = pb[j] {
                    ok = dp[i][j + 1] || (i < la && dp[i + 1][j]);
                }
            }
            dp[i][j] = ok;
        }
    }
    dp[0][0]
}

#[derive(Clone, Copy)]
enum Elem {
    Char(char),
    Star,
}

fn parse_elems(chunk: &str) -> Vec<Elem> {
    let mut elems = Vec::with_capacity(chunk.len());
    let mut chars = chunk.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'*') {
            chars.next();
            elems.push(Elem::Star);
        } else {
            elems.push(Elem::Char(c));
        }
    }
    elems
}
