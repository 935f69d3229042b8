//! IRC message parsing and serialization (spec §4.A).
//!
//! Wire form: `[@tags ][:prefix ]command[ param]*[ :trailing]\r\n`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single IRCv3 message tag (`name[=value]`).
///
/// Client-only tag names begin with `+` (e.g. `+reply`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            key: key.into(),
            value: value.map(Into::into),
        }
    }
}

/// A fully parsed (or about-to-be-serialized) IRC line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub tags: Option<Vec<Tag>>,
    pub prefix: Option<String>,
    pub command: String,
    /// Middle parameters; none may contain a space or start with `:`.
    pub params: Vec<String>,
    /// The trailing parameter, if any (may contain spaces).
    pub trailing: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("missing command")]
    NoCommand,
}

impl Message {
    pub fn new(command: impl Into<String>, params: Vec<String>, trailing: Option<String>) -> Self {
        Self {
            tags: None,
            prefix: None,
            command: command.into(),
            params,
            trailing,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = if tags.is_empty() { None } else { Some(tags) };
        self
    }

    /// Value of a tag by key, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|t| t.key == key)
            .and_then(|t| t.value.as_deref())
    }

    /// All logical arguments: middle params followed by the trailing one, if any.
    ///
    /// Handlers index into this the way RFC examples number `<param>`s.
    pub fn args(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.params.iter().map(String::as_str).collect();
        if let Some(t) = &self.trailing {
            v.push(t.as_str());
        }
        v
    }

    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args().get(i).copied()
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut rest = line;

        let mut tags = None;
        if let Some(stripped) = rest.strip_prefix('@') {
            let (tag_str, remainder) = split_first_token(stripped);
            tags = Some(parse_tags(tag_str));
            rest = remainder.trim_start();
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix_str, remainder) = split_first_token(stripped);
            prefix = Some(prefix_str.to_string());
            rest = remainder.trim_start();
        }

        if rest.is_empty() {
            return Err(ParseError::NoCommand);
        }

        // Everything left in `rest` is `command[ middle]*[ :trailing]`. Split on the
        // first " :" to isolate a trailing parameter, then split what remains on spaces.
        let (head, trailing) = match rest.find(" :") {
            Some(idx) => (&rest[..idx], Some(rest[idx + 2..].to_string())),
            None => {
                if let Some(stripped) = rest.strip_prefix(':') {
                    // A lone leading ':' with no preceding command is invalid, but a
                    // trailing-only remainder (after prefix removal) never occurs here
                    // since `command` must come first; treat as unsupported.
                    ("", Some(stripped.to_string()))
                } else {
                    (rest, None)
                }
            }
        };

        let mut tokens = head.split(' ').filter(|s| !s.is_empty());
        let command = match tokens.next() {
            Some(c) => c.to_uppercase(),
            None => return Err(ParseError::NoCommand),
        };
        let params: Vec<String> = tokens.map(str::to_string).collect();

        Ok(Message {
            tags,
            prefix,
            command,
            params,
            trailing,
        })
    }
}

/// Split `s` on the first ASCII space, returning `(token, rest)`.
fn split_first_token(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(';')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let mut it = pair.splitn(2, '=');
            let key = it.next().unwrap_or_default().to_string();
            let value = it.next().map(unescape_tag_value);
            Tag { key, value }
        })
        .collect()
}

/// IRCv3 tag-value escaping: `;` `\s` `\r` `\n` `\\` round-trip.
pub fn escape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            if !tags.is_empty() {
                write!(f, "@")?;
                for (i, tag) in tags.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, "{}", tag.key)?;
                    if let Some(v) = &tag.value {
                        write!(f, "={}", escape_tag_value(v))?;
                    }
                }
                write!(f, " ")?;
            }
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command)?;
        for p in &self.params {
            write!(f, " {p}")?;
        }
        if let Some(t) = &self.trailing {
            write!(f, " :{t}")?;
        }
        write!(f, "\r\n")
    }
}
