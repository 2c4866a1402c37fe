//! Control commands.
//!
//! A command is a verb followed either by raw whitespace-separated tokens or by
//! a single tagged-list parameter block:
//!
//! ```text
//! get info.name
//! set defc.res 1280x800
//! img {cine: -1, start: 0, cnt: 1, fmt: 272}
//! ```
//!
//! [`Display`](fmt::Display) writes the line without its terminator; the
//! [`ControlCodec`](crate::ControlCodec) adds the CRLF.

use crate::{parser::parse_tagged_list, value::TaggedList};
use phantom_core::{AcquisitionMode, Error, Result, constants::*};
use std::fmt;

/// Arguments following the verb.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Arguments {
    #[default]
    Empty,
    Tokens(Vec<String>),
    Params(TaggedList),
}

/// One command line sent over the control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Arguments,
}

impl Command {
    /// Command without arguments. The verb is not validated; use
    /// [`CommandBuilder`] for untrusted input.
    pub fn bare(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Arguments::Empty,
        }
    }

    pub fn builder(verb: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(verb)
    }

    /// `get <name>`
    pub fn get(name: impl Into<String>) -> Self {
        Self {
            verb: CMD_GET.to_string(),
            args: Arguments::Tokens(vec![name.into()]),
        }
    }

    /// `set <name> <value>`; the value is written as its display text.
    pub fn set(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            verb: CMD_SET.to_string(),
            args: Arguments::Tokens(vec![name.into(), value.to_string()]),
        }
    }

    /// `startdata {port: <port>}`
    pub fn startdata(port: u16) -> Self {
        Self::with_params(
            CMD_STARTDATA,
            TaggedList::new().with("port", u64::from(port)),
        )
    }

    /// `iload {mode: <code>}`
    pub fn iload(mode: AcquisitionMode) -> Self {
        Self::with_params(
            CMD_ILOAD,
            TaggedList::new().with("mode", u64::from(mode.code())),
        )
    }

    pub fn trig() -> Self {
        Self::bare(CMD_TRIG)
    }

    pub fn rec() -> Self {
        Self::bare(CMD_REC)
    }

    pub fn bye() -> Self {
        Self::bare(CMD_BYE)
    }

    /// `<verb> {<params>}`
    pub fn with_params(verb: impl Into<String>, params: TaggedList) -> Self {
        Self {
            verb: verb.into(),
            args: Arguments::Params(params),
        }
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &Arguments {
        &self.args
    }

    /// Raw tokens, empty for parameter-block commands.
    pub fn tokens(&self) -> &[String] {
        match &self.args {
            Arguments::Tokens(tokens) => tokens,
            _ => &[],
        }
    }

    pub fn params(&self) -> Option<&TaggedList> {
        match &self.args {
            Arguments::Params(params) => Some(params),
            _ => None,
        }
    }

    /// Parse a received command line (terminator already removed).
    ///
    /// Argument text starting with `{` is parsed as a tagged list; anything
    /// else is split into whitespace-separated tokens.
    ///
    /// ```
    /// use phantom_protocol::Command;
    ///
    /// let cmd = Command::parse("startdata {port: 7116}").unwrap();
    /// assert_eq!(cmd.verb(), "startdata");
    /// assert_eq!(cmd.params().unwrap().get("port").unwrap().as_u64(), Some(7116));
    ///
    /// let cmd = Command::parse("get info.name").unwrap();
    /// assert_eq!(cmd.tokens(), ["info.name"]);
    /// ```
    ///
    /// # Errors
    /// Returns `Error::ProtocolSyntax` for an empty line, a verb that is not an
    /// identifier, or a malformed parameter block.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        validate_verb(verb)?;

        let args = if rest.is_empty() {
            Arguments::Empty
        } else if rest.starts_with('{') {
            Arguments::Params(parse_tagged_list(rest)?)
        } else {
            Arguments::Tokens(rest.split_whitespace().map(str::to_string).collect())
        };

        Ok(Self {
            verb: verb.to_string(),
            args,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.verb)?;
        match &self.args {
            Arguments::Empty => Ok(()),
            Arguments::Tokens(tokens) => {
                for token in tokens {
                    write!(f, " {token}")?;
                }
                Ok(())
            }
            Arguments::Params(params) => write!(f, " {params}"),
        }
    }
}

fn validate_verb(verb: &str) -> Result<()> {
    let mut chars = verb.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::syntax("invalid command verb", verb))
    }
}

/// Builder for commands assembled from untrusted parts.
///
/// # Example
/// ```
/// use phantom_protocol::{Command, Value};
///
/// let cmd = Command::builder("img")
///     .param("cine", Value::SignedInt(-1))
///     .param("start", 0u64)
///     .param("cnt", 1u64)
///     .param("fmt", 272u64)
///     .build()
///     .unwrap();
/// assert_eq!(cmd.to_string(), "img {cine: -1, start: 0, cnt: 1, fmt: 272}");
/// ```
#[derive(Debug)]
pub struct CommandBuilder {
    verb: String,
    tokens: Vec<String>,
    params: Option<TaggedList>,
}

impl CommandBuilder {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            tokens: Vec::new(),
            params: None,
        }
    }

    /// Append a raw token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    /// Add an entry to the parameter block.
    pub fn param(
        mut self,
        key: impl Into<crate::DottedName>,
        value: impl Into<crate::Value>,
    ) -> Self {
        self.params.get_or_insert_with(TaggedList::new).insert(key, value);
        self
    }

    /// # Errors
    /// Returns `Error::ProtocolSyntax` if the verb is not an identifier, a
    /// token contains whitespace, or tokens and parameters are mixed.
    pub fn build(self) -> Result<Command> {
        validate_verb(&self.verb)?;

        if let Some(bad) = self
            .tokens
            .iter()
            .find(|t| t.is_empty() || t.contains(char::is_whitespace))
        {
            return Err(Error::syntax("token must be non-empty without whitespace", bad));
        }

        let args = match (self.tokens.is_empty(), self.params) {
            (true, None) => Arguments::Empty,
            (false, None) => Arguments::Tokens(self.tokens),
            (true, Some(params)) => Arguments::Params(params),
            (false, Some(_)) => {
                return Err(Error::syntax(
                    "command cannot mix tokens and parameters",
                    self.tokens.join(" "),
                ));
            }
        };

        Ok(Command {
            verb: self.verb,
            args,
        })
    }
}
