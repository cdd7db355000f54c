//! IRC line parsing and serialization.
//!
//! Handles the RFC 1459 shape `[@tags] [:prefix] COMMAND [params] [:trailing]`.
//! Tags are skipped; the bot does not use them.

use std::fmt;

/// Maximum length of an outbound line, excluding the trailing CRLF.
pub const MAX_LINE_LEN: usize = 510;

/// A single IRC protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Origin of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command word or three-digit numeric, upper-cased.
    pub command: String,
    /// Parameters, with the trailing parameter last.
    pub params: Vec<String>,
}

impl Message {
    /// Build an outbound message with no prefix.
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.to_owned(),
            params,
        }
    }

    /// `NICK <nick>`
    pub fn nick(nick: &str) -> Self {
        Self::new("NICK", vec![nick.to_owned()])
    }

    /// `USER <user> 0 * :<realname>`
    pub fn user(user: &str, realname: &str) -> Self {
        Self::new(
            "USER",
            vec![
                user.to_owned(),
                "0".to_owned(),
                "*".to_owned(),
                realname.to_owned(),
            ],
        )
    }

    /// `PASS <password>`
    pub fn pass(password: &str) -> Self {
        Self::new("PASS", vec![password.to_owned()])
    }

    /// `JOIN <channel>`
    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", vec![channel.to_owned()])
    }

    /// `PRIVMSG <target> :<text>`
    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", vec![target.to_owned(), text.to_owned()])
    }

    /// `NOTICE <target> :<text>`
    pub fn notice(target: &str, text: &str) -> Self {
        Self::new("NOTICE", vec![target.to_owned(), text.to_owned()])
    }

    /// `PONG :<token>`
    pub fn pong(token: &str) -> Self {
        Self::new("PONG", vec![token.to_owned()])
    }

    /// `QUIT :<message>`
    pub fn quit(message: &str) -> Self {
        Self::new("QUIT", vec![message.to_owned()])
    }

    /// Parse one line, with or without its line terminator.
    ///
    /// Returns `None` for blank lines and lines without a command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if let Some(tagged) = rest.strip_prefix('@') {
            rest = tagged.split_once(' ').map_or("", |(_, after)| after);
        }
        rest = rest.trim_start_matches(' ');

        let mut prefix = None;
        if let Some(prefixed) = rest.strip_prefix(':') {
            let (p, after) = prefixed.split_once(' ')?;
            prefix = Some(p.to_owned());
            rest = after.trim_start_matches(' ');
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, after)) => (command, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            match rest.split_once(' ') {
                Some((param, after)) => {
                    params.push(param.to_owned());
                    rest = after;
                }
                None => {
                    params.push(rest.to_owned());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nickname portion of the prefix, if any.
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    /// Serialize to a wire line without the CRLF terminator.
    ///
    /// CR, LF and NUL are replaced with spaces so caller-supplied text can
    /// never smuggle extra commands. Overlong lines are truncated on a
    /// character boundary.
    pub fn to_line(&self) -> String {
        let mut line = String::new();
        if let Some(prefix) = &self.prefix {
            line.push(':');
            line.push_str(&sanitize(prefix));
            line.push(' ');
        }
        line.push_str(&sanitize(&self.command));

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                line.push(' ');
                line.push_str(&sanitize(param).replace(' ', "_"));
            }
            line.push_str(" :");
            line.push_str(&sanitize(last));
        }

        if line.len() > MAX_LINE_LEN {
            let mut cut = MAX_LINE_LEN;
            while !line.is_char_boundary(cut) {
                cut = cut.saturating_sub(1);
            }
            line.truncate(cut);
        }
        line
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

fn sanitize(value: &str) -> String {
    value.replace(['\r', '\n', '\0'], " ")
}

/// Numeric sent once registration has completed.
pub const RPL_WELCOME: &str = "001";

/// Numeric sent when the requested nick is taken.
pub const ERR_NICKNAMEINUSE: &str = "433";
