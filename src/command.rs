//! Command line parsing for the authenticated loop.

use crate::error::{CommandError, CommandResult};
use crate::protocol::replies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Ls,
    Cd,
    Rm,
    Put,
    Get,
    Pwd,
    Mkdir,
    Drm,
    Quit,
}

/// Recognized verbs, matched as literal case-sensitive prefixes in this order.
pub const VERBS: &[(&str, Verb)] = &[
    ("LS", Verb::Ls),
    ("CD", Verb::Cd),
    ("RM", Verb::Rm),
    ("PUT", Verb::Put),
    ("GET", Verb::Get),
    ("PWD", Verb::Pwd),
    ("MKDIR", Verb::Mkdir),
    ("DRM", Verb::Drm),
    ("QUIT", Verb::Quit),
];

impl Verb {
    pub fn takes_argument(&self) -> bool {
        matches!(
            self,
            Verb::Cd | Verb::Rm | Verb::Put | Verb::Get | Verb::Mkdir | Verb::Drm
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub arg: String,
}

impl Command {
    /// Parse one input line. Surrounding whitespace is ignored on the line and
    /// on the argument.
    pub fn parse(line: &str) -> CommandResult<Command> {
        let line = line.trim();
        let (name, verb) = VERBS
            .iter()
            .find(|(name, _)| line.starts_with(name))
            .ok_or(CommandError::Protocol(replies::UNKNOWN_COMMAND))?;
        let arg = line[name.len()..].trim();
        if verb.takes_argument() && arg.is_empty() {
            return Err(CommandError::Protocol(replies::MISSING_ARGUMENT));
        }
        Ok(Command {
            verb: *verb,
            arg: arg.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(s: &str) -> Command {
        Command::parse(s).unwrap()
    }

    #[test]
    fn test_parse_verbs() {
        assert_eq!(parse_ok("LS").verb, Verb::Ls);
        assert_eq!(parse_ok("PWD").verb, Verb::Pwd);
        assert_eq!(parse_ok("QUIT").verb, Verb::Quit);
        let c = parse_ok("CD docs");
        assert_eq!((c.verb, c.arg.as_str()), (Verb::Cd, "docs"));
        let c = parse_ok("  PUT   my file.txt \r\n");
        assert_eq!((c.verb, c.arg.as_str()), (Verb::Put, "my file.txt"));
        let c = parse_ok("MKDIR reports");
        assert_eq!((c.verb, c.arg.as_str()), (Verb::Mkdir, "reports"));
        let c = parse_ok("DRM reports");
        assert_eq!((c.verb, c.arg.as_str()), (Verb::Drm, "reports"));
    }

    #[test]
    fn test_parse_is_prefix_and_case_sensitive() {
        // prefix match: trailing characters become the argument
        let c = parse_ok("CD..");
        assert_eq!((c.verb, c.arg.as_str()), (Verb::Cd, ".."));
        assert_eq!(parse_ok("LSX").verb, Verb::Ls);

        assert!(matches!(
            Command::parse("ls"),
            Err(CommandError::Protocol(replies::UNKNOWN_COMMAND))
        ));
        assert!(matches!(
            Command::parse("Quit"),
            Err(CommandError::Protocol(replies::UNKNOWN_COMMAND))
        ));
        assert!(matches!(
            Command::parse(""),
            Err(CommandError::Protocol(replies::UNKNOWN_COMMAND))
        ));
    }

    #[test]
    fn test_parse_missing_argument() {
        for line in ["CD", "RM  ", "PUT", "GET", "MKDIR", "DRM"] {
            assert!(
                matches!(
                    Command::parse(line),
                    Err(CommandError::Protocol(replies::MISSING_ARGUMENT))
                ),
                "{}",
                line
            );
        }
    }

    #[test]
    fn test_every_table_verb_parses() {
        for (name, verb) in VERBS {
            assert_eq!(parse_ok(&format!("{} x", name)).verb, *verb);
        }
    }
}
