//! Flag binding on top of clap.
//!
//! # Responsibilities
//! - Define the value protocol custom flags implement (`FlagValue`)
//! - Bind a `FlagValue` onto a `clap::Command` and replay parsed
//!   occurrences through it, in command-line order
//! - Record which flags were set explicitly, for post-parse introspection
//!
//! # Design Decisions
//! - clap owns tokenizing; values land in plain option structs
//! - `FlagSet` is produced by the parse step and passed explicitly to
//!   `complete`, it never points back into the command

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt;

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Args, Command, FromArgMatches};

/// Type tag reported by a [`FlagValue`].
///
/// Tells the binder whether the flag may repeat and what to show as the
/// value placeholder in help output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Takes exactly one value; a later occurrence replaces an earlier one.
    Scalar(&'static str),
    /// May be repeated; every occurrence contributes one element.
    Repeated(&'static str),
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Scalar(name) | ValueType::Repeated(name) => name,
        }
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self, ValueType::Repeated(_))
    }
}

/// A custom flag value.
///
/// `Display` renders the current value for help and debug output.
pub trait FlagValue: fmt::Display {
    type Err: std::error::Error + Send + Sync + 'static;

    /// Consume one raw occurrence of the flag.
    fn set(&mut self, raw: &str) -> Result<(), Self::Err>;

    /// Type tag of this value.
    fn value_type(&self) -> ValueType;
}

/// Build the clap argument for a [`FlagValue`].
///
/// Values are never boolean-like: each occurrence requires an argument.
pub fn value_arg<V: FlagValue>(value: &V, name: &'static str, help: &'static str) -> Arg {
    let value_type = value.value_type();
    let action = if value_type.is_repeated() {
        ArgAction::Append
    } else {
        ArgAction::Set
    };

    Arg::new(name)
        .long(name)
        .help(help)
        .value_name(value_type.name())
        .num_args(1)
        .action(action)
        .value_parser(value_parser!(String))
}

/// Feed every parsed occurrence of `name` through [`FlagValue::set`].
///
/// Stops at the first rejected occurrence. The value's own error is
/// expected to quote the raw text.
pub fn apply_value<V: FlagValue>(
    value: &mut V,
    matches: &ArgMatches,
    name: &str,
) -> Result<(), clap::Error> {
    let Some(raws) = matches.get_many::<String>(name) else {
        return Ok(());
    };

    for raw in raws {
        value.set(raw).map_err(|err| {
            clap::Error::raw(
                ErrorKind::ValueValidation,
                format!("invalid value for \"--{name}\" flag: {err}"),
            )
        })?;
    }
    Ok(())
}

/// Post-parse view of which flags exist and which have been set.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    known: BTreeSet<String>,
    changed: BTreeSet<String>,
}

impl FlagSet {
    /// Capture the flags of `cmd` and the ones the user set in `matches`.
    pub fn from_matches(cmd: &Command, matches: &ArgMatches) -> Self {
        let mut flags = Self::default();
        for arg in cmd.get_arguments() {
            let id = arg.get_id().as_str();
            flags.known.insert(id.to_string());
            if matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            ) {
                flags.changed.insert(id.to_string());
            }
        }
        flags
    }

    /// Whether a flag with this name was bound.
    pub fn lookup(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Whether the flag was set explicitly or has been marked resolved.
    pub fn changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    /// Mark a bound flag as resolved. Returns `false` for unknown flags.
    pub fn mark_changed(&mut self, name: &str) -> bool {
        if !self.lookup(name) {
            return false;
        }
        self.changed.insert(name.to_string());
        true
    }
}

/// Bind `T` onto `cmd`, parse `args`, and fill `T` from the result.
///
/// The first element of `args` is the binary name.
pub fn parse_from<T, I, A>(cmd: Command, args: I) -> Result<(T, FlagSet), clap::Error>
where
    T: Args + FromArgMatches,
    I: IntoIterator<Item = A>,
    A: Into<OsString> + Clone,
{
    let mut cmd = T::augment_args(cmd);
    let matches = cmd.try_get_matches_from_mut(args)?;
    let flags = FlagSet::from_matches(&cmd, &matches);
    let value = T::from_arg_matches(&matches).map_err(|err| err.format(&mut cmd))?;
    Ok((value, flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Words(Vec<String>);

    #[derive(Debug, thiserror::Error)]
    #[error("empty word {0:?}")]
    struct EmptyWord(String);

    impl fmt::Display for Words {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "[{}]", self.0.join(", "))
        }
    }

    impl FlagValue for Words {
        type Err = EmptyWord;

        fn set(&mut self, raw: &str) -> Result<(), EmptyWord> {
            if raw.is_empty() {
                return Err(EmptyWord(raw.to_string()));
            }
            self.0.push(raw.to_string());
            Ok(())
        }

        fn value_type(&self) -> ValueType {
            ValueType::Repeated("word")
        }
    }

    fn word_command() -> Command {
        Command::new("test")
            .arg(value_arg(&Words::default(), "word", "Repeatable word"))
            .arg(Arg::new("name").long("name").default_value("anon"))
    }

    #[test]
    fn test_repeated_values_keep_order() {
        let matches = word_command()
            .try_get_matches_from(["test", "--word", "b", "--word=a", "--word", "c"])
            .unwrap();

        let mut words = Words::default();
        apply_value(&mut words, &matches, "word").unwrap();
        assert_eq!(words.0, vec!["b", "a", "c"]);
        assert_eq!(words.to_string(), "[b, a, c]");
    }

    #[test]
    fn test_rejected_value_echoes_raw_input() {
        let matches = word_command()
            .try_get_matches_from(["test", "--word", "ok", "--word="])
            .unwrap();

        let mut words = Words::default();
        let err = apply_value(&mut words, &matches, "word").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        let msg = err.to_string();
        assert!(msg.contains("invalid value for \"--word\" flag: empty word \"\""));
        assert!(!msg.contains("\n\n\n"));
        assert_eq!(words.0, vec!["ok"]);
    }

    #[test]
    fn test_flag_set_tracks_explicit_values() {
        let mut cmd = word_command();
        let matches = cmd.try_get_matches_from_mut(["test", "--word", "x"]).unwrap();
        let mut flags = FlagSet::from_matches(&cmd, &matches);

        assert!(flags.lookup("word"));
        assert!(flags.lookup("name"));
        assert!(!flags.lookup("missing"));

        assert!(flags.changed("word"));
        // Defaults do not count as set.
        assert!(!flags.changed("name"));

        assert!(flags.mark_changed("name"));
        assert!(flags.changed("name"));
        assert!(!flags.mark_changed("missing"));
        assert!(!flags.changed("missing"));
    }
}
