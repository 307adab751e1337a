//! Interactive command shells.
//!
//! A shell reads one line at a time, splits it like a POSIX shell would and
//! hands it to the same clap parsers the one-shot command line uses. The first
//! word may be abbreviated to any unambiguous prefix of a command.

use std::io::Write;

use anyhow::{anyhow, Result};

/// Words that leave the current shell.
const LEAVE: &[&str] = &["quit", "exit", "up"];

/// What a line typed into a shell asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Empty,
    /// Leave the current shell.
    Quit,
    /// A command with its arguments, the command name expanded.
    Command(Vec<String>),
    /// The first word is a prefix of more than one command.
    Ambiguous(Vec<String>),
    Unknown(String),
    /// The line could not be split, e.g. an unterminated quote.
    Invalid(String),
}

/// Split and classify one line of input against the known command names.
pub fn parse_line(line: &str, commands: &[String]) -> Line {
    let mut words = match shlex::split(line) {
        Some(words) => words,
        None => return Line::Invalid(format!("could not parse line: {}", line.trim())),
    };

    let first = match words.first() {
        Some(first) => first.to_string(),
        None => return Line::Empty,
    };

    let known = commands
        .iter()
        .map(String::as_str)
        .chain(LEAVE.iter().copied())
        .collect::<Vec<_>>();

    let name = if known.contains(&first.as_str()) {
        first
    } else {
        let mut candidates: Vec<String> = known
            .iter()
            .filter(|c| c.starts_with(first.as_str()))
            .map(|c| c.to_string())
            .collect();
        candidates.dedup();

        match candidates.len() {
            0 => return Line::Unknown(first),
            1 => candidates.remove(0),
            _ => return Line::Ambiguous(candidates),
        }
    };

    if LEAVE.contains(&name.as_str()) {
        return Line::Quit;
    }

    words[0] = name;
    Line::Command(words)
}

/// The names of a clap command's subcommands, plus `help`.
pub fn subcommand_names(app: &clap::Command) -> Vec<String> {
    let mut names: Vec<String> = app
        .get_subcommands()
        .map(|c| c.get_name().to_string())
        .collect();

    if !names.iter().any(|n| n == "help") {
        names.push("help".to_string());
    }

    names
}

/// Parse shell words with clap, as if typed after `bin`.
///
/// Help and version requests are printed and yield `None`.
pub fn parse_args<P: clap::Parser>(
    bin: &str,
    args: &[String],
    io: &mut crate::iostreams::IoStreams,
) -> Result<Option<P>> {
    let argv = std::iter::once(bin.to_string()).chain(args.iter().cloned());

    match P::try_parse_from(argv) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => match err.kind() {
            clap::ErrorKind::DisplayHelp
            | clap::ErrorKind::DisplayVersion
            | clap::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                write!(io.out, "{}", err)?;
                Ok(None)
            }
            _ => Err(anyhow!("{}", err.to_string().trim_end())),
        },
    }
}

/// A command shell.
#[async_trait::async_trait]
pub trait Shell: Send + Sync {
    fn prompt(&self) -> String;

    /// The command names understood by `dispatch`.
    fn commands(&self) -> Vec<String>;

    /// Run one command; `args` starts with the (expanded) command name.
    async fn dispatch(&self, ctx: &mut crate::context::Context, args: Vec<String>) -> Result<()>;
}

/// Read and run commands until the user leaves the shell or input ends.
///
/// Errors from a command are printed and the shell keeps going.
pub async fn run(shell: &dyn Shell, ctx: &mut crate::context::Context<'_>) -> Result<()> {
    let commands = shell.commands();
    let prompt = shell.prompt();

    loop {
        let line = match ctx.io.read_line(&prompt)? {
            Some(line) => line,
            None => return Ok(()),
        };

        match parse_line(&line, &commands) {
            Line::Empty => {}
            Line::Quit => return Ok(()),
            Line::Command(args) => {
                log::debug!("running {:?}", args);
                if let Err(err) = shell.dispatch(ctx, args).await {
                    let cs = ctx.io.color_scheme();
                    writeln!(ctx.io.err_out, "{} {}", cs.failure_icon(), err)?;
                }
            }
            Line::Ambiguous(candidates) => {
                writeln!(
                    ctx.io.err_out,
                    "Ambiguous command, did you mean one of: {}",
                    candidates.join(", ")
                )?;
            }
            Line::Unknown(word) => {
                log::debug!("unknown command {:?}", word);
                writeln!(ctx.io.err_out, "Unknown command. Try the 'help' command.")?;
            }
            Line::Invalid(msg) => {
                writeln!(ctx.io.err_out, "{}", msg)?;
            }
        }
    }
}
