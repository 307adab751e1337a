//! The talus command line tool.
#![deny(missing_docs)]

// Always export the cmd_* modules as public so that it tells us when we are
// missing docs.

mod client;
mod cmd;
/// The completion command.
pub mod cmd_completion;
/// The config command.
pub mod cmd_config;
/// The image command and its shell.
pub mod cmd_image;
mod colors;
mod config;
mod config_file;
mod config_from_env;
mod config_from_file;
mod config_map;
mod context;
mod editor;
mod error;
mod images;
mod iostreams;
mod models;
mod poll;
mod search;
mod shell;
#[cfg(test)]
mod testing;
mod tree;
mod types;

use std::io::Write;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use slog::Drain;

/// Manage talus VM images from the command line.
///
/// Without a command this starts an interactive shell that reads commands
/// from standard input.
///
/// Environment variables that can be used with talus.
///
/// TALUS_HOST: the root url of the talus web service, e.g.
/// "http://talus.example.com:8001". Takes precedence over the config file.
///
/// TALUS_USER: the tag image listings are filtered by and new images are
/// tagged with. Defaults to $USER.
///
/// DEBUG: set to any value to enable verbose output to standard error.
///
/// NO_COLOR: set to any value to avoid printing ANSI escape sequences for color output.
///
/// CLICOLOR: set to "0" to disable printing ANSI colors in output.
///
/// CLICOLOR_FORCE: set to a value other than "0" to keep ANSI colors in output
/// even when the output is piped.
///
/// TALUS_CONFIG_DIR: the directory where talus will store configuration files.
/// Default: "$XDG_CONFIG_HOME/talus" or "$HOME/.config/talus".
#[derive(Parser, Debug, Clone)]
#[clap(name = "talus", version = clap::crate_version!(), author = clap::crate_authors!("\n"))]
struct Opts {
    /// Print debug info
    #[clap(long, global = true, env)]
    debug: bool,

    #[clap(subcommand)]
    subcmd: Option<SubCommand>,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    Completion(cmd_completion::CmdCompletion),
    Config(cmd_config::CmdConfig),
    Image(cmd_image::CmdImage),
}

#[async_trait::async_trait]
impl crate::cmd::Command for Opts {
    async fn run(&self, ctx: &mut context::Context) -> Result<()> {
        match &self.subcmd {
            Some(SubCommand::Completion(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Config(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Image(cmd)) => cmd.run(ctx).await,
            None => shell::run(&RootShell, ctx).await,
        }
    }
}

/// The `talus>` shell.
struct RootShell;

#[async_trait::async_trait]
impl shell::Shell for RootShell {
    fn prompt(&self) -> String {
        "talus> ".to_string()
    }

    fn commands(&self) -> Vec<String> {
        shell::subcommand_names(&Opts::command())
    }

    async fn dispatch(&self, ctx: &mut context::Context, args: Vec<String>) -> Result<()> {
        let mut opts = match shell::parse_args::<Opts>("talus", &args, &mut ctx.io)? {
            Some(opts) => opts,
            None => return Ok(()),
        };

        opts.subcmd = match opts.subcmd.take() {
            None => return Ok(()),
            Some(SubCommand::Image(cmd)) => Some(SubCommand::Image(cmd.in_shell())),
            other => other,
        };

        crate::cmd::Command::run(&opts, ctx).await
    }
}

/// Route `log` records into a stderr slog drain for as long as the guard lives.
fn init_logging(debug: bool) -> Result<slog_scope::GlobalLoggerGuard> {
    let (level, log_level) = if debug {
        (slog::Level::Debug, log::Level::Debug)
    } else {
        (slog::Level::Warning, log::Level::Warn)
    };

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let logger = slog::Logger::root(drain, slog::o!());

    let guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init_with_level(log_level)?;

    Ok(guard)
}

async fn do_main(opts: Opts) -> Result<i32> {
    let _guard = init_logging(opts.debug)?;

    // Let's get our configuration.
    let mut c = crate::config_file::parse_default_config()?;
    let mut config = crate::config_from_env::EnvConfig::inherit_env(&mut c);
    let mut ctx = crate::context::Context::new(&mut config);

    // Set our debug flag.
    ctx.debug = opts.debug;

    Ok(run_cmd(&opts, &mut ctx).await)
}

async fn run_cmd(cmd: &impl crate::cmd::Command, ctx: &mut context::Context<'_>) -> i32 {
    if let Err(err) = cmd.run(ctx).await {
        let _ = writeln!(ctx.io.err_out, "{}", err);
        return 1;
    }

    0
}

#[tokio::main]
async fn main() {
    // Parse the command line arguments.
    let opts: Opts = Opts::parse();

    let code = match do_main(opts).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", err);
            1
        }
    };

    std::process::exit(code);
}
