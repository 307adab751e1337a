use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use clap_complete::{generate, Shell};

/// Generate shell completion scripts.
///
/// If you need to set up completions manually, follow the instructions below. The exact
/// config file locations might vary based on your system. Make sure to restart your
/// shell before testing whether completions are working.
///
/// ### bash
///
/// First, ensure that you install `bash-completion` using your package manager.
///
/// After, add this to your `~/.bash_profile`:
///
///         eval "$(talus completion -s bash)"
///
/// ### zsh
/// Generate a `_talus` completion script and put it somewhere in your `$fpath`:
///
///         talus completion -s zsh > /usr/local/share/zsh/site-functions/_talus
///
/// Ensure that the following is present in your `~/.zshrc`:
///         autoload -U compinit
///         compinit -i
///
/// ### fish
///
/// Generate a `talus.fish` completion script:
///
///         talus completion -s fish > ~/.config/fish/completions/talus.fish
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdCompletion {
    /// Shell type: {bash|zsh|fish|powershell|elvish}
    #[clap(short, long, default_value = "bash")]
    pub shell: Shell,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdCompletion {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        // Convert our opts into a clap command.
        let mut app = crate::Opts::command();
        let name = app.get_name().to_string();
        // Generate the completion script.
        generate(self.shell, &mut app, name, &mut ctx.io.out);

        Ok(())
    }
}
