use std::io::Write;

use anyhow::{anyhow, Result};
use clap::Parser;

/// Manage configuration for talus.
///
/// Current respected settings:
/// - host: the root url of the talus web service
/// - user: the tag image listings are filtered by and new images are tagged with
/// - prompt: toggle interactive prompting in the terminal (default: "enabled")
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfig {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    Get(CmdConfigGet),
    Set(CmdConfigSet),
    List(CmdConfigList),
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfig {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        match &self.subcmd {
            SubCommand::Get(cmd) => cmd.run(ctx).await,
            SubCommand::Set(cmd) => cmd.run(ctx).await,
            SubCommand::List(cmd) => cmd.run(ctx).await,
        }
    }
}

/// Print the value of a given configuration key.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfigGet {
    #[clap(name = "key", required = true)]
    key: String,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfigGet {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let value = ctx.config.get(&self.key)?;
        writeln!(ctx.io.out, "{}", value)?;

        Ok(())
    }
}

/// Update configuration with a value for the given key.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfigSet {
    #[clap(name = "key", required = true)]
    key: String,

    #[clap(name = "value", required = true)]
    value: String,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfigSet {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let cs = ctx.io.color_scheme();

        // Validate the key.
        if crate::config::validate_key(&self.key).is_err() {
            return Err(anyhow!(
                "{} warning: '{}' is not a known configuration key",
                cs.warning_icon(),
                self.key
            ));
        }

        // Validate the value.
        if let Err(err) = crate::config::validate_value(&self.key, &self.value) {
            return Err(anyhow!("failed to set {:?} to {:?}: {}", self.key, self.value, err));
        }

        ctx.config.check_writable(&self.key)?;

        // Set the value.
        ctx.config.set(&self.key, &self.value)?;

        // Write the config file.
        ctx.config.write()?;

        Ok(())
    }
}

/// Print a list of configuration keys and values.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfigList {}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfigList {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        for option in crate::config::config_options() {
            let value = ctx.config.get(&option.key)?;
            writeln!(ctx.io.out, "{}={}", option.key, value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::{cmd::Command, config::Config};

    pub struct TestItem {
        name: String,
        cmd: crate::cmd_config::SubCommand,
        want_out: String,
        want_err: String,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    #[serial_test::serial]
    async fn test_cmd_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = crate::config::new_blank_config().unwrap();
        config.path = Some(path.to_string_lossy().to_string());
        config.set("user", "jane").unwrap();
        std::env::remove_var("TALUS_HOST");
        std::env::remove_var("TALUS_USER");
        let mut c = crate::config_from_env::EnvConfig::inherit_env(&mut config);

        let tests: Vec<TestItem> = vec![
            TestItem {
                name: "set a bad key".to_string(),
                cmd: crate::cmd_config::SubCommand::Set(crate::cmd_config::CmdConfigSet {
                    key: "foo".to_string(),
                    value: "bar".to_string(),
                }),
                want_out: "".to_string(),
                want_err: "'foo' is not a known configuration key".to_string(),
            },
            TestItem {
                name: "set a bad value".to_string(),
                cmd: crate::cmd_config::SubCommand::Set(crate::cmd_config::CmdConfigSet {
                    key: "prompt".to_string(),
                    value: "sometimes".to_string(),
                }),
                want_out: "".to_string(),
                want_err: "failed to set \"prompt\" to \"sometimes\": invalid values, valid values: [\"enabled\", \"disabled\"]"
                    .to_string(),
            },
            TestItem {
                name: "set a key".to_string(),
                cmd: crate::cmd_config::SubCommand::Set(crate::cmd_config::CmdConfigSet {
                    key: "host".to_string(),
                    value: "https://talus.example.com".to_string(),
                }),
                want_out: "".to_string(),
                want_err: "".to_string(),
            },
            TestItem {
                name: "get the key".to_string(),
                cmd: crate::cmd_config::SubCommand::Get(crate::cmd_config::CmdConfigGet {
                    key: "host".to_string(),
                }),
                want_out: "https://talus.example.com\n".to_string(),
                want_err: "".to_string(),
            },
            TestItem {
                name: "get a default".to_string(),
                cmd: crate::cmd_config::SubCommand::Get(crate::cmd_config::CmdConfigGet {
                    key: "prompt".to_string(),
                }),
                want_out: "enabled\n".to_string(),
                want_err: "".to_string(),
            },
            TestItem {
                name: "get an unknown key".to_string(),
                cmd: crate::cmd_config::SubCommand::Get(crate::cmd_config::CmdConfigGet {
                    key: "foo".to_string(),
                }),
                want_out: "".to_string(),
                want_err: "Key 'foo' not found".to_string(),
            },
            TestItem {
                name: "list".to_string(),
                cmd: crate::cmd_config::SubCommand::List(crate::cmd_config::CmdConfigList {}),
                want_out: "host=https://talus.example.com\nuser=jane\nprompt=enabled\n".to_string(),
                want_err: "".to_string(),
            },
        ];

        for t in tests {
            let (mut io, stdout_path, stderr_path) = crate::iostreams::IoStreams::test();
            io.set_color_enabled(false);
            let mut ctx = crate::context::Context {
                config: &mut c,
                io,
                debug: false,
                api: None,
                poll_interval: std::time::Duration::ZERO,
            };

            let cmd_config = crate::cmd_config::CmdConfig { subcmd: t.cmd };
            match cmd_config.run(&mut ctx).await {
                Ok(()) => {
                    let stdout = std::fs::read_to_string(stdout_path).unwrap();
                    let stderr = std::fs::read_to_string(stderr_path).unwrap();
                    assert!(stderr.is_empty(), "test {}: {}", t.name, stderr);
                    assert_eq!(stdout, t.want_out, "test {}", t.name);
                    assert!(t.want_err.is_empty(), "test {}: expected an error", t.name);
                }
                Err(err) => {
                    let stdout = std::fs::read_to_string(stdout_path).unwrap();
                    assert_eq!(stdout, t.want_out, "test {}", t.name);
                    if !err.to_string().contains(&t.want_err) || t.want_err.is_empty() {
                        assert_eq!(err.to_string(), t.want_err, "test {}: err mismatch", t.name);
                    }
                }
            }
        }

        // The set was written out.
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("host = \"https://talus.example.com\""), "{}", written);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_cmd_config_set_read_only() {
        let mut config = crate::config::new_blank_config().unwrap();
        std::env::set_var("TALUS_HOST", "https://env.example.com");
        let mut c = crate::config_from_env::EnvConfig::inherit_env(&mut config);

        let (io, _, _) = crate::iostreams::IoStreams::test();
        let mut ctx = crate::context::Context {
            config: &mut c,
            io,
            debug: false,
            api: None,
            poll_interval: std::time::Duration::ZERO,
        };

        let cmd = crate::cmd_config::CmdConfigSet {
            key: "host".to_string(),
            value: "https://talus.example.com".to_string(),
        };
        let result = cmd.run(&mut ctx).await;
        std::env::remove_var("TALUS_HOST");

        assert_eq!(result.unwrap_err().to_string(), "read-only value in TALUS_HOST");
    }
}
