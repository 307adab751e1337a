use std::{sync::Arc, time::Duration};

use anyhow::Result;

use crate::{client::TalusApi, config::Config, poll::Poller};

pub struct Context<'a> {
    pub config: &'a mut (dyn Config + 'a),
    pub io: crate::iostreams::IoStreams,
    pub debug: bool,
    /// Talks to the service instead of a client built from the config.
    pub api: Option<Arc<dyn TalusApi>>,
    pub poll_interval: Duration,
}

impl Context<'_> {
    pub fn new(config: &mut dyn Config) -> Context {
        // Let's get our IO streams.
        let mut io = crate::iostreams::IoStreams::system();

        // Set the prompt.
        if let Ok(prompt) = config.get("prompt") {
            if prompt == "disabled" {
                io.set_never_prompt(true)
            }
        }

        Context {
            config,
            io,
            debug: false,
            api: None,
            poll_interval: crate::poll::DEFAULT_INTERVAL,
        }
    }

    /// The client for the configured talus host.
    pub fn api_client(&self) -> Result<Arc<dyn TalusApi>> {
        if let Some(api) = &self.api {
            return Ok(api.clone());
        }

        let host = self.config.get("host")?;
        log::debug!("using talus host {}", host);

        Ok(Arc::new(crate::client::Client::new(&host)?))
    }

    /// The configured user, if any.
    pub fn user(&self) -> Option<String> {
        self.config.get("user").ok().filter(|u| !u.trim().is_empty())
    }

    pub fn poller<'b>(&self, api: &'b dyn TalusApi) -> Poller<'b> {
        Poller::new(api).with_interval(self.poll_interval)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::config::Config;

    #[test]
    fn test_context_from_config() {
        let mut config = crate::config::new_blank_config().unwrap();
        config.set("prompt", "disabled").unwrap();
        config.set("user", "  ").unwrap();
        config.set("host", "talus.example.com").unwrap();

        let ctx = crate::context::Context::new(&mut config);
        assert!(!ctx.io.can_prompt());
        assert_eq!(ctx.user(), None);
        assert!(ctx.api_client().is_ok());
    }
}
