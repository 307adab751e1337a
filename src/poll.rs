use std::time::Duration;

use crate::{
    client::TalusApi,
    error::ApiError,
    images,
    models::{state, Image},
};

/// How long to sleep between two status checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// How waiting for an image to come up ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The configuration VM is up and waiting for the user.
    Configuring { uri: Option<String> },
    Ready,
    /// The service reported an error; the message is passed on verbatim.
    Failed(String),
}

/// How waiting for an image to go away ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    Failed(String),
}

/// Watches an image's status until it reaches a state worth reporting.
///
/// There is no timeout: a wait only ends on a target state, an error the
/// service reported on the image, or a failed remote call.
pub struct Poller<'a> {
    api: &'a dyn TalusApi,
    interval: Duration,
}

impl<'a> Poller<'a> {
    pub fn new(api: &'a dyn TalusApi) -> Self {
        Poller {
            api,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Wait for a created, imported or configured image.
    ///
    /// With `interactive`, stop as soon as the configuration VM is up and
    /// report where to reach it. Otherwise wait until the image is ready.
    pub async fn wait_for_image(&self, image: &mut Image, interactive: bool) -> Result<WaitOutcome, ApiError> {
        loop {
            if let Some(err) = image.status.error() {
                return Ok(WaitOutcome::Failed(err));
            }

            if interactive && image.status.is(state::CONFIGURING) {
                return Ok(WaitOutcome::Configuring {
                    uri: image.status.vnc_uri().map(str::to_string),
                });
            }

            if image.status.is(state::READY) {
                return Ok(WaitOutcome::Ready);
            }

            self.tick(image).await?;
        }
    }

    /// Wait for the service to finish deleting an image.
    ///
    /// The record disappearing is what a finished delete looks like.
    pub async fn wait_for_delete(&self, image: &mut Image) -> Result<DeleteOutcome, ApiError> {
        while image.status.is(state::DELETE) {
            if let Some(err) = image.status.error() {
                return Ok(DeleteOutcome::Failed(err));
            }

            match self.tick(image).await {
                Ok(()) => {}
                Err(ApiError::NotFound(_)) => return Ok(DeleteOutcome::Deleted),
                Err(err) => return Err(err),
            }
        }

        match image.status.error() {
            Some(err) => Ok(DeleteOutcome::Failed(err)),
            None => Ok(DeleteOutcome::Deleted),
        }
    }

    async fn tick(&self, image: &mut Image) -> Result<(), ApiError> {
        tokio::time::sleep(self.interval).await;
        images::refresh(self.api, image).await?;
        log::debug!("image {} is {}", image.id(), image.status.name);
        Ok(())
    }
}
