// ── Live target subscription ──
//
// While capturing, `target-start` points the beams at the authority's
// current configuration for a target and then follows its updates until
// `target-stop`, `capture-stop` or deconfigure. Updates are applied under
// the product lock so a cancelled subscription never writes again. The
// baseline fetch runs unlocked; the state is checked again afterwards.

use std::sync::Arc;

use fbfuse_api::{AuthorityClient, BackoffConfig, TargetFeed};
use tracing::{debug, info, warn};

use super::{AUTHORITY, ProductController, ProductCore, ProductState, Subscription};
use crate::error::CoreError;
use crate::model::Target;

/// Parse every beam descriptor of a target configuration.
pub(super) fn parse_all(beams: &[String]) -> Result<Vec<Target>, CoreError> {
    beams.iter().map(|b| Target::parse(b)).collect()
}

impl ProductController {
    pub async fn target_start(&self, target: &str) -> Result<(), CoreError> {
        let target = Target::parse(target)?;
        let client = {
            let core = self.lock().await?;
            self.target_authority(&core)?
        };

        let descriptor = target.to_string();
        let baseline = tokio::select! {
            biased;
            () = self.inner.env.cancel.cancelled() => {
                return Err(CoreError::Cancelled { operation: "target-start".into() });
            }
            r = client.fetch_target_config(self.proxy(), &descriptor) => {
                r.map_err(|e| CoreError::external(AUTHORITY, e))?
            }
        };
        let pointings = parse_all(&baseline.beams).map_err(|e| CoreError::ExternalServiceFailure {
            service: AUTHORITY.into(),
            message: format!("unusable target configuration: {e}"),
        })?;

        let mut core = self.lock().await?;
        if !Arc::ptr_eq(&self.target_authority(&core)?, &client) {
            return Err(CoreError::Conflict {
                message: format!(
                    "configuration authority of '{}' changed during target-start",
                    self.name()
                ),
            });
        }
        self.end_subscription(&mut core);
        self.apply_pointings(&pointings, "authority target configuration");
        self.inner
            .env
            .sensors
            .set(self.sensor("target"), descriptor);

        let cancel = self.inner.env.cancel.child_token();
        let mut feed = TargetFeed::spawn(
            client,
            self.proxy().to_string(),
            baseline,
            self.inner.env.config.target_poll_interval,
            BackoffConfig::default(),
            cancel.clone(),
        );
        let product = self.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            while let Some(update) = feed.next().await {
                let core = product.inner.core.lock().await;
                if task_cancel.is_cancelled() {
                    break;
                }
                match parse_all(&update.beams) {
                    Ok(pointings) => product.apply_pointings(&pointings, "authority update"),
                    Err(e) => {
                        warn!(product = %product.name(), error = %e, "ignoring target update");
                    }
                }
                drop(core);
            }
            feed.shutdown();
            debug!(product = %product.name(), "target subscription ended");
        });

        info!(product = %self.name(), target = %target, "target subscription started");
        core.subscription = Some(Subscription { cancel, handle });
        Ok(())
    }

    /// End the live subscription, if any. Pointings stay where they are.
    pub async fn target_stop(&self) -> Result<(), CoreError> {
        let mut core = self.lock().await?;
        self.end_subscription(&mut core);
        Ok(())
    }

    /// The authority client, provided the product is capturing.
    fn target_authority(&self, core: &ProductCore) -> Result<Arc<AuthorityClient>, CoreError> {
        core.state
            .require(&[ProductState::Capturing], self.name(), "target-start")?;
        core.authority
            .as_ref()
            .map(|a| Arc::clone(&a.client))
            .ok_or_else(|| {
                CoreError::invalid(format!(
                    "product '{}' has no configuration authority",
                    self.name()
                ))
            })
    }

    pub(super) fn end_subscription(&self, core: &mut ProductCore) {
        if let Some(subscription) = core.subscription.take() {
            subscription.cancel.cancel();
            info!(product = %self.name(), "target subscription stopped");
        }
        self.inner.env.sensors.set(self.sensor("target"), "");
    }
}
