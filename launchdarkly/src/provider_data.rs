//! Provider data structure passed to resources and data sources

use crate::api::Client;
use crate::convert::integration_config::IntegrationRegistry;
use std::sync::Arc;
use tfplug::context::Context;

#[derive(Clone)]
pub struct LaunchDarklyProviderData {
    pub client: Arc<Client>,
    pub integrations: Arc<IntegrationRegistry>,
}

impl LaunchDarklyProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            integrations: Arc::new(IntegrationRegistry::builtin()),
        }
    }

    /// Handle for one lifecycle call; every request honours `ctx`.
    pub fn session(&self, ctx: &Context) -> Session {
        Session {
            client: self.client.scoped(ctx),
            integrations: Arc::clone(&self.integrations),
        }
    }
}

pub struct Session {
    pub client: Client,
    pub integrations: Arc<IntegrationRegistry>,
}
