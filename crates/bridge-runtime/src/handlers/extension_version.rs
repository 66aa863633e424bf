use crate::registry::RequestHandler;
use async_trait::async_trait;
use bridge_types::{ExtensionVersion, ExtensionVersionResponse};

/// Answers `EXTENSION_VERSION` with the runtime's version string.
#[derive(Debug, Clone)]
pub struct ExtensionVersionHandler {
    version: String,
}

impl ExtensionVersionHandler {
    pub fn new() -> Self {
        Self::with_version(env!("CARGO_PKG_VERSION"))
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for ExtensionVersionHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestHandler<ExtensionVersion> for ExtensionVersionHandler {
    async fn handle(&self, _request: ()) -> anyhow::Result<ExtensionVersionResponse> {
        Ok(ExtensionVersionResponse {
            version: self.version.clone(),
        })
    }
}
