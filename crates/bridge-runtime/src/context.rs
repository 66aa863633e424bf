//! Where a piece of code is running, and therefore which transport it can use.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The isolated execution contexts of an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Realm {
    /// Privileged worker; hosts the dispatcher.
    Background,
    /// Script injected into a page with a reduced extension API.
    ContentScript,
    /// The page's own scripts; no extension API, but the page session.
    Page,
}

/// Browser families with different messaging capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserFamily {
    Chromium,
    Firefox,
}

/// The calling context of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub realm: Realm,
    pub browser: BrowserFamily,
}

impl ExecutionContext {
    pub const fn new(realm: Realm, browser: BrowserFamily) -> Self {
        Self { realm, browser }
    }

    /// Whether native extension messaging is available here.
    ///
    /// Firefox does not expose `runtime.sendMessage` to page scripts even when
    /// the extension lists the page as externally connectable; everything
    /// else can message the background worker directly.
    #[must_use]
    pub const fn can_use_native_messaging(&self) -> bool {
        !matches!(
            (self.realm, self.browser),
            (Realm::Page, BrowserFamily::Firefox)
        )
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.realm, self.browser)
    }
}
