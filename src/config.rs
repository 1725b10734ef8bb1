//! Bridge configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::error::BridgeError;

pub const DEFAULT_ELEMENT_ID: &str = "IframeBridge";
pub const DEFAULT_TARGET_ORIGIN: &str = "*";
pub const CLICKER: &str = "clicker";
pub const SELECTOR: &str = "selector";

/// What inserting a second bridge into the same room does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Log a warning and hand back the live instance.
    #[default]
    ReturnExisting,
    /// Fail with [`BridgeError::AlreadyInserted`].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Well-known id of the hosting iframe element.
    pub element_id: String,
    /// Tools that raise the iframe above the drawing surfaces.
    pub interactive_tools: Vec<String>,
    /// `postMessage` target origin for outbound messages.
    pub target_origin: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            element_id: DEFAULT_ELEMENT_ID.to_owned(),
            interactive_tools: vec![CLICKER.to_owned()],
            target_origin: DEFAULT_TARGET_ORIGIN.to_owned(),
        }
    }
}

impl BridgeConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `IFRAME_BRIDGE_DUPLICATE_POLICY`: `return_existing` (default) or `reject`
    /// - `IFRAME_BRIDGE_ELEMENT_ID`: default `IframeBridge`
    /// - `IFRAME_BRIDGE_INTERACTIVE_TOOLS`: comma separated, default `clicker`
    /// - `IFRAME_BRIDGE_TARGET_ORIGIN`: default `*`
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] on an unknown duplicate policy.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(env_var)
    }

    /// Build config from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] on an unknown duplicate policy.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let defaults = Self::default();
        let duplicate_policy = parse_policy(lookup("IFRAME_BRIDGE_DUPLICATE_POLICY").as_deref())?;
        let element_id = lookup("IFRAME_BRIDGE_ELEMENT_ID").unwrap_or(defaults.element_id);
        let interactive_tools = lookup("IFRAME_BRIDGE_INTERACTIVE_TOOLS")
            .map(|raw| parse_tools(&raw))
            .unwrap_or(defaults.interactive_tools);
        let target_origin = lookup("IFRAME_BRIDGE_TARGET_ORIGIN").unwrap_or(defaults.target_origin);

        Ok(Self { duplicate_policy, element_id, interactive_tools, target_origin })
    }

    /// Tool allow-list for a bridge, with the selector added on request.
    #[must_use]
    pub fn allowed_tools(&self, use_selector: bool) -> Vec<String> {
        let mut tools = self.interactive_tools.clone();
        if use_selector && !tools.iter().any(|t| t == SELECTOR) {
            tools.push(SELECTOR.to_owned());
        }
        tools
    }
}

fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_policy(raw: Option<&str>) -> Result<DuplicatePolicy, BridgeError> {
    match raw.unwrap_or("return_existing") {
        "return_existing" => Ok(DuplicatePolicy::ReturnExisting),
        "reject" => Ok(DuplicatePolicy::Reject),
        other => Err(BridgeError::Config(format!(
            "unknown IFRAME_BRIDGE_DUPLICATE_POLICY '{other}' (expected 'return_existing' or 'reject')"
        ))),
    }
}

fn parse_tools(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned).collect()
}
