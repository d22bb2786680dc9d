//! Chooses the parser for an incoming webhook from its headers.

use crate::webhook::{
    BitbucketParser, DirectParser, EventParser, GithubParser, JiraParser, ParserError,
    ShortcutParser, ShortcutSettings, StoryFetcher, WebhookHeaders,
};
use std::sync::Arc;
use tracing::debug;

/// Header carried by every Shortcut webhook
pub const SHORTCUT_SIGNATURE_HEADER: &str = "shortcut-signature";

/// Picks a provider parser per request
///
/// Holds the validated Shortcut settings (if the integration is configured) so
/// that Shortcut parsers can be built without consulting the environment.
#[derive(Clone, Default)]
pub struct ParserSelector {
    shortcut: Option<(Arc<ShortcutSettings>, Arc<dyn StoryFetcher>)>,
}

impl std::fmt::Debug for ParserSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserSelector")
            .field("shortcut_configured", &self.shortcut.is_some())
            .finish()
    }
}

impl ParserSelector {
    /// Selector without a Shortcut integration
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable Shortcut parsing with validated settings and a story source
    pub fn with_shortcut(
        mut self,
        settings: Arc<ShortcutSettings>,
        fetcher: Arc<dyn StoryFetcher>,
    ) -> Self {
        self.shortcut = Some((settings, fetcher));
        self
    }

    /// Pick the parser for a webhook.
    ///
    /// Precedence on the `User-Agent` header: `GitHub`, `Bitbucket`,
    /// `Atlassian`, then `Apache-HttpClient` together with a
    /// `Shortcut-Signature` header. Everything else is a direct call.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::ShortcutConfiguration`] for a Shortcut webhook
    /// when the Shortcut integration is not configured.
    pub fn select(&self, headers: &WebhookHeaders) -> Result<Box<dyn EventParser>, ParserError> {
        let user_agent = headers.get("user-agent").unwrap_or_default();

        let parser: Box<dyn EventParser> = if user_agent.contains("GitHub") {
            Box::new(GithubParser::new())
        } else if user_agent.contains("Bitbucket") {
            Box::new(BitbucketParser::new())
        } else if user_agent.contains("Atlassian") {
            Box::new(JiraParser::new())
        } else if user_agent.contains("Apache-HttpClient")
            && headers.contains(SHORTCUT_SIGNATURE_HEADER)
        {
            let (settings, fetcher) =
                self.shortcut
                    .as_ref()
                    .ok_or_else(|| ParserError::ShortcutConfiguration {
                        variable: "shortcut".to_string(),
                        message: "Shortcut integration is not configured".to_string(),
                    })?;
            Box::new(ShortcutParser::new(settings.clone(), fetcher.clone()))
        } else {
            Box::new(DirectParser::new())
        };

        debug!(provider = %parser.provider(), user_agent = %user_agent, "Selected parser");
        Ok(parser)
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
