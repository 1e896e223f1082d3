//! Ordered chain of free-text parsers.
//!
//! Consulted for every line that did not resolve to a command. The first
//! parser to return a reply wins; the rest are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, warn};

use super::MessageRequest;

/// A free-text parser.
///
/// `Ok(None)` passes the line on to the next parser. A parser may annotate
/// the request (for example [`MessageRequest::url`]) for the ones after it.
#[async_trait]
pub trait ContentParser: Send + Sync {
    fn name(&self) -> &str;

    async fn parse(&self, req: &mut MessageRequest) -> anyhow::Result<Option<String>>;
}

/// Shared handle to one session's parser chain.
#[derive(Clone, Default)]
pub struct ParserChain {
    parsers: Arc<RwLock<Vec<Arc<dyn ContentParser>>>>,
}

impl ParserChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with the built-in URL detector at its head.
    pub fn with_builtins() -> Self {
        let chain = Self::new();
        chain.push(UrlDetector);
        chain
    }

    /// Append a parser at the end of the chain.
    pub fn push(&self, parser: impl ContentParser + 'static) {
        self.parsers.write().push(Arc::new(parser));
    }

    /// Remove every parser called `name`.
    pub fn remove(&self, name: &str) -> bool {
        let mut parsers = self.parsers.write();
        let before = parsers.len();
        parsers.retain(|p| p.name() != name);
        parsers.len() != before
    }

    pub fn names(&self) -> Vec<String> {
        self.parsers
            .read()
            .iter()
            .map(|p| p.name().to_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parsers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.read().is_empty()
    }

    /// Run the chain. Failing parsers are logged and skipped.
    pub async fn run(&self, req: &mut MessageRequest) -> Option<String> {
        let parsers: Vec<Arc<dyn ContentParser>> = self.parsers.read().clone();

        for parser in parsers {
            match parser.parse(req).await {
                Ok(Some(reply)) => {
                    debug!(parser = parser.name(), "parser claimed line");
                    return Some(reply);
                }
                Ok(None) => {}
                Err(e) => warn!(parser = parser.name(), error = %e, "parser failed"),
            }
        }
        None
    }
}

lazy_static! {
    static ref URL_RE: Regex =
        Regex::new(r#"(?i)\bhttps?://[^\s<>"']+"#).expect("URL pattern is valid");
}

/// Records the first URL in the text on [`MessageRequest::url`]. Never
/// replies.
pub struct UrlDetector;

#[async_trait]
impl ContentParser for UrlDetector {
    fn name(&self) -> &str {
        "url"
    }

    async fn parse(&self, req: &mut MessageRequest) -> anyhow::Result<Option<String>> {
        if req.url.is_none() {
            req.url = URL_RE.find(&req.text).map(|m| {
                m.as_str()
                    .trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])
                    .to_owned()
            });
        }
        Ok(None)
    }
}
