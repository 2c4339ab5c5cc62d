//! Interactive credential flows
//!
//! The two host-facing collaborator ports for interactive sign-in (a
//! platform-native credential prompt and an OAuth redirect/app-switch flow)
//! plus [`ChannelOAuthFlow`], a callback-to-async bridge the host feeds
//! redirect URLs into.
//!
//! Presentation (opening the browser or the system sheet) is the host's
//! job; these types only carry the request out and the resolution back.

use crate::error::PromptError;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

/// One-shot platform credential request.
///
/// The digest, not the raw nonce, travels with the request; the identity
/// backend later checks the digest embedded in the signed token against the
/// raw nonce presented at exchange time.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    /// SHA-256 hex digest of the raw nonce bound into the signed credential
    pub nonce_digest: String,
    /// Whether the email claim is requested
    pub requests_email: bool,
    /// Whether the full-name claim is requested
    pub requests_full_name: bool,
}

/// A signed credential returned by the platform prompt.
#[derive(Debug, Clone)]
pub struct PlatformCredential {
    /// Signed identity token carrying the nonce digest
    pub identity_token: String,
    /// Email claim, absent when the user relays or withholds it
    pub email: Option<String>,
    /// Full-name claim, only supplied on first authorization
    pub full_name: Option<String>,
}

/// Platform-native interactive credential provider.
///
/// Implementations present a system sign-in affordance and resolve exactly
/// once per request: with a credential, a cancellation, a
/// capability-absence signal, or a failure.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Present the prompt and wait for its single resolution.
    async fn request_credential(
        &self,
        request: CredentialRequest,
    ) -> Result<PlatformCredential, PromptError>;
}

/// Tokens produced by an OAuth redirect or app-switch flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthTokens {
    /// OIDC identity token
    pub id_token: Option<String>,
    /// OAuth access token
    pub access_token: Option<String>,
}

impl OAuthTokens {
    /// Whether the flow produced anything exchangeable
    pub fn is_empty(&self) -> bool {
        self.id_token.is_none() && self.access_token.is_none()
    }
}

/// OAuth redirect/app-switch flow port.
///
/// `begin` suspends until the flow resolves; the host delivers the redirect
/// back through [`OAuthFlow::handle_callback`] (usually via the facade's
/// `handle_callback`).
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Start an interactive flow and wait for the provider tokens.
    async fn begin(&self) -> Result<OAuthTokens, PromptError>;

    /// Deliver a host-received redirect URL. Returns `true` when this flow
    /// consumed it.
    fn handle_callback(&self, url: &Url) -> bool;
}

/// Callback-to-async bridge for OAuth redirect flows.
///
/// `begin` parks exactly one continuation; `handle_callback` (or
/// [`ChannelOAuthFlow::resolve`]) completes it. First writer wins; a second
/// completion finds no pending continuation and is discarded. Starting a
/// second flow while one is pending is a caller error.
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use authkit::interactive::{ChannelOAuthFlow, OAuthFlow};
/// use std::sync::Arc;
///
/// let flow = Arc::new(ChannelOAuthFlow::new());
/// let waiter = Arc::clone(&flow);
/// let handle = tokio::spawn(async move { waiter.begin().await });
///
/// // ... the host receives the redirect and feeds it back:
/// let url = url::Url::parse("myapp://callback?id_token=abc")?;
/// flow.handle_callback(&url);
/// let tokens = handle.await??;
/// assert_eq!(tokens.id_token.as_deref(), Some("abc"));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ChannelOAuthFlow {
    pending: Mutex<Option<oneshot::Sender<Result<OAuthTokens, PromptError>>>>,
}

impl ChannelOAuthFlow {
    /// Create a bridge with no pending flow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete the pending flow with an explicit outcome. Returns `false`
    /// when no flow is pending (already resolved, or never begun).
    pub fn resolve(&self, outcome: Result<OAuthTokens, PromptError>) -> bool {
        let sender = match self.pending.lock() {
            Err(_) => return false,
            Ok(mut pending) => pending.take(),
        };
        match sender {
            None => false,
            // A closed receiver means the attempt was abandoned; either way
            // this completion is consumed.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
        }
    }

    fn parse_callback(url: &Url) -> Option<Result<OAuthTokens, PromptError>> {
        let mut tokens = OAuthTokens::default();
        let mut error: Option<String> = None;

        let fragment_pairs = url
            .fragment()
            .map(|fragment| url::form_urlencoded::parse(fragment.as_bytes()))
            .into_iter()
            .flatten();
        for (key, value) in url.query_pairs().chain(fragment_pairs) {
            match key.as_ref() {
                "id_token" => tokens.id_token = Some(value.into_owned()),
                "access_token" => tokens.access_token = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(code) = error {
            let outcome = if code == "access_denied" {
                PromptError::Cancelled
            } else {
                PromptError::Failed(code)
            };
            return Some(Err(outcome));
        }
        if tokens.is_empty() {
            // Not an OAuth callback of ours
            return None;
        }
        Some(Ok(tokens))
    }
}

#[async_trait]
impl OAuthFlow for ChannelOAuthFlow {
    async fn begin(&self) -> Result<OAuthTokens, PromptError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| PromptError::Failed("flow state poisoned".to_string()))?;
            // One attempt in flight at a time (error case first)
            if pending.is_some() {
                return Err(PromptError::Failed(
                    "another sign-in attempt is already in progress".to_string(),
                ));
            }
            *pending = Some(tx);
        }

        debug!("awaiting OAuth callback");
        match rx.await {
            Err(_) => Err(PromptError::Failed(
                "the sign-in flow was abandoned".to_string(),
            )),
            Ok(outcome) => outcome,
        }
    }

    fn handle_callback(&self, url: &Url) -> bool {
        let Some(outcome) = Self::parse_callback(url) else {
            return false;
        };
        if !self.resolve(outcome) {
            warn!("received OAuth callback with no pending flow");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_callback_resolves_pending_flow() {
        let flow = Arc::new(ChannelOAuthFlow::new());
        let waiter = Arc::clone(&flow);
        let handle = tokio::spawn(async move { waiter.begin().await });

        // Give begin() a chance to park its continuation
        tokio::task::yield_now().await;
        while !flow.handle_callback(&Url::parse("app://cb?id_token=tok").unwrap()) {
            tokio::task::yield_now().await;
        }

        let tokens = handle.await.unwrap().unwrap();
        assert_eq!(tokens.id_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_fragment_tokens_are_parsed() {
        let url = Url::parse("app://cb#access_token=frag-tok&state=xyz").unwrap();
        let outcome = ChannelOAuthFlow::parse_callback(&url).unwrap().unwrap();
        assert_eq!(outcome.access_token.as_deref(), Some("frag-tok"));
    }

    #[tokio::test]
    async fn test_unrelated_url_is_not_handled() {
        let flow = ChannelOAuthFlow::new();
        let url = Url::parse("app://cb?state=xyz").unwrap();
        assert!(!flow.handle_callback(&url));
    }

    #[tokio::test]
    async fn test_access_denied_maps_to_cancelled() {
        let url = Url::parse("app://cb?error=access_denied").unwrap();
        let outcome = ChannelOAuthFlow::parse_callback(&url).unwrap();
        assert_eq!(outcome.unwrap_err(), PromptError::Cancelled);

        let url = Url::parse("app://cb?error=server_error").unwrap();
        let outcome = ChannelOAuthFlow::parse_callback(&url).unwrap();
        assert_eq!(
            outcome.unwrap_err(),
            PromptError::Failed("server_error".to_string())
        );
    }

    #[tokio::test]
    async fn test_second_begin_while_pending_is_rejected() {
        let flow = Arc::new(ChannelOAuthFlow::new());
        let waiter = Arc::clone(&flow);
        let handle = tokio::spawn(async move { waiter.begin().await });
        tokio::task::yield_now().await;

        // The second attempt fails without disturbing the first
        let second = flow.begin().await;
        assert!(matches!(second, Err(PromptError::Failed(_))));

        assert!(flow.resolve(Ok(OAuthTokens {
            id_token: Some("tok".to_string()),
            access_token: None,
        })));
        let tokens = handle.await.unwrap().unwrap();
        assert_eq!(tokens.id_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let flow = Arc::new(ChannelOAuthFlow::new());
        let waiter = Arc::clone(&flow);
        let handle = tokio::spawn(async move { waiter.begin().await });
        tokio::task::yield_now().await;

        let first = loop {
            if flow.resolve(Ok(OAuthTokens {
                id_token: Some("first".to_string()),
                access_token: None,
            })) {
                break true;
            }
            tokio::task::yield_now().await;
        };
        assert!(first);

        // Later completions find no pending continuation
        assert!(!flow.resolve(Ok(OAuthTokens {
            id_token: Some("second".to_string()),
            access_token: None,
        })));

        let tokens = handle.await.unwrap().unwrap();
        assert_eq!(tokens.id_token.as_deref(), Some("first"));
    }
}
