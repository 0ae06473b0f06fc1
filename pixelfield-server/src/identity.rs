//! Writer identity resolution.
//!
//! Every write is attributed to a principal — the string the rate
//! limiter keys on. How that principal is derived is a deployment
//! choice; four strategies are supported, from "trust the network" to
//! "verify a bearer token upstream".

use pixelfield_core::AgentFingerprint;

use crate::pipeline::PlaceError;

/// Longest accepted agent identifier.
const MAX_AGENT_ID_LEN: usize = 64;

/// Identity resolution strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMode {
    /// Principal is the client IP; no agent header consulted.
    NetworkOrigin,
    /// Principal is the self-asserted `x-agent-id` header.
    AssertedHeader,
    /// Bearer token verified against an external endpoint that returns
    /// the canonical agent id.
    VerifiedToken { verify_url: String },
    /// Self-asserted header, attributed on the canvas through its
    /// SHA-256 fingerprint. The default.
    HashedFingerprint,
}

impl IdentityMode {
    /// Parse a mode name from configuration.
    pub fn parse(name: &str, verify_url: Option<String>) -> Option<Self> {
        match name {
            "network" => Some(Self::NetworkOrigin),
            "header" => Some(Self::AssertedHeader),
            "token" => verify_url.map(|verify_url| Self::VerifiedToken { verify_url }),
            "fingerprint" => Some(Self::HashedFingerprint),
            _ => None,
        }
    }

    /// Whether this mode writes the attribution plane.
    pub fn attribution_enabled(&self) -> bool {
        matches!(self, Self::HashedFingerprint)
    }
}

/// Raw request credentials, extracted before resolution.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// `x-agent-id` header
    pub agent_header: Option<String>,
    /// `Authorization: Bearer …` token
    pub bearer_token: Option<String>,
    /// `x-forwarded-for` header, unparsed
    pub forwarded_for: Option<String>,
    /// `x-real-ip` header
    pub real_ip: Option<String>,
    /// Socket peer address
    pub remote_addr: String,
}

impl Credentials {
    /// The client IP: first `x-forwarded-for` hop, then `x-real-ip`,
    /// then the socket peer.
    pub fn client_ip(&self) -> String {
        if let Some(xff) = &self.forwarded_for {
            if let Some(first) = xff.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        if let Some(ip) = &self.real_ip {
            return ip.clone();
        }
        self.remote_addr.clone()
    }
}

/// A resolved writer identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Rate-limiter key
    pub principal: String,
    /// Name shown to viewers
    pub display_name: String,
    /// Attribution-plane value, when the mode supports it
    pub fingerprint: Option<AgentFingerprint>,
}

/// Shape of the external verifier's response.
#[derive(Debug, serde::Deserialize)]
struct VerifyResponse {
    agent_id: String,
}

/// Resolves request credentials into an [`Identity`].
pub struct IdentityResolver {
    mode: IdentityMode,
    http: reqwest::Client,
}

impl IdentityResolver {
    pub fn new(mode: IdentityMode) -> Self {
        Self {
            mode,
            http: reqwest::Client::new(),
        }
    }

    pub fn mode(&self) -> &IdentityMode {
        &self.mode
    }

    pub async fn resolve(&self, creds: &Credentials) -> Result<Identity, PlaceError> {
        match &self.mode {
            IdentityMode::NetworkOrigin => {
                let ip = creds.client_ip();
                Ok(Identity {
                    principal: ip.clone(),
                    display_name: ip,
                    fingerprint: None,
                })
            }
            IdentityMode::AssertedHeader => {
                let agent_id = required_agent_id(creds)?;
                Ok(Identity {
                    principal: agent_id.clone(),
                    display_name: agent_id,
                    fingerprint: None,
                })
            }
            IdentityMode::VerifiedToken { verify_url } => {
                let token = creds
                    .bearer_token
                    .as_deref()
                    .ok_or_else(|| PlaceError::Auth("missing bearer token".to_string()))?;
                let agent_id = self.verify_token(verify_url, token).await?;
                validate_agent_id(&agent_id)?;
                Ok(Identity {
                    principal: agent_id.clone(),
                    display_name: agent_id,
                    fingerprint: None,
                })
            }
            IdentityMode::HashedFingerprint => {
                let agent_id = required_agent_id(creds)?;
                let fingerprint = AgentFingerprint::digest(&agent_id);
                Ok(Identity {
                    principal: agent_id.clone(),
                    display_name: agent_id,
                    fingerprint: Some(fingerprint),
                })
            }
        }
    }

    async fn verify_token(&self, verify_url: &str, token: &str) -> Result<String, PlaceError> {
        let response = self
            .http
            .post(verify_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PlaceError::Backend(format!("verifier unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(PlaceError::Auth("token rejected".to_string()));
        }
        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| PlaceError::Backend(format!("malformed verifier response: {e}")))?;
        Ok(body.agent_id)
    }
}

fn required_agent_id(creds: &Credentials) -> Result<String, PlaceError> {
    let agent_id = creds
        .agent_header
        .as_deref()
        .ok_or_else(|| PlaceError::Auth("missing x-agent-id header".to_string()))?;
    validate_agent_id(agent_id)?;
    Ok(agent_id.to_string())
}

/// Agent ids are 1..=64 chars of `[A-Za-z0-9_.-]`.
pub fn validate_agent_id(agent_id: &str) -> Result<(), PlaceError> {
    if agent_id.is_empty() || agent_id.len() > MAX_AGENT_ID_LEN {
        return Err(PlaceError::Validation("invalid agent id length".to_string()));
    }
    if !agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(PlaceError::Validation(
            "agent id contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
