//! Reasoning-service credential pool.
//!
//! Loads newline-delimited API keys, probes them once per run, caches
//! the working subset for the next run, and hands out one key per call
//! attempt. Selection for concurrent callers is stateless random choice
//! (`pick`); the round-robin cursor (`rotate`) needs `&mut self` and so
//! is only available to a single owner.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::CredentialError;
use crate::llm::Reasoner;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// One API key. The raw token is never logged.
pub struct Credential {
    id: usize,
    token: SecretString,
}

impl Credential {
    fn new(id: usize, token: String) -> Self {
        Self {
            id,
            token: SecretString::new(token),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }

    /// Last four characters, for logs.
    pub fn fingerprint(&self) -> String {
        let raw = self.token.expose_secret();
        let tail: String = raw
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(#{} {})", self.id, self.fingerprint())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Unknown,
    Valid,
    Invalid,
}

/// Where `load` found the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadedFrom {
    /// Previously validated cache; no probe needed.
    Cache,
    /// Raw list; statuses are unknown until probed.
    RawList,
    /// Neither file had any keys.
    Nothing,
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

struct PoolState {
    credentials: Vec<Arc<Credential>>,
    status: Vec<CredentialStatus>,
}

impl PoolState {
    fn new(tokens: Vec<String>, status: CredentialStatus) -> Self {
        let status = vec![status; tokens.len()];
        let credentials = tokens
            .into_iter()
            .enumerate()
            .map(|(id, t)| Arc::new(Credential::new(id, t)))
            .collect();
        Self { credentials, status }
    }

    fn active(&self) -> Vec<&Arc<Credential>> {
        self.credentials
            .iter()
            .zip(&self.status)
            .filter(|(_, s)| **s != CredentialStatus::Invalid)
            .map(|(c, _)| c)
            .collect()
    }
}

pub struct CredentialPool {
    keys_path: PathBuf,
    cache_path: PathBuf,
    state: RwLock<PoolState>,
    loaded_from: LoadedFrom,
    cursor: usize,
}

impl CredentialPool {
    /// Load keys, preferring the validated cache when it is non-empty.
    pub fn load(keys_path: &Path, cache_path: &Path) -> Result<Self> {
        let cached = read_tokens(cache_path)?;
        let (tokens, loaded_from, status) = if !cached.is_empty() {
            info!(path = %cache_path.display(), count = cached.len(), "Loaded cached working credentials");
            (cached, LoadedFrom::Cache, CredentialStatus::Valid)
        } else {
            let raw = read_tokens(keys_path)?;
            if raw.is_empty() {
                warn!(path = %keys_path.display(), "No credentials found");
                (raw, LoadedFrom::Nothing, CredentialStatus::Unknown)
            } else {
                info!(path = %keys_path.display(), count = raw.len(), "Loaded raw credential list");
                (raw, LoadedFrom::RawList, CredentialStatus::Unknown)
            }
        };

        Ok(Self {
            keys_path: keys_path.to_path_buf(),
            cache_path: cache_path.to_path_buf(),
            state: RwLock::new(PoolState::new(tokens, status)),
            loaded_from,
            cursor: 0,
        })
    }

    /// Pool over an explicit token list, with no backing files to persist to.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self {
            keys_path: PathBuf::new(),
            cache_path: PathBuf::new(),
            state: RwLock::new(PoolState::new(tokens, CredentialStatus::Unknown)),
            loaded_from: LoadedFrom::RawList,
            cursor: 0,
        }
    }

    pub fn loaded_from(&self) -> LoadedFrom {
        self.loaded_from
    }

    /// Probe every key from the raw list one at a time, keep the ones
    /// that answer, and persist them as the cache for the next run.
    ///
    /// Returns the number of working credentials.
    pub async fn validate_all(&self, reasoner: &dyn Reasoner) -> usize {
        let tokens = if self.keys_path.as_os_str().is_empty() {
            self.state
                .read()
                .credentials
                .iter()
                .map(|c| c.expose().to_string())
                .collect()
        } else {
            match read_tokens(&self.keys_path) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "Could not re-read credential list, probing loaded set");
                    self.state
                        .read()
                        .credentials
                        .iter()
                        .map(|c| c.expose().to_string())
                        .collect()
                }
            }
        };

        info!(count = tokens.len(), provider = reasoner.name(), "Validating credentials");

        let mut state = PoolState::new(tokens, CredentialStatus::Unknown);
        for (i, cred) in state.credentials.iter().enumerate() {
            match reasoner.probe(cred.expose()).await {
                Ok(()) => {
                    debug!(key = %cred.fingerprint(), "Credential is valid");
                    state.status[i] = CredentialStatus::Valid;
                }
                Err(e) => {
                    warn!(key = %cred.fingerprint(), error = %e, "Credential is invalid");
                    state.status[i] = CredentialStatus::Invalid;
                }
            }
        }

        let working: Vec<&str> = state.active().iter().map(|c| c.expose()).collect();
        let count = working.len();

        if !self.cache_path.as_os_str().is_empty() {
            if let Err(e) = write_tokens(&self.cache_path, &working) {
                warn!(error = %e, "Failed to persist working credentials");
            }
        }

        *self.state.write() = state;
        info!(working = count, "Credential validation complete");
        count
    }

    /// Uniform random choice among active credentials.
    pub fn pick(&self) -> Result<Arc<Credential>, CredentialError> {
        let state = self.state.read();
        state
            .active()
            .choose(&mut rand::thread_rng())
            .map(|c| Arc::clone(c))
            .ok_or(CredentialError::NoCredentialsAvailable)
    }

    /// Round-robin selection for a single exclusive owner.
    pub fn rotate(&mut self) -> Result<Arc<Credential>, CredentialError> {
        let state = self.state.read();
        let active = state.active();
        if active.is_empty() {
            return Err(CredentialError::NoCredentialsAvailable);
        }
        let cred = Arc::clone(active[self.cursor % active.len()]);
        self.cursor = (self.cursor + 1) % active.len();
        Ok(cred)
    }

    /// Drop a credential for the rest of this run.
    pub fn mark_bad(&self, credential: &Credential) {
        let mut state = self.state.write();
        if let Some(status) = state.status.get_mut(credential.id()) {
            if *status != CredentialStatus::Invalid {
                *status = CredentialStatus::Invalid;
                warn!(key = %credential.fingerprint(), "Credential removed from rotation");
            }
        }
    }

    pub fn status(&self, credential: &Credential) -> Option<CredentialStatus> {
        self.state.read().status.get(credential.id()).copied()
    }

    /// Credentials not known to be bad.
    pub fn working_count(&self) -> usize {
        self.state.read().active().len()
    }

    pub fn len(&self) -> usize {
        self.state.read().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Read a newline-delimited token file. A missing file is an empty list.
fn read_tokens(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read credentials from {}", path.display())),
    }
}

fn write_tokens(path: &Path, tokens: &[&str]) -> Result<()> {
    let mut contents = tokens.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write credentials to {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
