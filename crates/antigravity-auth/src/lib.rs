//! Antigravity credential handling
//!
//! Reads OAuth credentials owned by an external store, decides which ones
//! belong to Antigravity accounts, and keeps their access tokens usable.
//! The store itself is a collaborator behind `CredentialSource`; a JSON file
//! implementation is provided for the service binary.
//!
//! Token flow for one account:
//! 1. `selector::select_accounts()` picks Antigravity records with an access token
//! 2. `TokenLifecycle::ensure_access_token()` returns the stored token if unexpired
//! 3. Otherwise `token::refresh_token()` exchanges the refresh token
//! 4. `TokenLifecycle::persist()` writes the new token and expiry back to the store

pub mod constants;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod selector;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialRecord, CredentialSource, FileCredentialStore};
pub use error::{Error, Result};
pub use lifecycle::TokenLifecycle;
pub use selector::{AntigravityCredential, Credential, Provider, SelectedAccount, select_accounts};
pub use token::{OAuthClient, TokenResponse, refresh_token};
