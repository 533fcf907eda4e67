//! # Authentication Module
//!
//! Credential acquisition for the OneDrive and Google Drive pipelines.
//!
//! ## Overview
//!
//! Every pipeline asks a [`TokenProvider`] for a bearer [`Credential`] before
//! listing. The providers in this crate cover:
//!
//! - Microsoft client-credentials grant ([`ClientCredentialsTokenProvider`])
//! - Google service-account JWT bearer grant ([`ServiceAccountTokenProvider`])
//! - Google interactive OAuth with PKCE: [`OAuthCallbackHandler`] completes the
//!   consent flow and [`StoredTokenProvider`] serves and refreshes the stored
//!   token
//! - A pre-issued token ([`StaticTokenProvider`]), degraded fallback only
//!
//! Missing or malformed credentials surface as [`AuthError::Config`] before any
//! network call; failed exchanges as [`AuthError::Transport`].

pub mod callback;
pub mod error;
pub mod google;
pub mod microsoft;
pub mod oauth;
pub mod static_token;
pub mod token_provider;
pub mod token_store;
pub mod types;

pub use callback::{CallbackOutcome, CallbackParams, OAuthCallbackHandler};
pub use error::{AuthError, Result};
pub use google::{ServiceAccountTokenProvider, StoredTokenProvider};
pub use microsoft::ClientCredentialsTokenProvider;
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use static_token::StaticTokenProvider;
pub use token_provider::TokenProvider;
pub use token_store::TokenStore;
pub use types::{Credential, OAuthTokens, ProviderKind};
