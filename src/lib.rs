//! # Relier
//!
//! `relier` is the part of an identity provider that keeps an embedding host
//! (a browser, a first-run page, any "relier") informed about the account
//! lifecycle, and that waits for email verification to complete.
//!
//! ## Broker
//!
//! A [`broker::Broker`] turns lifecycle events (loaded, sign-in, password
//! change, account deletion, verification) into messages on a
//! [`channel::Channel`]. One broker type covers every integration context; the
//! [`broker::ContextKind`] picks the command table, capabilities and hooks.
//!
//! - **Link approval:** before sign-in the host is asked once per email whether
//!   the account may be linked. A broken host never blocks sign-in.
//! - **Notifications are fire-and-forget:** transport failures are reported
//!   and swallowed.
//!
//! ## Verification polling
//!
//! A [`verification::VerificationPoller`] keeps asking whether the session is
//! verified. Only a bounced email is terminal; unexpected errors restart the
//! loop, subject to a [`verification::RestartPolicy`], and a cancellation token
//! stops it at any await point.

pub mod account;
pub mod broker;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod verification;

pub use config::Config;
