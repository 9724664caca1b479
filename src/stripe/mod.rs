//! Stripe integration.
//!
//! The reconciler talks to the provider only through [`BillingProvider`];
//! [`StripeClient`] is the HTTP implementation.

mod client;
mod provider;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{encode_form, StripeClient, STRIPE_API_URL};
pub use provider::{remote_id, BillingProvider, RemoteObject};

#[cfg(test)]
pub use provider::MockBillingProvider;
