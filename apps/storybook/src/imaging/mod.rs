// Page illustration: the signed visual API client and the per-page generator.

pub mod client;
pub mod page;

pub use client::VisualApiClient;
