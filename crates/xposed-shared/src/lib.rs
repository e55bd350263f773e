//! # xposed-shared
//!
//! Domain types shared by the xPosed store and server: instrument categories
//! and their validation, the risk classifier, the appeal state machine, and
//! the signed principal tokens issued by the identity provider.

pub mod appeal;
pub mod constants;
pub mod error;
pub mod identity;
pub mod instrument;
pub mod risk;
pub mod types;
