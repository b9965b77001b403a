//! Client IP discovery
//!
//! Collects every syntactically valid client address a request carries,
//! labeled by where it came from. No trust validation is performed, so the
//! first finding must not be used for security decisions.

pub mod ip_extractor;

pub use ip_extractor::{resolve, IpFinding, IpResolutionError, IpSource};
