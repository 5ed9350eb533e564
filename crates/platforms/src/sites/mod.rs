//! Built-in marketplace adapters.
//!
//! One file per site. Each adapter owns its descriptor and implements the
//! URL derivation for its item containers.

pub mod amazon;
pub mod leboncoin;
pub mod vinted;

// Re-export for convenience
pub use amazon::AmazonAdapter;
pub use leboncoin::LeboncoinAdapter;
pub use vinted::VintedAdapter;
