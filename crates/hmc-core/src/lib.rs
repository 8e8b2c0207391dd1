#![deny(missing_docs)]
#![doc = "Core error, randomness and precision types shared by the HMC adaptation crates."]

pub mod errors;
pub mod real;
pub mod rng;

pub use errors::{AdaptError, ErrorInfo};
pub use real::Real;
pub use rng::{derive_substream_seed, RngHandle};
