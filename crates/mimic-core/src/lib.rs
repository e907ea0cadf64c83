//! Request matching and match caching for HTTP service virtualization.
//!
//! Imported simulations become an ordered [`RulesTable`]. Requests resolve
//! through the [`MatchCache`] when a fully exact rule covers them, and through
//! a first-match scan of the table otherwise. [`SimulationRegistry`] ties the
//! two together with the operating [`Mode`].

pub mod cache;
pub mod config;
pub mod error;
pub mod matching;
pub mod mode;
pub mod registry;
pub mod rules;
pub mod simulation;

pub use cache::{CacheStats, CacheView, MatchCache};
pub use config::{CacheConfig, CoreConfig};
pub use error::{ConfigurationError, ImportError};
pub use matching::{Field, FieldMatcher, MatcherKind, RequestDetails, RequestMatcher};
pub use mode::Mode;
pub use registry::{MatchSource, Resolution, SimulationRegistry};
pub use rules::{Rule, RulesTable};
pub use simulation::{PairView, ResponseDetails, SimulationView};
