//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming ServerRequest (method, path, headers)
//!     → router.rs (walk the chain in registration order)
//!     → matcher.rs / bean.rs (evaluate condition, capture URI parameters)
//!     → route.rs (run the first matching route)
//!     → Return: Dispatch::Matched(Response) or Dispatch::NotMatched
//!
//! Chain Compilation (at startup):
//!     RouteBuilder.if_*(...) → ElseBuilder.else_if_*(...)
//!     → Parse URI templates, bind bean methods
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Chains compiled at startup, immutable at runtime
//! - No regex in hot path (segment-wise template matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod bean;
pub mod error;
pub mod matcher;
pub mod route;
pub mod router;
pub mod template;

pub use bean::{Bean, BeanMethod, BoundBean};
pub use error::{RouteError, RouteResult};
pub use matcher::{AndMatcher, Matcher, MethodMatcher, PredicateMatcher, UriMatcher};
pub use route::{Route, RouteFuture};
pub use router::{Dispatch, ElseBuilder, RouteBuilder, Router};
pub use template::UriTemplate;
