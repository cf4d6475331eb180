//! REST collaborators consumed by the booking flow.
//!
//! Two narrow clients over [`reqwest`]:
//!
//! - [`AvailabilityApi`] -- one-shot fetch of a day's slot list.
//! - [`RelatedPersonApi`] -- the authenticated user's related persons.
//!
//! Both implement the corresponding `turnero-core` ports so the
//! orchestrator never sees `reqwest` types.

pub mod availability;
pub mod error;
pub mod persons;

pub use availability::AvailabilityApi;
pub use error::RestApiError;
pub use persons::RelatedPersonApi;
