//! Food donation coordination.
//!
//! Donors (individuals and admins sign in the same way) and receiving
//! organizations share one account system with three roles; each role has its
//! own dashboard area. The session core resolves an authenticated identity
//! into a stored profile, repairs accounts whose profile record is missing,
//! and keeps live sessions synchronized with the profile store so an admin
//! approval unlocks a waiting receiver without a new sign-in.
//!
//! Receiving organizations start in a pending standing and are reviewed by an
//! admin. Admin routes answer 404 to non-admin callers, and endpoints that
//! could reveal whether an email is registered always answer 204.

pub mod auth;
pub mod cli;
pub mod replate;
pub mod session;
pub mod store;
