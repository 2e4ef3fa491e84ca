//! # Penjaga (Identity & Credential Security Core)
//!
//! `penjaga` guards the accounts of a small transactional platform. The
//! surrounding system (catalog, cart, orders, API layer) is an external
//! collaborator: it calls in to register identities, authenticate logins,
//! and recover encrypted fields, and never re-implements any of this logic.
//!
//! ## Password Storage
//!
//! Passwords are never stored. Each identity keeps a per-record random salt
//! and a SHA-256 digest of `salt ‖ password`; verification is constant-time.
//! Salts rotate on every password change and are never reused.
//!
//! ## Field Encryption
//!
//! Sensitive fields (email, per-identity secret material such as
//! payment-token keys) are sealed under one process-wide master key into
//! versioned, tamper-evident ChaCha20-Poly1305 envelopes. Values that must
//! be recovered later are encrypted, never hashed; hashing is reserved for
//! secrets checked by equality.
//!
//! ## Step-Up Challenges
//!
//! Three verified password failures gate an identity behind a one-time
//! six-digit code delivered out of band. The first verification attempt
//! consumes the code, match or not; an expired or burned code is replaced
//! only by the next login attempt, never by silently dropping the gate.
//!
//! ## Abuse Protection
//!
//! Per-origin attempt budgets (50/hour, 200/day by default) are enforced
//! before any credential work. Unknown usernames cost the same digest
//! verification as wrong passwords and return the same decision, so
//! denials carry no enumeration signal.
//!
//! ## Explicit Context
//!
//! There are no ambient singletons. [`auth::Orchestrator::initialize`]
//! receives the policy configuration, the master key material, and the
//! delivery collaborator, and fails fast on misconfiguration before any
//! call is accepted.

pub mod auth;
pub mod challenge;
pub mod hash;
pub mod store;
pub mod vault;
