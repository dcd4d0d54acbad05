//! `QuizRoom` - live multi-player trivia session engine
//!
//! This library runs a single live trivia session: players register
//! during a join window, timed questions fire in sequence, answers earn
//! latency-weighted points, and standings broadcast to listeners over
//! named channels. An HTTP gateway exposes the session to clients.

pub mod bank;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod roster;
pub mod session;
