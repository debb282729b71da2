//! Track resolution and stream decryption for the Deezer streaming service.
//!
//! A request names a catalog track and an action. The engine logs in with a
//! pre-provisioned credential, resolves the track's metadata and the best
//! available quality tier, finds or derives the stream URL and, for the
//! `stream` action, downloads and decrypts the audio.
//!
//! * [`engine`] runs requests
//! * [`server`] exposes the engine over HTTP
//! * [`secrets`] provides the credential and the provider keys
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

#[macro_use]
extern crate log;

pub mod arl;
pub mod config;
pub mod decrypt;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod http;
pub mod protocol;
pub mod secrets;
pub mod server;
pub mod signal;
pub mod track;
