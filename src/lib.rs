//! Administration console backend for Cloud Firestore and Firebase Authentication.
//!
//! [`console`] holds the operations (database and collection discovery, document
//! listing and mutation, auth user browsing), [`server`] exposes them over HTTP, and
//! [`firestore`] / [`auth`] are the REST clients underneath.

pub mod auth;
pub mod config;
pub mod console;
pub mod core;
pub mod firestore;
pub mod server;

use crate::console::{ConnectionManager, ConsoleError};
use crate::core::credentials::Credentials;
use std::sync::Arc;

/// Entry point tying credentials to a shared [`ConnectionManager`].
pub struct ConsoleApp {
    manager: Arc<ConnectionManager>,
}

impl ConsoleApp {
    pub fn new(credentials: &Credentials, max_retries: u32) -> Result<Self, ConsoleError> {
        Ok(Self {
            manager: Arc::new(ConnectionManager::new(credentials, max_retries)?),
        })
    }

    pub fn manager(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.manager)
    }
}
