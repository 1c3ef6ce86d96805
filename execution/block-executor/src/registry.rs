// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! A handle <-> name registry stored in ordinary state keys. All accesses go through a
//! [`TransactionView`], so registrations of concurrent transactions are versioned,
//! validated and committed like any other write.
//!
//! Layout under the namespace `ns`:
//! - `ns/next`: next handle to assign (u64, big endian),
//! - `ns/h/<handle, big endian>`: name of the handle,
//! - `ns/n/<name>`: handle of the name.

use crate::task::TransactionView;
use occ_types::state_store::{StateKey, StateValue, StateViewError};
use thiserror::Error;

pub type Handle = u64;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Name {0:?} is already registered")]
    NameTaken(String),
    #[error("Handle {0} is not registered")]
    UnknownHandle(Handle),
    #[error("Malformed registry entry at {0:?}")]
    Malformed(StateKey),
    #[error(transparent)]
    StateView(#[from] StateViewError),
}

#[derive(Clone, Debug)]
pub struct VersionedRegistry {
    namespace: StateKey,
}

impl VersionedRegistry {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: StateKey::from(namespace).join(b"/"),
        }
    }

    fn counter_key(&self) -> StateKey {
        self.namespace.join(b"next")
    }

    fn handle_prefix(&self) -> StateKey {
        self.namespace.join(b"h/")
    }

    fn handle_key(&self, handle: Handle) -> StateKey {
        self.handle_prefix().join(&handle.to_be_bytes())
    }

    fn name_key(&self, name: &str) -> StateKey {
        self.namespace.join(b"n/").join(name.as_bytes())
    }

    fn decode_handle(key: &StateKey, value: &StateValue) -> Result<Handle, RegistryError> {
        let bytes: [u8; 8] = value
            .bytes()
            .as_ref()
            .try_into()
            .map_err(|_| RegistryError::Malformed(key.clone()))?;
        Ok(Handle::from_be_bytes(bytes))
    }

    fn decode_name(key: &StateKey, value: &StateValue) -> Result<String, RegistryError> {
        String::from_utf8(value.bytes().to_vec()).map_err(|_| RegistryError::Malformed(key.clone()))
    }

    /// Assigns the next handle to `name`. Handles are never reused.
    pub fn register(
        &self,
        view: &mut impl TransactionView,
        name: &str,
    ) -> Result<Handle, RegistryError> {
        let name_key = self.name_key(name);
        if view.get(&name_key)?.is_some() {
            return Err(RegistryError::NameTaken(name.to_string()));
        }

        let counter_key = self.counter_key();
        let handle = match view.get(&counter_key)? {
            Some(value) => Self::decode_handle(&counter_key, &value)?,
            None => 0,
        };
        let next = handle
            .checked_add(1)
            .ok_or_else(|| RegistryError::Malformed(counter_key.clone()))?;

        view.set(counter_key, StateValue::from(next));
        view.set(self.handle_key(handle), StateValue::from(name.as_bytes().to_vec()));
        view.set(name_key, StateValue::from(handle));
        Ok(handle)
    }

    pub fn lookup_handle(
        &self,
        view: &mut impl TransactionView,
        name: &str,
    ) -> Result<Option<Handle>, RegistryError> {
        let name_key = self.name_key(name);
        view.get(&name_key)?
            .map(|value| Self::decode_handle(&name_key, &value))
            .transpose()
    }

    pub fn lookup_name(
        &self,
        view: &mut impl TransactionView,
        handle: Handle,
    ) -> Result<Option<String>, RegistryError> {
        let handle_key = self.handle_key(handle);
        view.get(&handle_key)?
            .map(|value| Self::decode_name(&handle_key, &value))
            .transpose()
    }

    /// Removes both directions of the mapping and returns the name.
    pub fn unregister(
        &self,
        view: &mut impl TransactionView,
        handle: Handle,
    ) -> Result<String, RegistryError> {
        let name = self
            .lookup_name(view, handle)?
            .ok_or(RegistryError::UnknownHandle(handle))?;
        view.delete(self.handle_key(handle));
        view.delete(self.name_key(&name));
        Ok(name)
    }

    /// All registered (handle, name) pairs, in handle order.
    pub fn entries(
        &self,
        view: &mut impl TransactionView,
    ) -> Result<Vec<(Handle, String)>, RegistryError> {
        let prefix = self.handle_prefix();
        view.iter_prefix(prefix.bytes())?
            .into_iter()
            .map(|(key, value)| {
                let handle_bytes: [u8; 8] = key.bytes()[prefix.bytes().len()..]
                    .try_into()
                    .map_err(|_| RegistryError::Malformed(key.clone()))?;
                Ok((
                    Handle::from_be_bytes(handle_bytes),
                    Self::decode_name(&key, &value)?,
                ))
            })
            .collect()
    }
}
