//! Tag-keyed entity construction for the decode side.
//!
//! Creation messages carry a stable type tag next to each blob. The factory
//! maps tags to constructor functions registered at startup, so decoding
//! never relies on ambient reflection and an unknown tag is a typed error.

use crate::entity::Replica;
use crate::error::SyncError;
use crate::units::{Projectile, Ship, PROJECTILE_TAG, SHIP_TAG};
use crate::value::SyncMap;
use std::collections::HashMap;

type Constructor = fn() -> Box<dyn Replica>;

#[derive(Default)]
pub struct EntityFactory {
    constructors: HashMap<String, Constructor>,
}

impl EntityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with every built-in entity type registered.
    pub fn standard() -> Self {
        let mut factory = Self::new();
        factory.register(SHIP_TAG, || Box::new(Ship::from_wire()));
        factory.register(PROJECTILE_TAG, || Box::new(Projectile::from_wire()));
        factory
    }

    pub fn register(&mut self, tag: &str, constructor: Constructor) {
        self.constructors.insert(tag.to_string(), constructor);
    }

    /// Instantiates the type behind `tag` and applies the creation blob.
    pub fn decode(&self, tag: &str, blob: &SyncMap) -> Result<Box<dyn Replica>, SyncError> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| SyncError::UnknownTypeTag(tag.to_string()))?;
        let mut entity = constructor();
        entity.decode_create(blob)?;
        Ok(entity)
    }
}
