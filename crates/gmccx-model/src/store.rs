//! Indexed entity storage.
//!
//! Every entity of the model (nodes, elements, bars, panels) lives in an
//! [`IndexedStore`], which hands out stable `usize` ids. Freed ids are reused,
//! lowest first. Enumeration follows insertion order, not id order.

use std::collections::HashMap;

use crate::error::{ModelError, Result};

/// An entity that carries the id assigned by its owning store.
pub trait Indexed {
    /// Id assigned by the owning store, `None` while detached.
    fn id(&self) -> Option<usize>;

    /// Only called by [`IndexedStore`].
    fn set_id(&mut self, id: Option<usize>);
}

/// Insertion-ordered collection with reusable integer ids.
#[derive(Debug, Clone)]
pub struct IndexedStore<T> {
    items: Vec<T>,
    /// id -> position in `items`
    positions: HashMap<usize, usize>,
    /// Lowest id not currently in use
    next_free: usize,
}

impl<T> Default for IndexedStore<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
            next_free: 0,
        }
    }
}

impl<T: Indexed> IndexedStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity under the lowest free id.
    pub fn add(&mut self, item: T) -> Result<usize> {
        self.add_with_id(item, None)
    }

    /// Add an entity, optionally under an explicit id.
    ///
    /// Fails if the entity is already attached to a store or if the explicit
    /// id is taken.
    pub fn add_with_id(&mut self, mut item: T, id: Option<usize>) -> Result<usize> {
        if let Some(existing) = item.id() {
            return Err(ModelError::AlreadyIndexed(existing));
        }

        let id = match id {
            Some(id) if self.positions.contains_key(&id) => return Err(ModelError::IdTaken(id)),
            Some(id) => id,
            None => self.next_free,
        };

        item.set_id(Some(id));
        self.positions.insert(id, self.items.len());
        self.items.push(item);

        if id == self.next_free {
            while self.positions.contains_key(&self.next_free) {
                self.next_free += 1;
            }
        }

        Ok(id)
    }

    /// Detach the entity with the given id and free the id.
    pub fn remove(&mut self, id: usize) -> Option<T> {
        let position = self.positions.remove(&id)?;
        let mut item = self.items.remove(position);
        item.set_id(None);

        for (other, pos) in self.positions.iter_mut() {
            debug_assert_ne!(*other, id);
            if *pos > position {
                *pos -= 1;
            }
        }

        if id < self.next_free {
            self.next_free = id;
        }

        Some(item)
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.positions.get(&id).map(|&pos| &self.items[pos])
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        match self.positions.get(&id) {
            Some(&pos) => Some(&mut self.items[pos]),
            None => None,
        }
    }

    pub fn contains(&self, id: usize) -> bool {
        self.positions.contains_key(&id)
    }

    /// Lowest id the next implicit [`add`](Self::add) will use.
    pub fn next_free_id(&self) -> usize {
        self.next_free
    }
}

impl<T> IndexedStore<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

impl<'a, T> IntoIterator for &'a IndexedStore<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
