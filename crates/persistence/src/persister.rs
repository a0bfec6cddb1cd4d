use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::codec::{CodecError, Snapshot};
use crate::types::{DataSettings, PersistenceTag, PersistenceTier};

/// An object that can hand its state to the store and take it back later.
///
/// Implementors own their field layout: `consume_snapshot` must accept whatever
/// `produce_snapshot` emits for the same kind.
pub trait Persistable {
    fn data_settings(&self) -> &DataSettings;
    fn set_data_settings(&mut self, tag: PersistenceTag, tier: PersistenceTier);
    fn kind_name(&self) -> &'static str;
    fn produce_snapshot(&self) -> Snapshot;
    fn consume_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), CodecError>;
}

/// Shared handle owned by whatever holds the scene's objects.
pub type PersisterHandle = Rc<RefCell<dyn Persistable>>;

/// Non-owning back-reference kept by the registry.
pub type WeakPersister = Weak<RefCell<dyn Persistable>>;

pub fn persister_handle<P: Persistable + 'static>(persister: P) -> PersisterHandle {
    Rc::new(RefCell::new(persister))
}
