use std::collections::HashMap;

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::{Slot, SlotRef};

/// The slots deployments get when none are configured.
pub const DEFAULT_SLOTS: [&str; 3] = ["09:00-10:00", "10:00-11:00", "11:00-12:00"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Empty,
    TooManySlots(usize),
    EmptyLabel(u32),
    LabelTooLong(u32),
    DuplicateLabel(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "slot catalog is empty"),
            CatalogError::TooManySlots(n) => {
                write!(f, "slot catalog has {n} slots, max is {MAX_SLOTS}")
            }
            CatalogError::EmptyLabel(id) => write!(f, "slot {id} has an empty label"),
            CatalogError::LabelTooLong(id) => write!(f, "slot {id} label too long"),
            CatalogError::DuplicateLabel(label) => write!(f, "duplicate slot label: {label}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Ordered, immutable slot definitions. Safe to share without locking.
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    slots: Vec<Slot>,
    by_label: HashMap<String, u32>,
}

impl SlotCatalog {
    /// Build a catalog; slot ids are assigned from 0 in the given order.
    pub fn new<I, S>(labels: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() > MAX_SLOTS {
            return Err(CatalogError::TooManySlots(labels.len()));
        }
        let mut slots = Vec::with_capacity(labels.len());
        let mut by_label = HashMap::new();
        for (idx, label) in labels.into_iter().enumerate() {
            let id = idx as u32;
            if label.trim().is_empty() {
                return Err(CatalogError::EmptyLabel(id));
            }
            if label.len() > MAX_SLOT_LABEL_LEN {
                return Err(CatalogError::LabelTooLong(id));
            }
            if by_label.insert(label.clone(), id).is_some() {
                return Err(CatalogError::DuplicateLabel(label));
            }
            slots.push(Slot { id, label });
        }
        if slots.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { slots, by_label })
    }

    /// Normalize either naming scheme to the canonical slot.
    pub fn resolve(&self, slot_ref: &SlotRef) -> Result<&Slot, EngineError> {
        let found = match slot_ref {
            SlotRef::Id(id) => usize::try_from(*id).ok().and_then(|i| self.slots.get(i)),
            SlotRef::Label(label) => self
                .by_label
                .get(label.as_str())
                .map(|&id| &self.slots[id as usize]),
        };
        found.ok_or_else(|| EngineError::InvalidSlot(slot_ref.clone()))
    }

    pub fn get(&self, id: u32) -> Option<&Slot> {
        self.slots.get(id as usize)
    }

    pub fn all(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS
                .iter()
                .enumerate()
                .map(|(i, l)| Slot { id: i as u32, label: l.to_string() })
                .collect(),
            by_label: DEFAULT_SLOTS
                .iter()
                .enumerate()
                .map(|(i, l)| (l.to_string(), i as u32))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_contiguous_in_order() {
        let catalog = SlotCatalog::new(["a", "b", "c"]).unwrap();
        let ids: Vec<u32> = catalog.all().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(catalog.get(1).unwrap().label, "b");
    }

    #[test]
    fn id_and_label_resolve_to_same_slot() {
        let catalog = SlotCatalog::default();
        let by_id = catalog.resolve(&SlotRef::Id(1)).unwrap();
        let by_label = catalog.resolve(&"10:00-11:00".into()).unwrap();
        assert_eq!(by_id, by_label);
    }

    #[test]
    fn out_of_range_ids_rejected() {
        let catalog = SlotCatalog::default();
        for id in [-1, 3, i64::MAX, i64::MIN] {
            let err = catalog.resolve(&SlotRef::Id(id)).unwrap_err();
            assert!(matches!(err, EngineError::InvalidSlot(SlotRef::Id(got)) if got == id));
        }
    }

    #[test]
    fn unknown_label_rejected() {
        let catalog = SlotCatalog::default();
        assert!(catalog.resolve(&"09:00-10:01".into()).is_err());
        // Labels match exactly, no trimming.
        assert!(catalog.resolve(&" 09:00-10:00".into()).is_err());
    }

    #[test]
    fn default_matches_new() {
        let built = SlotCatalog::new(DEFAULT_SLOTS).unwrap();
        assert_eq!(built.all(), SlotCatalog::default().all());
    }

    #[test]
    fn construction_errors() {
        assert_eq!(
            SlotCatalog::new(Vec::<String>::new()).unwrap_err(),
            CatalogError::Empty
        );
        assert_eq!(
            SlotCatalog::new(["a", " "]).unwrap_err(),
            CatalogError::EmptyLabel(1)
        );
        assert_eq!(
            SlotCatalog::new(["a", "b", "a"]).unwrap_err(),
            CatalogError::DuplicateLabel("a".into())
        );
        let long = "x".repeat(MAX_SLOT_LABEL_LEN + 1);
        assert_eq!(
            SlotCatalog::new([long]).unwrap_err(),
            CatalogError::LabelTooLong(0)
        );
        let many = (0..MAX_SLOTS + 5).map(|i| i.to_string());
        assert_eq!(
            SlotCatalog::new(many).unwrap_err(),
            CatalogError::TooManySlots(MAX_SLOTS + 5)
        );
        let full = (0..MAX_SLOTS).map(|i| i.to_string());
        assert_eq!(SlotCatalog::new(full).unwrap().len(), MAX_SLOTS);
    }
}
