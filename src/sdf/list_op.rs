//! List editing operations.
//!
//! A [`ListOp`] either replaces a list outright (explicit) or describes a set
//! of edits (delete, add, prepend, append, reorder) that are applied on top of
//! a weaker list.

/// Where an item lands when it is added through [`ListOp::insert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListPosition {
    /// Front of the prepend list. The newest item is the strongest.
    #[default]
    FrontOfPrependList,
    /// Back of the prepend list.
    BackOfPrependList,
    /// Front of the append list.
    FrontOfAppendList,
    /// Back of the append list. Earlier items stay stronger.
    BackOfAppendList,
}

impl ListPosition {
    /// Shorthand for the strongest position.
    pub const FRONT: ListPosition = ListPosition::FrontOfPrependList;
    /// Shorthand for the weakest position.
    pub const BACK: ListPosition = ListPosition::BackOfAppendList;

    fn is_front(self) -> bool {
        matches!(self, ListPosition::FrontOfPrependList | ListPosition::FrontOfAppendList)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListOp<T> {
    pub explicit: bool,
    pub explicit_items: Vec<T>,
    pub added_items: Vec<T>,
    pub prepended_items: Vec<T>,
    pub appended_items: Vec<T>,
    pub deleted_items: Vec<T>,
    pub ordered_items: Vec<T>,
}

impl<T> Default for ListOp<T> {
    fn default() -> Self {
        Self {
            explicit: false,
            explicit_items: Vec::new(),
            added_items: Vec::new(),
            prepended_items: Vec::new(),
            appended_items: Vec::new(),
            deleted_items: Vec::new(),
            ordered_items: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> ListOp<T> {
    /// Explicit list op holding `items`.
    pub fn explicit(items: Vec<T>) -> Self {
        Self {
            explicit: true,
            explicit_items: dedup(items),
            ..Self::default()
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// True if the list op carries any opinion at all.
    pub fn has_keys(&self) -> bool {
        self.explicit
            || !self.added_items.is_empty()
            || !self.prepended_items.is_empty()
            || !self.appended_items.is_empty()
            || !self.deleted_items.is_empty()
            || !self.ordered_items.is_empty()
    }

    /// Drop every opinion, including explicitness.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Replace the list op with an explicit list.
    pub fn set_explicit_items(&mut self, items: Vec<T>) {
        *self = Self::explicit(items);
    }

    /// Add `item` at `position`, removing earlier occurrences from the edit lists.
    pub fn insert(&mut self, item: T, position: ListPosition) {
        if self.explicit {
            self.explicit_items.retain(|i| *i != item);
            if position.is_front() {
                self.explicit_items.insert(0, item);
            } else {
                self.explicit_items.push(item);
            }
            return;
        }

        self.added_items.retain(|i| *i != item);
        self.prepended_items.retain(|i| *i != item);
        self.appended_items.retain(|i| *i != item);
        self.deleted_items.retain(|i| *i != item);

        match position {
            ListPosition::FrontOfPrependList => self.prepended_items.insert(0, item),
            ListPosition::BackOfPrependList => self.prepended_items.push(item),
            ListPosition::FrontOfAppendList => self.appended_items.insert(0, item),
            ListPosition::BackOfAppendList => self.appended_items.push(item),
        }
    }

    /// Remove `item`: from the explicit list, or by recording a delete.
    pub fn remove(&mut self, item: &T) {
        if self.explicit {
            self.explicit_items.retain(|i| i != item);
            return;
        }

        self.added_items.retain(|i| i != item);
        self.prepended_items.retain(|i| i != item);
        self.appended_items.retain(|i| i != item);
        if !self.deleted_items.contains(item) {
            self.deleted_items.push(item.clone());
        }
    }

    /// Every item this list op mentions, in explicit/prepend/add/append order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.explicit_items
            .iter()
            .chain(self.prepended_items.iter())
            .chain(self.added_items.iter())
            .chain(self.appended_items.iter())
    }

    /// Apply this list op on top of `base` (the weaker opinion) and return the result.
    ///
    /// Explicit list ops ignore `base`. Otherwise edits run in order: delete,
    /// add, prepend, append, reorder. Prepended items are moved to the front
    /// and appended items to the back, so an item named by both ends up in
    /// the append position.
    pub fn apply_operations(&self, base: Vec<T>) -> Vec<T> {
        if self.explicit {
            return dedup(self.explicit_items.clone());
        }

        let mut result = dedup(base);
        result.retain(|i| !self.deleted_items.contains(i));

        for item in &self.added_items {
            if !result.contains(item) {
                result.push(item.clone());
            }
        }

        if !self.prepended_items.is_empty() {
            let mut prepended = dedup(self.prepended_items.clone());
            result.retain(|i| !prepended.contains(i));
            prepended.append(&mut result);
            result = prepended;
        }

        if !self.appended_items.is_empty() {
            let appended = dedup(self.appended_items.clone());
            result.retain(|i| !appended.contains(i));
            result.extend(appended);
        }

        if !self.ordered_items.is_empty() {
            result = reorder(result, &self.ordered_items);
        }

        result
    }
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Reorder `items` so the ones named in `order` follow that order.
///
/// Items not named in `order` stay attached to the nearest named item that
/// precedes them; leading unnamed items keep their place at the front.
fn reorder<T: Clone + PartialEq>(items: Vec<T>, order: &[T]) -> Vec<T> {
    let order = dedup(order.to_vec());

    let mut leading = Vec::new();
    let mut chunks: Vec<(T, Vec<T>)> = Vec::new();

    for item in items {
        if order.contains(&item) {
            chunks.push((item, Vec::new()));
        } else if let Some((_, tail)) = chunks.last_mut() {
            tail.push(item);
        } else {
            leading.push(item);
        }
    }

    let mut out = leading;
    for key in &order {
        if let Some(idx) = chunks.iter().position(|(head, _)| head == key) {
            let (head, tail) = chunks.remove(idx);
            out.push(head);
            out.extend(tail);
        }
    }
    out
}
