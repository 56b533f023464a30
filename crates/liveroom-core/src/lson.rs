#![forbid(unsafe_code)]

//! The shared mutable storage tree.
//!
//! [`LiveObject`] and [`LiveList`] are cheaply cloneable handles to
//! shared, interior-mutable nodes; cloning a handle never copies the
//! node. A node is either *detached* (freshly built, mutations are
//! silent) or *attached* to a [`StorageObserver`], in which case every
//! mutation anywhere in the tree reports a deep change. Attachment
//! happens when the owning room installs the root and automatically
//! extends to values inserted later.
//!
//! # Invariants
//!
//! 1. The root handle's identity never changes after attachment; only
//!    node contents mutate.
//! 2. Every mutation on an attached node produces exactly one observer
//!    callback ([`LiveObject::restore_from`] counts as one mutation).
//! 3. [`to_immutable`](LiveObject::to_immutable) produces a plain JSON
//!    tree sharing no structure with the live nodes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::json::{Json, JsonObject};

/// Receives deep-change notifications from an attached storage tree.
pub trait StorageObserver {
    /// Called after any mutation of an attached node.
    fn on_storage_change(&self);
}

type ObserverRef = Weak<dyn StorageObserver>;

fn report(observer: Option<&ObserverRef>) {
    if let Some(obs) = observer.and_then(Weak::upgrade) {
        obs.on_storage_change();
    }
}

/// One value in the storage tree: a nested container or a JSON leaf.
#[derive(Clone)]
pub enum Lson {
    /// A nested object container.
    Object(LiveObject),
    /// A nested list container.
    List(LiveList),
    /// A plain JSON leaf.
    Json(Json),
}

impl Lson {
    /// Build a value from plain JSON, turning objects and arrays into
    /// live containers.
    #[must_use]
    pub fn from_json(value: &Json) -> Self {
        match value {
            Json::Object(map) => Self::Object(LiveObject::from_json(map)),
            Json::Array(items) => Self::List(LiveList::from_json(items)),
            other => Self::Json(other.clone()),
        }
    }

    /// The nested object, if this value is one.
    #[must_use]
    pub fn as_object(&self) -> Option<LiveObject> {
        match self {
            Self::Object(obj) => Some(obj.clone()),
            _ => None,
        }
    }

    /// The nested list, if this value is one.
    #[must_use]
    pub fn as_list(&self) -> Option<LiveList> {
        match self {
            Self::List(list) => Some(list.clone()),
            _ => None,
        }
    }

    /// The JSON leaf, if this value is one.
    #[must_use]
    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Convert to a plain, deeply-read-only JSON tree.
    #[must_use]
    pub fn to_immutable(&self) -> Json {
        match self {
            Self::Object(obj) => obj.to_immutable(),
            Self::List(list) => list.to_immutable(),
            Self::Json(value) => value.clone(),
        }
    }

    fn attach_weak(&self, observer: ObserverRef) {
        match self {
            Self::Object(obj) => obj.attach_weak(observer),
            Self::List(list) => list.attach_weak(observer),
            Self::Json(_) => {}
        }
    }
}

impl From<Json> for Lson {
    fn from(value: Json) -> Self {
        // Plain JSON stays a leaf; use `Lson::from_json` to deep-convert.
        Self::Json(value)
    }
}

impl From<LiveObject> for Lson {
    fn from(obj: LiveObject) -> Self {
        Self::Object(obj)
    }
}

impl From<LiveList> for Lson {
    fn from(list: LiveList) -> Self {
        Self::List(list)
    }
}

impl From<&str> for Lson {
    fn from(value: &str) -> Self {
        Self::Json(Json::from(value))
    }
}

impl From<String> for Lson {
    fn from(value: String) -> Self {
        Self::Json(Json::from(value))
    }
}

impl From<i64> for Lson {
    fn from(value: i64) -> Self {
        Self::Json(Json::from(value))
    }
}

impl From<f64> for Lson {
    fn from(value: f64) -> Self {
        Self::Json(Json::from(value))
    }
}

impl From<bool> for Lson {
    fn from(value: bool) -> Self {
        Self::Json(Json::from(value))
    }
}

impl std::fmt::Debug for Lson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_immutable())
    }
}

// ─── LiveObject ──────────────────────────────────────────────────────────────

struct ObjectInner {
    entries: BTreeMap<String, Lson>,
    observer: Option<ObserverRef>,
}

/// A shared mutable object container keyed by strings.
#[derive(Clone)]
pub struct LiveObject {
    inner: Rc<RefCell<ObjectInner>>,
}

impl LiveObject {
    /// Create an empty, detached object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectInner {
                entries: BTreeMap::new(),
                observer: None,
            })),
        }
    }

    /// Build a detached object from plain JSON entries, deep-converting
    /// nested objects and arrays into live containers.
    #[must_use]
    pub fn from_json(map: &JsonObject) -> Self {
        let obj = Self::new();
        {
            let mut inner = obj.inner.borrow_mut();
            for (key, value) in map {
                inner.entries.insert(key.clone(), Lson::from_json(value));
            }
        }
        obj
    }

    /// Get the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Lson> {
        self.inner.borrow().entries.get(key).cloned()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Lson>) {
        let value = value.into();
        let observer = {
            let mut inner = self.inner.borrow_mut();
            if let Some(obs) = &inner.observer {
                value.attach_weak(obs.clone());
            }
            inner.entries.insert(key.into(), value);
            inner.observer.clone()
        };
        report(observer.as_ref());
    }

    /// Remove the value stored under `key`. Returns whether a value was
    /// removed; removing a missing key reports no change.
    pub fn delete(&self, key: &str) -> bool {
        let (removed, observer) = {
            let mut inner = self.inner.borrow_mut();
            let removed = inner.entries.remove(key).is_some();
            (removed, inner.observer.clone())
        };
        if removed {
            report(observer.as_ref());
        }
        removed
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether the object has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// The keys currently present, in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }

    /// Convert to a plain, deeply-read-only JSON tree.
    #[must_use]
    pub fn to_immutable(&self) -> Json {
        let inner = self.inner.borrow();
        let mut map = JsonObject::new();
        for (key, value) in &inner.entries {
            map.insert(key.clone(), value.to_immutable());
        }
        Json::Object(map)
    }

    /// Replace the entire contents from a JSON snapshot, in place.
    ///
    /// The handle's identity is unchanged; children are rebuilt and
    /// re-attached. One observer callback is reported for the whole
    /// replacement. Non-object snapshots clear the object.
    pub fn restore_from(&self, snapshot: &Json) {
        let observer = {
            let mut inner = self.inner.borrow_mut();
            inner.entries.clear();
            if let Json::Object(map) = snapshot {
                for (key, value) in map {
                    let child = Lson::from_json(value);
                    if let Some(obs) = &inner.observer {
                        child.attach_weak(obs.clone());
                    }
                    inner.entries.insert(key.clone(), child);
                }
            }
            inner.observer.clone()
        };
        report(observer.as_ref());
    }

    /// Attach this subtree to an observer. Used by the room when the
    /// root loads; subsequent insertions attach automatically.
    pub fn attach(&self, observer: &Rc<dyn StorageObserver>) {
        self.attach_weak(Rc::downgrade(observer));
    }

    /// Whether two handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn attach_weak(&self, observer: ObserverRef) {
        let children: Vec<Lson> = {
            let mut inner = self.inner.borrow_mut();
            inner.observer = Some(observer.clone());
            inner.entries.values().cloned().collect()
        };
        for child in children {
            child.attach_weak(observer.clone());
        }
    }
}

impl Default for LiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LiveObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LiveObject({})", self.to_immutable())
    }
}

// ─── LiveList ────────────────────────────────────────────────────────────────

struct ListInner {
    items: Vec<Lson>,
    observer: Option<ObserverRef>,
}

/// A shared mutable ordered list container.
#[derive(Clone)]
pub struct LiveList {
    inner: Rc<RefCell<ListInner>>,
}

impl LiveList {
    /// Create an empty, detached list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListInner {
                items: Vec::new(),
                observer: None,
            })),
        }
    }

    /// Build a detached list from plain JSON items, deep-converting
    /// nested objects and arrays into live containers.
    #[must_use]
    pub fn from_json(items: &[Json]) -> Self {
        let list = Self::new();
        {
            let mut inner = list.inner.borrow_mut();
            inner.items.extend(items.iter().map(Lson::from_json));
        }
        list
    }

    /// Get the item at `index`, if within bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Lson> {
        self.inner.borrow().items.get(index).cloned()
    }

    /// Append an item.
    pub fn push(&self, value: impl Into<Lson>) {
        let value = value.into();
        let observer = {
            let mut inner = self.inner.borrow_mut();
            if let Some(obs) = &inner.observer {
                value.attach_weak(obs.clone());
            }
            inner.items.push(value);
            inner.observer.clone()
        };
        report(observer.as_ref());
    }

    /// Insert an item at `index`, shifting later items. Out-of-bounds
    /// indices append.
    pub fn insert(&self, index: usize, value: impl Into<Lson>) {
        let value = value.into();
        let observer = {
            let mut inner = self.inner.borrow_mut();
            if let Some(obs) = &inner.observer {
                value.attach_weak(obs.clone());
            }
            let index = index.min(inner.items.len());
            inner.items.insert(index, value);
            inner.observer.clone()
        };
        report(observer.as_ref());
    }

    /// Replace the item at `index`. Returns whether the index was in
    /// bounds; out-of-bounds writes report no change.
    pub fn set(&self, index: usize, value: impl Into<Lson>) -> bool {
        let value = value.into();
        let (replaced, observer) = {
            let mut inner = self.inner.borrow_mut();
            if index >= inner.items.len() {
                (false, None)
            } else {
                if let Some(obs) = &inner.observer {
                    value.attach_weak(obs.clone());
                }
                inner.items[index] = value;
                (true, inner.observer.clone())
            }
        };
        if replaced {
            report(observer.as_ref());
        }
        replaced
    }

    /// Remove the item at `index`. Returns whether the index was in
    /// bounds.
    pub fn delete(&self, index: usize) -> bool {
        let (removed, observer) = {
            let mut inner = self.inner.borrow_mut();
            if index >= inner.items.len() {
                (false, None)
            } else {
                inner.items.remove(index);
                (true, inner.observer.clone())
            }
        };
        if removed {
            report(observer.as_ref());
        }
        removed
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    /// Whether the list has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    /// Convert to a plain, deeply-read-only JSON tree.
    #[must_use]
    pub fn to_immutable(&self) -> Json {
        let inner = self.inner.borrow();
        Json::Array(inner.items.iter().map(Lson::to_immutable).collect())
    }

    /// Attach this subtree to an observer.
    pub fn attach(&self, observer: &Rc<dyn StorageObserver>) {
        self.attach_weak(Rc::downgrade(observer));
    }

    /// Whether two handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn attach_weak(&self, observer: ObserverRef) {
        let children: Vec<Lson> = {
            let mut inner = self.inner.borrow_mut();
            inner.observer = Some(observer.clone());
            inner.items.clone()
        };
        for child in children {
            child.attach_weak(observer.clone());
        }
    }
}

impl Default for LiveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LiveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LiveList({})", self.to_immutable())
    }
}
