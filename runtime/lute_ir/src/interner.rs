//! String interner scoped to one execution universe.
//!
//! The interner is passed explicitly to the tokenizer and interpreter at
//! construction rather than living in a global, so independent runtime
//! instances stay isolated and independently testable.

// Arc is the implementation of SharedInterner; interning is the one place
// the runtime shares state between pipeline phases.
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::Name;

/// Interior state: string → index map plus index → string table.
struct Inner {
    map: FxHashMap<Box<str>, u32>,
    strings: Vec<Box<str>>,
}

/// String interner providing O(1) interning and lookup.
///
/// Index 0 is always the empty string. Interned strings are never removed;
/// a `Name` stays valid for the interner's lifetime.
pub struct StringInterner {
    inner: RwLock<Inner>,
}

impl StringInterner {
    /// Create a new interner with the empty string pre-interned.
    pub fn new() -> Self {
        let mut inner = Inner {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(64),
        };
        inner.map.insert(Box::from(""), 0);
        inner.strings.push(Box::from(""));
        StringInterner {
            inner: RwLock::new(inner),
        }
    }

    /// Intern a string, returning its `Name`.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` distinct strings are interned.
    pub fn intern(&self, s: &str) -> Name {
        // Fast path: already interned.
        {
            let guard = self.inner.read();
            if let Some(&idx) = guard.map.get(s) {
                return Name::from_raw(idx);
            }
        }

        let mut guard = self.inner.write();
        // Double-check after acquiring the write lock.
        if let Some(&idx) = guard.map.get(s) {
            return Name::from_raw(idx);
        }
        let idx = u32::try_from(guard.strings.len())
            .unwrap_or_else(|_| panic!("interner exceeded {} strings", u32::MAX));
        let owned: Box<str> = Box::from(s);
        guard.strings.push(owned.clone());
        guard.map.insert(owned, idx);
        Name::from_raw(idx)
    }

    /// Look up the string for a `Name`.
    ///
    /// Returns an owned clone; interned strings are short and lookups sit on
    /// diagnostic paths, not hot loops.
    pub fn lookup(&self, name: Name) -> String {
        let guard = self.inner.read();
        guard.strings[name.index()].to_string()
    }

    /// Run a closure over the interned string without cloning it.
    pub fn with_str<R>(&self, name: Name, f: impl FnOnce(&str) -> R) -> R {
        let guard = self.inner.read();
        f(&guard.strings[name.index()])
    }

    /// Number of interned strings (including the empty string).
    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    /// True if only the empty string is interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to a [`StringInterner`] shared by the phases of one
/// execution universe (tokenizer, parser, interpreter).
#[derive(Clone)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    pub fn new() -> Self {
        SharedInterner(Arc::new(StringInterner::new()))
    }
}

impl Default for SharedInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
