//! Heap objects and the arena that owns them.
//!
//! The C ancestry of this design kept every heap object on an
//! intrusive linked list rooted at the VM so teardown could walk and
//! free them in one pass. Here the registry is an arena: [`Heap`]
//! owns a `Vec<Obj>`, values hold [`ObjRef`] index handles, and
//! dropping the heap releases everything at once. No handle is ever
//! invalidated while the heap lives (objects are only appended).
//!
//! String creation always goes through the intern set, so byte-equal
//! strings share a single object and identity comparison is enough
//! for table keys.

use crate::module::Module;
use crate::table::Table;
use crate::value::Value;

/// FNV-1a offset basis (32-bit).
const FNV_OFFSET_BASIS: u32 = 2166136261;
/// FNV-1a prime (32-bit).
const FNV_PRIME: u32 = 16777619;

/// FNV-1a hash over a byte slice.
///
/// # Example
///
/// ```
/// use slang_core::fnv1a;
///
/// assert_eq!(fnv1a(b""), 2166136261);
/// assert_eq!(fnv1a(b"a"), 0xe40c292c);
/// ```
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A stable index handle into the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(u32);

impl ObjRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned string: its text and precomputed FNV-1a hash.
#[derive(Debug)]
pub struct StringObj {
    pub text: Box<str>,
    pub hash: u32,
}

impl StringObj {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A dynamic array of values.
#[derive(Debug, Default)]
pub struct ListObj {
    pub items: Vec<Value>,
}

impl ListObj {
    /// Lists start with room for eight elements and double from
    /// there.
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(8),
        }
    }

    pub fn append(&mut self, value: Value) {
        self.items.push(value);
    }

    /// True if `index` names an existing element. Fractional indices
    /// truncate toward zero before the bounds check.
    pub fn is_valid_index(&self, index: f64) -> bool {
        let index = index as i64;
        index >= 0 && (index as usize) < self.items.len()
    }

    pub fn read(&self, index: usize) -> Value {
        self.items[index]
    }

    pub fn store(&mut self, index: usize, value: Value) {
        self.items[index] = value;
    }

    /// Removes the element at `index`, shifting the tail left.
    pub fn remove(&mut self, index: usize) -> Value {
        self.items.remove(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A numeric range with inclusive bounds, as written `start..end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeObj {
    pub start: f64,
    pub end: f64,
}

/// A compiled function: arity, optional interned name, and the module
/// holding its bytecode. Top-level scripts are nameless functions of
/// arity zero.
#[derive(Debug)]
pub struct FunctionObj {
    pub arity: u8,
    pub name: Option<ObjRef>,
    pub module: Module,
}

impl FunctionObj {
    pub fn script(module: Module) -> Self {
        Self {
            arity: 0,
            name: None,
            module,
        }
    }
}

/// A heap object.
#[derive(Debug)]
pub enum Obj {
    String(StringObj),
    List(ListObj),
    Range(RangeObj),
    Function(FunctionObj),
}

/// The object arena plus the string intern set.
///
/// Allocation never fails short of the process running out of memory,
/// and nothing is freed until the heap itself is dropped.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Obj>,
    strings: Table,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, obj: Obj) -> ObjRef {
        let index = self.objects.len();
        debug_assert!(index < u32::MAX as usize);
        self.objects.push(obj);
        ObjRef(index as u32)
    }

    /// Interns a string, copying the text only if it is new.
    pub fn intern(&mut self, text: &str) -> ObjRef {
        let hash = fnv1a(text.as_bytes());
        if let Some(existing) = self.strings.find_string(&self.objects, text, hash) {
            return existing;
        }
        let obj = Obj::String(StringObj {
            text: text.into(),
            hash,
        });
        let reference = self.alloc(obj);
        self.strings.set(&self.objects, reference, Value::Nil);
        reference
    }

    /// Interns an owned string, dropping the buffer if an equal
    /// string already exists.
    pub fn intern_owned(&mut self, text: String) -> ObjRef {
        let hash = fnv1a(text.as_bytes());
        if let Some(existing) = self.strings.find_string(&self.objects, &text, hash) {
            return existing;
        }
        let obj = Obj::String(StringObj {
            text: text.into_boxed_str(),
            hash,
        });
        let reference = self.alloc(obj);
        self.strings.set(&self.objects, reference, Value::Nil);
        reference
    }

    pub fn alloc_list(&mut self, list: ListObj) -> ObjRef {
        self.alloc(Obj::List(list))
    }

    pub fn alloc_range(&mut self, start: f64, end: f64) -> ObjRef {
        self.alloc(Obj::Range(RangeObj { start, end }))
    }

    pub fn alloc_function(&mut self, function: FunctionObj) -> ObjRef {
        self.alloc(Obj::Function(function))
    }

    #[inline]
    pub fn get(&self, reference: ObjRef) -> &Obj {
        &self.objects[reference.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, reference: ObjRef) -> &mut Obj {
        &mut self.objects[reference.index()]
    }

    /// All live objects, indexable by [`ObjRef::index`]. The [`Table`]
    /// operations borrow this alongside a mutable table.
    #[inline]
    pub fn objects(&self) -> &[Obj] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// The string behind `reference`.
    ///
    /// Panics if the handle does not name a string; callers only pass
    /// handles the compiler or intern set produced as strings.
    #[inline]
    pub fn string(&self, reference: ObjRef) -> &StringObj {
        match self.get(reference) {
            Obj::String(s) => s,
            other => panic!("expected string object, found {other:?}"),
        }
    }

    pub fn is_string(&self, reference: ObjRef) -> bool {
        matches!(self.get(reference), Obj::String(_))
    }

    /// Looks up an already-interned string by content without
    /// creating it.
    pub fn find_interned(&self, text: &str) -> Option<ObjRef> {
        self.strings.find_string(&self.objects, text, fnv1a(text.as_bytes()))
    }
}
