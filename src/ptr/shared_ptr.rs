use crate::ptr::{
    control_block::{ ControlBlockBase, ControlBlockHolder, ControlBlockPointer },
    error::BadWeakPtr,
    unique_ptr::{ DefaultDeleter, UniquePtr },
    weak_ptr::WeakPtr
};
use std::{
    fmt::{ Debug, Display },
    marker::PhantomData,
    ops::Deref,
    ptr::NonNull
};

/// Reference counted owning pointer.
///
/// Every `SharedPtr` holds one strong reference on its control block. The object is
/// destroyed when the last strong reference goes away; the control block itself stays
/// allocated until the last [`WeakPtr`] is gone too.
///
/// Counters are not synchronized, so `SharedPtr` is neither `Send` nor `Sync`.
// std::shared_ptr
pub struct SharedPtr<T: ?Sized> {
    // both None, or both Some. _ptr can point somewhere other than the object the block
    // manages when created through aliasing
    _ptr: Option<NonNull<T>>,
    _rep: Option<NonNull<ControlBlockBase>>,
    _data: PhantomData<T>
}

impl<T> SharedPtr<T> {
    /// Construct an object of type T and wrap it in a SharedPtr to act as a reference counting
    /// smart pointer. The object and its control block share one allocation.
    pub fn make_shared(data: T) -> Self { Self::make_shared_with(move || data) }

    /// Like [`SharedPtr::make_shared`], but the object is built by `init` directly inside
    /// the control block's storage. Constructor arguments are captured by the closure.
    pub fn make_shared_with<F>(init: F) -> Self
    where F: FnOnce() -> T
    {
        let block = ControlBlockHolder::new(init);
        unsafe { Self::from_parts(
            Some(ControlBlockHolder::get_ptr(block)),
            Some(ControlBlockHolder::as_base(block))
        )}
    }
}

impl<T: ?Sized> SharedPtr<T> {
    pub const fn new() -> Self { Self { _ptr: None, _rep: None, _data: PhantomData } }

    /// Take ownership of a separately allocated object. This allocates a second block for
    /// the reference counts; prefer [`make_shared`] for new objects.
    pub fn from_box(data: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(data)) }
    }

    /// Take ownership of `ptr`. A null pointer gives an empty SharedPtr.
    ///
    /// # Safety
    /// `ptr` must be null or come from `Box::into_raw`, and must not be owned by anything
    /// else, including another SharedPtr.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => unsafe { Self::from_parts(Some(ptr), Some(ControlBlockPointer::new(ptr))) },
            None => Self::new()
        }
    }

    /// Aliasing constructor: share ownership of `other`'s object, but point at `ptr`.
    /// If `other` is empty, so is the result.
    ///
    /// # Safety
    /// `ptr` must stay valid for as long as `other`'s object is alive, typically because it
    /// points into that object.
    pub unsafe fn aliasing<U: ?Sized>(other: &SharedPtr<U>, ptr: NonNull<T>) -> Self {
        match other._rep {
            Some(rep) => {
                unsafe { rep.as_ref() }.inc_strong();
                unsafe { Self::from_parts(Some(ptr), Some(rep)) }
            },
            None => Self::new()
        }
    }

    /// Safe aliasing: a SharedPtr to a part of this object (a field, or the object itself
    /// as a trait object) which keeps the whole object alive.
    pub fn project<U, F>(&self, f: F) -> SharedPtr<U>
    where U: ?Sized,
          F: FnOnce(&T) -> &U
    {
        match self.get() {
            Some(v) => {
                let ptr = NonNull::from(f(v));
                unsafe { SharedPtr::aliasing(self, ptr) }
            },
            None => SharedPtr::new()
        }
    }

    // does not touch the counts. The caller hands over one strong reference on rep
    pub(crate) unsafe fn from_parts(_ptr: Option<NonNull<T>>, _rep: Option<NonNull<ControlBlockBase>>) -> Self {
        Self { _ptr, _rep, _data: PhantomData }
    }

    pub(crate) fn get_rep(&self) -> Option<NonNull<ControlBlockBase>> { self._rep }
    fn get_rep_ref(&self) -> Option<&ControlBlockBase> { self._rep.map(|rep| unsafe { &*rep.as_ptr() }) }

    pub fn get(&self) -> Option<&T> { self._ptr.map(|ptr| unsafe { &*ptr.as_ptr() }) }
    pub fn get_ptr(&self) -> Option<NonNull<T>> { self._ptr }

    /// Mutable access, only while this is the sole handle (strong or weak) to the object.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match (self._ptr, self.use_count(), self.weak_count()) {
            (Some(ptr), 1, 0) => Some(unsafe { &mut *ptr.as_ptr() }),
            _ => None
        }
    }

    pub fn use_count(&self) -> usize { self.get_rep_ref().map_or(0, |rep| rep.strong_count()) }
    pub fn weak_count(&self) -> usize { self.get_rep_ref().map_or(0, |rep| rep.weak_count()) }
    pub fn unique(&self) -> bool { self.use_count() == 1 }
    pub fn is_valid(&self) -> bool { self._ptr.is_some() }

    /// True if both pointers share a control block, even when they point at different
    /// objects through aliasing.
    pub fn owner_eq<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool { self._rep == other._rep }

    /// Release ownership, leaving this SharedPtr empty.
    pub fn reset(&mut self) { let _ = self.take(); }

    /// Release ownership and take ownership of `data` instead.
    pub fn reset_with(&mut self, data: Box<T>) { *self = Self::from_box(data); }

    pub fn swap(&mut self, other: &mut Self) { std::mem::swap(self, other) }

    /// Move out of this SharedPtr, leaving it empty. Counts are unchanged.
    pub fn take(&mut self) -> Self { std::mem::take(self) }

    pub fn downgrade(&self) -> WeakPtr<T> { WeakPtr::from(self) }
}

/// Construct an object of type T sharing a single allocation with its control block.
pub fn make_shared<T>(data: T) -> SharedPtr<T> { SharedPtr::make_shared(data) }

/// Construct an object of type T in place inside its control block.
pub fn make_shared_with<T, F>(init: F) -> SharedPtr<T>
where F: FnOnce() -> T
{
    SharedPtr::make_shared_with(init)
}

impl<T: ?Sized> Default for SharedPtr<T> {
    fn default() -> Self { Self::new() }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        if let Some(rep) = self.get_rep_ref() {
            rep.inc_strong();
        }
        unsafe { Self::from_parts(self._ptr, self._rep) }
    }
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        if let Some(rep) = self._rep {
            unsafe { ControlBlockBase::release_strong(rep) }
        }
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;
    /// # Panics
    /// Panics if the SharedPtr is empty.
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(v) => v,
            None => panic!("dereferenced an empty SharedPtr")
        }
    }
}

// explicit promotion from a weak pointer (std::shared_ptr(const std::weak_ptr&)). A WeakPtr
// that never observed anything promotes to an empty SharedPtr; only a destroyed object is
// an error
impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = BadWeakPtr;
    fn try_from(weak: &WeakPtr<T>) -> Result<Self, Self::Error> {
        let (ptr, rep) = weak.get_parts();
        match rep {
            None => Ok(Self::new()),
            Some(block) if unsafe { block.as_ref() }.try_inc_strong() => {
                Ok(unsafe { Self::from_parts(ptr, rep) })
            },
            Some(_) => Err(BadWeakPtr)
        }
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    fn from(data: Box<T>) -> Self { Self::from_box(data) }
}

impl<T: ?Sized> From<UniquePtr<T, DefaultDeleter>> for SharedPtr<T> {
    fn from(mut unique: UniquePtr<T, DefaultDeleter>) -> Self {
        match unique.release() {
            Some(ptr) => unsafe { Self::from_raw(ptr.as_ptr()) },
            None => Self::new()
        }
    }
}

// pointer identity, compared by address only
impl<T, U> PartialEq<SharedPtr<U>> for SharedPtr<T>
where T: ?Sized,
      U: ?Sized
{
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        self._ptr.map(|p| p.cast::<u8>()) == other._ptr.map(|p| p.cast::<u8>())
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T> Debug for SharedPtr<T>
where T: Debug + ?Sized
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "SharedPtr {{ data: {:?}, strong: {}, weak: {} }}",
                v, self.use_count(), self.weak_count()),
            None => write!(f, "SharedPtr {{ null }}")
        }
    }
}

impl<T> Display for SharedPtr<T>
where T: Display + ?Sized
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "null")
        }
    }
}
