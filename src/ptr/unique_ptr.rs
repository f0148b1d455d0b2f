use std::{
    fmt::{ Debug, Display },
    marker::PhantomData,
    ops::{ Deref, DerefMut },
    ptr::NonNull
};

/// Frees the object owned by a [`UniquePtr`].
pub trait Deleter<T: ?Sized> {
    /// # Safety
    /// Called at most once per object, with a pointer the deleter is able to free.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Frees objects that were allocated through `Box`. Zero-sized, so a UniquePtr using it is
/// the size of a pointer.
// std::default_delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefaultDeleter;

impl<T: ?Sized> Deleter<T> for DefaultDeleter {
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(unsafe { Box::from_raw(ptr.as_ptr()) })
    }
}

impl<T, F> Deleter<T> for F
where T: ?Sized,
      F: FnMut(NonNull<T>)
{
    unsafe fn delete(&mut self, ptr: NonNull<T>) { self(ptr) }
}

// std::unique_ptr
pub struct UniquePtr<T: ?Sized, D = DefaultDeleter>
where D: Deleter<T>
{
    _ptr: Option<NonNull<T>>,
    _deleter: D,
    _data: PhantomData<T>
}

impl<T: ?Sized> UniquePtr<T, DefaultDeleter> {
    pub const fn new() -> Self { Self { _ptr: None, _deleter: DefaultDeleter, _data: PhantomData } }

    pub fn from_box(data: Box<T>) -> Self {
        Self { _ptr: Some(NonNull::from(Box::leak(data))), _deleter: DefaultDeleter, _data: PhantomData }
    }

    /// # Safety
    /// `ptr` must be null or come from `Box::into_raw`, and must not be owned by anything
    /// else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self { _ptr: NonNull::new(ptr), _deleter: DefaultDeleter, _data: PhantomData }
    }

    /// Release ownership and take ownership of `data` instead.
    pub fn reset_with(&mut self, data: Box<T>) {
        let old = self._ptr.replace(NonNull::from(Box::leak(data)));
        self.delete_old(old);
    }

    pub fn into_box(mut self) -> Option<Box<T>> {
        self.release().map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }
}

impl<T, D> UniquePtr<T, D>
where T: ?Sized,
      D: Deleter<T>
{
    /// # Safety
    /// `ptr` must be null or valid until `deleter` is called on it, and must not be owned
    /// by anything else.
    pub unsafe fn from_raw_with_deleter(ptr: *mut T, deleter: D) -> Self {
        Self { _ptr: NonNull::new(ptr), _deleter: deleter, _data: PhantomData }
    }

    pub fn get(&self) -> Option<&T> { self._ptr.map(|ptr| unsafe { &*ptr.as_ptr() }) }
    pub fn get_mut(&mut self) -> Option<&mut T> { self._ptr.map(|ptr| unsafe { &mut *ptr.as_ptr() }) }
    pub fn get_ptr(&self) -> Option<NonNull<T>> { self._ptr }
    pub fn get_deleter(&self) -> &D { &self._deleter }
    pub fn get_deleter_mut(&mut self) -> &mut D { &mut self._deleter }
    pub fn is_valid(&self) -> bool { self._ptr.is_some() }

    /// Give up ownership without freeing the object. The caller is responsible for it.
    pub fn release(&mut self) -> Option<NonNull<T>> { self._ptr.take() }

    /// Free the object, leaving this UniquePtr empty.
    pub fn reset(&mut self) {
        let old = self._ptr.take();
        self.delete_old(old);
    }

    pub fn swap(&mut self, other: &mut Self) { std::mem::swap(self, other) }

    fn delete_old(&mut self, old: Option<NonNull<T>>) {
        if let Some(ptr) = old {
            unsafe { self._deleter.delete(ptr) }
        }
    }
}

impl<T: ?Sized> Default for UniquePtr<T, DefaultDeleter> {
    fn default() -> Self { Self::new() }
}

impl<T: ?Sized> From<Box<T>> for UniquePtr<T, DefaultDeleter> {
    fn from(data: Box<T>) -> Self { Self::from_box(data) }
}

impl<T, D> Drop for UniquePtr<T, D>
where T: ?Sized,
      D: Deleter<T>
{
    fn drop(&mut self) { self.reset() }
}

impl<T, D> Deref for UniquePtr<T, D>
where T: ?Sized,
      D: Deleter<T>
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(v) => v,
            None => panic!("dereferenced an empty UniquePtr")
        }
    }
}

impl<T, D> DerefMut for UniquePtr<T, D>
where T: ?Sized,
      D: Deleter<T>
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.get_mut() {
            Some(v) => v,
            None => panic!("dereferenced an empty UniquePtr")
        }
    }
}

impl<T, D> Debug for UniquePtr<T, D>
where T: Debug + ?Sized,
      D: Deleter<T>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "UniquePtr {{ data: {:?} }}", v),
            None => write!(f, "UniquePtr {{ null }}")
        }
    }
}

impl<T, D> Display for UniquePtr<T, D>
where T: Display + ?Sized,
      D: Deleter<T>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "null")
        }
    }
}
