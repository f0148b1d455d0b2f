use crate::ptr::{
    control_block::ControlBlockBase,
    error::BadWeakPtr,
    shared_ptr::SharedPtr
};
use std::{
    fmt::{ Debug, Display },
    ptr::NonNull
};

/// Non-owning observer of an object managed by [`SharedPtr`].
///
/// A `WeakPtr` keeps the control block allocated, but not the object. Use
/// [`WeakPtr::lock`] to get temporary ownership while the object is still alive.
// std::weak_ptr
pub struct WeakPtr<T: ?Sized> {
    _ptr: Option<NonNull<T>>,
    _rep: Option<NonNull<ControlBlockBase>>
}

impl<T: ?Sized> WeakPtr<T> {
    pub const fn new() -> Self { Self { _ptr: None, _rep: None } }

    pub(crate) fn get_parts(&self) -> (Option<NonNull<T>>, Option<NonNull<ControlBlockBase>>) {
        (self._ptr, self._rep)
    }
    fn get_rep_ref(&self) -> Option<&ControlBlockBase> { self._rep.map(|rep| unsafe { &*rep.as_ptr() }) }

    pub fn use_count(&self) -> usize { self.get_rep_ref().map_or(0, |rep| rep.strong_count()) }
    pub fn weak_count(&self) -> usize { self.get_rep_ref().map_or(0, |rep| rep.weak_count()) }

    /// True once the object is gone, or if this WeakPtr never referenced one.
    pub fn expired(&self) -> bool { self.use_count() == 0 }

    /// Get a SharedPtr to the object, or an empty SharedPtr if it has been destroyed.
    pub fn lock(&self) -> SharedPtr<T> { self.upgrade().unwrap_or_default() }

    /// Like [`WeakPtr::lock`], but reports a destroyed object as an error. A WeakPtr which
    /// never observed an object gives an empty SharedPtr.
    pub fn upgrade(&self) -> Result<SharedPtr<T>, BadWeakPtr> { SharedPtr::try_from(self) }

    /// Drop this WeakPtr's interest in the control block, leaving it empty.
    pub fn reset(&mut self) { let _ = self.take(); }

    pub fn swap(&mut self, other: &mut Self) { std::mem::swap(self, other) }

    /// Move out of this WeakPtr, leaving it empty. Counts are unchanged.
    pub fn take(&mut self) -> Self { std::mem::take(self) }

    /// Convert to a WeakPtr of another type observing the same control block, e.g.
    /// `|p| p as *mut dyn Trait`. Counts are unchanged. If `f` returns null the result is
    /// empty and this WeakPtr's reference is released.
    ///
    /// # Safety
    /// `f` must only adjust the pointer it is given: the result has to stay valid for as
    /// long as the observed object is alive, typically because it points into that object.
    pub unsafe fn cast<U, F>(mut self, f: F) -> WeakPtr<U>
    where U: ?Sized,
          F: FnOnce(*mut T) -> *mut U
    {
        let _ptr = self._ptr.take().and_then(|ptr| NonNull::new(f(ptr.as_ptr())));
        match _ptr {
            Some(_) => WeakPtr { _ptr, _rep: self._rep.take() },
            // self still holds the weak reference and gives it up when dropped here
            None => WeakPtr::new()
        }
    }

    /// True if both pointers observe the same control block.
    pub fn owner_eq<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool { self._rep == other._rep }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    fn default() -> Self { Self::new() }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(rep) = self.get_rep_ref() {
            rep.inc_weak();
        }
        Self { _ptr: self._ptr, _rep: self._rep }
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        let _rep = shared.get_rep();
        if let Some(rep) = _rep {
            unsafe { rep.as_ref() }.inc_weak();
        }
        Self { _ptr: shared.get_ptr(), _rep }
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        // the block outlives its object if weak references remain. Free it with the last one
        if let Some(rep) = self._rep {
            unsafe { ControlBlockBase::release_weak(rep) }
        }
    }
}

impl<T> Debug for WeakPtr<T>
where T: Debug + ?Sized
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // format through an owner so the object can't be destroyed while it's borrowed
        let locked = self.lock();
        match locked.get() {
            Some(v) => write!(f, "WeakPtr {{ data: {:?}, strong: {}, weak: {} }}",
                v, locked.use_count() - 1, self.weak_count()),
            None => write!(f, "WeakPtr {{ expired }}")
        }
    }
}

impl<T> Display for WeakPtr<T>
where T: Display + ?Sized
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let locked = self.lock();
        match locked.get() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "None")
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::WeakPtr;
    use crate::ptr::{
        error::BadWeakPtr,
        shared_ptr::{ make_shared, SharedPtr }
    };
    use std::{
        cell::{ Cell, RefCell },
        error::Error,
        fmt::{ Debug, Display },
        rc::Rc
    };
    type TestReturn = Result<(), Box<dyn Error>>;

    struct DropCounter(Rc<Cell<usize>>);
    impl Drop for DropCounter {
        fn drop(&mut self) { self.0.set(self.0.get() + 1) }
    }

    fn check_strong_count(get: usize, expect: usize) {
        assert!(get == expect, "Strong count should be {} instead of {}", expect, get);
    }
    fn check_weak_count(get: usize, expect: usize) {
        assert!(get == expect, "Weak count should be {} instead of {}", expect, get);
    }

    #[test]
    fn default_is_expired() -> TestReturn {
        let weak: WeakPtr<i32> = WeakPtr::new();
        assert!(weak.expired(), "Default WeakPtr should be expired");
        check_strong_count(weak.use_count(), 0);
        assert!(!weak.lock().is_valid(), "Locking a default WeakPtr should give an empty SharedPtr");
        let upgraded = weak.upgrade()?;
        assert!(!upgraded.is_valid(), "Upgrading a default WeakPtr should give an empty SharedPtr");
        Ok(())
    }

    #[test]
    fn weak_pointers() -> TestReturn {
        let weak_ptr;
        {
            let shared_ptr = make_shared(200);
            weak_ptr = shared_ptr.downgrade();
            check_strong_count(shared_ptr.use_count(), 1);
            check_weak_count(shared_ptr.weak_count(), 1);
            assert!(weak_ptr.lock() == shared_ptr, "Locked pointer should equal the owner");
            assert!(weak_ptr.lock().get() == Some(&200), "Value from weak_ptr should be Some(200)");
        }
        check_strong_count(weak_ptr.use_count(), 0);
        assert!(weak_ptr.expired(), "WeakPtr should expire after its owner is dropped");
        assert!(weak_ptr.upgrade() == Err(BadWeakPtr), "Upgrading a WeakPtr to a destroyed object should fail");
        assert!(weak_ptr.lock().get().is_none(), "Value after shared ptr dropped should be None");
        Ok(())
    }

    #[test]
    fn weak_does_not_keep_object_alive() -> TestReturn {
        let drops = Rc::new(Cell::new(0));
        let owner = make_shared(DropCounter(drops.clone()));
        let weak = WeakPtr::from(&owner);
        let weak2 = weak.clone();
        check_weak_count(owner.weak_count(), 2);
        drop(owner);
        assert!(drops.get() == 1, "Object should be dropped with its last owner");
        assert!(weak.expired() && weak2.expired(), "Both observers should see the expiry");
        check_weak_count(weak.weak_count(), 2);
        drop(weak2);
        check_weak_count(weak.weak_count(), 1);
        Ok(())
    }

    #[test]
    fn lock_shares_ownership() -> TestReturn {
        let owner = make_shared(7);
        let weak = owner.downgrade();
        let second = weak.lock();
        check_strong_count(second.use_count(), 2);
        assert!(*second == 7, "Locked value should be 7 instead of {}", *second);
        drop(owner);
        assert!(!weak.expired(), "Locked SharedPtr should keep the object alive");
        drop(second);
        assert!(weak.expired());
        Ok(())
    }

    #[test]
    fn take_and_reset() -> TestReturn {
        let owner = make_shared(1);
        let mut weak = owner.downgrade();
        let moved = weak.take();
        assert!(weak.expired(), "Moved-from WeakPtr should be empty");
        check_weak_count(owner.weak_count(), 1);
        assert!(!moved.expired(), "Moved-to WeakPtr should observe the object");
        let mut other = WeakPtr::new();
        let mut moved = moved;
        moved.swap(&mut other);
        assert!(moved.expired() && !other.expired(), "WeakPtrs should be swapped");
        other.reset();
        check_weak_count(owner.weak_count(), 0);
        assert!(other.expired(), "Reset WeakPtr should be empty");
        Ok(())
    }

    #[test]
    fn assign_from_shared() -> TestReturn {
        let first = make_shared(String::from("Chest"));
        let second = make_shared(String::from("Door"));
        let mut weak = first.downgrade();
        check_weak_count(first.weak_count(), 1);
        weak = WeakPtr::from(&second);
        check_weak_count(first.weak_count(), 0);
        check_weak_count(second.weak_count(), 1);
        assert!(weak.lock() == second);
        assert!(weak.owner_eq(&second.downgrade()));
        Ok(())
    }

    #[test]
    fn aliased_weak_pointer() -> TestReturn {
        let owner = make_shared((1u8, 2u16));
        let field: SharedPtr<u16> = owner.project(|v| &v.1);
        let weak = field.downgrade();
        drop(field);
        assert!(weak.lock().get() == Some(&2), "Weak alias should lock to the field");
        drop(owner);
        assert!(weak.expired(), "Weak alias should expire with the owner");
        Ok(())
    }

    #[test]
    fn cast_to_trait_object() -> TestReturn {
        let owner = make_shared(25u32);
        let weak = owner.downgrade();
        let shown: WeakPtr<dyn Display> = unsafe { weak.cast(|p| p as *mut dyn Display) };
        check_weak_count(owner.weak_count(), 1);
        assert!(shown.lock().to_string() == "25", "Cast WeakPtr should lock to the same object");
        check_strong_count(owner.use_count(), 1);
        drop(owner);
        assert!(shown.expired(), "Cast WeakPtr should expire with the owner");
        assert!(shown.upgrade().is_err());
        let empty: WeakPtr<dyn Display> = unsafe { WeakPtr::<u32>::new().cast(|p| p as *mut dyn Display) };
        assert!(empty.expired() && empty.weak_count() == 0);
        Ok(())
    }

    // drops the last outside owner of itself while being formatted
    struct SelfReleasing {
        owner: Rc<RefCell<Option<SharedPtr<SelfReleasing>>>>,
        name: String
    }

    impl Debug for SelfReleasing {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let owner = self.owner.borrow_mut().take();
            drop(owner);
            write!(f, "{}", self.name)
        }
    }

    #[test]
    fn format_keeps_object_alive() -> TestReturn {
        let slot = Rc::new(RefCell::new(None));
        let owner = make_shared(SelfReleasing { owner: slot.clone(), name: String::from("Enemy4") });
        let weak = owner.downgrade();
        *slot.borrow_mut() = Some(owner);
        let out = format!("{:?}", weak);
        assert!(out == "WeakPtr { data: Enemy4, strong: 1, weak: 1 }", "Unexpected output {}", out);
        assert!(weak.expired(), "Object should be destroyed once formatting has finished");
        Ok(())
    }

    #[test]
    fn format_pointer() -> TestReturn {
        let owner = make_shared(300);
        let weak = owner.downgrade();
        assert!(format!("{}", weak) == "300");
        assert!(format!("{:?}", weak) == "WeakPtr { data: 300, strong: 1, weak: 1 }");
        drop(owner);
        assert!(format!("{:?}", weak) == "WeakPtr { expired }");
        assert!(format!("{}", weak) == "None");
        Ok(())
    }
}
