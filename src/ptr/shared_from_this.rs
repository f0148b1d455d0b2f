use crate::ptr::{
    error::BadWeakPtr,
    shared_ptr::SharedPtr,
    weak_ptr::WeakPtr
};
use std::cell::RefCell;

/// Embedded in an object to let it hand out [`SharedPtr`]s to itself. The object must be
/// created through [`make_shared_from_this`] or [`SharedPtr::from_box_shared_from_this`] so
/// that the owning control block gets recorded here.
// std::enable_shared_from_this
pub struct EnableSharedFromThis<T> {
    weak_this: RefCell<WeakPtr<T>>
}

impl<T> EnableSharedFromThis<T> {
    pub const fn new() -> Self { Self { weak_this: RefCell::new(WeakPtr::new()) } }

    // an object already owned elsewhere keeps its first owner
    fn attach(&self, owner: &SharedPtr<T>) {
        let mut weak_this = self.weak_this.borrow_mut();
        if weak_this.expired() {
            *weak_this = owner.downgrade();
        }
    }
}

impl<T> Default for EnableSharedFromThis<T> {
    fn default() -> Self { Self::new() }
}

// copies of the object are not owned by the same SharedPtr
impl<T> Clone for EnableSharedFromThis<T> {
    fn clone(&self) -> Self { Self::new() }
}

pub trait SharedFromThis: Sized {
    fn enable_shared_from_this(&self) -> &EnableSharedFromThis<Self>;

    /// A new owner sharing the control block of the SharedPtr that manages `self`. Fails
    /// if `self` isn't managed by a SharedPtr.
    fn shared_from_this(&self) -> Result<SharedPtr<Self>, BadWeakPtr> {
        let weak_this = self.enable_shared_from_this().weak_this.borrow();
        match weak_this.expired() {
            true => Err(BadWeakPtr),
            false => weak_this.upgrade()
        }
    }

    /// A WeakPtr to `self`. Empty if `self` isn't managed by a SharedPtr.
    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.enable_shared_from_this().weak_this.borrow().clone()
    }
}

/// [`SharedPtr::make_shared`] for objects which can hand out pointers to themselves.
pub fn make_shared_from_this<T>(data: T) -> SharedPtr<T>
where T: SharedFromThis
{
    let shared = SharedPtr::make_shared(data);
    shared.enable_shared_from_this().attach(&shared);
    shared
}

impl<T> SharedPtr<T>
where T: SharedFromThis
{
    /// [`SharedPtr::from_box`] for objects which can hand out pointers to themselves.
    pub fn from_box_shared_from_this(data: Box<T>) -> Self {
        let shared = SharedPtr::from_box(data);
        shared.enable_shared_from_this().attach(&shared);
        shared
    }
}
