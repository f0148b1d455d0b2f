use std::fmt::{ Display, Formatter };

/// Raised when promoting a `WeakPtr` whose object has already been destroyed (or which
/// never referenced one). `WeakPtr::lock` reports the same condition as an empty
/// `SharedPtr` instead.
// std::bad_weak_ptr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BadWeakPtr;

impl Display for BadWeakPtr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "bad weak pointer: the referenced object has been destroyed")
    }
}

impl std::error::Error for BadWeakPtr {}
