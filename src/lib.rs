//! Reference counted smart pointers modelled on the C++ standard library: `SharedPtr`,
//! `WeakPtr` and `UniquePtr`. Reference counts are plain integers, so none of these types
//! can be shared between threads.
//!
//! Control blocks are an implementation detail and can't be reached from outside:
//!
//! ```compile_fail
//! use cpp_smart_ptrs::ptr::control_block::ControlBlockHolder;
//! ```
pub mod ptr {
    pub(crate) mod control_block;
    pub mod error;
    pub mod shared_from_this;
    pub mod shared_ptr;
    pub mod unique_ptr;
    pub mod weak_ptr;
}

pub use ptr::{
    error::BadWeakPtr,
    shared_from_this::{ make_shared_from_this, EnableSharedFromThis, SharedFromThis },
    shared_ptr::{ make_shared, make_shared_with, SharedPtr },
    unique_ptr::{ DefaultDeleter, Deleter, UniquePtr },
    weak_ptr::WeakPtr
};
