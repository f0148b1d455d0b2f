use allocator_api2::alloc::{ Allocator, Global };
use std::{
    alloc::{ handle_alloc_error, Layout },
    cell::Cell,
    mem::MaybeUninit,
    ptr::NonNull
};

// Type-erased operations of a control block. Every concrete block starts with a
// ControlBlockBase, so a NonNull<ControlBlockBase> can be passed to these functions
// regardless of which variant allocated it.
pub struct BlockVtable {
    // destroy the managed object, keeping the block's memory alive
    delete_obj: unsafe fn(NonNull<ControlBlockBase>),
    // free the block's memory. delete_obj must already have run
    deallocate: unsafe fn(NonNull<ControlBlockBase>),
    kind: &'static str
}

// std::_Sp_counted_base
#[repr(C)]
pub struct ControlBlockBase {
    vtable: &'static BlockVtable,
    strong: Cell<usize>,
    weak: Cell<usize>
}

impl ControlBlockBase {
    fn new(vtable: &'static BlockVtable) -> Self {
        Self { vtable, strong: Cell::new(0), weak: Cell::new(0) }
    }

    pub fn strong_count(&self) -> usize { self.strong.get() }
    pub fn weak_count(&self) -> usize { self.weak.get() }
    pub fn kind(&self) -> &'static str { self.vtable.kind }

    pub(crate) fn inc_strong(&self) { self.strong.set(self.strong.get() + 1) }
    pub(crate) fn inc_weak(&self) { self.weak.set(self.weak.get() + 1) }

    /// Promotion step: take one strong reference if the object is still alive.
    pub(crate) fn try_inc_strong(&self) -> bool {
        match self.strong.get() {
            0 => false,
            n => { self.strong.set(n + 1); true }
        }
    }

    /// Give up one strong reference. If it was the last one the payload is destroyed, and
    /// the block is freed once no weak references remain.
    ///
    /// # Safety
    /// `this` must point to a live block on which the caller holds a strong reference.
    pub(crate) unsafe fn release_strong(this: NonNull<Self>) {
        let block = unsafe { this.as_ref() };
        let strong = block.strong.get() - 1;
        block.strong.set(strong);
        if strong == 0 {
            // the payload may own a WeakPtr to itself. Hold the block open until its
            // destructor has returned
            block.inc_weak();
            tracing::trace!(block = ?this, kind = block.kind(), "destroying payload");
            unsafe { (block.vtable.delete_obj)(this) };
            unsafe { Self::release_weak(this) };
        }
    }

    /// Give up one weak reference, freeing the block if nothing references it anymore.
    ///
    /// # Safety
    /// `this` must point to a live block on which the caller holds a weak reference.
    pub(crate) unsafe fn release_weak(this: NonNull<Self>) {
        let block = unsafe { this.as_ref() };
        let weak = block.weak.get() - 1;
        block.weak.set(weak);
        if weak == 0 && block.strong.get() == 0 {
            tracing::trace!(block = ?this, kind = block.kind(), "deallocating control block");
            let deallocate = block.vtable.deallocate;
            unsafe { deallocate(this) };
        }
    }
}

fn allocate_block<B>(block: B) -> NonNull<B> {
    let layout = Layout::new::<B>();
    let mem = match Global.allocate(layout) {
        Ok(mem) => mem.cast::<B>(),
        Err(_) => handle_alloc_error(layout)
    };
    unsafe { mem.as_ptr().write(block) };
    tracing::trace!(block = ?mem, size = layout.size(), "allocated control block");
    mem
}

unsafe fn deallocate_block<B>(this: NonNull<ControlBlockBase>) {
    unsafe { Global.deallocate(this.cast::<u8>(), Layout::new::<B>()) }
}

// frees a block whose payload was never constructed, if the constructor unwinds
struct UnwindGuard<B>(NonNull<B>);

impl<B> Drop for UnwindGuard<B> {
    fn drop(&mut self) {
        tracing::trace!(block = ?self.0, "constructor panicked, deallocating control block");
        unsafe { Global.deallocate(self.0.cast::<u8>(), Layout::new::<B>()) }
    }
}

// Control block for an object that was allocated on its own (std::_Sp_counted_ptr)
#[repr(C)]
pub struct ControlBlockPointer<T: ?Sized> {
    base: ControlBlockBase,
    ptr: NonNull<T>
}

impl<T: ?Sized> ControlBlockPointer<T> {
    const VTABLE: &'static BlockVtable = &BlockVtable {
        delete_obj: Self::delete_obj,
        deallocate: deallocate_block::<Self>,
        kind: "pointer"
    };

    /// Allocate a block taking ownership of `ptr`, with a strong count of 1.
    ///
    /// # Safety
    /// `ptr` must come from `Box::into_raw` and must not be owned by anything else.
    pub(crate) unsafe fn new(ptr: NonNull<T>) -> NonNull<ControlBlockBase> {
        let out = allocate_block(Self { base: ControlBlockBase::new(Self::VTABLE), ptr });
        let base = out.cast::<ControlBlockBase>();
        unsafe { base.as_ref() }.inc_strong();
        base
    }

    unsafe fn delete_obj(this: NonNull<ControlBlockBase>) {
        let this = this.cast::<Self>();
        let ptr = unsafe { this.as_ref() }.ptr;
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

// Control block with the object stored inline (std::_Sp_counted_ptr_inplace)
#[repr(C)]
pub struct ControlBlockHolder<T> {
    base: ControlBlockBase,
    storage: MaybeUninit<T>
}

impl<T> ControlBlockHolder<T> {
    const VTABLE: &'static BlockVtable = &BlockVtable {
        delete_obj: Self::delete_obj,
        deallocate: deallocate_block::<Self>,
        kind: "holder"
    };

    /// Allocate a block and construct the object in its storage from `init`, with a strong
    /// count of 1. This is the only allocation made for the object.
    pub(crate) fn new<F>(init: F) -> NonNull<Self>
    where F: FnOnce() -> T
    {
        let out = allocate_block(Self {
            base: ControlBlockBase::new(Self::VTABLE),
            storage: MaybeUninit::uninit()
        });
        let guard = UnwindGuard(out);
        unsafe { (*out.as_ptr()).storage.write(init()); }
        std::mem::forget(guard);
        unsafe { out.as_ref() }.base.inc_strong();
        out
    }

    // `this` must come from ControlBlockHolder::new
    pub(crate) fn get_ptr(this: NonNull<Self>) -> NonNull<T> {
        unsafe { NonNull::new_unchecked((&raw mut (*this.as_ptr()).storage).cast::<T>()) }
    }

    pub(crate) fn as_base(this: NonNull<Self>) -> NonNull<ControlBlockBase> { this.cast() }

    unsafe fn delete_obj(this: NonNull<ControlBlockBase>) {
        let this = this.cast::<Self>();
        unsafe { std::ptr::drop_in_place(Self::get_ptr(this).as_ptr()) }
    }
}
