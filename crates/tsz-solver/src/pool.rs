//! Slot pools and the `users`-counted garbage collector (spec §4.5).
//!
//! Two [`Pool`]s back the type graph: one for [`Type`], one for
//! [`TypeRef`]. Each hands out fixed slots from a growable vector, returning
//! freed slots to a free list rather than shrinking. `users` is the only
//! ownership signal: when it reaches zero the node is pushed onto a bounded
//! GC queue instead of being freed inline, so a long release chain (e.g.
//! dropping a deeply nested tuple) doesn't recurse through the whole chain
//! on the stack of whichever opcode triggered it.

use std::collections::VecDeque;

use crate::types::{Type, TypeFlags, TypeId, TypeRef, TypeRefId};

/// Number of block-sized regions a pool's backing `Vec` is divided into,
/// purely for the `blocks()` counter -- slots are never actually allocated
/// in chunks, but real block-pool implementations report this, and dividing
/// `slots.len()` by it gives callers a stable approximation of "how much
/// backing memory is this pool holding onto".
const BLOCK_SIZE: usize = 4096;

/// Flush the GC queue once it holds this many pending releases.
const GC_QUEUE_BOUND: usize = 1024;

/// A fixed-slot pool with free-list reuse.
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    active: usize,
}

impl<T> Pool<T> {
    #[must_use]
    pub fn new() -> Self {
        Pool {
            slots: Vec::new(),
            free: Vec::new(),
            active: 0,
        }
    }

    pub fn allocate(&mut self, value: T) -> u32 {
        self.active += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(value);
            id
        } else {
            let id = self.slots.len() as u32;
            self.slots.push(Some(value));
            id
        }
    }

    pub fn deallocate(&mut self, id: u32) -> T {
        let value = self.slots[id as usize]
            .take()
            .expect("deallocate of an already-free slot");
        self.free.push(id);
        self.active -= 1;
        value
    }

    #[must_use]
    pub fn get(&self, id: u32) -> &T {
        self.slots[id as usize]
            .as_ref()
            .expect("access through a freed slot id")
    }

    pub fn get_mut(&mut self, id: u32) -> &mut T {
        self.slots[id as usize]
            .as_mut()
            .expect("access through a freed slot id")
    }

    /// Live slot count.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active
    }

    /// Coarse count of backing block-sized regions still reserved.
    #[must_use]
    pub fn blocks(&self) -> usize {
        self.slots.len().div_ceil(BLOCK_SIZE).max(usize::from(!self.slots.is_empty()))
    }

    /// Logically empty the pool, retaining its backing blocks for reuse.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.active = 0;
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the type graph's memory: the `Type` and `TypeRef` pools plus their
/// bounded GC queues. One `TypeArena` per run (see spec §5, "Reentrancy").
pub struct TypeArena {
    types: Pool<Type>,
    refs: Pool<TypeRef>,
    type_queue: VecDeque<TypeId>,
    ref_queue: VecDeque<TypeRefId>,
}

impl TypeArena {
    #[must_use]
    pub fn new() -> Self {
        TypeArena {
            types: Pool::new(),
            refs: Pool::new(),
            type_queue: VecDeque::new(),
            ref_queue: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn types(&self) -> &Pool<Type> {
        &self.types
    }

    #[must_use]
    pub fn refs(&self) -> &Pool<TypeRef> {
        &self.refs
    }

    #[must_use]
    pub fn type_ref(&self, id: TypeId) -> &Type {
        self.types.get(id.0)
    }

    pub fn type_mut(&mut self, id: TypeId) -> &mut Type {
        self.types.get_mut(id.0)
    }

    #[must_use]
    pub fn ref_ref(&self, id: TypeRefId) -> &TypeRef {
        self.refs.get(id.0)
    }

    pub fn ref_mut(&mut self, id: TypeRefId) -> &mut TypeRef {
        self.refs.get_mut(id.0)
    }

    /// Allocate a fresh `Type` with `users == 0`.
    pub fn alloc_type(&mut self, ty: Type) -> TypeId {
        TypeId(self.types.allocate(ty))
    }

    /// Allocate a fresh `TypeRef` with `users == 0`.
    pub fn alloc_ref(&mut self, r: TypeRef) -> TypeRefId {
        TypeRefId(self.refs.allocate(r))
    }

    /// One user takes ownership of `id`.
    pub fn retain_type(&mut self, id: TypeId) {
        self.types.get_mut(id.0).users += 1;
    }

    /// One user drops ownership of `id`. Enqueues for collection when the
    /// count reaches zero; never frees inline.
    pub fn release_type(&mut self, id: TypeId) {
        let ty = self.types.get_mut(id.0);
        debug_assert!(ty.users > 0, "users underflow on Type {id:?}");
        ty.users -= 1;
        if ty.users == 0 {
            self.type_queue.push_back(id);
            if self.type_queue.len() >= GC_QUEUE_BOUND {
                self.flush();
            }
        }
    }

    pub fn retain_ref(&mut self, id: TypeRefId) {
        self.refs.get_mut(id.0).users += 1;
    }

    pub fn release_ref(&mut self, id: TypeRefId) {
        let r = self.refs.get_mut(id.0);
        debug_assert!(r.users > 0, "users underflow on TypeRef {id:?}");
        r.users -= 1;
        if r.users == 0 {
            self.ref_queue.push_back(id);
            if self.ref_queue.len() >= GC_QUEUE_BOUND {
                self.flush();
            }
        }
    }

    /// Drain both GC queues, recursively releasing anything a collected
    /// node owned. A node re-retained after being enqueued (its `users`
    /// climbed back above zero before the flush reached it) is skipped.
    pub fn flush(&mut self) {
        loop {
            let mut did_work = false;

            while let Some(id) = self.type_queue.pop_front() {
                did_work = true;
                if self.types.get(id.0).users != 0 {
                    continue;
                }
                if self.types.get(id.0).flags.contains(TypeFlags::STORED) {
                    // Stored types are owned by a subroutine cache; the
                    // cache entry itself counts a user, so users == 0 here
                    // means the cache was already cleared. Safe to free.
                }
                let ty = self.types.deallocate(id.0);
                match ty.children {
                    crate::types::Children::None => {}
                    crate::types::Children::Single(child) => self.release_type(child),
                    crate::types::Children::Chain(Some(head)) => self.release_ref(head),
                    crate::types::Children::Chain(None) => {}
                }
            }

            while let Some(id) = self.ref_queue.pop_front() {
                did_work = true;
                if self.refs.get(id.0).users != 0 {
                    continue;
                }
                let r = self.refs.deallocate(id.0);
                self.release_type(r.target);
                if let Some(next) = r.next {
                    self.release_ref(next);
                }
            }

            if !did_work {
                break;
            }
        }
    }

    /// Drop every `Type` still referenced from `stack`, then flush. Used at
    /// program end to release anything left on the operand stack (the
    /// operand stack itself never counts as a user, so this is the one
    /// place values still "on the stack" get their final decrement).
    pub fn stack_gc(&mut self, stack: &[TypeId]) {
        for &id in stack {
            self.release_type(id);
        }
        self.flush();
    }

    /// Reset both pools to empty. Called as part of `clear(module)`.
    pub fn clear(&mut self) {
        self.types.clear();
        self.refs.clear();
        self.type_queue.clear();
        self.ref_queue.clear();
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Kind, Type, TypeFlags};

    fn leaf(arena: &mut TypeArena) -> TypeId {
        arena.alloc_type(Type::atomic(Kind::Never, TypeFlags::empty(), 0, 0))
    }

    #[test]
    fn release_to_zero_frees_the_slot() {
        let mut arena = TypeArena::new();
        let id = leaf(&mut arena);
        arena.retain_type(id);
        assert_eq!(arena.types().active(), 1);
        arena.release_type(id);
        arena.flush();
        assert_eq!(arena.types().active(), 0);
    }

    #[test]
    fn releasing_a_single_child_cascades() {
        let mut arena = TypeArena::new();
        let child = leaf(&mut arena);
        arena.retain_type(child);
        let parent = arena.alloc_type(Type::with_single_child(
            Kind::Array,
            TypeFlags::empty(),
            0,
            0,
            child,
        ));
        arena.retain_type(parent);
        arena.release_type(parent);
        arena.flush();
        assert_eq!(arena.types().active(), 0);
    }

    #[test]
    fn re_retained_node_survives_the_flush() {
        let mut arena = TypeArena::new();
        let id = leaf(&mut arena);
        arena.retain_type(id);
        arena.release_type(id);
        arena.retain_type(id); // resurrected before the queue drains
        arena.flush();
        assert_eq!(arena.types().active(), 1);
    }
}
