//! The compiled [`Module`]: a single byte buffer plus a resolved subroutine
//! table, source map, and diagnostics vector (spec §4.2).
//!
//! [`ModuleBuilder`] is the compiler's write side: it appends storage
//! entries, source-map records, and subroutine bodies as they're emitted,
//! then [`ModuleBuilder::finish`] stitches the pieces into one contiguous
//! buffer matching the on-disk layout the VM expects. The VM only ever sees
//! the finished [`Module`].

use rustc_hash::FxHashMap;

use crate::diagnostic::Diagnostic;
use crate::isa::Op;
use crate::types::TypeId;

bitflags::bitflags! {
    /// Subroutine table flags (spec §4.2 step 4).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SubroutineFlags: u8 {
        /// Set when the subroutine's result must be cached rather than
        /// tail-called into -- a plain type alias with no type parameters,
        /// or the body of a distributive conditional (spec §4.3).
        const BLOCK_TAIL_CALL = 1 << 0;
    }
}

/// A callable typed computation, resolved for the VM (spec §3, "Subroutine").
#[derive(Debug)]
pub struct Subroutine {
    /// Storage-pool address of the subroutine's name.
    pub name_addr: u32,
    /// Absolute address of the subroutine's first bytecode instruction.
    pub body_addr: u32,
    pub flags: SubroutineFlags,
    /// Populated the first time this subroutine returns from a zero-argument
    /// call; `None` until then or after `clear`.
    pub result: Option<TypeId>,
    /// A caller-assigned override set via the `Set` opcode.
    pub narrowed: Option<TypeId>,
}

impl Subroutine {
    #[must_use]
    pub fn blocks_tail_call(&self) -> bool {
        self.flags.contains(SubroutineFlags::BLOCK_TAIL_CALL)
    }
}

/// One source-map entry: a bytecode position and the source range it maps to.
#[derive(Clone, Copy, Debug)]
pub struct SourceMapRecord {
    pub bytecode_pos: u32,
    pub source_pos: u32,
    pub source_end: u32,
}

/// A fully assembled, immutable-bytecode Module.
///
/// `code` holds everything *except* the resolved subroutine table and source
/// map, which are parsed out once at build time into `subroutines` and
/// `source_map` for O(1) lookup rather than re-scanning the header on every
/// `Call`.
pub struct Module {
    /// The full byte buffer, header and bodies together, exactly as
    /// described by spec §4.2. Addresses embedded in opcodes (storage,
    /// subroutine bodies, jump targets) are absolute offsets into this
    /// buffer.
    code: Vec<u8>,
    /// Absolute address of the `Main` opcode's first following instruction.
    main_addr: u32,
    /// Index 0 is always the main subroutine.
    subroutines: Vec<Subroutine>,
    source_map: Vec<SourceMapRecord>,
    diagnostics: Vec<Diagnostic>,
}

impl Module {
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub fn main_addr(&self) -> u32 {
        self.main_addr
    }

    #[must_use]
    pub fn subroutine(&self, id: u32) -> &Subroutine {
        &self.subroutines[id as usize]
    }

    pub fn subroutine_mut(&mut self, id: u32) -> &mut Subroutine {
        &mut self.subroutines[id as usize]
    }

    #[must_use]
    pub fn subroutine_count(&self) -> usize {
        self.subroutines.len()
    }

    /// Resolve `addr` (the body address of a subroutine, as embedded in a
    /// `Call`/`TailCall` operand) to its table index.
    #[must_use]
    pub fn subroutine_id_at(&self, addr: u32) -> Option<u32> {
        self.subroutines
            .iter()
            .position(|s| s.body_addr == addr)
            .map(|i| i as u32)
    }

    /// Read a storage-pool entry at absolute address `addr`: `(hash, text)`.
    #[must_use]
    pub fn storage_at(&self, addr: u32) -> (u64, &str) {
        let addr = addr as usize;
        let hash = u64::from_le_bytes(self.code[addr..addr + 8].try_into().unwrap());
        let len = u16::from_le_bytes(self.code[addr + 8..addr + 10].try_into().unwrap()) as usize;
        let bytes = &self.code[addr + 10..addr + 10 + len];
        (hash, std::str::from_utf8(bytes).unwrap_or(""))
    }

    /// Resolve a bytecode position to its source range via the source map.
    /// Falls back to `(0, 0)` (file-scoped) when no record matches, per
    /// spec §6.
    #[must_use]
    pub fn resolve_position(&self, bytecode_pos: u32) -> (u32, u32) {
        // Source-map records are emitted in bytecode order; the record
        // whose position is the closest one at-or-before `bytecode_pos`
        // is the one that covers it.
        self.source_map
            .iter()
            .rev()
            .find(|r| r.bytecode_pos <= bytecode_pos)
            .map(|r| (r.source_pos, r.source_end))
            .unwrap_or((0, 0))
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Empty every subroutine's caches and the diagnostics vector so the
    /// module can be re-run (spec §6, "Module surface").
    pub fn clear(&mut self) {
        for sub in &mut self.subroutines {
            sub.result = None;
            sub.narrowed = None;
        }
        self.diagnostics.clear();
    }
}

/// A pending subroutine body under construction by the compiler.
struct PendingSubroutine {
    name_addr: u32,
    flags: SubroutineFlags,
    body: Vec<u8>,
}

/// Builds a [`Module`] incrementally: interns storage strings, records
/// source-map entries, and appends finished subroutine bodies, then lays
/// everything out in the wire order the VM expects.
pub struct ModuleBuilder {
    storage: Vec<u8>,
    storage_index: FxHashMap<Box<str>, u32>,
    pending_source_map: FxHashMap<u32, Vec<SourceMapRecord>>,
    subroutines: Vec<PendingSubroutine>,
}

impl ModuleBuilder {
    #[must_use]
    pub fn new() -> Self {
        ModuleBuilder {
            storage: Vec::new(),
            storage_index: FxHashMap::default(),
            pending_source_map: FxHashMap::default(),
            subroutines: Vec::new(),
        }
    }

    /// Intern `text`, returning its storage-pool address. Reuses an
    /// existing entry if the exact same text was already interned.
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(&addr) = self.storage_index.get(text) {
            return addr;
        }
        let addr = self.storage.len() as u32;
        let hash = xxhash_rust::xxh64::xxh64(text.as_bytes(), 0);
        self.storage.extend_from_slice(&hash.to_le_bytes());
        let len = u16::try_from(text.len()).expect("storage entry longer than 64KiB");
        self.storage.extend_from_slice(&len.to_le_bytes());
        self.storage.extend_from_slice(text.as_bytes());
        self.storage_index.insert(text.into(), addr);
        addr
    }

    /// Register a new subroutine with an empty body, returning its index.
    /// The index doubles as the value later used for `Call`/`TailCall`
    /// addressing lookups once `finish` resolves body addresses.
    pub fn new_subroutine(&mut self, name_addr: u32) -> u32 {
        self.subroutines.push(PendingSubroutine {
            name_addr,
            flags: SubroutineFlags::empty(),
            body: Vec::new(),
        });
        (self.subroutines.len() - 1) as u32
    }

    pub fn set_block_tail_call(&mut self, subroutine: u32, value: bool) {
        let sub = &mut self.subroutines[subroutine as usize];
        sub.flags.set(SubroutineFlags::BLOCK_TAIL_CALL, value);
    }

    #[must_use]
    pub fn body_mut(&mut self, subroutine: u32) -> &mut Vec<u8> {
        &mut self.subroutines[subroutine as usize].body
    }

    #[must_use]
    pub fn body_len(&self, subroutine: u32) -> usize {
        self.subroutines[subroutine as usize].body.len()
    }

    /// Record that the bytes `[bytecode_pos, ...)` in the subroutine being
    /// emitted correspond to source range `[source_pos, source_end)`.
    /// `bytecode_pos` is a subroutine-local offset; it's rebased to an
    /// absolute body address in `finish`.
    pub fn record_source(&mut self, subroutine: u32, local_pos: u32, source_pos: u32, source_end: u32) {
        // Stashed with the subroutine index packed into bytecode_pos's
        // high bits would be fragile across a 32-bit space; instead we
        // keep a side table keyed by subroutine and rebase in `finish`.
        self.pending_source_map
            .entry(subroutine)
            .or_default()
            .push(SourceMapRecord {
                bytecode_pos: local_pos,
                source_pos,
                source_end,
            });
    }

    /// Assemble the final wire-format buffer and produce a [`Module`].
    ///
    /// Layout (spec §4.2): `Jump + u32` header, storage pool, source map,
    /// subroutine table, `Main`, concatenated bodies. Body addresses in
    /// the table and in every `Call`/`TailCall`/`Set`/`TypeArgumentDefault`
    /// operand are patched to their final absolute offsets via `patches`:
    /// a list of `(subroutine, local_offset, target_subroutine)` triples
    /// the compiler records while emitting those opcodes (local offsets
    /// stay valid for everything else, since concatenating bodies only
    /// ever shifts every address inside a body by the same constant, and
    /// relative jumps are unaffected by any constant shift).
    #[must_use]
    pub fn finish(mut self, patches: &[(u32, usize, u32)]) -> Module {
        let storage_len = self.storage.len();

        // Header: Jump + u32 (patched once body_addrs are known).
        let jump_patch_pos = 1;
        let mut code = vec![Op::Jump as u8, 0, 0, 0, 0];

        code.extend_from_slice(&self.storage);

        // Source map: flatten per-subroutine records in subroutine order,
        // rebasing local offsets once body_addrs are known below. We need
        // two passes since the source map precedes the subroutine table
        // but depends on body addresses, which depend on the table's own
        // size -- so compute body addresses first using placeholder sizes.
        let subroutine_table_len = self.subroutines.len() * 9; // Subroutine tag + u32 + u32 + u8
        let header_before_bodies_len_without_source_map =
            5 + storage_len + 1 /* SourceMap tag */ + 4 /* size */;

        let mut source_records: Vec<(u32, SourceMapRecord)> = Vec::new();
        for (idx, sub) in self.subroutines.iter().enumerate() {
            if let Some(records) = self.pending_source_map.get(&(idx as u32)) {
                for r in records {
                    source_records.push((idx as u32, *r));
                }
            }
            let _ = sub;
        }
        let source_map_body_len = source_records.len() * 12;

        let body_table_addr =
            header_before_bodies_len_without_source_map + source_map_body_len + subroutine_table_len;
        let main_tag_addr = body_table_addr;
        let first_body_addr = main_tag_addr + 1;

        let mut body_addrs = Vec::with_capacity(self.subroutines.len());
        let mut cursor = first_body_addr;
        for sub in &self.subroutines {
            body_addrs.push(cursor as u32);
            cursor += sub.body.len();
        }

        // Source map section, now that body_addrs are known.
        code.push(Op::SourceMap as u8);
        code.extend_from_slice(&(source_map_body_len as u32).to_le_bytes());
        for (sub_idx, record) in &source_records {
            let absolute = body_addrs[*sub_idx as usize] + record.bytecode_pos;
            code.extend_from_slice(&absolute.to_le_bytes());
            code.extend_from_slice(&record.source_pos.to_le_bytes());
            code.extend_from_slice(&record.source_end.to_le_bytes());
        }

        // Subroutine table.
        for (sub, &addr) in self.subroutines.iter().zip(&body_addrs) {
            code.push(Op::Subroutine as u8);
            code.extend_from_slice(&sub.name_addr.to_le_bytes());
            code.extend_from_slice(&addr.to_le_bytes());
            code.push(sub.flags.bits());
        }

        code.push(Op::Main as u8);
        debug_assert_eq!(code.len(), first_body_addr);

        for sub in &self.subroutines {
            code.extend_from_slice(&sub.body);
        }

        // Patch absolute addresses referencing subroutine bodies.
        for &(subroutine, local_offset, target) in patches {
            let base = body_addrs[subroutine as usize] as usize;
            let target_addr = body_addrs[target as usize];
            let at = base + local_offset;
            code[at..at + 4].copy_from_slice(&target_addr.to_le_bytes());
        }

        let main_addr = first_body_addr as u32;
        code[jump_patch_pos..jump_patch_pos + 4].copy_from_slice(&main_addr.to_le_bytes());

        let subroutines = self
            .subroutines
            .drain(..)
            .zip(body_addrs)
            .map(|(sub, body_addr)| Subroutine {
                name_addr: sub.name_addr,
                body_addr,
                flags: sub.flags,
                result: None,
                narrowed: None,
            })
            .collect();

        let source_map = source_records
            .into_iter()
            .map(|(sub_idx, mut r)| {
                r.bytecode_pos += body_addrs_lookup(&subroutines, sub_idx);
                r
            })
            .collect::<Vec<_>>();

        Module {
            code,
            main_addr,
            subroutines,
            source_map,
            diagnostics: Vec::new(),
        }
    }
}

fn body_addrs_lookup(subroutines: &[Subroutine], idx: u32) -> u32 {
    subroutines[idx as usize].body_addr
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates_identical_text() {
        let mut b = ModuleBuilder::new();
        let a1 = b.intern("abc");
        let a2 = b.intern("abc");
        assert_eq!(a1, a2);
        let a3 = b.intern("xyz");
        assert_ne!(a1, a3);
    }

    #[test]
    fn finish_produces_a_jump_header_pointing_at_main() {
        let mut b = ModuleBuilder::new();
        let name = b.intern("v1");
        let sub = b.new_subroutine(name);
        b.body_mut(sub).push(Op::String as u8);
        b.body_mut(sub).push(Op::Return as u8);
        let module = b.finish(&[]);

        assert_eq!(module.code()[0], Op::Jump as u8);
        let main_addr = module.main_addr();
        assert_eq!(module.code()[main_addr as usize], Op::String as u8);
    }
}
