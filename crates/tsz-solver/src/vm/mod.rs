//! The stack-based bytecode executor.
//!
//! [`Vm`] owns the type arena and the four runtime stacks (operand, frame,
//! active-subroutine, loop) and drives a fetch-decode-execute loop over a
//! [`Module`]'s bytecode. A `Call` recurses natively into a fresh
//! activation of [`Vm::run_subroutine_at`] rather than flattening control
//! flow through an explicit jump table -- each nested call is a real Rust
//! stack frame, bounded by `MAX_CALL_DEPTH` so a pathological recursive
//! alias fails with a [`VmError`] instead of overflowing the native stack.
//! `TailCall` reuses the current activation in place instead of recursing.

pub mod frame;

use tsz_common::diagnostics::{diagnostic_codes, format_message, get_message_template};
use tsz_common::limits::{MAX_CALL_DEPTH, MAX_DISTRIBUTION_SIZE, TEMPLATE_LITERAL_EXPANSION_LIMIT};

use crate::diagnostic::Diagnostic;
use crate::display::type_text;
use crate::error::{VmError, VmResult};
use crate::extends::{chain_members, extends};
use crate::isa::Op;
use crate::module::Module;
use crate::pool::TypeArena;
use crate::types::{Kind, Type, TypeFlags, TypeId, TypeRef, TypeRefId};

use frame::{ActiveSubroutine, Frame, LoopHelper};

/// What a call resolved to: either it short-circuited to an already-owned
/// value, or a fresh activation needs to run.
enum CallOutcome {
    Cached(TypeId),
    Enter { sub_id: u32, body_addr: u32 },
}

/// Owns the type graph and the VM's runtime stacks for one program run.
pub struct Vm {
    pub arena: TypeArena,
    operand: Vec<TypeId>,
    frames: Vec<Frame>,
    active: Vec<ActiveSubroutine>,
    loops: Vec<LoopHelper>,
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        Vm {
            arena: TypeArena::new(),
            operand: Vec::new(),
            frames: Vec::new(),
            active: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Run `module`'s `<main>` subroutine to completion, then release
    /// anything left on the operand stack. Diagnostics accumulate on the
    /// module itself; a `VmError` means a bytecode or invariant violation,
    /// not a user-facing type error.
    pub fn run(&mut self, module: &mut Module) -> VmResult<()> {
        self.prepare();
        let main_addr = module.main_addr();
        let result = self.run_subroutine_at(module, main_addr, 0);
        // Whatever <main> itself didn't consume is released at program end;
        // the operand stack is never a counted owner (spec-equivalent to
        // "stack GC").
        let leftover = std::mem::take(&mut self.operand);
        self.arena.stack_gc(&leftover);
        result.map(|_| ())
    }

    /// Release every subroutine's cached `result`/`narrowed` before
    /// delegating to `module.clear()`, matching spec §9's
    /// `{create -> prepare -> process -> clear}` lifecycle -- `Module::clear`
    /// alone would drop those `TypeId`s without ever telling the arena
    /// they're gone, leaking their final retain.
    pub fn clear(&mut self, module: &mut Module) {
        for i in 0..module.subroutine_count() as u32 {
            let sub = module.subroutine_mut(i);
            if let Some(id) = sub.result.take() {
                self.arena.release_type(id);
            }
            if let Some(id) = sub.narrowed.take() {
                self.arena.release_type(id);
            }
        }
        self.arena.flush();
        module.clear();
    }

    fn prepare(&mut self) {
        self.operand.clear();
        self.frames.clear();
        self.active.clear();
        self.loops.clear();
    }

    // --- stack primitives ------------------------------------------------

    fn pop_operand(&mut self, ip: u32) -> VmResult<TypeId> {
        let id = self.operand.pop().ok_or(VmError::StackUnderflow(ip))?;
        self.arena.retain_type(id);
        Ok(id)
    }

    fn push_operand(&mut self, id: TypeId) {
        self.operand.push(id);
    }

    fn current_frame(&self, ip: u32) -> VmResult<&Frame> {
        self.frames.last().ok_or(VmError::FrameUnderflow(ip))
    }

    fn current_active(&self, ip: u32) -> VmResult<&ActiveSubroutine> {
        self.active.last().ok_or(VmError::ActiveSubroutineUnderflow(ip))
    }

    /// Pop and release `n` values -- used by `Instantiate`/`CallExpression`.
    /// Neither opcode performs real generic-instantiation or call-argument
    /// substitution here: that is a scope cut of this implementation's own
    /// (not one spec §9 lists), documented in DESIGN.md. The callee operand
    /// the compiler already pushed for the call (always resolved with zero
    /// type arguments; see `compile_expression_as_type`'s `Identifier` arm)
    /// is left on the stack as the call's result, and this just discards the
    /// type-argument/call-argument operands above it.
    fn discard_top_n(&mut self, n: usize, ip: u32) -> VmResult<()> {
        for _ in 0..n {
            let id = self.pop_operand(ip)?;
            self.arena.release_type(id);
        }
        Ok(())
    }

    // --- byte reading ------------------------------------------------------

    fn read_u16(code: &[u8], at: u32) -> u16 {
        let at = at as usize;
        u16::from_le_bytes(code[at..at + 2].try_into().unwrap())
    }

    fn read_u32(code: &[u8], at: u32) -> u32 {
        let at = at as usize;
        u32::from_le_bytes(code[at..at + 4].try_into().unwrap())
    }

    fn read_i32(code: &[u8], at: u32) -> i32 {
        let at = at as usize;
        i32::from_le_bytes(code[at..at + 4].try_into().unwrap())
    }

    // --- calls -------------------------------------------------------------

    fn resolve_call(&mut self, module: &Module, addr: u32, argc: u16, ip: u32) -> VmResult<CallOutcome> {
        let sub_id = module.subroutine_id_at(addr).ok_or(VmError::UnresolvedSubroutine(addr))?;
        let sub = module.subroutine(sub_id);
        if let Some(narrowed) = sub.narrowed {
            self.discard_top_n(argc as usize, ip)?;
            return Ok(CallOutcome::Cached(narrowed));
        }
        if argc == 0 {
            if let Some(cached) = sub.result {
                return Ok(CallOutcome::Cached(cached));
            }
        }
        Ok(CallOutcome::Enter { sub_id, body_addr: addr })
    }

    /// Enter a fresh activation of `body_addr`, `argc` arguments already
    /// sitting on top of `self.operand`.
    fn enter(&mut self, sub_id: u32, body_addr: u32, argc: u16) -> VmResult<()> {
        if self.active.len() as u32 >= MAX_CALL_DEPTH {
            return Err(VmError::CallDepthExceeded(body_addr));
        }
        let sp = self.operand.len();
        let initial_sp = sp - argc as usize;
        // Arguments the caller pushed transiently become owned by this
        // activation's slot region.
        for &id in &self.operand[initial_sp..sp] {
            self.arena.retain_type(id);
        }
        self.frames.push(Frame::new(initial_sp));
        let depth = self.active.last().map_or(0, |a| a.depth + 1);
        self.active.push(ActiveSubroutine {
            ip: body_addr,
            subroutine: sub_id,
            depth,
            type_arguments_supplied: argc,
        });
        Ok(())
    }

    /// Enter a fresh activation of `body_addr` and run it to its own
    /// `Return`, yielding its single result.
    fn run_subroutine_at(&mut self, module: &mut Module, body_addr: u32, argc: u16) -> VmResult<TypeId> {
        let sub_id = module.subroutine_id_at(body_addr).ok_or(VmError::UnresolvedSubroutine(body_addr))?;
        self.enter(sub_id, body_addr, argc)?;
        self.step_loop(module)
    }

    /// Drive the fetch-decode loop until the activation pushed by the most
    /// recent [`Vm::enter`] returns.
    fn step_loop(&mut self, module: &mut Module) -> VmResult<TypeId> {
        loop {
            let ip = self.current_active(0)?.ip;
            let byte = *module.code().get(ip as usize).ok_or(VmError::StorageOutOfBounds(ip))?;
            let op = Op::from_byte(byte).ok_or(VmError::UnknownOpcode(byte, ip))?;
            let operand_start = ip + 1;

            if let Op::Return = op {
                return self.do_return(module);
            }

            match op {
                Op::Halt | Op::Noop => self.jump_to(ip + op.len() as u32)?,

                Op::Any => self.push_atomic(Kind::Any, ip, op)?,
                Op::Unknown => self.push_atomic(Kind::Unknown, ip, op)?,
                Op::Never => self.push_atomic(Kind::Never, ip, op)?,
                Op::Null => self.push_atomic(Kind::Null, ip, op)?,
                Op::Undefined => self.push_atomic(Kind::Undefined, ip, op)?,
                Op::String => self.push_atomic(Kind::String, ip, op)?,
                Op::Number => self.push_atomic(Kind::Number, ip, op)?,
                Op::Boolean => self.push_atomic(Kind::Boolean, ip, op)?,
                Op::BigInt => self.push_atomic(Kind::BigInt, ip, op)?,
                Op::Symbol => self.push_atomic(Kind::Symbol, ip, op)?,
                Op::True => self.push_bool_literal(true, ip, op)?,
                Op::False => self.push_bool_literal(false, ip, op)?,

                Op::StringLiteral => self.push_storage_literal(module, ip, op, TypeFlags::STRING_LITERAL)?,
                Op::NumberLiteral => self.push_storage_literal(module, ip, op, TypeFlags::NUMBER_LITERAL)?,
                Op::BigIntLiteral => self.push_storage_literal(module, ip, op, TypeFlags::BIGINT_LITERAL)?,

                Op::Frame => {
                    self.frames.push(Frame::new(self.operand.len()));
                    self.jump_to(ip + op.len() as u32)?;
                }

                Op::TailCall => self.do_tail_call(module, ip, operand_start)?,
                Op::Call => self.do_call(module, ip, operand_start, op)?,

                Op::Jump => {
                    let rel = Self::read_i32(module.code(), operand_start);
                    let target = (operand_start as i64 + 4 + rel as i64) as u32;
                    self.jump_to(target)?;
                }

                Op::JumpCondition => self.do_jump_condition(module, ip, operand_start)?,

                Op::Extends => self.do_extends(ip, op)?,
                Op::Distribute => self.do_distribute(module, ip, operand_start, op)?,

                Op::Union => self.build_chain_compound(module, Kind::Union, ip, operand_start, op)?,
                Op::ObjectLiteral => self.build_chain_compound(module, Kind::ObjectLiteral, ip, operand_start, op)?,
                Op::Tuple => self.build_chain_compound(module, Kind::Tuple, ip, operand_start, op)?,
                Op::TemplateLiteral => self.do_template_literal(module, ip, operand_start, op)?,

                Op::TupleMember => self.wrap_single(Kind::TupleMember, TypeFlags::empty(), ip, op)?,
                Op::Array => self.wrap_single(Kind::Array, TypeFlags::empty(), ip, op)?,
                Op::Rest => self.wrap_single(Kind::Rest, TypeFlags::empty(), ip, op)?,
                Op::RestReuse => self.wrap_single(Kind::Rest, TypeFlags::REST_REUSE, ip, op)?,
                Op::Parameter => self.wrap_single(Kind::Parameter, TypeFlags::empty(), ip, op)?,

                Op::PropertySignature => self.do_property_signature(ip, op)?,

                Op::Optional => self.set_flag_in_place(TypeFlags::OPTIONAL, ip, op)?,
                Op::Readonly => self.set_flag_in_place(TypeFlags::READONLY, ip, op)?,
                Op::Initializer => self.jump_to(ip + op.len() as u32)?,

                Op::Length => self.do_length(ip, op)?,
                Op::IndexAccess => self.do_index_access(module, ip, op)?,

                Op::TypeArgument => self.do_type_argument(ip, op)?,
                Op::TypeArgumentDefault => self.do_type_argument_default(module, ip, operand_start, op)?,

                Op::Loads => self.do_loads(module, ip, operand_start, op)?,

                Op::Instantiate | Op::CallExpression => self.do_discard_n(module, ip, operand_start, op)?,

                Op::Assign => self.do_assign(module, ip, op)?,
                Op::Set => self.do_set(module, ip, operand_start, op)?,

                Op::Slots => self.do_slots(module, ip, operand_start, op)?,
                Op::Widen => self.do_widen(ip, op)?,
                Op::Error => self.do_error(module, ip, operand_start, op)?,

                Op::Return => unreachable!("handled above"),
                Op::SourceMap | Op::Subroutine | Op::Main => {
                    return Err(VmError::UnknownOpcode(byte, ip));
                }
            }
        }
    }

    fn jump_to(&mut self, target: u32) -> VmResult<()> {
        self.active.last_mut().ok_or(VmError::ActiveSubroutineUnderflow(target))?.ip = target;
        Ok(())
    }

    // --- atomic / literal constructors -------------------------------------

    fn push_atomic(&mut self, kind: Kind, ip: u32, op: Op) -> VmResult<()> {
        let id = self.arena.alloc_type(Type::atomic(kind, TypeFlags::empty(), 0, ip));
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    fn push_bool_literal(&mut self, value: bool, ip: u32, op: Op) -> VmResult<()> {
        let flag = if value { TypeFlags::TRUE } else { TypeFlags::FALSE };
        let hash = u64::from(value);
        let id = self.arena.alloc_type(Type::atomic(Kind::Literal, flag, hash, ip));
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    fn push_storage_literal(&mut self, module: &Module, ip: u32, op: Op, flavor: TypeFlags) -> VmResult<()> {
        let addr = Self::read_u32(module.code(), ip + 1);
        let (hash, text) = module.storage_at(addr);
        let mut ty = Type::atomic(Kind::Literal, flavor, hash, ip);
        ty.text = Some(text.into());
        let id = self.arena.alloc_type(ty);
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    fn alloc_string_literal(&mut self, text: &str, ip: u32) -> TypeId {
        let hash = xxhash_rust::xxh64::xxh64(text.as_bytes(), 0);
        let mut ty = Type::atomic(Kind::Literal, TypeFlags::STRING_LITERAL, hash, ip);
        ty.text = Some(text.into());
        self.arena.alloc_type(ty)
    }

    fn alloc_number_literal(&mut self, n: usize, ip: u32) -> TypeId {
        let text = n.to_string();
        self.alloc_number_literal_text(&text, ip)
    }

    fn alloc_number_literal_text(&mut self, text: &str, ip: u32) -> TypeId {
        let hash = xxhash_rust::xxh64::xxh64(text.as_bytes(), 0);
        let mut ty = Type::atomic(Kind::Literal, TypeFlags::NUMBER_LITERAL, hash, ip);
        ty.text = Some(text.into());
        self.arena.alloc_type(ty)
    }

    // --- calls ---------------------------------------------------------

    fn do_call(&mut self, module: &mut Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let addr = Self::read_u32(module.code(), operand_start);
        let argc = Self::read_u16(module.code(), operand_start + 4);
        self.jump_to(ip + op.len() as u32)?;
        match self.resolve_call(module, addr, argc, ip)? {
            CallOutcome::Cached(id) => self.push_operand(id),
            CallOutcome::Enter { body_addr, .. } => {
                let result = self.run_subroutine_at(module, body_addr, argc)?;
                self.push_operand(result);
            }
        }
        Ok(())
    }

    fn do_tail_call(&mut self, module: &Module, ip: u32, operand_start: u32) -> VmResult<()> {
        let addr = Self::read_u32(module.code(), operand_start);
        let argc = Self::read_u16(module.code(), operand_start + 4);
        match self.resolve_call(module, addr, argc, ip)? {
            CallOutcome::Cached(id) => {
                self.push_operand(id);
                self.jump_to(ip + Op::TailCall.len() as u32)
            }
            CallOutcome::Enter { sub_id, body_addr } => {
                let sp = self.operand.len();
                let args_start = sp - argc as usize;
                let frame = *self.current_frame(ip)?;
                // Drop this activation's own leftover slots; the trailing
                // `argc` values become the reused frame's fresh arguments.
                for i in frame.initial_sp..args_start {
                    let id = self.operand[i];
                    self.arena.release_type(id);
                }
                for &id in &self.operand[args_start..sp] {
                    self.arena.retain_type(id);
                }
                self.operand.copy_within(args_start..sp, frame.initial_sp);
                self.operand.truncate(frame.initial_sp + argc as usize);

                let f = self.frames.last_mut().ok_or(VmError::FrameUnderflow(ip))?;
                f.slot_count = 0;
                f.loop_cursor = None;

                let active = self.active.last_mut().ok_or(VmError::ActiveSubroutineUnderflow(ip))?;
                active.ip = body_addr;
                active.subroutine = sub_id;
                active.type_arguments_supplied = argc;
                Ok(())
            }
        }
    }

    fn do_return(&mut self, module: &mut Module) -> VmResult<TypeId> {
        let ip = self.current_active(0)?.ip;
        let frame = self.frames.pop().ok_or(VmError::FrameUnderflow(ip))?;
        let active = self.active.pop().ok_or(VmError::ActiveSubroutineUnderflow(ip))?;
        let sp = self.operand.len();
        let produced = sp - frame.initial_sp;

        let result = if produced == 0 {
            None
        } else {
            let survivor = self.operand[sp - 1];
            for &discarded in &self.operand[frame.initial_sp..sp - 1] {
                self.arena.release_type(discarded);
            }
            self.operand.truncate(frame.initial_sp);
            Some(survivor)
        };

        if let Some(survivor) = result {
            if active.type_arguments_supplied == 0 {
                self.arena.retain_type(survivor);
                self.arena.type_mut(survivor).flags.insert(TypeFlags::STORED);
                let sub = module.subroutine_mut(active.subroutine);
                if let Some(old) = sub.result.take() {
                    self.arena.release_type(old);
                }
                sub.result = Some(survivor);
            }
            Ok(survivor)
        } else {
            Ok(TypeId(u32::MAX))
        }
    }

    // --- control flow --------------------------------------------------

    fn do_jump_condition(&mut self, module: &Module, ip: u32, operand_start: u32) -> VmResult<()> {
        let false_rel = Self::read_i32(module.code(), operand_start);
        let true_rel = Self::read_i32(module.code(), operand_start + 4);
        let after_operands = operand_start + 8;

        let cond = self.pop_operand(ip)?;
        let is_true = self.arena.type_ref(cond).flags.contains(TypeFlags::TRUE);
        self.arena.release_type(cond);

        let rel = if is_true { true_rel } else { false_rel };
        let target = (after_operands as i64 + rel as i64) as u32;
        self.jump_to(target)
    }

    fn do_extends(&mut self, ip: u32, op: Op) -> VmResult<()> {
        let right = self.pop_operand(ip)?;
        let left = self.pop_operand(ip)?;
        let result = extends(&self.arena, left, right)?;
        self.arena.release_type(left);
        self.arena.release_type(right);

        let flag = if result { TypeFlags::TRUE } else { TypeFlags::FALSE };
        let id = self.arena.alloc_type(Type::atomic(Kind::Literal, flag, u64::from(result), ip));
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    /// `Distribute`'s frame shares `initial_sp` with the *enclosing*
    /// subroutine's own call frame rather than starting a fresh region: the
    /// compiler's distributive-conditional lowering reserves the loop's one
    /// slot via `Slots` directly in that enclosing frame (so its index is
    /// just "how many symbols this subroutine had declared so far"), and
    /// every `Loads(0, idx)` inside the loop body addresses that same frame.
    fn do_distribute(&mut self, module: &Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let slot_idx = Self::read_u16(module.code(), operand_start);
        let end_rel = Self::read_u32(module.code(), operand_start + 2);
        let end_ip = operand_start + 6 + end_rel;
        let body_start = ip + op.len() as u32;

        let starting_new = self.current_frame(ip)?.loop_cursor.is_none();

        if starting_new {
            let checked = self.pop_operand(ip)?;
            let kind = self.arena.type_ref(checked).kind;
            let mut members = if kind == Kind::Union {
                let raw = chain_members(&self.arena, self.arena.type_ref(checked));
                for &m in &raw {
                    self.arena.retain_type(m);
                }
                self.arena.release_type(checked);
                raw
            } else {
                vec![checked]
            };
            members.truncate(MAX_DISTRIBUTION_SIZE);
            members.reverse(); // so `Vec::pop` below yields forward order

            let outer_initial_sp = self.current_frame(ip)?.initial_sp;
            self.frames.push(Frame::new(outer_initial_sp));
            let loop_idx = self.loops.len() as u32;
            self.loops.push(LoopHelper {
                remaining: members,
                results: Vec::new(),
                slot_idx,
                end_ip,
            });
            self.frames.last_mut().ok_or(VmError::FrameUnderflow(ip))?.loop_cursor = Some(loop_idx);
        } else {
            let loop_idx = self.current_frame(ip)?.loop_cursor.ok_or(VmError::LoopUnderflow(ip))?;
            let frame_initial_sp = self.current_frame(ip)?.initial_sp;
            let slot = self.loops[loop_idx as usize].slot_idx;
            let prior = self.operand[frame_initial_sp + slot as usize];
            self.arena.release_type(prior);
            let body_result = self.operand.pop().ok_or(VmError::StackUnderflow(ip))?;
            self.loops[loop_idx as usize].results.push(body_result);
        }

        let loop_idx = self.current_frame(ip)?.loop_cursor.ok_or(VmError::LoopUnderflow(ip))?;
        let frame_initial_sp = self.current_frame(ip)?.initial_sp;
        let next_member = self.loops[loop_idx as usize].remaining.pop();

        match next_member {
            Some(member) => {
                self.arena.retain_type(member);
                let slot = self.loops[loop_idx as usize].slot_idx;
                self.operand[frame_initial_sp + slot as usize] = member;
                self.jump_to(body_start)
            }
            None => {
                let helper = self.loops.pop().ok_or(VmError::LoopUnderflow(ip))?;
                self.frames.pop().ok_or(VmError::FrameUnderflow(ip))?;

                let slot_value = self.operand[frame_initial_sp + helper.slot_idx as usize];
                self.arena.release_type(slot_value);
                self.operand.truncate(frame_initial_sp + helper.slot_idx as usize);

                let collapsed = match helper.results.len() {
                    0 => self.arena.alloc_type(Type::atomic(Kind::Never, TypeFlags::empty(), 0, ip)),
                    1 => helper.results[0],
                    _ => {
                        let mut head: Option<TypeRefId> = None;
                        for &member in helper.results.iter().rev() {
                            self.arena.retain_type(member);
                            head = Some(self.arena.alloc_ref(TypeRef::new(member, head)));
                        }
                        self.arena.alloc_type(Type::with_chain(Kind::Union, TypeFlags::empty(), 0, ip, head))
                    }
                };
                self.push_operand(collapsed);
                self.jump_to(end_ip)
            }
        }
    }

    // --- compound constructors -------------------------------------------

    /// Shared by `Union`, `ObjectLiteral` and `Tuple`: all three consume the
    /// members accumulated since the matching `Frame` into a `TypeRef`
    /// chain. Members were pushed with plain `push_operand`, never popped,
    /// so each becomes a fresh owner of its target only once it's linked
    /// into the chain.
    fn build_chain_compound(&mut self, module: &Module, kind: Kind, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let n = Self::read_u16(module.code(), operand_start);
        let frame = self.frames.pop().ok_or(VmError::FrameUnderflow(ip))?;
        let members = self.operand.split_off(frame.initial_sp);
        debug_assert_eq!(members.len(), n as usize);

        let mut head: Option<TypeRefId> = None;
        for &member in members.iter().rev() {
            self.arena.retain_type(member);
            head = Some(self.arena.alloc_ref(TypeRef::new(member, head)));
        }
        let id = self.arena.alloc_type(Type::with_chain(kind, TypeFlags::empty(), 0, ip, head));
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    /// Realize a `TemplateLiteral`'s cartesian product when every segment is
    /// enumerable (a literal or a union of literals), bounded by
    /// `TEMPLATE_LITERAL_EXPANSION_LIMIT`; otherwise emit a `NotImplemented`
    /// diagnostic and fall back to a bare `TemplateLiteral` type (spec §9
    /// open question).
    fn do_template_literal(&mut self, module: &mut Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let n = Self::read_u16(module.code(), operand_start);
        let frame = self.frames.pop().ok_or(VmError::FrameUnderflow(ip))?;
        let members = self.operand.split_off(frame.initial_sp);
        debug_assert_eq!(members.len(), n as usize);

        let mut combos: Vec<String> = vec![String::new()];
        let mut realizable = true;
        for &member in &members {
            if !realizable {
                continue;
            }
            match self.segment_texts(member) {
                Some(texts) => {
                    let mut next = Vec::with_capacity(combos.len() * texts.len().max(1));
                    'outer: for prefix in &combos {
                        for t in &texts {
                            if next.len() >= TEMPLATE_LITERAL_EXPANSION_LIMIT {
                                break 'outer;
                            }
                            next.push(format!("{prefix}{t}"));
                        }
                    }
                    combos = next;
                }
                None => realizable = false,
            }
        }

        for &member in &members {
            self.arena.release_type(member);
        }

        let id = if realizable && !combos.is_empty() {
            if combos.len() == 1 {
                self.alloc_string_literal(&combos[0], ip)
            } else {
                let mut head: Option<TypeRefId> = None;
                for text in combos.into_iter().rev() {
                    let lit = self.alloc_string_literal(&text, ip);
                    self.arena.retain_type(lit);
                    head = Some(self.arena.alloc_ref(TypeRef::new(lit, head)));
                }
                self.arena.alloc_type(Type::with_chain(Kind::Union, TypeFlags::empty(), 0, ip, head))
            }
        } else {
            let template = get_message_template(diagnostic_codes::TEMPLATE_LITERAL_NOT_IMPLEMENTED).unwrap();
            let message = format_message(template, &[]);
            let (source_pos, source_end) = module.resolve_position(ip);
            module.push_diagnostic(Diagnostic::new(
                message,
                Some(diagnostic_codes::TEMPLATE_LITERAL_NOT_IMPLEMENTED as u16),
                ip,
                source_pos,
                source_end,
            ));
            self.arena.alloc_type(Type::atomic(Kind::TemplateLiteral, TypeFlags::empty(), 0, ip))
        };
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    /// The set of string renderings `id` can take, if it's enumerable
    /// (a literal, or a union whose every member is in turn enumerable).
    fn segment_texts(&self, id: TypeId) -> Option<Vec<String>> {
        let ty = self.arena.type_ref(id);
        match ty.kind {
            Kind::Literal => Some(vec![literal_segment_text(ty)]),
            Kind::Union => {
                let mut out = Vec::new();
                for member in chain_members(&self.arena, ty) {
                    out.extend(self.segment_texts(member)?);
                }
                Some(out)
            }
            _ => None,
        }
    }

    /// Shape the type on top of the stack into a single-child wrapper
    /// (`TupleMember`, `Array`, `Rest`/`RestReuse`, `Parameter`).
    fn wrap_single(&mut self, kind: Kind, flags: TypeFlags, ip: u32, op: Op) -> VmResult<()> {
        let child = self.pop_operand(ip)?;
        let id = self.arena.alloc_type(Type::with_single_child(kind, flags, 0, ip, child));
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    /// `ObjectLiteralType` members compile as `StringLiteral(key);
    /// compile_type(value); [Optional]; [Readonly]; PropertySignature` --
    /// `Optional`/`Readonly` mutate `value` in place *before* this opcode
    /// wraps it, so those two bits are copied onto the new wrapper here
    /// (`extends`'s `object_extends` reads them off the signature itself).
    fn do_property_signature(&mut self, ip: u32, op: Op) -> VmResult<()> {
        let value = self.pop_operand(ip)?;
        let key = self.pop_operand(ip)?;

        let flags = self.arena.type_ref(value).flags & (TypeFlags::OPTIONAL | TypeFlags::READONLY);
        let text = self.arena.type_ref(key).text.clone();
        self.arena.release_type(key);

        let mut ty = Type::with_single_child(Kind::PropertySignature, flags, 0, ip, value);
        ty.text = text;
        let id = self.arena.alloc_type(ty);
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    /// `Optional`/`Readonly` mutate whatever's currently on top of the
    /// stack in place; a `Stored` type (cached into a subroutine result or
    /// narrowed override) must never be mutated this way.
    fn set_flag_in_place(&mut self, flag: TypeFlags, ip: u32, op: Op) -> VmResult<()> {
        let &top = self.operand.last().ok_or(VmError::StackUnderflow(ip))?;
        let ty = self.arena.type_mut(top);
        if ty.flags.contains(TypeFlags::STORED) {
            return Err(VmError::StolenStoredType);
        }
        ty.flags.insert(flag);
        self.jump_to(ip + op.len() as u32)
    }

    fn do_length(&mut self, ip: u32, op: Op) -> VmResult<()> {
        let target = self.pop_operand(ip)?;
        let result = self.tuple_length_literal(target, ip);
        self.arena.release_type(target);
        let id = result.unwrap_or_else(|| self.arena.alloc_type(Type::atomic(Kind::Never, TypeFlags::empty(), 0, ip)));
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    /// Only `Tuple['length']` is implemented (spec §9 open question); every
    /// other combination is the caller's problem to fall back to `Never`.
    fn tuple_length_literal(&mut self, target: TypeId, ip: u32) -> Option<TypeId> {
        let ty = self.arena.type_ref(target);
        if ty.kind != Kind::Tuple {
            return None;
        }
        let count = chain_members(&self.arena, ty).len();
        Some(self.alloc_number_literal(count, ip))
    }

    fn do_index_access(&mut self, module: &mut Module, ip: u32, op: Op) -> VmResult<()> {
        let key = self.pop_operand(ip)?;
        let object = self.pop_operand(ip)?;

        let key_ty = self.arena.type_ref(key);
        let is_length_key =
            key_ty.kind == Kind::Literal && key_ty.flags.contains(TypeFlags::STRING_LITERAL) && key_ty.text.as_deref() == Some("length");

        let result = if is_length_key { self.tuple_length_literal(object, ip) } else { None };

        self.arena.release_type(key);
        self.arena.release_type(object);

        let id = match result {
            Some(id) => id,
            None => {
                let template = get_message_template(diagnostic_codes::INDEX_ACCESS_FALLS_BACK_TO_NEVER).unwrap();
                let message = format_message(template, &["", ""]);
                let (source_pos, source_end) = module.resolve_position(ip);
                module.push_diagnostic(Diagnostic::new(
                    message,
                    Some(diagnostic_codes::INDEX_ACCESS_FALLS_BACK_TO_NEVER as u16),
                    ip,
                    source_pos,
                    source_end,
                ));
                self.arena.alloc_type(Type::atomic(Kind::Never, TypeFlags::empty(), 0, ip))
            }
        };
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    // --- generics --------------------------------------------------------

    fn do_type_argument(&mut self, ip: u32, op: Op) -> VmResult<()> {
        let k = {
            let frame = self.frames.last_mut().ok_or(VmError::FrameUnderflow(ip))?;
            let k = frame.slot_count;
            frame.slot_count += 1;
            k
        };
        let supplied = self.current_active(ip)?.type_arguments_supplied;
        if k >= supplied {
            let id = self.arena.alloc_type(Type::atomic(Kind::Unknown, TypeFlags::UNPROVIDED_ARGUMENT, 0, ip));
            self.push_operand(id);
        }
        self.jump_to(ip + op.len() as u32)
    }

    fn do_type_argument_default(&mut self, module: &mut Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let addr = Self::read_u32(module.code(), operand_start);
        self.jump_to(ip + op.len() as u32)?;

        let &top = self.operand.last().ok_or(VmError::StackUnderflow(ip))?;
        if self.arena.type_ref(top).flags.contains(TypeFlags::UNPROVIDED_ARGUMENT) {
            let placeholder = self.pop_operand(ip)?;
            self.arena.release_type(placeholder);
            let result = self.run_subroutine_at(module, addr, 0)?;
            self.push_operand(result);
        }
        Ok(())
    }

    fn do_loads(&mut self, module: &Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let frame_up = Self::read_u16(module.code(), operand_start);
        let idx = Self::read_u16(module.code(), operand_start + 2);
        let frame_index = self
            .frames
            .len()
            .checked_sub(1 + frame_up as usize)
            .ok_or(VmError::FrameOffsetOutOfRange { levels: frame_up })?;
        let ancestor = self.frames[frame_index];
        let id = self.operand[ancestor.initial_sp + idx as usize];
        self.push_operand(id);
        self.jump_to(ip + op.len() as u32)
    }

    fn do_discard_n(&mut self, module: &Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let n = Self::read_u16(module.code(), operand_start);
        self.discard_top_n(n as usize, ip)?;
        self.jump_to(ip + op.len() as u32)
    }

    // --- assignment / slots / misc ----------------------------------------

    fn do_assign(&mut self, module: &mut Module, ip: u32, op: Op) -> VmResult<()> {
        let rvalue = self.pop_operand(ip)?;
        let lvalue = self.pop_operand(ip)?;

        if !extends(&self.arena, rvalue, lvalue)? {
            let template = get_message_template(diagnostic_codes::TYPE_NOT_ASSIGNABLE).unwrap();
            let message = format_message(template, &[&type_text(&self.arena, rvalue), &type_text(&self.arena, lvalue)]);
            let (source_pos, source_end) = module.resolve_position(ip);
            module.push_diagnostic(Diagnostic::new(
                message,
                Some(diagnostic_codes::TYPE_NOT_ASSIGNABLE as u16),
                ip,
                source_pos,
                source_end,
            ));
        }
        self.arena.release_type(rvalue);
        self.arena.release_type(lvalue);
        self.jump_to(ip + op.len() as u32)
    }

    fn do_set(&mut self, module: &mut Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let addr = Self::read_u32(module.code(), operand_start);
        let value = self.pop_operand(ip)?;
        let sub_id = module.subroutine_id_at(addr).ok_or(VmError::UnresolvedSubroutine(addr))?;

        self.arena.type_mut(value).flags.insert(TypeFlags::STORED);
        let sub = module.subroutine_mut(sub_id);
        if let Some(old) = sub.narrowed.take() {
            self.arena.release_type(old);
        }
        sub.narrowed = Some(value);
        self.jump_to(ip + op.len() as u32)
    }

    fn do_slots(&mut self, module: &Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let n = Self::read_u16(module.code(), operand_start);
        for _ in 0..n {
            // A non-allocated sentinel: this reservation is always
            // overwritten by `Distribute`'s first iteration before anything
            // could read it, and it must never be retained/released --
            // `TypeId(u32::MAX)` is not a real pool slot.
            self.operand.push(TypeId(u32::MAX));
        }
        let frame = self.frames.last_mut().ok_or(VmError::FrameUnderflow(ip))?;
        frame.slot_count += n;
        self.jump_to(ip + op.len() as u32)
    }

    fn do_widen(&mut self, ip: u32, op: Op) -> VmResult<()> {
        let id = self.pop_operand(ip)?;
        let ty = self.arena.type_ref(id);
        let widened = if ty.is_literal_string() {
            Some(Kind::String)
        } else if ty.is_literal_number() {
            Some(Kind::Number)
        } else if ty.is_literal_boolean() {
            Some(Kind::Boolean)
        } else if ty.is_literal_bigint() {
            Some(Kind::BigInt)
        } else {
            None
        };

        let result = match widened {
            Some(kind) => {
                self.arena.release_type(id);
                self.arena.alloc_type(Type::atomic(kind, TypeFlags::empty(), 0, ip))
            }
            None => {
                self.arena.release_type(id);
                id
            }
        };
        self.push_operand(result);
        self.jump_to(ip + op.len() as u32)
    }

    /// The compiler only ever embeds the diagnostic code, not the
    /// identifier text (the ISA's `Error` opcode carries just `u16 code`),
    /// so placeholders this VM can't fill are left empty.
    fn do_error(&mut self, module: &mut Module, ip: u32, operand_start: u32, op: Op) -> VmResult<()> {
        let code = Self::read_u16(module.code(), operand_start);
        let (source_pos, source_end) = module.resolve_position(ip);
        let message = match get_message_template(code as u32) {
            Some(template) => format_message(template, &["", "", ""]),
            None => format!("error {code}"),
        };
        module.push_diagnostic(Diagnostic::new(message, Some(code), ip, source_pos, source_end));
        self.jump_to(ip + op.len() as u32)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_segment_text(ty: &Type) -> String {
    if let Some(text) = &ty.text {
        return text.to_string();
    }
    if ty.flags.contains(TypeFlags::TRUE) {
        return "true".to_string();
    }
    if ty.flags.contains(TypeFlags::FALSE) {
        return "false".to_string();
    }
    String::new()
}
