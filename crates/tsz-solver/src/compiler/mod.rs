//! AST-to-bytecode lowering (spec §4.3).
//!
//! [`compile_source_file`] is the sole public entry point (spec §6,
//! "Compiler entry"). Internally a [`Compiler`] walks the program's
//! statements, emitting each named type-producing declaration into its own
//! subroutine and threading a [`SectionTree`] alongside each subroutine's
//! body so the optimizer pass can rewrite terminal `Call`s and dead `Rest`s
//! once the whole subroutine is emitted.

pub mod optimizer;
pub mod section;
pub mod symbol;

use rustc_hash::FxHashMap;
use tsz_common::diagnostics::diagnostic_codes;

use crate::ast::{Expression, Program, Span, Statement, TemplateLiteralSpan, TypeNode};
use crate::error::{CompileError, CompileResult};
use crate::isa::Op;
use crate::module::{Module, ModuleBuilder};

use section::SectionTree;
use symbol::{SymbolKind, SymbolTables};

/// Diagnostic code for an identifier that resolves to no symbol at all. A
/// name that simply doesn't exist is a recoverable user error (spec §7,
/// taxonomy 1), unlike a resolved `Type`/`Function` symbol missing its
/// subroutine, which is a genuine compiler invariant violation.
const CANNOT_FIND_NAME: u16 = diagnostic_codes::CANNOT_FIND_NAME as u16;

/// Lower a parsed program into a [`Module`] ready for the VM.
pub fn compile_source_file(program: &Program) -> CompileResult<Module> {
    let mut compiler = Compiler::new();
    compiler.compile_program(program)?;
    compiler.finish()
}

struct Compiler {
    builder: ModuleBuilder,
    symbols: SymbolTables,
    sections: Vec<SectionTree>,
    /// Per-subroutine: symbol index -> last ip (local to that subroutine)
    /// that consumes it. Fed to the optimizer's rest-reuse pass.
    last_use: Vec<FxHashMap<u16, usize>>,
    /// `(subroutine, local operand offset, target subroutine)` -- patched
    /// to an absolute body address once every subroutine's size is known.
    patches: Vec<(u32, usize, u32)>,
    /// Identifiers currently bound to a `Distribute` loop's cursor slot
    /// rather than to their ordinary `TypeArgument` symbol, active only
    /// while compiling the body of a distributive conditional. The third
    /// element is the `frame_depth[sub]` value in effect at the point the
    /// binding was pushed, i.e. the depth of the frame the slot actually
    /// lives in.
    distribute_bindings: Vec<(String, u16, u32)>,
    /// Per-subroutine count of runtime `Frame`s currently open at the
    /// point being compiled: one per `Op::Frame` emitted for a compound
    /// constructor not yet consumed, plus one while compiling the body of
    /// a distributive conditional (the VM's `Distribute` pushes a `Frame`
    /// of its own). `Loads`'s `frameUp` operand must count these in
    /// addition to `SymbolTables::frame_distance`'s call-activation hops,
    /// since a reference to an enclosing `TypeArgument`/`Variable` from
    /// inside e.g. a `Union`'s still-open `Frame` has to walk past that
    /// `Frame` before reaching the subroutine's own call frame.
    frame_depth: Vec<u32>,
    /// Per-subroutine: the most recently emitted opcode, so a section can be
    /// closed with its true `last_op` instead of `None` -- the optimizer's
    /// terminal-`Call` rewrite only fires on a section whose `last_op` is
    /// recorded accurately.
    last_op: Vec<Option<Op>>,
}

impl Compiler {
    fn new() -> Self {
        Compiler {
            builder: ModuleBuilder::new(),
            symbols: SymbolTables::new(),
            sections: Vec::new(),
            last_use: Vec::new(),
            patches: Vec::new(),
            distribute_bindings: Vec::new(),
            frame_depth: Vec::new(),
            last_op: Vec::new(),
        }
    }

    fn new_subroutine(&mut self, name: &str, parent_scope: Option<u32>) -> u32 {
        let name_addr = self.builder.intern(name);
        let sub = self.builder.new_subroutine(name_addr);
        let scope = self.symbols.new_scope(parent_scope);
        debug_assert_eq!(sub, scope, "subroutine index must match its symbol scope index");
        self.sections.push(SectionTree::new());
        self.last_use.push(FxHashMap::default());
        self.frame_depth.push(0);
        self.last_op.push(None);
        sub
    }

    /// A `Frame` opcode was just emitted for `sub` (a compound constructor
    /// or a distribute loop) -- every `Loads` compiled before the matching
    /// [`Compiler::close_frame`] must count one extra level.
    fn open_frame(&mut self, sub: u32) {
        self.frame_depth[sub as usize] += 1;
    }

    fn close_frame(&mut self, sub: u32) {
        self.frame_depth[sub as usize] -= 1;
    }

    /// `frameUp` for a `Loads` targeting `owner`'s slot, compiled while
    /// emitting `sub`'s body: the call-activation hops to `owner` plus
    /// however many `Frame`s are currently open within `sub` itself.
    fn frame_up(&self, sub: u32, owner: u32) -> u16 {
        self.frame_depth[sub as usize] as u16 + self.symbols.frame_distance(sub, owner)
    }

    // --- byte emission -------------------------------------------------

    fn emit_op(&mut self, sub: u32, op: Op) -> usize {
        let pos = self.builder.body_len(sub);
        self.builder.body_mut(sub).push(op as u8);
        self.last_op[sub as usize] = Some(op);
        pos
    }

    fn emit_u16(&mut self, sub: u32, value: u16) {
        self.builder.body_mut(sub).extend_from_slice(&value.to_le_bytes());
    }

    fn emit_u32(&mut self, sub: u32, value: u32) {
        self.builder.body_mut(sub).extend_from_slice(&value.to_le_bytes());
    }

    fn emit_i32(&mut self, sub: u32, value: i32) {
        self.builder.body_mut(sub).extend_from_slice(&value.to_le_bytes());
    }

    /// Emit `Call`/`TailCall` (the optimizer decides which) to `target`
    /// with `argc` type arguments already pushed, registering a patch for
    /// the not-yet-known body address.
    fn emit_call(&mut self, sub: u32, target: u32, argc: u16) {
        self.emit_op(sub, Op::Call);
        let operand_pos = self.builder.body_len(sub);
        self.emit_u32(sub, 0);
        self.emit_u16(sub, argc);
        self.patches.push((sub, operand_pos, target));
    }

    fn record_source(&mut self, sub: u32, local_pos: u32, span: Span) {
        self.builder.record_source(sub, local_pos, span.pos, span.end);
    }

    /// An identifier that resolved to nothing: emit `Error <code>` plus a
    /// recovery `Unknown` so the surrounding constructor still gets exactly
    /// one value, and keep compiling instead of aborting the whole module.
    fn emit_unresolved_name(&mut self, sub: u32, code: u16, span: Span) {
        let pos = self.builder.body_len(sub) as u32;
        self.emit_op(sub, Op::Error);
        self.emit_u16(sub, code);
        self.record_source(sub, pos, span);
        self.emit_op(sub, Op::Unknown);
    }

    // --- program / statements -------------------------------------------

    fn compile_program(&mut self, program: &Program) -> CompileResult<()> {
        let main = self.new_subroutine("<main>", None);
        debug_assert_eq!(main, 0, "the first subroutine registered must be entry 0");
        let root_section = self.sections[main as usize].open_root(0);

        self.scan_statements(main, &program.statements)?;
        for statement in &program.statements {
            self.compile_statement(main, root_section, statement)?;
        }

        let end = self.builder.body_len(main);
        self.emit_op(main, Op::Return);
        self.sections[main as usize].close(root_section, end, self.last_op[main as usize]);
        self.builder.set_block_tail_call(main, true);
        Ok(())
    }

    /// Symbol scanning precedes body emission within a scope (spec §4.3),
    /// so forward references between top-level declarations resolve.
    fn scan_statements(&mut self, sub: u32, statements: &[Statement]) -> CompileResult<()> {
        for statement in statements {
            match statement {
                Statement::TypeAlias { name, span, .. } => {
                    self.symbols.get_mut(sub).declare(name, SymbolKind::Type, *span, None);
                }
                Statement::VariableStatement { name, span, .. } => {
                    self.symbols
                        .get_mut(sub)
                        .declare(name, SymbolKind::Variable, *span, None);
                }
                Statement::FunctionDeclaration { name, span, .. } => {
                    self.symbols
                        .get_mut(sub)
                        .declare(name, SymbolKind::Function, *span, None);
                }
            }
        }
        Ok(())
    }

    fn compile_statement(&mut self, sub: u32, section: u32, statement: &Statement) -> CompileResult<()> {
        match statement {
            Statement::TypeAlias {
                name,
                type_parameters,
                value,
                ..
            } => {
                let alias_sub = self.new_subroutine(name, Some(sub));
                self.symbols
                    .get_mut(sub)
                    .declare(name, SymbolKind::Type, statement.span(), Some(alias_sub));
                self.compile_type_producing_body(alias_sub, type_parameters, value)?;
                // No type parameters -> zero-arg calls are cacheable.
                self.builder.set_block_tail_call(alias_sub, type_parameters.is_empty());
                Ok(())
            }

            Statement::VariableStatement {
                name,
                declared_type,
                initializer,
                span,
            } => {
                let lvalue_sub = declared_type.as_ref().map(|t| {
                    let lv_sub = self.new_subroutine(&format!("{name}$type"), Some(sub));
                    let _ = self.compile_type_producing_body(lv_sub, &[], t);
                    self.builder.set_block_tail_call(lv_sub, true);
                    lv_sub
                });
                self.symbols
                    .get_mut(sub)
                    .declare(name, SymbolKind::Variable, *span, lvalue_sub);

                if let Some(lv_sub) = lvalue_sub {
                    let assign_pos = self.builder.body_len(sub) as u32;
                    self.emit_call(sub, lv_sub, 0);
                    self.compile_expression_as_type(sub, section, initializer)?;
                    self.record_source(sub, assign_pos, initializer.span());
                    self.emit_op(sub, Op::Assign);
                } else {
                    // No declared type: nothing to assign against. The
                    // initializer's type is pushed and left for stack-GC to
                    // reclaim at run end; this model has no slot storage for
                    // an untyped top-level binding (none of the scenarios
                    // this compiler is exercised against declare one).
                    self.compile_expression_as_type(sub, section, initializer)?;
                }
                Ok(())
            }

            Statement::FunctionDeclaration {
                name,
                type_parameters,
                return_type,
                ..
            } => {
                let fn_sub = self.new_subroutine(name, Some(sub));
                self.symbols
                    .get_mut(sub)
                    .declare(name, SymbolKind::Function, statement.span(), Some(fn_sub));
                if let Some(ret) = return_type {
                    self.compile_type_producing_body(fn_sub, type_parameters, ret)?;
                } else {
                    self.emit_op(fn_sub, Op::Unknown);
                    let end = self.builder.body_len(fn_sub);
                    let root = self.sections[fn_sub as usize].open_root(0);
                    self.sections[fn_sub as usize].close(root, end, self.last_op[fn_sub as usize]);
                    self.emit_op(fn_sub, Op::Return);
                }
                Ok(())
            }
        }
    }

    /// Emit the shared body shape of any named type-producing declaration:
    /// `TypeArgument`(+`TypeArgumentDefault`) per type parameter, the value
    /// expression, `Return`.
    fn compile_type_producing_body(
        &mut self,
        sub: u32,
        type_parameters: &[crate::ast::TypeParameter],
        value: &TypeNode,
    ) -> CompileResult<()> {
        let root = self.sections[sub as usize].open_root(0);

        for (slot, param) in type_parameters.iter().enumerate() {
            self.symbols.get_mut(sub).declare(
                &param.name,
                SymbolKind::TypeArgument,
                param.span,
                None,
            );
            self.emit_op(sub, Op::TypeArgument);
            if let Some(default) = &param.default {
                let default_sub = self.new_subroutine(&format!("{}$default", param.name), Some(sub));
                self.compile_type_producing_body(default_sub, &[], default)?;
                self.builder.set_block_tail_call(default_sub, true);
                self.emit_op(sub, Op::TypeArgumentDefault);
                let operand_pos = self.builder.body_len(sub);
                self.emit_u32(sub, 0);
                self.patches.push((sub, operand_pos, default_sub));
            }
            let _ = slot;
        }

        self.compile_type(sub, root, value)?;
        let end = self.builder.body_len(sub);
        self.emit_op(sub, Op::Return);
        self.sections[sub as usize].close(root, end, self.last_op[sub as usize]);
        Ok(())
    }

    // --- type nodes ------------------------------------------------------

    fn compile_type(&mut self, sub: u32, section: u32, node: &TypeNode) -> CompileResult<()> {
        match node {
            TypeNode::AnyKeyword { .. } => drop(self.emit_op(sub, Op::Any)),
            TypeNode::UnknownKeyword { .. } => drop(self.emit_op(sub, Op::Unknown)),
            TypeNode::NeverKeyword { .. } => drop(self.emit_op(sub, Op::Never)),
            TypeNode::NullKeyword { .. } => drop(self.emit_op(sub, Op::Null)),
            TypeNode::UndefinedKeyword { .. } => drop(self.emit_op(sub, Op::Undefined)),
            TypeNode::StringKeyword { .. } => drop(self.emit_op(sub, Op::String)),
            TypeNode::NumberKeyword { .. } => drop(self.emit_op(sub, Op::Number)),
            TypeNode::BooleanKeyword { .. } => drop(self.emit_op(sub, Op::Boolean)),
            TypeNode::BigIntKeyword { .. } => drop(self.emit_op(sub, Op::BigInt)),
            TypeNode::SymbolKeyword { .. } => drop(self.emit_op(sub, Op::Symbol)),
            TypeNode::TrueLiteral { .. } => drop(self.emit_op(sub, Op::True)),
            TypeNode::FalseLiteral { .. } => drop(self.emit_op(sub, Op::False)),

            TypeNode::StringLiteral { value, .. } => {
                self.emit_op(sub, Op::StringLiteral);
                let addr = self.builder.intern(value);
                self.emit_u32(sub, addr);
            }
            TypeNode::NumberLiteral { value, .. } => {
                self.emit_op(sub, Op::NumberLiteral);
                let addr = self.builder.intern(&format!("{value}"));
                self.emit_u32(sub, addr);
            }
            TypeNode::BigIntLiteral { value, .. } => {
                self.emit_op(sub, Op::BigIntLiteral);
                let addr = self.builder.intern(value);
                self.emit_u32(sub, addr);
            }

            TypeNode::TypeReference {
                name, type_arguments, ..
            } => self.compile_type_reference(sub, section, name, type_arguments, node.span())?,

            TypeNode::UnionType { members, .. } => {
                self.emit_op(sub, Op::Frame);
                self.open_frame(sub);
                for member in members {
                    self.compile_type(sub, section, member)?;
                }
                self.close_frame(sub);
                self.emit_op(sub, Op::Union);
                self.emit_u16(sub, members.len() as u16);
            }

            TypeNode::TupleType { elements, .. } => {
                self.emit_op(sub, Op::Frame);
                self.open_frame(sub);
                for element in elements {
                    self.compile_type(sub, section, &element.value)?;
                    if element.rest {
                        let ip = self.emit_op(sub, Op::Rest);
                        // A Rest consuming a bare TypeArgument reference is
                        // the only shape rest-reuse cares about; record it
                        // when the element directly names one.
                        if let TypeNode::TypeReference { name, .. } = &element.value {
                            if let Some((owner, sym)) = self.symbols.resolve(sub, name) {
                                if owner == sub && sym.kind == SymbolKind::TypeArgument {
                                    let idx = sym.stack_index;
                                    self.sections[sub as usize].record_usage(section, idx, ip);
                                    self.last_use[sub as usize].insert(idx, ip);
                                }
                            }
                        }
                    }
                    self.emit_op(sub, Op::TupleMember);
                    if element.optional {
                        self.emit_op(sub, Op::Optional);
                    }
                }
                self.close_frame(sub);
                self.emit_op(sub, Op::Tuple);
                self.emit_u16(sub, elements.len() as u16);
            }

            TypeNode::ArrayType { element, .. } => {
                self.compile_type(sub, section, element)?;
                self.emit_op(sub, Op::Array);
            }

            TypeNode::ObjectLiteralType { members, .. } => {
                self.emit_op(sub, Op::Frame);
                self.open_frame(sub);
                for member in members {
                    self.emit_op(sub, Op::StringLiteral);
                    let addr = self.builder.intern(&member.name);
                    self.emit_u32(sub, addr);
                    self.compile_type(sub, section, &member.value)?;
                    if member.optional {
                        self.emit_op(sub, Op::Optional);
                    }
                    if member.readonly {
                        self.emit_op(sub, Op::Readonly);
                    }
                    self.emit_op(sub, Op::PropertySignature);
                }
                self.close_frame(sub);
                self.emit_op(sub, Op::ObjectLiteral);
                self.emit_u16(sub, members.len() as u16);
            }

            TypeNode::TemplateLiteralType { spans, .. } => {
                self.emit_op(sub, Op::Frame);
                self.open_frame(sub);
                for span in spans {
                    match span {
                        TemplateLiteralSpan::Text(text) => {
                            self.emit_op(sub, Op::StringLiteral);
                            let addr = self.builder.intern(text);
                            self.emit_u32(sub, addr);
                        }
                        TemplateLiteralSpan::Type(ty) => self.compile_type(sub, section, ty)?,
                    }
                }
                self.close_frame(sub);
                self.emit_op(sub, Op::TemplateLiteral);
                self.emit_u16(sub, spans.len() as u16);
            }

            TypeNode::ConditionalType {
                check,
                extends,
                true_type,
                false_type,
                ..
            } => self.compile_conditional(sub, section, check, extends, true_type, false_type)?,

            TypeNode::IndexedAccessType { object, index, .. } => {
                self.compile_type(sub, section, object)?;
                self.compile_type(sub, section, index)?;
                self.emit_op(sub, Op::IndexAccess);
            }

            TypeNode::RestType { element, .. } => {
                self.compile_type(sub, section, element)?;
                self.emit_op(sub, Op::Rest);
            }
        }
        Ok(())
    }

    fn compile_type_reference(
        &mut self,
        sub: u32,
        section: u32,
        name: &str,
        type_arguments: &[TypeNode],
        span: Span,
    ) -> CompileResult<()> {
        if let Some(&(_, slot, bound_depth)) = self
            .distribute_bindings
            .iter()
            .rev()
            .find(|(bound_name, _, _)| bound_name == name)
        {
            let frame_up = (self.frame_depth[sub as usize] - bound_depth) as u16;
            self.emit_op(sub, Op::Loads);
            self.emit_u16(sub, frame_up);
            self.emit_u16(sub, slot);
            return Ok(());
        }

        let Some((owner, sym)) = self.symbols.resolve(sub, name) else {
            self.emit_unresolved_name(sub, CANNOT_FIND_NAME, span);
            return Ok(());
        };

        match sym.kind {
            SymbolKind::TypeArgument | SymbolKind::TypeVariable | SymbolKind::Variable => {
                let frame_up = self.frame_up(sub, owner);
                let idx = sym.stack_index;
                self.emit_op(sub, Op::Loads);
                self.emit_u16(sub, frame_up);
                self.emit_u16(sub, idx);
                // Only a same-subroutine use is meaningful to the rest-reuse
                // pass, which compares ips within one subroutine's own body;
                // a use from a nested scope (e.g. a type-parameter default)
                // never disqualifies reuse in the declaring subroutine since
                // that nested body runs in its own call, after the declaring
                // subroutine has already returned its Rest-bearing value.
                if owner == sub {
                    self.last_use[owner as usize].insert(idx, self.builder.body_len(sub));
                }
            }
            SymbolKind::Type | SymbolKind::Function | SymbolKind::Class | SymbolKind::Inline => {
                let Some(target) = sym.owning_subroutine else {
                    return Err(CompileError::SymbolWithoutRoutine(name.to_string()));
                };
                for argument in type_arguments {
                    self.compile_type(sub, section, argument)?;
                }
                self.emit_call(sub, target, type_arguments.len() as u16);
            }
        }
        let _ = span;
        Ok(())
    }

    /// A conditional whose check type is a bare reference to an enclosing
    /// type parameter distributes over union members (spec §4.3).
    fn compile_conditional(
        &mut self,
        sub: u32,
        section: u32,
        check: &TypeNode,
        extends: &TypeNode,
        true_type: &TypeNode,
        false_type: &TypeNode,
    ) -> CompileResult<()> {
        let distributive_name = match check {
            TypeNode::TypeReference { name, type_arguments, .. } if type_arguments.is_empty() => {
                match self.symbols.resolve(sub, name) {
                    Some((owner, sym)) if owner == sub && sym.kind == SymbolKind::TypeArgument => {
                        Some(name.clone())
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        if let Some(name) = distributive_name {
            self.compile_distributive_conditional(sub, section, &name, extends, true_type, false_type)
        } else {
            self.compile_plain_conditional(sub, section, check, extends, true_type, false_type)
        }
    }

    fn compile_plain_conditional(
        &mut self,
        sub: u32,
        section: u32,
        check: &TypeNode,
        extends: &TypeNode,
        true_type: &TypeNode,
        false_type: &TypeNode,
    ) -> CompileResult<()> {
        self.compile_type(sub, section, check)?;
        self.compile_type(sub, section, extends)?;
        self.emit_op(sub, Op::Extends);
        self.emit_op(sub, Op::JumpCondition);
        let operand_pos = self.builder.body_len(sub);
        self.emit_i32(sub, 0);
        self.emit_i32(sub, 0);
        let jump_condition_end = self.builder.body_len(sub);

        let true_section = self.sections[sub as usize].open_child(section, jump_condition_end);
        let true_start = self.builder.body_len(sub);
        self.compile_type(sub, section, true_type)?;
        self.emit_op(sub, Op::Jump);
        let jump_to_end_operand = self.builder.body_len(sub);
        self.emit_i32(sub, 0);
        let true_end = self.builder.body_len(sub);
        self.sections[sub as usize].close(true_section, true_end, self.last_op[sub as usize]);

        let false_section = self.sections[sub as usize].open_child(section, true_end);
        let false_start = self.builder.body_len(sub);
        self.compile_type(sub, section, false_type)?;
        let false_end = self.builder.body_len(sub);
        self.sections[sub as usize].close(false_section, false_end, self.last_op[sub as usize]);

        let end = false_end;

        let true_rel = (true_start as i64 - jump_condition_end as i64) as i32;
        let false_rel = (false_start as i64 - jump_condition_end as i64) as i32;
        let body = self.builder.body_mut(sub);
        body[operand_pos..operand_pos + 4].copy_from_slice(&false_rel.to_le_bytes());
        body[operand_pos + 4..operand_pos + 8].copy_from_slice(&true_rel.to_le_bytes());
        let jump_rel = (end as i64 - (jump_to_end_operand as i64 + 4)) as i32;
        self.builder.body_mut(sub)[jump_to_end_operand..jump_to_end_operand + 4]
            .copy_from_slice(&jump_rel.to_le_bytes());
        Ok(())
    }

    fn compile_distributive_conditional(
        &mut self,
        sub: u32,
        section: u32,
        bound_name: &str,
        extends: &TypeNode,
        true_type: &TypeNode,
        false_type: &TypeNode,
    ) -> CompileResult<()> {
        let owner = self
            .symbols
            .resolve(sub, bound_name)
            .map(|(owner, _)| owner)
            .expect("caller already confirmed this resolves locally");
        let frame_up = self.symbols.frame_distance(sub, owner);
        let source_idx = self.symbols.get(owner).lookup_local(bound_name).unwrap().stack_index;

        let slot_idx = self.symbols.get_mut(sub).declare(
            &format!("{bound_name}$loop"),
            SymbolKind::TypeVariable,
            Span { pos: 0, end: 0 },
            None,
        );
        self.emit_op(sub, Op::Slots);
        self.emit_u16(sub, 1);

        self.emit_op(sub, Op::Loads);
        self.emit_u16(sub, frame_up);
        self.emit_u16(sub, source_idx);

        let distribute_ip = self.emit_op(sub, Op::Distribute);
        let operand_pos = self.builder.body_len(sub);
        self.emit_u16(sub, slot_idx);
        self.emit_u32(sub, 0);
        let loop_start = self.builder.body_len(sub);

        let loop_section = self.sections[sub as usize].open_child(section, loop_start);
        self.sections[sub as usize].set_blocks_tail_call(loop_section, true);

        // The VM's `Distribute` pushes its own `Frame` around the loop body
        // (spec §4.6) before the first iteration runs, so every `Loads`
        // compiled here -- including the bound variable itself -- sees one
        // more open frame than code outside the loop.
        self.open_frame(sub);
        self.distribute_bindings
            .push((bound_name.to_string(), slot_idx, self.frame_depth[sub as usize]));
        let check_node = bound_check_node(bound_name);
        self.compile_plain_conditional(sub, loop_section, &check_node, extends, true_type, false_type)?;
        self.distribute_bindings.pop();
        self.close_frame(sub);

        // Jump back to the Distribute instruction itself so it re-runs and
        // advances the cursor; Distribute's own `endRel` skips past this
        // jump once the union is exhausted.
        self.emit_op(sub, Op::Jump);
        let jump_back_operand_pos = self.builder.body_len(sub);
        self.emit_i32(sub, 0);
        let loop_end = self.builder.body_len(sub);
        self.sections[sub as usize].close(loop_section, loop_end, self.last_op[sub as usize]);

        let jump_back_rel = (distribute_ip as i64 - (jump_back_operand_pos as i64 + 4)) as i32;
        self.builder.body_mut(sub)[jump_back_operand_pos..jump_back_operand_pos + 4]
            .copy_from_slice(&jump_back_rel.to_le_bytes());

        let end_rel = (loop_end - operand_pos - 6) as u32;
        self.builder.body_mut(sub)[operand_pos + 2..operand_pos + 6]
            .copy_from_slice(&end_rel.to_le_bytes());
        Ok(())
    }

    // --- expressions (value position, typed as literal types) ----------

    fn compile_expression_as_type(&mut self, sub: u32, section: u32, expr: &Expression) -> CompileResult<()> {
        match expr {
            Expression::StringLiteral { value, .. } => {
                self.emit_op(sub, Op::StringLiteral);
                let addr = self.builder.intern(value);
                self.emit_u32(sub, addr);
            }
            Expression::NumberLiteral { value, .. } => {
                self.emit_op(sub, Op::NumberLiteral);
                let addr = self.builder.intern(&format!("{value}"));
                self.emit_u32(sub, addr);
            }
            Expression::BigIntLiteral { value, .. } => {
                self.emit_op(sub, Op::BigIntLiteral);
                let addr = self.builder.intern(value);
                self.emit_u32(sub, addr);
            }
            Expression::TrueLiteral { .. } => drop(self.emit_op(sub, Op::True)),
            Expression::FalseLiteral { .. } => drop(self.emit_op(sub, Op::False)),
            Expression::NullLiteral { .. } => drop(self.emit_op(sub, Op::Null)),

            Expression::Identifier { name, span } => {
                let Some((owner, sym)) = self.symbols.resolve(sub, name) else {
                    self.emit_unresolved_name(sub, CANNOT_FIND_NAME, *span);
                    return Ok(());
                };
                match sym.owning_subroutine {
                    Some(target) => self.emit_call(sub, target, 0),
                    None => {
                        let frame_up = self.frame_up(sub, owner);
                        let idx = sym.stack_index;
                        self.emit_op(sub, Op::Loads);
                        self.emit_u16(sub, frame_up);
                        self.emit_u16(sub, idx);
                    }
                }
            }

            Expression::ArrayLiteral { elements, .. } => {
                self.emit_op(sub, Op::Frame);
                self.open_frame(sub);
                for element in elements {
                    self.compile_expression_as_type(sub, section, element)?;
                    self.emit_op(sub, Op::TupleMember);
                }
                self.close_frame(sub);
                self.emit_op(sub, Op::Tuple);
                self.emit_u16(sub, elements.len() as u16);
            }

            Expression::ObjectLiteral { properties, .. } => {
                self.emit_op(sub, Op::Frame);
                self.open_frame(sub);
                for (name, value) in properties {
                    self.emit_op(sub, Op::StringLiteral);
                    let addr = self.builder.intern(name);
                    self.emit_u32(sub, addr);
                    self.compile_expression_as_type(sub, section, value)?;
                    self.emit_op(sub, Op::PropertySignature);
                }
                self.close_frame(sub);
                self.emit_op(sub, Op::ObjectLiteral);
                self.emit_u16(sub, properties.len() as u16);
            }

            Expression::Call {
                callee,
                type_arguments,
                arguments,
                ..
            } => {
                self.compile_expression_as_type(sub, section, callee)?;
                if !type_arguments.is_empty() {
                    for argument in type_arguments {
                        self.compile_type(sub, section, argument)?;
                    }
                    self.emit_op(sub, Op::Instantiate);
                    self.emit_u16(sub, type_arguments.len() as u16);
                }
                for argument in arguments {
                    self.compile_expression_as_type(sub, section, argument)?;
                }
                self.emit_op(sub, Op::CallExpression);
                self.emit_u16(sub, arguments.len() as u16);
            }
        }
        Ok(())
    }

    // --- finishing -------------------------------------------------------

    fn finish(mut self) -> CompileResult<Module> {
        for sub in 0..self.sections.len() as u32 {
            let tree = std::mem::take(&mut self.sections[sub as usize]);
            let last_use = std::mem::take(&mut self.last_use[sub as usize]);
            optimizer::optimize(self.builder.body_mut(sub), &tree, &last_use);
        }
        Ok(self.builder.finish(&self.patches))
    }
}

/// A synthetic `TypeReference` renaming the conditional's original check
/// type so `compile_plain_conditional` can reuse its Extends/JumpCondition
/// shape for the distributive case. `compile_type_reference` intercepts
/// `name` via `distribute_bindings` before ordinary symbol resolution runs,
/// so this resolves to the loop's per-iteration cursor rather than the
/// outer `TypeArgument` slot -- exactly like every other reference to the
/// same name inside `true_type`/`false_type`.
fn bound_check_node(name: &str) -> TypeNode {
    TypeNode::TypeReference {
        span: Span { pos: 0, end: 0 },
        name: name.to_string(),
        type_arguments: Vec::new(),
    }
}
