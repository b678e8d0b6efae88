//! Tail-call and rest-reuse rewriting over a subroutine's section tree
//! (spec §4.4).
//!
//! Both rewrites are opcode-for-opcode substitutions (`Call` -> `TailCall`,
//! `Rest` -> `RestReuse`) that never change operand widths, so they're
//! applied by overwriting bytes in place in the already-emitted body --
//! no relocation of anything else in the stream is required.

use rustc_hash::FxHashMap;

use crate::isa::Op;

use super::section::SectionTree;

/// Does the byte sequence immediately following `end` consist of nothing
/// but a `Return`? That's the "leads only to Return" condition section
/// §4.4 step 1 asks about: a section is terminal only if falling off its
/// end lands directly on the subroutine's unwind.
fn falls_through_to_return(body: &[u8], end: usize) -> bool {
    body.get(end).copied() == Some(Op::Return as u8)
}

/// Run both optimizer passes over `body`, the finished (pre-patch) bytecode
/// of one subroutine, using `tree` for control-flow shape and `last_use`
/// (symbol index -> last consuming ip in the subroutine) for rest-reuse
/// eligibility.
pub fn optimize(body: &mut [u8], tree: &SectionTree, last_use: &FxHashMap<u16, usize>) {
    if tree.is_empty() {
        return;
    }

    let mut terminal: FxHashMap<u32, bool> = FxHashMap::default();

    // Step 1 + 2: post-order so every child's terminality is known before
    // its parent is evaluated.
    for id in tree.post_order() {
        let section = tree.get(id);
        if section.blocks_tail_call {
            terminal.insert(id, false);
            continue;
        }
        let children_terminal = section
            .children
            .iter()
            .all(|c| *terminal.get(c).unwrap_or(&false));
        let is_terminal = children_terminal && falls_through_to_return(body, section.end);
        terminal.insert(id, is_terminal);
    }

    // Step 3: Call -> TailCall on every terminal section whose last opcode
    // is Call.
    for id in tree.post_order() {
        let section = tree.get(id);
        if *terminal.get(&id).unwrap_or(&false) && section.last_op == Some(Op::Call) {
            let call_len = Op::Call.len();
            if section.end >= call_len {
                let op_pos = section.end - call_len;
                if body.get(op_pos).copied() == Some(Op::Call as u8) {
                    body[op_pos] = Op::TailCall as u8;
                }
            }
        }
    }

    // Step 4: Rest -> RestReuse for every usage in a terminal section whose
    // symbol is never consumed again later in the subroutine.
    for id in tree.post_order() {
        let section = tree.get(id);
        if !*terminal.get(&id).unwrap_or(&false) {
            continue;
        }
        for usage in &section.usages {
            let is_last_use = last_use
                .get(&usage.symbol_index)
                .is_some_and(|&ip| ip == usage.ip);
            if is_last_use && body.get(usage.ip).copied() == Some(Op::Rest as u8) {
                body[usage.ip] = Op::RestReuse as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::section::SectionTree;

    #[test]
    fn rewrites_a_terminal_call_to_tail_call() {
        let mut body = vec![Op::Call as u8, 0, 0, 0, 0, 0, 0, Op::Return as u8];
        let mut tree = SectionTree::new();
        let root = tree.open_root(0);
        tree.close(root, Op::Call.len(), Some(Op::Call));

        optimize(&mut body, &tree, &FxHashMap::default());
        assert_eq!(body[0], Op::TailCall as u8);
    }

    #[test]
    fn leaves_a_non_terminal_call_alone() {
        // Something other than Return follows -- not a tail position.
        let mut body = vec![Op::Call as u8, 0, 0, 0, 0, 0, 0, Op::Noop as u8];
        let mut tree = SectionTree::new();
        let root = tree.open_root(0);
        tree.close(root, Op::Call.len(), Some(Op::Call));

        optimize(&mut body, &tree, &FxHashMap::default());
        assert_eq!(body[0], Op::Call as u8);
    }

    #[test]
    fn rewrites_rest_to_rest_reuse_on_last_use() {
        let mut body = vec![Op::Rest as u8, Op::Return as u8];
        let mut tree = SectionTree::new();
        let root = tree.open_root(0);
        tree.record_usage(root, 0, 0);
        tree.close(root, 1, None);

        let mut last_use = FxHashMap::default();
        last_use.insert(0u16, 0usize);

        optimize(&mut body, &tree, &last_use);
        assert_eq!(body[0], Op::RestReuse as u8);
    }

    #[test]
    fn leaves_rest_alone_when_symbol_used_again() {
        let mut body = vec![Op::Rest as u8, Op::Return as u8];
        let mut tree = SectionTree::new();
        let root = tree.open_root(0);
        tree.record_usage(root, 0, 0);
        tree.close(root, 1, None);

        let mut last_use = FxHashMap::default();
        last_use.insert(0u16, 10usize); // a later consuming ip

        optimize(&mut body, &tree, &last_use);
        assert_eq!(body[0], Op::Rest as u8);
    }

    #[test]
    fn blocked_section_never_becomes_terminal() {
        let mut body = vec![Op::Call as u8, 0, 0, 0, 0, 0, 0, Op::Return as u8];
        let mut tree = SectionTree::new();
        let root = tree.open_root(0);
        tree.set_blocks_tail_call(root, true);
        tree.close(root, Op::Call.len(), Some(Op::Call));

        optimize(&mut body, &tree, &FxHashMap::default());
        assert_eq!(body[0], Op::Call as u8);
    }
}
