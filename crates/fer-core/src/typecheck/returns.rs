//! Control-flow return analysis (spec.md §4.4.6): "all paths return" for a
//! non-void function body, with up to three reported missing-return
//! locations.

use std::ops::Range;

use crate::ast::{BlockAst, ElseAst, IfAst, StmtAst};

const MAX_MISSING_RETURN_LOCATIONS: usize = 3;

/// Whether `block` always returns on every path, plus up to three positions
/// where a path falls through without one.
pub fn analyze_block(block: &BlockAst) -> (bool, Vec<Range<usize>>) {
    let mut missing = Vec::new();
    let returns = block_returns(block, &mut missing);
    (returns, missing)
}

fn block_returns(block: &BlockAst, missing: &mut Vec<Range<usize>>) -> bool {
    let last_index = block.statements.len().checked_sub(1);
    for (index, stmt) in block.statements.iter().enumerate() {
        let is_last = Some(index) == last_index;
        match stmt {
            // Anything after a return in the same block is unreachable;
            // reported separately by the unreachable-code pass, not here.
            StmtAst::Return { .. } => return true,
            // A covering if/else (or nested block) makes the rest of this
            // block unreachable, same as an explicit return would.
            StmtAst::If(if_ast) => {
                if if_returns(if_ast, missing) {
                    return true;
                }
                // Non-covering: `if_returns` already recorded the precise
                // fallthrough location(s) inside itself. If this if is the
                // last statement, that's the function's own fallthrough —
                // don't also report the whole block's end.
                if is_last {
                    return false;
                }
            }
            StmtAst::Block(inner) => {
                if block_returns(inner, missing) {
                    return true;
                }
                if is_last {
                    return false;
                }
            }
            _ => {}
        }
    }

    if missing.len() < MAX_MISSING_RETURN_LOCATIONS {
        missing.push(block.position.clone());
    }
    false
}

/// Whether an `if` covers every path (both branches return). Recurses to
/// surface missing-return locations in either branch even when the overall
/// `if` does not cover every path.
fn if_returns(if_ast: &IfAst, missing: &mut Vec<Range<usize>>) -> bool {
    let then_returns = block_returns(&if_ast.then_block, missing);

    let else_returns = match &if_ast.else_branch {
        Some(else_branch) => match else_branch.as_ref() {
            ElseAst::Block(block) => block_returns(block, missing),
            ElseAst::If(nested) => if_returns(nested, missing),
        },
        None => {
            // If without else: the path falls through regardless of
            // whether the then-branch returns (spec.md §4.4.6).
            if missing.len() < MAX_MISSING_RETURN_LOCATIONS {
                missing.push(if_ast.position.clone());
            }
            false
        }
    };

    then_returns && else_returns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprAst;

    fn ret(pos: Range<usize>) -> StmtAst {
        StmtAst::Return { value: Some(ExprAst::IntLiteral(1, pos.clone())), position: pos }
    }

    fn block(statements: Vec<StmtAst>) -> BlockAst {
        BlockAst { statements, position: 0..100 }
    }

    #[test]
    fn single_return_covers_function() {
        let (returns, missing) = analyze_block(&block(vec![ret(0..1)]));
        assert!(returns);
        assert!(missing.is_empty());
    }

    #[test]
    fn if_without_else_does_not_cover() {
        let if_ast = IfAst { condition: ExprAst::BoolLiteral(true, 0..1), then_block: block(vec![ret(1..2)]), else_branch: None, position: 0..5 };
        let (returns, missing) = analyze_block(&block(vec![StmtAst::If(if_ast)]));
        assert!(!returns);
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn if_else_both_returning_covers() {
        let if_ast = IfAst {
            condition: ExprAst::BoolLiteral(true, 0..1),
            then_block: block(vec![ret(1..2)]),
            else_branch: Some(Box::new(ElseAst::Block(block(vec![ret(3..4)])))),
            position: 0..5,
        };
        let (returns, missing) = analyze_block(&block(vec![StmtAst::If(if_ast)]));
        assert!(returns);
        assert!(missing.is_empty());
    }

    #[test]
    fn fallback_return_after_non_covering_if_covers_function() {
        let if_ast = IfAst { condition: ExprAst::BoolLiteral(true, 0..1), then_block: block(vec![ret(1..2)]), else_branch: None, position: 0..5 };
        let (returns, _missing) = analyze_block(&block(vec![StmtAst::If(if_ast), ret(6..7)]));
        assert!(returns);
    }

    #[test]
    fn missing_return_locations_capped_at_three() {
        let nested = |p: Range<usize>| IfAst { condition: ExprAst::BoolLiteral(true, p.clone()), then_block: block(vec![]), else_branch: None, position: p };
        let stmts = vec![
            StmtAst::If(nested(0..1)),
            StmtAst::If(nested(1..2)),
            StmtAst::If(nested(2..3)),
            StmtAst::If(nested(3..4)),
        ];
        let (returns, missing) = analyze_block(&block(stmts));
        assert!(!returns);
        assert_eq!(missing.len(), MAX_MISSING_RETURN_LOCATIONS);
    }
}
