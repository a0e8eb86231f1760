use kestrel_bytecode::{Value, Vm};
use kestrel_compiler::{generate, optimize};
use kestrel_tree::{BinOp, Expr, NodeKind, Stmt, Tree, TreeBuilder, UnOp};

/// `function f() -> <ret> { return <lhs> <op> <rhs>; }`
fn binop_program(op: BinOp, lhs: Expr, rhs: Expr, ret_bool: bool, ret_real: bool) -> Tree {
    let mut b = TreeBuilder::new();
    let ret_ty = if ret_bool {
        b.ty_bool()
    } else if ret_real {
        b.ty_real()
    } else {
        b.ty_int()
    };
    let lhs = lit(&mut b, lhs);
    let rhs = lit(&mut b, rhs);
    let bin = b.binary(op, lhs, rhs);
    let ret = b.ret(Some(bin));
    let body = b.block(vec![ret]);
    let func = b.function("f", vec![], Some(ret_ty), body);
    b.program(vec![func]);
    b.finish()
}

fn lit(b: &mut TreeBuilder, expr: Expr) -> kestrel_tree::NodeId {
    match expr {
        Expr::Int(v) => b.int(v),
        Expr::Real(v) => b.real(v),
        Expr::Bool(v) => b.boolean(v),
        _ => panic!("not a literal"),
    }
}

/// Literal returned by `f` after optimization.
fn folded_return(tree: &Tree) -> Expr {
    let program = tree.as_program(tree.root()).unwrap();
    let func = tree.as_function(program.items[0]).unwrap();
    let Some(Stmt::Block { stmts }) = tree.as_stmt(func.body) else {
        panic!("expected block body");
    };
    let Some(Stmt::Return { value: Some(value) }) = tree.as_stmt(stmts[0]) else {
        panic!("expected return");
    };
    tree.as_expr(*value).unwrap().clone()
}

/// Execute `f` of the unoptimized program on the reference VM.
fn executed_return(tree: &Tree) -> Value {
    let artifact = generate(tree).unwrap();
    let mut vm = Vm::new(&artifact);
    vm.call("f", vec![]).unwrap().unwrap()
}

fn assert_equivalent(folded: Expr, executed: Value) {
    match (folded, executed) {
        (Expr::Int(a), Value::Int(b)) => assert_eq!(a, b),
        // Booleans execute as their 0/1 encoding.
        (Expr::Bool(a), Value::Int(b)) => assert_eq!(a as i64, b),
        (Expr::Real(a), Value::Real(b)) => assert_eq!(a, b),
        (folded, executed) => panic!("mismatched shapes: {:?} vs {:?}", folded, executed),
    }
}

#[test]
fn test_folding_matches_execution_for_integers() {
    use BinOp as B;
    let pairs = [(7i64, 3i64), (-4, 9), (0, 5), (12, -6), (5, 5)];
    for op in [B::Add, B::Sub, B::Mul, B::Div, B::Eq, B::Lt, B::Gt] {
        for (a, b) in pairs {
            let is_cmp = op.is_comparison();
            let mut tree = binop_program(op, Expr::Int(a), Expr::Int(b), is_cmp, false);
            let unoptimized = tree.clone();

            optimize(&mut tree);
            let folded = folded_return(&tree);
            assert!(folded.is_literal(), "{:?} {} {:?} did not fold", a, op, b);
            assert_equivalent(folded, executed_return(&unoptimized));
        }
    }
}

#[test]
fn test_folding_matches_execution_for_reals() {
    use BinOp as B;
    let pairs = [(2.5f64, 0.5f64), (-1.25, 3.0), (0.0, 7.5)];
    for op in [B::Add, B::Sub, B::Mul, B::Div, B::Eq, B::Lt, B::Gt] {
        for (a, b) in pairs {
            let is_cmp = op.is_comparison();
            let mut tree = binop_program(op, Expr::Real(a), Expr::Real(b), is_cmp, !is_cmp);
            let unoptimized = tree.clone();

            optimize(&mut tree);
            let folded = folded_return(&tree);
            assert!(folded.is_literal());
            assert_equivalent(folded, executed_return(&unoptimized));
        }
    }
}

#[test]
fn test_folding_matches_execution_for_booleans() {
    use BinOp as B;
    for op in [B::And, B::Or, B::Xor] {
        for a in [false, true] {
            for b in [false, true] {
                let mut tree = binop_program(op, Expr::Bool(a), Expr::Bool(b), true, false);
                let unoptimized = tree.clone();

                optimize(&mut tree);
                let folded = folded_return(&tree);
                assert!(folded.is_literal());
                assert_equivalent(folded, executed_return(&unoptimized));
            }
        }
    }
}

#[test]
fn test_unary_folding() {
    let mut b = TreeBuilder::new();
    let ret_ty = b.ty_int();
    let five = b.int(5);
    let neg = b.unary(UnOp::Neg, five);
    let ret = b.ret(Some(neg));
    let body = b.block(vec![ret]);
    let func = b.function("f", vec![], Some(ret_ty), body);
    b.program(vec![func]);
    let mut tree = b.finish();

    optimize(&mut tree);
    assert_eq!(folded_return(&tree), Expr::Int(-5));

    let mut b = TreeBuilder::new();
    let ret_ty = b.ty_bool();
    let t = b.boolean(true);
    let not = b.unary(UnOp::Not, t);
    let ret = b.ret(Some(not));
    let body = b.block(vec![ret]);
    let func = b.function("f", vec![], Some(ret_ty), body);
    b.program(vec![func]);
    let mut tree = b.finish();

    optimize(&mut tree);
    assert_eq!(folded_return(&tree), Expr::Bool(false));
}

#[test]
fn test_literal_division_by_zero_is_not_folded() {
    let mut tree = binop_program(BinOp::Div, Expr::Int(10), Expr::Int(0), false, false);
    optimize(&mut tree);

    let expr = folded_return(&tree);
    assert!(
        matches!(expr, Expr::Binary { op: BinOp::Div, .. }),
        "division by literal zero must keep its runtime guard"
    );
}

#[test]
fn test_optimize_is_idempotent() {
    // Nested foldable expressions, a dead branch and an unused
    // declaration all in one program.
    let build = || {
        let mut b = TreeBuilder::new();
        let int = b.ty_int();
        let two = b.int(2);
        let three = b.int(3);
        let sum = b.binary(BinOp::Add, two, three);
        let unused = b.decl("unused", int, Some(sum));

        let one = b.int(1);
        let two = b.int(2);
        let cond = b.binary(BinOp::Lt, one, two);
        let ten = b.int(10);
        let print_then = b.print(ten);
        let twenty = b.int(20);
        let print_else = b.print(twenty);
        let branch = b.if_else(cond, print_then, Some(print_else));

        b.program(vec![unused, branch]);
        b.finish()
    };

    let mut once = build();
    optimize(&mut once);
    let after_once = generate(&once).unwrap();

    optimize(&mut once);
    let after_twice = generate(&once).unwrap();

    assert_eq!(after_once, after_twice);
}

#[test]
fn test_dead_while_loop_is_removed() {
    let mut b = TreeBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let cond = b.binary(BinOp::Gt, one, two);
    let zero = b.int(0);
    let body = b.print(zero);
    let while_loop = b.while_loop(cond, body);
    b.program(vec![while_loop]);
    let mut tree = b.finish();

    optimize(&mut tree);

    let program = tree.as_program(tree.root()).unwrap();
    assert!(program.items.is_empty());
}

#[test]
fn test_live_while_loop_is_kept() {
    // while (true) { return 1; } must not be unrolled or removed.
    let mut b = TreeBuilder::new();
    let ret_ty = b.ty_int();
    let cond = b.boolean(true);
    let one = b.int(1);
    let ret = b.ret(Some(one));
    let body = b.block(vec![ret]);
    let while_loop = b.while_loop(cond, body);
    let func_body = b.block(vec![while_loop]);
    let func = b.function("f", vec![], Some(ret_ty), func_body);
    b.program(vec![func]);
    let mut tree = b.finish();

    optimize(&mut tree);

    let program = tree.as_program(tree.root()).unwrap();
    let func = tree.as_function(program.items[0]).unwrap();
    let Some(Stmt::Block { stmts }) = tree.as_stmt(func.body) else {
        panic!("expected block body");
    };
    assert!(matches!(
        tree.as_stmt(stmts[0]),
        Some(Stmt::While { .. })
    ));

    // And it still runs to completion through the return.
    let artifact = generate(&tree).unwrap();
    let mut vm = Vm::new(&artifact);
    assert_eq!(vm.call("f", vec![]).unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_unreachable_statements_after_return_are_pruned() {
    let mut b = TreeBuilder::new();
    let ret_ty = b.ty_int();
    let one = b.int(1);
    let ret = b.ret(Some(one));
    let two = b.int(2);
    let dead_print = b.print(two);
    let three = b.int(3);
    let dead_ret = b.ret(Some(three));
    let body = b.block(vec![ret, dead_print, dead_ret]);
    let func = b.function("f", vec![], Some(ret_ty), body);
    b.program(vec![func]);
    let mut tree = b.finish();

    optimize(&mut tree);

    let program = tree.as_program(tree.root()).unwrap();
    let func = tree.as_function(program.items[0]).unwrap();
    let Some(Stmt::Block { stmts }) = tree.as_stmt(func.body) else {
        panic!("expected block body");
    };
    assert_eq!(stmts.len(), 1);
    assert!(matches!(tree.as_stmt(stmts[0]), Some(Stmt::Return { .. })));
}

#[test]
fn test_unused_declaration_yields_empty_program() {
    // x: Integer := 2 + 3; and nothing else becomes an empty program
    // with no storage slot for x.
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let two = b.int(2);
    let three = b.int(3);
    let sum = b.binary(BinOp::Add, two, three);
    let decl = b.decl("x", int, Some(sum));
    b.program(vec![decl]);
    let mut tree = b.finish();

    optimize(&mut tree);

    let program = tree.as_program(tree.root()).unwrap();
    assert!(program.items.is_empty());

    let artifact = generate(&tree).unwrap();
    let entry = artifact.primary.function("entry").unwrap();
    assert_eq!(entry.locals, 0);
    assert_eq!(entry.code, vec![kestrel_bytecode::Instr::Ret]);
}

#[test]
fn test_referenced_declaration_is_kept() {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let two = b.int(2);
    let three = b.int(3);
    let sum = b.binary(BinOp::Add, two, three);
    let decl = b.decl("x", int, Some(sum));
    let x = b.ident("x");
    let print = b.print(x);
    b.program(vec![decl, print]);
    let mut tree = b.finish();

    optimize(&mut tree);

    let program = tree.as_program(tree.root()).unwrap();
    assert_eq!(program.items.len(), 2);
    assert!(matches!(
        tree.kind(program.items[0]),
        NodeKind::Decl(decl) if decl.name == "x"
    ));
}

#[test]
fn test_constant_branch_selects_taken_arm() {
    // if (1 < 2) then return 10; else return 20;  =>  return 10;
    let mut b = TreeBuilder::new();
    let ret_ty = b.ty_int();
    let one = b.int(1);
    let two = b.int(2);
    let cond = b.binary(BinOp::Lt, one, two);
    let ten = b.int(10);
    let then_ret = b.ret(Some(ten));
    let twenty = b.int(20);
    let else_ret = b.ret(Some(twenty));
    let branch = b.if_else(cond, then_ret, Some(else_ret));
    let body = b.block(vec![branch]);
    let func = b.function("f", vec![], Some(ret_ty), body);
    b.program(vec![func]);
    let mut tree = b.finish();

    optimize(&mut tree);

    assert_eq!(folded_return(&tree), Expr::Int(10));
    assert!(tree.parents_consistent(tree.root()));
}

#[test]
fn test_rewrites_keep_parent_links_consistent() {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let two = b.int(2);
    let three = b.int(3);
    let sum = b.binary(BinOp::Add, two, three);
    let decl = b.decl("x", int, Some(sum));
    let t = b.boolean(true);
    let x = b.ident("x");
    let print = b.print(x);
    let branch = b.if_else(t, print, None);
    b.program(vec![decl, branch]);
    let mut tree = b.finish();

    optimize(&mut tree);
    assert!(tree.parents_consistent(tree.root()));
}
