use kestrel_bytecode::{Instr, RetWidth, Value, ValueKind, Vm, VmError};
use kestrel_compiler::{check, generate, optimize, GenError};
use kestrel_tree::{BinOp, TreeBuilder};

#[test]
fn test_constant_branch_compiles_to_literal_return() {
    // After optimization, `pick` computes and returns the literal 10.
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
    let func = b.function("pick", vec![], Some(ret_ty), body);
    b.program(vec![func]);
    let mut tree = b.finish();

    optimize(&mut tree);
    let artifact = generate(&tree).unwrap();

    let pick = artifact.primary.function("pick").unwrap();
    assert_eq!(pick.code[0], Instr::ConstInt(10));
    assert_eq!(pick.code[1], Instr::RetInt);

    let mut vm = Vm::new(&artifact);
    assert_eq!(vm.call("pick", vec![]).unwrap(), Some(Value::Int(10)));
}

#[test]
fn test_truncating_real_to_integer_assignment() {
    // x: Integer := 3.9; print x;  =>  3, not 4 and not a type error.
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let init = b.real(3.9);
    let decl = b.decl("x", int, Some(init));
    let x = b.ident("x");
    let print = b.print(x);
    b.program(vec![decl, print]);
    let tree = b.finish();

    assert!(check(&tree).is_empty());

    let artifact = generate(&tree).unwrap();
    let entry = artifact.primary.function("entry").unwrap();
    assert!(entry.code.contains(&Instr::RealToInt));

    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "3\n");
}

#[test]
fn test_integer_to_boolean_assignment() {
    // Nonzero collapses to one.
    let mut b = TreeBuilder::new();
    let bool_ty = b.ty_bool();
    let five = b.int(5);
    let decl = b.decl("flag", bool_ty, Some(five));
    let flag = b.ident("flag");
    let print = b.print(flag);
    b.program(vec![decl, print]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "1\n");
}

#[test]
fn test_integer_widens_to_real() {
    let mut b = TreeBuilder::new();
    let real = b.ty_real();
    let two = b.int(2);
    let decl = b.decl("r", real, Some(two));
    let r = b.ident("r");
    let print = b.print(r);
    b.program(vec![decl, print]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let entry = artifact.primary.function("entry").unwrap();
    assert!(entry.code.contains(&Instr::IntToReal));

    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "2.0\n");
}

#[test]
fn test_division_by_zero_faults_at_runtime() {
    // The unfolded literal division compiles to a guarded fault.
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let decl = b.decl("x", int, None);
    let ten = b.int(10);
    let zero = b.int(0);
    let div = b.binary(BinOp::Div, ten, zero);
    let x = b.ident("x");
    let assign = b.assign(x, div);
    let x_out = b.ident("x");
    let print = b.print(x_out);
    b.program(vec![decl, assign, print]);
    let mut tree = b.finish();

    optimize(&mut tree);
    let artifact = generate(&tree).unwrap();

    let mut vm = Vm::new(&artifact);
    match vm.run_entry() {
        Err(VmError::Fault(msg)) => assert_eq!(msg, "division by zero"),
        other => panic!("expected fault, got {:?}", other),
    }
}

#[test]
fn test_mutual_recursion_links_through_function_table() {
    let mut b = TreeBuilder::new();

    let parity = |b: &mut TreeBuilder, name: &str, base: bool, other: &str| {
        let int = b.ty_int();
        let param = b.decl("n", int, None);
        let ret_ty = b.ty_bool();
        let n1 = b.ident("n");
        let zero = b.int(0);
        let is_zero = b.binary(BinOp::Eq, n1, zero);
        let base_lit = b.boolean(base);
        let base_ret = b.ret(Some(base_lit));
        let guard = b.if_else(is_zero, base_ret, None);
        let n2 = b.ident("n");
        let one = b.int(1);
        let minus = b.binary(BinOp::Sub, n2, one);
        let call = b.call(other, vec![minus]);
        let tail = b.ret(Some(call));
        let body = b.block(vec![guard, tail]);
        b.function(name, vec![param], Some(ret_ty), body)
    };

    let even = parity(&mut b, "is_even", true, "is_odd");
    let odd = parity(&mut b, "is_odd", false, "is_even");
    b.program(vec![even, odd]);
    let tree = b.finish();

    assert!(check(&tree).is_empty());
    let artifact = generate(&tree).unwrap();

    let mut vm = Vm::new(&artifact);
    assert_eq!(vm.call("is_even", vec![Value::Int(10)]).unwrap(), Some(Value::Int(1)));
    assert_eq!(vm.call("is_even", vec![Value::Int(7)]).unwrap(), Some(Value::Int(0)));
}

#[test]
fn test_slot_allocation_orders_params_then_locals() {
    // f(a: Integer, b: Real, c: Integer) with one Real local: the
    // wide parameter takes two units.
    let mut b = TreeBuilder::new();
    let a_ty = b.ty_int();
    let a = b.decl("a", a_ty, None);
    let b_ty = b.ty_real();
    let bp = b.decl("b", b_ty, None);
    let c_ty = b.ty_int();
    let c = b.decl("c", c_ty, None);
    let local_ty = b.ty_real();
    let local = b.decl("d", local_ty, None);
    let c_ref = b.ident("c");
    let ret = b.ret(Some(c_ref));
    let ret_ty = b.ty_int();
    let body = b.block(vec![local, ret]);
    let func = b.function("f", vec![a, bp, c], Some(ret_ty), body);
    b.program(vec![func]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let f = artifact.primary.function("f").unwrap();
    assert_eq!(f.params, vec![ValueKind::Int, ValueKind::Real, ValueKind::Int]);
    assert_eq!(f.ret, RetWidth::Narrow);
    // a=0, b=1..2, c=3, d=4..5
    assert_eq!(f.locals, 6);
    assert!(f.code.contains(&Instr::LoadInt(3)));

    let mut vm = Vm::new(&artifact);
    let result = vm
        .call("f", vec![Value::Int(1), Value::Real(2.5), Value::Int(42)])
        .unwrap();
    assert_eq!(result, Some(Value::Int(42)));
}

#[test]
fn test_array_store_and_load() {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let arr = b.ty_array(5, int);
    let decl = b.decl("squares", arr, None);
    let squares = b.ident("squares");
    let i1 = b.ident("i");
    let target = b.index(squares, i1);
    let i2 = b.ident("i");
    let i3 = b.ident("i");
    let square = b.binary(BinOp::Mul, i2, i3);
    let assign = b.assign(target, square);
    let body = b.block(vec![assign]);
    let zero = b.int(0);
    let four = b.int(4);
    let for_loop = b.for_loop("i", zero, four, body);
    let squares_out = b.ident("squares");
    let print = b.print(squares_out);
    b.program(vec![decl, for_loop, print]);
    let tree = b.finish();

    assert!(check(&tree).is_empty());
    let artifact = generate(&tree).unwrap();

    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "[0, 1, 4, 9, 16]\n");
}

#[test]
fn test_record_synthesis_and_field_access() {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let real = b.ty_real();
    let point = b.ty_record(vec![("x", int), ("y", real)]);
    let alias = b.type_alias("Point", point);
    let named = b.ty_named("Point");
    let decl = b.decl("p", named, None);
    let p1 = b.ident("p");
    let x_field = b.field(p1, "x");
    let three = b.int(3);
    let assign_x = b.assign(x_field, three);
    let p2 = b.ident("p");
    let y_field = b.field(p2, "y");
    let half = b.real(1.5);
    let assign_y = b.assign(y_field, half);
    let p3 = b.ident("p");
    let print = b.print(p3);
    b.program(vec![alias, decl, assign_x, assign_y, print]);
    let tree = b.finish();

    assert!(check(&tree).is_empty());
    let artifact = generate(&tree).unwrap();

    // One auxiliary module with one field slot per record field and a
    // nullary constructor entry point.
    assert_eq!(artifact.records.len(), 1);
    let module = &artifact.records[0];
    assert_eq!(module.name, "Record0");
    assert_eq!(module.fields.len(), 2);
    assert!(module.function("Record0_init").is_some());

    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "{\"x\": 3, \"y\": 1.5}\n");
}

#[test]
fn test_field_identical_records_stay_distinct_types() {
    // Reference behavior: synthesis is nominal by declaration, while
    // the permissive lattice still allows assignment across the two.
    let mut b = TreeBuilder::new();
    let int_a = b.ty_int();
    let rec_a = b.ty_record(vec![("x", int_a)]);
    let alias_a = b.type_alias("A", rec_a);
    let int_b = b.ty_int();
    let rec_b = b.ty_record(vec![("x", int_b)]);
    let alias_b = b.type_alias("B", rec_b);
    let named_a = b.ty_named("A");
    let decl_a = b.decl("a", named_a, None);
    let named_b = b.ty_named("B");
    let decl_b = b.decl("b", named_b, None);
    let a1 = b.ident("a");
    let b1 = b.ident("b");
    let cross_assign = b.assign(a1, b1);
    let a2 = b.ident("a");
    let print = b.print(a2);
    b.program(vec![alias_a, alias_b, decl_a, decl_b, cross_assign, print]);
    let tree = b.finish();

    assert!(check(&tree).is_empty());
    let artifact = generate(&tree).unwrap();

    let names: Vec<&str> = artifact.records.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Record0", "Record1"]);
}

#[test]
fn test_same_record_node_reuses_synthesized_type() {
    // Two variables of the same aliased record share one auxiliary
    // module.
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let rec = b.ty_record(vec![("x", int)]);
    let alias = b.type_alias("P", rec);
    let named_1 = b.ty_named("P");
    let decl_1 = b.decl("p", named_1, None);
    let named_2 = b.ty_named("P");
    let decl_2 = b.decl("q", named_2, None);
    let p = b.ident("p");
    let print_p = b.print(p);
    let q = b.ident("q");
    let print_q = b.print(q);
    b.program(vec![alias, decl_1, decl_2, print_p, print_q]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    assert_eq!(artifact.records.len(), 1);
}

#[test]
fn test_incompatible_assignment_is_fatal_and_leaves_no_artifact() {
    // The checker only warns; generation is the enforcement point.
    let mut b = TreeBuilder::new();
    let str_ty = b.ty_str();
    let decl = b.decl("s", str_ty, None);
    let s = b.ident("s");
    let five = b.int(5);
    let assign = b.assign(s, five);
    b.program(vec![decl, assign]);
    let tree = b.finish();

    let diagnostics = check(&tree);
    assert!(!diagnostics.is_empty());

    match generate(&tree) {
        Err(GenError::TypeMismatch(_)) => {}
        other => panic!("expected fatal type mismatch, got {:?}", other),
    }
}

#[test]
fn test_undeclared_variable_is_fatal_at_generation() {
    let mut b = TreeBuilder::new();
    let ghost = b.ident("ghost");
    let print = b.print(ghost);
    b.program(vec![print]);
    let tree = b.finish();

    match generate(&tree) {
        Err(GenError::Undeclared(name)) => assert_eq!(name, "ghost"),
        other => panic!("expected undeclared variable, got {:?}", other),
    }
}

#[test]
fn test_call_arity_is_fatal_at_generation() {
    let mut b = TreeBuilder::new();
    let ret_ty = b.ty_int();
    let zero = b.int(0);
    let ret = b.ret(Some(zero));
    let body = b.block(vec![ret]);
    let param_ty = b.ty_int();
    let param = b.decl("n", param_ty, None);
    let func = b.function("f", vec![param], Some(ret_ty), body);
    let call = b.call("f", vec![]);
    let print = b.print(call);
    b.program(vec![func, print]);
    let tree = b.finish();

    match generate(&tree) {
        Err(GenError::ArityMismatch { expected, found, .. }) => {
            assert_eq!((expected, found), (1, 0));
        }
        other => panic!("expected arity mismatch, got {:?}", other),
    }
}

#[test]
fn test_string_declaration_and_print() {
    let mut b = TreeBuilder::new();
    let str_ty = b.ty_str();
    let hello = b.string("hello");
    let decl = b.decl("greeting", str_ty, Some(hello));
    let greeting = b.ident("greeting");
    let print = b.print(greeting);
    b.program(vec![decl, print]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "hello\n");
}

#[test]
fn test_while_loop_lowering() {
    // n: Integer := 3; while (n > 0) { n := n - 1; } print n;
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let three = b.int(3);
    let decl = b.decl("n", int, Some(three));
    let n1 = b.ident("n");
    let zero = b.int(0);
    let cond = b.binary(BinOp::Gt, n1, zero);
    let n2 = b.ident("n");
    let one = b.int(1);
    let minus = b.binary(BinOp::Sub, n2, one);
    let n3 = b.ident("n");
    let assign = b.assign(n3, minus);
    let body = b.block(vec![assign]);
    let while_loop = b.while_loop(cond, body);
    let n4 = b.ident("n");
    let print = b.print(n4);
    b.program(vec![decl, while_loop, print]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "0\n");
}

#[test]
fn test_boolean_operators_over_encoding() {
    // flag: Boolean := true XOR false; print flag;
    let mut b = TreeBuilder::new();
    let bool_ty = b.ty_bool();
    let t = b.boolean(true);
    let f = b.boolean(false);
    let xor = b.binary(BinOp::Xor, t, f);
    let decl = b.decl("flag", bool_ty, Some(xor));
    let flag = b.ident("flag");
    let print = b.print(flag);
    b.program(vec![decl, print]);
    let mut tree = b.finish();

    // Keep the operation unfolded so the emitted xor.i executes.
    let artifact = generate(&tree).unwrap();
    let entry = artifact.primary.function("entry").unwrap();
    assert!(entry.code.contains(&Instr::XorInt));
    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "1\n");

    // And the folded form agrees.
    optimize(&mut tree);
    let artifact = generate(&tree).unwrap();
    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "1\n");
}

#[test]
fn test_real_comparison_lowering() {
    // less: Boolean := 1.5 < 2.5; print less;
    let mut b = TreeBuilder::new();
    let bool_ty = b.ty_bool();
    let a = b.real(1.5);
    let c = b.real(2.5);
    let lt = b.binary(BinOp::Lt, a, c);
    let decl = b.decl("less", bool_ty, Some(lt));
    let less = b.ident("less");
    let print = b.print(less);
    b.program(vec![decl, print]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let entry = artifact.primary.function("entry").unwrap();
    assert!(entry.code.contains(&Instr::CmpReal));

    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "1\n");
}

#[test]
fn test_default_return_synthesized_on_fall_through() {
    // function f() -> Integer { }  returns the zero default.
    let mut b = TreeBuilder::new();
    let ret_ty = b.ty_int();
    let body = b.block(vec![]);
    let func = b.function("f", vec![], Some(ret_ty), body);
    b.program(vec![func]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let f = artifact.primary.function("f").unwrap();
    assert_eq!(f.code, vec![Instr::ConstInt(0), Instr::RetInt]);

    let mut vm = Vm::new(&artifact);
    assert_eq!(vm.call("f", vec![]).unwrap(), Some(Value::Int(0)));
}

#[test]
fn test_print_dispatches_by_static_type() {
    let mut b = TreeBuilder::new();
    let i = b.int(42);
    let print_i = b.print(i);
    let r = b.real(2.5);
    let print_r = b.print(r);
    let t = b.boolean(true);
    let print_t = b.print(t);
    let s = b.string("done");
    let print_s = b.print(s);
    b.program(vec![print_i, print_r, print_t, print_s]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    assert!(artifact.primary.function("print_int").is_some());
    assert!(artifact.primary.function("print_real").is_some());
    assert!(artifact.primary.function("print_str").is_some());

    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "42\n2.5\n1\ndone\n");
}

#[test]
fn test_for_loop_is_inclusive() {
    // total accumulates 1 through 5.
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let decl = b.decl("total", int, None);
    let total = b.ident("total");
    let i = b.ident("i");
    let add = b.binary(BinOp::Add, total, i);
    let target = b.ident("total");
    let assign = b.assign(target, add);
    let body = b.block(vec![assign]);
    let one = b.int(1);
    let five = b.int(5);
    let for_loop = b.for_loop("i", one, five, body);
    let total_out = b.ident("total");
    let print = b.print(total_out);
    b.program(vec![decl, for_loop, print]);
    let tree = b.finish();

    let artifact = generate(&tree).unwrap();
    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    assert_eq!(vm.output(), "15\n");
}
