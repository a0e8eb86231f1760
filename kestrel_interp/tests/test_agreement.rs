//! The interpreter and the compiled pipeline must print the same
//! output for the same program.
use kestrel_bytecode::Vm;
use kestrel_compiler::{generate, optimize};
use kestrel_interp::interpret;
use kestrel_tree::{BinOp, Tree, TreeBuilder};

fn compiled_output(tree: &Tree) -> String {
    let mut tree = tree.clone();
    optimize(&mut tree);
    let artifact = generate(&tree).unwrap();
    let mut vm = Vm::new(&artifact);
    vm.run_entry().unwrap();
    vm.take_output()
}

fn assert_agreement(tree: &Tree, expected: &str) {
    assert_eq!(interpret(tree).unwrap(), expected);
    assert_eq!(compiled_output(tree), expected);
}

#[test]
fn test_loop_accumulation_agrees() {
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
    let ten = b.int(10);
    let for_loop = b.for_loop("i", one, ten, body);
    let total_out = b.ident("total");
    let print = b.print(total_out);
    b.program(vec![decl, for_loop, print]);
    let tree = b.finish();

    assert_agreement(&tree, "55\n");
}

#[test]
fn test_record_printing_agrees() {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let real = b.ty_real();
    let point = b.ty_record(vec![("x", int), ("y", real)]);
    let alias = b.type_alias("Point", point);
    let named = b.ty_named("Point");
    let decl = b.decl("p", named, None);
    let p1 = b.ident("p");
    let x_field = b.field(p1, "x");
    let seven = b.int(7);
    let assign_x = b.assign(x_field, seven);
    let p2 = b.ident("p");
    let y_field = b.field(p2, "y");
    let y_val = b.real(0.5);
    let assign_y = b.assign(y_field, y_val);
    let p3 = b.ident("p");
    let print = b.print(p3);
    b.program(vec![alias, decl, assign_x, assign_y, print]);
    let tree = b.finish();

    assert_agreement(&tree, "{\"x\": 7, \"y\": 0.5}\n");
}

#[test]
fn test_array_printing_agrees() {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let arr = b.ty_array(4, int);
    let decl = b.decl("xs", arr, None);
    let xs = b.ident("xs");
    let i1 = b.ident("i");
    let target = b.index(xs, i1);
    let i2 = b.ident("i");
    let two = b.int(2);
    let double = b.binary(BinOp::Mul, i2, two);
    let assign = b.assign(target, double);
    let body = b.block(vec![assign]);
    let zero = b.int(0);
    let three = b.int(3);
    let for_loop = b.for_loop("i", zero, three, body);
    let xs_out = b.ident("xs");
    let print = b.print(xs_out);
    b.program(vec![decl, for_loop, print]);
    let tree = b.finish();

    assert_agreement(&tree, "[0, 2, 4, 6]\n");
}

#[test]
fn test_conversions_agree() {
    // Integer := Real truncates; Boolean := Integer collapses.
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let real_init = b.real(3.9);
    let x = b.decl("x", int, Some(real_init));
    let bool_ty = b.ty_bool();
    let five = b.int(5);
    let flag = b.decl("flag", bool_ty, Some(five));
    let x_out = b.ident("x");
    let print_x = b.print(x_out);
    let flag_out = b.ident("flag");
    let print_flag = b.print(flag_out);
    b.program(vec![x, flag, print_x, print_flag]);
    let tree = b.finish();

    assert_agreement(&tree, "3\n1\n");
}

#[test]
fn test_mutual_recursion_agrees() {
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
    let nine = b.int(9);
    let call = b.call("is_even", vec![nine]);
    let print = b.print(call);
    b.program(vec![even, odd, print]);
    let tree = b.finish();

    assert_agreement(&tree, "0\n");
}
