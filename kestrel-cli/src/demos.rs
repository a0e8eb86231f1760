//! Built-in demo programs.
//!
//! The parser is an external collaborator; these trees stand in for
//! its output so the toolchain can be driven end to end.
use kestrel_tree::{BinOp, Tree, TreeBuilder};

pub const NAMES: &[&str] = &["sum", "records", "arrays", "mutual", "folding"];

pub fn build(name: &str) -> Option<Tree> {
    match name {
        "sum" => Some(sum()),
        "records" => Some(records()),
        "arrays" => Some(arrays()),
        "mutual" => Some(mutual()),
        "folding" => Some(folding()),
        _ => None,
    }
}

/// total: Integer;
/// for i := 1 .. 10 { total := total + i; }
/// print total;
fn sum() -> Tree {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let total_decl = b.decl("total", int, None);
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
    b.program(vec![total_decl, for_loop, print]);
    b.finish()
}

/// type Point = Record { x: Integer, y: Real };
/// p: Point;
/// p.x := 3; p.y := 1.5;
/// print p;
fn records() -> Tree {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();
    let real = b.ty_real();
    let point = b.ty_record(vec![("x", int), ("y", real)]);
    let alias = b.type_alias("Point", point);
    let named = b.ty_named("Point");
    let p_decl = b.decl("p", named, None);
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
    b.program(vec![alias, p_decl, assign_x, assign_y, print]);
    b.finish()
}

/// squares: Array 5 of Integer;
/// for i := 0 .. 4 { squares[i] := i * i; }
/// print squares;
fn arrays() -> Tree {
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
    b.finish()
}

/// function is_even(n: Integer) -> Boolean   { if n == 0 return true;  return is_odd(n - 1); }
/// function is_odd(n: Integer) -> Boolean    { if n == 0 return false; return is_even(n - 1); }
/// print is_even(10);
fn mutual() -> Tree {
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
    let ten = b.int(10);
    let call = b.call("is_even", vec![ten]);
    let print = b.print(call);
    b.program(vec![even, odd, print]);
    b.finish()
}

/// function pick() -> Integer { if 1 < 2 return 10; else return 20; }
/// print pick();
fn folding() -> Tree {
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
    let call = b.call("pick", vec![]);
    let print = b.print(call);
    b.program(vec![func, print]);
    b.finish()
}
