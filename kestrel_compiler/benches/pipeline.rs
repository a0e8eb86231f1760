use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kestrel_compiler::{generate, optimize};
use kestrel_tree::{BinOp, Tree, TreeBuilder};

/// Program with a deep ladder of foldable arithmetic feeding a loop.
fn build_program(depth: i64) -> Tree {
    let mut b = TreeBuilder::new();
    let int = b.ty_int();

    let mut expr = b.int(0);
    for i in 0..depth {
        let lit = b.int(i);
        expr = b.binary(BinOp::Add, expr, lit);
    }
    let decl = b.decl("seed", int, Some(expr));

    let total_ty = b.ty_int();
    let total_decl = b.decl("total", total_ty, None);
    let total = b.ident("total");
    let seed = b.ident("seed");
    let add = b.binary(BinOp::Add, total, seed);
    let target = b.ident("total");
    let assign = b.assign(target, add);
    let body = b.block(vec![assign]);
    let one = b.int(1);
    let hundred = b.int(100);
    let for_loop = b.for_loop("i", one, hundred, body);
    let total_out = b.ident("total");
    let print = b.print(total_out);

    b.program(vec![decl, total_decl, for_loop, print]);
    b.finish()
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("optimize deep fold", |b| {
        b.iter(|| {
            let mut tree = build_program(black_box(256));
            optimize(&mut tree);
            tree
        })
    });

    c.bench_function("optimize and generate", |b| {
        b.iter(|| {
            let mut tree = build_program(black_box(64));
            optimize(&mut tree);
            black_box(generate(&tree).unwrap())
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
