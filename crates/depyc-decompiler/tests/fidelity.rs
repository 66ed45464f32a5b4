use depyc_ast::{unparse, BinaryOp, Constant, Expr, Module, Stmt, StmtKind, UnaryOp};
use depyc_compiler::{compile_source, Compiler, CompilerOptions};
use depyc_decompiler::reconstruct;
use depyc_parser::parse;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}".prop_filter("keyword", |s| !matches!(s.as_str(), "pass" | "not"))
}

fn constant() -> impl Strategy<Value = Constant> {
    prop_oneof![
        Just(Constant::None),
        any::<bool>().prop_map(Constant::Bool),
        (0..=i64::MAX).prop_map(Constant::Int),
        prop::sample::select(vec![0.0, 0.5, 2.25, 1e300, f64::INFINITY]).prop_map(Constant::Float),
        "[a-z '\\\\\n]{0,6}".prop_map(Constant::Str),
    ]
}

fn binop() -> impl Strategy<Value = BinaryOp> {
    prop::sample::select(vec![BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div, BinaryOp::Mod])
}

fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![constant().prop_map(Expr::Constant), name().prop_map(Expr::Name)];
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            (inner.clone(), prop::collection::vec(inner.clone(), 0..4)).prop_map(|(f, args)| Expr::call(f, args)),
            (inner.clone(), binop(), inner.clone()).prop_map(|(l, op, r)| Expr::binary(l, op, r)),
            (prop::sample::select(vec![UnaryOp::Neg, UnaryOp::Not]), inner).prop_map(|(op, e)| Expr::unary(op, e)),
        ]
    })
}

fn module() -> impl Strategy<Value = Module> {
    let stmt = prop_oneof![
        expr().prop_map(StmtKind::Expr),
        (name(), expr()).prop_map(|(target, value)| StmtKind::Assign { target, value }),
        Just(StmtKind::Pass),
    ];
    prop::collection::vec(stmt, 0..8).prop_map(|kinds| {
        let body = kinds.into_iter().zip(1u32..).map(|(kind, line)| Stmt::new(kind, line)).collect();
        Module::new(body)
    })
}

proptest! {
    #[test]
    fn rendered_source_parses_back(m in module()) {
        let src = unparse(&m);
        prop_assert_eq!(parse(&src).unwrap(), m);
    }

    #[test]
    fn reconstruct_inverts_compile(m in module()) {
        let chunk = Compiler::new(CompilerOptions::default()).compile(&m).unwrap();
        prop_assert_eq!(reconstruct(&chunk).unwrap(), m);
    }
}

#[test]
fn handwritten_module_survives_the_loop() {
    let src = "\
# greeting
greeting = 'hello, ' + name
print(greeting, len(greeting) * 2)
pass
total = (a - b) - (c - d) % -e
flag = not done
";
    let parsed = parse(src).unwrap();
    let chunk = compile_source(src, "loop.py").unwrap();
    let back = reconstruct(&chunk).unwrap();
    assert_eq!(back, parsed);
    assert_eq!(
        unparse(&back),
        "greeting = 'hello, ' + name\nprint(greeting, len(greeting) * 2)\npass\ntotal = a - b - (c - d) % -e\nflag = not done\n"
    );
    let lines: Vec<u32> = back.body.iter().map(|s| s.line).collect();
    assert_eq!(lines, vec![2, 3, 4, 5, 6]);
}
