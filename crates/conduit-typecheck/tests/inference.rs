//! End-to-end inference tests.
//!
//! Programs are assembled with the node builder, resolved with the test
//! resolver, and run through the full pass; assertions inspect the type
//! map, the rewritten tree, and the reporter.

mod common;

use conduit_syntax::ast::{DeclKind, ExprKind, Program};
use conduit_syntax::{AstBuilder, Direction, ReferenceMap, Reporter};
use conduit_typecheck::types::ty::Ty;
use conduit_typecheck::{Mode, TypeChecking, TypeMap};
use std::rc::Rc;

fn run(b: &AstBuilder, program: &Program) -> (Program, TypeMap, Reporter) {
    let mut ref_map = ReferenceMap::new();
    common::resolve(b, program, &mut ref_map);
    let mut type_map = TypeMap::new();
    let reporter = Reporter::new();
    let checked = TypeChecking {
        ref_map: &ref_map,
        type_map: &mut type_map,
        reporter: &reporter,
        ids: b.ids(),
        interner: b.interner(),
        mode: Mode::Mutating,
    }
    .run(program);
    (checked, type_map, reporter)
}

fn has_error(reporter: &Reporter, needle: &str) -> bool {
    reporter
        .diagnostics()
        .iter()
        .any(|d| d.message.contains(needle))
}

fn var_initializer(decl: &Rc<conduit_syntax::Decl>) -> Rc<conduit_syntax::Expr> {
    match &decl.kind {
        DeclKind::Variable {
            initializer: Some(init),
            ..
        } => Rc::clone(init),
        DeclKind::Constant { initializer, .. } => Rc::clone(initializer),
        other => panic!("expected an initialized declaration, got {other:?}"),
    }
}

// ----- spec scenarios -----

#[test]
fn s1_width_inference() {
    // bit<8> x = 3;
    let b = AstBuilder::new();
    let program = b.program(vec![b.variable(
        "x",
        b.ty_bits(8, false),
        Some(b.constant(3)),
    )]);
    let (checked, tm, reporter) = run(&b, &program);
    assert_eq!(reporter.error_count(), 0);

    let init = var_initializer(&checked.decls[0]);
    match init.kind {
        ExprKind::Constant { value, width } => {
            assert_eq!(value, 3);
            assert_eq!(width, Some((8, false)));
        }
        ref other => panic!("expected a re-widthed constant, got {other:?}"),
    }
    assert_eq!(tm.get_type(init.id).unwrap().as_bits(), Some((8, false)));
    assert!(tm.is_compile_time_constant(init.id));
}

#[test]
fn s2_disallowed_cast() {
    // bit<8> y; bool b = (bool)y;
    let b = AstBuilder::new();
    let y = b.variable("y", b.ty_bits(8, false), None);
    let bad = b.variable(
        "b",
        b.ty_bool(),
        Some(b.cast(b.ty_bool(), b.path_expr("y"))),
    );
    let program = b.program(vec![Rc::clone(&y), bad]);
    let (_, tm, reporter) = run(&b, &program);

    assert!(reporter.error_count() >= 1);
    assert!(has_error(&reporter, "Illegal cast from bit<8> to bool"));
    // The error does not lose y's type.
    assert_eq!(tm.get_type(y.id).unwrap().as_bits(), Some((8, false)));
}

#[test]
fn s3_concatenation_widths() {
    // bit<3> a; bit<5> b; bit<8> c = a ++ b;
    let b = AstBuilder::new();
    let a = b.variable("a", b.ty_bits(3, false), None);
    let b2 = b.variable("b", b.ty_bits(5, false), None);
    let concat = b.binary(
        conduit_syntax::ast::expr::BinaryOp::Concat,
        b.path_expr("a"),
        b.path_expr("b"),
    );
    let c = b.variable("c", b.ty_bits(8, false), Some(concat));
    let program = b.program(vec![a, b2, c]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0);
    let init = var_initializer(&checked.decls[2]);
    assert!(
        matches!(init.kind, ExprKind::Binary { .. }),
        "no cast should be inserted"
    );
    assert_eq!(tm.get_type(init.id).unwrap().as_bits(), Some((8, false)));
}

#[test]
fn s4_action_partial_application() {
    // action f(in bit<8> p, inout bit<8> q) {}
    // table t { actions = { f(0); } }
    let b = AstBuilder::new();
    let f = b.action(
        "f",
        vec![
            b.param("p", Direction::In, b.ty_bits(8, false)),
            b.param("q", Direction::InOut, b.ty_bits(8, false)),
        ],
        b.block(vec![]),
    );
    let entry = b.action_ref(b.call(b.path_expr("f"), vec![b.constant(0)]));
    let t = b.table("t", vec![], vec![entry], None);
    let ctrl = b.control("c", vec![], vec![], vec![f, t], b.block(vec![]));
    let program = b.program(vec![ctrl]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    let DeclKind::Control { locals, .. } = &checked.decls[0].kind else {
        panic!("expected control");
    };
    let DeclKind::Table { actions, .. } = &locals[1].kind else {
        panic!("expected table");
    };
    let entry_ty = tm.get_type(actions[0].expr.id).unwrap();
    let Ty::Action(at) = &**entry_ty else {
        panic!("expected an action type, got {entry_ty:?}");
    };
    assert_eq!(at.params.len(), 1);
    assert_eq!(at.params[0].direction, Direction::InOut);
    assert_eq!(at.params[0].ty.as_bits(), Some((8, false)));
}

#[test]
fn s5_abstract_override_missing() {
    // extern E { E(); abstract void m(); }  E() e = { };
    let b = AstBuilder::new();
    let ext = b.extern_decl(
        "E",
        vec![],
        vec![
            b.method("E", vec![], None, vec![]),
            b.abstract_method("m", Some(b.ty_void()), vec![]),
        ],
    );
    let inst = b.instance("e", b.ty_name("E"), vec![], Some(vec![]));
    let program = b.program(vec![ext, Rc::clone(&inst)]);
    let (_, tm, reporter) = run(&b, &program);

    assert!(has_error(&reporter, "abstract method m not implemented"));
    // The instance still carries its declared type.
    assert!(matches!(
        &**tm.get_type(inst.id).unwrap(),
        Ty::Extern(_)
    ));
}

#[test]
fn s6_generic_specialization() {
    // extern T foo<T>(T x);  bit<8> r = foo<bit<8>>(3);
    let b = AstBuilder::new();
    let t_param = b.type_param("T");
    let foo = b.method(
        "foo",
        vec![t_param],
        Some(b.ty_name("T")),
        vec![b.param("x", Direction::In, b.ty_name("T"))],
    );
    let call = b.call_generic(
        b.path_expr("foo"),
        vec![b.ty_bits(8, false)],
        vec![b.constant(3)],
    );
    let r = b.variable("r", b.ty_bits(8, false), Some(call));
    let program = b.program(vec![foo, r]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    let init = var_initializer(&checked.decls[1]);
    assert_eq!(tm.get_type(init.id).unwrap().as_bits(), Some((8, false)));
    let ExprKind::Call { args, .. } = &init.kind else {
        panic!("expected call");
    };
    match args[0].kind {
        ExprKind::Constant { value, width } => {
            assert_eq!(value, 3);
            assert_eq!(width, Some((8, false)));
        }
        ref other => panic!("expected a re-widthed literal, got {other:?}"),
    }
}

// ----- coercions and operators -----

#[test]
fn implicit_cast_same_width_different_sign() {
    // bit<8> u; int<8> s = u;   (cast inserted by the assignment rules)
    let b = AstBuilder::new();
    let u = b.variable("u", b.ty_bits(8, false), None);
    let s = b.variable("s", b.ty_bits(8, true), Some(b.path_expr("u")));
    let program = b.program(vec![u, s]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0);
    let init = var_initializer(&checked.decls[1]);
    assert!(
        matches!(init.kind, ExprKind::Cast { .. }),
        "expected an implicit cast, got {:?}",
        init.kind
    );
    assert_eq!(tm.get_type(init.id).unwrap().as_bits(), Some((8, true)));
}

#[test]
fn arithmetic_width_mismatch_is_reported() {
    let b = AstBuilder::new();
    let x = b.variable("x", b.ty_bits(8, false), None);
    let y = b.variable("y", b.ty_bits(16, false), None);
    let sum = b.binary(
        conduit_syntax::ast::expr::BinaryOp::Add,
        b.path_expr("x"),
        b.path_expr("y"),
    );
    let z = b.variable("z", b.ty_bits(16, false), Some(sum));
    let program = b.program(vec![x, y, z]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "different widths"));
}

#[test]
fn division_rejects_signed_operands() {
    let b = AstBuilder::new();
    let x = b.variable("x", b.ty_bits(8, true), None);
    let div = b.binary(
        conduit_syntax::ast::expr::BinaryOp::Div,
        b.path_expr("x"),
        b.path_expr("x"),
    );
    let y = b.variable("y", b.ty_bits(8, true), Some(div));
    let program = b.program(vec![x, y]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "cannot operate on signed values"));
}

#[test]
fn oversize_constant_shift_warns() {
    let b = AstBuilder::new();
    let x = b.variable("x", b.ty_bits(8, false), None);
    let shift = b.binary(
        conduit_syntax::ast::expr::BinaryOp::Shl,
        b.path_expr("x"),
        b.constant(9),
    );
    let y = b.variable("y", b.ty_bits(8, false), Some(shift));
    let program = b.program(vec![x, y]);
    let (_, _, reporter) = run(&b, &program);
    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    assert_eq!(reporter.warning_count(), 1);
}

#[test]
fn slice_produces_narrow_bits() {
    // bit<8> x; bit<4> n = x[5:2];
    let b = AstBuilder::new();
    let x = b.variable("x", b.ty_bits(8, false), None);
    let slice = b.slice(b.path_expr("x"), b.constant(5), b.constant(2));
    let n = b.variable("n", b.ty_bits(4, false), Some(slice));
    let program = b.program(vec![x, n]);
    let (checked, tm, reporter) = run(&b, &program);
    assert_eq!(reporter.error_count(), 0);
    let init = var_initializer(&checked.decls[1]);
    assert_eq!(tm.get_type(init.id).unwrap().as_bits(), Some((4, false)));
}

#[test]
fn slice_bounds_are_checked() {
    let b = AstBuilder::new();
    let x = b.variable("x", b.ty_bits(8, false), None);
    let slice = b.slice(b.path_expr("x"), b.constant(9), b.constant(0));
    let n = b.variable("n", b.ty_bits(8, false), Some(slice));
    let program = b.program(vec![x, n]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "bit index larger than type width 8"));
}

#[test]
fn mux_widens_literal_branch() {
    // bool c; bit<8> x; bit<8> m = c ? x : 3;
    let b = AstBuilder::new();
    let c = b.variable("c", b.ty_bool(), None);
    let x = b.variable("x", b.ty_bits(8, false), None);
    let mux = b.mux(b.path_expr("c"), b.path_expr("x"), b.constant(3));
    let m = b.variable("m", b.ty_bits(8, false), Some(mux));
    let program = b.program(vec![c, x, m]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    let init = var_initializer(&checked.decls[2]);
    assert_eq!(tm.get_type(init.id).unwrap().as_bits(), Some((8, false)));
    let ExprKind::Mux { else_expr, .. } = &init.kind else {
        panic!("expected mux");
    };
    assert!(matches!(
        else_expr.kind,
        ExprKind::Constant {
            width: Some((8, false)),
            ..
        }
    ));
}

#[test]
fn equality_on_varbits_is_rejected() {
    let b = AstBuilder::new();
    let h = b.header("h_t", vec![b.field("v", b.ty_varbits(32))]);
    let x = b.variable("x", b.ty_name("h_t"), None);
    let eq = b.binary(
        conduit_syntax::ast::expr::BinaryOp::Eq,
        b.member(b.path_expr("x"), "v"),
        b.member(b.path_expr("x"), "v"),
    );
    let c = b.variable("c", b.ty_bool(), Some(eq));
    let program = b.program(vec![h, x, c]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "== is not defined"));
}

// ----- named types, enums, errors -----

#[test]
fn enum_member_access() {
    // enum Suit { Clubs, Spades }  const Suit s = Suit.Clubs;
    let b = AstBuilder::new();
    let suit = b.enum_decl("Suit", vec![b.member_decl("Clubs"), b.member_decl("Spades")]);
    let access = b.member(b.path_expr("Suit"), "Clubs");
    let s = b.constant_decl("s", b.ty_name("Suit"), access);
    let program = b.program(vec![suit, s]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    let init = var_initializer(&checked.decls[1]);
    assert!(matches!(&**tm.get_type(init.id).unwrap(), Ty::Enum(_)));
    assert!(tm.is_compile_time_constant(init.id));
}

#[test]
fn unknown_enum_tag_is_reported() {
    let b = AstBuilder::new();
    let suit = b.enum_decl("Suit", vec![b.member_decl("Clubs")]);
    let access = b.member(b.path_expr("Suit"), "Hearts");
    let s = b.constant_decl("s", b.ty_name("Suit"), access);
    let program = b.program(vec![suit, s]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "is not a tag of enum Suit"));
}

#[test]
fn error_tag_access() {
    // error { NoMatch }  const error e = error.NoMatch;
    let b = AstBuilder::new();
    let errors = b.errors(vec![b.member_decl("NoMatch")]);
    let access = b.member(b.path_expr("error"), "NoMatch");
    let e = b.constant_decl("e", b.ty_name("error"), access);
    let program = b.program(vec![errors, e]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    let init = var_initializer(&checked.decls[1]);
    assert!(matches!(&**tm.get_type(init.id).unwrap(), Ty::Error));
}

#[test]
fn header_field_whitelist() {
    // Headers may only hold bit/varbit fields.
    let b = AstBuilder::new();
    let h = b.header("h_t", vec![b.field("flag", b.ty_bool())]);
    let program = b.program(vec![h]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "cannot have type bool"));
}

#[test]
fn same_name_different_declaration_is_rejected() {
    // Two headers with identical shape are still distinct types.
    let b = AstBuilder::new();
    let h1 = b.header("h_t", vec![b.field("f", b.ty_bits(8, false))]);
    let h2 = b.header("g_t", vec![b.field("f", b.ty_bits(8, false))]);
    let x = b.variable("x", b.ty_name("h_t"), None);
    let y = b.variable("y", b.ty_name("g_t"), Some(b.path_expr("x")));
    let program = b.program(vec![h1, h2, x, y]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "type mismatch"));
}

// ----- headers, stacks, parsers -----

#[test]
fn header_validity_builtins() {
    // h_t x; bool v = x.isValid();
    let b = AstBuilder::new();
    let h = b.header("h_t", vec![b.field("f", b.ty_bits(8, false))]);
    let x = b.variable("x", b.ty_name("h_t"), None);
    let call = b.call(b.member(b.path_expr("x"), "isValid"), vec![]);
    let v = b.variable("v", b.ty_bool(), Some(call));
    let program = b.program(vec![h, x, v]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    let init = var_initializer(&checked.decls[2]);
    assert!(matches!(&**tm.get_type(init.id).unwrap(), Ty::Bool));
}

#[test]
fn stack_indexing_and_bounds() {
    let b = AstBuilder::new();
    let h = b.header("h_t", vec![b.field("f", b.ty_bits(8, false))]);
    let stack_ty = b.ty_stack(b.ty_name("h_t"), b.constant(4));
    let s = b.variable("s", stack_ty, None);
    // In bounds: s[2].f
    let ok = b.variable(
        "a",
        b.ty_bits(8, false),
        Some(b.member(b.index(b.path_expr("s"), b.constant(2)), "f")),
    );
    // Out of bounds: s[5]
    let bad = b.variable(
        "b",
        b.ty_name("h_t"),
        Some(b.index(b.path_expr("s"), b.constant(5))),
    );
    let program = b.program(vec![h, s, ok, bad]);
    let (checked, tm, reporter) = run(&b, &program);

    assert!(has_error(&reporter, "array index 5 larger or equal to array size 4"));
    let init = var_initializer(&checked.decls[2]);
    assert_eq!(tm.get_type(init.id).unwrap().as_bits(), Some((8, false)));
}

#[test]
fn stack_next_is_rejected_in_controls() {
    let b = AstBuilder::new();
    let h = b.header("h_t", vec![b.field("f", b.ty_bits(8, false))]);
    let stack_ty = b.ty_stack(b.ty_name("h_t"), b.constant(4));
    let s = b.variable("s", stack_ty, None);
    let read = b.variable(
        "v",
        b.ty_bits(8, false),
        Some(b.member(b.member(b.path_expr("s"), "next"), "f")),
    );
    let ctrl = b.control("c", vec![], vec![], vec![s, read], b.block(vec![]));
    let program = b.program(vec![h, ctrl]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "cannot be used in a control"));
}

#[test]
fn parser_select_rewrites_keysets() {
    // parser p(in bit<8> x) { state start { transition select(x) { 4: next; default: done; } } ... }
    let b = AstBuilder::new();
    let done = b.state("done", vec![], None);
    let select = b.select(
        vec![b.path_expr("x")],
        vec![
            b.select_case(b.constant(4), "done"),
            b.select_case(b.default_expr(), "done"),
        ],
    );
    let start = b.state("start", vec![], Some(select));
    let p = b.parser(
        "p",
        vec![b.param("x", Direction::In, b.ty_bits(8, false))],
        vec![],
        vec![],
        vec![start, done],
    );
    let program = b.program(vec![p]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    let DeclKind::Parser { states, .. } = &checked.decls[0].kind else {
        panic!("expected parser");
    };
    let DeclKind::State {
        transition: Some(transition),
        ..
    } = &states[0].kind
    else {
        panic!("expected a transition");
    };
    assert!(matches!(&**tm.get_type(transition.id).unwrap(), Ty::State));
    let ExprKind::Select { cases, .. } = &transition.kind else {
        panic!("expected select");
    };
    assert!(
        matches!(
            cases[0].keyset.kind,
            ExprKind::Constant {
                width: Some((8, false)),
                ..
            }
        ),
        "keyset literal should be re-widthed, got {:?}",
        cases[0].keyset.kind
    );
}

// ----- tables, switch, directions -----

#[test]
fn table_keys_actions_and_switch() {
    let b = AstBuilder::new();
    let kinds = b.match_kinds(vec![b.member_decl("exact")]);
    let act = b.action("drop", vec![], b.block(vec![]));
    let table = b.table(
        "t",
        vec![b.key(b.path_expr("x"), "exact")],
        vec![b.action_ref(b.path_expr("drop"))],
        None,
    );
    let switch = b.switch(
        b.call(b.member(b.path_expr("t"), "apply"), vec![]),
        vec![b.switch_case("drop", Some(b.block(vec![])))],
    );
    let ctrl = b.control(
        "c",
        vec![b.param("x", Direction::In, b.ty_bits(8, false))],
        vec![],
        vec![act, table],
        b.block(vec![switch]),
    );
    let program = b.program(vec![kinds, ctrl]);
    let (_, _, reporter) = run(&b, &program);
    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
}

#[test]
fn duplicate_switch_labels_are_rejected() {
    let b = AstBuilder::new();
    let act = b.action("drop", vec![], b.block(vec![]));
    let table = b.table("t", vec![], vec![b.action_ref(b.path_expr("drop"))], None);
    let switch = b.switch(
        b.call(b.member(b.path_expr("t"), "apply"), vec![]),
        vec![
            b.switch_case("drop", Some(b.block(vec![]))),
            b.switch_case("drop", Some(b.block(vec![]))),
        ],
    );
    let ctrl = b.control("c", vec![], vec![], vec![act, table], b.block(vec![switch]));
    let program = b.program(vec![ctrl]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "duplicate switch label"));
}

#[test]
fn table_apply_inside_action_is_rejected() {
    let b = AstBuilder::new();
    let table = b.table("t", vec![], vec![], None);
    let bad = b.action(
        "a",
        vec![],
        b.block(vec![b.call_stmt(
            b.call(b.member(b.path_expr("t"), "apply"), vec![]),
        )]),
    );
    let ctrl = b.control("c", vec![], vec![], vec![table, bad], b.block(vec![]));
    let program = b.program(vec![ctrl]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "tables cannot be invoked from actions"));
}

#[test]
fn out_argument_must_be_left_value() {
    // extern void f(out bit<8> x);  calling f(3) is an error.
    let b = AstBuilder::new();
    let f = b.method(
        "f",
        vec![],
        Some(b.ty_void()),
        vec![b.param("x", Direction::Out, b.ty_bits(8, false))],
    );
    let call = b.call_stmt(b.call(b.path_expr("f"), vec![b.constant(3)]));
    let ctrl = b.control("c", vec![], vec![], vec![], b.block(vec![call]));
    let program = b.program(vec![f, ctrl]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "must be a left-value"));
}

#[test]
fn directionless_action_params_must_be_last() {
    let b = AstBuilder::new();
    let act = b.action(
        "a",
        vec![
            b.param("n", Direction::None, b.ty_bits(8, false)),
            b.param("x", Direction::In, b.ty_bits(8, false)),
        ],
        b.block(vec![]),
    );
    let program = b.program(vec![act]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "have to be at the end"));
}

// ----- externs, abstract methods, generics -----

#[test]
fn abstract_override_accepted() {
    let b = AstBuilder::new();
    let ext = b.extern_decl(
        "E",
        vec![],
        vec![
            b.method("E", vec![], None, vec![]),
            b.abstract_method(
                "fill",
                Some(b.ty_void()),
                vec![b.param("buf", Direction::InOut, b.ty_bits(8, false))],
            ),
        ],
    );
    let override_fn = b.function(
        "fill",
        vec![],
        Some(b.ty_void()),
        vec![b.param("buf", Direction::InOut, b.ty_bits(8, false))],
        b.block(vec![]),
    );
    let inst = b.instance("e", b.ty_name("E"), vec![], Some(vec![override_fn]));
    let program = b.program(vec![ext, inst]);
    let (_, _, reporter) = run(&b, &program);
    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
}

#[test]
fn abstract_override_signature_mismatch() {
    let b = AstBuilder::new();
    let ext = b.extern_decl(
        "E",
        vec![],
        vec![
            b.method("E", vec![], None, vec![]),
            b.abstract_method(
                "fill",
                Some(b.ty_void()),
                vec![b.param("buf", Direction::InOut, b.ty_bits(8, false))],
            ),
        ],
    );
    let override_fn = b.function(
        "fill",
        vec![],
        Some(b.ty_void()),
        vec![b.param("buf", Direction::In, b.ty_bits(8, false))],
        b.block(vec![]),
    );
    let inst = b.instance("e", b.ty_name("E"), vec![], Some(vec![override_fn]));
    let program = b.program(vec![ext, inst]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "parameter directions do not match"));
}

#[test]
fn this_outside_abstract_method_is_rejected() {
    let b = AstBuilder::new();
    let f = b.function(
        "f",
        vec![],
        Some(b.ty_void()),
        vec![],
        b.block(vec![b.call_stmt(b.call(
            b.member(b.this_expr(), "anything"),
            vec![],
        ))]),
    );
    let program = b.program(vec![f]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(
        &reporter,
        "'this' can only be used in the definition of an abstract method"
    ));
}

#[test]
fn specialized_extern_instance_and_method_call() {
    // extern reg<T> { reg(); void write(in T v); }
    // reg<bit<8>> r;  ... r.write(3) ...
    let b = AstBuilder::new();
    let t_param = b.type_param("T");
    let ext = b.extern_decl(
        "reg",
        vec![t_param],
        vec![
            b.method("reg", vec![], None, vec![]),
            b.method(
                "write",
                vec![],
                Some(b.ty_void()),
                vec![b.param("v", Direction::In, b.ty_name("T"))],
            ),
        ],
    );
    let inst = b.instance(
        "r",
        b.ty_specialized("reg", vec![b.ty_bits(8, false)]),
        vec![],
        None,
    );
    let write = b.call_stmt(b.call(
        b.member(b.path_expr("r"), "write"),
        vec![b.constant(3)],
    ));
    let ctrl = b.control("c", vec![], vec![], vec![inst], b.block(vec![write]));
    let program = b.program(vec![ext, ctrl]);
    let (checked, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    // The literal argument was re-widthed through the specialization.
    let DeclKind::Control { body, .. } = &checked.decls[1].kind else {
        panic!("expected control");
    };
    let conduit_syntax::ast::StmtKind::Block(stmts) = &body.kind else {
        panic!("expected block");
    };
    let conduit_syntax::ast::StmtKind::Call(call) = &stmts[0].kind else {
        panic!("expected call statement");
    };
    let ExprKind::Call { args, .. } = &call.kind else {
        panic!("expected call");
    };
    assert!(matches!(
        args[0].kind,
        ExprKind::Constant {
            width: Some((8, false)),
            ..
        }
    ));
    assert!(matches!(&**tm.get_type(call.id).unwrap(), Ty::Void));
}

#[test]
fn specializing_a_non_generic_type_is_rejected() {
    let b = AstBuilder::new();
    let h = b.header("h_t", vec![b.field("f", b.ty_bits(8, false))]);
    let x = b.variable(
        "x",
        b.ty_specialized("h_t", vec![b.ty_bits(8, false)]),
        None,
    );
    let program = b.program(vec![h, x]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "is not generic"));
}

// ----- containers and packages -----

#[test]
fn package_instantiation() {
    // parser P(in bit<8> x);  parser impl p0(in bit<8> x) { ... }
    // package pkg(P p);  pkg(p0()) main;
    let b = AstBuilder::new();
    let ptype = b.parser_type(
        "P",
        vec![],
        vec![b.param("x", Direction::In, b.ty_bits(8, false))],
    );
    let p0 = b.parser(
        "p0",
        vec![b.param("x", Direction::In, b.ty_bits(8, false))],
        vec![],
        vec![],
        vec![b.state("start", vec![], None)],
    );
    let pkg = b.package("pkg", vec![], vec![b.param("p", Direction::None, b.ty_name("P"))]);
    let main = b.instance(
        "main",
        b.ty_name("pkg"),
        vec![b.constructor_call(b.ty_name("p0"), vec![])],
        None,
    );
    let program = b.program(vec![ptype, p0, pkg, Rc::clone(&main)]);
    let (_, tm, reporter) = run(&b, &program);

    assert_eq!(reporter.error_count(), 0, "{:?}", reporter.diagnostics());
    assert!(matches!(&**tm.get_type(main.id).unwrap(), Ty::Package(_)));
}

#[test]
fn container_instantiation_requires_constant_arguments() {
    let b = AstBuilder::new();
    let v = b.variable("v", b.ty_bits(8, false), None);
    let p0 = b.parser(
        "p0",
        vec![],
        vec![b.param("cfg", Direction::None, b.ty_bits(8, false))],
        vec![],
        vec![b.state("start", vec![], None)],
    );
    let inst = b.instance("i", b.ty_name("p0"), vec![b.path_expr("v")], None);
    let program = b.program(vec![v, p0, inst]);
    let (_, _, reporter) = run(&b, &program);
    assert!(has_error(&reporter, "compile-time constant"));
}

// ----- pass properties -----

#[test]
fn canonical_bits_are_shared_across_declarations() {
    let b = AstBuilder::new();
    let x = b.variable("x", b.ty_bits(8, false), None);
    let y = b.variable("y", b.ty_bits(8, false), None);
    let program = b.program(vec![Rc::clone(&x), Rc::clone(&y)]);
    let (_, tm, reporter) = run(&b, &program);
    assert_eq!(reporter.error_count(), 0);
    assert!(Rc::ptr_eq(
        tm.get_type(x.id).unwrap(),
        tm.get_type(y.id).unwrap()
    ));
}

#[test]
fn no_type_variables_survive_a_clean_pass() {
    let b = AstBuilder::new();
    let t_param = b.type_param("T");
    let foo = b.method(
        "foo",
        vec![t_param],
        Some(b.ty_name("T")),
        vec![b.param("x", Direction::In, b.ty_name("T"))],
    );
    let call = b.call_generic(
        b.path_expr("foo"),
        vec![b.ty_bits(8, false)],
        vec![b.constant(3)],
    );
    let r = b.variable("r", b.ty_bits(8, false), Some(call));
    let program = b.program(vec![foo, Rc::clone(&r)]);
    let (checked, tm, reporter) = run(&b, &program);
    assert_eq!(reporter.error_count(), 0);

    // The instantiated expressions are ground after the final
    // substitution; the generic declaration itself keeps its parameters.
    let init = var_initializer(&checked.decls[1]);
    let mut vars = std::collections::HashSet::new();
    tm.get_type(init.id).unwrap().collect_vars(&mut vars);
    assert!(vars.is_empty(), "free variables survived: {vars:?}");
    let mut decl_vars = std::collections::HashSet::new();
    tm.get_type(r.id).unwrap().collect_vars(&mut decl_vars);
    assert!(decl_vars.is_empty());
}

#[test]
fn second_read_only_pass_is_identity() {
    let b = AstBuilder::new();
    let x = b.variable("x", b.ty_bits(8, false), Some(b.constant(3)));
    let program = b.program(vec![x]);

    let mut ref_map = ReferenceMap::new();
    common::resolve(&b, &program, &mut ref_map);
    let mut type_map = TypeMap::new();
    let reporter = Reporter::new();

    let first = TypeChecking {
        ref_map: &ref_map,
        type_map: &mut type_map,
        reporter: &reporter,
        ids: b.ids(),
        interner: b.interner(),
        mode: Mode::Mutating,
    }
    .run(&program);
    assert_eq!(reporter.error_count(), 0);

    // Re-resolve the rewritten tree, then check it read-only: no node
    // may change.
    common::resolve(&b, &first, &mut ref_map);
    let second = TypeChecking {
        ref_map: &ref_map,
        type_map: &mut type_map,
        reporter: &reporter,
        ids: b.ids(),
        interner: b.interner(),
        mode: Mode::ReadOnly,
    }
    .run(&first);
    assert_eq!(reporter.error_count(), 0);
    for (a, c) in first.decls.iter().zip(&second.decls) {
        assert!(Rc::ptr_eq(a, c), "read-only pass rewrote a declaration");
    }
}
