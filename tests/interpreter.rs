//! End‑to‑end programs: source in, printed output (and errors) out.

use rox::error::LoxError;

/// Runs `source`, returning what it printed and any errors.
fn run(source: &str) -> (String, Vec<LoxError>) {
    let mut out: Vec<u8> = Vec::new();
    let errors = rox::run(source, Box::new(&mut out)).err().unwrap_or_default();

    (String::from_utf8(out).expect("utf-8 output"), errors)
}

/// Runs a program that must succeed and returns its output.
fn output(source: &str) -> String {
    let (out, errors) = run(source);
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    out
}

/// Runs a program that must fail at run time; returns output and message.
fn runtime_failure(source: &str) -> (String, String) {
    let (out, errors) = run(source);
    assert_eq!(errors.len(), 1, "expected one runtime error: {:?}", errors);
    assert!(matches!(errors[0], LoxError::Runtime { .. }), "{:?}", errors[0]);
    (out, errors[0].to_string())
}

#[test]
fn fibonacci() {
    let source = "fun fib(n){ if (n<2) return n; return fib(n-1)+fib(n-2); } print fib(6);";
    assert_eq!(output(source), "8\n");
}

#[test]
fn arithmetic_and_equality() {
    let source = r#"
        print 1 + 1 == 2;
        print "1" == 1;
        print nil == nil;
        print nil == false;
        print 10 / 4;
        print 3 * (2 - 5);
        print "con" + "cat";
        print 2 >= 2;
        print !nil;
        print -(-3);
    "#;
    assert_eq!(
        output(source),
        "true\nfalse\ntrue\nfalse\n2.5\n-9\nconcat\ntrue\ntrue\n3\n"
    );
}

#[test]
fn division_by_zero_follows_floating_point() {
    assert_eq!(output("print 1 / 0; print -1 / 0;"), "Infinity\n-Infinity\n");
}

#[test]
fn string_plus_number_is_a_runtime_error() {
    let (out, message) = runtime_failure("print \"a\" + 1;");
    assert_eq!(out, "");
    assert_eq!(
        message,
        "Operands must be two numbers or two strings.\n[line 1]"
    );
}

#[test]
fn operand_type_errors() {
    assert_eq!(
        runtime_failure("print -\"x\";").1,
        "Operand must be a number.\n[line 1]"
    );
    assert_eq!(
        runtime_failure("print 1 < \"2\";").1,
        "Operands must be numbers.\n[line 1]"
    );
}

#[test]
fn short_circuit_skips_the_right_operand() {
    let source = r#"
        fun boom() { print "boom"; return true; }
        print false and boom();
        print true or boom();
        print nil or "fallback";
        print 1 and 2;
    "#;
    assert_eq!(output(source), "false\ntrue\nfallback\n2\n");
}

#[test]
fn runtime_error_keeps_earlier_output() {
    let (out, message) = runtime_failure("print 1;\nprint nope;\nprint 2;");
    assert_eq!(out, "1\n");
    assert_eq!(message, "Undefined variable 'nope'.\n[line 2]");
}

#[test]
fn assigning_an_undeclared_global_fails() {
    let (_, message) = runtime_failure("missing = 1;");
    assert_eq!(message, "Undefined variable 'missing'.\n[line 1]");
}

#[test]
fn assignment_is_an_expression() {
    assert_eq!(output("var a; var b; a = b = 3; print a; print b;"), "3\n3\n");
}

#[test]
fn block_scoping_and_shadowing() {
    let source = r#"
        var a = "global a";
        var b = "global b";
        {
          var a = "outer a";
          {
            var a = "inner a";
            print a;
            print b;
          }
          print a;
        }
        print a;
    "#;
    assert_eq!(output(source), "inner a\nglobal b\nouter a\nglobal a\n");
}

#[test]
fn closures_bind_lexically_not_dynamically() {
    let source = r#"
        var a = "global";
        {
          fun showA() { print a; }
          showA();
          var a = "block";
          showA();
        }
    "#;
    assert_eq!(output(source), "global\nglobal\n");
}

#[test]
fn closure_shares_mutable_state() {
    let source = r#"
        fun makeCounter() {
          var i = 0;
          fun count() { i = i + 1; return i; }
          return count;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
        print a();
    "#;
    assert_eq!(output(source), "1\n2\n1\n3\n");
}

#[test]
fn two_closures_over_one_scope_see_each_other() {
    let source = r#"
        var get; var set;
        {
          var v = "before";
          fun g() { return v; }
          fun s(x) { v = x; }
          get = g; set = s;
        }
        set("after");
        print get();
    "#;
    assert_eq!(output(source), "after\n");
}

#[test]
fn loop_closures_capture_their_own_iteration() {
    let source = r#"
        var f0; var f1; var f2;
        for (var i = 0; i < 3; i = i + 1) {
          var j = i;
          fun show() { print j; }
          if (i == 0) f0 = show;
          if (i == 1) f1 = show;
          if (i == 2) f2 = show;
        }
        f2(); f0(); f1();
    "#;
    assert_eq!(output(source), "2\n0\n1\n");
}

#[test]
fn while_and_for_loops() {
    let source = r#"
        var i = 0;
        while (i < 3) { print i; i = i + 1; }
        for (var k = 10; k > 8; k = k - 1) print k;
    "#;
    assert_eq!(output(source), "0\n1\n2\n10\n9\n");
}

#[test]
fn return_unwinds_out_of_loops_and_blocks() {
    let source = r#"
        fun first(limit) {
          var i = 0;
          while (true) {
            { if (i == limit) return i * 10; }
            i = i + 1;
          }
        }
        fun nothing() { if (true) { return; } print "unreachable"; }
        print first(4);
        print nothing();
        fun fallsThrough() {}
        print fallsThrough();
    "#;
    assert_eq!(output(source), "40\nnil\nnil\n");
}

#[test]
fn globals_are_late_bound() {
    let source = r#"
        fun isEven(n) { if (n == 0) return true; return isOdd(n - 1); }
        fun isOdd(n) { if (n == 0) return false; return isEven(n - 1); }
        print isEven(10);
        print isOdd(7);
    "#;
    assert_eq!(output(source), "true\ntrue\n");
}

#[test]
fn calling_rules() {
    assert_eq!(
        runtime_failure("\"x\"();").1,
        "Can only call functions and classes.\n[line 1]"
    );
    assert_eq!(
        runtime_failure("fun f(a, b) {}\nf(1);").1,
        "Expected 2 arguments but got 1.\n[line 2]"
    );
    assert_eq!(
        runtime_failure("class A { init(x) {} } A();").1,
        "Expected 1 arguments but got 0.\n[line 1]"
    );
    assert_eq!(
        runtime_failure("class A {} A(1);").1,
        "Expected 0 arguments but got 1.\n[line 1]"
    );
}

#[test]
fn callee_is_checked_before_arguments_run() {
    let source = "fun loud() { print \"evaluated\"; return 1; }\nnil(loud());";
    let (out, message) = runtime_failure(source);
    assert_eq!(out, "");
    assert_eq!(message, "Can only call functions and classes.\n[line 2]");
}

#[test]
fn display_of_callables_and_instances() {
    let source = r#"
        fun f() {}
        class A { m() {} }
        print clock;
        print f;
        print A;
        print A();
        print A().m;
        print clock() > 0;
    "#;
    assert_eq!(
        output(source),
        "<native fn>\n<fn f>\n<class A>\nA instance\n<fn m>\ntrue\n"
    );
}

#[test]
fn fields_set_in_init_and_mutated_from_outside() {
    let source = r#"
        class Box {
          init(value) { this.value = value; }
          get() { return this.value; }
        }
        var b = Box(1);
        print b.get();
        b.value = 2;
        print b.get();
    "#;
    assert_eq!(output(source), "1\n2\n");
}

#[test]
fn init_runs_once_and_returns_the_instance() {
    let source = r#"
        class A {
          init() { print "init"; this.n = 1; return; }
        }
        var a = A();
        print a;
        print a.n;
        var again = a.init();
        print again == a;
    "#;
    assert_eq!(output(source), "init\nA instance\n1\ninit\ntrue\n");
}

#[test]
fn inheritance_overriding_and_super() {
    let source = r#"
        class A {
          method() { return "A.method"; }
          onlyA() { return "A.onlyA"; }
        }
        class B < A {
          method() { return "B.method"; }
          viaSuper() { return super.method(); }
        }
        class C < B {}
        print B().onlyA();
        print B().method();
        print A().method();
        print B().viaSuper();
        print C().viaSuper();
        print C().onlyA();
    "#;
    assert_eq!(
        output(source),
        "A.onlyA\nB.method\nA.method\nA.method\nA.method\nA.onlyA\n"
    );
}

#[test]
fn super_binds_the_current_instance() {
    let source = r#"
        class Base {
          init(name) { this.name = name; }
          describe() { return "base " + this.name; }
        }
        class Derived < Base {
          init(name) { super.init(name + "!"); }
          describe() { return "derived " + super.describe(); }
        }
        print Derived("d").describe();
    "#;
    assert_eq!(output(source), "derived base d!\n");
}

#[test]
fn inherited_init_sets_arity() {
    let source = r#"
        class A { init(a, b) { this.sum = a + b; } }
        class B < A {}
        print B(2, 3).sum;
    "#;
    assert_eq!(output(source), "5\n");
}

#[test]
fn bound_methods_remember_their_instance() {
    let source = r#"
        class Person {
          init(name) { this.name = name; }
          hello() { return "hi " + this.name; }
        }
        var jane = Person("jane");
        var greet = jane.hello;
        jane.name = "janet";
        print greet();
    "#;
    assert_eq!(output(source), "hi janet\n");
}

#[test]
fn this_inside_a_nested_function() {
    let source = r#"
        class Thing {
          getCallback() {
            fun localFunction() { print this; }
            return localFunction;
          }
        }
        var callback = Thing().getCallback();
        callback();
    "#;
    assert_eq!(output(source), "Thing instance\n");
}

#[test]
fn fields_shadow_methods_on_read_only() {
    let source = r#"
        class A { m() { return "method"; } }
        var a = A();
        a.m = "field";
        print a.m;
        print A().m();
    "#;
    assert_eq!(output(source), "field\nmethod\n");
}

#[test]
fn property_errors() {
    assert_eq!(
        runtime_failure("var a = 1; print a.b;").1,
        "Only instances have properties.\n[line 1]"
    );
    assert_eq!(
        runtime_failure("var a = \"s\"; a.b = 1;").1,
        "Only instances have fields.\n[line 1]"
    );
    assert_eq!(
        runtime_failure("class A {} print A().missing;").1,
        "Undefined property 'missing'.\n[line 1]"
    );
    assert_eq!(
        runtime_failure("class A {} class B < A { m() { return super.nope; } } B().m();").1,
        "Undefined property 'nope'.\n[line 1]"
    );
}

#[test]
fn superclass_must_be_a_class() {
    let (_, message) = runtime_failure("var NotClass = 1;\nclass B < NotClass {}");
    assert_eq!(message, "Superclass must be a class.\n[line 2]");
}

#[test]
fn instances_compare_by_identity() {
    let source = r#"
        class A {}
        var a = A();
        var b = a;
        print a == b;
        print a == A();
    "#;
    assert_eq!(output(source), "true\nfalse\n");
}

#[test]
fn class_can_refer_to_itself_in_methods() {
    let source = r#"
        class Node {
          init(depth) { this.depth = depth; }
          child() { return Node(this.depth + 1); }
        }
        print Node(0).child().child().depth;
    "#;
    assert_eq!(output(source), "2\n");
}

#[test]
fn deep_recursion_is_a_runtime_error() {
    let source = "fun f(n) { if (n == 0) return 0; return 1 + f(n - 1); }\nprint f(100000);";
    let (out, message) = runtime_failure(source);

    assert_eq!(out, "");
    assert_eq!(message, "Stack overflow.\n[line 1]");
}

#[test]
fn recursion_below_the_limit_runs() {
    let source = "fun f(n) { if (n == 0) return 0; return 1 + f(n - 1); }\nprint f(1000);";
    assert_eq!(output(source), "1000\n");
}

#[test]
fn numbers_compare_by_value_identity() {
    let source = r#"
        var nan = 0 / 0;
        print nan == nan;
        print nan != nan;
        print 0 == -0;
        print 1 == 1.0;
    "#;
    assert_eq!(output(source), "true\nfalse\nfalse\ntrue\n");
}
