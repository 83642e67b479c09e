//! Static errors reported before anything runs.

use rox::error::LoxError;

fn run(source: &str) -> (String, Vec<String>) {
    let mut out: Vec<u8> = Vec::new();
    let errors = rox::run(source, Box::new(&mut out))
        .err()
        .unwrap_or_default()
        .iter()
        .map(LoxError::to_string)
        .collect();

    (String::from_utf8(out).expect("utf-8 output"), errors)
}

fn assert_rejected(source: &str, expected: &[&str]) {
    let (out, errors) = run(source);

    assert_eq!(out, "", "nothing may run when static errors exist");
    assert_eq!(errors, expected);
}

#[test]
fn own_initializer_in_a_block() {
    assert_rejected(
        "print \"before\";\n{ var a = a; }",
        &["[line 2] Error at 'a': Can't read local variable in its own initializer."],
    );
}

#[test]
fn duplicate_local_declaration() {
    assert_rejected(
        "fun f() {\n  var a = 1;\n  var a = 2;\n}",
        &["[line 3] Error at 'a': Already a variable with this name in this scope."],
    );
}

#[test]
fn duplicate_parameters() {
    assert_rejected(
        "fun f(a, a) {}",
        &["[line 1] Error at 'a': Already a variable with this name in this scope."],
    );
}

#[test]
fn globals_may_be_redeclared() {
    let (out, errors) = run("var a = 1; var a = 2; print a;");

    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(out, "2\n");
}

#[test]
fn return_outside_a_function() {
    assert_rejected(
        "print 1;\nreturn 2;",
        &["[line 2] Error at 'return': Can't return from top-level code."],
    );
}

#[test]
fn return_value_from_an_initializer() {
    assert_rejected(
        "class A {\n  init() { return 1; }\n}",
        &["[line 2] Error at 'return': Can't return a value from an initializer."],
    );
}

#[test]
fn this_and_super_misuse() {
    assert_rejected(
        "print this;",
        &["[line 1] Error at 'this': Can't use 'this' outside of a class."],
    );
    assert_rejected(
        "fun f() { return super.x; }",
        &["[line 1] Error at 'super': Can't use 'super' outside of a class."],
    );
    assert_rejected(
        "class A { m() { return super.m(); } }",
        &["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."],
    );
}

#[test]
fn class_inheriting_from_itself() {
    assert_rejected(
        "class Ouroboros < Ouroboros {}",
        &["[line 1] Error at 'Ouroboros': A class can't inherit from itself."],
    );
}

#[test]
fn every_static_error_is_reported() {
    let source = "\
{ var a = a; }
return;
fun g() { var b; var b; }
print this;";

    assert_rejected(
        source,
        &[
            "[line 1] Error at 'a': Can't read local variable in its own initializer.",
            "[line 2] Error at 'return': Can't return from top-level code.",
            "[line 3] Error at 'b': Already a variable with this name in this scope.",
            "[line 4] Error at 'this': Can't use 'this' outside of a class.",
        ],
    );
}

#[test]
fn lex_and_parse_errors_are_collected_together() {
    assert_rejected(
        "var a = @;\nprint;",
        &[
            "[line 1] Error: Unexpected character: @",
            "[line 1] Error at ';': Expect expression.",
            "[line 2] Error at ';': Expect expression.",
        ],
    );
}

#[test]
fn parse_errors_stop_resolution() {
    // The scope error would only surface if resolution ran.
    let (out, errors) = run("{ var a = a; }\nprint (1;");

    assert_eq!(out, "");
    assert_eq!(errors, vec!["[line 2] Error at ';': Expect ')' after expression."]);
}

#[test]
fn static_errors_are_flagged_as_static() {
    let mut out: Vec<u8> = Vec::new();
    let errors = rox::run("return;", Box::new(&mut out)).unwrap_err();

    assert!(errors.iter().all(LoxError::is_static));
    assert!(matches!(errors[0], LoxError::Resolve { line: 1, .. }));
}
