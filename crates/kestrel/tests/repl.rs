//! Interactive session behavior: state persists across submissions and
//! failures leave earlier bindings intact.

use kestrel::{Literal, ReplSession};

#[test]
fn session_state_persists_across_submissions() {
    let mut session = ReplSession::new();
    assert_eq!(session.execute("x = 10").unwrap(), Literal::Nil);
    assert_eq!(session.execute("y = x*2").unwrap(), Literal::Nil);
    assert_eq!(session.execute("x+y").unwrap(), Literal::Int(30));
    assert_eq!(session.global("y").unwrap(), Literal::Int(20));
}

#[test]
fn submissions_may_hold_several_forms() {
    let mut session = ReplSession::new();
    assert_eq!(session.execute("a = 1; b = 2; a+b").unwrap(), Literal::Int(3));
}

#[test]
fn errors_do_not_poison_the_session() {
    let mut session = ReplSession::new();
    session.execute("x = 10").unwrap();
    assert!(session.execute("x+missing").is_err());
    assert_eq!(session.execute("x+1").unwrap(), Literal::Int(11));
}

/// A re-assign whose right-hand side fails to compile must not disturb
/// the installed binding.
#[test]
fn failed_reassign_preserves_the_old_binding() {
    let mut session = ReplSession::new();
    session.execute("x = 10").unwrap();
    assert!(session.execute("x = missing").is_err());
    assert_eq!(session.execute("x").unwrap(), Literal::Int(10));
}

/// Error positions name the submission they came from.
#[test]
fn submission_positions_are_numbered() {
    let mut session = ReplSession::new();
    session.execute("1").unwrap();
    let err = session.execute("?").unwrap_err();
    assert!(err.to_string().contains("<repl:2>"), "{err}");
}

#[test]
fn recursive_definitions_work_interactively() {
    let mut session = ReplSession::new();
    session.execute(r"fact = \n -> if n (n * fact (n-1)) 1").unwrap();
    assert_eq!(session.execute("fact 10").unwrap(), Literal::Int(3_628_800));
}
