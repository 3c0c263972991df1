//! Statement guard integration tests.
//!
//! Exercises the read-only policy through the public API.

use querygate::safety::{RejectionReason, StatementGuard, Verdict, BANNED_SUBSTRINGS};

#[test]
fn test_approved_statements_start_with_select_and_contain_no_banned_word() {
    let guard = StatementGuard::new();
    let samples = [
        "SELECT 1",
        "   select * from customers",
        "SELECT customerName FROM customers LIMIT 5",
        "select count(*) from orders where status = 'Shipped'",
        "SELECT a.id FROM a JOIN b ON a.id = b.a_id",
        "DROP TABLE customers",
        "select updated_at from t",
        "insert into t values (1)",
        "SELECT * FROM t; DELETE FROM t",
        "",
        "explain select 1",
    ];

    for sql in samples {
        let guarded = guard.inspect(sql);
        if guarded.is_approved() {
            let lowered = sql.trim().to_lowercase();
            assert!(lowered.starts_with("select"), "{sql}");
            assert!(
                BANNED_SUBSTRINGS.iter().all(|kw| !lowered.contains(kw)),
                "{sql}"
            );
        } else {
            assert!(guarded.rejection().is_some());
        }
    }
}

#[test]
fn test_verdict_is_deterministic() {
    let guard = StatementGuard::new();
    for sql in ["SELECT 1", "select created_at from t", "show tables"] {
        assert_eq!(guard.inspect(sql), guard.inspect(sql));
    }
}

#[test]
fn test_known_false_positive_is_preserved() {
    let guarded = StatementGuard::new().inspect("SELECT updated_by FROM audit_log");
    assert_eq!(
        guarded.verdict(),
        Verdict::Rejected(RejectionReason::ForbiddenKeyword("update"))
    );
}

#[test]
fn test_approved_statement_keeps_original_text() {
    let sql = "  SELECT name FROM t  ";
    let approved = StatementGuard::new().approve(sql).unwrap();
    assert_eq!(approved.sql(), sql);
}
