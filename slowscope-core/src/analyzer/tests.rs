//! Unit tests for the SQL structural analyzer.

use super::*;
use crate::models::{FieldRef, FieldUsage, SortDirection};

fn columns(fields: &[FieldRef]) -> Vec<&str> {
    fields.iter().map(|f| f.column.as_str()).collect()
}

fn usages(fields: &[FieldRef]) -> Vec<FieldUsage> {
    fields.iter().map(|f| f.usage).collect()
}

// =============================================================================
// Table Extraction Tests
// =============================================================================

#[test]
fn test_extract_table_single_from() {
    assert_eq!(
        extract_table("SELECT * FROM users WHERE id = 1").as_deref(),
        Some("users")
    );
}

#[test]
fn test_extract_table_first_table_of_join() {
    let sql = "SELECT o.id FROM orders o JOIN users u ON o.user_id = u.id";
    assert_eq!(extract_table(sql).as_deref(), Some("orders"));
}

#[test]
fn test_extract_table_strips_quotes_and_database() {
    let sql = "SELECT * FROM `shop`.`orders` WHERE `order` = 1";
    assert_eq!(extract_table(sql).as_deref(), Some("orders"));

    let shape = analyze(sql).unwrap();
    assert_eq!(shape.database.as_deref(), Some("shop"));
    assert_eq!(columns(&shape.fields), vec!["order"]);
}

#[test]
fn test_extract_table_ignores_subquery_from() {
    let sql = "SELECT * FROM orders WHERE user_id IN (SELECT id FROM users WHERE vip = 1)";
    assert_eq!(extract_table(sql).as_deref(), Some("orders"));
}

#[test]
fn test_extract_table_derived_table_is_unresolved() {
    let sql = "SELECT * FROM (SELECT id FROM users) AS x WHERE x.id = 1";
    assert_eq!(extract_table(sql), None);
    assert!(analyze(sql).is_none());
}

#[test]
fn test_extract_table_without_from() {
    assert_eq!(extract_table("SELECT 1"), None);
    assert_eq!(extract_table(""), None);
    assert_eq!(extract_table("SELECT * FROM WHERE"), None);
}

#[test]
fn test_extract_table_malformed_input_does_not_panic() {
    assert_eq!(extract_table("SELECT * FROM t WHERE a = 'unterminated"), None);
    assert!(extract_where_fields("((((").is_empty());
    assert!(extract_order_by_fields("ORDER BY").is_empty());
}

#[test]
fn test_extract_table_write_statement_targets() {
    assert_eq!(
        extract_table("UPDATE accounts SET balance = balance - 1 WHERE id = 7").as_deref(),
        Some("accounts")
    );
    assert_eq!(
        extract_table("DELETE FROM sessions WHERE expires_at < NOW()").as_deref(),
        Some("sessions")
    );
    assert_eq!(
        extract_table("INSERT INTO audit_log (id, msg) VALUES (1, 'x')").as_deref(),
        Some("audit_log")
    );
}

#[test]
fn test_extract_table_through_explain() {
    assert_eq!(
        extract_table("EXPLAIN SELECT * FROM t WHERE a = 1").as_deref(),
        Some("t")
    );
}

#[test]
fn test_extract_table_aliases() {
    let aliases =
        extract_table_aliases("SELECT * FROM orders AS o LEFT JOIN users u USING (user_id)");
    assert_eq!(aliases.get("o").map(String::as_str), Some("orders"));
    assert_eq!(aliases.get("u").map(String::as_str), Some("users"));
    assert_eq!(aliases.get("orders").map(String::as_str), Some("orders"));
}

// =============================================================================
// WHERE Field Tests
// =============================================================================

#[test]
fn test_where_fields_equality() {
    let fields = extract_where_fields("SELECT * FROM users WHERE id=1 AND name='test'");
    assert_eq!(columns(&fields), vec!["id", "name"]);
    assert_eq!(usages(&fields), vec![FieldUsage::Equality, FieldUsage::Equality]);
}

#[test]
fn test_where_fields_range_operators() {
    let sql = "SELECT * FROM t WHERE status IN (1,2) \
               AND created BETWEEN '2024-01-01' AND '2024-02-01' \
               OR name LIKE 'a%' AND deleted_at IS NULL AND archived_at IS NOT NULL";
    let fields = extract_where_fields(sql);
    assert_eq!(
        columns(&fields),
        vec!["status", "created", "name", "deleted_at", "archived_at"]
    );
    assert_eq!(
        usages(&fields),
        vec![
            FieldUsage::Range,
            FieldUsage::Range,
            FieldUsage::Range,
            FieldUsage::Equality,
            FieldUsage::Range,
        ]
    );
}

#[test]
fn test_where_fields_inequalities_are_range() {
    let fields = extract_where_fields("SELECT * FROM t WHERE a <> 1 AND b != 2 AND c >= 3");
    assert_eq!(usages(&fields), vec![FieldUsage::Range; 3]);
}

#[test]
fn test_where_fields_literal_on_left() {
    let fields = extract_where_fields("SELECT * FROM t WHERE 5 < age AND 'x' = code");
    assert_eq!(columns(&fields), vec!["age", "code"]);
    assert_eq!(usages(&fields), vec![FieldUsage::Range, FieldUsage::Equality]);
}

#[test]
fn test_where_fields_skip_column_comparisons() {
    let fields = extract_where_fields("SELECT * FROM a, b WHERE a.x = b.y AND a.z = 3");
    assert_eq!(columns(&fields), vec!["z"]);
    assert_eq!(fields[0].table.as_deref(), Some("a"));
}

#[test]
fn test_where_fields_skip_subqueries_and_function_arguments() {
    let sql = "SELECT * FROM orders WHERE user_id IN (SELECT id FROM users WHERE vip = 1) \
               AND DATE(created_at) = '2024-01-01' AND total > 100";
    let fields = extract_where_fields(sql);
    assert_eq!(columns(&fields), vec!["user_id", "total"]);
}

#[test]
fn test_where_fields_parenthesized_or() {
    let fields = extract_where_fields("SELECT * FROM t WHERE (a = 1 OR b > 2) AND c = 3");
    assert_eq!(columns(&fields), vec!["a", "b", "c"]);
    assert_eq!(
        usages(&fields),
        vec![FieldUsage::Equality, FieldUsage::Range, FieldUsage::Equality]
    );
}

#[test]
fn test_where_fields_placeholders_count_as_values() {
    let fields = extract_where_fields("SELECT * FROM t WHERE tenant_id = ? AND score > ?");
    assert_eq!(columns(&fields), vec!["tenant_id", "score"]);
}

#[test]
fn test_where_fields_resolve_aliases() {
    let sql = "SELECT * FROM orders o JOIN users u ON o.user_id = u.id WHERE u.status = 'active'";
    let fields = extract_where_fields(sql);
    assert_eq!(columns(&fields), vec!["status"]);
    assert_eq!(fields[0].table.as_deref(), Some("users"));
}

#[test]
fn test_where_fields_update_statement() {
    let fields = extract_where_fields("UPDATE accounts SET balance = 0 WHERE id = 7");
    assert_eq!(columns(&fields), vec!["id"]);
}

// =============================================================================
// JOIN Field Tests
// =============================================================================

#[test]
fn test_join_fields_on_clause() {
    let sql = "SELECT o.id FROM orders o JOIN users u ON o.user_id = u.id";
    let fields = extract_join_fields(sql);
    assert_eq!(columns(&fields), vec!["user_id", "id"]);
    assert_eq!(fields[0].table.as_deref(), Some("orders"));
    assert_eq!(fields[1].table.as_deref(), Some("users"));
    assert!(fields.iter().all(|f| f.usage == FieldUsage::Join));
}

#[test]
fn test_join_fields_multiple_joins() {
    let sql = "SELECT * FROM a \
               INNER JOIN b ON a.id = b.a_id \
               LEFT OUTER JOIN c ON b.id = c.b_id AND c.kind = 2";
    let fields = extract_join_fields(sql);
    assert_eq!(columns(&fields), vec!["id", "a_id", "id", "b_id"]);
    let tables: Vec<_> = fields.iter().map(|f| f.table.as_deref()).collect();
    assert_eq!(tables, vec![Some("a"), Some("b"), Some("b"), Some("c")]);
}

#[test]
fn test_join_fields_using_clause() {
    let fields = extract_join_fields("SELECT * FROM orders o JOIN users u USING (user_id)");
    assert_eq!(columns(&fields), vec!["user_id", "user_id"]);
    assert_eq!(fields[0].table.as_deref(), Some("orders"));
    assert_eq!(fields[1].table.as_deref(), Some("users"));
}

#[test]
fn test_join_fields_none_without_join() {
    assert!(extract_join_fields("SELECT * FROM t WHERE a = 1").is_empty());
}

// =============================================================================
// ORDER BY Field Tests
// =============================================================================

#[test]
fn test_order_by_fields_direction() {
    let fields = extract_order_by_fields("SELECT * FROM t ORDER BY a DESC, b, c ASC LIMIT 10");
    assert_eq!(columns(&fields), vec!["a", "b", "c"]);
    let directions: Vec<_> = fields.iter().map(|f| f.direction).collect();
    assert_eq!(
        directions,
        vec![
            Some(SortDirection::Descending),
            Some(SortDirection::Ascending),
            Some(SortDirection::Ascending),
        ]
    );
}

#[test]
fn test_order_by_ignores_ordinals_and_subqueries() {
    let sql = "SELECT a FROM t WHERE id IN (SELECT id FROM s ORDER BY x) ORDER BY 1, created_at";
    let fields = extract_order_by_fields(sql);
    assert_eq!(columns(&fields), vec!["created_at"]);
}

// =============================================================================
// Priority Tests
// =============================================================================

#[test]
fn test_reference_scenario() {
    let sql = "SELECT * FROM users WHERE id=1 AND name='test' ORDER BY created_at";

    assert_eq!(extract_table(sql).as_deref(), Some("users"));

    let where_fields = extract_where_fields(sql);
    assert_eq!(columns(&where_fields), vec!["id", "name"]);
    assert!(where_fields.iter().all(|f| f.usage == FieldUsage::Equality));

    let order = extract_order_by_fields(sql);
    assert_eq!(columns(&order), vec!["created_at"]);
    assert_eq!(order[0].direction, Some(SortDirection::Ascending));

    let shape = analyze(sql).unwrap();
    assert_eq!(columns(&shape.ranked_fields()), vec!["id", "name", "created_at"]);
    assert_eq!(shape.literals, vec!["1".to_string(), "'test'".to_string()]);
}

#[test]
fn test_priority_tiers_are_stable() {
    let fields = vec![
        FieldRef::new("sorted", FieldUsage::OrderBy, 1),
        FieldRef::new("joined", FieldUsage::Join, 2),
        FieldRef::new("ranged", FieldUsage::Range, 3),
        FieldRef::new("second_eq", FieldUsage::Equality, 9),
        FieldRef::new("first_eq", FieldUsage::Equality, 4),
    ];
    let ranked = sort_fields_by_priority(&fields, "");
    assert_eq!(
        columns(&ranked),
        vec!["first_eq", "second_eq", "ranged", "joined", "sorted"]
    );
}

#[test]
fn test_priority_keeps_best_tier_once() {
    let sql = "SELECT * FROM t WHERE status = 1 ORDER BY status, id";
    let shape = analyze(sql).unwrap();
    let ranked = shape.ranked_fields();
    assert_eq!(columns(&ranked), vec!["status", "id"]);
    assert_eq!(usages(&ranked), vec![FieldUsage::Equality, FieldUsage::OrderBy]);
}

#[test]
fn test_priority_drops_fields_missing_from_sql() {
    let fields = vec![
        FieldRef::new("id", FieldUsage::Equality, 0),
        FieldRef::new("ghost", FieldUsage::Equality, 1),
    ];
    let ranked = sort_fields_by_priority(&fields, "select * from t where id = 1");
    assert_eq!(columns(&ranked), vec!["id"]);
}

#[test]
fn test_priority_joined_query() {
    let sql = "SELECT o.id FROM orders o JOIN users u ON o.user_id = u.id \
               WHERE u.status = 'active' AND o.total > 10 ORDER BY o.created_at DESC";
    let shape = analyze(sql).unwrap();
    assert_eq!(shape.table.as_deref(), Some("orders"));
    assert_eq!(
        columns(&shape.ranked_fields()),
        vec!["status", "total", "user_id", "id", "created_at"]
    );
}

fn qualified(fields: &[FieldRef]) -> Vec<(Option<&str>, &str, FieldUsage)> {
    fields
        .iter()
        .map(|f| (f.table.as_deref(), f.column.as_str(), f.usage))
        .collect()
}

#[test]
fn test_priority_keeps_same_column_of_different_tables() {
    let shape = analyze("SELECT * FROM a JOIN b ON a.id = b.id WHERE b.id = 5").unwrap();
    assert_eq!(
        qualified(&shape.ranked_fields()),
        vec![
            (Some("b"), "id", FieldUsage::Equality),
            (Some("a"), "id", FieldUsage::Join),
        ]
    );
}

#[test]
fn test_priority_keeps_order_by_column_of_joined_table() {
    let sql = "SELECT * FROM orders o JOIN users u ON o.user_id = u.id \
               WHERE o.id = 1 ORDER BY u.name";
    let ranked = analyze(sql).unwrap().ranked_fields();
    assert_eq!(
        qualified(&ranked),
        vec![
            (Some("orders"), "id", FieldUsage::Equality),
            (Some("orders"), "user_id", FieldUsage::Join),
            (Some("users"), "id", FieldUsage::Join),
            (Some("users"), "name", FieldUsage::OrderBy),
        ]
    );
}

#[test]
fn test_unqualified_columns_belong_to_single_table() {
    let shape = analyze("SELECT * FROM users u WHERE id = 1 ORDER BY u.id").unwrap();
    let ranked = shape.ranked_fields();
    assert_eq!(qualified(&ranked), vec![(Some("users"), "id", FieldUsage::Equality)]);

    let fields = extract_where_fields("SELECT * FROM a, b WHERE x = 1");
    assert_eq!(fields[0].table, None);
}

// =============================================================================
// Read-only Classification Tests
// =============================================================================

#[test]
fn test_is_read_only_accepts_reads() {
    assert!(is_read_only("SELECT * FROM t"));
    assert!(is_read_only("  select 1;"));
    assert!(is_read_only("SHOW INDEX FROM t"));
    assert!(is_read_only("DESC t"));
    assert!(is_read_only("EXPLAIN SELECT * FROM t WHERE a = 1"));
    assert!(is_read_only("EXPLAIN ANALYZE SELECT * FROM t"));
}

#[test]
fn test_is_read_only_rejects_writes_and_locks() {
    assert!(!is_read_only("DELETE FROM t"));
    assert!(!is_read_only("UPDATE t SET a = 1"));
    assert!(!is_read_only("INSERT INTO t VALUES (1)"));
    assert!(!is_read_only("DROP TABLE t"));
    assert!(!is_read_only("SELECT * FROM t FOR UPDATE"));
    assert!(!is_read_only("SELECT * FROM t LOCK IN SHARE MODE"));
    assert!(!is_read_only("SELECT * INTO OUTFILE '/tmp/x' FROM t"));
    assert!(!is_read_only("SELECT 1; DROP TABLE t"));
    assert!(!is_read_only("EXPLAIN ANALYZE DELETE FROM t"));
    assert!(!is_read_only(""));
}
