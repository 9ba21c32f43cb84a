use sql_shim::prelude::*;

#[test]
fn lenient_extraction_properties() {
    let stmt = parse("SELECT * FROM products WHERE id = ?", &[Scalar::Int(7)]);
    assert_eq!(stmt.operation, Operation::Select);
    assert_eq!(stmt.table.as_deref(), Some("products"));
    assert_eq!(
        stmt.filters,
        [("id", Scalar::Int(7))].into_iter().collect::<ColumnValues>()
    );

    let stmt = parse("SELECT name, price FROM products", &[]);
    assert_eq!(stmt.select, "name, price");

    let stmt = parse(
        "INSERT INTO products (name, price) VALUES (?, ?)",
        &["Foo".into(), Scalar::Int(100)],
    );
    assert_eq!(stmt.values.get("name"), Some(&Scalar::from("Foo")));
    assert_eq!(stmt.values.get("price"), Some(&Scalar::Int(100)));

    let stmt = parse("DELETE FROM users WHERE id = ?", &[Scalar::Int(3)]);
    assert_eq!(stmt.table.as_deref(), Some("users"));
    assert_eq!(stmt.operation, Operation::Delete);
}

#[test]
fn lenient_binds_what_it_can() {
    let stmt = parse(
        "INSERT INTO products (name, price, stock) VALUES (?, ?, ?)",
        &["Foo".into(), Scalar::Int(100)],
    );
    let columns: Vec<&str> = stmt.values.columns().collect();
    assert_eq!(columns, vec!["name", "price"]);

    for sql in ["merge into t using u", "WITH x AS (SELECT 1) SELECT * FROM x", ""] {
        assert_eq!(parse(sql, &[]).operation, Operation::Select, "{sql}");
    }
    assert_eq!(parse("uPdAtE t SET a = 1", &[]).operation, Operation::Update);
}

#[test]
fn parsing_is_pure() {
    let sql = "UPDATE orders SET status = ? WHERE id = ?";
    let params = ["paid".into(), Scalar::Int(4)];
    assert_eq!(parse(sql, &params), parse(sql, &params));
    assert_eq!(parse_strict(sql, &params).ok(), parse_strict(sql, &params).ok());
}

#[test]
fn strict_mode_rejects_what_lenient_tolerates() {
    let cases: [(&str, Vec<Scalar>); 4] = [
        ("MERGE INTO t USING u ON t.id = u.id", vec![]),
        ("SELECT * FROM t WHERE a = ? AND b = ?", vec![Scalar::Int(1), Scalar::Int(2)]),
        ("INSERT INTO t (a, b) VALUES (?, ?)", vec![Scalar::Int(1)]),
        ("DELETE FROM t WHERE id = ?", vec![Scalar::Int(1), Scalar::Int(2)]),
    ];
    for (sql, params) in &cases {
        assert!(parse_strict(sql, params).is_err(), "{sql}");
        assert!(ParseMode::Lenient.parse(sql, params).is_ok(), "{sql}");
    }

    assert!(matches!(
        parse_strict("MERGE INTO t USING u ON t.id = u.id", &[]),
        Err(SqlShimError::UnrecognizedStatement(_))
    ));
    assert!(matches!(
        parse_strict("INSERT INTO t (a, b) VALUES (?, ?)", &[Scalar::Int(1)]),
        Err(SqlShimError::ArityMismatch(_))
    ));
    assert!(matches!(
        parse_strict("DELETE FROM t WHERE id = ?99999999999999999999", &[Scalar::Int(1)]),
        Err(SqlShimError::SyntaxError { position: 25, .. })
    ));
}

#[test]
fn strict_mode_understands_order_and_limit() -> Result<(), Box<dyn std::error::Error>> {
    let stmt = parse_strict(
        "select name from products where category = ? order by price desc, name limit 3;",
        &["lamps".into()],
    )?;
    assert_eq!(stmt.order_by, vec![OrderBy::desc("price"), OrderBy::asc("name")]);
    assert_eq!(stmt.limit, Some(3));
    assert_eq!(stmt.selected_columns(), Some(vec!["name".to_string()]));
    Ok(())
}

#[test]
fn descriptors_serialize_for_explain_output() -> Result<(), Box<dyn std::error::Error>> {
    let stmt = parse("DELETE FROM users WHERE id = ?", &[Scalar::Int(3)]);
    let json = serde_json::to_value(&stmt)?;
    assert_eq!(json["table"], "users");
    assert_eq!(json["filters"]["id"], 3);
    Ok(())
}
