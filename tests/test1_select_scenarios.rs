mod common;

use sql_loom::prelude::*;

use common::{posts, users};

fn students_courses() -> (std::sync::Arc<ModelMeta>, Association) {
    let students = ModelMeta::new("students", "students")
        .attribute(AttributeMeta::id("id"))
        .attribute(AttributeMeta::new("name", DataType::String(None)))
        .into_shared();
    let courses = ModelMeta::new("courses", "courses")
        .attribute(AttributeMeta::id("id"))
        .attribute(AttributeMeta::new("name", DataType::String(None)))
        .into_shared();
    let enrollments = ModelMeta::new("enrollments", "enrollments")
        .attribute(AttributeMeta::new("student_id", DataType::Integer))
        .attribute(AttributeMeta::new("course_id", DataType::Integer))
        .into_shared();
    let association = Association::belongs_to_many(
        students.clone(),
        courses,
        enrollments,
        "student_id",
        "course_id",
    );
    (students, association)
}

#[test]
fn paginated_users_with_posts_limit_only_the_user_scan() {
    let users = users();
    let options = SelectOptions::new()
        .attributes(["id", "name", "email"])
        .include(Include::new(Association::has_many(users.clone(), posts(), "user_id")))
        .order(OrderItem::column("id"))
        .limit(10);
    let sql = QueryGenerator::new(Dialect::Oracle)
        .select_query(&users.table, &options, Some(&users))
        .unwrap();

    let (outer, inner) = sql.split_once("FROM (").unwrap();
    assert!(outer.starts_with("SELECT \"users\".*, \"posts\".\"id\" \"posts.id\""));
    assert!(inner.contains(
        "SELECT \"users\".\"id\", \"users\".\"name\", \"users\".\"email\" FROM \"users\" \"users\" ORDER BY \"users\".\"id\")t )t2 WHERE t2.ROWNUM_1 <=10) \"users\""
    ), "{sql}");

    // posts are joined once, outside the limited scan
    let after_subquery = sql.rsplit_once(") \"users\"").unwrap().1;
    assert!(after_subquery.starts_with(
        " LEFT OUTER JOIN \"posts\" \"posts\" ON \"users\".\"id\" = \"posts\".\"user_id\""
    ));
    assert_eq!(sql.matches("JOIN \"posts\"").count(), 1);
    assert_eq!(sql.matches("ROWNUM ROWNUM_1").count(), 1);
    assert!(sql.ends_with("ORDER BY \"users\".\"id\""));
}

#[test]
fn offsets_use_a_rownum_window() {
    let users = users();
    let options = SelectOptions::new()
        .include(Include::new(Association::has_many(users.clone(), posts(), "user_id")))
        .order(OrderItem::column("id"))
        .limit(10)
        .offset(20);
    let sql = QueryGenerator::new(Dialect::Oracle)
        .select_query(&users.table, &options, Some(&users))
        .unwrap();
    assert!(sql.contains("WHERE t2.ROWNUM_1 BETWEEN 21 AND 30) \"users\""), "{sql}");
}

#[test]
fn required_course_filter_becomes_a_correlated_exists() {
    let (students, association) = students_courses();
    let options = SelectOptions::new()
        .include(
            Include::new(association)
                .required(true)
                .filter(Predicate::eq("name", "Databases")),
        )
        .order(OrderItem::column("id"))
        .limit(5);
    let sql = QueryGenerator::new(Dialect::Oracle)
        .select_query(&students.table, &options, Some(&students))
        .unwrap();

    let inner_end = sql.find("ROWNUM_1 <=5").unwrap();
    let exists_at = sql.find("WHERE EXISTS (SELECT").expect("exists subquery in the inner WHERE");
    assert!(exists_at < inner_end, "{sql}");
    assert!(sql.contains(
        "FROM \"enrollments\" \"courses.enrollments\" INNER JOIN \"courses\" \"courses\" \
         ON \"courses\".\"id\" = \"courses.enrollments\".\"course_id\" AND \"courses\".\"name\" = 'Databases' \
         WHERE \"students\".\"id\" = \"courses.enrollments\".\"student_id\")"
    ), "{sql}");
    // the join is still emitted, outside the limited scan
    assert!(sql[inner_end..].contains("INNER JOIN \"courses\" \"courses\""));
}

#[test]
fn unpaginated_queries_rely_on_the_join() {
    let (students, association) = students_courses();
    let options = SelectOptions::new().include(
        Include::new(association)
            .required(true)
            .filter(Predicate::eq("name", "Databases")),
    );
    let sql = QueryGenerator::new(Dialect::Postgres)
        .select_query(&students.table, &options, Some(&students))
        .unwrap();
    assert!(!sql.contains("EXISTS"));
    assert!(!sql.contains("ROWNUM"));
}

#[test]
fn every_dialect_compiles_deterministically() {
    let users = users();
    let options = SelectOptions::new()
        .attributes(["name"])
        .filter(Predicate::attr("email", Condition::Like("%@example.com".into())))
        .include(
            Include::new(Association::has_many(users.clone(), posts(), "user_id"))
                .attributes(["title"])
                .required(true),
        )
        .order(OrderItem::column("name").desc())
        .limit(3)
        .offset(6)
        .lock(Lock::update());
    for dialect in [Dialect::Postgres, Dialect::Sqlite, Dialect::Mysql, Dialect::Oracle] {
        let generator = QueryGenerator::new(dialect);
        let first = generator.select_query(&users.table, &options, Some(&users)).unwrap();
        let second = generator.select_query(&users.table, &options, Some(&users)).unwrap();
        assert_eq!(first, second, "{dialect:?}");
    }
}

#[test]
fn star_defaults() {
    let users = users();
    let generator = QueryGenerator::new(Dialect::Mysql);
    let plain = generator
        .select_query(&users.table, &SelectOptions::new(), None)
        .unwrap();
    assert_eq!(plain, "SELECT * FROM `users`");

    let joined = generator
        .select_query(
            &users.table,
            &SelectOptions::new().include(
                Include::new(Association::has_many(users.clone(), posts(), "user_id")).attributes(["id"]),
            ),
            Some(&users),
        )
        .unwrap();
    assert!(joined.starts_with("SELECT `users`.*, `posts`.`id` `posts.id` FROM `users` `users`"));
}
