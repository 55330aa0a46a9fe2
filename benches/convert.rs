use criterion::{Criterion, criterion_group, criterion_main};
use mysql_pg::{Value, convert};

const REPORT: &str = "SELECT u.`dept`,
       GROUP_CONCAT(DISTINCT u.name ORDER BY u.name SEPARATOR ', ') AS names,
       IFNULL(SUM(o.total), 0) AS revenue,
       DATE_FORMAT(o.created_at, '%Y-%m') AS month
  FROM users u
  LEFT JOIN orders o ON o.user_id = u.id AND o.is_paid = 1
 WHERE u.active = 1 AND u.created_at > DATE_SUB(NOW(), INTERVAL ? MONTH)
 GROUP BY u.`dept`, month
 HAVING revenue > ?
 ORDER BY month DESC, revenue DESC
 LIMIT ?, ?";

const SIMPLE: &str = "SELECT id, name FROM users WHERE email = ? AND is_active = 1";

fn criterion_benchmark(c: &mut Criterion) {
    let params = [
        Value::Int(6),
        Value::Int(1000),
        Value::Int(0),
        Value::Int(50),
    ];
    c.bench_function("convert report query", |b| {
        b.iter(|| convert(REPORT, &params).expect("converts"))
    });
    c.bench_function("convert simple query", |b| {
        b.iter(|| convert(SIMPLE, &params[..1]).expect("converts"))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
