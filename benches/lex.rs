use criterion::{Criterion, criterion_group, criterion_main};

const TESTS: [&str; 6] = [
    "SELECT * FROM t WHERE id = ?",
    "SELECT `u`.`name`, 'it''s', \"dq \\\" text\" FROM users u -- trailing",
    "SELECT DATE_FORMAT(created_at, '%Y-%m-%d %H:%i') AS day, COUNT(*) FROM t GROUP BY day",
    "SELECT GROUP_CONCAT(DISTINCT tag ORDER BY tag SEPARATOR ', ') FROM tags /* block */ # hash",
    "SELECT TIMESTAMPDIFF(MONTH, a.created, COALESCE(a.closed, NOW())) FROM accounts a",
    "INSERT IGNORE INTO t (a, b, c) VALUES (1, 2.5, .5), (?, ?, ?)",
];

fn lex_queries() {
    use mysql_pg::lex::Lexer;
    // we'll track the number of tokens seen to ensure that the loop below doesn't
    //  get optimized out
    let mut num_tokens: u64 = 0;
    for test in TESTS {
        let mut lexer = Lexer::new(test);
        loop {
            match lexer.next_token() {
                Ok(Some(_)) => num_tokens += 1,
                Ok(None) => break,
                Err(e) => panic!("Unexpected: {e}"),
            }
        }
    }
    assert!(num_tokens > 0);
}

fn mask_queries() {
    for test in TESTS {
        let masked = mysql_pg::mask::mask(test).expect("maskable");
        std::hint::black_box(masked.unmask(&masked.text));
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lex some queries", |b| b.iter(lex_queries));
    c.bench_function("mask some queries", |b| b.iter(mask_queries));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
