use mysql_pg::test_conversion;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("mysql_pg=info".parse().expect("a directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    for line in std::io::stdin().lines() {
        let line = line.expect("a line");
        if line.trim().is_empty() {
            continue;
        }
        let now = std::time::Instant::now();
        let res = test_conversion(&line);
        print!("[in {}μs] ", now.elapsed().as_micros());
        match res {
            Err(e) => println!("Error converting input: {e}"),
            Ok(res) => {
                println!("{}", res.converted);
                for warning in res.warnings {
                    println!("  {warning}");
                }
            }
        }
    }
}
