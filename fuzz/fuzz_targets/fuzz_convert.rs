#![no_main]
use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;

#[derive(Debug)]
pub struct QueryInput {
    pub sql: String,
    pub params: Vec<u32>,
}

impl<'a> Arbitrary<'a> for QueryInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let sql = random_query_string(u)?;
        let params = u.arbitrary()?;
        Ok(QueryInput { sql, params })
    }
}

const MAX_QUERY_LENGTH: usize = 10000;

fn random_query_string(u: &mut arbitrary::Unstructured) -> arbitrary::Result<String> {
    let s: String = u.arbitrary()?;
    Ok(s.chars().take(MAX_QUERY_LENGTH).collect())
}

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = arbitrary::Unstructured::new(data).arbitrary::<QueryInput>() {
        mysql_pg::fuzz_helper::convert_text(&input.sql);
        mysql_pg::fuzz_helper::convert_with_params(&input.sql, &input.params);
    }
});
