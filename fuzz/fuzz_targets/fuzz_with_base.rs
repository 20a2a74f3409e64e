#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use galaxy_fetch::url::{with_base, with_query, Query};

#[derive(Debug, Arbitrary)]
struct Input {
    base: String,
    path: String,
    params: Vec<(String, String)>,
}

fuzz_target!(|input: Input| {
    let url = with_base(&input.path, &input.base);
    let query: Query = input.params.into_iter().collect();
    let _ = with_query(&url, &query);
});
