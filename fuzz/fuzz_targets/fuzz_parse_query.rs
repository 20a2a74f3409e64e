#![no_main]

use libfuzzer_sys::fuzz_target;

use galaxy_fetch::url::{parse_query, stringify_query};

fuzz_target!(|data: &str| {
    let query = parse_query(data);
    assert!(!query.contains_key("__proto__"));
    assert!(!query.contains_key("constructor"));

    let _ = parse_query(&stringify_query(&query));
});
