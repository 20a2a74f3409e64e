#![no_main]

use libfuzzer_sys::fuzz_target;

use galaxy_fetch::url::{parse_url, with_trailing_slash, without_trailing_slash};

fuzz_target!(|data: &str| {
    let parsed = parse_url(data, None);
    let _ = parse_url(&parsed.to_string(), None);

    assert!(!without_trailing_slash(data, true).is_empty());
    let with = with_trailing_slash(data, false);
    assert_eq!(with_trailing_slash(&with, false), with);
});
