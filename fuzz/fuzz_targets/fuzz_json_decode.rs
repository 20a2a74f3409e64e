#![no_main]

use libfuzzer_sys::fuzz_target;

use galaxy_fetch::json::{decode, decode_strict};

fuzz_target!(|data: &str| {
    let _ = decode(data);
    let _ = decode_strict(data);
});
