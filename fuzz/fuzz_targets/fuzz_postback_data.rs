#![no_main]

use libfuzzer_sys::fuzz_target;
use shiftline::dispatch::PostbackIntent;

fuzz_target!(|data: &str| {
    let _ = PostbackIntent::parse(data);
});
