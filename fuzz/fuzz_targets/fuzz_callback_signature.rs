#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiftline::line::verify;

#[derive(Arbitrary, Debug)]
struct Input {
    secret: Vec<u8>,
    signature: String,
    body: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let _ = verify(&input.body, &input.signature, &input.secret);
});
