#![no_main]

use dpkg_suite::splitformat::read_part;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let _ = read_part(Cursor::new(data), data.len() as u64);
});
