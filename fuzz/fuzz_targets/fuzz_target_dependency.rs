#![no_main]

use dpkg_suite::dependency::Dependency;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = data.parse::<Dependency>();
});
