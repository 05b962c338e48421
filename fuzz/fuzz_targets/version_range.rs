#![no_main]

use foresight_checker::VersionRange;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    // "<제약>\n<버전>" 형태로 나눕니다.
    let (constraint, target) = input.split_once('\n').unwrap_or((input, "v5.0.1"));
    let _ = VersionRange::new(constraint).contains(target);
});
