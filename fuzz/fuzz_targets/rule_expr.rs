#![no_main]

use foresight_checker::{Context, Program};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // 컴파일된 프로그램은 빈 컨텍스트에서도 패닉 없이 끝나야 합니다.
        if let Ok(program) = Program::compile(source) {
            let _ = program.execute(&Context::new());
        }
    }
});
