#![no_main]

use foresight_checker::RuleSpec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // TOML 파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(toml_str) = std::str::from_utf8(data) {
        if let Ok(spec) = RuleSpec::parse_toml(toml_str, "fuzz-input.toml") {
            let _ = spec.filter_on_version("v5.0.1");
        }
    }
});
