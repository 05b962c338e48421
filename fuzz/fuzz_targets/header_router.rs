#![no_main]

use foresight_log_search::FormatRouter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(router) = FormatRouter::with_defaults() else {
        return;
    };
    // 감지된 형식으로 다시 파싱해도 같은 결과여야 합니다.
    if let Some((idx, header)) = router.detect(data) {
        let again = router.parse_with(idx, data).expect("detected format must parse");
        assert_eq!(header.time, again.time);
    }
});
