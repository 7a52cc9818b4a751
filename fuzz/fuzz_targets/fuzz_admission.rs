#![no_main]

use furrow::script::{Allowlist, compile};
use libfuzzer_sys::fuzz_target;

// Admission must reject or accept any text without panicking, and every
// rejection must point inside the source.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Err(err) = compile(source, &Allowlist::default()) {
        assert!(err.line >= 1);
        assert!(err.line <= source.lines().count().max(1) + 1);
        let rendered = err.to_string();
        assert!(rendered.starts_with("Syntax Error:\nLine "));
    }
});
