#![no_main]

use std::io::Cursor;

use dfs_marmot::wire::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut src = Cursor::new(data);
    if let Ok(fault) = decode::error(&mut src) {
        // Whatever decodes must re-encode to the same fault.
        let mut out = Vec::new();
        encode::error(&mut out, &fault).expect("encode into a buffer");
        let mut src = Cursor::new(&out[..]);
        assert_eq!(decode::error(&mut src).expect("re-decode"), fault);
    }
});
