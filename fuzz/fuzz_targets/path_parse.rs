#![no_main]

use std::str::FromStr;

use dfs_marmot::Path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(path) = Path::from_str(text) {
        // A parsed path must survive its own string form.
        let reparsed = Path::from_str(&path.to_string()).expect("display form parses");
        assert_eq!(reparsed, path);
    }
});
