// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use trust_root::{new_transparency_log, verify_log, RsaPadding};

fuzz_target!(|data: &[u8]| {
    let start = DateTime::<Utc>::UNIX_EPOCH;
    if let Ok(log) = new_transparency_log(data, start, None, "", RsaPadding::Pss) {
        assert!(verify_log(&log).is_valid());
    }
});
