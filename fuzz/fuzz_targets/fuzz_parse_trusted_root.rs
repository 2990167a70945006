// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use libfuzzer_sys::fuzz_target;
use trust_root::{verify_trusted_root, TrustedRoot};

fuzz_target!(|data: &[u8]| {
    if let Ok(root) = TrustedRoot::from_json(data) {
        let _ = verify_trusted_root(&root);
    }
});
