// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use libfuzzer_sys::fuzz_target;
use x509_util::CertPool;

fuzz_target!(|data: &[u8]| {
    if let Ok(pool) = CertPool::from_pem(data) {
        let count = pool.len();
        if let Ok(chain) = pool.into_chain() {
            assert_eq!(chain.len(), count);
        }
    }
});
