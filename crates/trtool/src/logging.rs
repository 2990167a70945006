// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

use std::{fmt::Write as _, io::Write as _, sync::Once};

/// Writes one line per record to stderr.
pub struct Logger;

pub static LOGGER: Logger = Logger;

/// Initialize the logger. Unrecognized levels fall back to `info`, and only
/// the first call has any effect.
pub fn init(level: Option<&str>) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let level = level
            .and_then(|l| l.parse().ok())
            .unwrap_or(log::Level::Info);
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level.to_level_filter());
        }
    });
}

fn format_record(record: &log::Record) -> String {
    struct Visitor<'m>(&'m mut String);
    impl<'kvs> log::kv::VisitSource<'kvs> for Visitor<'_> {
        fn visit_pair(
            &mut self,
            key: log::kv::Key<'kvs>,
            value: log::kv::Value<'kvs>,
        ) -> Result<(), log::kv::Error> {
            write!(self.0, " {key}={value}").map_err(|_| log::kv::Error::msg("format failed"))
        }
    }

    let mut line = format!("{} {}: {}", record.level(), record.target(), record.args());
    // Key-value pairs are best effort; a failed visit keeps what was written.
    let _ = record.key_values().visit(&mut Visitor(&mut line));
    line
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(std::io::stderr().lock(), "{}", format_record(record));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
