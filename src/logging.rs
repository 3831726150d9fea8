// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Configure process logging as JSON lines or human-readable text.
// Author: Lukas Bower

//! Logger setup for the `k9p` binary.

use std::io::Write;

use env_logger::Env;
use log::LevelFilter;

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// env_logger's coloured human format.
    Pretty,
}

/// Install the global logger. `RUST_LOG` overrides `default_level`.
pub fn init(format: LogFormat, default_level: LevelFilter) {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    match format {
        LogFormat::Pretty => {
            builder.format_timestamp_millis();
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = serde_json::json!({
                    "time": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                    "level": record.level().as_str().to_lowercase(),
                    "target": record.target(),
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{line}")
            });
        }
    }
    let _ = builder.try_init();
}
