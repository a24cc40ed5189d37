// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table and unit formatting for terminal output.

use serde_json::Value;

pub fn human_secs(total: u64) -> String {
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn process_table(processes: &[Value]) {
    println!("{:<25} {:<10} {:<10} {:<11} {}", "HOST", "MODE", "STATUS", "TRIGGER", "LOG");
    for process in processes {
        println!(
            "{:<25} {:<10} {:<10} {:<11} {}",
            process["hostname"].as_str().unwrap_or("?"),
            process["mode"].as_str().unwrap_or("?"),
            process["status"].as_str().unwrap_or("?"),
            process["trigger"].as_str().unwrap_or("?"),
            process["logfile"].as_str().unwrap_or("-"),
        );
    }
}

pub fn server_table(servers: &[Value]) {
    if servers.is_empty() {
        println!("roster is empty");
        return;
    }
    println!("{:<30} {:>8} {:>11} {:<10} {}", "HOST", "PRIORITY", "DB-INTERVAL", "MODE", "NOTIFY");
    for server in servers {
        let interval = server["db_interval"]
            .as_u64()
            .map(|h| format!("{h}h"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<30} {:>8} {:>11} {:<10} {}",
            server["hostname"].as_str().unwrap_or("?"),
            server["priority"],
            interval,
            server["mode"].as_str().unwrap_or("full"),
            server["notify_email"].as_str().unwrap_or("-"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        minutes = { 240, "4m" },
        hours = { 7_500, "2h 5m" },
        days = { 200_000, "2d 7h" },
    )]
    fn human_secs_formats(input: u64, expected: &str) {
        assert_eq!(human_secs(input), expected);
    }

    #[parameterized(
        bytes = { 100, "100 B" },
        gib = { 50 * 1024 * 1024 * 1024, "50.0 GiB" },
    )]
    fn human_bytes_formats(input: u64, expected: &str) {
        assert_eq!(human_bytes(input), expected);
    }
}
