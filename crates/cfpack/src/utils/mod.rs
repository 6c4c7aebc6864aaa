use colored::Colorize;
use regex::Regex;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Character count of `s` as shown in a terminal, ignoring color codes.
fn visible_len(ansi: Option<&Regex>, s: &str) -> usize {
    match ansi {
        Some(ansi) => ansi.replace_all(s, "").chars().count(),
        None => s.chars().count(),
    }
}

/// Prints the provided lines inside an ASCII box
pub fn print_ansi_boxed_lines(lines: &[String]) {
    let ansi = Regex::new("\x1b\\[[0-9;]*m").ok();

    let width = lines
        .iter()
        .map(|s| visible_len(ansi.as_ref(), s))
        .max()
        .unwrap_or(0);

    let border = "-".repeat(width + 4);
    println_pad!("{}", border);
    for line in lines {
        let pad = width - visible_len(ansi.as_ref(), line);
        println_pad!("| {}{} |", line, " ".repeat(pad));
    }
    println_pad!("{}", border);
}

/// Prints a unified diff with added lines in green and removed lines in red.
pub fn print_diff(diff: &str) {
    for line in diff.trim_end().lines() {
        let colored = if line.starts_with("+++") || line.starts_with("---") {
            line.bold()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with("@@") {
            line.cyan()
        } else {
            line.normal()
        };
        println_pad!("{}", colored);
    }
}
