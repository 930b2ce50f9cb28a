const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Format a byte count with a single unit suffix, rounded to the nearest unit.
///
/// Values below 1 KiB are printed exactly; larger values are rounded
/// half away from zero in the largest unit not exceeding them.
pub fn format_size(bytes: u64) -> String {
    let div_by = |unit: u64| (bytes as f64 / unit as f64).round() as u64;
    match bytes {
        b if b < KB => format!("{}b", b),
        b if b < MB => format!("{}kb", div_by(KB)),
        b if b < GB => format!("{}mb", div_by(MB)),
        _ => format!("{}gb", div_by(GB)),
    }
}
