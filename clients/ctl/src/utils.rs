use byte_unit::{AdjustedByte, Byte, UnitType};
use snapcopy::{DirEntry, Listing};
use snapcopy_client::CopySummary;

pub fn adjusted_byte(val: u64) -> AdjustedByte {
    Byte::from(val).get_appropriate_unit(UnitType::Binary)
}

/// Parse a size such as `4096`, `64KiB` or `1 MiB`.
pub fn parse_size(s: &str) -> Result<u32, String> {
    let byte = Byte::parse_str(s, true).map_err(|err| err.to_string())?;
    u32::try_from(byte.as_u64()).map_err(|_| format!("{s} is too large"))
}

fn print_entry(entry: &DirEntry) {
    if entry.is_directory {
        println!("d {:>12} {}/", "", entry.name);
    } else {
        println!("- {:>12.2} {}", adjusted_byte(entry.size), entry.name);
    }
}

pub fn print_listing(listing: &Listing) {
    match listing {
        Listing::File(entry) => print_entry(entry),
        Listing::Directory(entries) => entries.iter().for_each(print_entry),
    }
}

pub fn print_summary(summary: &CopySummary) {
    println!(
        "{} file(s), {} new directorie(s), {:.2} copied ({:.2} as holes), {} stale entrie(s) removed",
        summary.files_copied,
        summary.directories_created,
        adjusted_byte(summary.bytes_copied),
        adjusted_byte(summary.bytes_skipped_as_holes),
        summary.entries_removed,
    );
}
