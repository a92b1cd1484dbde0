//! Human-readable rendering of operation results.

use dbx_core::types::Metadata;

const FOLDER_ICON: &str = "📁";
const FILE_ICON: &str = "📄";

/// One listing line: icon, name, and size for files.
pub fn entry_line(entry: &Metadata) -> String {
    if entry.is_folder() {
        format!("{} {}", FOLDER_ICON, entry.name)
    } else {
        let size = entry.size.unwrap_or(0);
        format!("{} {} ({} bytes)", FILE_ICON, entry.name, size)
    }
}

/// One search-match line: icon and full display path.
pub fn match_line(entry: &Metadata) -> String {
    let icon = if entry.is_folder() { FOLDER_ICON } else { FILE_ICON };
    let path = entry.path_display.as_deref().unwrap_or("unknown");
    format!("{} {}", icon, path)
}
