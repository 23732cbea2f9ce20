pub mod extract;
pub mod generate;
pub mod preview;
pub mod template;

use colored::*;
use draftly_core::FileMap;

/// Print one line per file with its size
pub fn print_file_list(files: &FileMap) {
    for (path, record) in files.iter() {
        println!("  {} {}", path.cyan(), format!("({} bytes)", record.code.len()).dimmed());
    }
}
