//! Human-readable run report printed after a successful load

use super::PipelineSummary;
use colored::*;

/// Format a byte count in human-readable form
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Print the run summary to stdout
pub fn print_summary(summary: &PipelineSummary) {
    let taxa = &summary.taxa;
    let sequences = &summary.sequences;

    println!("\n{}", "ETL Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Input:".bright_cyan(),
        summary.input_path.display()
    );
    println!(
        "  {} {}",
        "Database:".bright_cyan(),
        summary.database_path.display()
    );
    if let Some(limit) = summary.row_limit {
        println!(
            "  {} first {} rows only",
            "Debug mode:".bright_yellow(),
            limit.to_string().bright_white()
        );
    }
    println!(
        "  {} {:.1}s",
        "Time elapsed:".bright_cyan(),
        summary.duration.as_secs_f64()
    );

    println!("\n{}", "Pass 1: taxa".bright_yellow());
    println!(
        "  {} {} ({} wildlife, {:.1}%)",
        "Rows read:".bright_cyan(),
        taxa.rows_processed.to_string().bright_white(),
        taxa.wildlife_rows,
        taxa.wildlife_rate()
    );
    println!(
        "  {} {} ({} new, {} already present)",
        "Unique taxa:".bright_cyan(),
        taxa.unique_taxa.to_string().bright_white().bold(),
        taxa.taxa_inserted,
        taxa.taxa_reused
    );

    println!("\n{}", "Pass 2: sequences and images".bright_yellow());
    println!(
        "  {} {} ({} reused)",
        "Sequences created:".bright_cyan(),
        sequences.sequences_created.to_string().bright_white().bold(),
        sequences.sequences_reused
    );
    println!(
        "  {} {} ({} duplicates ignored)",
        "Images created:".bright_cyan(),
        sequences.images_created.to_string().bright_white().bold(),
        sequences.images_ignored
    );
    println!(
        "  {} {}",
        "Batches committed:".bright_cyan(),
        sequences.flushes
    );
    if sequences.rows_skipped() > 0 {
        println!(
            "  {} {} (no burst id: {}, unknown taxon: {}, no image id: {})",
            "Rows skipped:".bright_red(),
            sequences.rows_skipped().to_string().bright_red().bold(),
            sequences.rows_without_burst,
            sequences.unresolved_taxon_rows,
            sequences.rows_without_image_id
        );
    }
    let malformed = taxa.malformed_rows.max(sequences.malformed_rows);
    if malformed > 0 {
        println!(
            "  {} {}",
            "Malformed rows:".bright_red(),
            malformed.to_string().bright_red().bold()
        );
    }

    let Some(database) = &summary.database else {
        println!(
            "\n{}",
            "Database summary unavailable (see log)".bright_yellow()
        );
        return;
    };

    println!("\n{}", "Database contents".bright_green().bold());
    println!(
        "  {} {}",
        "Taxa:".bright_cyan(),
        database.counts.taxa.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Sequences:".bright_cyan(),
        database.counts.sequences.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Images:".bright_cyan(),
        database.counts.images.to_string().bright_white()
    );
    if let Some(size) = database.size_bytes {
        println!("  {} {}", "File size:".bright_cyan(), format_size(size));
    }

    if !database.sample_taxa.is_empty() {
        println!("\n{}", "Sample taxa".bright_cyan());
        for taxon in &database.sample_taxa {
            let level = taxon.most_specific_level.as_deref().unwrap_or("unknown");
            match taxon.common_name.as_deref() {
                Some(common) => println!("  • {} ({}) ({})", taxon.label(), level, common),
                None => println!("  • {} ({})", taxon.label(), level),
            }
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536 * 1024), "1.50 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
