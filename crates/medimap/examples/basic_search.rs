//! Basic hospital search
//!
//! This example demonstrates the fundamental operations:
//! - Loading a hospital CSV (a generated fixture here, pass a path to use your own)
//! - Filtering by region, keyword and department
//! - Handling the nearest-facility fallback

use medimap::data_processing::{TestDataConfig, create_test_data};
use medimap::{FilterCriteria, HospitalFinder, OperatingDay, SearchOutcome};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    medimap::init_logging(tracing::Level::INFO)?;

    // Use the first argument as the dataset, or write the built-in fixtures to a temp file
    let fixture = create_test_data(&TestDataConfig::sample())?;
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| fixture.path().to_path_buf(), Into::into);

    let finder = HospitalFinder::from_csv(&path)?;
    println!("{}\n", finder.info().summary());

    println!("Internal medicine in 강남구:");
    let criteria = FilterCriteria::builder()
        .region("강남구")
        .department("내과")
        .build();
    print_outcome(&finder.search(&criteria));

    println!("\nOpen on Sunday:");
    let criteria = FilterCriteria::builder()
        .operating_day(OperatingDay::Sun)
        .build();
    print_outcome(&finder.search(&criteria));

    println!("\nA region with no hospitals:");
    let criteria = FilterCriteria::builder().region("없는동네").build();
    print_outcome(&finder.search(&criteria));

    Ok(())
}

fn print_outcome(outcome: &SearchOutcome<'_>) {
    match outcome {
        SearchOutcome::Filtered { results } => {
            for (i, facility) in results.iter().enumerate() {
                println!(
                    "  {}. {} - {} [{}]",
                    i + 1,
                    facility.name(),
                    facility.address(),
                    facility.departments().join(", ")
                );
            }
        }
        SearchOutcome::Fallback { pool, results } => {
            println!("  No matches, nearest facilities ({pool:?} pool):");
            for (i, r) in results.iter().enumerate() {
                println!(
                    "  {}. {} - {:.2} km{}",
                    i + 1,
                    r.facility.name(),
                    r.distance_km,
                    if r.facility.has_emergency_room() {
                        " (ER)"
                    } else {
                        ""
                    }
                );
            }
        }
    }
}
