use anyhow::Result;
use ruian_sync::{
    config::Config,
    suggest::{street_number_count, suggest_numbers_for_street, suggest_streets},
    types::StreetId,
};

use super::open_store;

pub fn suggest_street_names(config: Config, query: String, format: String) -> Result<()> {
    let store = open_store(&config)?;
    let streets = suggest_streets(&store, &query)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&streets)?);
        return Ok(());
    }
    if streets.is_empty() {
        println!("No streets matching '{}'", query);
    }
    for street in streets {
        let count = street_number_count(&store, street.id)?;
        println!("{:>10}  {} ({} numbers)", street.id, street.name, count);
    }
    Ok(())
}

pub fn suggest_street_numbers(
    config: Config,
    street_id: StreetId,
    query: String,
    format: String,
) -> Result<()> {
    let store = open_store(&config)?;
    let numbers = suggest_numbers_for_street(&store, &query, street_id)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&numbers)?);
        return Ok(());
    }
    if numbers.is_empty() {
        println!("No numbers matching '{}' on street {}", query, street_id);
    }
    for number in numbers {
        println!(
            "{:>10}  {}  {} {}",
            number.id, number.number, number.postal_code, number.town_name
        );
    }
    Ok(())
}
