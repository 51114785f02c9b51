use std::io::Read;

use anyhow::{anyhow, Result};

use crate::target::TargetState;

/// One row of a ranked domain list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
	pub rank: u64,
	pub name: String,
}

/// Which form of each listed name to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
	/// The name exactly as listed
	Raw,
	/// The name with a leading `www.` removed
	#[default]
	Apex,
	/// The apex name with `www.` in front
	Www,
}

impl Variant {
	pub fn apply(&self, name: &str) -> String {
		match self {
			Variant::Raw => name.to_string(),
			Variant::Apex => apex_name(name),
			Variant::Www => www_name(name),
		}
	}
}

/// Strip one leading `www` label.
pub fn apex_name(name: &str) -> String {
	match name.strip_prefix("www.") {
		Some(rest) => rest.to_string(),
		None => name.to_string(),
	}
}

/// Prefix `www.` unless it is already there.
pub fn www_name(name: &str) -> String {
	let apex = apex_name(name);
	format!("www.{}", apex)
}

/// Read a ranked domain list from a file.
///
/// See `parse_domain_list` for the accepted format.
pub fn read_domain_file(path: &str) -> Result<Vec<DomainEntry>> {
	let file = std::fs::File::open(path)
		.map_err(|e| anyhow!("failed to read domain file '{}': {}", path, e))?;
	parse_domain_list(file)
}

/// Parse `rank,name` rows (the Tranco list format).
///
/// A row with a single column is a bare name ranked by its position in the
/// file. Blank lines and lines starting with '#' are skipped.
pub fn parse_domain_list<R: Read>(reader: R) -> Result<Vec<DomainEntry>> {
	let mut csv_reader = csv::ReaderBuilder::new()
		.has_headers(false)
		.flexible(true)
		.comment(Some(b'#'))
		.trim(csv::Trim::All)
		.from_reader(reader);

	let mut entries = Vec::new();
	for (index, row) in csv_reader.records().enumerate() {
		let row = row.map_err(|e| anyhow!("malformed domain list row {}: {}", index + 1, e))?;
		let entry = match (row.get(0), row.get(1)) {
			(Some(rank), Some(name)) if !name.is_empty() => {
				let rank = rank
					.parse()
					.map_err(|e| anyhow!("invalid rank '{}' on row {}: {}", rank, index + 1, e))?;
				DomainEntry {
					rank,
					name: name.to_string(),
				}
			}
			(Some(name), _) if !name.is_empty() => DomainEntry {
				rank: entries.len() as u64 + 1,
				name: name.to_string(),
			},
			_ => continue,
		};
		entries.push(entry);
	}
	Ok(entries)
}

/// Turn list entries into fresh target states for the chosen variant.
pub fn to_targets(entries: &[DomainEntry], variant: Variant) -> Vec<TargetState> {
	entries
		.iter()
		.map(|entry| TargetState::new(variant.apply(&entry.name), entry.rank))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_apex_and_www_names() {
		assert_eq!(apex_name("www.example.com"), "example.com");
		assert_eq!(apex_name("example.com"), "example.com");
		assert_eq!(apex_name("wwwexample.com"), "wwwexample.com");
		assert_eq!(www_name("example.com"), "www.example.com");
		assert_eq!(www_name("www.example.com"), "www.example.com");
	}

	#[test]
	fn test_variant_apply() {
		assert_eq!(Variant::Raw.apply("www.example.com"), "www.example.com");
		assert_eq!(Variant::Apex.apply("www.example.com"), "example.com");
		assert_eq!(Variant::Www.apply("api.example.com"), "www.api.example.com");
	}

	#[test]
	fn test_parse_tranco_rows() {
		let input = "1,google.com\n2,www.facebook.com\n\n# comment\n3, amazon.com \n";
		let entries = parse_domain_list(input.as_bytes()).unwrap();
		assert_eq!(entries.len(), 3);
		assert_eq!(
			entries[2],
			DomainEntry {
				rank: 3,
				name: "amazon.com".to_string()
			}
		);
	}

	#[test]
	fn test_bare_names_ranked_by_position() {
		let input = "example.com\nexample.org\n";
		let entries = parse_domain_list(input.as_bytes()).unwrap();
		assert_eq!(entries[0].rank, 1);
		assert_eq!(entries[1].rank, 2);
		assert_eq!(entries[1].name, "example.org");
	}

	#[test]
	fn test_invalid_rank_is_error() {
		let input = "first,example.com\n";
		assert!(parse_domain_list(input.as_bytes()).is_err());
	}

	#[test]
	fn test_to_targets_applies_variant() {
		let entries = vec![DomainEntry {
			rank: 9,
			name: "www.example.com".to_string(),
		}];
		let targets = to_targets(&entries, Variant::Apex);
		assert_eq!(targets[0].name(), "example.com");
		assert_eq!(targets[0].rank(), 9);
	}
}
